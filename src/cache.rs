//! Content Cache: `find_file` materializes a blob from the resolved tree
//! into an on-disk cache, with per-path locking and blob-SHA memoization.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::config::Config;
use crate::repo::RemoteRecord;
use crate::tree;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct FindFileResult {
    pub rel: String,
    pub path: String,
}

impl FindFileResult {
    pub fn is_empty(&self) -> bool {
        self.rel.is_empty() && self.path.is_empty()
    }
}

/// Resolve `(tgt_env, path)` to a materialized file. The first remote
/// whose mountpoint/root/tree/blob all line up wins; remote ordering is
/// the disambiguation rule.
pub fn find_file(cfg: &Config, records: &[RemoteRecord], path: &str, tgt_env: &str) -> FindFileResult {
    if Path::new(path).is_absolute() {
        return FindFileResult::default();
    }
    let tgt_env = cfg.resolve_env_alias(tgt_env);

    let dest = cfg.refs_dir(tgt_env).join(path);
    let blobshadest = cfg.hash_dir(tgt_env).join(format!("{path}.hash.blob_sha1"));
    let lock_fn = cfg.hash_dir(tgt_env).join(format!("{path}.lk"));

    for record in records {
        let Some(repo_path) = apply_mountpoint_and_root(path, record) else {
            continue;
        };

        let Some(git_tree) = tree::resolve_tree(&record.repo, tgt_env, cfg) else {
            continue;
        };

        let (parent_dir, filename) = split_parent(&repo_path);
        let Some(parent_tree) = tree::walk_subpath(&record.repo, &git_tree, parent_dir) else {
            continue;
        };
        let Some(entry) = parent_tree.get_name(filename) else {
            continue;
        };
        if entry.kind() != Some(git2::ObjectType::Blob) {
            continue;
        }
        let blob_hexsha = entry.id().to_string();
        let Ok(obj) = entry.to_object(&record.repo) else {
            continue;
        };
        let Some(blob) = obj.as_blob() else {
            continue;
        };

        crate::lock::wait_lock(&lock_fn, cfg.wait_lock_timeout);

        if blobshadest.is_file() && dest.is_file() {
            if let Ok(sha) = fs::read_to_string(&blobshadest) {
                if sha == blob_hexsha {
                    return FindFileResult {
                        rel: path.to_string(),
                        path: dest.to_string_lossy().into_owned(),
                    };
                }
            }
        }

        if let Err(err) = crate::lock::touch(&lock_fn) {
            warn!(path = %lock_fn.display(), %err, "unable to take per-path lock");
        }

        remove_stale_hash_sidecars(&blobshadest, path);

        if let Err(err) = materialize_blob(&dest, blob.content()) {
            warn!(path = %dest.display(), %err, "unable to materialize blob");
            crate::lock::remove_best_effort(&lock_fn);
            continue;
        }
        if let Err(err) = materialize_blob(&blobshadest, blob_hexsha.as_bytes()) {
            warn!(path = %blobshadest.display(), %err, "unable to write blob-sha sidecar");
        }

        crate::lock::remove_best_effort(&lock_fn);

        return FindFileResult {
            rel: path.to_string(),
            path: dest.to_string_lossy().into_owned(),
        };
    }

    FindFileResult::default()
}

/// Apply mountpoint stripping and root prefixing. Returns `None` if this
/// remote's mountpoint doesn't match `path`.
fn apply_mountpoint_and_root(path: &str, record: &RemoteRecord) -> Option<String> {
    let mut repo_path = if record.mountpoint.is_empty() {
        path.to_string()
    } else {
        let prefix = format!("{}/", record.mountpoint);
        let stripped = path.strip_prefix(&prefix)?;
        stripped.to_string()
    };
    if let Some(root) = &record.root {
        repo_path = format!("{}/{}", root.trim_end_matches('/'), repo_path);
    }
    Some(repo_path)
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, file)) => (dir, file),
        None => ("", path),
    }
}

/// Write to a temp file in the destination's own directory, then rename
/// into place — so a concurrent reader can never observe a half-written
/// file (see DESIGN.md, "partial writes").
fn materialize_blob(dest: &Path, content: &[u8]) -> crate::error::Result<()> {
    use crate::error::IoContext;
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).io_ctx(dir)?;
    let mut tmp = NamedTempFile::new_in(dir).io_ctx(dir)?;
    tmp.write_all(content).io_ctx(dest)?;
    tmp.persist(dest).map_err(|e| e.error).io_ctx(dest)?;
    Ok(())
}

/// Any content-hash sidecar (`.hash.<algo>`) is now stale once the blob-sha
/// marker changes; remove them so `file_hash` recomputes on next call.
/// The blob-sha marker itself is excluded — it's about to be rewritten.
fn remove_stale_hash_sidecars(blobshadest: &Path, path: &str) {
    let Some(dir) = blobshadest.parent() else { return };
    let basename = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = format!("{basename}.hash.");
    let Ok(entries) = fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name != format!("{basename}.hash.blob_sha1") {
            let _ = fs::remove_file(entry.path());
        }
    }
}

/// Reap hash sidecars under `<cachedir>/gitfs/hash/` with no corresponding
/// materialized file left in `refs/`.
pub fn reap_hash_dir(cfg: &Config) {
    let hash_root = cfg.gitfs_base_dir().join("hash");
    let refs_root = cfg.gitfs_base_dir().join("refs");
    if !hash_root.is_dir() {
        return;
    }
    for entry in walkdir::WalkDir::new(&hash_root).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let Some(rel_with_suffix) = entry.path().strip_prefix(&hash_root).ok() else {
            continue;
        };
        let Some(base_rel) = strip_hash_suffix(&name) else {
            continue;
        };
        let materialized = refs_root.join(rel_with_suffix.parent().unwrap_or(Path::new(""))).join(base_rel);
        if !materialized.exists() {
            let _ = fs::remove_file(entry.path());
        }
    }
}

fn strip_hash_suffix(name: &str) -> Option<&str> {
    let idx = name.find(".hash.")?;
    Some(&name[..idx])
}
