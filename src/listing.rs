//! Listing: recursive file/dir enumeration across remotes, backed by a
//! small per-env cache (see [`ListingCache`]).

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use git2::{ObjectType, Repository, Tree, TreeWalkMode, TreeWalkResult};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::config::Config;
use crate::lock;
use crate::repo::RemoteRecord;
use crate::tree;

/// List every file path (relative to the configured mountpoint) reachable
/// under `tgt_env` across all remotes, sorted and de-duplicated.
pub fn file_list(cfg: &Config, records: &[RemoteRecord], tgt_env: &str) -> Vec<String> {
    let tgt_env = cfg.resolve_env_alias(tgt_env);
    if let Some(cached) = ListingCache::read_if_fresh(cfg, tgt_env, "files") {
        return cached;
    }

    let mut out = BTreeSet::new();
    for record in records {
        let Some(git_tree) = tree::resolve_tree(&record.repo, tgt_env, cfg) else {
            continue;
        };
        let Some(root_tree) = tree::walk_subpath(&record.repo, &git_tree, root_of(record)) else {
            continue;
        };
        walk_blobs(&record.repo, &root_tree, |rel| {
            out.insert(mount_path(record, rel));
        });
    }

    let result: Vec<String> = out.into_iter().collect();
    ListingCache::write(cfg, tgt_env, "files", &result);
    result
}

/// List every directory path (relative to the configured mountpoint)
/// reachable under `tgt_env` across all remotes, sorted and de-duplicated.
/// A remote's bare mountpoint is never emitted by itself — only
/// `mountpoint/<discovered-subdir>`, matching every walked subdirectory.
pub fn dir_list(cfg: &Config, records: &[RemoteRecord], tgt_env: &str) -> Vec<String> {
    let tgt_env = cfg.resolve_env_alias(tgt_env);
    if let Some(cached) = ListingCache::read_if_fresh(cfg, tgt_env, "dirs") {
        return cached;
    }

    let mut out = BTreeSet::new();
    for record in records {
        let Some(git_tree) = tree::resolve_tree(&record.repo, tgt_env, cfg) else {
            continue;
        };
        let Some(root_tree) = tree::walk_subpath(&record.repo, &git_tree, root_of(record)) else {
            continue;
        };
        walk_trees(&record.repo, &root_tree, |rel| {
            if !rel.is_empty() {
                out.insert(mount_path(record, rel));
            }
        });
    }

    let result: Vec<String> = out.into_iter().collect();
    ListingCache::write(cfg, tgt_env, "dirs", &result);
    result
}

/// Per-env cache of `file_list`/`dir_list` results. Written atomically
/// (temp file + rename, same as [`crate::env_cache`]) and guarded by a
/// writer-lock sidecar: a reader waits for any in-flight write to clear
/// before touching the cache file, so it never observes a half-written
/// result.
pub struct ListingCache;

impl ListingCache {
    fn lock_path(cfg: &Config, env: &str, kind: &str) -> PathBuf {
        cfg.gitfs_base_dir()
            .join("file_lists")
            .join(format!("{env}.{kind}.lk"))
    }

    fn read_if_fresh(cfg: &Config, env: &str, kind: &str) -> Option<Vec<String>> {
        let path = cfg.listing_cache_path(env, kind);
        lock::wait_lock(&Self::lock_path(cfg, env, kind), cfg.wait_lock_timeout);

        let metadata = fs::metadata(&path).ok()?;
        let modified = metadata.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).ok()?;
        if age > cfg.env_cache_ttl {
            return None;
        }
        let data = fs::read(&path).ok()?;
        serde_json::from_slice(&data).ok()
    }

    fn write(cfg: &Config, env: &str, kind: &str, entries: &[String]) {
        let path = cfg.listing_cache_path(env, kind);
        let Some(dir) = path.parent() else { return };
        if let Err(err) = fs::create_dir_all(dir) {
            warn!(path = %dir.display(), %err, "unable to create listing cache directory");
            return;
        }

        let lock_path = Self::lock_path(cfg, env, kind);
        if let Err(err) = lock::touch(&lock_path) {
            warn!(path = %lock_path.display(), %err, "unable to write listing cache lock");
            return;
        }

        let body = match serde_json::to_vec(entries) {
            Ok(b) => b,
            Err(err) => {
                warn!(%err, "unable to serialize listing cache");
                lock::remove_best_effort(&lock_path);
                return;
            }
        };
        let tmp = match NamedTempFile::new_in(dir) {
            Ok(t) => t,
            Err(err) => {
                warn!(%err, "unable to create temp file for listing cache");
                lock::remove_best_effort(&lock_path);
                return;
            }
        };
        if let Err(err) = fs::write(tmp.path(), &body) {
            warn!(%err, "unable to write listing cache temp file");
            lock::remove_best_effort(&lock_path);
            return;
        }
        if let Err(err) = tmp.persist(&path) {
            warn!(%err, "unable to persist listing cache");
        }
        lock::remove_best_effort(&lock_path);
    }
}

/// Gitfs never materializes empty directories (git itself can't represent
/// them), so this is always empty. Kept as its own entry point since
/// callers may invoke it as a distinct operation.
pub fn file_list_emptydirs(_cfg: &Config, _records: &[RemoteRecord], _tgt_env: &str) -> Vec<String> {
    Vec::new()
}

/// Drop every cached listing result. Called by the update loop once a
/// fetch cycle changes anything, so a stale listing can never outlive the
/// content it described past the next read.
pub fn invalidate(cfg: &Config) {
    let dir = cfg.gitfs_base_dir().join("file_lists");
    if dir.exists() {
        if let Err(err) = fs::remove_dir_all(&dir) {
            warn!(path = %dir.display(), %err, "unable to invalidate listing cache");
        }
    }
}

fn root_of(record: &RemoteRecord) -> &str {
    record.root.as_deref().unwrap_or("")
}

fn mount_path(record: &RemoteRecord, rel: &str) -> String {
    if record.mountpoint.is_empty() {
        rel.to_string()
    } else {
        format!("{}/{}", record.mountpoint, rel)
    }
}

fn walk_blobs(repo: &Repository, tree: &Tree, mut visit: impl FnMut(&str)) {
    let result = tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
        if entry.kind() == Some(ObjectType::Blob) {
            let name = entry.name().unwrap_or_default();
            let rel = format!("{dir}{name}");
            visit(&rel);
        }
        TreeWalkResult::Ok
    });
    if let Err(err) = result {
        debug!(%err, "tree walk aborted early");
    }
    let _ = repo;
}

fn walk_trees(repo: &Repository, tree: &Tree, mut visit: impl FnMut(&str)) {
    let result = tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
        if entry.kind() == Some(ObjectType::Tree) {
            let name = entry.name().unwrap_or_default();
            let rel = format!("{dir}{name}");
            visit(&rel);
        }
        TreeWalkResult::Ok
    });
    if let Err(err) = result {
        debug!(%err, "tree walk aborted early");
    }
    let _ = repo;
}
