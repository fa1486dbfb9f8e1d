//! Repo Manager: initialize or attach per-remote working directories and
//! resolve remote URIs to cache dirs by hash.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::remote::ResolvedRemote;

/// A fully initialized remote: its resolved config plus an attached git
/// repository handle.
pub struct RemoteRecord {
    pub uri: String,
    pub mountpoint: String,
    pub root: Option<String>,
    pub hash: String,
    pub cache_dir: PathBuf,
    pub repo: git2::Repository,
}

/// Re-validate configuration and return the list of remote cache records
/// in configuration order. Safe to call repeatedly: creates missing cache
/// dirs, attaches to or initializes each one, and silently drops entries
/// that fail validation (logging why) rather than aborting the whole call.
pub fn init(cfg: &Config) -> Vec<RemoteRecord> {
    let base_dir = cfg.gitfs_base_dir();
    let mut records = Vec::new();
    let mut new_remote = false;

    for spec in &cfg.gitfs_remotes {
        let resolved = match spec.resolve(
            cfg.gitfs_mountpoint.as_deref(),
            cfg.gitfs_root.as_deref(),
        ) {
            Ok(r) => r,
            Err(err) => {
                error!(remote = %spec.uri, %err, "invalid gitfs remote, skipping");
                continue;
            }
        };

        let cache_dir = base_dir.join(&resolved.hash);
        if let Err(err) = fs::create_dir_all(&cache_dir) {
            error!(path = %cache_dir.display(), %err, "unable to create remote cache dir, skipping");
            continue;
        }

        match init_one(&cache_dir, &resolved, cfg.gitfs_ssl_verify) {
            Ok((repo, is_new)) => {
                if is_new {
                    new_remote = true;
                }
                records.push(RemoteRecord {
                    uri: resolved.uri,
                    mountpoint: resolved.mountpoint,
                    root: resolved.root,
                    hash: resolved.hash,
                    cache_dir,
                    repo,
                });
            }
            Err(err) => {
                error!(
                    path = %cache_dir.display(),
                    uri = %resolved.uri,
                    %err,
                    "cache path exists but is not a valid git repository; delete it manually to continue using this remote"
                );
            }
        }
    }

    if new_remote {
        write_remote_map(&base_dir, &records);
    }

    records
}

/// Initialize an empty cache dir as a fresh repo, or attach to an existing
/// one. Returns `(repo, true)` if a new repo was created here.
fn init_one(
    cache_dir: &std::path::Path,
    resolved: &ResolvedRemote,
    ssl_verify: bool,
) -> crate::error::Result<(git2::Repository, bool)> {
    let is_empty = fs::read_dir(cache_dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true);

    let (repo, is_new) = if is_empty {
        (git2::Repository::init(cache_dir)?, true)
    } else {
        (git2::Repository::open(cache_dir)?, false)
    };

    if repo.find_remote("origin").is_err() {
        repo.remote("origin", &resolved.uri)?;
        write_ssl_verify(&repo, ssl_verify);
    }

    Ok((repo, is_new))
}

/// Races between two processes writing the same git config key are
/// tolerated: a lock-contention error here is logged and swallowed rather
/// than treated as an init failure.
fn write_ssl_verify(repo: &git2::Repository, ssl_verify: bool) {
    let value = if ssl_verify { "true" } else { "false" };
    let mut config = match repo.config() {
        Ok(c) => c,
        Err(err) => {
            warn!(%err, "unable to open repo git config");
            return;
        }
    };
    if let Err(err) = config.set_str("http.sslVerify", value) {
        warn!(%err, "unable to write http.sslVerify, assuming a concurrent writer won the race");
    }
}

fn write_remote_map(base_dir: &std::path::Path, records: &[RemoteRecord]) {
    let path = base_dir.join("remote_map.txt");
    let mut body = format!(
        "# gitfs_remote map as of {}\n",
        Utc::now().format("%d %b %Y %H:%M:%S%.6f")
    );
    for record in records {
        body.push_str(&format!("{} = {}\n", record.hash, record.uri));
    }
    match fs::write(&path, body) {
        Ok(()) => info!(path = %path.display(), "wrote new gitfs_remote map"),
        Err(err) => warn!(path = %path.display(), %err, "unable to write remote map (diagnostic only)"),
    }
}

/// Remove any cache dir under `<cachedir>/gitfs/` whose name is not a
/// currently configured remote hash, preserving reserved names. Returns
/// whether anything was removed.
pub fn purge_cache(cfg: &Config) -> bool {
    let base_dir = cfg.gitfs_base_dir();
    let existing = match fs::read_dir(&base_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>(),
        Err(_) => return false,
    };

    let live_hashes: std::collections::HashSet<String> =
        init(cfg).into_iter().map(|r| r.hash).collect();

    const RESERVED: &[&str] = &["hash", "refs", "envs.p", "remote_map.txt"];

    let mut changed = false;
    for name in existing {
        if live_hashes.contains(&name) || RESERVED.contains(&name.as_str()) {
            continue;
        }
        let path = base_dir.join(&name);
        if let Err(err) = fs::remove_dir_all(&path) {
            warn!(path = %path.display(), %err, "unable to purge stale remote cache dir");
        } else {
            info!(path = %path.display(), "purged orphaned remote cache dir");
            changed = true;
        }
    }
    changed
}
