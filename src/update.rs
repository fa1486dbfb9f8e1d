//! Fetch/Update Loop: fetch every remote, detect change, prune stale refs,
//! rebuild the env cache, fire an update event, and reap orphaned hash
//! sidecars.

use std::collections::BTreeMap;

use git2::{ErrorClass, Oid};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::events::{EventBus, LoggingEventBus, UpdateEvent};
use crate::repo::{self, RemoteRecord};
use crate::{cache, env_cache, lock, listing, refs};

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct UpdateReport {
    pub changed: bool,
}

/// Re-validate remotes (`repo::purge_cache` + `repo::init`), fetch each
/// one under its `update.lk`, and regenerate the env cache whenever
/// anything changed or the cache is simply missing. The update event
/// fires every cycle (gated on `cfg.fileserver_events`, carrying `changed`
/// as a payload field), and the hash reaper always runs: both are cheap,
/// idempotent housekeeping rather than reactions to a detected change.
/// Returns the fresh record set alongside whether anything changed, since
/// callers need both.
pub fn update(cfg: &Config) -> (Vec<RemoteRecord>, UpdateReport) {
    let mut changed = repo::purge_cache(cfg);
    let records = repo::init(cfg);

    for record in &records {
        if fetch_record(cfg, record) {
            changed = true;
        }
    }

    if changed || !cfg.env_cache_path().exists() {
        let envs = refs::envs(cfg, &records, true);
        env_cache::write(cfg, &envs);
    }
    if changed {
        listing::invalidate(cfg);
    }

    if cfg.fileserver_events {
        LoggingEventBus.fire_update_event(&UpdateEvent {
            changed,
            backend: "gitfs",
        });
    }
    cache::reap_hash_dir(cfg);

    (records, UpdateReport { changed })
}

/// Fetch one remote under its `update.lk`. Returns whether the fetch
/// changed the repo's observable ref set.
fn fetch_record(cfg: &Config, record: &RemoteRecord) -> bool {
    let lock_path = record.cache_dir.join("update.lk");
    if lock_path.exists() && !lock::is_stale(&lock_path, cfg.update_lock_ttl) {
        debug!(uri = %record.uri, "update.lk held by another process, skipping this cycle");
        return false;
    }
    if let Err(err) = lock::write_update_lock(&lock_path) {
        warn!(uri = %record.uri, %err, "unable to write update.lk, skipping this cycle");
        return false;
    }

    let before = remote_ref_map(&record.repo);
    let outcome = do_fetch(&record.repo);
    lock::remove_best_effort(&lock_path);

    match outcome {
        Ok(()) => {
            let after = remote_ref_map(&record.repo);
            if after.is_empty() {
                warn!(uri = %record.uri, "remote advertises no refs; treating as an empty repo for now");
            }
            let stale: Vec<&String> = before
                .keys()
                .filter(|name| !after.contains_key(*name))
                .filter(|name| name.starts_with("refs/remotes/origin/"))
                .collect();
            for name in &stale {
                if let Ok(mut reference) = record.repo.find_reference(name) {
                    let _ = reference.delete();
                }
            }
            if !stale.is_empty() {
                info!(uri = %record.uri, count = stale.len(), "pruned stale remote-tracking refs");
            }
            before != after
        }
        Err(err) if is_corruption(&err) => {
            error!(uri = %record.uri, path = %record.cache_dir.display(), %err, "repo cache is corrupt, removing for a clean re-clone next cycle");
            let _ = std::fs::remove_dir_all(&record.cache_dir);
            true
        }
        Err(err) => {
            warn!(uri = %record.uri, %err, "fetch failed, keeping existing cache");
            false
        }
    }
}

fn do_fetch(repo: &git2::Repository) -> Result<(), git2::Error> {
    let mut remote = repo.find_remote("origin")?;
    remote.fetch(
        &["+refs/heads/*:refs/remotes/origin/*", "+refs/tags/*:refs/tags/*"],
        None,
        None,
    )
}

/// Full ref name -> target oid, across both namespaces `do_fetch` updates.
/// Tags are included so an upstream tag move/add/delete is detected as a
/// change even when no branch moved.
fn remote_ref_map(repo: &git2::Repository) -> BTreeMap<String, Oid> {
    let mut map = BTreeMap::new();
    for pattern in ["refs/remotes/origin/*", "refs/tags/*"] {
        let Ok(refs) = repo.references_glob(pattern) else { continue };
        for reference in refs.flatten() {
            let Some(name) = reference.name() else { continue };
            if name.ends_with("/HEAD") {
                continue;
            }
            if let Some(oid) = reference.target() {
                map.insert(name.to_string(), oid);
            }
        }
    }
    map
}

fn is_corruption(err: &git2::Error) -> bool {
    matches!(err.class(), ErrorClass::Repository | ErrorClass::Odb | ErrorClass::Reference)
        && err.code() != git2::ErrorCode::NotFound
}
