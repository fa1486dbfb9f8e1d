//! Advisory, file-based locking shared by the fetch loop (`update.lk`),
//! the content cache (per-path `.lk` files), and the listing cache
//! (per-env writer-lock sidecars). Multi-process, cooperatively shared
//! on-disk state — no OS-level flock is used, only create-then-delete
//! semantics that every worker process respects.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::warn;

/// Write `update.lk` containing `"<pid> <unix_millis>"`. The timestamp
/// lets a later reader decide the lock is abandoned without needing to
/// trust that the writer ever comes back (see DESIGN.md, "update.lk
/// cleanup").
pub fn write_update_lock(path: &Path) -> std::io::Result<()> {
    let pid = std::process::id();
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let mut file = File::create(path)?;
    write!(file, "{pid} {millis}")?;
    Ok(())
}

/// A lock file is stale once older than `ttl`, either by its embedded
/// timestamp or, failing that, by filesystem mtime.
pub fn is_stale(path: &Path, ttl: Duration) -> bool {
    let written_at = fs::read_to_string(path).ok().and_then(|body| {
        body.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse::<u64>().ok())
    }).map(|millis| UNIX_EPOCH + Duration::from_millis(millis));

    let age = match written_at.or_else(|| fs::metadata(path).and_then(|m| m.modified()).ok()) {
        Some(t) => SystemTime::now().duration_since(t).unwrap_or_default(),
        None => return false,
    };
    age > ttl
}

/// Remove a lock file, swallowing the error: filesystem cleanup failures
/// on best-effort paths are never fatal.
pub fn remove_best_effort(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), %err, "unable to remove lock file (best effort)");
        }
    }
}

/// Poll until `path` is absent or `timeout` elapses. Returns `true` if the
/// lock cleared, `false` if the wait timed out (the caller proceeds anyway;
/// this is advisory, not exclusive).
pub fn wait_lock(path: &Path, timeout: Duration) -> bool {
    let start = Instant::now();
    while path.exists() {
        if start.elapsed() >= timeout {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    true
}

/// Create an empty lock file, truncating if one is already present. Used
/// by the content cache's slow path, which always (re)creates the lock
/// before mutating the materialized file and its sidecars.
pub fn touch(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_lock_detected_by_embedded_timestamp() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("update.lk");
        let ancient = UNIX_EPOCH + Duration::from_secs(1);
        let millis = ancient.duration_since(UNIX_EPOCH).unwrap().as_millis();
        fs::write(&path, format!("123 {millis}")).unwrap();
        assert!(is_stale(&path, Duration::from_secs(60)));
    }

    #[test]
    fn fresh_lock_is_not_stale() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("update.lk");
        write_update_lock(&path).unwrap();
        assert!(!is_stale(&path, Duration::from_secs(600)));
    }

    #[test]
    fn wait_lock_returns_true_once_removed() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("x.lk");
        touch(&path).unwrap();
        let p = path.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            remove_best_effort(&p);
        });
        assert!(wait_lock(&path, Duration::from_secs(2)));
        handle.join().unwrap();
    }

    #[test]
    fn wait_lock_times_out_on_persistent_lock() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("x.lk");
        touch(&path).unwrap();
        assert!(!wait_lock(&path, Duration::from_millis(30)));
    }
}
