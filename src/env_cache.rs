//! Serialized env cache (`envs.p`) and its freshness policy.
//!
//! A separate long-lived master process would normally own this cache and
//! its freshness check; since this crate has no such process, the
//! freshness check is internalized here (see DESIGN.md).

use std::fs;
use std::time::SystemTime;

use tempfile::NamedTempFile;
use tracing::{trace, warn};

use crate::config::Config;

/// Read the cached env list if the cache file exists and is younger than
/// `cfg.env_cache_ttl`. Returns `None` on any miss (absent, stale,
/// unreadable, or corrupt) so the caller falls back to recomputing.
pub fn read_if_fresh(cfg: &Config) -> Option<Vec<String>> {
    let path = cfg.env_cache_path();
    let metadata = fs::metadata(&path).ok()?;
    let modified = metadata.modified().ok()?;
    let age = SystemTime::now().duration_since(modified).ok()?;
    if age > cfg.env_cache_ttl {
        return None;
    }
    let data = fs::read(&path).ok()?;
    serde_json::from_slice(&data).ok()
}

/// Write the env cache atomically (temp file + rename) so a reader never
/// observes a half-written cache.
pub fn write(cfg: &Config, envs: &[String]) {
    let path = cfg.env_cache_path();
    let Some(dir) = path.parent() else { return };
    if let Err(err) = fs::create_dir_all(dir) {
        warn!(path = %dir.display(), %err, "unable to create env cache directory");
        return;
    }
    let tmp = match NamedTempFile::new_in(dir) {
        Ok(t) => t,
        Err(err) => {
            warn!(%err, "unable to create temp file for env cache");
            return;
        }
    };
    let body = match serde_json::to_vec(envs) {
        Ok(b) => b,
        Err(err) => {
            warn!(%err, "unable to serialize env cache");
            return;
        }
    };
    if let Err(err) = fs::write(tmp.path(), &body) {
        warn!(%err, "unable to write env cache temp file");
        return;
    }
    match tmp.persist(&path) {
        Ok(_) => trace!(path = %path.display(), "wrote env cache"),
        Err(err) => warn!(%err, "unable to persist env cache"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn write_then_read_round_trips_when_fresh() {
        let td = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.cachedir = td.path().to_path_buf();
        cfg.env_cache_ttl = Duration::from_secs(300);

        let envs = vec!["base".to_string(), "feature_x".to_string()];
        write(&cfg, &envs);
        assert_eq!(read_if_fresh(&cfg), Some(envs));
    }

    #[test]
    fn stale_cache_is_not_returned() {
        let td = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.cachedir = td.path().to_path_buf();
        cfg.env_cache_ttl = Duration::from_secs(0);

        write(&cfg, &["base".to_string()]);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(read_if_fresh(&cfg), None);
    }

    #[test]
    fn missing_cache_is_a_miss() {
        let td = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.cachedir = td.path().to_path_buf();
        assert_eq!(read_if_fresh(&cfg), None);
    }
}
