//! Process-wide configuration, loaded once into an explicit [`Config`]
//! value rather than read from module-level mutable state (see
//! DESIGN.md, "process-wide config").

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::remote::RemoteSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory under which `gitfs/` derived state is stored.
    pub cachedir: PathBuf,
    /// Must contain "git" for this backend to be active; kept for parity
    /// with the master config surface even though this crate only ever
    /// runs the git backend.
    pub fileserver_backend: Vec<String>,
    /// Chosen git provider. This crate implements exactly one: `git2`.
    pub gitfs_provider: String,
    pub gitfs_remotes: Vec<RemoteSpec>,
    pub gitfs_base: String,
    pub gitfs_root: Option<String>,
    pub gitfs_mountpoint: Option<String>,
    pub gitfs_env_whitelist: Vec<String>,
    pub gitfs_env_blacklist: Vec<String>,
    pub gitfs_ssl_verify: bool,
    pub fileserver_events: bool,
    pub hash_type: HashType,
    pub file_buffer_size: usize,
    pub sock_dir: PathBuf,
    /// How long an `update.lk` may sit on disk before a reader treats it as
    /// abandoned by a crashed process (see DESIGN.md "update.lk cleanup").
    #[serde(with = "humantime_secs")]
    pub update_lock_ttl: std::time::Duration,
    /// How long `find_file` will poll for a per-path lock to clear.
    #[serde(with = "humantime_secs")]
    pub wait_lock_timeout: std::time::Duration,
    /// How long the serialized env cache (`envs.p`) is considered fresh
    /// before `envs(ignore_cache=false)` recomputes it from the repos.
    #[serde(with = "humantime_secs")]
    pub env_cache_ttl: std::time::Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
    Sha1,
    Sha256,
}

impl HashType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashType::Sha1 => "sha1",
            HashType::Sha256 => "sha256",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cachedir: default_cachedir(),
            fileserver_backend: vec!["git".to_string()],
            gitfs_provider: "git2".to_string(),
            gitfs_remotes: Vec::new(),
            gitfs_base: "master".to_string(),
            gitfs_root: None,
            gitfs_mountpoint: None,
            gitfs_env_whitelist: Vec::new(),
            gitfs_env_blacklist: Vec::new(),
            gitfs_ssl_verify: true,
            fileserver_events: false,
            hash_type: HashType::Sha256,
            file_buffer_size: 1_048_576,
            sock_dir: default_sock_dir(),
            update_lock_ttl: std::time::Duration::from_secs(15 * 60),
            wait_lock_timeout: std::time::Duration::from_secs(30),
            env_cache_ttl: std::time::Duration::from_secs(60),
        }
    }
}

fn default_cachedir() -> PathBuf {
    if let Ok(over_ride) = std::env::var("GITFS_CACHE_DIR") {
        return PathBuf::from(over_ride);
    }
    if let Some(pd) = directories::ProjectDirs::from("", "", "gitfs") {
        return pd.cache_dir().to_path_buf();
    }
    PathBuf::from(".cache/gitfs")
}

/// Default location of `gitfs.toml`, used by the CLI when `--config` is
/// not given.
pub fn default_config_path() -> PathBuf {
    if let Some(pd) = directories::ProjectDirs::from("", "", "gitfs") {
        return pd.config_dir().join("gitfs.toml");
    }
    PathBuf::from("gitfs.toml")
}

fn default_sock_dir() -> PathBuf {
    if let Some(pd) = directories::ProjectDirs::from("", "", "gitfs") {
        return pd
            .runtime_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| pd.cache_dir().to_path_buf());
    }
    PathBuf::from(".cache/gitfs/sock")
}

impl Config {
    /// `<cachedir>/gitfs`, the root of all persisted on-disk state.
    pub fn gitfs_base_dir(&self) -> PathBuf {
        self.cachedir.join("gitfs")
    }

    pub fn refs_dir(&self, env: &str) -> PathBuf {
        self.gitfs_base_dir().join("refs").join(env)
    }

    pub fn hash_dir(&self, env: &str) -> PathBuf {
        self.gitfs_base_dir().join("hash").join(env)
    }

    pub fn env_cache_path(&self) -> PathBuf {
        self.gitfs_base_dir().join("envs.p")
    }

    /// `<cachedir>/gitfs/file_lists/<env>.<kind>.json`, where `kind` is
    /// `"files"` or `"dirs"` — the listing cache's serialized result.
    pub fn listing_cache_path(&self, env: &str, kind: &str) -> PathBuf {
        self.gitfs_base_dir()
            .join("file_lists")
            .join(format!("{env}.{kind}.json"))
    }

    pub fn remote_map_path(&self) -> PathBuf {
        self.gitfs_base_dir().join("remote_map.txt")
    }

    /// Resolve `tgt_env == "base"` to the configured base branch name.
    pub fn resolve_env_alias<'a>(&'a self, env: &'a str) -> &'a str {
        if env == "base" {
            &self.gitfs_base
        } else {
            env
        }
    }

    pub fn load(path: &Path) -> Result<Config> {
        let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let cfg: Config =
            toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: &Path) -> Result<Config> {
        if path.exists() {
            Config::load(path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let pretty = toml::to_string_pretty(self)?;
        fs::write(path, pretty).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

mod humantime_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_alias_resolves_to_configured_base_branch() {
        let mut cfg = Config::default();
        cfg.gitfs_base = "production".to_string();
        assert_eq!(cfg.resolve_env_alias("base"), "production");
        assert_eq!(cfg.resolve_env_alias("feature_x"), "feature_x");
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = Config::default();
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("gitfs.toml");
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.gitfs_base, cfg.gitfs_base);
        assert_eq!(loaded.hash_type, cfg.hash_type);
    }
}
