//! The public facade: wires the lower modules together into the operation
//! table a fileserver master's RPC layer would call. This crate doesn't
//! implement that RPC layer, only the surface it would call through.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Once;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{self, FindFileResult};
use crate::config::Config;
use crate::hash::{self, FileHashResult};
use crate::listing;
use crate::repo::{self, RemoteRecord};
use crate::update::{self, UpdateReport};

static LEGACY_ENV_WARNING: Once = Once::new();

/// Raw, wire-shaped load as received from a caller; `env` is the
/// legacy key name. Every typed `*Load` below is built from this through
/// `TryFrom`, which performs the legacy translation and logs a one-time
/// deprecation warning.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLoad {
    pub path: Option<String>,
    pub saltenv: Option<String>,
    pub env: Option<String>,
    pub loc: Option<u64>,
    pub gzip: Option<i32>,
}

impl RawLoad {
    fn resolve_saltenv(&mut self) -> Option<String> {
        if let Some(env) = self.env.take() {
            LEGACY_ENV_WARNING.call_once(|| {
                warn!("passing a saltenv using 'env' is deprecated, use 'saltenv' instead");
            });
            self.saltenv.get_or_insert(env);
        }
        self.saltenv.clone()
    }
}

#[derive(Debug, Clone)]
pub struct ServeFileLoad {
    pub path: String,
    pub saltenv: String,
    pub loc: u64,
    pub gzip: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct FileHashLoad {
    pub saltenv: String,
}

#[derive(Debug, Clone)]
pub struct FileListLoad {
    pub saltenv: String,
}

#[derive(Debug, thiserror::Error)]
#[error("load is missing a required field")]
pub struct IncompleteLoad;

impl TryFrom<RawLoad> for ServeFileLoad {
    type Error = IncompleteLoad;
    fn try_from(mut raw: RawLoad) -> Result<Self, Self::Error> {
        let saltenv = raw.resolve_saltenv().ok_or(IncompleteLoad)?;
        Ok(ServeFileLoad {
            path: raw.path.ok_or(IncompleteLoad)?,
            saltenv,
            loc: raw.loc.ok_or(IncompleteLoad)?,
            gzip: raw.gzip,
        })
    }
}

impl TryFrom<RawLoad> for FileHashLoad {
    type Error = IncompleteLoad;
    fn try_from(mut raw: RawLoad) -> Result<Self, Self::Error> {
        Ok(FileHashLoad {
            saltenv: raw.resolve_saltenv().ok_or(IncompleteLoad)?,
        })
    }
}

impl TryFrom<RawLoad> for FileListLoad {
    type Error = IncompleteLoad;
    fn try_from(mut raw: RawLoad) -> Result<Self, Self::Error> {
        Ok(FileListLoad {
            saltenv: raw.resolve_saltenv().ok_or(IncompleteLoad)?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ServeFileResult {
    pub data: Vec<u8>,
    pub dest: String,
    pub gzip: Option<i32>,
}

/// Owns the process-wide configuration and the live remote records,
/// mirroring the original module-level globals (`__opts__`, the
/// per-process repo objects) without relying on any global mutable state.
pub struct GitFsBackend {
    cfg: Config,
    records: Vec<RemoteRecord>,
}

impl GitFsBackend {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            records: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn init(&mut self) -> &[RemoteRecord] {
        self.records = repo::init(&self.cfg);
        &self.records
    }

    pub fn update(&mut self) -> UpdateReport {
        let (records, report) = update::update(&self.cfg);
        self.records = records;
        report
    }

    pub fn envs(&self, ignore_cache: bool) -> Vec<String> {
        crate::refs::envs(&self.cfg, &self.records, ignore_cache)
    }

    pub fn find_file(&self, path: &str, env: &str) -> FindFileResult {
        cache::find_file(&self.cfg, &self.records, path, env)
    }

    /// Read a chunk of an already-located file: seek to `load.loc`, read up
    /// to `file_buffer_size` bytes, optionally gzip-compressing the chunk
    /// when the caller asked for it.
    pub fn serve_file(&self, load: ServeFileLoad, fnd: &FindFileResult) -> ServeFileResult {
        if fnd.path.is_empty() {
            return ServeFileResult::default();
        }
        let mut result = ServeFileResult {
            dest: fnd.rel.clone(),
            ..Default::default()
        };

        let mut file = match File::open(&fnd.path) {
            Ok(f) => f,
            Err(err) => {
                warn!(path = %fnd.path, %err, "unable to open materialized file for serve_file");
                return result;
            }
        };
        if let Err(err) = file.seek(SeekFrom::Start(load.loc)) {
            warn!(path = %fnd.path, %err, "unable to seek materialized file");
            return result;
        }

        let mut buf = vec![0u8; self.cfg.file_buffer_size];
        let read = match file.read(&mut buf) {
            Ok(n) => n,
            Err(err) => {
                warn!(path = %fnd.path, %err, "unable to read materialized file");
                return result;
            }
        };
        buf.truncate(read);

        if let Some(level) = load.gzip {
            if !buf.is_empty() {
                match gzip_compress(&buf, level) {
                    Ok(compressed) => {
                        result.data = compressed;
                        result.gzip = Some(level);
                        return result;
                    }
                    Err(err) => warn!(%err, "gzip compression failed, serving uncompressed chunk"),
                }
            }
        }
        result.data = buf;
        result
    }

    pub fn file_hash(&self, load: FileHashLoad, fnd: &FindFileResult) -> FileHashResult {
        hash::file_hash(&self.cfg, fnd, &load.saltenv)
    }

    pub fn file_list(&self, load: FileListLoad) -> Vec<String> {
        listing::file_list(&self.cfg, &self.records, &load.saltenv)
    }

    pub fn dir_list(&self, load: FileListLoad) -> Vec<String> {
        listing::dir_list(&self.cfg, &self.records, &load.saltenv)
    }

    pub fn file_list_emptydirs(&self) -> Vec<String> {
        Vec::new()
    }
}

fn gzip_compress(data: &[u8], level: i32) -> std::io::Result<Vec<u8>> {
    use std::io::Write;
    let level = level.clamp(0, 9) as u32;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command;

    fn run(dir: &std::path::Path, args: &[&str]) {
        assert!(Command::new("git").args(args).current_dir(dir).status().unwrap().success());
    }

    fn backend_with_one_file(td: &tempfile::TempDir) -> GitFsBackend {
        let upstream = td.path().join("upstream");
        fs::create_dir_all(&upstream).unwrap();
        run(&upstream, &["init", "-q", "-b", "main"]);
        run(&upstream, &["config", "user.email", "t@example.com"]);
        run(&upstream, &["config", "user.name", "t"]);
        fs::write(upstream.join("hello.sls"), "hello: world\n").unwrap();
        run(&upstream, &["add", "."]);
        run(&upstream, &["commit", "-q", "-m", "init"]);

        let mut cfg = Config::default();
        cfg.cachedir = td.path().join("cache");
        cfg.gitfs_base = "main".to_string();
        cfg.gitfs_remotes = vec![crate::remote::RemoteSpec {
            uri: format!("file://{}", upstream.display()),
            mountpoint: None,
            root: None,
            extra: Default::default(),
        }];
        let mut backend = GitFsBackend::new(cfg);
        backend.update();
        backend
    }

    #[test]
    fn raw_load_translates_legacy_env_key() {
        let raw = RawLoad {
            path: Some("hello.sls".to_string()),
            saltenv: None,
            env: Some("base".to_string()),
            loc: Some(0),
            gzip: None,
        };
        let load = ServeFileLoad::try_from(raw).unwrap();
        assert_eq!(load.saltenv, "base");
    }

    #[test]
    fn end_to_end_find_serve_and_hash() {
        let td = tempfile::tempdir().unwrap();
        let backend = backend_with_one_file(&td);

        let fnd = backend.find_file("hello.sls", "base");
        assert!(!fnd.path.is_empty());

        let served = backend.serve_file(
            ServeFileLoad {
                path: "hello.sls".to_string(),
                saltenv: "base".to_string(),
                loc: 0,
                gzip: None,
            },
            &fnd,
        );
        assert_eq!(served.data, b"hello: world\n");
        assert_eq!(served.dest, "hello.sls");

        let hashed = backend.file_hash(FileHashLoad { saltenv: "base".to_string() }, &fnd);
        assert_eq!(hashed.hash_type, "sha256");
        assert!(!hashed.hsum.is_empty());

        let files = backend.file_list(FileListLoad { saltenv: "base".to_string() });
        assert_eq!(files, vec!["hello.sls".to_string()]);

        assert!(backend.file_list_emptydirs().is_empty());
    }
}
