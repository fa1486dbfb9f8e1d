//! File Hash: read-through sidecar cache of content hashes.
//!
//! Takes an already-resolved [`FindFileResult`] rather than re-running
//! `find_file`, keeping resolution and hashing as separate steps a caller
//! composes explicitly.

use std::fs;
use std::io::Write;
use std::path::Path;

use sha1::Sha1;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::cache::FindFileResult;
use crate::config::{Config, HashType};

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FileHashResult {
    pub hsum: String,
    pub hash_type: String,
}

/// Return `fnd`'s configured-algorithm hash, reading a sidecar next to the
/// blob-sha marker if one is present. Sidecars are invalidated by the
/// content cache whenever the underlying blob changes, so a hit here
/// always reflects the current blob.
pub fn file_hash(cfg: &Config, fnd: &FindFileResult, saltenv: &str) -> FileHashResult {
    if fnd.path.is_empty() {
        return FileHashResult::default();
    }
    let short = cfg.resolve_env_alias(saltenv);

    let sidecar = cfg
        .hash_dir(short)
        .join(format!("{}.hash.{}", fnd.rel, cfg.hash_type.as_str()));

    if let Ok(existing) = fs::read_to_string(&sidecar) {
        if !existing.is_empty() {
            return FileHashResult {
                hsum: existing,
                hash_type: cfg.hash_type.as_str().to_string(),
            };
        }
    }

    let Ok(content) = fs::read(&fnd.path) else {
        return FileHashResult::default();
    };
    let hsum = compute(cfg.hash_type, &content);
    write_sidecar(&sidecar, &hsum);

    FileHashResult {
        hsum,
        hash_type: cfg.hash_type.as_str().to_string(),
    }
}

fn compute(hash_type: HashType, content: &[u8]) -> String {
    match hash_type {
        HashType::Sha1 => {
            let mut hasher = Sha1::new();
            hasher.update(content);
            format!("{:x}", hasher.finalize())
        }
        HashType::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(content);
            format!("{:x}", hasher.finalize())
        }
    }
}

fn write_sidecar(path: &Path, hsum: &str) {
    let Some(dir) = path.parent() else { return };
    if let Err(err) = fs::create_dir_all(dir) {
        warn!(path = %dir.display(), %err, "unable to create hash sidecar directory");
        return;
    }
    let mut tmp = match NamedTempFile::new_in(dir) {
        Ok(t) => t,
        Err(err) => {
            warn!(%err, "unable to create temp file for hash sidecar");
            return;
        }
    };
    if let Err(err) = tmp.write_all(hsum.as_bytes()) {
        warn!(%err, "unable to write hash sidecar temp file");
        return;
    }
    if let Err(err) = tmp.persist(path) {
        warn!(%err, "unable to persist hash sidecar");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use crate::repo::RemoteRecord;

    fn run(dir: &Path, args: &[&str]) {
        assert!(Command::new("git").args(args).current_dir(dir).status().unwrap().success());
    }

    fn setup(td: &tempfile::TempDir) -> (Config, Vec<RemoteRecord>) {
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
        cfg.hash_type = HashType::Sha256;
        cfg.gitfs_remotes = vec![crate::remote::RemoteSpec {
            uri: format!("file://{}", upstream.display()),
            mountpoint: None,
            root: None,
            extra: Default::default(),
        }];
        let records = crate::repo::init(&cfg);
        for record in &records {
            let mut remote = record.repo.find_remote("origin").unwrap();
            remote
                .fetch(&["+refs/heads/*:refs/remotes/origin/*"], None, None)
                .unwrap();
        }
        (cfg, records)
    }

    #[test]
    fn file_hash_matches_direct_sha256_and_is_cached() {
        let td = tempfile::tempdir().unwrap();
        let (cfg, records) = setup(&td);
        let fnd = crate::cache::find_file(&cfg, &records, "hello.sls", "base");

        let result = file_hash(&cfg, &fnd, "base");
        let mut hasher = Sha256::new();
        hasher.update(b"hello: world\n");
        let expected = format!("{:x}", hasher.finalize());
        assert_eq!(result.hsum, expected);
        assert_eq!(result.hash_type, "sha256");

        let sidecar = cfg.hash_dir("main").join("hello.sls.hash.sha256");
        assert!(sidecar.is_file());
        assert_eq!(fs::read_to_string(sidecar).unwrap(), expected);
    }

    #[test]
    fn file_hash_on_empty_fnd_is_empty() {
        let td = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let fnd = FindFileResult::default();
        let result = file_hash(&cfg, &fnd, "base");
        assert!(result.hsum.is_empty());
    }
}
