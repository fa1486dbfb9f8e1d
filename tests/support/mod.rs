#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command as AssertCommand;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub fn git(args: &[&str], cwd: &Path) {
    let status = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed in {}", args, cwd.display());
}

pub fn path_to_file_url(p: &Path) -> String {
    format!("file://{}", p.to_string_lossy())
}

/// A bare upstream repo plus a scratch working dir used to push new commits
/// into it during a test.
pub struct UpstreamRepo {
    pub bare: PathBuf,
    work: PathBuf,
}

impl UpstreamRepo {
    pub fn file_url(&self) -> String {
        path_to_file_url(&self.bare)
    }

    pub fn commit_file(&self, rel: &str, contents: &str, message: &str) {
        let target = self.work.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&target, contents).unwrap();
        git(&["add", "."], &self.work);
        git(&["commit", "-q", "-m", message], &self.work);
        git(&["push", "-q", "origin", "main"], &self.work);
    }

    pub fn branch_from_main(&self, name: &str) {
        git(&["checkout", "-q", "-b", name], &self.work);
        git(&["push", "-q", "-u", "origin", name], &self.work);
        git(&["checkout", "-q", "main"], &self.work);
    }
}

/// Drives the `gitfs` binary against an isolated cache dir and config file,
/// with a helper upstream repo it can fetch from.
pub struct GitFsFixture {
    _tmp: TempDir,
    pub cache_dir: PathBuf,
    pub config_path: PathBuf,
    sources_dir: PathBuf,
}

impl GitFsFixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let cache_dir = tmp.path().join("cache");
        let config_path = tmp.path().join("gitfs.toml");
        let sources_dir = tmp.path().join("sources");
        fs::create_dir_all(&cache_dir).unwrap();
        fs::create_dir_all(&sources_dir).unwrap();
        Self {
            _tmp: tmp,
            cache_dir,
            config_path,
            sources_dir,
        }
    }

    pub fn create_upstream(&self, name: &str) -> UpstreamRepo {
        let bare = self.sources_dir.join(format!("{name}.git"));
        fs::create_dir_all(&bare).unwrap();
        git(&["init", "-q", "--bare", "-b", "main"], &bare);

        let work = self.sources_dir.join(format!("{name}-work"));
        fs::create_dir_all(&work).unwrap();
        git(&["init", "-q", "-b", "main"], &work);
        git(&["remote", "add", "origin", bare.to_str().unwrap()], &work);
        git(&["config", "user.email", "test@example.com"], &work);
        git(&["config", "user.name", "Test User"], &work);
        git(&["config", "commit.gpgSign", "false"], &work);

        fs::write(work.join("README.md"), "hello\n").unwrap();
        git(&["add", "."], &work);
        git(&["commit", "-q", "-m", "init"], &work);
        git(&["push", "-q", "-u", "origin", "main"], &work);

        UpstreamRepo { bare, work }
    }

    pub fn gitfs_cmd(&self) -> AssertCommand {
        let mut cmd = cargo_bin_cmd!("gitfs");
        cmd.env("GITFS_CACHE_DIR", &self.cache_dir)
            .arg("--config")
            .arg(&self.config_path);
        cmd
    }

    pub fn remote_add(&self, uri: &str) {
        self.gitfs_cmd()
            .args(["remote", "add", uri])
            .assert()
            .success();
    }

    pub fn update(&self) {
        self.gitfs_cmd().arg("update").assert().success();
    }
}
