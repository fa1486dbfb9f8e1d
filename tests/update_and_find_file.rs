#[path = "support/mod.rs"]
mod support;

use support::GitFsFixture;

#[test]
fn update_then_find_file_materializes_content() {
    let fx = GitFsFixture::new();
    let upstream = fx.create_upstream("repo1");
    fx.remote_add(&upstream.file_url());
    fx.update();

    fx.gitfs_cmd()
        .args(["find-file", "README.md", "--saltenv", "base"])
        .assert()
        .success();

    fx.gitfs_cmd()
        .args(["file-list", "--saltenv", "base"])
        .assert()
        .success()
        .stdout(predicates::str::contains("README.md"));
}

#[test]
fn second_update_with_no_changes_reports_no_changes() {
    let fx = GitFsFixture::new();
    let upstream = fx.create_upstream("repo1");
    fx.remote_add(&upstream.file_url());
    fx.update();

    fx.gitfs_cmd()
        .arg("update")
        .assert()
        .success()
        .stdout(predicates::str::contains("no changes"));
}

#[test]
fn hash_command_prints_configured_algorithm() {
    let fx = GitFsFixture::new();
    let upstream = fx.create_upstream("repo1");
    fx.remote_add(&upstream.file_url());
    fx.update();

    fx.gitfs_cmd()
        .args(["hash", "README.md", "--saltenv", "base"])
        .assert()
        .success()
        .stdout(predicates::str::contains("sha256:README.md"));
}
