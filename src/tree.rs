//! Tree Resolver: map `(repo, environment-or-SHA)` to a tree handle, and
//! walk sub-paths within a tree.

use git2::{ErrorClass, ErrorCode, Repository, Tree};
use tracing::{debug, warn};

use crate::config::Config;
use crate::refs;

/// Resolve `short` (an environment name or abbreviated commit SHA) to a
/// tree in `repo`. Non-exposed names never resolve, even when they happen
/// to be valid refs or commits.
pub fn resolve_tree<'repo>(repo: &'repo Repository, short: &str, cfg: &Config) -> Option<Tree<'repo>> {
    if let Some(tree) = resolve_by_env_name(repo, short, cfg) {
        return Some(tree);
    }

    if !refs::check_whitelist_blacklist(short, &cfg.gitfs_env_whitelist, &cfg.gitfs_env_blacklist) {
        return None;
    }
    if !looks_hex(short) {
        return None;
    }

    resolve_by_commitish(repo, short)
}

/// Step 1: walk refs in deterministic heads-before-tags order, matching
/// the sanitized name, and return the tip commit's tree.
fn resolve_by_env_name<'repo>(repo: &'repo Repository, short: &str, cfg: &Config) -> Option<Tree<'repo>> {
    let (branches, tags) = refs::repo_envs(repo, cfg);
    if !branches.iter().any(|b| b == short) && !tags.iter().any(|t| t == short) {
        return None;
    }

    if let Ok(mut it) = repo.references_glob("refs/remotes/origin/*") {
        while let Some(Ok(reference)) = it.next() {
            let Some(name) = reference.name() else { continue };
            let Some(stripped) = name.strip_prefix("refs/remotes/origin/") else { continue };
            if stripped == "HEAD" {
                continue;
            }
            let mut rspec = refs::sanitize(stripped);
            if rspec == cfg.gitfs_base {
                rspec = "base".to_string();
            }
            if rspec == short {
                if let Ok(commit) = reference.peel_to_commit() {
                    return commit.tree().ok();
                }
            }
        }
    }

    if let Ok(mut it) = repo.references_glob("refs/tags/*") {
        while let Some(Ok(reference)) = it.next() {
            let Some(name) = reference.name() else { continue };
            let Some(stripped) = name.strip_prefix("refs/tags/") else { continue };
            let rspec = refs::sanitize(stripped);
            if rspec == short {
                if let Ok(commit) = reference.peel_to_commit() {
                    return commit.tree().ok();
                }
            }
        }
    }

    None
}

/// Step 2: attempt to resolve `short` as a (possibly abbreviated) commit
/// id. `git2`/libgit2 resolve abbreviated ids natively; an ambiguous
/// prefix surfaces as `ErrorCode::Ambiguous`, which we log distinctly
/// from a genuine not-found (see DESIGN.md, both return `None`).
fn resolve_by_commitish<'repo>(repo: &'repo Repository, short: &str) -> Option<Tree<'repo>> {
    match repo.revparse_single(short) {
        Ok(obj) => match obj.peel_to_commit() {
            Ok(commit) => commit.tree().ok(),
            Err(_) => None,
        },
        Err(err) if err.code() == ErrorCode::Ambiguous => {
            warn!(short, "ambiguous abbreviated id matches multiple commits");
            None
        }
        Err(err) if err.class() == ErrorClass::Reference || err.code() == ErrorCode::NotFound => {
            debug!(short, "no ref or commit found for id");
            None
        }
        Err(err) => {
            debug!(short, %err, "unable to resolve id");
            None
        }
    }
}

fn looks_hex(short: &str) -> bool {
    !short.is_empty() && short.chars().all(|c| c.is_ascii_hexdigit())
}

/// Descend `tree` segment-by-segment through `path`. An empty path
/// returns the tree unchanged; a missing segment or a segment that is not
/// itself a tree returns `None`.
pub fn walk_subpath<'repo>(repo: &'repo Repository, tree: &Tree<'repo>, path: &str) -> Option<Tree<'repo>> {
    if path.is_empty() || path == "." {
        return git2_tree_clone(repo, tree);
    }
    let mut current = git2_tree_clone(repo, tree)?;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let entry_id = current.get_name(segment)?.id();
        let obj = repo.find_object(entry_id, None).ok()?;
        current = obj.into_tree().ok()?;
    }
    Some(current)
}

fn git2_tree_clone<'repo>(repo: &'repo Repository, tree: &Tree<'repo>) -> Option<Tree<'repo>> {
    repo.find_tree(tree.id()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn init_repo_with_commit(dir: &std::path::Path) {
        let run = |args: &[&str]| {
            assert!(Command::new("git").args(args).current_dir(dir).status().unwrap().success());
        };
        run(&["init", "-q", "-b", "main"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "test"]);
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join("sub/a.txt"), b"hello").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "init"]);
    }

    #[test]
    fn walk_subpath_descends_and_rejects_missing_segments() {
        let td = tempfile::tempdir().unwrap();
        init_repo_with_commit(td.path());
        let repo = Repository::open(td.path()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        let tree = head.tree().unwrap();

        let sub = walk_subpath(&repo, &tree, "sub").unwrap();
        assert!(sub.get_name("a.txt").is_some());

        assert!(walk_subpath(&repo, &tree, "nope").is_none());
        assert!(walk_subpath(&repo, &tree, "").is_some());
    }

    #[test]
    fn looks_hex_rejects_non_hex() {
        assert!(looks_hex("deadbeef"));
        assert!(!looks_hex("not-hex!"));
        assert!(!looks_hex(""));
    }
}
