//! Ref & Env Resolver: union refs across remotes into exposed environment
//! names.

use std::collections::BTreeSet;

use tracing::error;

use crate::config::Config;
use crate::repo::RemoteRecord;

/// `check_whitelist_blacklist`: an environment is exposed iff it matches
/// the whitelist (or the whitelist is empty) and does not match the
/// blacklist. Patterns are glob-style.
pub fn check_whitelist_blacklist(env: &str, whitelist: &[String], blacklist: &[String]) -> bool {
    let matches_any = |patterns: &[String]| {
        patterns.iter().any(|pat| {
            glob::Pattern::new(pat)
                .map(|p| p.matches(env))
                .unwrap_or(false)
        })
    };
    if !whitelist.is_empty() && !matches_any(whitelist) {
        return false;
    }
    if matches_any(blacklist) {
        return false;
    }
    true
}

/// Replace `/` with `_` so a ref like `feature/x` becomes the environment
/// name `feature_x`.
pub fn sanitize(name: &str) -> String {
    name.replace('/', "_")
}

/// Enumerate every exposed environment name across a single repo's
/// refs, without consulting or writing the serialized env cache. Branches
/// are returned ahead of tags so the caller's insertion order enforces the
/// branch-before-tag tie-break.
pub fn repo_envs(repo: &git2::Repository, cfg: &Config) -> (Vec<String>, Vec<String>) {
    let mut branches = Vec::new();
    if let Ok(refs) = repo.references_glob("refs/remotes/origin/*") {
        for reference in refs.flatten() {
            let Some(name) = reference.name() else {
                continue;
            };
            let Some(stripped) = name.strip_prefix("refs/remotes/origin/") else {
                continue;
            };
            if stripped == "HEAD" {
                continue;
            }
            let mut rspec = sanitize(stripped);
            if rspec == cfg.gitfs_base {
                rspec = "base".to_string();
            }
            if check_whitelist_blacklist(&rspec, &cfg.gitfs_env_whitelist, &cfg.gitfs_env_blacklist) {
                branches.push(rspec);
            }
        }
    }

    let mut tags = Vec::new();
    if let Ok(refs) = repo.references_glob("refs/tags/*") {
        for reference in refs.flatten() {
            let Some(name) = reference.name() else {
                continue;
            };
            let Some(stripped) = name.strip_prefix("refs/tags/") else {
                continue;
            };
            let rspec = sanitize(stripped);
            if check_whitelist_blacklist(&rspec, &cfg.gitfs_env_whitelist, &cfg.gitfs_env_blacklist) {
                tags.push(rspec);
            }
        }
    }

    (branches, tags)
}

/// Return the sorted set of exposed environment names across all remotes.
/// Stale remote-tracking refs are never observed here because the update
/// loop deletes them from the local ref store as soon as they're detected;
/// by the time `envs` runs there is nothing left to filter (see
/// DESIGN.md).
pub fn envs(cfg: &Config, records: &[RemoteRecord], ignore_cache: bool) -> Vec<String> {
    if !ignore_cache {
        if let Some(cached) = crate::env_cache::read_if_fresh(cfg) {
            return cached;
        }
    }

    if cfg.gitfs_provider != "git2" {
        error!(provider = %cfg.gitfs_provider, "unexpected gitfs_provider, this is probably a bug");
        return Vec::new();
    }

    let mut ret: BTreeSet<String> = BTreeSet::new();
    for record in records {
        let (branches, tags) = repo_envs(&record.repo, cfg);
        for b in branches {
            ret.insert(b);
        }
        for t in tags {
            // Branch wins on collision: only insert the tag name if no
            // branch already claimed it.
            if !ret.contains(&t) {
                ret.insert(t);
            }
        }
    }
    ret.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_empty_allows_everything_not_blacklisted() {
        assert!(check_whitelist_blacklist("main", &[], &[]));
        assert!(!check_whitelist_blacklist(
            "main",
            &[],
            &["main".to_string()]
        ));
    }

    #[test]
    fn whitelist_restricts_to_matching_patterns() {
        let whitelist = vec!["release-*".to_string()];
        assert!(check_whitelist_blacklist("release-1.0", &whitelist, &[]));
        assert!(!check_whitelist_blacklist("feature-x", &whitelist, &[]));
    }

    #[test]
    fn sanitize_replaces_slashes() {
        assert_eq!(sanitize("feature/foo/bar"), "feature_foo_bar");
    }
}
