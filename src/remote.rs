//! Remote configuration: parsing, scheme validation, and per-remote
//! override merging.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::error;

/// Schemes this backend is willing to clone from, kept as an explicit
/// policy check even though `git2`'s native transports support a broader
/// set (see DESIGN.md).
pub const ALLOWED_SCHEMES: &[&str] = &["http", "https", "file"];

/// A single configured remote, as given by the operator. `mountpoint` and
/// `root` are `None` when not overridden for this remote; the effective
/// value is resolved against [`crate::config::Config`]'s process-wide
/// defaults by [`RemoteSpec::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSpec {
    pub uri: String,
    #[serde(default)]
    pub mountpoint: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
    /// Per-remote keys this crate doesn't recognize. Logged and ignored.
    #[serde(flatten, default)]
    pub extra: HashMap<String, toml::Value>,
}

/// The resolved form of a [`RemoteSpec`] after merging process-wide
/// defaults and validating its URI scheme.
#[derive(Debug, Clone)]
pub struct ResolvedRemote {
    pub uri: String,
    pub mountpoint: String,
    pub root: Option<String>,
    pub hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteConfigError {
    #[error("invalid gitfs remote '{0}': missing or unsupported scheme")]
    UnsupportedScheme(String),
}

impl RemoteSpec {
    /// Merge this remote's overrides with the process-wide defaults,
    /// validate its URI scheme, and compute its stable content-addressed
    /// hash. Unknown per-remote keys are logged and dropped.
    pub fn resolve(
        &self,
        default_mountpoint: Option<&str>,
        default_root: Option<&str>,
    ) -> Result<ResolvedRemote, RemoteConfigError> {
        for key in self.extra.keys() {
            error!(remote = %self.uri, key = %key, "invalid per-remote configuration parameter, ignoring");
        }

        validate_scheme(&self.uri)?;

        let mountpoint = strip_proto(
            self.mountpoint
                .as_deref()
                .or(default_mountpoint)
                .unwrap_or(""),
        );
        let root = self.root.clone().or_else(|| default_root.map(String::from));

        Ok(ResolvedRemote {
            uri: self.uri.clone(),
            mountpoint,
            root,
            hash: hash_uri(&self.uri),
        })
    }
}

/// `salt.utils.strip_proto`: drop a leading `scheme://` if one is present,
/// so mountpoints configured as e.g. `file:///srv/salt` behave as
/// `/srv/salt`, and the path used for prefix matching in `find_file` never
/// contains transport-scheme noise.
pub fn strip_proto(value: &str) -> String {
    match value.split_once("://") {
        Some((_scheme, rest)) => rest.to_string(),
        None => value.to_string(),
    }
}

fn validate_scheme(uri: &str) -> Result<(), RemoteConfigError> {
    match uri.split_once("://") {
        Some((scheme, _)) if ALLOWED_SCHEMES.contains(&scheme.to_lowercase().as_str()) => Ok(()),
        _ => Err(RemoteConfigError::UnsupportedScheme(uri.to_string())),
    }
}

/// `hash = hex(md5(uri))`, the key used to name each remote's cache dir.
pub fn hash_uri(uri: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(uri.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn cache_dir_for(base: &std::path::Path, uri: &str) -> PathBuf {
    base.join(hash_uri(uri))
}
