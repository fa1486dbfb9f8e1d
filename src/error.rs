//! Error taxonomy for the gitfs core.
//!
//! Per the component design, no public [`crate::backend::GitFsBackend`]
//! operation propagates one of these across the API boundary: every public
//! operation logs the error and returns a well-formed empty value instead.
//! `GitFsError` exists so internal helpers can communicate *why* an
//! operation came up empty to the facade, which decides how to log it.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GitFsError {
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, GitFsError>;

pub(crate) trait IoContext<T> {
    fn io_ctx(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_ctx(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| GitFsError::Io {
            path: path.into(),
            source,
        })
    }
}
