//! Ambient CLI front-end: exposes the backend's operations as subcommands
//! rather than RPC calls, since there's no master process here to host
//! an RPC layer.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gitfs", version, about = "Git-backed file server core")]
pub struct Cli {
    /// Path to gitfs.toml. Defaults to the platform config dir.
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a remote and attach (or create) its cache working dir.
    Remote {
        #[command(subcommand)]
        cmd: RemoteCmd,
    },
    /// Fetch every configured remote and rebuild the env cache if changed.
    Update,
    /// List exposed environment names.
    Envs {
        #[arg(long)]
        ignore_cache: bool,
    },
    /// Locate and materialize a path in an environment.
    FindFile {
        path: String,
        #[arg(long, default_value = "base")]
        saltenv: String,
    },
    /// List every file reachable in an environment.
    FileList {
        #[arg(long, default_value = "base")]
        saltenv: String,
    },
    /// List every directory reachable in an environment.
    DirList {
        #[arg(long, default_value = "base")]
        saltenv: String,
    },
    /// Print a file's configured-algorithm hash.
    Hash {
        path: String,
        #[arg(long, default_value = "base")]
        saltenv: String,
    },
    /// Report on cache health: orphaned dirs, stale locks, missing remotes.
    Doctor,
    /// Print shell completions for the given shell.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum RemoteCmd {
    Add {
        uri: String,
        #[arg(long)]
        mountpoint: Option<String>,
        #[arg(long)]
        root: Option<String>,
    },
    List,
}
