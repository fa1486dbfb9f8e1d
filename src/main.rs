use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::io::IsTerminal;

use gitfs::backend::{FileHashLoad, FileListLoad, GitFsBackend};
use gitfs::cli::{Cli, Commands, RemoteCmd};
use gitfs::config::Config;
use gitfs::{lock, remote, repo};

fn main() -> Result<()> {
    gitfs::logging::init();
    let cli = Cli::parse();
    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(gitfs::config::default_config_path);

    match cli.command {
        Commands::Remote { cmd } => cmd_remote(&config_path, cmd),
        Commands::Update => cmd_update(&config_path),
        Commands::Envs { ignore_cache } => cmd_envs(&config_path, ignore_cache),
        Commands::FindFile { path, saltenv } => cmd_find_file(&config_path, &path, &saltenv),
        Commands::FileList { saltenv } => cmd_file_list(&config_path, &saltenv),
        Commands::DirList { saltenv } => cmd_dir_list(&config_path, &saltenv),
        Commands::Hash { path, saltenv } => cmd_hash(&config_path, &path, &saltenv),
        Commands::Doctor => cmd_doctor(&config_path),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    }
}

fn load_backend(config_path: &std::path::Path) -> Result<GitFsBackend> {
    let cfg = Config::load_or_default(config_path)?;
    let mut backend = GitFsBackend::new(cfg);
    backend.init();
    Ok(backend)
}

fn cmd_remote(config_path: &std::path::Path, cmd: RemoteCmd) -> Result<()> {
    let mut cfg = Config::load_or_default(config_path)?;
    match cmd {
        RemoteCmd::Add { uri, mountpoint, root } => {
            cfg.gitfs_remotes.push(remote::RemoteSpec {
                uri: uri.clone(),
                mountpoint,
                root,
                extra: Default::default(),
            });
            cfg.save(config_path)?;
            println!("added remote {uri}");
        }
        RemoteCmd::List => {
            for spec in &cfg.gitfs_remotes {
                println!("{}", spec.uri);
            }
        }
    }
    Ok(())
}

fn cmd_update(config_path: &std::path::Path) -> Result<()> {
    let cfg = Config::load_or_default(config_path)?;
    let mut backend = GitFsBackend::new(cfg);
    let report = backend.update();
    if report.changed {
        println!("{}", "gitfs caches updated".green());
    } else {
        println!("no changes");
    }
    Ok(())
}

fn cmd_envs(config_path: &std::path::Path, ignore_cache: bool) -> Result<()> {
    let backend = load_backend(config_path)?;
    for env in backend.envs(ignore_cache) {
        println!("{env}");
    }
    Ok(())
}

fn cmd_find_file(config_path: &std::path::Path, path: &str, saltenv: &str) -> Result<()> {
    let backend = load_backend(config_path)?;
    let fnd = backend.find_file(path, saltenv);
    if fnd.path.is_empty() {
        anyhow::bail!("not found: {path} (saltenv={saltenv})");
    }
    println!("{}", fnd.path);
    Ok(())
}

fn cmd_file_list(config_path: &std::path::Path, saltenv: &str) -> Result<()> {
    let backend = load_backend(config_path)?;
    for f in backend.file_list(FileListLoad { saltenv: saltenv.to_string() }) {
        println!("{f}");
    }
    Ok(())
}

fn cmd_dir_list(config_path: &std::path::Path, saltenv: &str) -> Result<()> {
    let backend = load_backend(config_path)?;
    for d in backend.dir_list(FileListLoad { saltenv: saltenv.to_string() }) {
        println!("{d}");
    }
    Ok(())
}

fn cmd_hash(config_path: &std::path::Path, path: &str, saltenv: &str) -> Result<()> {
    let backend = load_backend(config_path)?;
    let fnd = backend.find_file(path, saltenv);
    if fnd.path.is_empty() {
        anyhow::bail!("not found: {path} (saltenv={saltenv})");
    }
    let hashed = backend.file_hash(FileHashLoad { saltenv: saltenv.to_string() }, &fnd);
    println!("{}  {}:{}", hashed.hsum, hashed.hash_type, path);
    Ok(())
}

fn cmd_doctor(config_path: &std::path::Path) -> Result<()> {
    let cfg = Config::load_or_default(config_path)?;
    let records = repo::init(&cfg);
    let stdout_is_tty = std::io::stdout().is_terminal();

    let mut problems = 0;
    for record in &records {
        let lock_path = record.cache_dir.join("update.lk");
        if lock_path.exists() && lock::is_stale(&lock_path, cfg.update_lock_ttl) {
            problems += 1;
            println!(
                "{} stale update.lk in {}",
                label("warn", stdout_is_tty),
                record.cache_dir.display()
            );
            lock::remove_best_effort(&lock_path);
        }
    }

    let purged = repo::purge_cache(&cfg);
    if purged {
        problems += 1;
        println!("{} purged orphaned remote cache dirs", label("warn", stdout_is_tty));
    }

    if problems == 0 {
        println!("{}", label("ok", stdout_is_tty));
    }
    Ok(())
}

fn label(word: &str, colorize: bool) -> String {
    if !colorize {
        return word.to_string();
    }
    match word {
        "ok" => word.green().to_string(),
        "warn" => word.yellow().to_string(),
        _ => word.to_string(),
    }
}
