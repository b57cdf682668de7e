//! git-branch-archiver - back up every branch of a repository
//!
//! Clones the repository into a temporary workspace and writes one folder,
//! one `.zip` and one `.tar` per branch (and per tag with `--include-tags`)
//! into the output directory.

mod summary;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use archiver_core::{
    ArchiveOptions, Archiver, CliOverrides, Config, EXIT_FATAL, EXIT_INTERRUPTED,
};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Export every branch of a git repository as folder, zip and tar
#[derive(Parser, Debug)]
#[command(name = "git-branch-archiver")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Repository to archive: local path or clone URL
    #[arg(short, long, value_name = "PATH_OR_URL")]
    repo: String,

    /// Output directory root
    #[arg(short, long, value_name = "DIR")]
    out: PathBuf,

    /// Also export tags
    #[arg(long)]
    include_tags: bool,

    /// Keep the temporary clone after the run
    #[arg(long)]
    keep_temp: bool,

    /// Parent directory for the temporary clone (defaults to the system temp dir)
    #[arg(long, value_name = "DIR", env = "GIT_ARCHIVER_TMP")]
    tmp: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Path to git executable (overrides config and env)
    #[arg(long, value_name = "PATH", env = "GIT_ARCHIVER_GIT")]
    git: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not write the run manifest
    #[arg(long)]
    no_manifest: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            git_path: self.git.clone(),
            tmp_dir: self.tmp.clone(),
            keep_temp: self.keep_temp,
            include_tags: self.include_tags,
            no_manifest: self.no_manifest,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "warn,archiver_core=info,git_branch_archiver=info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbose))
        .with(filter)
        .init();
}

/// How long an interrupted run waits for the pipeline thread before cleanup
const INTERRUPT_GRACE: Duration = Duration::from_secs(2);

/// Resolve on Ctrl-C or, on unix, SIGTERM, with the signal's name
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "Ctrl-C")
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load_with_overrides(cli.config.as_deref(), cli.overrides())?;

    tracing::info!(
        git = %config.git.path,
        tmp_dir = ?config.workspace.tmp_dir,
        include_tags = config.output.include_tags,
        keep_temp = config.workspace.keep_temp,
        "Configuration loaded"
    );

    let archiver = Archiver::new(ArchiveOptions::from_config(&cli.repo, &cli.out, &config));

    // the guard stays here so an interrupt can release it while git is still running
    let workspace = archiver.create_workspace()?;
    let workspace_path = workspace.path().to_path_buf();

    let mut task = {
        let archiver = archiver.clone();
        tokio::task::spawn_blocking(move || archiver.run_in(&workspace_path))
    };

    tokio::select! {
        joined = &mut task => {
            let result = joined.context("Archive task panicked");
            let kept = workspace.close();

            let mut report = result??;
            report.kept_workspace = kept;

            summary::print(&report, cli.verbose);
            Ok(exit_code(report.exit_code()))
        }
        Ok(signal) = shutdown_signal() => {
            tracing::warn!(signal, "Interrupted, removing temporary workspace");

            // a git child sharing our process group got the signal too; give
            // the pipeline a moment to notice before its workspace goes away
            if tokio::time::timeout(INTERRUPT_GRACE, &mut task).await.is_err() {
                tracing::warn!("Archive task still running, removing workspace anyway");
            }
            if let Err(e) = tokio::task::spawn_blocking(move || workspace.abandon()).await {
                tracing::warn!("Workspace cleanup did not finish: {}", e);
            }
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code(EXIT_FATAL)
        }
    }
}
