//! # filewarden CLI
//!
//! Command-line front end for the filewarden library.
//!
//! ## Usage
//! ```bash
//! # Back up a file or a whole directory
//! filewarden --file /etc/ssh --backup
//!
//! # Refuse to replace existing backups
//! filewarden --file /etc/hosts --backup --overwrite false
//!
//! # Restore every tracked file that went missing or drifted
//! filewarden --verify
//!
//! # Only reconcile files under one directory
//! filewarden --verify --file /etc/ssh
//!
//! # Delete anything new that appears in a directory
//! filewarden --watch /etc/cron.d
//! ```

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use colored::*;
use filewarden::config::{WardenConfig, DEFAULT_HOME};
use filewarden::utils::format_bytes;
use filewarden::{BackupReport, ReconcileReport, Warden};
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// filewarden - keep protected files exactly as they were backed up
#[derive(Parser)]
#[command(name = "filewarden")]
#[command(version)]
#[command(about = "Back up protected files and revert any unauthorized change")]
#[command(long_about = None)]
struct Cli {
    /// File or directory to back up or verify
    #[arg(short, long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Back up --file
    #[arg(short, long)]
    backup: bool,

    /// Reconcile tracked files (all of them, or those under --file)
    #[arg(long)]
    verify: bool,

    /// Replace existing backups
    #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    overwrite: bool,

    /// Delete every new entry created in this directory until terminated
    #[arg(short, long, value_name = "DIR")]
    watch: Option<PathBuf>,

    /// Show index statistics
    #[arg(short, long)]
    status: bool,

    /// Home directory holding the index, backups and logs
    #[arg(long, env = "FILEWARDEN_HOME", default_value = DEFAULT_HOME)]
    home: PathBuf,

    /// Also log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Run the requested actions; `Ok(false)` means some path failed
fn run(cli: Cli) -> Result<bool> {
    if !(cli.backup || cli.verify || cli.status || cli.watch.is_some()) {
        bail!("nothing to do: pass --backup, --verify, --watch or --status (see --help)");
    }
    if cli.backup && cli.file.is_none() {
        bail!("--backup requires --file");
    }

    let config = WardenConfig::load_or_default(&cli.home)
        .with_context(|| format!("loading configuration from {}", cli.home.display()))?;
    init_logging(&config, cli.verbose)?;

    let warden = Warden::open(config)
        .with_context(|| format!("opening filewarden home {}", cli.home.display()))?;

    let mut success = true;

    if cli.backup {
        if let Some(path) = &cli.file {
            success &= cmd_backup(&warden, path, cli.overwrite)?;
        }
    }

    if cli.verify {
        success &= cmd_verify(&warden, cli.file.as_deref())?;
    }

    if cli.status {
        cmd_status(&warden)?;
    }

    if let Some(dir) = &cli.watch {
        cmd_watch(&warden, dir)?;
    }

    Ok(success)
}

/// Log to `<log_dir>/filewarden.log`, plus stderr when verbose
fn init_logging(config: &WardenConfig, verbose: bool) -> Result<()> {
    fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("creating log directory {}", config.log_dir.display()))?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_file())
        .with_context(|| format!("opening log file {}", config.log_file().display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .with_filter(filter);

    let stderr_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(LevelFilter::DEBUG)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;
    Ok(())
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Back up a file or directory
fn cmd_backup(warden: &Warden, path: &Path, overwrite: bool) -> Result<bool> {
    println!(
        "{} {}",
        "Backing up".blue().bold(),
        path.display().to_string().cyan()
    );

    let report = match warden.backup(path, overwrite) {
        Ok(report) => report,
        Err(e) => bail!(e.user_message()),
    };
    print_backup_report(&report);
    Ok(!report.has_failures())
}

fn print_backup_report(report: &BackupReport) {
    println!(
        "{} Backed up {} files",
        "✓".green().bold(),
        report.files_backed_up().to_string().cyan()
    );
    println!("  New: {}", report.created.len().to_string().cyan());
    println!("  Replaced: {}", report.overwritten.len().to_string().cyan());
    if !report.skipped.is_empty() {
        println!(
            "  Skipped (empty or unreadable): {}",
            report.skipped.len().to_string().dimmed()
        );
    }
    println!(
        "  Time: {}",
        format_duration(Duration::from_millis(report.duration_ms))
            .to_string()
            .cyan()
    );

    if !report.metadata_failures.is_empty() {
        println!("\n{}", "Backups written but not indexed:".yellow().bold());
        for (path, error) in &report.metadata_failures {
            println!("  ⚠ {}: {}", path.display(), error.yellow());
        }
    }

    if report.has_failures() {
        println!("\n{}", "Failed:".red().bold());
        for (path, error) in &report.failures {
            println!("  ✗ {}: {}", path.display(), error.red());
        }
    }
}

/// Reconcile tracked files
fn cmd_verify(warden: &Warden, scope: Option<&Path>) -> Result<bool> {
    let pb = spinner("Verifying tracked files...")?;
    let result = match scope {
        Some(path) => warden.reconcile_path(path),
        None => warden.reconcile(),
    };
    pb.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => bail!(e.user_message()),
    };
    print_reconcile_report(&report);
    Ok(!report.has_failures())
}

fn print_reconcile_report(report: &ReconcileReport) {
    if report.has_drift() {
        println!(
            "{} Restored {} of {} files",
            "⚠".yellow().bold(),
            report.files_restored().to_string().yellow().bold(),
            report.files_checked
        );
    } else {
        println!(
            "{} All {} tracked files intact",
            "✓".green().bold(),
            report.files_checked.to_string().cyan()
        );
    }

    for path in &report.missing {
        println!("  {} {}", "missing ".yellow(), path.display());
    }
    for path in &report.modified {
        println!("  {} {}", "modified".yellow(), path.display());
    }
    if report.changes_logged > 0 {
        println!("  Changes logged: {}", report.changes_logged.to_string().cyan());
    }
    println!(
        "  Time: {}",
        format_duration(Duration::from_millis(report.duration_ms))
            .to_string()
            .cyan()
    );

    if report.cancelled {
        println!("{}", "Verification was stopped early".yellow());
    }

    if report.has_failures() {
        println!("\n{}", "Failed:".red().bold());
        for (path, error) in &report.failures {
            println!("  ✗ {}: {}", path.display(), error.red());
        }
    }
}

/// Show index and storage statistics
fn cmd_status(warden: &Warden) -> Result<()> {
    let stats = warden.stats()?;
    let config = warden.config();

    let (artifact_count, artifact_bytes) = fs::read_dir(&config.backup_dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.metadata().ok())
        .filter(|metadata| metadata.is_file())
        .fold((0usize, 0u64), |(count, bytes), metadata| {
            (count + 1, bytes + metadata.len())
        });

    println!("{}", "filewarden status:".blue().bold());
    println!("  Home: {}", config.home_dir.display().to_string().cyan());
    println!("  Tracked files: {}", stats.tracked_files.to_string().cyan());
    println!(
        "  Change log entries: {}",
        stats.change_log_entries.to_string().cyan()
    );
    println!(
        "  Backups: {} in {} artifacts",
        format_bytes(artifact_bytes).cyan(),
        artifact_count
    );

    let tracked = warden.tracked_files()?;
    if !tracked.is_empty() {
        println!("\n{}", "Tracked files:".bold());
        for record in &tracked {
            println!(
                "  {} {}",
                record.filepath.display(),
                format!("(backed up {})", record.last_backup_time).dimmed()
            );
        }
    }
    Ok(())
}

/// Guard a directory in the foreground
fn cmd_watch(warden: &Warden, dir: &Path) -> Result<()> {
    let mut guard = warden
        .watch_guard(dir)
        .with_context(|| format!("watching {}", dir.display()))?;

    println!(
        "{} {} {}",
        "Guarding".blue().bold(),
        guard.root().display().to_string().cyan(),
        "(terminate the process to stop)".dimmed()
    );

    let purged = guard.run()?;
    println!("{} Removed {} new entries", "✓".green().bold(), purged);
    Ok(())
}
