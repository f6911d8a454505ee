//! Print how much disk space a directory tree uses, `du`-style.
//!
//! Every directory is listed by one unit of work on a bounded pool of
//! threads.  Once the walk has finished, sizes are summed bottom-up and a
//! line is printed for every entry down to `--level` deep.

mod config;
mod core;
mod report;
mod runtime;

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core::fs::WalkConfig;
use crate::core::size::{summarize, Units};

// ───────────────────────────────────────── CLI ───────────────

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Print the disk usage of a directory tree"
)]
struct Cli {
    /// Directory to analyse (defaults to `.`).
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Tree levels to print: 0 is the root alone, 1 adds its children.
    /// A negative level prints nothing.
    #[arg(short, long, allow_negative_numbers = true)]
    level: Option<i64>,

    /// Directories listed concurrently (0 = one per core).
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Sort entries by name instead of filesystem order.
    #[arg(long, overrides_with = "no_sort")]
    sort: bool,

    /// Keep filesystem order even if the config file enables sorting.
    #[arg(long, overrides_with = "sort")]
    no_sort: bool,

    /// Use powers of 1000 (kB, MB) instead of 1024 (KiB, MiB).
    #[arg(long)]
    si: bool,

    /// Give up if the walk takes longer than this.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Write the effective settings to the config file.
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    /// Layer command-line flags over the loaded config.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(secs) = self.timeout {
            config.timeout_secs = secs;
        }
        if self.sort {
            config.sort = true;
        } else if self.no_sort {
            config.sort = false;
        }
        if self.si {
            config.units = Units::Si;
        }
    }
}

fn walk_config(config: &AppConfig) -> WalkConfig {
    WalkConfig {
        jobs: match config.jobs {
            0 => WalkConfig::default_jobs(),
            n => n,
        },
        sort_entries: config.sort,
    }
}

// ───────────────────────────────────────── main ─────────────

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load();
    cli.apply(&mut config);
    debug!(?config, "effective settings");

    if cli.save_config {
        let path = config.save()?;
        info!("saved settings to {}", path.display());
    }

    let root = cli
        .path
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", cli.path.display()))?;

    let outcome = runtime::walk(root, walk_config(&config), config.timeout()).await?;
    let summary = summarize(&outcome.root, config.level);

    let mut out = BufWriter::new(io::stdout().lock());
    report::write_report(&mut out, &summary.lines, config.units)?;
    out.flush()?;

    debug!(
        total = summary.total,
        nodes = outcome.root.node_count(),
        dirs = outcome.dirs_explored,
        errors = outcome.errors.len(),
        "report written"
    );
    Ok(())
}
