//! Shelver CLI: import a folder of documents into a SQLite catalog.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kdam::BarExt;
use serde::Deserialize;

use shelver::catalog::SystemClock;
use shelver::catalog::sqlite::SqliteCatalog;
use shelver::utils::setup_logging;
use shelver::{ImportOpts, ImportProgressEvent, ImportStatus, PerfProfile};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Low,
    Normal,
    High,
}

impl From<ProfileArg> for PerfProfile {
    fn from(p: ProfileArg) -> Self {
        match p {
            ProfileArg::Low => PerfProfile::Low,
            ProfileArg::Normal => PerfProfile::Normal,
            ProfileArg::High => PerfProfile::High,
        }
    }
}

/// Import a folder into a document catalog; duplicates are skipped by content hash.
#[derive(Parser)]
#[command(name = "shelver")]
#[command(about = "Import a folder into a document catalog; duplicates are skipped by content hash.")]
struct Cli {
    /// Folder to import.
    dir: PathBuf,

    /// Catalog database path.
    #[arg(short, long, default_value = "shelver.db")]
    catalog: PathBuf,

    /// File name pattern, e.g. "*.pdf".
    #[arg(short, long)]
    pattern: Option<String>,

    /// Do not descend into subfolders.
    #[arg(long)]
    no_recursive: bool,

    /// Author recorded on imported documents.
    #[arg(long)]
    author: Option<String>,

    /// Mark imported documents read-only in the catalog.
    #[arg(long)]
    read_only: bool,

    /// Skip files larger than this many bytes.
    #[arg(long)]
    max_size: Option<u64>,

    /// Performance profile for concurrency/buffer defaults.
    #[arg(long, value_enum, default_value_t = ProfileArg::Normal)]
    profile: ProfileArg,

    /// Print the aggregate result as JSON instead of a summary.
    #[arg(long)]
    json: bool,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ImportSection {
    pattern: Option<String>,
    author: Option<String>,
    recursive: Option<bool>,
    read_only: Option<bool>,
    max_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ShelverToml {
    #[serde(default)]
    import: ImportSection,
}

/// Load `shelver.toml` from the import folder if present. Explicit CLI flags
/// always win; the file only fills fields the user left unset.
fn load_shelver_toml(dir: &Path) -> Option<ShelverToml> {
    let path = dir.join("shelver.toml");
    let s = std::fs::read_to_string(&path).ok()?;
    toml::from_str(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

fn build_opts(cli: &Cli) -> ImportOpts {
    let mut opts = ImportOpts {
        pattern: cli.pattern.clone(),
        recursive: cli.no_recursive.then_some(false),
        default_author: cli.author.clone(),
        set_read_only: cli.read_only.then_some(true),
        max_file_size: cli.max_size,
        profile: cli.profile.into(),
        ..ImportOpts::default()
    };
    if let Some(file) = load_shelver_toml(&cli.dir) {
        let section = file.import;
        if opts.pattern.is_none() {
            opts.pattern = section.pattern;
        }
        if opts.default_author.is_none() {
            opts.default_author = section.author;
        }
        if opts.recursive.is_none() {
            opts.recursive = section.recursive;
        }
        if opts.set_read_only.is_none() {
            opts.set_read_only = section.read_only;
        }
        if opts.max_file_size.is_none() {
            opts.max_file_size = section.max_size;
        }
    }
    opts
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    let opts = build_opts(&cli);

    let catalog = Arc::new(SqliteCatalog::open(&cli.catalog)?);
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_handler = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        cancel_handler.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;

    let stream = shelver::import_dir(
        &cli.dir,
        &opts,
        catalog,
        Arc::new(SystemClock),
        Some(cancel),
    );

    let mut bar = None;
    let mut outcome = None;
    for event in stream {
        match event {
            ImportProgressEvent::BatchStarted { total, .. } => {
                if !cli.json {
                    bar = Some(kdam::tqdm!(total = total, desc = "Importing"));
                }
            }
            ImportProgressEvent::Progress { processed, .. } => {
                if let Some(b) = bar.as_mut() {
                    let _ = b.update_to(processed);
                }
            }
            ImportProgressEvent::BatchCompleted { result, .. } => outcome = Some(result),
            _ => {}
        }
    }
    drop(bar);

    let result = outcome.context("import stream ended without a result")?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!(
            "{:?}: {} of {} processed ({} imported, {} skipped, {} failed)",
            result.status,
            result.processed,
            result.total,
            result.succeeded,
            result.skipped,
            result.failed
        );
        for error in &result.errors {
            eprintln!("  {error}");
            if let Some(hint) = &error.suggestion {
                eprintln!("    hint: {hint}");
            }
        }
    }

    match result.status {
        ImportStatus::Success | ImportStatus::PartialSuccess => Ok(()),
        ImportStatus::Failure | ImportStatus::FatalError => std::process::exit(1),
    }
}
