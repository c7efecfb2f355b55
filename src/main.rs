//! todosync - keep TODO comments synchronized with a task tracker.
//!
//! The CLI is the host environment: it supplies document text, file
//! identifiers, and the configuration bundle to the sync engine on each
//! invocation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::warn;

use todosync::config::Config;
use todosync::extract::{ExtractOptions, Extractor, Task};
use todosync::provider::{resolve_provider, KNOWN_PROVIDERS};
use todosync::reconcile::{diff, ReconcileSummary, Reconciler};
use todosync::store::TaskStore;
use todosync::walker::Walker;
use todosync::SyncError;

#[derive(Parser)]
#[command(name = "todosync")]
#[command(version = "0.1.0")]
#[command(about = "Keep TODO comments synchronized with a task tracker", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file to .todosync/config.json
    Init,

    /// Extract and print tasks without touching the tracker
    Scan {
        /// File or directory to scan (defaults to the whole project)
        path: Option<PathBuf>,

        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a reconciliation pass against the configured tracker
    Sync {
        /// File or directory to sync (defaults to the whole project)
        path: Option<PathBuf>,

        /// Print the would-be operations without calling the tracker
        #[arg(long)]
        dry_run: bool,

        /// Mark this invocation as save-triggered; honors auto_scan_on_save
        #[arg(long, hide = true)]
        from_save: bool,
    },

    /// Show stored task entries grouped by file
    Status {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// List known tracker backends
    Providers,

    /// Validate the active backend's configuration
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "todosync=debug,info"
    } else {
        "todosync=info,warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    if !project_path.exists() {
        eprintln!(
            "{} Project directory does not exist: {}",
            "Error:".red().bold(),
            project_path.display()
        );
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Init => cmd_init(&project_path),
        Commands::Scan { path, json } => cmd_scan(&project_path, path, json),
        Commands::Sync {
            path,
            dry_run,
            from_save,
        } => cmd_sync(&project_path, path, dry_run, from_save).await,
        Commands::Status { json } => cmd_status(&project_path, json),
        Commands::Providers => cmd_providers(&project_path),
        Commands::Validate => cmd_validate(&project_path).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<SyncError>() {
            Some(sync_err) => {
                eprintln!("{} {sync_err}", "Error:".red().bold());
                std::process::exit(sync_err.exit_code());
            }
            None => {
                eprintln!("{} {e:#}", "Error:".red().bold());
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_init(project: &Path) -> anyhow::Result<()> {
    let config_path = Config::config_path(project);
    if config_path.exists() {
        println!(
            "{} Config already exists at {}",
            "Skipped:".yellow().bold(),
            config_path.display()
        );
        return Ok(());
    }

    Config::default().save(project)?;
    println!(
        "{} Wrote default config to {}",
        "Done:".green().bold(),
        config_path.display()
    );
    println!("Set `provider` and `provider_settings` to connect a tracker.");
    Ok(())
}

fn cmd_scan(project: &Path, path: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let config = Config::load(project)?;
    let files = gather_files(project, path, &config)?;

    let extractor = Extractor::new(extract_options(&config))?;
    let mut all_tasks = Vec::new();
    for file in &files {
        all_tasks.extend(scan_file(&extractor, project, file));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&all_tasks)?);
        return Ok(());
    }

    if all_tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }
    for task in &all_tasks {
        println!(
            "{}:{} {} {}",
            task.file.display().to_string().cyan(),
            task.line,
            format!("[{}]", task.tag).yellow(),
            task.title
        );
    }
    println!("\n{} task(s) in {} file(s)", all_tasks.len(), files.len());
    Ok(())
}

async fn cmd_sync(
    project: &Path,
    path: Option<PathBuf>,
    dry_run: bool,
    from_save: bool,
) -> anyhow::Result<()> {
    let config = Config::load(project)?;

    if from_save && !config.auto_scan_on_save {
        println!(
            "{} auto_scan_on_save is disabled; skipping save-triggered sync",
            "Skipped:".yellow().bold()
        );
        return Ok(());
    }

    let files = gather_files(project, path, &config)?;
    let extractor = Extractor::new(extract_options(&config))?;

    if dry_run {
        let store = TaskStore::open(&config.state_dir(project))?;
        let mut additions = 0usize;
        let mut removals = 0usize;
        for file in &files {
            let tasks = scan_file(&extractor, project, file);
            let rel = relative_id(project, file);
            let delta = diff(&rel, &tasks, &store);
            for task in &delta.additions {
                println!(
                    "{} {}:{} {}",
                    "+".green().bold(),
                    rel.display(),
                    task.line,
                    task.title
                );
                additions += 1;
            }
            for entry in &delta.removals {
                println!("{} {} ({})", "-".red().bold(), rel.display(), entry.item_id);
                removals += 1;
            }
        }
        println!("\nDry run: {additions} to create, {removals} to archive");
        return Ok(());
    }

    let provider = match resolve_provider(&config) {
        Ok(p) => p,
        Err(e) if e.is_not_configured() => {
            println!(
                "{} no tracker configured; run `todosync init` and set `provider`",
                "Not configured:".yellow().bold()
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut store = TaskStore::open(&config.state_dir(project))?;
    let reconciler = Reconciler::new(provider, config.provider_settings.clone());
    let mut total = ReconcileSummary::default();
    for file in &files {
        let tasks = scan_file(&extractor, project, file);
        let rel = relative_id(project, file);
        let summary = reconciler.reconcile(&rel, &tasks, &mut store).await?;
        total.created += summary.created;
        total.failed_creations += summary.failed_creations;
        total.archived += summary.archived;
        total.failed_archives += summary.failed_archives;
    }

    if total.is_noop() {
        println!("{} nothing to do", "In sync:".green().bold());
    } else {
        println!(
            "{} +{} created, -{} archived",
            "Synced:".green().bold(),
            total.created,
            total.archived
        );
        if total.failed_creations > 0 {
            println!(
                "{} {} creation(s) failed and will be retried on the next sync",
                "Warning:".yellow().bold(),
                total.failed_creations
            );
        }
        if total.failed_archives > 0 {
            println!(
                "{} {} archive call(s) failed; the items may linger in the tracker",
                "Warning:".yellow().bold(),
                total.failed_archives
            );
        }
    }
    Ok(())
}

fn cmd_status(project: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(project)?;
    let store = TaskStore::open(&config.state_dir(project))?;

    if json {
        println!("{}", serde_json::to_string_pretty(store.entries())?);
        return Ok(());
    }

    if store.entries().is_empty() {
        println!("No published tasks on record.");
        return Ok(());
    }

    let mut by_file: BTreeMap<&Path, Vec<&todosync::TaskEntry>> = BTreeMap::new();
    for entry in store.entries() {
        by_file.entry(entry.file.as_path()).or_default().push(entry);
    }
    for (file, entries) in by_file {
        println!("{}", file.display().to_string().cyan().bold());
        for entry in entries {
            println!(
                "  {} {} ({})",
                entry.item_id.green(),
                &entry.hash[..12.min(entry.hash.len())],
                entry.created_at.format("%Y-%m-%d")
            );
        }
    }
    Ok(())
}

fn cmd_providers(project: &Path) -> anyhow::Result<()> {
    let config = Config::load(project)?;
    for name in KNOWN_PROVIDERS {
        if *name == config.provider {
            println!("{} {name} (active)", "*".green().bold());
        } else {
            println!("  {name}");
        }
    }
    if config.provider.is_empty() {
        println!("\nNo provider active. Set `provider` in {}", Config::config_path(project).display());
    }
    Ok(())
}

async fn cmd_validate(project: &Path) -> anyhow::Result<()> {
    let config = Config::load(project)?;
    let provider = resolve_provider(&config)?;

    provider.validate_configuration().await?;
    if provider.requires_authentication() {
        provider.authenticate().await?;
    }

    println!(
        "{} provider '{}' is configured correctly",
        "OK:".green().bold(),
        provider.identity()
    );
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn extract_options(config: &Config) -> ExtractOptions {
    ExtractOptions {
        snippet_enabled: config.snippet_extraction_enabled,
        snippet_max_lines: config.snippet_line_count,
    }
}

/// Resolve the files a command should operate on.
fn gather_files(
    project: &Path,
    path: Option<PathBuf>,
    config: &Config,
) -> anyhow::Result<Vec<PathBuf>> {
    let target = match path {
        Some(p) if p.is_absolute() => p,
        Some(p) => project.join(p),
        None => project.to_path_buf(),
    };

    if target.is_file() {
        return Ok(vec![target]);
    }
    if target.is_dir() {
        let walker = Walker::new(&config.scan)?;
        return Ok(walker.walk(&target));
    }
    anyhow::bail!("Path does not exist: {}", target.display())
}

/// Scan one file, tolerating unreadable or non-text content.
fn scan_file(extractor: &Extractor, project: &Path, file: &Path) -> Vec<Task> {
    let content = match std::fs::read_to_string(file) {
        Ok(c) => c,
        Err(e) => {
            warn!("Skipping {}: {e}", file.display());
            return Vec::new();
        }
    };
    extractor.extract(&relative_id(project, file), &content)
}

/// The stable file identifier used in hashes and stored state: the path
/// relative to the project root, so state survives the project directory
/// being moved.
fn relative_id(project: &Path, file: &Path) -> PathBuf {
    file.strip_prefix(project)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| file.to_path_buf())
}
