//! agentdeck - discover, classify and redistribute assistant configuration
//!
//! Finds agents, slash commands, hooks, `CLAUDE.md` markers and settings
//! files under the user's home and project directories, groups them into
//! installed systems, and copies or moves them between user and project scope.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Change log: $XDG_DATA_HOME/agentdeck/changes.db (~/.local/share/agentdeck/changes.db)
//! - Logs: $XDG_STATE_HOME/agentdeck/agentdeck.log.<date> (~/.local/state/agentdeck/)
//! - Config: $XDG_CONFIG_HOME/agentdeck/config.toml (~/.config/agentdeck/config.toml)

mod output;

use agentdeck_core::{
    diff, ArrayStrategy, AssignmentEngine, CancelToken, ChangeTracker, Config, Database, Discovery,
    DiscoveryReport, Operation, Resource, ResourceId, Scope, SettingsMerger, SystemDetector,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "agentdeck")]
#[command(about = "Discover and redistribute Claude agents, commands, hooks and settings")]
#[command(version)]
struct Args {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List discovered resources
    Scan {
        /// Root to scan (repeatable; defaults to home plus configured roots)
        #[arg(long = "root")]
        roots: Vec<PathBuf>,

        /// Maximum directory depth below each root
        #[arg(long)]
        max_depth: Option<usize>,

        /// Only show this resource type (agent, command, hook, project_marker, settings)
        #[arg(short = 't', long = "type")]
        resource_type: Option<String>,

        /// Also print scan and parse warnings
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show installed systems and their health
    Systems {
        /// Root to scan (repeatable)
        #[arg(long = "root")]
        roots: Vec<PathBuf>,

        /// Maximum directory depth below each root
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Show the effective settings for a project
    Settings {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Array merge strategy: replace, concat or unique
        #[arg(long)]
        strategy: Option<ArrayStrategy>,
    },

    /// Copy or move a resource into user or project scope
    Assign {
        /// Resource file path or id
        resource: String,

        /// Target scope: user or project
        #[arg(short, long)]
        scope: Scope,

        /// Target project directory (project scope)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Remove the source after a successful write
        #[arg(long = "move")]
        move_source: bool,

        /// Reason stored in the change log
        #[arg(long)]
        reason: Option<String>,
    },

    /// Show recorded changes for a resource
    History {
        /// Resource file path or id
        resource: String,
    },

    /// Restore the content a change replaced
    Revert {
        /// Resource file path or id
        resource: String,

        /// Change id from `history`
        change: String,
    },

    /// Show the line diff of a recorded change
    Diff {
        /// Resource file path or id
        resource: String,

        /// Change id from `history`
        change: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        agentdeck_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("agentdeck starting");

    match args.command {
        Command::Scan {
            roots,
            max_depth,
            resource_type,
            warnings,
        } => {
            if let Some(depth) = max_depth {
                config.scan.max_depth = depth;
            }
            config.validate().context("invalid configuration")?;
            run_scan(&config, roots, resource_type.as_deref(), warnings, args.json)
        }
        Command::Systems { roots, max_depth } => {
            if let Some(depth) = max_depth {
                config.scan.max_depth = depth;
            }
            config.validate().context("invalid configuration")?;
            run_systems(&config, roots, args.json)
        }
        Command::Settings { project, strategy } => {
            run_settings(&config, &project, strategy, args.json)
        }
        Command::Assign {
            resource,
            scope,
            project,
            move_source,
            reason,
        } => {
            let operation = if move_source {
                Operation::Move
            } else {
                Operation::Copy
            };
            run_assign(
                &config,
                &resource,
                scope,
                project.as_deref(),
                operation,
                reason.as_deref(),
                args.json,
            )
        }
        Command::History { resource } => run_history(&config, &resource, args.json),
        Command::Revert { resource, change } => run_revert(&config, &resource, &change, args.json),
        Command::Diff { resource, change } => run_diff(&config, &resource, &change, args.json),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}

fn open_tracker() -> Result<ChangeTracker> {
    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening change log");
    let db = Database::open(&db_path).context("failed to open change log")?;
    db.migrate().context("failed to run database migrations")?;
    Ok(ChangeTracker::new(db))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("cannot resolve {}", path.display()))
}

/// Scan with a spinner; Ctrl+C stops the walk and keeps what was found.
fn discover(config: &Config, roots: Vec<PathBuf>) -> Result<DiscoveryReport> {
    let discovery = Discovery::from_config(config);
    let roots = if roots.is_empty() {
        discovery.default_roots(config)
    } else {
        roots
            .iter()
            .map(|r| absolute(r))
            .collect::<Result<Vec<_>>>()?
    };

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling scan...");
        handler_token.cancel();
    })
    .context("failed to set Ctrl+C handler")?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let mut report = discovery.scan_with_progress(&roots, &cancel, |count, path| {
        pb.set_message(format!("{} files  {}", count, output::shorten_path(path)));
    });
    pb.finish_and_clear();

    if cancel.is_cancelled() {
        eprintln!("Scan cancelled; showing partial results.");
    }

    let detector = SystemDetector::from_config(&config.systems).context("failed to load system rules")?;
    detector.classify(&mut report.resources);

    Ok(report)
}

fn run_scan(
    config: &Config,
    roots: Vec<PathBuf>,
    resource_type: Option<&str>,
    show_warnings: bool,
    json: bool,
) -> Result<()> {
    let mut report = discover(config, roots)?;

    match open_tracker().and_then(|t| t.overlay(&mut report.resources).map_err(Into::into)) {
        Ok(()) => {}
        Err(e) => tracing::warn!(error = %e, "Change overlay unavailable"),
    }

    if let Some(filter) = resource_type {
        report
            .resources
            .retain(|r| r.resource_type().as_str() == filter);
    }

    if json {
        return print_json(&report.resources);
    }

    println!(
        "Discovered {} resource(s), {} warning(s)",
        report.resources.len(),
        report.warnings.len()
    );
    output::print_resources(&report.resources);

    if show_warnings && !report.warnings.is_empty() {
        println!();
        for warning in &report.warnings {
            println!("Warning: {}", warning);
        }
    }
    Ok(())
}

fn run_systems(config: &Config, roots: Vec<PathBuf>, json: bool) -> Result<()> {
    let report = discover(config, roots)?;
    let detector = SystemDetector::from_config(&config.systems).context("failed to load system rules")?;
    let systems = detector.systems(&report.resources);

    if json {
        return print_json(&systems);
    }
    output::print_systems(&systems);
    Ok(())
}

fn run_settings(
    config: &Config,
    project: &Path,
    strategy: Option<ArrayStrategy>,
    json: bool,
) -> Result<()> {
    let project = absolute(project)?;
    let discovery = Discovery::from_config(config);
    let merger = SettingsMerger::new(
        discovery.layout().clone(),
        strategy.unwrap_or(config.merge.array_strategy),
    );
    let effective = merger.effective_settings(&project);

    if json {
        return print_json(&effective.value);
    }
    output::print_settings(&effective).context("failed to render settings")?;
    Ok(())
}

/// A path argument is parsed directly; anything else is looked up by id.
fn resolve_resource(config: &Config, arg: &str) -> Result<Resource> {
    let path = Path::new(arg);
    if path.exists() {
        let path = absolute(path)?;
        let discovery = Discovery::from_config(config);
        let mut resource = match discovery.load(&path) {
            Some(parsed) => parsed.with_context(|| format!("failed to parse {}", path.display()))?,
            None => bail!("{} is not a recognized resource file", path.display()),
        };
        let detector =
            SystemDetector::from_config(&config.systems).context("failed to load system rules")?;
        detector.classify(std::slice::from_mut(&mut resource));
        return Ok(resource);
    }

    let report = discover(config, Vec::new())?;
    report
        .resources
        .into_iter()
        .find(|r| r.id.as_str() == arg)
        .with_context(|| format!("no resource found with id '{}'", arg))
}

/// Resource id for history lookups, without scanning when given an id.
fn resolve_id(config: &Config, arg: &str) -> Result<ResourceId> {
    if Path::new(arg).exists() {
        Ok(resolve_resource(config, arg)?.id)
    } else {
        Ok(ResourceId::from(arg))
    }
}

fn run_assign(
    config: &Config,
    resource: &str,
    scope: Scope,
    project: Option<&Path>,
    operation: Operation,
    reason: Option<&str>,
    json: bool,
) -> Result<()> {
    let resource = resolve_resource(config, resource)?;
    let project = project.map(absolute).transpose()?;

    let discovery = Discovery::from_config(config);
    let engine = AssignmentEngine::new(discovery.layout().clone()).with_tracker(open_tracker()?);
    let outcome = match reason {
        Some(reason) => {
            engine.assign_with_reason(&resource, scope, project.as_deref(), operation, reason)
        }
        None => engine.assign(&resource, scope, project.as_deref(), operation),
    }
    .with_context(|| format!("failed to {} {}", operation, resource.id))?;

    if json {
        return print_json(&outcome);
    }
    output::print_outcome(&outcome);
    Ok(())
}

fn run_history(config: &Config, resource: &str, json: bool) -> Result<()> {
    let id = resolve_id(config, resource)?;
    let changes = open_tracker()?
        .history(&id)
        .context("failed to read history")?;

    if json {
        return print_json(&changes);
    }
    output::print_changes(&changes);
    Ok(())
}

fn run_revert(config: &Config, resource: &str, change: &str, json: bool) -> Result<()> {
    let id = resolve_id(config, resource)?;
    let restored = open_tracker()?
        .revert(&id, change)
        .with_context(|| format!("failed to revert {}", change))?;

    if json {
        return print_json(&restored);
    }
    println!(
        "Restored {} (change {})",
        output::shorten_path(&restored.file_path),
        restored.id
    );
    Ok(())
}

fn run_diff(config: &Config, resource: &str, change: &str, json: bool) -> Result<()> {
    let id = resolve_id(config, resource)?;
    let entry = open_tracker()?
        .history(&id)
        .context("failed to read history")?
        .into_iter()
        .find(|c| c.id == change)
        .with_context(|| format!("change {} not found for {}", change, id))?;

    let lines = diff(
        entry.before_content.as_deref().unwrap_or(""),
        &entry.after_content,
    );
    if json {
        return print_json(&lines);
    }
    output::print_diff(&lines);
    Ok(())
}
