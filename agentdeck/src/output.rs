//! Text rendering for command output.

use agentdeck_core::{AssignOutcome, Change, EffectiveSettings, LineDiff, Resource, System};
use std::path::Path;

/// Replace the home directory prefix with `~`.
pub fn shorten_path(path: &Path) -> String {
    if let Ok(home) = std::env::var("HOME") {
        if let Ok(suffix) = path.strip_prefix(&home) {
            return format!("~/{}", suffix.display());
        }
    }
    path.display().to_string()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// One line per resource, grouped by type.
pub fn print_resources(resources: &[Resource]) {
    let mut sorted: Vec<&Resource> = resources.iter().collect();
    sorted.sort_by(|a, b| {
        a.resource_type()
            .cmp(&b.resource_type())
            .then_with(|| a.qualified_name().cmp(&b.qualified_name()))
            .then_with(|| a.file_path.cmp(&b.file_path))
    });

    let mut current = None;
    for resource in sorted {
        if current != Some(resource.resource_type()) {
            current = Some(resource.resource_type());
            println!("\n{}:", resource.resource_type());
        }

        let mut flags = Vec::new();
        if let Some(system) = &resource.system {
            flags.push(system.name.clone());
        }
        if !resource.is_editable {
            flags.push("read-only".to_string());
        }
        if resource.tracking.is_modified {
            flags.push(format!("v{}", resource.tracking.resource_version));
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };

        println!(
            "  {:<28} {:<8} {}{}",
            truncate(&resource.qualified_name(), 28),
            resource.scope,
            shorten_path(&resource.file_path),
            flags
        );
        if !resource.description.is_empty() {
            println!("      {}", truncate(&resource.description, 72));
        }
    }
}

pub fn print_systems(systems: &[System]) {
    if systems.is_empty() {
        println!("No systems detected.");
        return;
    }
    for system in systems {
        let counts: Vec<String> = system
            .counts
            .iter()
            .map(|(t, n)| format!("{} {}", n, t))
            .collect();
        println!(
            "{:<20} {:<10} {:<10} {}",
            system.name,
            system.version.as_deref().unwrap_or("-"),
            system.health,
            counts.join(", ")
        );
    }
}

pub fn print_settings(settings: &EffectiveSettings) -> serde_json::Result<()> {
    println!("Layers:");
    for source in &settings.sources {
        let state = match (source.exists, source.applied) {
            (false, _) => "missing",
            (true, true) => "applied",
            (true, false) => "skipped",
        };
        println!(
            "  {:<8} {:<8} {}",
            source.layer,
            state,
            shorten_path(&source.path)
        );
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&settings.value)?);
    for warning in &settings.warnings {
        eprintln!("Warning: {}", warning);
    }
    Ok(())
}

pub fn print_outcome(outcome: &AssignOutcome) {
    println!(
        "{} -> {}",
        outcome.operation,
        shorten_path(&outcome.destination)
    );
    if let Some(backup) = &outcome.backup {
        println!("  backup: {}", shorten_path(backup));
    }
    for warning in &outcome.warnings {
        eprintln!("Warning: {}", warning);
    }
}

pub fn print_changes(changes: &[Change]) {
    if changes.is_empty() {
        println!("No changes recorded.");
        return;
    }
    for change in changes {
        println!(
            "{}  {:<8} {}  {}",
            change.timestamp.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"),
            change.change_type,
            change.id,
            change.reason
        );
    }
}

pub fn print_diff(diff: &LineDiff) {
    if diff.is_empty() {
        println!("No differences.");
        return;
    }
    for (line, text) in &diff.removed {
        println!("-{:>5} {}", line, text);
    }
    for (line, text) in &diff.added {
        println!("+{:>5} {}", line, text);
    }
    for (line, before, after) in &diff.modified {
        println!("~{:>5} {}", line, before);
        println!("       {}", after);
    }
}
