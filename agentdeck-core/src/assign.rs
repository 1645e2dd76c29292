//! Copying and moving resources between scopes
//!
//! Assignment places a resource's file into the user's `.claude` directory or
//! into a project's. The sequence for one call is:
//!
//! 1. Validate everything up front; a failure leaves the disk untouched.
//! 2. Back up an existing destination to `<file>.<timestamp>.bak`.
//! 3. Write the source bytes (creating directories as needed).
//! 4. For a move, delete the source.
//!
//! Settings files are never deleted by a move: a settings move behaves as a
//! copy and says so in the outcome's warnings. Hooks that live inside a
//! settings file are assigned by appending their matcher entry to the
//! destination settings file.
//!
//! Concurrent calls writing the same destination are not serialized.

use crate::changes::{ChangeTracker, NewChange};
use crate::error::{Result, ValidationError, WriteError};
use crate::layout::{resource_key, Layout, BACKUP_SUFFIX};
use crate::parse::frontmatter;
use crate::types::{
    Change, HookMatcher, HookSource, HookSpec, Resource, ResourceId, ResourceKind, Scope,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Copy or move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Copy,
    Move,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Copy => "copy",
            Operation::Move => "move",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that went sideways in an assignment that still succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignWarning {
    /// Move wrote the destination but could not delete the source
    SourceNotRemoved { path: PathBuf, message: String },
    /// Settings are shared; a move keeps the source
    SettingsMoveKeptSource { path: PathBuf },
    /// Existing destination could not be backed up before the overwrite
    BackupFailed { path: PathBuf, message: String },
    /// Destination settings already contain an identical hook entry
    HookAlreadyPresent { path: PathBuf },
}

impl std::fmt::Display for AssignWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignWarning::SourceNotRemoved { path, message } => {
                write!(f, "source {} was not removed: {}", path.display(), message)
            }
            AssignWarning::SettingsMoveKeptSource { path } => write!(
                f,
                "settings are copied, not moved; {} was kept",
                path.display()
            ),
            AssignWarning::BackupFailed { path, message } => {
                write!(f, "could not back up {}: {}", path.display(), message)
            }
            AssignWarning::HookAlreadyPresent { path } => {
                write!(f, "identical hook already present in {}", path.display())
            }
        }
    }
}

/// Result of a successful assignment.
#[derive(Debug, Clone, Serialize)]
pub struct AssignOutcome {
    pub operation: Operation,
    pub destination: PathBuf,
    /// Backup of the overwritten destination, if one was made
    pub backup: Option<PathBuf>,
    pub warnings: Vec<AssignWarning>,
    /// Changes recorded by the attached tracker
    #[serde(skip)]
    pub changes: Vec<Change>,
}

/// Validates and performs assignments.
#[derive(Debug, Clone)]
pub struct AssignmentEngine {
    layout: Layout,
    tracker: Option<ChangeTracker>,
}

impl AssignmentEngine {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            tracker: None,
        }
    }

    /// Record every write in this tracker.
    pub fn with_tracker(mut self, tracker: ChangeTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Copy or move `resource` into `scope`.
    pub fn assign(
        &self,
        resource: &Resource,
        scope: Scope,
        project: Option<&Path>,
        operation: Operation,
    ) -> Result<AssignOutcome> {
        let reason = match project {
            Some(p) if scope == Scope::Project => {
                format!("{} to project {}", operation, p.display())
            }
            _ => format!("{} to {} scope", operation, scope),
        };
        self.assign_with_reason(resource, scope, project, operation, &reason)
    }

    /// [`Self::assign`] with an explicit reason for the change log.
    pub fn assign_with_reason(
        &self,
        resource: &Resource,
        scope: Scope,
        project: Option<&Path>,
        operation: Operation,
        reason: &str,
    ) -> Result<AssignOutcome> {
        let destination = self.validate(resource, scope, project, operation)?;

        let outcome = match &resource.kind {
            ResourceKind::Hook(spec) if matches!(spec.source, HookSource::Settings { .. }) => {
                self.append_hook(resource, spec, destination, operation, reason)?
            }
            _ => self.copy_file(resource, destination, operation, reason)?,
        };

        tracing::info!(
            id = %resource.id,
            operation = %operation,
            destination = %outcome.destination.display(),
            warnings = outcome.warnings.len(),
            "Assigned resource"
        );
        Ok(outcome)
    }

    /// Check a request without touching the disk. Returns the destination.
    pub fn validate(
        &self,
        resource: &Resource,
        scope: Scope,
        project: Option<&Path>,
        operation: Operation,
    ) -> std::result::Result<PathBuf, ValidationError> {
        let settings_hook = matches!(
            &resource.kind,
            ResourceKind::Hook(HookSpec {
                source: HookSource::Settings { .. },
                ..
            })
        );

        match &resource.kind {
            ResourceKind::Agent(_) | ResourceKind::Command(_) => {
                check_name(&resource.name)?;
            }
            ResourceKind::Hook(_) if !settings_hook => check_name(&resource.name)?,
            _ => {}
        }

        if let Some(ns) = self
            .layout
            .classify(&resource.file_path)
            .and_then(|loc| loc.namespace)
            .or_else(|| resource.namespace().map(str::to_string))
        {
            if ns.split('/').any(|seg| !is_valid_name(seg)) {
                return Err(ValidationError::InvalidNamespace(ns));
            }
        }

        match &resource.kind {
            ResourceKind::Agent(_) | ResourceKind::Command(_) | ResourceKind::ProjectMarker(_) => {
                if body_is_empty(resource) {
                    return Err(ValidationError::EmptyContent(resource.id.to_string()));
                }
            }
            ResourceKind::Settings(_) => {
                let valid = std::fs::read(&resource.file_path)
                    .ok()
                    .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
                    .map(|v| v.is_object())
                    .unwrap_or(false);
                if !valid {
                    return Err(ValidationError::InvalidSettings(resource.id.to_string()));
                }
            }
            ResourceKind::Hook(_) => {}
        }

        let destination = self.layout.destination(resource, scope, project)?;

        let source = match &resource.kind {
            ResourceKind::Hook(HookSpec {
                source: HookSource::Settings { settings_path, .. },
                ..
            }) => settings_path.clone(),
            _ => resource.file_path.clone(),
        };
        if same_file(&source, &destination) {
            return Err(ValidationError::SameLocation(destination));
        }

        if operation == Operation::Move && !resource.is_editable {
            return Err(ValidationError::NotMovable(resource.id.to_string()));
        }

        Ok(destination)
    }

    fn copy_file(
        &self,
        resource: &Resource,
        destination: PathBuf,
        operation: Operation,
        reason: &str,
    ) -> Result<AssignOutcome> {
        let bytes = std::fs::read(&resource.file_path)
            .map_err(|e| WriteError::new("read", &resource.file_path, e))?;

        let mut warnings = Vec::new();
        let before = std::fs::read(&destination)
            .ok()
            .map(|b| String::from_utf8_lossy(&b).into_owned());
        let backup = self.backup(&destination, &mut warnings);

        write_file(&destination, &bytes)?;

        let mut changes = Vec::new();
        let after = String::from_utf8_lossy(&bytes);
        if let Some(change) = self.record(NewChange {
            resource_id: &self.destination_id(&destination, resource),
            reason,
            before: before.as_deref(),
            after: &after,
            project_path: self.layout.classify(&destination).and_then(|l| l.project_path).as_deref(),
            file_path: &destination,
        }) {
            changes.push(change);
        }

        if operation == Operation::Move {
            if matches!(resource.kind, ResourceKind::Settings(_)) {
                warnings.push(AssignWarning::SettingsMoveKeptSource {
                    path: resource.file_path.clone(),
                });
            } else {
                match std::fs::remove_file(&resource.file_path) {
                    Ok(()) => {
                        if let Some(change) = self.record(NewChange {
                            resource_id: &resource.id,
                            reason,
                            before: Some(&after),
                            after: "",
                            project_path: resource.project_path.as_deref(),
                            file_path: &resource.file_path,
                        }) {
                            changes.push(change);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %resource.file_path.display(),
                            error = %e,
                            "Move wrote destination but could not remove source"
                        );
                        warnings.push(AssignWarning::SourceNotRemoved {
                            path: resource.file_path.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        Ok(AssignOutcome {
            operation,
            destination,
            backup,
            warnings,
            changes,
        })
    }

    fn append_hook(
        &self,
        resource: &Resource,
        spec: &HookSpec,
        destination: PathBuf,
        operation: Operation,
        reason: &str,
    ) -> Result<AssignOutcome> {
        let mut warnings = Vec::new();

        let before = match std::fs::read_to_string(&destination) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(WriteError::new("read", &destination, e).into()),
        };
        let mut doc: Value = match before.as_deref() {
            Some(text) if !text.trim().is_empty() => serde_json::from_str(text).map_err(|_| {
                ValidationError::InvalidSettings(destination.display().to_string())
            })?,
            _ => Value::Object(Default::default()),
        };
        if !doc.is_object() {
            return Err(ValidationError::InvalidSettings(destination.display().to_string()).into());
        }

        let entry = serde_json::to_value(HookMatcher {
            matcher: spec.matcher.clone().unwrap_or_default(),
            hooks: spec.actions.clone(),
        })?;
        let present = doc
            .get("hooks")
            .and_then(|h| h.get(&spec.event))
            .and_then(Value::as_array)
            .map(|list| list.contains(&entry))
            .unwrap_or(false);

        let mut backup = None;
        let mut changes = Vec::new();
        if present {
            warnings.push(AssignWarning::HookAlreadyPresent {
                path: destination.clone(),
            });
        } else {
            if let Value::Object(root) = &mut doc {
                insert_hook(root, &spec.event, entry);
            }
            let mut text = serde_json::to_string_pretty(&doc)?;
            text.push('\n');

            if before.is_some() {
                backup = self.backup(&destination, &mut warnings);
            }
            write_file(&destination, text.as_bytes())?;

            if let Some(change) = self.record(NewChange {
                resource_id: &self.destination_id(&destination, resource),
                reason,
                before: before.as_deref(),
                after: &text,
                project_path: self.layout.classify(&destination).and_then(|l| l.project_path).as_deref(),
                file_path: &destination,
            }) {
                changes.push(change);
            }
        }

        if operation == Operation::Move {
            warnings.push(AssignWarning::SettingsMoveKeptSource {
                path: resource.file_path.clone(),
            });
        }

        Ok(AssignOutcome {
            operation,
            destination,
            backup,
            warnings,
            changes,
        })
    }

    /// Copy an existing destination aside. Failure is reported, not fatal.
    fn backup(&self, destination: &Path, warnings: &mut Vec<AssignWarning>) -> Option<PathBuf> {
        if !destination.exists() {
            return None;
        }
        let path = backup_path(destination);
        match std::fs::copy(destination, &path) {
            Ok(_) => {
                tracing::debug!(backup = %path.display(), "Backed up destination");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(
                    path = %destination.display(),
                    error = %e,
                    "Backup failed, overwriting anyway"
                );
                warnings.push(AssignWarning::BackupFailed {
                    path: destination.to_path_buf(),
                    message: e.to_string(),
                });
                None
            }
        }
    }

    fn destination_id(&self, destination: &Path, resource: &Resource) -> ResourceId {
        self.layout
            .classify(destination)
            .map(|loc| {
                ResourceId::derive(
                    loc.resource_type,
                    loc.scope,
                    loc.project_path.as_deref(),
                    &resource_key(&loc, destination),
                )
            })
            .unwrap_or_else(|| resource.id.clone())
    }

    /// Record through the tracker; a log failure does not undo the write.
    fn record(&self, entry: NewChange<'_>) -> Option<Change> {
        let tracker = self.tracker.as_ref()?;
        match tracker.record(entry) {
            Ok(change) => Some(change),
            Err(e) => {
                tracing::error!(
                    resource_id = %entry.resource_id,
                    error = %e,
                    "Failed to record change"
                );
                None
            }
        }
    }
}

/// Write bytes to `path`, creating parent directories.
pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> std::result::Result<(), WriteError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| WriteError::new("create directory", parent, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| WriteError::new("write", path, e))
}

/// `<file>.<YYYYmmdd-HHMMSS.mmm>.bak`, made unique if taken.
pub fn backup_path(path: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
    let base = format!("{}.{}", path.display(), stamp);
    let mut candidate = PathBuf::from(format!("{}{}", base, BACKUP_SUFFIX));
    let mut n = 1;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{}-{}{}", base, n, BACKUP_SUFFIX));
        n += 1;
    }
    candidate
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        }
        _ => false,
    }
}

fn check_name(name: &str) -> std::result::Result<(), ValidationError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(name.to_string()))
    }
}

fn body_is_empty(resource: &Resource) -> bool {
    let text = match &resource.content {
        Some(body) => return body.trim().is_empty(),
        None => match std::fs::read_to_string(&resource.file_path) {
            Ok(text) => text,
            Err(_) => return true,
        },
    };
    match frontmatter::split(&text) {
        Ok((_, body)) => body.trim().is_empty(),
        Err(_) => text.trim().is_empty(),
    }
}

/// Append a matcher entry to `hooks[event]`, creating either level.
fn insert_hook(root: &mut Map<String, Value>, event: &str, entry: Value) {
    let hooks = root
        .entry("hooks")
        .or_insert_with(|| Value::Object(Map::new()));
    if !hooks.is_object() {
        *hooks = Value::Object(Map::new());
    }
    if let Value::Object(hooks) = hooks {
        match hooks
            .entry(event.to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(items) => items.push(entry),
            other => *other = Value::Array(vec![entry]),
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::MemoryChangeLog;
    use crate::error::Error;
    use crate::parse::{parse_file, settings_hooks};
    use crate::types::ChangeType;
    use std::fs;

    struct Env {
        _dir: tempfile::TempDir,
        home: PathBuf,
        project: PathBuf,
        layout: Layout,
    }

    fn env() -> Env {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let home = root.join("home");
        let project = root.join("p");
        fs::create_dir_all(home.join(".claude")).unwrap();
        fs::create_dir_all(&project).unwrap();
        Env {
            layout: Layout::new(&home),
            _dir: dir,
            home,
            project,
        }
    }

    fn write_resource(env: &Env, path: &Path, text: &str) -> Resource {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
        let location = env.layout.classify(path).unwrap();
        parse_file(path, &location).unwrap()
    }

    const REVIEWER: &str = "---\nname: reviewer\ndescription: Reviews code\n---\nReview carefully.\n";

    #[test]
    fn test_move_agent_to_project() {
        let env = env();
        let src = env.home.join(".claude/agents/reviewer.md");
        let resource = write_resource(&env, &src, REVIEWER);

        let engine = AssignmentEngine::new(env.layout.clone());
        let outcome = engine
            .assign(&resource, Scope::Project, Some(&env.project), Operation::Move)
            .unwrap();

        let dest = env.project.join(".claude/agents/reviewer.md");
        assert_eq!(outcome.destination, dest);
        assert_eq!(fs::read_to_string(&dest).unwrap(), REVIEWER);
        assert!(!src.exists());
        assert!(outcome.warnings.is_empty());
        assert!(outcome.backup.is_none());
    }

    #[test]
    fn test_copy_over_existing_makes_backup() {
        let env = env();
        let src = env.home.join(".claude/agents/reviewer.md");
        let resource = write_resource(&env, &src, REVIEWER);
        let dest = env.project.join(".claude/agents/reviewer.md");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, "old").unwrap();

        let engine = AssignmentEngine::new(env.layout.clone());
        let outcome = engine
            .assign(&resource, Scope::Project, Some(&env.project), Operation::Copy)
            .unwrap();

        let backup = outcome.backup.unwrap();
        assert_eq!(fs::read_to_string(&backup).unwrap(), "old");
        assert!(backup.to_string_lossy().ends_with(".bak"));
        assert_eq!(fs::read_to_string(&dest).unwrap(), REVIEWER);
        assert!(src.exists());

        let second = engine
            .assign(&resource, Scope::Project, Some(&env.project), Operation::Copy)
            .unwrap();
        assert_ne!(second.backup.unwrap(), backup);
    }

    #[test]
    fn test_namespaced_command_keeps_subdirectory() {
        let env = env();
        let src = env.project.join(".claude/commands/git/commit.md");
        let resource = write_resource(&env, &src, "---\ndescription: Commit\n---\nRun it.\n");

        let engine = AssignmentEngine::new(env.layout.clone());
        let outcome = engine
            .assign(&resource, Scope::User, None, Operation::Copy)
            .unwrap();
        assert_eq!(outcome.destination, env.home.join(".claude/commands/git/commit.md"));
    }

    #[test]
    fn test_validation_has_no_side_effects() {
        let env = env();
        let src = env.home.join(".claude/agents/bad.md");
        let resource = write_resource(&env, &src, "---\nname: bad name\n---\nBody\n");
        let engine = AssignmentEngine::new(env.layout.clone());

        let err = engine
            .assign(&resource, Scope::Project, Some(&env.project), Operation::Move)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::InvalidName(_))));
        assert!(src.exists());
        assert!(!env.project.join(".claude").exists());
    }

    #[test]
    fn test_empty_body_rejected() {
        let env = env();
        let src = env.home.join(".claude/agents/empty.md");
        let resource = write_resource(&env, &src, "---\nname: empty\n---\n\n");
        let engine = AssignmentEngine::new(env.layout.clone());
        assert!(matches!(
            engine.assign(&resource, Scope::Project, Some(&env.project), Operation::Copy),
            Err(Error::Validation(ValidationError::EmptyContent(_)))
        ));
    }

    #[test]
    fn test_scope_errors() {
        let env = env();
        let src = env.home.join(".claude/agents/reviewer.md");
        let resource = write_resource(&env, &src, REVIEWER);
        let engine = AssignmentEngine::new(env.layout.clone());

        assert!(matches!(
            engine.assign(&resource, Scope::Project, None, Operation::Copy),
            Err(Error::Validation(ValidationError::MissingProject))
        ));
        assert!(matches!(
            engine.assign(&resource, Scope::Project, Some(Path::new("relative")), Operation::Copy),
            Err(Error::Validation(ValidationError::InvalidProject(_)))
        ));
        assert!(matches!(
            engine.assign(&resource, Scope::Builtin, None, Operation::Copy),
            Err(Error::Validation(ValidationError::BuiltinTarget))
        ));
        assert!(matches!(
            engine.assign(&resource, Scope::User, None, Operation::Copy),
            Err(Error::Validation(ValidationError::SameLocation(_)))
        ));
    }

    #[test]
    fn test_move_non_editable_refused() {
        let env = env();
        let src = env.home.join(".claude/agents/reviewer.md");
        let mut resource = write_resource(&env, &src, REVIEWER);
        resource.is_editable = false;
        let engine = AssignmentEngine::new(env.layout.clone());
        assert!(matches!(
            engine.assign(&resource, Scope::Project, Some(&env.project), Operation::Move),
            Err(Error::Validation(ValidationError::NotMovable(_)))
        ));
        assert!(engine
            .assign(&resource, Scope::Project, Some(&env.project), Operation::Copy)
            .is_ok());
    }

    #[test]
    fn test_second_move_fails() {
        let env = env();
        let src = env.home.join(".claude/agents/reviewer.md");
        let resource = write_resource(&env, &src, REVIEWER);
        let engine = AssignmentEngine::new(env.layout.clone());
        engine
            .assign(&resource, Scope::Project, Some(&env.project), Operation::Move)
            .unwrap();
        assert!(engine
            .assign(&resource, Scope::Project, Some(&env.project), Operation::Move)
            .is_err());
    }

    #[test]
    fn test_settings_move_keeps_source() {
        let env = env();
        let src = env.home.join(".claude/settings.json");
        let resource = write_resource(&env, &src, r#"{"model":"opus"}"#);
        let engine = AssignmentEngine::new(env.layout.clone());

        let outcome = engine
            .assign(&resource, Scope::Project, Some(&env.project), Operation::Move)
            .unwrap();
        assert!(src.exists());
        assert_eq!(outcome.destination, env.project.join(".claude/settings.json"));
        assert!(matches!(
            outcome.warnings.as_slice(),
            [AssignWarning::SettingsMoveKeptSource { .. }]
        ));
    }

    #[test]
    fn test_settings_hook_appended_once() {
        let env = env();
        let src = env.home.join(".claude/settings.json");
        let settings = write_resource(
            &env,
            &src,
            r#"{"hooks":{"Stop":[{"matcher":"","hooks":[{"type":"command","command":"say done"}]}]}}"#,
        );
        let hook = settings_hooks(&settings).remove(0);
        let engine = AssignmentEngine::new(env.layout.clone());

        let dest = env.project.join(".claude/settings.json");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, r#"{"model":"opus"}"#).unwrap();

        let outcome = engine
            .assign(&hook, Scope::Project, Some(&env.project), Operation::Copy)
            .unwrap();
        assert!(outcome.backup.is_some());
        let doc: Value = serde_json::from_str(&fs::read_to_string(&dest).unwrap()).unwrap();
        assert_eq!(doc["model"], "opus");
        assert_eq!(doc["hooks"]["Stop"].as_array().unwrap().len(), 1);
        assert_eq!(doc["hooks"]["Stop"][0]["hooks"][0]["command"], "say done");

        let again = engine
            .assign(&hook, Scope::Project, Some(&env.project), Operation::Copy)
            .unwrap();
        assert!(matches!(
            again.warnings.as_slice(),
            [AssignWarning::HookAlreadyPresent { .. }]
        ));
        let doc: Value = serde_json::from_str(&fs::read_to_string(&dest).unwrap()).unwrap();
        assert_eq!(doc["hooks"]["Stop"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_tracker_records_move() {
        let env = env();
        let src = env.home.join(".claude/agents/reviewer.md");
        let resource = write_resource(&env, &src, REVIEWER);
        let tracker = ChangeTracker::new(MemoryChangeLog::new());
        let engine = AssignmentEngine::new(env.layout.clone()).with_tracker(tracker.clone());

        let outcome = engine
            .assign(&resource, Scope::Project, Some(&env.project), Operation::Move)
            .unwrap();
        let types: Vec<ChangeType> = outcome.changes.iter().map(|c| c.change_type).collect();
        assert_eq!(types, vec![ChangeType::Create, ChangeType::Delete]);
        assert_eq!(tracker.history(&resource.id).unwrap().len(), 1);
    }

    /// Make `dir` read-only. Returns false when the process can still
    /// create files there (running as root).
    #[cfg(unix)]
    fn lock_dir(dir: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o555)).unwrap();
        let check = dir.join(".write-check");
        if fs::write(&check, "").is_ok() {
            fs::remove_file(&check).unwrap();
            unlock_dir(dir);
            return false;
        }
        true
    }

    #[cfg(unix)]
    fn unlock_dir(dir: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_move_reports_source_not_removed() {
        let env = env();
        let src = env.home.join(".claude/agents/reviewer.md");
        let resource = write_resource(&env, &src, REVIEWER);
        let agents = src.parent().unwrap();
        if !lock_dir(agents) {
            return;
        }

        let tracker = ChangeTracker::new(MemoryChangeLog::new());
        let engine = AssignmentEngine::new(env.layout.clone()).with_tracker(tracker.clone());
        let outcome = engine.assign(&resource, Scope::Project, Some(&env.project), Operation::Move);
        unlock_dir(agents);
        let outcome = outcome.unwrap();

        let dest = env.project.join(".claude/agents/reviewer.md");
        assert_eq!(fs::read_to_string(&dest).unwrap(), REVIEWER);
        assert!(src.exists());
        assert!(matches!(
            outcome.warnings.as_slice(),
            [AssignWarning::SourceNotRemoved { .. }]
        ));
        assert!(tracker.history(&resource.id).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_backup_failure_does_not_block_write() {
        let env = env();
        let src = env.home.join(".claude/agents/reviewer.md");
        let resource = write_resource(&env, &src, REVIEWER);
        let dest = env.project.join(".claude/agents/reviewer.md");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, "old").unwrap();
        let dest_dir = dest.parent().unwrap();
        if !lock_dir(dest_dir) {
            return;
        }

        let engine = AssignmentEngine::new(env.layout.clone());
        let outcome = engine.assign(&resource, Scope::Project, Some(&env.project), Operation::Copy);
        unlock_dir(dest_dir);
        let outcome = outcome.unwrap();

        assert!(outcome.backup.is_none());
        assert!(matches!(
            outcome.warnings.as_slice(),
            [AssignWarning::BackupFailed { .. }]
        ));
        assert_eq!(fs::read_to_string(&dest).unwrap(), REVIEWER);
    }

    #[test]
    fn test_name_pattern() {
        assert!(is_valid_name("code-reviewer"));
        assert!(is_valid_name("a.b_c"));
        assert!(!is_valid_name("-lead"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name(""));
    }
}
