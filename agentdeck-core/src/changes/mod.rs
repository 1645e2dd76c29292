//! Change tracking
//!
//! Every content write the user asks for is recorded as an immutable
//! [`Change`]. History is read back per resource, a change can be reverted to
//! its before-content, and [`ChangeTracker::overlay`] annotates discovered
//! resources with what the log knows about them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agentdeck_core::{ChangeTracker, Config, Database};
//!
//! let db = Database::open(&Config::database_path())?;
//! db.migrate()?;
//! let tracker = ChangeTracker::new(db);
//!
//! let change = tracker.apply(&resource, "---\nname: a\n---\nNew body\n", "tighten wording")?;
//! tracker.revert(&resource.id, &change.id)?;
//! ```

mod log;

pub use log::{ChangeLog, MemoryChangeLog};

use crate::assign::write_file;
use crate::error::{Error, Result};
use crate::types::{Change, ChangeType, HookSource, Resource, ResourceId, ResourceKind};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Fields of a change about to be recorded.
#[derive(Debug, Clone, Copy)]
pub struct NewChange<'a> {
    pub resource_id: &'a ResourceId,
    pub reason: &'a str,
    pub before: Option<&'a str>,
    pub after: &'a str,
    pub project_path: Option<&'a Path>,
    pub file_path: &'a Path,
}

impl NewChange<'_> {
    /// No before → create; empty after → delete; otherwise modify.
    pub fn derived_type(&self) -> ChangeType {
        match self.before {
            None => ChangeType::Create,
            Some(_) if self.after.is_empty() => ChangeType::Delete,
            Some(_) => ChangeType::Modify,
        }
    }
}

/// Records, replays and reverts content changes.
#[derive(Clone)]
pub struct ChangeTracker {
    log: Arc<dyn ChangeLog>,
}

impl std::fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeTracker").finish_non_exhaustive()
    }
}

impl ChangeTracker {
    pub fn new(log: impl ChangeLog + 'static) -> Self {
        Self { log: Arc::new(log) }
    }

    /// Share an existing log.
    pub fn with_log(log: Arc<dyn ChangeLog>) -> Self {
        Self { log }
    }

    /// Append a change whose type is derived from its contents.
    pub fn record(&self, entry: NewChange<'_>) -> Result<Change> {
        self.record_as(entry.derived_type(), entry)
    }

    /// Append a change with an explicit type.
    pub fn record_as(&self, change_type: ChangeType, entry: NewChange<'_>) -> Result<Change> {
        let change = Change {
            id: uuid::Uuid::new_v4().to_string(),
            resource_id: entry.resource_id.clone(),
            timestamp: Utc::now(),
            reason: entry.reason.to_string(),
            change_type,
            before_content: entry.before.map(str::to_string),
            after_content: entry.after.to_string(),
            project_path: entry.project_path.map(Path::to_path_buf),
            file_path: entry.file_path.to_path_buf(),
        };
        self.log.append(&change)?;
        tracing::info!(
            resource_id = %change.resource_id,
            change_id = %change.id,
            change_type = %change.change_type,
            "Recorded change"
        );
        Ok(change)
    }

    /// Write new file content for a resource and record it.
    ///
    /// `new_content` is the full file text. Non-editable resources are refused
    /// before anything is written.
    pub fn apply(&self, resource: &Resource, new_content: &str, reason: &str) -> Result<Change> {
        if !resource.is_editable {
            return Err(Error::NotEditable(resource.id.to_string()));
        }
        if let ResourceKind::Hook(spec) = &resource.kind {
            if matches!(spec.source, HookSource::Settings { .. }) {
                return Err(Error::Unsupported(format!(
                    "hook {} is edited through its settings file",
                    resource.id
                )));
            }
        }

        let before = std::fs::read_to_string(&resource.file_path).ok();
        write_file(&resource.file_path, new_content.as_bytes())?;

        self.record(NewChange {
            resource_id: &resource.id,
            reason,
            before: before.as_deref(),
            after: new_content,
            project_path: resource.project_path.as_deref(),
            file_path: &resource.file_path,
        })
    }

    /// Changes recorded for a resource, oldest first.
    pub fn history(&self, resource_id: &ResourceId) -> Result<Vec<Change>> {
        self.log.history(resource_id)
    }

    /// Restore the content a change replaced.
    ///
    /// Writes the change's before-content back to its file and records one
    /// `restore` change.
    pub fn revert(&self, resource_id: &ResourceId, change_id: &str) -> Result<Change> {
        let change = self
            .log
            .find(resource_id, change_id)?
            .ok_or_else(|| Error::ChangeNotFound {
                resource_id: resource_id.to_string(),
                change_id: change_id.to_string(),
            })?;

        let before = match change.before_content.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => return Err(Error::NothingToRevert(change_id.to_string())),
        };

        let current = std::fs::read_to_string(&change.file_path).ok();
        write_file(&change.file_path, before.as_bytes())?;
        tracing::info!(
            resource_id = %resource_id,
            change_id,
            path = %change.file_path.display(),
            "Reverted change"
        );

        let reason = format!("Revert {}", change_id);
        self.record_as(
            ChangeType::Restore,
            NewChange {
                resource_id,
                reason: &reason,
                before: current.as_deref(),
                after: before,
                project_path: change.project_path.as_deref(),
                file_path: &change.file_path,
            },
        )
    }

    /// Fill the tracking overlay of each resource from the log.
    ///
    /// A resource is modified when its file no longer matches the earliest
    /// recorded content: the first change's before-content, or what a create
    /// wrote.
    pub fn overlay(&self, resources: &mut [Resource]) -> Result<()> {
        for resource in resources.iter_mut() {
            let history = self.log.history(&resource.id)?;
            let baseline = history.first().map(|c| {
                c.before_content
                    .as_deref()
                    .unwrap_or(&c.after_content)
                    .to_string()
            });

            resource.tracking.resource_version = history.len() as u32;
            resource.tracking.is_modified = match &baseline {
                Some(baseline) => std::fs::read_to_string(&resource.file_path)
                    .map(|current| current != *baseline)
                    .unwrap_or(true),
                None => false,
            };
            resource.tracking.original_content =
                history.first().and_then(|c| c.before_content.clone());
        }
        Ok(())
    }
}

/// Positional line diff between two texts.
///
/// Line numbers are 1-based and refer to the position in either text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineDiff {
    /// Lines present only in `b`
    pub added: Vec<(usize, String)>,
    /// Lines present only in `a`
    pub removed: Vec<(usize, String)>,
    /// Lines at the same position that differ: (line, old, new)
    pub modified: Vec<(usize, String, String)>,
}

impl LineDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Compare two texts line by line at equal positions.
pub fn diff(a: &str, b: &str) -> LineDiff {
    let old: Vec<&str> = a.lines().collect();
    let new: Vec<&str> = b.lines().collect();
    let mut out = LineDiff::default();

    for i in 0..old.len().max(new.len()) {
        let line = i + 1;
        match (old.get(i), new.get(i)) {
            (Some(o), Some(n)) if o != n => {
                out.modified.push((line, o.to_string(), n.to_string()))
            }
            (Some(_), Some(_)) => {}
            (Some(o), None) => out.removed.push((line, o.to_string())),
            (None, Some(n)) => out.added.push((line, n.to_string())),
            (None, None) => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use crate::parse::parse_file;
    use std::fs;

    fn agent_fixture() -> (tempfile::TempDir, Resource) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p/.claude/agents/a.md");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "---\nname: a\n---\nv1\n").unwrap();
        let layout = Layout::new(dir.path().join("home"));
        let location = layout.classify(&path).unwrap();
        let resource = parse_file(&path, &location).unwrap();
        (dir, resource)
    }

    #[test]
    fn test_record_derives_type() {
        let tracker = ChangeTracker::new(MemoryChangeLog::new());
        let id = ResourceId::from("agent:user:-:a");
        let path = Path::new("/x/a.md");
        let entry = |before, after| NewChange {
            resource_id: &id,
            reason: "r",
            before,
            after,
            project_path: None,
            file_path: path,
        };

        assert_eq!(tracker.record(entry(None, "a")).unwrap().change_type, ChangeType::Create);
        assert_eq!(
            tracker.record(entry(Some("a"), "b")).unwrap().change_type,
            ChangeType::Modify
        );
        assert_eq!(
            tracker.record(entry(Some("b"), "")).unwrap().change_type,
            ChangeType::Delete
        );
        assert_eq!(tracker.history(&id).unwrap().len(), 3);
    }

    #[test]
    fn test_apply_and_revert() {
        let (_dir, resource) = agent_fixture();
        let tracker = ChangeTracker::new(MemoryChangeLog::new());

        let change = tracker
            .apply(&resource, "---\nname: a\n---\nv2\n", "edit")
            .unwrap();
        assert_eq!(change.change_type, ChangeType::Modify);
        assert_eq!(fs::read_to_string(&resource.file_path).unwrap(), "---\nname: a\n---\nv2\n");

        let restore = tracker.revert(&resource.id, &change.id).unwrap();
        assert_eq!(restore.change_type, ChangeType::Restore);
        assert_eq!(
            fs::read_to_string(&resource.file_path).unwrap(),
            change.before_content.clone().unwrap()
        );

        let history = tracker.history(&resource.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(
            history
                .iter()
                .filter(|c| c.change_type == ChangeType::Restore)
                .count(),
            1
        );
    }

    #[test]
    fn test_apply_refuses_non_editable() {
        let (_dir, mut resource) = agent_fixture();
        resource.is_editable = false;
        let tracker = ChangeTracker::new(MemoryChangeLog::new());
        assert!(matches!(
            tracker.apply(&resource, "x", "edit"),
            Err(Error::NotEditable(_))
        ));
        assert_eq!(fs::read_to_string(&resource.file_path).unwrap(), "---\nname: a\n---\nv1\n");
    }

    #[test]
    fn test_revert_errors() {
        let tracker = ChangeTracker::new(MemoryChangeLog::new());
        let id = ResourceId::from("agent:user:-:a");
        assert!(matches!(
            tracker.revert(&id, "missing"),
            Err(Error::ChangeNotFound { .. })
        ));

        let created = tracker
            .record(NewChange {
                resource_id: &id,
                reason: "create",
                before: None,
                after: "x",
                project_path: None,
                file_path: Path::new("/x/a.md"),
            })
            .unwrap();
        assert!(matches!(
            tracker.revert(&id, &created.id),
            Err(Error::NothingToRevert(_))
        ));
    }

    #[test]
    fn test_overlay() {
        let (_dir, resource) = agent_fixture();
        let tracker = ChangeTracker::new(MemoryChangeLog::new());
        tracker.apply(&resource, "---\nname: a\n---\nv2\n", "one").unwrap();
        tracker.apply(&resource, "---\nname: a\n---\nv3\n", "two").unwrap();

        let mut resources = vec![resource];
        tracker.overlay(&mut resources).unwrap();
        let tracking = &resources[0].tracking;
        assert!(tracking.is_modified);
        assert_eq!(tracking.resource_version, 2);
        assert_eq!(
            tracking.original_content.as_deref(),
            Some("---\nname: a\n---\nv1\n")
        );
    }

    #[test]
    fn test_overlay_after_revert_to_original() {
        let (_dir, resource) = agent_fixture();
        let tracker = ChangeTracker::new(MemoryChangeLog::new());
        let change = tracker.apply(&resource, "---\nname: a\n---\nv2\n", "edit").unwrap();
        tracker.revert(&resource.id, &change.id).unwrap();

        let mut resources = vec![resource];
        tracker.overlay(&mut resources).unwrap();
        assert!(!resources[0].tracking.is_modified);
        assert_eq!(resources[0].tracking.resource_version, 2);
    }

    #[test]
    fn test_overlay_created_resource_unmodified() {
        let (_dir, resource) = agent_fixture();
        let tracker = ChangeTracker::new(MemoryChangeLog::new());
        let text = fs::read_to_string(&resource.file_path).unwrap();
        tracker
            .record(NewChange {
                resource_id: &resource.id,
                reason: "copy",
                before: None,
                after: &text,
                project_path: resource.project_path.as_deref(),
                file_path: &resource.file_path,
            })
            .unwrap();

        let mut resources = vec![resource.clone()];
        tracker.overlay(&mut resources).unwrap();
        assert!(!resources[0].tracking.is_modified);
        assert_eq!(resources[0].tracking.resource_version, 1);
        assert_eq!(resources[0].tracking.original_content, None);

        fs::write(&resource.file_path, "---\nname: a\n---\nhand edit\n").unwrap();
        tracker.overlay(&mut resources).unwrap();
        assert!(resources[0].tracking.is_modified);
    }

    #[test]
    fn test_tracker_over_database() {
        let db = crate::db::Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let (_dir, resource) = agent_fixture();
        let tracker = ChangeTracker::new(db);

        let change = tracker.apply(&resource, "new\n", "edit").unwrap();
        let history = tracker.history(&resource.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, change.id);
    }

    #[test]
    fn test_diff_positional() {
        let d = diff("a\nb\nc\n", "a\nB\nc\nd\n");
        assert_eq!(d.modified, vec![(2, "b".to_string(), "B".to_string())]);
        assert_eq!(d.added, vec![(4, "d".to_string())]);
        assert!(d.removed.is_empty());

        let d = diff("a\nb\n", "a\n");
        assert_eq!(d.removed, vec![(2, "b".to_string())]);
        assert!(diff("same\n", "same\n").is_empty());
    }
}
