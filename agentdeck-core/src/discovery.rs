//! Discovery pipeline: scan, classify, parse
//!
//! ```text
//! ┌─────────┐  path  ┌────────┐ Location ┌────────┐ Resource ┌────────────────┐
//! │ Scanner │ ─────► │ Layout │ ───────► │ Parser │ ───────► │ DiscoveryReport│
//! └─────────┘        └────────┘          └────────┘          └────────────────┘
//!      │ ScanError                            │ ParseError          ▲
//!      └──────────────────────────────────────┴──── warnings ───────┘
//! ```
//!
//! A bad file never stops discovery: scan and parse failures are logged and
//! collected as [`DiscoveryWarning`]s next to the resources that did parse.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agentdeck_core::{CancelToken, Discovery, Layout, ScanOptions};
//!
//! let discovery = Discovery::new(Layout::detect(), ScanOptions::default());
//! let report = discovery.scan(&[home, work_dir], &CancelToken::new());
//! println!("{} resources, {} warnings", report.resources.len(), report.warnings.len());
//! ```

use crate::config::Config;
use crate::error::{ParseError, ScanError};
use crate::layout::Layout;
use crate::parse::{parse_file, settings_hooks};
use crate::scan::{CancelToken, ScanOptions, Scanner};
use crate::types::{Resource, ResourceId, ResourceKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Non-fatal problem found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryWarning {
    Scan(ScanError),
    Parse(ParseError),
    /// Two files produced the same id; the later one was dropped
    DuplicateId {
        id: ResourceId,
        kept: PathBuf,
        dropped: PathBuf,
    },
}

impl std::fmt::Display for DiscoveryWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryWarning::Scan(e) => write!(f, "{}", e),
            DiscoveryWarning::Parse(e) => write!(f, "{}", e),
            DiscoveryWarning::DuplicateId { id, kept, dropped } => write!(
                f,
                "duplicate id {}: kept {}, dropped {}",
                id,
                kept.display(),
                dropped.display()
            ),
        }
    }
}

/// One item from a streaming discovery.
#[derive(Debug, Clone)]
pub enum DiscoveryItem {
    Resource(Box<Resource>),
    Warning(DiscoveryWarning),
}

/// Result of a full discovery pass.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub resources: Vec<Resource>,
    pub warnings: Vec<DiscoveryWarning>,
}

impl DiscoveryReport {
    pub fn parse_errors(&self) -> impl Iterator<Item = &ParseError> {
        self.warnings.iter().filter_map(|w| match w {
            DiscoveryWarning::Parse(e) => Some(e),
            _ => None,
        })
    }

    pub fn scan_errors(&self) -> impl Iterator<Item = &ScanError> {
        self.warnings.iter().filter_map(|w| match w {
            DiscoveryWarning::Scan(e) => Some(e),
            _ => None,
        })
    }

    fn push(&mut self, item: DiscoveryItem, ids: &mut IdIndex) {
        match item {
            DiscoveryItem::Resource(resource) => match ids.admit(&resource) {
                Some(warning) => self.warnings.push(warning),
                None => self.resources.push(*resource),
            },
            DiscoveryItem::Warning(w) => self.warnings.push(w),
        }
    }
}

/// First path seen for each id.
#[derive(Default)]
struct IdIndex(HashMap<ResourceId, PathBuf>);

impl IdIndex {
    /// Returns a warning if the id was already taken.
    fn admit(&mut self, resource: &Resource) -> Option<DiscoveryWarning> {
        if let Some(kept) = self.0.get(&resource.id) {
            tracing::warn!(
                id = %resource.id,
                kept = %kept.display(),
                dropped = %resource.file_path.display(),
                "Duplicate resource id, dropping later file"
            );
            return Some(DiscoveryWarning::DuplicateId {
                id: resource.id.clone(),
                kept: kept.clone(),
                dropped: resource.file_path.clone(),
            });
        }
        self.0
            .insert(resource.id.clone(), resource.file_path.clone());
        None
    }
}

/// Runs the scan → classify → parse pipeline.
#[derive(Debug, Clone)]
pub struct Discovery {
    layout: Layout,
    scanner: Scanner,
    include_content: bool,
}

impl Discovery {
    pub fn new(layout: Layout, options: ScanOptions) -> Self {
        let scanner = Scanner::for_layout(options, layout.clone());
        Self {
            layout,
            scanner,
            include_content: false,
        }
    }

    /// Build from loaded configuration, using the current user's home.
    pub fn from_config(config: &Config) -> Self {
        let layout = Layout::detect().with_builtin_roots(config.scan.expanded_builtin_roots());
        Self::new(layout, ScanOptions::from(&config.scan))
    }

    /// Keep file bodies on discovered resources.
    pub fn with_content(mut self, include_content: bool) -> Self {
        self.include_content = include_content;
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Roots to scan by default: home, configured roots, and builtin roots.
    pub fn default_roots(&self, config: &Config) -> Vec<PathBuf> {
        let mut roots = vec![self.layout.home().to_path_buf()];
        roots.extend(config.scan.expanded_roots());
        roots.extend(self.layout.builtin_roots().iter().cloned());
        roots
    }

    /// Discover every resource under `roots`, blocking until done or cancelled.
    pub fn scan(&self, roots: &[PathBuf], cancel: &CancelToken) -> DiscoveryReport {
        self.scan_with_progress(roots, cancel, |_, _| {})
    }

    /// Like [`Self::scan`], calling `progress(count, path)` for every file
    /// before it is parsed.
    pub fn scan_with_progress<F>(
        &self,
        roots: &[PathBuf],
        cancel: &CancelToken,
        mut progress: F,
    ) -> DiscoveryReport
    where
        F: FnMut(usize, &Path),
    {
        let mut report = DiscoveryReport::default();
        let mut ids = IdIndex::default();
        let mut count = 0;

        for item in self.scanner.scan(roots, cancel) {
            match item {
                Ok(path) => {
                    count += 1;
                    progress(count, &path);
                    for found in self.process(&path) {
                        report.push(found, &mut ids);
                    }
                }
                Err(e) => report.push(DiscoveryItem::Warning(DiscoveryWarning::Scan(e)), &mut ids),
            }
        }

        tracing::info!(
            resources = report.resources.len(),
            warnings = report.warnings.len(),
            cancelled = cancel.is_cancelled(),
            "Discovery finished"
        );
        report
    }

    /// Stream resources and warnings as they are found.
    ///
    /// Must be called from within a tokio runtime. Roots are walked
    /// concurrently; duplicate ids are filtered out in arrival order.
    pub fn stream(&self, roots: Vec<PathBuf>, cancel: CancelToken) -> mpsc::Receiver<DiscoveryItem> {
        let (tx, rx) = mpsc::channel(256);
        let mut paths = self.scanner.spawn_stream(roots, cancel);
        let this = self.clone();

        tokio::spawn(async move {
            let mut ids = IdIndex::default();
            while let Some(item) = paths.recv().await {
                let items = match item {
                    Ok(path) => {
                        let worker = this.clone();
                        match tokio::task::spawn_blocking(move || worker.process(&path)).await {
                            Ok(items) => items,
                            Err(e) => {
                                tracing::error!(error = %e, "Parse task failed");
                                continue;
                            }
                        }
                    }
                    Err(e) => vec![DiscoveryItem::Warning(DiscoveryWarning::Scan(e))],
                };

                for item in items {
                    let item = match item {
                        DiscoveryItem::Resource(resource) => match ids.admit(&resource) {
                            Some(warning) => DiscoveryItem::Warning(warning),
                            None => DiscoveryItem::Resource(resource),
                        },
                        other => other,
                    };
                    if tx.send(item).await.is_err() {
                        return;
                    }
                }
            }
        });

        rx
    }

    /// Parse a single file. `None` if the layout does not recognize it.
    pub fn load(&self, path: &Path) -> Option<Result<Resource, ParseError>> {
        let location = self.layout.classify(path)?;
        Some(parse_file(path, &location))
    }

    /// Classify and parse one path. Settings files also yield their hooks.
    fn process(&self, path: &Path) -> Vec<DiscoveryItem> {
        let Some(location) = self.layout.classify(path) else {
            return vec![];
        };

        let mut resource = match parse_file(path, &location) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(path = %path.display(), kind = %e.kind, error = %e.message, "Parse failed, skipping");
                return vec![DiscoveryItem::Warning(DiscoveryWarning::Parse(e))];
            }
        };

        let mut items = Vec::new();
        if matches!(resource.kind, ResourceKind::Settings(_)) {
            items.extend(
                settings_hooks(&resource)
                    .into_iter()
                    .map(|hook| DiscoveryItem::Resource(Box::new(hook))),
            );
        }
        if !self.include_content {
            resource.content = None;
        }
        tracing::trace!(id = %resource.id, "Discovered resource");
        items.insert(0, DiscoveryItem::Resource(Box::new(resource)));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;
    use crate::types::{ResourceType, Scope};
    use std::fs;

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().canonicalize().unwrap().join("home");
        write(
            &home.join(".claude/agents/reviewer.md"),
            "---\nname: reviewer\ndescription: Reviews code\n---\nBody\n",
        );
        write(
            &home.join("proj/.claude/commands/git/commit.md"),
            "---\ndescription: Commit\n---\nRun git commit.\n",
        );
        write(
            &home.join("proj/.claude/settings.json"),
            r#"{"hooks":{"Stop":[{"matcher":"","hooks":[{"type":"command","command":"say done"}]}]}}"#,
        );
        write(&home.join("proj/CLAUDE.md"), "# Project\nNotes for the project go here.\n");
        write(&home.join("proj/.claude/agents/broken.md"), "---\nname: broken\n");
        (dir, home)
    }

    #[test]
    fn test_scan_collects_resources_and_warnings() {
        let (_dir, home) = fixture();
        let discovery = Discovery::new(Layout::new(&home), ScanOptions::default());
        let report = discovery.scan(&[home.clone()], &CancelToken::new());

        let mut types: Vec<ResourceType> = report.resources.iter().map(|r| r.resource_type()).collect();
        types.sort();
        assert_eq!(
            types,
            vec![
                ResourceType::Agent,
                ResourceType::Command,
                ResourceType::Hook,
                ResourceType::ProjectMarker,
                ResourceType::Settings,
            ]
        );

        let errors: Vec<_> = report.parse_errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ParseErrorKind::InvalidFrontmatter);

        let agent = report
            .resources
            .iter()
            .find(|r| r.resource_type() == ResourceType::Agent)
            .unwrap();
        assert_eq!(agent.scope, Scope::User);
        assert!(agent.content.is_none());
    }

    #[test]
    fn test_include_content() {
        let (_dir, home) = fixture();
        let discovery = Discovery::new(Layout::new(&home), ScanOptions::default()).with_content(true);
        let report = discovery.scan(&[home.clone()], &CancelToken::new());
        let command = report
            .resources
            .iter()
            .find(|r| r.resource_type() == ResourceType::Command)
            .unwrap();
        assert_eq!(command.content.as_deref(), Some("Run git commit.\n"));
        assert_eq!(command.qualified_name(), "git/commit");
    }

    #[test]
    fn test_overlapping_roots_reported_once() {
        let (_dir, home) = fixture();
        let discovery = Discovery::new(Layout::new(&home), ScanOptions::default());
        let report = discovery.scan(&[home.clone(), home.join("proj")], &CancelToken::new());
        let commands = report
            .resources
            .iter()
            .filter(|r| r.resource_type() == ResourceType::Command)
            .count();
        assert_eq!(commands, 1);
        assert!(!report
            .warnings
            .iter()
            .any(|w| matches!(w, DiscoveryWarning::DuplicateId { .. })));
    }

    #[test]
    fn test_both_marker_locations_kept() {
        let (_dir, home) = fixture();
        write(&home.join("proj/.claude/CLAUDE.md"), "# Inner notes\n");
        let discovery = Discovery::new(Layout::new(&home), ScanOptions::default());
        let report = discovery.scan(&[home.clone()], &CancelToken::new());

        let mut markers: Vec<&Resource> = report
            .resources
            .iter()
            .filter(|r| r.resource_type() == ResourceType::ProjectMarker)
            .collect();
        markers.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        assert_eq!(markers.len(), 2);
        assert_ne!(markers[0].id, markers[1].id);
        assert!(!report
            .warnings
            .iter()
            .any(|w| matches!(w, DiscoveryWarning::DuplicateId { .. })));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let mut ids = IdIndex::default();
        let (_dir, home) = fixture();
        let path = home.join(".claude/agents/reviewer.md");
        let layout = Layout::new(&home);
        let location = layout.classify(&path).unwrap();
        let a = parse_file(&path, &location).unwrap();
        let mut b = a.clone();
        b.file_path = home.join("elsewhere.md");

        assert!(ids.admit(&a).is_none());
        assert!(matches!(
            ids.admit(&b),
            Some(DiscoveryWarning::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_progress_sees_every_file() {
        let (_dir, home) = fixture();
        let discovery = Discovery::new(Layout::new(&home), ScanOptions::default());
        let mut seen = Vec::new();
        let report = discovery.scan_with_progress(&[home.clone()], &CancelToken::new(), |n, path| {
            seen.push((n, path.to_path_buf()));
        });
        // Five files; settings also yield one hook resource
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.last().map(|(n, _)| *n), Some(5));
        assert_eq!(report.resources.len() + report.parse_errors().count(), 6);
    }

    #[test]
    fn test_load_single_file() {
        let (_dir, home) = fixture();
        let discovery = Discovery::new(Layout::new(&home), ScanOptions::default());

        let agent = discovery
            .load(&home.join(".claude/agents/reviewer.md"))
            .unwrap()
            .unwrap();
        assert_eq!(agent.name, "reviewer");

        assert!(discovery.load(&home.join("notes.txt")).is_none());
        assert!(discovery
            .load(&home.join("proj/.claude/agents/broken.md"))
            .unwrap()
            .is_err());
    }

    #[tokio::test]
    async fn test_stream_matches_blocking_scan() {
        let (_dir, home) = fixture();
        let discovery = Discovery::new(Layout::new(&home), ScanOptions::default());

        let mut rx = discovery.stream(vec![home.clone(), home.join("proj")], CancelToken::new());
        let mut streamed = Vec::new();
        while let Some(item) = rx.recv().await {
            if let DiscoveryItem::Resource(r) = item {
                streamed.push(r.id.clone());
            }
        }
        streamed.sort();

        let mut blocking: Vec<ResourceId> = discovery
            .scan(&[home.clone()], &CancelToken::new())
            .resources
            .into_iter()
            .map(|r| r.id)
            .collect();
        blocking.sort();
        assert_eq!(streamed, blocking);
    }
}
