//! Depth-bounded, cancellable filesystem scanner
//!
//! Walks root directories lazily and yields candidate resource files.
//!
//! ## Guarantees
//!
//! - **Streaming**: directories are read on demand by `walkdir`; memory does
//!   not grow with the size of the tree.
//! - **Exclusions**: directories whose name is in the exclusion set are never
//!   entered.
//! - **Dedup**: a file reachable from several roots is reported once per call,
//!   keyed by canonical path. The seen set is shared (and locked) across the
//!   per-root tasks of [`Scanner::spawn_stream`].
//! - **Cancellation**: once the [`CancelToken`] fires, no further directory is
//!   read. Paths already yielded stay valid.
//! - **Resilience**: unreadable entries and broken symlinks are reported as
//!   [`ScanError`] items and the walk continues. An error on a root ends only
//!   that root's walk.
//!
//! Traversal order is stable within one root (entries sorted by file name);
//! no ordering is promised across roots.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::layout::Layout;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use walkdir::{DirEntry, WalkDir};

/// Shared cancellation signal.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every scan holding this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Scanner tuning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Maximum depth below each root (root itself is depth 0)
    pub max_depth: usize,
    /// Directory names never descended into
    pub exclude: HashSet<String>,
    /// Descend into symlinked directories (loops are detected)
    pub follow_links: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

impl From<&ScanConfig> for ScanOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            exclude: config.exclude.iter().cloned().collect(),
            follow_links: config.follow_links,
        }
    }
}

type Predicate = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Canonical paths already reported during one scan call.
#[derive(Debug, Clone, Default)]
pub struct SeenPaths(Arc<Mutex<HashSet<PathBuf>>>);

impl SeenPaths {
    /// Returns true if the path was not seen before.
    fn insert(&self, path: PathBuf) -> bool {
        let mut seen = self.0.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(path)
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Finds candidate files under a set of roots.
#[derive(Clone)]
pub struct Scanner {
    options: ScanOptions,
    predicate: Predicate,
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Scanner {
    /// Create a scanner that yields files accepted by `predicate`.
    pub fn new<F>(options: ScanOptions, predicate: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        Self {
            options,
            predicate: Arc::new(predicate),
        }
    }

    /// Create a scanner that yields every file the layout recognizes.
    pub fn for_layout(options: ScanOptions, layout: Layout) -> Self {
        Self::new(options, move |path| layout.classify(path).is_some())
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Lazily walk `roots`, one after another.
    ///
    /// Each call starts with an empty seen set.
    pub fn scan(&self, roots: &[PathBuf], cancel: &CancelToken) -> ScanIter {
        self.scan_with_seen(roots.to_vec(), cancel, SeenPaths::default())
    }

    fn scan_with_seen(&self, roots: Vec<PathBuf>, cancel: &CancelToken, seen: SeenPaths) -> ScanIter {
        ScanIter {
            scanner: self.clone(),
            roots: roots.into(),
            current: None,
            cancel: cancel.clone(),
            seen,
        }
    }

    /// Walk every root on its own blocking task and stream results.
    ///
    /// Must be called from within a tokio runtime. The channel closes once all
    /// roots are finished or the token is cancelled.
    pub fn spawn_stream(
        &self,
        roots: Vec<PathBuf>,
        cancel: CancelToken,
    ) -> mpsc::Receiver<Result<PathBuf, ScanError>> {
        let (tx, rx) = mpsc::channel(256);
        let seen = SeenPaths::default();

        for root in roots {
            let scanner = self.clone();
            let tx = tx.clone();
            let cancel = cancel.clone();
            let seen = seen.clone();
            tokio::task::spawn_blocking(move || {
                for item in scanner.scan_with_seen(vec![root], &cancel, seen) {
                    if tx.blocking_send(item).is_err() {
                        break;
                    }
                }
            });
        }

        rx
    }

    fn walk(&self, root: &Path) -> Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + Send> {
        let exclude = self.options.exclude.clone();
        let walker = WalkDir::new(root)
            .max_depth(self.options.max_depth)
            .follow_links(self.options.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !entry
                        .file_name()
                        .to_str()
                        .map(|name| exclude.contains(name))
                        .unwrap_or(false)
            });
        Box::new(walker)
    }
}

struct RootWalk {
    root: PathBuf,
    entries: Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + Send>,
}

/// Iterator returned by [`Scanner::scan`].
///
/// Yields `Ok(path)` for each accepted file and `Err(ScanError)` for each
/// non-fatal problem.
pub struct ScanIter {
    scanner: Scanner,
    roots: VecDeque<PathBuf>,
    current: Option<RootWalk>,
    cancel: CancelToken,
    seen: SeenPaths,
}

impl ScanIter {
    fn start_next_root(&mut self) -> bool {
        while let Some(root) = self.roots.pop_front() {
            let root = match root.canonicalize() {
                Ok(root) if root.is_dir() => root,
                Ok(root) => {
                    tracing::debug!(root = %root.display(), "Scan root is not a directory, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::debug!(root = %root.display(), error = %e, "Scan root unavailable, skipping");
                    continue;
                }
            };
            tracing::debug!(root = %root.display(), "Scanning root");
            self.current = Some(RootWalk {
                entries: self.scanner.walk(&root),
                root,
            });
            return true;
        }
        false
    }

    fn accept(&self, entry: &DirEntry) -> Option<Result<PathBuf, ScanError>> {
        let path = entry.path();
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            // Link not followed: report files it points at, skip directories.
            match std::fs::metadata(path) {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => return None,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    if !(self.scanner.predicate)(path) {
                        return None;
                    }
                    tracing::warn!(path = %path.display(), "Broken symlink, skipping");
                    return Some(Err(ScanError::BrokenSymlink {
                        path: path.to_path_buf(),
                    }));
                }
                Err(e) => return Some(Err(entry_error(path, &e))),
            }
        } else if !file_type.is_file() {
            return None;
        }

        if !(self.scanner.predicate)(path) {
            return None;
        }

        match path.canonicalize() {
            Ok(canonical) => {
                if self.seen.insert(canonical) {
                    Some(Ok(path.to_path_buf()))
                } else {
                    tracing::trace!(path = %path.display(), "Already reported, skipping");
                    None
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot resolve path, skipping");
                Some(Err(entry_error(path, &e)))
            }
        }
    }
}

impl Iterator for ScanIter {
    type Item = Result<PathBuf, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.cancel.is_cancelled() {
                if self.current.take().is_some() || !self.roots.is_empty() {
                    tracing::info!("Scan cancelled");
                }
                self.roots.clear();
                return None;
            }

            let Some(walk) = self.current.as_mut() else {
                if self.start_next_root() {
                    continue;
                }
                return None;
            };

            match walk.entries.next() {
                None => {
                    self.current = None;
                }
                Some(Ok(entry)) => {
                    if let Some(item) = self.accept(&entry) {
                        return Some(item);
                    }
                }
                Some(Err(err)) => {
                    let root = walk.root.clone();
                    if err.depth() == 0 {
                        self.current = None;
                        tracing::warn!(root = %root.display(), error = %err, "Scan root aborted");
                        return Some(Err(ScanError::RootAborted {
                            root,
                            message: err.to_string(),
                        }));
                    }
                    let scan_err = walk_error(&err, &root);
                    if let ScanError::BrokenSymlink { path } = &scan_err {
                        if !(self.scanner.predicate)(path) {
                            continue;
                        }
                    }
                    tracing::warn!(error = %scan_err, "Skipping unreadable entry");
                    return Some(Err(scan_err));
                }
            }
        }
    }
}

fn entry_error(path: &Path, e: &std::io::Error) -> ScanError {
    let path = path.to_path_buf();
    match e.kind() {
        ErrorKind::PermissionDenied => ScanError::PermissionDenied { path },
        ErrorKind::NotFound => ScanError::BrokenSymlink { path },
        _ => ScanError::Unreadable {
            path,
            message: e.to_string(),
        },
    }
}

fn walk_error(err: &walkdir::Error, root: &Path) -> ScanError {
    let path = err.path().unwrap_or(root).to_path_buf();
    if err.loop_ancestor().is_some() {
        return ScanError::SymlinkLoop { path };
    }
    match err.io_error() {
        Some(io) => entry_error(&path, io),
        None => ScanError::Unreadable {
            path,
            message: err.to_string(),
        },
    }
}
