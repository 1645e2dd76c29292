//! On-disk configuration layout
//!
//! Resources live in a `.claude` directory, either in the user's home
//! (User scope), in a project directory (Project scope), or under a
//! configured builtin root (Builtin scope):
//!
//! ```text
//! <owner>/
//! ├── CLAUDE.md                  project marker
//! └── .claude/
//!     ├── CLAUDE.md              project marker (alternate location)
//!     ├── agents/**/*.md         agents
//!     ├── commands/**/*.md       commands (subdirectories are namespaces)
//!     ├── hooks/**/*             hook scripts
//!     ├── settings.json          shared settings
//!     └── settings.local.json    local override (project scope only)
//! ```

use crate::error::ValidationError;
use crate::types::{Location, Resource, ResourceKind, ResourceType, Scope, SettingsLayer};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Name of the configuration directory.
pub const CONFIG_DIR: &str = ".claude";

/// Name of the per-directory marker file.
pub const MARKER_FILE: &str = "CLAUDE.md";

/// Suffix of backup files written before an overwrite.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Resolves and classifies paths against the configuration layout.
#[derive(Debug, Clone)]
pub struct Layout {
    home: PathBuf,
    builtin_roots: Vec<PathBuf>,
}

impl Layout {
    /// Create a layout rooted at the given home directory.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: canonical_or_self(home.into()),
            builtin_roots: vec![],
        }
    }

    /// Layout for the current user's home directory.
    pub fn detect() -> Self {
        Self::new(crate::config::home_dir())
    }

    /// Treat everything under these roots as builtin resources.
    pub fn with_builtin_roots(mut self, roots: impl IntoIterator<Item = PathBuf>) -> Self {
        self.builtin_roots = roots.into_iter().map(canonical_or_self).collect();
        self
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn builtin_roots(&self) -> &[PathBuf] {
        &self.builtin_roots
    }

    /// `~/.claude`
    pub fn user_config_dir(&self) -> PathBuf {
        self.home.join(CONFIG_DIR)
    }

    /// `<project>/.claude`
    pub fn project_config_dir(&self, project: &Path) -> PathBuf {
        project.join(CONFIG_DIR)
    }

    /// Path of a settings layer file. `project` is ignored for the user layer.
    pub fn settings_path(&self, layer: SettingsLayer, project: &Path) -> PathBuf {
        match layer {
            SettingsLayer::User => self.user_config_dir().join(layer.file_name()),
            SettingsLayer::Project | SettingsLayer::Local => {
                self.project_config_dir(project).join(layer.file_name())
            }
        }
    }

    /// Classify an absolute path into a resource location.
    ///
    /// Returns `None` for anything that is not a resource file: hidden files,
    /// backup files, unknown files inside `.claude`, and files elsewhere that
    /// are not `CLAUDE.md`.
    pub fn classify(&self, path: &Path) -> Option<Location> {
        let file_name = path.file_name()?.to_str()?;
        if file_name.starts_with('.') || file_name.ends_with(BACKUP_SUFFIX) {
            return None;
        }

        if let Some(root) = self.builtin_roots.iter().find(|r| path.starts_with(r)) {
            let rel = path.strip_prefix(root).ok()?;
            let mut parts: Vec<&str> = rel.iter().map(os_str).collect::<Option<_>>()?;
            let mut config_dir = root.clone();
            if parts.first() == Some(&CONFIG_DIR) {
                parts.remove(0);
                config_dir = root.join(CONFIG_DIR);
            }
            return classify_within(&config_dir, &parts, Scope::Builtin, None);
        }

        let comps: Vec<&OsStr> = path.iter().collect();
        if let Some(idx) = comps.iter().rposition(|c| *c == OsStr::new(CONFIG_DIR)) {
            let owner: PathBuf = comps[..idx].iter().collect();
            let parts: Vec<&str> = comps[idx + 1..]
                .iter()
                .map(|c| c.to_str())
                .collect::<Option<_>>()?;
            let (scope, project) = self.scope_for_owner(&owner);
            return classify_within(&owner.join(CONFIG_DIR), &parts, scope, project);
        }

        if file_name == MARKER_FILE {
            let owner = path.parent()?.to_path_buf();
            let (scope, project) = self.scope_for_owner(&owner);
            return Some(Location {
                resource_type: ResourceType::ProjectMarker,
                scope,
                project_path: project,
                type_root: owner,
                namespace: None,
                settings_layer: None,
            });
        }

        None
    }

    fn scope_for_owner(&self, owner: &Path) -> (Scope, Option<PathBuf>) {
        if owner == self.home {
            (Scope::User, None)
        } else {
            (Scope::Project, Some(owner.to_path_buf()))
        }
    }

    /// Destination path for assigning `resource` into a scope.
    ///
    /// Commands (and nested agents or hook scripts) keep their subdirectory
    /// under the destination type root.
    pub fn destination(
        &self,
        resource: &Resource,
        scope: Scope,
        project: Option<&Path>,
    ) -> Result<PathBuf, ValidationError> {
        let base = match scope {
            Scope::User => self.user_config_dir(),
            Scope::Project => {
                let project = project.ok_or(ValidationError::MissingProject)?;
                if !project.is_absolute() || !project.is_dir() {
                    return Err(ValidationError::InvalidProject(project.to_path_buf()));
                }
                self.project_config_dir(project)
            }
            Scope::Builtin => return Err(ValidationError::BuiltinTarget),
        };

        let file_name = resource
            .file_path
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| ValidationError::InvalidName(resource.name.clone()))?;

        let namespace = self
            .classify(&resource.file_path)
            .and_then(|loc| loc.namespace)
            .or_else(|| resource.namespace().map(str::to_string));

        let path = match &resource.kind {
            ResourceKind::Agent(_) | ResourceKind::Command(_) => {
                let type_dir = resource
                    .resource_type()
                    .type_dir()
                    .unwrap_or(CONFIG_DIR);
                nested(base.join(type_dir), namespace.as_deref()).join(file_name)
            }
            ResourceKind::Hook(spec) => match spec.source {
                crate::types::HookSource::Script => {
                    nested(base.join("hooks"), namespace.as_deref()).join(file_name)
                }
                crate::types::HookSource::Settings { .. } => {
                    base.join(SettingsLayer::Project.file_name())
                }
            },
            ResourceKind::ProjectMarker(_) => match scope {
                Scope::User => base.join(MARKER_FILE),
                _ => project
                    .map(|p| p.join(MARKER_FILE))
                    .ok_or(ValidationError::MissingProject)?,
            },
            ResourceKind::Settings(spec) => match scope {
                Scope::User => base.join(SettingsLayer::User.file_name()),
                _ => base.join(spec.layer.file_name()),
            },
        };

        Ok(path)
    }
}

/// Key used in resource ids: type-relative path without markdown extension.
pub fn resource_key(location: &Location, path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let leaf = match location.resource_type {
        ResourceType::Agent | ResourceType::Command => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(file_name),
        ResourceType::Hook => file_name,
        // `<owner>/CLAUDE.md` and `<owner>/.claude/CLAUDE.md` coexist.
        ResourceType::ProjectMarker => {
            let in_config_dir = path
                .parent()
                .and_then(Path::file_name)
                .map(|n| n == OsStr::new(CONFIG_DIR))
                .unwrap_or(false);
            if in_config_dir {
                format!("{}/CLAUDE", CONFIG_DIR)
            } else {
                "CLAUDE".to_string()
            }
        }
        ResourceType::Settings => {
            return location
                .settings_layer
                .map(|l| l.as_str().to_string())
                .unwrap_or(file_name);
        }
    };
    match &location.namespace {
        Some(ns) => format!("{}/{}", ns, leaf),
        None => leaf,
    }
}

fn classify_within(
    config_dir: &Path,
    parts: &[&str],
    scope: Scope,
    project: Option<PathBuf>,
) -> Option<Location> {
    let location = |resource_type, type_root: PathBuf, namespace: Option<String>, layer| Location {
        resource_type,
        scope,
        project_path: project.clone(),
        type_root,
        namespace,
        settings_layer: layer,
    };

    match parts {
        ["settings.json"] => {
            let layer = match scope {
                Scope::User => SettingsLayer::User,
                Scope::Project => SettingsLayer::Project,
                Scope::Builtin => return None,
            };
            Some(location(
                ResourceType::Settings,
                config_dir.to_path_buf(),
                None,
                Some(layer),
            ))
        }
        ["settings.local.json"] if scope == Scope::Project => Some(location(
            ResourceType::Settings,
            config_dir.to_path_buf(),
            None,
            Some(SettingsLayer::Local),
        )),
        [MARKER_FILE] => Some(location(
            ResourceType::ProjectMarker,
            config_dir.to_path_buf(),
            None,
            None,
        )),
        [dir, middle @ .., file] => {
            let resource_type = match *dir {
                "agents" if is_markdown(file) => ResourceType::Agent,
                "commands" if is_markdown(file) => ResourceType::Command,
                "hooks" => ResourceType::Hook,
                _ => return None,
            };
            if middle.iter().any(|m| m.starts_with('.')) {
                return None;
            }
            let namespace = if middle.is_empty() {
                None
            } else {
                Some(middle.join("/"))
            };
            Some(location(
                resource_type,
                config_dir.join(dir),
                namespace,
                None,
            ))
        }
        _ => None,
    }
}

fn is_markdown(file: &str) -> bool {
    Path::new(file)
        .extension()
        .map(|e| e.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

fn nested(root: PathBuf, namespace: Option<&str>) -> PathBuf {
    match namespace {
        Some(ns) => ns.split('/').fold(root, |p, seg| p.join(seg)),
        None => root,
    }
}

fn os_str(c: &OsStr) -> Option<&str> {
    c.to_str()
}

fn canonical_or_self(path: PathBuf) -> PathBuf {
    path.canonicalize().unwrap_or(path)
}
