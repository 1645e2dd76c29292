//! Core domain types for agentdeck
//!
//! These types describe configuration resources discovered on disk and the
//! views derived from them.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Resource** | One discovered file (or settings hook entry): agent, command, hook, marker, settings |
//! | **Scope** | Installation tier: User (global), Project (one directory), Builtin (read-only) |
//! | **System** | Named bundle of resources installed together, recognized by rule |
//! | **Change** | Append-only audit entry for a content modification |
//! | **Type root** | Per-type directory such as `.claude/agents` |
//!
//! Resources are a shared envelope ([`Resource`]) around a type-specific
//! payload ([`ResourceKind`]). Consumers match on the payload instead of
//! probing optional fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Unknown frontmatter keys, kept so a re-rendered file loses nothing.
pub type ExtraMetadata = BTreeMap<String, serde_yaml::Value>;

// ============================================
// Scope and type
// ============================================

/// Installation tier of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    User,
    Project,
    Builtin,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::User => "user",
            Scope::Project => "project",
            Scope::Builtin => "builtin",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Scope::User),
            "project" => Ok(Scope::Project),
            "builtin" => Ok(Scope::Builtin),
            _ => Err(format!("unknown scope: {}", s)),
        }
    }
}

/// Resource type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Agent,
    Command,
    Hook,
    ProjectMarker,
    Settings,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Agent => "agent",
            ResourceType::Command => "command",
            ResourceType::Hook => "hook",
            ResourceType::ProjectMarker => "project_marker",
            ResourceType::Settings => "settings",
        }
    }

    /// Name of the per-type directory under `.claude`, if the type has one.
    pub fn type_dir(&self) -> Option<&'static str> {
        match self {
            ResourceType::Agent => Some("agents"),
            ResourceType::Command => Some("commands"),
            ResourceType::Hook => Some("hooks"),
            ResourceType::ProjectMarker | ResourceType::Settings => None,
        }
    }

    pub const ALL: [ResourceType; 5] = [
        ResourceType::Agent,
        ResourceType::Command,
        ResourceType::Hook,
        ResourceType::ProjectMarker,
        ResourceType::Settings,
    ];
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which layer a settings file occupies in the merge order.
///
/// Ordering follows merge priority: `User < Project < Local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsLayer {
    User,
    Project,
    Local,
}

impl SettingsLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsLayer::User => "user",
            SettingsLayer::Project => "project",
            SettingsLayer::Local => "local",
        }
    }

    /// File name used on disk for this layer.
    pub fn file_name(&self) -> &'static str {
        match self {
            SettingsLayer::User | SettingsLayer::Project => "settings.json",
            SettingsLayer::Local => "settings.local.json",
        }
    }
}

impl std::fmt::Display for SettingsLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Location
// ============================================

/// Where a candidate file sits in the configuration layout.
///
/// Produced by [`crate::layout::Layout::classify`] before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub resource_type: ResourceType,
    pub scope: Scope,
    /// Owning project directory when scope is Project
    pub project_path: Option<PathBuf>,
    /// Per-type root (`.claude/agents`), or the `.claude` dir / marker dir
    pub type_root: PathBuf,
    /// Directory path relative to the type root (`git/hooks`)
    pub namespace: Option<String>,
    /// Settings layer (Settings only)
    pub settings_layer: Option<SettingsLayer>,
}

// ============================================
// Resource ids
// ============================================

/// Stable identifier derived from type, scope, project identity and key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Build an id: `{type}:{scope}:{project-key}:{key}`.
    pub fn derive(
        resource_type: ResourceType,
        scope: Scope,
        project_path: Option<&Path>,
        key: &str,
    ) -> Self {
        let project_key = project_path
            .map(project_key)
            .unwrap_or_else(|| "-".to_string());
        Self(format!(
            "{}:{}:{}:{}",
            resource_type.as_str(),
            scope.as_str(),
            project_key,
            key
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short, stable identity for a project directory.
pub fn project_key(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}

// ============================================
// Resource payloads
// ============================================

/// Agent definition (`.claude/agents/*.md`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub tools: Vec<String>,
    pub color: Option<String>,
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: ExtraMetadata,
}

/// Slash command (`.claude/commands/**/*.md`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Directory path relative to the commands root
    pub namespace: Option<String>,
    pub allowed_tools: Vec<String>,
    pub argument_hint: Option<String>,
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: ExtraMetadata,
}

/// One action run by a hook matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Matcher entry in a settings `hooks` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookMatcher {
    #[serde(default)]
    pub matcher: String,
    #[serde(default)]
    pub hooks: Vec<HookAction>,
}

/// Where a hook comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HookSource {
    /// Matcher entry inside a settings file
    Settings { settings_path: PathBuf, index: usize },
    /// Script file under `.claude/hooks`
    Script,
}

/// Hook registered for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSpec {
    /// Event type, e.g. `PreToolUse`. Empty for standalone scripts.
    pub event: String,
    pub matcher: Option<String>,
    pub actions: Vec<HookAction>,
    pub source: HookSource,
}

/// Per-directory `CLAUDE.md` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub project_name: String,
}

/// Permission lists in a settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mode: Option<String>,
}

/// Typed view of the well-known settings keys.
///
/// Unknown keys stay available through the raw document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsDocument {
    #[serde(default)]
    pub permissions: Option<Permissions>,
    #[serde(default)]
    pub hooks: BTreeMap<String, Vec<HookMatcher>>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl SettingsDocument {
    /// Extract the typed view; keys with an unexpected shape are ignored.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let permissions = value
            .get("permissions")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        let hooks = value
            .get("hooks")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let env = value
            .get("env")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        Self {
            permissions,
            hooks,
            env,
        }
    }
}

/// Settings file payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsSpec {
    pub layer: SettingsLayer,
    /// False when the file does not exist on disk
    pub exists: bool,
    /// Raw JSON document (empty object when missing)
    pub value: serde_json::Value,
}

impl SettingsSpec {
    pub fn document(&self) -> SettingsDocument {
        SettingsDocument::from_value(&self.value)
    }
}

/// Type-specific payload of a [`Resource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    Agent(AgentSpec),
    Command(CommandSpec),
    Hook(HookSpec),
    ProjectMarker(MarkerSpec),
    Settings(SettingsSpec),
}

impl ResourceKind {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceKind::Agent(_) => ResourceType::Agent,
            ResourceKind::Command(_) => ResourceType::Command,
            ResourceKind::Hook(_) => ResourceType::Hook,
            ResourceKind::ProjectMarker(_) => ResourceType::ProjectMarker,
            ResourceKind::Settings(_) => ResourceType::Settings,
        }
    }
}

// ============================================
// Resource envelope
// ============================================

/// System membership assigned by the detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
}

/// Change-tracking overlay fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOverlay {
    pub is_modified: bool,
    /// Number of recorded changes
    pub resource_version: u32,
    /// Content before the first recorded change
    pub original_content: Option<String>,
}

/// A discovered configuration resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub description: String,
    pub scope: Scope,
    pub project_path: Option<PathBuf>,
    pub file_path: PathBuf,
    /// Body text; `None` until loaded
    pub content: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
    pub system: Option<SystemInfo>,
    pub is_editable: bool,
    #[serde(default)]
    pub tracking: ChangeOverlay,
    pub kind: ResourceKind,
}

impl Resource {
    pub fn resource_type(&self) -> ResourceType {
        self.kind.resource_type()
    }

    /// `namespace/name` for namespaced commands, otherwise the plain name.
    pub fn qualified_name(&self) -> String {
        match &self.kind {
            ResourceKind::Command(CommandSpec {
                namespace: Some(ns),
                ..
            }) if !ns.is_empty() => format!("{}/{}", ns, self.name),
            _ => self.name.clone(),
        }
    }

    pub fn is_system_resource(&self) -> bool {
        self.system.is_some()
    }

    pub fn system_id(&self) -> Option<&str> {
        self.system.as_ref().map(|s| s.id.as_str())
    }

    /// Namespace of a command resource.
    pub fn namespace(&self) -> Option<&str> {
        match &self.kind {
            ResourceKind::Command(spec) => spec.namespace.as_deref(),
            _ => None,
        }
    }
}

// ============================================
// Systems
// ============================================

/// Health of a system, derived from its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemHealth {
    Complete,
    Partial,
    Broken,
    Customized,
}

impl SystemHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemHealth::Complete => "complete",
            SystemHealth::Partial => "partial",
            SystemHealth::Broken => "broken",
            SystemHealth::Customized => "customized",
        }
    }
}

impl std::fmt::Display for SystemHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named bundle of resources. A view, rebuilt on every classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    /// Member resource ids, sorted
    pub members: Vec<ResourceId>,
    pub counts: BTreeMap<ResourceType, usize>,
    pub health: SystemHealth,
}

// ============================================
// Changes
// ============================================

/// Kind of recorded modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Modify,
    Delete,
    Restore,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Create => "create",
            ChangeType::Modify => "modify",
            ChangeType::Delete => "delete",
            ChangeType::Restore => "restore",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(ChangeType::Create),
            "modify" => Ok(ChangeType::Modify),
            "delete" => Ok(ChangeType::Delete),
            "restore" => Ok(ChangeType::Restore),
            _ => Err(format!("unknown change type: {}", s)),
        }
    }
}

/// Immutable audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub id: String,
    pub resource_id: ResourceId,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub change_type: ChangeType,
    pub before_content: Option<String>,
    pub after_content: String,
    pub project_path: Option<PathBuf>,
    /// File the write went to
    pub file_path: PathBuf,
}
