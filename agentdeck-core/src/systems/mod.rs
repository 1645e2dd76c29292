//! System detection
//!
//! Annotates resources with the bundle ("system") they were installed by.
//! Rules are tried in order and the first match wins:
//!
//! 1. Builtin scope → the `builtin` system
//! 2. Named systems from the [`RuleSet`], in table order
//! 3. Custom directory: an agent, command or hook whose parent directory is
//!    not a generic container becomes a system named after that directory
//! 4. No system
//!
//! Classification is a pure function of the resources and the rule set.

mod rules;

pub use rules::{RuleSet, SystemRule};

use crate::config::SystemsConfig;
use crate::error::{Error, Result};
use crate::types::{ResourceType, Resource, Scope, System, SystemHealth, SystemInfo};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

/// Id of the system every builtin resource belongs to.
pub const BUILTIN_SYSTEM_ID: &str = "builtin";

const GENERIC_DIRS: &[&str] = &["agents", "commands", "hooks", ".claude"];

/// Assigns system membership and editability.
#[derive(Debug, Clone)]
pub struct SystemDetector {
    rules: RuleSet,
    version: Regex,
}

impl SystemDetector {
    pub fn new(rules: RuleSet) -> Result<Self> {
        let version = Regex::new(r"v?(\d+\.\d+(?:\.\d+)?)")
            .map_err(|e| Error::Config(format!("version pattern: {}", e)))?;
        Ok(Self { rules, version })
    }

    /// Detector using the shipped rule table.
    pub fn builtin() -> Result<Self> {
        Self::new(RuleSet::builtin()?)
    }

    pub fn from_config(config: &SystemsConfig) -> Result<Self> {
        Self::new(RuleSet::from_config(config)?)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Set `system` and `is_editable` on every resource.
    pub fn classify(&self, resources: &mut [Resource]) {
        for resource in resources.iter_mut() {
            resource.system = self.detect(resource);
            resource.is_editable = editable(resource);
        }
        tracing::debug!(
            resources = resources.len(),
            system_members = resources.iter().filter(|r| r.system.is_some()).count(),
            "Classified resources"
        );
    }

    /// System membership of one resource.
    pub fn detect(&self, resource: &Resource) -> Option<SystemInfo> {
        let version = self.version_of(resource);

        if resource.scope == Scope::Builtin {
            return Some(SystemInfo {
                id: BUILTIN_SYSTEM_ID.to_string(),
                name: "Built-in".to_string(),
                version,
            });
        }

        let qualified = resource.qualified_name();
        if let Some(rule) = self.rules.rules().iter().find(|rule| {
            rule.matches(
                &resource.name,
                &qualified,
                &resource.file_path,
                &resource.description,
            )
        }) {
            return Some(SystemInfo {
                id: rule.id.clone(),
                name: rule.name.clone(),
                version,
            });
        }

        custom_directory(resource).map(|dir| SystemInfo {
            id: dir.to_lowercase(),
            name: title_case(dir),
            version,
        })
    }

    /// Last version-like substring in the resource path.
    fn version_of(&self, resource: &Resource) -> Option<String> {
        let path = resource.file_path.to_string_lossy();
        self.version
            .captures_iter(&path)
            .last()
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Group classified resources into systems, sorted by id.
    pub fn systems(&self, resources: &[Resource]) -> Vec<System> {
        let mut groups: BTreeMap<&str, Vec<&Resource>> = BTreeMap::new();
        for resource in resources {
            if let Some(info) = &resource.system {
                groups.entry(info.id.as_str()).or_default().push(resource);
            }
        }

        groups
            .into_iter()
            .map(|(id, mut members)| {
                members.sort_by(|a, b| a.id.cmp(&b.id));
                let first = members[0].system.as_ref();
                let name = first.map(|s| s.name.clone()).unwrap_or_else(|| id.to_string());
                let version = members
                    .iter()
                    .find_map(|m| m.system.as_ref().and_then(|s| s.version.clone()));

                let mut counts: BTreeMap<ResourceType, usize> = BTreeMap::new();
                for m in &members {
                    *counts.entry(m.resource_type()).or_default() += 1;
                }

                System {
                    id: id.to_string(),
                    name,
                    version,
                    health: self.health(id, &members),
                    members: members.iter().map(|m| m.id.clone()).collect(),
                    counts,
                }
            })
            .collect()
    }

    fn health(&self, id: &str, members: &[&Resource]) -> SystemHealth {
        if members.iter().any(|m| !m.file_path.exists()) {
            return SystemHealth::Broken;
        }
        if members.iter().any(|m| m.tracking.is_modified) {
            return SystemHealth::Customized;
        }
        if let Some(rule) = self.rules.get(id) {
            let present: BTreeSet<String> = members
                .iter()
                .flat_map(|m| [m.name.clone(), m.qualified_name()])
                .collect();
            if rule.expected.iter().any(|e| !present.contains(e)) {
                return SystemHealth::Partial;
            }
        }
        SystemHealth::Complete
    }
}

fn editable(resource: &Resource) -> bool {
    match resource.scope {
        Scope::Builtin => false,
        Scope::User | Scope::Project => true,
    }
}

/// Parent directory name when it looks like a bundle directory.
fn custom_directory(resource: &Resource) -> Option<&str> {
    if !matches!(
        resource.resource_type(),
        ResourceType::Agent | ResourceType::Command | ResourceType::Hook
    ) {
        return None;
    }
    if let crate::types::ResourceKind::Hook(spec) = &resource.kind {
        if !matches!(spec.source, crate::types::HookSource::Script) {
            return None;
        }
    }

    let dir = resource.file_path.parent()?.file_name()?.to_str()?;
    if GENERIC_DIRS.contains(&dir) {
        return None;
    }
    let valid = !dir.is_empty()
        && dir
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then_some(dir)
}

/// `my-tools` → `My Tools`
fn title_case(dir: &str) -> String {
    dir.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
