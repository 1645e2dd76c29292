//! System rule tables
//!
//! Rules are TOML data. The default table is compiled into the binary; a
//! config file may point `systems.rules_path` at a replacement.

use crate::config::SystemsConfig;
use crate::error::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_RULES: &str = include_str!("../../rules/systems.toml");

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default, rename = "system")]
    systems: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    id: String,
    name: String,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    path_patterns: Vec<String>,
    #[serde(default)]
    description_patterns: Vec<String>,
    #[serde(default)]
    expected: Vec<String>,
}

/// One compiled system rule.
#[derive(Debug, Clone)]
pub struct SystemRule {
    pub id: String,
    pub name: String,
    /// Resource names (or `namespace/name`) that belong to this system
    pub names: Vec<String>,
    pub path_patterns: Vec<glob::Pattern>,
    pub description_patterns: Vec<Regex>,
    /// Members a complete install provides
    pub expected: Vec<String>,
}

impl SystemRule {
    /// Whether a resource with these attributes belongs to the system.
    pub fn matches(&self, name: &str, qualified_name: &str, path: &Path, description: &str) -> bool {
        if self
            .names
            .iter()
            .any(|n| n == name || n == qualified_name)
        {
            return true;
        }

        let path = path.to_string_lossy();
        let relative = path.trim_start_matches('/');
        if self.path_patterns.iter().any(|p| p.matches(relative)) {
            return true;
        }

        self.description_patterns
            .iter()
            .any(|re| re.is_match(description))
    }
}

/// Ordered set of system rules; first match wins.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<SystemRule>,
}

impl RuleSet {
    /// The rule table shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_toml(DEFAULT_RULES)
    }

    /// Parse and compile a rule table.
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: RuleFile = toml::from_str(text)
            .map_err(|e| Error::Config(format!("failed to parse system rules: {}", e)))?;

        let rules = file
            .systems
            .into_iter()
            .map(compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Load a rule table from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read system rules {:?}: {}", path, e))
        })?;
        Self::from_toml(&text)
    }

    /// The configured table, or the builtin one.
    pub fn from_config(config: &SystemsConfig) -> Result<Self> {
        match &config.rules_path {
            Some(path) => {
                let path = crate::config::expand_tilde(path);
                tracing::debug!(path = %path.display(), "Loading system rules");
                Self::load(&path)
            }
            None => Self::builtin(),
        }
    }

    pub fn rules(&self) -> &[SystemRule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&SystemRule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

fn compile(entry: RuleEntry) -> Result<SystemRule> {
    let path_patterns = entry
        .path_patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| {
                Error::Config(format!("system {}: bad path pattern {:?}: {}", entry.id, p, e))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let description_patterns = entry
        .description_patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| {
                Error::Config(format!(
                    "system {}: bad description pattern {:?}: {}",
                    entry.id, p, e
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SystemRule {
        id: entry.id,
        name: entry.name,
        names: entry.names,
        path_patterns,
        description_patterns,
        expected: entry.expected,
    })
}
