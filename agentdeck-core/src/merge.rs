//! Settings layer merging
//!
//! A project sees one effective settings document built from up to three
//! layers, lowest priority first:
//!
//! | Layer | File |
//! |-------|------|
//! | User | `~/.claude/settings.json` |
//! | Project | `<project>/.claude/settings.json` |
//! | Local | `<project>/.claude/settings.local.json` |
//!
//! Objects merge recursively. Scalars, explicit `null`s and type conflicts
//! take the higher-priority value. Arrays follow an [`ArrayStrategy`].

use crate::error::MergeWarning;
use crate::layout::Layout;
use crate::parse::parse_file;
use crate::types::{
    Location, Permissions, ResourceKind, ResourceType, Scope, SettingsDocument, SettingsLayer,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// How arrays at the same key combine across layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayStrategy {
    /// Higher layer's array replaces the lower one
    #[default]
    Replace,
    /// Lower elements followed by higher elements
    Concat,
    /// Concat, keeping only the first occurrence of each element
    Unique,
}

impl ArrayStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArrayStrategy::Replace => "replace",
            ArrayStrategy::Concat => "concat",
            ArrayStrategy::Unique => "unique",
        }
    }
}

impl std::str::FromStr for ArrayStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(ArrayStrategy::Replace),
            "concat" => Ok(ArrayStrategy::Concat),
            "unique" => Ok(ArrayStrategy::Unique),
            _ => Err(format!("unknown array strategy: {}", s)),
        }
    }
}

impl std::fmt::Display for ArrayStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merge `higher` over `lower`.
pub fn merge_values(lower: &Value, higher: &Value, strategy: ArrayStrategy) -> Value {
    match (lower, higher) {
        (Value::Object(lo), Value::Object(hi)) => {
            let mut out: Map<String, Value> = lo.clone();
            for (key, hv) in hi {
                let merged = match lo.get(key) {
                    Some(lv) => merge_values(lv, hv, strategy),
                    None => hv.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        (Value::Array(lo), Value::Array(hi)) => match strategy {
            ArrayStrategy::Replace => Value::Array(hi.clone()),
            ArrayStrategy::Concat => Value::Array(lo.iter().chain(hi).cloned().collect()),
            ArrayStrategy::Unique => {
                let mut out: Vec<Value> = Vec::with_capacity(lo.len() + hi.len());
                for v in lo.iter().chain(hi) {
                    if !out.contains(v) {
                        out.push(v.clone());
                    }
                }
                Value::Array(out)
            }
        },
        (_, hv) => hv.clone(),
    }
}

/// Fold layers left to right, each one higher priority than the last.
pub fn merge_all<'a>(layers: impl IntoIterator<Item = &'a Value>, strategy: ArrayStrategy) -> Value {
    layers
        .into_iter()
        .fold(Value::Object(Map::new()), |acc, layer| {
            merge_values(&acc, layer, strategy)
        })
}

/// One settings layer consulted during a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsSource {
    pub layer: SettingsLayer,
    pub path: PathBuf,
    pub exists: bool,
    /// False when the layer was excluded because it failed to parse
    pub applied: bool,
}

/// Merged settings view for one project.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSettings {
    pub value: Value,
    pub sources: Vec<SettingsSource>,
    pub warnings: Vec<MergeWarning>,
}

impl EffectiveSettings {
    /// Typed view of the well-known keys.
    pub fn document(&self) -> SettingsDocument {
        SettingsDocument::from_value(&self.value)
    }

    pub fn permissions(&self) -> Permissions {
        self.document().permissions.unwrap_or_default()
    }

    /// Value at a dotted key path, e.g. `permissions.allow`.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        dotted
            .split('.')
            .try_fold(&self.value, |v, key| v.get(key))
    }
}

/// Builds effective settings from the layered files.
#[derive(Debug, Clone)]
pub struct SettingsMerger {
    layout: Layout,
    strategy: ArrayStrategy,
}

impl SettingsMerger {
    pub fn new(layout: Layout, strategy: ArrayStrategy) -> Self {
        Self { layout, strategy }
    }

    pub fn strategy(&self) -> ArrayStrategy {
        self.strategy
    }

    /// Read and merge the user, project and local layers for `project`.
    ///
    /// Missing files count as empty layers. A layer that fails to parse is
    /// left out and reported as a [`MergeWarning`]. When `project` is the home
    /// directory only the user layer applies.
    pub fn effective_settings(&self, project: &Path) -> EffectiveSettings {
        let mut values = Vec::new();
        let mut sources = Vec::new();
        let mut warnings = Vec::new();

        let is_home = project
            .canonicalize()
            .map(|p| p == self.layout.home())
            .unwrap_or(false);
        let layers: &[SettingsLayer] = if is_home {
            tracing::debug!(project = %project.display(), "Project is the home directory, using user layer only");
            &[SettingsLayer::User]
        } else {
            &[SettingsLayer::User, SettingsLayer::Project, SettingsLayer::Local]
        };

        for &layer in layers {
            let path = self.layout.settings_path(layer, project);
            let location = Location {
                resource_type: ResourceType::Settings,
                scope: match layer {
                    SettingsLayer::User => Scope::User,
                    SettingsLayer::Project | SettingsLayer::Local => Scope::Project,
                },
                project_path: match layer {
                    SettingsLayer::User => None,
                    _ => Some(project.to_path_buf()),
                },
                type_root: path.parent().map(Path::to_path_buf).unwrap_or_default(),
                namespace: None,
                settings_layer: Some(layer),
            };

            match parse_file(&path, &location) {
                Ok(resource) => {
                    if let ResourceKind::Settings(spec) = resource.kind {
                        sources.push(SettingsSource {
                            layer,
                            path,
                            exists: spec.exists,
                            applied: true,
                        });
                        values.push(spec.value);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        layer = %layer,
                        path = %path.display(),
                        error = %e,
                        "Settings layer excluded from merge"
                    );
                    warnings.push(MergeWarning {
                        layer: layer.to_string(),
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                    sources.push(SettingsSource {
                        layer,
                        path,
                        exists: true,
                        applied: false,
                    });
                }
            }
        }

        EffectiveSettings {
            value: merge_all(&values, self.strategy),
            sources,
            warnings,
        }
    }
}
