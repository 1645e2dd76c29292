//! Settings files (`settings.json`, `settings.local.json`)
//!
//! A missing settings file is not an error: it parses to an empty document
//! with `exists = false` so the merge can treat it as an empty layer.

use crate::error::{ParseError, ParseErrorKind};
use crate::parse::parser::{ParseContext, ResourceParser};
use crate::types::{
    HookSource, HookSpec, Resource, ResourceId, ResourceKind, ResourceType, SettingsLayer,
    SettingsSpec,
};
use serde_json::Value;

/// Parser for settings layers.
pub struct SettingsParser;

impl SettingsParser {
    fn layer(ctx: &ParseContext) -> SettingsLayer {
        ctx.location.settings_layer.unwrap_or(SettingsLayer::Project)
    }

    fn build(&self, ctx: &ParseContext, exists: bool, value: Value, raw: Option<String>) -> Resource {
        let layer = Self::layer(ctx);
        let name = ctx
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| layer.file_name().to_string());
        let description = match layer {
            SettingsLayer::User => "User settings",
            SettingsLayer::Project => "Project settings",
            SettingsLayer::Local => "Local project settings",
        };
        ctx.resource(
            name,
            description.to_string(),
            raw,
            ResourceKind::Settings(SettingsSpec {
                layer,
                exists,
                value,
            }),
        )
    }
}

impl ResourceParser for SettingsParser {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Settings
    }

    fn parse_str(&self, ctx: &ParseContext, text: &str) -> Result<Resource, ParseError> {
        let value: Value = if text.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(text)
                .map_err(|e| ctx.error(ParseErrorKind::InvalidJson, e.to_string()))?
        };
        if !value.is_object() {
            return Err(ctx.error(
                ParseErrorKind::InvalidJson,
                "settings document must be a JSON object",
            ));
        }
        Ok(self.build(ctx, true, value, Some(text.to_string())))
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Resource, ParseError> {
        match std::fs::read_to_string(ctx.path) {
            Ok(text) => self.parse_str(ctx, &text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(self.build(
                ctx,
                false,
                Value::Object(Default::default()),
                None,
            )),
            Err(e) => Err(ctx.error(ParseErrorKind::Unreadable, e.to_string())),
        }
    }
}

/// Expand the hook matchers inside a settings resource into hook resources.
///
/// Each matcher entry becomes one hook keyed `{layer}/{event}/{index}`.
/// Returns an empty list for non-settings resources.
pub fn settings_hooks(settings: &Resource) -> Vec<Resource> {
    let ResourceKind::Settings(spec) = &settings.kind else {
        return vec![];
    };

    let mut hooks = Vec::new();
    for (event, matchers) in spec.document().hooks {
        for (index, matcher) in matchers.into_iter().enumerate() {
            let key = format!("{}/{}/{}", spec.layer, event, index);
            let label = if matcher.matcher.is_empty() {
                "*"
            } else {
                matcher.matcher.as_str()
            };
            let description = matcher
                .hooks
                .iter()
                .find_map(|a| a.command.clone())
                .unwrap_or_else(|| format!("{} hook", event));

            hooks.push(Resource {
                id: ResourceId::derive(
                    ResourceType::Hook,
                    settings.scope,
                    settings.project_path.as_deref(),
                    &key,
                ),
                name: format!("{}:{}", event, label),
                description,
                scope: settings.scope,
                project_path: settings.project_path.clone(),
                file_path: settings.file_path.clone(),
                content: None,
                modified_at: settings.modified_at,
                system: None,
                is_editable: settings.is_editable,
                tracking: Default::default(),
                kind: ResourceKind::Hook(HookSpec {
                    event: event.clone(),
                    matcher: Some(matcher.matcher.clone()),
                    actions: matcher.hooks,
                    source: HookSource::Settings {
                        settings_path: settings.file_path.clone(),
                        index,
                    },
                }),
            });
        }
    }
    hooks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use std::path::Path;

    fn parse(path: &Path) -> Result<Resource, ParseError> {
        let layout = Layout::new("/home/u");
        let location = layout.classify(path).unwrap();
        let ctx = ParseContext::new(path, &location);
        SettingsParser.parse(&ctx)
    }

    #[test]
    fn test_missing_settings_is_empty_layer() {
        let r = parse(Path::new("/nonexistent/p/.claude/settings.local.json")).unwrap();
        let ResourceKind::Settings(spec) = &r.kind else {
            panic!("expected settings");
        };
        assert!(!spec.exists);
        assert_eq!(spec.layer, SettingsLayer::Local);
        assert_eq!(spec.value, serde_json::json!({}));
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let claude = dir.path().join(".claude");
        std::fs::create_dir_all(&claude).unwrap();
        let path = claude.join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = parse(&path).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidJson);
    }

    #[test]
    fn test_non_object_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let claude = dir.path().join(".claude");
        std::fs::create_dir_all(&claude).unwrap();
        let path = claude.join("settings.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        assert_eq!(parse(&path).unwrap_err().kind, ParseErrorKind::InvalidJson);
    }

    #[test]
    fn test_settings_hooks_expansion() {
        let dir = tempfile::tempdir().unwrap();
        let claude = dir.path().join(".claude");
        std::fs::create_dir_all(&claude).unwrap();
        let path = claude.join("settings.json");
        std::fs::write(
            &path,
            r#"{"hooks": {"PreToolUse": [
                {"matcher": "Bash", "hooks": [{"type": "command", "command": "./check.sh"}]},
                {"matcher": "", "hooks": [{"type": "command", "command": "log"}]}
            ]}}"#,
        )
        .unwrap();

        let settings = parse(&path).unwrap();
        let hooks = settings_hooks(&settings);
        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks[0].name, "PreToolUse:Bash");
        assert_eq!(hooks[0].description, "./check.sh");
        assert_eq!(hooks[1].name, "PreToolUse:*");
        assert!(hooks[1].id.as_str().ends_with(":project/PreToolUse/1"));
        let ResourceKind::Hook(spec) = &hooks[0].kind else {
            panic!("expected hook");
        };
        assert_eq!(
            spec.source,
            HookSource::Settings {
                settings_path: path.clone(),
                index: 0
            }
        );
    }
}
