//! Markdown resources: agents, commands and `CLAUDE.md` markers
//!
//! Agents and commands require frontmatter. Markers may omit it, in which case
//! the whole file is the body.

use crate::error::{ParseError, ParseErrorKind};
use crate::parse::frontmatter::{
    self, infer_description, into_extra, scalar_string, string_list, take, FrontmatterError,
};
use crate::parse::parser::{ParseContext, ResourceParser};
use crate::types::{
    AgentSpec, CommandSpec, MarkerSpec, Resource, ResourceKind, ResourceType, Scope,
};
use serde_yaml::{Mapping, Value};

fn split_required<'t>(
    ctx: &ParseContext,
    text: &'t str,
) -> Result<(Mapping, &'t str), ParseError> {
    frontmatter::split(text).map_err(|e| match e {
        FrontmatterError::Missing => ctx.error(
            ParseErrorKind::MissingFrontmatter,
            "file does not start with `---`",
        ),
        FrontmatterError::Invalid(msg) => ctx.error(ParseErrorKind::InvalidFrontmatter, msg),
    })
}

fn take_string(map: &mut Mapping, key: &str) -> Option<String> {
    take(map, key)
        .as_ref()
        .and_then(scalar_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn take_list(map: &mut Mapping, key: &str) -> Vec<String> {
    take(map, key).as_ref().map(string_list).unwrap_or_default()
}

/// Parser for `.claude/agents/**/*.md`.
pub struct AgentParser;

impl ResourceParser for AgentParser {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Agent
    }

    fn parse_str(&self, ctx: &ParseContext, text: &str) -> Result<Resource, ParseError> {
        let (mut meta, body) = split_required(ctx, text)?;

        let name = take_string(&mut meta, "name").unwrap_or_else(|| ctx.file_stem());
        let description =
            take_string(&mut meta, "description").unwrap_or_else(|| infer_description(body));
        let spec = AgentSpec {
            tools: take_list(&mut meta, "tools"),
            color: take_string(&mut meta, "color"),
            model: take_string(&mut meta, "model"),
            extra: into_extra(meta),
        };

        Ok(ctx.resource(
            name,
            description,
            Some(body.to_string()),
            ResourceKind::Agent(spec),
        ))
    }
}

/// Parser for `.claude/commands/**/*.md`.
///
/// The command name is always the file stem; the directory path below the
/// commands root becomes the namespace.
pub struct CommandParser;

impl ResourceParser for CommandParser {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Command
    }

    fn parse_str(&self, ctx: &ParseContext, text: &str) -> Result<Resource, ParseError> {
        let (mut meta, body) = split_required(ctx, text)?;

        let description =
            take_string(&mut meta, "description").unwrap_or_else(|| infer_description(body));
        let spec = CommandSpec {
            namespace: ctx.location.namespace.clone(),
            allowed_tools: take_list(&mut meta, "allowed-tools"),
            argument_hint: take_string(&mut meta, "argument-hint"),
            model: take_string(&mut meta, "model"),
            extra: into_extra(meta),
        };

        Ok(ctx.resource(
            ctx.file_stem(),
            description,
            Some(body.to_string()),
            ResourceKind::Command(spec),
        ))
    }
}

/// Parser for `CLAUDE.md` project markers.
pub struct MarkerParser;

impl ResourceParser for MarkerParser {
    fn resource_type(&self) -> ResourceType {
        ResourceType::ProjectMarker
    }

    fn parse_str(&self, ctx: &ParseContext, text: &str) -> Result<Resource, ParseError> {
        let (mut meta, body) = match frontmatter::split(text) {
            Ok(parts) => parts,
            Err(FrontmatterError::Missing) => (Mapping::new(), text),
            Err(FrontmatterError::Invalid(msg)) => {
                tracing::debug!(path = %ctx.path.display(), error = %msg, "Marker frontmatter ignored");
                (Mapping::new(), text)
            }
        };

        let project_name = match (&ctx.location.project_path, ctx.location.scope) {
            (Some(p), _) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string()),
            (None, Scope::User) => "user".to_string(),
            (None, _) => ctx
                .location
                .type_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let description =
            take_string(&mut meta, "description").unwrap_or_else(|| infer_description(body));

        Ok(ctx.resource(
            project_name.clone(),
            description,
            Some(body.to_string()),
            ResourceKind::ProjectMarker(MarkerSpec { project_name }),
        ))
    }
}

/// Render a markdown resource back to file text.
///
/// Known fields come first in a fixed order, followed by preserved extras.
/// An unloaded body renders as empty.
pub fn render(resource: &Resource) -> Result<String, serde_yaml::Error> {
    let mut meta = Mapping::new();
    let mut put = |k: &str, v: Value| {
        meta.insert(Value::String(k.to_string()), v);
    };
    let list = |items: &[String]| Value::Sequence(items.iter().map(|t| Value::from(t.as_str())).collect());

    match &resource.kind {
        ResourceKind::Agent(spec) => {
            put("name", resource.name.as_str().into());
            put("description", resource.description.as_str().into());
            if !spec.tools.is_empty() {
                put("tools", list(&spec.tools));
            }
            if let Some(color) = &spec.color {
                put("color", color.as_str().into());
            }
            if let Some(model) = &spec.model {
                put("model", model.as_str().into());
            }
            for (k, v) in &spec.extra {
                put(k.as_str(), v.clone());
            }
        }
        ResourceKind::Command(spec) => {
            put("description", resource.description.as_str().into());
            if !spec.allowed_tools.is_empty() {
                put("allowed-tools", list(&spec.allowed_tools));
            }
            if let Some(hint) = &spec.argument_hint {
                put("argument-hint", hint.as_str().into());
            }
            if let Some(model) = &spec.model {
                put("model", model.as_str().into());
            }
            for (k, v) in &spec.extra {
                put(k.as_str(), v.clone());
            }
        }
        ResourceKind::ProjectMarker(_) => {
            put("description", resource.description.as_str().into());
        }
        ResourceKind::Hook(_) | ResourceKind::Settings(_) => {}
    }

    frontmatter::render(&meta, resource.content.as_deref().unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use std::path::Path;

    fn parse_with(parser: &dyn ResourceParser, path: &str, text: &str) -> Result<Resource, ParseError> {
        let layout = Layout::new("/home/u");
        let path = Path::new(path);
        let location = layout.classify(path).unwrap();
        let ctx = ParseContext {
            path,
            location: &location,
            modified_at: None,
        };
        parser.parse_str(&ctx, text)
    }

    #[test]
    fn test_agent_full_frontmatter() {
        let r = parse_with(
            &AgentParser,
            "/p/.claude/agents/reviewer.md",
            "---\nname: code-reviewer\ndescription: Reviews code\ntools: Read, Grep\ncolor: blue\nmodel: sonnet\npriority: 3\n---\nYou review code.\n",
        )
        .unwrap();
        assert_eq!(r.name, "code-reviewer");
        assert_eq!(r.description, "Reviews code");
        assert_eq!(r.content.as_deref(), Some("You review code.\n"));
        assert_eq!(r.scope, Scope::Project);
        let ResourceKind::Agent(spec) = &r.kind else {
            panic!("expected agent");
        };
        assert_eq!(spec.tools, vec!["Read", "Grep"]);
        assert_eq!(spec.color.as_deref(), Some("blue"));
        assert_eq!(spec.model.as_deref(), Some("sonnet"));
        assert_eq!(spec.extra.get("priority").and_then(Value::as_u64), Some(3));
        assert!(r.is_editable);
    }

    #[test]
    fn test_agent_name_falls_back_to_stem() {
        let r = parse_with(
            &AgentParser,
            "/home/u/.claude/agents/helper.md",
            "---\ndescription: Helps\n---\nbody\n",
        )
        .unwrap();
        assert_eq!(r.name, "helper");
        assert_eq!(r.scope, Scope::User);
    }

    #[test]
    fn test_agent_description_inferred() {
        let r = parse_with(
            &AgentParser,
            "/p/.claude/agents/a.md",
            "---\nname: a\n---\n# Heading\n\nThis agent handles migrations.\n",
        )
        .unwrap();
        assert_eq!(r.description, "This agent handles migrations.");
    }

    #[test]
    fn test_agent_missing_frontmatter() {
        let err = parse_with(&AgentParser, "/p/.claude/agents/a.md", "# Just markdown\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingFrontmatter);
    }

    #[test]
    fn test_agent_unclosed_frontmatter() {
        let err = parse_with(&AgentParser, "/p/.claude/agents/a.md", "---\nname: a\nbody\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidFrontmatter);
    }

    #[test]
    fn test_command_namespace_and_name() {
        let r = parse_with(
            &CommandParser,
            "/p/.claude/commands/git/commit.md",
            "---\nname: ignored\ndescription: Commit changes\nallowed-tools:\n  - Bash\nargument-hint: \"[message]\"\n---\nRun git commit.\n",
        )
        .unwrap();
        assert_eq!(r.name, "commit");
        assert_eq!(r.qualified_name(), "git/commit");
        let ResourceKind::Command(spec) = &r.kind else {
            panic!("expected command");
        };
        assert_eq!(spec.namespace.as_deref(), Some("git"));
        assert_eq!(spec.allowed_tools, vec!["Bash"]);
        assert_eq!(spec.argument_hint.as_deref(), Some("[message]"));
        assert!(spec.extra.contains_key("name"));
    }

    #[test]
    fn test_marker_without_frontmatter() {
        let r = parse_with(
            &MarkerParser,
            "/work/app/CLAUDE.md",
            "# App\n\nGuidance for working in this repository.\n",
        )
        .unwrap();
        assert_eq!(r.name, "app");
        assert_eq!(r.description, "Guidance for working in this repository.");
        let ResourceKind::ProjectMarker(spec) = &r.kind else {
            panic!("expected marker");
        };
        assert_eq!(spec.project_name, "app");
    }

    #[test]
    fn test_render_round_trip() {
        let original = parse_with(
            &AgentParser,
            "/p/.claude/agents/reviewer.md",
            "---\nname: reviewer\ndescription: 'Reviews: carefully'\ntools: [Read]\nextra_key: {a: 1}\n---\nbody line\n",
        )
        .unwrap();
        let text = render(&original).unwrap();
        let reparsed = parse_with(&AgentParser, "/p/.claude/agents/reviewer.md", &text).unwrap();
        assert_eq!(reparsed, original);
    }

    #[test]
    fn test_render_round_trip_command() {
        let original = parse_with(
            &CommandParser,
            "/p/.claude/commands/sc/build.md",
            "---\ndescription: Build it\nmodel: opus\n---\n\nSteps.\n",
        )
        .unwrap();
        let text = render(&original).unwrap();
        let reparsed = parse_with(&CommandParser, "/p/.claude/commands/sc/build.md", &text).unwrap();
        assert_eq!(reparsed, original);
    }
}
