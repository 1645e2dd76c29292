//! Standalone hook scripts under `.claude/hooks`

use crate::error::ParseError;
use crate::parse::frontmatter::infer_description;
use crate::parse::parser::{ParseContext, ResourceParser};
use crate::types::{HookAction, HookSource, HookSpec, Resource, ResourceKind, ResourceType};

/// Parser for hook script files.
///
/// Scripts carry no structured metadata; the description comes from the
/// leading comment block.
pub struct HookScriptParser;

impl ResourceParser for HookScriptParser {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Hook
    }

    fn parse_str(&self, ctx: &ParseContext, text: &str) -> Result<Resource, ParseError> {
        let name = ctx
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let spec = HookSpec {
            event: String::new(),
            matcher: None,
            actions: vec![HookAction {
                action_type: "command".to_string(),
                command: Some(ctx.path.display().to_string()),
                timeout: None,
            }],
            source: HookSource::Script,
        };

        Ok(ctx.resource(
            name,
            infer_description(&leading_comments(text)),
            Some(text.to_string()),
            ResourceKind::Hook(spec),
        ))
    }
}

/// Text of the comment lines at the top of a script, markers stripped.
fn leading_comments(text: &str) -> String {
    text.lines()
        .skip_while(|l| l.starts_with("#!"))
        .map(str::trim)
        .take_while(|l| l.is_empty() || l.starts_with('#') || l.starts_with("//"))
        .map(|l| l.trim_start_matches(['#', '/']).trim())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use crate::parse::frontmatter::DEFAULT_DESCRIPTION;
    use std::path::Path;

    fn parse(text: &str) -> Resource {
        let layout = Layout::new("/home/u");
        let path = Path::new("/p/.claude/hooks/guard.sh");
        let location = layout.classify(path).unwrap();
        let ctx = ParseContext {
            path,
            location: &location,
            modified_at: None,
        };
        HookScriptParser.parse_str(&ctx, text).unwrap()
    }

    #[test]
    fn test_description_from_comments() {
        let r = parse("#!/bin/bash\n# Blocks dangerous shell commands\nexit 0\n");
        assert_eq!(r.name, "guard.sh");
        assert_eq!(r.description, "Blocks dangerous shell commands");
        let ResourceKind::Hook(spec) = &r.kind else {
            panic!("expected hook");
        };
        assert_eq!(spec.source, HookSource::Script);
    }

    #[test]
    fn test_no_comments() {
        let r = parse("#!/bin/sh\nexit 0\n");
        assert_eq!(r.description, DEFAULT_DESCRIPTION);
    }
}
