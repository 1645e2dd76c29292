//! Resource parsing
//!
//! Turns classified files into [`Resource`] values and renders resources back
//! into file text.
//!
//! ## Flow
//!
//! ```text
//! path ──Layout::classify──▶ Location ──parser_for(type)──▶ ResourceParser::parse ──▶ Resource
//! ```
//!
//! Parsing is pure with respect to the file contents: the same bytes at the
//! same location always produce the same resource.

pub mod frontmatter;
mod parser;
pub mod parsers;

pub use parser::{ParseContext, ResourceParser};
pub use parsers::{create_all_parsers, parser_for, settings_hooks};

use crate::error::{Error, ParseError, Result};
use crate::types::{HookSource, Location, Resource, ResourceKind};
use std::path::Path;

/// Parse one file at a known location.
pub fn parse_file(path: &Path, location: &Location) -> std::result::Result<Resource, ParseError> {
    let ctx = ParseContext::new(path, location);
    parser_for(location.resource_type).parse(&ctx)
}

/// Parse file text as if it were at `path`.
pub fn parse_str(
    path: &Path,
    location: &Location,
    text: &str,
) -> std::result::Result<Resource, ParseError> {
    let ctx = ParseContext {
        path,
        location,
        modified_at: None,
    };
    parser_for(location.resource_type).parse_str(&ctx, text)
}

/// Render a resource to the text its file would contain.
///
/// Markdown resources are re-rendered from their fields; settings are written
/// as pretty JSON; hook scripts are returned verbatim. Hooks embedded in a
/// settings file have no file of their own.
pub fn serialize(resource: &Resource) -> Result<String> {
    match &resource.kind {
        ResourceKind::Agent(_) | ResourceKind::Command(_) | ResourceKind::ProjectMarker(_) => {
            Ok(parsers::render_markdown(resource)?)
        }
        ResourceKind::Settings(spec) => {
            let mut text = serde_json::to_string_pretty(&spec.value)?;
            text.push('\n');
            Ok(text)
        }
        ResourceKind::Hook(spec) => match spec.source {
            HookSource::Script => Ok(resource.content.clone().unwrap_or_default()),
            HookSource::Settings { .. } => Err(Error::Unsupported(format!(
                "hook {} lives inside a settings file",
                resource.id
            ))),
        },
    }
}

impl Resource {
    /// Read the file body into `content` if it is not loaded yet.
    pub fn load_content(&mut self) -> Result<()> {
        if self.content.is_some() {
            return Ok(());
        }
        if let ResourceKind::Hook(spec) = &self.kind {
            if matches!(spec.source, HookSource::Settings { .. }) {
                return Ok(());
            }
        }
        let text = std::fs::read_to_string(&self.file_path)?;
        let body = match &self.kind {
            ResourceKind::Agent(_) | ResourceKind::Command(_) => frontmatter::split(&text)
                .map(|(_, body)| body.to_string())
                .unwrap_or(text),
            ResourceKind::ProjectMarker(_) => match frontmatter::split(&text) {
                Ok((_, body)) => body.to_string(),
                Err(_) => text,
            },
            _ => text,
        };
        self.content = Some(body);
        Ok(())
    }
}
