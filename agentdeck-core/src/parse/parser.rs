//! Parser trait abstraction
//!
//! Every resource type has a parser implementing [`ResourceParser`]. Parsers
//! turn one classified file into one [`Resource`]; failures are returned as
//! [`ParseError`] values that the caller records and moves past.

use crate::error::{ParseError, ParseErrorKind};
use crate::layout::resource_key;
use crate::types::{Location, Resource, ResourceId, ResourceKind, ResourceType, Scope};
use chrono::{DateTime, Utc};
use std::path::Path;

/// File metadata handed to a parser.
pub struct ParseContext<'a> {
    /// Path of the file as found by the scanner
    pub path: &'a Path,
    /// Classification of the path
    pub location: &'a Location,
    /// Last modified time, if known
    pub modified_at: Option<DateTime<Utc>>,
}

impl<'a> ParseContext<'a> {
    pub fn new(path: &'a Path, location: &'a Location) -> Self {
        let modified_at = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        Self {
            path,
            location,
            modified_at,
        }
    }

    /// Id for the resource at this location.
    pub fn resource_id(&self) -> ResourceId {
        ResourceId::derive(
            self.location.resource_type,
            self.location.scope,
            self.location.project_path.as_deref(),
            &resource_key(self.location, self.path),
        )
    }

    /// File stem, used as the fallback resource name.
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn error(&self, kind: ParseErrorKind, message: impl Into<String>) -> ParseError {
        ParseError::new(self.path, kind, message)
    }

    /// Assemble the shared envelope around a payload.
    pub fn resource(
        &self,
        name: String,
        description: String,
        content: Option<String>,
        kind: ResourceKind,
    ) -> Resource {
        Resource {
            id: self.resource_id(),
            name,
            description,
            scope: self.location.scope,
            project_path: self.location.project_path.clone(),
            file_path: self.path.to_path_buf(),
            content,
            modified_at: self.modified_at,
            system: None,
            is_editable: self.location.scope != Scope::Builtin,
            tracking: Default::default(),
            kind,
        }
    }
}

/// Trait implemented by all resource parsers.
pub trait ResourceParser: Send + Sync {
    /// Which resource type this parser produces
    fn resource_type(&self) -> ResourceType;

    /// Parse already-loaded file text.
    fn parse_str(&self, ctx: &ParseContext, text: &str) -> Result<Resource, ParseError>;

    /// Read the file and parse it.
    ///
    /// The default reads UTF-8 text and delegates to [`Self::parse_str`].
    fn parse(&self, ctx: &ParseContext) -> Result<Resource, ParseError> {
        let text = std::fs::read_to_string(ctx.path)
            .map_err(|e| ctx.error(ParseErrorKind::Unreadable, e.to_string()))?;
        self.parse_str(ctx, &text)
    }
}
