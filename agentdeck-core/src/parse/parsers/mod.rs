//! Type-specific parsers
//!
//! | Resource type | Parser |
//! |---------------|--------|
//! | Agent | [`AgentParser`] |
//! | Command | [`CommandParser`] |
//! | Hook (script) | [`HookScriptParser`] |
//! | Hook (settings entry) | [`settings_hooks`] |
//! | Project marker | [`MarkerParser`] |
//! | Settings | [`SettingsParser`] |

mod hook;
mod markdown;
mod settings;

pub use hook::HookScriptParser;
pub use markdown::{render as render_markdown, AgentParser, CommandParser, MarkerParser};
pub use settings::{settings_hooks, SettingsParser};

use super::ResourceParser;
use crate::types::ResourceType;

/// Create all available parsers.
pub fn create_all_parsers() -> Vec<Box<dyn ResourceParser>> {
    ResourceType::ALL.into_iter().map(parser_for).collect()
}

/// Get the parser for a resource type.
pub fn parser_for(resource_type: ResourceType) -> Box<dyn ResourceParser> {
    match resource_type {
        ResourceType::Agent => Box::new(AgentParser),
        ResourceType::Command => Box::new(CommandParser),
        ResourceType::Hook => Box::new(HookScriptParser),
        ResourceType::ProjectMarker => Box::new(MarkerParser),
        ResourceType::Settings => Box::new(SettingsParser),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_all_parsers() {
        let parsers = create_all_parsers();
        assert_eq!(parsers.len(), ResourceType::ALL.len());
    }

    #[test]
    fn test_parser_for_matches_type() {
        for t in ResourceType::ALL {
            assert_eq!(parser_for(t).resource_type(), t);
        }
    }
}
