//! YAML frontmatter splitting and rendering
//!
//! Markdown resources open with a block delimited by `---` lines:
//!
//! ```text
//! ---
//! name: reviewer
//! tools: Read, Grep
//! ---
//! Body text...
//! ```

use serde_yaml::{Mapping, Value};

/// Placeholder used when neither frontmatter nor body yield a description.
pub const DEFAULT_DESCRIPTION: &str = "No description available";

const DELIMITER: &str = "---";
const DESCRIPTION_SCAN_LINES: usize = 10;
const DESCRIPTION_MIN_CHARS: usize = 10;
const DESCRIPTION_MAX_CHARS: usize = 100;

/// Why a frontmatter block could not be split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontmatterError {
    /// First line is not `---`
    Missing,
    /// Unterminated block, bad YAML, or YAML that is not a mapping
    Invalid(String),
}

/// Split text into its frontmatter mapping and body.
///
/// The body is returned byte-for-byte as it follows the closing delimiter line.
pub fn split(text: &str) -> Result<(Mapping, &str), FrontmatterError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines = text.split_inclusive('\n');
    let first = lines.next().ok_or(FrontmatterError::Missing)?;
    if trim_line_end(first) != DELIMITER {
        return Err(FrontmatterError::Missing);
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if trim_line_end(line) == DELIMITER {
            let yaml = &text[yaml_start..offset];
            let body = &text[offset + line.len()..];
            return Ok((parse_mapping(yaml)?, body));
        }
        offset += line.len();
    }

    Err(FrontmatterError::Invalid(
        "no closing `---` delimiter".to_string(),
    ))
}

fn parse_mapping(yaml: &str) -> Result<Mapping, FrontmatterError> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(map)) => Ok(map),
        Ok(Value::Null) => Ok(Mapping::new()),
        Ok(_) => Err(FrontmatterError::Invalid(
            "frontmatter is not a key/value mapping".to_string(),
        )),
        Err(e) => Err(FrontmatterError::Invalid(e.to_string())),
    }
}

fn trim_line_end(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Render a mapping and body back into frontmatter form.
pub fn render(metadata: &Mapping, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = if metadata.is_empty() {
        String::new()
    } else {
        serde_yaml::to_string(metadata)?
    };
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
}

/// Remove a string key from the mapping.
pub fn take(map: &mut Mapping, key: &str) -> Option<Value> {
    map.remove(key)
}

/// Scalar value as text. Sequences and mappings yield `None`.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Tool lists may be a comma-separated string or a YAML sequence.
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Sequence(items) => items
            .iter()
            .filter_map(scalar_string)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => vec![],
    }
}

/// Remaining keys after the known ones were taken, as ordered extras.
pub fn into_extra(map: Mapping) -> crate::types::ExtraMetadata {
    map.into_iter()
        .filter_map(|(k, v)| scalar_string(&k).map(|k| (k, v)))
        .collect()
}

/// First descriptive sentence-like line of a body.
///
/// Looks at the first non-empty lines, skipping headings and code fences,
/// and returns the first one long enough to be a description.
pub fn infer_description(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(DESCRIPTION_SCAN_LINES)
        .filter(|l| !l.starts_with('#') && !l.starts_with("```") && !l.starts_with("~~~"))
        .find(|l| l.chars().count() > DESCRIPTION_MIN_CHARS)
        .map(truncate_description)
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string())
}

fn truncate_description(line: &str) -> String {
    if line.chars().count() > DESCRIPTION_MAX_CHARS {
        let head: String = line.chars().take(DESCRIPTION_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        line.to_string()
    }
}
