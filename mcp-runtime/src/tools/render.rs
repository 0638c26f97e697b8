//! Shared text-rendering pieces for tool output.

use std::fmt::Display;

use arc_mcp_core::format::{MASK, NOT_SET, is_secret_key, pluralize};
use arc_mcp_core::{EntityKey, Record, Resource};
use serde_json::Value;

use super::ToolOutput;

pub fn line(label: &str, value: impl Display) -> String {
    format!("  {label}: {value}")
}

pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn count_phrase(count: usize, resource: Resource) -> String {
    pluralize(count, resource.noun(), resource.plural())
}

/// `Found N <plural>:` followed by one block per entity.
pub fn found(resource: Resource, blocks: Vec<String>) -> ToolOutput {
    let header = format!("Found {}:", count_phrase(blocks.len(), resource));
    ToolOutput::text(format!("{header}\n\n{}", blocks.join("\n\n")))
}

pub fn no_results(resource: Resource, filter: Option<&str>) -> ToolOutput {
    match filter {
        Some(filter) => ToolOutput::text(format!(
            "No {} found matching filter: {filter}",
            resource.plural()
        )),
        None => ToolOutput::text(format!("No {} found.", resource.plural())),
    }
}

pub fn not_found(resource: Resource, key: &EntityKey) -> ToolOutput {
    ToolOutput::text(format!("{} {key} not found.", capitalize(resource.noun())))
}

pub fn more_marker(remaining: usize) -> Option<String> {
    (remaining > 0).then(|| format!("... and {remaining} more"))
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => NOT_SET.to_string(),
        Value::String(s) if s.trim().is_empty() => NOT_SET.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Every property of `record`, sorted by key. OData annotations are skipped.
pub fn property_lines(record: &Record, mask_secrets: bool) -> Vec<String> {
    let mut entries: Vec<(&str, &Value)> = record
        .iter()
        .filter(|(key, _)| !key.starts_with("@odata"))
        .collect();
    entries.sort_by_key(|(key, _)| key.to_ascii_lowercase());
    entries
        .into_iter()
        .map(|(key, value)| {
            if mask_secrets && is_secret_key(key) && !value.is_null() {
                line(key, MASK)
            } else {
                line(key, display_value(value))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn property_lines_sort_mask_and_skip_annotations() {
        let record = Record::from_value(json!({
            "smtppassword": "hunter2",
            "Description": "",
            "@odata.type": "#x",
            "alpha": 3
        }))
        .unwrap();
        assert_eq!(
            property_lines(&record, true),
            vec![
                "  alpha: 3".to_string(),
                "  Description: Not set".to_string(),
                "  smtppassword: ********".to_string(),
            ]
        );
    }

    #[test]
    fn not_found_names_the_key() {
        let output = not_found(Resource::Connectors, &EntityKey::single("AS2Out"));
        assert_eq!(output.text, "Connector 'AS2Out' not found.");
        assert!(!output.is_error);
    }

    #[test]
    fn more_marker_only_when_truncated() {
        assert_eq!(more_marker(0), None);
        assert_eq!(more_marker(4).as_deref(), Some("... and 4 more"));
    }
}
