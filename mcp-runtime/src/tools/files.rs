use arc_mcp_core::fields::FileField;
use arc_mcp_core::format::{NOT_AVAILABLE, UNKNOWN, format_bytes, format_timestamp, truncate};
use arc_mcp_core::{EntityKey, Field, FilterBuilder, QueryOptions, Record, Resource};
use serde_json::{Map, Value, json};

use super::actions::decode_base64;
use super::render::{count_phrase, found, line, no_results, not_found};
use super::{ToolContext, ToolDefinition, ToolOutput, ToolResult, scoped_query};
use crate::args::{
    DEFAULT_LIST_TOP, DEFAULT_RECENT_TOP, arg_bool, arg_hours, arg_optional_string, arg_top,
    required_string,
};
use crate::error::ToolError;

const CONTENT_PREVIEW_CHARS: usize = 2000;

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_files",
            description: "List files held by connectors, optionally for one connector and folder (Send, Receive, Sent).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "folder": { "type": "string", "description": "Send, Receive or Sent" },
                    "filter": { "type": "string", "description": "OData $filter expression" },
                    "select": { "type": "string" },
                    "orderby": { "type": "string" },
                    "top": { "type": "integer", "minimum": 1, "default": 50 },
                    "skip": { "type": "integer", "minimum": 0 }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_file",
            description: "Show one file. Files are identified by connector, folder, filename and message id together.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "folder": { "type": "string" },
                    "filename": { "type": "string" },
                    "messageId": { "type": "string" },
                    "includeContent": { "type": "boolean", "default": false, "description": "Decode and preview the file content" }
                },
                "required": ["connectorId", "folder", "filename", "messageId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_recent_files",
            description: "Files created in the last N hours, newest first.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "hours": { "type": "integer", "minimum": 1, "default": 24 },
                    "connectorId": { "type": "string" },
                    "folder": { "type": "string" },
                    "top": { "type": "integer", "minimum": 1, "default": 100 }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "delete_file",
            description: "Delete one file identified by connector, folder, filename and message id.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "folder": { "type": "string" },
                    "filename": { "type": "string" },
                    "messageId": { "type": "string" }
                },
                "required": ["connectorId", "folder", "filename", "messageId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "count_files",
            description: "Count files, optionally for one connector and folder.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "folder": { "type": "string" },
                    "filter": { "type": "string" }
                },
                "additionalProperties": false
            }),
        },
    ]
}

fn scope(args: &Map<String, Value>) -> Result<FilterBuilder, ToolError> {
    Ok(FilterBuilder::new()
        .eq(
            FileField::ConnectorId.canonical(),
            arg_optional_string(args, "connectorId")?.as_deref(),
        )
        .eq(
            FileField::Folder.canonical(),
            arg_optional_string(args, "folder")?.as_deref(),
        ))
}

fn file_key(args: &Map<String, Value>) -> Result<EntityKey, ToolError> {
    Ok(EntityKey::file(
        required_string(args, "connectorId")?,
        required_string(args, "folder")?,
        required_string(args, "filename")?,
        required_string(args, "messageId")?,
    ))
}

fn file_block(file: &Record) -> String {
    let size = file
        .int(FileField::FileSize)
        .map_or_else(|| NOT_AVAILABLE.to_string(), format_bytes);
    let mut lines = vec![
        format!("📄 {}", file.text_or(FileField::Filename, UNKNOWN)),
        line("Connector", file.text_or(FileField::ConnectorId, UNKNOWN)),
        line("Folder", file.text_or(FileField::Folder, UNKNOWN)),
        line("Message ID", file.text_or(FileField::MessageId, NOT_AVAILABLE)),
        line("Size", size),
        line(
            "Created",
            file.text(FileField::TimeCreated)
                .map_or_else(|| UNKNOWN.to_string(), |ts| format_timestamp(&ts)),
        ),
    ];
    if let Some(subfolder) = file.text(FileField::Subfolder) {
        lines.push(line("Subfolder", subfolder));
    }
    if let Some(batch) = file.text(FileField::BatchGroupId) {
        lines.push(line("Batch group", batch));
    }
    lines.join("\n")
}

pub async fn list_files(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let query = scoped_query(args, DEFAULT_LIST_TOP, scope(args)?)?;
    let files = ctx.client().list(Resource::Files, &query).await?;
    if files.is_empty() {
        return Ok(no_results(Resource::Files, query.filter.as_deref()));
    }
    Ok(found(Resource::Files, files.iter().map(file_block).collect()))
}

/// Preview of base64 file content: text when it decodes to UTF-8, otherwise
/// a size note.
fn content_preview(encoded: &str) -> String {
    match decode_base64(encoded) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => truncate(&text, CONTENT_PREVIEW_CHARS),
            Err(err) => format!(
                "(binary content, {})",
                format_bytes(err.as_bytes().len() as i64)
            ),
        },
        Err(_) => truncate(encoded, CONTENT_PREVIEW_CHARS),
    }
}

pub async fn get_file(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let key = file_key(args)?;
    let include_content = arg_bool(args, "includeContent", false)?;

    let Some(file) = ctx.client().get(Resource::Files, &key).await? else {
        return Ok(not_found(Resource::Files, &key));
    };

    let mut text = file_block(&file);
    match file.text(FileField::Content) {
        Some(content) if include_content => {
            text.push_str("\n\nContent:\n");
            text.push_str(&content_preview(&content));
        }
        Some(_) => text.push_str("\n  Content: available (set includeContent to view)"),
        None if include_content => text.push_str("\n  Content: not returned by Arc"),
        None => {}
    }
    Ok(ToolOutput::text(text))
}

pub async fn get_recent_files(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let hours = arg_hours(args)?;
    let top = arg_top(args, DEFAULT_RECENT_TOP)?;
    let filter = ctx
        .window(FileField::TimeCreated.canonical(), hours)
        .eq(
            FileField::ConnectorId.canonical(),
            arg_optional_string(args, "connectorId")?.as_deref(),
        )
        .eq(
            FileField::Folder.canonical(),
            arg_optional_string(args, "folder")?.as_deref(),
        )
        .build();
    let query = QueryOptions::new()
        .filter(filter)
        .orderby(Some(format!("{} desc", FileField::TimeCreated.canonical())))
        .top(Some(top));

    let files = ctx.client().list(Resource::Files, &query).await?;
    if files.is_empty() {
        return Ok(ToolOutput::text(format!(
            "No files found in the last {hours} hours."
        )));
    }

    let mut lines = vec![format!(
        "Found {} in the last {hours} hours:",
        count_phrase(files.len(), Resource::Files)
    )];
    for file in &files {
        let size = file
            .int(FileField::FileSize)
            .map_or_else(|| NOT_AVAILABLE.to_string(), format_bytes);
        let created = file
            .text(FileField::TimeCreated)
            .map_or_else(|| UNKNOWN.to_string(), |ts| format_timestamp(&ts));
        lines.push(format!(
            "  📄 {} ({}/{}, {size}, {created})",
            file.text_or(FileField::Filename, UNKNOWN),
            file.text_or(FileField::ConnectorId, UNKNOWN),
            file.text_or(FileField::Folder, UNKNOWN),
        ));
    }
    Ok(ToolOutput::text(lines.join("\n")))
}

pub async fn delete_file(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let key = file_key(args)?;
    match ctx.client().delete(Resource::Files, &key).await {
        Ok(()) => Ok(ToolOutput::text(format!("🗑️ File deleted ({key})."))),
        Err(err) if err.is_not_found() => Ok(not_found(Resource::Files, &key)),
        Err(err) => Err(err.into()),
    }
}

pub async fn count_files(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let filter = scope(args)?
        .raw(arg_optional_string(args, "filter")?.as_deref())
        .build();
    let query = QueryOptions::new().filter(filter.clone());
    let count = ctx.client().count(Resource::Files, &query).await?;
    let phrase = count_phrase(count as usize, Resource::Files);
    Ok(ToolOutput::text(match filter {
        Some(filter) => format!("{phrase} matching: {filter}"),
        None => format!("{phrase} in total"),
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{MockArc, Reply};

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    const FILE_PATH: &str = "/files(ConnectorId='AS2Out',Folder='Send',Filename='a.txt',MessageId='m1')";

    fn file_args() -> Value {
        json!({"connectorId": "AS2Out", "folder": "Send", "filename": "a.txt", "messageId": "m1"})
    }

    #[tokio::test]
    async fn get_file_uses_composite_key_and_previews_content() {
        let mock = MockArc::start().await;
        mock.reply(
            "GET",
            FILE_PATH,
            Reply::json(json!({
                "ConnectorId": "AS2Out", "Folder": "Send", "Filename": "a.txt",
                "MessageId": "m1", "FileSize": 11, "Content": "aGVsbG8gd29ybGQ="
            })),
        );
        let mut input = args(file_args());
        input.insert("includeContent".to_string(), json!(true));

        let output = get_file(&mock.context(), &input).await.unwrap();
        assert!(output.text.contains("📄 a.txt"));
        assert!(output.text.contains("Size: 11 B"));
        assert!(output.text.ends_with("Content:\nhello world"));
    }

    #[tokio::test]
    async fn get_file_404_is_not_found_text() {
        let mock = MockArc::start().await;
        mock.reply("GET", FILE_PATH, Reply::status(404));
        let output = get_file(&mock.context(), &args(file_args())).await.unwrap();
        assert!(!output.is_error);
        assert!(output.text.starts_with("File ConnectorId='AS2Out'"));
        assert!(output.text.ends_with("not found."));
    }

    #[tokio::test]
    async fn get_file_requires_all_key_parts() {
        let mock = MockArc::start().await;
        let err = get_file(
            &mock.context(),
            &args(json!({"connectorId": "AS2Out", "folder": "Send", "filename": "a.txt"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("messageId"));
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn binary_content_is_summarised() {
        assert_eq!(content_preview("//79"), "(binary content, 3 B)");
        assert_eq!(content_preview("aGk=\n"), "hi");
    }

    #[tokio::test]
    async fn recent_files_filter_on_creation_window() {
        let mock = MockArc::start().await;
        mock.reply(
            "GET",
            "/files",
            Reply::json(json!({"value": [
                {"Filename": "a.txt", "ConnectorId": "AS2Out", "Folder": "Receive", "FileSize": 2048, "TimeCreated": "2025-01-15T10:00:00Z"}
            ]})),
        );
        let output = get_recent_files(&mock.context(), &args(json!({"hours": 12, "folder": "Receive"})))
            .await
            .unwrap();

        let query = mock.last_request().unwrap().query.unwrap();
        assert_eq!(
            query,
            "$filter=TimeCreated%20ge%202025-01-15T00%3A00%3A00.000Z%20and%20Folder%20eq%20%27Receive%27&$orderby=TimeCreated%20desc&$top=100"
        );
        assert!(output.text.starts_with("Found 1 file in the last 12 hours:"));
        assert!(output.text.contains("a.txt (AS2Out/Receive, 2.0 KB, 2025-01-15 10:00:00 UTC)"));
    }

    #[tokio::test]
    async fn delete_file_404_is_not_found_text() {
        let mock = MockArc::start().await;
        mock.reply("DELETE", FILE_PATH, Reply::status(404));
        let output = delete_file(&mock.context(), &args(file_args())).await.unwrap();
        assert!(output.text.ends_with("not found."));
        assert!(!output.is_error);
    }
}
