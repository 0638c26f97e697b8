//! POST actions: file transfer, connector copy, cleanup, workspace
//! export/import and flow wiring.

use arc_mcp_core::fields::ActionResultField;
use arc_mcp_core::format::{UNKNOWN, format_bytes, pluralize};
use arc_mcp_core::Action;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};

use super::render::line;
use super::{ToolContext, ToolDefinition, ToolOutput, ToolResult};
use crate::args::{
    arg_bool, arg_bounded_u64, arg_optional_raw_string, arg_optional_string,
    arg_optional_string_array, required_string,
};
use crate::client::ActionOutcome;
use crate::error::ToolError;

const DEFAULT_CLEANUP_DAYS: u64 = 30;
const MAX_CLEANUP_DAYS: u64 = 3650;

/// Standard base64, ignoring embedded whitespace and line breaks.
pub(crate) fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact.as_bytes())
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "receive_file",
            description: "Trigger a receive on a connector, optionally for one message.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "messageId": { "type": "string" }
                },
                "required": ["connectorId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "send_file",
            description: "Send through a connector: everything queued, one named file, or new content uploaded under 'filename'.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "filename": { "type": "string" },
                    "content": { "type": "string", "description": "File content; requires 'filename'" },
                    "contentIsBase64": { "type": "boolean", "default": false }
                },
                "required": ["connectorId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "copy_connector",
            description: "Copy a connector and its settings under a new id.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "newConnectorId": { "type": "string" },
                    "workspaceId": { "type": "string", "description": "Target workspace; defaults to the source workspace" }
                },
                "required": ["connectorId", "newConnectorId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "cleanup",
            description: "Delete processed files older than N days from a connector's folders.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "olderThanDays": { "type": "integer", "minimum": 1, "maximum": 3650, "default": 30 },
                    "folders": { "type": "array", "items": { "type": "string" }, "description": "e.g. Send, Receive, Sent" }
                },
                "required": ["connectorId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "export_workspace",
            description: "Export a workspace as a base64 archive.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workspaceId": { "type": "string" },
                    "includeVault": { "type": "boolean", "default": false }
                },
                "required": ["workspaceId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "import_workspace",
            description: "Import a base64 archive produced by export_workspace.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "data": { "type": "string", "description": "Base64 archive" },
                    "overwrite": { "type": "boolean", "default": false }
                },
                "required": ["data"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "set_connector_flow",
            description: "Route the output of one connector into another within a workspace.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workspaceId": { "type": "string" },
                    "sourceConnectorId": { "type": "string" },
                    "targetConnectorId": { "type": "string" }
                },
                "required": ["workspaceId", "sourceConnectorId", "targetConnectorId"],
                "additionalProperties": false
            }),
        },
    ]
}

/// Per-file outcome of a receive or send. Rows without a filename are
/// placeholders and are ignored.
#[derive(Debug, Default, PartialEq)]
struct TransferSummary {
    successful: Vec<String>,
    failed: Vec<(String, String)>,
}

impl TransferSummary {
    fn from_outcome(outcome: &ActionOutcome) -> Self {
        let mut summary = Self::default();
        for row in outcome.meaningful_rows() {
            let file = row.text_or(ActionResultField::File, UNKNOWN);
            match row.text(ActionResultField::ErrorMessage) {
                Some(error) => summary.failed.push((file, error)),
                None => summary.successful.push(file),
            }
        }
        summary
    }

    fn is_empty(&self) -> bool {
        self.successful.is_empty() && self.failed.is_empty()
    }

    fn render(&self, headline: String) -> ToolOutput {
        let mut lines = vec![
            headline,
            format!(
                "{} successful, {} failed",
                self.successful.len(),
                self.failed.len()
            ),
        ];
        if !self.successful.is_empty() {
            lines.push(String::new());
            lines.push("✅ Successful:".to_string());
            lines.extend(self.successful.iter().map(|file| format!("  - {file}")));
        }
        if !self.failed.is_empty() {
            lines.push(String::new());
            lines.push("❌ Failed:".to_string());
            lines.extend(
                self.failed
                    .iter()
                    .map(|(file, error)| format!("  - {file}: {error}")),
            );
        }
        let text = lines.join("\n");
        if self.successful.is_empty() && !self.failed.is_empty() {
            ToolOutput::error(text)
        } else {
            ToolOutput::text(text)
        }
    }
}

pub async fn receive_file(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let connector_id = required_string(args, "connectorId")?;
    let mut params = Map::new();
    params.insert("ConnectorId".into(), json!(connector_id));
    if let Some(message_id) = arg_optional_string(args, "messageId")? {
        params.insert("MessageId".into(), json!(message_id));
    }

    let outcome = ctx.client().action(Action::ReceiveFile, params).await?;
    let summary = TransferSummary::from_outcome(&outcome);
    if summary.is_empty() {
        return Ok(ToolOutput::text(format!(
            "📥 Receive on '{connector_id}' completed; no files were received."
        )));
    }
    Ok(summary.render(format!("📥 Receive on '{connector_id}'")))
}

/// Base64 payload for upload. Content already marked as base64 must decode.
fn encode_content(content: &str, is_base64: bool) -> Result<String, ToolError> {
    if !is_base64 {
        return Ok(STANDARD.encode(content.as_bytes()));
    }
    decode_base64(content).map_err(|err| {
        ToolError::validation("content", format!("'content' is not valid base64: {err}"))
    })?;
    Ok(content.chars().filter(|c| !c.is_whitespace()).collect())
}

pub async fn send_file(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let connector_id = required_string(args, "connectorId")?;
    let filename = arg_optional_string(args, "filename")?;
    let content = arg_optional_raw_string(args, "content")?;
    let is_base64 = arg_bool(args, "contentIsBase64", false)?;
    if content.is_some() && filename.is_none() {
        return Err(ToolError::validation(
            "filename",
            "'filename' is required when 'content' is given",
        ));
    }

    let mut params = Map::new();
    params.insert("ConnectorId".into(), json!(connector_id));
    if let Some(filename) = &filename {
        params.insert("File".into(), json!(filename));
    }
    if let Some(content) = &content {
        params.insert("Content".into(), json!(encode_content(content, is_base64)?));
    }

    let outcome = ctx.client().action(Action::SendFile, params).await?;
    let summary = TransferSummary::from_outcome(&outcome);
    if summary.is_empty() {
        let what = filename.map_or_else(|| "queued files".to_string(), |f| format!("'{f}'"));
        return Ok(ToolOutput::text(format!(
            "📤 Send of {what} on '{connector_id}' completed; Arc reported no files."
        )));
    }
    Ok(summary.render(format!("📤 Send on '{connector_id}'")))
}

pub async fn copy_connector(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let source = required_string(args, "connectorId")?;
    let target = required_string(args, "newConnectorId")?;
    if source.eq_ignore_ascii_case(&target) {
        return Err(ToolError::validation(
            "newConnectorId",
            "'newConnectorId' must differ from 'connectorId'",
        ));
    }
    let workspace = arg_optional_string(args, "workspaceId")?;

    let mut params = Map::new();
    params.insert("ConnectorId".into(), json!(source));
    params.insert("NewConnectorId".into(), json!(target));
    if let Some(workspace) = &workspace {
        params.insert("WorkspaceId".into(), json!(workspace));
    }
    ctx.client().action(Action::CopyConnector, params).await?;
    tracing::info!(source = %source, target = %target, "connector copied");

    let place = workspace.map_or_else(String::new, |w| format!(" in workspace '{w}'"));
    Ok(ToolOutput::text(format!(
        "✅ Connector '{source}' copied to '{target}'{place}."
    )))
}

pub async fn cleanup(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let connector_id = required_string(args, "connectorId")?;
    let days = arg_bounded_u64(args, "olderThanDays", 1, MAX_CLEANUP_DAYS)?
        .unwrap_or(DEFAULT_CLEANUP_DAYS);
    let folders = arg_optional_string_array(args, "folders")?.filter(|f| !f.is_empty());

    let mut params = Map::new();
    params.insert("ConnectorId".into(), json!(connector_id));
    params.insert("OlderThanDays".into(), json!(days));
    if let Some(folders) = &folders {
        params.insert("Folders".into(), json!(folders.join(",")));
    }

    let outcome = ctx.client().action(Action::Cleanup, params).await?;
    let removed = outcome.meaningful_rows().len();
    let scope = folders.map_or_else(|| "all folders".to_string(), |f| f.join(", "));
    Ok(ToolOutput::text(format!(
        "🧹 Cleanup on '{connector_id}' ({scope}) removed {} older than {days} days.",
        pluralize(removed, "file", "files")
    )))
}

pub async fn export_workspace(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let workspace_id = required_string(args, "workspaceId")?;
    let include_vault = arg_bool(args, "includeVault", false)?;

    let mut params = Map::new();
    params.insert("WorkspaceId".into(), json!(workspace_id));
    params.insert("IncludeVault".into(), json!(include_vault));
    let outcome = ctx.client().action(Action::Export, params).await?;

    let data = outcome
        .records()
        .into_iter()
        .find_map(|row| row.text(ActionResultField::Data));
    let Some(data) = data else {
        return Ok(ToolOutput::error(format!(
            "❌ Export of workspace '{workspace_id}' returned no data."
        )));
    };
    let size = match decode_base64(&data) {
        Ok(bytes) => format_bytes(bytes.len() as i64),
        Err(_) => UNKNOWN.to_string(),
    };
    let vault = if include_vault { "included" } else { "excluded" };
    Ok(ToolOutput::text(format!(
        "📦 Workspace '{workspace_id}' exported.\n{}\n{}\n\nData (base64):\n{data}",
        line("Size", size),
        line("Vault", vault)
    )))
}

pub async fn import_workspace(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let data = arg_optional_raw_string(args, "data")?
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ToolError::validation("data", "Missing required field 'data'"))?;
    let bytes = decode_base64(&data)
        .map_err(|err| ToolError::validation("data", format!("'data' is not valid base64: {err}")))?;
    let overwrite = arg_bool(args, "overwrite", false)?;

    let mut params = Map::new();
    params.insert(
        "Data".into(),
        json!(data.chars().filter(|c| !c.is_whitespace()).collect::<String>()),
    );
    params.insert("Overwrite".into(), json!(overwrite));
    let outcome = ctx.client().action(Action::Import, params).await?;
    tracing::info!(bytes = bytes.len(), overwrite, "workspace imported");

    let mut lines = vec![format!(
        "✅ Import of {} completed (overwrite: {overwrite}).",
        format_bytes(bytes.len() as i64)
    )];
    let mut failures = 0;
    for row in outcome.records() {
        let subject = row
            .text(ActionResultField::ConnectorId)
            .or_else(|| row.text(ActionResultField::File));
        let Some(subject) = subject else { continue };
        match row.text(ActionResultField::ErrorMessage) {
            Some(error) => {
                failures += 1;
                lines.push(format!("  ❌ {subject}: {error}"));
            }
            None => lines.push(format!(
                "  ✅ {subject}: {}",
                row.text_or(ActionResultField::Result, "imported")
            )),
        }
    }
    if failures > 0 {
        lines[0] = format!("⚠️ Import completed with {}.", pluralize(failures, "error", "errors"));
    }
    Ok(ToolOutput::text(lines.join("\n")))
}

pub async fn set_connector_flow(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let workspace_id = required_string(args, "workspaceId")?;
    let source = required_string(args, "sourceConnectorId")?;
    let target = required_string(args, "targetConnectorId")?;
    if source.eq_ignore_ascii_case(&target) {
        return Err(ToolError::validation(
            "targetConnectorId",
            "A connector cannot flow into itself",
        ));
    }

    let mut params = Map::new();
    params.insert("WorkspaceId".into(), json!(workspace_id));
    params.insert("SourceConnectorId".into(), json!(source));
    params.insert("TargetConnectorId".into(), json!(target));
    ctx.client().action(Action::SetFlow, params).await?;
    Ok(ToolOutput::text(format!(
        "✅ Flow set in '{workspace_id}': {source} → {target}"
    )))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{MockArc, Reply};

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn blank_rows_are_ignored_and_errors_count_as_failed() {
        let outcome = ActionOutcome::from_body(json!([
            {"File": "", "Result": ""},
            {"File": "a.txt", "ErrorMessage": "boom"}
        ]));
        let summary = TransferSummary::from_outcome(&outcome);
        assert!(summary.successful.is_empty());
        assert_eq!(summary.failed, vec![("a.txt".to_string(), "boom".to_string())]);

        let output = summary.render("📥 Receive on 'AS2Out'".to_string());
        assert!(output.is_error);
        assert!(output.text.contains("0 successful, 1 failed"));
    }

    #[test]
    fn content_encoding() {
        assert_eq!(encode_content("hi", false).unwrap(), "aGk=");
        assert_eq!(encode_content("aGk=\n", true).unwrap(), "aGk=");
        assert!(encode_content("not base64!", true).unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn content_without_filename_is_rejected_before_calling() {
        let mock = MockArc::start().await;
        let err = send_file(
            &mock.context(),
            &args(json!({"connectorId": "AS2Out", "content": "hello"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("filename"));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn send_uploads_encoded_content() {
        let mock = MockArc::start().await;
        mock.reply(
            "POST",
            "/sendFile",
            Reply::json(json!({"value": [{"File": "a.txt", "MessageId": "m1"}]})),
        );
        let output = send_file(
            &mock.context(),
            &args(json!({"connectorId": "AS2Out", "filename": "a.txt", "content": "hi"})),
        )
        .await
        .unwrap();

        assert!(!output.is_error);
        assert!(output.text.contains("1 successful, 0 failed"));
        assert_eq!(
            mock.last_request().unwrap().json(),
            json!({"ConnectorId": "AS2Out", "File": "a.txt", "Content": "aGk="})
        );
    }

    #[tokio::test]
    async fn receive_with_only_placeholder_rows() {
        let mock = MockArc::start().await;
        mock.reply("POST", "/receiveFile", Reply::json(json!({"value": [{"File": ""}]})));
        let output = receive_file(&mock.context(), &args(json!({"connectorId": "AS2Out"})))
            .await
            .unwrap();
        assert_eq!(
            output.text,
            "📥 Receive on 'AS2Out' completed; no files were received."
        );
    }

    #[tokio::test]
    async fn import_validates_base64_before_calling() {
        let mock = MockArc::start().await;
        let err = import_workspace(&mock.context(), &args(json!({"data": "%%%"})))
            .await
            .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("data"));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn export_reports_decoded_size() {
        let mock = MockArc::start().await;
        mock.reply("POST", "/export", Reply::json(json!({"Data": "aGVsbG8="})));
        let output = export_workspace(&mock.context(), &args(json!({"workspaceId": "Default"})))
            .await
            .unwrap();
        assert!(output.text.contains("  Size: 5 B"));
        assert!(output.text.ends_with("Data (base64):\naGVsbG8="));
    }

    #[tokio::test]
    async fn cleanup_defaults_to_thirty_days() {
        let mock = MockArc::start().await;
        mock.reply(
            "POST",
            "/cleanup",
            Reply::json(json!({"value": [{"File": "old1"}, {"File": "old2"}, {"File": ""}]})),
        );
        let output = cleanup(
            &mock.context(),
            &args(json!({"connectorId": "AS2Out", "folders": "Sent, Receive"})),
        )
        .await
        .unwrap();
        assert_eq!(
            output.text,
            "🧹 Cleanup on 'AS2Out' (Sent, Receive) removed 2 files older than 30 days."
        );
        assert_eq!(
            mock.last_request().unwrap().json(),
            json!({"ConnectorId": "AS2Out", "OlderThanDays": 30, "Folders": "Sent,Receive"})
        );
    }

    #[tokio::test]
    async fn flow_into_itself_is_rejected() {
        let mock = MockArc::start().await;
        let err = set_connector_flow(
            &mock.context(),
            &args(json!({"workspaceId": "w", "sourceConnectorId": "A", "targetConnectorId": "a"})),
        )
        .await
        .unwrap_err();
        assert!(err.is_validation());
    }
}
