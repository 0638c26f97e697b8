//! Transactions and application logs.

use std::collections::BTreeMap;

use arc_mcp_core::fields::{LogField, TransactionField};
use arc_mcp_core::format::{
    NOT_AVAILABLE, UNKNOWN, format_bytes, format_duration_ms, format_timestamp, status_icon,
    truncate,
};
use arc_mcp_core::{EntityKey, Field, FilterBuilder, QueryOptions, Record, Resource};
use serde_json::{Map, Value, json};

use super::render::{count_phrase, found, line, more_marker, no_results, not_found};
use super::{ToolContext, ToolDefinition, ToolOutput, ToolResult, scoped_query};
use crate::args::{
    DEFAULT_LIST_TOP, DEFAULT_RECENT_TOP, MAX_HOURS, arg_bounded_u64, arg_hours,
    arg_optional_string, arg_top, required_string,
};
use crate::error::ToolError;

const PER_CONNECTOR_PREVIEW: usize = 5;
const LOG_MESSAGE_CHARS: usize = 500;

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_transactions",
            description: "List transactions (file processing records), optionally for one connector, status or direction.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "status": { "type": "string", "description": "e.g. Success, Error, Pending" },
                    "direction": { "type": "string", "description": "Send or Receive" },
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
            name: "get_transaction",
            description: "Show one transaction by id.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "transactionId": { "type": "string" }
                },
                "required": ["transactionId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_recent_transactions",
            description: "Summarise transactions from the last N hours, grouped by status and by connector.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "hours": { "type": "integer", "minimum": 1, "default": 24 },
                    "status": { "type": "string" },
                    "connectorId": { "type": "string" },
                    "top": { "type": "integer", "minimum": 1, "default": 100 }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "count_transactions",
            description: "Count transactions, optionally by status, connector and trailing window in hours.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "status": { "type": "string" },
                    "connectorId": { "type": "string" },
                    "hours": { "type": "integer", "minimum": 1 },
                    "filter": { "type": "string" }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "list_logs",
            description: "List application log entries, optionally for one connector or level.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "level": { "type": "string", "description": "Error, Warning, Info or Debug" },
                    "filter": { "type": "string", "description": "OData $filter expression" },
                    "orderby": { "type": "string" },
                    "top": { "type": "integer", "minimum": 1, "default": 50 },
                    "skip": { "type": "integer", "minimum": 0 }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_log",
            description: "Show one log entry by id.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "logId": { "type": "string" }
                },
                "required": ["logId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_error_logs",
            description: "Error-level log entries from the last N hours, newest first.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "hours": { "type": "integer", "minimum": 1, "default": 24 },
                    "connectorId": { "type": "string" },
                    "top": { "type": "integer", "minimum": 1, "default": 100 }
                },
                "additionalProperties": false
            }),
        },
    ]
}

fn transaction_block(tx: &Record) -> String {
    let status = tx.text_or(TransactionField::Status, UNKNOWN);
    let file = match (tx.text(TransactionField::Filename), tx.int(TransactionField::FileSize)) {
        (Some(name), Some(size)) => format!("{name} ({})", format_bytes(size)),
        (Some(name), None) => name,
        (None, _) => NOT_AVAILABLE.to_string(),
    };
    let mut lines = vec![
        format!(
            "{} Transaction {}",
            status_icon(&status),
            tx.text_or(TransactionField::Id, UNKNOWN)
        ),
        line("Connector", tx.text_or(TransactionField::ConnectorId, UNKNOWN)),
        line("Status", &status),
        line("Direction", tx.text_or(TransactionField::Direction, NOT_AVAILABLE)),
        line("File", file),
        line("Time", timestamp_or(tx.text(TransactionField::Timestamp), UNKNOWN)),
    ];

    // Two upstream schemas: ProcessingTime, or EndTime + MessageCount.
    if let Some(ms) = tx.int(TransactionField::ProcessingTime) {
        lines.push(line("Processing time", format_duration_ms(ms)));
    } else if tx.get(TransactionField::EndTime).is_some()
        || tx.get(TransactionField::MessageCount).is_some()
    {
        lines.push(line(
            "End time",
            timestamp_or(tx.text(TransactionField::EndTime), NOT_AVAILABLE),
        ));
        lines.push(line(
            "Messages",
            tx.text_or(TransactionField::MessageCount, NOT_AVAILABLE),
        ));
    } else {
        lines.push(line("Processing time", NOT_AVAILABLE));
    }

    if let Some(message_id) = tx.text(TransactionField::MessageId) {
        lines.push(line("Message ID", message_id));
    }
    if let Some(error) = tx.text(TransactionField::ErrorMessage) {
        lines.push(line("Error", error));
    }
    lines.join("\n")
}

fn timestamp_or(raw: Option<String>, placeholder: &str) -> String {
    raw.map_or_else(|| placeholder.to_string(), |ts| format_timestamp(&ts))
}

pub async fn list_transactions(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let scope = FilterBuilder::new()
        .eq(
            TransactionField::ConnectorId.canonical(),
            arg_optional_string(args, "connectorId")?.as_deref(),
        )
        .eq(
            TransactionField::Status.canonical(),
            arg_optional_string(args, "status")?.as_deref(),
        )
        .eq(
            TransactionField::Direction.canonical(),
            arg_optional_string(args, "direction")?.as_deref(),
        );
    let query = scoped_query(args, DEFAULT_LIST_TOP, scope)?;
    let transactions = ctx.client().list(Resource::Transactions, &query).await?;
    if transactions.is_empty() {
        return Ok(no_results(Resource::Transactions, query.filter.as_deref()));
    }
    Ok(found(
        Resource::Transactions,
        transactions.iter().map(transaction_block).collect(),
    ))
}

pub async fn get_transaction(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let key = EntityKey::single(required_string(args, "transactionId")?);
    match ctx.client().get(Resource::Transactions, &key).await? {
        Some(tx) => Ok(ToolOutput::text(transaction_block(&tx))),
        None => Ok(not_found(Resource::Transactions, &key)),
    }
}

/// Per-status counts and per-connector previews of a transaction window.
fn summarize_transactions(transactions: &[Record], hours: u32) -> String {
    let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_connector: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
    for tx in transactions {
        *by_status
            .entry(tx.text_or(TransactionField::Status, UNKNOWN))
            .or_default() += 1;
        by_connector
            .entry(tx.text_or(TransactionField::ConnectorId, UNKNOWN))
            .or_default()
            .push(tx);
    }

    let mut lines = vec![format!(
        "📊 {} in the last {hours} hours",
        count_phrase(transactions.len(), Resource::Transactions)
    )];

    lines.push(String::new());
    lines.push("By status:".to_string());
    let mut statuses: Vec<(String, usize)> = by_status.into_iter().collect();
    statuses.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (status, count) in statuses {
        lines.push(format!("  {} {status}: {count}", status_icon(&status)));
    }

    lines.push(String::new());
    lines.push("By connector:".to_string());
    for (connector, items) in by_connector {
        lines.push(format!("  {connector} ({}):", items.len()));
        for tx in items.iter().take(PER_CONNECTOR_PREVIEW) {
            let status = tx.text_or(TransactionField::Status, UNKNOWN);
            lines.push(format!(
                "    {} {} - {}",
                status_icon(&status),
                tx.text_or(TransactionField::Filename, NOT_AVAILABLE),
                timestamp_or(tx.text(TransactionField::Timestamp), UNKNOWN)
            ));
        }
        if let Some(more) = more_marker(items.len().saturating_sub(PER_CONNECTOR_PREVIEW)) {
            lines.push(format!("    {more}"));
        }
    }
    lines.join("\n")
}

pub async fn get_recent_transactions(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let hours = arg_hours(args)?;
    let top = arg_top(args, DEFAULT_RECENT_TOP)?;
    let timestamp = TransactionField::Timestamp.canonical();
    let filter = ctx
        .window(timestamp, hours)
        .eq(
            TransactionField::Status.canonical(),
            arg_optional_string(args, "status")?.as_deref(),
        )
        .eq(
            TransactionField::ConnectorId.canonical(),
            arg_optional_string(args, "connectorId")?.as_deref(),
        )
        .build();
    let query = QueryOptions::new()
        .filter(filter)
        .orderby(Some(format!("{timestamp} desc")))
        .top(Some(top));

    let transactions = ctx.client().list(Resource::Transactions, &query).await?;
    if transactions.is_empty() {
        return Ok(ToolOutput::text(format!(
            "No transactions found in the last {hours} hours."
        )));
    }
    Ok(ToolOutput::text(summarize_transactions(&transactions, hours)))
}

pub async fn count_transactions(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let hours = arg_bounded_u64(args, "hours", 1, MAX_HOURS)?;
    let mut builder = match hours {
        Some(hours) => ctx.window(TransactionField::Timestamp.canonical(), hours as u32),
        None => FilterBuilder::new(),
    };
    builder = builder
        .eq(
            TransactionField::Status.canonical(),
            arg_optional_string(args, "status")?.as_deref(),
        )
        .eq(
            TransactionField::ConnectorId.canonical(),
            arg_optional_string(args, "connectorId")?.as_deref(),
        )
        .raw(arg_optional_string(args, "filter")?.as_deref());

    let filter = builder.build();
    let query = QueryOptions::new().filter(filter.clone());
    let count = ctx.client().count(Resource::Transactions, &query).await?;
    let phrase = count_phrase(count as usize, Resource::Transactions);
    Ok(ToolOutput::text(match (hours, filter) {
        (Some(hours), Some(filter)) => {
            format!("{phrase} in the last {hours} hours matching: {filter}")
        }
        (None, Some(filter)) => format!("{phrase} matching: {filter}"),
        (_, None) => format!("{phrase} in total"),
    }))
}

fn level_icon(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "error" => "❌",
        "warning" | "warn" => "⚠️",
        "info" | "information" => "ℹ️",
        "debug" | "verbose" | "trace" => "🔍",
        _ => "📝",
    }
}

fn log_block(entry: &Record) -> String {
    let level = entry.text_or(LogField::Level, UNKNOWN);
    let mut lines = vec![
        format!(
            "{} [{level}] {}",
            level_icon(&level),
            timestamp_or(entry.text(LogField::Timestamp), UNKNOWN)
        ),
        line("Connector", entry.text_or(LogField::ConnectorId, NOT_AVAILABLE)),
        line(
            "Message",
            truncate(&entry.text_or(LogField::Message, NOT_AVAILABLE), LOG_MESSAGE_CHARS),
        ),
    ];
    if let Some(category) = entry.text(LogField::Category) {
        lines.push(line("Category", category));
    }
    if let Some(message_id) = entry.text(LogField::MessageId) {
        lines.push(line("Message ID", message_id));
    }
    if let Some(id) = entry.text(LogField::Id) {
        lines.push(line("ID", id));
    }
    lines.join("\n")
}

pub async fn list_logs(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let scope = FilterBuilder::new()
        .eq(
            LogField::ConnectorId.canonical(),
            arg_optional_string(args, "connectorId")?.as_deref(),
        )
        .eq(
            LogField::Level.canonical(),
            arg_optional_string(args, "level")?.as_deref(),
        );
    let query = scoped_query(args, DEFAULT_LIST_TOP, scope)?;
    let entries = ctx.client().list(Resource::Logs, &query).await?;
    if entries.is_empty() {
        return Ok(no_results(Resource::Logs, query.filter.as_deref()));
    }
    Ok(found(Resource::Logs, entries.iter().map(log_block).collect()))
}

pub async fn get_log(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let key = EntityKey::single(required_string(args, "logId")?);
    match ctx.client().get(Resource::Logs, &key).await? {
        Some(entry) => Ok(ToolOutput::text(log_block(&entry))),
        None => Ok(not_found(Resource::Logs, &key)),
    }
}

fn error_log_query(
    ctx: &ToolContext,
    args: &Map<String, Value>,
    hours: u32,
) -> Result<QueryOptions, ToolError> {
    let timestamp = LogField::Timestamp.canonical();
    let filter = ctx
        .window(timestamp, hours)
        .eq(LogField::Level.canonical(), Some("Error"))
        .eq(
            LogField::ConnectorId.canonical(),
            arg_optional_string(args, "connectorId")?.as_deref(),
        )
        .build();
    Ok(QueryOptions::new()
        .filter(filter)
        .orderby(Some(format!("{timestamp} desc")))
        .top(Some(arg_top(args, DEFAULT_RECENT_TOP)?)))
}

pub async fn get_error_logs(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let hours = arg_hours(args)?;
    let query = error_log_query(ctx, args, hours)?;
    let entries = ctx.client().list(Resource::Logs, &query).await?;
    if entries.is_empty() {
        return Ok(ToolOutput::text(format!(
            "✅ No error log entries in the last {hours} hours."
        )));
    }
    let header = format!(
        "Found {} with level Error in the last {hours} hours:",
        count_phrase(entries.len(), Resource::Logs)
    );
    let blocks: Vec<String> = entries.iter().map(log_block).collect();
    Ok(ToolOutput::text(format!("{header}\n\n{}", blocks.join("\n\n"))))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{MockArc, Reply};

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn records(value: Value) -> Vec<Record> {
        value
            .as_array()
            .unwrap()
            .iter()
            .cloned()
            .filter_map(Record::from_value)
            .collect()
    }

    #[test]
    fn both_transaction_schemas_render() {
        let modern = records(json!([{
            "Id": "1", "ConnectorId": "AS2Out", "Status": "Success",
            "Timestamp": "2025-01-15T10:00:00Z", "ProcessingTime": 1500, "Filename": "a.txt", "FileSize": 2048
        }]));
        let text = transaction_block(&modern[0]);
        assert!(text.starts_with("✅ Transaction 1"));
        assert!(text.contains("Processing time: 1.5 s"));
        assert!(text.contains("File: a.txt (2.0 KB)"));

        let legacy = records(json!([{
            "id": "2", "connectorid": "SftpIn", "status": "Error",
            "StartTime": "2025-01-15T09:00:00Z", "EndTime": "2025-01-15T09:00:05Z",
            "MessageCount": 3, "ErrorMessage": "timeout"
        }]));
        let text = transaction_block(&legacy[0]);
        assert!(text.starts_with("❌ Transaction 2"));
        assert!(text.contains("Time: 2025-01-15 09:00:00 UTC"));
        assert!(text.contains("End time: 2025-01-15 09:00:05 UTC"));
        assert!(text.contains("Messages: 3"));
        assert!(text.contains("Error: timeout"));
        assert!(text.contains("File: N/A"));
    }

    #[test]
    fn summary_truncates_each_connector_after_five() {
        let mut rows = Vec::new();
        for i in 0..7 {
            rows.push(json!({"ConnectorId": "AS2Out", "Status": "Success", "Filename": format!("f{i}.txt")}));
        }
        rows.push(json!({"ConnectorId": "SftpIn", "Status": "Error", "Filename": "bad.txt"}));
        let text = summarize_transactions(&records(Value::Array(rows)), 24);

        assert!(text.starts_with("📊 8 transactions in the last 24 hours"));
        assert!(text.contains("  ✅ Success: 7\n  ❌ Error: 1"));
        assert!(text.contains("  AS2Out (7):"));
        assert!(text.contains("f4.txt"));
        assert!(!text.contains("f5.txt"));
        assert!(text.contains("    ... and 2 more"));
        assert!(text.contains("  SftpIn (1):"));
    }

    #[tokio::test]
    async fn recent_transactions_window_at_fixed_clock() {
        let mock = MockArc::start().await;
        mock.reply("GET", "/transactions", Reply::json(json!({"value": []})));
        let output = get_recent_transactions(
            &mock.context(),
            &args(json!({"hours": 12, "status": "Error"})),
        )
        .await
        .unwrap();

        assert_eq!(output.text, "No transactions found in the last 12 hours.");
        assert_eq!(
            mock.last_request().unwrap().query.as_deref(),
            Some(
                "$filter=Timestamp%20ge%202025-01-15T00%3A00%3A00.000Z%20and%20Status%20eq%20%27Error%27&$orderby=Timestamp%20desc&$top=100"
            )
        );
    }

    #[tokio::test]
    async fn quoted_literal_style_is_honoured() {
        let mock = MockArc::start().await;
        mock.reply("GET", "/transactions/$count", Reply::text("5"));
        let ctx = mock
            .context()
            .with_date_style(arc_mcp_core::DateLiteralStyle::Quoted);

        let output = count_transactions(&ctx, &args(json!({"hours": 1})))
            .await
            .unwrap();
        assert_eq!(
            output.text,
            "5 transactions in the last 1 hours matching: Timestamp ge '2025-01-15T11:00:00.000Z'"
        );
    }

    #[tokio::test]
    async fn get_transaction_404_is_not_found_text() {
        let mock = MockArc::start().await;
        mock.reply("GET", "/transactions('42')", Reply::status(404));
        let output = get_transaction(&mock.context(), &args(json!({"transactionId": "42"})))
            .await
            .unwrap();
        assert_eq!(output.text, "Transaction '42' not found.");
    }

    #[tokio::test]
    async fn logs_filter_on_type_and_accept_level_alias() {
        let mock = MockArc::start().await;
        mock.reply(
            "GET",
            "/logs",
            Reply::json(json!({"value": [
                {"Id": "9", "Level": "Warning", "Message": "slow", "Timestamp": "2025-01-15T11:00:00Z"}
            ]})),
        );
        let output = list_logs(&mock.context(), &args(json!({"level": "Warning"})))
            .await
            .unwrap();
        assert_eq!(
            mock.last_request().unwrap().query.as_deref(),
            Some("$filter=Type%20eq%20%27Warning%27&$top=50")
        );
        assert!(output.text.starts_with("Found 1 log entry:"));
        assert!(output.text.contains("⚠️ [Warning] 2025-01-15 11:00:00 UTC"));
    }

    #[tokio::test]
    async fn error_logs_use_type_error_clause() {
        let mock = MockArc::start().await;
        mock.reply("GET", "/logs", Reply::json(json!({"value": []})));
        let output = get_error_logs(&mock.context(), &args(json!({"connectorId": "AS2Out"})))
            .await
            .unwrap();
        assert_eq!(output.text, "✅ No error log entries in the last 24 hours.");
        let filter = mock.last_request().unwrap().query.unwrap();
        assert!(filter.starts_with(
            "$filter=Timestamp%20ge%202025-01-14T12%3A00%3A00.000Z%20and%20Type%20eq%20%27Error%27%20and%20ConnectorId%20eq%20%27AS2Out%27"
        ));
    }
}
