//! HTTP request log of the Arc server itself.

use std::collections::BTreeMap;

use arc_mcp_core::fields::RequestField;
use arc_mcp_core::format::{
    NOT_AVAILABLE, UNKNOWN, format_bytes, format_duration_ms, format_timestamp,
};
use arc_mcp_core::{EntityKey, Field, FilterBuilder, QueryOptions, Record, Resource};
use serde_json::{Map, Value, json};

use super::render::{count_phrase, found, line, more_marker, no_results, not_found};
use super::{ToolContext, ToolDefinition, ToolOutput, ToolResult, scoped_query};
use crate::args::{
    DEFAULT_LIST_TOP, DEFAULT_RECENT_TOP, arg_bool, arg_bounded_u64, arg_hours,
    arg_optional_string, arg_top, required_string,
};
use crate::error::ToolError;

const FAILED_PREVIEW: usize = 3;
const FAILURE_STATUS: i64 = 400;

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_requests",
            description: "List HTTP requests handled by the Arc server, optionally by method or status code.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "method": { "type": "string", "description": "GET, POST, PUT, ..." },
                    "status": { "type": "integer", "minimum": 100, "maximum": 599 },
                    "filter": { "type": "string", "description": "OData $filter expression" },
                    "orderby": { "type": "string" },
                    "top": { "type": "integer", "minimum": 1, "default": 50 },
                    "skip": { "type": "integer", "minimum": 0 }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_request",
            description: "Show one request log entry by id.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "requestId": { "type": "string" }
                },
                "required": ["requestId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_recent_requests",
            description: "Summarise requests from the last N hours by status class and method.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "hours": { "type": "integer", "minimum": 1, "default": 24 },
                    "method": { "type": "string" },
                    "failedOnly": { "type": "boolean", "default": false, "description": "Only status >= 400" },
                    "top": { "type": "integer", "minimum": 1, "default": 100 }
                },
                "additionalProperties": false
            }),
        },
    ]
}

fn status_class_icon(status: Option<i64>) -> &'static str {
    match status {
        Some(200..=299) => "✅",
        Some(300..=399) => "↪️",
        Some(400..=499) => "⚠️",
        Some(500..=599) => "❌",
        _ => "❔",
    }
}

fn status_class(status: Option<i64>) -> String {
    match status {
        Some(code) if (100..=599).contains(&code) => format!("{}xx", code / 100),
        _ => UNKNOWN.to_string(),
    }
}

fn request_block(request: &Record) -> String {
    let status = request.int(RequestField::Status);
    let mut lines = vec![
        format!(
            "{} {} {}",
            status_class_icon(status),
            request.text_or(RequestField::Method, UNKNOWN),
            request.text_or(RequestField::Url, NOT_AVAILABLE)
        ),
        line(
            "Status",
            status.map_or_else(|| NOT_AVAILABLE.to_string(), |code| code.to_string()),
        ),
        line(
            "Time",
            request
                .text(RequestField::Time)
                .map_or_else(|| UNKNOWN.to_string(), |ts| format_timestamp(&ts)),
        ),
    ];
    if let Some(ms) = request.int(RequestField::Duration) {
        lines.push(line("Duration", format_duration_ms(ms)));
    }
    if let Some(bytes) = request.int(RequestField::Bytes) {
        lines.push(line("Size", format_bytes(bytes)));
    }
    if let Some(user) = request.text(RequestField::User) {
        lines.push(line("User", user));
    }
    if let Some(ip) = request.text(RequestField::RemoteIp) {
        lines.push(line("Remote IP", ip));
    }
    if let Some(error) = request.text(RequestField::Error) {
        lines.push(line("Error", error));
    }
    if let Some(id) = request.text(RequestField::Id) {
        lines.push(line("ID", id));
    }
    lines.join("\n")
}

fn method_arg(args: &Map<String, Value>) -> Result<Option<String>, ToolError> {
    Ok(arg_optional_string(args, "method")?.map(|method| method.to_ascii_uppercase()))
}

pub async fn list_requests(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let status = arg_bounded_u64(args, "status", 100, 599)?;
    let scope = FilterBuilder::new()
        .eq(RequestField::Method.canonical(), method_arg(args)?.as_deref())
        .eq_number(
            RequestField::Status.canonical(),
            status.map(|code| code as i64),
        );
    let query = scoped_query(args, DEFAULT_LIST_TOP, scope)?;
    let requests = ctx.client().list(Resource::Requests, &query).await?;
    if requests.is_empty() {
        return Ok(no_results(Resource::Requests, query.filter.as_deref()));
    }
    Ok(found(
        Resource::Requests,
        requests.iter().map(request_block).collect(),
    ))
}

pub async fn get_request(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let key = EntityKey::single(required_string(args, "requestId")?);
    match ctx.client().get(Resource::Requests, &key).await? {
        Some(request) => Ok(ToolOutput::text(request_block(&request))),
        None => Ok(not_found(Resource::Requests, &key)),
    }
}

fn summarize_requests(requests: &[Record], hours: u32) -> String {
    let mut by_class: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
    let mut by_method: BTreeMap<String, usize> = BTreeMap::new();
    for request in requests {
        by_class
            .entry(status_class(request.int(RequestField::Status)))
            .or_default()
            .push(request);
        *by_method
            .entry(request.text_or(RequestField::Method, UNKNOWN).to_ascii_uppercase())
            .or_default() += 1;
    }

    let mut lines = vec![format!(
        "🌐 {} in the last {hours} hours",
        count_phrase(requests.len(), Resource::Requests)
    )];

    lines.push(String::new());
    lines.push("By status:".to_string());
    for (class, items) in &by_class {
        let icon = status_class_icon(items.first().and_then(|r| r.int(RequestField::Status)));
        lines.push(format!("  {icon} {class}: {}", items.len()));
        let failed: Vec<&&Record> = items
            .iter()
            .filter(|r| r.int(RequestField::Status).is_some_and(|s| s >= FAILURE_STATUS))
            .collect();
        for request in failed.iter().take(FAILED_PREVIEW) {
            let mut entry = format!(
                "    {} {} ({})",
                request.text_or(RequestField::Method, UNKNOWN),
                request.text_or(RequestField::Url, NOT_AVAILABLE),
                request
                    .int(RequestField::Status)
                    .map_or_else(|| NOT_AVAILABLE.to_string(), |s| s.to_string())
            );
            if let Some(error) = request.text(RequestField::Error) {
                entry = format!("{entry}: {error}");
            }
            lines.push(entry);
        }
        if let Some(more) = more_marker(failed.len().saturating_sub(FAILED_PREVIEW)) {
            lines.push(format!("    {more}"));
        }
    }

    lines.push(String::new());
    lines.push("By method:".to_string());
    for (method, count) in by_method {
        lines.push(format!("  {method}: {count}"));
    }
    lines.join("\n")
}

pub async fn get_recent_requests(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let hours = arg_hours(args)?;
    let failed_only = arg_bool(args, "failedOnly", false)?;
    let time = RequestField::Time.canonical();
    let status_clause = format!("{} ge {FAILURE_STATUS}", RequestField::Status.canonical());
    let filter = ctx
        .window(time, hours)
        .eq(RequestField::Method.canonical(), method_arg(args)?.as_deref())
        .raw(failed_only.then_some(status_clause.as_str()))
        .build();
    let query = QueryOptions::new()
        .filter(filter)
        .orderby(Some(format!("{time} desc")))
        .top(Some(arg_top(args, DEFAULT_RECENT_TOP)?));

    let requests = ctx.client().list(Resource::Requests, &query).await?;
    if requests.is_empty() {
        let what = if failed_only { "failed requests" } else { "requests" };
        return Ok(ToolOutput::text(format!(
            "No {what} found in the last {hours} hours."
        )));
    }
    Ok(ToolOutput::text(summarize_requests(&requests, hours)))
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
    fn status_icons_follow_class() {
        assert_eq!(status_class_icon(Some(204)), "✅");
        assert_eq!(status_class_icon(Some(302)), "↪️");
        assert_eq!(status_class_icon(Some(404)), "⚠️");
        assert_eq!(status_class_icon(Some(503)), "❌");
        assert_eq!(status_class(Some(503)), "5xx");
        assert_eq!(status_class(None), "Unknown");
    }

    #[test]
    fn summary_lists_three_failures_per_class() {
        let mut rows = vec![json!({"Method": "get", "URL": "/ok", "Status": 200})];
        for i in 0..5 {
            rows.push(json!({"Method": "POST", "URL": format!("/bad{i}"), "Status": 500, "Error": "boom"}));
        }
        let text = summarize_requests(&records(Value::Array(rows)), 6);

        assert!(text.starts_with("🌐 6 requests in the last 6 hours"));
        assert!(text.contains("  ✅ 2xx: 1\n  ❌ 5xx: 5"));
        assert!(text.contains("    POST /bad2 (500): boom"));
        assert!(!text.contains("/bad3"));
        assert!(text.contains("    ... and 2 more"));
        assert!(text.contains("By method:\n  GET: 1\n  POST: 5"));
    }

    #[tokio::test]
    async fn list_uppercases_method_and_filters_numeric_status() {
        let mock = MockArc::start().await;
        mock.reply("GET", "/requests", Reply::json(json!({"value": []})));
        let output = list_requests(
            &mock.context(),
            &args(json!({"method": "post", "status": 401})),
        )
        .await
        .unwrap();
        assert_eq!(
            output.text,
            "No requests found matching filter: Method eq 'POST' and Status eq 401"
        );
    }

    #[tokio::test]
    async fn failed_only_adds_status_clause() {
        let mock = MockArc::start().await;
        mock.reply("GET", "/requests", Reply::json(json!({"value": []})));
        let output = get_recent_requests(
            &mock.context(),
            &args(json!({"hours": 2, "failedOnly": true})),
        )
        .await
        .unwrap();
        assert_eq!(output.text, "No failed requests found in the last 2 hours.");
        assert_eq!(
            mock.last_request().unwrap().query.as_deref(),
            Some(
                "$filter=Time%20ge%202025-01-15T10%3A00%3A00.000Z%20and%20%28Status%20ge%20400%29&$orderby=Time%20desc&$top=100"
            )
        );
    }
}
