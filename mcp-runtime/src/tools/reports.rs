//! Scheduled reports.

use arc_mcp_core::cron::validate_cron;
use arc_mcp_core::fields::ReportField;
use arc_mcp_core::format::{NOT_SET, UNKNOWN, enabled_label, format_timestamp};
use arc_mcp_core::{EntityKey, PartialRecord, Record, Resource};
use serde_json::{Map, Value, json};

use super::render::{found, line, no_results, not_found, property_lines};
use super::{ToolContext, ToolDefinition, ToolOutput, ToolResult};
use crate::args::{
    DEFAULT_LIST_TOP, arg_optional_bool, arg_optional_object, arg_optional_string,
    arg_optional_string_array, query_options, required_object, required_string,
};
use crate::error::ToolError;

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_reports",
            description: "List configured reports.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "filter": { "type": "string", "description": "OData $filter expression" },
                    "orderby": { "type": "string" },
                    "top": { "type": "integer", "minimum": 1, "default": 50 },
                    "skip": { "type": "integer", "minimum": 0 }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_report",
            description: "Show one report definition.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" }
                },
                "required": ["name"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "create_report",
            description: "Create a report, optionally scheduled (cron) and emailed.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "type": { "type": "string", "description": "e.g. Transactions, Connectors" },
                    "schedule": { "type": "string", "description": "Five-field cron expression" },
                    "columns": { "type": "array", "items": { "type": "string" } },
                    "filters": { "type": "string", "description": "OData $filter applied to the report rows" },
                    "emailReport": { "type": "boolean" },
                    "emailTo": { "type": "string" },
                    "settings": { "type": "object", "description": "Additional report properties" }
                },
                "required": ["name", "type"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "update_report",
            description: "Change properties of an existing report.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "settings": { "type": "object" }
                },
                "required": ["name", "settings"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "delete_report",
            description: "Delete a report.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" }
                },
                "required": ["name"],
                "additionalProperties": false
            }),
        },
    ]
}

fn report_block(report: &Record) -> String {
    let mut lines = vec![
        format!("📈 {}", report.text_or(ReportField::Name, UNKNOWN)),
        line("Type", report.text_or(ReportField::Type, UNKNOWN)),
        line("Schedule", report.text_or(ReportField::Schedule, NOT_SET)),
        line("Email", enabled_label(report.flag(ReportField::EmailReport))),
    ];
    if let Some(to) = report.text(ReportField::EmailTo) {
        lines.push(line("Email to", to));
    }
    if let Some(description) = report.text(ReportField::Description) {
        lines.push(line("Description", description));
    }
    if let Some(last_run) = report.text(ReportField::LastRun) {
        lines.push(line("Last run", format_timestamp(&last_run)));
    }
    lines.join("\n")
}

fn check_schedule(record: &PartialRecord<ReportField>) -> Result<(), ToolError> {
    match record.get(ReportField::Schedule) {
        Some(Value::String(schedule)) if !schedule.trim().is_empty() => validate_cron(schedule)
            .map_err(|err| ToolError::from(err).with_field("schedule")),
        _ => Ok(()),
    }
}

pub async fn list_reports(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let query = query_options(args, DEFAULT_LIST_TOP)?;
    let reports = ctx.client().list(Resource::Reports, &query).await?;
    if reports.is_empty() {
        return Ok(no_results(Resource::Reports, query.filter.as_deref()));
    }
    Ok(found(Resource::Reports, reports.iter().map(report_block).collect()))
}

pub async fn get_report(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let key = EntityKey::single(required_string(args, "name")?);
    let Some(report) = ctx.client().get(Resource::Reports, &key).await? else {
        return Ok(not_found(Resource::Reports, &key));
    };
    let mut lines = vec![report_block(&report), "Properties:".to_string()];
    lines.extend(property_lines(&report, true));
    Ok(ToolOutput::text(lines.join("\n")))
}

pub async fn create_report(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let name = required_string(args, "name")?;
    let kind = required_string(args, "type")?;
    let settings = arg_optional_object(args, "settings")?.unwrap_or_default();

    // Explicit arguments win over the same keys inside `settings`.
    let mut record = PartialRecord::<ReportField>::from_map(&settings)?;
    record.set(ReportField::Name, &json!(name))?;
    record.set(ReportField::Type, &json!(kind))?;
    if let Some(schedule) = arg_optional_string(args, "schedule")? {
        record.set(ReportField::Schedule, &json!(schedule))?;
    }
    if let Some(columns) = arg_optional_string_array(args, "columns")? {
        record.set(ReportField::Columns, &json!(columns))?;
    }
    if let Some(filters) = arg_optional_string(args, "filters")? {
        record.set(ReportField::Filters, &json!(filters))?;
    }
    if let Some(email) = arg_optional_bool(args, "emailReport")? {
        record.set(ReportField::EmailReport, &json!(email))?;
    }
    if let Some(to) = arg_optional_string(args, "emailTo")? {
        record.set(ReportField::EmailTo, &json!(to))?;
    }
    check_schedule(&record)?;

    ctx.client().create(Resource::Reports, record.into_body()).await?;
    tracing::info!(name = %name, kind = %kind, "report created");
    Ok(ToolOutput::text(format!("✅ Report '{name}' ({kind}) created.")))
}

pub async fn update_report(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let name = required_string(args, "name")?;
    let settings = required_object(args, "settings")?;
    let record = PartialRecord::<ReportField>::from_map(&settings)?;
    check_schedule(&record)?;

    let body = record.into_body();
    let changed = {
        let mut keys: Vec<&str> = body.keys().map(String::as_str).collect();
        keys.sort_unstable_by_key(|key| key.to_ascii_lowercase());
        keys.join(", ")
    };

    let key = EntityKey::single(name.as_str());
    match ctx.client().update(Resource::Reports, &key, body).await {
        Ok(_) => Ok(ToolOutput::text(format!(
            "✅ Report '{name}' updated ({changed})."
        ))),
        Err(err) if err.is_not_found() => Ok(not_found(Resource::Reports, &key)),
        Err(err) => Err(err.into()),
    }
}

pub async fn delete_report(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let key = EntityKey::single(required_string(args, "name")?);
    match ctx.client().delete(Resource::Reports, &key).await {
        Ok(()) => Ok(ToolOutput::text(format!("✅ Report {key} deleted."))),
        Err(err) if err.is_not_found() => Ok(not_found(Resource::Reports, &key)),
        Err(err) => Err(err.into()),
    }
}
