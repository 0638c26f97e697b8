use std::sync::LazyLock;

use arc_mcp_core::cron::validate_cron;
use arc_mcp_core::fields::ConnectorField;
use arc_mcp_core::format::{MASK, NOT_AVAILABLE, NOT_SET, UNKNOWN, enabled_label, is_secret_key};
use arc_mcp_core::{EntityKey, Field, FilterBuilder, PartialRecord, QueryOptions, Record, Resource};
use regex::Regex;
use serde_json::{Map, Value, json};

use super::render::{count_phrase, found, line, no_results, not_found, property_lines};
use super::{ToolContext, ToolDefinition, ToolOutput, ToolResult, scoped_query};
use crate::args::{
    DEFAULT_LIST_TOP, arg_bool, arg_optional_object, arg_optional_string, required_object,
    required_string,
};
use crate::client::ClientError;
use crate::error::ToolError;

static DUPLICATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)already\s+exists|duplicate").expect("valid duplicate regex")
});

const SUGGESTION_THRESHOLD: f64 = 0.8;

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_connectors",
            description: "List connectors, optionally scoped to a workspace or connector type, with OData filter/select/orderby/paging.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workspaceId": { "type": "string", "description": "Only connectors in this workspace" },
                    "connectorType": { "type": "string", "description": "Only connectors of this type, e.g. AS2, SFTP" },
                    "filter": { "type": "string", "description": "OData $filter expression" },
                    "select": { "type": "string", "description": "Comma-separated properties to return" },
                    "orderby": { "type": "string", "description": "OData $orderby, e.g. 'ConnectorId desc'" },
                    "top": { "type": "integer", "minimum": 1, "default": 50 },
                    "skip": { "type": "integer", "minimum": 0 }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_connector",
            description: "Show one connector's configuration.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "includeAllProperties": { "type": "boolean", "default": false, "description": "Also list every property returned by Arc" }
                },
                "required": ["connectorId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "create_connector",
            description: "Create a connector of the given type, optionally inside a workspace and with initial properties.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "connectorType": { "type": "string", "description": "Arc connector type, e.g. AS2, SFTP, File" },
                    "workspaceId": { "type": "string" },
                    "properties": { "type": "object", "description": "Additional connector properties" }
                },
                "required": ["connectorId", "connectorType"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "update_connector",
            description: "Update connector properties. Only properties the connector already has are applied; unknown names are reported with suggestions. receiveinterval must be a 5-field cron expression.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "properties": { "type": "object", "description": "Property name to new value" }
                },
                "required": ["connectorId", "properties"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "delete_connector",
            description: "Delete a connector.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" }
                },
                "required": ["connectorId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_connector_property",
            description: "Read a single connector property value.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "property": { "type": "string", "description": "Property name, e.g. ReceiveInterval" }
                },
                "required": ["connectorId", "property"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "count_connectors",
            description: "Count connectors, optionally scoped to a workspace, type or OData filter.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workspaceId": { "type": "string" },
                    "connectorType": { "type": "string" },
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
            ConnectorField::WorkspaceId.canonical(),
            arg_optional_string(args, "workspaceId")?.as_deref(),
        )
        .eq(
            ConnectorField::ConnectorType.canonical(),
            arg_optional_string(args, "connectorType")?.as_deref(),
        ))
}

pub async fn list_connectors(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let query = scoped_query(args, DEFAULT_LIST_TOP, scope(args)?)?;
    let connectors = ctx.client().list(Resource::Connectors, &query).await?;
    if connectors.is_empty() {
        return Ok(no_results(Resource::Connectors, query.filter.as_deref()));
    }
    Ok(found(
        Resource::Connectors,
        connectors.iter().map(connector_summary).collect(),
    ))
}

fn connector_summary(connector: &Record) -> String {
    [
        format!("🔌 {}", connector.text_or(ConnectorField::ConnectorId, UNKNOWN)),
        line("Type", connector.text_or(ConnectorField::ConnectorType, UNKNOWN)),
        line("Workspace", connector.text_or(ConnectorField::WorkspaceId, "Default")),
        line("Send automation", enabled_label(connector.flag(ConnectorField::AutomationSend))),
        line(
            "Receive automation",
            enabled_label(connector.flag(ConnectorField::AutomationReceive)),
        ),
        line("Description", connector.text_or(ConnectorField::Description, NOT_AVAILABLE)),
    ]
    .join("\n")
}

fn connector_details(connector: &Record) -> String {
    let mut lines = vec![
        connector_summary(connector),
        line(
            "Receive interval",
            connector.text_or(ConnectorField::ReceiveInterval, NOT_SET),
        ),
        line("Max workers", connector.text_or(ConnectorField::MaxWorkers, NOT_SET)),
        line("Max files", connector.text_or(ConnectorField::MaxFiles, NOT_SET)),
        line("Log level", connector.text_or(ConnectorField::LogLevel, NOT_SET)),
    ];
    lines.push("  Folders:".to_string());
    lines.push(format!(
        "    Send: {}",
        connector.text_or(ConnectorField::SendFolder, NOT_SET)
    ));
    lines.push(format!(
        "    Receive: {}",
        connector.text_or(ConnectorField::ReceiveFolder, NOT_SET)
    ));
    lines.push(format!(
        "    Sent: {}",
        connector.text_or(ConnectorField::SentFolder, NOT_SET)
    ));
    lines.join("\n")
}

pub async fn get_connector(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let connector_id = required_string(args, "connectorId")?;
    let include_all = arg_bool(args, "includeAllProperties", false)?;
    let key = EntityKey::single(&connector_id);

    let Some(connector) = ctx.client().get(Resource::Connectors, &key).await? else {
        return Ok(not_found(Resource::Connectors, &key));
    };

    let mut text = connector_details(&connector);
    if include_all {
        text.push_str("\n\nAll properties:\n");
        text.push_str(&property_lines(&connector, true).join("\n"));
    }
    Ok(ToolOutput::text(text))
}

pub async fn create_connector(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let connector_id = required_string(args, "connectorId")?;
    let connector_type = required_string(args, "connectorType")?;
    let workspace_id = arg_optional_string(args, "workspaceId")?;
    let properties = arg_optional_object(args, "properties")?.unwrap_or_default();

    let mut record = PartialRecord::<ConnectorField>::from_map(&properties)?;
    let mut warnings = Vec::new();
    let invalid_interval = match record.get(ConnectorField::ReceiveInterval) {
        Some(Value::String(interval)) => validate_cron(interval).err(),
        _ => None,
    };
    if let Some(err) = invalid_interval {
        warnings.push(format!("receiveinterval was not applied: {err}"));
        record.remove(ConnectorField::ReceiveInterval);
    }
    record.set(ConnectorField::ConnectorId, &Value::String(connector_id.clone()))?;
    record.set(ConnectorField::ConnectorType, &Value::String(connector_type.clone()))?;
    if let Some(workspace_id) = &workspace_id {
        record.set(ConnectorField::WorkspaceId, &Value::String(workspace_id.clone()))?;
    }

    match ctx
        .client()
        .create(Resource::Connectors, record.into_body())
        .await
    {
        Ok(_) => {
            let mut text = format!(
                "✅ Connector '{connector_id}' ({connector_type}) created in workspace '{}'.",
                workspace_id.as_deref().unwrap_or("Default")
            );
            push_warnings(&mut text, &warnings);
            Ok(ToolOutput::text(text))
        }
        Err(err) if is_duplicate(&err) => Ok(ToolOutput::error(format!(
            "❌ Connector '{connector_id}' already exists. Use update_connector to change it or pick a different connectorId."
        ))),
        Err(err) => Err(err.into()),
    }
}

fn is_duplicate(err: &ClientError) -> bool {
    let ClientError::Api {
        status,
        detail,
        body,
    } = err
    else {
        return false;
    };
    if *status == 409 {
        return true;
    }
    match detail {
        Some(detail) => {
            DUPLICATE_PATTERN.is_match(&detail.code) || DUPLICATE_PATTERN.is_match(&detail.message)
        }
        None => DUPLICATE_PATTERN.is_match(body),
    }
}

/// Requested properties split against the connector's live property set.
#[derive(Debug, Default)]
struct UpdatePlan {
    /// Keyed by the live spelling.
    accepted: Map<String, Value>,
    warnings: Vec<String>,
}

fn plan_update(live: &Record, requested: &Map<String, Value>) -> Result<UpdatePlan, ToolError> {
    let mut plan = UpdatePlan::default();
    for (name, value) in requested {
        let Some(live_key) = live.find_key(name) else {
            plan.warnings.push(unknown_property_warning(live, name));
            continue;
        };

        if live_key.eq_ignore_ascii_case(ConnectorField::ReceiveInterval.canonical()) {
            let interval = value.as_str().unwrap_or_default();
            if let Err(err) = validate_cron(interval) {
                plan.warnings
                    .push(format!("{live_key} was not applied: {err}"));
                continue;
            }
        }

        let value = match ConnectorField::resolve(live_key) {
            Some(field) => field.kind().coerce(live_key, value)?,
            None => value.clone(),
        };
        plan.accepted.insert(live_key.to_string(), value);
    }
    Ok(plan)
}

fn unknown_property_warning(live: &Record, name: &str) -> String {
    let lowered = name.to_ascii_lowercase();
    let suggestion = live
        .keys()
        .filter(|key| !key.starts_with("@odata"))
        .map(|key| (strsim::jaro_winkler(&lowered, &key.to_ascii_lowercase()), key))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0));
    match suggestion {
        Some((_, key)) => {
            format!("Unknown property '{name}' was ignored (did you mean '{key}'?)")
        }
        None => format!("Unknown property '{name}' was ignored"),
    }
}

fn push_warnings(text: &mut String, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    text.push_str("\n\n⚠️ Warnings:");
    for warning in warnings {
        text.push_str("\n  - ");
        text.push_str(warning);
    }
}

pub async fn update_connector(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let connector_id = required_string(args, "connectorId")?;
    let requested = required_object(args, "properties")?;
    let key = EntityKey::single(&connector_id);

    let Some(live) = ctx.client().get(Resource::Connectors, &key).await? else {
        return Ok(not_found(Resource::Connectors, &key));
    };

    let plan = plan_update(&live, &requested)?;
    if plan.accepted.is_empty() {
        let mut valid: Vec<&str> = live.keys().filter(|k| !k.starts_with("@odata")).collect();
        valid.sort_by_key(|k| k.to_ascii_lowercase());
        let mut text = format!(
            "❌ No valid properties to update on connector '{connector_id}'.\nValid properties: {}",
            valid.join(", ")
        );
        push_warnings(&mut text, &plan.warnings);
        return Ok(ToolOutput::error(text));
    }

    let updated: Vec<String> = plan
        .accepted
        .iter()
        .map(|(name, value)| {
            if is_secret_key(name) {
                format!("{name} = {MASK}")
            } else {
                format!("{name} = {}", super::render::display_value(value))
            }
        })
        .collect();

    ctx.client()
        .update(Resource::Connectors, &key, plan.accepted)
        .await?;
    tracing::info!(connector_id = %connector_id, properties = updated.len(), "connector updated");

    let mut text = format!("✅ Connector '{connector_id}' updated.\nUpdated properties:");
    for entry in &updated {
        text.push_str("\n  - ");
        text.push_str(entry);
    }
    push_warnings(&mut text, &plan.warnings);
    Ok(ToolOutput::text(text))
}

pub async fn delete_connector(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let connector_id = required_string(args, "connectorId")?;
    let key = EntityKey::single(&connector_id);
    match ctx.client().delete(Resource::Connectors, &key).await {
        Ok(()) => Ok(ToolOutput::text(format!(
            "🗑️ Connector '{connector_id}' deleted."
        ))),
        Err(err) if err.is_not_found() => Ok(not_found(Resource::Connectors, &key)),
        Err(err) => Err(err.into()),
    }
}

pub async fn get_connector_property(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let connector_id = required_string(args, "connectorId")?;
    let property = required_string(args, "property")?;
    let key = EntityKey::single(&connector_id);

    match ctx
        .client()
        .property_value(Resource::Connectors, &key, &property)
        .await
    {
        Ok(value) => {
            let shown = if is_secret_key(&property) && !value.is_empty() {
                MASK.to_string()
            } else if value.trim().is_empty() {
                NOT_SET.to_string()
            } else {
                value
            };
            Ok(ToolOutput::text(format!("{connector_id}.{property}: {shown}")))
        }
        Err(err) if err.is_not_found() => Ok(ToolOutput::text(format!(
            "Property '{property}' not found on connector '{connector_id}' (or the connector does not exist)."
        ))),
        Err(err) => Err(err.into()),
    }
}

pub async fn count_connectors(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let filter = scope(args)?
        .raw(arg_optional_string(args, "filter")?.as_deref())
        .build();
    let query = QueryOptions::new().filter(filter.clone());
    let count = ctx.client().count(Resource::Connectors, &query).await?;
    let phrase = count_phrase(count as usize, Resource::Connectors);
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

    #[tokio::test]
    async fn list_connectors_end_to_end() {
        let mock = MockArc::start().await;
        mock.reply(
            "GET",
            "/connectors",
            Reply::json(json!({"value": [
                {"ConnectorId": "AS2Out", "ConnectorType": "AS2", "WorkspaceId": "Default", "AutomationSend": true},
                {"connectorid": "AS2In", "connectortype": "AS2", "automationreceive": "false"}
            ]})),
        );

        let output = list_connectors(
            &mock.context(),
            &args(json!({"filter": "ConnectorType eq 'AS2'", "top": 5})),
        )
        .await
        .unwrap();

        let request = mock.last_request().unwrap();
        assert_eq!(request.path, "/connectors");
        assert_eq!(
            request.query.as_deref(),
            Some("$filter=ConnectorType%20eq%20%27AS2%27&$top=5")
        );
        assert!(output.text.starts_with("Found 2 connectors:"));
        assert!(output.text.contains("🔌 AS2Out"));
        assert!(output.text.contains("🔌 AS2In"));
        assert!(output.text.contains("Receive automation: ⏸️ Disabled"));
        assert!(!output.is_error);
    }

    #[tokio::test]
    async fn empty_list_is_a_plain_message() {
        let mock = MockArc::start().await;
        mock.reply("GET", "/connectors", Reply::json(json!({"value": []})));
        let output = list_connectors(&mock.context(), &args(json!({"workspaceId": "Ops"})))
            .await
            .unwrap();
        assert_eq!(
            output.text,
            "No connectors found matching filter: WorkspaceId eq 'Ops'"
        );
        assert!(!output.is_error);
    }

    #[tokio::test]
    async fn get_connector_404_is_not_found_text() {
        let mock = MockArc::start().await;
        mock.reply("GET", "/connectors('Nope')", Reply::status(404));
        let output = get_connector(&mock.context(), &args(json!({"connectorId": "Nope"})))
            .await
            .unwrap();
        assert_eq!(output.text, "Connector 'Nope' not found.");
        assert!(!output.is_error);
    }

    #[tokio::test]
    async fn missing_connector_id_fails_before_any_request() {
        let mock = MockArc::start().await;
        let err = get_connector(&mock.context(), &args(json!({})))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn update_applies_only_live_properties() {
        let mock = MockArc::start().await;
        mock.reply(
            "GET",
            "/connectors('SftpIn')",
            Reply::json(json!({"host": "old", "port": 22, "automationsend": false})),
        );
        mock.reply("PUT", "/connectors('SftpIn')", Reply::status(204));

        let output = update_connector(
            &mock.context(),
            &args(json!({"connectorId": "SftpIn", "properties": {"host": "x", "bogus": "y"}})),
        )
        .await
        .unwrap();

        let puts = mock.requests_with_method("PUT");
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].json(), json!({"host": "x"}));
        assert!(output.text.contains("host = x"));
        assert!(output.text.contains("Unknown property 'bogus' was ignored"));
        assert!(!output.is_error);
    }

    #[tokio::test]
    async fn update_uses_live_spelling_and_suggests_close_names() {
        let mock = MockArc::start().await;
        mock.reply(
            "GET",
            "/connectors('SftpIn')",
            Reply::json(json!({"host": "old", "automationsend": false})),
        );
        mock.reply("PUT", "/connectors('SftpIn')", Reply::status(204));

        let output = update_connector(
            &mock.context(),
            &args(json!({"connectorId": "SftpIn", "properties": {"AutomationSend": "true", "hots": "x"}})),
        )
        .await
        .unwrap();

        assert_eq!(
            mock.requests_with_method("PUT")[0].json(),
            json!({"automationsend": true})
        );
        assert!(output.text.contains("did you mean 'host'?"));
    }

    #[tokio::test]
    async fn update_with_no_valid_properties_is_refused() {
        let mock = MockArc::start().await;
        mock.reply(
            "GET",
            "/connectors('SftpIn')",
            Reply::json(json!({"host": "old", "port": 22})),
        );

        let output = update_connector(
            &mock.context(),
            &args(json!({"connectorId": "SftpIn", "properties": {"bogus": "y"}})),
        )
        .await
        .unwrap();

        assert!(output.is_error);
        assert!(output.text.contains("Valid properties: host, port"));
        assert!(mock.requests_with_method("PUT").is_empty());
    }

    #[tokio::test]
    async fn receive_interval_must_be_cron() {
        let mock = MockArc::start().await;
        mock.reply(
            "GET",
            "/connectors('AS2Out')",
            Reply::json(json!({"receiveinterval": "", "maxworkers": 1})),
        );
        mock.reply("PUT", "/connectors('AS2Out')", Reply::status(204));
        let ctx = mock.context();

        let output = update_connector(
            &ctx,
            &args(json!({"connectorId": "AS2Out", "properties": {"receiveinterval": "daily", "maxworkers": "4"}})),
        )
        .await
        .unwrap();
        assert_eq!(
            mock.requests_with_method("PUT")[0].json(),
            json!({"maxworkers": 4})
        );
        assert!(output.text.contains("receiveinterval was not applied"));

        update_connector(
            &ctx,
            &args(json!({"connectorId": "AS2Out", "properties": {"receiveinterval": "0 2 * * *"}})),
        )
        .await
        .unwrap();
        assert_eq!(
            mock.requests_with_method("PUT")[1].json(),
            json!({"receiveinterval": "0 2 * * *"})
        );
    }

    #[tokio::test]
    async fn duplicate_create_gets_dedicated_message() {
        let mock = MockArc::start().await;
        mock.reply(
            "POST",
            "/connectors",
            Reply::json_status(
                400,
                json!({"error": {"code": "E_CONNECTOR", "message": "Connector AS2Out already exists."}}),
            ),
        );
        let output = create_connector(
            &mock.context(),
            &args(json!({"connectorId": "AS2Out", "connectorType": "AS2"})),
        )
        .await
        .unwrap();
        assert!(output.is_error);
        assert!(output.text.contains("already exists"));
        assert_eq!(
            mock.last_request().unwrap().json(),
            json!({"ConnectorId": "AS2Out", "ConnectorType": "AS2"})
        );
    }

    #[tokio::test]
    async fn other_create_errors_keep_upstream_detail() {
        let mock = MockArc::start().await;
        mock.reply(
            "POST",
            "/connectors",
            Reply::json_status(400, json!({"error": {"code": "E_TYPE", "message": "Unknown type"}})),
        );
        let err = create_connector(
            &mock.context(),
            &args(json!({"connectorId": "X", "connectorType": "Nope"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.render(), "Arc API error (HTTP 400) [E_TYPE]: Unknown type");
    }

    #[tokio::test]
    async fn property_value_is_read_as_text() {
        let mock = MockArc::start().await;
        mock.reply(
            "GET",
            "/connectors('AS2Out')/ReceiveInterval/$value",
            Reply::text("0 2 * * *"),
        );
        let output = get_connector_property(
            &mock.context(),
            &args(json!({"connectorId": "AS2Out", "property": "ReceiveInterval"})),
        )
        .await
        .unwrap();
        assert_eq!(output.text, "AS2Out.ReceiveInterval: 0 2 * * *");
    }

    #[tokio::test]
    async fn count_connectors_scopes_the_count() {
        let mock = MockArc::start().await;
        mock.reply("GET", "/connectors/$count", Reply::text("3"));
        let output = count_connectors(&mock.context(), &args(json!({"connectorType": "SFTP"})))
            .await
            .unwrap();
        assert_eq!(output.text, "3 connectors matching: ConnectorType eq 'SFTP'");
        assert_eq!(
            mock.last_request().unwrap().query.as_deref(),
            Some("$filter=ConnectorType%20eq%20%27SFTP%27")
        );
    }
}
