//! Tool catalogue and dispatch.
//!
//! Each domain module exposes `definitions()` for `tools/list` and one async
//! handler per tool. Handlers validate arguments before touching the network,
//! call the client once (twice for vault name lookups) and render text.

use arc_mcp_core::error::codes;
use arc_mcp_core::odata::cutoff;
use arc_mcp_core::{DateLiteralStyle, FilterBuilder, QueryOptions};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::args::query_options;
use crate::client::ArcClient;
use crate::error::ToolError;

pub mod actions;
pub mod certificates;
pub mod config;
pub mod connectors;
pub mod files;
pub mod monitoring;
pub mod render;
pub mod reports;
pub mod requests;

/// Everything a handler needs, built once at start-up.
#[derive(Clone, Debug)]
pub struct ToolContext {
    client: ArcClient,
    date_style: DateLiteralStyle,
    clock: fn() -> DateTime<Utc>,
}

impl ToolContext {
    pub fn new(client: ArcClient) -> Self {
        Self {
            client,
            date_style: DateLiteralStyle::default(),
            clock: Utc::now,
        }
    }

    pub fn with_date_style(mut self, date_style: DateLiteralStyle) -> Self {
        self.date_style = date_style;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn client(&self) -> &ArcClient {
        &self.client
    }

    pub fn date_style(&self) -> DateLiteralStyle {
        self.date_style
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// `field ge <now - hours>` in the configured literal style.
    pub fn window(&self, field: &str, hours: u32) -> FilterBuilder {
        FilterBuilder::new().since(field, cutoff(self.now(), hours), self.date_style)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

pub type ToolResult = Result<ToolOutput, ToolError>;

#[derive(Debug)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    let mut tools = Vec::new();
    tools.extend(connectors::definitions());
    tools.extend(files::definitions());
    tools.extend(monitoring::definitions());
    tools.extend(config::definitions());
    tools.extend(certificates::definitions());
    tools.extend(reports::definitions());
    tools.extend(requests::definitions());
    tools.extend(actions::definitions());
    tools
}

pub async fn execute_tool(ctx: &ToolContext, name: &str, args: &Map<String, Value>) -> ToolResult {
    match name {
        "list_connectors" => connectors::list_connectors(ctx, args).await,
        "get_connector" => connectors::get_connector(ctx, args).await,
        "create_connector" => connectors::create_connector(ctx, args).await,
        "update_connector" => connectors::update_connector(ctx, args).await,
        "delete_connector" => connectors::delete_connector(ctx, args).await,
        "get_connector_property" => connectors::get_connector_property(ctx, args).await,
        "count_connectors" => connectors::count_connectors(ctx, args).await,

        "list_files" => files::list_files(ctx, args).await,
        "get_file" => files::get_file(ctx, args).await,
        "get_recent_files" => files::get_recent_files(ctx, args).await,
        "delete_file" => files::delete_file(ctx, args).await,
        "count_files" => files::count_files(ctx, args).await,

        "list_transactions" => monitoring::list_transactions(ctx, args).await,
        "get_transaction" => monitoring::get_transaction(ctx, args).await,
        "get_recent_transactions" => monitoring::get_recent_transactions(ctx, args).await,
        "count_transactions" => monitoring::count_transactions(ctx, args).await,
        "list_logs" => monitoring::list_logs(ctx, args).await,
        "get_log" => monitoring::get_log(ctx, args).await,
        "get_error_logs" => monitoring::get_error_logs(ctx, args).await,

        "get_profile" => config::get_profile(ctx, args).await,
        "update_profile" => config::update_profile(ctx, args).await,
        "list_workspaces" => config::list_workspaces(ctx, args).await,
        "get_workspace" => config::get_workspace(ctx, args).await,
        "create_workspace" => config::create_workspace(ctx, args).await,
        "update_workspace" => config::update_workspace(ctx, args).await,
        "delete_workspace" => config::delete_workspace(ctx, args).await,
        "list_vault_entries" => config::list_vault_entries(ctx, args).await,
        "get_vault_entry" => config::get_vault_entry(ctx, args).await,
        "create_vault_entry" => config::create_vault_entry(ctx, args).await,
        "update_vault_entry" => config::update_vault_entry(ctx, args).await,
        "delete_vault_entry" => config::delete_vault_entry(ctx, args).await,

        "list_certificates" => certificates::list_certificates(ctx, args).await,
        "get_certificate" => certificates::get_certificate(ctx, args).await,
        "create_certificate" => certificates::create_certificate(ctx, args).await,
        "exchange_certificate" => certificates::exchange_certificate(ctx, args).await,
        "delete_certificate" => certificates::delete_certificate(ctx, args).await,

        "list_reports" => reports::list_reports(ctx, args).await,
        "get_report" => reports::get_report(ctx, args).await,
        "create_report" => reports::create_report(ctx, args).await,
        "update_report" => reports::update_report(ctx, args).await,
        "delete_report" => reports::delete_report(ctx, args).await,

        "list_requests" => requests::list_requests(ctx, args).await,
        "get_request" => requests::get_request(ctx, args).await,
        "get_recent_requests" => requests::get_recent_requests(ctx, args).await,

        "receive_file" => actions::receive_file(ctx, args).await,
        "send_file" => actions::send_file(ctx, args).await,
        "copy_connector" => actions::copy_connector(ctx, args).await,
        "cleanup" => actions::cleanup(ctx, args).await,
        "export_workspace" => actions::export_workspace(ctx, args).await,
        "import_workspace" => actions::import_workspace(ctx, args).await,
        "set_connector_flow" => actions::set_connector_flow(ctx, args).await,

        _ => Err(unknown_tool(name)),
    }
}

fn unknown_tool(name: &str) -> ToolError {
    let error = ToolError::new(codes::UNKNOWN_TOOL, format!("Unknown tool: {name}"))
        .with_field("name");
    let closest = tool_definitions()
        .into_iter()
        .map(|tool| (strsim::jaro_winkler(name, tool.name), tool.name))
        .filter(|(score, _)| *score >= 0.85)
        .max_by(|a, b| a.0.total_cmp(&b.0));
    match closest {
        Some((_, suggestion)) => error.with_docs_hint(format!("Did you mean '{suggestion}'?")),
        None => error.with_docs_hint("Call tools/list for the available tools."),
    }
}

/// Standard OData options with `scope` clauses conjoined ahead of the
/// caller's free-form `filter`.
pub fn scoped_query(
    args: &Map<String, Value>,
    default_top: u64,
    scope: FilterBuilder,
) -> Result<QueryOptions, ToolError> {
    let mut query = query_options(args, default_top)?;
    query.filter = scope.raw(query.filter.as_deref()).build();
    Ok(query)
}
