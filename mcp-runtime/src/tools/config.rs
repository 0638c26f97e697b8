//! Profile, workspaces and the vault.
//!
//! Vault tools take a `vaultId` argument but Arc users know entries by name,
//! so every keyed vault call first resolves it against the full list: an
//! exact Id first, then a case-insensitive Name.

use std::collections::BTreeMap;

use arc_mcp_core::error::codes;
use arc_mcp_core::fields::{ProfileSetting, VaultField, WorkspaceField};
use arc_mcp_core::format::{MASK, NOT_SET, UNKNOWN, is_secret_key};
use arc_mcp_core::{EntityKey, Field, PartialRecord, QueryOptions, Record, Resource};
use serde_json::{Map, Value, json};

use super::render::{display_value, found, line, no_results, not_found, property_lines};
use super::{ToolContext, ToolDefinition, ToolOutput, ToolResult};
use crate::args::{
    DEFAULT_LIST_TOP, arg_bool, arg_optional_bool, arg_optional_object, arg_optional_raw_string,
    arg_optional_string, arg_optional_string_array, query_options, required_object,
    required_string,
};
use crate::error::ToolError;

const GENERAL_GROUP: &str = "General";

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get_profile",
            description: "Show the Arc application profile, grouped by protocol prefix. Secret values are masked.",
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "update_profile",
            description: "Update application profile settings, e.g. {\"CompanyName\": \"Acme\", \"as2:AS2Identifier\": \"ACME\"}.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "settings": { "type": "object", "description": "Profile settings to change" }
                },
                "required": ["settings"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "list_workspaces",
            description: "List workspaces.",
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
            name: "get_workspace",
            description: "Show one workspace and its settings.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workspaceId": { "type": "string" }
                },
                "required": ["workspaceId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "create_workspace",
            description: "Create a workspace with optional initial settings.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workspaceId": { "type": "string" },
                    "settings": { "type": "object", "description": "e.g. description, emailto, cleanupdays" }
                },
                "required": ["workspaceId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "update_workspace",
            description: "Change settings of an existing workspace.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workspaceId": { "type": "string" },
                    "settings": { "type": "object" }
                },
                "required": ["workspaceId", "settings"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "delete_workspace",
            description: "Delete a workspace.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workspaceId": { "type": "string" }
                },
                "required": ["workspaceId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "list_vault_entries",
            description: "List vault entries. Values are never shown.",
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
            name: "get_vault_entry",
            description: "Show one vault entry. 'vaultId' is the entry Id, or its Name matched case-insensitively.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "vaultId": { "type": "string", "description": "Vault entry Id or Name" },
                    "showValue": { "type": "boolean", "default": false }
                },
                "required": ["vaultId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "create_vault_entry",
            description: "Create a vault entry.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "value": { "type": "string" },
                    "type": { "type": "string", "description": "e.g. String, Password" },
                    "showType": { "type": "boolean" },
                    "tags": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["name", "value"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "update_vault_entry",
            description: "Update a vault entry found by Id or by case-insensitive Name ('vaultId'). At least one of value, type, showType, tags is required.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "vaultId": { "type": "string", "description": "Vault entry Id or Name" },
                    "value": { "type": "string" },
                    "type": { "type": "string" },
                    "showType": { "type": "boolean" },
                    "tags": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["vaultId"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "delete_vault_entry",
            description: "Delete a vault entry found by Id or by case-insensitive Name ('vaultId').",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "vaultId": { "type": "string", "description": "Vault entry Id or Name" }
                },
                "required": ["vaultId"],
                "additionalProperties": false
            }),
        },
    ]
}

fn masked(key: &str, value: &Value) -> String {
    if is_secret_key(key) && !value.is_null() {
        MASK.to_string()
    } else {
        display_value(value)
    }
}

/// `as2:AS2Identifier` belongs to the `AS2` group; unprefixed keys are general.
fn profile_groups(profile: &Record) -> BTreeMap<String, Vec<(String, String)>> {
    let mut groups: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for (key, value) in profile.iter() {
        if key.starts_with("@odata") {
            continue;
        }
        let (group, name) = match key.split_once(':') {
            Some((prefix, rest)) if !prefix.is_empty() => (prefix.to_ascii_uppercase(), rest),
            _ => (GENERAL_GROUP.to_string(), key),
        };
        groups
            .entry(group)
            .or_default()
            .push((name.to_string(), masked(key, value)));
    }
    for entries in groups.values_mut() {
        entries.sort_by_key(|(name, _)| name.to_ascii_lowercase());
    }
    groups
}

fn render_profile(profile: &Record) -> String {
    let mut groups = profile_groups(profile);
    let mut sections = vec!["🏢 Arc profile".to_string()];
    // General first, protocol groups alphabetically after it.
    let general = groups.remove(GENERAL_GROUP);
    for (group, entries) in general
        .map(|entries| (GENERAL_GROUP.to_string(), entries))
        .into_iter()
        .chain(groups)
    {
        let mut lines = vec![format!("{group}:")];
        lines.extend(entries.iter().map(|(name, value)| line(name, value)));
        sections.push(lines.join("\n"));
    }
    sections.join("\n\n")
}

pub async fn get_profile(ctx: &ToolContext, _args: &Map<String, Value>) -> ToolResult {
    let profile = ctx
        .client()
        .list(Resource::Profile, &QueryOptions::new())
        .await?;
    match profile.first() {
        Some(profile) => Ok(ToolOutput::text(render_profile(profile))),
        None => Ok(no_results(Resource::Profile, None)),
    }
}

fn change_lines(body: &Map<String, Value>) -> Vec<String> {
    body.iter()
        .filter(|(key, _)| !key.starts_with("@odata"))
        .map(|(key, value)| format!("  - {key} = {}", masked(key, value)))
        .collect()
}

pub async fn update_profile(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let settings = required_object(args, "settings")?;
    let body = PartialRecord::<ProfileSetting>::from_map(&settings)?.into_body();
    let changes = change_lines(&body);
    ctx.client().update_profile(body).await?;
    Ok(ToolOutput::text(format!(
        "✅ Profile updated.\nUpdated settings:\n{}",
        changes.join("\n")
    )))
}

fn workspace_summary(workspace: &Record) -> String {
    let mut lines = vec![
        format!("📁 {}", workspace.text_or(WorkspaceField::WorkspaceId, UNKNOWN)),
        line(
            "Description",
            workspace.text_or(WorkspaceField::Description, NOT_SET),
        ),
    ];
    if let Some(count) = workspace.int(WorkspaceField::ConnectorCount) {
        lines.push(line("Connectors", count));
    }
    lines.join("\n")
}

pub async fn list_workspaces(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let query = query_options(args, DEFAULT_LIST_TOP)?;
    let workspaces = ctx.client().list(Resource::Workspaces, &query).await?;
    if workspaces.is_empty() {
        return Ok(no_results(Resource::Workspaces, query.filter.as_deref()));
    }
    Ok(found(
        Resource::Workspaces,
        workspaces.iter().map(workspace_summary).collect(),
    ))
}

pub async fn get_workspace(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let key = EntityKey::single(required_string(args, "workspaceId")?);
    let Some(workspace) = ctx.client().get(Resource::Workspaces, &key).await? else {
        return Ok(not_found(Resource::Workspaces, &key));
    };
    let mut lines = vec![format!(
        "📁 Workspace {}",
        workspace.text_or(WorkspaceField::WorkspaceId, UNKNOWN)
    )];
    lines.extend(property_lines(&workspace, true));
    Ok(ToolOutput::text(lines.join("\n")))
}

pub async fn create_workspace(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let workspace_id = required_string(args, "workspaceId")?;
    let settings = arg_optional_object(args, "settings")?.unwrap_or_default();
    let mut record = PartialRecord::<WorkspaceField>::from_map(&settings)?;
    record.set(WorkspaceField::WorkspaceId, &Value::String(workspace_id.clone()))?;

    ctx.client()
        .create(Resource::Workspaces, record.into_body())
        .await?;
    tracing::info!(workspace_id = %workspace_id, "workspace created");
    Ok(ToolOutput::text(format!("✅ Workspace '{workspace_id}' created.")))
}

pub async fn update_workspace(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let workspace_id = required_string(args, "workspaceId")?;
    let settings = required_object(args, "settings")?;
    let body = PartialRecord::<WorkspaceField>::from_map(&settings)?.into_body();
    let changes = change_lines(&body);
    let key = EntityKey::single(workspace_id.as_str());
    match ctx.client().update(Resource::Workspaces, &key, body).await {
        Ok(_) => Ok(ToolOutput::text(format!(
            "✅ Workspace '{workspace_id}' updated.\nUpdated settings:\n{}",
            changes.join("\n")
        ))),
        Err(err) if err.is_not_found() => Ok(not_found(Resource::Workspaces, &key)),
        Err(err) => Err(err.into()),
    }
}

pub async fn delete_workspace(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let key = EntityKey::single(required_string(args, "workspaceId")?);
    match ctx.client().delete(Resource::Workspaces, &key).await {
        Ok(()) => Ok(ToolOutput::text(format!("✅ Workspace {key} deleted."))),
        Err(err) if err.is_not_found() => Ok(not_found(Resource::Workspaces, &key)),
        Err(err) => Err(err.into()),
    }
}

fn vault_block(entry: &Record, show_value: bool) -> String {
    let value = if show_value {
        entry.text_or(VaultField::Value, NOT_SET)
    } else {
        MASK.to_string()
    };
    [
        format!("🔐 {}", entry.text_or(VaultField::Name, UNKNOWN)),
        line("ID", entry.text_or(VaultField::Id, UNKNOWN)),
        line("Type", entry.text_or(VaultField::Type, NOT_SET)),
        line("Tags", entry.text_or(VaultField::Tags, NOT_SET)),
        line("Value", value),
    ]
    .join("\n")
}

pub async fn list_vault_entries(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let query = query_options(args, DEFAULT_LIST_TOP)?;
    let entries = ctx.client().list(Resource::Vault, &query).await?;
    if entries.is_empty() {
        return Ok(no_results(Resource::Vault, query.filter.as_deref()));
    }
    Ok(found(
        Resource::Vault,
        entries.iter().map(|entry| vault_block(entry, false)).collect(),
    ))
}

/// Outcome of looking a vault entry up by name.
enum VaultLookup {
    Unique { entry: Record, key: EntityKey },
    /// Nothing to mutate; the output explains why.
    Settled(ToolOutput),
}

async fn resolve_vault(ctx: &ToolContext, name: &str) -> Result<VaultLookup, ToolError> {
    let entries = ctx
        .client()
        .list(Resource::Vault, &QueryOptions::new())
        .await?;

    // An exact Id wins over any name match.
    if let Some(entry) = entries
        .iter()
        .find(|entry| entry.text(VaultField::Id).as_deref() == Some(name))
    {
        return Ok(VaultLookup::Unique {
            entry: entry.clone(),
            key: EntityKey::single(name),
        });
    }

    let mut matches: Vec<Record> = entries
        .into_iter()
        .filter(|entry| {
            entry
                .text(VaultField::Name)
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name))
        })
        .collect();

    match matches.len() {
        0 => Ok(VaultLookup::Settled(not_found(
            Resource::Vault,
            &EntityKey::single(name),
        ))),
        1 => {
            let entry = matches.remove(0);
            let Some(id) = entry.text(VaultField::Id) else {
                return Err(ToolError::new(
                    codes::RESPONSE_ERROR,
                    format!("Vault entry '{name}' has no Id"),
                ));
            };
            Ok(VaultLookup::Unique {
                entry,
                key: EntityKey::single(id),
            })
        }
        count => {
            let listed: Vec<String> = matches
                .iter()
                .map(|entry| {
                    format!(
                        "  - {} (ID: {})",
                        entry.text_or(VaultField::Name, UNKNOWN),
                        entry.text_or(VaultField::Id, UNKNOWN)
                    )
                })
                .collect();
            tracing::warn!(name, count, "ambiguous vault entry name");
            Ok(VaultLookup::Settled(ToolOutput::error(format!(
                "❌ {count} vault entries match '{name}':\n{}\n\nNames are matched case-insensitively. Retry with one of the IDs above.",
                listed.join("\n")
            ))))
        }
    }
}

pub async fn get_vault_entry(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let name = required_string(args, "vaultId")?;
    let show_value = arg_bool(args, "showValue", false)?;
    match resolve_vault(ctx, &name).await? {
        VaultLookup::Unique { entry, .. } => Ok(ToolOutput::text(vault_block(&entry, show_value))),
        VaultLookup::Settled(output) => Ok(output),
    }
}

/// Typed body from the optional vault arguments; only provided ones are set.
fn vault_body(args: &Map<String, Value>) -> Result<PartialRecord<VaultField>, ToolError> {
    let mut record = PartialRecord::<VaultField>::new();
    if let Some(value) = arg_optional_raw_string(args, "value")? {
        record.set(VaultField::Value, &Value::String(value))?;
    }
    if let Some(kind) = arg_optional_string(args, "type")? {
        record.set(VaultField::Type, &Value::String(kind))?;
    }
    if let Some(show_type) = arg_optional_bool(args, "showType")? {
        record.set(VaultField::ShowType, &Value::Bool(show_type))?;
    }
    if let Some(tags) = arg_optional_string_array(args, "tags")? {
        record.set(VaultField::Tags, &json!(tags))?;
    }
    Ok(record)
}

pub async fn create_vault_entry(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let name = required_string(args, "name")?;
    if arg_optional_raw_string(args, "value")?.is_none() {
        return Err(ToolError::validation("value", "Missing required field 'value'"));
    }
    let mut record = vault_body(args)?;
    record.set(VaultField::Name, &Value::String(name.clone()))?;

    ctx.client().create(Resource::Vault, record.into_body()).await?;
    tracing::info!(name = %name, "vault entry created");
    Ok(ToolOutput::text(format!("✅ Vault entry '{name}' created.")))
}

pub async fn update_vault_entry(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let name = required_string(args, "vaultId")?;
    let record = vault_body(args)?;
    if record.is_empty() {
        return Err(ToolError::validation(
            "value",
            "Provide at least one of 'value', 'type', 'showType' or 'tags'",
        ));
    }
    let changed = record
        .known_fields()
        .map(Field::canonical)
        .collect::<Vec<_>>()
        .join(", ");

    let key = match resolve_vault(ctx, &name).await? {
        VaultLookup::Unique { key, .. } => key,
        VaultLookup::Settled(output) => return Ok(output),
    };
    ctx.client()
        .update(Resource::Vault, &key, record.into_body())
        .await?;
    Ok(ToolOutput::text(format!(
        "✅ Vault entry '{name}' updated ({changed})."
    )))
}

pub async fn delete_vault_entry(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let name = required_string(args, "vaultId")?;
    let key = match resolve_vault(ctx, &name).await? {
        VaultLookup::Unique { key, .. } => key,
        VaultLookup::Settled(output) => return Ok(output),
    };
    ctx.client().delete(Resource::Vault, &key).await?;
    Ok(ToolOutput::text(format!("✅ Vault entry '{name}' deleted.")))
}
