//! Certificate inventory, creation and partner exchange.

use arc_mcp_core::fields::{ActionResultField, CertificateField};
use arc_mcp_core::format::{
    NOT_AVAILABLE, UNKNOWN, format_timestamp, parse_timestamp, pluralize,
};
use arc_mcp_core::{Action, EntityKey, QueryOptions, Record, Resource};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use super::render::{
    count_phrase, found, line, more_marker, no_results, not_found, property_lines,
};
use super::{ToolContext, ToolDefinition, ToolOutput, ToolResult};
use crate::args::{
    DEFAULT_LIST_TOP, arg_bounded_u64, arg_optional_raw_string, arg_optional_string,
    arg_optional_u64, arg_top, required_string,
};
use crate::error::ToolError;

pub const EXPIRY_WARNING_DAYS: i64 = 30;
const KEY_SIZES: [u64; 3] = [1024, 2048, 4096];
const DEFAULT_KEY_SIZE: u64 = 2048;
const DEFAULT_VALIDITY_DAYS: u64 = 365;
const MAX_VALIDITY_DAYS: u64 = 3650;
const SECONDS_PER_DAY: i64 = 86_400;

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_certificates",
            description: "List certificates with their expiry state, optionally only those expiring within N days.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "filter": { "type": "string", "description": "OData $filter expression" },
                    "top": { "type": "integer", "minimum": 1, "default": 50 },
                    "expiringWithinDays": { "type": "integer", "minimum": 0, "description": "Only certificates expiring within this many days (expired ones included)" }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_certificate",
            description: "Show one certificate by name.",
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
            name: "create_certificate",
            description: "Generate a self-signed certificate.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Certificate file name" },
                    "subject": { "type": "string", "description": "Distinguished name, e.g. CN=Acme,O=Acme Inc" },
                    "keySize": { "type": "integer", "enum": [1024, 2048, 4096], "default": 2048 },
                    "validityDays": { "type": "integer", "minimum": 1, "maximum": 3650, "default": 365 },
                    "password": { "type": "string", "description": "Password protecting the private key" }
                },
                "required": ["name", "subject"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "exchange_certificate",
            description: "Email a public certificate to the trading partner of a connector.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connectorId": { "type": "string" },
                    "certificateName": { "type": "string" },
                    "email": { "type": "string" }
                },
                "required": ["connectorId", "certificateName"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "delete_certificate",
            description: "Delete a certificate by name.",
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

/// Whole days until expiry, rounded down, so anything already past is
/// negative. Arc sometimes reports the count directly, otherwise it is
/// derived from the expiration date.
fn days_until_expiry(cert: &Record, now: DateTime<Utc>) -> Option<i64> {
    if let Some(days) = cert.int(CertificateField::ExpirationDays) {
        return Some(days);
    }
    let expires = parse_timestamp(&cert.text(CertificateField::ExpirationDate)?)?;
    Some((expires - now).num_seconds().div_euclid(SECONDS_PER_DAY))
}

fn expiry_label(days: Option<i64>) -> String {
    match days {
        Some(days) if days < 0 => format!(
            "❌ Expired {} ago",
            pluralize(days.unsigned_abs() as usize, "day", "days")
        ),
        Some(0) => "⚠️ Expires today".to_string(),
        Some(days) if days <= EXPIRY_WARNING_DAYS => format!("⚠️ Expires in {days} days"),
        Some(days) => format!("✅ Valid ({days} days left)"),
        None => "❔ Expiry unknown".to_string(),
    }
}

fn certificate_block(cert: &Record, now: DateTime<Utc>) -> String {
    let days = days_until_expiry(cert, now);
    let expires = cert
        .text(CertificateField::ExpirationDate)
        .map_or_else(|| NOT_AVAILABLE.to_string(), |ts| format_timestamp(&ts));
    let mut lines = vec![
        format!("📜 {}", cert.text_or(CertificateField::Name, UNKNOWN)),
        line("Status", expiry_label(days)),
        line("Subject", cert.text_or(CertificateField::Subject, NOT_AVAILABLE)),
        line("Issuer", cert.text_or(CertificateField::Issuer, NOT_AVAILABLE)),
        line("Expires", expires),
    ];
    if let Some(thumbprint) = cert.text(CertificateField::Thumbprint) {
        lines.push(line("Thumbprint", thumbprint));
    }
    if let Some(connectors) = cert.text(CertificateField::ConnectorIds) {
        lines.push(line("Used by", connectors));
    }
    lines.join("\n")
}

pub async fn list_certificates(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let within = arg_optional_u64(args, "expiringWithinDays")?;
    let top = arg_top(args, DEFAULT_LIST_TOP)?;
    let filter = arg_optional_string(args, "filter")?;
    let now = ctx.now();

    let Some(within) = within else {
        let query = QueryOptions::new().filter(filter).top(Some(top));
        let certificates = ctx.client().list(Resource::Certificates, &query).await?;
        if certificates.is_empty() {
            return Ok(no_results(Resource::Certificates, query.filter.as_deref()));
        }
        return Ok(found(
            Resource::Certificates,
            certificates
                .iter()
                .map(|cert| certificate_block(cert, now))
                .collect(),
        ));
    };

    // Expiry is judged here, not by Arc, so the whole inventory is fetched
    // and `top` caps the matches instead of the request.
    let query = QueryOptions::new().filter(filter);
    let certificates = ctx.client().list(Resource::Certificates, &query).await?;

    // Unknown expiry is kept out of the expiring view.
    let mut expiring: Vec<(i64, &Record)> = certificates
        .iter()
        .filter_map(|cert| days_until_expiry(cert, now).map(|days| (days, cert)))
        .filter(|(days, _)| *days <= within as i64)
        .collect();
    if expiring.is_empty() {
        return Ok(ToolOutput::text(format!(
            "✅ No certificates expire within {within} days."
        )));
    }
    expiring.sort_by_key(|(days, _)| *days);

    let total = expiring.len();
    let blocks: Vec<String> = expiring
        .iter()
        .take(top as usize)
        .map(|(_, cert)| certificate_block(cert, now))
        .collect();
    let mut text = format!(
        "Found {} expiring within {within} days:\n\n{}",
        count_phrase(total, Resource::Certificates),
        blocks.join("\n\n")
    );
    if let Some(more) = more_marker(total.saturating_sub(blocks.len())) {
        text.push_str("\n\n");
        text.push_str(&more);
    }
    Ok(ToolOutput::text(text))
}

pub async fn get_certificate(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let key = EntityKey::single(required_string(args, "name")?);
    let Some(cert) = ctx.client().get(Resource::Certificates, &key).await? else {
        return Ok(not_found(Resource::Certificates, &key));
    };
    let mut text = certificate_block(&cert, ctx.now());
    if let Some(serial) = cert.text(CertificateField::SerialNumber) {
        text.push('\n');
        text.push_str(&line("Serial number", serial));
    }
    if let Some(key_size) = cert.int(CertificateField::KeySize) {
        text.push('\n');
        text.push_str(&line("Key size", key_size));
    }
    if let Some(from) = cert.text(CertificateField::EffectiveDate) {
        text.push('\n');
        text.push_str(&line("Valid from", format_timestamp(&from)));
    }
    Ok(ToolOutput::text(text))
}

fn key_size(args: &Map<String, Value>) -> Result<u64, ToolError> {
    match arg_optional_u64(args, "keySize")? {
        None => Ok(DEFAULT_KEY_SIZE),
        Some(size) if KEY_SIZES.contains(&size) => Ok(size),
        Some(size) => Err(ToolError::validation(
            "keySize",
            format!("'keySize' must be 1024, 2048 or 4096 (got {size})"),
        )),
    }
}

pub async fn create_certificate(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let name = required_string(args, "name")?;
    let subject = required_string(args, "subject")?;
    let key_size = key_size(args)?;
    let validity = arg_bounded_u64(args, "validityDays", 1, MAX_VALIDITY_DAYS)?
        .unwrap_or(DEFAULT_VALIDITY_DAYS);

    let mut params = Map::new();
    params.insert("CertName".into(), json!(name));
    params.insert("CertSubject".into(), json!(subject));
    params.insert("KeySize".into(), json!(key_size));
    params.insert("ValidityPeriod".into(), json!(validity));
    if let Some(password) = arg_optional_raw_string(args, "password")? {
        params.insert("Password".into(), json!(password));
    }

    let outcome = ctx.client().action(Action::CreateCert, params).await?;
    tracing::info!(name = %name, key_size, validity, "certificate created");

    let mut lines = vec![
        format!("✅ Certificate '{name}' created."),
        line("Subject", &subject),
        line("Key size", key_size),
        line("Valid for", format!("{validity} days")),
    ];
    for record in outcome.records() {
        lines.extend(property_lines(record, true));
    }
    Ok(ToolOutput::text(lines.join("\n")))
}

pub async fn exchange_certificate(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let connector_id = required_string(args, "connectorId")?;
    let certificate = required_string(args, "certificateName")?;
    let email = arg_optional_string(args, "email")?;

    let mut params = Map::new();
    params.insert("ConnectorId".into(), json!(connector_id));
    params.insert("CertificateName".into(), json!(certificate));
    if let Some(email) = &email {
        params.insert("Email".into(), json!(email));
    }

    let outcome = ctx.client().action(Action::ExchangeCert, params).await?;
    let failure = outcome
        .records()
        .into_iter()
        .find_map(|row| row.text(ActionResultField::ErrorMessage));
    if let Some(failure) = failure {
        return Ok(ToolOutput::error(format!(
            "❌ Certificate exchange for '{connector_id}' failed: {failure}"
        )));
    }
    let recipient = email.unwrap_or_else(|| format!("the partner configured on {connector_id}"));
    Ok(ToolOutput::text(format!(
        "✅ Certificate '{certificate}' sent to {recipient}.\n{}",
        line("Connector", &connector_id)
    )))
}

pub async fn delete_certificate(ctx: &ToolContext, args: &Map<String, Value>) -> ToolResult {
    let key = EntityKey::single(required_string(args, "name")?);
    match ctx.client().delete(Resource::Certificates, &key).await {
        Ok(()) => Ok(ToolOutput::text(format!("✅ Certificate {key} deleted."))),
        Err(err) if err.is_not_found() => Ok(not_found(Resource::Certificates, &key)),
        Err(err) => Err(err.into()),
    }
}
