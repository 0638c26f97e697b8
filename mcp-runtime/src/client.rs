//! HTTP client for the CData Arc Admin API.
//!
//! One `ArcClient` is built at start-up and shared read-only by every tool
//! call. Each method performs exactly one request; nothing is retried.

use std::time::Duration;

use arc_mcp_core::fields::ActionResultField;
use arc_mcp_core::{Action, EntityKey, QueryOptions, Record, Resource, UpstreamError};
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::{Map, Value};
use thiserror::Error;

pub const AUTH_TOKEN_HEADER: &str = "x-cdata-authtoken";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const ODATA_TYPE_KEY: &str = "@odata.type";
const JSON: &str = "application/json";
const PLAIN_TEXT: &str = "text/plain";
const ERROR_BODY_PREVIEW_CHARS: usize = 300;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// How credentials are presented to Arc. A token containing a colon is a
/// `user:password` pair for Basic auth; anything else is an Arc auth token.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    None,
    Basic { username: String, password: String },
    Token(String),
}

impl Auth {
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            None => Auth::None,
            Some(token) => match token.split_once(':') {
                Some((username, password)) => Auth::Basic {
                    username: username.to_string(),
                    password: password.to_string(),
                },
                None => Auth::Token(token.to_string()),
            },
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Auth::None => "none",
            Auth::Basic { .. } => "basic",
            Auth::Token(_) => "token",
        }
    }

    fn header(&self) -> Option<(&'static str, String)> {
        match self {
            Auth::None => None,
            Auth::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                Some((AUTHORIZATION.as_str(), format!("Basic {encoded}")))
            }
            Auth::Token(token) => Some((AUTH_TOKEN_HEADER, token.clone())),
        }
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mode())
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid Arc base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to Arc API timed out ({method} /{path})")]
    Timeout { method: Method, path: String },
    #[error("failed to reach Arc API ({method} /{path}): {source}")]
    Transport {
        method: Method,
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{}", api_error_message(.status, .detail, .body))]
    Api {
        status: u16,
        detail: Option<UpstreamError>,
        body: String,
    },
    #[error("unexpected response from Arc API (/{path}): {reason}")]
    Decode { path: String, reason: String },
}

fn api_error_message(status: &u16, detail: &Option<UpstreamError>, body: &str) -> String {
    match detail {
        Some(detail) if !detail.code.is_empty() => {
            format!("HTTP {status} [{}]: {}", detail.code, detail.message)
        }
        Some(detail) => format!("HTTP {status}: {}", detail.message),
        None if body.trim().is_empty() => format!("HTTP {status}"),
        None => format!(
            "HTTP {status}: {}",
            arc_mcp_core::format::truncate(body.trim(), ERROR_BODY_PREVIEW_CHARS)
        ),
    }
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }

    pub fn detail(&self) -> Option<&UpstreamError> {
        match self {
            ClientError::Api { detail, .. } => detail.as_ref(),
            _ => None,
        }
    }
}

/// Normalised response of a POST action. Arc answers some actions with an
/// array of per-item rows and others with a single object.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Rows(Vec<Record>),
    Single(Record),
    Empty,
}

impl ActionOutcome {
    pub fn from_body(body: Value) -> Self {
        match body {
            Value::Array(items) => ActionOutcome::Rows(records_from(items)),
            Value::Object(mut map) => match map.remove("value") {
                Some(Value::Array(items)) => ActionOutcome::Rows(records_from(items)),
                Some(other) => {
                    map.insert("value".to_string(), other);
                    ActionOutcome::Single(Record::new(map))
                }
                None if map.is_empty() => ActionOutcome::Empty,
                None => ActionOutcome::Single(Record::new(map)),
            },
            _ => ActionOutcome::Empty,
        }
    }

    pub fn records(&self) -> Vec<&Record> {
        match self {
            ActionOutcome::Rows(rows) => rows.iter().filter(|row| !row.is_empty()).collect(),
            ActionOutcome::Single(record) => vec![record],
            ActionOutcome::Empty => Vec::new(),
        }
    }

    /// Per-file rows with the blank-filename placeholders Arc emits removed.
    pub fn meaningful_rows(&self) -> Vec<&Record> {
        self.records()
            .into_iter()
            .filter(|row| !row.is_blank(ActionResultField::File))
            .collect()
    }
}

fn records_from(items: Vec<Value>) -> Vec<Record> {
    items.into_iter().filter_map(Record::from_value).collect()
}

/// `$count` bodies are plain decimal text; anything else counts as zero.
pub fn parse_count(body: &str) -> u64 {
    body.trim().parse::<u64>().unwrap_or(0)
}

#[derive(Clone, Debug)]
pub struct ArcClient {
    http: reqwest::Client,
    base_url: String,
    auth: Auth,
}

impl ArcClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| ClientError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        let auth = Auth::from_token(config.auth_token.as_deref());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON));
        if let Some((name, value)) = auth.header() {
            let mut value = HeaderValue::from_str(&value).map_err(|e| {
                ClientError::InvalidBaseUrl {
                    url: config.base_url.clone(),
                    reason: format!("auth token is not a valid header value: {e}"),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_mode(&self) -> &'static str {
        self.auth.mode()
    }

    pub async fn list(
        &self,
        resource: Resource,
        query: &QueryOptions,
    ) -> Result<Vec<Record>, ClientError> {
        let path = format!("{}{}", resource.path(), query.to_query_string());
        let body = self.request_json(Method::GET, &path, None).await?;
        if resource.is_singleton() {
            return Ok(singleton_as_collection(body));
        }
        Ok(collection(body))
    }

    /// `Ok(None)` when Arc answers 404.
    pub async fn get(
        &self,
        resource: Resource,
        key: &EntityKey,
    ) -> Result<Option<Record>, ClientError> {
        let path = format!("{}{}", resource.path(), key.to_segment());
        match self.request_json(Method::GET, &path, None).await {
            Ok(body) => Ok(single(body)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn create(
        &self,
        resource: Resource,
        body: Map<String, Value>,
    ) -> Result<Record, ClientError> {
        let payload = Value::Object(body);
        let response = self
            .request_json(Method::POST, resource.path(), Some(&payload))
            .await?;
        Ok(single(response).unwrap_or_else(|| echo(payload)))
    }

    pub async fn update(
        &self,
        resource: Resource,
        key: &EntityKey,
        body: Map<String, Value>,
    ) -> Result<Record, ClientError> {
        let path = format!("{}{}", resource.path(), key.to_segment());
        self.put(resource, &path, body).await
    }

    /// The profile is updated in place at `PUT /profile`.
    pub async fn update_profile(&self, body: Map<String, Value>) -> Result<Record, ClientError> {
        self.put(Resource::Profile, Resource::Profile.path(), body)
            .await
    }

    async fn put(
        &self,
        resource: Resource,
        path: &str,
        mut body: Map<String, Value>,
    ) -> Result<Record, ClientError> {
        if let Some(discriminator) = resource.update_discriminator() {
            body.insert(
                ODATA_TYPE_KEY.to_string(),
                Value::String(discriminator.to_string()),
            );
        }
        let payload = Value::Object(body);
        let response = self.request_json(Method::PUT, path, Some(&payload)).await?;
        Ok(single(response).unwrap_or_else(|| echo(payload)))
    }

    pub async fn delete(&self, resource: Resource, key: &EntityKey) -> Result<(), ClientError> {
        let path = format!("{}{}", resource.path(), key.to_segment());
        self.send(Method::DELETE, &path, JSON, None).await?;
        Ok(())
    }

    pub async fn count(&self, resource: Resource, query: &QueryOptions) -> Result<u64, ClientError> {
        let path = format!("{}/$count{}", resource.path(), query.to_query_string());
        let body = self.send(Method::GET, &path, PLAIN_TEXT, None).await?;
        Ok(parse_count(&body))
    }

    /// Raw scalar of one property via `/$value`.
    pub async fn property_value(
        &self,
        resource: Resource,
        key: &EntityKey,
        property: &str,
    ) -> Result<String, ClientError> {
        let path = format!(
            "{}{}/{}/$value",
            resource.path(),
            key.to_segment(),
            urlencoding::encode(property.trim())
        );
        self.send(Method::GET, &path, PLAIN_TEXT, None).await
    }

    pub async fn action(
        &self,
        action: Action,
        params: Map<String, Value>,
    ) -> Result<ActionOutcome, ClientError> {
        let payload = Value::Object(params);
        let body = self
            .request_json(Method::POST, action.path(), Some(&payload))
            .await?;
        Ok(ActionOutcome::from_body(body))
    }

    async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let text = self.send(method, path, JSON, body).await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ClientError::Decode {
            path: path.to_string(),
            reason: format!("invalid JSON: {e}"),
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        accept: &'static str,
        body: Option<&Value>,
    ) -> Result<String, ClientError> {
        let path = path.trim_start_matches('/');
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(method = %method, path, "arc request");

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, accept);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|source| {
            tracing::warn!(method = %method, path, error = %source, "arc request failed");
            if source.is_timeout() {
                ClientError::Timeout {
                    method: method.clone(),
                    path: path.to_string(),
                }
            } else {
                ClientError::Transport {
                    method: method.clone(),
                    path: path.to_string(),
                    source,
                }
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| {
            if source.is_timeout() {
                ClientError::Timeout {
                    method: method.clone(),
                    path: path.to_string(),
                }
            } else {
                ClientError::Decode {
                    path: path.to_string(),
                    reason: format!("failed to read body: {source}"),
                }
            }
        })?;

        if !status.is_success() {
            tracing::warn!(method = %method, path, status = status.as_u16(), "arc request rejected");
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| UpstreamError::from_body(&body));
            return Err(ClientError::Api {
                status: status.as_u16(),
                detail,
                body: text,
            });
        }

        tracing::debug!(method = %method, path, status = status.as_u16(), "arc response");
        Ok(text)
    }
}

/// `value` array of an OData envelope; missing or malformed means no rows.
fn collection(body: Value) -> Vec<Record> {
    match body {
        Value::Object(mut map) => match map.remove("value") {
            Some(Value::Array(items)) => records_from(items),
            _ => Vec::new(),
        },
        Value::Array(items) => records_from(items),
        _ => Vec::new(),
    }
}

fn singleton_as_collection(body: Value) -> Vec<Record> {
    match body {
        Value::Object(ref map) if map.contains_key("value") => collection(body),
        other => single(other).into_iter().collect(),
    }
}

/// Entity from a get-one body, tolerating a one-row `value` envelope.
fn single(body: Value) -> Option<Record> {
    match body {
        Value::Object(mut map) => match map.remove("value") {
            Some(Value::Array(items)) => items.into_iter().find_map(Record::from_value),
            Some(other) => {
                map.insert("value".to_string(), other);
                Some(Record::new(map))
            }
            None if map.is_empty() => None,
            None => Some(Record::new(map)),
        },
        _ => None,
    }
}

fn echo(payload: Value) -> Record {
    Record::from_value(payload).unwrap_or_default()
}
