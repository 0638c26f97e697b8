use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::fields::{Field, parse_flag};

/// One upstream entity as returned by the API. Typed access goes through a
/// field enum so alias resolution happens here and nowhere else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// First alias present with a non-null value.
    pub fn get<F: Field>(&self, field: F) -> Option<&Value> {
        field
            .aliases()
            .iter()
            .filter_map(|alias| self.0.get(*alias))
            .find(|value| !value.is_null())
    }

    /// Scalar rendered as trimmed text; blank strings count as absent.
    pub fn text<F: Field>(&self, field: F) -> Option<String> {
        match self.get(field)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(items) => {
                let parts = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect::<Vec<_>>();
                (!parts.is_empty()).then(|| parts.join(", "))
            }
            _ => None,
        }
    }

    pub fn text_or<F: Field>(&self, field: F, placeholder: &str) -> String {
        self.text(field).unwrap_or_else(|| placeholder.to_string())
    }

    pub fn int<F: Field>(&self, field: F) -> Option<i64> {
        match self.get(field)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn flag<F: Field>(&self, field: F) -> Option<bool> {
        match self.get(field)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => parse_flag(s),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            _ => None,
        }
    }

    pub fn is_blank<F: Field>(&self, field: F) -> bool {
        self.text(field).is_none()
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The live spelling of `name` on this record, matched case-insensitively.
    pub fn find_key(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.0
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// Recognised fields of an open-ended property bag, validated against their
/// declared kind, plus pass-through entries for keys the table does not know.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialRecord<F: Field> {
    known: BTreeMap<F, Value>,
    extra: Map<String, Value>,
}

impl<F: Field> Default for PartialRecord<F> {
    fn default() -> Self {
        Self {
            known: BTreeMap::new(),
            extra: Map::new(),
        }
    }
}

impl<F: Field> PartialRecord<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a caller-supplied object into typed known fields and extras.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, CoreError> {
        let mut record = Self::new();
        for (key, value) in map {
            match F::resolve(key) {
                Some(field) => record.set(field, value)?,
                None => {
                    record.extra.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(record)
    }

    pub fn set(&mut self, field: F, value: &Value) -> Result<(), CoreError> {
        let coerced = field.kind().coerce(field.canonical(), value)?;
        self.known.insert(field, coerced);
        Ok(())
    }

    pub fn get(&self, field: F) -> Option<&Value> {
        self.known.get(&field)
    }

    pub fn remove(&mut self, field: F) -> Option<Value> {
        self.known.remove(&field)
    }

    pub fn known_fields(&self) -> impl Iterator<Item = F> + '_ {
        self.known.keys().copied()
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn len(&self) -> usize {
        self.known.len() + self.extra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.extra.is_empty()
    }

    /// Upstream body: known fields under their canonical spelling, extras verbatim.
    pub fn into_body(self) -> Map<String, Value> {
        let mut body = self.extra;
        for (field, value) in self.known {
            body.insert(field.canonical().to_string(), value);
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::fields::{LogField, TransactionField, WorkspaceField};

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn get_follows_alias_order_and_skips_nulls() {
        let log = record(json!({"Type": null, "level": "Error"}));
        assert_eq!(log.text(LogField::Level).as_deref(), Some("Error"));

        let tx = record(json!({"StartTime": "2025-01-01T00:00:00Z", "MessageCount": "3"}));
        assert_eq!(
            tx.text(TransactionField::Timestamp).as_deref(),
            Some("2025-01-01T00:00:00Z")
        );
        assert_eq!(tx.int(TransactionField::MessageCount), Some(3));
    }

    #[test]
    fn blank_strings_are_absent() {
        let row = record(json!({"Filename": "  "}));
        assert!(row.is_blank(TransactionField::Filename));
        assert_eq!(row.text_or(TransactionField::Filename, "N/A"), "N/A");
    }

    #[test]
    fn find_key_returns_live_spelling() {
        let row = record(json!({"automationsend": true, "Host": "x"}));
        assert_eq!(row.find_key("AutomationSend"), Some("automationsend"));
        assert_eq!(row.find_key("host"), Some("Host"));
        assert_eq!(row.find_key("port"), None);
    }

    #[test]
    fn partial_record_validates_known_and_passes_extras() {
        let input = json!({
            "SMTPPort": "587",
            "smtpssl": "true",
            "customsetting": {"nested": 1}
        });
        let partial =
            PartialRecord::<WorkspaceField>::from_map(input.as_object().unwrap()).unwrap();
        assert_eq!(partial.get(WorkspaceField::SmtpPort), Some(&json!(587)));
        assert_eq!(partial.extra().len(), 1);

        let body = partial.into_body();
        assert_eq!(body.get("smtpport"), Some(&json!(587)));
        assert_eq!(body.get("smtpssl"), Some(&json!(true)));
        assert_eq!(body.get("customsetting"), Some(&json!({"nested": 1})));
    }

    #[test]
    fn partial_record_rejects_wrong_kind() {
        let input = json!({"cleanupdays": "weekly"});
        let err = PartialRecord::<WorkspaceField>::from_map(input.as_object().unwrap())
            .unwrap_err();
        assert_eq!(err.to_string(), "'cleanupdays' must be an integer");
    }
}
