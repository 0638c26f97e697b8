//! OData query-string and filter construction for the Arc Admin API.
//!
//! Only the five system query options Arc understands are modelled. Filter
//! expressions are passed through verbatim; malformed ones surface as
//! upstream 400s.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Recognised OData query options. Unset options are never emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    pub select: Option<String>,
    pub filter: Option<String>,
    pub orderby: Option<String>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, select: Option<String>) -> Self {
        self.select = non_blank(select);
        self
    }

    pub fn filter(mut self, filter: Option<String>) -> Self {
        self.filter = non_blank(filter);
        self
    }

    pub fn orderby(mut self, orderby: Option<String>) -> Self {
        self.orderby = non_blank(orderby);
        self
    }

    pub fn top(mut self, top: Option<u64>) -> Self {
        self.top = top;
        self
    }

    pub fn skip(mut self, skip: Option<u64>) -> Self {
        self.skip = skip;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.to_pairs().is_empty()
    }

    /// Defined options in emission order: select, filter, orderby, top, skip.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(select) = &self.select {
            pairs.push(("$select", select.clone()));
        }
        if let Some(filter) = &self.filter {
            pairs.push(("$filter", filter.clone()));
        }
        if let Some(orderby) = &self.orderby {
            pairs.push(("$orderby", orderby.clone()));
        }
        if let Some(top) = self.top {
            pairs.push(("$top", top.to_string()));
        }
        if let Some(skip) = self.skip {
            pairs.push(("$skip", skip.to_string()));
        }
        pairs
    }

    /// Render as `?$k=v&...`, or an empty string when nothing is set.
    pub fn to_query_string(&self) -> String {
        let pairs = self.to_pairs();
        if pairs.is_empty() {
            return String::new();
        }
        let joined = pairs
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("?{joined}")
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// How datetime values are written in `ge` comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateLiteralStyle {
    /// `Timestamp ge 2025-01-15T00:00:00.000Z` (OData v4 literal)
    #[default]
    Bare,
    /// `Timestamp ge '2025-01-15T00:00:00.000Z'`
    Quoted,
}

impl DateLiteralStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            DateLiteralStyle::Bare => "bare",
            DateLiteralStyle::Quoted => "quoted",
        }
    }

    pub fn literal(self, ts: DateTime<Utc>) -> String {
        let iso = iso_utc(ts);
        match self {
            DateLiteralStyle::Bare => iso,
            DateLiteralStyle::Quoted => format!("'{iso}'"),
        }
    }
}

impl fmt::Display for DateLiteralStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateLiteralStyle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bare" => Ok(DateLiteralStyle::Bare),
            "quoted" => Ok(DateLiteralStyle::Quoted),
            other => Err(CoreError::UnknownDateStyle(other.to_string())),
        }
    }
}

/// ISO-8601 UTC with millisecond precision and a `Z` suffix.
pub fn iso_utc(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Start of a trailing window of `hours` ending at `now`.
pub fn cutoff(now: DateTime<Utc>, hours: u32) -> DateTime<Utc> {
    now - Duration::hours(i64::from(hours))
}

/// OData string literal: single-quoted, embedded quotes doubled.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn eq(field: &str, value: &str) -> String {
    format!("{field} eq {}", quote(value))
}

#[derive(Debug, Clone)]
enum Clause {
    Generated(String),
    Raw(String),
}

/// Conjunction of generated equality/window clauses and caller-supplied
/// free-form expressions. Free-form expressions are parenthesised when they
/// share the filter with other clauses.
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    clauses: Vec<Clause>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: Option<&str>) -> Self {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.clauses.push(Clause::Generated(eq(field, value)));
        }
        self
    }

    pub fn eq_number(mut self, field: &str, value: Option<i64>) -> Self {
        if let Some(value) = value {
            self.clauses
                .push(Clause::Generated(format!("{field} eq {value}")));
        }
        self
    }

    pub fn since(mut self, field: &str, cutoff: DateTime<Utc>, style: DateLiteralStyle) -> Self {
        self.clauses.push(Clause::Generated(format!(
            "{field} ge {}",
            style.literal(cutoff)
        )));
        self
    }

    pub fn raw(mut self, expression: Option<&str>) -> Self {
        if let Some(expression) = expression.map(str::trim).filter(|v| !v.is_empty()) {
            self.clauses.push(Clause::Raw(expression.to_string()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn build(self) -> Option<String> {
        match self.clauses.len() {
            0 => None,
            1 => self.clauses.into_iter().next().map(|clause| match clause {
                Clause::Generated(text) | Clause::Raw(text) => text,
            }),
            _ => Some(
                self.clauses
                    .into_iter()
                    .map(|clause| match clause {
                        Clause::Generated(text) => text,
                        Clause::Raw(text) => format!("({text})"),
                    })
                    .collect::<Vec<_>>()
                    .join(" and "),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn query_string_emits_only_defined_options_in_stable_order() {
        let query = QueryOptions::new()
            .top(Some(10))
            .filter(Some("Status eq 'Error'".to_string()));
        assert_eq!(
            query.to_query_string(),
            "?$filter=Status%20eq%20%27Error%27&$top=10"
        );
    }

    #[test]
    fn empty_options_render_nothing() {
        assert_eq!(QueryOptions::new().to_query_string(), "");
        let blank = QueryOptions::new()
            .filter(Some("   ".to_string()))
            .select(None);
        assert!(blank.is_empty());
        assert_eq!(blank.to_query_string(), "");
    }

    #[test]
    fn all_options_are_encoded() {
        let query = QueryOptions::new()
            .select(Some("ConnectorId,ConnectorType".to_string()))
            .orderby(Some("ConnectorId desc".to_string()))
            .skip(Some(0))
            .top(Some(5));
        assert_eq!(
            query.to_query_string(),
            "?$select=ConnectorId%2CConnectorType&$orderby=ConnectorId%20desc&$top=5&$skip=0"
        );
    }

    #[test]
    fn quote_doubles_embedded_quotes() {
        assert_eq!(quote("O'Brien"), "'O''Brien'");
        assert_eq!(eq("Name", "a'b"), "Name eq 'a''b'");
    }

    #[test]
    fn single_raw_filter_is_not_parenthesised() {
        let filter = FilterBuilder::new().raw(Some("ConnectorType eq 'AS2'")).build();
        assert_eq!(filter.as_deref(), Some("ConnectorType eq 'AS2'"));
    }

    #[test]
    fn mixed_clauses_are_conjoined_with_raw_parenthesised() {
        let filter = FilterBuilder::new()
            .eq("WorkspaceId", Some("Default"))
            .eq("ConnectorType", None)
            .raw(Some("startswith(ConnectorId,'AS2') or ConnectorId eq 'x'"))
            .build();
        assert_eq!(
            filter.as_deref(),
            Some(
                "WorkspaceId eq 'Default' and (startswith(ConnectorId,'AS2') or ConnectorId eq 'x')"
            )
        );
        assert_eq!(FilterBuilder::new().eq("A", Some("  ")).build(), None);
    }

    #[test]
    fn window_cutoff_is_exactly_n_hours_before_now() {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let start = cutoff(now, 12);
        assert_eq!(now - start, Duration::hours(12));
        assert_eq!(iso_utc(start), "2025-01-15T00:00:00.000Z");
    }

    #[test]
    fn since_clause_follows_literal_style() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();
        let bare = FilterBuilder::new()
            .since("Timestamp", ts, DateLiteralStyle::Bare)
            .build();
        assert_eq!(bare.as_deref(), Some("Timestamp ge 2025-01-15T00:00:00.000Z"));

        let quoted = FilterBuilder::new()
            .since("Timestamp", ts, DateLiteralStyle::Quoted)
            .eq("Status", Some("Error"))
            .build();
        assert_eq!(
            quoted.as_deref(),
            Some("Timestamp ge '2025-01-15T00:00:00.000Z' and Status eq 'Error'")
        );
    }

    #[test]
    fn date_style_parses_case_insensitively() {
        assert_eq!("Quoted".parse::<DateLiteralStyle>(), Ok(DateLiteralStyle::Quoted));
        assert_eq!("bare".parse::<DateLiteralStyle>(), Ok(DateLiteralStyle::Bare));
        assert!("iso".parse::<DateLiteralStyle>().is_err());
    }
}
