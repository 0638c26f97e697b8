use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Characters Arc accepts inside a single cron field.
static CRON_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Za-z*/,\-?#]+$").expect("valid cron field regex")
});

const CRON_FIELD_NAMES: [&str; 5] = ["minute", "hour", "day-of-month", "month", "day-of-week"];

/// Syntactic check only: five whitespace-separated fields. Value ranges are
/// left to Arc.
pub fn validate_cron(expression: &str) -> Result<(), CoreError> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != CRON_FIELD_NAMES.len() {
        return Err(CoreError::InvalidCron {
            expression: expression.to_string(),
            reason: format!(
                "expected 5 fields ({}), found {}",
                CRON_FIELD_NAMES.join(" "),
                fields.len()
            ),
        });
    }
    for (field, name) in fields.iter().zip(CRON_FIELD_NAMES) {
        if !CRON_FIELD.is_match(field) {
            return Err(CoreError::InvalidCron {
                expression: expression.to_string(),
                reason: format!("{name} field '{field}' contains unsupported characters"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_cron;

    #[test]
    fn accepts_five_field_expressions() {
        assert!(validate_cron("0 2 * * *").is_ok());
        assert!(validate_cron("*/15 8-18 * * MON-FRI").is_ok());
        assert!(validate_cron("  0   2 * *  *  ").is_ok());
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = validate_cron("daily").unwrap_err();
        assert!(err.to_string().contains("found 1"));
        assert!(validate_cron("0 0 2 * * *").is_err());
        assert!(validate_cron("").is_err());
    }

    #[test]
    fn rejects_garbage_characters() {
        let err = validate_cron("0 2 * * $").unwrap_err();
        assert!(err.to_string().contains("day-of-week"));
    }
}
