//! Lenient field deserializers
//!
//! Exchanges are inconsistent about types: numbers arrive as strings, flags
//! as `"1"`/`"0"`, and missing values as `""`. These accept all of them.

use rust_decimal::Decimal;
use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

fn non_empty_text(value: JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Optional string that can be a number, string, empty string, or null
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    Ok(value.and_then(non_empty_text))
}

/// Optional decimal that can be a number or string
pub fn opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    match value.and_then(non_empty_text) {
        Some(s) => s
            .parse::<Decimal>()
            .or_else(|_| Decimal::from_scientific(&s))
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid decimal: {}", e))),
        None => Ok(None),
    }
}

/// Optional count that can be a number or string
pub fn opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    match value.and_then(non_empty_text) {
        Some(s) => s
            .parse::<u32>()
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid count: {}", e))),
        None => Ok(None),
    }
}

/// Flag that can be a bool, `"1"`/`"0"`, `1`/`0`, or `"true"`/`"false"`
///
/// Missing or null reads as `false`.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    match value {
        None | Some(JsonValue::Null) => Ok(false),
        Some(JsonValue::Bool(b)) => Ok(b),
        Some(JsonValue::Number(n)) => Ok(n.as_i64() == Some(1)),
        Some(JsonValue::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" | "" => Ok(false),
            other => Err(D::Error::custom(format!("invalid flag: {}", other))),
        },
        Some(_) => Err(D::Error::custom("expected bool, number or string for flag")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "opt_string")]
        text: Option<String>,
        #[serde(default, deserialize_with = "opt_decimal")]
        amount: Option<Decimal>,
        #[serde(default, deserialize_with = "opt_u32")]
        count: Option<u32>,
        #[serde(default, deserialize_with = "flag")]
        enabled: bool,
    }

    fn parse(value: serde_json::Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_strings_and_numbers() {
        let row = parse(json!({"text": 42, "amount": "0.0001", "count": "12", "enabled": "1"}));
        assert_eq!(row.text.as_deref(), Some("42"));
        assert_eq!(row.amount, Some("0.0001".parse().unwrap()));
        assert_eq!(row.count, Some(12));
        assert!(row.enabled);
    }

    #[test]
    fn test_empty_and_missing() {
        let row = parse(json!({"text": "", "amount": "", "count": null}));
        assert!(row.text.is_none());
        assert!(row.amount.is_none());
        assert!(row.count.is_none());
        assert!(!row.enabled);
    }

    #[test]
    fn test_flag_variants() {
        assert!(parse(json!({"enabled": true})).enabled);
        assert!(parse(json!({"enabled": 1})).enabled);
        assert!(!parse(json!({"enabled": "0"})).enabled);
        assert!(!parse(json!({"enabled": false})).enabled);
    }

    #[test]
    fn test_invalid_count_rejected() {
        let result: Result<Row, _> = serde_json::from_value(json!({"count": "many"}));
        assert!(result.is_err());
    }
}
