use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

/// Coerces the date encodings found in policy documents.
///
/// Accepts RFC 3339 strings, `YYYY-MM-DD`, epoch milliseconds and the
/// extended-JSON wrapper `{"$date": ...}`.
pub(crate) fn coerce_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => parse_date_text(raw),
        Value::Number(millis) => millis
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::Object(wrapper) => wrapper.get("$date").and_then(coerce_date),
        _ => None,
    }
}

fn parse_date_text(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Numeric coercion for rating limits stored as numbers or numeric strings.
///
/// `null` and blank strings read as zero. Anything else that is not a finite,
/// non-negative number is rejected.
pub(crate) fn coerce_limit(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(raw) if raw.trim().is_empty() => 0.0,
        Value::String(raw) => raw.trim().parse::<f64>().ok()?,
        Value::Null => 0.0,
        _ => return None,
    };

    (number.is_finite() && number >= 0.0).then_some(number)
}

/// Text as stored, or `None` when blank.
pub(crate) fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}

/// Reads a string or list of strings; other shapes read as empty.
pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(single)) => vec![single.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
