//! Field coercions shared by the listing and repository normalizers.
//!
//! Every function returns `None` for values it cannot coerce; the caller
//! stores that as an absent field. Nothing here fails the run.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

/// Parses an ISO-8601 timestamp with a `Z` or `±hh:mm` offset into POSIX
/// seconds. Fractional seconds are discarded.
pub fn parse_iso8601(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(value) {
        Ok(parsed) => Some(parsed.timestamp()),
        Err(err) => {
            log::debug!("cannot parse timestamp '{value}': {err}");
            None
        }
    }
}

/// Parses a Play Store upload date such as `Mar 27, 2015` as UTC midnight.
pub fn parse_upload_date(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(value, "%b %d, %Y") {
        Ok(date) => date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp()),
        Err(err) => {
            log::debug!("cannot parse upload date '{value}': {err}");
            None
        }
    }
}

/// A whole float strictly inside the `i64` range; `as` would saturate.
fn whole_float(value: f64) -> Option<i64> {
    let in_range = value > i64::MIN as f64 && value < i64::MAX as f64;
    (value.is_finite() && value.fract() == 0.0 && in_range).then(|| value as i64)
}

/// Parses an integer, accepting a float rendering without a fraction (`12.0`).
/// Values outside the `i64` range are absent.
pub fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = value.parse::<i64>() {
        return Some(parsed);
    }
    let parsed = value.parse::<f64>().ok().and_then(whole_float);
    if parsed.is_none() {
        log::debug!("cannot parse '{value}' as an integer");
    }
    parsed
}

/// Like [`parse_int`], for an optional CSV cell.
pub fn int_cell(value: Option<&str>) -> Option<i64> {
    value.and_then(parse_int)
}

/// Trims a CSV cell; empty cells are absent.
pub fn text_cell(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Splits a comma-separated cell into its trimmed, non-empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Walks a JSON document by object keys and array indices.
pub fn json_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}

pub fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Null => None,
        Value::Number(number) => number.as_i64().or_else(|| {
            let parsed = number.as_f64().and_then(whole_float);
            if parsed.is_none() {
                log::debug!("cannot coerce {number} to an integer");
            }
            parsed
        }),
        Value::String(text) => parse_int(text),
        other => {
            log::debug!("cannot coerce {other} to an integer");
            None
        }
    }
}

pub fn float_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Null => return None,
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() => Some(f),
        _ => {
            log::debug!("cannot coerce {value} to a float");
            None
        }
    }
}

/// A star rating in `0..=5`; anything else is absent.
pub fn star_rating(value: &Value) -> Option<f64> {
    float_value(value).filter(|rating| {
        let valid = (0.0..=5.0).contains(rating);
        if !valid {
            log::debug!("star rating {rating} is out of range");
        }
        valid
    })
}

/// Strings are kept verbatim; numbers and booleans use their JSON rendering.
pub fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        Value::Null => None,
        other => {
            log::debug!("cannot coerce {other} to text");
            None
        }
    }
}

/// A list of trimmed strings. A bare string becomes a one-element list;
/// blank and non-scalar items are skipped. An empty JSON array stays an
/// empty, present list.
pub fn string_list(value: &Value) -> Option<Vec<String>> {
    let trimmed = |text: String| {
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    };
    match value {
        Value::Array(items) => Some(items.iter().filter_map(text_value).filter_map(trimmed).collect()),
        Value::String(text) => Some(trimmed(text.clone()).into_iter().collect()),
        Value::Null => None,
        other => {
            log::debug!("cannot coerce {other} to a list");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn iso8601_handles_offsets_and_fractions() {
        assert_eq!(parse_iso8601("2015-03-27T19:25:23.000-08:00"), Some(1427513123));
        assert_eq!(parse_iso8601("2014-02-27T15:05:06+01:00"), Some(1393509906));
        assert_eq!(parse_iso8601("2008-09-03T20:56:35.450686Z"), Some(1220475395));
        assert_eq!(parse_iso8601("2008-09-03"), None);
        assert_eq!(parse_iso8601(""), None);
    }

    #[test]
    fn upload_date_is_utc_midnight() {
        assert_eq!(parse_upload_date("Mar 27, 2015"), Some(1427414400));
        assert_eq!(parse_upload_date("Mar 7, 2015"), Some(1425686400));
        assert_eq!(parse_upload_date("27.03.2015"), None);
    }

    #[test]
    fn integers_from_numbers_and_strings() {
        assert_eq!(int_value(&json!(42)), Some(42));
        assert_eq!(int_value(&json!("42")), Some(42));
        assert_eq!(int_value(&json!(26.0)), Some(26));
        assert_eq!(int_value(&json!("forty")), None);
        assert_eq!(int_value(&json!(null)), None);
        assert_eq!(int_cell(Some("-1")), Some(-1));
        assert_eq!(int_cell(Some(" ")), None);
    }

    #[test]
    fn out_of_range_integers_are_absent() {
        assert_eq!(int_cell(Some("9223372036854775807")), Some(i64::MAX));
        assert_eq!(int_cell(Some("-9223372036854775808")), Some(i64::MIN));
        assert_eq!(int_cell(Some("9223372036854775808")), None);
        assert_eq!(int_cell(Some("99999999999999999999")), None);
        assert_eq!(int_cell(Some("1e30")), None);
        assert_eq!(int_cell(Some("-1e30")), None);
        assert_eq!(int_cell(Some("1e3")), Some(1000));
        assert_eq!(int_value(&json!(1e30)), None);
        assert_eq!(int_value(&json!(18446744073709551615u64)), None);
        assert_eq!(int_value(&json!("99999999999999999999")), None);
    }

    #[test]
    fn star_rating_keeps_zero_and_rejects_out_of_range() {
        assert_eq!(star_rating(&json!(0.0)), Some(0.0));
        assert_eq!(star_rating(&json!(4.25)), Some(4.25));
        assert_eq!(star_rating(&json!(7)), None);
        assert_eq!(star_rating(&json!(-0.5)), None);
        assert_eq!(star_rating(&json!("NaN")), None);
    }

    #[test]
    fn json_path_walks_objects_and_arrays() {
        let doc = json!({"offer": [{"currencyCode": "EUR"}], "details": {"appDetails": {}}});
        assert_eq!(
            json_path(&doc, &["offer", "0", "currencyCode"]),
            Some(&json!("EUR"))
        );
        assert_eq!(json_path(&doc, &["offer", "1", "currencyCode"]), None);
        assert_eq!(json_path(&doc, &["details", "appDetails", "versionCode"]), None);
    }

    #[test]
    fn lists_distinguish_empty_from_missing() {
        assert_eq!(string_list(&json!([])), Some(vec![]));
        assert_eq!(string_list(&json!(null)), None);
        assert_eq!(
            string_list(&json!(["INTERNET", 3])),
            Some(vec!["INTERNET".to_string(), "3".to_string()])
        );
        assert_eq!(
            string_list(&json!([" Tools ", "", "  "])),
            Some(vec!["Tools".to_string()])
        );
        assert_eq!(string_list(&json!(" Tools ")), Some(vec!["Tools".to_string()]));
        assert_eq!(split_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
