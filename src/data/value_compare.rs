use crate::data::document::FieldType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;

/// Cross-kind ordering: Null < Boolean < Number < String < Array < Object
fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values. Values of different kinds never coerce,
/// so the order stays transitive for mixed columns.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.total_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                match compare_values(x, y) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

/// Compare optional values; a missing value sorts with nulls
pub fn compare_optional_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    compare_values(a.unwrap_or(&Value::Null), b.unwrap_or(&Value::Null))
}

/// Compare two cells the way a column of `field_type` should sort.
///
/// Numeric and date columns compare on the parsed key; cells that do not
/// parse sort before every parsed cell and fall back to [`compare_values`].
pub fn compare_typed(
    a: Option<&Value>,
    b: Option<&Value>,
    field_type: Option<FieldType>,
) -> Ordering {
    match field_type {
        Some(t) if t.is_numeric() => compare_keyed(a, b, as_number),
        Some(FieldType::Date) => compare_keyed(a, b, |v| {
            parse_date(v).map(|d| d.and_utc().timestamp_millis() as f64)
        }),
        _ => compare_optional_values(a, b),
    }
}

fn compare_keyed<F>(a: Option<&Value>, b: Option<&Value>, key: F) -> Ordering
where
    F: Fn(&Value) -> Option<f64>,
{
    let ka = a.and_then(&key);
    let kb = b.and_then(&key);
    match (ka, kb) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => compare_optional_values(a, b),
    }
}

/// Numeric view of a cell: JSON numbers and numeric-looking strings
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
        _ => None,
    }
}

/// Date view of a cell: RFC 3339, `YYYY-MM-DD[ HH:MM:SS]` strings or epoch millis
pub fn parse_date(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|d| d.naive_utc()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.naive_utc());
            }
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(dt);
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
        _ => None,
    }
}

/// Equality used by term filters. Numeric columns compare parsed numbers;
/// otherwise a number matches a string with the same text.
pub fn term_matches(cell: Option<&Value>, term: &Value, field_type: Option<FieldType>) -> bool {
    let Some(cell) = cell else {
        return term.is_null();
    };
    if cell == term {
        return true;
    }
    if field_type.map_or(false, |t| t.is_numeric()) {
        if let (Some(a), Some(b)) = (as_number(cell), as_number(term)) {
            return a == b;
        }
    }
    match (cell, term) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            b.to_string() == *s
        }
        _ => false,
    }
}

/// Plain text form of a cell (strings unquoted, null empty)
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A cell counts as missing when absent, null or an empty string
pub fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_comparison() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
        assert_eq!(compare_values(&json!(3), &json!(3.0)), Ordering::Equal);
    }

    #[test]
    fn test_cross_kind_order_is_stable() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(100), &json!("2")), Ordering::Less);
        assert_eq!(compare_values(&json!("abc"), &json!([1])), Ordering::Less);
    }

    #[test]
    fn test_numeric_column_parses_strings() {
        let ten = json!("10");
        let nine = json!("9");
        assert_eq!(
            compare_typed(Some(&ten), Some(&nine), Some(FieldType::Number)),
            Ordering::Greater
        );
        // Plain string order without a type
        assert_eq!(compare_typed(Some(&ten), Some(&nine), None), Ordering::Less);
    }

    #[test]
    fn test_unparsed_cells_sort_first_in_numeric_column() {
        let text = json!("n/a");
        let one = json!(1);
        assert_eq!(
            compare_typed(Some(&text), Some(&one), Some(FieldType::Integer)),
            Ordering::Less
        );
        assert_eq!(compare_typed(None, Some(&one), Some(FieldType::Integer)), Ordering::Less);
    }

    #[test]
    fn test_date_column() {
        let a = json!("2011-01-02");
        let b = json!("2010-12-31T23:00:00Z");
        assert_eq!(compare_typed(Some(&a), Some(&b), Some(FieldType::Date)), Ordering::Greater);
        assert!(parse_date(&json!("2011-01-02 10:30:00")).is_some());
        assert!(parse_date(&json!("yesterday")).is_none());
    }

    #[test]
    fn test_term_matches() {
        assert!(term_matches(Some(&json!("10")), &json!(10), None));
        assert!(term_matches(Some(&json!(10)), &json!("10"), None));
        assert!(term_matches(Some(&json!("10.0")), &json!(10), Some(FieldType::Number)));
        assert!(!term_matches(Some(&json!("10.0")), &json!(10), None));
        assert!(term_matches(Some(&json!(true)), &json!("true"), None));
        assert!(!term_matches(None, &json!("x"), None));
    }

    #[test]
    fn test_missing_values() {
        assert!(is_missing(None));
        assert!(is_missing(Some(&json!(null))));
        assert!(is_missing(Some(&json!(""))));
        assert!(!is_missing(Some(&json!(0))));
        assert!(!is_missing(Some(&json!(false))));
    }
}
