//! Result-row fix-ups applied before rows reach the caller.
//!
//! SQL Server hands back values in shapes the calling application does not
//! expect from MySQL: a single space for empty `char` data, native integers,
//! and datetimes with milliseconds.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use crate::clock::DATETIME_FORMAT;
use crate::translator::SliceWindow;

/// One fetched row, column order preserved.
pub type Row = Map<String, Value>;

/// Normalize a single value.
///
/// ```
/// use serde_json::json;
/// use sqlshift::normalize::normalize_value;
///
/// assert_eq!(normalize_value(json!(" ")), json!(""));
/// assert_eq!(normalize_value(json!(42)), json!("42"));
/// assert_eq!(normalize_value(json!("2010-01-02 03:04:05.123")), json!("2010-01-02 03:04:05"));
/// ```
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::String(s) if s == " " => Value::String(String::new()),
        Value::String(s) => match truncate_fraction(&s) {
            Some(datetime) => Value::String(datetime),
            None => Value::String(s),
        },
        Value::Number(n) if n.is_i64() || n.is_u64() => Value::String(n.to_string()),
        other => other,
    }
}

/// `YYYY-MM-DD HH:MM:SS.fff` → `YYYY-MM-DD HH:MM:SS`. Anything else → `None`.
fn truncate_fraction(s: &str) -> Option<String> {
    if !s.contains('.') || s.len() < 20 {
        return None;
    }
    let parsed = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Some(parsed.format(DATETIME_FORMAT).to_string())
}

pub fn normalize_row(row: Row) -> Row {
    row.into_iter().map(|(k, v)| (k, normalize_value(v))).collect()
}

pub fn normalize_rows(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter().map(normalize_row).collect()
}

/// Keep `count` rows starting at `from`. A window past the end yields no rows.
pub fn apply_slice(rows: Vec<Row>, window: Option<SliceWindow>) -> Vec<Row> {
    match window {
        Some(SliceWindow { from, count }) => rows.into_iter().skip(from).take(count).collect(),
        None => rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_normalize_row_keeps_order() {
        let input = row(json!({"ID": 7, "post_title": " ", "post_date": "2009-12-01 08:30:00.000", "ratio": 0.5}));
        let out = normalize_row(input);
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["ID", "post_title", "post_date", "ratio"]);
        assert_eq!(
            Value::Object(out),
            json!({"ID": "7", "post_title": "", "post_date": "2009-12-01 08:30:00", "ratio": 0.5})
        );
    }

    #[test]
    fn test_plain_strings_untouched() {
        assert_eq!(normalize_value(json!("v1.2.3 release notes")), json!("v1.2.3 release notes"));
        assert_eq!(normalize_value(json!("2009-12-01 08:30:00")), json!("2009-12-01 08:30:00"));
        assert_eq!(normalize_value(Value::Null), Value::Null);
    }

    #[test]
    fn test_apply_slice() {
        let rows: Vec<Row> = (0..10).map(|i| row(json!({ "n": i }))).collect();
        let sliced = apply_slice(rows.clone(), Some(SliceWindow { from: 5, count: 3 }));
        assert_eq!(sliced, rows[5..8].to_vec());
        assert!(apply_slice(rows.clone(), Some(SliceWindow { from: 20, count: 3 })).is_empty());
        assert_eq!(apply_slice(rows.clone(), None).len(), 10);
    }
}
