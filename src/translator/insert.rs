//! INSERT shape, null datetimes, ON DUPLICATE KEY and row explosion.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use crate::params::{StatementKind, quote};
use crate::scan::{
    Edit, apply_edits, capture, find_keyword, find_matching_close, find_top_level, mask_literals,
    split_top_level, split_top_level_ranges, trim_range, unquote_ident,
};
use crate::schema::{TypeClass, table_name_after};

use super::state::TranslationState;
use super::{RunPolicy, Translator};

static VALUES_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bVALUES\s*\(\s*([A-Za-z0-9_\[\]]+)\s*\)").expect("values() pattern")
});

/// Where the parts of an `INSERT INTO t (cols) VALUES (...), (...)` are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InsertShape {
    pub table: String,
    /// Empty when the statement has no column list.
    pub columns: Vec<String>,
    /// Value groups, parentheses included.
    pub groups: Vec<Range<usize>>,
    /// Offset just past the last group.
    pub tail: usize,
}

impl InsertShape {
    /// Trimmed entry ranges of one value group, in statement offsets.
    pub fn entries(&self, query: &str, group: usize) -> Vec<Range<usize>> {
        let Some(range) = self.groups.get(group) else {
            return Vec::new();
        };
        let interior = range.start + 1..range.end - 1;
        split_top_level_ranges(&query[interior.clone()], b',')
            .into_iter()
            .map(|r| trim_range(query, r.start + interior.start..r.end + interior.start))
            .collect()
    }
}

fn skip_whitespace(bytes: &[u8], mut cursor: usize) -> usize {
    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
        cursor += 1;
    }
    cursor
}

/// Locate table, column list and value groups. `None` when `query` is not
/// an INSERT or REPLACE. An `INSERT ... SELECT` has no groups.
pub(crate) fn insert_shape(query: &str) -> Option<InsertShape> {
    if StatementKind::classify(query) != StatementKind::Insert {
        return None;
    }
    let masked = mask_literals(query);
    let bytes = masked.as_bytes();
    let first_paren = masked.find('(').unwrap_or(masked.len());
    let keyword_end = match find_keyword(&masked, "INTO", 0) {
        Some(into) if into < first_paren => into + "INTO".len(),
        _ => {
            let verb = skip_whitespace(bytes, 0);
            verb + masked[verb..].find(char::is_whitespace)?
        }
    };
    let (table, mut cursor) = table_name_after(query, keyword_end)?;

    let mut columns = Vec::new();
    cursor = skip_whitespace(bytes, cursor);
    if bytes.get(cursor) == Some(&b'(') {
        let close = find_matching_close(&masked, cursor)?;
        columns = split_top_level(&query[cursor + 1..close], b',')
            .into_iter()
            .map(|c| unquote_ident(c).to_string())
            .collect();
        cursor = skip_whitespace(bytes, close + 1);
    }

    let mut groups = Vec::new();
    let values = ["VALUES", "VALUE"]
        .iter()
        .find_map(|kw| (find_keyword(&masked, kw, cursor) == Some(cursor)).then(|| cursor + kw.len()));
    let mut tail = cursor;
    if let Some(mut at) = values {
        loop {
            at = skip_whitespace(bytes, at);
            if bytes.get(at) != Some(&b'(') {
                break;
            }
            let close = find_matching_close(&masked, at)?;
            groups.push(at..close + 1);
            tail = close + 1;
            at = skip_whitespace(bytes, close + 1);
            if bytes.get(at) != Some(&b',') {
                break;
            }
            at += 1;
        }
    }

    Some(InsertShape {
        table,
        columns,
        groups,
        tail,
    })
}

fn is_null_datetime(value: &str) -> bool {
    value == "''" || value.starts_with("'0000-00-00") || value.starts_with("0000-00-00")
}

/// Zero datetimes and empty strings bound to date columns become the
/// current time.
pub(super) fn null_datetime(
    translator: &Translator,
    state: &mut TranslationState,
    query: &str,
) -> Option<String> {
    if state.kind != StatementKind::Insert {
        return None;
    }
    let shape = insert_shape(query)?;
    let schema = translator.schema();
    let known_table = schema.table(&shape.table);
    let date_columns: Vec<(usize, bool)> = shape
        .columns
        .iter()
        .enumerate()
        .filter(|(_, column)| match &known_table {
            Some(table) => table.column(column).is_some_and(|m| m.class == TypeClass::Date),
            None => schema
                .by_type(TypeClass::Date)
                .iter()
                .any(|r| r.column.eq_ignore_ascii_case(column)),
        })
        .map(|(i, column)| (i, column.to_ascii_lowercase().contains("gmt")))
        .collect();
    if date_columns.is_empty() {
        return None;
    }

    let mut edits = Vec::new();
    for group in 0..shape.groups.len() {
        let entries = shape.entries(query, group);
        for &(index, utc) in &date_columns {
            let Some(range) = entries.get(index) else {
                continue;
            };
            if is_null_datetime(&query[range.clone()]) {
                edits.push(Edit::new(range.clone(), quote(&translator.clock().now(utc))));
            }
        }
    }
    Some(apply_edits(query, edits))
}

/// `INSERT ... ON DUPLICATE KEY UPDATE a = VALUES(a)` loses the clause and
/// gains one following UPDATE per value group.
pub(super) fn on_duplicate_key(
    translator: &Translator,
    state: &mut TranslationState,
    query: &str,
) -> Option<String> {
    if state.kind != StatementKind::Insert {
        return None;
    }
    let masked = mask_literals(query);
    let clause = find_top_level(&masked, &["ON", "DUPLICATE", "KEY", "UPDATE"], 0)?;
    let head = query[..clause.start].trim_end();
    let shape = insert_shape(head)?;
    if shape.groups.is_empty() {
        return None;
    }

    let table = translator.schema().table(&shape.table);
    let columns: Vec<String> = if shape.columns.is_empty() {
        table.as_ref()?.column_names().into_iter().map(str::to_string).collect()
    } else {
        shape.columns.clone()
    };
    let key = table
        .as_ref()
        .and_then(|t| columns.iter().position(|c| t.is_key_column(c)))
        .unwrap_or(0);

    let clause_text = query[clause.end..].trim().trim_end_matches(';');
    let mut assignments = Vec::new();
    for assignment in split_top_level(clause_text, b',') {
        let eq = mask_literals(assignment).find('=')?;
        assignments.push((
            unquote_ident(&assignment[..eq]).to_string(),
            assignment[eq + 1..].trim().to_string(),
        ));
    }

    let mut updates = Vec::new();
    for group in 0..shape.groups.len() {
        let values: Vec<&str> = shape
            .entries(head, group)
            .into_iter()
            .map(|r| &head[r])
            .collect();
        if values.len() != columns.len() {
            return None;
        }
        let mut sets = Vec::new();
        for (column, expr) in &assignments {
            sets.push(format!("{column} = {}", resolve_values(expr, &columns, &values)?));
        }
        updates.push(format!(
            "UPDATE {} SET {} WHERE {} = {}",
            shape.table,
            sets.join(", "),
            columns[key],
            values[key]
        ));
    }
    for update in updates {
        state.follow(update, RunPolicy::Always);
    }
    Some(head.to_string())
}

/// Replace `VALUES(col)` with the literal inserted into `col`.
fn resolve_values(expr: &str, columns: &[String], values: &[&str]) -> Option<String> {
    let masked = mask_literals(expr);
    let mut edits = Vec::new();
    for caps in VALUES_REF.captures_iter(&masked) {
        let column = unquote_ident(capture(expr, &caps, 1));
        let index = columns.iter().position(|c| c.eq_ignore_ascii_case(column))?;
        edits.push(Edit::new(caps.get(0)?.range(), values[index]));
    }
    Some(apply_edits(expr, edits))
}

/// One single-row INSERT per value group.
pub(super) fn split_insert(query: &str) -> Vec<String> {
    let Some(shape) = insert_shape(query) else {
        return vec![query.to_string()];
    };
    if shape.groups.len() < 2 {
        return vec![query.to_string()];
    }
    let prefix = &query[..shape.groups[0].start];
    let tail = &query[shape.tail..];
    shape
        .groups
        .iter()
        .map(|group| format!("{prefix}{}{tail}", &query[group.clone()]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::params::Statement;
    use crate::schema::SchemaMap;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn translator() -> Translator {
        let schema = Arc::new(SchemaMap::new());
        schema.update_for(
            "CREATE TABLE wp_posts (ID bigint NOT NULL auto_increment, post_date datetime, \
             post_date_gmt datetime, post_title text, PRIMARY KEY (ID))",
        );
        schema.update_for(
            "CREATE TABLE wp_options (option_id bigint auto_increment, option_name varchar(64), \
             option_value longtext, autoload varchar(20), PRIMARY KEY (option_id), UNIQUE KEY option_name (option_name))",
        );
        Translator::new(schema).with_clock(
            FixedClock::new(Utc.with_ymd_and_hms(2010, 1, 2, 15, 4, 5).unwrap()).with_offset(1),
        )
    }

    fn state(query: &str) -> TranslationState {
        TranslationState::new(&Statement::new(query), None, true)
    }

    #[test]
    fn test_insert_shape() {
        let q = "INSERT INTO t (a, `b`) VALUES (1, 'x,)'), (2, f(3)) ;";
        let shape = insert_shape(q).unwrap();
        assert_eq!(shape.table, "t");
        assert_eq!(shape.columns, vec!["a", "b"]);
        assert_eq!(shape.groups.len(), 2);
        assert_eq!(&q[shape.groups[1].clone()], "(2, f(3))");
        assert_eq!(&q[shape.tail..], " ;");
        let entries: Vec<&str> = shape.entries(q, 0).into_iter().map(|r| &q[r]).collect();
        assert_eq!(entries, vec!["1", "'x,)'"]);
    }

    #[test]
    fn test_insert_shape_without_values() {
        let shape = insert_shape("INSERT INTO t SELECT * FROM u").unwrap();
        assert!(shape.columns.is_empty());
        assert!(shape.groups.is_empty());
        assert!(insert_shape("SELECT 1").is_none());
    }

    #[test]
    fn test_split_insert() {
        assert_eq!(
            split_insert("INSERT INTO t (a) VALUES (1),(2), (3)"),
            vec![
                "INSERT INTO t (a) VALUES (1)",
                "INSERT INTO t (a) VALUES (2)",
                "INSERT INTO t (a) VALUES (3)"
            ]
        );
        assert_eq!(split_insert("INSERT INTO t (a) VALUES ('(1),(2)')"), vec!["INSERT INTO t (a) VALUES ('(1),(2)')"]);
    }

    #[test]
    fn test_null_datetime() {
        let q = "INSERT INTO wp_posts (post_date, post_date_gmt, post_title) VALUES ('0000-00-00 00:00:00', '', '')";
        let out = null_datetime(&translator(), &mut state(q), q).unwrap();
        assert_eq!(
            out,
            "INSERT INTO wp_posts (post_date, post_date_gmt, post_title) VALUES ('2010-01-02 16:04:05', '2010-01-02 15:04:05', '')"
        );
    }

    #[test]
    fn test_null_datetime_keeps_real_dates() {
        let q = "INSERT INTO wp_posts (post_date) VALUES ('2009-05-05 10:00:00')";
        assert_eq!(null_datetime(&translator(), &mut state(q), q).unwrap(), q);
    }

    #[test]
    fn test_on_duplicate_key() {
        let q = "INSERT INTO wp_options (option_name, option_value, autoload) VALUES ('siteurl', 'http://x', 'yes') \
                 ON DUPLICATE KEY UPDATE option_value = VALUES(option_value), autoload = VALUES(autoload)";
        let mut st = state(q);
        let out = on_duplicate_key(&translator(), &mut st, q).unwrap();
        assert_eq!(
            out,
            "INSERT INTO wp_options (option_name, option_value, autoload) VALUES ('siteurl', 'http://x', 'yes')"
        );
        assert_eq!(st.following.len(), 1);
        assert_eq!(
            st.following[0].sql,
            "UPDATE wp_options SET option_value = 'http://x', autoload = 'yes' WHERE option_name = 'siteurl'"
        );
        assert_eq!(st.following[0].policy, RunPolicy::Always);
    }

    #[test]
    fn test_on_duplicate_key_unresolvable() {
        let q = "INSERT INTO t (a) VALUES (1) ON DUPLICATE KEY UPDATE b = VALUES(zzz)";
        let mut st = state(q);
        assert!(on_duplicate_key(&translator(), &mut st, q).is_none());
        assert!(st.following.is_empty());
    }
}
