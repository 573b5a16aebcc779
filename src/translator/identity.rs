//! Explicit writes to identity columns.
//!
//! SQL Server refuses both an INSERT that supplies an identity value and any
//! UPDATE of an identity column unless `IDENTITY_INSERT` is switched on for
//! the table. The session-scoped toggle is always switched back off.

use regex::Regex;
use std::sync::LazyLock;

use crate::params::StatementKind;
use crate::scan::{capture, unquote_ident};

use super::insert::insert_shape;
use super::state::TranslationState;
use super::{RunPolicy, Translator};

static IDENTITY_UPDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^UPDATE\s+([A-Za-z0-9_\[\]]+)\s+SET\s+([A-Za-z0-9_\[\]]+)\s*=\s*(\d+)\s+WHERE\s+([A-Za-z0-9_\[\]]+)\s*=\s*(\d+)\s*;?$",
    )
    .expect("identity update pattern")
});

fn identity_toggle(table: &str, on: bool) -> String {
    format!("SET IDENTITY_INSERT {table} {}", if on { "ON" } else { "OFF" })
}

pub(super) fn identity_insert(
    translator: &Translator,
    state: &mut TranslationState,
    query: &str,
) -> Option<String> {
    if state.kind != StatementKind::Insert {
        return None;
    }
    let shape = insert_shape(query)?;
    let identity = translator.schema().identity_column(&shape.table)?;
    if shape.columns.iter().any(|c| c.eq_ignore_ascii_case(&identity)) {
        tracing::debug!(table = %shape.table, column = %identity, "insert supplies identity value");
        state.precede(identity_toggle(&shape.table, true));
        state.follow(identity_toggle(&shape.table, false), RunPolicy::Always);
    }
    None
}

/// `UPDATE t SET id = 5 WHERE id = 3` becomes a copy of row 3 under id 5
/// followed by a delete of row 3.
pub(super) fn identity_update(
    translator: &Translator,
    state: &mut TranslationState,
    query: &str,
) -> Option<String> {
    if state.kind != StatementKind::Update {
        return None;
    }
    let caps = IDENTITY_UPDATE.captures(query)?;
    let table = unquote_ident(capture(query, &caps, 1));
    let set_column = unquote_ident(capture(query, &caps, 2));
    let where_column = unquote_ident(capture(query, &caps, 4));
    let identity = translator.schema().identity_column(table)?;
    if !set_column.eq_ignore_ascii_case(&identity) || !where_column.eq_ignore_ascii_case(&identity) {
        return None;
    }
    let to = capture(query, &caps, 3);
    let from = capture(query, &caps, 5);

    let columns: Vec<String> = translator
        .schema()
        .table(table)?
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    if !columns.iter().any(|c| c.eq_ignore_ascii_case(&identity)) {
        return None;
    }
    let selected: Vec<&str> = columns
        .iter()
        .map(|c| if c.eq_ignore_ascii_case(&identity) { to } else { c.as_str() })
        .collect();

    state.verify = false;
    state.precede(identity_toggle(table, true));
    state.follow(format!("DELETE {table} WHERE {identity} = {from}"), RunPolicy::OnSuccess);
    state.follow(identity_toggle(table, false), RunPolicy::Always);
    Some(format!(
        "INSERT INTO {table} ({}) SELECT {} FROM {table} WHERE {identity} = {from}",
        columns.join(","),
        selected.join(",")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Statement;
    use crate::schema::SchemaMap;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn translator() -> Translator {
        let schema = Arc::new(SchemaMap::new());
        schema.update_for(
            "CREATE TABLE wp_terms (term_id bigint(20) NOT NULL auto_increment, name varchar(200), \
             slug varchar(200), term_group bigint(10), PRIMARY KEY (term_id))",
        );
        Translator::new(schema)
    }

    fn state(query: &str) -> TranslationState {
        TranslationState::new(&Statement::new(query), None, true)
    }

    #[test]
    fn test_identity_insert_toggles() {
        let q = "INSERT INTO wp_terms (term_id, name, slug) VALUES (4, 'a', 'a')";
        let mut st = state(q);
        assert!(identity_insert(&translator(), &mut st, q).is_none());
        assert_eq!(st.preceding, vec!["SET IDENTITY_INSERT wp_terms ON"]);
        assert_eq!(st.following[0].sql, "SET IDENTITY_INSERT wp_terms OFF");
        assert_eq!(st.following[0].policy, RunPolicy::Always);
    }

    #[test]
    fn test_identity_insert_without_identity_value() {
        let q = "INSERT INTO wp_terms (name, slug) VALUES ('a', 'a')";
        let mut st = state(q);
        identity_insert(&translator(), &mut st, q);
        assert!(st.preceding.is_empty());
        assert!(st.following.is_empty());
    }

    #[test]
    fn test_identity_update() {
        let q = "UPDATE wp_terms SET term_id = 5 WHERE term_id = 3330";
        let mut st = state(q);
        let out = identity_update(&translator(), &mut st, q).unwrap();
        assert_eq!(
            out,
            "INSERT INTO wp_terms (term_id,name,slug,term_group) SELECT 5,name,slug,term_group FROM wp_terms WHERE term_id = 3330"
        );
        assert!(!st.verify);
        assert_eq!(st.preceding, vec!["SET IDENTITY_INSERT wp_terms ON"]);
        let following: Vec<(&str, RunPolicy)> =
            st.following.iter().map(|f| (f.sql.as_str(), f.policy)).collect();
        assert_eq!(
            following,
            vec![
                ("DELETE wp_terms WHERE term_id = 3330", RunPolicy::OnSuccess),
                ("SET IDENTITY_INSERT wp_terms OFF", RunPolicy::Always),
            ]
        );
    }

    #[test]
    fn test_plain_update_untouched() {
        let q = "UPDATE wp_terms SET name = 'x' WHERE term_id = 3";
        let mut st = state(q);
        assert!(identity_update(&translator(), &mut st, q).is_none());
        assert!(st.verify);
    }
}
