//! LIMIT → TOP.
//!
//! T-SQL has no row offset short of `OFFSET ... FETCH`, which needs an
//! ORDER BY the application rarely supplies. A limit with an offset is
//! removed and replaced by a slice of the fetched rows.

use regex::Regex;
use std::sync::LazyLock;

use crate::params::StatementKind;
use crate::scan::{depth_at, find_keyword, mask_literals};

use super::state::TranslationState;
use super::SliceWindow;

static LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bLIMIT\s+(\d+)(?:\s*,\s*(\d+)|\s+OFFSET\s+(\d+))?\s*;?\s*$").expect("limit pattern")
});

pub(super) fn translate_limit(state: &mut TranslationState, query: &str) -> Option<String> {
    if !matches!(
        state.kind,
        StatementKind::Select | StatementKind::Delete | StatementKind::Update
    ) {
        return None;
    }
    let masked = mask_literals(query);
    let caps = LIMIT.captures(&masked)?;
    let whole = caps.get(0)?;
    if depth_at(&masked, whole.start()) != 0 {
        return None;
    }
    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<usize>().ok());
    let (offset, count) = match (number(1)?, number(2), number(3)) {
        (offset, Some(count), _) => (offset, count),
        (count, None, Some(offset)) => (offset, count),
        (count, None, None) => (0, count),
    };
    let stripped = query[..whole.start()].trim_end();

    if offset == 0 {
        return Some(insert_top(stripped, state.kind, count));
    }
    if state.kind != StatementKind::Select {
        tracing::debug!(kind = %state.kind, "LIMIT with offset left in place");
        return None;
    }
    state.slice = Some(SliceWindow { from: offset, count });
    Some(stripped.to_string())
}

/// `SELECT [DISTINCT] TOP n`, `DELETE TOP (n)`, `UPDATE TOP (n)`.
fn insert_top(query: &str, kind: StatementKind, count: usize) -> String {
    let (verb, top) = match kind {
        StatementKind::Select => ("SELECT", format!(" TOP {count}")),
        StatementKind::Delete => ("DELETE", format!(" TOP ({count})")),
        _ => ("UPDATE", format!(" TOP ({count})")),
    };
    let masked = mask_literals(query);
    let Some(start) = find_keyword(&masked, verb, 0) else {
        return query.to_string();
    };
    let mut at = start + verb.len();
    if kind == StatementKind::Select {
        let rest = &masked[at..];
        let skipped = rest.len() - rest.trim_start().len();
        if find_keyword(&masked, "DISTINCT", at + skipped) == Some(at + skipped) {
            at += skipped + "DISTINCT".len();
        }
    }
    let mut out = query.to_string();
    out.insert_str(at, &top);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Statement;
    use pretty_assertions::assert_eq;

    fn run(query: &str) -> (String, Option<SliceWindow>) {
        let mut state = TranslationState::new(&Statement::new(query), None, true);
        let out = translate_limit(&mut state, query).unwrap_or_else(|| query.to_string());
        (out, state.slice)
    }

    #[test]
    fn test_count_only() {
        assert_eq!(run("SELECT * FROM t LIMIT 10"), ("SELECT TOP 10 * FROM t".to_string(), None));
        assert_eq!(run("SELECT * FROM t LIMIT 0, 10"), ("SELECT TOP 10 * FROM t".to_string(), None));
        assert_eq!(
            run("SELECT DISTINCT a FROM t LIMIT 5;"),
            ("SELECT DISTINCT TOP 5 a FROM t".to_string(), None)
        );
    }

    #[test]
    fn test_offset_becomes_slice() {
        assert_eq!(
            run("SELECT * FROM t LIMIT 5,10"),
            ("SELECT * FROM t".to_string(), Some(SliceWindow { from: 5, count: 10 }))
        );
        assert_eq!(
            run("SELECT * FROM t LIMIT 10 OFFSET 20"),
            ("SELECT * FROM t".to_string(), Some(SliceWindow { from: 20, count: 10 }))
        );
    }

    #[test]
    fn test_delete_and_update() {
        assert_eq!(run("DELETE FROM t WHERE a = 1 LIMIT 1").0, "DELETE TOP (1) FROM t WHERE a = 1");
        assert_eq!(run("UPDATE t SET a = 1 LIMIT 2").0, "UPDATE TOP (2) t SET a = 1");
    }

    #[test]
    fn test_literal_and_subquery_limits_untouched() {
        let q = "SELECT * FROM t WHERE a = 'LIMIT 5'";
        assert_eq!(run(q).0, q);
        let q = "SELECT * FROM t WHERE id IN (SELECT id FROM u LIMIT 5)";
        assert_eq!(run(q).0, q);
    }
}
