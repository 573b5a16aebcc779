//! `SQL_CALC_FOUND_ROWS` / `FOUND_ROWS()`.
//!
//! MySQL remembers the unlimited row count of the last calculating SELECT.
//! Here the follow-up `FOUND_ROWS()` is answered by re-counting over the FROM
//! and WHERE clauses of the previous statement on the same session.

use crate::scan::{Edit, apply_edits, find_ci, find_keyword, find_top_level, mask_literals};

use super::state::TranslationState;

pub(super) fn row_count(state: &mut TranslationState, query: &str) -> Option<String> {
    let query = strip_calc_marker(query).unwrap_or_else(|| query.to_string());
    let masked = mask_literals(&query);
    let Some(found) = find_ci(&masked, "FOUND_ROWS()", 0) else {
        return Some(query);
    };
    let Some(previous) = state.previous.as_deref() else {
        tracing::debug!("FOUND_ROWS() without a previous statement");
        return Some(query);
    };
    let Some(count) = recount(previous) else {
        return Some(query);
    };
    let mut edits = Vec::new();
    let mut at = Some(found);
    while let Some(pos) = at {
        edits.push(Edit::new(pos..pos + "FOUND_ROWS()".len(), count.as_str()));
        at = find_ci(&masked, "FOUND_ROWS()", pos + 1);
    }
    Some(apply_edits(&query, edits))
}

/// `SELECT SQL_CALC_FOUND_ROWS cols FROM` → `SELECT * FROM`.
fn strip_calc_marker(query: &str) -> Option<String> {
    let masked = mask_literals(query);
    let marker = find_keyword(&masked, "SQL_CALC_FOUND_ROWS", 0)?;
    let from = find_top_level(&masked, &["FROM"], marker)?;
    let mut out = query.to_string();
    out.replace_range(marker..from.start, "* ");
    Some(out)
}

/// `COUNT(1) as Computed FROM ... WHERE ...` of a previous SELECT, without
/// its grouping, ordering and limit.
fn recount(previous: &str) -> Option<String> {
    let masked = mask_literals(previous);
    let from = find_top_level(&masked, &["FROM"], 0)?;
    let end = [
        &["GROUP", "BY"][..],
        &["ORDER", "BY"][..],
        &["LIMIT"][..],
        &["HAVING"][..],
    ]
    .iter()
    .filter_map(|words| find_top_level(&masked, words, from.end).map(|r| r.start))
    .min()
    .unwrap_or(previous.len());
    let body = previous[from.start..end].trim().trim_end_matches(';').trim_end();
    Some(format!("COUNT(1) as Computed {body}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Statement;
    use pretty_assertions::assert_eq;

    fn run(query: &str, previous: Option<&str>) -> String {
        let mut state = TranslationState::new(&Statement::new(query), previous, true);
        row_count(&mut state, query).unwrap()
    }

    #[test]
    fn test_calc_marker_replaced() {
        assert_eq!(
            run("SELECT SQL_CALC_FOUND_ROWS wp_posts.* FROM wp_posts WHERE 1=1", None),
            "SELECT * FROM wp_posts WHERE 1=1"
        );
    }

    #[test]
    fn test_found_rows_uses_previous() {
        let previous = "SELECT TOP 10 * FROM wp_posts WHERE post_type = 'post' GROUP BY wp_posts.ID ORDER BY post_date DESC";
        assert_eq!(
            run("SELECT FOUND_ROWS()", Some(previous)),
            "SELECT COUNT(1) as Computed FROM wp_posts WHERE post_type = 'post'"
        );
    }

    #[test]
    fn test_found_rows_without_previous() {
        assert_eq!(run("SELECT FOUND_ROWS()", None), "SELECT FOUND_ROWS()");
    }
}
