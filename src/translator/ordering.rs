//! ORDER BY adjustments.

use std::ops::Range;

use crate::scan::{
    Edit, apply_edits, extract_aliases, find_top_level, mask_literals, rfind_top_level,
    split_top_level_ranges, trim_range, unquote_ident,
};
use crate::schema::TypeClass;

use super::Translator;

/// One ORDER BY term: the expression and its direction, if written.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SortTerm {
    expr: Range<usize>,
    direction: Option<&'static str>,
}

/// Range of the last top-level ORDER BY list, without a trailing `;`.
fn order_by_list(masked: &str) -> Option<Range<usize>> {
    let order_by = rfind_top_level(masked, &["ORDER", "BY"])?;
    let end = masked.trim_end().trim_end_matches(';').trim_end().len();
    (end > order_by.end).then(|| trim_range(masked, order_by.end..end))
}

fn sort_terms(query: &str, list: Range<usize>) -> Vec<SortTerm> {
    split_top_level_ranges(&query[list.clone()], b',')
        .into_iter()
        .map(|r| trim_range(query, r.start + list.start..r.end + list.start))
        .filter(|r| !r.is_empty())
        .map(|term| {
            let text = &query[term.clone()];
            for direction in ["ASC", "DESC"] {
                let split = text.len().saturating_sub(direction.len() + 1);
                if text.len() <= direction.len() || !text.is_char_boundary(split) {
                    continue;
                }
                let tail = &text[split..];
                if tail.as_bytes()[0].is_ascii_whitespace()
                    && tail[1..].eq_ignore_ascii_case(direction)
                {
                    let expr = trim_range(query, term.start..term.start + split);
                    return SortTerm {
                        expr,
                        direction: Some(direction),
                    };
                }
            }
            SortTerm {
                expr: term,
                direction: None,
            }
        })
        .collect()
}

/// Under SELECT DISTINCT every ORDER BY term must appear in the select list.
/// Terms that do not name a select alias are replaced by the alias list.
pub(super) fn distinct_order_by(query: &str) -> Option<String> {
    let masked = mask_literals(query);
    find_top_level(&masked, &["DISTINCT"], 0)?;
    let list = order_by_list(&masked)?;
    let aliases = extract_aliases(query);
    if aliases.is_empty() {
        return None;
    }
    let terms = sort_terms(query, list.clone());
    let aliased = terms.iter().all(|t| {
        let expr = unquote_ident(&query[t.expr.clone()]);
        aliases.iter().any(|a| unquote_ident(a).eq_ignore_ascii_case(expr))
    });
    if aliased {
        return None;
    }
    let mut replacement = aliases.join(", ");
    if let Some(direction) = terms.last().and_then(|t| t.direction) {
        replacement.push(' ');
        replacement.push_str(direction);
    }
    let mut out = query.to_string();
    out.replace_range(list, &replacement);
    Some(out)
}

fn is_column_ref(expr: &str) -> bool {
    let mut parts = expr.split('.');
    let valid = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(column), None, None) => valid(column),
        (Some(table), Some(column), None) => valid(table) && valid(column),
        _ => false,
    }
}

/// Text columns cannot be sorted; cast them to varchar.
pub(super) fn sort_cast(translator: &Translator, query: &str) -> Option<String> {
    let masked = mask_literals(query);
    let list = order_by_list(&masked)?;
    let text_columns = translator.schema().by_type(TypeClass::Text);
    if text_columns.is_empty() {
        return None;
    }
    let length = translator.config().sort_cast_length;
    let edits: Vec<Edit> = sort_terms(query, list)
        .into_iter()
        .filter_map(|term| {
            let expr = &query[term.expr.clone()];
            if !is_column_ref(expr) {
                return None;
            }
            let is_text = match expr.split_once('.') {
                Some((table, column)) => text_columns
                    .iter()
                    .any(|r| r.table.eq_ignore_ascii_case(table) && r.column.eq_ignore_ascii_case(column)),
                None => text_columns.iter().any(|r| r.column.eq_ignore_ascii_case(expr)),
            };
            is_text.then(|| Edit::new(term.expr, format!("cast({expr} as varchar({length}))")))
        })
        .collect();
    Some(apply_edits(query, edits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaMap;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_distinct_order_by_uses_aliases() {
        let q = "SELECT DISTINCT YEAR(post_date) AS year, MONTH(post_date) AS month FROM wp_posts ORDER BY post_date DESC";
        assert_eq!(
            distinct_order_by(q).unwrap(),
            "SELECT DISTINCT YEAR(post_date) AS year, MONTH(post_date) AS month FROM wp_posts ORDER BY year, month DESC"
        );
    }

    #[test]
    fn test_distinct_order_by_already_aliased() {
        let q = "SELECT DISTINCT a AS x FROM t ORDER BY x ASC";
        assert_eq!(distinct_order_by(q), None);
        assert_eq!(distinct_order_by("SELECT a FROM t ORDER BY b"), None);
    }

    #[test]
    fn test_sort_cast() {
        let schema = Arc::new(SchemaMap::new());
        schema.update_for("CREATE TABLE wp_posts (post_title text, menu_order int)");
        let translator = Translator::new(schema);
        assert_eq!(
            sort_cast(&translator, "SELECT * FROM wp_posts ORDER BY wp_posts.post_title ASC, menu_order").unwrap(),
            "SELECT * FROM wp_posts ORDER BY cast(wp_posts.post_title as varchar(255)) ASC, menu_order"
        );
        let once = sort_cast(&translator, "SELECT * FROM wp_posts ORDER BY post_title;").unwrap();
        assert_eq!(once, "SELECT * FROM wp_posts ORDER BY cast(post_title as varchar(255));");
        assert_eq!(sort_cast(&translator, &once).unwrap(), once);
    }

    #[test]
    fn test_sort_terms_directions() {
        let q = "ORDER BY a desc, b,c ASC";
        let terms = sort_terms(q, 9..q.len());
        let view: Vec<(&str, Option<&str>)> =
            terms.iter().map(|t| (&q[t.expr.clone()], t.direction)).collect();
        assert_eq!(view, vec![("a", Some("DESC")), ("b", None), ("c", Some("ASC"))]);
    }
}
