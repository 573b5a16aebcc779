//! WHERE-clause and GROUP BY fixes.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::params::StatementKind;
use crate::scan::{
    Edit, apply_edits, capture, depth_at, find_keyword, find_top_level, literal_spans,
    mask_literals, split_top_level_ranges, trim_range, unquote_ident,
};
use crate::schema::TypeClass;

use super::state::TranslationState;
use super::Translator;

static SELECT_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^(.*\S)\s+AS\s+(\S+)$").expect("select alias pattern")
});

static GROUP_BY_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bGROUP\s+BY\s+([A-Za-z0-9_]+)\.([A-Za-z0-9_]+)\s*(ORDER\b|LIMIT\b|;|$)")
        .expect("group by pattern")
});

/// `LIKE '\_%'` → `LIKE '[_]%'`. T-SQL has no backslash escape in patterns.
pub(super) fn escaped_wildcard(query: &str) -> Option<String> {
    let masked = mask_literals(query);
    let edits: Vec<Edit> = literal_spans(query)
        .into_iter()
        .filter(|span| {
            let before = masked[..span.start].trim_end();
            before.len() >= 4
                && find_keyword(before, "LIKE", before.len() - 4) == Some(before.len() - 4)
        })
        .filter_map(|span| {
            let literal = &query[span.clone()];
            if !literal.contains("\\_") && !literal.contains("\\%") {
                return None;
            }
            Some(Edit::new(
                span.clone(),
                literal.replace("\\_", "[_]").replace("\\%", "[%]"),
            ))
        })
        .collect();
    if edits.is_empty() {
        return None;
    }
    Some(apply_edits(query, edits))
}

/// GROUP BY fixes: a grouped single-column key is dropped, then ORDER BY
/// terms that are only grouped through expressions move to the aliases.
pub(super) fn group_by_elision(translator: &Translator, query: &str) -> Option<String> {
    match primary_key_group_by(translator, query) {
        Some(out) => Some(order_by_group_aliases(&out).unwrap_or(out)),
        None => order_by_group_aliases(query),
    }
}

/// `GROUP BY t.pk` on a single-column key groups nothing and makes every
/// other selected column invalid in T-SQL.
fn primary_key_group_by(translator: &Translator, query: &str) -> Option<String> {
    let masked = mask_literals(query);
    let caps = GROUP_BY_KEY.captures(&masked)?;
    let whole = caps.get(0)?;
    if depth_at(&masked, whole.start()) != 0 {
        return None;
    }
    let table_name = capture(query, &caps, 1);
    let column = capture(query, &caps, 2);
    let table = translator.schema().table(table_name)?;
    let single_pk = matches!(table.primary_key.as_slice(), [pk] if pk.eq_ignore_ascii_case(column));
    let identity = translator
        .schema()
        .identity_column(table_name)
        .is_some_and(|id| id.eq_ignore_ascii_case(column));
    if !single_pk && !identity {
        return None;
    }
    let follower = capture(query, &caps, 3);
    let mut out = query.to_string();
    out.replace_range(whole.range(), follower);
    Some(out.trim_end().to_string())
}

/// Strip whitespace and case so `YEAR( d )` and `year(d)` compare equal.
fn expression_key(expr: &str) -> String {
    expr.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// `GROUP BY YEAR(d), MONTH(d) ORDER BY d DESC`: `d` is not grouped, so
/// T-SQL rejects it. Each such term becomes the select aliases of the
/// grouped expressions that take it as an argument, in GROUP BY order.
fn order_by_group_aliases(query: &str) -> Option<String> {
    let masked = mask_literals(query);
    let select = find_top_level(&masked, &["SELECT"], 0)?;
    let from = find_top_level(&masked, &["FROM"], select.end)?;
    let group = find_top_level(&masked, &["GROUP", "BY"], from.end)?;
    let order = find_top_level(&masked, &["ORDER", "BY"], group.end)?;
    let group_end = find_top_level(&masked, &["HAVING"], group.end)
        .map_or(order.start, |r| r.start.min(order.start));
    let order_end = find_top_level(&masked, &["LIMIT"], order.end).map_or(query.len(), |r| r.start);

    let items = |range: std::ops::Range<usize>| -> Vec<std::ops::Range<usize>> {
        split_top_level_ranges(&query[range.clone()], b',')
            .into_iter()
            .map(|r| trim_range(query, r.start + range.start..r.end + range.start))
            .filter(|r| !r.is_empty())
            .collect()
    };

    let aliases: Vec<(String, String)> = items(select.end..from.start)
        .into_iter()
        .filter_map(|r| {
            let caps = SELECT_ALIAS.captures(&masked[r.clone()])?;
            let expr = &query[r.start + caps.get(1)?.start()..r.start + caps.get(1)?.end()];
            let alias = &query[r.start + caps.get(2)?.start()..r.start + caps.get(2)?.end()];
            Some((expression_key(expr), unquote_ident(alias).to_string()))
        })
        .collect();
    let grouped: Vec<&str> = items(group.end..group_end).into_iter().map(|r| &query[r]).collect();
    if grouped.is_empty() || aliases.is_empty() {
        return None;
    }

    let mut edits = Vec::new();
    for term in items(order.end..order_end) {
        let text = &query[term.clone()];
        let (expr, direction) = match text.rsplit_once(char::is_whitespace) {
            Some((expr, dir)) if dir.eq_ignore_ascii_case("ASC") || dir.eq_ignore_ascii_case("DESC") => {
                (expr.trim_end(), Some(dir))
            }
            _ => (text, None),
        };
        let key = expression_key(expr);
        if grouped.iter().any(|g| expression_key(g) == key)
            || aliases.iter().any(|(_, alias)| alias.eq_ignore_ascii_case(expr))
        {
            continue;
        }
        let mut replacement = Vec::new();
        for g in &grouped {
            let Some(open) = g.find('(') else {
                continue;
            };
            if find_keyword(&g[open..], unquote_ident(expr), 0).is_none() {
                continue;
            }
            let alias = aliases.iter().find(|(e, _)| *e == expression_key(g))?;
            replacement.push(match direction {
                Some(dir) => format!("{} {dir}", alias.1),
                None => alias.1.clone(),
            });
        }
        if !replacement.is_empty() {
            edits.push(Edit::new(term, replacement.join(", ")));
        }
    }
    if edits.is_empty() {
        return None;
    }
    Some(apply_edits(query, edits))
}

/// `text = x` is an error in T-SQL; `text LIKE x` is not.
pub(super) fn incompatible_operator(
    translator: &Translator,
    state: &mut TranslationState,
    query: &str,
) -> Option<String> {
    let region_start = match state.kind {
        StatementKind::Select | StatementKind::Delete => 0,
        StatementKind::Update => find_top_level(&mask_literals(query), &["WHERE"], 0)?.start,
        _ => return None,
    };
    let text_columns = translator.schema().by_type(TypeClass::Text);
    if text_columns.is_empty() {
        return None;
    }
    let names: BTreeSet<String> = text_columns.iter().map(|r| regex::escape(&r.column)).collect();
    let pattern = format!(
        r"(?i)\b((?:([A-Za-z0-9_]+)\.)?({}))\b\s*(!=|<>|=)\s*(-?\d+(?:\.\d+)?\b)?",
        names.into_iter().collect::<Vec<_>>().join("|")
    );
    let re = Regex::new(&pattern).ok()?;

    let masked = mask_literals(query);
    let mut edits = Vec::new();
    for caps in re.captures_iter(&masked[region_start..]) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let offset = region_start;
        let lhs = &query[caps.get(1)?.range().start + offset..caps.get(1)?.range().end + offset];
        let column = &query[caps.get(3)?.range().start + offset..caps.get(3)?.range().end + offset];
        let is_text = match caps.get(2) {
            Some(table) => {
                let table = &query[table.range().start + offset..table.range().end + offset];
                text_columns
                    .iter()
                    .any(|r| r.table.eq_ignore_ascii_case(table) && r.column.eq_ignore_ascii_case(column))
            }
            None => true,
        };
        if !is_text {
            continue;
        }
        let operator = if &caps[4] == "=" { "LIKE" } else { "NOT LIKE" };
        let rhs = caps
            .get(5)
            .map(|n| format!("cast({} as varchar(max))", n.as_str()))
            .unwrap_or_default();
        edits.push(Edit::new(
            whole.start() + offset..whole.end() + offset,
            format!("{lhs} {operator} {rhs}"),
        ));
    }
    if edits.is_empty() {
        return None;
    }
    Some(apply_edits(query, edits))
}
