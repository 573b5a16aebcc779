//! Restores bound values that a pass rewrote.
//!
//! Passes search over a literal mask and should never touch string data, so
//! this is a backstop. Each VALUES entry or SET value that was exactly one
//! placeholder in the issued statement must still read as the literal its
//! parameter renders to. If it does not, the rendered literal is put back.

use std::collections::HashMap;
use std::ops::Range;

use crate::params::{Param, StatementKind, placeholders};
use crate::scan::{
    Edit, apply_edits, find_top_level, mask_literals, split_top_level_ranges, trim_range,
};

use super::insert::insert_shape;
use super::state::TranslationState;

const ZERO_DATETIME: &str = "0000-00-00 00:00:00";

/// Rendered literal for every placeholder that stands alone, keyed by its
/// range in the template.
fn rendered_placeholders(template: &str, params: &[Param]) -> HashMap<Range<usize>, (String, bool)> {
    let mut next = params.iter();
    let mut rendered = HashMap::new();
    for ph in placeholders(template) {
        if !ph.takes_param() {
            continue;
        }
        let Some(param) = next.next() else {
            break;
        };
        if ph.inline {
            continue;
        }
        let exempt = matches!(param.as_text(), Some("") | Some(ZERO_DATETIME));
        rendered.insert(ph.range.clone(), (param.render(ph.spec, false), exempt));
    }
    rendered
}

/// Compare `translated` entries against the template entries they came from.
fn restore(
    translated: &str,
    template_entries: &[Range<usize>],
    translated_entries: &[Range<usize>],
    rendered: &HashMap<Range<usize>, (String, bool)>,
) -> Vec<Edit> {
    template_entries
        .iter()
        .zip(translated_entries)
        .filter_map(|(template, now)| {
            let (expected, exempt) = rendered.get(template)?;
            let actual = &translated[now.clone()];
            if actual == expected || *exempt {
                return None;
            }
            tracing::warn!(expected = %expected, actual, "restoring bound value altered by translation");
            Some(Edit::new(now.clone(), expected.clone()))
        })
        .collect()
}

pub(super) fn verify(state: &TranslationState, main: Vec<String>) -> Vec<String> {
    let rendered = rendered_placeholders(&state.template, &state.params);
    if rendered.is_empty() {
        return main;
    }
    match state.kind {
        StatementKind::Insert => verify_insert(&state.template, main, &rendered),
        StatementKind::Update => main
            .into_iter()
            .map(|query| verify_update(&state.template, query, &rendered))
            .collect(),
        _ => main,
    }
}

fn verify_insert(
    template: &str,
    main: Vec<String>,
    rendered: &HashMap<Range<usize>, (String, bool)>,
) -> Vec<String> {
    let Some(template_shape) = insert_shape(template) else {
        return main;
    };
    if template_shape.groups.len() != main.len() {
        tracing::debug!(
            groups = template_shape.groups.len(),
            statements = main.len(),
            "value groups no longer line up, verification skipped"
        );
        return main;
    }
    main.into_iter()
        .enumerate()
        .map(|(group, query)| {
            let Some(shape) = insert_shape(&query).filter(|s| s.groups.len() == 1) else {
                return query;
            };
            let template_entries = template_shape.entries(template, group);
            let entries = shape.entries(&query, 0);
            if template_entries.len() != entries.len() {
                tracing::debug!("value counts differ, verification skipped");
                return query;
            }
            let edits = restore(&query, &template_entries, &entries, rendered);
            apply_edits(&query, edits)
        })
        .collect()
}

/// Value ranges of the top-level SET assignments.
fn set_values(query: &str) -> Option<Vec<Range<usize>>> {
    let masked = mask_literals(query);
    let set = find_top_level(&masked, &["SET"], 0)?;
    let end = find_top_level(&masked, &["WHERE"], set.end)
        .map_or(query.len(), |r| r.start);
    let region = set.end..end;
    let values = split_top_level_ranges(&query[region.clone()], b',')
        .into_iter()
        .map(|r| {
            let r = r.start + region.start..r.end + region.start;
            let eq = masked[r.clone()].find('=').map_or(r.start, |i| r.start + i + 1);
            trim_range(query, eq..r.end)
        })
        .collect();
    Some(values)
}

fn verify_update(template: &str, query: String, rendered: &HashMap<Range<usize>, (String, bool)>) -> String {
    let (Some(template_values), Some(values)) = (set_values(template), set_values(&query)) else {
        return query;
    };
    if template_values.len() != values.len() {
        tracing::debug!("SET lists differ, verification skipped");
        return query;
    }
    let edits = restore(&query, &template_values, &values, rendered);
    apply_edits(&query, edits)
}
