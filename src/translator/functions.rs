//! Function calls with no T-SQL counterpart.

use regex::Regex;
use std::sync::LazyLock;

use crate::scan::{
    capture, extract_aliases, find_all_occurrences, find_ci, find_matching_close, find_top_level,
    is_ident_byte, mask_literals, replace_unquoted, split_top_level,
};

static INTERVAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^INTERVAL\s+('?)\s*(-?\s*\d+)\s*'?\s+([A-Za-z_]+)$").expect("interval pattern")
});

static UNIX_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:from_unixtime|unix_timestamp)\s*\([^)]*\)").expect("unix time pattern")
});

static NOW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bNOW\s*\(\s*\)").expect("now pattern"));

static DAY_OF_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bdayofmonth\s*\(([^)]*)\)").expect("dayofmonth pattern"));

/// Start offsets of `name(` calls, last first. `name` must end with `(`.
fn calls(masked: &str, name: &str) -> Vec<usize> {
    let bytes = masked.as_bytes();
    let mut positions: Vec<usize> = find_all_occurrences(masked, name)
        .into_iter()
        .filter(|&pos| pos == 0 || !is_ident_byte(bytes[pos - 1]))
        .collect();
    positions.reverse();
    positions
}

/// `DATE_ADD(expr, INTERVAL n unit)` → `DATEADD(UNIT, n, expr)`, and
/// `DATE_SUB` with the amount negated.
pub(super) fn date_arithmetic(query: &str) -> Option<String> {
    let masked = mask_literals(query);
    let mut starts: Vec<(usize, bool)> = calls(&masked, "DATE_ADD(")
        .into_iter()
        .map(|p| (p, false))
        .chain(calls(&masked, "DATE_SUB(").into_iter().map(|p| (p, true)))
        .collect();
    if starts.is_empty() {
        return None;
    }
    starts.sort_by(|a, b| b.0.cmp(&a.0));

    let mut query = query.to_string();
    for (start, subtract) in starts {
        // Inner calls were rewritten already; offsets before `start` are stable.
        let masked = mask_literals(&query);
        let open = start + "DATE_ADD".len();
        let Some(close) = find_matching_close(&masked, open) else {
            continue;
        };
        let args = split_top_level(&query[open + 1..close], b',');
        let [expr, interval] = args.as_slice() else {
            continue;
        };
        let Some(caps) = INTERVAL.captures(interval.trim()) else {
            continue;
        };
        let amount: String = caps[2].chars().filter(|c| !c.is_whitespace()).collect();
        let amount = match (subtract, amount.strip_prefix('-')) {
            (false, _) => amount.clone(),
            (true, Some(positive)) => positive.to_string(),
            (true, None) => format!("-{amount}"),
        };
        let rewritten = format!(
            "DATEADD({}, {}, {})",
            caps[3].to_ascii_uppercase(),
            amount,
            expr.trim()
        );
        query.replace_range(start..close + 1, &rewritten);
    }
    Some(query)
}

/// Three-argument `IF()` over a `DATEADD` condition → `CASE WHEN`.
pub(super) fn conditional_unwrap(query: &str) -> Option<String> {
    let masked = mask_literals(query);
    let mut starts = calls(&masked, "IF(");
    starts.extend(calls(&masked, "IF ("));
    if starts.is_empty() {
        return None;
    }
    starts.sort_by(|a, b| b.cmp(a));

    let mut query = query.to_string();
    for start in starts {
        let masked = mask_literals(&query);
        let Some(open) = find_ci(&masked, "(", start) else {
            continue;
        };
        let Some(close) = find_matching_close(&masked, open) else {
            continue;
        };
        let args = split_top_level(&query[open + 1..close], b',');
        let [condition, then, otherwise] = args.as_slice() else {
            continue;
        };
        if find_ci(&mask_literals(condition), "DATEADD(", 0).is_none() {
            continue;
        }
        let rewritten = format!(
            "(CASE WHEN {} THEN {} ELSE {} END)",
            condition.trim(),
            then.trim(),
            otherwise.trim()
        );
        query.replace_range(start..close + 1, &rewritten);
    }
    Some(query)
}

/// `NOW()`, `FROM_UNIXTIME()` and `UNIX_TIMESTAMP()` → `getdate()`;
/// `DAYOFMONTH(x)` → `DATEPART(DD, x)`.
pub(super) fn now_functions(query: &str) -> Option<String> {
    let out = replace_unquoted(query, &UNIX_TIME, |_, _| Some("getdate()".to_string()));
    let out = replace_unquoted(&out, &NOW, |_, _| Some("getdate()".to_string()));
    let with_datepart = replace_unquoted(&out, &DAY_OF_MONTH, |q, caps| {
        Some(format!("DATEPART(DD, {})", capture(q, caps, 1).trim()))
    });
    if with_datepart == out {
        return Some(out);
    }
    if !extract_aliases(&with_datepart).is_empty() {
        return Some(with_datepart);
    }
    // An unaliased DATEPART column has no name to read it back by.
    let masked = mask_literals(&with_datepart);
    let Some(from) = find_top_level(&masked, &["FROM"], 0) else {
        return Some(with_datepart);
    };
    let mut aliased = with_datepart;
    aliased.insert_str(from.start, "as dom ");
    Some(aliased)
}
