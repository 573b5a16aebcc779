//! Lexical helpers shared by the translation passes.
//!
//! Nothing in here understands SQL grammar. The helpers locate parentheses,
//! keywords and list separators in raw statement text. Searches that must
//! not look inside string data run over [`mask_literals`], which keeps every
//! byte offset of the original statement intact, so a position found in the
//! mask can be used to edit the original.

use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::LazyLock;

/// Filler written over the interior of quoted literals by [`mask_literals`].
const MASK: u8 = b'x';

static ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bAS\s+(\[[^\]]+\]|[A-Za-z_][A-Za-z0-9_]*)").expect("alias pattern")
});

/// Returns true for bytes that can appear in an unquoted identifier.
pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Given the index of an opening `(`, find the index of its balancing `)`.
///
/// Returns `None` when `open` is not an opening parenthesis or the text ends
/// before the parentheses balance. The returned index is always in bounds.
///
/// Quotes are not special here; pass a [`mask_literals`] view when the text
/// may contain parentheses inside string data.
pub fn find_matching_close(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Every non-overlapping, case-insensitive occurrence of `needle`, in
/// ascending order.
///
/// Callers that edit the text should walk the result in reverse so an edit
/// never shifts the offset of an occurrence still waiting to be processed.
pub fn find_all_occurrences(haystack: &str, needle: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    if needle.is_empty() {
        return positions;
    }
    let hay = haystack.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();
    let mut from = 0;
    while let Some(pos) = hay[from..].find(&needle) {
        positions.push(from + pos);
        from += pos + needle.len();
    }
    positions
}

/// Case-insensitive search starting at byte offset `from`.
pub fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() || !haystack.is_char_boundary(from) {
        return None;
    }
    let hay = haystack[from..].to_ascii_lowercase();
    hay.find(&needle.to_ascii_lowercase()).map(|pos| pos + from)
}

/// Case-insensitive prefix test.
pub fn starts_with_ci(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Case-insensitive search for `word` as a whole word.
pub fn find_keyword(haystack: &str, word: &str, from: usize) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let mut from = from;
    while let Some(pos) = find_ci(haystack, word, from) {
        let end = pos + word.len();
        let before_ok = pos == 0 || !is_ident_byte(bytes[pos - 1]);
        let after_ok = end >= bytes.len() || !is_ident_byte(bytes[end]);
        if before_ok && after_ok {
            return Some(pos);
        }
        from = pos + 1;
        while from < haystack.len() && !haystack.is_char_boundary(from) {
            from += 1;
        }
    }
    None
}

/// Find a sequence of whole words separated by any whitespace, such as
/// `["ORDER", "BY"]`. Returns the byte range from the first word to the end
/// of the last.
pub fn find_words(haystack: &str, words: &[&str], from: usize) -> Option<Range<usize>> {
    let (first, rest) = words.split_first()?;
    let bytes = haystack.as_bytes();
    let mut search = from;
    'outer: while let Some(start) = find_keyword(haystack, first, search) {
        search = start + first.len();
        let mut cursor = start + first.len();
        for word in rest {
            let gap_start = cursor;
            while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
            if cursor == gap_start || find_keyword(haystack, word, cursor) != Some(cursor) {
                continue 'outer;
            }
            cursor += word.len();
        }
        return Some(start..cursor);
    }
    None
}

/// [`find_words`] restricted to paren depth zero. `masked` should come from
/// [`mask_literals`].
pub fn find_top_level(masked: &str, words: &[&str], from: usize) -> Option<Range<usize>> {
    let mut from = from;
    while let Some(range) = find_words(masked, words, from) {
        if depth_at(masked, range.start) == 0 {
            return Some(range);
        }
        from = range.end;
    }
    None
}

/// Last depth-zero occurrence of `words`.
pub fn rfind_top_level(masked: &str, words: &[&str]) -> Option<Range<usize>> {
    let mut last = None;
    let mut from = 0;
    while let Some(range) = find_top_level(masked, words, from) {
        from = range.end;
        last = Some(range);
    }
    last
}

/// Paren depth at `pos`, counted over a masked statement.
pub fn depth_at(masked: &str, pos: usize) -> usize {
    let mut depth = 0usize;
    for &b in &masked.as_bytes()[..pos.min(masked.len())] {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

/// Byte ranges of quoted literals, quotes included. An unterminated literal
/// runs to the end of the text.
///
/// Quotes are escaped only by doubling. A backslash is an ordinary byte, as
/// it is on SQL Server; MySQL escapes are rewritten up front by
/// [`normalize_escapes`].
pub fn literal_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let quote = bytes[i];
        if quote != b'\'' && quote != b'"' {
            i += 1;
            continue;
        }
        let start = i;
        i += 1;
        loop {
            match bytes.get(i) {
                None => break,
                Some(&b) if b == quote => {
                    if bytes.get(i + 1) == Some(&quote) {
                        i += 2;
                    } else {
                        i += 1;
                        break;
                    }
                }
                Some(_) => i += 1,
            }
        }
        i = i.min(bytes.len());
        spans.push(start..i);
    }
    spans
}

/// Rewrite MySQL backslash-escaped quotes (`\'`) as doubled quotes.
///
/// Runs once on the issued statement, before parameters are bound. `\\`
/// is kept as written so the backslash it encodes cannot escape the quote
/// after it.
pub fn normalize_escapes(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match quote {
            None => {
                if b == b'\'' || b == b'"' {
                    quote = Some(b);
                }
                out.push(b);
                i += 1;
            }
            Some(_) if b == b'\\' && next == Some(b'\\') => {
                out.extend_from_slice(b"\\\\");
                i += 2;
            }
            Some(q) if (b == b'\\' || b == q) && next == Some(q) => {
                out.extend_from_slice(&[q, q]);
                i += 2;
            }
            Some(q) => {
                if b == q {
                    quote = None;
                }
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// A copy of `text` with the interior of every quoted literal overwritten.
///
/// The result has exactly the same byte length and the same bytes outside
/// literals, so offsets found in the mask are valid in the original text.
pub fn mask_literals(text: &str) -> String {
    let mut out = text.as_bytes().to_vec();
    for span in literal_spans(text) {
        let quote = out[span.start];
        let terminated = span.len() >= 2 && text.as_bytes()[span.end - 1] == quote;
        let interior_end = if terminated { span.end - 1 } else { span.end };
        for b in &mut out[span.start + 1..interior_end] {
            *b = MASK;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Split on `sep` where it appears outside quotes and parentheses.
///
/// Always returns at least one range; ranges are untrimmed.
pub fn split_top_level_ranges(text: &str, sep: u8) -> Vec<Range<usize>> {
    let masked = mask_literals(text);
    let mut ranges = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, &b) in masked.as_bytes().iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ if b == sep && depth == 0 => {
                ranges.push(start..i);
                start = i + 1;
            }
            _ => {}
        }
    }
    ranges.push(start..text.len());
    ranges
}

/// Split on `sep` where it appears outside quotes and parentheses.
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    split_top_level_ranges(text, sep)
        .into_iter()
        .map(|r| &text[r])
        .collect()
}

/// Shrink `range` so it excludes leading and trailing whitespace.
pub fn trim_range(text: &str, range: Range<usize>) -> Range<usize> {
    let slice = &text[range.clone()];
    let start = range.start + (slice.len() - slice.trim_start().len());
    let end = range.end - (slice.len() - slice.trim_end().len());
    start..end.max(start)
}

/// Strip identifier quoting: backticks, brackets and double quotes.
pub fn unquote_ident(ident: &str) -> &str {
    ident
        .trim()
        .trim_matches(|c| c == '`' || c == '"' || c == '[' || c == ']')
}

/// Every identifier immediately following an `AS` token at the top level of
/// the statement. Aliases inside parentheses (casts, subqueries) are skipped.
pub fn extract_aliases(query: &str) -> Vec<String> {
    let masked = mask_literals(query);
    ALIAS
        .captures_iter(&masked)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let alias = caps.get(1)?;
            (depth_at(&masked, whole.start()) == 0).then(|| query[alias.range()].to_string())
        })
        .collect()
}

/// A pending replacement of a byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

impl Edit {
    pub fn new(range: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }
}

/// Apply edits computed against `text`, back to front.
///
/// Edits are sorted by start offset and applied from the end of the text, so
/// each one still sees the offsets it was computed with. An edit that
/// overlaps one already applied, or that does not fall on character
/// boundaries, is dropped.
pub fn apply_edits(text: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.range.start.cmp(&a.range.start));
    let mut out = text.to_owned();
    let mut floor = text.len();
    for edit in edits {
        let Range { start, end } = edit.range;
        if start > end
            || end > floor
            || !text.is_char_boundary(start)
            || !text.is_char_boundary(end)
        {
            continue;
        }
        out.replace_range(start..end, &edit.replacement);
        floor = start;
    }
    out
}

/// Text of capture `i`, taken from the original statement.
pub fn capture<'q>(query: &'q str, caps: &Captures<'_>, i: usize) -> &'q str {
    caps.get(i).map_or("", |m| &query[m.range()])
}

/// Run `re` over the literal mask of `query` and replace each match for
/// which `rewrite` returns a replacement. `rewrite` receives the original
/// statement so it can read capture text with [`capture`].
pub fn replace_unquoted(
    query: &str,
    re: &Regex,
    mut rewrite: impl FnMut(&str, &Captures<'_>) -> Option<String>,
) -> String {
    let masked = mask_literals(query);
    let edits: Vec<Edit> = re
        .captures_iter(&masked)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            rewrite(query, &caps).map(|r| Edit::new(whole.range(), r))
        })
        .collect();
    if edits.is_empty() {
        return query.to_string();
    }
    apply_edits(query, edits)
}

/// Replace every case-insensitive occurrence of `needle` outside literals.
pub fn replace_all_ci(query: &str, needle: &str, replacement: &str) -> String {
    let masked = mask_literals(query);
    let edits: Vec<Edit> = find_all_occurrences(&masked, needle)
        .into_iter()
        .map(|pos| Edit::new(pos..pos + needle.len(), replacement))
        .collect();
    if edits.is_empty() {
        return query.to_string();
    }
    apply_edits(query, edits)
}
