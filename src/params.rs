//! Statements, bound parameters and placeholder substitution.
//!
//! Binding is textual: each placeholder is replaced by a rendered literal
//! before any translation pass runs, in the same way a sprintf-style
//! `prepare()` would.

use serde::Serialize;
use std::fmt;
use std::ops::Range;

use crate::scan::{Edit, apply_edits, literal_spans, starts_with_ci};

/// Marker suffix for a statement whose parameters were bound.
pub const PREPARED_MARKER: &str = "--PREPARE";
/// Marker suffix for a statement that carries a serialized argument.
pub const SERIALIZED_MARKER: &str = "--SERIALIZED";

/// Dynamic value type for statement parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// A serialized blob. Bound as text, but its presence switches the
    /// statement onto the reduced translation path.
    Opaque(String),
}

impl Param {
    /// Render this value for a placeholder.
    ///
    /// `inline` is set when the placeholder sits inside a larger quoted
    /// literal, in which case text is escaped but not wrapped in quotes.
    pub fn render(&self, spec: Spec, inline: bool) -> String {
        match spec {
            Spec::Percent => "%".to_string(),
            Spec::Int => match self {
                Self::Null if !inline => "NULL".to_string(),
                other => other.as_int().to_string(),
            },
            Spec::Float => match self {
                Self::Null if !inline => "NULL".to_string(),
                other => format!("{:.6}", other.as_float()),
            },
            Spec::Text => {
                let text = match self {
                    Self::Null if inline => return String::new(),
                    Self::Null => return "NULL".to_string(),
                    Self::Bool(true) => "1".to_string(),
                    Self::Bool(false) => String::new(),
                    Self::Int(v) => v.to_string(),
                    Self::Float(v) => v.to_string(),
                    Self::Text(s) | Self::Opaque(s) => s.clone(),
                };
                if inline { escape(&text) } else { quote(&text) }
            }
        }
    }

    /// The raw text of a text-like value, as it should appear between quotes.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Opaque(s) => Some(s),
            _ => None,
        }
    }

    fn as_int(&self) -> i64 {
        match self {
            Self::Null => 0,
            Self::Bool(b) => i64::from(*b),
            Self::Int(v) => *v,
            Self::Float(v) => *v as i64,
            Self::Text(s) | Self::Opaque(s) => leading_number(s).parse::<f64>().map_or(0, |f| f as i64),
        }
    }

    fn as_float(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
            Self::Text(s) | Self::Opaque(s) => leading_number(s).parse().unwrap_or(0.0),
        }
    }
}

/// The numeric prefix of a string, the way sprintf's `%d` reads it.
fn leading_number(s: &str) -> &str {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end = 1;
    }
    let mut seen_dot = false;
    while end < bytes.len() && (bytes[end].is_ascii_digit() || (bytes[end] == b'.' && !seen_dot)) {
        seen_dot |= bytes[end] == b'.';
        end += 1;
    }
    &s[..end]
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Int(v as i64)
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        v.map_or(Param::Null, Into::into)
    }
}

/// Statement kind, decided by the leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Alter,
    Other,
}

impl StatementKind {
    pub fn classify(sql: &str) -> Self {
        let sql = sql.trim_start().trim_start_matches('(').trim_start();
        [
            ("SELECT", Self::Select),
            ("INSERT", Self::Insert),
            ("REPLACE", Self::Insert),
            ("UPDATE", Self::Update),
            ("DELETE", Self::Delete),
            ("CREATE", Self::Create),
            ("ALTER", Self::Alter),
        ]
        .into_iter()
        .find(|(keyword, _)| starts_with_ci(sql, keyword))
        .map_or(Self::Other, |(_, kind)| kind)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Create => "CREATE",
            Self::Alter => "ALTER",
            Self::Other => "OTHER",
        };
        f.write_str(name)
    }
}

/// A statement as the application issued it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Statement {
    pub text: String,
    pub params: Vec<Param>,
    /// Placeholders must be bound before translation.
    pub prepared: bool,
    /// The caller flagged a serialized argument.
    pub serialized: bool,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Bind the next parameter. Marks the statement prepared.
    pub fn bind<T: Into<Param>>(mut self, value: T) -> Self {
        self.params.push(value.into());
        self.prepared = true;
        self
    }

    /// Mark the statement as carrying a serialized argument.
    pub fn serialized(mut self) -> Self {
        self.serialized = true;
        self
    }

    /// Build a statement from text that may end with one of the legacy
    /// `--PREPARE` / `--SERIALIZED` markers. The marker is stripped.
    pub fn from_marked(text: &str) -> Self {
        let trimmed = text.trim_end();
        if let Some(body) = trimmed.strip_suffix(SERIALIZED_MARKER) {
            Self {
                text: body.to_string(),
                prepared: true,
                serialized: true,
                ..Self::default()
            }
        } else if let Some(body) = trimmed.strip_suffix(PREPARED_MARKER) {
            Self {
                text: body.to_string(),
                prepared: true,
                ..Self::default()
            }
        } else {
            Self::new(text)
        }
    }

    pub fn kind(&self) -> StatementKind {
        StatementKind::classify(&self.text)
    }

    pub fn is_serialized(&self) -> bool {
        self.serialized || self.params.iter().any(|p| matches!(p, Param::Opaque(_)))
    }

    /// Statement text with every placeholder bound. Unprepared statements
    /// come back unchanged.
    pub fn bound_text(&self) -> String {
        if self.prepared {
            bind(&self.text, &self.params)
        } else {
            self.text.clone()
        }
    }
}

/// Placeholder conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spec {
    /// `%s` or `?`
    Text,
    /// `%d`
    Int,
    /// `%f`
    Float,
    /// `%%`
    Percent,
}

/// A placeholder found in statement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub range: Range<usize>,
    pub spec: Spec,
    /// Inside a larger quoted literal, e.g. `'%s%%'`.
    pub inline: bool,
    /// Quote byte of the enclosing literal when `inline`.
    pub quote: u8,
}

impl Placeholder {
    /// True for placeholders that consume a parameter.
    pub fn takes_param(&self) -> bool {
        self.spec != Spec::Percent
    }
}

fn percent_spec(next: Option<&u8>) -> Option<Spec> {
    match next {
        Some(b's') => Some(Spec::Text),
        Some(b'd') => Some(Spec::Int),
        Some(b'f' | b'F') => Some(Spec::Float),
        Some(b'%') => Some(Spec::Percent),
        _ => None,
    }
}

/// Every placeholder in `text`, in order.
///
/// A literal that is exactly `'%s'` or `"%s"` counts as one unquoted `%s`.
/// `?` only counts outside literals.
pub fn placeholders(text: &str) -> Vec<Placeholder> {
    let bytes = text.as_bytes();
    let spans = literal_spans(text);
    let mut found = Vec::new();
    let mut i = 0;
    let mut span_iter = spans.iter().peekable();
    while i < bytes.len() {
        if let Some(span) = span_iter.peek() {
            if span.start == i {
                let span = (*span).clone();
                span_iter.next();
                if &text[span.clone()] == "'%s'" || &text[span.clone()] == "\"%s\"" {
                    found.push(Placeholder {
                        range: span.clone(),
                        spec: Spec::Text,
                        inline: false,
                        quote: b'\'',
                    });
                } else {
                    let mut j = span.start + 1;
                    while j + 1 < span.end {
                        if bytes[j] == b'%' {
                            if let Some(spec) = percent_spec(bytes.get(j + 1)) {
                                found.push(Placeholder {
                                    range: j..j + 2,
                                    spec,
                                    inline: true,
                                    quote: bytes[span.start],
                                });
                                j += 2;
                                continue;
                            }
                        }
                        j += 1;
                    }
                }
                i = span.end;
                continue;
            }
        }
        match bytes[i] {
            b'?' => {
                found.push(Placeholder {
                    range: i..i + 1,
                    spec: Spec::Text,
                    inline: false,
                    quote: b'\'',
                });
                i += 1;
            }
            b'%' => match percent_spec(bytes.get(i + 1)) {
                Some(spec) => {
                    found.push(Placeholder {
                        range: i..i + 2,
                        spec,
                        inline: false,
                        quote: b'\'',
                    });
                    i += 2;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    found
}

/// Substitute `params` into the placeholders of `text`, in order.
/// Placeholders left without a parameter stay as written.
pub fn bind(text: &str, params: &[Param]) -> String {
    let mut next = params.iter();
    let edits: Vec<Edit> = placeholders(text)
        .into_iter()
        .filter_map(|ph| {
            if !ph.takes_param() {
                return Some(Edit::new(ph.range, "%"));
            }
            next.next().map(|param| {
                let mut text = param.render(ph.spec, ph.inline);
                if ph.inline && ph.quote == b'"' {
                    text = text.replace('"', "\"\"");
                }
                Edit::new(ph.range.clone(), text)
            })
        })
        .collect();
    apply_edits(text, edits)
}

/// Double embedded single quotes.
pub fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

/// Escape and wrap in single quotes.
pub fn quote(s: &str) -> String {
    format!("'{}'", escape(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_param_from() {
        assert_eq!(Param::from(true), Param::Bool(true));
        assert_eq!(Param::from(42i32), Param::Int(42));
        assert_eq!(Param::from("hello"), Param::Text("hello".into()));
        assert_eq!(Param::from(None::<i64>), Param::Null);
    }

    #[test]
    fn test_bind_quotes_and_escapes() {
        let sql = bind(
            "SELECT * FROM wp_users WHERE user_login = %s AND ID = %d",
            &["o'brien".into(), 7.into()],
        );
        assert_eq!(sql, "SELECT * FROM wp_users WHERE user_login = 'o''brien' AND ID = 7");
    }

    #[test]
    fn test_bind_unquotes_pre_quoted() {
        let sql = bind("UPDATE t SET a = '%s', b = \"%s\"", &["x".into(), "y".into()]);
        assert_eq!(sql, "UPDATE t SET a = 'x', b = 'y'");
    }

    #[test]
    fn test_bind_question_marks_outside_literals() {
        let sql = bind("SELECT '?' , ? FROM t WHERE a = ?", &["1".into(), Param::Null]);
        assert_eq!(sql, "SELECT '?' , '1' FROM t WHERE a = NULL");
    }

    #[test]
    fn test_bind_percent_escape_and_inline() {
        let sql = bind("SELECT * FROM t WHERE a LIKE '%s%%' AND b = %f", &["it's".into(), 1.5.into()]);
        assert_eq!(sql, "SELECT * FROM t WHERE a LIKE 'it''s%' AND b = 1.500000");
    }

    #[test]
    fn test_bind_inline_in_double_quotes() {
        let sql = bind("SELECT * FROM t WHERE a LIKE \"%s%%\"", &["say \"hi\"".into()]);
        assert_eq!(sql, "SELECT * FROM t WHERE a LIKE \"say \"\"hi\"\"%\"");
    }

    #[test]
    fn test_bind_trailing_backslash_stays_literal() {
        let sql = bind("INSERT INTO t (a, b) VALUES (%s, %s)", &["C:\\".into(), "NOW()".into()]);
        assert_eq!(sql, "INSERT INTO t (a, b) VALUES ('C:\\', 'NOW()')");
        let spans: Vec<&str> = literal_spans(&sql).into_iter().map(|r| &sql[r]).collect();
        assert_eq!(spans, vec!["'C:\\'", "'NOW()'"]);
    }

    #[test]
    fn test_bind_missing_params_left_alone() {
        assert_eq!(bind("SELECT %s, %s", &["a".into()]), "SELECT 'a', %s");
    }

    #[test]
    fn test_int_spec_reads_leading_digits() {
        assert_eq!(Param::from("12abc").render(Spec::Int, false), "12");
        assert_eq!(Param::from("abc").render(Spec::Int, false), "0");
    }

    #[test]
    fn test_from_marked() {
        let st = Statement::from_marked("SELECT 1--PREPARE");
        assert!(st.prepared);
        assert!(!st.is_serialized());
        assert_eq!(st.text, "SELECT 1");

        let st = Statement::from_marked("INSERT INTO t VALUES ('a:1:{}')--SERIALIZED");
        assert!(st.is_serialized());
        assert_eq!(st.kind(), StatementKind::Insert);
    }

    #[test]
    fn test_opaque_param_marks_serialized() {
        let st = Statement::new("UPDATE t SET v = %s").bind(Param::Opaque("a:0:{}".into()));
        assert!(st.prepared);
        assert!(st.is_serialized());
    }

    #[test]
    fn test_classify() {
        assert_eq!(StatementKind::classify("  select 1"), StatementKind::Select);
        assert_eq!(StatementKind::classify("(SELECT 1) UNION (SELECT 2)"), StatementKind::Select);
        assert_eq!(StatementKind::classify("REPLACE INTO t VALUES (1)"), StatementKind::Insert);
        assert_eq!(StatementKind::classify("SHOW TABLES"), StatementKind::Other);
    }
}
