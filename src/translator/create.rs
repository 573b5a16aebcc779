//! CREATE TABLE → T-SQL DDL.
//!
//! The column list is split into entries. Column definitions are rewritten
//! one at a time, key entries are collected and re-emitted as constraints
//! or as indexes created after the table, and everything after the closing
//! parenthesis (engine, charset) is dropped. ALTER statements only update
//! the schema map.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::TranslatorConfig;
use crate::params::StatementKind;
use crate::schema::{enum_is_integral, key_columns, table_name_after};
use crate::scan::{
    capture, find_all_occurrences, find_keyword, find_matching_close, find_words, is_ident_byte,
    mask_literals, replace_unquoted, split_top_level, unquote_ident,
};

use super::state::TranslationState;
use super::{RunPolicy, Translator};

static AUTO_INCREMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAUTO_INCREMENT\b").expect("auto_increment pattern"));

static AFTER_COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+AFTER\s+\S+\s*$").expect("after pattern"));

static INT_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(tinyint|smallint|mediumint|bigint|int|integer)\s*\(\s*\d+\s*\)").expect("int width pattern")
});

static UNSIGNED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\b(?:UNSIGNED|ZEROFILL)\b").expect("unsigned pattern"));

static CHARACTER_SET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\b(?:DEFAULT\s+)?(?:CHARACTER\s+SET|CHARSET)\s*=?\s*\w+").expect("charset pattern")
});

static TEXT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*((tinytext|mediumtext|longtext|text)\b|varchar\s*\(\s*\d+\s*\))")
        .expect("text type pattern")
});

const ZERO_DATETIME: &str = "'0000-00-00 00:00:00'";

/// What one entry of a CREATE TABLE column list declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Column,
    PrimaryKey,
    UniqueKey,
    Index,
    /// FULLTEXT and SPATIAL keys have no counterpart.
    Dropped,
    /// Already T-SQL (or portable): kept as written.
    Verbatim,
}

impl Entry {
    fn classify(entry: &str) -> Self {
        let at_start = |word: &str| find_keyword(entry, word, 0) == Some(0);
        if find_words(entry, &["PRIMARY", "KEY"], 0).is_some_and(|r| r.start == 0) {
            Self::PrimaryKey
        } else if at_start("UNIQUE") {
            Self::UniqueKey
        } else if at_start("KEY") || at_start("INDEX") {
            Self::Index
        } else if at_start("FULLTEXT") || at_start("SPATIAL") {
            Self::Dropped
        } else if at_start("CONSTRAINT") || at_start("FOREIGN") || at_start("CHECK") {
            Self::Verbatim
        } else {
            Self::Column
        }
    }
}

pub(super) fn create_table(
    translator: &Translator,
    state: &mut TranslationState,
    query: &str,
) -> Option<String> {
    match state.kind {
        StatementKind::Alter => {
            translator.schema().update_for(query);
            return None;
        }
        StatementKind::Create => {}
        _ => return None,
    }
    let masked = mask_literals(query);
    let table_kw = find_keyword(&masked, "TABLE", 0)?;
    let modifiers = masked["CREATE".len().min(table_kw)..table_kw].trim();
    if !modifiers.is_empty() && !modifiers.eq_ignore_ascii_case("TEMPORARY") {
        return None;
    }
    let (table, after_name) = table_name_after(query, table_kw + "TABLE".len())?;
    let open = after_name + masked[after_name..].find('(')?;
    if !masked[after_name..open].trim().is_empty() {
        return None;
    }
    let close = find_matching_close(&masked, open)?;

    translator.schema().update_for(query);
    let config = translator.config();

    let mut columns = Vec::new();
    let mut verbatim = Vec::new();
    let mut primary: Vec<String> = Vec::new();
    let mut uniques: Vec<Vec<String>> = Vec::new();
    let mut indexes: Vec<Vec<String>> = Vec::new();
    let mut has_primary = false;

    for entry in split_top_level(&query[open + 1..close], b',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match Entry::classify(entry) {
            Entry::PrimaryKey => primary = key_columns(entry),
            Entry::UniqueKey => uniques.push(key_columns(entry)),
            Entry::Index => indexes.push(key_columns(entry)),
            Entry::Dropped => tracing::debug!(table = %table, entry, "dropping unsupported key"),
            Entry::Verbatim => {
                has_primary |= find_words(entry, &["PRIMARY", "KEY"], 0).is_some();
                verbatim.push(entry.to_string());
            }
            Entry::Column => {
                let (definition, inline_primary) = rewrite_column(entry, config);
                if let Some(column) = inline_primary {
                    primary = vec![column];
                }
                columns.push(definition);
            }
        }
    }

    let mut entries = columns;
    if !primary.is_empty() {
        has_primary = true;
        let mut constraint = format!(
            "CONSTRAINT [{}] PRIMARY KEY CLUSTERED ({}) WITH (IGNORE_DUP_KEY = OFF)",
            key_name(&table, &primary),
            column_list(config, &primary)
        );
        if !config.azure {
            constraint.push_str(" ON [PRIMARY]");
        }
        entries.push(constraint);
    }
    for unique in uniques.iter().filter(|cols| wanted(config, cols)) {
        entries.push(format!(
            "CONSTRAINT [{}] UNIQUE NONCLUSTERED ({})",
            key_name(&table, unique),
            column_list(config, unique)
        ));
    }
    entries.extend(verbatim);

    let clustering = if config.azure { "CLUSTERED" } else { "NONCLUSTERED" };
    for index in indexes.iter().filter(|cols| wanted(config, cols)) {
        state.follow(
            format!(
                "CREATE {clustering} INDEX {} ON {table}({})",
                key_name(&table, index),
                column_list(config, index)
            ),
            RunPolicy::OnSuccess,
        );
    }

    let trailer = if has_primary && !config.azure { " ON [PRIMARY];" } else { ";" };
    Some(format!(
        "CREATE TABLE {table} (\n  {}\n){trailer}",
        entries.join(",\n  ")
    ))
}

fn key_name(table: &str, columns: &[String]) -> String {
    format!("{table}_{}", columns.join("_"))
}

fn column_list(config: &TranslatorConfig, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| bracket_reserved(config, c))
        .collect::<Vec<_>>()
        .join(",")
}

/// Keys over columns on the non-unique list are not emitted.
fn wanted(config: &TranslatorConfig, columns: &[String]) -> bool {
    !columns.is_empty() && !columns.iter().any(|c| config.is_non_unique(c))
}

fn bracket_reserved(config: &TranslatorConfig, column: &str) -> String {
    if config.is_reserved(column) {
        format!("[{column}]")
    } else {
        column.to_string()
    }
}

/// Split a column definition into its name token and the rest.
fn split_name(entry: &str) -> (&str, &str) {
    let closing = match entry.as_bytes().first() {
        Some(b'[') => Some(']'),
        Some(b'`') => Some('`'),
        Some(b'"') => Some('"'),
        _ => None,
    };
    let end = match closing {
        Some(c) => entry[1..].find(c).map_or(entry.len(), |i| i + 2),
        None => entry.find(char::is_whitespace).unwrap_or(entry.len()),
    };
    entry.split_at(end)
}

/// Rewrite one column definition. Returns the new text and, when the
/// definition carried an inline PRIMARY KEY, the column name.
fn rewrite_column(entry: &str, config: &TranslatorConfig) -> (String, Option<String>) {
    let (token, rest) = split_name(entry);
    let name = unquote_ident(token).to_string();
    let mut rest = rest.to_string();

    rest = rewrite_enum(&rest);

    let mut inline_primary = None;
    if let Some(range) = find_words(&mask_literals(&rest), &["PRIMARY", "KEY"], 0) {
        let start = rest[..range.start].trim_end().len();
        rest.replace_range(start..range.end, "");
        inline_primary = Some(name.clone());
    }

    rest = replace_unquoted(&rest, &AUTO_INCREMENT, |_, _| Some("IDENTITY(1,1)".to_string()));
    rest = replace_unquoted(&rest, &AFTER_COLUMN, |_, _| Some(String::new()));
    rest = replace_unquoted(&rest, &INT_WIDTH, |q, caps| Some(capture(q, caps, 1).to_string()));
    rest = replace_unquoted(&rest, &UNSIGNED, |_, _| Some(String::new()));
    rest = rest.replace(ZERO_DATETIME, "getdate()");
    rest = replace_unquoted(&rest, &CHARACTER_SET, |_, _| Some(String::new()));

    let has_collation = find_keyword(&mask_literals(&rest), "COLLATE", 0).is_some();
    let collation = &config.collation;
    rest = replace_unquoted(&rest, &TEXT_TYPE, |q, caps| {
        let whole = capture(q, caps, 0);
        let ty = capture(q, caps, 1);
        let leading = &whole[..whole.len() - ty.len()];
        let ty = if caps.get(2).is_some() { "TEXT" } else { ty };
        if has_collation {
            Some(format!("{leading}{ty}"))
        } else {
            Some(format!("{leading}{ty} COLLATE {collation}"))
        }
    });

    let token = if config.is_reserved(&name) {
        format!("[{name}]")
    } else {
        token.to_string()
    };
    let rest = rest.trim();
    let definition = if rest.is_empty() { token } else { format!("{token} {rest}") };
    (definition, inline_primary)
}

/// `enum('a','b')` → `varchar(255)`, `enum('1','2')` → `smallint`.
fn rewrite_enum(rest: &str) -> String {
    let mut out = rest.to_string();
    let masked = mask_literals(rest);
    let bytes = masked.as_bytes();
    for start in find_all_occurrences(&masked, "enum(").into_iter().rev() {
        if start > 0 && is_ident_byte(bytes[start - 1]) {
            continue;
        }
        let open = start + "enum".len();
        let Some(close) = find_matching_close(&masked, open) else {
            continue;
        };
        let replacement = if enum_is_integral(&rest[open + 1..close]) {
            "smallint"
        } else {
            "varchar(255)"
        };
        out.replace_range(start..close + 1, replacement);
    }
    out
}
