//! Server info queries, SHOW/SET commands and identifier quoting.

use regex::Regex;
use std::sync::LazyLock;

use crate::params::quote;
use crate::scan::{
    capture, find_ci, find_matching_close, find_words, mask_literals, replace_all_ci,
    replace_unquoted, split_top_level, starts_with_ci, unquote_ident,
};

use super::state::TranslationState;
use super::Translator;

static COUNT_STAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bSELECT\s+COUNT\(\s*(?:\*|1)\s*\)(\s+AS\b)?").expect("count pattern")
});

const SHOW_TABLES: &str = "SELECT name FROM SYSOBJECTS WHERE TYPE = 'U' ORDER BY NAME";

pub(super) fn translate_general(
    translator: &Translator,
    _state: &mut TranslationState,
    query: &str,
) -> Option<String> {
    let bare = query.trim().trim_end_matches(';').trim_end();

    if let Some(command) = command_rewrite(bare) {
        return Some(command);
    }

    let mut query = query.to_string();
    if starts_with_ci(&query, "SELECT VERSION()") {
        query.replace_range(..16, "SELECT @@VERSION");
    }
    query = replace_all_ci(&query, "LAST_INSERT_ID()", "@@IDENTITY");
    query = use_index(translator, &query);
    if let Some(range) = find_words(&query, &["DROP", "TABLE", "IF", "EXISTS"], 0) {
        if range.start == 0 {
            query.replace_range(range, "DROP TABLE");
        }
    }
    query = replace_all_ci(&query, "`", "");
    query = replace_unquoted(&query, &COUNT_STAR, |q, caps| {
        if caps.get(1).is_some() {
            return None;
        }
        Some(format!("{} as Computed", capture(q, caps, 0)))
    });
    Some(query)
}

/// Whole-statement commands with no T-SQL counterpart.
fn command_rewrite(bare: &str) -> Option<String> {
    if starts_with_ci(bare, "SHOW VARIABLES LIKE 'sql_mode'") || starts_with_ci(bare, "SET NAMES") {
        return Some(String::new());
    }
    if bare.eq_ignore_ascii_case("SHOW TABLES") {
        return Some(SHOW_TABLES.to_string());
    }
    if let Some(range) = find_words(bare, &["SHOW", "TABLES", "LIKE"], 0).filter(|r| r.start == 0) {
        let pattern = bare[range.end..].trim();
        return Some(format!(
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME LIKE {pattern}"
        ));
    }
    if let Some(range) = find_words(bare, &["SHOW", "COLUMNS", "FROM"], 0).filter(|r| r.start == 0) {
        let table = unquote_ident(bare[range.end..].trim().trim_matches('\''));
        return Some(format!(
            "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = {}",
            quote(table)
        ));
    }
    None
}

/// `t USE INDEX (a, b)` to `t WITH (INDEX(a, b))`. Index names that are
/// really column names of `t` get the `t_` prefix CREATE TABLE gives them.
fn use_index(translator: &Translator, query: &str) -> String {
    let masked = mask_literals(query);
    let Some(range) = find_words(&masked, &["USE", "INDEX"], 0) else {
        return query.to_string();
    };
    let Some(open) = find_ci(&masked, "(", range.end) else {
        return query.to_string();
    };
    if !masked[range.end..open].trim().is_empty() {
        return query.to_string();
    }
    let Some(close) = find_matching_close(&masked, open) else {
        return query.to_string();
    };

    let table = masked[..range.start]
        .split_whitespace()
        .next_back()
        .map(unquote_ident)
        .and_then(|name| translator.schema().table(name));

    let indexes: Vec<String> = split_top_level(&query[open + 1..close], b',')
        .into_iter()
        .map(|name| {
            let name = unquote_ident(name);
            match &table {
                Some(t) if t.column(name).is_some() => format!("{}_{}", t.name, name),
                _ => name.to_string(),
            }
        })
        .collect();

    let mut out = query.to_string();
    out.replace_range(range.start..close + 1, &format!("WITH (INDEX({}))", indexes.join(",")));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Statement;
    use crate::schema::SchemaMap;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn general(query: &str) -> String {
        general_with(&Translator::new(Arc::new(SchemaMap::new())), query)
    }

    fn general_with(translator: &Translator, query: &str) -> String {
        let mut state = TranslationState::new(&Statement::new(query), None, true);
        translate_general(translator, &mut state, query).unwrap_or_else(|| query.to_string())
    }

    #[test]
    fn test_server_info() {
        assert_eq!(general("SELECT VERSION()"), "SELECT @@VERSION");
        assert_eq!(general("SHOW VARIABLES LIKE 'sql_mode'"), "");
        assert_eq!(general("SET NAMES 'utf8'"), "");
        assert_eq!(
            general("INSERT INTO t (a) VALUES (1); SELECT LAST_INSERT_ID()"),
            "INSERT INTO t (a) VALUES (1); SELECT @@IDENTITY"
        );
    }

    #[test]
    fn test_show_commands() {
        assert_eq!(general("show tables;"), SHOW_TABLES);
        assert_eq!(
            general("SHOW TABLES LIKE 'wp_posts'"),
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME LIKE 'wp_posts'"
        );
        assert_eq!(
            general("SHOW COLUMNS FROM `wp_users`"),
            "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = 'wp_users'"
        );
    }

    #[test]
    fn test_backticks_and_drop() {
        assert_eq!(general("DROP TABLE IF EXISTS `wp_links`"), "DROP TABLE wp_links");
        assert_eq!(
            general("SELECT `a` FROM t WHERE b = 'x`y'"),
            "SELECT a FROM t WHERE b = 'x`y'"
        );
    }

    #[test]
    fn test_count_computed() {
        assert_eq!(general("SELECT COUNT(*) FROM t"), "SELECT COUNT(*) as Computed FROM t");
        assert_eq!(general("select count(1) from t"), "select count(1) as Computed from t");
        assert_eq!(general("SELECT COUNT(*) AS n FROM t"), "SELECT COUNT(*) AS n FROM t");
        let once = general("SELECT COUNT(*) FROM t");
        assert_eq!(general(&once), once);
    }

    #[test]
    fn test_use_index() {
        let schema = Arc::new(SchemaMap::new());
        schema.update_for("CREATE TABLE wp_posts (ID bigint, post_type varchar(20))");
        let translator = Translator::new(schema);
        assert_eq!(
            general_with(&translator, "SELECT * FROM wp_posts USE INDEX (post_type, type_status) WHERE 1=1"),
            "SELECT * FROM wp_posts WITH (INDEX(wp_posts_post_type,type_status)) WHERE 1=1"
        );
    }
}
