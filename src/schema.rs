//! Schema side-table built by watching CREATE and ALTER statements.
//!
//! The translator has no catalog access, so it remembers the column types it
//! has seen declared. Lookups are cheap reads; every table update builds a
//! complete [`TableSchema`] first and swaps it in under the write lock, so a
//! reader sees either the old column list or the new one.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::opt,
    sequence::delimited,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::scan::{
    find_keyword, find_matching_close, find_words, is_ident_byte, mask_literals, normalize_escapes,
    split_top_level, starts_with_ci, unquote_ident,
};

/// Coarse classification of a declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeClass {
    /// Unbounded text (`text`, `longtext`, ...).
    Text,
    /// Dates and times.
    Date,
    Integer,
    /// Bounded strings (`varchar`, `char`, string enums).
    String,
    Decimal,
    Binary,
    Other,
}

impl TypeClass {
    /// Classify a type token such as `varchar` or `bigint`. `args` is the
    /// text between the type's parentheses, used for `enum(...)`.
    pub fn classify(type_name: &str, args: Option<&str>) -> Self {
        match type_name.to_ascii_lowercase().as_str() {
            "text" | "tinytext" | "mediumtext" | "longtext" | "ntext" => Self::Text,
            "date" | "datetime" | "datetime2" | "timestamp" | "time" | "year" => Self::Date,
            "int" | "integer" | "tinyint" | "smallint" | "mediumint" | "bigint" | "bit" => {
                Self::Integer
            }
            "char" | "varchar" | "nchar" | "nvarchar" | "set" => Self::String,
            "decimal" | "numeric" | "float" | "double" | "real" => Self::Decimal,
            "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => {
                Self::Binary
            }
            "enum" => match args {
                Some(members) if enum_is_integral(members) => Self::Integer,
                _ => Self::String,
            },
            _ => Self::Other,
        }
    }
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Date => "date",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Decimal => "decimal",
            Self::Binary => "binary",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

impl FromStr for TypeClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "date" => Ok(Self::Date),
            "integer" | "int" => Ok(Self::Integer),
            "string" => Ok(Self::String),
            "decimal" => Ok(Self::Decimal),
            "binary" => Ok(Self::Binary),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown type class '{other}'")),
        }
    }
}

/// True when every member of an `enum(...)` list is an integer.
pub fn enum_is_integral(members: &str) -> bool {
    split_top_level(members, b',').iter().all(|m| {
        let value = m.trim().trim_matches(|c| c == '\'' || c == '"').trim();
        !value.is_empty() && value.parse::<i64>().is_ok()
    })
}

/// What the map knows about one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMeta {
    /// Declared type as written, lowercased, without arguments.
    pub sql_type: String,
    pub class: TypeClass,
    pub nullable: bool,
    /// Declared `AUTO_INCREMENT` / `IDENTITY`.
    pub identity: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    pub meta: ColumnMeta,
}

/// Columns of a single table, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    /// Columns carrying a single-column UNIQUE key.
    pub unique: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| &c.meta)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// The declared identity column, if any.
    pub fn identity_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.meta.identity)
            .map(|c| c.name.as_str())
    }

    /// True when `column` alone identifies a row.
    pub fn is_key_column(&self, column: &str) -> bool {
        let single_pk = self.primary_key.len() == 1 && self.primary_key[0].eq_ignore_ascii_case(column);
        single_pk || self.unique.iter().any(|u| u.eq_ignore_ascii_case(column))
    }

    fn upsert(&mut self, def: ColumnDef) {
        match self
            .columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(&def.name))
        {
            Some(existing) => *existing = def,
            None => self.columns.push(def),
        }
    }

    fn remove(&mut self, column: &str) {
        self.columns.retain(|c| !c.name.eq_ignore_ascii_case(column));
        self.primary_key.retain(|c| !c.eq_ignore_ascii_case(column));
        self.unique.retain(|c| !c.eq_ignore_ascii_case(column));
    }
}

/// A `table.column` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Process-wide table → column → type map.
#[derive(Debug, Default)]
pub struct SchemaMap {
    tables: RwLock<HashMap<String, Arc<TableSchema>>>,
    identities: RwLock<HashMap<String, String>>,
}

impl SchemaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn from a CREATE TABLE or ALTER TABLE statement.
    ///
    /// Returns the name of the table whose entry was replaced, or `None` when
    /// the statement was not understood. Unrecognized column entries are
    /// skipped.
    pub fn update_for(&self, statement: &str) -> Option<String> {
        let statement = normalize_escapes(statement.trim());
        let name = if starts_with_ci(&statement, "CREATE") {
            let table = parse_create(&statement)?;
            let name = table.name.clone();
            tracing::info!(table = %name, columns = table.columns.len(), "schema map updated");
            self.publish(table);
            name
        } else if starts_with_ci(&statement, "ALTER") {
            let (name, clauses) = alter_clauses(&statement)?;
            self.publish_with(&name, |table| apply_alter(table, &clauses));
            name
        } else {
            return None;
        };
        Some(name)
    }

    /// Insert or replace a table entry as one unit.
    pub fn publish(&self, table: TableSchema) {
        let key = table.name.to_ascii_lowercase();
        let table = Arc::new(table);
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, table);
    }

    /// Rebuild one table entry from its current state.
    ///
    /// The write lock is held from the read of the old entry to the insert of
    /// the new one, so concurrent updates to the same table never drop each
    /// other's changes. A missing table starts out empty.
    pub fn publish_with(&self, name: &str, update: impl FnOnce(&mut TableSchema)) {
        let key = name.to_ascii_lowercase();
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let mut table = tables
            .get(&key)
            .map(|t| (**t).clone())
            .unwrap_or_else(|| TableSchema::new(name));
        update(&mut table);
        tracing::info!(table = %table.name, columns = table.columns.len(), "schema map updated");
        tables.insert(key, Arc::new(table));
    }

    pub fn table(&self, name: &str) -> Option<Arc<TableSchema>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    /// Every known table, sorted by name.
    pub fn tables(&self) -> Vec<Arc<TableSchema>> {
        let mut tables: Vec<_> = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }

    pub fn lookup(&self, table: &str, column: &str) -> Option<ColumnMeta> {
        self.table(table)?.column(column).cloned()
    }

    /// Every column of the given class across all known tables.
    pub fn by_type(&self, class: TypeClass) -> BTreeSet<ColumnRef> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .flat_map(|t| {
                t.columns
                    .iter()
                    .filter(move |c| c.meta.class == class)
                    .map(move |c| ColumnRef {
                        table: t.name.clone(),
                        column: c.name.clone(),
                    })
            })
            .collect()
    }

    /// Declare an identity column the statements never created, e.g. for a
    /// database that existed before the translator ran.
    pub fn register_identity(&self, table: &str, column: &str) {
        self.identities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.to_ascii_lowercase(), column.to_string());
    }

    /// Registered identity column first, then the one declared in DDL.
    pub fn identity_column(&self, table: &str) -> Option<String> {
        let registered = self
            .identities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&table.to_ascii_lowercase())
            .cloned();
        registered.or_else(|| {
            self.table(table)
                .and_then(|t| t.identity_column().map(str::to_string))
        })
    }

    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse a quoted or bare identifier.
fn identifier(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('`'), take_while1(|c: char| c != '`'), char('`')),
        delimited(char('['), take_while1(|c: char| c != ']'), char(']')),
        delimited(char('"'), take_while1(|c: char| c != '"'), char('"')),
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$'),
    ))(input)
}

/// `name type[(args)] rest...`
fn column_definition(input: &str) -> IResult<&str, (&str, &str, Option<&str>)> {
    let (input, _) = multispace0(input)?;
    let (input, name) = identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, type_name) = take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, args) = opt(delimited(char('('), take_while(|c: char| c != ')'), char(')')))(input)?;
    Ok((input, (name, type_name, args)))
}

const CONSTRAINT_PREFIXES: &[&str] = &[
    "PRIMARY", "UNIQUE", "KEY", "INDEX", "FULLTEXT", "SPATIAL", "CONSTRAINT", "FOREIGN", "CHECK",
];

/// Parse one column entry of a column list.
pub fn parse_column(entry: &str) -> Option<ColumnDef> {
    let trimmed = entry.trim();
    if CONSTRAINT_PREFIXES
        .iter()
        .any(|p| find_keyword(trimmed, p, 0) == Some(0))
    {
        return None;
    }
    let (rest, (name, type_name, args)) = column_definition(trimmed).ok()?;
    let rest_upper = rest.to_ascii_uppercase();
    Some(ColumnDef {
        name: name.to_string(),
        meta: ColumnMeta {
            sql_type: type_name.to_ascii_lowercase(),
            class: TypeClass::classify(type_name, args),
            nullable: !rest_upper.contains("NOT NULL"),
            identity: rest_upper.contains("AUTO_INCREMENT") || rest_upper.contains("IDENTITY"),
        },
    })
}

/// Column names listed in the first parenthesized group of a key entry,
/// with prefix lengths such as `meta_key(191)` removed.
pub fn key_columns(entry: &str) -> Vec<String> {
    let masked = mask_literals(entry);
    let Some(open) = masked.find('(') else {
        return Vec::new();
    };
    let Some(close) = find_matching_close(&masked, open) else {
        return Vec::new();
    };
    split_top_level(&entry[open + 1..close], b',')
        .into_iter()
        .map(|c| {
            let c = c.trim();
            let c = c.split('(').next().unwrap_or(c);
            unquote_ident(c).to_string()
        })
        .filter(|c| !c.is_empty())
        .collect()
}

/// Table name following `TABLE` (and an optional `IF [NOT] EXISTS`).
/// Returns the name and the byte offset just past it.
pub fn table_name_after(statement: &str, keyword_end: usize) -> Option<(String, usize)> {
    let masked = mask_literals(statement);
    let mut cursor = keyword_end;
    for words in [&["IF", "NOT", "EXISTS"][..], &["IF", "EXISTS"][..]] {
        if let Some(range) = find_words(&masked, words, cursor) {
            if masked[cursor..range.start].trim().is_empty() {
                cursor = range.end;
            }
        }
    }
    let bytes = statement.as_bytes();
    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
        cursor += 1;
    }
    let start = cursor;
    while cursor < bytes.len()
        && (is_ident_byte(bytes[cursor]) || matches!(bytes[cursor], b'`' | b'[' | b']' | b'.' | b'"' | b'$'))
    {
        cursor += 1;
    }
    let name = unquote_ident(&statement[start..cursor]);
    (!name.is_empty()).then(|| (name.to_string(), cursor))
}

fn parse_create(statement: &str) -> Option<TableSchema> {
    let masked = mask_literals(statement);
    let table_kw = find_keyword(&masked, "TABLE", 0)?;
    let (name, after_name) = table_name_after(statement, table_kw + "TABLE".len())?;
    let open = after_name + masked[after_name..].find('(')?;
    let close = find_matching_close(&masked, open)?;

    let mut table = TableSchema::new(name);
    for entry in split_top_level(&statement[open + 1..close], b',') {
        let entry = entry.trim();
        if find_words(entry, &["PRIMARY", "KEY"], 0).is_some_and(|r| r.start == 0) {
            table.primary_key = key_columns(entry);
        } else if find_keyword(entry, "UNIQUE", 0) == Some(0) {
            if let [single] = key_columns(entry).as_slice() {
                table.unique.push(single.clone());
            }
        } else if find_keyword(entry, "CONSTRAINT", 0) == Some(0) {
            if let Some(pk) = find_words(entry, &["PRIMARY", "KEY"], 0) {
                table.primary_key = key_columns(&entry[pk.end..]);
            } else if let Some(unique) = find_keyword(entry, "UNIQUE", 0) {
                if let [single] = key_columns(&entry[unique..]).as_slice() {
                    table.unique.push(single.clone());
                }
            }
        } else if let Some(def) = parse_column(entry) {
            if find_words(entry, &["PRIMARY", "KEY"], 0).is_some() {
                table.primary_key = vec![def.name.clone()];
            }
            table.upsert(def);
        }
    }
    Some(table)
}

/// One understood clause of an ALTER TABLE statement.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AlterClause {
    Upsert(ColumnDef),
    Rename { from: String, def: ColumnDef },
    Drop(String),
}

fn alter_clauses(statement: &str) -> Option<(String, Vec<AlterClause>)> {
    let masked = mask_literals(statement);
    let table_kw = find_keyword(&masked, "TABLE", 0)?;
    let (name, after_name) = table_name_after(statement, table_kw + "TABLE".len())?;

    let mut clauses = Vec::new();
    for clause in split_top_level(&statement[after_name..], b',') {
        let clause = clause.trim().trim_end_matches(';');
        let mut words = clause.splitn(2, char::is_whitespace);
        let verb = words.next().unwrap_or_default().to_ascii_uppercase();
        let mut rest = words.next().unwrap_or_default().trim_start();
        if find_keyword(rest, "COLUMN", 0) == Some(0) {
            rest = rest["COLUMN".len()..].trim_start();
        }
        match verb.as_str() {
            "ADD" | "MODIFY" => {
                if let Some(def) = parse_column(rest) {
                    clauses.push(AlterClause::Upsert(def));
                }
            }
            "CHANGE" => {
                if let Ok((remaining, old)) = identifier(rest) {
                    if let Some(def) = parse_column(remaining) {
                        clauses.push(AlterClause::Rename {
                            from: old.to_string(),
                            def,
                        });
                    }
                }
            }
            "DROP" => {
                if let Ok((_, column)) = identifier(rest) {
                    let is_keyword = ["PRIMARY", "INDEX", "KEY", "FOREIGN"]
                        .iter()
                        .any(|k| column.eq_ignore_ascii_case(k));
                    if !is_keyword {
                        clauses.push(AlterClause::Drop(column.to_string()));
                    }
                }
            }
            _ => {}
        }
    }
    Some((name, clauses))
}

fn apply_alter(table: &mut TableSchema, clauses: &[AlterClause]) {
    for clause in clauses {
        match clause {
            AlterClause::Upsert(def) => table.upsert(def.clone()),
            AlterClause::Rename { from, def } => {
                match table
                    .columns
                    .iter_mut()
                    .find(|c| c.name.eq_ignore_ascii_case(from))
                {
                    Some(existing) => *existing = def.clone(),
                    None => table.upsert(def.clone()),
                }
            }
            AlterClause::Drop(column) => table.remove(column),
        }
    }
}
