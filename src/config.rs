//! Translator configuration

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ShiftError, ShiftResult};

/// Columns that carry a UNIQUE or KEY declaration in the application's DDL
/// but hold duplicate data in practice. No unique constraint or index is
/// emitted for them.
pub const DEFAULT_NON_UNIQUE_COLUMNS: &[&str] = &[
    "slug",
    "name",
    "term_id",
    "taxonomy",
    "term_taxonomy_id",
    "comment_approved",
    "comment_post_ID",
    "link_visible",
    "post_id",
    "meta_key",
    "post_type",
    "post_status",
    "post_date",
    "ID",
    "post_name",
    "post_parent",
    "user_login",
    "user_nicename",
    "user_id",
];

/// Main translator configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Target is Azure SQL: no filegroup clauses, clustered secondary indexes
    pub azure: bool,

    /// Collation appended to text columns in CREATE TABLE
    pub collation: String,

    /// varchar length used when casting text columns for ORDER BY
    pub sort_cast_length: u32,

    /// Run the verification pass on prepared INSERT/UPDATE statements
    pub verify: bool,

    /// Column names that must be bracketed in DDL
    pub reserved_words: Vec<String>,

    /// Columns never given a unique constraint or index
    pub non_unique_columns: Vec<String>,

    /// Identity columns of tables created outside the translator
    pub identity_columns: BTreeMap<String, String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            azure: false,
            collation: "Latin1_General_BIN".to_string(),
            sort_cast_length: 255,
            verify: true,
            reserved_words: vec!["public".to_string()],
            non_unique_columns: DEFAULT_NON_UNIQUE_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            identity_columns: BTreeMap::new(),
        }
    }
}

impl TranslatorConfig {
    /// Create a new configuration builder
    pub fn builder() -> TranslatorConfigBuilder {
        TranslatorConfigBuilder::default()
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> ShiftResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ShiftResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// `~/.config/sqlshift/config.toml` on Linux, the platform equivalent elsewhere.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sqlshift").join("config.toml"))
    }

    /// Load the default file if it exists, defaults otherwise.
    pub fn load_default() -> ShiftResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn is_reserved(&self, column: &str) -> bool {
        self.reserved_words
            .iter()
            .any(|w| w.eq_ignore_ascii_case(column))
    }

    pub fn is_non_unique(&self, column: &str) -> bool {
        self.non_unique_columns.iter().any(|c| c == column)
    }

    fn validate(&self) -> ShiftResult<()> {
        if self.sort_cast_length == 0 || self.sort_cast_length > 8000 {
            return Err(ShiftError::Config(format!(
                "sort_cast_length must be between 1 and 8000, got {}",
                self.sort_cast_length
            )));
        }
        if self.collation.trim().is_empty() {
            return Err(ShiftError::Config("collation must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for TranslatorConfig
#[derive(Debug, Default)]
pub struct TranslatorConfigBuilder {
    config: TranslatorConfig,
}

impl TranslatorConfigBuilder {
    /// Target Azure SQL
    pub fn azure(mut self, azure: bool) -> Self {
        self.config.azure = azure;
        self
    }

    /// Set the text column collation
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.config.collation = collation.into();
        self
    }

    /// Set the ORDER BY cast length
    pub fn sort_cast_length(mut self, length: u32) -> Self {
        self.config.sort_cast_length = length;
        self
    }

    /// Enable or disable the verification pass
    pub fn verify(mut self, verify: bool) -> Self {
        self.config.verify = verify;
        self
    }

    /// Add a reserved column name
    pub fn reserved_word(mut self, word: impl Into<String>) -> Self {
        self.config.reserved_words.push(word.into());
        self
    }

    /// Declare the identity column of a table
    pub fn identity(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.config
            .identity_columns
            .insert(table.into(), column.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> TranslatorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = TranslatorConfig::default();
        assert!(!config.azure);
        assert!(config.verify);
        assert_eq!(config.collation, "Latin1_General_BIN");
        assert!(config.is_reserved("PUBLIC"));
        assert!(config.is_non_unique("meta_key"));
        assert!(!config.is_non_unique("option_name"));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = TranslatorConfig::from_toml(
            r#"
            azure = true
            sort_cast_length = 400

            [identity_columns]
            wp_posts = "ID"
            "#,
        )
        .unwrap();
        assert!(config.azure);
        assert_eq!(config.sort_cast_length, 400);
        assert_eq!(config.identity_columns.get("wp_posts").map(String::as_str), Some("ID"));
        assert_eq!(config.collation, "Latin1_General_BIN");
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(matches!(
            TranslatorConfig::from_toml("sort_cast_length = 0"),
            Err(ShiftError::Config(_))
        ));
        assert!(matches!(
            TranslatorConfig::from_toml("azure = \"yes\""),
            Err(ShiftError::Toml(_))
        ));
    }

    #[test]
    fn test_builder() {
        let config = TranslatorConfig::builder()
            .azure(true)
            .verify(false)
            .identity("wp_terms", "term_id")
            .build();
        assert!(config.azure);
        assert!(!config.verify);
        assert_eq!(config.identity_columns.len(), 1);
    }
}
