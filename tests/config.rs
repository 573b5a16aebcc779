use pretty_assertions::assert_eq;
use sqlshift::prelude::*;
use std::sync::Arc;

fn translator(toml: &str) -> Translator {
    let config = TranslatorConfig::from_toml(toml).unwrap();
    Translator::with_config(Arc::new(SchemaMap::new()), config)
}

fn main_of(t: &Translator, sql: &str) -> String {
    t.translate(&Statement::new(sql), None).main.remove(0)
}

#[test]
fn test_load_from_file() {
    let path = std::env::temp_dir().join(format!("sqlshift-config-{}.toml", std::process::id()));
    std::fs::write(&path, "collation = \"SQL_Latin1_General_CP1_CI_AS\"\nverify = false\n").unwrap();
    let config = TranslatorConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(config.collation, "SQL_Latin1_General_CP1_CI_AS");
    assert!(!config.verify);
    assert!(matches!(TranslatorConfig::load(&path), Err(ShiftError::Io(_))));
}

#[test]
fn test_collation_and_reserved_words() {
    let t = translator(
        r#"
        azure = true
        collation = "Latin1_General_CI_AS"
        reserved_words = ["public", "order"]
        "#,
    );
    assert_eq!(
        main_of(&t, "CREATE TABLE t (id int NOT NULL, `order` int, title varchar(20), PRIMARY KEY (id))"),
        "CREATE TABLE t (\n  id int NOT NULL,\n  [order] int,\n  title varchar(20) COLLATE Latin1_General_CI_AS,\n  \
         CONSTRAINT [t_id] PRIMARY KEY CLUSTERED (id) WITH (IGNORE_DUP_KEY = OFF)\n);"
    );
}

#[test]
fn test_sort_cast_length() {
    let t = translator("sort_cast_length = 4000");
    t.translate(&Statement::new("CREATE TABLE notes (body text)"), None);
    assert_eq!(
        main_of(&t, "SELECT * FROM notes ORDER BY body"),
        "SELECT * FROM notes ORDER BY cast(body as varchar(4000))"
    );
}

#[test]
fn test_configured_identity_column() {
    let t = translator(
        r#"
        [identity_columns]
        wp_links = "link_id"
        "#,
    );
    t.schema().update_for("CREATE TABLE wp_links (link_id bigint NOT NULL, link_url varchar(255))");
    assert_eq!(t.schema().identity_column("wp_links").as_deref(), Some("link_id"));
    assert_eq!(
        main_of(&t, "SELECT wp_links.* FROM wp_links GROUP BY wp_links.link_id"),
        "SELECT wp_links.* FROM wp_links"
    );
    let outcome = t.translate(
        &Statement::new("INSERT INTO wp_links (link_id, link_url) VALUES (3, 'x')"),
        None,
    );
    assert_eq!(outcome.preceding, vec!["SET IDENTITY_INSERT wp_links ON"]);
}
