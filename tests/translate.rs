use pretty_assertions::assert_eq;
use sqlshift::prelude::*;
use std::sync::Arc;

const WP_POSTS: &str = "CREATE TABLE wp_posts (
 ID bigint(20) unsigned NOT NULL auto_increment,
 post_author bigint(20) unsigned NOT NULL default '0',
 post_date datetime NOT NULL default '0000-00-00 00:00:00',
 post_date_gmt datetime NOT NULL default '0000-00-00 00:00:00',
 post_content longtext NOT NULL,
 post_title text NOT NULL,
 post_status varchar(20) NOT NULL default 'publish',
 menu_order int(11) NOT NULL default '0',
 PRIMARY KEY  (ID),
 KEY post_author (post_author)
) DEFAULT CHARACTER SET utf8";

fn translator() -> Translator {
    Translator::new(Arc::new(SchemaMap::new()))
}

fn wordpress() -> Translator {
    let t = translator();
    t.translate(&Statement::new(WP_POSTS), None);
    t
}

fn main_of(t: &Translator, sql: &str) -> Vec<String> {
    t.translate(&Statement::new(sql), None).main
}

#[test]
fn test_limit_forms() {
    let t = translator();
    let outcome = t.translate(&Statement::new("SELECT * FROM t LIMIT 10"), None);
    assert_eq!(outcome.main, vec!["SELECT TOP 10 * FROM t"]);
    assert_eq!(outcome.slice, None);

    let outcome = t.translate(&Statement::new("SELECT * FROM t LIMIT 5,10"), None);
    assert_eq!(outcome.main, vec!["SELECT * FROM t"]);
    assert_eq!(outcome.slice, Some(SliceWindow { from: 5, count: 10 }));
}

#[test]
fn test_multi_row_insert_exploded() {
    let outcome = translator().translate(&Statement::new("INSERT INTO t (a) VALUES (1),(2),(3)"), None);
    assert_eq!(
        outcome.main,
        vec![
            "INSERT INTO t (a) VALUES (1)",
            "INSERT INTO t (a) VALUES (2)",
            "INSERT INTO t (a) VALUES (3)"
        ]
    );
    assert_eq!(outcome.trace.last().map(|r| r.pass), Some(Pass::SplitInsert));
}

#[test]
fn test_bound_keywords_survive() {
    let t = wordpress();
    let statement = Statement::new("INSERT INTO wp_posts (post_author, post_title) VALUES (%d, %s)")
        .bind(1)
        .bind("order by");
    assert_eq!(
        t.translate(&statement, None).main,
        vec!["INSERT INTO wp_posts (post_author, post_title) VALUES (1, 'order by')"]
    );

    let statement = Statement::new("UPDATE wp_posts SET post_title = ? WHERE ID = ?")
        .bind("NOW() LIMIT 1 `x`")
        .bind(7);
    assert_eq!(
        t.translate(&statement, None).main,
        vec!["UPDATE wp_posts SET post_title = 'NOW() LIMIT 1 `x`' WHERE ID = '7'"]
    );
}

#[test]
fn test_schema_learned_from_create() {
    let t = translator();
    t.translate(&Statement::new("CREATE TABLE t (c text, e enum('1','2','3'), f enum('a','b'))"), None);
    let text = t.schema().by_type(TypeClass::Text);
    assert!(text.iter().any(|r| r.table == "t" && r.column == "c"));
    assert_eq!(
        main_of(&t, "SELECT * FROM t WHERE t.c = 'x'"),
        vec!["SELECT * FROM t WHERE t.c LIKE 'x'"]
    );
}

#[test]
fn test_enum_columns() {
    let out = main_of(&translator(), "CREATE TABLE e (a enum('1','2','3'), b enum('a','b'))");
    assert_eq!(
        out,
        vec!["CREATE TABLE e (\n  a smallint,\n  b varchar(255) COLLATE Latin1_General_BIN\n);"]
    );
}

#[test]
fn test_text_columns_in_select() {
    let t = wordpress();
    assert_eq!(
        main_of(
            &t,
            "SELECT * FROM wp_posts WHERE post_title = 'x' AND post_status = 'publish' ORDER BY post_title LIMIT 1"
        ),
        vec![
            "SELECT TOP 1 * FROM wp_posts WHERE post_title LIKE 'x' AND post_status = 'publish' \
             ORDER BY cast(post_title as varchar(255))"
        ]
    );
}

#[test]
fn test_group_by_primary_key_dropped() {
    let t = wordpress();
    assert_eq!(
        main_of(
            &t,
            "SELECT wp_posts.* FROM wp_posts WHERE 1=1 GROUP BY wp_posts.ID ORDER BY wp_posts.post_date DESC LIMIT 0, 10"
        ),
        vec!["SELECT TOP 10 wp_posts.* FROM wp_posts WHERE 1=1 ORDER BY wp_posts.post_date DESC"]
    );
}

#[test]
fn test_identity_insert_wraps_statement() {
    let t = wordpress();
    let outcome = t.translate(
        &Statement::new("INSERT INTO wp_posts (ID, post_title) VALUES (%d, %s)").bind(12).bind("Hello"),
        None,
    );
    assert_eq!(outcome.preceding, vec!["SET IDENTITY_INSERT wp_posts ON"]);
    assert_eq!(outcome.main, vec!["INSERT INTO wp_posts (ID, post_title) VALUES (12, 'Hello')"]);
    assert_eq!(
        outcome.following,
        vec![FollowingStatement {
            sql: "SET IDENTITY_INSERT wp_posts OFF".to_string(),
            policy: RunPolicy::Always,
        }]
    );
}

#[test]
fn test_server_commands() {
    let t = translator();
    assert_eq!(
        main_of(&t, "SHOW TABLES"),
        vec!["SELECT name FROM SYSOBJECTS WHERE TYPE = 'U' ORDER BY NAME"]
    );
    assert_eq!(main_of(&t, "SET NAMES 'utf8'"), vec![""]);
    assert_eq!(main_of(&t, "SELECT LAST_INSERT_ID()"), vec!["SELECT @@IDENTITY"]);
}

#[test]
fn test_escaped_like_pattern() {
    assert_eq!(
        main_of(&translator(), r"SELECT * FROM wp_usermeta WHERE meta_key LIKE 'wp\_%'"),
        vec!["SELECT * FROM wp_usermeta WHERE meta_key LIKE 'wp[_]%'"]
    );
}

#[test]
fn test_translation_idempotent() {
    let t = wordpress();
    let queries = [
        "SELECT * FROM wp_posts WHERE post_title = 'x' ORDER BY post_title LIMIT 3",
        "SELECT COUNT(*) FROM wp_posts WHERE post_date > DATE_SUB(NOW(), INTERVAL 1 DAY)",
        "DELETE FROM wp_posts WHERE post_content != 'x' LIMIT 1",
    ];
    for query in queries {
        let once = main_of(&t, query).remove(0);
        let twice = main_of(&t, &once).remove(0);
        assert_eq!(twice, once, "retranslating {query}");
    }
}

#[test]
fn test_prepared_markers() {
    let statement = Statement::from_marked("SELECT * FROM t WHERE a = 1 --PREPARE");
    assert!(statement.prepared);
    assert!(!statement.is_serialized());
    assert_eq!(
        translator().translate(&statement, None).main,
        vec!["SELECT * FROM t WHERE a = 1"]
    );
}

#[test]
fn test_trailing_backslash_in_bound_values() {
    let t = translator();
    let statement = Statement::new("INSERT INTO t (a, b) VALUES (%s, %s)")
        .bind(r"C:\")
        .bind("NOW()");
    assert_eq!(
        t.translate(&statement, None).main,
        vec![r"INSERT INTO t (a, b) VALUES ('C:\', 'NOW()')"]
    );

    let statement = Statement::new("UPDATE t SET a = %s, b = %s WHERE id = 1")
        .bind(r"x\")
        .bind("DATE_ADD(d, INTERVAL 1 DAY)");
    assert_eq!(
        t.translate(&statement, None).main,
        vec![r"UPDATE t SET a = 'x\', b = 'DATE_ADD(d, INTERVAL 1 DAY)' WHERE id = 1"]
    );

    let statement = Statement::new("SELECT * FROM t WHERE path = %s LIMIT 10").bind(r"C:\dir\");
    assert_eq!(
        t.translate(&statement, None).main,
        vec![r"SELECT TOP 10 * FROM t WHERE path = 'C:\dir\'"]
    );
}

#[test]
fn test_mysql_escaped_quotes_become_doubled() {
    assert_eq!(
        main_of(&translator(), r"INSERT INTO t (a, b) VALUES ('it\'s NOW()', 'C:\\')"),
        vec![r"INSERT INTO t (a, b) VALUES ('it''s NOW()', 'C:\\')"]
    );
}

#[test]
fn test_archives_query_orders_by_aliases() {
    let t = wordpress();
    assert_eq!(
        main_of(
            &t,
            "SELECT YEAR(post_date) AS `year`, MONTH(post_date) AS `month`, count(ID) as posts FROM wp_posts \
             WHERE post_type = 'post' AND post_status = 'publish' \
             GROUP BY YEAR(post_date), MONTH(post_date) ORDER BY post_date DESC"
        ),
        vec![
            "SELECT YEAR(post_date) AS year, MONTH(post_date) AS month, count(ID) as posts FROM wp_posts \
             WHERE post_type = 'post' AND post_status = 'publish' \
             GROUP BY YEAR(post_date), MONTH(post_date) ORDER BY year DESC, month DESC"
        ]
    );
}
