//! # sqlshift: MySQL statements on SQL Server
//!
//! > **No parser. Just passes.**
//!
//! sqlshift rewrites the MySQL a legacy application issues into T-SQL that
//! SQL Server accepts, one statement at a time, and runs the result through
//! a caller-supplied executor.
//!
//! ## Quick Example
//!
//! ```
//! use sqlshift::prelude::*;
//!
//! let schema = std::sync::Arc::new(SchemaMap::new());
//! let translator = Translator::new(schema);
//!
//! let outcome = translator.translate(
//!     &Statement::new("SELECT `ID` FROM wp_posts WHERE post_date > DATE_SUB(NOW(), INTERVAL 1 DAY) LIMIT 5"),
//!     None,
//! );
//! assert_eq!(
//!     outcome.main,
//!     vec!["SELECT TOP 5 ID FROM wp_posts WHERE post_date > DATEADD(DAY, -1, getdate())"]
//! );
//! ```
//!
//! ## Modules
//!
//! | Module         | Role                                             |
//! |----------------|--------------------------------------------------|
//! | [`scan`]       | Literal mask, paren matching, top-level splits   |
//! | [`schema`]     | Column types learned from CREATE/ALTER           |
//! | [`params`]     | Statements, parameters, placeholder binding      |
//! | [`translator`] | The pass pipeline                                |
//! | [`normalize`]  | Row fix-ups and LIMIT offset slicing             |
//! | [`engine`]     | Sessions and the executor seam                   |

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod params;
pub mod scan;
pub mod schema;
pub mod translator;

pub mod prelude {
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::config::TranslatorConfig;
    pub use crate::engine::{DryRun, QueryResult, Session, StatementExecutor};
    pub use crate::error::*;
    pub use crate::normalize::Row;
    pub use crate::params::{Param, Statement, StatementKind};
    pub use crate::schema::{SchemaMap, TypeClass};
    pub use crate::translator::{
        FollowingStatement, Pass, RunPolicy, SliceWindow, TranslationOutcome, Translator,
    };
}

/// Translate one statement with a fresh, empty schema map.
///
/// # Example
///
/// ```
/// let sql = sqlshift::translate("SELECT COUNT(*) FROM wp_users");
/// assert_eq!(sql, vec!["SELECT COUNT(*) as Computed FROM wp_users"]);
/// ```
pub fn translate(sql: &str) -> Vec<String> {
    let translator = translator::Translator::new(std::sync::Arc::new(schema::SchemaMap::new()));
    translator.translate(&params::Statement::new(sql), None).main
}
