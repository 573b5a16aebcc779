//! MySQL to T-SQL statement translation.
//!
//! A statement is bound, classified and pushed through [`Pass::PIPELINE`].
//! Each pass looks for one construct and rewrites it in place. There is no
//! AST: passes search the statement text (over a literal mask, see
//! [`crate::scan`]) and edit byte ranges.
//!
//! ```
//! use sqlshift::prelude::*;
//!
//! let translator = Translator::new(SchemaMap::new().into());
//! let outcome = translator.translate(&Statement::new("SELECT * FROM wp_posts LIMIT 10"), None);
//! assert_eq!(outcome.main, vec!["SELECT TOP 10 * FROM wp_posts"]);
//! ```

mod create;
mod functions;
mod general;
mod identity;
mod insert;
mod limit;
mod ordering;
mod pass;
mod predicates;
mod rowcount;
mod state;
mod verify;

pub use pass::Pass;
pub use state::TranslationState;

use serde::Serialize;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::TranslatorConfig;
use crate::params::{Statement, StatementKind};
use crate::scan::normalize_escapes;
use crate::schema::SchemaMap;

/// When a following statement runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPolicy {
    /// Runs even when a main statement failed (session cleanup).
    Always,
    /// Runs only after every main statement succeeded.
    OnSuccess,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowingStatement {
    pub sql: String,
    pub policy: RunPolicy,
}

/// Rows to keep from a result set whose LIMIT offset could not be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SliceWindow {
    pub from: usize,
    pub count: usize,
}

/// A pass that changed the statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassRecord {
    pub pass: Pass,
    pub before: String,
    pub after: String,
}

/// Everything the executor needs to run one translated statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationOutcome {
    pub kind: StatementKind,
    pub preceding: Vec<String>,
    /// Never empty. More than one entry only for an exploded multi-row INSERT.
    pub main: Vec<String>,
    pub following: Vec<FollowingStatement>,
    pub slice: Option<SliceWindow>,
    pub trace: Vec<PassRecord>,
}

impl TranslationOutcome {
    /// Every statement in execution order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.preceding
            .iter()
            .map(String::as_str)
            .chain(self.main.iter().map(String::as_str))
            .chain(self.following.iter().map(|f| f.sql.as_str()))
    }

    /// The statement to remember as "previous" on the session.
    pub fn last_main(&self) -> Option<&str> {
        self.main.iter().rev().find(|m| !m.is_empty()).map(String::as_str)
    }
}

/// Rewrites MySQL statements into T-SQL.
#[derive(Clone)]
pub struct Translator {
    schema: Arc<SchemaMap>,
    config: TranslatorConfig,
    clock: Arc<dyn Clock>,
}

impl Translator {
    pub fn new(schema: Arc<SchemaMap>) -> Self {
        Self::with_config(schema, TranslatorConfig::default())
    }

    /// Build a translator; identity columns named in `config` are
    /// registered with the schema map.
    pub fn with_config(schema: Arc<SchemaMap>, config: TranslatorConfig) -> Self {
        for (table, column) in &config.identity_columns {
            schema.register_identity(table, column);
        }
        Self {
            schema,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn schema(&self) -> &Arc<SchemaMap> {
        &self.schema
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Translate one statement.
    ///
    /// `previous` is the last main statement translated on the same session;
    /// only `FOUND_ROWS()` reads it. Translation never fails: input that a
    /// pass cannot make sense of passes through unchanged.
    pub fn translate(&self, statement: &Statement, previous: Option<&str>) -> TranslationOutcome {
        let statement = &Statement {
            text: normalize_escapes(&statement.text),
            ..statement.clone()
        };
        let mut state = TranslationState::new(statement, previous, self.config.verify);
        let mut query = statement.bound_text().trim().to_string();

        if state.serialized {
            tracing::debug!(kind = %state.kind, "serialized arguments, general pass only");
            query = Pass::General.run(self, &mut state, query);
            if state.kind == StatementKind::Insert {
                query = Pass::OnDuplicateKey.run(self, &mut state, query);
            }
            return state.finish(vec![query]);
        }

        for pass in Pass::PIPELINE {
            query = pass.run(self, &mut state, query);
        }

        let mut main = vec![query];
        if state.kind == StatementKind::Insert {
            let query = main.remove(0);
            let query = Pass::OnDuplicateKey.run(self, &mut state, query);
            main = insert::split_insert(&query);
            if main.len() > 1 {
                state.record(Pass::SplitInsert, &query, &main.join(";\n"));
            }
        }

        if state.prepared && state.verify {
            let before = main.join(";\n");
            main = verify::verify(&state, main);
            let after = main.join(";\n");
            if after != before {
                state.record(Pass::Verify, &before, &after);
            }
        }

        state.finish(main)
    }
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator")
            .field("tables", &self.schema.len())
            .field("config", &self.config)
            .finish()
    }
}
