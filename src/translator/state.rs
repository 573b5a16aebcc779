//! Per-call translation context.

use crate::params::{Param, Statement, StatementKind};

use super::pass::Pass;
use super::{FollowingStatement, PassRecord, RunPolicy, SliceWindow, TranslationOutcome};

/// Mutable context threaded through the passes of one `translate` call.
///
/// Built fresh for every call and dropped when the outcome is returned.
#[derive(Debug, Clone)]
pub struct TranslationState {
    pub kind: StatementKind,
    pub prepared: bool,
    pub serialized: bool,
    pub slice: Option<SliceWindow>,
    pub preceding: Vec<String>,
    pub following: Vec<FollowingStatement>,
    /// Cleared by passes whose rewrite replaces the statement's values.
    pub verify: bool,
    /// The previous translated statement on the same session.
    pub previous: Option<String>,
    /// Statement text as issued, placeholders unbound.
    pub template: String,
    pub params: Vec<Param>,
    pub trace: Vec<PassRecord>,
}

impl TranslationState {
    pub fn new(statement: &Statement, previous: Option<&str>, verify: bool) -> Self {
        Self {
            kind: statement.kind(),
            prepared: statement.prepared,
            serialized: statement.is_serialized(),
            slice: None,
            preceding: Vec::new(),
            following: Vec::new(),
            verify,
            previous: previous.map(str::to_string),
            template: statement.text.trim().to_string(),
            params: statement.params.clone(),
            trace: Vec::new(),
        }
    }

    pub fn precede(&mut self, sql: impl Into<String>) {
        self.preceding.push(sql.into());
    }

    pub fn follow(&mut self, sql: impl Into<String>, policy: RunPolicy) {
        self.following.push(FollowingStatement {
            sql: sql.into(),
            policy,
        });
    }

    /// Record a pass that changed the statement.
    pub fn record(&mut self, pass: Pass, before: &str, after: &str) {
        tracing::debug!(pass = %pass, "pass rewrote statement");
        tracing::trace!(pass = %pass, before, after);
        self.trace.push(PassRecord {
            pass,
            before: before.to_string(),
            after: after.to_string(),
        });
    }

    pub fn finish(self, main: Vec<String>) -> TranslationOutcome {
        TranslationOutcome {
            kind: self.kind,
            preceding: self.preceding,
            main,
            following: self.following,
            slice: self.slice,
            trace: self.trace,
        }
    }
}
