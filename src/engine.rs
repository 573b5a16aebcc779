//! Statement execution for translated queries.
//!
//! A [`Session`] translates each statement and runs what comes out against a
//! caller-supplied [`StatementExecutor`], one connection's worth of state at a
//! time. The executor is the only part that talks to SQL Server.

use std::collections::VecDeque;
use std::future::Future;

use serde::Serialize;

use crate::error::{ShiftError, ShiftResult};
use crate::normalize::{Row, apply_slice, normalize_rows};
use crate::params::Statement;
use crate::translator::{RunPolicy, TranslationOutcome, Translator};

/// What one statement produced on the target engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub rows_affected: u64,
    pub rows: Vec<Row>,
}

/// Runs T-SQL against a live connection.
///
/// Implementations are driven strictly sequentially by a [`Session`].
pub trait StatementExecutor {
    fn run(&mut self, sql: &str) -> impl Future<Output = ShiftResult<QueryResult>> + Send;
}

/// One connection: a translator, an executor and the last statement run.
///
/// # Example
///
/// ```
/// use sqlshift::prelude::*;
///
/// # async fn demo() -> ShiftResult<()> {
/// let translator = Translator::new(SchemaMap::new().into());
/// let mut session = Session::new(translator, DryRun::default());
/// session.query(Statement::new("SELECT * FROM wp_posts LIMIT 5")).await?;
/// assert_eq!(session.executor().statements(), ["SELECT TOP 5 * FROM wp_posts"]);
/// # Ok(())
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(demo()).unwrap();
/// ```
#[derive(Debug)]
pub struct Session<E> {
    translator: Translator,
    executor: E,
    previous: Option<String>,
}

impl<E: StatementExecutor> Session<E> {
    pub fn new(translator: Translator, executor: E) -> Self {
        Self {
            translator,
            executor,
            previous: None,
        }
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Last main statement that ran on this session.
    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    /// Translate without executing, using this session's previous statement.
    pub fn translate(&self, statement: &Statement) -> TranslationOutcome {
        self.translator.translate(statement, self.previous.as_deref())
    }

    /// Translate and execute one statement.
    ///
    /// Preceding statements run first and their failures are only logged.
    /// Main statements all run in order, even after one fails. The
    /// `Always` following statements still run, and the first failure is
    /// returned.
    /// Rows from every main statement are normalized and sliced.
    pub async fn query(&mut self, statement: Statement) -> ShiftResult<QueryResult> {
        let outcome = self.translate(&statement);

        for sql in &outcome.preceding {
            if let Err(e) = self.executor.run(sql).await {
                tracing::warn!(sql = %sql, error = %e, "preceding statement failed");
            }
        }

        let mut result = QueryResult::default();
        let mut failure = None;
        for sql in outcome.main.iter().filter(|m| !m.trim().is_empty()) {
            match self.executor.run(sql).await {
                Ok(r) => {
                    result.rows_affected += r.rows_affected;
                    result.rows.extend(r.rows);
                }
                // Rows of an exploded INSERT are independent; later rows still run.
                Err(e) if failure.is_some() => {
                    tracing::warn!(sql = %sql, error = %e, "statement failed");
                }
                Err(e) => failure = Some((sql.clone(), e)),
            }
        }

        for following in &outcome.following {
            if failure.is_some() && following.policy == RunPolicy::OnSuccess {
                tracing::debug!(sql = %following.sql, "skipped after failed statement");
                continue;
            }
            if let Err(e) = self.executor.run(&following.sql).await {
                tracing::warn!(sql = %following.sql, error = %e, "following statement failed");
            }
        }

        if let Some((sql, e)) = failure {
            return Err(match e {
                ShiftError::Execution { .. } => e,
                other => ShiftError::execution(sql, other.to_string()),
            });
        }

        if let Some(last) = outcome.last_main() {
            self.previous = Some(last.to_string());
        }
        result.rows = apply_slice(normalize_rows(result.rows), outcome.slice);
        Ok(result)
    }
}

/// Executor that records statements instead of running them.
///
/// Results queued with [`DryRun::respond`] are handed out in order, one per
/// statement; once the queue is empty every statement returns an empty
/// result.
#[derive(Debug, Clone, Default)]
pub struct DryRun {
    statements: Vec<String>,
    responses: VecDeque<QueryResult>,
}

impl DryRun {
    pub fn respond(mut self, result: QueryResult) -> Self {
        self.responses.push_back(result);
        self
    }

    /// Every statement run so far, in order.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}

impl StatementExecutor for DryRun {
    async fn run(&mut self, sql: &str) -> ShiftResult<QueryResult> {
        self.statements.push(sql.to_string());
        Ok(self.responses.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaMap;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn session() -> Session<DryRun> {
        Session::new(Translator::new(SchemaMap::new().into()), DryRun::default())
    }

    fn rows(values: serde_json::Value) -> Vec<Row> {
        serde_json::from_value(values).unwrap()
    }

    #[tokio::test]
    async fn test_found_rows_uses_previous_statement() {
        let mut session = session();
        session
            .query(Statement::new("SELECT SQL_CALC_FOUND_ROWS ID FROM wp_posts WHERE a = 1 ORDER BY ID LIMIT 10"))
            .await
            .unwrap();
        session.query(Statement::new("SELECT FOUND_ROWS()")).await.unwrap();
        assert_eq!(
            session.executor().statements(),
            [
                "SELECT TOP 10 * FROM wp_posts WHERE a = 1 ORDER BY ID",
                "SELECT COUNT(1) as Computed FROM wp_posts WHERE a = 1",
            ]
        );
    }

    #[tokio::test]
    async fn test_rows_normalized_and_sliced() {
        let executor = DryRun::default().respond(QueryResult {
            rows_affected: 0,
            rows: rows(json!([{"n": 1}, {"n": 2}, {"n": 3}, {"n": 4}])),
        });
        let mut session = Session::new(Translator::new(SchemaMap::new().into()), executor);
        let result = session
            .query(Statement::new("SELECT n FROM t LIMIT 1, 2"))
            .await
            .unwrap();
        assert_eq!(result.rows, rows(json!([{"n": "2"}, {"n": "3"}])));
        assert_eq!(session.executor().statements(), ["SELECT n FROM t"]);
    }

    #[tokio::test]
    async fn test_empty_main_not_executed() {
        let mut session = session();
        let result = session.query(Statement::new("SET NAMES 'utf8'")).await.unwrap();
        assert_eq!(result, QueryResult::default());
        assert!(session.executor().statements().is_empty());
        assert_eq!(session.previous(), None);
    }
}
