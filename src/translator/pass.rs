//! The fixed pass pipeline.

use serde::Serialize;
use std::fmt;

use super::state::TranslationState;
use super::{create, functions, general, identity, insert, limit, ordering, predicates, rowcount};
use super::Translator;

/// One rewrite step. Every pass returns its input unchanged when its
/// trigger is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    General,
    IdentityInsert,
    IdentityUpdate,
    DateArithmetic,
    ConditionalUnwrap,
    RowCount,
    Limit,
    NowFunctions,
    DistinctOrderBy,
    SortCast,
    EscapedWildcard,
    GroupByElision,
    NullDatetime,
    IncompatibleOperator,
    CreateTable,
    OnDuplicateKey,
    SplitInsert,
    Verify,
}

impl Pass {
    /// Order in which string passes run over a non-serialized statement.
    pub const PIPELINE: [Pass; 15] = [
        Pass::General,
        Pass::IdentityInsert,
        Pass::IdentityUpdate,
        Pass::DateArithmetic,
        Pass::ConditionalUnwrap,
        Pass::RowCount,
        Pass::Limit,
        Pass::NowFunctions,
        Pass::DistinctOrderBy,
        Pass::SortCast,
        Pass::EscapedWildcard,
        Pass::GroupByElision,
        Pass::NullDatetime,
        Pass::IncompatibleOperator,
        Pass::CreateTable,
    ];

    /// Every pass, pipeline first, then the INSERT/UPDATE finishers.
    pub const ALL: [Pass; 18] = [
        Pass::General,
        Pass::IdentityInsert,
        Pass::IdentityUpdate,
        Pass::DateArithmetic,
        Pass::ConditionalUnwrap,
        Pass::RowCount,
        Pass::Limit,
        Pass::NowFunctions,
        Pass::DistinctOrderBy,
        Pass::SortCast,
        Pass::EscapedWildcard,
        Pass::GroupByElision,
        Pass::NullDatetime,
        Pass::IncompatibleOperator,
        Pass::CreateTable,
        Pass::OnDuplicateKey,
        Pass::SplitInsert,
        Pass::Verify,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Pass::General => "general",
            Pass::IdentityInsert => "identity_insert",
            Pass::IdentityUpdate => "identity_update",
            Pass::DateArithmetic => "date_arithmetic",
            Pass::ConditionalUnwrap => "conditional_unwrap",
            Pass::RowCount => "row_count",
            Pass::Limit => "limit",
            Pass::NowFunctions => "now_functions",
            Pass::DistinctOrderBy => "distinct_order_by",
            Pass::SortCast => "sort_cast",
            Pass::EscapedWildcard => "escaped_wildcard",
            Pass::GroupByElision => "group_by_elision",
            Pass::NullDatetime => "null_datetime",
            Pass::IncompatibleOperator => "incompatible_operator",
            Pass::CreateTable => "create_table",
            Pass::OnDuplicateKey => "on_duplicate_key",
            Pass::SplitInsert => "split_insert",
            Pass::Verify => "verify",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Pass::General => "server info, SHOW/SET commands, backticks, COUNT(*) aliasing",
            Pass::IdentityInsert => "toggle IDENTITY_INSERT around inserts into identity columns",
            Pass::IdentityUpdate => "rewrite identity column updates as insert plus delete",
            Pass::DateArithmetic => "DATE_ADD/DATE_SUB to DATEADD",
            Pass::ConditionalUnwrap => "IF() over date arithmetic to CASE WHEN",
            Pass::RowCount => "SQL_CALC_FOUND_ROWS and FOUND_ROWS()",
            Pass::Limit => "LIMIT to TOP or a post-fetch slice",
            Pass::NowFunctions => "NOW(), FROM_UNIXTIME(), UNIX_TIMESTAMP(), DAYOFMONTH()",
            Pass::DistinctOrderBy => "ORDER BY under DISTINCT references select aliases",
            Pass::SortCast => "cast text columns in ORDER BY",
            Pass::EscapedWildcard => "LIKE escapes to bracket classes",
            Pass::GroupByElision => "drop GROUP BY on a single-column key, ORDER BY grouped aliases",
            Pass::NullDatetime => "zero datetimes in INSERT become the current time",
            Pass::IncompatibleOperator => "= and <> against text columns become LIKE",
            Pass::CreateTable => "CREATE TABLE to T-SQL DDL",
            Pass::OnDuplicateKey => "ON DUPLICATE KEY UPDATE to a following UPDATE",
            Pass::SplitInsert => "multi-row INSERT to one statement per row",
            Pass::Verify => "restore bound values a pass altered",
        }
    }

    /// Run a string pass and record the change, if any.
    ///
    /// `SplitInsert` and `Verify` work on the list of main statements and
    /// are driven by [`Translator::translate`] directly; here they are no-ops.
    pub fn run(self, translator: &Translator, state: &mut TranslationState, query: String) -> String {
        let after = match self {
            Pass::General => general::translate_general(translator, state, &query),
            Pass::IdentityInsert => identity::identity_insert(translator, state, &query),
            Pass::IdentityUpdate => identity::identity_update(translator, state, &query),
            Pass::DateArithmetic => functions::date_arithmetic(&query),
            Pass::ConditionalUnwrap => functions::conditional_unwrap(&query),
            Pass::RowCount => rowcount::row_count(state, &query),
            Pass::Limit => limit::translate_limit(state, &query),
            Pass::NowFunctions => functions::now_functions(&query),
            Pass::DistinctOrderBy => ordering::distinct_order_by(&query),
            Pass::SortCast => ordering::sort_cast(translator, &query),
            Pass::EscapedWildcard => predicates::escaped_wildcard(&query),
            Pass::GroupByElision => predicates::group_by_elision(translator, &query),
            Pass::NullDatetime => insert::null_datetime(translator, state, &query),
            Pass::IncompatibleOperator => predicates::incompatible_operator(translator, state, &query),
            Pass::CreateTable => create::create_table(translator, state, &query),
            Pass::OnDuplicateKey => insert::on_duplicate_key(translator, state, &query),
            Pass::SplitInsert | Pass::Verify => return query,
        };
        match after {
            Some(after) if after != query => {
                state.record(self, &query, &after);
                after
            }
            _ => query,
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
