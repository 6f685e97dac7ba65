//! Command builders and their prepared output.
//!
//! A command builder ([`FromTableOrView`], [`InsertObject`], ...) captures an
//! operation and its arguments. [`CommandBuilder::prepare`] clones the cached
//! [`SqlBuilder`](crate::SqlBuilder) template, applies the argument, audit
//! rules and desired columns, and hands it to the [`Dialect`] to write SQL.

mod chain;
mod delete;
mod from;
mod insert;
mod routine;
mod sql_call;
mod update;
mod upsert;

pub use chain::{ChainState, ChainedCommand, StepOutcome};
pub use delete::{DeleteObject, DeleteWithFilter};
pub use from::FromTableOrView;
pub use insert::{InsertObject, InsertOptions};
pub use routine::{ProcedureCall, ScalarFunctionCall, TableFunctionCall};
pub use sql_call::SqlCall;
pub use update::{UpdateObject, UpdateOptions, UpdateSet};
pub use upsert::{UpsertObject, UpsertOptions};

use crate::argument::Argument;
use crate::builder::{DesiredColumns, FilterOptions};
use crate::dialect::Dialect;
use crate::error::{ChainError, ChainResult};
use crate::sort::SortExpression;
use crate::value::Value;
use std::fmt;

/// What a plan does, for logging and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Select,
    Count,
    Insert,
    Update,
    Delete,
    Upsert,
    Procedure,
    TableFunction,
    ScalarFunction,
    IdentityLookup,
    Sql,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandKind::Select => "select",
            CommandKind::Count => "count",
            CommandKind::Insert => "insert",
            CommandKind::Update => "update",
            CommandKind::Delete => "delete",
            CommandKind::Upsert => "upsert",
            CommandKind::Procedure => "procedure",
            CommandKind::TableFunction => "table_function",
            CommandKind::ScalarFunction => "scalar_function",
            CommandKind::IdentityLookup => "identity_lookup",
            CommandKind::Sql => "sql",
        };
        f.write_str(s)
    }
}

/// One SQL statement with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandPlan<P> {
    pub kind: CommandKind,
    /// Table, view or routine the statement targets.
    pub object: String,
    pub sql: String,
    pub parameters: Vec<P>,
}

impl<P> CommandPlan<P> {
    pub fn new(
        kind: CommandKind,
        object: impl Into<String>,
        sql: String,
        parameters: Vec<P>,
    ) -> Self {
        Self {
            kind,
            object: object.into(),
            sql,
            parameters,
        }
    }
}

/// The output of [`CommandBuilder::prepare`].
#[derive(Debug)]
pub enum PreparedCommand<D: Dialect> {
    /// One statement.
    Single(CommandPlan<D::Parameter>),
    /// Statements run in order; the rows of `steps[result]` are the result.
    Sequence {
        steps: Vec<CommandPlan<D::Parameter>>,
        result: usize,
    },
    /// Statements where a later one depends on a value read by an earlier one.
    Chained(ChainedCommand<D>),
}

impl<D: Dialect> PreparedCommand<D> {
    /// The statement to run first.
    pub fn first(&self) -> Option<&CommandPlan<D::Parameter>> {
        match self {
            PreparedCommand::Single(plan) => Some(plan),
            PreparedCommand::Sequence { steps, .. } => steps.first(),
            PreparedCommand::Chained(chain) => chain.current(),
        }
    }

    /// SQL of the first statement.
    pub fn sql(&self) -> &str {
        self.first().map(|p| p.sql.as_str()).unwrap_or("")
    }

    pub fn into_single(self) -> ChainResult<CommandPlan<D::Parameter>> {
        match self {
            PreparedCommand::Single(plan) => Ok(plan),
            other => Err(ChainError::invariant(format!(
                "Expected a single statement, got {}",
                other.describe()
            ))),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            PreparedCommand::Single(_) => "a single statement",
            PreparedCommand::Sequence { .. } => "a statement sequence",
            PreparedCommand::Chained(_) => "a chained command",
        }
    }

    pub(crate) fn log(&self, max_sql_length: Option<usize>) {
        match self {
            PreparedCommand::Single(plan) => crate::logging::log_prepared(plan, max_sql_length),
            PreparedCommand::Sequence { steps, .. } => {
                for plan in steps {
                    crate::logging::log_prepared(plan, max_sql_length);
                }
            }
            PreparedCommand::Chained(chain) => {
                if let Some(plan) = chain.current() {
                    crate::logging::log_prepared(plan, max_sql_length);
                }
            }
        }
    }
}

/// Anything that can be turned into SQL for dialect `D`.
pub trait CommandBuilder<D: Dialect> {
    /// Prepare the statement, reading back `desired` columns where the
    /// operation supports it.
    fn prepare(&self, desired: &DesiredColumns) -> ChainResult<PreparedCommand<D>>;

    /// Prepare without reading anything back.
    fn prepare_non_query(&self) -> ChainResult<PreparedCommand<D>> {
        self.prepare(&DesiredColumns::NoColumns)
    }
}

/// Raw SQL arguments in the order the SQL names them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawArguments {
    pub values: Vec<(String, Value)>,
    /// Number of builder parameters written before the raw SQL.
    pub at: usize,
}

impl RawArguments {
    /// Flatten an argument: object members in declaration order, map entries
    /// in key order.
    pub fn from_argument(argument: Argument<'_>) -> Self {
        let values = match argument {
            Argument::Object(object) => object
                .properties()
                .into_iter()
                .filter(|p| !p.not_mapped)
                .map(|p| (p.mapped_name().to_string(), p.value))
                .collect(),
            Argument::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        };
        Self { values, at: 0 }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Row filter for selects and set-based writes.
#[derive(Debug, Clone, Default)]
pub enum FilterSpec<'a> {
    /// Every row. Set-based writes require this to be explicit.
    #[default]
    None,
    /// Equality filter built from an argument.
    Argument(Argument<'a>, FilterOptions),
    /// Raw predicate text with its own arguments.
    Where { clause: String, arguments: RawArguments },
}

impl FilterSpec<'_> {
    pub fn raw_argument_count(&self) -> usize {
        match self {
            FilterSpec::Where { arguments, .. } => arguments.len(),
            _ => 0,
        }
    }
}

/// `TABLESAMPLE` request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TableSampling {
    Rows { count: u64, seed: Option<u64> },
    Percent { percent: f64, seed: Option<u64> },
}

/// What a select counts instead of returning rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountKind {
    /// `COUNT(*)`
    Rows,
    /// `COUNT(col)`, non-null values of a column
    Column(String),
    /// `COUNT(DISTINCT col)`
    DistinctColumn(String),
}

/// Everything a dialect needs to write a select.
#[derive(Debug, Clone, Default)]
pub struct SelectRequest<'a> {
    pub filter: FilterSpec<'a>,
    pub sort: Vec<SortExpression>,
    pub take: Option<u64>,
    pub skip: Option<u64>,
    pub sampling: Option<TableSampling>,
    pub count: Option<CountKind>,
}
