//! Multi-statement inserts for dialects without `OUTPUT`/`RETURNING`.
//!
//! The insert runs first; the generated identity is then read with a scalar
//! query and used to select the new row back. Each transition consumes the
//! command and returns the next state, so a step cannot be run twice.

use super::{CommandKind, CommandPlan};
use crate::builder::SqlBuilder;
use crate::dialect::Dialect;
use crate::error::{ChainError, ChainResult};
use crate::ident::ObjectName;
use crate::value::Value;

/// Where a [`ChainedCommand`] is.
#[derive(Debug)]
pub enum ChainState<P> {
    /// The insert has not run yet.
    Pending(CommandPlan<P>),
    /// The insert ran; this plan reads the generated identity.
    AwaitingScalar(CommandPlan<P>),
    /// The identity is known. The plan (if any) reads the new row back.
    Complete(Option<CommandPlan<P>>),
}

/// What running the current step produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    RowsAffected(u64),
    Scalar(Value),
}

/// Insert, then identity lookup, then select-by-identity.
#[derive(Debug)]
pub struct ChainedCommand<D: Dialect> {
    dialect: D,
    builder: SqlBuilder<D::DbType>,
    table: ObjectName,
    identity_sql: String,
    state: ChainState<D::Parameter>,
}

impl<D: Dialect> ChainedCommand<D> {
    pub(crate) fn new(
        dialect: D,
        builder: SqlBuilder<D::DbType>,
        table: ObjectName,
        insert: CommandPlan<D::Parameter>,
        identity_sql: impl Into<String>,
    ) -> Self {
        Self {
            dialect,
            builder,
            table,
            identity_sql: identity_sql.into(),
            state: ChainState::Pending(insert),
        }
    }

    pub fn state(&self) -> &ChainState<D::Parameter> {
        &self.state
    }

    /// The statement to run next, `None` when nothing is left.
    pub fn current(&self) -> Option<&CommandPlan<D::Parameter>> {
        match &self.state {
            ChainState::Pending(plan) | ChainState::AwaitingScalar(plan) => Some(plan),
            ChainState::Complete(plan) => plan.as_ref(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, ChainState::Complete(_))
    }

    /// Feed the outcome of [`current`](Self::current) and move to the next state.
    pub fn advance(self, outcome: StepOutcome) -> ChainResult<Self> {
        let Self {
            dialect,
            mut builder,
            table,
            identity_sql,
            state,
        } = self;
        let object = table.to_string();

        let state = match (state, outcome) {
            (ChainState::Pending(_), StepOutcome::RowsAffected(count)) => {
                if count != 1 {
                    return Err(ChainError::UnexpectedRowCount {
                        expected: 1,
                        got: count,
                    });
                }
                tracing::trace!(
                    target: "sqlchain.chain",
                    object = %object,
                    "insert done, reading identity"
                );
                ChainState::AwaitingScalar(CommandPlan::new(
                    CommandKind::IdentityLookup,
                    object,
                    identity_sql.clone(),
                    Vec::new(),
                ))
            }
            (ChainState::AwaitingScalar(_), StepOutcome::Scalar(identity)) => {
                if identity.is_null() {
                    return Err(ChainError::mapping(
                        &table,
                        "The insert did not produce an identity value",
                    ));
                }
                tracing::trace!(
                    target: "sqlchain.chain",
                    object = %object,
                    identity = ?identity,
                    "identity read"
                );
                let plan = if builder.has_read_fields() {
                    builder.bind_identity_as_key(identity)?;
                    let mut sql = String::new();
                    let quoted = dialect.quote_object(&table);
                    builder.build_select_by_key_statement(&mut sql, &quoted, Some(";"))?;
                    let parameters = dialect.collect_parameters(&builder, None);
                    Some(CommandPlan::new(CommandKind::Select, object, sql, parameters))
                } else {
                    None
                };
                ChainState::Complete(plan)
            }
            (state, outcome) => {
                return Err(ChainError::invariant(format!(
                    "Chained command in state {} cannot accept {outcome:?}",
                    state_name(&state)
                )));
            }
        };

        Ok(Self {
            dialect,
            builder,
            table,
            identity_sql,
            state,
        })
    }
}

fn state_name<P>(state: &ChainState<P>) -> &'static str {
    match state {
        ChainState::Pending(_) => "Pending",
        ChainState::AwaitingScalar(_) => "AwaitingScalar",
        ChainState::Complete(_) => "Complete",
    }
}
