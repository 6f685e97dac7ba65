use super::{CommandBuilder, CommandKind, CommandPlan, PreparedCommand, RawArguments};
use crate::argument::Argument;
use crate::builder::DesiredColumns;
use crate::data_source::DataSource;
use crate::dialect::Dialect;
use crate::error::{ChainError, ChainResult};

/// Raw SQL with an optional argument.
///
/// Object members (or map entries, in key order) become parameters in that
/// order. Named dialects send them under the member name, so the SQL refers
/// to `@Name`; PostgreSQL refers to them as `$1`, `$2`, ...
#[derive(Debug)]
pub struct SqlCall<'a, D: Dialect> {
    source: &'a DataSource<D>,
    sql: String,
    arguments: RawArguments,
}

impl<'a, D: Dialect> SqlCall<'a, D> {
    pub(crate) fn new(
        source: &'a DataSource<D>,
        sql: String,
        argument: Option<Argument<'a>>,
    ) -> Self {
        Self {
            source,
            sql,
            arguments: argument.map(RawArguments::from_argument).unwrap_or_default(),
        }
    }
}

impl<D: Dialect> CommandBuilder<D> for SqlCall<'_, D> {
    /// The SQL is sent as written; `desired` is not applied.
    fn prepare(&self, _desired: &DesiredColumns) -> ChainResult<PreparedCommand<D>> {
        if self.sql.trim().is_empty() {
            return Err(ChainError::ArgumentEmpty("sql"));
        }
        let dialect = self.source.dialect();
        let parameters = self
            .arguments
            .values
            .iter()
            .map(|(name, value)| dialect.make_raw_parameter(name, value.clone()))
            .collect();
        let prepared = PreparedCommand::Single(CommandPlan::new(
            CommandKind::Sql,
            "(sql)",
            self.sql.clone(),
            parameters,
        ));
        self.source.log(&prepared);
        Ok(prepared)
    }
}
