//! Running prepared commands on PostgreSQL and materializing the results.
//!
//! [`Executor`] drives every shape a command can prepare into: a single
//! statement, a statement sequence, and a chained command whose later steps
//! depend on values read by earlier ones.
//!
//! ```ignore
//! let exec = ds.executor(&client);
//! let employees: Vec<Employee> = exec.to_collection(&ds.from("hr.employee")?.take(10)).await?;
//! let count: i64 = exec.to_scalar(&ds.from("hr.employee")?.as_count()).await?;
//! ```

use crate::argument::ColumnList;
use crate::builder::DesiredColumns;
use crate::client::GenericClient;
use crate::command::{
    ChainState, CommandBuilder, CommandKind, CommandPlan, PreparedCommand, StepOutcome,
};
use crate::config::ChainConfig;
use crate::data_source::DataSource;
use crate::dialect::{Dialect, Postgres};
use crate::error::{ChainError, ChainResult};
use crate::row::{DataTable, FromRow, RowExt};
use crate::value::Value;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, ToSql};

/// Executes commands whose parameters are [`Value`]s.
pub struct Executor<'c, C: GenericClient> {
    client: &'c C,
    timeout: Option<Duration>,
    log_sql_max_length: Option<usize>,
}

impl DataSource<Postgres> {
    /// An executor over `client` using this data source's configuration.
    pub fn executor<'c, C: GenericClient>(&self, client: &'c C) -> Executor<'c, C> {
        Executor::new(client).with_config(self.config())
    }
}

impl<'c, C: GenericClient> Executor<'c, C> {
    pub fn new(client: &'c C) -> Self {
        let defaults = ChainConfig::default();
        Self {
            client,
            timeout: defaults.default_command_timeout,
            log_sql_max_length: defaults.log_sql_max_length,
        }
    }

    pub fn with_config(mut self, config: &ChainConfig) -> Self {
        self.timeout = config.default_command_timeout;
        self.log_sql_max_length = config.log_sql_max_length;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn timed<T>(
        &self,
        future: impl std::future::Future<Output = ChainResult<T>>,
    ) -> ChainResult<T> {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, future).await.map_err(|_| {
                if let Some(cancel_token) = self.client.cancel_token() {
                    tokio::spawn(async move {
                        let _ = cancel_token.cancel_query(tokio_postgres::NoTls).await;
                    });
                }
                ChainError::Timeout(timeout)
            })?,
            None => future.await,
        }
    }

    async fn query_plan(&self, plan: &CommandPlan<Value>) -> ChainResult<Vec<Row>> {
        crate::logging::log_executing(plan, self.log_sql_max_length);
        let params = parameters(plan);
        let start = Instant::now();
        let rows = self.timed(self.client.query(&plan.sql, &params)).await?;
        tracing::trace!(
            target: "sqlchain.sql",
            operation = %plan.kind,
            rows = rows.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "query finished"
        );
        Ok(rows)
    }

    async fn execute_plan(&self, plan: &CommandPlan<Value>) -> ChainResult<u64> {
        crate::logging::log_executing(plan, self.log_sql_max_length);
        let params = parameters(plan);
        let start = Instant::now();
        let affected = self.timed(self.client.execute(&plan.sql, &params)).await?;
        tracing::trace!(
            target: "sqlchain.sql",
            operation = %plan.kind,
            affected,
            elapsed_us = start.elapsed().as_micros() as u64,
            "execute finished"
        );
        Ok(affected)
    }

    /// Run a prepared command to completion and return the rows of its
    /// result statement.
    pub async fn run<D>(&self, prepared: PreparedCommand<D>) -> ChainResult<Vec<Row>>
    where
        D: Dialect<Parameter = Value>,
    {
        match prepared {
            PreparedCommand::Single(plan) => self.query_plan(&plan).await,
            PreparedCommand::Sequence { steps, result } => {
                let mut rows = Vec::new();
                for (i, plan) in steps.iter().enumerate() {
                    if i == result {
                        rows = self.query_plan(plan).await?;
                    } else {
                        self.execute_plan(plan).await?;
                    }
                }
                Ok(rows)
            }
            PreparedCommand::Chained(mut chain) => loop {
                let outcome = match chain.state() {
                    ChainState::Pending(plan) => {
                        StepOutcome::RowsAffected(self.execute_plan(plan).await?)
                    }
                    ChainState::AwaitingScalar(plan) => {
                        let rows = self.query_plan(plan).await?;
                        let identity = match rows.first() {
                            Some(row) => row.value_at(0)?,
                            None => Value::Null,
                        };
                        StepOutcome::Scalar(identity)
                    }
                    ChainState::Complete(Some(plan)) => return self.query_plan(plan).await,
                    ChainState::Complete(None) => return Ok(Vec::new()),
                };
                chain = chain.advance(outcome)?;
            },
        }
    }

    /// Run without reading anything back; returns the number of rows affected.
    pub async fn execute<D>(&self, command: &impl CommandBuilder<D>) -> ChainResult<u64>
    where
        D: Dialect<Parameter = Value>,
    {
        match command.prepare_non_query()? {
            PreparedCommand::Single(plan) => self.execute_plan(&plan).await,
            PreparedCommand::Sequence { steps, .. } => {
                let mut affected = 0;
                for plan in &steps {
                    let count = self.execute_plan(plan).await?;
                    if plan.kind != CommandKind::Select {
                        affected = count;
                    }
                }
                Ok(affected)
            }
            chained @ PreparedCommand::Chained(_) => {
                self.run(chained).await?;
                Ok(1)
            }
        }
    }

    pub async fn to_rows<D>(
        &self,
        command: &impl CommandBuilder<D>,
        desired: &DesiredColumns,
    ) -> ChainResult<Vec<Row>>
    where
        D: Dialect<Parameter = Value>,
    {
        self.run(command.prepare(desired)?).await
    }

    /// First column of the first row. Where the command reads columns back,
    /// the key (or identity) is read.
    pub async fn to_scalar<D, T>(&self, command: &impl CommandBuilder<D>) -> ChainResult<T>
    where
        D: Dialect<Parameter = Value>,
        T: for<'a> FromSql<'a>,
    {
        self.to_optional_scalar(command)
            .await?
            .ok_or_else(|| ChainError::not_found("Expected a scalar value, got no row or NULL"))
    }

    /// Like [`to_scalar`](Self::to_scalar), with `None` for no row or NULL.
    pub async fn to_optional_scalar<D, T>(
        &self,
        command: &impl CommandBuilder<D>,
    ) -> ChainResult<Option<T>>
    where
        D: Dialect<Parameter = Value>,
        T: for<'a> FromSql<'a>,
    {
        let rows = self.to_rows(command, &DesiredColumns::AutoSelect).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let value: Option<T> = row.try_get(0).map_err(|e| {
            let column = row.columns().first().map_or("0", |c| c.name());
            ChainError::decode(column, e.to_string())
        })?;
        Ok(value)
    }

    /// Exactly one row.
    pub async fn to_object<D, T>(&self, command: &impl CommandBuilder<D>) -> ChainResult<T>
    where
        D: Dialect<Parameter = Value>,
        T: FromRow + ColumnList,
    {
        let mut rows = self.to_rows(command, &DesiredColumns::of::<T>()).await?;
        match rows.len() {
            0 => Err(ChainError::not_found("Expected one row, got none")),
            1 => T::from_row(&rows.remove(0)),
            n => Err(ChainError::too_many_rows(1, n)),
        }
    }

    /// Zero or one row.
    pub async fn to_optional_object<D, T>(
        &self,
        command: &impl CommandBuilder<D>,
    ) -> ChainResult<Option<T>>
    where
        D: Dialect<Parameter = Value>,
        T: FromRow + ColumnList,
    {
        let rows = self.to_rows(command, &DesiredColumns::of::<T>()).await?;
        match rows.len() {
            0 => Ok(None),
            1 => T::from_row(&rows[0]).map(Some),
            n => Err(ChainError::too_many_rows(1, n)),
        }
    }

    pub async fn to_collection<D, T>(&self, command: &impl CommandBuilder<D>) -> ChainResult<Vec<T>>
    where
        D: Dialect<Parameter = Value>,
        T: FromRow + ColumnList,
    {
        let rows = self.to_rows(command, &DesiredColumns::of::<T>()).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Rows keyed by `key_column`. A repeated key is an error.
    pub async fn to_dictionary<D, K, T>(
        &self,
        command: &impl CommandBuilder<D>,
        key_column: &str,
    ) -> ChainResult<HashMap<K, T>>
    where
        D: Dialect<Parameter = Value>,
        K: for<'a> FromSql<'a> + Eq + Hash + std::fmt::Debug,
        T: FromRow + ColumnList,
    {
        let mut columns: Vec<String> = T::column_names().into_iter().map(str::to_string).collect();
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(key_column)) {
            columns.push(key_column.to_string());
        }
        let rows = self.to_rows(command, &DesiredColumns::Named(columns)).await?;

        let mut map = HashMap::with_capacity(rows.len());
        for row in &rows {
            let key: K = row.try_get_column(key_column)?;
            let value = T::from_row(row)?;
            if map.contains_key(&key) {
                return Err(ChainError::InvalidArgument(format!(
                    "Duplicate key {key:?} in column {key_column}"
                )));
            }
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Every column of every row, untyped.
    pub async fn to_table<D>(&self, command: &impl CommandBuilder<D>) -> ChainResult<DataTable>
    where
        D: Dialect<Parameter = Value>,
    {
        let rows = self.to_rows(command, &DesiredColumns::AllColumns).await?;
        DataTable::from_rows(&rows)
    }
}

fn parameters(plan: &CommandPlan<Value>) -> Vec<&(dyn ToSql + Sync)> {
    plan.parameters.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}
