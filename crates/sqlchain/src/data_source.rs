//! The fluent entry point.
//!
//! A [`DataSource`] bundles a dialect, a shared metadata cache, audit rules and
//! configuration. Every fluent method resolves the named object in the cache
//! and returns a command builder; nothing touches the database until the
//! prepared command is executed.
//!
//! ```ignore
//! use sqlchain::{DataSource, DesiredColumns, Postgres, CommandBuilder};
//!
//! let ds = DataSource::new(Postgres).with_config(ChainConfig::new().strict());
//! ds.metadata().register_table(employee_metadata());
//!
//! let insert = ds.insert("HR.Employee", &employee)?;
//! let prepared = insert.prepare(&DesiredColumns::AutoSelect)?;
//! ```

use crate::argument::{Argument, DataObject};
use crate::builder::SqlBuilder;
use crate::command::{
    DeleteObject, DeleteWithFilter, FromTableOrView, InsertObject, PreparedCommand, ProcedureCall,
    ScalarFunctionCall, SqlCall, TableFunctionCall, UpdateObject, UpdateSet, UpsertObject,
};
use crate::config::ChainConfig;
use crate::dialect::Dialect;
use crate::error::ChainResult;
use crate::metadata::{MetadataCache, RoutineKind, RoutineMetadata, TableOrViewMetadata};
use crate::rules::AuditRules;
use std::sync::{Arc, LazyLock};

/// Dialect + metadata + rules + configuration.
///
/// Cloning is cheap: the metadata cache is shared.
#[derive(Debug, Clone)]
pub struct DataSource<D: Dialect> {
    dialect: D,
    metadata: Arc<MetadataCache<D::DbType>>,
    rules: AuditRules,
    config: ChainConfig,
}

impl<D: Dialect> DataSource<D> {
    /// A data source with an empty metadata cache.
    pub fn new(dialect: D) -> Self {
        let metadata = Arc::new(dialect.metadata_cache());
        Self::with_metadata(dialect, metadata)
    }

    /// A data source over an existing (possibly shared) metadata cache.
    pub fn with_metadata(dialect: D, metadata: Arc<MetadataCache<D::DbType>>) -> Self {
        Self {
            dialect,
            metadata,
            rules: AuditRules::default(),
            config: ChainConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_rules(mut self, rules: AuditRules) -> Self {
        self.rules = rules;
        self
    }

    /// A derived data source acting for `user`. Rules and metadata are shared.
    pub fn with_user(&self, user: Arc<dyn DataObject + Send + Sync>) -> Self {
        let mut derived = self.clone();
        derived.rules = derived.rules.with_user(user);
        derived
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    pub fn metadata(&self) -> &Arc<MetadataCache<D::DbType>> {
        &self.metadata
    }

    pub fn rules(&self) -> &AuditRules {
        &self.rules
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// The rules commands actually apply.
    pub(crate) fn effective_rules(&self) -> &AuditRules {
        static NONE: LazyLock<AuditRules> = LazyLock::new(AuditRules::default);
        if self.config.suppress_global_audit_rules {
            &NONE
        } else {
            &self.rules
        }
    }

    /// A private copy of the table's template, set up for this data source.
    pub(crate) fn table_builder(
        &self,
        table: &TableOrViewMetadata<D::DbType>,
    ) -> SqlBuilder<D::DbType> {
        table
            .create_sql_builder(self.config.strict_mode)
            .with_parameter_style(self.dialect.parameter_style())
    }

    pub(crate) fn routine_builder(
        &self,
        routine: &RoutineMetadata<D::DbType>,
    ) -> SqlBuilder<D::DbType> {
        routine
            .create_sql_builder(self.config.strict_mode)
            .with_parameter_style(self.dialect.parameter_style())
    }

    pub(crate) fn log(&self, prepared: &PreparedCommand<D>) {
        prepared.log(self.config.log_sql_max_length);
    }

    // ==================== Fluent commands ====================

    /// Select from a table or view.
    pub fn from(&self, table_or_view: &str) -> ChainResult<FromTableOrView<'_, D>> {
        let table = self.metadata.get_table_or_view(table_or_view)?;
        Ok(FromTableOrView::new(self, table))
    }

    pub fn insert<'a>(
        &'a self,
        table: &str,
        argument: impl Into<Argument<'a>>,
    ) -> ChainResult<InsertObject<'a, D>> {
        let table = self.metadata.get_table(table)?;
        Ok(InsertObject::new(self, table, argument.into()))
    }

    pub fn update<'a>(
        &'a self,
        table: &str,
        argument: impl Into<Argument<'a>>,
    ) -> ChainResult<UpdateObject<'a, D>> {
        let table = self.metadata.get_table(table)?;
        Ok(UpdateObject::new(self, table, argument.into()))
    }

    pub fn upsert<'a>(
        &'a self,
        table: &str,
        argument: impl Into<Argument<'a>>,
    ) -> ChainResult<UpsertObject<'a, D>> {
        let table = self.metadata.get_table(table)?;
        Ok(UpsertObject::new(self, table, argument.into()))
    }

    pub fn delete<'a>(
        &'a self,
        table: &str,
        argument: impl Into<Argument<'a>>,
    ) -> ChainResult<DeleteObject<'a, D>> {
        let table = self.metadata.get_table(table)?;
        Ok(DeleteObject::new(self, table, argument.into()))
    }

    /// Write `values` to every row matching a filter.
    pub fn update_set<'a>(
        &'a self,
        table: &str,
        values: impl Into<Argument<'a>>,
    ) -> ChainResult<UpdateSet<'a, D>> {
        let table = self.metadata.get_table(table)?;
        Ok(UpdateSet::new(self, table, values.into()))
    }

    /// Delete every row matching a filter.
    pub fn delete_with_filter(&self, table: &str) -> ChainResult<DeleteWithFilter<'_, D>> {
        let table = self.metadata.get_table(table)?;
        Ok(DeleteWithFilter::new(self, table))
    }

    pub fn procedure<'a>(
        &'a self,
        name: &str,
        argument: Option<Argument<'a>>,
    ) -> ChainResult<ProcedureCall<'a, D>> {
        let routine = self.metadata.get_routine(name, RoutineKind::Procedure)?;
        Ok(ProcedureCall::new(self, routine, argument))
    }

    pub fn table_function<'a>(
        &'a self,
        name: &str,
        argument: Option<Argument<'a>>,
    ) -> ChainResult<TableFunctionCall<'a, D>> {
        let routine = self.metadata.get_routine(name, RoutineKind::TableFunction)?;
        Ok(TableFunctionCall::new(self, routine, argument))
    }

    pub fn scalar_function<'a>(
        &'a self,
        name: &str,
        argument: Option<Argument<'a>>,
    ) -> ChainResult<ScalarFunctionCall<'a, D>> {
        let routine = self.metadata.get_routine(name, RoutineKind::ScalarFunction)?;
        Ok(ScalarFunctionCall::new(self, routine, argument))
    }

    /// Raw SQL. See [`SqlCall`] for how the argument is bound.
    pub fn sql<'a>(
        &'a self,
        sql: impl Into<String>,
        argument: Option<Argument<'a>>,
    ) -> SqlCall<'a, D> {
        SqlCall::new(self, sql.into(), argument)
    }
}
