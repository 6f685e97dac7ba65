use super::{CommandBuilder, PreparedCommand};
use crate::argument::Argument;
use crate::builder::{ArgumentOptions, DesiredColumns};
use crate::data_source::DataSource;
use crate::dialect::Dialect;
use crate::error::ChainResult;
use crate::metadata::TableOrViewMetadata;
use crate::rules::OperationTypes;
use std::sync::Arc;

/// Options for [`InsertObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertOptions {
    /// Write the identity column from the argument instead of letting the
    /// database generate it.
    pub identity_insert: bool,
}

impl InsertOptions {
    pub fn identity_insert() -> Self {
        Self { identity_insert: true }
    }
}

/// `INSERT` one row from an argument.
#[derive(Debug)]
pub struct InsertObject<'a, D: Dialect> {
    source: &'a DataSource<D>,
    table: Arc<TableOrViewMetadata<D::DbType>>,
    argument: Argument<'a>,
    options: InsertOptions,
}

impl<'a, D: Dialect> InsertObject<'a, D> {
    pub(crate) fn new(
        source: &'a DataSource<D>,
        table: Arc<TableOrViewMetadata<D::DbType>>,
        argument: Argument<'a>,
    ) -> Self {
        Self {
            source,
            table,
            argument,
            options: InsertOptions::default(),
        }
    }

    pub fn with_options(mut self, options: InsertOptions) -> Self {
        self.options = options;
        self
    }
}

impl<D: Dialect> CommandBuilder<D> for InsertObject<'_, D> {
    fn prepare(&self, desired: &DesiredColumns) -> ChainResult<PreparedCommand<D>> {
        let mut builder = self.source.table_builder(&self.table);
        let rules = self.source.effective_rules();
        builder.override_argument_values(
            rules,
            OperationTypes::INSERT,
            self.argument,
            ArgumentOptions::default(),
        )?;
        builder.apply_desired_columns(desired)?;

        let prepared = self
            .source
            .dialect()
            .build_insert(builder, &self.table.name, &self.options)?;
        self.source.log(&prepared);
        Ok(prepared)
    }
}
