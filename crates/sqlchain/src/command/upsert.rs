use super::{CommandBuilder, PreparedCommand};
use crate::argument::Argument;
use crate::builder::{ArgumentOptions, DesiredColumns};
use crate::data_source::DataSource;
use crate::dialect::Dialect;
use crate::error::ChainResult;
use crate::metadata::TableOrViewMetadata;
use crate::rules::OperationTypes;
use std::sync::Arc;

/// Options for [`UpsertObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertOptions {
    /// Write the identity column when the row is inserted.
    pub identity_insert: bool,
    /// Use the members the argument marks as keys instead of the primary key.
    pub use_key_attribute: bool,
}

impl UpsertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity_insert(mut self, on: bool) -> Self {
        self.identity_insert = on;
        self
    }

    pub fn use_key_attribute(mut self, on: bool) -> Self {
        self.use_key_attribute = on;
        self
    }
}

/// Insert a row, or update it when a row with the same key exists.
#[derive(Debug)]
pub struct UpsertObject<'a, D: Dialect> {
    source: &'a DataSource<D>,
    table: Arc<TableOrViewMetadata<D::DbType>>,
    argument: Argument<'a>,
    options: UpsertOptions,
    keys: Vec<String>,
}

impl<'a, D: Dialect> UpsertObject<'a, D> {
    pub(crate) fn new(
        source: &'a DataSource<D>,
        table: Arc<TableOrViewMetadata<D::DbType>>,
        argument: Argument<'a>,
    ) -> Self {
        Self {
            source,
            table,
            argument,
            options: UpsertOptions::default(),
            keys: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: UpsertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_keys<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

impl<D: Dialect> CommandBuilder<D> for UpsertObject<'_, D> {
    fn prepare(&self, desired: &DesiredColumns) -> ChainResult<PreparedCommand<D>> {
        let mut builder = self.source.table_builder(&self.table);
        let rules = self.source.effective_rules();
        let options = ArgumentOptions::new().use_key_attribute(self.options.use_key_attribute);
        builder.override_argument_values(
            rules,
            OperationTypes::INSERT_OR_UPDATE,
            self.argument,
            options,
        )?;
        if !self.keys.is_empty() {
            let keys: Vec<&str> = self.keys.iter().map(String::as_str).collect();
            builder.override_keys(&keys)?;
        }
        builder.apply_desired_columns(desired)?;

        let prepared = self
            .source
            .dialect()
            .build_upsert(builder, &self.table.name, &self.options)?;
        self.source.log(&prepared);
        Ok(prepared)
    }
}
