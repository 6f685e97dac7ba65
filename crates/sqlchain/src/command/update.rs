use super::{CommandBuilder, FilterSpec, PreparedCommand, RawArguments};
use crate::argument::Argument;
use crate::builder::{ArgumentOptions, DesiredColumns, FilterOptions};
use crate::data_source::DataSource;
use crate::dialect::Dialect;
use crate::error::{ChainError, ChainResult};
use crate::metadata::TableOrViewMetadata;
use crate::rules::OperationTypes;
use std::sync::Arc;

/// Options for [`UpdateObject`] and [`UpdateSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOptions {
    /// Use the members the argument marks as keys instead of the primary key.
    pub use_key_attribute: bool,
    /// Only write members the argument reports as changed.
    pub changed_properties_only: bool,
    /// Read back the values as they were before the update.
    pub return_old_values: bool,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_key_attribute(mut self, on: bool) -> Self {
        self.use_key_attribute = on;
        self
    }

    pub fn changed_properties_only(mut self, on: bool) -> Self {
        self.changed_properties_only = on;
        self
    }

    pub fn return_old_values(mut self, on: bool) -> Self {
        self.return_old_values = on;
        self
    }

    pub(crate) fn argument_options(&self) -> ArgumentOptions {
        ArgumentOptions::new()
            .use_key_attribute(self.use_key_attribute)
            .changed_properties_only(self.changed_properties_only)
    }
}

/// `UPDATE` one row, located by key, from an argument.
#[derive(Debug)]
pub struct UpdateObject<'a, D: Dialect> {
    source: &'a DataSource<D>,
    table: Arc<TableOrViewMetadata<D::DbType>>,
    argument: Argument<'a>,
    options: UpdateOptions,
    keys: Vec<String>,
}

impl<'a, D: Dialect> UpdateObject<'a, D> {
    pub(crate) fn new(
        source: &'a DataSource<D>,
        table: Arc<TableOrViewMetadata<D::DbType>>,
        argument: Argument<'a>,
    ) -> Self {
        Self {
            source,
            table,
            argument,
            options: UpdateOptions::default(),
            keys: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: UpdateOptions) -> Self {
        self.options = options;
        self
    }

    /// Locate the row by these columns instead of the primary key.
    pub fn with_keys<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

impl<D: Dialect> CommandBuilder<D> for UpdateObject<'_, D> {
    fn prepare(&self, desired: &DesiredColumns) -> ChainResult<PreparedCommand<D>> {
        let mut builder = self.source.table_builder(&self.table);
        let rules = self.source.effective_rules();
        builder.override_argument_values(
            rules,
            OperationTypes::UPDATE,
            self.argument,
            self.options.argument_options(),
        )?;
        if !self.keys.is_empty() {
            let keys: Vec<&str> = self.keys.iter().map(String::as_str).collect();
            builder.override_keys(&keys)?;
        }
        builder.apply_desired_columns(desired)?;

        let prepared = self
            .source
            .dialect()
            .build_update(builder, &self.table.name, &self.options)?;
        self.source.log(&prepared);
        Ok(prepared)
    }
}

/// Set-based `UPDATE`: the argument's values are written to every row that
/// matches the filter.
///
/// A filter is required unless [`all`](Self::all) is called.
#[derive(Debug)]
pub struct UpdateSet<'a, D: Dialect> {
    source: &'a DataSource<D>,
    table: Arc<TableOrViewMetadata<D::DbType>>,
    values: Argument<'a>,
    filter: FilterSpec<'a>,
    all_rows: bool,
    options: UpdateOptions,
}

impl<'a, D: Dialect> UpdateSet<'a, D> {
    pub(crate) fn new(
        source: &'a DataSource<D>,
        table: Arc<TableOrViewMetadata<D::DbType>>,
        values: Argument<'a>,
    ) -> Self {
        Self {
            source,
            table,
            values,
            filter: FilterSpec::None,
            all_rows: false,
            options: UpdateOptions::default(),
        }
    }

    pub fn with_filter(mut self, filter: impl Into<Argument<'a>>) -> Self {
        self.filter = FilterSpec::Argument(filter.into(), FilterOptions::default());
        self
    }

    pub fn with_filter_options(mut self, options: FilterOptions) -> Self {
        if let FilterSpec::Argument(_, current) = &mut self.filter {
            *current = options;
        }
        self
    }

    pub fn with_where(mut self, clause: impl Into<String>) -> Self {
        self.filter = FilterSpec::Where {
            clause: clause.into(),
            arguments: RawArguments::default(),
        };
        self
    }

    pub fn with_where_args(
        mut self,
        clause: impl Into<String>,
        arguments: impl Into<Argument<'a>>,
    ) -> Self {
        self.filter = FilterSpec::Where {
            clause: clause.into(),
            arguments: RawArguments::from_argument(arguments.into()),
        };
        self
    }

    /// Update every row of the table.
    pub fn all(mut self) -> Self {
        self.all_rows = true;
        self
    }

    pub fn with_options(mut self, options: UpdateOptions) -> Self {
        self.options = options;
        self
    }
}

impl<D: Dialect> CommandBuilder<D> for UpdateSet<'_, D> {
    fn prepare(&self, desired: &DesiredColumns) -> ChainResult<PreparedCommand<D>> {
        require_filter(&self.filter, self.all_rows, "UPDATE")?;
        let mut builder = self.source.table_builder(&self.table);
        let rules = self.source.effective_rules();
        let options =
            ArgumentOptions::new().changed_properties_only(self.options.changed_properties_only);
        builder.override_argument_values(rules, OperationTypes::UPDATE, self.values, options)?;
        builder.apply_desired_columns(desired)?;

        let prepared = self.source.dialect().build_update_set(
            builder,
            &self.table.name,
            &self.filter,
            &self.options,
        )?;
        self.source.log(&prepared);
        Ok(prepared)
    }
}

/// Set-based writes must say which rows they touch.
pub(super) fn require_filter(
    filter: &FilterSpec<'_>,
    all_rows: bool,
    operation: &str,
) -> ChainResult<()> {
    match filter {
        FilterSpec::None if !all_rows => Err(ChainError::InvalidArgument(format!(
            "{operation} requires a filter; call all() to affect every row"
        ))),
        FilterSpec::Where { clause, .. } if clause.trim().is_empty() => {
            Err(ChainError::ArgumentEmpty("where clause"))
        }
        _ => Ok(()),
    }
}
