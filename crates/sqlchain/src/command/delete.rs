use super::update::require_filter;
use super::{CommandBuilder, FilterSpec, PreparedCommand, RawArguments, UpdateOptions};
use crate::argument::Argument;
use crate::builder::{ArgumentOptions, DesiredColumns, FilterOptions, SqlBuilder};
use crate::data_source::DataSource;
use crate::dialect::Dialect;
use crate::error::ChainResult;
use crate::metadata::{DbType, TableOrViewMetadata};
use crate::rules::{AuditRules, OperationTypes};
use std::sync::Arc;

/// A soft-delete rule covers one of the table's columns, so the delete becomes
/// an update of that column.
fn is_soft_delete<T: DbType>(builder: &SqlBuilder<T>, rules: &AuditRules) -> bool {
    rules
        .soft_delete_rules(OperationTypes::DELETE)
        .any(|rule| builder.entry(rule.column()).is_some())
}

/// `DELETE` one row, located by key.
///
/// When a soft-delete rule matches a column of the table, the row is updated
/// instead and only the rule-stamped columns are written.
#[derive(Debug)]
pub struct DeleteObject<'a, D: Dialect> {
    source: &'a DataSource<D>,
    table: Arc<TableOrViewMetadata<D::DbType>>,
    argument: Argument<'a>,
    use_key_attribute: bool,
    keys: Vec<String>,
}

impl<'a, D: Dialect> DeleteObject<'a, D> {
    pub(crate) fn new(
        source: &'a DataSource<D>,
        table: Arc<TableOrViewMetadata<D::DbType>>,
        argument: Argument<'a>,
    ) -> Self {
        Self {
            source,
            table,
            argument,
            use_key_attribute: false,
            keys: Vec::new(),
        }
    }

    /// Use the members the argument marks as keys instead of the primary key.
    pub fn use_key_attribute(mut self, on: bool) -> Self {
        self.use_key_attribute = on;
        self
    }

    pub fn with_keys<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

impl<D: Dialect> CommandBuilder<D> for DeleteObject<'_, D> {
    fn prepare(&self, desired: &DesiredColumns) -> ChainResult<PreparedCommand<D>> {
        let mut builder = self.source.table_builder(&self.table);
        let rules = self.source.effective_rules();
        let options = ArgumentOptions::new().use_key_attribute(self.use_key_attribute);
        // Extra members are expected on a delete, unless rows are read back.
        let non_query = matches!(desired, DesiredColumns::NoColumns);
        builder.apply_argument_value(self.argument, options, non_query)?;
        if !self.keys.is_empty() {
            let keys: Vec<&str> = self.keys.iter().map(String::as_str).collect();
            builder.override_keys(&keys)?;
        }

        let soft = is_soft_delete(&builder, rules);
        if soft {
            builder.clear_update_columns();
        }
        builder.apply_rules(rules, OperationTypes::DELETE, Some(self.argument))?;
        builder.apply_desired_columns(desired)?;

        let dialect = self.source.dialect();
        let prepared = if soft {
            dialect.build_update(builder, &self.table.name, &UpdateOptions::default())?
        } else {
            dialect.build_delete(builder, &self.table.name)?
        };
        self.source.log(&prepared);
        Ok(prepared)
    }
}

/// Set-based `DELETE` of every row matching a filter.
///
/// A filter is required unless [`all`](Self::all) is called. Soft-delete
/// rules apply as for [`DeleteObject`].
#[derive(Debug)]
pub struct DeleteWithFilter<'a, D: Dialect> {
    source: &'a DataSource<D>,
    table: Arc<TableOrViewMetadata<D::DbType>>,
    filter: FilterSpec<'a>,
    all_rows: bool,
}

impl<'a, D: Dialect> DeleteWithFilter<'a, D> {
    pub(crate) fn new(
        source: &'a DataSource<D>,
        table: Arc<TableOrViewMetadata<D::DbType>>,
    ) -> Self {
        Self {
            source,
            table,
            filter: FilterSpec::None,
            all_rows: false,
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

    /// Delete every row of the table.
    pub fn all(mut self) -> Self {
        self.all_rows = true;
        self
    }
}

impl<D: Dialect> CommandBuilder<D> for DeleteWithFilter<'_, D> {
    fn prepare(&self, desired: &DesiredColumns) -> ChainResult<PreparedCommand<D>> {
        require_filter(&self.filter, self.all_rows, "DELETE")?;
        let mut builder = self.source.table_builder(&self.table);
        let rules = self.source.effective_rules();

        let soft = is_soft_delete(&builder, rules);
        if soft {
            builder.clear_update_columns();
        }
        builder.apply_rules(rules, OperationTypes::DELETE, None)?;
        builder.apply_desired_columns(desired)?;

        let dialect = self.source.dialect();
        let prepared = if soft {
            let options = UpdateOptions::default();
            dialect.build_update_set(builder, &self.table.name, &self.filter, &options)?
        } else {
            dialect.build_delete_with_filter(builder, &self.table.name, &self.filter)?
        };
        self.source.log(&prepared);
        Ok(prepared)
    }
}
