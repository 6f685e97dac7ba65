use super::{
    CommandBuilder, CountKind, FilterSpec, PreparedCommand, RawArguments, SelectRequest,
    TableSampling,
};
use crate::argument::Argument;
use crate::builder::{DesiredColumns, FilterOptions};
use crate::data_source::DataSource;
use crate::dialect::Dialect;
use crate::error::ChainResult;
use crate::metadata::TableOrViewMetadata;
use crate::rules::OperationTypes;
use crate::sort::SortExpression;
use std::sync::Arc;

/// `SELECT` from a table or view.
///
/// ```ignore
/// let command = ds
///     .from("HR.Employee")?
///     .with_filter(&filter)
///     .with_sorting(["LastName", "FirstName DESC"])
///     .take(20);
/// let prepared = command.prepare(&DesiredColumns::AllColumns)?;
/// ```
#[derive(Debug)]
pub struct FromTableOrView<'a, D: Dialect> {
    source: &'a DataSource<D>,
    table: Arc<TableOrViewMetadata<D::DbType>>,
    request: SelectRequest<'a>,
}

impl<'a, D: Dialect> FromTableOrView<'a, D> {
    pub(crate) fn new(
        source: &'a DataSource<D>,
        table: Arc<TableOrViewMetadata<D::DbType>>,
    ) -> Self {
        Self {
            source,
            table,
            request: SelectRequest::default(),
        }
    }

    /// Equality filter: each member becomes `column = value` (or `IS NULL`).
    pub fn with_filter(mut self, filter: impl Into<Argument<'a>>) -> Self {
        self.request.filter = FilterSpec::Argument(filter.into(), FilterOptions::default());
        self
    }

    /// Options for a filter set with [`with_filter`](Self::with_filter).
    pub fn with_filter_options(mut self, options: FilterOptions) -> Self {
        if let FilterSpec::Argument(_, current) = &mut self.request.filter {
            *current = options;
        }
        self
    }

    /// Raw predicate text, written after `WHERE` as given.
    pub fn with_where(mut self, clause: impl Into<String>) -> Self {
        self.request.filter = FilterSpec::Where {
            clause: clause.into(),
            arguments: RawArguments::default(),
        };
        self
    }

    /// Raw predicate text with its own arguments. Arguments are bound in
    /// member order; name them the way the dialect writes placeholders.
    pub fn with_where_args(
        mut self,
        clause: impl Into<String>,
        arguments: impl Into<Argument<'a>>,
    ) -> Self {
        self.request.filter = FilterSpec::Where {
            clause: clause.into(),
            arguments: RawArguments::from_argument(arguments.into()),
        };
        self
    }

    pub fn with_sorting<S: Into<SortExpression>>(
        mut self,
        sort: impl IntoIterator<Item = S>,
    ) -> Self {
        self.request.sort = sort.into_iter().map(Into::into).collect();
        self
    }

    pub fn take(mut self, rows: u64) -> Self {
        self.request.take = Some(rows);
        self
    }

    pub fn skip(mut self, rows: u64) -> Self {
        self.request.skip = Some(rows);
        self
    }

    pub fn with_sampling(mut self, sampling: TableSampling) -> Self {
        self.request.sampling = Some(sampling);
        self
    }

    /// `COUNT(*)` instead of rows.
    pub fn as_count(mut self) -> Self {
        self.request.count = Some(CountKind::Rows);
        self
    }

    /// Count non-null values of a column, optionally distinct.
    pub fn count_column(mut self, column: impl Into<String>, distinct: bool) -> Self {
        let column = column.into();
        self.request.count = Some(if distinct {
            CountKind::DistinctColumn(column)
        } else {
            CountKind::Column(column)
        });
        self
    }

    pub fn table(&self) -> &TableOrViewMetadata<D::DbType> {
        &self.table
    }
}

impl<D: Dialect> CommandBuilder<D> for FromTableOrView<'_, D> {
    fn prepare(&self, desired: &DesiredColumns) -> ChainResult<PreparedCommand<D>> {
        let mut builder = self.source.table_builder(&self.table);
        if self.request.count.is_none() {
            let desired = match desired {
                DesiredColumns::NoColumns => &DesiredColumns::AllColumns,
                other => other,
            };
            builder.apply_desired_columns(desired)?;
        }
        let rules = self.source.effective_rules();
        builder.apply_rules(rules, OperationTypes::SELECT, None)?;

        let prepared = self
            .source
            .dialect()
            .build_select(builder, &self.table.name, &self.request, rules)?;
        self.source.log(&prepared);
        Ok(prepared)
    }
}
