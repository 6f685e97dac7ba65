use super::{CommandBuilder, CountKind, FilterSpec, PreparedCommand, RawArguments, SelectRequest};
use crate::argument::Argument;
use crate::builder::{ArgumentOptions, DesiredColumns, FilterOptions, ParameterColumn, SqlBuilder};
use crate::data_source::DataSource;
use crate::dialect::Dialect;
use crate::error::ChainResult;
use crate::metadata::RoutineMetadata;
use crate::rules::OperationTypes;
use crate::sort::SortExpression;
use std::sync::Arc;

fn routine_builder<D: Dialect>(
    source: &DataSource<D>,
    routine: &RoutineMetadata<D::DbType>,
    argument: Option<Argument<'_>>,
) -> ChainResult<SqlBuilder<D::DbType>> {
    let mut builder = source.routine_builder(routine);
    if let Some(argument) = argument {
        builder.apply_argument_value(argument, ArgumentOptions::default(), false)?;
    }
    Ok(builder)
}

/// Call a stored procedure. Arguments bind formal parameters by name.
#[derive(Debug)]
pub struct ProcedureCall<'a, D: Dialect> {
    source: &'a DataSource<D>,
    routine: Arc<RoutineMetadata<D::DbType>>,
    argument: Option<Argument<'a>>,
    parameter_columns: Vec<(String, ParameterColumn)>,
}

impl<'a, D: Dialect> ProcedureCall<'a, D> {
    pub(crate) fn new(
        source: &'a DataSource<D>,
        routine: Arc<RoutineMetadata<D::DbType>>,
        argument: Option<Argument<'a>>,
    ) -> Self {
        Self {
            source,
            routine,
            argument,
            parameter_columns: Vec::new(),
        }
    }

    /// Send `parameter` as a table-valued parameter of the given table type.
    pub fn with_parameter_column(
        mut self,
        parameter: impl Into<String>,
        column: ParameterColumn,
    ) -> Self {
        self.parameter_columns.push((parameter.into(), column));
        self
    }
}

impl<D: Dialect> CommandBuilder<D> for ProcedureCall<'_, D> {
    /// Procedures return whatever they return; `desired` is not applied.
    fn prepare(&self, _desired: &DesiredColumns) -> ChainResult<PreparedCommand<D>> {
        let mut builder = routine_builder(self.source, &self.routine, self.argument)?;
        for (parameter, column) in &self.parameter_columns {
            builder.set_parameter_column(parameter, column.clone())?;
        }

        let prepared = self
            .source
            .dialect()
            .build_procedure_call(builder, &self.routine.name)?;
        self.source.log(&prepared);
        Ok(prepared)
    }
}

/// `SELECT` from a table-valued function.
#[derive(Debug)]
pub struct TableFunctionCall<'a, D: Dialect> {
    source: &'a DataSource<D>,
    routine: Arc<RoutineMetadata<D::DbType>>,
    argument: Option<Argument<'a>>,
    request: SelectRequest<'a>,
}

impl<'a, D: Dialect> TableFunctionCall<'a, D> {
    pub(crate) fn new(
        source: &'a DataSource<D>,
        routine: Arc<RoutineMetadata<D::DbType>>,
        argument: Option<Argument<'a>>,
    ) -> Self {
        Self {
            source,
            routine,
            argument,
            request: SelectRequest::default(),
        }
    }

    pub fn with_filter(mut self, filter: impl Into<Argument<'a>>) -> Self {
        self.request.filter = FilterSpec::Argument(filter.into(), FilterOptions::default());
        self
    }

    pub fn with_filter_options(mut self, options: FilterOptions) -> Self {
        if let FilterSpec::Argument(_, current) = &mut self.request.filter {
            *current = options;
        }
        self
    }

    pub fn with_where(mut self, clause: impl Into<String>) -> Self {
        self.request.filter = FilterSpec::Where {
            clause: clause.into(),
            arguments: RawArguments::default(),
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

    pub fn as_count(mut self) -> Self {
        self.request.count = Some(CountKind::Rows);
        self
    }
}

impl<D: Dialect> CommandBuilder<D> for TableFunctionCall<'_, D> {
    fn prepare(&self, desired: &DesiredColumns) -> ChainResult<PreparedCommand<D>> {
        let mut builder = routine_builder(self.source, &self.routine, self.argument)?;
        if self.request.count.is_none() {
            let desired = match desired {
                DesiredColumns::NoColumns => &DesiredColumns::AllColumns,
                other => other,
            };
            builder.apply_desired_columns(desired)?;
        }
        let rules = self.source.effective_rules();
        builder.apply_rules(rules, OperationTypes::SELECT, None)?;

        let prepared =
            self.source
                .dialect()
                .build_table_function_call(builder, &self.routine.name, &self.request, rules)?;
        self.source.log(&prepared);
        Ok(prepared)
    }
}

/// `SELECT` a scalar function's result.
#[derive(Debug)]
pub struct ScalarFunctionCall<'a, D: Dialect> {
    source: &'a DataSource<D>,
    routine: Arc<RoutineMetadata<D::DbType>>,
    argument: Option<Argument<'a>>,
}

impl<'a, D: Dialect> ScalarFunctionCall<'a, D> {
    pub(crate) fn new(
        source: &'a DataSource<D>,
        routine: Arc<RoutineMetadata<D::DbType>>,
        argument: Option<Argument<'a>>,
    ) -> Self {
        Self {
            source,
            routine,
            argument,
        }
    }
}

impl<D: Dialect> CommandBuilder<D> for ScalarFunctionCall<'_, D> {
    fn prepare(&self, _desired: &DesiredColumns) -> ChainResult<PreparedCommand<D>> {
        let builder = routine_builder(self.source, &self.routine, self.argument)?;
        let prepared = self
            .source
            .dialect()
            .build_scalar_function_call(builder, &self.routine.name)?;
        self.source.log(&prepared);
        Ok(prepared)
    }
}
