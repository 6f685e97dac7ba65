//! Database dialects.
//!
//! A [`Dialect`] knows how to quote names, how to write placeholders and how
//! to turn a prepared [`SqlBuilder`] into statements. Three are provided:
//!
//! | Dialect | Placeholders | Paging | Read-back |
//! |---|---|---|---|
//! | [`SqlServer`] | `@Name` | `TOP` / `OFFSET ... FETCH` | `OUTPUT` |
//! | [`Access`] | `?` | `TOP` | follow-up `SELECT` |
//! | [`Postgres`] | `$n` | `LIMIT` / `OFFSET` | `RETURNING` |

mod access;
mod postgres;
mod sqlserver;


pub use access::{Access, AccessParameter, AccessType};
pub use postgres::{Postgres, PostgresType};
pub use sqlserver::{SqlServer, SqlServerParameter, SqlServerType};

use crate::builder::{ParameterSlot, ParameterStyle, SqlBuilder, SqlBuilderEntry};
use crate::command::{
    CountKind, FilterSpec, InsertOptions, PreparedCommand, RawArguments, SelectRequest,
    UpdateOptions, UpsertOptions,
};
use crate::error::{ChainError, ChainResult};
use crate::ident::ObjectName;
use crate::metadata::{ColumnMetadata, DbType, MetadataCache, ParameterMetadata};
use crate::rules::AuditRules;
use crate::value::Value;
use std::fmt;

/// SQL generation for one database engine.
pub trait Dialect: fmt::Debug + Clone + Send + Sync + 'static {
    type DbType: DbType;
    /// Parameter object handed to the driver.
    type Parameter: fmt::Debug + Clone + Send + Sync;

    fn name(&self) -> &'static str;

    fn parameter_style(&self) -> ParameterStyle;

    fn quote_identifier(&self, name: &str) -> String;

    fn quote_object(&self, name: &ObjectName) -> String {
        name.to_quoted(|part| self.quote_identifier(part))
    }

    /// Schema applied to unqualified names.
    fn default_schema(&self) -> Option<&'static str>;

    /// Declared placeholder name for a column or parameter.
    fn variable_name(&self, sql_name: &str) -> String;

    fn make_parameter(
        &self,
        entry: &SqlBuilderEntry<Self::DbType>,
        slot: ParameterSlot,
    ) -> Self::Parameter;

    /// Parameter for raw SQL text, not tied to a column.
    fn make_raw_parameter(&self, name: &str, value: Value) -> Self::Parameter;

    /// Column metadata with this dialect's quoting and placeholder names.
    fn column(&self, sql_name: &str) -> ColumnMetadata<Self::DbType> {
        ColumnMetadata::new(sql_name, self.quote_identifier(sql_name), self.variable_name(sql_name))
    }

    /// Routine parameter metadata with this dialect's placeholder name.
    fn parameter(&self, sql_name: &str) -> ParameterMetadata<Self::DbType> {
        ParameterMetadata::new(sql_name, self.variable_name(sql_name))
    }

    /// An empty metadata cache using this dialect's default schema.
    fn metadata_cache(&self) -> MetadataCache<Self::DbType> {
        MetadataCache::new(self.default_schema())
    }

    /// Parameters for the statement the builder has written, with raw
    /// arguments spliced in where the raw SQL sits.
    fn collect_parameters(
        &self,
        builder: &SqlBuilder<Self::DbType>,
        raw: Option<&RawArguments>,
    ) -> Vec<Self::Parameter> {
        let make = |e: &SqlBuilderEntry<Self::DbType>, slot| self.make_parameter(e, slot);
        let raw_parameters = || {
            raw.into_iter()
                .flat_map(|r| r.values.iter())
                .map(|(name, value)| self.make_raw_parameter(name, value.clone()))
                .collect::<Vec<_>>()
        };
        match self.parameter_style() {
            ParameterStyle::Named => {
                let mut parameters = builder.get_parameters(make);
                parameters.extend(raw_parameters());
                parameters
            }
            ParameterStyle::Numbered => {
                let mut parameters = raw_parameters();
                parameters.extend(builder.get_rendered_parameters(make));
                parameters
            }
            ParameterStyle::Positional => {
                let mut parameters = builder.get_rendered_parameters(make);
                let at = raw.map_or(0, |r| r.at).min(parameters.len());
                let tail = parameters.split_off(at);
                parameters.extend(raw_parameters());
                parameters.extend(tail);
                parameters
            }
        }
    }

    fn build_select(
        &self,
        builder: SqlBuilder<Self::DbType>,
        table: &ObjectName,
        request: &SelectRequest<'_>,
        rules: &AuditRules,
    ) -> ChainResult<PreparedCommand<Self>>;

    fn build_insert(
        &self,
        builder: SqlBuilder<Self::DbType>,
        table: &ObjectName,
        options: &InsertOptions,
    ) -> ChainResult<PreparedCommand<Self>>;

    fn build_update(
        &self,
        builder: SqlBuilder<Self::DbType>,
        table: &ObjectName,
        options: &UpdateOptions,
    ) -> ChainResult<PreparedCommand<Self>>;

    fn build_delete(
        &self,
        builder: SqlBuilder<Self::DbType>,
        table: &ObjectName,
    ) -> ChainResult<PreparedCommand<Self>>;

    fn build_upsert(
        &self,
        builder: SqlBuilder<Self::DbType>,
        table: &ObjectName,
        options: &UpsertOptions,
    ) -> ChainResult<PreparedCommand<Self>>;

    /// Set-based update: the builder's bound columns are set on every row
    /// matching `filter`.
    fn build_update_set(
        &self,
        builder: SqlBuilder<Self::DbType>,
        table: &ObjectName,
        filter: &FilterSpec<'_>,
        options: &UpdateOptions,
    ) -> ChainResult<PreparedCommand<Self>>;

    fn build_delete_with_filter(
        &self,
        builder: SqlBuilder<Self::DbType>,
        table: &ObjectName,
        filter: &FilterSpec<'_>,
    ) -> ChainResult<PreparedCommand<Self>>;

    fn build_procedure_call(
        &self,
        builder: SqlBuilder<Self::DbType>,
        name: &ObjectName,
    ) -> ChainResult<PreparedCommand<Self>>;

    fn build_table_function_call(
        &self,
        builder: SqlBuilder<Self::DbType>,
        name: &ObjectName,
        request: &SelectRequest<'_>,
        rules: &AuditRules,
    ) -> ChainResult<PreparedCommand<Self>>;

    fn build_scalar_function_call(
        &self,
        builder: SqlBuilder<Self::DbType>,
        name: &ObjectName,
    ) -> ChainResult<PreparedCommand<Self>>;
}

/// Write ` WHERE ...` from a filter plus soft-delete predicates.
///
/// Returns the raw arguments of a `FilterSpec::Where`, positioned after the
/// builder parameters written so far.
pub(crate) fn write_where<T: DbType>(
    builder: &mut SqlBuilder<T>,
    sql: &mut String,
    filter: &FilterSpec<'_>,
    second_slot: bool,
    soft_delete_rules: Option<&AuditRules>,
) -> ChainResult<Option<RawArguments>> {
    let anonymous = builder.parameter_style() == ParameterStyle::Positional;
    let mut parts = Vec::new();
    let mut raw = None;
    match filter {
        FilterSpec::None => {}
        FilterSpec::Argument(argument, options) => {
            let predicate = if anonymous {
                builder.apply_anonymous_filter_value(*argument, *options, second_slot)?
            } else {
                builder.apply_filter_value(*argument, *options, second_slot)?
            };
            if !predicate.is_empty() {
                parts.push(predicate);
            }
        }
        FilterSpec::Where { clause, arguments } => {
            parts.push(clause.clone());
            raw = Some(RawArguments {
                values: arguments.values.clone(),
                at: builder.rendered_parameter_count(),
            });
        }
    }
    if let Some(rules) = soft_delete_rules {
        let mut clause = String::new();
        let written = if anonymous {
            builder.build_anonymous_soft_delete_clause(&mut clause, "", rules, None)?
        } else {
            builder.build_soft_delete_clause(&mut clause, "", rules, None)?
        };
        if written {
            parts.push(clause);
        }
    }
    if raw.is_some() && parts.len() > 1 {
        parts[0] = format!("({})", parts[0]);
    }
    if !parts.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&parts.join(" AND "));
    }
    Ok(raw)
}

/// The select list: requested columns or a count.
pub(crate) fn write_select_list<D: Dialect>(
    dialect: &D,
    builder: &SqlBuilder<D::DbType>,
    sql: &mut String,
    count: Option<&CountKind>,
) -> ChainResult<()> {
    match count {
        Some(CountKind::Rows) => sql.push_str("COUNT(*)"),
        Some(CountKind::Column(column)) => {
            let entry = count_column(builder, column)?;
            sql.push_str(&format!("COUNT({})", entry.details().quoted_sql_name));
        }
        Some(CountKind::DistinctColumn(column)) => {
            let entry = count_column(builder, column)?;
            sql.push_str(&format!("COUNT(DISTINCT {})", entry.details().quoted_sql_name));
        }
        None => {
            if !builder.has_read_fields() {
                return Err(ChainError::mapping(
                    builder.name(),
                    format!("No columns were selected for the {} query", dialect.name()),
                ));
            }
            builder.build_select_clause(sql, "", None, None);
        }
    }
    Ok(())
}

fn count_column<'b, T: DbType>(
    builder: &'b SqlBuilder<T>,
    column: &str,
) -> ChainResult<&'b SqlBuilderEntry<T>> {
    builder
        .entries()
        .iter()
        .find(|e| !e.is_formal_parameter() && e.matches(column))
        .ok_or_else(|| {
            ChainError::mapping(
                builder.name(),
                format!("Cannot find a column named {column} to count"),
            )
        })
}

/// Fail unless every key column has a value.
pub(crate) fn require_bound_keys<T: DbType>(builder: &SqlBuilder<T>) -> ChainResult<()> {
    let mut keys = builder.get_key_columns().peekable();
    if keys.peek().is_none() {
        return Err(ChainError::mapping(builder.name(), "No primary key was found"));
    }
    if let Some(key) = keys.find(|k| !k.is_bound()) {
        return Err(ChainError::mapping(
            builder.name(),
            format!("The argument has no value for the key column {}", key.details().sql_name),
        ));
    }
    Ok(())
}
