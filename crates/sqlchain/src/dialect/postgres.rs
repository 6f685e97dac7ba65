use super::{Dialect, require_bound_keys, write_select_list, write_where};
use crate::builder::{ParameterSlot, ParameterStyle, SqlBuilder, SqlBuilderEntry};
use crate::command::{
    CommandKind, CommandPlan, FilterSpec, InsertOptions, PreparedCommand, SelectRequest,
    TableSampling, UpdateOptions, UpsertOptions,
};
use crate::error::{ChainError, ChainResult};
use crate::ident::{ObjectName, is_plain_identifier, quote_double};
use crate::metadata::DbType;
use crate::rules::AuditRules;
use crate::value::Value;

/// PostgreSQL column and parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostgresType {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Text,
    Varchar,
    Bpchar,
    Bytea,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Json,
    Jsonb,
    Array,
    Other,
}

impl DbType for PostgresType {}

/// Words that must be quoted when used as identifiers.
const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both", "case",
    "cast", "check", "collate", "column", "constraint", "create", "current_catalog", "current_date",
    "current_role", "current_time", "current_timestamp", "current_user", "default", "deferrable",
    "desc", "distinct", "do", "else", "end", "except", "false", "fetch", "for", "foreign", "from",
    "grant", "group", "having", "in", "initially", "intersect", "into", "lateral", "leading",
    "limit", "localtime", "localtimestamp", "not", "null", "offset", "on", "only", "or", "order",
    "placing", "primary", "references", "returning", "select", "session_user", "some", "symmetric",
    "table", "then", "to", "trailing", "true", "union", "unique", "user", "using", "variadic",
    "when", "where", "window", "with",
];

/// PostgreSQL. The only dialect this crate also executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Postgres;

impl Postgres {
    fn select_from(
        &self,
        mut builder: SqlBuilder<PostgresType>,
        source: &str,
        object: String,
        kind: CommandKind,
        request: &SelectRequest<'_>,
        rules: &AuditRules,
    ) -> ChainResult<PreparedCommand<Self>> {
        let mut sql = String::from("SELECT ");
        write_select_list(self, &builder, &mut sql, request.count.as_ref())?;
        sql.push_str(" FROM ");
        sql.push_str(source);
        if let Some(sampling) = request.sampling {
            sql.push_str(&table_sample(sampling)?);
        }
        let raw = write_where(&mut builder, &mut sql, &request.filter, false, Some(rules))?;
        if request.count.is_none() {
            builder.build_order_by_clause(&mut sql, " ORDER BY ", &request.sort, None)?;
            if let Some(take) = request.take {
                sql.push_str(&format!(" LIMIT {take}"));
            }
            if let Some(skip) = request.skip {
                sql.push_str(&format!(" OFFSET {skip}"));
            }
        }

        let parameters = self.collect_parameters(&builder, raw.as_ref());
        Ok(PreparedCommand::Single(CommandPlan::new(kind, object, sql, parameters)))
    }

    /// Named notation, `name => $1`, for bound parameters only.
    fn call_arguments(&self, builder: &mut SqlBuilder<PostgresType>) -> String {
        let mut arguments = String::new();
        builder.build_parameter_list(&mut arguments, "", None, |entry, placeholder| {
            placeholder.map(|p| {
                let name = self.quote_identifier(&entry.details().sql_name);
                format!("{name} => {p}")
            })
        });
        arguments
    }
}

fn table_sample(sampling: TableSampling) -> ChainResult<String> {
    match sampling {
        TableSampling::Percent { percent, seed } => Ok(match seed {
            Some(seed) => format!(" TABLESAMPLE SYSTEM ({percent}) REPEATABLE ({seed})"),
            None => format!(" TABLESAMPLE SYSTEM ({percent})"),
        }),
        TableSampling::Rows { .. } => Err(ChainError::unsupported(
            "PostgreSQL samples by percentage only",
        )),
    }
}

impl Dialect for Postgres {
    type DbType = PostgresType;
    type Parameter = Value;

    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn parameter_style(&self) -> ParameterStyle {
        ParameterStyle::Numbered
    }

    /// Quote only names that would otherwise be case-folded or misread.
    fn quote_identifier(&self, name: &str) -> String {
        let lower_plain =
            is_plain_identifier(name) && !name.chars().any(|c| c.is_ascii_uppercase());
        if lower_plain && !RESERVED.contains(&name) {
            name.to_string()
        } else {
            quote_double(name)
        }
    }

    fn default_schema(&self) -> Option<&'static str> {
        Some("public")
    }

    fn variable_name(&self, sql_name: &str) -> String {
        sql_name.to_string()
    }

    fn make_parameter(&self, entry: &SqlBuilderEntry<PostgresType>, slot: ParameterSlot) -> Value {
        entry.slot_value(slot)
    }

    fn make_raw_parameter(&self, _name: &str, value: Value) -> Value {
        value
    }

    fn build_select(
        &self,
        mut builder: SqlBuilder<PostgresType>,
        table: &ObjectName,
        request: &SelectRequest<'_>,
        rules: &AuditRules,
    ) -> ChainResult<PreparedCommand<Self>> {
        builder.set_parameter_offset(request.filter.raw_argument_count());
        let kind = if request.count.is_some() {
            CommandKind::Count
        } else {
            CommandKind::Select
        };
        self.select_from(
            builder,
            &self.quote_object(table),
            table.to_string(),
            kind,
            request,
            rules,
        )
    }

    fn build_insert(
        &self,
        mut builder: SqlBuilder<PostgresType>,
        table: &ObjectName,
        options: &InsertOptions,
    ) -> ChainResult<PreparedCommand<Self>> {
        let include_identity = options.identity_insert;
        let mut sql = format!("INSERT INTO {}", self.quote_object(table));
        if builder.get_insert_columns(include_identity).next().is_some() {
            builder.build_insert_clause(&mut sql, " (", None, Some(")"), include_identity);
            if include_identity {
                sql.push_str(" OVERRIDING SYSTEM VALUE");
            }
            builder.build_values_clause(&mut sql, " VALUES (", Some(")"), include_identity);
        } else {
            sql.push_str(" DEFAULT VALUES");
        }
        builder.build_select_clause(&mut sql, " RETURNING ", None, None);

        let parameters = self.collect_parameters(&builder, None);
        Ok(PreparedCommand::Single(CommandPlan::new(
            CommandKind::Insert,
            table.to_string(),
            sql,
            parameters,
        )))
    }

    fn build_update(
        &self,
        mut builder: SqlBuilder<PostgresType>,
        table: &ObjectName,
        options: &UpdateOptions,
    ) -> ChainResult<PreparedCommand<Self>> {
        let mut sql = format!("UPDATE {}", self.quote_object(table));
        builder.build_set_clause(&mut sql, " SET ", None, None)?;
        builder.build_where_clause(&mut sql, " WHERE ", None)?;
        let prefix = options.return_old_values.then_some("old.");
        builder.build_select_clause(&mut sql, " RETURNING ", prefix, None);

        let parameters = self.collect_parameters(&builder, None);
        Ok(PreparedCommand::Single(CommandPlan::new(
            CommandKind::Update,
            table.to_string(),
            sql,
            parameters,
        )))
    }

    fn build_delete(
        &self,
        mut builder: SqlBuilder<PostgresType>,
        table: &ObjectName,
    ) -> ChainResult<PreparedCommand<Self>> {
        let mut sql = format!("DELETE FROM {}", self.quote_object(table));
        builder.build_where_clause(&mut sql, " WHERE ", None)?;
        builder.build_select_clause(&mut sql, " RETURNING ", None, None);

        let parameters = self.collect_parameters(&builder, None);
        Ok(PreparedCommand::Single(CommandPlan::new(
            CommandKind::Delete,
            table.to_string(),
            sql,
            parameters,
        )))
    }

    fn build_upsert(
        &self,
        mut builder: SqlBuilder<PostgresType>,
        table: &ObjectName,
        options: &UpsertOptions,
    ) -> ChainResult<PreparedCommand<Self>> {
        require_bound_keys(&builder)?;
        let keys: Vec<String> = builder
            .get_key_columns()
            .map(|e| e.details().quoted_sql_name.clone())
            .collect();
        let updates: Vec<String> = builder
            .get_update_columns()
            .map(|e| e.details().quoted_sql_name.clone())
            .collect();
        let identity_written = builder
            .get_insert_columns(true)
            .any(|e| e.details().is_identity);

        let mut sql = format!("INSERT INTO {}", self.quote_object(table));
        builder.build_insert_clause(&mut sql, " (", None, Some(")"), true);
        if identity_written && options.identity_insert {
            sql.push_str(" OVERRIDING SYSTEM VALUE");
        }
        builder.build_values_clause(&mut sql, " VALUES (", Some(")"), true);
        sql.push_str(&format!(" ON CONFLICT ({})", keys.join(", ")));
        if updates.is_empty() {
            sql.push_str(" DO NOTHING");
        } else {
            let assignments: Vec<String> = updates
                .iter()
                .map(|u| format!("{u} = EXCLUDED.{u}"))
                .collect();
            sql.push_str(" DO UPDATE SET ");
            sql.push_str(&assignments.join(", "));
        }
        builder.build_select_clause(&mut sql, " RETURNING ", None, None);

        let parameters = self.collect_parameters(&builder, None);
        Ok(PreparedCommand::Single(CommandPlan::new(
            CommandKind::Upsert,
            table.to_string(),
            sql,
            parameters,
        )))
    }

    fn build_update_set(
        &self,
        mut builder: SqlBuilder<PostgresType>,
        table: &ObjectName,
        filter: &FilterSpec<'_>,
        options: &UpdateOptions,
    ) -> ChainResult<PreparedCommand<Self>> {
        builder.set_parameter_offset(filter.raw_argument_count());
        let mut sql = format!("UPDATE {}", self.quote_object(table));
        builder.build_set_clause(&mut sql, " SET ", None, None)?;
        let raw = write_where(&mut builder, &mut sql, filter, true, None)?;
        let prefix = options.return_old_values.then_some("old.");
        builder.build_select_clause(&mut sql, " RETURNING ", prefix, None);

        let parameters = self.collect_parameters(&builder, raw.as_ref());
        Ok(PreparedCommand::Single(CommandPlan::new(
            CommandKind::Update,
            table.to_string(),
            sql,
            parameters,
        )))
    }

    fn build_delete_with_filter(
        &self,
        mut builder: SqlBuilder<PostgresType>,
        table: &ObjectName,
        filter: &FilterSpec<'_>,
    ) -> ChainResult<PreparedCommand<Self>> {
        builder.set_parameter_offset(filter.raw_argument_count());
        let mut sql = format!("DELETE FROM {}", self.quote_object(table));
        let raw = write_where(&mut builder, &mut sql, filter, false, None)?;
        builder.build_select_clause(&mut sql, " RETURNING ", None, None);

        let parameters = self.collect_parameters(&builder, raw.as_ref());
        Ok(PreparedCommand::Single(CommandPlan::new(
            CommandKind::Delete,
            table.to_string(),
            sql,
            parameters,
        )))
    }

    fn build_procedure_call(
        &self,
        mut builder: SqlBuilder<PostgresType>,
        name: &ObjectName,
    ) -> ChainResult<PreparedCommand<Self>> {
        let arguments = self.call_arguments(&mut builder);
        let sql = format!("CALL {}({arguments})", self.quote_object(name));

        let parameters = self.collect_parameters(&builder, None);
        Ok(PreparedCommand::Single(CommandPlan::new(
            CommandKind::Procedure,
            name.to_string(),
            sql,
            parameters,
        )))
    }

    fn build_table_function_call(
        &self,
        mut builder: SqlBuilder<PostgresType>,
        name: &ObjectName,
        request: &SelectRequest<'_>,
        rules: &AuditRules,
    ) -> ChainResult<PreparedCommand<Self>> {
        builder.set_parameter_offset(request.filter.raw_argument_count());
        let arguments = self.call_arguments(&mut builder);
        let source = format!("{}({arguments})", self.quote_object(name));
        self.select_from(
            builder,
            &source,
            name.to_string(),
            CommandKind::TableFunction,
            request,
            rules,
        )
    }

    fn build_scalar_function_call(
        &self,
        mut builder: SqlBuilder<PostgresType>,
        name: &ObjectName,
    ) -> ChainResult<PreparedCommand<Self>> {
        let arguments = self.call_arguments(&mut builder);
        let sql = format!("SELECT {}({arguments})", self.quote_object(name));

        let parameters = self.collect_parameters(&builder, None);
        Ok(PreparedCommand::Single(CommandPlan::new(
            CommandKind::ScalarFunction,
            name.to_string(),
            sql,
            parameters,
        )))
    }
}
