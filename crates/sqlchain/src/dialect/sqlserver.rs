use super::{Dialect, require_bound_keys, write_select_list, write_where};
use crate::builder::{ParameterSlot, ParameterStyle, SqlBuilder, SqlBuilderEntry};
use crate::command::{
    CommandKind, CommandPlan, FilterSpec, InsertOptions, PreparedCommand, SelectRequest,
    TableSampling, UpdateOptions, UpsertOptions,
};
use crate::error::{ChainError, ChainResult};
use crate::ident::{ObjectName, clr_safe_name, quote_bracketed};
use crate::metadata::{DbType, ParameterDirection};
use crate::rules::AuditRules;
use crate::value::Value;

/// SQL Server column and parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlServerType {
    BigInt,
    Binary,
    Bit,
    Char,
    Date,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Decimal,
    Float,
    Image,
    Int,
    Money,
    NChar,
    NText,
    NVarChar,
    Real,
    SmallDateTime,
    SmallInt,
    SmallMoney,
    /// Table-valued parameter.
    Structured,
    Text,
    Time,
    TinyInt,
    UniqueIdentifier,
    VarBinary,
    VarChar,
    Variant,
    Xml,
}

impl DbType for SqlServerType {}

/// A named SQL Server parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlServerParameter {
    /// Name including the `@` prefix.
    pub name: String,
    pub value: Value,
    pub db_type: Option<SqlServerType>,
    /// Table type name for table-valued parameters.
    pub type_name: Option<String>,
    pub direction: ParameterDirection,
}

/// Microsoft SQL Server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlServer;

impl SqlServer {
    fn select_from(
        &self,
        mut builder: SqlBuilder<SqlServerType>,
        source: &str,
        object: String,
        kind: CommandKind,
        request: &SelectRequest<'_>,
        rules: &AuditRules,
    ) -> ChainResult<PreparedCommand<Self>> {
        if request.skip.is_some() && request.sort.is_empty() && request.count.is_none() {
            return Err(ChainError::InvalidArgument(
                "Skipping rows on SQL Server requires a sort order".to_string(),
            ));
        }

        let mut sql = String::from("SELECT ");
        if let Some(take) = request.take
            && request.skip.is_none()
            && request.count.is_none()
        {
            sql.push_str(&format!("TOP ({take}) "));
        }
        write_select_list(self, &builder, &mut sql, request.count.as_ref())?;
        sql.push_str(" FROM ");
        sql.push_str(source);
        if let Some(sampling) = request.sampling {
            sql.push_str(&table_sample(sampling));
        }
        let raw = write_where(&mut builder, &mut sql, &request.filter, false, Some(rules))?;
        if request.count.is_none() {
            builder.build_order_by_clause(&mut sql, " ORDER BY ", &request.sort, None)?;
            if let Some(skip) = request.skip {
                sql.push_str(&format!(" OFFSET {skip} ROWS"));
                if let Some(take) = request.take {
                    sql.push_str(&format!(" FETCH NEXT {take} ROWS ONLY"));
                }
            }
        }
        sql.push(';');

        let parameters = self.collect_parameters(&builder, raw.as_ref());
        Ok(PreparedCommand::Single(CommandPlan::new(kind, object, sql, parameters)))
    }

    /// `(@a, DEFAULT, ...)`: every formal parameter in declaration order.
    fn function_arguments(&self, builder: &mut SqlBuilder<SqlServerType>) -> String {
        let mut arguments = String::new();
        builder.build_parameter_list(&mut arguments, "", None, |_, placeholder| {
            Some(placeholder.unwrap_or("DEFAULT").to_string())
        });
        arguments
    }
}

fn table_sample(sampling: TableSampling) -> String {
    let (amount, seed) = match sampling {
        TableSampling::Rows { count, seed } => (format!("{count} ROWS"), seed),
        TableSampling::Percent { percent, seed } => (format!("{percent} PERCENT"), seed),
    };
    match seed {
        Some(seed) => format!(" TABLESAMPLE ({amount}) REPEATABLE ({seed})"),
        None => format!(" TABLESAMPLE ({amount})"),
    }
}

impl Dialect for SqlServer {
    type DbType = SqlServerType;
    type Parameter = SqlServerParameter;

    fn name(&self) -> &'static str {
        "SQL Server"
    }

    fn parameter_style(&self) -> ParameterStyle {
        ParameterStyle::Named
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_bracketed(name)
    }

    fn default_schema(&self) -> Option<&'static str> {
        Some("dbo")
    }

    fn variable_name(&self, sql_name: &str) -> String {
        format!("@{}", clr_safe_name(sql_name))
    }

    fn make_parameter(
        &self,
        entry: &SqlBuilderEntry<SqlServerType>,
        slot: ParameterSlot,
    ) -> SqlServerParameter {
        let value = entry.slot_value(slot);
        let direction = match (entry.is_output_parameter(), value.is_null()) {
            (false, _) => ParameterDirection::Input,
            (true, true) => ParameterDirection::Output,
            (true, false) => ParameterDirection::InputOutput,
        };
        SqlServerParameter {
            name: entry.slot_variable_name(slot),
            value,
            db_type: entry.details().db_type,
            type_name: entry.parameter_column().map(|c| c.table_type.clone()),
            direction,
        }
    }

    fn make_raw_parameter(&self, name: &str, value: Value) -> SqlServerParameter {
        let name = if name.starts_with('@') {
            name.to_string()
        } else {
            format!("@{name}")
        };
        SqlServerParameter {
            name,
            value,
            db_type: None,
            type_name: None,
            direction: ParameterDirection::Input,
        }
    }

    fn build_select(
        &self,
        builder: SqlBuilder<SqlServerType>,
        table: &ObjectName,
        request: &SelectRequest<'_>,
        rules: &AuditRules,
    ) -> ChainResult<PreparedCommand<Self>> {
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
        mut builder: SqlBuilder<SqlServerType>,
        table: &ObjectName,
        options: &InsertOptions,
    ) -> ChainResult<PreparedCommand<Self>> {
        let include_identity = options.identity_insert;
        let object = self.quote_object(table);
        let has_columns = builder.get_insert_columns(include_identity).next().is_some();

        let mut sql = String::new();
        if include_identity {
            sql.push_str(&format!("SET IDENTITY_INSERT {object} ON;"));
        }
        sql.push_str("INSERT INTO ");
        sql.push_str(&object);
        builder.build_insert_clause(&mut sql, " (", None, Some(")"), include_identity);
        builder.build_select_clause(&mut sql, " OUTPUT ", Some("Inserted."), None);
        if has_columns {
            builder.build_values_clause(&mut sql, " VALUES (", Some(")"), include_identity);
        } else {
            sql.push_str(" DEFAULT VALUES");
        }
        sql.push(';');
        if include_identity {
            sql.push_str(&format!("SET IDENTITY_INSERT {object} OFF;"));
        }

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
        mut builder: SqlBuilder<SqlServerType>,
        table: &ObjectName,
        options: &UpdateOptions,
    ) -> ChainResult<PreparedCommand<Self>> {
        let output = if options.return_old_values {
            "Deleted."
        } else {
            "Inserted."
        };
        let mut sql = format!("UPDATE {}", self.quote_object(table));
        builder.build_set_clause(&mut sql, " SET ", None, None)?;
        builder.build_select_clause(&mut sql, " OUTPUT ", Some(output), None);
        builder.build_where_clause(&mut sql, " WHERE ", Some(";"))?;

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
        mut builder: SqlBuilder<SqlServerType>,
        table: &ObjectName,
    ) -> ChainResult<PreparedCommand<Self>> {
        let mut sql = format!("DELETE FROM {}", self.quote_object(table));
        builder.build_select_clause(&mut sql, " OUTPUT ", Some("Deleted."), None);
        builder.build_where_clause(&mut sql, " WHERE ", Some(";"))?;

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
        mut builder: SqlBuilder<SqlServerType>,
        table: &ObjectName,
        options: &UpsertOptions,
    ) -> ChainResult<PreparedCommand<Self>> {
        require_bound_keys(&builder)?;
        let include_identity = options.identity_insert;
        let quoted = |e: &SqlBuilderEntry<SqlServerType>| e.details().quoted_sql_name.clone();
        let keys: Vec<String> = builder.get_key_columns().map(quoted).collect();
        let inserts: Vec<String> = builder
            .get_insert_columns(include_identity)
            .map(quoted)
            .collect();
        let updates: Vec<String> = builder.get_update_columns().map(quoted).collect();

        let sources = builder.indices(|e| {
            let name = &e.details().quoted_sql_name;
            !e.is_formal_parameter()
                && e.is_bound()
                && (keys.contains(name) || inserts.contains(name) || updates.contains(name))
        });
        let source_columns: Vec<String> = sources
            .iter()
            .map(|&i| builder.entries()[i].details().quoted_sql_name.clone())
            .collect();
        let source_values: Vec<String> = sources
            .into_iter()
            .map(|i| builder.bound_placeholder(i))
            .collect();

        let object = self.quote_object(table);
        let mut sql = String::new();
        if include_identity {
            sql.push_str(&format!("SET IDENTITY_INSERT {object} ON;"));
        }
        sql.push_str(&format!(
            "MERGE INTO {object} AS target USING (VALUES ({})) AS source ({}) ON {}",
            source_values.join(", "),
            source_columns.join(", "),
            keys.iter()
                .map(|k| format!("target.{k} = source.{k}"))
                .collect::<Vec<_>>()
                .join(" AND ")
        ));
        if !updates.is_empty() {
            sql.push_str(" WHEN MATCHED THEN UPDATE SET ");
            sql.push_str(
                &updates
                    .iter()
                    .map(|u| format!("{u} = source.{u}"))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }
        sql.push_str(" WHEN NOT MATCHED THEN INSERT");
        if inserts.is_empty() {
            sql.push_str(" DEFAULT VALUES");
        } else {
            sql.push_str(&format!(
                " ({}) VALUES ({})",
                inserts.join(", "),
                inserts
                    .iter()
                    .map(|c| format!("source.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        builder.build_select_clause(&mut sql, " OUTPUT ", Some("Inserted."), None);
        sql.push(';');
        if include_identity {
            sql.push_str(&format!("SET IDENTITY_INSERT {object} OFF;"));
        }

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
        mut builder: SqlBuilder<SqlServerType>,
        table: &ObjectName,
        filter: &FilterSpec<'_>,
        options: &UpdateOptions,
    ) -> ChainResult<PreparedCommand<Self>> {
        let output = if options.return_old_values {
            "Deleted."
        } else {
            "Inserted."
        };
        let mut sql = format!("UPDATE {}", self.quote_object(table));
        builder.build_set_clause(&mut sql, " SET ", None, None)?;
        builder.build_select_clause(&mut sql, " OUTPUT ", Some(output), None);
        let raw = write_where(&mut builder, &mut sql, filter, true, None)?;
        sql.push(';');

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
        mut builder: SqlBuilder<SqlServerType>,
        table: &ObjectName,
        filter: &FilterSpec<'_>,
    ) -> ChainResult<PreparedCommand<Self>> {
        let mut sql = format!("DELETE FROM {}", self.quote_object(table));
        builder.build_select_clause(&mut sql, " OUTPUT ", Some("Deleted."), None);
        let raw = write_where(&mut builder, &mut sql, filter, false, None)?;
        sql.push(';');

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
        mut builder: SqlBuilder<SqlServerType>,
        name: &ObjectName,
    ) -> ChainResult<PreparedCommand<Self>> {
        let mut sql = format!("EXEC {}", self.quote_object(name));
        builder.build_parameter_list(&mut sql, " ", None, |entry, placeholder| {
            placeholder.map(|placeholder| {
                let name = &entry.details().sql_variable_name;
                if entry.is_output_parameter() {
                    format!("{name} = {placeholder} OUTPUT")
                } else {
                    format!("{name} = {placeholder}")
                }
            })
        });
        sql.push(';');

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
        mut builder: SqlBuilder<SqlServerType>,
        name: &ObjectName,
        request: &SelectRequest<'_>,
        rules: &AuditRules,
    ) -> ChainResult<PreparedCommand<Self>> {
        let arguments = self.function_arguments(&mut builder);
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
        mut builder: SqlBuilder<SqlServerType>,
        name: &ObjectName,
    ) -> ChainResult<PreparedCommand<Self>> {
        let arguments = self.function_arguments(&mut builder);
        let sql = format!("SELECT {}({arguments});", self.quote_object(name));

        let parameters = self.collect_parameters(&builder, None);
        Ok(PreparedCommand::Single(CommandPlan::new(
            CommandKind::ScalarFunction,
            name.to_string(),
            sql,
            parameters,
        )))
    }
}
