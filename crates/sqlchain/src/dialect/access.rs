use super::{Dialect, require_bound_keys, write_select_list, write_where};
use crate::builder::{ParameterSlot, ParameterStyle, SqlBuilder, SqlBuilderEntry};
use crate::command::{
    ChainedCommand, CommandKind, CommandPlan, CountKind, FilterSpec, InsertOptions, PreparedCommand,
    SelectRequest, UpdateOptions, UpsertOptions,
};
use crate::error::{ChainError, ChainResult};
use crate::ident::{ObjectName, clr_safe_name, quote_bracketed};
use crate::metadata::DbType;
use crate::rules::AuditRules;
use crate::value::Value;

/// Access (OLE DB) column and parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessType {
    BigInt,
    Binary,
    Boolean,
    Currency,
    Date,
    Decimal,
    Double,
    Guid,
    Integer,
    LongVarBinary,
    LongVarWChar,
    Numeric,
    Single,
    SmallInt,
    UnsignedTinyInt,
    VarWChar,
    WChar,
}

impl DbType for AccessType {}

/// A positional Access parameter. The name is informational only.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessParameter {
    pub name: String,
    pub value: Value,
    pub db_type: Option<AccessType>,
}

/// Microsoft Access.
///
/// Access has no schemas, no row skipping, no `OUTPUT` clause and no
/// stored procedures. Rows written by an insert, update or delete are read
/// back with separate statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Access;

const IDENTITY_SQL: &str = "SELECT @@IDENTITY;";

impl Access {
    fn single(
        &self,
        builder: &SqlBuilder<AccessType>,
        kind: CommandKind,
        table: &ObjectName,
        sql: String,
    ) -> CommandPlan<AccessParameter> {
        CommandPlan::new(kind, table.to_string(), sql, self.collect_parameters(builder, None))
    }

    /// `SELECT <desired> FROM t WHERE <keys>;` as its own statement.
    fn select_by_key(
        &self,
        builder: &mut SqlBuilder<AccessType>,
        table: &ObjectName,
    ) -> ChainResult<CommandPlan<AccessParameter>> {
        builder.clear_rendered();
        let mut sql = String::new();
        builder.build_select_by_key_statement(&mut sql, &self.quote_object(table), Some(";"))?;
        Ok(self.single(builder, CommandKind::Select, table, sql))
    }
}

impl Dialect for Access {
    type DbType = AccessType;
    type Parameter = AccessParameter;

    fn name(&self) -> &'static str {
        "Access"
    }

    fn parameter_style(&self) -> ParameterStyle {
        ParameterStyle::Positional
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_bracketed(name)
    }

    /// Access has no schemas; only the object name is written.
    fn quote_object(&self, name: &ObjectName) -> String {
        quote_bracketed(&name.name)
    }

    fn default_schema(&self) -> Option<&'static str> {
        None
    }

    fn variable_name(&self, sql_name: &str) -> String {
        format!("@{}", clr_safe_name(sql_name))
    }

    fn make_parameter(
        &self,
        entry: &SqlBuilderEntry<AccessType>,
        slot: ParameterSlot,
    ) -> AccessParameter {
        AccessParameter {
            name: entry.slot_variable_name(slot),
            value: entry.slot_value(slot),
            db_type: entry.details().db_type,
        }
    }

    fn make_raw_parameter(&self, name: &str, value: Value) -> AccessParameter {
        AccessParameter {
            name: name.to_string(),
            value,
            db_type: None,
        }
    }

    fn build_select(
        &self,
        mut builder: SqlBuilder<AccessType>,
        table: &ObjectName,
        request: &SelectRequest<'_>,
        rules: &AuditRules,
    ) -> ChainResult<PreparedCommand<Self>> {
        if request.skip.is_some() {
            return Err(ChainError::unsupported("Access does not support skipping rows"));
        }
        if request.sampling.is_some() {
            return Err(ChainError::unsupported("Access does not support table sampling"));
        }
        if matches!(request.count, Some(CountKind::DistinctColumn(_))) {
            return Err(ChainError::unsupported("Access does not support COUNT(DISTINCT ...)"));
        }

        let mut sql = String::from("SELECT ");
        if let Some(take) = request.take
            && request.count.is_none()
        {
            sql.push_str(&format!("TOP {take} "));
        }
        write_select_list(self, &builder, &mut sql, request.count.as_ref())?;
        sql.push_str(" FROM ");
        sql.push_str(&self.quote_object(table));
        let raw = write_where(&mut builder, &mut sql, &request.filter, false, Some(rules))?;
        if request.count.is_none() {
            builder.build_order_by_clause(&mut sql, " ORDER BY ", &request.sort, None)?;
        }
        sql.push(';');

        let kind = if request.count.is_some() {
            CommandKind::Count
        } else {
            CommandKind::Select
        };
        let parameters = self.collect_parameters(&builder, raw.as_ref());
        Ok(PreparedCommand::Single(CommandPlan::new(kind, table.to_string(), sql, parameters)))
    }

    fn build_insert(
        &self,
        mut builder: SqlBuilder<AccessType>,
        table: &ObjectName,
        options: &InsertOptions,
    ) -> ChainResult<PreparedCommand<Self>> {
        if options.identity_insert {
            return Err(ChainError::unsupported("Access does not support identity insert"));
        }
        let mut sql = format!("INSERT INTO {}", self.quote_object(table));
        if builder.get_insert_columns(false).next().is_some() {
            builder.build_insert_clause(&mut sql, " (", None, Some(")"), false);
            builder.build_values_clause(&mut sql, " VALUES (", Some(")"), false);
        } else {
            sql.push_str(" DEFAULT VALUES");
        }
        sql.push(';');

        let insert = self.single(&builder, CommandKind::Insert, table, sql);
        if !builder.has_read_fields() {
            return Ok(PreparedCommand::Single(insert));
        }

        let has_identity = builder.entries().iter().any(|e| e.details().is_identity);
        if !has_identity {
            // Nothing is generated; the row is read back by the key it was given.
            require_bound_keys(&builder)?;
            let select = self.select_by_key(&mut builder, table)?;
            return Ok(PreparedCommand::Sequence {
                steps: vec![insert, select],
                result: 1,
            });
        }
        Ok(PreparedCommand::Chained(ChainedCommand::new(
            *self,
            builder,
            table.clone(),
            insert,
            IDENTITY_SQL,
        )))
    }

    fn build_update(
        &self,
        mut builder: SqlBuilder<AccessType>,
        table: &ObjectName,
        options: &UpdateOptions,
    ) -> ChainResult<PreparedCommand<Self>> {
        let mut sql = format!("UPDATE {}", self.quote_object(table));
        builder.build_set_clause(&mut sql, " SET ", None, None)?;
        builder.build_anonymous_where_clause(&mut sql, " WHERE ", Some(";"))?;
        let update = self.single(&builder, CommandKind::Update, table, sql);
        if !builder.has_read_fields() {
            return Ok(PreparedCommand::Single(update));
        }

        let select = self.select_by_key(&mut builder, table)?;
        Ok(if options.return_old_values {
            PreparedCommand::Sequence {
                steps: vec![select, update],
                result: 0,
            }
        } else {
            PreparedCommand::Sequence {
                steps: vec![update, select],
                result: 1,
            }
        })
    }

    fn build_delete(
        &self,
        mut builder: SqlBuilder<AccessType>,
        table: &ObjectName,
    ) -> ChainResult<PreparedCommand<Self>> {
        let mut sql = format!("DELETE FROM {}", self.quote_object(table));
        builder.build_anonymous_where_clause(&mut sql, " WHERE ", Some(";"))?;
        let delete = self.single(&builder, CommandKind::Delete, table, sql);
        if !builder.has_read_fields() {
            return Ok(PreparedCommand::Single(delete));
        }

        let select = self.select_by_key(&mut builder, table)?;
        Ok(PreparedCommand::Sequence {
            steps: vec![select, delete],
            result: 0,
        })
    }

    fn build_upsert(
        &self,
        _builder: SqlBuilder<AccessType>,
        _table: &ObjectName,
        _options: &UpsertOptions,
    ) -> ChainResult<PreparedCommand<Self>> {
        Err(ChainError::unsupported("Access does not support upsert"))
    }

    fn build_update_set(
        &self,
        mut builder: SqlBuilder<AccessType>,
        table: &ObjectName,
        filter: &FilterSpec<'_>,
        _options: &UpdateOptions,
    ) -> ChainResult<PreparedCommand<Self>> {
        if builder.has_read_fields() {
            return Err(ChainError::unsupported(
                "Access cannot return rows from a set-based update",
            ));
        }
        let mut sql = format!("UPDATE {}", self.quote_object(table));
        builder.build_set_clause(&mut sql, " SET ", None, None)?;
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
        mut builder: SqlBuilder<AccessType>,
        table: &ObjectName,
        filter: &FilterSpec<'_>,
    ) -> ChainResult<PreparedCommand<Self>> {
        if builder.has_read_fields() {
            return Err(ChainError::unsupported(
                "Access cannot return rows from a set-based delete",
            ));
        }
        let mut sql = format!("DELETE FROM {}", self.quote_object(table));
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
        _builder: SqlBuilder<AccessType>,
        name: &ObjectName,
    ) -> ChainResult<PreparedCommand<Self>> {
        Err(ChainError::unsupported(format!(
            "Access does not support stored procedures ({name})"
        )))
    }

    fn build_table_function_call(
        &self,
        _builder: SqlBuilder<AccessType>,
        name: &ObjectName,
        _request: &SelectRequest<'_>,
        _rules: &AuditRules,
    ) -> ChainResult<PreparedCommand<Self>> {
        Err(ChainError::unsupported(format!(
            "Access does not support table-valued functions ({name})"
        )))
    }

    fn build_scalar_function_call(
        &self,
        _builder: SqlBuilder<AccessType>,
        name: &ObjectName,
    ) -> ChainResult<PreparedCommand<Self>> {
        Err(ChainError::unsupported(format!(
            "Access does not support user-defined functions ({name})"
        )))
    }
}
