//! Clause writers.
//!
//! Each writer appends `header`, the clause body and `footer` to `sql`, and
//! writes nothing at all when the clause would be empty.

use super::{
    ParameterSlot, ParameterStyle, SqlBuilder, SqlBuilderEntry, is_insert, is_select, is_update,
};
use crate::error::{ChainError, ChainResult};
use crate::metadata::DbType;
use crate::rules::{AuditRule, AuditRules, OperationTypes};
use crate::sort::SortExpression;
use crate::value::Value;

fn finish(sql: &mut String, header: &str, body: &str, footer: Option<&str>) {
    sql.push_str(header);
    sql.push_str(body);
    if let Some(footer) = footer {
        sql.push_str(footer);
    }
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = name.len().checked_sub(suffix.len())?;
    if !name.is_char_boundary(cut) || !name[cut..].eq_ignore_ascii_case(suffix) {
        return None;
    }
    Some(&name[..cut])
}

impl<T: DbType> SqlBuilder<T> {
    /// Column list for `SELECT`, `OUTPUT` or `RETURNING`.
    ///
    /// `prefix` is written before every column (`Inserted.`, `Deleted.`).
    pub fn build_select_clause(
        &self,
        sql: &mut String,
        header: &str,
        prefix: Option<&str>,
        footer: Option<&str>,
    ) {
        let prefix = prefix.unwrap_or("");
        let columns: Vec<String> = self
            .entries
            .iter()
            .filter(|e| is_select(e))
            .map(|e| {
                let details = e.details();
                if e.use_clr_name_as_alias() {
                    format!("{prefix}{} AS {}", details.quoted_sql_name, details.clr_name)
                } else {
                    format!("{prefix}{}", details.quoted_sql_name)
                }
            })
            .collect();
        if !columns.is_empty() {
            finish(sql, header, &columns.join(", "), footer);
        }
    }

    /// Column list for `INSERT`. Pairs with [`build_values_clause`](Self::build_values_clause)
    /// given the same `include_identity`.
    pub fn build_insert_clause(
        &self,
        sql: &mut String,
        header: &str,
        prefix: Option<&str>,
        footer: Option<&str>,
        include_identity: bool,
    ) {
        let prefix = prefix.unwrap_or("");
        let columns: Vec<String> = self
            .entries
            .iter()
            .filter(|e| is_insert(e, include_identity))
            .map(|e| format!("{prefix}{}", e.details().quoted_sql_name))
            .collect();
        if !columns.is_empty() {
            finish(sql, header, &columns.join(", "), footer);
        }
    }

    /// Placeholders for `VALUES`, one per insert column.
    pub fn build_values_clause(
        &mut self,
        sql: &mut String,
        header: &str,
        footer: Option<&str>,
        include_identity: bool,
    ) {
        let indices = self.indices(|e| is_insert(e, include_identity));
        if indices.is_empty() {
            return;
        }
        let values: Vec<String> = indices
            .into_iter()
            .map(|i| self.placeholder(i, ParameterSlot::First))
            .collect();
        finish(sql, header, &values.join(", "), footer);
    }

    /// `col = placeholder` pairs for `UPDATE ... SET`. Fails when there is
    /// nothing to set.
    pub fn build_set_clause(
        &mut self,
        sql: &mut String,
        header: &str,
        prefix: Option<&str>,
        footer: Option<&str>,
    ) -> ChainResult<()> {
        let indices = self.indices(is_update);
        if indices.is_empty() {
            return Err(ChainError::mapping(
                self.object(),
                "No columns were found to update. UPDATE requires at least one SET column",
            ));
        }
        let prefix = prefix.unwrap_or("");
        let pairs: Vec<String> = indices
            .into_iter()
            .map(|i| {
                let placeholder = self.placeholder(i, ParameterSlot::First);
                format!("{prefix}{} = {placeholder}", self.entries[i].details().quoted_sql_name)
            })
            .collect();
        finish(sql, header, &pairs.join(", "), footer);
        Ok(())
    }

    /// Key predicate for a single-row statement. Every key must be bound.
    pub fn build_where_clause(
        &mut self,
        sql: &mut String,
        header: &str,
        footer: Option<&str>,
    ) -> ChainResult<()> {
        let keys = self.indices(|e| !e.is_formal_parameter() && e.is_key());
        if keys.is_empty() {
            return Err(ChainError::mapping(
                self.object(),
                "No primary key was found. Use a key override or a filter instead",
            ));
        }
        if let Some(&unbound) = keys.iter().find(|&&i| !self.entries[i].is_bound()) {
            return Err(ChainError::mapping(
                self.object(),
                format!(
                    "The argument has no value for the key column {}",
                    self.entries[unbound].details().sql_name
                ),
            ));
        }
        let predicates: Vec<String> = keys
            .into_iter()
            .map(|i| {
                let placeholder = self.bound_placeholder(i);
                format!("{} = {placeholder}", self.entries[i].details().quoted_sql_name)
            })
            .collect();
        finish(sql, header, &predicates.join(" AND "), footer);
        Ok(())
    }

    /// [`build_where_clause`](Self::build_where_clause) with `?` placeholders
    /// regardless of the builder's style.
    pub fn build_anonymous_where_clause(
        &mut self,
        sql: &mut String,
        header: &str,
        footer: Option<&str>,
    ) -> ChainResult<()> {
        self.with_style(ParameterStyle::Positional, |b| b.build_where_clause(sql, header, footer))
    }

    /// Exclude soft-deleted rows. Columns already constrained by an explicit
    /// filter are left alone. Returns whether anything was written.
    pub fn build_soft_delete_clause(
        &mut self,
        sql: &mut String,
        header: &str,
        rules: &AuditRules,
        footer: Option<&str>,
    ) -> ChainResult<bool> {
        let mut predicates = Vec::new();
        for rule in rules.soft_delete_rules(OperationTypes::SELECT) {
            let AuditRule::SoftDelete { column, deleted_value, .. } = rule else {
                continue;
            };
            let indices =
                self.indices(|e| !e.is_formal_parameter() && e.matches(column) && !e.is_bound());
            for index in indices {
                predicates.push(self.soft_delete_predicate(index, deleted_value.clone())?);
            }
        }
        if predicates.is_empty() {
            return Ok(false);
        }
        finish(sql, header, &predicates.join(" AND "), footer);
        Ok(true)
    }

    pub fn build_anonymous_soft_delete_clause(
        &mut self,
        sql: &mut String,
        header: &str,
        rules: &AuditRules,
        footer: Option<&str>,
    ) -> ChainResult<bool> {
        self.with_style(ParameterStyle::Positional, |b| {
            b.build_soft_delete_clause(sql, header, rules, footer)
        })
    }

    fn soft_delete_predicate(&mut self, index: usize, deleted_value: Value) -> ChainResult<String> {
        self.bind(index, deleted_value, ParameterSlot::Second)?;
        let placeholder = self.placeholder(index, ParameterSlot::Second);
        Ok(format!("{} <> {placeholder}", self.entries[index].details().quoted_sql_name))
    }

    /// `ORDER BY` terms. Column names resolve against SQL and host names; a
    /// name that does not resolve is retried without a trailing `" DESC"`
    /// (sorting descending) or `" ACS"`.
    pub fn build_order_by_clause(
        &self,
        sql: &mut String,
        header: &str,
        sort: &[SortExpression],
        footer: Option<&str>,
    ) -> ChainResult<()> {
        if sort.is_empty() {
            return Ok(());
        }
        let mut terms = Vec::with_capacity(sort.len());
        for expression in sort {
            match expression {
                SortExpression::Expression(raw) => terms.push(raw.clone()),
                SortExpression::Column { name, descending } => {
                    let (entry, descending) = self.resolve_sort_column(name, *descending)?;
                    let quoted = &entry.details().quoted_sql_name;
                    terms.push(if descending {
                        format!("{quoted} DESC ")
                    } else {
                        quoted.clone()
                    });
                }
            }
        }
        finish(sql, header, &terms.join(", "), footer);
        Ok(())
    }

    fn resolve_sort_column(
        &self,
        name: &str,
        descending: bool,
    ) -> ChainResult<(&SqlBuilderEntry<T>, bool)> {
        let find = |n: &str| {
            self.entries
                .iter()
                .find(|e| !e.is_formal_parameter() && e.matches(n.trim_end()))
        };
        if let Some(entry) = find(name) {
            return Ok((entry, descending));
        }
        if let Some(entry) = strip_suffix_ignore_case(name, " DESC").and_then(find) {
            return Ok((entry, true));
        }
        if let Some(entry) = strip_suffix_ignore_case(name, " ACS").and_then(find) {
            return Ok((entry, false));
        }
        let legal: Vec<&str> = self
            .entries
            .iter()
            .filter(|e| !e.is_formal_parameter())
            .map(|e| e.details().sql_name.as_str())
            .collect();
        Err(ChainError::mapping(
            self.object(),
            format!(
                "Cannot find a column named {name} to sort by. Legal column names are: {}",
                legal.join(", ")
            ),
        ))
    }

    /// Argument list of a routine call.
    ///
    /// `format` receives each formal parameter with its placeholder (`None`
    /// when unbound) and returns the text to write, or `None` to leave the
    /// parameter out.
    pub fn build_parameter_list(
        &mut self,
        sql: &mut String,
        header: &str,
        footer: Option<&str>,
        format: impl Fn(&SqlBuilderEntry<T>, Option<&str>) -> Option<String>,
    ) {
        let indices = self.indices(|e| e.is_formal_parameter());
        let mut arguments = Vec::with_capacity(indices.len());
        for index in indices {
            let placeholder = self.entries[index].is_bound().then(|| self.bound_placeholder(index));
            if let Some(text) = format(&self.entries[index], placeholder.as_deref()) {
                arguments.push(text);
            }
        }
        if !arguments.is_empty() {
            finish(sql, header, &arguments.join(", "), footer);
        }
    }

    /// `SELECT <desired columns> FROM <table> WHERE <keys>`.
    pub fn build_select_by_key_statement(
        &mut self,
        sql: &mut String,
        quoted_table: &str,
        footer: Option<&str>,
    ) -> ChainResult<()> {
        if !self.has_read_fields() {
            return Err(ChainError::invariant(
                "A select-by-key statement needs at least one desired column",
            ));
        }
        self.build_select_clause(sql, "SELECT ", None, None);
        sql.push_str(" FROM ");
        sql.push_str(quoted_table);
        self.build_where_clause(sql, " WHERE ", footer)
    }

    /// Make the identity column the sole key, bound to `value`, and forget
    /// previously written placeholders. Used to read back a row after its
    /// identity has been generated.
    pub(crate) fn bind_identity_as_key(&mut self, value: Value) -> ChainResult<()> {
        let object = self.object();
        let identity = self
            .entries
            .iter()
            .position(|e| !e.is_formal_parameter() && e.details().is_identity)
            .ok_or_else(|| ChainError::mapping(object, "The table has no identity column"))?;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.set_is_key(i == identity);
            entry.set_use_parameter(false);
            entry.set_use_parameter2(false);
        }
        let entry = &mut self.entries[identity];
        entry.set_parameter_value(value);
        entry.set_use_parameter(true);
        self.rendered.clear();
        Ok(())
    }

    /// Forget previously written placeholders, keeping bound values.
    pub(crate) fn clear_rendered(&mut self) {
        self.rendered.clear();
    }
}
