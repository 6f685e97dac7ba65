//! Column-state SQL builder.
//!
//! A [`SqlBuilder`] holds one [`SqlBuilderEntry`] per column (or formal
//! parameter) of a table, view or routine. Commands clone the template kept in
//! the metadata cache, apply an argument, audit rules and desired columns to
//! the clone, and then ask it for SQL fragments and parameters.
//!
//! ## Placeholders
//!
//! Every placeholder the builder writes is recorded, so parameters come out in
//! the order the SQL consumes them:
//!
//! - [`ParameterStyle::Named`]: `@Name`, one parameter per column.
//! - [`ParameterStyle::Numbered`]: `$1`, `$2`, ... one number per column.
//! - [`ParameterStyle::Positional`]: `?`, one parameter per occurrence.

mod clauses;
mod entry;
mod options;

#[cfg(test)]
mod tests;

pub use entry::{ParameterColumn, SqlBuilderEntry};
pub use options::{ArgumentOptions, DesiredColumns, FilterOptions};

use crate::argument::{Argument, DataObject};
use crate::error::{ChainError, ChainResult};
use crate::ident::{ObjectName, is_plain_identifier};
use crate::metadata::{ColumnMetadata, DbType, ParameterDirection, ParameterMetadata};
use crate::rules::{AuditRule, AuditRules, OperationTypes, RuleContext};
use crate::value::Value;
use std::sync::Arc;

/// How placeholders are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterStyle {
    /// The column's declared variable name, e.g. `@FirstName`.
    #[default]
    Named,
    /// `$n`, numbered in order of first use.
    Numbered,
    /// `?`, bound once per occurrence.
    Positional,
}

/// Which binding pass a parameter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSlot {
    First,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rendered {
    index: usize,
    slot: ParameterSlot,
}

/// Per-statement builder over a table, view or routine.
#[derive(Debug, Clone)]
pub struct SqlBuilder<T: DbType> {
    name: ObjectName,
    entries: Vec<SqlBuilderEntry<T>>,
    strict_mode: bool,
    style: ParameterStyle,
    rendered: Vec<Rendered>,
    parameter_offset: usize,
}

impl<T: DbType> SqlBuilder<T> {
    /// Builder over the columns of a table or view.
    pub fn for_columns(name: ObjectName, columns: &[Arc<ColumnMetadata<T>>]) -> Self {
        Self {
            name,
            entries: columns
                .iter()
                .map(|c| SqlBuilderEntry::for_column(Arc::clone(c)))
                .collect(),
            strict_mode: false,
            style: ParameterStyle::Named,
            rendered: Vec::new(),
            parameter_offset: 0,
        }
    }

    /// Builder over a routine: formal parameters first, then result columns.
    /// Return-value parameters are not part of the call syntax and are skipped.
    pub fn for_routine(
        name: ObjectName,
        parameters: &[Arc<ParameterMetadata<T>>],
        columns: &[Arc<ColumnMetadata<T>>],
    ) -> Self {
        let mut entries: Vec<_> = parameters
            .iter()
            .filter(|p| p.direction != ParameterDirection::Return)
            .map(|p| {
                SqlBuilderEntry::for_parameter(Arc::new(p.to_column()), p.direction.is_output())
            })
            .collect();
        entries.extend(columns.iter().map(|c| SqlBuilderEntry::for_column(Arc::clone(c))));
        Self {
            name,
            entries,
            strict_mode: false,
            style: ParameterStyle::Named,
            rendered: Vec::new(),
            parameter_offset: 0,
        }
    }

    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    pub fn set_strict_mode(&mut self, strict_mode: bool) {
        self.strict_mode = strict_mode;
    }

    pub fn parameter_style(&self) -> ParameterStyle {
        self.style
    }

    pub fn set_parameter_style(&mut self, style: ParameterStyle) {
        self.style = style;
    }

    pub fn with_parameter_style(mut self, style: ParameterStyle) -> Self {
        self.style = style;
        self
    }

    pub fn entries(&self) -> &[SqlBuilderEntry<T>] {
        &self.entries
    }

    /// Entry by SQL or host name. Formal parameters are included.
    pub fn entry(&self, name: &str) -> Option<&SqlBuilderEntry<T>> {
        self.entries.iter().find(|e| e.matches(name))
    }

    fn has_formal_parameters(&self) -> bool {
        self.entries.iter().any(|e| e.is_formal_parameter())
    }

    fn object(&self) -> String {
        self.name.to_string()
    }

    // ==================== Argument ====================

    /// Map an argument's members onto the entries.
    ///
    /// Against a routine, members bind formal parameters; otherwise they bind
    /// columns. In strict mode an unmatched member fails, except for a
    /// non-query delete where extra members are expected.
    pub fn apply_argument_value(
        &mut self,
        argument: Argument<'_>,
        options: ArgumentOptions,
        is_non_query_delete: bool,
    ) -> ChainResult<()> {
        let targets_parameters = self.has_formal_parameters();
        let enforce = self.strict_mode && !is_non_query_delete;

        match argument {
            Argument::Map(map) => {
                if options.changed_properties_only {
                    return Err(ChainError::InvalidArgument(
                        "Only changed properties were requested, but a map argument does not track changes"
                            .to_string(),
                    ));
                }
                for (key, value) in map {
                    let mut found = false;
                    for entry in self
                        .entries
                        .iter_mut()
                        .filter(|e| e.is_formal_parameter() == targets_parameters && e.matches(key))
                    {
                        entry.set_parameter_value(value.clone());
                        entry.set_use_parameter(true);
                        found = true;
                    }
                    if !found && enforce {
                        return Err(self.unmatched_member(key));
                    }
                }
            }
            Argument::Object(object) => {
                let properties = object.properties();
                let changed = if options.changed_properties_only {
                    Some(object.changed_properties().ok_or_else(|| {
                        ChainError::InvalidArgument(
                            "Only changed properties were requested, but the argument does not track changes"
                                .to_string(),
                        )
                    })?)
                } else {
                    None
                };
                let override_keys = options.use_key_attribute && object.declares_keys();
                if override_keys {
                    for entry in self.entries.iter_mut().filter(|e| !e.is_formal_parameter()) {
                        entry.set_is_key(false);
                    }
                }

                for property in properties.iter().filter(|p| !p.not_mapped) {
                    let mapped = property.mapped_name();
                    if !is_plain_identifier(mapped) {
                        return Err(ChainError::unsupported(format!(
                            "Member {} maps to column {mapped}, which requires quoting",
                            property.name
                        )));
                    }
                    let mut found = false;
                    for entry in self
                        .entries
                        .iter_mut()
                        .filter(|e| e.is_formal_parameter() == targets_parameters)
                    {
                        let details = entry.details();
                        let by_clr_name = if details.sql_name.eq_ignore_ascii_case(mapped) {
                            false
                        } else if details.clr_name.eq_ignore_ascii_case(property.name) {
                            true
                        } else {
                            continue;
                        };
                        found = true;
                        if by_clr_name {
                            entry.set_use_clr_name_as_alias(true);
                        }
                        entry.set_parameter_value(property.value.clone());
                        entry.set_use_parameter(true);
                        if override_keys {
                            entry.set_is_key(property.is_key);
                        }
                        if property.ignore_on_insert {
                            entry.set_use_for_insert(false);
                        }
                        if property.ignore_on_update {
                            entry.set_use_for_update(false);
                        }
                        if let Some(changed) = &changed
                            && !changed.iter().any(|c| c.eq_ignore_ascii_case(property.name))
                        {
                            entry.set_use_for_update(false);
                        }
                    }
                    if !found && enforce {
                        return Err(self.unmatched_member(property.name));
                    }
                }
            }
        }
        Ok(())
    }

    fn unmatched_member(&self, member: &str) -> ChainError {
        let target = if self.has_formal_parameters() {
            "parameter"
        } else {
            "column"
        };
        ChainError::mapping(
            self.object(),
            format!("Strict mode: no {target} matches the argument member {member}"),
        )
    }

    /// Layer audit and restriction rules over the applied argument.
    pub fn apply_rules(
        &mut self,
        rules: &AuditRules,
        operation: OperationTypes,
        argument: Option<Argument<'_>>,
    ) -> ChainResult<()> {
        let user = rules.user().map(|u| u as &dyn DataObject);
        for rule in rules.rules() {
            if matches!(rule, AuditRule::RestrictColumn { .. })
                || !rule.applies_to().intersects(operation)
            {
                continue;
            }
            for entry in self
                .entries
                .iter_mut()
                .filter(|e| !e.is_formal_parameter() && e.matches(rule.column()))
            {
                let value = {
                    let ctx = RuleContext {
                        argument,
                        user,
                        current_value: entry.parameter_value(),
                        operation,
                    };
                    rule.generate(&ctx)?
                };
                let Some(value) = value else { continue };
                entry.set_parameter_value(value);
                entry.set_use_parameter(true);
                if entry.details().is_identity || entry.details().is_computed {
                    continue;
                }
                // An upsert runs both halves; each half only writes what its rules allow.
                let applies_to = rule.applies_to();
                if operation.intersects(OperationTypes::INSERT) {
                    entry.set_use_for_insert(applies_to.intersects(OperationTypes::INSERT));
                }
                let updating = OperationTypes::UPDATE | OperationTypes::DELETE;
                if operation.intersects(updating) {
                    entry.set_use_for_update(applies_to.intersects(updating));
                }
            }
        }

        let name = &self.name;
        for (column, applies_to) in rules.active_restrictions(name) {
            for entry in self
                .entries
                .iter_mut()
                .filter(|e| !e.is_formal_parameter() && e.matches(column))
            {
                if applies_to.intersects(OperationTypes::INSERT) {
                    entry.set_restricted_insert(true);
                }
                if applies_to.intersects(OperationTypes::UPDATE) {
                    entry.set_restricted_update(true);
                }
                if applies_to.intersects(OperationTypes::SELECT) {
                    entry.set_restricted_read(true);
                }
            }
        }
        Ok(())
    }

    /// `apply_argument_value` followed by `apply_rules`, for writes that
    /// are not deletes.
    pub fn override_argument_values(
        &mut self,
        rules: &AuditRules,
        operation: OperationTypes,
        argument: Argument<'_>,
        options: ArgumentOptions,
    ) -> ChainResult<()> {
        self.apply_argument_value(argument, options, false)?;
        self.apply_rules(rules, operation, Some(argument))
    }

    // ==================== Keys and desired columns ====================

    /// Treat exactly the named columns as the key for this statement.
    pub fn override_keys(&mut self, names: &[&str]) -> ChainResult<()> {
        if names.is_empty() {
            return Err(ChainError::ArgumentEmpty("names"));
        }
        for name in names {
            if !self.entries.iter().any(|e| !e.is_formal_parameter() && e.matches(name)) {
                return Err(ChainError::mapping(
                    self.object(),
                    format!("Cannot find a column named {name} to use as a key"),
                ));
            }
        }
        for entry in self.entries.iter_mut().filter(|e| !e.is_formal_parameter()) {
            let is_key = names.iter().any(|n| entry.matches(n));
            entry.set_is_key(is_key);
        }
        Ok(())
    }

    /// Turn a delete into a soft delete: nothing is written except what the
    /// delete rules stamp afterwards.
    pub(crate) fn clear_update_columns(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.set_use_for_update(false);
        }
    }

    /// Mark the columns a command should read back.
    pub fn apply_desired_columns(&mut self, desired: &DesiredColumns) -> ChainResult<()> {
        match desired {
            DesiredColumns::NoColumns => Ok(()),
            DesiredColumns::AllColumns => {
                for entry in self.entries.iter_mut().filter(|e| !e.is_formal_parameter()) {
                    entry.set_use_for_read(true);
                }
                Ok(())
            }
            DesiredColumns::AutoSelect => {
                let has_key = self.entries.iter().any(|e| !e.is_formal_parameter() && e.is_key());
                let has_identity = self
                    .entries
                    .iter()
                    .any(|e| !e.is_formal_parameter() && e.details().is_identity);
                if !has_key && !has_identity {
                    return Err(ChainError::mapping(
                        self.object(),
                        "Cannot auto-select: there is no primary key or identity column",
                    ));
                }
                for entry in self.entries.iter_mut().filter(|e| !e.is_formal_parameter()) {
                    let pick = if has_key {
                        entry.is_key()
                    } else {
                        entry.details().is_identity
                    };
                    if pick {
                        entry.set_use_for_read(true);
                    }
                }
                Ok(())
            }
            DesiredColumns::Named(names) => {
                if names.is_empty() {
                    return Err(ChainError::invariant(
                        "An explicit desired-column list must not be empty",
                    ));
                }
                let mut matched_any = false;
                for name in names {
                    let mut found = false;
                    for entry in self.entries.iter_mut().filter(|e| !e.is_formal_parameter()) {
                        let details = entry.details();
                        let by_clr_name = if details.sql_name.eq_ignore_ascii_case(name) {
                            false
                        } else if details.clr_name.eq_ignore_ascii_case(name) {
                            true
                        } else {
                            continue;
                        };
                        if by_clr_name {
                            entry.set_use_clr_name_as_alias(true);
                        }
                        entry.set_use_for_read(true);
                        found = true;
                    }
                    if !found && self.strict_mode {
                        return Err(ChainError::mapping(
                            self.object(),
                            format!("Strict mode: the desired column {name} was not found"),
                        ));
                    }
                    matched_any |= found;
                }
                if !matched_any {
                    return Err(ChainError::mapping(
                        self.object(),
                        format!("None of the desired columns were found: {}", names.join(", ")),
                    ));
                }
                Ok(())
            }
        }
    }

    // ==================== Filters ====================

    /// Build an AND-of-equalities predicate from a filter argument, binding
    /// every non-null member as a parameter.
    ///
    /// Returns the predicate without a leading `WHERE`; empty when nothing
    /// applies.
    pub fn apply_filter_value(
        &mut self,
        filter: Argument<'_>,
        options: FilterOptions,
        second_slot: bool,
    ) -> ChainResult<String> {
        let slot = if second_slot {
            ParameterSlot::Second
        } else {
            ParameterSlot::First
        };
        let members: Vec<(String, String, Value)> = match filter {
            Argument::Map(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), k.clone(), v.clone()))
                .collect(),
            Argument::Object(object) => object
                .properties()
                .into_iter()
                .filter(|p| !p.not_mapped)
                .map(|p| {
                    let mapped = p.mapped_name();
                    if !is_plain_identifier(mapped) {
                        return Err(ChainError::unsupported(format!(
                            "Member {} maps to column {mapped}, which requires quoting",
                            p.name
                        )));
                    }
                    Ok((mapped.to_string(), p.name.to_string(), p.value))
                })
                .collect::<ChainResult<_>>()?,
        };

        let mut predicates = Vec::new();
        for (mapped, member, value) in members {
            let indices: Vec<usize> = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| {
                    !e.is_formal_parameter()
                        && (e.details().sql_name.eq_ignore_ascii_case(&mapped)
                            || e.details().clr_name.eq_ignore_ascii_case(&member))
                })
                .map(|(i, _)| i)
                .collect();
            if indices.is_empty() {
                if self.strict_mode {
                    return Err(ChainError::mapping(
                        self.object(),
                        format!("Strict mode: no column matches the filter member {member}"),
                    ));
                }
                continue;
            }
            for index in indices {
                let quoted = self.entries[index].details().quoted_sql_name.clone();
                if value.is_null() {
                    if !options.ignore_null_properties {
                        predicates.push(format!("{quoted} IS NULL"));
                    }
                    continue;
                }
                self.bind(index, value.clone(), slot)?;
                let placeholder = self.placeholder(index, slot);
                predicates.push(format!("{quoted} = {placeholder}"));
            }
        }
        Ok(predicates.join(" AND "))
    }

    /// [`apply_filter_value`](Self::apply_filter_value) with `?` placeholders
    /// regardless of the builder's style.
    pub fn apply_anonymous_filter_value(
        &mut self,
        filter: Argument<'_>,
        options: FilterOptions,
        second_slot: bool,
    ) -> ChainResult<String> {
        self.with_style(ParameterStyle::Positional, |b| {
            b.apply_filter_value(filter, options, second_slot)
        })
    }

    /// Bind a value to an entry for one slot. Each slot holds its own value;
    /// binding a slot twice with different values is rejected.
    fn bind(&mut self, index: usize, value: Value, slot: ParameterSlot) -> ChainResult<()> {
        let object = self.object();
        let entry = &mut self.entries[index];
        let existing = match slot {
            ParameterSlot::First if entry.use_parameter() => entry.parameter_value(),
            ParameterSlot::Second if entry.use_parameter2() => entry.parameter_value2(),
            _ => None,
        };
        if let Some(existing) = existing
            && existing != &value
        {
            return Err(ChainError::unsupported(format!(
                "Column {} of {object} cannot be bound to two different values in one pass",
                entry.details().sql_name
            )));
        }
        match slot {
            ParameterSlot::First => {
                entry.set_parameter_value(value);
                entry.set_use_parameter(true);
            }
            ParameterSlot::Second => {
                entry.set_parameter_value2(value);
                entry.set_use_parameter2(true);
            }
        }
        Ok(())
    }

    fn with_style<R>(&mut self, style: ParameterStyle, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.style, style);
        let result = f(self);
        self.style = previous;
        result
    }

    // ==================== Placeholders and parameters ====================

    /// Write the placeholder for an entry and record its use.
    pub(crate) fn placeholder(&mut self, index: usize, slot: ParameterSlot) -> String {
        let record = Rendered { index, slot };
        let same = |r: &Rendered| r.index == index && r.slot == slot;
        match self.style {
            ParameterStyle::Named => {
                if !self.rendered.iter().any(same) {
                    self.rendered.push(record);
                }
                self.entries[index].slot_variable_name(slot)
            }
            ParameterStyle::Numbered => {
                let position = match self.rendered.iter().position(same) {
                    Some(position) => position,
                    None => {
                        self.rendered.push(record);
                        self.rendered.len() - 1
                    }
                };
                format!("${}", self.parameter_offset + position + 1)
            }
            ParameterStyle::Positional => {
                self.rendered.push(record);
                "?".to_string()
            }
        }
    }

    /// Start numbered placeholders after `offset` parameters that precede the
    /// builder's own (raw SQL arguments).
    pub(crate) fn set_parameter_offset(&mut self, offset: usize) {
        self.parameter_offset = offset;
    }

    /// Placeholder for a bound entry, using whichever slot bound it.
    pub(crate) fn bound_placeholder(&mut self, index: usize) -> String {
        let slot = if self.entries[index].use_parameter() {
            ParameterSlot::First
        } else {
            ParameterSlot::Second
        };
        self.placeholder(index, slot)
    }

    /// Every bound slot in column order, built with `factory`.
    ///
    /// Suited to named parameters, where order does not matter and each
    /// slot is sent once.
    pub fn get_parameters<P>(
        &self,
        mut factory: impl FnMut(&SqlBuilderEntry<T>, ParameterSlot) -> P,
    ) -> Vec<P> {
        self.entries
            .iter()
            .flat_map(|e| e.bound_slots().map(move |slot| (e, slot)))
            .map(|(e, slot)| factory(e, slot))
            .collect()
    }

    /// Parameters in the order the written SQL consumes them.
    pub fn get_rendered_parameters<P>(
        &self,
        mut factory: impl FnMut(&SqlBuilderEntry<T>, ParameterSlot) -> P,
    ) -> Vec<P> {
        self.rendered
            .iter()
            .map(|r| factory(&self.entries[r.index], r.slot))
            .collect()
    }

    /// Number of parameters written so far.
    pub fn rendered_parameter_count(&self) -> usize {
        self.rendered.len()
    }

    // ==================== Column sets ====================

    pub fn get_select_columns(&self) -> impl Iterator<Item = &SqlBuilderEntry<T>> {
        self.entries.iter().filter(|e| is_select(e))
    }

    pub fn get_insert_columns(
        &self,
        include_identity: bool,
    ) -> impl Iterator<Item = &SqlBuilderEntry<T>> {
        self.entries.iter().filter(move |e| is_insert(e, include_identity))
    }

    pub fn get_update_columns(&self) -> impl Iterator<Item = &SqlBuilderEntry<T>> {
        self.entries.iter().filter(|e| is_update(e))
    }

    pub fn get_key_columns(&self) -> impl Iterator<Item = &SqlBuilderEntry<T>> {
        self.entries.iter().filter(|e| !e.is_formal_parameter() && e.is_key())
    }

    pub fn get_formal_parameters(&self) -> impl Iterator<Item = &SqlBuilderEntry<T>> {
        self.entries.iter().filter(|e| e.is_formal_parameter())
    }

    /// At least one column will be read back.
    pub fn has_read_fields(&self) -> bool {
        self.entries.iter().any(|e| is_select(e))
    }

    pub(crate) fn indices(&self, pick: impl Fn(&SqlBuilderEntry<T>) -> bool) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| pick(e))
            .map(|(i, _)| i)
            .collect()
    }

    /// Attach a table-valued-parameter column reference to a formal parameter.
    pub fn set_parameter_column(
        &mut self,
        parameter: &str,
        column: ParameterColumn,
    ) -> ChainResult<()> {
        let object = self.object();
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.is_formal_parameter() && e.matches(parameter))
            .ok_or_else(|| ChainError::mapping(object, format!("No parameter named {parameter}")))?;
        entry.set_parameter_column(Some(column));
        Ok(())
    }
}

fn is_select<T: DbType>(e: &SqlBuilderEntry<T>) -> bool {
    !e.is_formal_parameter() && e.use_for_read() && !e.restricted_read()
}

fn is_insert<T: DbType>(e: &SqlBuilderEntry<T>, include_identity: bool) -> bool {
    let wanted = (e.use_for_insert() && !e.restricted_insert())
        || (include_identity && e.details().is_identity);
    !e.is_formal_parameter() && wanted && e.use_parameter()
}

fn is_update<T: DbType>(e: &SqlBuilderEntry<T>) -> bool {
    !e.is_formal_parameter()
        && e.use_for_update()
        && !e.restricted_update()
        && !e.is_key()
        && e.use_parameter()
}
