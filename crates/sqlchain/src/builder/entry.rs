use super::ParameterSlot;
use crate::metadata::{ColumnMetadata, DbType};
use crate::value::Value;
use std::sync::Arc;

/// Role bits for one entry. Toggled independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags(u16);

impl Flags {
    const IS_KEY: u16 = 1;
    const USE_FOR_INSERT: u16 = 1 << 1;
    const USE_FOR_UPDATE: u16 = 1 << 2;
    const USE_FOR_READ: u16 = 1 << 3;
    const IS_FORMAL_PARAMETER: u16 = 1 << 4;
    const USE_PARAMETER: u16 = 1 << 5;
    const USE_PARAMETER_2: u16 = 1 << 6;
    const RESTRICTED_INSERT: u16 = 1 << 7;
    const RESTRICTED_UPDATE: u16 = 1 << 8;
    const RESTRICTED_READ: u16 = 1 << 9;
    const USE_CLR_NAME_AS_ALIAS: u16 = 1 << 10;
    const IS_OUTPUT_PARAMETER: u16 = 1 << 11;

    fn get(self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    fn set(&mut self, bit: u16, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

/// Table-valued-parameter column reference carried by an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterColumn {
    pub table_type: String,
    pub column: String,
}

/// One column or formal parameter inside a [`SqlBuilder`](super::SqlBuilder).
///
/// Holds the shared column metadata plus per-statement role flags and the
/// bound values, one per parameter pass. Only the owning builder changes the
/// flags.
#[derive(Debug, Clone)]
pub struct SqlBuilderEntry<T: DbType> {
    details: Arc<ColumnMetadata<T>>,
    flags: Flags,
    parameter_value: Option<Value>,
    parameter_value2: Option<Value>,
    parameter_column: Option<ParameterColumn>,
}

impl<T: DbType> SqlBuilderEntry<T> {
    pub(crate) fn for_column(details: Arc<ColumnMetadata<T>>) -> Self {
        let writable = !details.is_computed && !details.is_identity;
        let mut flags = Flags::default();
        flags.set(Flags::IS_KEY, details.is_primary_key);
        flags.set(Flags::USE_FOR_INSERT, writable);
        flags.set(Flags::USE_FOR_UPDATE, writable);
        Self {
            details,
            flags,
            parameter_value: None,
            parameter_value2: None,
            parameter_column: None,
        }
    }

    pub(crate) fn for_parameter(details: Arc<ColumnMetadata<T>>, is_output: bool) -> Self {
        let mut flags = Flags::default();
        flags.set(Flags::IS_FORMAL_PARAMETER, true);
        flags.set(Flags::IS_OUTPUT_PARAMETER, is_output);
        // Output parameters are always sent, even without a value.
        flags.set(Flags::USE_PARAMETER, is_output);
        Self {
            details,
            flags,
            parameter_value: is_output.then_some(Value::Null),
            parameter_value2: None,
            parameter_column: None,
        }
    }

    pub fn details(&self) -> &ColumnMetadata<T> {
        &self.details
    }

    pub fn is_key(&self) -> bool {
        self.flags.get(Flags::IS_KEY)
    }

    pub fn use_for_insert(&self) -> bool {
        self.flags.get(Flags::USE_FOR_INSERT)
    }

    pub fn use_for_update(&self) -> bool {
        self.flags.get(Flags::USE_FOR_UPDATE)
    }

    pub fn use_for_read(&self) -> bool {
        self.flags.get(Flags::USE_FOR_READ)
    }

    pub fn is_formal_parameter(&self) -> bool {
        self.flags.get(Flags::IS_FORMAL_PARAMETER)
    }

    pub fn is_output_parameter(&self) -> bool {
        self.flags.get(Flags::IS_OUTPUT_PARAMETER)
    }

    /// Bound in the first parameter pass.
    pub fn use_parameter(&self) -> bool {
        self.flags.get(Flags::USE_PARAMETER)
    }

    /// Bound in the second parameter pass.
    pub fn use_parameter2(&self) -> bool {
        self.flags.get(Flags::USE_PARAMETER_2)
    }

    pub fn restricted_insert(&self) -> bool {
        self.flags.get(Flags::RESTRICTED_INSERT)
    }

    pub fn restricted_update(&self) -> bool {
        self.flags.get(Flags::RESTRICTED_UPDATE)
    }

    pub fn restricted_read(&self) -> bool {
        self.flags.get(Flags::RESTRICTED_READ)
    }

    pub fn use_clr_name_as_alias(&self) -> bool {
        self.flags.get(Flags::USE_CLR_NAME_AS_ALIAS)
    }

    pub fn parameter_value(&self) -> Option<&Value> {
        self.parameter_value.as_ref()
    }

    /// Value bound in the second parameter pass.
    pub fn parameter_value2(&self) -> Option<&Value> {
        self.parameter_value2.as_ref()
    }

    /// The value a parameter for `slot` carries; unbound slots send null.
    pub fn slot_value(&self, slot: ParameterSlot) -> Value {
        let value = match slot {
            ParameterSlot::First => self.parameter_value(),
            ParameterSlot::Second => self.parameter_value2(),
        };
        value.cloned().unwrap_or(Value::Null)
    }

    /// Placeholder name for `slot`. The second pass gets a `_2` suffix so
    /// both passes can appear in one statement.
    pub fn slot_variable_name(&self, slot: ParameterSlot) -> String {
        match slot {
            ParameterSlot::First => self.details.sql_variable_name.clone(),
            ParameterSlot::Second => format!("{}_2", self.details.sql_variable_name),
        }
    }

    pub fn parameter_column(&self) -> Option<&ParameterColumn> {
        self.parameter_column.as_ref()
    }

    /// Case-insensitive match against the SQL name or the host name.
    pub(crate) fn matches(&self, name: &str) -> bool {
        self.details.sql_name.eq_ignore_ascii_case(name)
            || self.details.clr_name.eq_ignore_ascii_case(name)
    }

    pub(crate) fn set_is_key(&mut self, on: bool) {
        self.flags.set(Flags::IS_KEY, on);
    }

    pub(crate) fn set_use_for_insert(&mut self, on: bool) {
        self.flags.set(Flags::USE_FOR_INSERT, on);
    }

    pub(crate) fn set_use_for_update(&mut self, on: bool) {
        self.flags.set(Flags::USE_FOR_UPDATE, on);
    }

    pub(crate) fn set_use_for_read(&mut self, on: bool) {
        self.flags.set(Flags::USE_FOR_READ, on);
    }

    pub(crate) fn set_use_parameter(&mut self, on: bool) {
        self.flags.set(Flags::USE_PARAMETER, on);
    }

    pub(crate) fn set_use_parameter2(&mut self, on: bool) {
        self.flags.set(Flags::USE_PARAMETER_2, on);
    }

    pub(crate) fn set_restricted_insert(&mut self, on: bool) {
        self.flags.set(Flags::RESTRICTED_INSERT, on);
    }

    pub(crate) fn set_restricted_update(&mut self, on: bool) {
        self.flags.set(Flags::RESTRICTED_UPDATE, on);
    }

    pub(crate) fn set_restricted_read(&mut self, on: bool) {
        self.flags.set(Flags::RESTRICTED_READ, on);
    }

    pub(crate) fn set_use_clr_name_as_alias(&mut self, on: bool) {
        self.flags.set(Flags::USE_CLR_NAME_AS_ALIAS, on);
    }

    /// Bind a value. `None` input is stored as the database-null sentinel.
    pub(crate) fn set_parameter_value(&mut self, value: Value) {
        self.parameter_value = Some(value);
    }

    pub(crate) fn set_parameter_value2(&mut self, value: Value) {
        self.parameter_value2 = Some(value);
    }

    pub(crate) fn set_parameter_column(&mut self, column: Option<ParameterColumn>) {
        self.parameter_column = column;
    }

    /// Has a value for either parameter pass.
    pub(crate) fn is_bound(&self) -> bool {
        self.use_parameter() || self.use_parameter2()
    }

    /// Bound passes, first before second.
    pub(crate) fn bound_slots(&self) -> impl Iterator<Item = ParameterSlot> {
        let first = self.use_parameter().then_some(ParameterSlot::First);
        let second = self.use_parameter2().then_some(ParameterSlot::Second);
        first.into_iter().chain(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqlServerType;

    fn column() -> Arc<ColumnMetadata<SqlServerType>> {
        Arc::new(ColumnMetadata::new("Name", "[Name]", "@Name"))
    }

    #[test]
    fn flags_toggle_independently() {
        let mut e = SqlBuilderEntry::for_column(column());
        assert!(e.use_for_insert() && e.use_for_update());
        e.set_use_for_insert(false);
        assert!(!e.use_for_insert());
        assert!(e.use_for_update());
        e.set_restricted_read(true);
        e.set_use_clr_name_as_alias(true);
        assert!(e.restricted_read() && e.use_clr_name_as_alias());
        assert!(!e.restricted_insert());
    }

    #[test]
    fn identity_is_not_writable() {
        let details =
            Arc::new(ColumnMetadata::<SqlServerType>::new("Id", "[Id]", "@Id").identity());
        let e = SqlBuilderEntry::for_column(details);
        assert!(!e.use_for_insert());
        assert!(!e.use_for_update());
    }

    #[test]
    fn output_parameters_are_always_bound() {
        let e = SqlBuilderEntry::for_parameter(column(), true);
        assert!(e.use_parameter());
        assert_eq!(e.parameter_value(), Some(&Value::Null));
        let e = SqlBuilderEntry::for_parameter(column(), false);
        assert!(!e.use_parameter());
    }

    #[test]
    fn slots_carry_their_own_values() {
        let mut e = SqlBuilderEntry::for_column(column());
        e.set_parameter_value(Value::from("new"));
        e.set_use_parameter(true);
        e.set_parameter_value2(Value::from("old"));
        e.set_use_parameter2(true);

        assert_eq!(e.slot_value(ParameterSlot::First), Value::from("new"));
        assert_eq!(e.slot_value(ParameterSlot::Second), Value::from("old"));
        assert_eq!(e.slot_variable_name(ParameterSlot::First), "@Name");
        assert_eq!(e.slot_variable_name(ParameterSlot::Second), "@Name_2");
        assert_eq!(
            e.bound_slots().collect::<Vec<_>>(),
            vec![ParameterSlot::First, ParameterSlot::Second]
        );
    }
}
