/// Which columns a command should read back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DesiredColumns {
    /// Read nothing (non-query).
    #[default]
    NoColumns,
    /// The primary key, or failing that the identity column.
    AutoSelect,
    /// Every column of the table, view or result set.
    AllColumns,
    /// Exactly these columns, matched by SQL or host name.
    Named(Vec<String>),
}

impl DesiredColumns {
    /// Request the columns a [`ColumnList`](crate::ColumnList) type reads.
    pub fn of<T: crate::ColumnList>() -> Self {
        DesiredColumns::Named(T::column_names().into_iter().map(str::to_string).collect())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, DesiredColumns::NoColumns)
    }
}

/// How an argument is mapped onto the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArgumentOptions {
    /// Replace the table key with the members the argument marks as keys.
    pub use_key_attribute: bool,
    /// Only write members reported as changed by the argument.
    pub changed_properties_only: bool,
}

impl ArgumentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_key_attribute(mut self, on: bool) -> Self {
        self.use_key_attribute = on;
        self
    }

    pub fn changed_properties_only(mut self, on: bool) -> Self {
        self.changed_properties_only = on;
        self
    }
}

/// How a filter object is turned into a WHERE predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterOptions {
    /// Skip null members instead of emitting `IS NULL`.
    pub ignore_null_properties: bool,
}

impl FilterOptions {
    pub fn ignore_nulls() -> Self {
        Self {
            ignore_null_properties: true,
        }
    }
}
