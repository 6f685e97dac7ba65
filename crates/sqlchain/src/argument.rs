//! Argument sources: the values a command binds to columns.
//!
//! An argument is either a [`DataObject`] (a struct that describes its own
//! members) or a name → [`Value`] map. The [`data_object!`](crate::data_object)
//! macro implements [`DataObject`] and [`FromRow`](crate::FromRow) for a plain
//! struct.

use crate::value::Value;
use std::collections::BTreeMap;

/// One readable member of a [`DataObject`].
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    /// Member name as declared on the type.
    pub name: &'static str,
    /// Column the member maps to, when it differs from `name`.
    pub column: Option<&'static str>,
    pub value: Value,
    /// The member is part of the object's self-declared key.
    pub is_key: bool,
    pub ignore_on_insert: bool,
    pub ignore_on_update: bool,
    /// The member does not correspond to any column.
    pub not_mapped: bool,
}

impl PropertyValue {
    pub fn new(name: &'static str, value: impl Into<Value>) -> Self {
        Self {
            name,
            column: None,
            value: value.into(),
            is_key: false,
            ignore_on_insert: false,
            ignore_on_update: false,
            not_mapped: false,
        }
    }

    pub fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }

    pub fn ignore_on_insert(mut self) -> Self {
        self.ignore_on_insert = true;
        self
    }

    pub fn ignore_on_update(mut self) -> Self {
        self.ignore_on_update = true;
        self
    }

    pub fn not_mapped(mut self) -> Self {
        self.not_mapped = true;
        self
    }

    /// The name to match against database column names.
    pub fn mapped_name(&self) -> &'static str {
        self.column.unwrap_or(self.name)
    }
}

/// A value that can describe its own members.
pub trait DataObject {
    /// Every readable member with its current value.
    fn properties(&self) -> Vec<PropertyValue>;

    /// Whether the type declares its own key members. When it does and the
    /// caller asks for it, those members replace the table's primary key.
    fn declares_keys(&self) -> bool {
        self.properties().iter().any(|p| p.is_key)
    }

    /// Names of members changed since the object was loaded, or `None` when
    /// the type does not track changes.
    fn changed_properties(&self) -> Option<Vec<&'static str>> {
        None
    }
}

/// Column list for a [`DataObject`] type, used to request exactly the columns
/// its `FromRow` implementation reads.
pub trait ColumnList {
    fn column_names() -> Vec<&'static str>;
}

/// An argument handed to the builder.
#[derive(Clone, Copy)]
pub enum Argument<'a> {
    Object(&'a dyn DataObject),
    Map(&'a BTreeMap<String, Value>),
}

impl<'a> Argument<'a> {
    pub fn object(value: &'a dyn DataObject) -> Self {
        Argument::Object(value)
    }

    pub fn map(value: &'a BTreeMap<String, Value>) -> Self {
        Argument::Map(value)
    }
}

impl std::fmt::Debug for Argument<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Argument::Object(o) => f.debug_tuple("Object").field(&o.properties()).finish(),
            Argument::Map(m) => f.debug_tuple("Map").field(m).finish(),
        }
    }
}

impl<'a> From<&'a BTreeMap<String, Value>> for Argument<'a> {
    fn from(value: &'a BTreeMap<String, Value>) -> Self {
        Argument::Map(value)
    }
}

impl<'a, T: DataObject> From<&'a T> for Argument<'a> {
    fn from(value: &'a T) -> Self {
        Argument::Object(value)
    }
}

/// Define a struct and implement [`DataObject`], [`ColumnList`] and
/// [`FromRow`](crate::FromRow) for it.
///
/// Field markers: `#[key]`, `#[column = "SqlName"]`, `#[ignore_on_insert]`,
/// `#[ignore_on_update]`. Doc comments are allowed; any other field attribute
/// is a compile error. Every field type must convert into [`Value`] and
/// decode from a PostgreSQL row.
///
/// ```ignore
/// sqlchain::data_object! {
///     #[derive(Debug, Clone)]
///     pub struct Employee {
///         #[key]
///         pub employee_key: Option<i32>,
///         #[column = "FirstName"]
///         pub first_name: String,
///         #[ignore_on_update]
///         pub created_date: Option<chrono::NaiveDateTime>,
///     }
/// }
/// ```
///
/// A misspelled marker does not compile:
///
/// ```compile_fail
/// sqlchain::data_object! {
///     pub struct Document {
///         #[igonre_on_insert]
///         pub title: String,
///     }
/// }
/// ```
#[macro_export]
macro_rules! data_object {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$($marker:tt)*])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $field_vis $field : $ty ),*
        }

        impl $crate::DataObject for $name {
            fn properties(&self) -> ::std::vec::Vec<$crate::PropertyValue> {
                ::std::vec![
                    $({
                        let property = $crate::PropertyValue::new(
                            stringify!($field),
                            $crate::Value::from(::std::clone::Clone::clone(&self.$field)),
                        );
                        $( let property = $crate::__data_object_marker!(property; $($marker)*); )*
                        property
                    }),*
                ]
            }
        }

        impl $crate::ColumnList for $name {
            fn column_names() -> ::std::vec::Vec<&'static str> {
                ::std::vec![
                    $({
                        let column = stringify!($field);
                        $( let column = $crate::__data_object_column!(column; $($marker)*); )*
                        column
                    }),*
                ]
            }
        }

        impl $crate::FromRow for $name {
            fn from_row(row: &$crate::__private::Row) -> $crate::ChainResult<Self> {
                use $crate::RowExt as _;
                Ok(Self {
                    $(
                        $field: row.try_get_column::<$ty>({
                            let column = stringify!($field);
                            $( let column = $crate::__data_object_column!(column; $($marker)*); )*
                            column
                        })?,
                    )*
                })
            }
        }
    };
}

/// Apply one `data_object!` field marker to a [`PropertyValue`].
#[doc(hidden)]
#[macro_export]
macro_rules! __data_object_marker {
    ($property:ident; key) => {
        $property.key()
    };
    ($property:ident; ignore_on_insert) => {
        $property.ignore_on_insert()
    };
    ($property:ident; ignore_on_update) => {
        $property.ignore_on_update()
    };
    ($property:ident; column = $column:literal) => {
        $property.column($column)
    };
    ($property:ident; doc = $doc:literal) => {
        $property
    };
    ($property:ident; $($other:tt)*) => {
        ::std::compile_error!(::std::concat!(
            "unknown data_object! field marker `#[",
            ::std::stringify!($($other)*),
            "]`; expected key, column = \"..\", ignore_on_insert or ignore_on_update"
        ))
    };
}

/// The column a `data_object!` field reads from.
#[doc(hidden)]
#[macro_export]
macro_rules! __data_object_column {
    ($current:ident; column = $column:literal) => {
        $column
    };
    ($current:ident; $($other:tt)*) => {
        $current
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColumnList;

    crate::data_object! {
        pub struct Marked {
            /// Documented fields are fine.
            #[key]
            #[column = "FirstName"]
            pub first_name: String,
            #[ignore_on_insert]
            #[ignore_on_update]
            pub title: Option<String>,
            pub age: i32,
        }
    }

    fn marked() -> Marked {
        Marked {
            first_name: "Ada".to_string(),
            title: None,
            age: 36,
        }
    }

    #[test]
    fn markers_are_applied() {
        let properties = marked().properties();
        let name = &properties[0];
        assert!(name.is_key);
        assert_eq!(name.mapped_name(), "FirstName");
        assert!(!name.ignore_on_insert);

        let title = &properties[1];
        assert!(title.ignore_on_insert && title.ignore_on_update);
        assert_eq!(title.value, Value::Null);
        assert_eq!(title.mapped_name(), "title");

        assert!(!properties[2].is_key);
        assert!(marked().declares_keys());
    }

    #[test]
    fn column_names_follow_markers() {
        assert_eq!(Marked::column_names(), vec!["FirstName", "title", "age"]);
    }
}
