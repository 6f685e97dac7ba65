//! Table, view and routine metadata.
//!
//! Metadata is consumed, not produced: each dialect's catalog reader (or the
//! application itself) supplies descriptors, and [`MetadataCache`] memoizes
//! them together with the [`SqlBuilder`] template built from them.

mod cache;

pub use cache::{MetadataCache, MetadataSource};

use crate::builder::SqlBuilder;
use crate::ident::{ObjectName, clr_safe_name};
use std::fmt;
use std::sync::Arc;

/// A dialect-specific database type code.
pub trait DbType: Copy + fmt::Debug + PartialEq + Eq + Send + Sync + 'static {}

/// Metadata for one column of a table, view or table function result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata<T: DbType> {
    /// Name as written in SQL.
    pub sql_name: String,
    /// Host-language friendly name (SQL name stripped of non-identifier characters).
    pub clr_name: String,
    /// Name with the dialect's delimiters applied.
    pub quoted_sql_name: String,
    /// Declared placeholder name, e.g. `@FirstName`.
    pub sql_variable_name: String,
    pub db_type: Option<T>,
    pub type_name: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub is_identity: bool,
    pub is_computed: bool,
}

impl<T: DbType> ColumnMetadata<T> {
    pub fn new(
        sql_name: impl Into<String>,
        quoted_sql_name: impl Into<String>,
        sql_variable_name: impl Into<String>,
    ) -> Self {
        let sql_name = sql_name.into();
        Self {
            clr_name: clr_safe_name(&sql_name),
            sql_name,
            quoted_sql_name: quoted_sql_name.into(),
            sql_variable_name: sql_variable_name.into(),
            db_type: None,
            type_name: String::new(),
            is_nullable: true,
            is_primary_key: false,
            is_identity: false,
            is_computed: false,
        }
    }

    pub fn with_type(mut self, db_type: T, type_name: impl Into<String>) -> Self {
        self.db_type = Some(db_type);
        self.type_name = type_name.into();
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    pub fn identity(mut self) -> Self {
        self.is_identity = true;
        self.is_nullable = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.is_computed = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }
}

/// Direction of a routine parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterDirection {
    Input,
    Output,
    InputOutput,
    Return,
}

impl ParameterDirection {
    pub fn is_output(self) -> bool {
        !matches!(self, ParameterDirection::Input)
    }
}

/// Metadata for one formal parameter of a procedure or function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMetadata<T: DbType> {
    /// Parameter name without the dialect prefix, e.g. `EmployeeKey`.
    pub sql_name: String,
    pub clr_name: String,
    /// Parameter name as written in SQL, e.g. `@EmployeeKey`.
    pub sql_parameter_name: String,
    pub db_type: Option<T>,
    pub type_name: String,
    pub direction: ParameterDirection,
}

impl<T: DbType> ParameterMetadata<T> {
    pub fn new(sql_name: impl Into<String>, sql_parameter_name: impl Into<String>) -> Self {
        let sql_name = sql_name.into();
        Self {
            clr_name: clr_safe_name(&sql_name),
            sql_name,
            sql_parameter_name: sql_parameter_name.into(),
            db_type: None,
            type_name: String::new(),
            direction: ParameterDirection::Input,
        }
    }

    pub fn with_type(mut self, db_type: T, type_name: impl Into<String>) -> Self {
        self.db_type = Some(db_type);
        self.type_name = type_name.into();
        self
    }

    pub fn with_direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = direction;
        self
    }

    /// View the parameter as column-shaped builder details.
    pub(crate) fn to_column(&self) -> ColumnMetadata<T> {
        ColumnMetadata {
            sql_name: self.sql_name.clone(),
            clr_name: self.clr_name.clone(),
            quoted_sql_name: self.sql_parameter_name.clone(),
            sql_variable_name: self.sql_parameter_name.clone(),
            db_type: self.db_type,
            type_name: self.type_name.clone(),
            is_nullable: true,
            is_primary_key: false,
            is_identity: false,
            is_computed: false,
        }
    }
}

/// Metadata for a table or view, plus its builder template.
#[derive(Debug)]
pub struct TableOrViewMetadata<T: DbType> {
    pub name: ObjectName,
    pub is_table: bool,
    pub columns: Vec<Arc<ColumnMetadata<T>>>,
    template: Arc<SqlBuilder<T>>,
}

impl<T: DbType> TableOrViewMetadata<T> {
    pub fn new(name: ObjectName, is_table: bool, columns: Vec<ColumnMetadata<T>>) -> Self {
        let columns: Vec<_> = columns.into_iter().map(Arc::new).collect();
        let template = Arc::new(SqlBuilder::for_columns(name.clone(), &columns));
        Self {
            name,
            is_table,
            columns,
            template,
        }
    }

    /// Columns flagged as primary key.
    pub fn primary_key_columns(&self) -> impl Iterator<Item = &ColumnMetadata<T>> {
        self.columns.iter().filter(|c| c.is_primary_key).map(|c| &**c)
    }

    /// The identity column, if any.
    pub fn identity_column(&self) -> Option<&ColumnMetadata<T>> {
        self.columns.iter().find(|c| c.is_identity).map(|c| &**c)
    }

    /// Case-insensitive lookup by SQL or host name.
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata<T>> {
        self.columns
            .iter()
            .find(|c| {
                c.sql_name.eq_ignore_ascii_case(name) || c.clr_name.eq_ignore_ascii_case(name)
            })
            .map(|c| &**c)
    }

    /// The shared, never-mutated template.
    pub fn template(&self) -> &Arc<SqlBuilder<T>> {
        &self.template
    }

    /// A private, mutable copy of the template for one statement.
    pub fn create_sql_builder(&self, strict_mode: bool) -> SqlBuilder<T> {
        let mut builder = (*self.template).clone();
        builder.set_strict_mode(strict_mode);
        builder
    }
}

/// What kind of routine a [`RoutineMetadata`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    Procedure,
    TableFunction,
    ScalarFunction,
}

/// Metadata for a stored procedure or function.
#[derive(Debug)]
pub struct RoutineMetadata<T: DbType> {
    pub name: ObjectName,
    pub kind: RoutineKind,
    pub parameters: Vec<Arc<ParameterMetadata<T>>>,
    /// Result columns (table functions only).
    pub columns: Vec<Arc<ColumnMetadata<T>>>,
    template: Arc<SqlBuilder<T>>,
}

impl<T: DbType> RoutineMetadata<T> {
    pub fn new(
        name: ObjectName,
        kind: RoutineKind,
        parameters: Vec<ParameterMetadata<T>>,
        columns: Vec<ColumnMetadata<T>>,
    ) -> Self {
        let parameters: Vec<_> = parameters.into_iter().map(Arc::new).collect();
        let columns: Vec<_> = columns.into_iter().map(Arc::new).collect();
        let template = Arc::new(SqlBuilder::for_routine(name.clone(), &parameters, &columns));
        Self {
            name,
            kind,
            parameters,
            columns,
            template,
        }
    }

    pub fn template(&self) -> &Arc<SqlBuilder<T>> {
        &self.template
    }

    pub fn create_sql_builder(&self, strict_mode: bool) -> SqlBuilder<T> {
        let mut builder = (*self.template).clone();
        builder.set_strict_mode(strict_mode);
        builder
    }
}
