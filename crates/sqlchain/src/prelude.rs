//! Convenient imports for typical `sqlchain` usage.
//!
//! ```ignore
//! use sqlchain::prelude::*;
//! ```

pub use crate::{
    Argument, AuditRule, AuditRules, ChainConfig, ChainError, ChainResult, ColumnMetadata,
    CommandBuilder, DataObject, DataSource, DesiredColumns, Dialect, FromRow, GenericClient,
    ObjectName, OperationTypes, PreparedCommand, RowExt, SortExpression, TableOrViewMetadata, Value,
    data_object,
};
pub use crate::{Access, Postgres, SqlServer};

#[cfg(feature = "pool")]
pub use crate::create_pool;
