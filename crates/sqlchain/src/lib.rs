//! # sqlchain
//!
//! A fluent, metadata-driven SQL command builder for SQL Server, Access and
//! PostgreSQL.
//!
//! ## Features
//!
//! - **Metadata driven**: column lists, keys and identity columns come from
//!   table metadata, so commands are written against objects, not SQL text
//! - **One builder, three dialects**: the same command prepares `OUTPUT`,
//!   follow-up `SELECT`s or `RETURNING` as the dialect requires
//! - **Audit rules**: creation/update stamps, user stamps, soft delete and
//!   per-role column restrictions applied to every command
//! - **Strict mode**: argument members that match no column are errors
//! - **Safe defaults**: UPDATE requires SET, set-based writes require a filter
//!   unless `all()` is called
//! - **PostgreSQL execution**: pass a client or a transaction anywhere a
//!   `GenericClient` is expected
//!
//! ## Example
//!
//! ```ignore
//! use sqlchain::prelude::*;
//!
//! let ds = DataSource::new(Postgres);
//! ds.metadata().register_table(TableOrViewMetadata::new(
//!     ObjectName::parse("hr.employee")?,
//!     true,
//!     vec![
//!         Postgres.column("employee_key").identity().primary_key(),
//!         Postgres.column("first_name"),
//!         Postgres.column("last_name"),
//!     ],
//! ));
//!
//! // INSERT ... RETURNING employee_key
//! let key: i32 = ds.executor(&client).to_scalar(&ds.insert("hr.employee", &employee)?).await?;
//!
//! // SELECT ... WHERE last_name = $1 ORDER BY first_name LIMIT 10
//! let rows: Vec<Employee> = ds
//!     .executor(&client)
//!     .to_collection(
//!         &ds.from("hr.employee")?
//!             .with_filter(&filter)
//!             .with_sorting(["first_name"])
//!             .take(10),
//!     )
//!     .await?;
//! ```

pub mod argument;
pub mod builder;
pub mod client;
pub mod command;
pub mod config;
pub mod data_source;
pub mod dialect;
pub mod error;
pub mod execute;
pub mod ident;
mod logging;
pub mod metadata;
pub mod prelude;
pub mod row;
pub mod rules;
pub mod sort;
pub mod value;

#[cfg(feature = "pool")]
pub mod pool;

pub use argument::{Argument, ColumnList, DataObject, PropertyValue};
pub use builder::{
    ArgumentOptions, DesiredColumns, FilterOptions, ParameterColumn, ParameterSlot, ParameterStyle,
    SqlBuilder, SqlBuilderEntry,
};
pub use client::GenericClient;
pub use command::{
    ChainState, ChainedCommand, CommandBuilder, CommandKind, CommandPlan, CountKind, DeleteObject,
    DeleteWithFilter, FilterSpec, FromTableOrView, InsertObject, InsertOptions, PreparedCommand,
    ProcedureCall, RawArguments, ScalarFunctionCall, SelectRequest, SqlCall, StepOutcome,
    TableFunctionCall, TableSampling, UpdateObject, UpdateOptions, UpdateSet, UpsertObject,
    UpsertOptions,
};
pub use config::ChainConfig;
pub use data_source::DataSource;
pub use dialect::{
    Access, AccessParameter, AccessType, Dialect, Postgres, PostgresType, SqlServer,
    SqlServerParameter, SqlServerType,
};
pub use error::{ChainError, ChainResult};
pub use execute::Executor;
pub use ident::ObjectName;
pub use metadata::{
    ColumnMetadata, DbType, MetadataCache, MetadataSource, ParameterDirection, ParameterMetadata,
    RoutineKind, RoutineMetadata, TableOrViewMetadata,
};
pub use row::{DataTable, FromRow, RowExt};
pub use rules::{AuditRule, AuditRules, DateTimeKind, OperationTypes};
pub use sort::SortExpression;
pub use value::Value;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with};

#[doc(hidden)]
pub mod __private {
    pub use tokio_postgres::Row;
}
