use super::{DbType, RoutineKind, RoutineMetadata, TableOrViewMetadata};
use crate::error::{ChainError, ChainResult};
use crate::ident::ObjectName;
use dashmap::DashMap;
use std::sync::Arc;

/// Supplies metadata the cache has not seen yet.
///
/// Implemented per dialect by whatever reads the database catalog. Loading is
/// synchronous; callers that need async catalog access fetch ahead of time and
/// [`MetadataCache::register_table`] the results instead.
pub trait MetadataSource<T: DbType>: Send + Sync {
    fn load_table_or_view(&self, name: &ObjectName) -> ChainResult<Option<TableOrViewMetadata<T>>>;

    fn load_routine(&self, name: &ObjectName) -> ChainResult<Option<RoutineMetadata<T>>>;

    /// Every table and view the source knows, for [`MetadataCache::preload`].
    fn table_and_view_names(&self) -> ChainResult<Vec<ObjectName>> {
        Ok(Vec::new())
    }

    /// Every routine the source knows, for [`MetadataCache::preload`].
    fn routine_names(&self) -> ChainResult<Vec<ObjectName>> {
        Ok(Vec::new())
    }
}

/// Thread-safe memo of table, view and routine metadata keyed by qualified name.
///
/// Lookups that miss consult the [`MetadataSource`] (if any). Two threads
/// missing the same key may both load it; the last insert wins, which is safe
/// because loaded metadata is immutable.
pub struct MetadataCache<T: DbType> {
    default_schema: Option<String>,
    tables: DashMap<String, Arc<TableOrViewMetadata<T>>>,
    routines: DashMap<String, Arc<RoutineMetadata<T>>>,
    source: Option<Arc<dyn MetadataSource<T>>>,
}

impl<T: DbType> MetadataCache<T> {
    /// Create an empty cache. Unqualified names resolve against `default_schema`.
    pub fn new(default_schema: Option<&str>) -> Self {
        Self {
            default_schema: default_schema.map(str::to_string),
            tables: DashMap::new(),
            routines: DashMap::new(),
            source: None,
        }
    }

    /// Attach a source for lazy loading.
    pub fn with_source(mut self, source: Arc<dyn MetadataSource<T>>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn default_schema(&self) -> Option<&str> {
        self.default_schema.as_deref()
    }

    /// Parse `name` and apply the default schema.
    pub fn parse_name(&self, name: &str) -> ChainResult<ObjectName> {
        Ok(ObjectName::parse(name)?.or_schema(self.default_schema.as_deref()))
    }

    /// Register (or replace) table/view metadata.
    pub fn register_table(&self, table: TableOrViewMetadata<T>) -> Arc<TableOrViewMetadata<T>> {
        let key = table
            .name
            .clone()
            .or_schema(self.default_schema.as_deref())
            .cache_key();
        let table = Arc::new(table);
        self.tables.insert(key, Arc::clone(&table));
        table
    }

    /// Register (or replace) routine metadata.
    pub fn register_routine(&self, routine: RoutineMetadata<T>) -> Arc<RoutineMetadata<T>> {
        let key = routine
            .name
            .clone()
            .or_schema(self.default_schema.as_deref())
            .cache_key();
        let routine = Arc::new(routine);
        self.routines.insert(key, Arc::clone(&routine));
        routine
    }

    /// Look up a table or view, loading it from the source on a miss.
    pub fn get_table_or_view(&self, name: &str) -> ChainResult<Arc<TableOrViewMetadata<T>>> {
        let name = self.parse_name(name)?;
        let key = name.cache_key();
        if let Some(found) = self.tables.get(&key) {
            return Ok(Arc::clone(found.value()));
        }

        tracing::debug!(target: "sqlchain.metadata", object = %name, "table/view cache miss");
        let loaded = match &self.source {
            Some(source) => source.load_table_or_view(&name)?,
            None => None,
        };
        let table = loaded.ok_or_else(|| ChainError::MissingObject(name.to_string()))?;
        let table = Arc::new(table);
        self.tables.insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Look up a table; views are rejected.
    pub fn get_table(&self, name: &str) -> ChainResult<Arc<TableOrViewMetadata<T>>> {
        let table = self.get_table_or_view(name)?;
        if !table.is_table {
            return Err(ChainError::InvalidArgument(format!(
                "{} is a view; a table is required for this operation",
                table.name
            )));
        }
        Ok(table)
    }

    /// Look up a routine of the given kind, loading it from the source on a miss.
    pub fn get_routine(
        &self,
        name: &str,
        kind: RoutineKind,
    ) -> ChainResult<Arc<RoutineMetadata<T>>> {
        let name = self.parse_name(name)?;
        let key = name.cache_key();
        let routine = match self.routines.get(&key) {
            Some(found) => Arc::clone(found.value()),
            None => {
                tracing::debug!(target: "sqlchain.metadata", object = %name, "routine cache miss");
                let loaded = match &self.source {
                    Some(source) => source.load_routine(&name)?,
                    None => None,
                };
                let routine = loaded.ok_or_else(|| ChainError::MissingObject(name.to_string()))?;
                let routine = Arc::new(routine);
                self.routines.insert(key, Arc::clone(&routine));
                routine
            }
        };
        if routine.kind != kind {
            return Err(ChainError::InvalidArgument(format!(
                "{} is a {:?}, not a {:?}",
                routine.name, routine.kind, kind
            )));
        }
        Ok(routine)
    }

    /// Eagerly load everything the source knows about. Returns how many
    /// objects were loaded.
    pub fn preload(&self) -> ChainResult<usize> {
        let Some(source) = &self.source else {
            return Ok(0);
        };
        let mut loaded = 0;
        for name in source.table_and_view_names()? {
            if let Some(table) = source.load_table_or_view(&name)? {
                self.register_table(table);
                loaded += 1;
            }
        }
        for name in source.routine_names()? {
            if let Some(routine) = source.load_routine(&name)? {
                self.register_routine(routine);
                loaded += 1;
            }
        }
        tracing::debug!(target: "sqlchain.metadata", loaded, "metadata preloaded");
        Ok(loaded)
    }

    /// Number of cached tables and views.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Number of cached routines.
    pub fn routine_count(&self) -> usize {
        self.routines.len()
    }
}

impl<T: DbType> std::fmt::Debug for MetadataCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("default_schema", &self.default_schema)
            .field("tables", &self.tables.len())
            .field("routines", &self.routines.len())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Dialect, Postgres, PostgresType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Catalog {
        loads: AtomicUsize,
    }

    impl MetadataSource<PostgresType> for Catalog {
        fn load_table_or_view(
            &self,
            name: &ObjectName,
        ) -> ChainResult<Option<TableOrViewMetadata<PostgresType>>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if name.name != "employee" {
                return Ok(None);
            }
            Ok(Some(TableOrViewMetadata::new(
                name.clone(),
                true,
                vec![Postgres.column("employee_key").primary_key(), Postgres.column("name")],
            )))
        }

        fn load_routine(
            &self,
            name: &ObjectName,
        ) -> ChainResult<Option<RoutineMetadata<PostgresType>>> {
            if name.name != "refresh" {
                return Ok(None);
            }
            Ok(Some(RoutineMetadata::new(
                name.clone(),
                RoutineKind::Procedure,
                Vec::new(),
                Vec::new(),
            )))
        }

        fn table_and_view_names(&self) -> ChainResult<Vec<ObjectName>> {
            Ok(vec![ObjectName::new(Some("public"), "employee")])
        }

        fn routine_names(&self) -> ChainResult<Vec<ObjectName>> {
            Ok(vec![ObjectName::new(Some("public"), "refresh")])
        }
    }

    fn cache(catalog: &Arc<Catalog>) -> MetadataCache<PostgresType> {
        let source: Arc<dyn MetadataSource<PostgresType>> = catalog.clone();
        MetadataCache::new(Some("public")).with_source(source)
    }

    #[test]
    fn test_miss_loads_once() {
        let catalog = Arc::new(Catalog::default());
        let cache = cache(&catalog);

        let first = cache.get_table_or_view("employee").unwrap();
        let second = cache.get_table_or_view("PUBLIC.Employee").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(catalog.loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.table_count(), 1);
    }

    #[test]
    fn test_unknown_object_is_missing() {
        let catalog = Arc::new(Catalog::default());
        let cache = cache(&catalog);
        let err = cache.get_table_or_view("hr.nothing").unwrap_err();
        assert!(matches!(err, ChainError::MissingObject(ref name) if name == "hr.nothing"));
    }

    #[test]
    fn test_routine_kind_must_match() {
        let catalog = Arc::new(Catalog::default());
        let cache = cache(&catalog);
        assert!(cache.get_routine("refresh", RoutineKind::Procedure).is_ok());
        let err = cache.get_routine("refresh", RoutineKind::ScalarFunction).unwrap_err();
        assert!(matches!(err, ChainError::InvalidArgument(_)));
    }

    #[test]
    fn test_preload() {
        let catalog = Arc::new(Catalog::default());
        let cache = cache(&catalog);
        assert_eq!(cache.preload().unwrap(), 2);
        assert_eq!(cache.table_count(), 1);
        assert_eq!(cache.routine_count(), 1);

        let empty: MetadataCache<PostgresType> = MetadataCache::new(None);
        assert_eq!(empty.preload().unwrap(), 0);
    }

    #[test]
    fn test_registered_names_take_the_default_schema() {
        let cache: MetadataCache<PostgresType> = MetadataCache::new(Some("public"));
        cache.register_table(TableOrViewMetadata::new(
            ObjectName::new(None, "widget"),
            true,
            vec![Postgres.column("widget_key")],
        ));
        assert!(cache.get_table("public.widget").is_ok());
        assert!(cache.get_table("Widget").is_ok());
    }
}
