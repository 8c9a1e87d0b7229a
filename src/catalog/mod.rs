//! Destination tables: namespaces, identifiers and the registry lookup.
//!
//! The driver only needs [`TableRegistry`]. [`InMemoryRegistry`] backs tests and embedders;
//! [`Warehouse`] is the local on-disk catalog that also accepts writes.

pub mod evolution;
pub mod warehouse;

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, LoaderResult};

pub use warehouse::{TableManifest, Warehouse, WriteMode, WriteOutcome};

/// Two-level namespace holding destination tables (`catalog.schema`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    pub catalog: String,
    pub schema: String,
}

impl Namespace {
    pub fn new(catalog: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
        }
    }

    /// Identifier of `table` inside this namespace.
    pub fn table(&self, table: impl Into<String>) -> TableIdent {
        TableIdent {
            namespace: self.clone(),
            name: table.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.catalog, self.schema)
    }
}

/// Fully-qualified table identifier; displays as `catalog.schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableIdent {
    pub namespace: Namespace,
    pub name: String,
}

impl fmt::Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Lookup of the tables registered in a namespace.
///
/// A failure means no routing decision can be made; the driver aborts the invocation.
pub trait TableRegistry: Send + Sync {
    fn list_tables(&self, namespace: &Namespace) -> LoaderResult<BTreeSet<String>>;
}

/// A fixed registry held in memory.
///
/// Listing a namespace that was never registered fails like an unreachable catalog would.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    tables: HashMap<Namespace, BTreeSet<String>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tables` under `namespace` (the namespace is created even when empty).
    pub fn with_tables<I, S>(mut self, namespace: &Namespace, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables
            .entry(namespace.clone())
            .or_default()
            .extend(tables.into_iter().map(Into::into));
        self
    }
}

impl TableRegistry for InMemoryRegistry {
    fn list_tables(&self, namespace: &Namespace) -> LoaderResult<BTreeSet<String>> {
        self.tables
            .get(namespace)
            .cloned()
            .ok_or_else(|| LoaderError::RegistryUnavailable {
                namespace: namespace.to_string(),
                message: "namespace not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_displays_fully_qualified() {
        let ns = Namespace::new("entity_resolution_dev", "bronze");
        assert_eq!(ns.table("edm_entity").to_string(), "entity_resolution_dev.bronze.edm_entity");
    }

    #[test]
    fn in_memory_registry_lists_registered_namespace() {
        let ns = Namespace::new("c", "s");
        let reg = InMemoryRegistry::new().with_tables(&ns, ["b", "a"]);
        let tables = reg.list_tables(&ns).unwrap();
        assert_eq!(tables.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn unknown_namespace_is_unavailable() {
        let reg = InMemoryRegistry::new();
        let err = reg.list_tables(&Namespace::new("c", "missing")).unwrap_err();
        assert!(matches!(err, LoaderError::RegistryUnavailable { .. }));
    }
}
