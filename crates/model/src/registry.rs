//! String-keyed symbol resolution.
//!
//! Invocations name queries and transforms by (namespace, name) strings; the
//! registry maps those to typed handles compiled into the binary. Resolution
//! is a pure lookup: it never executes a query and resolving the same symbol
//! twice yields the same handle.

use std::collections::HashMap;
use std::sync::Arc;

use crate::query::Query;
use crate::trace::{ObserveEvent, SampleEntry};
use crate::types::ModelError;

/// Combine transform applied to the observation events of one execution.
pub type CombineObservesFn =
    Arc<dyn Fn(&[ObserveEvent]) -> Result<serde_json::Value, ModelError> + Send + Sync>;

/// Combine transform applied to the sample trace of one execution.
pub type CombineSamplesFn =
    Arc<dyn Fn(&[SampleEntry]) -> Result<serde_json::Value, ModelError> + Send + Sync>;

/// Symbol lookup failure. Carries the strings the caller asked for, so the
/// report names exactly what could not be resolved.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    /// No namespace with this name is registered.
    #[error("Namespace `{0}` is not registered")]
    UnknownNamespace(String),

    /// The namespace exists but has no member with this name.
    #[error("Symbol `{name}` not found in namespace `{namespace}`")]
    UnknownSymbol { namespace: String, name: String },

    /// The symbol exists but is not the kind of member the caller needs.
    #[error("Symbol `{name}` in namespace `{namespace}` is a {found}, expected a {expected}")]
    WrongKind {
        namespace: String,
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// One registered member of a namespace.
#[derive(Clone)]
pub enum RegistryEntry {
    Query(Arc<dyn Query>),
    CombineObserves(CombineObservesFn),
    CombineSamples(CombineSamplesFn),
    Value(serde_json::Value),
}

impl RegistryEntry {
    fn kind(&self) -> &'static str {
        match self {
            RegistryEntry::Query(_) => "query",
            RegistryEntry::CombineObserves(_) => "combine-observes function",
            RegistryEntry::CombineSamples(_) => "combine-samples function",
            RegistryEntry::Value(_) => "value",
        }
    }
}

/// A named collection of queries, combine transforms, and values.
pub struct Namespace {
    name: String,
    entries: HashMap<String, RegistryEntry>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entries: HashMap::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn register_query<Q: Query + 'static>(&mut self, name: impl Into<String>, query: Q) {
        self.entries.insert(name.into(), RegistryEntry::Query(Arc::new(query)));
    }

    pub fn register_combine_observes<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[ObserveEvent]) -> Result<serde_json::Value, ModelError> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), RegistryEntry::CombineObserves(Arc::new(f)));
    }

    pub fn register_combine_samples<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[SampleEntry]) -> Result<serde_json::Value, ModelError> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), RegistryEntry::CombineSamples(Arc::new(f)));
    }

    pub fn register_value(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.entries.insert(name.into(), RegistryEntry::Value(value));
    }
}

/// Registry of namespaces, installed once at startup.
#[derive(Default)]
pub struct ModelRegistry {
    namespaces: HashMap<String, Namespace>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a namespace, replacing any previous one with the same name.
    pub fn install(&mut self, namespace: Namespace) {
        tracing::debug!(namespace = %namespace.name, entries = namespace.entries.len(), "Installed namespace");
        self.namespaces.insert(namespace.name.clone(), namespace);
    }

    fn entry(&self, namespace: &str, name: &str) -> Result<&RegistryEntry, ResolutionError> {
        let ns = self
            .namespaces
            .get(namespace)
            .ok_or_else(|| ResolutionError::UnknownNamespace(namespace.to_string()))?;
        ns.entries.get(name).ok_or_else(|| ResolutionError::UnknownSymbol {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    fn wrong_kind(
        namespace: &str,
        name: &str,
        expected: &'static str,
        found: &RegistryEntry,
    ) -> ResolutionError {
        ResolutionError::WrongKind {
            namespace: namespace.to_string(),
            name: name.to_string(),
            expected,
            found: found.kind(),
        }
    }

    pub fn resolve_query(&self, namespace: &str, name: &str) -> Result<Arc<dyn Query>, ResolutionError> {
        match self.entry(namespace, name)? {
            RegistryEntry::Query(q) => Ok(Arc::clone(q)),
            other => Err(Self::wrong_kind(namespace, name, "query", other)),
        }
    }

    pub fn resolve_combine_observes(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<CombineObservesFn, ResolutionError> {
        match self.entry(namespace, name)? {
            RegistryEntry::CombineObserves(f) => Ok(Arc::clone(f)),
            other => Err(Self::wrong_kind(namespace, name, "combine-observes function", other)),
        }
    }

    pub fn resolve_combine_samples(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<CombineSamplesFn, ResolutionError> {
        match self.entry(namespace, name)? {
            RegistryEntry::CombineSamples(f) => Ok(Arc::clone(f)),
            other => Err(Self::wrong_kind(namespace, name, "combine-samples function", other)),
        }
    }

    pub fn resolve_value(&self, namespace: &str, name: &str) -> Result<serde_json::Value, ResolutionError> {
        match self.entry(namespace, name)? {
            RegistryEntry::Value(v) => Ok(v.clone()),
            other => Err(Self::wrong_kind(namespace, name, "value", other)),
        }
    }
}

/// Registry with every built-in namespace installed. Currently just `demo.q`.
pub fn builtin_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.install(crate::demo::namespace());
    registry
}
