//! Process-wide map of named instances.
//!
//! Breakers and bulkheads are shared by name: every caller protecting the
//! `"db"` dependency must see the same breaker. The registry creates an
//! instance on first lookup and hands out `Arc`s afterwards.
//!
//! Lookups take a read lock on the map. Creation goes through a separate
//! creation lock and re-checks the map under it, so two concurrent first
//! lookups of one name build exactly one instance, while lookups of names
//! that already exist never wait on a constructor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Concurrent map of named, lazily created instances.
///
/// ```
/// use safeguard_core::Registry;
/// use std::sync::Arc;
///
/// let registry: Registry<String> = Registry::new();
/// let a = registry.get_or_create("db", || "primary".to_string());
/// let b = registry.get_or_create("db", || "replica".to_string());
///
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(*b, "primary");
/// ```
pub struct Registry<T> {
    instances: RwLock<HashMap<String, Arc<T>>>,
    creation: Mutex<()>,
}

impl<T> Registry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            creation: Mutex::new(()),
        }
    }

    /// Returns the instance registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Returns the instance registered under `name`, creating it with `init` on first use.
    ///
    /// `init` runs at most once per name, even under concurrent first lookups.
    pub fn get_or_create<F>(&self, name: &str, init: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.get(name) {
            return existing;
        }

        let _creating = self.creation.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = self.get(name) {
            return existing;
        }

        let instance = Arc::new(init());
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::clone(&instance));

        #[cfg(feature = "tracing")]
        tracing::debug!(name, "registered new instance");

        instance
    }

    /// Registers `instance` under `name`, replacing any previous one.
    ///
    /// Callers holding the previous `Arc` keep using it.
    pub fn insert(&self, name: &str, instance: Arc<T>) -> Option<Arc<T>> {
        let _creating = self.creation.lock().unwrap_or_else(PoisonError::into_inner);
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), instance)
    }

    /// Names of all registered instances, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Every registered instance with its name, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, Arc<T>)> {
        let mut entries: Vec<(String, Arc<T>)> = self
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, instance)| (name.clone(), Arc::clone(instance)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}
