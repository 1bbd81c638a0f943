use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::QueryError;

type Factory<Q> = Box<dyn Fn(&str) -> Result<Q, QueryError> + Send + Sync>;

/// Lazily built, memoized query objects keyed by string.
///
/// The factory runs at most once per key. A factory error is returned to
/// the caller and nothing is inserted, so the next `get` retries. Entries
/// are never evicted.
pub struct QueryMap<Q> {
    factory: Factory<Q>,
    entries: RwLock<HashMap<String, Arc<Q>>>,
}

impl<Q> QueryMap<Q> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Result<Q, QueryError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Result<Arc<Q>, QueryError> {
        if let Some(existing) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Ok(Arc::clone(existing));
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have built it between the two locks.
        if let Some(existing) = entries.get(key) {
            return Ok(Arc::clone(existing));
        }

        let query = Arc::new((self.factory)(key)?);
        entries.insert(key.to_string(), Arc::clone(&query));
        Ok(query)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
