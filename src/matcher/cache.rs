use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

/// Memoizes artifacts derived from the corpus, one per key.
///
/// Entries are built outside the lock; when two threads race on the same key the
/// first insertion wins and both receive that value.
#[derive(Debug)]
pub struct MatcherCache<K, V> {
    entries: RwLock<HashMap<K, Arc<V>>>,
}

impl<K, V> Default for MatcherCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V> MatcherCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.read().get(key).cloned()
    }

    pub fn get_or_build<Q, F>(&self, key: &Q, build: F) -> Arc<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce() -> V,
    {
        match self.get_or_try_build(key, || Ok::<V, std::convert::Infallible>(build())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    pub fn get_or_try_build<Q, F, E>(&self, key: &Q, build: F) -> Result<Arc<V>, E>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = Arc::new(build()?);
        let mut entries = self.entries.write();
        Ok(entries.entry(key.to_owned()).or_insert(value).clone())
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_once_per_key() {
        let cache: MatcherCache<String, usize> = MatcherCache::new();
        let mut builds = 0;
        let first = cache.get_or_build("a", || {
            builds += 1;
            1
        });
        let second = cache.get_or_build("a", || {
            builds += 1;
            2
        });
        assert_eq!((*first, *second, builds), (1, 1, 1));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_concurrent_first_use_builds_one_shared_value() {
        let cache: Arc<MatcherCache<String, Vec<usize>>> = Arc::new(MatcherCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get_or_build("table", || vec![i]))
            })
            .collect();
        let values: Vec<Arc<Vec<usize>>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(cache.len(), 1);
        let stored = cache.get("table").unwrap();
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &stored)));
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let cache: MatcherCache<String, usize> = MatcherCache::new();
        let err: Result<_, &str> = cache.get_or_try_build("a", || Err("boom"));
        assert!(err.is_err());
        assert_eq!(cache.len(), 0);
    }
}
