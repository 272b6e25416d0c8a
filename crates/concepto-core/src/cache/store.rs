use std::collections::BTreeMap;

use crate::errors::ExError;

/// Durable key-value storage used by the incremental cache
///
/// Implementations are assumed to be accessed sequentially by a single
/// process.
pub trait CacheStore {
    /// # Errors
    ///
    /// Returns an `ExError` if the backing storage fails.
    fn get_item(&self, key: &str) -> Result<Option<String>, ExError>;

    /// # Errors
    ///
    /// Returns an `ExError` if the backing storage fails.
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), ExError>;

    /// Removing a missing key is not an error
    ///
    /// # Errors
    ///
    /// Returns an `ExError` if the backing storage fails.
    fn remove_item(&mut self, key: &str) -> Result<(), ExError>;

    /// # Errors
    ///
    /// Returns an `ExError` if the backing storage fails.
    fn clear(&mut self) -> Result<(), ExError>;

    /// All stored keys, sorted
    ///
    /// # Errors
    ///
    /// Returns an `ExError` if the backing storage fails.
    fn keys(&self) -> Result<Vec<String>, ExError>;
}

impl<T: CacheStore + ?Sized> CacheStore for &mut T {
    fn get_item(&self, key: &str) -> Result<Option<String>, ExError> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), ExError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), ExError> {
        (**self).remove_item(key)
    }

    fn clear(&mut self) -> Result<(), ExError> {
        (**self).clear()
    }

    fn keys(&self) -> Result<Vec<String>, ExError> {
        (**self).keys()
    }
}

impl<T: CacheStore + ?Sized> CacheStore for Box<T> {
    fn get_item(&self, key: &str) -> Result<Option<String>, ExError> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), ExError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), ExError> {
        (**self).remove_item(key)
    }

    fn clear(&mut self) -> Result<(), ExError> {
        (**self).clear()
    }

    fn keys(&self) -> Result<Vec<String>, ExError> {
        (**self).keys()
    }
}

/// In-memory store, for tests and throwaway runs
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    items: BTreeMap<String, String>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, ExError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), ExError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), ExError> {
        self.items.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ExError> {
        self.items.clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, ExError> {
        Ok(self.items.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_basic_operations() {
        let mut store = MemoryCacheStore::new();
        store.set_item("b", "2").unwrap();
        store.set_item("a", "1").unwrap();
        assert_eq!(store.get_item("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);

        store.remove_item("a").unwrap();
        store.remove_item("missing").unwrap();
        assert_eq!(store.get_item("a").unwrap(), None);

        store.clear().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_through_mut_reference() {
        fn write<S: CacheStore>(mut s: S) {
            s.set_item("k", "v").unwrap();
        }
        let mut store = MemoryCacheStore::new();
        write(&mut store);
        assert_eq!(store.len(), 1);
    }
}
