//! The run registry: one [`ValueEntry`] per key for the current run.

use std::collections::HashMap;

use super::entry::ValueEntry;

/// Session-scoped entry table.
///
/// Iteration (and therefore prefix listing) follows first-insertion order;
/// replacing an entry keeps its position.
#[derive(Debug, Default)]
pub struct RunRegistry {
    entries: Vec<ValueEntry>,
    index: HashMap<String, usize>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ValueEntry> {
        self.index.get(key).and_then(|&i| self.entries.get(i))
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut ValueEntry> {
        let i = *self.index.get(key)?;
        self.entries.get_mut(i)
    }

    /// Insert an entry, replacing any entry for the same key in place.
    pub(crate) fn insert(&mut self, entry: ValueEntry) {
        match self.index.get(&entry.key).and_then(|&i| self.entries.get_mut(i)) {
            Some(slot) => *slot = entry,
            None => {
                self.index.insert(entry.key.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Entries whose key starts with `prefix`, in insertion order.
    pub fn by_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a ValueEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.key.starts_with(prefix))
    }

    /// Drop every entry. Returns how many were removed.
    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.index.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_prefix() {
        let mut registry = RunRegistry::new();
        for key in ["user:2", "admin:1", "user:1", "users", "user"] {
            registry.insert(ValueEntry::missing(key, "s", false));
        }

        let keys: Vec<_> = registry.by_prefix("user:").map(|e| e.key()).collect();
        assert_eq!(keys, vec!["user:2", "user:1"]);

        let keys: Vec<_> = registry.by_prefix("user").map(|e| e.key()).collect();
        assert_eq!(keys, vec!["user:2", "user:1", "users", "user"]);

        assert_eq!(registry.by_prefix("").count(), 5);
    }

    #[test]
    fn test_one_entry_per_key() {
        let mut registry = RunRegistry::new();
        registry.insert(ValueEntry::missing("k", "s1", false));
        registry.insert(ValueEntry::missing("j", "s", false));
        registry.insert(ValueEntry::missing("k", "s2", false));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("k").map(|e| e.signature.as_str()), Some("s2"));

        // Replacement keeps the original position.
        let keys: Vec<_> = registry.by_prefix("").map(|e| e.key()).collect();
        assert_eq!(keys, vec!["k", "j"]);
        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
        assert!(registry.get("k").is_none());
    }
}
