use std::collections::HashSet;

/// Composite keys (`pk` or `pk,sk`) successfully imported during a run.
///
/// Only grows; the sync pass treats every key in here as present in the
/// input.
#[derive(Debug, Clone, Default)]
pub struct Memo {
    keys: HashSet<String>,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Returns false if the key was already present.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}
