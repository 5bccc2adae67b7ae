use std::sync::Arc;

use dashmap::DashMap;

use crate::texter::Texter;

/// Texters by registered name, for rebuilding deliveries from job payloads.
#[derive(Debug, Clone, Default)]
pub struct TexterCatalog {
    texters: Arc<DashMap<String, Arc<Texter>>>,
}

impl TexterCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `texter` under its name, replacing any previous one.
    pub fn register(&self, texter: Arc<Texter>) -> Option<Arc<Texter>> {
        self.texters.insert(texter.name().to_string(), texter)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Texter>> {
        self.texters.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Texter>> {
        self.texters.remove(name).map(|(_, texter)| texter)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.texters.iter().map(|e| e.key().clone()).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.texters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.texters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_register_replaces_by_name() {
        let catalog = TexterCatalog::new();
        let first = Texter::builder("NotifierTexter").build().unwrap();
        let second = Texter::builder("NotifierTexter").build().unwrap();

        assert!(catalog.register(Arc::clone(&first)).is_none());
        assert!(catalog.register(Arc::clone(&second)).is_some());
        catalog.register(Texter::builder("AlertTexter").build().unwrap());

        assert_eq!(catalog.names(), vec!["AlertTexter", "NotifierTexter"]);
        assert!(Arc::ptr_eq(&catalog.get("NotifierTexter").unwrap(), &second));

        assert!(catalog.remove("AlertTexter").is_some());
        assert!(catalog.get("AlertTexter").is_none());
        assert_eq!(catalog.len(), 1);
    }
}
