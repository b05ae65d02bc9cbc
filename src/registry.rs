//! Registered configuration classes.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::live::ConfigTarget;

/// A configuration class: a name, the key prefix naming its file, and the
/// live target parsers write into.
#[derive(Clone)]
pub struct ConfigClass {
    name: String,
    key_prefix: Option<String>,
    target: Arc<dyn ConfigTarget>,
}

impl ConfigClass {
    pub fn new(name: &str, key_prefix: Option<&str>, target: Arc<dyn ConfigTarget>) -> Self {
        Self {
            name: name.to_string(),
            key_prefix: key_prefix.filter(|p| !p.is_empty()).map(str::to_string),
            target,
        }
    }

    /// Identifier used in target keys.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the class's own file, `None` when it lives in the main file only.
    pub fn key_prefix(&self) -> Option<&str> {
        self.key_prefix.as_deref()
    }

    pub fn target(&self) -> &Arc<dyn ConfigTarget> {
        &self.target
    }
}

impl fmt::Debug for ConfigClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigClass")
            .field("name", &self.name)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

/// Every class known to the process, with the extension each was last
/// loaded from.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: RwLock<Vec<ConfigClass>>,
    extensions: DashMap<String, String>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `class`; false when a class with that name already exists.
    pub fn register(&self, class: ConfigClass) -> bool {
        let mut classes = self.classes.write();
        if classes.iter().any(|c| c.name == class.name) {
            return false;
        }
        classes.push(class);
        true
    }

    pub fn all(&self) -> Vec<ConfigClass> {
        self.classes.read().clone()
    }

    pub fn by_prefix(&self, key_prefix: &str) -> Option<ConfigClass> {
        self.classes
            .read()
            .iter()
            .find(|c| c.key_prefix() == Some(key_prefix))
            .cloned()
    }

    pub fn record_extension(&self, class: &str, extension: &str) {
        self.extensions
            .insert(class.to_string(), extension.to_string());
    }

    pub fn extension(&self, class: &str) -> Option<String> {
        self.extensions.get(class).map(|e| e.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseFlags, ParseOutcome};

    struct NullTarget;

    impl ConfigTarget for NullTarget {
        fn apply(&self, _: &[(String, String)], _: ParseFlags) -> ParseOutcome {
            ParseOutcome::NoOp
        }
    }

    #[test]
    fn test_register_is_unique_by_name() {
        let registry = ClassRegistry::new();
        assert!(registry.register(ConfigClass::new("Db", Some("db"), Arc::new(NullTarget))));
        assert!(!registry.register(ConfigClass::new("Db", Some("db2"), Arc::new(NullTarget))));
        assert_eq!(registry.all().len(), 1);
        assert_eq!(registry.by_prefix("db").map(|c| c.name().to_string()), Some("Db".into()));
    }

    #[test]
    fn test_empty_prefix_is_none() {
        let class = ConfigClass::new("Flags", Some(""), Arc::new(NullTarget));
        assert_eq!(class.key_prefix(), None);
    }

    #[test]
    fn test_recorded_extension() {
        let registry = ClassRegistry::new();
        assert_eq!(registry.extension("Db"), None);
        registry.record_extension("Db", ".js");
        assert_eq!(registry.extension("Db").as_deref(), Some(".js"));
    }
}
