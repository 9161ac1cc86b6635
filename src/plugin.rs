//! Name-keyed registry of boxed capabilities that handlers can look up at
//! runtime, in the spirit of the generated handler-name registries this
//! crate used to ship: a flat name-to-implementation map, except the values
//! here are arbitrary `Send + Sync` capabilities rather than request
//! handlers.

use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

/// A boxed, type-erased plugin capability. Retrieve it with
/// [`PluginRegistry::get`] and downcast to the concrete type.
pub type Plugin = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
pub struct PluginRegistry {
    plugins: DashMap<String, Plugin>,
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        PluginRegistry::default()
    }

    pub fn register<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        self.plugins.insert(name.into(), Arc::new(value));
    }

    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let plugin = self.plugins.get(name)?;
        Arc::clone(&plugin).downcast::<T>().ok()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn remove(&self, name: &str) {
        self.plugins.remove(name);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeter(String);

    #[test]
    fn registers_and_retrieves_typed_plugin() {
        let registry = PluginRegistry::new();
        registry.register("greeter", Greeter("hello".to_string()));
        let greeter = registry.get::<Greeter>("greeter").unwrap();
        assert_eq!(greeter.0, "hello");
    }

    #[test]
    fn mismatched_type_returns_none() {
        let registry = PluginRegistry::new();
        registry.register("greeter", Greeter("hello".to_string()));
        assert!(registry.get::<u32>("greeter").is_none());
    }

    #[test]
    fn remove_drops_the_entry() {
        let registry = PluginRegistry::new();
        registry.register("greeter", Greeter("hi".to_string()));
        registry.remove("greeter");
        assert!(!registry.contains("greeter"));
    }
}
