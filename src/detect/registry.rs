use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;

/// Shared handle to a backend. `DetectorBackend::detect` takes `&mut self`.
pub type SharedBackend = Arc<Mutex<dyn DetectorBackend>>;

/// Registry of detector backends, selected by name at startup.
pub struct BackendRegistry {
    backends: HashMap<String, SharedBackend>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<SharedBackend> {
        self.backends.get(name).cloned()
    }

    /// Get default backend.
    pub fn default_backend(&self) -> Option<SharedBackend> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// List registered backends, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Select `name`, warm it up and return it.
    pub fn select(&mut self, name: &str) -> Result<SharedBackend> {
        self.set_default(name)
            .map_err(|e| anyhow!("{} (available: {})", e, self.list().join(", ")))?;
        let backend = self
            .default_backend()
            .ok_or_else(|| anyhow!("backend '{}' vanished from registry", name))?;
        backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?
            .warm_up()?;
        Ok(backend)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::StubBackend;

    #[test]
    fn first_registered_backend_is_default() {
        let mut registry = BackendRegistry::new();
        assert!(registry.default_backend().is_none());
        registry.register(StubBackend::default());
        let backend = registry.default_backend().expect("default backend");
        assert_eq!(backend.lock().unwrap().name(), "stub");
        assert_eq!(registry.list(), vec!["stub".to_string()]);
    }

    #[test]
    fn selecting_unknown_backend_fails() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::default());
        let err = registry.select("tract").err().expect("unknown backend");
        assert!(err.to_string().contains("available: stub"));
        assert!(registry.select("stub").is_ok());
    }
}
