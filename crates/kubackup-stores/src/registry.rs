//! Storage backend registry

use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::s3::S3Backend;
use crate::swift::SwiftBackend;
use crate::traits::StorageBackend;
use crate::types::{BackendConfig, BackendType, StorageConfig};

/// Build a backend from a storage destination config
pub fn build_backend(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match &config.backend {
        BackendConfig::S3(s3) => Arc::new(S3Backend::new(&config.name, s3.clone())?),
        BackendConfig::Swift(swift) => Arc::new(SwiftBackend::new(&config.name, swift.clone())?),
    };
    debug!(name = %config.name, backend = %backend.backend_type(), "built storage backend");
    Ok(backend)
}

/// Registry of configured storage destinations
///
/// The first registered destination is the default.
pub struct StorageRegistry {
    backends: Vec<Arc<dyn StorageBackend>>,
}

impl StorageRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Build a registry from configured destinations, in order
    pub fn from_configs(configs: &[StorageConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            registry.register_arc(build_backend(config)?);
        }
        Ok(registry)
    }

    /// Register a storage backend
    pub fn register<S: StorageBackend + 'static>(&mut self, backend: S) {
        self.backends.push(Arc::new(backend));
    }

    /// Register a pre-built storage backend
    pub fn register_arc(&mut self, backend: Arc<dyn StorageBackend>) {
        self.backends.push(backend);
    }

    /// Get backend by destination name
    pub fn get(&self, name: &str) -> Option<Arc<dyn StorageBackend>> {
        let result = self.backends.iter().find(|s| s.name() == name).cloned();
        debug!(destination = name, found = result.is_some(), "Looking up storage backend");
        result
    }

    /// Get a named backend, or the default when no name is given
    pub fn resolve(&self, name: Option<&str>) -> Option<Arc<dyn StorageBackend>> {
        match name {
            Some(name) => self.get(name),
            None => self.default_backend(),
        }
    }

    /// The first registered backend
    pub fn default_backend(&self) -> Option<Arc<dyn StorageBackend>> {
        self.backends.first().cloned()
    }

    /// Get all backends of a given type
    pub fn get_by_type(&self, backend_type: BackendType) -> Vec<Arc<dyn StorageBackend>> {
        self.backends
            .iter()
            .filter(|s| s.backend_type() == backend_type)
            .cloned()
            .collect()
    }

    /// Get all registered backends
    pub fn all(&self) -> &[Arc<dyn StorageBackend>] {
        &self.backends
    }

    /// Get names of all registered backends
    pub fn names(&self) -> Vec<String> {
        self.backends.iter().map(|s| s.name().to_string()).collect()
    }

    /// Get only backends whose client tool is installed
    pub fn available(&self) -> Vec<Arc<dyn StorageBackend>> {
        let available: Vec<_> = self
            .backends
            .iter()
            .filter(|s| s.is_available())
            .cloned()
            .collect();
        let names: Vec<_> = available.iter().map(|s| s.name()).collect();
        debug!(count = available.len(), backends = ?names, "Queried available storage backends");
        available
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;
    use std::path::Path;

    struct MockBackend {
        mock_name: String,
        mock_type: BackendType,
        mock_available: bool,
    }

    impl MockBackend {
        fn new(name: &str, backend_type: BackendType, available: bool) -> Self {
            Self {
                mock_name: name.to_string(),
                mock_type: backend_type,
                mock_available: available,
            }
        }
    }

    #[async_trait::async_trait]
    impl StorageBackend for MockBackend {
        fn name(&self) -> &str {
            &self.mock_name
        }

        fn backend_type(&self) -> BackendType {
            self.mock_type
        }

        fn is_available(&self) -> bool {
            self.mock_available
        }

        fn location(&self, key: &str) -> String {
            format!("mock://{}", key)
        }

        async fn upload(&self, _path: &Path, _key: &str, _options: &UploadOptions) -> Result<UploadResult> {
            unimplemented!()
        }

        async fn list(&self, _prefix: &str) -> Result<Vec<StoredObject>> {
            unimplemented!()
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            unimplemented!()
        }

        async fn download(&self, _key: &str, _dest: &Path) -> Result<()> {
            unimplemented!()
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = StorageRegistry::new();
        assert!(registry.all().is_empty());
        assert!(registry.names().is_empty());
        assert!(registry.get("anything").is_none());
        assert!(registry.default_backend().is_none());
        assert!(registry.available().is_empty());
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = StorageRegistry::new();
        registry.register(MockBackend::new("primary", BackendType::S3, true));
        registry.register(MockBackend::new("archive", BackendType::Swift, false));

        assert_eq!(registry.names(), vec!["primary".to_string(), "archive".to_string()]);
        assert_eq!(registry.resolve(None).unwrap().name(), "primary");
        assert_eq!(registry.resolve(Some("archive")).unwrap().name(), "archive");
        assert!(registry.resolve(Some("missing")).is_none());
    }

    #[test]
    fn test_get_by_type_and_available() {
        let mut registry = StorageRegistry::new();
        registry.register(MockBackend::new("a", BackendType::S3, true));
        registry.register(MockBackend::new("b", BackendType::Swift, false));
        registry.register(MockBackend::new("c", BackendType::S3, false));

        assert_eq!(registry.get_by_type(BackendType::S3).len(), 2);
        let available = registry.available();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].name(), "a");
    }

    #[test]
    fn test_from_configs() {
        let configs = vec![
            StorageConfig {
                name: "primary".to_string(),
                backend: BackendConfig::S3(S3Config {
                    bucket: "backups".to_string(),
                    ..Default::default()
                }),
            },
            StorageConfig {
                name: "archive".to_string(),
                backend: BackendConfig::Swift(SwiftConfig {
                    container: "dumps".to_string(),
                    ..Default::default()
                }),
            },
        ];

        let registry = StorageRegistry::from_configs(&configs).unwrap();
        assert_eq!(registry.default_backend().unwrap().backend_type(), BackendType::S3);
        assert_eq!(
            registry.get("archive").unwrap().location("x"),
            "swift://dumps/x"
        );
    }

    #[test]
    fn test_from_configs_rejects_invalid() {
        let configs = vec![StorageConfig {
            name: "broken".to_string(),
            backend: BackendConfig::S3(S3Config::default()),
        }];
        assert!(StorageRegistry::from_configs(&configs).is_err());
    }
}
