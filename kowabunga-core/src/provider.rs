//! Provider - Trait abstracting resource operations
//!
//! A Provider maps declarative resources onto a remote platform's API.
//! It owns the network client and turns CRUD requests into API calls.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::resource::{Resource, ResourceId, State};
use crate::schema::{ResourceSchema, TypeError};

/// Category of a provider failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected locally before any network call
    Validation { path: String },
    /// Neither direct lookup nor name scan found the referenced entity
    Resolution { entity: String },
    /// Transport or remote API failure, forwarded verbatim
    Remote,
    /// Deadline exceeded
    Timeout { operation: String },
    /// Provider not (or badly) configured
    Configuration,
    /// Resource type the provider does not handle
    Unsupported,
}

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] ", id.resource_type, id.name)?;
        }
        match &self.kind {
            ErrorKind::Validation { path } if !path.is_empty() => {
                write!(f, "{}: {}", path, self.message)
            }
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    /// Remote failure with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Remote,
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validation { path: path.into() },
            ..Self::new(message)
        }
    }

    /// `entity` is the human label of the kind (e.g. "region", "NFS storage")
    pub fn unknown(entity: impl Into<String>, reference: &str) -> Self {
        let entity = entity.into();
        Self {
            message: format!("Unknown {}: {}", entity, reference),
            kind: ErrorKind::Resolution { entity },
            resource_id: None,
            cause: None,
        }
    }

    pub fn timeout(operation: impl Into<String>, limit: Duration) -> Self {
        let operation = operation.into();
        Self {
            message: format!("{} did not complete within {:?}", operation, limit),
            kind: ErrorKind::Timeout { operation },
            resource_id: None,
            cause: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Configuration,
            ..Self::new(message)
        }
    }

    pub fn unsupported(resource_type: &str) -> Self {
        Self {
            kind: ErrorKind::Unsupported,
            ..Self::new(format!("Unknown resource type: {}", resource_type))
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Short diagnostic summary shown next to the detailed message
    pub fn label(&self) -> String {
        match &self.kind {
            ErrorKind::Validation { .. } => "Invalid attribute value".to_string(),
            ErrorKind::Resolution { entity } => format!("Unknown {}", entity),
            ErrorKind::Remote => "Kowabunga Error".to_string(),
            ErrorKind::Timeout { .. } => "Operation timed out".to_string(),
            ErrorKind::Configuration => "Provider configuration error".to_string(),
            ErrorKind::Unsupported => "Unsupported resource type".to_string(),
        }
    }
}

impl From<TypeError> for ProviderError {
    fn from(e: TypeError) -> Self {
        ProviderError::validation(e.path(), e.root_cause().to_string())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of resource (or data source) types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "storage_pool")
    fn name(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
    }
}

/// Main Provider trait
///
/// All operations are async and involve side effects on the remote platform.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "kowabunga")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can manage
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// List of read-only data sources this Provider exposes
    fn data_source_types(&self) -> Vec<Box<dyn ResourceType>> {
        vec![]
    }

    /// Get the current state of a resource
    ///
    /// `resource` is the declared resource; its attributes may tune the
    /// read (deadlines, how references are reported back).
    /// If identifier is provided, use it to read the resource directly.
    /// Otherwise, fall back to name-based lookup.
    /// Returns `State::not_found()` if the resource does not exist.
    fn read(
        &self,
        resource: &Resource,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the platform-assigned ID
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource; the whole desired object is sent
    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource
    fn delete(&self, resource: &Resource, identifier: &str) -> BoxFuture<'_, ProviderResult<()>>;

    /// Evaluate a data source
    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let id = resource.id.clone();
        Box::pin(async move {
            Err(ProviderError::unsupported(&id.resource_type).for_resource(id.clone()))
        })
    }
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn data_source_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).data_source_types()
    }

    fn read(
        &self,
        resource: &Resource,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(resource, identifier)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(id, identifier, from, to)
    }

    fn delete(&self, resource: &Resource, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(resource, identifier)
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read_data_source(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Mock Provider for testing
    struct MockProvider;

    impl Provider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![]
        }

        fn read(
            &self,
            resource: &Resource,
            _identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            let attrs = resource.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs).with_identifier("mock-id-123")) })
        }

        fn update(
            &self,
            id: &ResourceId,
            _identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            let attrs = to.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs)) })
        }

        fn delete(
            &self,
            _resource: &Resource,
            _identifier: &str,
        ) -> BoxFuture<'_, ProviderResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn mock_provider_read_returns_not_found() {
        let provider = MockProvider;
        let resource = Resource::new("test", "example");
        let state = provider.read(&resource, None).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn mock_provider_create_returns_existing() {
        let provider = MockProvider;
        let resource = Resource::new("test", "example");
        let state = provider.create(&resource).await.unwrap();
        assert!(state.exists);
        assert_eq!(state.identifier, Some("mock-id-123".to_string()));
    }

    #[tokio::test]
    async fn boxed_provider_rejects_data_sources_by_default() {
        let provider: Box<dyn Provider> = Box::new(MockProvider);
        let lookup = Resource::new("region", "main").with_read_only(true);
        let err = provider.read_data_source(&lookup).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unsupported);
    }

    #[test]
    fn error_labels_follow_kind() {
        assert_eq!(ProviderError::new("boom").label(), "Kowabunga Error");
        assert_eq!(
            ProviderError::unknown("NFS storage", "nfs-1").label(),
            "Unknown NFS storage"
        );
        assert_eq!(
            ProviderError::timeout("create", Duration::from_secs(1)).label(),
            "Operation timed out"
        );
    }

    #[test]
    fn validation_error_displays_path_and_resource() {
        let err = ProviderError::validation("ingress_rules[0].ports", "Invalid port: 70000")
            .for_resource(ResourceId::new("kawaii", "gw"));
        assert_eq!(
            err.to_string(),
            "[kawaii.gw] ingress_rules[0].ports: Invalid port: 70000"
        );
    }

    #[test]
    fn type_error_converts_to_validation() {
        let e = TypeError::FieldError {
            name: "port".to_string(),
            inner: Box::new(TypeError::ValidationFailed {
                message: "Port number is outside range (0-65535)".to_string(),
            }),
        };
        let err = ProviderError::from(e);
        assert_eq!(
            err.kind,
            ErrorKind::Validation {
                path: "port".to_string()
            }
        );
        assert!(err.message.contains("outside range"));
    }
}
