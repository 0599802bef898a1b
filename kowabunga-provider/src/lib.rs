//! Kowabunga Provider
//!
//! Declarative management of Kowabunga cloud objects over its REST API:
//! 22 resource types and 8 data sources.

pub mod client;
pub mod config;
pub mod convert;
pub mod data_sources;
pub mod models;
pub mod provider;
pub mod resolver;
pub mod resources;
pub mod schemas;
pub mod timeouts;
pub mod validation;

pub use client::{ApiError, KowabungaClient};
pub use config::ProviderConfig;
pub use provider::KowabungaProvider;
pub use resources::{data_source_types, resource_types};

use kowabunga_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use kowabunga_core::resource::{Resource, ResourceId, State};

use crate::timeouts::Operation;

impl Provider for KowabungaProvider {
    fn name(&self) -> &'static str {
        "kowabunga"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn data_source_types(&self) -> Vec<Box<dyn ResourceType>> {
        data_source_types()
    }

    fn read(
        &self,
        resource: &Resource,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        let identifier = identifier.map(|s| s.to_string());
        Box::pin(async move {
            let limit = self.timeouts_of(&resource)?.get(Operation::Read);
            self.guarded(&resource.id, Operation::Read, limit, async {
                match identifier.as_deref() {
                    Some(identifier) => self.read_resource(&resource, identifier).await,
                    None => self.find_resource(&resource).await,
                }
            })
            .await
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let resource = self.prepare(&resource)?;
            let limit = self.timeouts_of(&resource)?.get(Operation::Create);
            let state = self
                .guarded(&resource.id, Operation::Create, limit, self.create_resource(&resource))
                .await?;
            tracing::info!(
                "Created {}.{} ({})",
                resource.id.resource_type,
                resource.id.name,
                state.identifier.as_deref().unwrap_or_default()
            );
            Ok(self.keep_local_attributes(state, &resource))
        })
    }

    fn update(
        &self,
        _id: &ResourceId,
        identifier: &str,
        _from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let identifier = identifier.to_string();
        let to = to.clone();
        Box::pin(async move {
            let resource = self.prepare(&to)?;
            let limit = self.timeouts_of(&resource)?.get(Operation::Update);
            let state = self
                .guarded(
                    &resource.id,
                    Operation::Update,
                    limit,
                    self.update_resource(&identifier, &resource),
                )
                .await?;
            tracing::info!(
                "Updated {}.{} ({})",
                resource.id.resource_type,
                resource.id.name,
                identifier
            );
            Ok(self.keep_local_attributes(state, &resource))
        })
    }

    fn delete(&self, resource: &Resource, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let resource = resource.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let id = &resource.id;
            let limit = self.timeouts_of(&resource)?.get(Operation::Delete);
            self.guarded(
                id,
                Operation::Delete,
                limit,
                self.delete_resource(id, &identifier),
            )
            .await?;
            tracing::info!("Deleted {}.{} ({})", id.resource_type, id.name, identifier);
            Ok(())
        })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone().with_read_only(true);
        Box::pin(async move {
            let resource = self.prepare(&resource)?;
            let limit = self.timeouts_of(&resource)?.get(Operation::Read);
            self.guarded(&resource.id, Operation::Read, limit, self.read_lookup(&resource))
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kowabunga_core::provider::ErrorKind;
    use kowabunga_core::resource::Value;

    fn provider() -> KowabungaProvider {
        KowabungaProvider::new(KowabungaClient::new("http://127.0.0.1:1", "token").unwrap())
    }

    #[test]
    fn exposes_all_types() {
        let p = provider();
        assert_eq!(p.name(), "kowabunga");
        assert_eq!(p.resource_types().len(), 22);
        assert_eq!(p.data_source_types().len(), 8);
    }

    #[tokio::test]
    async fn invalid_resource_is_rejected_before_any_request() {
        let resource = Resource::new("user", "jdoe")
            .with_attribute("name", Value::from("jdoe"))
            .with_attribute("email", Value::from("not-an-email"))
            .with_attribute("role", Value::from("user"));
        let err = provider().create(&resource).await.unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Validation {
                path: "email".to_string()
            }
        );
    }

    #[tokio::test]
    async fn malformed_timeouts_fail_a_read() {
        let resource = Resource::new("zone", "a").with_attribute(
            "timeouts",
            Value::Map(std::collections::HashMap::from([(
                "read".to_string(),
                Value::from("soon"),
            )])),
        );
        let err = provider().read(&resource, Some("z1")).await.unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Validation {
                path: "timeouts".to_string()
            }
        );
    }

    #[tokio::test]
    async fn subnet_lookup_needs_one_criterion() {
        let resource = Resource::new("subnet", "lan");
        let err = provider().read_data_source(&resource).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Validation { .. }));
    }
}
