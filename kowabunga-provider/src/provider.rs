//! Kowabunga Provider implementation
//!
//! Holds the API client and the lock that serializes every operation, and
//! provides the generic object operations the per-resource handlers build on.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use kowabunga_core::provider::{ProviderError, ProviderResult};
use kowabunga_core::resource::{Resource, ResourceId, State, Value};
use kowabunga_core::schema::ResourceSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::client::{ApiError, KowabungaClient, Query, segment};
use crate::config::ProviderConfig;
use crate::convert::AttrReader;
use crate::resolver::Resolver;
use crate::resources::ApiObject;
use crate::schemas;
use crate::timeouts::{Operation, Timeouts};
use crate::validation::validate_resource;

/// Convert an API failure into a diagnostic bound to a resource
pub(crate) fn remote_error(e: ApiError, id: &ResourceId) -> ProviderError {
    ProviderError::new(e.to_string())
        .with_cause(e)
        .for_resource(id.clone())
}

/// State of an existing object, with its ID exposed as the `id` attribute
pub(crate) fn existing_state(
    id: &ResourceId,
    identifier: &str,
    mut attributes: HashMap<String, Value>,
) -> State {
    attributes.insert("id".to_string(), Value::String(identifier.to_string()));
    State::existing(id.clone(), attributes).with_identifier(identifier)
}

/// Kowabunga Provider
pub struct KowabungaProvider {
    client: KowabungaClient,
    lock: Mutex<()>,
}

impl KowabungaProvider {
    pub fn new(client: KowabungaClient) -> Self {
        Self {
            client,
            lock: Mutex::new(()),
        }
    }

    /// Build a provider from connection settings
    pub fn configure(config: &ProviderConfig) -> ProviderResult<Self> {
        config.validate()?;
        let client = KowabungaClient::new(&config.uri, &config.token)
            .map_err(|e| ProviderError::configuration(e.to_string()).with_cause(e))?;
        tracing::debug!("Configured Kowabunga provider for {}", client.base_url());
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &KowabungaClient {
        &self.client
    }

    pub(crate) fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.client)
    }

    /// Schema of a resource or data source type
    pub fn schema_for(&self, resource_type: &str, data_source: bool) -> Option<ResourceSchema> {
        if data_source {
            schemas::data_source_schema(resource_type)
        } else {
            schemas::resource_schema(resource_type)
        }
    }

    /// Apply defaults and check attributes against the schema.
    /// Runs before any request is issued.
    pub fn prepare(&self, resource: &Resource) -> ProviderResult<Resource> {
        let schema = self
            .schema_for(&resource.id.resource_type, resource.is_data_source())
            .ok_or_else(|| {
                ProviderError::unsupported(&resource.id.resource_type)
                    .for_resource(resource.id.clone())
            })?;

        let mut prepared = resource.clone();
        schema.apply_defaults(&mut prepared.attributes);

        if let Err(errors) = validate_resource(&schema, &prepared.attributes) {
            let first = &errors[0];
            let message = if errors.len() > 1 {
                format!("{} (and {} more)", first.message, errors.len() - 1)
            } else {
                first.message.clone()
            };
            return Err(ProviderError::validation(first.path.clone(), message)
                .for_resource(resource.id.clone()));
        }
        Ok(prepared)
    }

    /// Carry the locally-held attributes (parent references, create-time
    /// switches, timeouts) of the desired resource over into its new state
    pub(crate) fn keep_local_attributes(&self, mut state: State, resource: &Resource) -> State {
        let Some(schema) = self.schema_for(&resource.id.resource_type, false) else {
            return state;
        };
        for (name, attr) in &schema.attributes {
            if !attr.write_only {
                continue;
            }
            if let Some(value) = resource.attributes.get(name) {
                state.attributes.insert(name.clone(), value.clone());
            }
        }
        state
    }

    /// Deadlines requested by a resource's `timeouts` attribute
    pub(crate) fn timeouts_of(&self, resource: &Resource) -> ProviderResult<Timeouts> {
        Timeouts::from_attributes(&resource.attributes).map_err(|message| {
            ProviderError::validation("timeouts", message).for_resource(resource.id.clone())
        })
    }

    /// Run `operation` while holding the provider lock, bounded by `limit`.
    /// The wait for the lock counts against the deadline.
    pub(crate) async fn guarded<T, F>(
        &self,
        id: &ResourceId,
        op: Operation,
        limit: Duration,
        operation: F,
    ) -> ProviderResult<T>
    where
        F: Future<Output = ProviderResult<T>>,
    {
        let run = async {
            let _guard = self.lock.lock().await;
            tracing::debug!("Lock acquired for {} of {}.{}", op, id.resource_type, id.name);
            operation.await
        };

        match tokio::time::timeout(limit, run).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "{} of {}.{} timed out after {:?}",
                    op,
                    id.resource_type,
                    id.name,
                    limit
                );
                Err(ProviderError::timeout(op.to_string(), limit).for_resource(id.clone()))
            }
        }
    }

    // =========================================================================
    // Generic object operations
    // =========================================================================

    /// GET an object, `None` when it does not exist
    pub(crate) async fn get_object<T: DeserializeOwned>(
        &self,
        id: &ResourceId,
        path: &str,
    ) -> ProviderResult<Option<T>> {
        match self.client.get(path).await {
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(remote_error(e, id)),
        }
    }

    /// Build the API object from the resource and POST it under `parent`
    pub(crate) async fn create_object<T: ApiObject>(
        &self,
        resource: &Resource,
        parent: &str,
        query: Query<'_>,
    ) -> ProviderResult<(String, T)> {
        let object = T::from_attributes(&AttrReader::new(&resource.attributes))
            .map_err(|e| e.for_resource(resource.id.clone()))?;
        let created: T = self
            .client
            .post(parent, query, &object)
            .await
            .map_err(|e| remote_error(e, &resource.id))?;
        let identifier = created.id().map(str::to_string).ok_or_else(|| {
            ProviderError::new("object created but no ID returned")
                .for_resource(resource.id.clone())
        })?;
        Ok((identifier, created))
    }

    /// PUT the whole object; re-read it when the response carries no body
    pub(crate) async fn put_object<T>(
        &self,
        id: &ResourceId,
        path: &str,
        object: &T,
    ) -> ProviderResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let updated: Option<T> = self
            .client
            .put(path, object)
            .await
            .map_err(|e| remote_error(e, id))?;
        match updated {
            Some(object) => Ok(object),
            None => self.get_object(id, path).await?.ok_or_else(|| {
                ProviderError::new(format!("{} vanished during update", path))
                    .for_resource(id.clone())
            }),
        }
    }

    /// DELETE an object; one already gone counts as deleted
    pub(crate) async fn delete_object(&self, id: &ResourceId, path: &str) -> ProviderResult<()> {
        match self.client.delete(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} already deleted", path);
                Ok(())
            }
            Err(e) => Err(remote_error(e, id)),
        }
    }

    /// Body-less PUT action (default flags, tokens)
    pub(crate) async fn object_action(
        &self,
        id: &ResourceId,
        path: &str,
        query: Query<'_>,
    ) -> ProviderResult<()> {
        self.client
            .put_action(path, query)
            .await
            .map_err(|e| remote_error(e, id))
    }

    // =========================================================================
    // Typed helpers over ApiObject
    // =========================================================================

    /// Read an object of a type living at `<PATH>/<identifier>`
    pub(crate) async fn read_typed<T: ApiObject>(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let path = format!("{}/{}", T::PATH, segment(&identifier));
        match self.get_object::<T>(id, &path).await? {
            Some(object) => Ok(existing_state(id, identifier, object.to_attributes())),
            None => Ok(State::not_found(id.clone())),
        }
    }

    /// Send the whole desired object to `<PATH>/<identifier>`
    pub(crate) async fn update_typed<T: ApiObject>(
        &self,
        identifier: &str,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let object = T::from_attributes(&AttrReader::new(&resource.attributes))
            .map_err(|e| e.for_resource(resource.id.clone()))?;
        let path = format!("{}/{}", T::PATH, segment(&identifier));
        let updated = self.put_object(&resource.id, &path, &object).await?;
        Ok(existing_state(&resource.id, identifier, updated.to_attributes()))
    }

    pub(crate) async fn delete_typed<T: ApiObject>(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        self.delete_object(id, &format!("{}/{}", T::PATH, segment(&identifier)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kowabunga_core::provider::ErrorKind;

    fn provider() -> KowabungaProvider {
        KowabungaProvider::new(KowabungaClient::new("http://127.0.0.1:1", "token").unwrap())
    }

    #[test]
    fn configure_requires_parameters() {
        let err = KowabungaProvider::configure(&ProviderConfig::default())
            .err()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn prepare_applies_defaults() {
        let resource = Resource::new("vnet", "lan")
            .with_attribute("name", Value::from("lan"))
            .with_attribute("region", Value::from("eu-west"))
            .with_attribute("interface", Value::from("br0"));
        let prepared = provider().prepare(&resource).unwrap();
        assert_eq!(prepared.attributes["vlan"], Value::Int(0));
        assert_eq!(prepared.attributes["private"], Value::Bool(true));
        assert_eq!(prepared.attributes["desc"], Value::from(""));
    }

    #[test]
    fn prepare_rejects_invalid_values_with_path() {
        let resource = Resource::new("kawaii", "gw")
            .with_attribute("project", Value::from("acme"))
            .with_attribute("region", Value::from("eu-west"))
            .with_attribute(
                "ingress_rules",
                Value::List(vec![Value::Map(HashMap::from([(
                    "ports".to_string(),
                    Value::from("100-50"),
                )]))]),
            );
        let err = provider().prepare(&resource).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Validation {
                path: "ingress_rules[0].ports".to_string()
            }
        );
        assert!(err.message.contains("Invalid range"));
    }

    #[test]
    fn prepare_rejects_unknown_types() {
        let err = provider()
            .prepare(&Resource::new("bucket", "b"))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unsupported);
    }

    #[tokio::test(start_paused = true)]
    async fn guarded_operation_times_out() {
        let p = provider();
        let id = ResourceId::new("region", "eu-west");
        let err = p
            .guarded(&id, Operation::Read, Duration::from_secs(5), async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Timeout {
                operation: "read".to_string()
            }
        );
        assert_eq!(err.label(), "Operation timed out");
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_for_the_lock_counts_against_the_deadline() {
        let p = provider();
        let id = ResourceId::new("region", "eu-west");
        let _held = p.lock.lock().await;
        let result: ProviderResult<()> = p
            .guarded(&id, Operation::Delete, Duration::from_secs(1), async { Ok(()) })
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn local_attributes_are_kept() {
        let resource = Resource::new("zone", "a")
            .with_attribute("name", Value::from("a"))
            .with_attribute("region", Value::from("eu-west"));
        let state = State::existing(resource.id.clone(), HashMap::new());
        let state = provider().keep_local_attributes(state, &resource);
        assert_eq!(state.attributes["region"], Value::from("eu-west"));
        assert!(!state.attributes.contains_key("name"));
    }

    #[test]
    fn existing_state_exposes_id() {
        let id = ResourceId::new("zone", "a");
        let state = existing_state(&id, "z1", HashMap::new());
        assert_eq!(state.identifier.as_deref(), Some("z1"));
        assert_eq!(state.attributes["id"], Value::from("z1"));
    }
}
