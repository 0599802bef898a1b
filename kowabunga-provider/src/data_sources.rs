//! Data sources: name lookups and name-to-ID catalogues

use std::collections::HashMap;

use kowabunga_core::provider::{ProviderError, ProviderResult};
use kowabunga_core::resource::{Resource, State, Value};

use crate::client::segment;
use crate::convert::AttrReader;
use crate::models::{Named, Subnet};
use crate::provider::{KowabungaProvider, remote_error};
use crate::resolver::EntityKind;

/// Data source state: the configured arguments plus what was looked up.
/// An empty `id` means no match.
fn lookup_state(
    resource: &Resource,
    mut attributes: HashMap<String, Value>,
    id: Option<String>,
) -> State {
    let identifier = id.unwrap_or_default();
    attributes.insert("id".to_string(), Value::String(identifier.clone()));
    let state = State::existing(resource.id.clone(), attributes);
    if identifier.is_empty() {
        state
    } else {
        state.with_identifier(identifier)
    }
}

impl KowabungaProvider {
    pub(crate) async fn read_lookup(&self, resource: &Resource) -> ProviderResult<State> {
        match resource.id.resource_type.as_str() {
            "region" => self.lookup_by_name(resource, "region").await,
            "team" => self.lookup_by_name(resource, "team").await,
            "zone" => self.lookup_by_name(resource, "zone").await,
            "subnet" => self.lookup_subnet(resource).await,
            "regions" => self.catalogue(resource, "region").await,
            "teams" => self.catalogue(resource, "team").await,
            "subnets" => self.catalogue(resource, "subnet").await,
            "zones" => self.region_zones(resource).await,
            other => Err(ProviderError::unsupported(other).for_resource(resource.id.clone())),
        }
    }

    /// ID of the first object of a collection carrying the configured name
    async fn lookup_by_name(
        &self,
        resource: &Resource,
        collection: &str,
    ) -> ProviderResult<State> {
        let name = AttrReader::new(&resource.attributes)
            .required_string("name")
            .map_err(|e| e.for_resource(resource.id.clone()))?;
        let id = self
            .resolver()
            .find_by_name(collection, &name)
            .await
            .map_err(|e| e.for_resource(resource.id.clone()))?;
        if id.is_none() {
            tracing::debug!("No {} named '{}'", collection, name);
        }
        Ok(lookup_state(resource, resource.attributes.clone(), id))
    }

    /// Subnet by name or by application; exactly one of the two is given
    async fn lookup_subnet(&self, resource: &Resource) -> ProviderResult<State> {
        let attrs = AttrReader::new(&resource.attributes);
        let name = attrs.non_empty_string("name");
        let app = attrs.non_empty_string("app");
        match (&name, &app) {
            (None, None) => {
                return Err(ProviderError::validation(
                    "name",
                    "either 'name' or 'app' field is required",
                )
                .for_resource(resource.id.clone()));
            }
            (Some(_), Some(_)) => {
                return Err(ProviderError::validation(
                    "app",
                    "one can't ask for both name and app fields",
                )
                .for_resource(resource.id.clone()));
            }
            _ => {}
        }

        let ids = self
            .client()
            .list_ids("subnet")
            .await
            .map_err(|e| remote_error(e, &resource.id))?;
        let mut attributes = resource.attributes.clone();
        for id in ids {
            let subnet: Subnet = self
                .client()
                .get(&format!("subnet/{}", segment(&id)))
                .await
                .map_err(|e| remote_error(e, &resource.id))?;
            let application = subnet.application.clone().unwrap_or_default();
            let matched = match (&name, &app) {
                (Some(name), _) => subnet.name == *name,
                (_, Some(app)) => subnet.application.as_deref() == Some(app.as_str()),
                _ => false,
            };
            if matched {
                attributes.insert("name".to_string(), Value::String(subnet.name));
                attributes.insert("app".to_string(), Value::String(application));
                return Ok(lookup_state(resource, attributes, subnet.id.or(Some(id))));
            }
        }
        Ok(lookup_state(resource, attributes, None))
    }

    /// Name-to-ID map of every readable object listed at `path`
    async fn name_map(
        &self,
        resource: &Resource,
        path: &str,
        object: &str,
    ) -> ProviderResult<Value> {
        let ids = self
            .client()
            .list_ids(path)
            .await
            .map_err(|e| remote_error(e, &resource.id))?;
        let mut names = HashMap::new();
        for id in ids {
            match self.client().get::<Named>(&format!("{}/{}", object, segment(&id))).await {
                Ok(entry) => {
                    names.insert(entry.name, Value::String(entry.id.unwrap_or(id)));
                }
                Err(e) => tracing::warn!("Skipping unreadable {} {}: {}", object, id, e),
            }
        }
        Ok(Value::Map(names))
    }

    /// Every object of a top-level collection, exposed under the data source's name
    async fn catalogue(&self, resource: &Resource, collection: &str) -> ProviderResult<State> {
        let names = self.name_map(resource, collection, collection).await?;
        let mut attributes = resource.attributes.clone();
        attributes.insert(resource.id.resource_type.clone(), names);
        Ok(lookup_state(resource, attributes, None))
    }

    /// Zones of one region
    async fn region_zones(&self, resource: &Resource) -> ProviderResult<State> {
        let region = self.parent_id(resource, "region", EntityKind::Region).await?;
        let names = self
            .name_map(resource, &format!("region/{}/zones", segment(&region)), "zone")
            .await?;
        let mut attributes = resource.attributes.clone();
        attributes.insert("zones".to_string(), names);
        Ok(lookup_state(resource, attributes, None))
    }
}
