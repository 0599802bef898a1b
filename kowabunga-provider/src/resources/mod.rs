//! Resource type definitions and per-type dispatch
//!
//! This module defines:
//! - Resource and data source types (implementing the ResourceType trait)
//! - The `ApiObject` conversion contract between attributes and API objects
//! - Dispatch of CRUD operations to the per-type handlers

pub mod compute;
pub mod identity;
pub mod infrastructure;
pub mod network;

use std::collections::HashMap;

use kowabunga_core::provider::{ProviderError, ProviderResult, ResourceType};
use kowabunga_core::resource::{Resource, ResourceId, State, Value};
use kowabunga_core::schema::ResourceSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::convert::AttrReader;
use crate::models::*;
use crate::provider::{KowabungaProvider, existing_state};
use crate::resolver::EntityKind;
use crate::schemas;

/// An API object mapped to and from a resource's attributes
pub trait ApiObject: Serialize + DeserializeOwned + Send + Sync + Sized {
    /// Prefix of the object path (`<PATH>/<id>`), also its top-level collection
    const PATH: &'static str;

    fn id(&self) -> Option<&str>;

    /// Build the object sent on create and update
    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self>;

    /// Attributes read back from the object, defaults substituted
    fn to_attributes(&self) -> HashMap<String, Value>;
}

/// Description sent to the API; an empty one is sent as such
pub(crate) fn description(attrs: &AttrReader<'_>) -> Option<String> {
    Some(attrs.string_or("desc", ""))
}

/// State of a freshly created object
pub(crate) fn created_state<T: ApiObject>(
    resource: &Resource,
    (identifier, object): (String, T),
) -> State {
    existing_state(&resource.id, &identifier, object.to_attributes())
}

// =============================================================================
// Resource Type Definitions
// =============================================================================

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr, $schema:path) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                $schema()
            }
        }
    };
}

define_resource_type!(RegionType, "region", schemas::infrastructure::region_schema);
define_resource_type!(ZoneType, "zone", schemas::infrastructure::zone_schema);
define_resource_type!(AgentType, "agent", schemas::infrastructure::agent_schema);
define_resource_type!(KiwiType, "kiwi", schemas::infrastructure::kiwi_schema);
define_resource_type!(KaktusType, "kaktus", schemas::infrastructure::kaktus_schema);
define_resource_type!(
    StoragePoolType,
    "storage_pool",
    schemas::infrastructure::storage_pool_schema
);
define_resource_type!(StorageNfsType, "storage_nfs", schemas::infrastructure::storage_nfs_schema);
define_resource_type!(TemplateType, "template", schemas::infrastructure::template_schema);
define_resource_type!(VNetType, "vnet", schemas::infrastructure::vnet_schema);
define_resource_type!(SubnetType, "subnet", schemas::infrastructure::subnet_schema);
define_resource_type!(TeamType, "team", schemas::identity::team_schema);
define_resource_type!(UserType, "user", schemas::identity::user_schema);
define_resource_type!(ProjectType, "project", schemas::identity::project_schema);
define_resource_type!(VolumeType, "volume", schemas::compute::volume_schema);
define_resource_type!(AdapterType, "adapter", schemas::compute::adapter_schema);
define_resource_type!(InstanceType, "instance", schemas::compute::instance_schema);
define_resource_type!(KomputeType, "kompute", schemas::compute::kompute_schema);
define_resource_type!(DnsRecordType, "dns_record", schemas::compute::dns_record_schema);
define_resource_type!(KawaiiType, "kawaii", schemas::network::kawaii_schema);
define_resource_type!(KawaiiIpSecType, "kawaii_ipsec", schemas::network::kawaii_ipsec_schema);
define_resource_type!(KonveyType, "konvey", schemas::network::konvey_schema);
define_resource_type!(KyloType, "kylo", schemas::network::kylo_schema);

fn region_lookup_schema() -> ResourceSchema {
    lookup_schema("region")
}
fn team_lookup_schema() -> ResourceSchema {
    lookup_schema("team")
}
fn zone_lookup_schema() -> ResourceSchema {
    lookup_schema("zone")
}
fn subnet_lookup_schema() -> ResourceSchema {
    lookup_schema("subnet")
}
fn regions_lookup_schema() -> ResourceSchema {
    lookup_schema("regions")
}
fn teams_lookup_schema() -> ResourceSchema {
    lookup_schema("teams")
}
fn subnets_lookup_schema() -> ResourceSchema {
    lookup_schema("subnets")
}
fn zones_lookup_schema() -> ResourceSchema {
    lookup_schema("zones")
}

fn lookup_schema(name: &str) -> ResourceSchema {
    schemas::data_source_schema(name).unwrap_or_else(|| ResourceSchema::new(name))
}

define_resource_type!(RegionDataSource, "region", region_lookup_schema);
define_resource_type!(TeamDataSource, "team", team_lookup_schema);
define_resource_type!(ZoneDataSource, "zone", zone_lookup_schema);
define_resource_type!(SubnetDataSource, "subnet", subnet_lookup_schema);
define_resource_type!(RegionsDataSource, "regions", regions_lookup_schema);
define_resource_type!(TeamsDataSource, "teams", teams_lookup_schema);
define_resource_type!(SubnetsDataSource, "subnets", subnets_lookup_schema);
define_resource_type!(ZonesDataSource, "zones", zones_lookup_schema);

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(RegionType),
        Box::new(ZoneType),
        Box::new(AgentType),
        Box::new(KiwiType),
        Box::new(KaktusType),
        Box::new(StoragePoolType),
        Box::new(StorageNfsType),
        Box::new(TemplateType),
        Box::new(VNetType),
        Box::new(SubnetType),
        Box::new(TeamType),
        Box::new(UserType),
        Box::new(ProjectType),
        Box::new(VolumeType),
        Box::new(AdapterType),
        Box::new(InstanceType),
        Box::new(KomputeType),
        Box::new(DnsRecordType),
        Box::new(KawaiiType),
        Box::new(KawaiiIpSecType),
        Box::new(KonveyType),
        Box::new(KyloType),
    ]
}

/// Returns all data sources exposed by this provider
pub fn data_source_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(RegionDataSource),
        Box::new(TeamDataSource),
        Box::new(ZoneDataSource),
        Box::new(SubnetDataSource),
        Box::new(RegionsDataSource),
        Box::new(TeamsDataSource),
        Box::new(SubnetsDataSource),
        Box::new(ZonesDataSource),
    ]
}

// =============================================================================
// Dispatch
// =============================================================================

/// Call a generic `ApiObject` method for every type living at `<PATH>/<id>`
macro_rules! typed_dispatch {
    ($provider:expr, $resource_type:expr, $method:ident($($arg:expr),*)) => {
        match $resource_type {
            "region" => $provider.$method::<Region>($($arg),*).await,
            "zone" => $provider.$method::<Zone>($($arg),*).await,
            "agent" => $provider.$method::<Agent>($($arg),*).await,
            "kiwi" => $provider.$method::<Kiwi>($($arg),*).await,
            "kaktus" => $provider.$method::<Kaktus>($($arg),*).await,
            "storage_pool" => $provider.$method::<StoragePool>($($arg),*).await,
            "storage_nfs" => $provider.$method::<StorageNfs>($($arg),*).await,
            "template" => $provider.$method::<Template>($($arg),*).await,
            "vnet" => $provider.$method::<VNet>($($arg),*).await,
            "subnet" => $provider.$method::<Subnet>($($arg),*).await,
            "team" => $provider.$method::<Team>($($arg),*).await,
            "user" => $provider.$method::<User>($($arg),*).await,
            "project" => $provider.$method::<Project>($($arg),*).await,
            "volume" => $provider.$method::<Volume>($($arg),*).await,
            "adapter" => $provider.$method::<Adapter>($($arg),*).await,
            "instance" => $provider.$method::<Instance>($($arg),*).await,
            "kompute" => $provider.$method::<Kompute>($($arg),*).await,
            "dns_record" => $provider.$method::<DnsRecord>($($arg),*).await,
            "kawaii" => $provider.$method::<Kawaii>($($arg),*).await,
            "konvey" => $provider.$method::<Konvey>($($arg),*).await,
            "kylo" => $provider.$method::<Kylo>($($arg),*).await,
            other => Err(ProviderError::unsupported(other)),
        }
    };
}

impl KowabungaProvider {
    /// Resolve a required parent reference held in attribute `key`
    pub(crate) async fn parent_id(
        &self,
        resource: &Resource,
        key: &str,
        kind: EntityKind,
    ) -> ProviderResult<String> {
        let reference = AttrReader::new(&resource.attributes)
            .required_string(key)
            .map_err(|e| e.for_resource(resource.id.clone()))?;
        self.resolver()
            .resolve(kind, &reference)
            .await
            .map_err(|e| e.for_resource(resource.id.clone()))
    }

    /// Resolve an optional parent reference; one that cannot be resolved is left out
    pub(crate) async fn optional_parent_id(
        &self,
        resource: &Resource,
        key: &str,
        kind: EntityKind,
    ) -> Option<String> {
        let reference = AttrReader::new(&resource.attributes).non_empty_string(key)?;
        match self.resolver().resolve(kind, &reference).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Ignoring {} '{}': {}", key, reference, e);
                None
            }
        }
    }

    pub(crate) async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        match resource.id.resource_type.as_str() {
            "region" => self.create_region(resource).await,
            "zone" => self.create_zone(resource).await,
            "agent" => self.create_agent(resource).await,
            "kiwi" => self.create_kiwi(resource).await,
            "kaktus" => self.create_kaktus(resource).await,
            "storage_pool" => self.create_storage_pool(resource).await,
            "storage_nfs" => self.create_storage_nfs(resource).await,
            "template" => self.create_template(resource).await,
            "vnet" => self.create_vnet(resource).await,
            "subnet" => self.create_subnet(resource).await,
            "team" => self.create_team(resource).await,
            "user" => self.create_user(resource).await,
            "project" => self.create_project(resource).await,
            "volume" => self.create_volume(resource).await,
            "adapter" => self.create_adapter(resource).await,
            "instance" => self.create_instance(resource).await,
            "kompute" => self.create_kompute(resource).await,
            "dns_record" => self.create_dns_record(resource).await,
            "kawaii" => self.create_kawaii(resource).await,
            "kawaii_ipsec" => self.create_kawaii_ipsec(resource).await,
            "konvey" => self.create_konvey(resource).await,
            "kylo" => self.create_kylo(resource).await,
            other => Err(ProviderError::unsupported(other).for_resource(resource.id.clone())),
        }
    }

    pub(crate) async fn read_resource(
        &self,
        resource: &Resource,
        identifier: &str,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        match id.resource_type.as_str() {
            "adapter" => self.read_adapter(resource, identifier).await,
            "project" => self.read_project(id, identifier).await,
            "kawaii_ipsec" => self.read_kawaii_ipsec(resource, identifier).await,
            other => typed_dispatch!(self, other, read_typed(id, identifier))
                .map_err(|e| e.for_resource(id.clone())),
        }
    }

    pub(crate) async fn update_resource(
        &self,
        identifier: &str,
        resource: &Resource,
    ) -> ProviderResult<State> {
        match resource.id.resource_type.as_str() {
            "adapter" => self.update_adapter(identifier, resource).await,
            "kawaii_ipsec" => self.update_kawaii_ipsec(identifier, resource).await,
            other => typed_dispatch!(self, other, update_typed(identifier, resource))
                .map_err(|e| e.for_resource(resource.id.clone())),
        }
    }

    pub(crate) async fn delete_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        match id.resource_type.as_str() {
            "kawaii_ipsec" => self.delete_kawaii_ipsec(id, identifier).await,
            other => typed_dispatch!(self, other, delete_typed(id, identifier))
                .map_err(|e| e.for_resource(id.clone())),
        }
    }

    /// Look an object up by the resource's name
    pub(crate) async fn find_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let collection = match id.resource_type.as_str() {
            // Platform-assigned names, nothing to match against
            "kawaii" | "kawaii_ipsec" => return Ok(State::not_found(id.clone())),
            other => typed_dispatch!(self, other, collection_of())
                .map_err(|e| e.for_resource(id.clone()))?,
        };
        match self
            .resolver()
            .find_by_name(collection, &id.name)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        {
            Some(identifier) => self.read_resource(resource, &identifier).await,
            None => Ok(State::not_found(id.clone())),
        }
    }

    /// Top-level collection of an object type
    async fn collection_of<T: ApiObject>(&self) -> ProviderResult<&'static str> {
        Ok(T::PATH)
    }
}
