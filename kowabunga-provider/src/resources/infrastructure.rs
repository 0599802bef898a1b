//! Infrastructure resources: region, zone, agent, kiwi, kaktus, storage pool,
//! NFS storage, template, virtual network and subnet

use std::collections::HashMap;

use kowabunga_core::provider::{ProviderError, ProviderResult};
use kowabunga_core::resource::{Resource, State, Value};

use super::{ApiObject, created_state, description};
use crate::client::segment;
use crate::convert::{AttrMap, AttrReader};
use crate::models::{
    Agent, Cost, IpRange, Kaktus, Kiwi, Region, StorageNfs, StoragePool, Subnet, Template, VNet,
    Zone,
};
use crate::provider::KowabungaProvider;
use crate::resolver::EntityKind;

const DEFAULT_CURRENCY: &str = "EUR";
const DEFAULT_CPU_OVERCOMMIT: i64 = 3;
const DEFAULT_MEMORY_OVERCOMMIT: i64 = 2;
const DEFAULT_NFS_FS: &str = "nfs";
const DEFAULT_NFS_PORT: i64 = 54934;
const DEFAULT_TEMPLATE_OS: &str = "linux";
const DEFAULT_APPLICATION: &str = "user";

impl ApiObject for Region {
    const PATH: &'static str = "region";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(Region {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            domain: attrs.required_string("domain")?,
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("domain", self.domain.as_str())
            .build()
    }
}

impl ApiObject for Zone {
    const PATH: &'static str = "zone";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(Zone {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .build()
    }
}

impl ApiObject for Agent {
    const PATH: &'static str = "agent";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(Agent {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            agent_type: attrs.required_string("type")?,
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("type", self.agent_type.as_str())
            .build()
    }
}

impl ApiObject for Kiwi {
    const PATH: &'static str = "kiwi";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(Kiwi {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            agents: attrs.string_list("agents"),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with_strings("agents", self.agents.iter().cloned())
            .build()
    }
}

impl ApiObject for Kaktus {
    const PATH: &'static str = "kaktus";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        let currency = attrs.string_or("currency", DEFAULT_CURRENCY);
        Ok(Kaktus {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            cpu_cost: Some(Cost {
                price: attrs.float_or("cpu_price", 0.0),
                currency: currency.clone(),
            }),
            memory_cost: Some(Cost {
                price: attrs.float_or("memory_price", 0.0),
                currency,
            }),
            overcommit_cpu_ratio: Some(attrs.int_or("cpu_overcommit", DEFAULT_CPU_OVERCOMMIT)),
            overcommit_memory_ratio: Some(
                attrs.int_or("memory_overcommit", DEFAULT_MEMORY_OVERCOMMIT),
            ),
            agents: attrs.string_list("agents"),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        let price = |cost: &Option<Cost>| cost.as_ref().map(|c| c.price).unwrap_or(0.0);
        let currency = self
            .cpu_cost
            .as_ref()
            .map(|c| c.currency.clone())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("cpu_price", price(&self.cpu_cost))
            .with("memory_price", price(&self.memory_cost))
            .with("currency", currency)
            .with(
                "cpu_overcommit",
                self.overcommit_cpu_ratio.unwrap_or(DEFAULT_CPU_OVERCOMMIT),
            )
            .with(
                "memory_overcommit",
                self.overcommit_memory_ratio
                    .unwrap_or(DEFAULT_MEMORY_OVERCOMMIT),
            )
            .with_strings("agents", self.agents.iter().cloned())
            .build()
    }
}

impl ApiObject for StoragePool {
    const PATH: &'static str = "pool";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(StoragePool {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            pool: attrs.required_string("pool")?,
            ceph_address: attrs.string("address"),
            ceph_port: attrs.int("port"),
            ceph_secret_uuid: attrs.string("secret"),
            cost: Some(Cost {
                price: attrs.float_or("price", 0.0),
                currency: attrs.string_or("currency", DEFAULT_CURRENCY),
            }),
            agents: attrs.string_list("agents"),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        let (price, currency) = match &self.cost {
            Some(cost) => (cost.price, cost.currency.clone()),
            None => (0.0, DEFAULT_CURRENCY.to_string()),
        };
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("pool", self.pool.as_str())
            .with("address", self.ceph_address.clone().unwrap_or_default())
            .with("port", self.ceph_port.unwrap_or(0))
            .with("secret", self.ceph_secret_uuid.clone().unwrap_or_default())
            .with("price", price)
            .with("currency", currency)
            .with_strings("agents", self.agents.iter().cloned())
            .build()
    }
}

impl ApiObject for StorageNfs {
    const PATH: &'static str = "nfs";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(StorageNfs {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            endpoint: attrs.required_string("endpoint")?,
            fs: Some(attrs.string_or("fs", DEFAULT_NFS_FS)),
            backends: attrs.sorted_string_list("backends"),
            port: Some(attrs.int_or("port", DEFAULT_NFS_PORT)),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        let mut backends = self.backends.clone();
        backends.sort();
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("endpoint", self.endpoint.as_str())
            .with(
                "fs",
                self.fs.clone().unwrap_or_else(|| DEFAULT_NFS_FS.to_string()),
            )
            .with_strings("backends", backends)
            .with("port", self.port.unwrap_or(DEFAULT_NFS_PORT))
            .build()
    }
}

impl ApiObject for Template {
    const PATH: &'static str = "template";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(Template {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            os: Some(attrs.string_or("os", DEFAULT_TEMPLATE_OS)),
            source: attrs.required_string("source")?,
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with(
                "os",
                self.os
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TEMPLATE_OS.to_string()),
            )
            .with("source", self.source.as_str())
            .build()
    }
}

impl ApiObject for VNet {
    const PATH: &'static str = "vnet";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(VNet {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            vlan: Some(attrs.int_or("vlan", 0)),
            interface: attrs.required_string("interface")?,
            private: Some(attrs.bool_or("private", true)),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("vlan", self.vlan.unwrap_or(0))
            .with("interface", self.interface.as_str())
            .with("private", self.private.unwrap_or(true))
            .build()
    }
}

/// Parse `"first-last"` address ranges
fn ip_ranges(attrs: &AttrReader<'_>, key: &str) -> ProviderResult<Vec<IpRange>> {
    attrs
        .string_list(key)
        .iter()
        .enumerate()
        .map(|(i, entry)| match entry.split_once('-') {
            Some((first, last)) => Ok(IpRange {
                first: first.trim().to_string(),
                last: last.trim().to_string(),
            }),
            None => Err(ProviderError::validation(
                format!("{}[{}]", key, i),
                format!("Invalid address range '{}', expected first-last", entry),
            )),
        })
        .collect()
}

fn format_ranges(ranges: &[IpRange]) -> Vec<String> {
    ranges
        .iter()
        .map(|r| format!("{}-{}", r.first, r.last))
        .collect()
}

impl ApiObject for Subnet {
    const PATH: &'static str = "subnet";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(Subnet {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            cidr: attrs.required_string("cidr")?,
            gateway: attrs.required_string("gateway")?,
            dns: attrs.string("dns"),
            reserved: ip_ranges(attrs, "reserved")?,
            gw_pool: ip_ranges(attrs, "gw_pool")?,
            extra_routes: attrs.string_list("routes"),
            application: Some(attrs.string_or("application", DEFAULT_APPLICATION)),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("cidr", self.cidr.as_str())
            .with("gateway", self.gateway.as_str())
            .with("dns", self.dns.clone().unwrap_or_default())
            .with_strings("reserved", format_ranges(&self.reserved))
            .with_strings("gw_pool", format_ranges(&self.gw_pool))
            .with_strings("routes", self.extra_routes.iter().cloned())
            .with(
                "application",
                self.application
                    .clone()
                    .unwrap_or_else(|| DEFAULT_APPLICATION.to_string()),
            )
            .build()
    }
}

fn wants_default(resource: &Resource) -> bool {
    AttrReader::new(&resource.attributes).bool_or("default", false)
}

impl KowabungaProvider {
    // ========== Region Operations ==========

    /// Create a region
    pub(crate) async fn create_region(&self, resource: &Resource) -> ProviderResult<State> {
        let created = self.create_object::<Region>(resource, "region", &[]).await?;
        Ok(created_state(resource, created))
    }

    // ========== Zone Operations ==========

    /// Create a zone within its region
    pub(crate) async fn create_zone(&self, resource: &Resource) -> ProviderResult<State> {
        let region = self.parent_id(resource, "region", EntityKind::Region).await?;
        let created = self
            .create_object::<Zone>(resource, &format!("region/{}/zone", segment(&region)), &[])
            .await?;
        Ok(created_state(resource, created))
    }

    // ========== Agent Operations ==========

    /// Create an agent and issue its non-expiring API token
    pub(crate) async fn create_agent(&self, resource: &Resource) -> ProviderResult<State> {
        let (id, agent) = self.create_object::<Agent>(resource, "agent", &[]).await?;
        self.object_action(
            &resource.id,
            &format!("agent/{}/token", segment(&id)),
            &[("expire", "false".to_string())],
        )
        .await?;
        Ok(created_state(resource, (id, agent)))
    }

    // ========== Kiwi Operations ==========

    pub(crate) async fn create_kiwi(&self, resource: &Resource) -> ProviderResult<State> {
        let region = self.parent_id(resource, "region", EntityKind::Region).await?;
        let created = self
            .create_object::<Kiwi>(resource, &format!("region/{}/kiwi", segment(&region)), &[])
            .await?;
        Ok(created_state(resource, created))
    }

    // ========== Kaktus Operations ==========

    pub(crate) async fn create_kaktus(&self, resource: &Resource) -> ProviderResult<State> {
        let zone = self.parent_id(resource, "zone", EntityKind::Zone).await?;
        let created = self
            .create_object::<Kaktus>(resource, &format!("zone/{}/kaktus", segment(&zone)), &[])
            .await?;
        Ok(created_state(resource, created))
    }

    // ========== Storage Pool Operations ==========

    /// Create a storage pool, optionally making it the region default
    pub(crate) async fn create_storage_pool(&self, resource: &Resource) -> ProviderResult<State> {
        let region = self.parent_id(resource, "region", EntityKind::Region).await?;
        let (id, pool) = self
            .create_object::<StoragePool>(
                resource,
                &format!("region/{}/pool", segment(&region)),
                &[],
            )
            .await?;
        if wants_default(resource) {
            self.object_action(
                &resource.id,
                &format!("region/{}/pool/{}/default", segment(&region), segment(&id)),
                &[],
            )
            .await?;
        }
        Ok(created_state(resource, (id, pool)))
    }

    // ========== NFS Storage Operations ==========

    /// Create an NFS storage, optionally making it the region default
    pub(crate) async fn create_storage_nfs(&self, resource: &Resource) -> ProviderResult<State> {
        let region = self.parent_id(resource, "region", EntityKind::Region).await?;
        let mut query = Vec::new();
        if let Some(pool) = self
            .optional_parent_id(resource, "pool", EntityKind::StoragePool)
            .await
        {
            query.push(("poolId", pool));
        }
        let (id, nfs) = self
            .create_object::<StorageNfs>(
                resource,
                &format!("region/{}/nfs", segment(&region)),
                &query,
            )
            .await?;
        if wants_default(resource) {
            self.object_action(
                &resource.id,
                &format!("region/{}/nfs/{}/default", segment(&region), segment(&id)),
                &[],
            )
            .await?;
        }
        Ok(created_state(resource, (id, nfs)))
    }

    // ========== Template Operations ==========

    /// Create a template in its pool, optionally making it the pool default
    pub(crate) async fn create_template(&self, resource: &Resource) -> ProviderResult<State> {
        let pool = self
            .parent_id(resource, "pool", EntityKind::StoragePool)
            .await?;
        let (id, template) = self
            .create_object::<Template>(resource, &format!("pool/{}/template", segment(&pool)), &[])
            .await?;
        if wants_default(resource) {
            self.object_action(
                &resource.id,
                &format!("pool/{}/template/{}/default", segment(&pool), segment(&id)),
                &[],
            )
            .await?;
        }
        Ok(created_state(resource, (id, template)))
    }

    // ========== Virtual Network Operations ==========

    pub(crate) async fn create_vnet(&self, resource: &Resource) -> ProviderResult<State> {
        let region = self.parent_id(resource, "region", EntityKind::Region).await?;
        let created = self
            .create_object::<VNet>(resource, &format!("region/{}/vnet", segment(&region)), &[])
            .await?;
        Ok(created_state(resource, created))
    }

    // ========== Subnet Operations ==========

    /// Create a subnet, optionally making it the network default
    pub(crate) async fn create_subnet(&self, resource: &Resource) -> ProviderResult<State> {
        let vnet = self.parent_id(resource, "vnet", EntityKind::VNet).await?;
        let (id, subnet) = self
            .create_object::<Subnet>(resource, &format!("vnet/{}/subnet", segment(&vnet)), &[])
            .await?;
        if wants_default(resource) {
            self.object_action(
                &resource.id,
                &format!("vnet/{}/subnet/{}/default", segment(&vnet), segment(&id)),
                &[],
            )
            .await?;
        }
        Ok(created_state(resource, (id, subnet)))
    }
}
