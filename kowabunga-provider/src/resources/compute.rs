//! Compute resources: volume, adapter, instance, kompute and DNS record

use std::collections::HashMap;
use std::net::Ipv4Addr;

use kowabunga_core::provider::{ProviderError, ProviderResult};
use kowabunga_core::resource::{Resource, ResourceId, State, Value};

use super::{ApiObject, created_state, description};
use crate::client::segment;
use crate::convert::{AttrMap, AttrReader, bytes_to_gb, cidr_prefix, gb_to_bytes};
use crate::models::{Adapter, DnsRecord, Instance, Kompute, Subnet, Volume};
use crate::provider::{KowabungaProvider, remote_error};
use crate::resolver::EntityKind;

impl ApiObject for Volume {
    const PATH: &'static str = "volume";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(Volume {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            volume_type: attrs.required_string("type")?,
            size: gb_to_bytes(attrs.required_int("size")?),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("type", self.volume_type.as_str())
            .with("size", bytes_to_gb(self.size))
            .build()
    }
}

impl ApiObject for Adapter {
    const PATH: &'static str = "adapter";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(Adapter {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            mac: attrs.non_empty_string("hwaddress"),
            addresses: attrs.string_list("addresses"),
            reserved: Some(attrs.bool_or("reserved", false)),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("hwaddress", self.mac.clone().unwrap_or_default())
            .with_strings("addresses", self.addresses.iter().cloned())
            .with("reserved", self.reserved.unwrap_or(false))
            .build()
    }
}

impl ApiObject for Instance {
    const PATH: &'static str = "instance";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(Instance {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            vcpus: attrs.required_int("vcpus")?,
            memory: gb_to_bytes(attrs.required_int("mem")?),
            adapters: attrs.string_list("adapters"),
            volumes: attrs.sorted_string_list("volumes"),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        let mut volumes = self.volumes.clone();
        volumes.sort();
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("vcpus", self.vcpus)
            .with("mem", bytes_to_gb(self.memory))
            .with_strings("adapters", self.adapters.iter().cloned())
            .with_strings("volumes", volumes)
            .build()
    }
}

impl ApiObject for Kompute {
    const PATH: &'static str = "kompute";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(Kompute {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            vcpus: attrs.required_int("vcpus")?,
            memory: gb_to_bytes(attrs.required_int("mem")?),
            disk: gb_to_bytes(attrs.required_int("disk")?),
            data_disk: Some(gb_to_bytes(attrs.int_or("extra_disk", 0))),
            ip: None,
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("vcpus", self.vcpus)
            .with("mem", bytes_to_gb(self.memory))
            .with("disk", bytes_to_gb(self.disk))
            .with("extra_disk", bytes_to_gb(self.data_disk.unwrap_or(0)))
            .with("ip", self.ip.clone().unwrap_or_default())
            .build()
    }
}

impl ApiObject for DnsRecord {
    const PATH: &'static str = "record";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(DnsRecord {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            addresses: attrs.sorted_string_list("addresses"),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        let mut addresses = self.addresses.clone();
        addresses.sort();
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with_strings("addresses", addresses)
            .build()
    }
}

/// Dotted netmask of a prefix length
fn netmask(prefix: u8) -> Ipv4Addr {
    let bits = u32::MAX.checked_shl(32 - u32::from(prefix.min(32))).unwrap_or(0);
    Ipv4Addr::from(bits)
}

/// Network attributes an adapter inherits from its subnet
fn subnet_network(subnet: &Subnet) -> ProviderResult<HashMap<String, Value>> {
    let prefix = cidr_prefix(&subnet.cidr)
        .ok_or_else(|| ProviderError::new(format!("invalid subnet CIDR '{}'", subnet.cidr)))?;
    Ok(AttrMap::new()
        .with("cidr", subnet.cidr.as_str())
        .with("netmask", netmask(prefix).to_string())
        .with("netmask_bitsize", i64::from(prefix))
        .with("gateway", subnet.gateway.as_str())
        .build())
}

impl KowabungaProvider {
    /// Pool and template query parameters of volume-backed objects.
    /// References that cannot be resolved are left to the platform defaults.
    async fn storage_query(&self, resource: &Resource) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        let pool = self
            .optional_parent_id(resource, "pool", EntityKind::StoragePool)
            .await;
        let template = match AttrReader::new(&resource.attributes).non_empty_string("template") {
            Some(reference) => {
                let resolved = match &pool {
                    Some(pool) => self.resolver().resolve_template(pool, &reference).await,
                    None => self.resolver().resolve(EntityKind::Template, &reference).await,
                };
                match resolved {
                    Ok(id) => Some(id),
                    Err(e) => {
                        tracing::warn!("Ignoring template '{}': {}", reference, e);
                        None
                    }
                }
            }
            None => None,
        };
        if let Some(pool) = pool {
            query.push(("poolId", pool));
        }
        if let Some(template) = template {
            query.push(("templateId", template));
        }
        query
    }

    // ========== Volume Operations ==========

    pub(crate) async fn create_volume(&self, resource: &Resource) -> ProviderResult<State> {
        let project = self
            .parent_id(resource, "project", EntityKind::Project)
            .await?;
        let region = self.parent_id(resource, "region", EntityKind::Region).await?;
        let query = self.storage_query(resource).await;
        let created = self
            .create_object::<Volume>(
                resource,
                &format!("project/{}/region/{}/volume", segment(&project), segment(&region)),
                &query,
            )
            .await?;
        Ok(created_state(resource, created))
    }

    // ========== Adapter Operations ==========

    /// Fill the subnet-derived attributes of an adapter state
    async fn with_subnet_network(
        &self,
        id: &ResourceId,
        subnet_id: &str,
        mut state: State,
    ) -> ProviderResult<State> {
        let subnet: Subnet = self
            .get_object(id, &format!("subnet/{}", segment(subnet_id)))
            .await?
            .ok_or_else(|| {
                ProviderError::unknown(EntityKind::Subnet.label(), subnet_id)
                    .for_resource(id.clone())
            })?;
        let network = subnet_network(&subnet).map_err(|e| e.for_resource(id.clone()))?;
        state.attributes.extend(network);
        Ok(state)
    }

    /// Subnet holding adapter `identifier`: the declared one, else the
    /// first subnet listing it
    async fn adapter_subnet(
        &self,
        resource: &Resource,
        identifier: &str,
    ) -> ProviderResult<Option<String>> {
        if AttrReader::new(&resource.attributes)
            .non_empty_string("subnet")
            .is_some()
        {
            return self
                .parent_id(resource, "subnet", EntityKind::Subnet)
                .await
                .map(Some);
        }
        let client = self.client();
        let subnets = client
            .list_ids("subnet")
            .await
            .map_err(|e| remote_error(e, &resource.id))?;
        for subnet in subnets {
            let adapters = client
                .list_ids(&format!("subnet/{}/adapters", segment(&subnet)))
                .await
                .map_err(|e| remote_error(e, &resource.id))?;
            if adapters.iter().any(|adapter| adapter == identifier) {
                return Ok(Some(subnet));
            }
        }
        Ok(None)
    }

    /// Create an adapter, letting the platform pick an address when asked to
    pub(crate) async fn create_adapter(&self, resource: &Resource) -> ProviderResult<State> {
        let subnet = self.parent_id(resource, "subnet", EntityKind::Subnet).await?;
        let attrs = AttrReader::new(&resource.attributes);
        let mut query = Vec::new();
        if attrs.bool_or("assign", true) && attrs.string_list("addresses").is_empty() {
            query.push(("assignIP", "true".to_string()));
        }
        let created = self
            .create_object::<Adapter>(
                resource,
                &format!("subnet/{}/adapter", segment(&subnet)),
                &query,
            )
            .await?;
        let state = created_state(resource, created);
        self.with_subnet_network(&resource.id, &subnet, state).await
    }

    pub(crate) async fn read_adapter(
        &self,
        resource: &Resource,
        identifier: &str,
    ) -> ProviderResult<State> {
        let state = self.read_typed::<Adapter>(&resource.id, identifier).await?;
        if !state.exists {
            return Ok(state);
        }
        match self.adapter_subnet(resource, identifier).await? {
            Some(subnet) => self.with_subnet_network(&resource.id, &subnet, state).await,
            None => {
                tracing::warn!("No subnet holds adapter {}", identifier);
                Ok(state)
            }
        }
    }

    pub(crate) async fn update_adapter(
        &self,
        identifier: &str,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let subnet = self.parent_id(resource, "subnet", EntityKind::Subnet).await?;
        let state = self.update_typed::<Adapter>(identifier, resource).await?;
        self.with_subnet_network(&resource.id, &subnet, state).await
    }

    // ========== Instance Operations ==========

    pub(crate) async fn create_instance(&self, resource: &Resource) -> ProviderResult<State> {
        let project = self
            .parent_id(resource, "project", EntityKind::Project)
            .await?;
        let zone = self.parent_id(resource, "zone", EntityKind::Zone).await?;
        let created = self
            .create_object::<Instance>(
                resource,
                &format!("project/{}/zone/{}/instance", segment(&project), segment(&zone)),
                &[],
            )
            .await?;
        Ok(created_state(resource, created))
    }

    // ========== Kompute Operations ==========

    pub(crate) async fn create_kompute(&self, resource: &Resource) -> ProviderResult<State> {
        let project = self
            .parent_id(resource, "project", EntityKind::Project)
            .await?;
        let zone = self.parent_id(resource, "zone", EntityKind::Zone).await?;
        let public = AttrReader::new(&resource.attributes).bool_or("public", false);
        let mut query = vec![("public", public.to_string())];
        query.extend(self.storage_query(resource).await);
        let created = self
            .create_object::<Kompute>(
                resource,
                &format!("project/{}/zone/{}/kompute", segment(&project), segment(&zone)),
                &query,
            )
            .await?;
        Ok(created_state(resource, created))
    }

    // ========== DNS Record Operations ==========

    pub(crate) async fn create_dns_record(&self, resource: &Resource) -> ProviderResult<State> {
        let project = self
            .parent_id(resource, "project", EntityKind::Project)
            .await?;
        let created = self
            .create_object::<DnsRecord>(
                resource,
                &format!("project/{}/record", segment(&project)),
                &[],
            )
            .await?;
        Ok(created_state(resource, created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netmask_from_prefix() {
        assert_eq!(netmask(24), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(netmask(26), Ipv4Addr::new(255, 255, 255, 192));
        assert_eq!(netmask(0), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(netmask(32), Ipv4Addr::new(255, 255, 255, 255));
    }

    #[test]
    fn adapter_inherits_subnet_network() {
        let subnet = Subnet {
            name: "lan".to_string(),
            cidr: "10.50.0.0/26".to_string(),
            gateway: "10.50.0.1".to_string(),
            ..Default::default()
        };
        let attrs = subnet_network(&subnet).unwrap();
        assert_eq!(attrs["netmask"], Value::from("255.255.255.192"));
        assert_eq!(attrs["netmask_bitsize"], Value::Int(26));
        assert_eq!(attrs["gateway"], Value::from("10.50.0.1"));
    }

    #[test]
    fn sizes_are_gigabytes_on_the_wire_schema() {
        let attrs = HashMap::from([
            ("name".to_string(), Value::from("db")),
            ("vcpus".to_string(), Value::Int(2)),
            ("mem".to_string(), Value::Int(4)),
            ("disk".to_string(), Value::Int(20)),
        ]);
        let kompute = Kompute::from_attributes(&AttrReader::new(&attrs)).unwrap();
        assert_eq!(kompute.memory, 4_294_967_296);
        assert_eq!(kompute.data_disk, Some(0));

        let back = kompute.to_attributes();
        assert_eq!(back["mem"], Value::Int(4));
        assert_eq!(back["disk"], Value::Int(20));
        assert_eq!(back["extra_disk"], Value::Int(0));
    }

    #[test]
    fn instance_converter_is_idempotent() {
        let instance = Instance {
            name: "web".to_string(),
            description: Some(String::new()),
            vcpus: 2,
            memory: gb_to_bytes(8),
            adapters: vec!["a2".to_string(), "a1".to_string()],
            volumes: vec!["v1".to_string(), "v2".to_string()],
            ..Default::default()
        };
        let attrs = instance.to_attributes();
        assert_eq!(
            Instance::from_attributes(&AttrReader::new(&attrs)).unwrap(),
            instance
        );
    }
}
