//! Network services: kawaii gateways, IPsec tunnels, konvey load balancers and kylo shares

use std::collections::HashMap;

use kowabunga_core::provider::{ProviderError, ProviderResult};
use kowabunga_core::resource::{Resource, ResourceId, State, Value};

use super::{ApiObject, created_state, description};
use crate::client::segment;
use crate::convert::{AttrMap, AttrReader};
use crate::models::{
    Kawaii, KawaiiDNatRule, KawaiiFirewall, KawaiiFirewallEgressRule, KawaiiFirewallIngressRule,
    KawaiiIpSec, KawaiiIpSecFirewall, KawaiiVpcForwardRule, KawaiiVpcPeering, Konvey,
    KonveyBackends, KonveyEndpoint, Kylo,
};
use crate::provider::{KowabungaProvider, existing_state};
use crate::resolver::EntityKind;

const ANY_ADDRESS: &str = "0.0.0.0/0";
const DEFAULT_PROTOCOL: &str = "tcp";
const DEFAULT_EGRESS_POLICY: &str = "accept";
const DEFAULT_PEERING_POLICY: &str = "drop";
const DEFAULT_DPD_TIMEOUT: &str = "240s";
const DEFAULT_DPD_ACTION: &str = "restart";
const DEFAULT_START_ACTION: &str = "start";
const DEFAULT_REKEY: &str = "2h";
const DEFAULT_PHASE_LIFETIME: &str = "1h";
const DEFAULT_KYLO_ACCESS: &str = "RW";
const DEFAULT_NFS_PROTOCOLS: [i64; 2] = [3, 4];

fn protocol_of(block: &AttrReader<'_>) -> Option<String> {
    Some(block.string_or("protocol", DEFAULT_PROTOCOL))
}

fn or_default(value: &Option<String>, default: &str) -> String {
    value.clone().unwrap_or_else(|| default.to_string())
}

// =============================================================================
// Firewall rules
// =============================================================================

fn ingress_rules(attrs: &AttrReader<'_>) -> ProviderResult<Vec<KawaiiFirewallIngressRule>> {
    attrs
        .blocks("ingress_rules")
        .iter()
        .map(|rule| {
            Ok(KawaiiFirewallIngressRule {
                source: Some(rule.string_or("source", ANY_ADDRESS)),
                protocol: protocol_of(rule),
                ports: rule.required_string("ports")?,
            })
        })
        .collect()
}

fn egress_rules(attrs: &AttrReader<'_>) -> ProviderResult<Vec<KawaiiFirewallEgressRule>> {
    attrs
        .blocks("egress_rules")
        .iter()
        .map(|rule| {
            Ok(KawaiiFirewallEgressRule {
                destination: Some(rule.string_or("destination", ANY_ADDRESS)),
                protocol: protocol_of(rule),
                ports: rule.required_string("ports")?,
            })
        })
        .collect()
}

fn forward_rules(attrs: &AttrReader<'_>, key: &str) -> ProviderResult<Vec<KawaiiVpcForwardRule>> {
    attrs
        .blocks(key)
        .iter()
        .map(|rule| {
            Ok(KawaiiVpcForwardRule {
                protocol: protocol_of(rule),
                ports: rule.required_string("ports")?,
            })
        })
        .collect()
}

fn ingress_blocks(rules: &[KawaiiFirewallIngressRule]) -> Vec<HashMap<String, Value>> {
    rules
        .iter()
        .map(|rule| {
            AttrMap::new()
                .with("source", or_default(&rule.source, ANY_ADDRESS))
                .with("protocol", or_default(&rule.protocol, DEFAULT_PROTOCOL))
                .with("ports", rule.ports.as_str())
                .build()
        })
        .collect()
}

fn egress_blocks(rules: &[KawaiiFirewallEgressRule]) -> Vec<HashMap<String, Value>> {
    rules
        .iter()
        .map(|rule| {
            AttrMap::new()
                .with("destination", or_default(&rule.destination, ANY_ADDRESS))
                .with("protocol", or_default(&rule.protocol, DEFAULT_PROTOCOL))
                .with("ports", rule.ports.as_str())
                .build()
        })
        .collect()
}

fn forward_blocks(rules: &[KawaiiVpcForwardRule]) -> Vec<HashMap<String, Value>> {
    rules
        .iter()
        .map(|rule| {
            AttrMap::new()
                .with("protocol", or_default(&rule.protocol, DEFAULT_PROTOCOL))
                .with("ports", rule.ports.as_str())
                .build()
        })
        .collect()
}

/// Add a list of blocks, leaving out empty lists
fn with_non_empty(attrs: AttrMap, key: &str, blocks: Vec<HashMap<String, Value>>) -> AttrMap {
    if blocks.is_empty() {
        attrs
    } else {
        attrs.with_blocks(key, blocks)
    }
}

// =============================================================================
// Kawaii
// =============================================================================

impl ApiObject for Kawaii {
    const PATH: &'static str = "kawaii";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        let dnat = attrs
            .blocks("nat_rules")
            .iter()
            .map(|rule| {
                Ok(KawaiiDNatRule {
                    destination: rule.required_string("destination")?,
                    protocol: protocol_of(rule),
                    ports: rule.required_string("ports")?,
                })
            })
            .collect::<ProviderResult<Vec<_>>>()?;

        let vpc_peerings = attrs
            .blocks("vpc_peerings")
            .iter()
            .map(|peering| {
                Ok(KawaiiVpcPeering {
                    subnet: peering.required_string("subnet")?,
                    policy: Some(peering.string_or("policy", DEFAULT_PEERING_POLICY)),
                    ingress: forward_rules(peering, "ingress_rules")?,
                    egress: forward_rules(peering, "egress_rules")?,
                    netip: Default::default(),
                })
            })
            .collect::<ProviderResult<Vec<_>>>()?;

        Ok(Kawaii {
            id: None,
            name: None,
            description: description(attrs),
            netip: Default::default(),
            firewall: KawaiiFirewall {
                ingress: ingress_rules(attrs)?,
                egress_policy: Some(attrs.string_or("egress_policy", DEFAULT_EGRESS_POLICY)),
                egress: egress_rules(attrs)?,
            },
            dnat,
            vpc_peerings,
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        let zones = self
            .netip
            .zones
            .iter()
            .map(|zone| {
                Value::Map(
                    AttrMap::new()
                        .with("zone", zone.zone.as_str())
                        .with("public_ip", zone.public.as_str())
                        .with("private_ip", zone.private.as_str())
                        .build(),
                )
            })
            .collect();
        let netcfg = AttrMap::new()
            .with_strings("public_ips", self.netip.public.iter().cloned())
            .with_strings("private_ips", self.netip.private.iter().cloned())
            .with("zones", Value::List(zones))
            .build();

        let nat_rules = self
            .dnat
            .iter()
            .map(|rule| {
                AttrMap::new()
                    .with("destination", rule.destination.as_str())
                    .with("protocol", or_default(&rule.protocol, DEFAULT_PROTOCOL))
                    .with("ports", rule.ports.as_str())
                    .build()
            })
            .collect();

        let peerings = self
            .vpc_peerings
            .iter()
            .map(|peering| {
                let netcfg = peering
                    .netip
                    .zones
                    .iter()
                    .map(|zone| {
                        AttrMap::new()
                            .with("zone", zone.zone.as_str())
                            .with("private_ip", zone.private.as_str())
                            .build()
                    })
                    .collect();
                let block = AttrMap::new()
                    .with("subnet", peering.subnet.as_str())
                    .with("policy", or_default(&peering.policy, DEFAULT_PEERING_POLICY))
                    .with_blocks("netcfg", netcfg);
                let ingress = forward_blocks(&peering.ingress);
                let block = with_non_empty(block, "ingress_rules", ingress);
                with_non_empty(block, "egress_rules", forward_blocks(&peering.egress)).build()
            })
            .collect();

        let attrs = AttrMap::new()
            .with("desc", self.description.clone().unwrap_or_default())
            .with("netcfg", Value::Map(netcfg))
            .with(
                "egress_policy",
                or_default(&self.firewall.egress_policy, DEFAULT_EGRESS_POLICY),
            );
        let attrs = with_non_empty(attrs, "ingress_rules", ingress_blocks(&self.firewall.ingress));
        let attrs = with_non_empty(attrs, "egress_rules", egress_blocks(&self.firewall.egress));
        let attrs = with_non_empty(attrs, "nat_rules", nat_rules);
        with_non_empty(attrs, "vpc_peerings", peerings).build()
    }
}

// =============================================================================
// Kawaii IPsec
// =============================================================================

/// Split a `<kawaii ID>/<connection ID>` identifier
fn ipsec_path(id: &ResourceId, identifier: &str) -> ProviderResult<(String, String)> {
    match identifier.split_once('/') {
        Some((kawaii, ipsec))
            if !kawaii.is_empty() && !ipsec.is_empty() && !ipsec.contains('/') =>
        {
            Ok((
                kawaii.to_string(),
                format!("kawaii/{}/ipsec/{}", segment(&kawaii), segment(&ipsec)),
            ))
        }
        _ => Err(ProviderError::new(format!(
            "invalid IPsec connection identifier '{}', expected <kawaii ID>/<connection ID>",
            identifier
        ))
        .for_resource(id.clone())),
    }
}

fn phase_lifetime(attrs: &AttrReader<'_>, phase: u8) -> Option<String> {
    Some(attrs.string_or(&format!("phase{}_lifetime", phase), DEFAULT_PHASE_LIFETIME))
}

/// Connections live under their kawaii; `PATH` only names the collection
impl ApiObject for KawaiiIpSec {
    const PATH: &'static str = "ipsec";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(KawaiiIpSec {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            ip: None,
            remote_ip: attrs.required_string("remote_peer")?,
            remote_subnet: attrs.required_string("remote_subnet")?,
            pre_shared_key: attrs.required_string("pre_shared_key")?,
            dpd_timeout_action: Some(attrs.string_or("dpd_action", DEFAULT_DPD_ACTION)),
            dpd_timeout: Some(attrs.string_or("dpd_timeout", DEFAULT_DPD_TIMEOUT)),
            start_action: Some(attrs.string_or("start_action", DEFAULT_START_ACTION)),
            rekey_time: Some(attrs.string_or("rekey", DEFAULT_REKEY)),
            phase1_lifetime: phase_lifetime(attrs, 1),
            phase1_dh_group_number: attrs.required_int("phase1_dh_group_number")?,
            phase1_integrity_algorithm: attrs.required_string("phase1_integrity_algorithm")?,
            phase1_encryption_algorithm: attrs.required_string("phase1_encryption_algorithm")?,
            phase2_lifetime: phase_lifetime(attrs, 2),
            phase2_dh_group_number: attrs.required_int("phase2_dh_group_number")?,
            phase2_integrity_algorithm: attrs.required_string("phase2_integrity_algorithm")?,
            phase2_encryption_algorithm: attrs.required_string("phase2_encryption_algorithm")?,
            firewall: KawaiiIpSecFirewall {
                ingress: ingress_rules(attrs)?,
            },
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        let attrs = AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("ip", self.ip.clone().unwrap_or_default())
            .with("remote_peer", self.remote_ip.as_str())
            .with("remote_subnet", self.remote_subnet.as_str())
            .with("pre_shared_key", self.pre_shared_key.as_str())
            .with("dpd_action", or_default(&self.dpd_timeout_action, DEFAULT_DPD_ACTION))
            .with("dpd_timeout", or_default(&self.dpd_timeout, DEFAULT_DPD_TIMEOUT))
            .with("start_action", or_default(&self.start_action, DEFAULT_START_ACTION))
            .with("rekey", or_default(&self.rekey_time, DEFAULT_REKEY))
            .with("phase1_lifetime", or_default(&self.phase1_lifetime, DEFAULT_PHASE_LIFETIME))
            .with("phase1_dh_group_number", self.phase1_dh_group_number)
            .with("phase1_integrity_algorithm", self.phase1_integrity_algorithm.as_str())
            .with("phase1_encryption_algorithm", self.phase1_encryption_algorithm.as_str())
            .with("phase2_lifetime", or_default(&self.phase2_lifetime, DEFAULT_PHASE_LIFETIME))
            .with("phase2_dh_group_number", self.phase2_dh_group_number)
            .with("phase2_integrity_algorithm", self.phase2_integrity_algorithm.as_str())
            .with("phase2_encryption_algorithm", self.phase2_encryption_algorithm.as_str());
        with_non_empty(attrs, "ingress_rules", ingress_blocks(&self.firewall.ingress)).build()
    }
}

// =============================================================================
// Konvey
// =============================================================================

impl ApiObject for Konvey {
    const PATH: &'static str = "konvey";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        let endpoints = attrs
            .blocks("endpoints")
            .iter()
            .map(|endpoint| {
                Ok(KonveyEndpoint {
                    name: endpoint.required_string("name")?,
                    port: endpoint.required_int("port")?,
                    protocol: endpoint.string_or("protocol", DEFAULT_PROTOCOL),
                    backends: KonveyBackends {
                        hosts: endpoint.string_list("backend_ips"),
                        port: endpoint.required_int("backend_port")?,
                    },
                })
            })
            .collect::<ProviderResult<Vec<_>>>()?;

        Ok(Konvey {
            id: None,
            name: Some(attrs.required_string("name")?),
            description: description(attrs),
            vip: None,
            failover: Some(attrs.bool_or("failover", true)),
            endpoints,
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        let endpoints = self
            .endpoints
            .iter()
            .map(|endpoint| {
                AttrMap::new()
                    .with("name", endpoint.name.as_str())
                    .with("protocol", endpoint.protocol.as_str())
                    .with("port", endpoint.port)
                    .with("backend_port", endpoint.backends.port)
                    .with_strings("backend_ips", endpoint.backends.hosts.iter().cloned())
                    .build()
            })
            .collect();
        AttrMap::new()
            .with("name", self.name.clone().unwrap_or_default())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("private_ip", self.vip.clone().unwrap_or_default())
            .with("failover", self.failover.unwrap_or(true))
            .with_blocks("endpoints", endpoints)
            .build()
    }
}

// =============================================================================
// Kylo
// =============================================================================

impl ApiObject for Kylo {
    const PATH: &'static str = "kylo";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        let mut protocols = attrs.int_list("protocols");
        if protocols.is_empty() {
            protocols = DEFAULT_NFS_PROTOCOLS.to_vec();
        }
        Ok(Kylo {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            access: Some(attrs.string_or("access_type", DEFAULT_KYLO_ACCESS)),
            protocols,
            endpoint: None,
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        let protocols = if self.protocols.is_empty() {
            DEFAULT_NFS_PROTOCOLS.to_vec()
        } else {
            self.protocols.clone()
        };
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("access_type", or_default(&self.access, DEFAULT_KYLO_ACCESS))
            .with_ints("protocols", protocols)
            .with("endpoint", self.endpoint.clone().unwrap_or_default())
            .build()
    }
}

impl KowabungaProvider {
    /// Project and region IDs of a project-scoped regional service
    async fn project_region(&self, resource: &Resource) -> ProviderResult<String> {
        let project = self
            .parent_id(resource, "project", EntityKind::Project)
            .await?;
        let region = self.parent_id(resource, "region", EntityKind::Region).await?;
        Ok(format!("project/{}/region/{}", segment(&project), segment(&region)))
    }

    // ========== Kawaii Operations ==========

    pub(crate) async fn create_kawaii(&self, resource: &Resource) -> ProviderResult<State> {
        let parent = self.project_region(resource).await?;
        let created = self
            .create_object::<Kawaii>(resource, &format!("{}/kawaii", parent), &[])
            .await?;
        Ok(created_state(resource, created))
    }

    // ========== Kawaii IPsec Operations ==========

    pub(crate) async fn create_kawaii_ipsec(&self, resource: &Resource) -> ProviderResult<State> {
        let kawaii = self
            .parent_id(resource, "kawaii", EntityKind::Kawaii)
            .await?;
        let (ipsec, object) = self
            .create_object::<KawaiiIpSec>(
                resource,
                &format!("kawaii/{}/ipsec", segment(&kawaii)),
                &[],
            )
            .await?;
        Ok(created_state(resource, (format!("{}/{}", kawaii, ipsec), object)))
    }

    /// Read a connection. The kawaii is reported the way the resource
    /// declares it when that reference still designates the same kawaii.
    pub(crate) async fn read_kawaii_ipsec(
        &self,
        resource: &Resource,
        identifier: &str,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let (kawaii, path) = ipsec_path(id, identifier)?;
        let Some(object) = self.get_object::<KawaiiIpSec>(id, &path).await? else {
            return Ok(State::not_found(id.clone()));
        };
        let mut reported = kawaii.clone();
        if let Some(reference) = AttrReader::new(&resource.attributes).non_empty_string("kawaii")
            && reference != kawaii
            && self
                .resolver()
                .resolve(EntityKind::Kawaii, &reference)
                .await
                .is_ok_and(|resolved| resolved == kawaii)
        {
            reported = reference;
        }
        let mut attrs = object.to_attributes();
        attrs.insert("kawaii".to_string(), Value::String(reported));
        Ok(existing_state(id, identifier, attrs))
    }

    pub(crate) async fn update_kawaii_ipsec(
        &self,
        identifier: &str,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let (_, path) = ipsec_path(&resource.id, identifier)?;
        let object = KawaiiIpSec::from_attributes(&AttrReader::new(&resource.attributes))
            .map_err(|e| e.for_resource(resource.id.clone()))?;
        let updated = self.put_object(&resource.id, &path, &object).await?;
        Ok(existing_state(&resource.id, identifier, updated.to_attributes()))
    }

    pub(crate) async fn delete_kawaii_ipsec(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let (_, path) = ipsec_path(id, identifier)?;
        self.delete_object(id, &path).await
    }

    // ========== Konvey Operations ==========

    pub(crate) async fn create_konvey(&self, resource: &Resource) -> ProviderResult<State> {
        let parent = self.project_region(resource).await?;
        let created = self
            .create_object::<Konvey>(resource, &format!("{}/konvey", parent), &[])
            .await?;
        Ok(created_state(resource, created))
    }

    // ========== Kylo Operations ==========

    /// Create a share, on the region's default NFS storage unless one is named
    pub(crate) async fn create_kylo(&self, resource: &Resource) -> ProviderResult<State> {
        let parent = self.project_region(resource).await?;
        let mut query = Vec::new();
        if let Some(nfs) = self
            .optional_parent_id(resource, "nfs", EntityKind::StorageNfs)
            .await
        {
            query.push(("nfsId", nfs));
        }
        let created = self
            .create_object::<Kylo>(resource, &format!("{}/kylo", parent), &query)
            .await?;
        Ok(created_state(resource, created))
    }
}
