//! Infrastructure schemas: regions, zones, agents, hypervisors, storage and networks

use kowabunga_core::resource::Value;
use kowabunga_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as kw;
use crate::validation;

fn price(key: &str, description: &str) -> AttributeSchema {
    AttributeSchema::new(key, AttributeType::Float)
        .with_default(Value::Float(0.0))
        .with_description(description)
}

pub fn region_schema() -> ResourceSchema {
    kw::named("region", "Region").attribute(
        AttributeSchema::new("domain", AttributeType::String)
            .required()
            .with_description("Internal DNS domain of the region"),
    )
}

pub fn zone_schema() -> ResourceSchema {
    kw::named("zone", "Zone").attribute(kw::parent("region", "Associated region ID or name"))
}

pub fn agent_schema() -> ResourceSchema {
    kw::named("agent", "Agent").attribute(
        AttributeSchema::new("type", validation::agent_type())
            .required()
            .with_description("Agent type (Kaktus or Kiwi)"),
    )
}

pub fn kiwi_schema() -> ResourceSchema {
    kw::named("kiwi", "Kiwi network gateway")
        .attribute(kw::parent("region", "Associated region ID or name"))
        .attribute(kw::strings("agents", "IDs of the agents managing this instance"))
}

pub fn kaktus_schema() -> ResourceSchema {
    kw::named("kaktus", "Kaktus hypervisor")
        .attribute(kw::parent("zone", "Associated zone ID or name"))
        .attribute(price("cpu_price", "Monthly price of a vCPU"))
        .attribute(price("memory_price", "Monthly price of a GB of memory"))
        .attribute(kw::string_or("currency", "EUR", "Currency of the prices"))
        .attribute(kw::int_or("cpu_overcommit", 3, "vCPU overcommit ratio"))
        .attribute(kw::int_or("memory_overcommit", 2, "Memory overcommit ratio"))
        .attribute(kw::strings("agents", "IDs of the agents managing this node"))
}

pub fn storage_pool_schema() -> ResourceSchema {
    kw::named("storage_pool", "Storage pool")
        .attribute(kw::parent("region", "Associated region ID or name"))
        .attribute(
            AttributeSchema::new("pool", AttributeType::String)
                .required()
                .with_description("Ceph RBD pool name"),
        )
        .attribute(kw::string("address", "Ceph monitor address"))
        .attribute(
            AttributeSchema::new("port", validation::port())
                .with_default(Value::Int(0))
                .with_description("Ceph monitor port"),
        )
        .attribute(
            kw::string_or("secret", "", "Ceph libvirt secret UUID")
                .sensitive(),
        )
        .attribute(price("price", "Monthly price of the pool"))
        .attribute(kw::string_or("currency", "EUR", "Currency of the price"))
        .attribute(kw::flag("default", false, "Make this pool the region default"))
        .attribute(kw::strings("agents", "IDs of the agents managing this pool"))
}

pub fn storage_nfs_schema() -> ResourceSchema {
    kw::named("storage_nfs", "NFS storage")
        .attribute(kw::parent("region", "Associated region ID or name"))
        .attribute(kw::optional_parent("pool", "Associated storage pool ID or name"))
        .attribute(
            AttributeSchema::new("endpoint", AttributeType::String)
                .required()
                .with_description("NFS server endpoint"),
        )
        .attribute(kw::string_or("fs", "nfs", "Underlying filesystem name"))
        .attribute(kw::strings("backends", "Ganesha backend hosts"))
        .attribute(
            AttributeSchema::new("port", validation::port())
                .with_default(Value::Int(54934))
                .with_description("Ganesha API port"),
        )
        .attribute(kw::flag("default", false, "Make this storage the region default"))
}

pub fn template_schema() -> ResourceSchema {
    kw::named("template", "Volume template")
        .attribute(kw::parent("pool", "Associated storage pool ID or name"))
        .attribute(kw::string_or("os", "linux", "Operating system family"))
        .attribute(
            AttributeSchema::new("source", AttributeType::String)
                .required()
                .with_description("URL of the image to upload"),
        )
        .attribute(kw::flag("default", false, "Make this template the pool default"))
}

pub fn vnet_schema() -> ResourceSchema {
    kw::named("vnet", "Virtual network")
        .attribute(kw::parent("region", "Associated region ID or name"))
        .attribute(kw::int_or("vlan", 0, "VLAN ID (0 for none)"))
        .attribute(
            AttributeSchema::new("interface", AttributeType::String)
                .required()
                .with_description("Host bridge interface"),
        )
        .attribute(kw::bool_or("private", true, "Whether the network is private"))
}

pub fn subnet_schema() -> ResourceSchema {
    kw::named("subnet", "Subnet")
        .attribute(kw::parent("vnet", "Associated virtual network ID or name"))
        .attribute(
            AttributeSchema::new("cidr", types::cidr())
                .required()
                .with_description("Network CIDR"),
        )
        .attribute(
            AttributeSchema::new("gateway", validation::network_address())
                .required()
                .with_description("Default gateway address"),
        )
        .attribute(kw::string("dns", "DNS server address"))
        .attribute(kw::strings(
            "reserved",
            "Reserved address ranges, as \"first-last\"",
        ))
        .attribute(kw::strings(
            "gw_pool",
            "Gateway address ranges, as \"first-last\"",
        ))
        .attribute(kw::strings("routes", "Extra routes to push, in CIDR notation"))
        .attribute(kw::string_or("application", "user", "Application profile"))
        .attribute(kw::flag("default", false, "Make this subnet the network default"))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        region_schema(),
        zone_schema(),
        agent_schema(),
        kiwi_schema(),
        kaktus_schema(),
        storage_pool_schema(),
        storage_nfs_schema(),
        template_schema(),
        vnet_schema(),
        subnet_schema(),
    ]
}
