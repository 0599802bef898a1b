//! Compute schemas: volumes, adapters, instances, komputes and DNS records

use kowabunga_core::resource::Value;
use kowabunga_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as kw;

fn count(key: &str, description: &str) -> AttributeSchema {
    AttributeSchema::new(key, types::positive_int())
        .required()
        .with_description(description)
}

pub fn volume_schema() -> ResourceSchema {
    kw::named("volume", "Storage volume")
        .attribute(kw::parent("project", "Associated project ID or name"))
        .attribute(kw::parent("region", "Associated region ID or name"))
        .attribute(kw::optional_parent(
            "pool",
            "Storage pool ID or name (region default if unset)",
        ))
        .attribute(kw::optional_parent(
            "template",
            "Template ID or name (pool default if unset)",
        ))
        .attribute(
            AttributeSchema::new("type", AttributeType::String)
                .required()
                .with_description("Volume type (os, iso or raw)"),
        )
        .attribute(kw::gigabytes("size", "Volume size in GB").required())
}

pub fn adapter_schema() -> ResourceSchema {
    kw::named("adapter", "Network adapter")
        .attribute(kw::parent("subnet", "Associated subnet ID or name"))
        .attribute(kw::string("hwaddress", "MAC address (generated if unset)"))
        .attribute(kw::strings("addresses", "IPv4 addresses of the adapter"))
        .attribute(kw::flag(
            "assign",
            true,
            "Have the platform assign an address when none is given",
        ))
        .attribute(kw::bool_or("reserved", false, "Whether the adapter is reserved"))
        .attribute(kw::computed("cidr", AttributeType::String, "Subnet CIDR"))
        .attribute(kw::computed("netmask", AttributeType::String, "Subnet netmask"))
        .attribute(kw::computed(
            "netmask_bitsize",
            AttributeType::Int,
            "Subnet netmask length",
        ))
        .attribute(kw::computed("gateway", AttributeType::String, "Subnet gateway"))
}

pub fn instance_schema() -> ResourceSchema {
    kw::named("instance", "Virtual machine instance")
        .attribute(kw::parent("project", "Associated project ID or name"))
        .attribute(kw::parent("zone", "Associated zone ID or name"))
        .attribute(count("vcpus", "Number of vCPUs"))
        .attribute(count("mem", "Memory size in GB"))
        .attribute(kw::strings("adapters", "IDs of the network adapters"))
        .attribute(kw::strings("volumes", "IDs of the storage volumes"))
}

pub fn kompute_schema() -> ResourceSchema {
    kw::named("kompute", "Kompute virtual machine")
        .attribute(kw::parent("project", "Associated project ID or name"))
        .attribute(kw::parent("zone", "Associated zone ID or name"))
        .attribute(kw::optional_parent(
            "pool",
            "Storage pool ID or name (region default if unset)",
        ))
        .attribute(kw::optional_parent(
            "template",
            "Template ID or name (pool default if unset)",
        ))
        .attribute(count("vcpus", "Number of vCPUs"))
        .attribute(count("mem", "Memory size in GB"))
        .attribute(count("disk", "OS disk size in GB"))
        .attribute(
            AttributeSchema::new("extra_disk", AttributeType::Int)
                .with_default(Value::Int(0))
                .with_description("Data disk size in GB (0 for none)"),
        )
        .attribute(kw::flag("public", false, "Expose the instance on a public address"))
        .attribute(kw::computed("ip", AttributeType::String, "Private IPv4 address"))
}

pub fn dns_record_schema() -> ResourceSchema {
    kw::named("dns_record", "DNS record")
        .attribute(kw::parent("project", "Associated project ID or name"))
        .attribute(kw::strings("addresses", "IPv4 addresses the record resolves to"))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        volume_schema(),
        adapter_schema(),
        instance_schema(),
        kompute_schema(),
        dns_record_schema(),
    ]
}
