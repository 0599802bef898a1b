//! Data source schemas

use kowabunga_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as kw;

/// `name` in, `id` out
fn filtered(data_source: &str, label: &str) -> ResourceSchema {
    ResourceSchema::new(data_source)
        .with_description(format!("Data from a {} resource", label))
        .attribute(kw::id())
        .attribute(kw::name(&format!("{} name", label)))
        .attribute(kw::timeouts())
}

/// Computed map of every object name to its ID
fn full(data_source: &str) -> ResourceSchema {
    ResourceSchema::new(data_source)
        .with_description(format!("Data from {}", data_source))
        .attribute(kw::computed(
            data_source,
            types::string_map(),
            &format!("List of Kowabunga {}", data_source),
        ))
        .attribute(kw::timeouts())
}

pub fn subnet_schema() -> ResourceSchema {
    ResourceSchema::new("subnet")
        .with_description("Data from a subnet resource, by name or application")
        .attribute(kw::id())
        .attribute(kw::string("name", "Subnet name"))
        .attribute(kw::string("app", "Subnet application"))
        .attribute(kw::timeouts())
}

pub fn zones_schema() -> ResourceSchema {
    full("zones").attribute(
        AttributeSchema::new("region", AttributeType::String)
            .required()
            .with_description("Region ID or name"),
    )
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        filtered("region", "region"),
        filtered("team", "team"),
        filtered("zone", "zone"),
        subnet_schema(),
        full("regions"),
        full("teams"),
        full("subnets"),
        zones_schema(),
    ]
}
