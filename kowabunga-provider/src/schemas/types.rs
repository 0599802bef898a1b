//! Attribute definitions shared by every Kowabunga schema

use kowabunga_core::resource::Value;
use kowabunga_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::validation;

/// Platform-assigned object ID
pub fn id() -> AttributeSchema {
    AttributeSchema::new("id", AttributeType::String)
        .computed()
        .with_description("Resource object internal identifier")
}

pub fn name(description: &str) -> AttributeSchema {
    AttributeSchema::new("name", AttributeType::String)
        .required()
        .with_description(description)
}

pub fn desc(description: &str) -> AttributeSchema {
    AttributeSchema::new("desc", AttributeType::String)
        .with_default(Value::from(""))
        .with_description(description)
}

/// Per-operation deadlines (`create`, `read`, `update`, `delete`)
pub fn timeouts() -> AttributeSchema {
    AttributeSchema::new("timeouts", AttributeType::Map(Box::new(validation::timeout())))
        .write_only()
        .with_description("Operation deadlines, e.g. { create = \"45m\" }")
}

/// Reference to a parent object, by ID or name.
/// Kept locally since the object itself does not carry it.
pub fn parent(key: &str, description: &str) -> AttributeSchema {
    AttributeSchema::new(key, AttributeType::String)
        .required()
        .write_only()
        .with_description(description)
}

pub fn optional_parent(key: &str, description: &str) -> AttributeSchema {
    AttributeSchema::new(key, AttributeType::String)
        .write_only()
        .with_description(description)
}

pub fn string(key: &str, description: &str) -> AttributeSchema {
    AttributeSchema::new(key, AttributeType::String).with_description(description)
}

pub fn string_or(key: &str, default: &str, description: &str) -> AttributeSchema {
    string(key, description).with_default(Value::from(default))
}

pub fn int_or(key: &str, default: i64, description: &str) -> AttributeSchema {
    AttributeSchema::new(key, AttributeType::Int)
        .with_default(Value::Int(default))
        .with_description(description)
}

pub fn bool_or(key: &str, default: bool, description: &str) -> AttributeSchema {
    AttributeSchema::new(key, AttributeType::Bool)
        .with_default(Value::Bool(default))
        .with_description(description)
}

pub fn strings(key: &str, description: &str) -> AttributeSchema {
    AttributeSchema::new(key, types::string_list()).with_description(description)
}

/// Size expressed in gigabytes
pub fn gigabytes(key: &str, description: &str) -> AttributeSchema {
    AttributeSchema::new(key, AttributeType::Int).with_description(description)
}

/// Platform-assigned attribute
pub fn computed(key: &str, attr_type: AttributeType, description: &str) -> AttributeSchema {
    AttributeSchema::new(key, attr_type)
        .computed()
        .with_description(description)
}

/// Create-time switch, never read back
pub fn flag(key: &str, default: bool, description: &str) -> AttributeSchema {
    bool_or(key, default, description).write_only()
}

/// A list of nested blocks
pub fn blocks(key: &str, fields: Vec<AttributeSchema>, description: &str) -> AttributeSchema {
    AttributeSchema::new(
        key,
        AttributeType::List(Box::new(AttributeType::Object(fields))),
    )
    .with_description(description)
}

/// Common skeleton: `id`, `name`, `desc` and `timeouts`
pub fn named(resource_type: &str, description: &str) -> ResourceSchema {
    ResourceSchema::new(resource_type)
        .with_description(description)
        .attribute(id())
        .attribute(name(&format!("{} name", description)))
        .attribute(desc(&format!("{} description", description)))
        .attribute(timeouts())
}

/// Firewall rule block; `peer` is `source` (ingress) or `destination` (egress)
pub fn firewall_rule(peer: &str) -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new(peer, validation::network_address())
            .with_default(Value::from("0.0.0.0/0"))
            .with_description("IPv4 address or CIDR of the peer"),
        AttributeSchema::new("protocol", validation::network_protocol())
            .with_default(Value::from("tcp"))
            .with_description("Transport protocol (tcp or udp)"),
        AttributeSchema::new("ports", validation::port_ranges())
            .required()
            .with_description("Comma-separated ports or port ranges, e.g. \"22,80,8000-8080\""),
    ]
}

/// Forwarding rule block of a VPC peering
pub fn forward_rule() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new("protocol", validation::network_protocol())
            .with_default(Value::from("tcp")),
        AttributeSchema::new("ports", validation::port_ranges()).required(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_skeleton() {
        let schema = named("zone", "Zone");
        assert!(schema.attributes["id"].computed);
        assert!(schema.attributes["name"].required);
        assert_eq!(schema.attributes["desc"].default, Some(Value::from("")));
        assert!(schema.attributes["timeouts"].write_only);
    }

    #[test]
    fn parent_reference_stays_local() {
        let region = parent("region", "Region");
        assert!(region.required);
        assert!(region.write_only);
        assert!(!region.force_new);
    }

    #[test]
    fn timeouts_values_are_durations() {
        let schema = named("zone", "Zone");
        let attrs = std::collections::HashMap::from([
            ("name".to_string(), Value::from("z")),
            (
                "timeouts".to_string(),
                Value::Map(
                    [("create".to_string(), Value::from("forever"))]
                        .into_iter()
                        .collect(),
                ),
            ),
        ]);
        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors[0].path(), "timeouts[create]");
    }
}
