//! Kowabunga resource and data source schema definitions

pub mod compute;
pub mod data;
pub mod identity;
pub mod infrastructure;
pub mod network;
pub mod types;

use kowabunga_core::schema::ResourceSchema;

/// Returns all resource schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    let mut schemas = Vec::new();
    schemas.extend(infrastructure::schemas());
    schemas.extend(identity::schemas());
    schemas.extend(compute::schemas());
    schemas.extend(network::schemas());
    schemas
}

/// Returns all data source schemas
pub fn data_source_schemas() -> Vec<ResourceSchema> {
    data::schemas()
}

pub fn resource_schema(resource_type: &str) -> Option<ResourceSchema> {
    all_schemas()
        .into_iter()
        .find(|s| s.resource_type == resource_type)
}

pub fn data_source_schema(data_source: &str) -> Option<ResourceSchema> {
    data_source_schemas()
        .into_iter()
        .find(|s| s.resource_type == data_source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_resource_has_a_schema() {
        let names: HashSet<String> = all_schemas().into_iter().map(|s| s.resource_type).collect();
        assert_eq!(names.len(), 22);
        for name in ["region", "storage_nfs", "kawaii_ipsec", "dns_record", "kylo"] {
            assert!(names.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn every_resource_exposes_id_and_timeouts() {
        for schema in all_schemas() {
            assert!(schema.attributes["id"].computed, "{}", schema.resource_type);
            assert!(schema.attributes["timeouts"].write_only, "{}", schema.resource_type);
        }
    }

    #[test]
    fn kawaii_has_no_name() {
        let schema = resource_schema("kawaii").unwrap();
        assert!(!schema.attributes.contains_key("name"));
    }

    #[test]
    fn data_sources() {
        assert_eq!(data_source_schemas().len(), 8);
        assert!(data_source_schema("zones").is_some());
        assert!(data_source_schema("kylo").is_none());
    }
}
