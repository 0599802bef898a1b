//! Identity schemas: users, teams and projects

use kowabunga_core::resource::Value;
use kowabunga_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as kw;
use crate::validation;

pub fn team_schema() -> ResourceSchema {
    kw::named("team", "Team").attribute(kw::strings("users", "IDs of the team members"))
}

pub fn user_schema() -> ResourceSchema {
    kw::named("user", "User")
        .attribute(
            AttributeSchema::new("email", validation::email())
                .required()
                .with_description("User email address"),
        )
        .attribute(
            AttributeSchema::new("role", validation::user_role())
                .required()
                .with_description("User role (superAdmin, projectAdmin or user)"),
        )
        .attribute(kw::bool_or(
            "notifications",
            false,
            "Whether the user receives email notifications",
        ))
        .attribute(kw::flag(
            "bot",
            false,
            "Robot account: gets an API token instead of a password",
        ))
}

pub fn project_schema() -> ResourceSchema {
    kw::named("project", "Project")
        .attribute(kw::string_or("domain", "", "Internal DNS domain of the project"))
        .attribute(
            AttributeSchema::new("subnet_size", types::positive_int())
                .with_default(Value::Int(26))
                .force_new()
                .with_description("Prefix length of the private subnet to allocate"),
        )
        .attribute(
            kw::string_or("root_password", "", "Instances root password").sensitive(),
        )
        .attribute(kw::string("bootstrap_user", "Instances bootstrap user"))
        .attribute(kw::string("bootstrap_pubkey", "Bootstrap user SSH public key"))
        .attribute(kw::strings("tags", "Project tags"))
        .attribute(
            AttributeSchema::new("metadata", types::string_map())
                .with_description("Project key/value metadata"),
        )
        .attribute(kw::int_or("max_instances", 0, "Maximum number of instances (0 for unlimited)"))
        .attribute(kw::int_or("max_memory", 0, "Maximum memory in GB (0 for unlimited)"))
        .attribute(kw::int_or("max_storage", 0, "Maximum storage in GB (0 for unlimited)"))
        .attribute(kw::int_or("max_vcpus", 0, "Maximum number of vCPUs (0 for unlimited)"))
        .attribute(kw::strings("teams", "IDs of the teams allowed on the project"))
        .attribute(kw::strings("regions", "IDs of the regions the project spans"))
        .attribute(kw::computed(
            "private_subnets",
            types::string_map(),
            "Private subnet ID per region ID",
        ))
        .attribute(kw::computed(
            "vrids",
            AttributeType::List(Box::new(AttributeType::Int)),
            "Reserved VRRP IDs",
        ))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![team_schema(), user_schema(), project_schema()]
}
