//! Network service schemas: kawaii gateways, IPsec tunnels, konvey load balancers, kylo shares

use kowabunga_core::resource::Value;
use kowabunga_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as kw;
use crate::validation;

fn object(fields: Vec<AttributeSchema>) -> AttributeType {
    AttributeType::Object(fields)
}

fn list_of(fields: Vec<AttributeSchema>) -> AttributeType {
    AttributeType::List(Box::new(object(fields)))
}

fn kawaii_netcfg() -> AttributeType {
    object(vec![
        AttributeSchema::new("public_ips", types::string_list()),
        AttributeSchema::new("private_ips", types::string_list()),
        AttributeSchema::new(
            "zones",
            list_of(vec![
                AttributeSchema::new("zone", AttributeType::String),
                AttributeSchema::new("public_ip", AttributeType::String),
                AttributeSchema::new("private_ip", AttributeType::String),
            ]),
        ),
    ])
}

fn peering_fields() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new("subnet", AttributeType::String)
            .required()
            .with_description("Peered subnet ID"),
        AttributeSchema::new("policy", validation::firewall_policy())
            .with_default(Value::from("drop"))
            .with_description("Default forwarding policy"),
        kw::blocks("ingress_rules", kw::forward_rule(), "Allowed inbound traffic"),
        kw::blocks("egress_rules", kw::forward_rule(), "Allowed outbound traffic"),
        kw::computed(
            "netcfg",
            list_of(vec![
                AttributeSchema::new("zone", AttributeType::String),
                AttributeSchema::new("private_ip", AttributeType::String),
            ]),
            "Per-zone address in the peered subnet",
        ),
    ]
}

fn nat_rule() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new("destination", validation::network_address())
            .required()
            .with_description("Private address to forward to"),
        AttributeSchema::new("protocol", validation::network_protocol())
            .with_default(Value::from("tcp")),
        AttributeSchema::new("ports", validation::port_ranges()).required(),
    ]
}

pub fn kawaii_schema() -> ResourceSchema {
    ResourceSchema::new("kawaii")
        .with_description("Kawaii internet gateway")
        .attribute(kw::id())
        .attribute(kw::desc("Kawaii description"))
        .attribute(kw::timeouts())
        .attribute(kw::parent("project", "Associated project ID or name"))
        .attribute(kw::parent("region", "Associated region ID or name"))
        .attribute(kw::computed("netcfg", kawaii_netcfg(), "Public and private addresses"))
        .attribute(kw::blocks(
            "ingress_rules",
            kw::firewall_rule("source"),
            "Allowed inbound traffic",
        ))
        .attribute(
            AttributeSchema::new("egress_policy", validation::firewall_policy())
                .with_default(Value::from("accept"))
                .with_description("Default outbound policy"),
        )
        .attribute(kw::blocks(
            "egress_rules",
            kw::firewall_rule("destination"),
            "Outbound rules, applied when the policy is drop",
        ))
        .attribute(kw::blocks("nat_rules", nat_rule(), "Destination NAT rules"))
        .attribute(
            AttributeSchema::new("vpc_peerings", list_of(peering_fields()))
                .with_description("Peerings with other subnets"),
        )
}

fn phase(index: u8, schema: ResourceSchema) -> ResourceSchema {
    let key = |suffix: &str| format!("phase{}_{}", index, suffix);
    schema
        .attribute(
            AttributeSchema::new(key("lifetime"), validation::duration())
                .with_default(Value::from("1h"))
                .with_description(format!("Phase {} lifetime", index)),
        )
        .attribute(
            AttributeSchema::new(key("dh_group_number"), validation::dh_group())
                .required()
                .with_description(format!("Phase {} Diffie-Hellman group", index)),
        )
        .attribute(
            AttributeSchema::new(key("integrity_algorithm"), validation::integrity_algorithm())
                .required()
                .with_description(format!("Phase {} integrity algorithm", index)),
        )
        .attribute(
            AttributeSchema::new(
                key("encryption_algorithm"),
                validation::encryption_algorithm(),
            )
            .required()
            .with_description(format!("Phase {} encryption algorithm", index)),
        )
}

pub fn kawaii_ipsec_schema() -> ResourceSchema {
    let schema = kw::named("kawaii_ipsec", "IPsec connection")
        .attribute(
            AttributeSchema::new("kawaii", AttributeType::String)
                .required()
                .force_new()
                .with_description("Associated kawaii ID or name"),
        )
        .attribute(kw::computed("ip", AttributeType::String, "Local public address"))
        .attribute(
            AttributeSchema::new("pre_shared_key", AttributeType::String)
                .required()
                .sensitive()
                .with_description("Pre-shared key"),
        )
        .attribute(
            AttributeSchema::new("remote_peer", validation::network_address())
                .required()
                .with_description("Remote gateway address"),
        )
        .attribute(
            AttributeSchema::new("remote_subnet", validation::network_address())
                .required()
                .with_description("Remote private subnet"),
        )
        .attribute(
            AttributeSchema::new("dpd_timeout", validation::duration())
                .with_default(Value::from("240s"))
                .with_description("Dead peer detection timeout"),
        )
        .attribute(kw::string_or(
            "dpd_action",
            "restart",
            "Action on dead peer detection",
        ))
        .attribute(kw::string_or("start_action", "start", "Action on startup"))
        .attribute(
            AttributeSchema::new("rekey", validation::duration())
                .with_default(Value::from("2h"))
                .with_description("Rekeying interval"),
        )
        .attribute(kw::blocks(
            "ingress_rules",
            kw::firewall_rule("source"),
            "Allowed inbound traffic from the tunnel",
        ));
    phase(2, phase(1, schema))
}

fn endpoint_fields() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new("name", AttributeType::String).required(),
        AttributeSchema::new("protocol", validation::network_protocol())
            .with_default(Value::from("tcp")),
        AttributeSchema::new("port", validation::port())
            .required()
            .with_description("Public port"),
        AttributeSchema::new("backend_port", validation::port())
            .required()
            .with_description("Backend port"),
        AttributeSchema::new("backend_ips", types::string_list())
            .with_description("Backend addresses"),
    ]
}

pub fn konvey_schema() -> ResourceSchema {
    kw::named("konvey", "Konvey load balancer")
        .attribute(kw::parent("project", "Associated project ID or name"))
        .attribute(kw::parent("region", "Associated region ID or name"))
        .attribute(kw::computed(
            "private_ip",
            AttributeType::String,
            "Virtual IP of the load balancer",
        ))
        .attribute(kw::bool_or("failover", true, "Deploy in high availability"))
        .attribute(
            AttributeSchema::new("endpoints", list_of(endpoint_fields()))
                .with_description("Load-balanced endpoints"),
        )
}

pub fn kylo_schema() -> ResourceSchema {
    kw::named("kylo", "Kylo NFS share")
        .attribute(kw::parent("project", "Associated project ID or name"))
        .attribute(kw::parent("region", "Associated region ID or name"))
        .attribute(kw::optional_parent(
            "nfs",
            "NFS storage ID or name (region default if unset)",
        ))
        .attribute(
            AttributeSchema::new(
                "access_type",
                AttributeType::Enum(vec!["RW".to_string(), "RO".to_string()]),
            )
            .with_default(Value::from("RW"))
            .with_description("Access type (RW or RO)"),
        )
        .attribute(
            AttributeSchema::new("protocols", AttributeType::List(Box::new(AttributeType::Int)))
                .with_default(Value::List(vec![Value::Int(3), Value::Int(4)]))
                .with_description("NFS protocol versions"),
        )
        .attribute(kw::computed("endpoint", AttributeType::String, "NFS mount endpoint"))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        kawaii_schema(),
        kawaii_ipsec_schema(),
        konvey_schema(),
        kylo_schema(),
    ]
}
