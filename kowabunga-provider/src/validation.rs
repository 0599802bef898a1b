//! Field validators
//!
//! Pure checks run against configuration values before any request is sent.
//! Each check exists both as a plain function and as a schema attribute type.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use kowabunga_core::resource::Value;
use kowabunga_core::schema::{AttributeType, ResourceSchema, validate_cidr};
use regex::Regex;

pub const AGENT_TYPES: &[&str] = &["Kaktus", "Kiwi"];
pub const USER_ROLES: &[&str] = &["superAdmin", "projectAdmin", "user"];
pub const FIREWALL_POLICIES: &[&str] = &["accept", "drop"];
pub const NETWORK_PROTOCOLS: &[&str] = &["tcp", "udp"];
pub const DH_GROUPS: &[i64] = &[2, 5, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24];
pub const INTEGRITY_ALGORITHMS: &[&str] = &["SHA1", "SHA256", "SHA384", "SHA512"];
pub const ENCRYPTION_ALGORITHMS: &[&str] = &["AES128", "AES256", "CAMELLIA128", "CAMELLIA256"];

const DURATION_PATTERN: &str = r"^[0-9]+[smhd]$";

/// Validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Check attributes against a resource schema, collecting every violation
pub fn validate_resource(
    schema: &ResourceSchema,
    attributes: &HashMap<String, Value>,
) -> ValidationResult {
    schema.validate(attributes).map_err(|errors| {
        errors
            .iter()
            .map(|e| ValidationError {
                path: e.path(),
                message: e.root_cause().to_string(),
            })
            .collect()
    })
}

fn one_of(kind: &str, value: &str, allowed: &[&str]) -> Result<(), String> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(format!(
            "Unsupported {} '{}', expected one of: {}",
            kind,
            value,
            allowed.join(", ")
        ))
    }
}

pub fn validate_agent_type(value: &str) -> Result<(), String> {
    one_of("agent type", value, AGENT_TYPES)
}

pub fn validate_user_role(value: &str) -> Result<(), String> {
    one_of("user role", value, USER_ROLES)
}

pub fn validate_firewall_policy(value: &str) -> Result<(), String> {
    one_of("firewall policy", value, FIREWALL_POLICIES)
}

/// Case-insensitive
pub fn validate_network_protocol(value: &str) -> Result<(), String> {
    let lower = value.to_lowercase();
    one_of("network protocol", &lower, NETWORK_PROTOCOLS)
}

pub fn validate_port(port: i64) -> Result<(), String> {
    if (0..=65535).contains(&port) {
        Ok(())
    } else {
        Err("Port number is outside range (0-65535)".to_string())
    }
}

fn parse_port(value: &str) -> Result<u16, String> {
    value
        .parse::<u16>()
        .map_err(|_| format!("Invalid port: {}", value))
}

/// Comma-separated ports or `low-high` ranges, e.g. `22,80,8000-8080`
pub fn validate_port_ranges(value: &str) -> Result<(), String> {
    for entry in value.split(',') {
        let bounds: Vec<&str> = entry.split('-').collect();
        match bounds.as_slice() {
            [port] => {
                parse_port(port)?;
            }
            [low, high] => {
                let (low, high) = (parse_port(low)?, parse_port(high)?);
                if low > high {
                    return Err(format!(
                        "Invalid range: Left hand side is superior than right hand side ({})",
                        entry.trim()
                    ));
                }
            }
            _ => return Err(format!("Too many entries in range: {}", entry.trim())),
        }
    }
    Ok(())
}

/// IPv4 address or IPv4 CIDR block
pub fn validate_network_address(value: &str) -> Result<(), String> {
    if value.parse::<Ipv4Addr>().is_ok() || validate_cidr(value).is_ok() {
        Ok(())
    } else {
        Err(format!("Invalid IPv4 address or CIDR: {}", value))
    }
}

/// A number followed by one of `s`, `m`, `h` or `d`
pub fn validate_duration(value: &str) -> Result<(), String> {
    let matched = Regex::new(DURATION_PATTERN)
        .map(|re| re.is_match(value))
        .unwrap_or(false);
    if matched {
        Ok(())
    } else {
        Err(format!("Unsupported duration: {}", value))
    }
}

/// Operation deadline; units may be combined (`1h30m`)
pub fn validate_timeout(value: &str) -> Result<(), String> {
    crate::timeouts::parse_duration(value)
        .map(|_| ())
        .map_err(|e| format!("Unsupported duration: {}", e))
}

pub fn validate_dh_group(value: i64) -> Result<(), String> {
    if DH_GROUPS.contains(&value) {
        Ok(())
    } else {
        Err(format!(
            "Unsupported algorithm: Diffie-Hellman group {} (expected 2, 5 or 14-24)",
            value
        ))
    }
}

pub fn validate_integrity_algorithm(value: &str) -> Result<(), String> {
    one_of("algorithm", value, INTEGRITY_ALGORITHMS)
}

pub fn validate_encryption_algorithm(value: &str) -> Result<(), String> {
    one_of("algorithm", value, ENCRYPTION_ALGORITHMS)
}

pub fn validate_email(value: &str) -> Result<(), String> {
    if !validator::validate_email(value) {
        return Err(format!("Malformed user email: {}", value));
    }
    // Syntax is fine, but a bare host cannot receive notifications
    match value.rsplit_once('@') {
        Some((_, domain)) if domain.contains('.') && !domain.ends_with('.') => Ok(()),
        _ => Err(format!("Unsupported user email: {}", value)),
    }
}

// ========== Schema attribute types ==========

macro_rules! string_type {
    ($fn_name:ident, $type_name:literal, $check:path) => {
        pub fn $fn_name() -> AttributeType {
            AttributeType::Custom {
                name: $type_name.to_string(),
                base: Box::new(AttributeType::String),
                validate: |value| {
                    if let Value::String(s) = value {
                        $check(s)
                    } else {
                        Err("Expected string".to_string())
                    }
                },
            }
        }
    };
}

macro_rules! int_type {
    ($fn_name:ident, $type_name:literal, $check:path) => {
        pub fn $fn_name() -> AttributeType {
            AttributeType::Custom {
                name: $type_name.to_string(),
                base: Box::new(AttributeType::Int),
                validate: |value| {
                    if let Value::Int(n) = value {
                        $check(*n)
                    } else {
                        Err("Expected integer".to_string())
                    }
                },
            }
        }
    };
}

string_type!(agent_type, "AgentType", validate_agent_type);
string_type!(user_role, "UserRole", validate_user_role);
string_type!(firewall_policy, "FirewallPolicy", validate_firewall_policy);
string_type!(network_protocol, "NetworkProtocol", validate_network_protocol);
string_type!(port_ranges, "PortRanges", validate_port_ranges);
string_type!(network_address, "NetworkAddress", validate_network_address);
string_type!(duration, "Duration", validate_duration);
string_type!(timeout, "Timeout", validate_timeout);
string_type!(integrity_algorithm, "IntegrityAlgorithm", validate_integrity_algorithm);
string_type!(encryption_algorithm, "EncryptionAlgorithm", validate_encryption_algorithm);
string_type!(email, "Email", validate_email);
int_type!(port, "Port", validate_port);
int_type!(dh_group, "DHGroup", validate_dh_group);
