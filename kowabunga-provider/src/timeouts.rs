//! Per-operation deadlines
//!
//! Defaults can be overridden per resource with a `timeouts` map, e.g.
//! `{"create": "1h", "read": "45s"}`.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use kowabunga_core::resource::Value;
use regex::Regex;

pub const DEFAULT_CREATE: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_READ: Duration = Duration::from_secs(2 * 60);
pub const DEFAULT_UPDATE: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_DELETE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn key(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_CREATE,
            read: DEFAULT_READ,
            update: DEFAULT_UPDATE,
            delete: DEFAULT_DELETE,
        }
    }
}

impl Timeouts {
    /// Read overrides from the `timeouts` attribute; malformed entries are rejected
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> Result<Self, String> {
        let mut timeouts = Self::default();
        let Some(Value::Map(overrides)) = attributes.get("timeouts") else {
            return Ok(timeouts);
        };

        for op in [
            Operation::Create,
            Operation::Read,
            Operation::Update,
            Operation::Delete,
        ] {
            if let Some(value) = overrides.get(op.key()) {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("timeouts.{} must be a duration string", op))?;
                let limit = parse_duration(text).map_err(|e| format!("timeouts.{}: {}", op, e))?;
                timeouts.set(op, limit);
            }
        }
        Ok(timeouts)
    }

    pub fn get(&self, op: Operation) -> Duration {
        match op {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    fn set(&mut self, op: Operation, limit: Duration) {
        match op {
            Operation::Create => self.create = limit,
            Operation::Read => self.read = limit,
            Operation::Update => self.update = limit,
            Operation::Delete => self.delete = limit,
        }
    }
}

/// Parse a duration such as `45s`, `20m`, `1h30m` or `2d`
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let units = Regex::new(r"^([0-9]+[smhd])+$").map_err(|e| e.to_string())?;
    if !units.is_match(text) {
        return Err(format!(
            "invalid duration '{}', expected amounts in s, m, h or d",
            text
        ));
    }
    humantime::parse_duration(text).map_err(|e| format!("invalid duration '{}': {}", text, e))
}
