//! Attribute <-> API model conversion helpers

use std::collections::{BTreeMap, HashMap};

use kowabunga_core::provider::{ProviderError, ProviderResult};
use kowabunga_core::resource::Value;

/// Bytes per gigabyte (binary)
pub const GB: i64 = 1 << 30;

pub fn gb_to_bytes(gb: i64) -> i64 {
    gb.saturating_mul(GB)
}

pub fn bytes_to_gb(bytes: i64) -> i64 {
    bytes / GB
}

/// Prefix length of an IPv4 CIDR (`10.0.0.0/26` -> 26)
pub fn cidr_prefix(cidr: &str) -> Option<u8> {
    cidr.split_once('/')
        .and_then(|(_, prefix)| prefix.parse::<u8>().ok())
        .filter(|prefix| *prefix <= 32)
}

/// Typed, path-aware accessor over a resource's attributes
#[derive(Debug, Clone)]
pub struct AttrReader<'a> {
    attrs: &'a HashMap<String, Value>,
    path: String,
}

impl<'a> AttrReader<'a> {
    pub fn new(attrs: &'a HashMap<String, Value>) -> Self {
        Self {
            attrs,
            path: String::new(),
        }
    }

    fn nested(attrs: &'a HashMap<String, Value>, path: String) -> Self {
        Self { attrs, path }
    }

    fn path_of(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.attrs.get(key)
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::as_str).map(str::to_string)
    }

    /// Present and not empty
    pub fn non_empty_string(&self, key: &str) -> Option<String> {
        self.string(key).filter(|s| !s.is_empty())
    }

    pub fn required_string(&self, key: &str) -> ProviderResult<String> {
        self.string(key).ok_or_else(|| {
            ProviderError::validation(self.path_of(key), format!("'{}' is required", key))
        })
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    pub fn required_int(&self, key: &str) -> ProviderResult<i64> {
        self.int(key).ok_or_else(|| {
            ProviderError::validation(self.path_of(key), format!("'{}' is required", key))
        })
    }

    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        self.int(key).unwrap_or(default)
    }

    pub fn float_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(Value::as_float).unwrap_or(default)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// For lists whose order carries no meaning
    pub fn sorted_string_list(&self, key: &str) -> Vec<String> {
        let mut items = self.string_list(key);
        items.sort();
        items
    }

    pub fn int_list(&self, key: &str) -> Vec<i64> {
        self.get(key)
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(Value::as_int).collect())
            .unwrap_or_default()
    }

    pub fn string_map(&self, key: &str) -> BTreeMap<String, String> {
        self.get(key)
            .and_then(Value::as_map)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nested blocks of a list attribute, each reporting errors under `key[i]`
    pub fn blocks(&self, key: &str) -> Vec<AttrReader<'a>> {
        let Some(items) = self.get(key).and_then(Value::as_list) else {
            return Vec::new();
        };
        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                item.as_map()
                    .map(|map| AttrReader::nested(map, format!("{}[{}]", self.path_of(key), i)))
            })
            .collect()
    }
}

/// Builder for the attribute map of a read-back state
#[derive(Debug, Default)]
pub struct AttrMap(HashMap<String, Value>);

impl AttrMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn with_strings<I, S>(self, key: &str, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = items.into_iter().map(|s| Value::String(s.into())).collect();
        self.with(key, Value::List(list))
    }

    pub fn with_ints(self, key: &str, items: impl IntoIterator<Item = i64>) -> Self {
        self.with(key, Value::List(items.into_iter().map(Value::Int).collect()))
    }

    pub fn with_map<I>(self, key: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        self.with(key, Value::Map(map))
    }

    pub fn with_blocks(self, key: &str, blocks: Vec<HashMap<String, Value>>) -> Self {
        self.with(key, Value::List(blocks.into_iter().map(Value::Map).collect()))
    }

    pub fn build(self) -> HashMap<String, Value> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kowabunga_core::provider::ErrorKind;

    #[test]
    fn gb_round_trip() {
        for gb in [0, 1, 4, 512, 8191] {
            assert_eq!(bytes_to_gb(gb_to_bytes(gb)), gb);
        }
        assert_eq!(gb_to_bytes(4), 4_294_967_296);
        assert_eq!(gb_to_bytes(i64::MAX), i64::MAX);
    }

    #[test]
    fn cidr_prefix_length() {
        assert_eq!(cidr_prefix("10.0.0.0/26"), Some(26));
        assert_eq!(cidr_prefix("10.0.0.0/33"), None);
        assert_eq!(cidr_prefix("10.0.0.0"), None);
    }

    #[test]
    fn reader_defaults() {
        let attrs = HashMap::from([("vlan".to_string(), Value::Int(12))]);
        let r = AttrReader::new(&attrs);
        assert_eq!(r.int_or("vlan", 0), 12);
        assert_eq!(r.string_or("desc", ""), "");
        assert!(r.bool_or("private", true));
        assert!(r.string_list("agents").is_empty());
    }

    #[test]
    fn required_error_points_at_nested_path() {
        let attrs = HashMap::from([(
            "endpoints".to_string(),
            Value::List(vec![Value::Map(HashMap::new())]),
        )]);
        let r = AttrReader::new(&attrs);
        let blocks = r.blocks("endpoints");
        let err = blocks[0].required_string("name").unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Validation {
                path: "endpoints[0].name".to_string()
            }
        );
    }

    #[test]
    fn sorted_list_ignores_input_order() {
        let attrs = HashMap::from([(
            "users".to_string(),
            Value::List(vec![Value::from("u2"), Value::from("u1")]),
        )]);
        assert_eq!(AttrReader::new(&attrs).sorted_string_list("users"), vec!["u1", "u2"]);
    }

    #[test]
    fn builder_produces_typed_values() {
        let attrs = AttrMap::new()
            .with("name", "eu-west")
            .with("vlan", 0i64)
            .with_strings("agents", ["a1"])
            .with_map("metadata", [("k".to_string(), "v".to_string())])
            .build();
        assert_eq!(attrs["name"], Value::from("eu-west"));
        assert_eq!(attrs["vlan"], Value::Int(0));
        assert_eq!(attrs["agents"], Value::List(vec![Value::from("a1")]));
        assert!(attrs["metadata"].as_map().is_some());
    }
}
