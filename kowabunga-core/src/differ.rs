//! Differ - Compare desired state with current state
//!
//! Compares the desired resource declared in a configuration document with the
//! current state read from the Provider, and decides which operation is needed.

use std::collections::HashMap;

use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A replace-only attribute changed -> destroy then create
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: &ResourceSchema) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let replace = schema.replacement_attributes(&current.attributes, &desired.attributes);
    if !replace.is_empty() {
        return Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            attributes: replace,
        };
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes, schema);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: &ResourceSchema,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Local-only and platform-assigned attributes never drive an update,
        // replace-only ones are settled by `replacement_attributes`
        if let Some(attr) = schema.attributes.get(key)
            && (attr.write_only || attr.computed || attr.force_new)
        {
            continue;
        }

        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType};

    fn schema() -> ResourceSchema {
        ResourceSchema::new("project")
            .attribute(AttributeSchema::new("desc", AttributeType::String))
            .attribute(AttributeSchema::new("subnet_size", AttributeType::Int).force_new())
            .attribute(
                AttributeSchema::new(
                    "timeouts",
                    AttributeType::Map(Box::new(AttributeType::String)),
                )
                .write_only(),
            )
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("project", "acme");
        let current = State::not_found(ResourceId::new("project", "acme"));

        let result = diff(&desired, &current, &schema());
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("project", "acme")
            .with_attribute("desc", Value::String("ACME".to_string()));

        let mut attrs = HashMap::new();
        attrs.insert("desc".to_string(), Value::String("ACME".to_string()));
        let current = State::existing(ResourceId::new("project", "acme"), attrs);

        let result = diff(&desired, &current, &schema());
        assert!(!result.is_change());
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("project", "acme")
            .with_attribute("desc", Value::String("new".to_string()));

        let mut attrs = HashMap::new();
        attrs.insert("desc".to_string(), Value::String("old".to_string()));
        let current = State::existing(ResourceId::new("project", "acme"), attrs);

        let result = diff(&desired, &current, &schema());
        match result {
            Diff::Update {
                changed_attributes, ..
            } => {
                assert_eq!(changed_attributes, vec!["desc".to_string()]);
            }
            _ => panic!("Expected Update"),
        }
    }

    #[test]
    fn diff_ignores_write_only_attributes() {
        let desired = Resource::new("project", "acme").with_attribute(
            "timeouts",
            Value::Map(HashMap::from([(
                "create".to_string(),
                Value::String("1h".to_string()),
            )])),
        );
        let current = State::existing(ResourceId::new("project", "acme"), HashMap::new());

        assert!(!diff(&desired, &current, &schema()).is_change());
    }

    #[test]
    fn unreported_replace_only_attribute_is_no_change() {
        let desired =
            Resource::new("project", "acme").with_attribute("subnet_size", Value::Int(24));
        let current = State::existing(ResourceId::new("project", "acme"), HashMap::new());

        assert!(!diff(&desired, &current, &schema()).is_change());
    }

    #[test]
    fn diff_replace_on_force_new_change() {
        let desired =
            Resource::new("project", "acme").with_attribute("subnet_size", Value::Int(24));
        let mut attrs = HashMap::new();
        attrs.insert("subnet_size".to_string(), Value::Int(26));
        let current = State::existing(ResourceId::new("project", "acme"), attrs);

        match diff(&desired, &current, &schema()) {
            Diff::Replace { attributes, .. } => assert_eq!(attributes, vec!["subnet_size"]),
            other => panic!("Expected Replace, got {:?}", other),
        }
    }
}
