//! Terminal rendering of plans, values and schemas

use std::collections::{BTreeMap, HashMap};

use colored::Colorize;
use kowabunga_core::differ::Diff;
use kowabunga_core::resource::{Resource, Value};
use kowabunga_core::schema::ResourceSchema;
use serde_json::json;

const MASK: &str = "(sensitive)";

fn is_sensitive(schema: Option<&ResourceSchema>, key: &str) -> bool {
    schema
        .and_then(|s| s.attributes.get(key))
        .is_some_and(|a| a.sensitive)
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let sorted: BTreeMap<_, _> = map.iter().collect();
            let strs: Vec<_> = sorted
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
    }
}

fn format_attribute(schema: Option<&ResourceSchema>, key: &str, value: &Value) -> String {
    if is_sensitive(schema, key) {
        MASK.to_string()
    } else {
        format_value(value)
    }
}

/// Attributes as JSON, sensitive values replaced
pub fn masked_json(
    attributes: &HashMap<String, Value>,
    schema: Option<&ResourceSchema>,
) -> serde_json::Value {
    let object: serde_json::Map<_, _> = attributes
        .iter()
        .map(|(key, value)| {
            let json = if is_sensitive(schema, key) {
                json!(MASK)
            } else {
                value.to_json()
            };
            (key.clone(), json)
        })
        .collect();
    serde_json::Value::Object(object)
}

fn print_created(resource: &Resource, schema: Option<&ResourceSchema>) {
    let sorted: BTreeMap<_, _> = resource.attributes.iter().collect();
    for (key, value) in sorted {
        println!(
            "      {} = {}",
            key,
            format_attribute(schema, key, value).green()
        );
    }
}

fn print_changed(
    from: &HashMap<String, Value>,
    to: &Resource,
    keys: &[String],
    schema: Option<&ResourceSchema>,
) {
    for key in keys {
        let old = from
            .get(key)
            .map(|v| format_attribute(schema, key, v))
            .unwrap_or_else(|| "(none)".to_string());
        let new = to
            .attributes
            .get(key)
            .map(|v| format_attribute(schema, key, v))
            .unwrap_or_else(|| "(none)".to_string());
        println!("      {}: {} → {}", key, old.red(), new.green());
    }
}

pub fn print_plan<'a>(diffs: impl IntoIterator<Item = &'a Diff>) {
    let diffs: Vec<&Diff> = diffs.into_iter().filter(|d| d.is_change()).collect();
    if diffs.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    let (mut add, mut change, mut replace) = (0, 0, 0);
    for diff in diffs {
        match diff {
            Diff::Create(resource) => {
                add += 1;
                let schema =
                    kowabunga_provider::schemas::resource_schema(&resource.id.resource_type);
                println!(
                    "  {} {}.{}",
                    "+".green().bold(),
                    resource.id.resource_type.cyan().bold(),
                    resource.id.name.white().bold()
                );
                print_created(resource, schema.as_ref());
            }
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => {
                change += 1;
                let schema = kowabunga_provider::schemas::resource_schema(&id.resource_type);
                println!(
                    "  {} {}.{}",
                    "~".yellow().bold(),
                    id.resource_type.cyan().bold(),
                    id.name.white().bold()
                );
                print_changed(&from.attributes, to, changed_attributes, schema.as_ref());
            }
            Diff::Replace {
                id,
                from,
                to,
                attributes,
            } => {
                replace += 1;
                let schema = kowabunga_provider::schemas::resource_schema(&id.resource_type);
                println!(
                    "  {} {}.{} {}",
                    "-/+".magenta().bold(),
                    id.resource_type.cyan().bold(),
                    id.name.white().bold(),
                    "(forces replacement)".magenta()
                );
                print_changed(&from.attributes, to, attributes, schema.as_ref());
            }
            Diff::NoChange(_) => {}
        }
    }

    println!();
    println!(
        "Plan: {} to add, {} to change, {} to replace.",
        add.to_string().green(),
        change.to_string().yellow(),
        replace.to_string().magenta()
    );
}

/// Attribute documentation of one schema
pub fn schema_json(schema: &ResourceSchema) -> serde_json::Value {
    let attributes: BTreeMap<_, _> = schema
        .attributes
        .iter()
        .map(|(name, attr)| {
            (
                name.clone(),
                json!({
                    "type": attr.attr_type.type_name(),
                    "required": attr.required,
                    "computed": attr.computed,
                    "sensitive": attr.sensitive,
                    "force_new": attr.force_new,
                    "write_only": attr.write_only,
                    "default": attr.default.as_ref().map(Value::to_json),
                    "description": attr.description,
                }),
            )
        })
        .collect();
    json!({
        "type": schema.resource_type,
        "description": schema.description,
        "attributes": attributes,
    })
}
