mod display;
mod document;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use kowabunga_core::differ::{Diff, diff};
use kowabunga_core::provider::{Provider, ProviderError};
use kowabunga_core::resource::{Resource, ResourceId, State, Value};
use kowabunga_core::schema::ResourceSchema;
use kowabunga_provider::validation::validate_resource;
use kowabunga_provider::{KowabungaProvider, ProviderConfig, schemas};

use crate::display::{format_value, masked_json, print_plan, schema_json};
use crate::document::{Document, Entry};

#[derive(Parser)]
#[command(name = "kowabunga")]
#[command(about = "Declarative management of Kowabunga cloud objects", long_about = None)]
#[command(version)]
struct Cli {
    /// Kowabunga API endpoint (falls back to the document, then KOWABUNGA_URI)
    #[arg(long, global = true)]
    uri: Option<String>,

    /// Kowabunga API token (falls back to the document, then KOWABUNGA_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "KOWABUNGA_LOG", default_value = "warn", global = true)]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show attribute documentation of resource types and data sources
    Schema {
        /// Resource type or data source name (lists all when omitted)
        resource_type: Option<String>,

        /// Describe the data source of that name
        #[arg(long)]
        data: bool,
    },
    /// Validate a document without contacting the API
    Validate {
        /// Path to the JSON document
        #[arg(default_value = "main.json")]
        file: PathBuf,
    },
    /// Show the changes needed to reach the desired state
    Plan {
        /// Path to the JSON document
        #[arg(default_value = "main.json")]
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        /// Path to the JSON document
        #[arg(default_value = "main.json")]
        file: PathBuf,
    },
    /// Delete every resource declared in the document
    Destroy {
        /// Path to the JSON document
        #[arg(default_value = "main.json")]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Read one object by its ID
    Read {
        resource_type: String,
        id: String,
    },
    /// Print a document entry for an existing object
    Import {
        resource_type: String,
        id: String,

        /// Entry name (defaults to the object's name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Evaluate a data source, e.g. `lookup subnet app=ceph`
    Lookup {
        data_source: String,

        /// Arguments as key=value (JSON values accepted)
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.debug);

    if let Err(e) = run(&cli).await {
        match e.downcast_ref::<ProviderError>() {
            Some(pe) => eprintln!("{} {}: {}", "Error:".red().bold(), pe.label(), pe),
            None => eprintln!("{} {:#}", "Error:".red().bold(), e),
        }
        std::process::exit(1);
    }
}

fn init_logging(level: &str, debug: bool) {
    let level = if debug { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("kowabunga_provider={0},kowabunga={0},reqwest=warn", level).into()
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Schema {
            resource_type,
            data,
        } => run_schema(resource_type.as_deref(), *data),
        Commands::Validate { file } => run_validate(file),
        Commands::Plan { file } => run_plan(cli, file).await,
        Commands::Apply { file } => run_apply(cli, file).await,
        Commands::Destroy { file, auto_approve } => run_destroy(cli, file, *auto_approve).await,
        Commands::Read { resource_type, id } => run_read(cli, resource_type, id).await,
        Commands::Import {
            resource_type,
            id,
            name,
        } => run_import(cli, resource_type, id, name.as_deref()).await,
        Commands::Lookup { data_source, args } => run_lookup(cli, data_source, args).await,
    }
}

// ========== Provider setup ==========

/// Explicit flags first, then the document's provider block, then the environment
fn provider_config(cli: &Cli, document: Option<&Document>) -> ProviderConfig {
    let mut config = document
        .and_then(|d| d.provider.clone())
        .unwrap_or_default();
    if let Some(uri) = &cli.uri {
        config.uri = uri.clone();
    }
    if let Some(token) = &cli.token {
        config.token = token.clone();
    }
    config.with_env_fallback()
}

fn connect(cli: &Cli, document: Option<&Document>) -> Result<KowabungaProvider> {
    Ok(KowabungaProvider::configure(&provider_config(cli, document))?)
}

fn resource_schema(resource_type: &str) -> Result<ResourceSchema> {
    schemas::resource_schema(resource_type)
        .ok_or_else(|| anyhow!("Unknown resource type: {}", resource_type))
}

fn data_source_schema(data_source: &str) -> Result<ResourceSchema> {
    schemas::data_source_schema(data_source)
        .ok_or_else(|| anyhow!("Unknown data source: {}", data_source))
}

fn address(id: &ResourceId) -> String {
    format!("{}.{}", id.resource_type, id.name)
}

// ========== schema / validate ==========

fn run_schema(resource_type: Option<&str>, data: bool) -> Result<()> {
    let Some(name) = resource_type else {
        println!("{}", "Resources:".bold());
        for schema in schemas::all_schemas() {
            println!("  {}", schema.resource_type);
        }
        println!("{}", "Data sources:".bold());
        for schema in schemas::data_source_schemas() {
            println!("  {}", schema.resource_type);
        }
        return Ok(());
    };

    let schema = if data {
        data_source_schema(name)?
    } else {
        resource_schema(name)?
    };
    println!("{}", serde_json::to_string_pretty(&schema_json(&schema))?);
    Ok(())
}

/// Defaults applied, then every check run; all failures reported
fn check_entries(document: &Document) -> Vec<String> {
    let mut errors = Vec::new();
    let entries = document
        .resources
        .iter()
        .map(|e| (e, false))
        .chain(document.data.iter().map(|e| (e, true)));

    for (entry, is_data) in entries {
        let schema = if is_data {
            data_source_schema(&entry.resource_type)
        } else {
            resource_schema(&entry.resource_type)
        };
        let schema = match schema {
            Ok(schema) => schema,
            Err(e) => {
                errors.push(format!("{}: {}", entry.address(), e));
                continue;
            }
        };
        let mut attributes = entry.to_resource(is_data).attributes;
        schema.apply_defaults(&mut attributes);
        if let Err(failures) = validate_resource(&schema, &attributes) {
            errors.extend(
                failures
                    .into_iter()
                    .map(|f| format!("{}: {}", entry.address(), f)),
            );
        }
    }
    errors
}

fn run_validate(file: &Path) -> Result<()> {
    let document = Document::load(file)?;
    let errors = check_entries(&document);
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        bail!("{} validation error(s)", errors.len());
    }
    println!(
        "{}",
        format!(
            "✓ {} resource(s) and {} data source(s) are valid.",
            document.resources.len(),
            document.data.len()
        )
        .green()
    );
    Ok(())
}

// ========== plan / apply / destroy ==========

/// A computed change, with the ID of the object it applies to
struct Planned {
    diff: Diff,
    identifier: Option<String>,
}

async fn create_plan(provider: &KowabungaProvider, document: &Document) -> Result<Vec<Planned>> {
    let errors = check_entries(document);
    if !errors.is_empty() {
        bail!("Invalid document:\n  {}", errors.join("\n  "));
    }

    for data in document.data_sources() {
        let state = provider.read_data_source(&data).await?;
        tracing::info!(
            "{} = {}",
            address(&data.id),
            format_value(&kowabunga_core::resource::Value::Map(state.attributes))
        );
    }

    let mut plan = Vec::new();
    for (mut desired, identifier) in document.resources() {
        let schema = resource_schema(&desired.id.resource_type)?;
        schema.apply_defaults(&mut desired.attributes);
        let current = provider.read(&desired, identifier.as_deref()).await?;
        plan.push(Planned {
            identifier: current.identifier.clone().or(identifier),
            diff: diff(&desired, &current, &schema),
        });
    }
    Ok(plan)
}

async fn run_plan(cli: &Cli, file: &Path) -> Result<()> {
    let document = Document::load(file)?;
    let provider = connect(cli, Some(&document))?;
    let plan = create_plan(&provider, &document).await?;
    print_plan(plan.iter().map(|p| &p.diff));
    Ok(())
}

/// Outcome line of an applied change
fn report(symbol: &str, id: &ResourceId, result: &Result<State, ProviderError>) -> bool {
    match result {
        Ok(state) => {
            println!(
                "  {} {} {} ({})",
                "✓".green(),
                symbol,
                address(id),
                state.identifier.as_deref().unwrap_or("-")
            );
            true
        }
        Err(e) => {
            println!(
                "  {} {} {} - {}: {}",
                "✗".red(),
                symbol,
                address(id),
                e.label(),
                e
            );
            false
        }
    }
}

async fn apply_change(provider: &KowabungaProvider, planned: &Planned) -> Option<bool> {
    let ok = match &planned.diff {
        Diff::NoChange(_) => return None,
        Diff::Create(resource) => {
            let result = provider.create(resource).await;
            report("+", &resource.id, &result)
        }
        Diff::Update { id, from, to, .. } => {
            let identifier = planned.identifier.as_deref().unwrap_or_default();
            let result = provider.update(id, identifier, from, to).await;
            report("~", id, &result)
        }
        Diff::Replace { id, to, .. } => {
            let identifier = planned.identifier.as_deref().unwrap_or_default();
            let result = match provider.delete(to, identifier).await {
                Ok(()) => provider.create(to).await,
                Err(e) => Err(e),
            };
            report("-/+", id, &result)
        }
    };
    Some(ok)
}

async fn run_apply(cli: &Cli, file: &Path) -> Result<()> {
    let document = Document::load(file)?;
    let provider = connect(cli, Some(&document))?;
    let plan = create_plan(&provider, &document).await?;

    if plan.iter().all(|p| !p.diff.is_change()) {
        println!("{}", "No changes needed.".green());
        return Ok(());
    }

    print_plan(plan.iter().map(|p| &p.diff));
    println!();
    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let mut success_count = 0;
    let mut failure_count = 0;
    for planned in &plan {
        match apply_change(&provider, planned).await {
            Some(true) => success_count += 1,
            Some(false) => failure_count += 1,
            None => {}
        }
    }

    println!();
    if failure_count == 0 {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        bail!(
            "Apply failed. {} succeeded, {} failed.",
            success_count,
            failure_count
        )
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim() == "yes")
}

async fn run_destroy(cli: &Cli, file: &Path, auto_approve: bool) -> Result<()> {
    let document = Document::load(file)?;
    let provider = connect(cli, Some(&document))?;

    // Children are declared after their parents
    let mut targets = Vec::new();
    for (resource, identifier) in document.resources().into_iter().rev() {
        let state = provider.read(&resource, identifier.as_deref()).await?;
        match state.identifier {
            Some(identifier) if state.exists => targets.push((resource, identifier)),
            _ => {}
        }
    }

    if targets.is_empty() {
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    println!("{}", "Resources to destroy:".red().bold());
    for (resource, identifier) in &targets {
        println!("  {} {} ({})", "-".red().bold(), address(&resource.id), identifier);
    }
    println!();

    if !auto_approve && !confirm("Type 'yes' to confirm:")? {
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    let mut failures = 0;
    for (resource, identifier) in &targets {
        match provider.delete(resource, identifier).await {
            Ok(()) => println!("  {} - {}", "✓".green(), address(&resource.id)),
            Err(e) => {
                println!(
                    "  {} - {} - {}: {}",
                    "✗".red(),
                    address(&resource.id),
                    e.label(),
                    e
                );
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("Destroy failed for {} resource(s)", failures);
    }
    println!();
    println!(
        "{}",
        format!("Destroy complete! {} resources destroyed.", targets.len())
            .green()
            .bold()
    );
    Ok(())
}

// ========== read / import / lookup ==========

async fn read_existing(
    cli: &Cli,
    resource_type: &str,
    id: &str,
) -> Result<(ResourceSchema, State)> {
    let schema = resource_schema(resource_type)?;
    let provider = connect(cli, None)?;
    let state = provider
        .read(&Resource::new(resource_type, id), Some(id))
        .await?;
    if !state.exists {
        bail!("{} {} does not exist", resource_type, id);
    }
    Ok((schema, state))
}

async fn run_read(cli: &Cli, resource_type: &str, id: &str) -> Result<()> {
    let (schema, state) = read_existing(cli, resource_type, id).await?;
    let json = masked_json(&state.attributes, Some(&schema));
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn run_import(cli: &Cli, resource_type: &str, id: &str, name: Option<&str>) -> Result<()> {
    let (schema, state) = read_existing(cli, resource_type, id).await?;

    // Only what a document may declare
    let mut attributes = state.attributes.clone();
    attributes.retain(|key, _| schema.attributes.get(key).is_some_and(|a| !a.computed));

    let entry_name = name
        .map(str::to_string)
        .or_else(|| state.attributes.get("name").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| id.to_string());
    let entry = Entry {
        resource_type: resource_type.to_string(),
        name: entry_name,
        id: state.identifier.clone(),
        attributes: masked_json(&attributes, Some(&schema)),
    };
    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}

/// `key=value` pairs; values that parse as JSON keep their type
fn parse_arguments(args: &[String]) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut map = serde_json::Map::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .with_context(|| format!("Expected key=value, got '{}'", arg))?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        map.insert(key.to_string(), value);
    }
    Ok(map)
}

async fn run_lookup(cli: &Cli, data_source: &str, args: &[String]) -> Result<()> {
    let schema = data_source_schema(data_source)?;
    let entry = Entry {
        resource_type: data_source.to_string(),
        name: data_source.to_string(),
        id: None,
        attributes: serde_json::Value::Object(parse_arguments(args)?),
    };
    let resource: Resource = entry.to_resource(true);
    let provider = connect(cli, None)?;
    let state = provider.read_data_source(&resource).await?;
    let json = masked_json(&state.attributes, Some(&schema));
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("kowabunga").chain(args.iter().copied()))
    }

    #[test]
    fn flags_take_precedence_over_document() {
        let document = Document::parse(
            r#"{"provider": {"uri": "http://doc.example.com", "token": "doc-token"}}"#,
        )
        .unwrap();
        let config = provider_config(
            &cli(&["--uri", "http://flag.example.com", "plan"]),
            Some(&document),
        );
        assert_eq!(config.uri, "http://flag.example.com");
        assert_eq!(config.token, "doc-token");
    }

    #[test]
    fn arguments_keep_json_types() {
        let args = parse_arguments(&["name=lan".to_string(), "count=3".to_string()]).unwrap();
        assert_eq!(args["name"], serde_json::json!("lan"));
        assert_eq!(args["count"], serde_json::json!(3));
        assert!(parse_arguments(&["oops".to_string()]).is_err());
    }

    #[test]
    fn document_checks_report_every_failure() {
        let document = Document::parse(
            r#"{
                "resources": [
                    {"type": "user", "name": "jdoe", "attributes": {"name": "jdoe", "email": "jdoe", "role": "boss"}},
                    {"type": "bucket", "name": "b"}
                ],
                "data": [{"type": "region", "name": "r"}]
            }"#,
        )
        .unwrap();
        let errors = check_entries(&document);
        assert!(errors.iter().any(|e| e.starts_with("user.jdoe: email")));
        assert!(errors.iter().any(|e| e.starts_with("user.jdoe: role")));
        assert!(errors.iter().any(|e| e.contains("Unknown resource type: bucket")));
        assert!(errors.iter().any(|e| e.starts_with("region.r")));
    }

    #[test]
    fn destroy_defaults_to_main_document() {
        match cli(&["destroy", "--auto-approve"]).command {
            Commands::Destroy { file, auto_approve } => {
                assert_eq!(file, PathBuf::from("main.json"));
                assert!(auto_approve);
            }
            _ => panic!("expected destroy"),
        }
    }
}
