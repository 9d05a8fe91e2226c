//! Command-line interface for listql.
//!
//! # Usage
//!
//! ```bash
//! # Print the generated GraphQL schema
//! listql schema blog.json
//!
//! # Validate schema configurations
//! listql check blog.json
//!
//! # Show the GraphQL names of a list
//! listql names blog.json Post
//!
//! # Run a request against an in-memory store
//! listql exec blog.json request.json --seed seed.json
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use listql_runtime::{
    Context, Item, List, ListRegistry, MemoryAdapter, Operation, OperationKind, Response,
    SchemaConfig, Selection,
};
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "listql")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the GraphQL schema of a schema configuration
    Schema {
        /// Schema configuration (JSON)
        config: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build schema configurations and report errors
    Check {
        #[arg(required = true)]
        configs: Vec<PathBuf>,
    },

    /// Print the GraphQL names derived for a list
    Names {
        /// Schema configuration (JSON)
        config: PathBuf,

        /// List key
        list: String,
    },

    /// Execute a request against an in-memory store
    Exec {
        /// Schema configuration (JSON)
        config: PathBuf,

        /// Request document (JSON)
        request: PathBuf,

        /// Initial items, keyed by list
        #[arg(long)]
        seed: Option<PathBuf>,

        /// Session value (JSON) handed to access rules
        #[arg(long)]
        session: Option<String>,

        /// Bypass access control
        #[arg(long)]
        sudo: bool,
    },

    /// Print version information
    Version,
}

/// A request document for `exec`.
#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default = "default_operation")]
    pub operation: OperationKind,
    pub selections: Vec<Selection>,
}

const fn default_operation() -> OperationKind {
    OperationKind::Query
}

pub async fn run(cli: Cli) -> Result<i32, Box<dyn Error>> {
    match cli.command {
        Commands::Schema { config, output } => print_schema(&config, output.as_deref(), cli.quiet),
        Commands::Check { configs } => Ok(check_configs(&configs, cli.verbose, cli.quiet)),
        Commands::Names { config, list } => print_names(&config, &list),
        Commands::Exec {
            config,
            request,
            seed,
            session,
            sudo,
        } => {
            let mut ctx = match session {
                Some(session) => Context::new().with_session(serde_json::from_str(&session)?),
                None => Context::new(),
            };
            if sudo {
                ctx = ctx.sudo();
            }
            exec(&config, &request, seed.as_deref(), &ctx).await
        }
        Commands::Version => {
            println!("listql {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    }
}

/// Builds a registry over `adapter` from a JSON schema configuration.
pub fn load_registry(
    source: &str,
    adapter: Arc<MemoryAdapter>,
) -> Result<Arc<ListRegistry>, Box<dyn Error>> {
    let config = SchemaConfig::from_json(source)?;
    Ok(ListRegistry::build(config, adapter)?)
}

fn read_registry(
    path: &Path,
    adapter: Arc<MemoryAdapter>,
) -> Result<Arc<ListRegistry>, Box<dyn Error>> {
    debug!(path = %path.display(), "loading schema configuration");
    let source = std::fs::read_to_string(path)?;
    load_registry(&source, adapter)
}

fn print_schema(
    config: &Path,
    output: Option<&Path>,
    quiet: bool,
) -> Result<i32, Box<dyn Error>> {
    let registry = read_registry(config, Arc::new(MemoryAdapter::new()))?;
    let schema = registry.print_schema();
    match output {
        Some(path) => {
            std::fs::write(path, &schema)?;
            if !quiet {
                println!("{} {}", "Generated".green(), path.display());
            }
        }
        None => print!("{schema}"),
    }
    Ok(0)
}

fn check_configs(configs: &[PathBuf], verbose: bool, quiet: bool) -> i32 {
    let mut has_errors = false;

    for config in configs {
        if verbose {
            println!("{} {}", "Checking".blue(), config.display());
        }

        match read_registry(config, Arc::new(MemoryAdapter::new())) {
            Ok(registry) => {
                if verbose {
                    for list in registry.lists() {
                        println!("  {} {}", list.key().bold(), describe_access(list));
                    }
                }
                if !quiet {
                    println!(
                        "{} {} ({} list(s))",
                        "OK".green(),
                        config.display(),
                        registry.len()
                    );
                }
            }
            Err(e) => {
                has_errors = true;
                eprintln!("{} {}", "Error".red().bold(), config.display());
                for line in e.to_string().lines() {
                    eprintln!("  {} {line}", "-->".blue());
                }
            }
        }
    }

    if has_errors {
        1
    } else {
        if !quiet && configs.len() > 1 {
            println!(
                "{} {} configuration(s) checked",
                "Success:".green().bold(),
                configs.len()
            );
        }
        0
    }
}

/// Operations that are not statically denied, e.g. `create read update`.
fn describe_access(list: &List) -> String {
    let allowed: Vec<&str> = [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
    ]
    .into_iter()
    .filter(|op| list.access().may_allow(*op))
    .map(|op| op.as_str())
    .collect();
    if allowed.is_empty() {
        "(no access)".dimmed().to_string()
    } else {
        allowed.join(" ")
    }
}

fn print_names(config: &Path, key: &str) -> Result<i32, Box<dyn Error>> {
    let registry = read_registry(config, Arc::new(MemoryAdapter::new()))?;
    let Some(list) = registry.list(key) else {
        eprintln!("{} Unknown list: {key}", "Error:".red().bold());
        return Ok(1);
    };
    println!("{}", serde_json::to_string_pretty(list.gql_names())?);
    Ok(0)
}

/// Seeds `adapter` from a JSON object of list keys to item arrays.
pub async fn seed_items(adapter: &MemoryAdapter, source: &str) -> Result<usize, Box<dyn Error>> {
    let lists: serde_json::Map<String, Value> = serde_json::from_str(source)?;
    let mut seeded = 0;
    for (key, items) in lists {
        let items: Vec<Item> = serde_json::from_value(items)?;
        seeded += items.len();
        adapter.list(&key).seed(items).await?;
    }
    Ok(seeded)
}

/// Executes a JSON request document.
pub async fn execute_request(
    registry: &ListRegistry,
    source: &str,
    ctx: &Context,
) -> Result<Response, Box<dyn Error>> {
    let request: Request = serde_json::from_str(source)?;
    Ok(registry
        .executor()
        .execute(request.operation, &request.selections, ctx)
        .await)
}

async fn exec(
    config: &Path,
    request: &Path,
    seed: Option<&Path>,
    ctx: &Context,
) -> Result<i32, Box<dyn Error>> {
    let adapter = Arc::new(MemoryAdapter::new());
    let registry = read_registry(config, Arc::clone(&adapter))?;
    if let Some(seed) = seed {
        let seeded = seed_items(&adapter, &std::fs::read_to_string(seed)?).await?;
        debug!(items = seeded, "store seeded");
    }

    let response = execute_request(&registry, &std::fs::read_to_string(request)?, ctx).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(i32::from(!response.is_ok()))
}
