//! influxdb-mcp CLI Entry Point
//!
//! Subcommands:
//! - `databases` - list, create, update, delete databases (buckets on Cloud Serverless)
//! - `schemas` - measurement schemas (Cloud Serverless only)
//! - `tokens` - database tokens (Cloud Dedicated, Cloud Serverless)
//! - `health` - check the data plane host
//! - `connect` / `connections` - save and list named connection profiles
//! - `mcp` - MCP server mode (hidden, for AI agent integration)
//!
//! All output to stdout is JSON-only. Logs go to stderr, filtered by `RUST_LOG`.

use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use influxdb_mcp::config::{
    list_connections, resolve_connection, save_connection, ConfigLocation, ConnectionConfig,
    StoredConnection,
};
use influxdb_mcp::dispatch::{DatabaseService, HealthService, SchemaService, TokenService};
use influxdb_mcp::engine::{
    CreateTokenRequest, DatabaseConfig, SchemaColumn, SchemaType, TokenAction, TokenPermission,
};
use influxdb_mcp::{ErrorEnvelope, InfluxError, Metadata, ProductType, SuccessEnvelope};

/// Uniform database management for every InfluxDB product
#[derive(Parser)]
#[command(name = "influxdb-mcp")]
#[command(about = "Database, schema and token management across InfluxDB products")]
#[command(version)]
struct Cli {
    /// Saved connection profile to use. Without it the INFLUX_DB_* environment is read.
    #[arg(long, global = true)]
    connection: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage databases
    Databases {
        #[command(subcommand)]
        action: DatabaseCommand,
    },

    /// Manage measurement schemas (Cloud Serverless)
    Schemas {
        #[command(subcommand)]
        action: SchemaCommand,
    },

    /// Manage database tokens (Cloud Dedicated, Cloud Serverless)
    Tokens {
        #[command(subcommand)]
        action: TokenCommand,
    },

    /// Check that the data plane host is reachable and healthy
    Health,

    /// Save a named connection profile
    Connect(ConnectArgs),

    /// List saved connection profiles
    Connections,

    /// Start MCP server (hidden from help, for AI agent integration)
    #[command(hide = true)]
    Mcp,
}

#[derive(Subcommand)]
enum DatabaseCommand {
    List,
    Create {
        name: String,
        #[command(flatten)]
        options: DatabaseOptions,
    },
    Update {
        name: String,
        #[command(flatten)]
        options: DatabaseOptions,
    },
    Delete {
        name: String,
    },
}

#[derive(Args)]
struct DatabaseOptions {
    /// Maximum tables (Cloud Dedicated, Clustered)
    #[arg(long)]
    max_tables: Option<u64>,

    /// Maximum columns per table (Cloud Dedicated, Clustered)
    #[arg(long)]
    max_columns_per_table: Option<u64>,

    /// Retention period in nanoseconds
    #[arg(long)]
    retention_period: Option<u64>,

    /// Bucket description (Cloud Serverless)
    #[arg(long)]
    description: Option<String>,

    /// Bucket schema type, implicit or explicit (Cloud Serverless, create only)
    #[arg(long, value_parser = parse_schema_type)]
    schema_type: Option<SchemaType>,
}

impl From<DatabaseOptions> for DatabaseConfig {
    fn from(options: DatabaseOptions) -> Self {
        Self {
            max_tables: options.max_tables,
            max_columns_per_table: options.max_columns_per_table,
            retention_period: options.retention_period,
            description: options.description,
            schema_type: options.schema_type,
        }
    }
}

#[derive(Subcommand)]
enum SchemaCommand {
    List {
        bucket: String,
    },
    Get {
        bucket: String,
        measurement: String,
    },
    Create {
        bucket: String,
        measurement: String,
        /// Columns as a JSON array of {"name", "type", "dataType"?}
        #[arg(long)]
        columns: String,
    },
    /// Add columns; pass the complete column set including existing columns
    Update {
        bucket: String,
        measurement: String,
        #[arg(long)]
        columns: String,
    },
}

#[derive(Subcommand)]
enum TokenCommand {
    List,
    Create {
        #[arg(long)]
        description: String,
        /// Database the token may read (repeatable)
        #[arg(long = "read")]
        read: Vec<String>,
        /// Database the token may write (repeatable)
        #[arg(long = "write")]
        write: Vec<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Args)]
struct ConnectArgs {
    /// Profile name
    name: String,

    /// Product type: core, enterprise, cloud-dedicated, clustered, cloud-serverless
    #[arg(long = "type")]
    product: ProductType,

    #[arg(long)]
    url: Option<String>,

    /// Data token (prefer --token-env)
    #[arg(long)]
    token: Option<String>,

    /// Environment variable holding the data token
    #[arg(long)]
    token_env: Option<String>,

    /// Management token (prefer --management-token-env)
    #[arg(long)]
    management_token: Option<String>,

    /// Environment variable holding the management token
    #[arg(long)]
    management_token_env: Option<String>,

    #[arg(long)]
    cluster_id: Option<String>,

    #[arg(long)]
    account_id: Option<String>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Where to save the profile
    #[arg(long, value_enum, default_value_t = SaveLocation::Local)]
    save: SaveLocation,
}

#[derive(Clone, Copy, ValueEnum)]
enum SaveLocation {
    /// .influxdb-mcp/config.json in the current directory
    Local,
    /// influxdb-mcp/connections.json in the user config directory
    Global,
}

fn parse_schema_type(s: &str) -> Result<SchemaType, String> {
    SchemaType::parse(s).ok_or_else(|| format!("expected 'implicit' or 'explicit', got '{s}'"))
}

fn parse_columns(s: &str) -> Result<Vec<SchemaColumn>, InfluxError> {
    serde_json::from_str(s)
        .map_err(|e| InfluxError::invalid_input(format!("Invalid --columns JSON: {e}")))
}

/// Successful command output before it is wrapped in an envelope
struct Outcome {
    data: Value,
    items: Option<usize>,
}

impl Outcome {
    fn item(data: impl Serialize) -> Result<Self, InfluxError> {
        Ok(Self {
            data: to_value(data)?,
            items: None,
        })
    }

    fn list<T: Serialize>(items: Vec<T>) -> Result<Self, InfluxError> {
        let count = items.len();
        Ok(Self {
            data: to_value(items)?,
            items: Some(count),
        })
    }
}

fn to_value(data: impl Serialize) -> Result<Value, InfluxError> {
    serde_json::to_value(data)
        .map_err(|e| InfluxError::invalid_input(format!("Could not serialize result: {e}")))
}

/// Configuration for a command: a named profile, else the environment, else the default profile
fn load_config(connection: Option<&str>) -> Result<ConnectionConfig, InfluxError> {
    match connection {
        Some(name) => resolve_connection(Some(name)),
        None => ConnectionConfig::from_env()
            .or_else(|env_err| resolve_connection(None).map_err(|_| env_err)),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        let envelope = ErrorEnvelope::new(
            "",
            "",
            influxdb_mcp::ErrorInfo::new(
                "NO_SUBCOMMAND",
                "No subcommand provided. Use --help to see available commands.",
            ),
        );
        return print_json(&envelope, ExitCode::FAILURE);
    };

    match command {
        Commands::Connect(args) => finish("", "connect", Instant::now(), connect(args)),
        Commands::Connections => finish(
            "",
            "connections",
            Instant::now(),
            list_connections().and_then(Outcome::list),
        ),
        Commands::Mcp => {
            let config = match load_config(cli.connection.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    return print_json(
                        &ErrorEnvelope::from_error("", "mcp", &e),
                        ExitCode::FAILURE,
                    )
                }
            };
            match influxdb_mcp::mcp::serve(config).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, "mcp server stopped");
                    ExitCode::FAILURE
                }
            }
        }
        command => {
            let name = command_name(&command);
            let config = match load_config(cli.connection.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    return print_json(&ErrorEnvelope::from_error("", name, &e), ExitCode::FAILURE)
                }
            };
            let start = Instant::now();
            let result = run(&config, command).await;
            finish(config.product.as_str(), name, start, result)
        }
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Databases { action } => match action {
            DatabaseCommand::List => "list_databases",
            DatabaseCommand::Create { .. } => "create_database",
            DatabaseCommand::Update { .. } => "update_database",
            DatabaseCommand::Delete { .. } => "delete_database",
        },
        Commands::Schemas { action } => match action {
            SchemaCommand::List { .. } => "list_measurement_schemas",
            SchemaCommand::Get { .. } => "get_measurement_schema",
            SchemaCommand::Create { .. } => "create_measurement_schema",
            SchemaCommand::Update { .. } => "update_measurement_schema",
        },
        Commands::Tokens { action } => match action {
            TokenCommand::List => "list_tokens",
            TokenCommand::Create { .. } => "create_token",
            TokenCommand::Delete { .. } => "delete_token",
        },
        Commands::Health => "health_check",
        Commands::Connect(_) => "connect",
        Commands::Connections => "connections",
        Commands::Mcp => "mcp",
    }
}

async fn run(config: &ConnectionConfig, command: Commands) -> Result<Outcome, InfluxError> {
    match command {
        Commands::Databases { action } => {
            let service = DatabaseService::new(config);
            match action {
                DatabaseCommand::List => Outcome::list(service.list().await?),
                DatabaseCommand::Create { name, options } => {
                    Outcome::item(service.create(&name, &options.into()).await?)
                }
                DatabaseCommand::Update { name, options } => {
                    Outcome::item(service.update(&name, &options.into()).await?)
                }
                DatabaseCommand::Delete { name } => {
                    service.delete(&name).await?;
                    Outcome::item(json!({ "deleted": name }))
                }
            }
        }
        Commands::Schemas { action } => {
            let service = SchemaService::new(config);
            match action {
                SchemaCommand::List { bucket } => Outcome::list(service.list(&bucket).await?),
                SchemaCommand::Get {
                    bucket,
                    measurement,
                } => {
                    Outcome::item(service.get(&bucket, &measurement).await?)
                }
                SchemaCommand::Create {
                    bucket,
                    measurement,
                    columns,
                } => {
                    let columns = parse_columns(&columns)?;
                    Outcome::item(service.create(&bucket, &measurement, &columns).await?)
                }
                SchemaCommand::Update {
                    bucket,
                    measurement,
                    columns,
                } => {
                    let columns = parse_columns(&columns)?;
                    Outcome::item(service.update(&bucket, &measurement, &columns).await?)
                }
            }
        }
        Commands::Tokens { action } => {
            let service = TokenService::new(config);
            match action {
                TokenCommand::List => Outcome::list(service.list().await?),
                TokenCommand::Create {
                    description,
                    read,
                    write,
                } => {
                    let permissions = read
                        .into_iter()
                        .map(|database| TokenPermission {
                            action: TokenAction::Read,
                            database,
                        })
                        .chain(write.into_iter().map(|database| TokenPermission {
                            action: TokenAction::Write,
                            database,
                        }))
                        .collect();
                    let request = CreateTokenRequest {
                        description,
                        permissions,
                    };
                    Outcome::item(service.create(&request).await?)
                }
                TokenCommand::Delete { id } => {
                    service.delete(&id).await?;
                    Outcome::item(json!({ "deleted": id }))
                }
            }
        }
        Commands::Health => Outcome::item(HealthService::new(config).check().await?),
        Commands::Connect(_) | Commands::Connections | Commands::Mcp => Err(
            InfluxError::invalid_input("This command does not run against a connection"),
        ),
    }
}

fn connect(args: ConnectArgs) -> Result<Outcome, InfluxError> {
    let config = ConnectionConfig {
        url: args.url,
        token: args.token,
        management_token: args.management_token,
        cluster_id: args.cluster_id,
        account_id: args.account_id,
        timeout_ms: args.timeout_ms,
        ..ConnectionConfig::new(args.product)
    };
    let stored = StoredConnection {
        config,
        token_env: args.token_env,
        management_token_env: args.management_token_env,
    };
    // Fail now rather than on first use if a referenced variable is unset
    stored.resolve()?;

    let location = match args.save {
        SaveLocation::Local => ConfigLocation::Local,
        SaveLocation::Global => ConfigLocation::Global,
    };
    let path = save_connection(Some(args.name.clone()), stored, location)?;

    Outcome::item(json!({
        "connection": args.name,
        "product": args.product,
        "saved_to": path.display().to_string(),
    }))
}

fn finish(
    product: &str,
    command: &str,
    start: Instant,
    result: Result<Outcome, InfluxError>,
) -> ExitCode {
    match result {
        Ok(outcome) => {
            let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            let meta = outcome.items.map_or_else(
                || Metadata::new(elapsed),
                |count| Metadata::with_items(elapsed, count),
            );
            print_json(
                &SuccessEnvelope::new(product, command, outcome.data, meta),
                ExitCode::SUCCESS,
            )
        }
        Err(e) => print_json(
            &ErrorEnvelope::from_error(product, command, &e),
            ExitCode::FAILURE,
        ),
    }
}

fn print_json(value: &impl Serialize, code: ExitCode) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            code
        }
        Err(e) => {
            tracing::error!(error = %e, "could not serialize output");
            ExitCode::FAILURE
        }
    }
}
