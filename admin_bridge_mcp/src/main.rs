use admin_bridge_integrations::{DatabricksRestClient, WorkspaceApi};
use admin_bridge_mcp::config::{ConfigOverrides, ServerConfig};
use admin_bridge_mcp::paths;
use admin_bridge_mcp::providers::{CombinedProvider, Domain};
use clap::{Parser, Subcommand};
use eyre::Result;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "admin_bridge_mcp")]
#[command(about = "Admin Bridge MCP Server", long_about = None)]
struct Cli {
    /// Full config as JSON (mutually exclusive with other flags)
    #[arg(
        long,
        conflicts_with_all = [
            "profile",
            "warehouse_id",
            "usage_table",
            "budget_table",
            "audit_table",
            "domains",
        ]
    )]
    json: Option<String>,

    /// Profile in ~/.databrickscfg
    #[arg(long)]
    profile: Option<String>,

    /// SQL warehouse for usage, budget and audit queries
    #[arg(long = "warehouse-id")]
    warehouse_id: Option<String>,

    #[arg(long = "usage-table")]
    usage_table: Option<String>,

    #[arg(long = "budget-table")]
    budget_table: Option<String>,

    #[arg(long = "audit-table")]
    audit_table: Option<String>,

    /// Comma-separated domains to expose, e.g. jobs,usage
    #[arg(long, value_delimiter = ',')]
    domains: Option<Vec<String>>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check credentials, warehouse access and configured tables
    Check,
}

fn build_overrides_from_cli(cli: &Cli) -> Result<ConfigOverrides> {
    let enabled_domains = match &cli.domains {
        Some(raw) => Some(
            raw.iter()
                .map(|d| Domain::parse(d))
                .collect::<Result<Vec<_>>>()?,
        ),
        None => None,
    };

    Ok(ConfigOverrides {
        profile: cli.profile.clone(),
        warehouse_id: cli.warehouse_id.clone(),
        usage_table: cli.usage_table.clone(),
        budget_table: cli.budget_table.clone(),
        audit_table: cli.audit_table.clone(),
        enabled_domains,
    })
}

fn load_config_with_overrides(cli: &Cli) -> Result<ServerConfig> {
    if let Some(json_str) = &cli.json {
        let config: ServerConfig = serde_json::from_str(json_str)
            .map_err(|e| eyre::eyre!("Failed to parse --json config: {}", e))?;
        return Ok(config);
    }

    let base_config = ServerConfig::load_from_dir()?;
    let overrides = build_overrides_from_cli(cli)?;
    Ok(base_config.apply_override(overrides))
}

async fn check_environment(config: &ServerConfig) -> Result<()> {
    println!("🔍 Checking workspace configuration...\n");

    print!("  Databricks credentials... ");
    let client = match DatabricksRestClient::new(&config.workspace) {
        Ok(client) => {
            println!("✓");
            client
        }
        Err(e) => {
            println!("✗\n    Error: {}", e);
            return Err(eyre::eyre!("Environment check failed"));
        }
    };

    let mut all_passed = true;

    print!("  SQL warehouses... ");
    match client.list_warehouses().await {
        Ok(warehouses) => {
            let running = warehouses.iter().filter(|w| w.is_running()).count();
            println!("✓ ({} total, {} running)", warehouses.len(), running);
            if let Some(id) = &config.workspace.warehouse_id {
                if !warehouses.iter().any(|w| &w.id == id) {
                    println!("    ⚠ configured warehouse {} not found", id);
                    all_passed = false;
                }
            }
        }
        Err(e) => {
            println!("✗\n    Error: {}", e);
            all_passed = false;
        }
    }

    let tables = [
        ("usage", &config.workspace.usage_table, Domain::Usage),
        ("budget", &config.workspace.budget_table, Domain::Usage),
        ("audit", &config.workspace.audit_table, Domain::Audit),
    ];
    for (label, table, domain) in tables {
        if !config.is_enabled(domain) {
            continue;
        }
        print!("  {} table {}... ", label, table);
        match client.table_exists(table).await {
            Ok(true) => println!("✓"),
            // missing tables only degrade the tools that read them
            Ok(false) => println!("⚠ not found"),
            Err(e) => {
                println!("✗\n    Error: {}", e);
                all_passed = false;
            }
        }
    }

    println!();

    if all_passed {
        println!("✅ All checks passed!");
        Ok(())
    } else {
        println!("❌ Some checks failed. Please review the errors above.");
        Err(eyre::eyre!("Environment check failed"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config_with_overrides(&cli)?;

    match cli.command {
        Some(Commands::Check) => check_environment(&config).await,
        None => run_server(config).await,
    }
}

fn init_tracing() -> Result<Option<String>> {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    }

    let session_id = Uuid::new_v4().to_string();
    let session_short = &session_id[..8];

    let log_dir = paths::session_log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(format!("session-{}.log", session_short));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();

    Ok(Some(log_path.display().to_string()))
}

async fn run_server(config: ServerConfig) -> Result<()> {
    let log_path = init_tracing()?;

    let client = Arc::new(DatabricksRestClient::new(&config.workspace)?);
    let provider = CombinedProvider::new(&config, client)?;

    let domains: Vec<_> = provider
        .enabled_domains()
        .iter()
        .map(|d| d.label())
        .collect();
    tracing::info!(domains = ?domains, "starting admin bridge");

    eprintln!("🔧 Admin Bridge MCP Server v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Domains: {}", domains.join(", "));
    if let Some(path) = &log_path {
        eprintln!("   Session log: {}", path);
    }

    let service = provider.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
