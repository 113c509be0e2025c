use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use oppdesk_core::{Filter, SeedBundle};
use oppdesk_services::{CsvQuoting, OpportunityService, ServiceConfig};
use oppdesk_storage::{PgOpportunityStore, StoreConfig, WorkspaceSelector};
use oppdesk_web::WebConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "oppdesk")]
#[command(about = "Opportunity export, filtered search and hints service")]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,
    /// Workspace to serve; defaults to the first one created
    #[arg(long, env = "OPPDESK_WORKSPACE_ID", global = true)]
    workspace_id: Option<String>,
    /// CSV export quoting: legacy (unescaped) or rfc4180
    #[arg(long, env = "OPPDESK_CSV_QUOTING", global = true, default_value = "legacy")]
    csv_quoting: CsvQuoting,
    #[arg(long, env = "OPPDESK_LOG_FORMAT", global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the HTTP API (default). Unset flags fall back to OPPDESK_BIND_ADDRESS / OPPDESK_WEB_PORT
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Write the CSV export to stdout or a file
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print field hints as JSON
    Hints,
    /// Run a filtered search; filters are a JSON array of {id, type, value}
    Search {
        #[arg(long, default_value = "[]")]
        filters: String,
    },
    /// Create tables if needed and load a seed bundle
    Seed {
        #[arg(long, default_value = "fixtures/seed.json")]
        fixture: PathBuf,
    },
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        database_url,
        workspace_id,
        csv_quoting,
        log_format,
        command,
    } = Cli::parse();
    init_logging(log_format);

    let mut store_config = StoreConfig::from_env();
    if let Some(url) = database_url {
        store_config.database_url = url;
    }
    let store = PgOpportunityStore::connect(&store_config)
        .await
        .context("connecting to opportunity database")?;
    let service = OpportunityService::new(
        Arc::new(store.clone()),
        ServiceConfig {
            workspace: WorkspaceSelector::from_optional_id(workspace_id),
            csv_quoting,
        },
    );

    let command = command.unwrap_or(Commands::Serve { bind: None, port: None });

    match command {
        Commands::Serve { bind, port } => {
            oppdesk_web::serve(service, &web_config(bind, port)).await?;
        }
        Commands::Export { output } => {
            let csv = service.export_csv().await?;
            write_output(output.as_deref(), &csv)?;
        }
        Commands::Hints => {
            let hints = service.hints().await?;
            println!("{}", serde_json::to_string_pretty(&hints)?);
        }
        Commands::Search { filters } => {
            let filters = parse_filters(&filters)?;
            let opportunities = service.filtered_search(&filters).await?;
            println!("{}", serde_json::to_string_pretty(&opportunities)?);
        }
        Commands::Seed { fixture } => {
            let text = std::fs::read_to_string(&fixture)
                .with_context(|| format!("reading {}", fixture.display()))?;
            let bundle = SeedBundle::from_json_str(&text)?;
            store.ensure_schema().await?;
            let summary = store.seed(&bundle).await?;
            info!(
                workspace_id = %summary.workspace_id,
                opportunities = summary.opportunities,
                "seed complete"
            );
            println!(
                "seed complete: workspace={} opportunities={}",
                summary.workspace_id, summary.opportunities
            );
        }
    }

    Ok(())
}

fn web_config(bind: Option<String>, port: Option<u16>) -> WebConfig {
    let mut config = WebConfig::from_env();
    if let Some(bind) = bind {
        config.bind_address = bind;
    }
    if let Some(port) = port {
        config.port = port;
    }
    config
}

fn parse_filters(raw: &str) -> Result<Vec<Filter>> {
    serde_json::from_str(raw).context("parsing --filters as a JSON array of {id, type, value}")
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), bytes = text.len(), "wrote export");
        }
        None => println!("{text}"),
    }
    Ok(())
}
