use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::adapters::{InMemoryTransactionRepository, PostgresTransactionRepository};
use crate::bus::RedisStreamPublisher;
use crate::config::Config;
use crate::domain::{ReportRange, SourceKind, SourceRecord};
use crate::ports::TransactionRepository;
use crate::services::Aggregator;
use crate::sources::HttpSourceGateway;

#[derive(Parser)]
#[command(name = "ledger-core")]
#[command(about = "Ledger Core - Personal Finance Transaction Aggregator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server and event consumers (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,

    /// Build a dashboard report once and print it as JSON
    Report {
        /// Report range in days
        #[arg(short, long, default_value_t = 30)]
        range: u32,

        /// Aggregate into an in-memory store instead of the database (DATABASE_URL not needed)
        #[arg(long)]
        no_persist: bool,
    },

    /// Event channel commands
    #[command(subcommand)]
    Events(EventCommands),
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum EventCommands {
    /// Publish the JSON record in FILE to a channel
    Publish {
        /// Channel to publish on (income, expense, investment)
        #[arg(short, long)]
        channel: SourceKind,

        /// File holding one JSON record
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
    },
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");
    config.validate()?;

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Redis URL: {}", mask_password(&config.redis_url));
    for kind in SourceKind::ALL {
        println!(
            "  {:<10} source: {} (channel: {})",
            kind.as_str(),
            config.source_url(kind),
            config.channel(kind)
        );
    }
    println!("  Source timeout: {}s", config.source_timeout_secs);
    println!("  Consumer: {}/{}", config.consumer_group, config.consumer_name);

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    let pool = crate::db::create_pool(config).await?;
    let report = crate::startup::validate_environment(config, &pool).await?;
    report.print();
    if !report.is_valid() {
        anyhow::bail!("Startup validation failed");
    }

    Ok(())
}

pub async fn handle_report(config: &Config, range: u32, no_persist: bool) -> anyhow::Result<()> {
    let gateway = Arc::new(HttpSourceGateway::from_urls(
        config.income_service_url.clone(),
        config.expense_service_url.clone(),
        config.investment_service_url.clone(),
        config.source_timeout(),
    )?);

    let repository: Arc<dyn TransactionRepository> = if no_persist {
        Arc::new(InMemoryTransactionRepository::new())
    } else {
        let pool = crate::db::create_pool(config).await?;
        Arc::new(PostgresTransactionRepository::new(pool))
    };

    let aggregator = Aggregator::new(gateway, repository);
    let report = aggregator.build_report(ReportRange(range)).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

pub async fn handle_events_publish(config: &Config, channel: SourceKind, file: &Path) -> anyhow::Result<()> {
    let body = tokio::fs::read(file).await?;

    // Reject anything the consumer would discard
    SourceRecord::from_json(channel, &body)
        .map_err(|e| anyhow::anyhow!("{} is not a valid {} record: {}", file.display(), channel, e))?;

    let client = redis::Client::open(config.redis_url.as_str())?;
    let publisher = RedisStreamPublisher::connect(&client).await?;
    let payload = String::from_utf8(body)?;
    let id = publisher.publish_raw(config.channel(channel), payload.trim()).await?;

    tracing::info!(channel = %channel, id = %id, "Event published");
    println!("✓ Published {} event {}", channel, id);

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user_start = slash_pos + 2;
                let user = &url[user_start..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
