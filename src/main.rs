use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledger_core::adapters::PostgresTransactionRepository;
use ledger_core::bus::RedisStreamConsumer;
use ledger_core::cli::{Cli, Commands, DbCommands, EventCommands};
use ledger_core::config::Config;
use ledger_core::domain::SourceKind;
use ledger_core::health::{HealthChecks, PostgresChecker, RedisChecker, SourceChecker};
use ledger_core::ports::TransactionRepository;
use ledger_core::services::{run_consumer, Aggregator, EventIngestor};
use ledger_core::sources::HttpSourceGateway;
use ledger_core::{cli, create_app_with_cors, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        None | Some(Commands::Serve) => serve(config).await,
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&config).await,
        Some(Commands::Config) => cli::handle_config_validate(&config).await,
        Some(Commands::Report { range, no_persist }) => cli::handle_report(&config, range, no_persist).await,
        Some(Commands::Events(EventCommands::Publish { channel, file })) => {
            cli::handle_events_publish(&config, channel, &file).await
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let gateway = HttpSourceGateway::from_urls(
        config.income_service_url.clone(),
        config.expense_service_url.clone(),
        config.investment_service_url.clone(),
        config.source_timeout(),
    )?;
    let repository: Arc<dyn TransactionRepository> = Arc::new(PostgresTransactionRepository::new(pool.clone()));
    let redis_client = redis::Client::open(config.redis_url.as_str())?;

    let mut health = HealthChecks::new()
        .with_critical("postgres", Arc::new(PostgresChecker::new(pool.clone())))
        .with_checker("redis", Arc::new(RedisChecker::new(redis_client.clone())));
    for kind in SourceKind::ALL {
        health = health.with_checker(
            &format!("{}_service", kind),
            Arc::new(SourceChecker::new(gateway.client(kind).clone())),
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingestor = EventIngestor::new(repository.clone());
    let mut consumers: Vec<JoinHandle<()>> = Vec::new();
    for kind in SourceKind::ALL {
        let stream = RedisStreamConsumer::connect(
            &redis_client,
            kind,
            config.channel(kind).to_string(),
            config.consumer_group.clone(),
            config.consumer_name.clone(),
        )
        .await?;
        tracing::info!(channel = %kind, stream = %stream.stream_key(), "Subscribed to event channel");
        consumers.push(tokio::spawn(run_consumer(ingestor.clone(), stream, shutdown_rx.clone())));
    }

    let state = AppState {
        aggregator: Arc::new(Aggregator::new(Arc::new(gateway), repository.clone())),
        repository,
        health: Arc::new(health),
    };
    let app = create_app_with_cors(state, &config.allowed_origins());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, draining event consumers");
    let _ = shutdown_tx.send(true);
    for handle in consumers {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Event consumer task failed");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
