use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kompagnon::identity::migrations::migrator;
use kompagnon::identity::{PasswordService, seed_demo_users};
use kompagnon::{AppConfig, AppState, Database, DomainTransaction, build_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kompagnon")]
#[command(about = "Kompagnon identity API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Runs the HTTP API (default)
    Serve {
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// Insert the demo accounts after migrating
        #[arg(long)]
        seed: bool,
    },
    /// Lists the schema migrations in application order
    Migrations,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve {
        bind: None,
        seed: false,
    }) {
        Command::Serve { bind, seed } => serve(bind, seed).await,
        Command::Migrations => {
            for name in migrator().plan() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

async fn serve(bind: Option<SocketAddr>, seed: bool) -> Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    let bind_addr = bind.unwrap_or(config.bind_addr);

    let db = Arc::new(Database::new(config.database.clone()));
    let applied = migrator()
        .run(&db)
        .await
        .context("failed to run migrations")?;
    info!(database = %db.name(), applied = applied.len(), "schema up to date");

    let domain = DomainTransaction::new(db.clone());
    if seed {
        let seeded = seed_demo_users(&domain, &PasswordService::new(config.password_hash_rounds))
            .await
            .context("failed to seed demo users")?;
        info!(count = seeded.len(), "demo users seeded");
    }

    let identity = Arc::new(config.identity_service(domain));
    let app = build_router(AppState::new(identity));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!(bind_addr = %bind_addr, base_url = %config.base_url, "kompagnon API started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!(stats = %db.stats(), "server stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("kompagnon=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install ctrl+c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install sigterm handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
