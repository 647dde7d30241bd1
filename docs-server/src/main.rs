use anyhow::Context;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use tracing::{info, Level};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use docs_server::{config::RunMode, create_app, AppConfig, DocsServer};

/// Document service HTTP server
#[derive(Parser, Debug)]
#[command(name = "docs-server")]
#[command(about = "Document API gated by OpenFGA relationship checks")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Server port (overrides SERVER_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    init_tracing(config.run_mode, args.verbose);

    let port = args.port.unwrap_or(config.port);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        run_mode = ?config.run_mode,
        "Starting document service"
    );

    let server = DocsServer::new(config).context("Failed to initialise server state")?;
    let app = create_app(server);

    let addr = SocketAddr::new(args.host, port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(%addr, "Document service listening");
    info!("Health check available at: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Document service stopped");
    Ok(())
}

fn init_tracing(run_mode: RunMode, verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "docs_server={level},auth_openfga={level},tower_http=info,hyper=info,reqwest=info"
        )
        .into()
    });

    match run_mode {
        RunMode::Debug => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_level(true),
                )
                .init();
        }
        RunMode::Release => {
            // Structured JSON logging for production
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_ansi(false)
                        .json(),
                )
                .init();
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
