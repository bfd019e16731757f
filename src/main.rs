use clap::Parser;
use dotenvy::dotenv;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use video_summarizer::config::AnalyzerConfig;
use video_summarizer::infrastructure::{agent, storage};
use video_summarizer::services::session::SessionStore;
use video_summarizer::services::worker::SessionSweeper;
use video_summarizer::{AppState, create_app};

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload a video, ask a question, get an AI summary")]
struct Args {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing with EnvFilter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_summarizer=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("🚀 Starting Video Summarizer...");

    let config = AnalyzerConfig::from_env();
    info!(
        "🛡️  Config: Max Size={}MB, Model={}, Web Search={}, Poll={}ms/{}s",
        config.max_file_size / 1024 / 1024,
        config.model_id,
        config.enable_web_search,
        config.poll_interval_ms,
        config.poll_timeout_secs
    );

    // Setup Infrastructure
    let staging = storage::setup_staging(&config)?;
    let workflow = agent::setup_workflow(&config, staging)?;
    let sessions = Arc::new(SessionStore::new());

    let state = AppState {
        config: config.clone(),
        workflow,
        sessions: sessions.clone(),
    };

    // Setup Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Start Session Sweeper
    let sweeper = SessionSweeper::new(sessions, config.session_ttl(), shutdown_rx);
    let sweeper_handle = tokio::spawn(async move {
        sweeper.run().await;
    });

    let app = create_app(state);

    let addr = SocketAddr::new(args.host, args.port);
    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = sweeper_handle.await;
    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
