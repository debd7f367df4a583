use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use larder_lib::server::auth::JwtVerifier;
use larder_lib::{db, logging, migrate, server, AppState};

#[derive(Parser, Debug)]
#[command(name = "larder", about = "Shared-household pantry account service")]
struct Cli {
    /// SQLite database path. Defaults to the platform data directory.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: SocketAddr,

    /// HS256 secret shared with the external auth provider.
    #[arg(long, env = "LARDER_JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Directory for rolling JSON log files. Stdout only when unset.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("larder")
        .join("larder.sqlite3")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log_dir.as_deref())?;

    let db_path = cli.db.unwrap_or_else(default_db_path);
    let pool = db::open_sqlite_pool(&db_path).await?;
    migrate::apply_migrations(&pool).await?;

    let verifier = Arc::new(JwtVerifier::new(&cli.jwt_secret).map_err(anyhow::Error::from)?);
    let state = AppState::new(pool, verifier);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    tracing::info!(target = "larder", event = "server_listening", addr = %cli.bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!(target = "larder", event = "shutdown_requested");
}
