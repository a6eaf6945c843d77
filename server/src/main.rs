use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use tabsync_server::config::{generate_config_template, Config};
use tabsync_server::state::{AppState, Heartbeat};
use tabsync_server::{db, flagged, routes};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("tabsync_server=info"))?;
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }

    tracing::info!("tabsync server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    if !config.flagged_urls.is_empty() {
        let seeded = flagged::store::seed(&db, &config.flagged_urls)?;
        tracing::info!(
            configured = config.flagged_urls.len(),
            added = seeded,
            "Seeded flagged URLs from config"
        );
    }

    let heartbeat = Heartbeat::from_config(&config);
    tracing::info!(
        ping_interval_secs = heartbeat.ping_interval.as_secs(),
        pong_timeout_secs = heartbeat.pong_timeout.as_secs(),
        "WebSocket heartbeat configured"
    );

    let app_state = AppState::new(db, heartbeat);
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
