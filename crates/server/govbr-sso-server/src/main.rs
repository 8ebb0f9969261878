use anyhow::Context;
use govbr_sso_server::{Config, build_state, create_router};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    init_tracing(&config);

    info!("Starting Gov.br SSO server");
    info!("Provider: {}", config.provider.url_provider);
    info!("Callback URL: {}", config.provider.redirect_uri);

    let state = build_state(&config)?;

    let sessions = state.sessions.clone();
    let interval = Duration::from_secs(config.session.cleanup_interval_seconds);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = sessions.cleanup_expired();
            if removed > 0 {
                debug!("Removed {} expired sessions", removed);
            }
        }
    });

    let app = create_router(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(config.log_filter()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.logging.target);

    match config.logging.format.to_lowercase().as_str() {
        "compact" => builder.compact().init(),
        _ => builder.pretty().init(),
    }
}
