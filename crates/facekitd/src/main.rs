use anyhow::{Context, Result};
use facekitd::{AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("facekitd starting");

    let config = Config::load().context("loading configuration")?;
    tracing::info!(
        listen = %config.listen_addr,
        db = %config.db_path.display(),
        model = %config.gemini.model,
        match_threshold = config.match_threshold,
        "configuration loaded"
    );

    let state = AppState::from_config(&config)
        .await
        .context("initializing state")?;

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "facekitd ready");

    facekitd::serve(listener, state, config.max_upload_bytes, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    tracing::info!("facekitd shutting down");
    Ok(())
}
