use anyhow::Context;

use tessera_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tessera_observability::init();

    let config = ApiConfig::from_env()
        .inspect_err(|e| tracing::error!(error = %e, "invalid configuration"))
        .context("invalid configuration")?;

    let app = tessera_api::app::build_app_from_config(&config)
        .await
        .context("failed to initialize services")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
