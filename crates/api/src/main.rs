use anyhow::Context;

use ledgerforge_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    ledgerforge_observability::init(&config.log).context("failed to initialize tracing")?;

    let app = ledgerforge_api::app::build_app(&config).context("failed to start ledger services")?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
