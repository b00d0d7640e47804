use anyhow::Context;

use relief_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    relief_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    if !config.llm.enabled() {
        tracing::warn!("RELIEF_LLM_TOKEN not set; recommendations will use the requirement estimate only");
    }

    // Loading the embedding model reads (and may download) weights; keep it off the runtime threads.
    let app = tokio::task::spawn_blocking({
        let config = config.clone();
        move || relief_api::app::build_app(&config)
    })
    .await
    .context("service startup task failed")?
    .context("failed to start relief services")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
