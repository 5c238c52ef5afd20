use advisor_gateway::config::GatewayConfig;
use advisor_gateway::services::metrics::init_metrics;
use advisor_gateway::startup::Application;
use anyhow::Context;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = GatewayConfig::load().context("Failed to load configuration")?;

    init_tracing(
        "advisor-gateway",
        &config.observability.log_level,
        config.observability.otlp_endpoint.as_deref(),
    )?;
    init_metrics().context("Failed to initialize metrics")?;

    tracing::info!(
        provider = config.provider.kind.as_str(),
        model = %config.provider.model,
        "Starting advisor gateway"
    );

    let application = Application::build(config)
        .await
        .context("Failed to build application")?;
    application.run_until_stopped().await?;

    Ok(())
}
