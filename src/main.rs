use anyhow::Context;
use order_relay::app::App;
use order_relay::config::AppConfig;
use order_relay::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    telemetry::init_tracing(&config.logging)?;

    tracing::info!(
        addr = %config.server.bind_addr(),
        store = ?config.store.backend,
        stream = ?config.stream.backend,
        "starting order-relay"
    );

    if let Err(e) = App::run(config).await {
        tracing::error!(error = %format!("{:#}", e), "order-relay stopped with an error");
        return Err(e);
    }

    tracing::info!("order-relay stopped");
    Ok(())
}
