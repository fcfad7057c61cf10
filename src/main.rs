use object_gateway::{
    agent::HttpAgentCommunicator,
    network::MemoryHub,
    utils::{config::Config, logging},
    Application,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::new()?;
    let _guard = logging::init(&config.node);

    info!("Starting Object Gateway v{}", env!("CARGO_PKG_VERSION"));

    let agent = HttpAgentCommunicator::new(&config.agent.url, config.get_agent_timeout()).map_err(|e| {
        error!("Failed to create agent client: {}", e);
        e
    })?;

    let app = Application::new(config, Arc::new(MemoryHub::new()), Arc::new(agent));

    app.start().await.map_err(|e| {
        error!("Failed to start application: {}", e);
        e
    })?;

    // Wait for shutdown signal
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
    } else {
        info!("Received shutdown signal");
    }

    if let Err(e) = app.shutdown().await {
        error!("Error during shutdown: {}", e);
    }

    Ok(())
}
