pub mod agent;
pub mod api;
pub mod network;
pub mod utils;

use actix_web::{dev::ServerHandle, web, App, HttpServer};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{
    agent::AgentCommunicator,
    network::{CommunicationManager, EngineFactory},
    utils::{
        config::Config,
        error::{GatewayError, Result},
    },
};

pub struct Application {
    config: Arc<Config>,
    manager: Arc<CommunicationManager>,
    server: Mutex<Option<ServerHandle>>,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl Application {
    pub fn new(config: Config, engines: Arc<dyn EngineFactory>, agent: Arc<dyn AgentCommunicator>) -> Self {
        info!("Initializing communication manager...");
        let manager = Arc::new(CommunicationManager::new(engines, agent, config.session_settings()));

        Self {
            config: Arc::new(config),
            manager,
            server: Mutex::new(None),
            maintenance: Mutex::new(None),
        }
    }

    pub fn manager(&self) -> Arc<CommunicationManager> {
        self.manager.clone()
    }

    pub async fn start(&self) -> Result<()> {
        info!("Starting session maintenance...");
        let maintenance = self.manager.start_maintenance(self.config.get_sweep_interval());
        *self.maintenance.lock() = Some(maintenance);

        info!("Starting API server...");
        self.start_api_server()?;

        info!("Application successfully started");
        Ok(())
    }

    fn start_api_server(&self) -> Result<()> {
        let manager = web::Data::from(self.manager.clone());

        let server = HttpServer::new(move || App::new().app_data(manager.clone()).configure(api::configure))
            .bind((self.config.node.host.as_str(), self.config.node.port))
            .map_err(|e| GatewayError::Config(format!("Failed to bind API server: {}", e)))?
            .run();

        *self.server.lock() = Some(server.handle());
        actix_web::rt::spawn(async move {
            if let Err(e) = server.await {
                error!("API server stopped with error: {}", e);
            }
        });

        info!(
            "API server listening on {}:{}",
            self.config.node.host, self.config.node.port
        );
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down application...");

        let server = self.server.lock().take();
        if let Some(server) = server {
            server.stop(true).await;
        }

        let maintenance = self.maintenance.lock().take();
        if let Some(maintenance) = maintenance {
            maintenance.abort();
        }

        info!("Closing connections...");
        self.manager.shutdown().await;

        info!("Application shutdown complete");
        Ok(())
    }
}
