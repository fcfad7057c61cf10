// src/network/manager.rs
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::descriptor::ConnectionDescriptor;
use super::engine::EngineFactory;
use super::message::{NetworkMessageResponse, RequestOperation, ATTR_EID};
use crate::agent::AgentCommunicator;
use crate::utils::config::SessionSettings;
use crate::utils::error::{GatewayError, Result};

/// Registry of the sessions served by this gateway, keyed by object ID.
pub struct CommunicationManager {
    descriptors: RwLock<HashMap<String, Arc<ConnectionDescriptor>>>,
    engines: Arc<dyn EngineFactory>,
    agent: Arc<dyn AgentCommunicator>,
    settings: SessionSettings,
}

impl CommunicationManager {
    pub fn new(
        engines: Arc<dyn EngineFactory>,
        agent: Arc<dyn AgentCommunicator>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
            engines,
            agent,
            settings,
        }
    }

    /// Returns the session of `object_id`, creating and connecting it on first use.
    pub async fn establish_connection(&self, object_id: &str, password: &str) -> Result<Arc<ConnectionDescriptor>> {
        let (descriptor, created) = {
            let mut descriptors = self.descriptors.write();
            match descriptors.get(object_id) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let descriptor = ConnectionDescriptor::new(
                        object_id,
                        password,
                        self.engines.create(object_id),
                        self.agent.clone(),
                        self.settings,
                    );
                    descriptors.insert(object_id.to_string(), descriptor.clone());
                    (descriptor, true)
                }
            }
        };

        if !created {
            if !descriptor.verify_password(password) {
                warn!("Object '{}' presented a wrong password", object_id);
                return Err(GatewayError::Unauthorized(object_id.to_string()));
            }
            if !descriptor.is_connected().await && !descriptor.connect().await {
                return Err(GatewayError::ServiceUnavailable(format!(
                    "Object '{}' could not reconnect",
                    object_id
                )));
            }
            return Ok(descriptor);
        }

        if !descriptor.connect().await {
            self.evict(object_id, &descriptor);
            return Err(GatewayError::ServiceUnavailable(format!(
                "Object '{}' could not connect to the network",
                object_id
            )));
        }

        info!("Connection for object '{}' established", object_id);
        Ok(descriptor)
    }

    /// Disconnects and forgets the session. Returns false if there was none.
    pub async fn terminate_connection(&self, object_id: &str) -> bool {
        let removed = self.descriptors.write().remove(object_id);
        match removed {
            Some(descriptor) => {
                descriptor.disconnect().await;
                info!("Connection for object '{}' terminated", object_id);
                true
            }
            None => {
                debug!("No connection to terminate for object '{}'", object_id);
                false
            }
        }
    }

    pub fn descriptor(&self, object_id: &str) -> Option<Arc<ConnectionDescriptor>> {
        self.descriptors.read().get(object_id).cloned()
    }

    pub async fn is_connected(&self, object_id: &str) -> bool {
        match self.descriptor(object_id) {
            Some(descriptor) => descriptor.is_connected().await,
            None => false,
        }
    }

    pub fn connection_list(&self) -> Vec<String> {
        let mut list: Vec<String> = self.descriptors.read().keys().cloned().collect();
        list.sort();
        list
    }

    pub async fn roster(&self, object_id: &str) -> Result<HashSet<String>> {
        Ok(self.connected(object_id)?.roster().await)
    }

    pub async fn send_request(
        &self,
        source_oid: &str,
        destination_oid: &str,
        operation: RequestOperation,
        attributes: HashMap<String, String>,
        parameters: HashMap<String, String>,
        body: Option<String>,
    ) -> Result<NetworkMessageResponse> {
        self.connected(source_oid)?
            .request(destination_oid, operation, attributes, parameters, body)
            .await
    }

    pub async fn activate_event_channel(&self, object_id: &str, event_id: &str) -> Result<()> {
        self.connected(object_id)?
            .set_event_channel_status(event_id, true)
            .await;
        Ok(())
    }

    pub async fn deactivate_event_channel(&self, object_id: &str, event_id: &str) -> Result<()> {
        if self.connected(object_id)?.set_event_channel_status(event_id, false).await {
            Ok(())
        } else {
            Err(GatewayError::NotFound(format!("Event channel '{}' of '{}'", event_id, object_id)))
        }
    }

    /// Returns the number of subscribers the event was sent to.
    pub async fn send_event_to_subscribed_objects(
        &self,
        object_id: &str,
        event_id: &str,
        body: Option<String>,
    ) -> Result<usize> {
        self.connected(object_id)?
            .send_event_to_subscribers(event_id, body)
            .await
            .ok_or_else(|| GatewayError::NotFound(format!("Event channel '{}' of '{}'", event_id, object_id)))
    }

    pub async fn subscribe_to_event_channel(
        &self,
        object_id: &str,
        owner_oid: &str,
        event_id: &str,
    ) -> Result<NetworkMessageResponse> {
        self.connected(object_id)?
            .subscribe_to_event_channel(owner_oid, event_id)
            .await
    }

    pub async fn unsubscribe_from_event_channel(
        &self,
        object_id: &str,
        owner_oid: &str,
        event_id: &str,
    ) -> Result<NetworkMessageResponse> {
        self.connected(object_id)?
            .unsubscribe_from_event_channel(owner_oid, event_id)
            .await
    }

    pub async fn event_channel_status(
        &self,
        object_id: &str,
        owner_oid: &str,
        event_id: &str,
    ) -> Result<NetworkMessageResponse> {
        self.send_request(
            object_id,
            owner_oid,
            RequestOperation::GetEventChannelStatus,
            HashMap::from([(ATTR_EID.to_string(), event_id.to_string())]),
            HashMap::new(),
            None,
        )
        .await
    }

    /// Drops every session whose engine no longer reports a connection.
    pub async fn sweep(&self) -> usize {
        let candidates: Vec<(String, Arc<ConnectionDescriptor>)> = self
            .descriptors
            .read()
            .iter()
            .map(|(id, descriptor)| (id.clone(), descriptor.clone()))
            .collect();

        let mut dead = Vec::new();
        for (object_id, descriptor) in candidates {
            if !descriptor.is_connected().await {
                dead.push((object_id, descriptor));
            }
        }

        dead.iter()
            .filter(|(object_id, descriptor)| self.evict(object_id, descriptor))
            .inspect(|(object_id, _)| info!("Evicted disconnected session of object '{}'", object_id))
            .count()
    }

    pub fn start_maintenance(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let removed = manager.sweep().await;
                if removed > 0 {
                    debug!("Maintenance sweep removed {} sessions", removed);
                }
            }
        })
    }

    pub async fn shutdown(&self) {
        let descriptors: Vec<Arc<ConnectionDescriptor>> =
            self.descriptors.write().drain().map(|(_, descriptor)| descriptor).collect();
        for descriptor in descriptors {
            descriptor.disconnect().await;
        }
        info!("All connections closed");
    }

    /// Removes the registry entry only if it still is `descriptor`.
    fn evict(&self, object_id: &str, descriptor: &Arc<ConnectionDescriptor>) -> bool {
        let mut descriptors = self.descriptors.write();
        if descriptors
            .get(object_id)
            .is_some_and(|current| Arc::ptr_eq(current, descriptor))
        {
            descriptors.remove(object_id);
            true
        } else {
            false
        }
    }

    fn connected(&self, object_id: &str) -> Result<Arc<ConnectionDescriptor>> {
        self.descriptor(object_id)
            .ok_or_else(|| GatewayError::NotConnected(object_id.to_string()))
    }
}
