use std::time::Duration;

use futures::future;
use log::info;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{ClientInvoker, RegistryError, Transport, status::now_millis};

/// The last observed reachability of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    #[default]
    Unknown,
    Online,
    Offline,
    Timeout,
    Error,
}

/// A registered client node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDescriptor {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub last_known_status: ClientStatus,
    /// Unix epoch millis of the last successful health check.
    #[serde(default)]
    pub last_seen: Option<u64>,
}

impl ClientDescriptor {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            last_known_status: ClientStatus::Unknown,
            last_seen: None,
        }
    }
}

/// The source of the clients that take part in a round.
pub trait ClientRegistry: Send + Sync + 'static {
    /// Should return a snapshot of the currently registered clients.
    fn list_clients(&self) -> Vec<ClientDescriptor>;
}

/// A process local registry, kept in registration order.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    clients: RwLock<Vec<ClientDescriptor>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new client.
    ///
    /// # Arguments
    /// * `id` - The unique id of the client.
    /// * `address` - The unique network address of the client node.
    ///
    /// # Returns
    /// The stored descriptor or an error if the id or the address is already taken.
    pub fn add(
        &self,
        id: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<ClientDescriptor, RegistryError> {
        let client = ClientDescriptor::new(id, address);
        let mut clients = self.clients.write();

        if clients.iter().any(|c| c.id == client.id) {
            return Err(RegistryError::DuplicateId(client.id));
        }

        if clients.iter().any(|c| c.address == client.address) {
            return Err(RegistryError::DuplicateAddress(client.address));
        }

        info!(id = client.id.as_str(), address = client.address.as_str(); "client registered");
        clients.push(client.clone());
        Ok(client)
    }

    /// Removes the client with the given id.
    ///
    /// # Returns
    /// The removed descriptor or `UnknownClient`.
    pub fn remove(&self, id: &str) -> Result<ClientDescriptor, RegistryError> {
        let mut clients = self.clients.write();
        let pos = clients
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| RegistryError::UnknownClient(id.to_string()))?;

        Ok(clients.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Checks every registered client concurrently and records the outcome.
    ///
    /// Clients removed while the checks are in flight are skipped when recording.
    ///
    /// # Arguments
    /// * `invoker` - Used to perform the health calls.
    /// * `timeout` - Upper bound for each check.
    ///
    /// # Returns
    /// The updated descriptors, in registration order.
    pub async fn check_health<T: Transport + Sync>(
        &self,
        invoker: &ClientInvoker<T>,
        timeout: Duration,
    ) -> Vec<ClientDescriptor> {
        let snapshot = self.list_clients();
        let checks: Vec<_> = snapshot
            .iter()
            .map(|client| invoker.invoke_health_check(client, timeout))
            .collect();
        let statuses = future::join_all(checks).await;

        let now = now_millis();
        let mut clients = self.clients.write();

        for (checked, status) in snapshot.iter().zip(statuses) {
            let Some(client) = clients.iter_mut().find(|c| c.id == checked.id) else {
                continue;
            };

            client.last_known_status = status;
            if status == ClientStatus::Online {
                client.last_seen = Some(now);
            }
        }

        clients.clone()
    }
}

impl ClientRegistry for InMemoryRegistry {
    fn list_clients(&self) -> Vec<ClientDescriptor> {
        self.clients.read().clone()
    }
}
