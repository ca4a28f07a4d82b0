//! Registry of live broker clients.

use blitz_broker::BrokerClient;
use blitz_core::UserId;
use dashmap::DashMap;
use std::sync::Arc;

/// Keyed map of users to their broker clients.
#[derive(Default)]
pub struct ConnectionRegistry {
    clients: DashMap<UserId, Arc<BrokerClient>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, client: Arc<BrokerClient>) {
        self.clients.insert(client.user_id(), client);
    }

    pub fn remove(&self, user_id: UserId) -> Option<Arc<BrokerClient>> {
        self.clients.remove(&user_id).map(|(_, c)| c)
    }

    pub fn get(&self, user_id: UserId) -> Option<Arc<BrokerClient>> {
        self.clients.get(&user_id).map(|c| c.clone())
    }

    /// Clients whose sockets are currently online, ordered by user id so
    /// fan-out order is deterministic.
    pub fn connected(&self) -> Vec<Arc<BrokerClient>> {
        let mut clients: Vec<_> = self
            .clients
            .iter()
            .filter(|entry| entry.value().is_connected())
            .map(|entry| entry.value().clone())
            .collect();
        clients.sort_by_key(|c| c.user_id());
        clients
    }

    /// Every registered client, online or not (shutdown sweep).
    pub fn all(&self) -> Vec<Arc<BrokerClient>> {
        self.clients.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
