use super::ServiceError;
use crate::models::AuthClient;
use async_trait::async_trait;
use std::collections::HashMap;

/// Looks up registered OAuth clients
#[async_trait]
pub trait ClientService: Send + Sync {
    async fn fetch(&self, client_id: &str) -> Result<Option<AuthClient>, ServiceError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryClientService {
    clients: HashMap<String, AuthClient>,
}

impl InMemoryClientService {
    pub fn new(clients: impl IntoIterator<Item = AuthClient>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|client| (client.id.clone(), client))
                .collect(),
        }
    }
}

#[async_trait]
impl ClientService for InMemoryClientService {
    async fn fetch(&self, client_id: &str) -> Result<Option<AuthClient>, ServiceError> {
        Ok(self.clients.get(client_id).cloned())
    }
}
