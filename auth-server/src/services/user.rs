use super::ServiceError;
use crate::models::User;
use async_trait::async_trait;
use std::collections::HashMap;

/// Resolves user ids to user records
#[async_trait]
pub trait UserService: Send + Sync {
    async fn fetch(&self, userid: &str) -> Result<Option<User>, ServiceError>;
}

/// User registry held in memory, seeded from configuration
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserService {
    users: HashMap<String, User>,
}

impl InMemoryUserService {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|user| (user.userid.clone(), user))
                .collect(),
        }
    }
}

#[async_trait]
impl UserService for InMemoryUserService {
    async fn fetch(&self, userid: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.users.get(userid).cloned())
    }
}
