//! Capabilities the OAuth controllers depend on.
//!
//! Each capability is a trait so that handlers only ever see
//! `Arc<dyn Trait>`; the default implementations here are wired up in
//! [`crate::state::AppState::new`] and tests swap in their own.

pub mod client;
pub mod oauth_provider;
pub mod session;
pub mod token;
pub mod user;

use crate::store::StoreError;
use thiserror::Error;

pub use client::{ClientService, InMemoryClientService};
pub use oauth_provider::{
    Credentials, OAuthProvider, OAuthProviderService, ProtocolError, ProviderResponse,
};
pub use session::{HeaderSessionPolicy, SessionPolicy};
pub use token::{AuthTokenService, TokenService};
pub use user::{InMemoryUserService, UserService};

/// Failure inside an injected service, never caused by the caller's input
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Token lifetime of {0}s is out of range")]
    InvalidLifetime(u64),
}
