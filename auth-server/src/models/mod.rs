use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Set of OAuth scope strings
pub type Scopes = BTreeSet<String>;

/// Scopes granted to every authorization, whatever the client asked for
pub const DEFAULT_SCOPES: [&str; 2] = ["annotation:read", "annotation:write"];

pub fn default_scopes() -> Scopes {
    DEFAULT_SCOPES.iter().map(|scope| scope.to_string()).collect()
}

/// Grant type a client is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    #[default]
    Code,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Self::Code),
            other => Err(format!("unsupported response type '{other}'")),
        }
    }
}

/// A registered OAuth client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuthClient {
    /// Client identifier
    pub id: String,
    /// Human-readable client name shown on the consent page
    pub name: String,
    /// The only redirect URI this client may use
    pub redirect_uri: String,
    #[serde(default)]
    pub response_type: ResponseType,
    /// Trusted clients are not asked for user consent
    #[serde(default)]
    pub trusted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    /// Account identifier, `acct:<username>@<authority>`
    pub userid: String,
    pub username: String,
    pub authority: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl User {
    pub fn new(username: &str, authority: &str) -> Self {
        Self {
            userid: format!("acct:{username}@{authority}"),
            username: username.to_string(),
            authority: authority.to_string(),
            display_name: None,
        }
    }
}

/// Access token issued to an OAuth client on behalf of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub value: String,
    pub userid: String,
    pub authclient: AuthClient,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl OAuthToken {
    pub fn expired(&self) -> bool {
        Utc::now() > self.expires
    }
}

/// Long-lived token a user generates for scripting against the API.
/// Developer tokens never expire and belong to no client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeveloperToken {
    pub value: String,
    pub userid: String,
    pub created: DateTime<Utc>,
}

impl DeveloperToken {
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        None
    }

    pub fn expired(&self) -> bool {
        false
    }
}

/// A bearer token as kept by the token service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Token {
    #[serde(rename = "oauth")]
    OAuth(OAuthToken),
    Developer(DeveloperToken),
}

impl Token {
    pub fn userid(&self) -> &str {
        match self {
            Self::OAuth(token) => &token.userid,
            Self::Developer(token) => &token.userid,
        }
    }

    pub fn expired(&self) -> bool {
        match self {
            Self::OAuth(token) => token.expired(),
            Self::Developer(token) => token.expired(),
        }
    }
}

/// Formats a UTC timestamp as ISO 8601 with microseconds and an explicit offset
pub fn utc_iso8601(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}
