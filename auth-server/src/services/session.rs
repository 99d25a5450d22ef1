use http::header::{HeaderName, InvalidHeaderName};
use http::HeaderMap;

/// Tells which user, if any, is logged in on a request
pub trait SessionPolicy: Send + Sync {
    fn authenticated_userid(&self, headers: &HeaderMap) -> Option<String>;
}

/// Trusts a header injected by an authenticating reverse proxy.
///
/// The proxy must strip this header from client requests.
#[derive(Debug, Clone)]
pub struct HeaderSessionPolicy {
    header: HeaderName,
}

impl HeaderSessionPolicy {
    pub fn new(header: &str) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            header: HeaderName::try_from(header)?,
        })
    }
}

impl SessionPolicy for HeaderSessionPolicy {
    fn authenticated_userid(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|userid| !userid.is_empty())
            .map(str::to_string)
    }
}
