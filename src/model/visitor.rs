use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

use super::*;

/// Address used when no proxy header names the client.
pub const UNKNOWN_ADDRESS: &str = "unknown";

const ADDRESS_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];
const TOKEN_LEN: usize = 16;
const USER_AGENT_LEN: usize = 100;

/// One-way hash of a client address. The only visitor identity that is ever stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, new)]
#[serde(transparent)]
pub struct VisitorToken(String);

impl std::fmt::Display for VisitorToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, new)]
pub struct VisitorHasher {
    salt: String,
}

impl std::fmt::Debug for VisitorHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisitorHasher").finish_non_exhaustive()
    }
}

impl VisitorHasher {
    pub fn token(&self, address: &str) -> VisitorToken {
        let mut hasher = Sha256::new();
        hasher.update(address.as_bytes());
        hasher.update(self.salt.as_bytes());

        let mut digest = format!("{:x}", hasher.finalize());
        digest.truncate(TOKEN_LEN);
        VisitorToken(digest)
    }
}

/// Best-effort client address from the proxy headers in front of the service.
pub fn client_address(headers: &HeaderMap) -> String {
    ADDRESS_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(',').next())
        .map(str::trim)
        .find(|address| !address.is_empty())
        .unwrap_or(UNKNOWN_ADDRESS)
        .to_string()
}

/// The `User-Agent` header cut down to a short diagnostic prefix.
pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .chars()
        .take(USER_AGENT_LEN)
        .collect()
}
