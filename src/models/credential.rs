use std::fmt;

use http::Uri;
use secrecy::SecretString;
use tokio::time::Instant;

/// Identity material used to talk to the control plane.
///
/// Never serialised; the `Debug` output redacts the token and CA bundle.
pub struct ClusterCredential {
    pub endpoint: Uri,
    pub bearer_token: SecretString,
    /// PEM encoded certificate authority bundle.
    pub ca_bundle: Vec<u8>,
    pub expires_at: Option<Instant>,
}

impl ClusterCredential {
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }
}

impl fmt::Debug for ClusterCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterCredential")
            .field("endpoint", &self.endpoint)
            .field("bearer_token", &"[REDACTED]")
            .field("ca_bundle", &format_args!("{} bytes", self.ca_bundle.len()))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
