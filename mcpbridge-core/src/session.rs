//! Session token storage.
//!
//! The remote server issues an opaque session token in the `Mcp-Session-Id`
//! response header. Once known, the token is attached to every subsequent
//! HTTP call so the stateless exchanges form one logical session. There is
//! exactly one token per process; a restarted bridge starts a fresh session.
//!
//! The store is read on every outbound request and written rarely, so it is
//! an atomic pointer swap rather than a lock.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{info, warn};

/// HTTP header carrying the session token, in both directions.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Holds at most one server-issued session token.
///
/// Cheap to read from many tasks at once. `set` overwrites whatever was
/// stored before; there is no expiry logic. If the server invalidates a
/// session it is expected to hand out a new token on a later exchange,
/// which the store then adopts.
#[derive(Debug, Default)]
pub struct SessionStore {
    token: ArcSwapOption<String>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token, if one has been issued.
    pub fn get(&self) -> Option<Arc<String>> {
        self.token.load_full()
    }

    /// Store `token`, replacing any previous one.
    ///
    /// Empty values and values that are not visible ASCII (and therefore
    /// could not be sent back as a header) are ignored.
    pub fn set(&self, token: &str) {
        let token = token.trim();
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_graphic()) {
            warn!(
                len = token.len(),
                "ignoring unusable session token from server"
            );
            return;
        }

        let previous = self.token.swap(Some(Arc::new(token.to_string())));
        match previous {
            Some(prev) if prev.as_str() == token => {}
            Some(_) => info!(token_len = token.len(), "session token replaced by server"),
            None => info!(token_len = token.len(), "session established"),
        }
    }
}
