//! Login session shared by every client in the process.
//!
//! `init` is called once the external auth endpoint hands back a token;
//! `teardown` on logout. Nothing here talks to the network.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use domains::Identity;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

struct Active {
    token: SecretString,
    identity: Identity,
}

#[derive(Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<Option<Active>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide session.
    pub fn global() -> &'static Session {
        static GLOBAL: OnceLock<Session> = OnceLock::new();
        GLOBAL.get_or_init(Session::new)
    }

    pub fn init(&self, token: SecretString, identity: Identity) {
        info!(user_id = %identity.user_id, "session started");
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Active { token, identity });
    }

    pub fn teardown(&self) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = slot.take() {
            info!(user_id = %active.identity.user_id, "session ended");
        }
    }

    pub fn identity(&self) -> Option<Identity> {
        let slot = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().map(|active| active.identity.clone())
    }

    pub fn is_active(&self) -> bool {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Raw bearer token, exposed only to build the `Authorization` header.
    pub(crate) fn bearer(&self) -> Option<String> {
        let slot = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().map(|active| active.token.expose_secret().to_string())
    }
}
