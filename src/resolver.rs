//! Boot-time auth status resolution.
//!
//! SYSTEM CONTEXT
//! ==============
//! The boot screen awaits [`AuthStatusResolver::resolve`] (or polls
//! `is_auth_checked`) and shows a loading indicator until the session is
//! settled. The route guard stays idle until then.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;

use crate::store::SessionStore;

/// Runs the session store's status check at most once per process.
#[derive(Clone)]
pub struct AuthStatusResolver {
    store: Arc<SessionStore>,
    ran: Arc<OnceCell<()>>,
}

impl AuthStatusResolver {
    #[must_use]
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store, ran: Arc::new(OnceCell::new()) }
    }

    /// Settle the session. Later calls, and calls made after a login or
    /// logout already settled it, return immediately. Concurrent first calls
    /// share one check.
    pub async fn resolve(&self) {
        if self.store.snapshot().is_auth_checked {
            debug!("auth status already checked");
            return;
        }
        self.ran
            .get_or_init(|| async {
                self.store.check_auth_status().await;
            })
            .await;
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.store.snapshot().is_loading
    }

    #[must_use]
    pub fn is_auth_checked(&self) -> bool {
        self.store.snapshot().is_auth_checked
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
