//! Application context: one explicitly constructed bundle of the session
//! services, passed to whatever needs them. No globals.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::account::AccountService;
use crate::api::{AuthApi, HttpAuthApi};
use crate::config::{ApiConfig, ConfigError};
use crate::flags::AppFlags;
use crate::guard::{self, Navigator, RouteGuard};
use crate::resolver::AuthStatusResolver;
use crate::storage::KeyValueStore;
use crate::store::SessionStore;

#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<SessionStore>,
    pub resolver: AuthStatusResolver,
    pub account: AccountService,
    pub flags: AppFlags,
}

impl AppContext {
    /// Wire the services over injected collaborators.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, api: Arc<dyn AuthApi>) -> Self {
        Self::from_store(SessionStore::new(Arc::clone(&storage), Arc::clone(&api)), storage, api)
    }

    /// Wire the services against the HTTP backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: ApiConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self, ConfigError> {
        let logout_timeout = config.timeouts.logout();
        info!(base_url = %config.base_url, "connecting to backend");
        let api: Arc<dyn AuthApi> = Arc::new(HttpAuthApi::new(config)?);
        let store = SessionStore::new(Arc::clone(&storage), Arc::clone(&api)).with_logout_timeout(logout_timeout);
        Ok(Self::from_store(store, storage, api))
    }

    fn from_store(store: SessionStore, storage: Arc<dyn KeyValueStore>, api: Arc<dyn AuthApi>) -> Self {
        let store = Arc::new(store);
        Self {
            resolver: AuthStatusResolver::new(Arc::clone(&store)),
            account: AccountService::new(api, Arc::clone(&store)),
            flags: AppFlags::new(storage),
            store,
        }
    }

    /// Future that keeps the route guard running against this context's
    /// session until the route channel closes.
    pub fn route_guard<N: Navigator>(
        &self,
        route: watch::Receiver<Vec<String>>,
        navigator: N,
    ) -> impl Future<Output = ()> + Send + use<N> {
        guard::drive(RouteGuard::new(), self.store.subscribe(), route, navigator)
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
