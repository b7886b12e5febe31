//! App-level launch flags kept next to the credential record.
//!
//! Flags are advisory: a storage failure reads as the default (first launch,
//! onboarding not done) and a failed write is logged and dropped.

use std::sync::Arc;

use tracing::warn;

use crate::storage::KeyValueStore;

pub const FIRST_LAUNCH_KEY: &str = "isFirstLaunch";
pub const ONBOARDING_COMPLETED_KEY: &str = "onboardingCompleted";

#[derive(Clone)]
pub struct AppFlags {
    storage: Arc<dyn KeyValueStore>,
}

impl AppFlags {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// True until [`mark_launched`](Self::mark_launched) has been recorded.
    pub async fn is_first_launch(&self) -> bool {
        self.read_bool(FIRST_LAUNCH_KEY).await.unwrap_or(true)
    }

    pub async fn mark_launched(&self) {
        self.write_bool(FIRST_LAUNCH_KEY, false).await;
    }

    pub async fn onboarding_completed(&self) -> bool {
        self.read_bool(ONBOARDING_COMPLETED_KEY).await.unwrap_or(false)
    }

    pub async fn set_onboarding_completed(&self, completed: bool) {
        self.write_bool(ONBOARDING_COMPLETED_KEY, completed).await;
    }

    async fn read_bool(&self, key: &str) -> Option<bool> {
        match self.storage.get(key).await {
            Ok(Some(value)) => match value.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                other => {
                    warn!(key, value = other, "ignoring unrecognized flag value");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "reading app flag failed");
                None
            }
        }
    }

    async fn write_bool(&self, key: &str, value: bool) {
        let value = if value { "true" } else { "false" };
        if let Err(e) = self.storage.set(key, value).await {
            warn!(key, error = %e, "writing app flag failed");
        }
    }
}

#[cfg(test)]
#[path = "flags_test.rs"]
mod tests;
