//! Navigation seam. The route guard's only externally visible effect is a
//! call to [`Navigator::navigate`].

use crate::session::error::NavigationError;
use std::{
    collections::HashSet,
    future::Future,
    sync::Mutex,
    time::Duration,
};
use tracing::info;

pub trait Navigator: Send + Sync + 'static {
    /// Resolves once the router has settled on `target`.
    fn navigate(&self, target: &str) -> impl Future<Output = Result<(), NavigationError>> + Send;
}

/// Records navigations instead of performing them.
#[derive(Default)]
pub struct RecordingNavigator {
    issued: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    latency: Mutex<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        *lock(&self.latency) = latency;
        self
    }

    /// Makes navigations to `target` fail until cleared.
    pub fn fail_on(&self, target: &str) {
        lock(&self.failing).insert(target.to_string());
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
    }

    #[must_use]
    pub fn issued(&self) -> Vec<String> {
        lock(&self.issued).clone()
    }
}

impl Navigator for RecordingNavigator {
    async fn navigate(&self, target: &str) -> Result<(), NavigationError> {
        lock(&self.issued).push(target.to_string());
        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if lock(&self.failing).contains(target) {
            return Err(NavigationError {
                target: target.to_string(),
                reason: "router rejected navigation".to_string(),
            });
        }

        info!(path = target, "navigated");
        Ok(())
    }
}
