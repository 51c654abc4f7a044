//! Profile store seam and the in-memory implementation.
//!
//! `Ok(None)` is the expected first-sign-in answer. `BackendUnavailable` means
//! the store could not be asked at all; callers must never treat it as a
//! missing profile.

use crate::session::{error::ProfileFetchError, types::Profile};
use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};
use tracing::{debug, instrument};

pub trait ProfileStore: Send + Sync + 'static {
    fn fetch(
        &self,
        uid: &str,
    ) -> impl Future<Output = Result<Option<Profile>, ProfileFetchError>> + Send;

    /// Creates or replaces the profile stored under `profile.uid`.
    fn put(&self, profile: Profile) -> impl Future<Output = Result<(), ProfileFetchError>> + Send;
}

/// Scripted fetch behaviour for one upcoming call.
#[derive(Clone, Debug)]
pub enum FetchScript {
    /// Answer after the delay with whatever is stored.
    Delay(Duration),
    /// Fail after the delay.
    Unavailable(Duration),
}

#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<String, Profile>>,
    scripts: Mutex<HashMap<String, VecDeque<FetchScript>>>,
    fetches: AtomicUsize,
    puts: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl MemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_profile(self, profile: Profile) -> Self {
        self.insert(profile);
        self
    }

    pub fn insert(&self, profile: Profile) {
        lock(&self.profiles).insert(profile.uid.clone(), profile);
    }

    #[must_use]
    pub fn get(&self, uid: &str) -> Option<Profile> {
        lock(&self.profiles).get(uid).cloned()
    }

    /// Queues behaviour for the next fetch of `uid`; unscripted fetches answer immediately.
    pub fn script(&self, uid: &str, script: FetchScript) {
        lock(&self.scripts)
            .entry(uid.to_string())
            .or_default()
            .push_back(script);
    }

    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

impl ProfileStore for MemoryProfileStore {
    #[instrument(skip(self))]
    async fn fetch(&self, uid: &str) -> Result<Option<Profile>, ProfileFetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let script = lock(&self.scripts)
            .get_mut(uid)
            .and_then(VecDeque::pop_front);

        match script {
            Some(FetchScript::Delay(delay)) => tokio::time::sleep(delay).await,
            Some(FetchScript::Unavailable(delay)) => {
                tokio::time::sleep(delay).await;
                return Err(ProfileFetchError::BackendUnavailable(
                    "store unreachable".to_string(),
                ));
            }
            None => {}
        }

        let profile = self.get(uid);
        debug!(found = profile.is_some(), "profile fetched");
        Ok(profile)
    }

    #[instrument(skip(self, profile), fields(uid = %profile.uid))]
    async fn put(&self, profile: Profile) -> Result<(), ProfileFetchError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.insert(profile);
        Ok(())
    }
}
