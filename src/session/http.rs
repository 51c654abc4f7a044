//! JSON/REST profile store.
//!
//! `GET {base}/users/{uid}` answers 200 with the profile or 404 when the user
//! has none yet. `PUT {base}/users/{uid}` creates or replaces it. Any transport
//! error or non-404 failure status is reported as backend unavailable.

use crate::{
    session::{error::ProfileFetchError, profile::ProfileStore, types::Profile},
    APP_USER_AGENT,
};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

#[derive(Clone, Debug)]
pub struct HttpProfileStore {
    client: Client,
    base_url: Url,
}

impl HttpProfileStore {
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be parsed or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        // Keep the last path segment when joining relative paths.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    fn profile_url(&self, uid: &str) -> Result<Url, ProfileFetchError> {
        let mut url = self.base_url.join("users/").map_err(unavailable)?;
        url.path_segments_mut()
            .map_err(|()| ProfileFetchError::BackendUnavailable("base url cannot be a base".into()))?
            .pop_if_empty()
            .push(uid);
        Ok(url)
    }
}

fn unavailable(err: impl std::fmt::Display) -> ProfileFetchError {
    ProfileFetchError::BackendUnavailable(err.to_string())
}

impl ProfileStore for HttpProfileStore {
    #[instrument(skip(self))]
    async fn fetch(&self, uid: &str) -> Result<Option<Profile>, ProfileFetchError> {
        let url = self.profile_url(uid)?;
        let response = self.client.get(url).send().await.map_err(|err| {
            warn!(error = %err, "profile request failed");
            unavailable(err)
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("no profile stored yet");
                Ok(None)
            }
            status if status.is_success() => {
                let profile = response.json::<Profile>().await.map_err(unavailable)?;
                Ok(Some(profile))
            }
            status => {
                warn!(%status, "profile backend answered with an error");
                Err(ProfileFetchError::BackendUnavailable(format!(
                    "unexpected status {status}"
                )))
            }
        }
    }

    #[instrument(skip(self, profile), fields(uid = %profile.uid))]
    async fn put(&self, profile: Profile) -> Result<(), ProfileFetchError> {
        let url = self.profile_url(&profile.uid)?;
        let response = self
            .client
            .put(url)
            .json(&profile)
            .send()
            .await
            .map_err(unavailable)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProfileFetchError::BackendUnavailable(format!(
                "unexpected status {}",
                response.status()
            )))
        }
    }
}
