//! reqwest-backed clients for the now-playing feed and the ratings API.

use std::time::Duration;

use async_trait::async_trait;
use calico_proto::metadata::{NowPlayingSnapshot, TrackIdentity};
use calico_proto::ratings::{Rating, RatingsResponse, SubmitRating, RATINGS_PATH};
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::{Client, Response};

use crate::error::FetchError;
use crate::identity::ListenerId;
use crate::poller::MetadataSource;
use crate::rating::RatingsApi;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared client for both services.
pub fn client() -> Result<Client, FetchError> {
    let client = Client::builder()
        .user_agent(concat!("calico/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    Ok(client)
}

/// Non-2xx responses become `FetchError::Status` carrying the body text.
async fn check(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FetchError::Status {
        status: status.as_u16(),
        body,
    })
}

pub struct FeedClient {
    client: Client,
    url: String,
}

impl FeedClient {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl MetadataSource for FeedClient {
    async fn fetch(&self) -> Result<NowPlayingSnapshot, FetchError> {
        // The CDN caches aggressively; every poll must reach the origin.
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let response = self.client.get(&self.url).headers(headers).send().await?;
        let bytes = check(response).await?.bytes().await?;
        Ok(NowPlayingSnapshot::from_json_slice(&bytes)?)
    }
}

pub struct RatingsClient {
    client: Client,
    endpoint: String,
}

impl RatingsClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`.
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), RATINGS_PATH),
        }
    }
}

#[async_trait]
impl RatingsApi for RatingsClient {
    async fn fetch(
        &self,
        track: &TrackIdentity,
        listener: &ListenerId,
    ) -> Result<RatingsResponse, FetchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("artist", track.artist.as_str()),
                ("title", track.title.as_str()),
                ("listener_id", listener.as_str()),
            ])
            .send()
            .await?;
        let bytes = check(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn submit(
        &self,
        track: &TrackIdentity,
        listener: &ListenerId,
        rating: Rating,
    ) -> Result<(), FetchError> {
        let body = SubmitRating {
            artist: track.artist.clone(),
            title: track.title.clone(),
            listener_id: listener.as_str().to_string(),
            rating,
        };
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        check(response).await?;
        Ok(())
    }
}
