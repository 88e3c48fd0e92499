//! Authenticated requests against the Calendar v3 REST API, with retry.

use std::time::Duration;

use calmirror_core::TransportError;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::types::ErrorBody;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

const MAX_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    initial_backoff: Duration,
}

impl ApiClient {
    pub fn new(access_token: &str) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.to_string(),
            initial_backoff: INITIAL_BACKOFF,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Build an endpoint URL, percent-encoding each path segment.
    pub fn url(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TransportError::Request(format!("invalid base URL {}: {e}", self.base_url)))?;

        url.path_segments_mut()
            .map_err(|_| TransportError::Request(format!("base URL {} cannot have a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, TransportError> {
        let response = self
            .send(|| self.http.request(Method::GET, url.clone()).query(query))
            .await?;
        decode(response).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T, TransportError> {
        let response = self
            .send(|| self.http.request(Method::POST, url.clone()).json(body))
            .await?;
        decode(response).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T, TransportError> {
        let response = self
            .send(|| self.http.request(Method::PUT, url.clone()).json(body))
            .await?;
        decode(response).await
    }

    pub async fn delete(&self, url: Url) -> Result<(), TransportError> {
        self.send(|| self.http.request(Method::DELETE, url.clone()))
            .await
            .map(|_| ())
    }

    /// Send a request, retrying rate limits, server errors and connection
    /// failures with exponential backoff.
    async fn send<F>(&self, build: F) -> Result<Response, TransportError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut delay = self.initial_backoff;
        let mut attempt = 1;

        loop {
            let result = build().bearer_auth(&self.access_token).send().await;

            match result {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if is_retryable(response.status()) && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        status = response.status().as_u16(),
                        attempt,
                        url = %response.url(),
                        "retrying request"
                    );
                }
                Ok(response) => return Err(status_error(response).await),
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(error = %e, attempt, "retrying request");
                }
                Err(e) => return Err(TransportError::Request(e.to_string())),
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
            attempt += 1;
        }
    }
}

/// 403 is how Calendar reports exhausted rate limits.
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

async fn status_error(response: Response) -> TransportError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error.message)
        .unwrap_or(text);

    TransportError::Status { status, message }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    response
        .json()
        .await
        .map_err(|e| TransportError::Decode(e.to_string()))
}
