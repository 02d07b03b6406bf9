//! HTTP client utilities with built-in rate limiting.
//!
//! Every adapter owns one [`HttpClient`] configured with its upstream's
//! request budget. Requests go through [`RateLimitedRequestBuilder`],
//! which waits on the client's limiter before sending, so an adapter can
//! never exceed its budget no matter how many searches run concurrently.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use serde::Serialize;

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
    }

    /// Create a new HTTP client with a custom user agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            limiter: None,
        })
    }

    /// Cap outgoing requests at `per_second` across all clones of this client
    pub fn with_rate_limit(mut self, per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(nonzero!(1u32)));
        self.limiter = Some(Arc::new(RateLimiter::direct(quota)));
        self
    }

    /// Start a rate-limited GET request
    pub fn get(&self, url: &str) -> RateLimitedRequestBuilder {
        RateLimitedRequestBuilder {
            builder: self.client.get(url),
            limiter: self.limiter.clone(),
        }
    }

    /// Start a rate-limited POST request
    pub fn post(&self, url: &str) -> RateLimitedRequestBuilder {
        RateLimitedRequestBuilder {
            builder: self.client.post(url),
            limiter: self.limiter.clone(),
        }
    }
}

/// A request that waits for rate-limit clearance before sending
pub struct RateLimitedRequestBuilder {
    builder: reqwest::RequestBuilder,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl RateLimitedRequestBuilder {
    /// Add a header to the request
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.builder = self.builder.header(key, value);
        self
    }

    /// Add query parameters to the request
    pub fn query<T: Serialize + ?Sized>(mut self, query: &T) -> Self {
        self.builder = self.builder.query(query);
        self
    }

    /// Set a JSON body on the request
    pub fn json<T: Serialize + ?Sized>(mut self, json: &T) -> Self {
        self.builder = self.builder.json(json);
        self
    }

    /// Wait for rate-limit clearance, then send
    pub async fn send(self) -> Result<reqwest::Response, reqwest::Error> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        self.builder.send().await
    }
}
