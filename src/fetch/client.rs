//! Blocking HTTP client with jittered request pacing.
//!
//! One `ApiClient` is shared by every fetch worker; pacing state is immutable
//! so the client can be borrowed freely across threads. Each request sleeps a
//! random delay drawn from the configured jitter range, spreading burst load
//! across the content sources.

use rand::Rng;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
/// Default jitter range in milliseconds before each request.
const DEFAULT_JITTER_MS: (u64, u64) = (100, 400);
const MAX_REDIRECTS: usize = 10;

/// Blocking HTTP client that sleeps a randomized delay before every request.
#[derive(Debug)]
pub struct ApiClient {
    inner: reqwest::blocking::Client,
    jitter_ms: (u64, u64),
}

impl ApiClient {
    /// Build a client with the default User-Agent, timeout, and jitter range.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    /// Builder for custom User-Agent, cookie, timeout, and jitter.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Sleep a random delay drawn from the jitter range. No-op when the range
    /// is (0, 0).
    fn pause(&self) {
        let (min, max) = self.jitter_ms;
        if max == 0 {
            return;
        }
        let ms = if min >= max {
            min
        } else {
            rand::thread_rng().gen_range(min..=max)
        };
        std::thread::sleep(Duration::from_millis(ms));
    }

    /// Perform a GET request after the jitter pause.
    pub fn get(&self, url: &str) -> Result<reqwest::blocking::Response, reqwest::Error> {
        self.pause();
        self.inner.get(url).send()
    }

    /// Perform a POST request with a JSON body after the jitter pause.
    /// `token`, when present, is sent as an Authorization header.
    pub fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<reqwest::blocking::Response, reqwest::Error> {
        self.pause();
        let mut request = self.inner.post(url).json(body);
        if let Some(token) = token {
            request = request.header("Authorization", token);
        }
        request.send()
    }
}

/// Builder for [ApiClient] with optional User-Agent, cookie, timeout, and
/// jitter settings.
#[derive(Debug)]
pub struct ApiClientBuilder {
    user_agent: Option<String>,
    cookie: Option<String>,
    timeout_secs: u64,
    jitter_ms: (u64, u64),
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            cookie: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            jitter_ms: DEFAULT_JITTER_MS,
        }
    }
}

impl ApiClientBuilder {
    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set a pre-acquired session cookie sent with every request.
    pub fn cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Set request timeout in seconds. Default 15.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the jitter range in milliseconds. (0, 0) disables pacing.
    pub fn jitter_ms(mut self, min: u64, max: u64) -> Self {
        self.jitter_ms = (min, max.max(min));
        self
    }

    /// Build the blocking client and pacing wrapper.
    pub fn build(self) -> Result<ApiClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let mut builder = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));
        if let Some(cookie) = self.cookie {
            let mut headers = reqwest::header::HeaderMap::new();
            if let Ok(value) = reqwest::header::HeaderValue::from_str(&cookie) {
                headers.insert(reqwest::header::COOKIE, value);
            }
            builder = builder.default_headers(headers);
        }
        let inner = builder.build()?;
        Ok(ApiClient {
            inner,
            jitter_ms: self.jitter_ms,
        })
    }
}
