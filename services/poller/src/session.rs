//! Uniform HTTP envelope shared by every receiver client.
//!
//! A session never returns `Err`: transport failures come back as a
//! `WireResponse` with status 0 and the error text, so dispatcher code has
//! exactly one shape to inspect.  The per-session minimum-interval gate
//! serialises calls against rate-limited endpoints (Discord allows one
//! webhook execution per 1.5 s); the gate sleeps asynchronously until the
//! interval since the previous call has elapsed.

use reqwest::Method;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const USER_AGENT: &str = concat!("drivecast/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Uniform response envelope.
#[derive(Debug, Clone, Default)]
pub struct WireResponse {
    /// HTTP status; 0 when the request never completed.
    pub status: u16,
    pub content: String,
    /// Parsed body when the response was JSON.
    pub json: Option<serde_json::Value>,
    pub url: String,
    /// Transport-level failure text, if any.
    pub error: Option<String>,
}

impl WireResponse {
    #[must_use]
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn transport_failure(url: &str, error: impl ToString) -> Self {
        WireResponse {
            status: 0,
            content: String::new(),
            json: None,
            url: url.to_owned(),
            error: Some(error.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// Per-call options.  Everything defaults to "absent".
#[derive(Debug, Default)]
pub struct RequestOpts {
    pub params: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
    pub form: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub basic_auth: Option<(String, Option<String>)>,
    pub bearer: Option<String>,
    /// Minimum spacing to the previous call on this session.
    pub min_interval: Option<Duration>,
}

// ---------------------------------------------------------------------------
// HttpSession
// ---------------------------------------------------------------------------

pub struct HttpSession {
    client: reqwest::Client,
    last_call: Mutex<Option<Instant>>,
}

impl Default for HttpSession {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpSession {
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        HttpSession {
            client,
            last_call: Mutex::new(None),
        }
    }

    pub async fn get(&self, url: &str, opts: RequestOpts) -> WireResponse {
        self.request(Method::GET, url, opts).await
    }

    pub async fn post(&self, url: &str, opts: RequestOpts) -> WireResponse {
        self.request(Method::POST, url, opts).await
    }

    pub async fn request(&self, method: Method, url: &str, opts: RequestOpts) -> WireResponse {
        self.wait_for_interval(opts.min_interval).await;

        let mut req = self.client.request(method, url);
        if !opts.params.is_empty() {
            req = req.query(&opts.params);
        }
        if let Some(body) = &opts.json {
            req = req.json(body);
        }
        if !opts.form.is_empty() {
            req = req.form(&opts.form);
        }
        for (name, value) in &opts.headers {
            req = req.header(name, value);
        }
        if let Some((user, password)) = &opts.basic_auth {
            req = req.basic_auth(user, password.as_deref());
        }
        if let Some(token) = &opts.bearer {
            req = req.bearer_auth(token);
        }

        let response = match req.send().await {
            Ok(r) => r,
            Err(e) => return WireResponse::transport_failure(url, e),
        };
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content = match response.text().await {
            Ok(t) => t,
            Err(e) => return WireResponse::transport_failure(&final_url, e),
        };
        let json = serde_json::from_str(&content).ok();
        WireResponse {
            status,
            content,
            json,
            url: final_url,
            error: None,
        }
    }

    /// Sleep until `interval` has elapsed since the previous gated call,
    /// then stamp this one.
    async fn wait_for_interval(&self, interval: Option<Duration>) {
        let mut last = self.last_call.lock().await;
        if let (Some(interval), Some(previous)) = (interval, *last) {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                tracing::debug!(remaining = ?(interval - elapsed), "interval gate");
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
