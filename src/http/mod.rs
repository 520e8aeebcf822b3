//! HTTP transport with cookie persistence and identity rotation.
//!
//! A [`HttpTransport`] wraps one `reqwest::Client` (and therefore one
//! connection pool and one cookie jar) plus the browser identity currently
//! presented. [`reset`](HttpTransport::reset) drops both and starts over,
//! which is how crawlers cycle their session.

mod user_agent;

use user_agent::random_user_agent;

use crate::error::FetchError;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Reusable HTTP client abstraction used by both crawlers.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    user_agent: &'static str,
    resets: u32,
}

impl HttpTransport {
    /// Build a transport with a fresh cookie jar and a random identity.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            timeout,
            user_agent: random_user_agent(),
            resets: 0,
        })
    }

    /// User agent sent with the next request.
    pub fn user_agent(&self) -> &str {
        self.user_agent
    }

    /// Number of times the underlying client has been replaced.
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Switch to another browser identity; cookies and connections are kept.
    pub fn rotate_identity(&mut self) -> &str {
        self.user_agent = random_user_agent();
        self.user_agent
    }

    /// Close the current connection pool and cookie jar and start a new one
    /// under a new identity.
    pub fn reset(&mut self) -> Result<(), reqwest::Error> {
        self.client = build_client(self.timeout)?;
        self.user_agent = random_user_agent();
        self.resets += 1;
        debug!(resets = self.resets, "HTTP transport reset");
        Ok(())
    }

    /// GET a page and return its body; non-2xx statuses are errors.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent)
            .send()
            .await
            .map_err(transport)?;
        let resp = resp.error_for_status().map_err(transport)?;
        resp.text().await.map_err(transport)
    }

    /// POST a form-encoded body with extra headers and return the response
    /// body; non-2xx statuses are errors.
    #[instrument(level = "debug", skip(self, form, headers))]
    pub async fn post_form<F>(
        &self,
        url: &str,
        form: &F,
        headers: &[(&'static str, String)],
    ) -> Result<String, FetchError>
    where
        F: Serialize + ?Sized,
    {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let mut request = self
            .client
            .post(url)
            .header(USER_AGENT, self.user_agent)
            .form(form);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        let resp = request.send().await.map_err(transport)?;
        let resp = resp.error_for_status().map_err(transport)?;
        resp.text().await.map_err(transport)
    }
}

fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .build()
}
