//! Crawl sessions and the anti-forgery token handshake.
//!
//! The search API only answers requests that carry the token embedded in
//! the search page it served to the same client. [`establish`] fetches that
//! page once, pulls the token out of its hidden form field, and returns a
//! [`CrawlSession`] bound to the transport (and cookie jar) that received it.

use crate::error::{FetchError, SessionError};
use crate::http::HttpTransport;
use crate::pacing::Pacer;
use crate::site::TOKEN_FIELD;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{info, instrument, warn};

static TOKEN_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(&format!(r#"input[name="{TOKEN_FIELD}"]"#))
        .expect("token selector is valid CSS")
});

/// State owned by a single crawler run. Never persisted.
#[derive(Debug)]
pub struct CrawlSession {
    transport: HttpTransport,
    token: Option<String>,
    requests: u64,
    pacer: Pacer,
}

impl CrawlSession {
    /// A session without a token, for plain page fetches.
    pub fn anonymous(transport: HttpTransport, pacer: Pacer) -> Self {
        Self {
            transport,
            token: None,
            requests: 0,
            pacer,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Requests issued through this session, including failed ones.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut HttpTransport {
        &mut self.transport
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// Wait out the pacing gap since the previous request.
    pub async fn pace(&mut self) {
        self.pacer.wait().await;
    }

    /// Count and timestamp a request about to be sent.
    fn record_request(&mut self) {
        self.requests += 1;
        self.pacer.mark();
    }

    pub async fn get_text(&mut self, url: &str) -> Result<String, FetchError> {
        self.record_request();
        self.transport.get_text(url).await
    }

    pub async fn post_form<F>(
        &mut self,
        url: &str,
        form: &F,
        headers: &[(&'static str, String)],
    ) -> Result<String, FetchError>
    where
        F: serde::Serialize + ?Sized,
    {
        self.record_request();
        self.transport.post_form(url, form, headers).await
    }

    /// Close the transport and open a new one with a new identity.
    pub fn rotate(&mut self) -> Result<(), reqwest::Error> {
        self.transport.reset()
    }
}

/// Find the anti-forgery token in a served page.
pub fn extract_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&TOKEN_SELECTOR)
        .filter_map(|input| input.value().attr("value"))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Perform the token handshake against `search_page_url`.
///
/// No retry happens here; the caller decides whether to try again later.
#[instrument(level = "info", skip(timeout, pacer))]
pub async fn establish(
    search_page_url: &str,
    timeout: Duration,
    pacer: Pacer,
) -> Result<CrawlSession, SessionError> {
    let transport = HttpTransport::new(timeout).map_err(SessionError::Client)?;
    let mut session = CrawlSession::anonymous(transport, pacer);

    let html = session
        .get_text(search_page_url)
        .await
        .map_err(SessionError::Request)?;

    let Some(token) = extract_token(&html) else {
        warn!(url = %search_page_url, bytes = html.len(), "anti-forgery token not found");
        return Err(SessionError::TokenMissing {
            url: search_page_url.to_string(),
            field: TOKEN_FIELD.to_string(),
        });
    };

    info!(
        user_agent = %session.transport().user_agent(),
        "authenticated crawl session established"
    );
    session.token = Some(token);
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    const SEARCH_PAGE: &str = r#"<html><body>
        <form id="search">
            <input name="__RequestVerificationToken" type="hidden" value="tok-123" />
            <input name="Keywords" type="text" />
        </form></body></html>"#;

    #[test]
    fn test_extract_token() {
        assert_eq!(extract_token(SEARCH_PAGE).as_deref(), Some("tok-123"));
    }

    #[test]
    fn test_extract_token_missing_or_empty() {
        assert_eq!(extract_token("<html><body><form></form></body></html>"), None);
        assert_eq!(
            extract_token(r#"<input name="__RequestVerificationToken" value="  ">"#),
            None
        );
    }

    #[tokio::test]
    async fn test_establish_returns_session_with_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/en/Search")
            .with_body(SEARCH_PAGE)
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/en/Search", server.url());
        let session = establish(&url, Duration::from_secs(5), Pacer::new(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(session.token(), Some("tok-123"));
        assert_eq!(session.requests(), 1);
        assert!(session.pacer().last_request().is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_establish_fails_without_token() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/tr/Search")
            .with_body("<html><body>maintenance</body></html>")
            .create_async()
            .await;

        let url = format!("{}/tr/Search", server.url());
        let err = establish(&url, Duration::from_secs(5), Pacer::new(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::TokenMissing { .. }));
    }

    #[tokio::test]
    async fn test_establish_fails_on_error_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/tr/Search")
            .with_status(403)
            .create_async()
            .await;

        let url = format!("{}/tr/Search", server.url());
        let err = establish(&url, Duration::from_secs(5), Pacer::new(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Request(_)));
    }
}
