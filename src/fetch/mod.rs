//! Search-page fetching behind a narrow session contract.
//!
//! The resolver only needs three capabilities from a loaded page: navigate
//! to a URL, confirm result links are present, and extract anchor
//! candidates. Keeping that behind a trait lets the engine run against the
//! HTTP implementation in production and a scripted double in tests.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod http;
#[cfg(test)]
pub mod mock;

pub use http::HttpPageFetcher;

/// One anchor element extracted from the current page, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    pub text: String,
    pub href: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// The page could not be loaded within the timeout.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// None of the expected selectors matched the loaded page. Callers
    /// treat this as a degraded page, not a failure.
    #[error("no result selector matched within {waited:?}")]
    SelectorTimeout { waited: Duration },

    /// The underlying client could not be constructed.
    #[error("failed to initialize fetch session: {0}")]
    Session(#[source] reqwest::Error),
}

/// Factory for page sessions. A session is exclusively owned by one
/// running job engine and must be closed on every exit path.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn acquire_session(&self) -> Result<Box<dyn PageSession>, FetchError>;
}

/// A single browsing context holding at most one loaded document.
#[async_trait]
pub trait PageSession: Send {
    /// Load `url`, replacing the current document.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), FetchError>;

    /// Wait until any of `selectors` matches the current document.
    async fn wait_for_any_of(
        &mut self,
        selectors: &[&str],
        timeout: Duration,
    ) -> Result<(), FetchError>;

    /// Extract `(text, href)` pairs for all elements matching `selectors`
    /// from the current document. Empty when nothing is loaded.
    fn extract_links(&self, selectors: &[&str]) -> Vec<LinkCandidate>;

    /// Release the session and any resources it holds.
    async fn close(self: Box<Self>);
}
