use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::{FetchError, LinkCandidate, PageFetcher, PageSession};

/// Desktop user agent; search pages serve a stripped-down markup variant
/// to unknown clients.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Page fetcher backed by a plain HTTP client.
///
/// Responses are kept as raw HTML on the session; `scraper::Html` is only
/// materialized inside the synchronous calls, so the session stays `Send`.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .gzip(true)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(FetchError::Session)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn acquire_session(&self) -> Result<Box<dyn PageSession>, FetchError> {
        debug!("acquiring http page session");
        Ok(Box::new(HttpPageSession {
            client: self.client.clone(),
            page_url: None,
            document: None,
        }))
    }
}

struct HttpPageSession {
    client: reqwest::Client,
    /// Final URL after redirects, used to resolve relative hrefs.
    page_url: Option<Url>,
    document: Option<String>,
}

#[async_trait]
impl PageSession for HttpPageSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), FetchError> {
        let navigation_error = |reason: String| FetchError::Navigation {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| navigation_error(err.to_string()))?;

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|err| navigation_error(err.to_string()))?;

        debug!(url, bytes = body.len(), "page loaded");
        self.page_url = Some(final_url);
        self.document = Some(body);
        Ok(())
    }

    async fn wait_for_any_of(
        &mut self,
        selectors: &[&str],
        timeout: Duration,
    ) -> Result<(), FetchError> {
        // A plain HTTP fetch renders nothing after the response arrives;
        // either the selectors match the document we already have or they
        // never will, so a miss reports the timeout immediately.
        let matched = self
            .document
            .as_deref()
            .map(|html| any_selector_matches(html, selectors))
            .unwrap_or(false);

        if matched {
            Ok(())
        } else {
            Err(FetchError::SelectorTimeout { waited: timeout })
        }
    }

    fn extract_links(&self, selectors: &[&str]) -> Vec<LinkCandidate> {
        let Some(html) = self.document.as_deref() else {
            return Vec::new();
        };

        let joined = selectors.join(", ");
        let selector = match Selector::parse(&joined) {
            Ok(selector) => selector,
            Err(err) => {
                warn!(selectors = %joined, error = %err, "invalid link selector");
                return Vec::new();
            }
        };

        let document = Html::parse_document(html);
        document
            .select(&selector)
            .filter_map(|element| {
                let href = element.value().attr("href")?;
                let href = match &self.page_url {
                    Some(base) => base
                        .join(href)
                        .map(|absolute| absolute.to_string())
                        .unwrap_or_else(|_| href.to_string()),
                    None => href.to_string(),
                };
                let text = element.text().collect::<String>().trim().to_string();
                Some(LinkCandidate { text, href })
            })
            .collect()
    }

    async fn close(self: Box<Self>) {
        debug!("http page session closed");
    }
}

fn any_selector_matches(html: &str, selectors: &[&str]) -> bool {
    let document = Html::parse_document(html);
    selectors.iter().any(|raw| match Selector::parse(raw) {
        Ok(selector) => document.select(&selector).next().is_some(),
        Err(err) => {
            warn!(selector = raw, error = %err, "invalid readiness selector");
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(html: &str, base: &str) -> HttpPageSession {
        HttpPageSession {
            client: reqwest::Client::new(),
            page_url: Some(Url::parse(base).expect("test base url")),
            document: Some(html.to_string()),
        }
    }

    #[test]
    fn extracts_links_in_document_order() {
        let html = r#"
            <html><body>
              <h2><a href="https://first.example/">First hit</a></h2>
              <div class="b_algo"><h2><a href="/second">Second hit</a></h2></div>
            </body></html>
        "#;
        let session = session_with(html, "https://search.example/results");

        let links = session.extract_links(&["h2 > a", ".b_algo h2 a"]);

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].href, "https://first.example/");
        assert_eq!(links[0].text, "First hit");
        // Relative hrefs resolve against the page URL.
        assert_eq!(links[1].href, "https://search.example/second");
    }

    #[test]
    fn skips_anchors_without_href() {
        let html = "<h2><a>no target</a></h2>";
        let session = session_with(html, "https://search.example/");

        assert!(session.extract_links(&["h2 > a"]).is_empty());
    }

    #[test]
    fn selector_match_reflects_document_contents() {
        let html = r#"<div class="b_algo"><h2><a href="https://x.example">x</a></h2></div>"#;
        assert!(any_selector_matches(html, &["h2 > a", ".b_algo h2 a"]));
        assert!(!any_selector_matches("<p>empty results</p>", &["h2 > a"]));
    }

    #[tokio::test]
    async fn wait_reports_timeout_when_nothing_loaded() {
        let mut session = HttpPageSession {
            client: reqwest::Client::new(),
            page_url: None,
            document: None,
        };

        let result = session
            .wait_for_any_of(&["h2 > a"], Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(FetchError::SelectorTimeout { .. })));
    }
}
