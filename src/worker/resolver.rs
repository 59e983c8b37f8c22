//! Per-company search-and-extract step.
//!
//! One resolution is best-effort by contract: whatever goes wrong while
//! querying or scanning the results page degrades to an empty website, it
//! never aborts the caller's loop.

use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::fetch::{FetchError, LinkCandidate, PageSession};

/// Result-link selectors: the primary markup plus a fallback variant the
/// search page serves under some layouts.
pub const RESULT_SELECTORS: &[&str] = &["h2 > a", ".b_algo h2 a"];

/// Domains never accepted as a company's website; these are aggregator and
/// registry sites that routinely outrank the real homepage.
const BLOCKLIST: [&str; 5] = [
    "linkedin.com",
    "bloomberg.com",
    "zaubacorp.com",
    "dnb.com",
    "sgpbusiness.com",
];

/// Characters stripped from company names before they become query terms.
const QUERY_STRIP: [char; 21] = [
    '&', '/', '\\', '#', ',', '+', '(', ')', '$', '~', '%', '.', '\'', '"', ':', '*', '?', '<',
    '>', '{', '}',
];

/// Marker identifying a search-engine outbound-redirect wrapper.
const REDIRECT_MARKER: &str = "alink/link?url=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub website: String,
    pub succeeded: bool,
}

impl Resolution {
    fn empty() -> Self {
        Self {
            website: String::new(),
            succeeded: false,
        }
    }
}

pub struct LinkResolver {
    search_base: String,
    navigation_timeout: Duration,
    selector_timeout: Duration,
}

impl LinkResolver {
    pub fn new(
        search_base: String,
        navigation_timeout: Duration,
        selector_timeout: Duration,
    ) -> Self {
        Self {
            search_base,
            navigation_timeout,
            selector_timeout,
        }
    }

    /// Resolve one company to a candidate website, or empty on any failure.
    pub async fn resolve(&self, company: &str, session: &mut dyn PageSession) -> Resolution {
        match self.try_resolve(company, session).await {
            Ok(website) => {
                let succeeded = !website.is_empty();
                debug!(company, website, succeeded, "company resolved");
                Resolution { website, succeeded }
            }
            Err(err) => {
                warn!(company, error = %err, "resolution failed, recording empty website");
                Resolution::empty()
            }
        }
    }

    async fn try_resolve(
        &self,
        company: &str,
        session: &mut dyn PageSession,
    ) -> Result<String, FetchError> {
        let query = sanitize_query(company);

        if let Err(nav_err) = session
            .navigate(&self.search_url(&query), self.navigation_timeout)
            .await
        {
            // Long names sometimes trip the search page; retry on the first
            // token alone when it carries enough signal.
            let first_token = query.split_whitespace().next().unwrap_or("");
            if first_token.len() <= 3 {
                return Err(nav_err);
            }
            warn!(company, retry_query = first_token, "navigation failed, retrying simplified query");
            session
                .navigate(&self.search_url(first_token), self.navigation_timeout)
                .await?;
        }

        if let Err(err) = session
            .wait_for_any_of(RESULT_SELECTORS, self.selector_timeout)
            .await
        {
            // The page may still hold usable anchors; extract regardless.
            debug!(company, error = %err, "result selectors never appeared, extracting anyway");
        }

        let links = session.extract_links(RESULT_SELECTORS);
        Ok(pick_website(&links).unwrap_or_default())
    }

    fn search_url(&self, query: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        format!("{}?q={}", self.search_base, encoded)
    }
}

/// Replace query-hostile characters with spaces, collapse whitespace runs,
/// trim the ends.
pub fn sanitize_query(company: &str) -> String {
    let replaced: String = company
        .chars()
        .map(|c| if QUERY_STRIP.contains(&c) { ' ' } else { c })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First candidate whose domain survives the blocklist, unwrapped from the
/// redirect wrapper when present.
fn pick_website(links: &[LinkCandidate]) -> Option<String> {
    links
        .iter()
        .map(|link| link.href.as_str())
        .filter(|href| !href.is_empty())
        .find(|href| !is_blocklisted(href))
        .map(decode_redirect)
}

fn is_blocklisted(href: &str) -> bool {
    match Url::parse(href) {
        Ok(url) => url
            .host_str()
            .map(|host| {
                BLOCKLIST
                    .iter()
                    .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
            })
            .unwrap_or(false),
        // Not parseable as a URL: fall back to substring rejection so a
        // blocklisted domain can never slip through.
        Err(_) => BLOCKLIST.iter().any(|domain| href.contains(domain)),
    }
}

/// Unwrap the destination from a search-engine outbound-redirect href.
///
/// Best effort over two fixed percent-encoded markers: the tail after the
/// encoded `://`, truncated at the encoded `/&source` boundary. Anything
/// shaped differently comes back empty rather than half-decoded.
fn decode_redirect(href: &str) -> String {
    if !href.contains(REDIRECT_MARKER) {
        return href.to_string();
    }

    match href.split_once("%3a%2f%2f") {
        Some((_, tail)) => match tail.split_once("%2f&source") {
            Some((website, _)) => website.to_string(),
            None => tail.to_string(),
        },
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::fetch::mock::{MockPage, ScriptedFetcher, SessionLog};
    use crate::fetch::PageFetcher;

    fn resolver() -> LinkResolver {
        LinkResolver::new(
            "https://search.example/search".to_string(),
            Duration::from_millis(50),
            Duration::from_millis(20),
        )
    }

    async fn resolve_with(
        steps: Vec<Result<MockPage, String>>,
        company: &str,
    ) -> (Resolution, Arc<Mutex<SessionLog>>) {
        let fetcher = ScriptedFetcher::new(steps);
        let log = fetcher.log();
        let mut session = fetcher.acquire_session().await.expect("session");
        let resolution = resolver().resolve(company, session.as_mut()).await;
        session.close().await;
        (resolution, log)
    }

    #[test]
    fn sanitize_replaces_special_characters_and_collapses_spaces() {
        assert_eq!(sanitize_query("Acme & Sons, Inc."), "Acme Sons Inc");
        assert_eq!(sanitize_query("  spaced   out  "), "spaced out");
        assert_eq!(sanitize_query("a/b\\c#d%e"), "a b c d e");
        assert_eq!(sanitize_query("{*?}"), "");
    }

    #[test]
    fn blocklist_matches_domains_and_subdomains() {
        assert!(is_blocklisted("https://linkedin.com/company/acme"));
        assert!(is_blocklisted("https://www.linkedin.com/company/acme"));
        assert!(is_blocklisted("https://sub.dnb.com/x"));
        assert!(!is_blocklisted("https://acme.com/about"));
        // Similar-looking but distinct hosts pass.
        assert!(!is_blocklisted("https://notlinkedin.example/"));
    }

    #[test]
    fn redirect_wrapper_decodes_to_destination() {
        let href =
            "https://search.example/alink/link?url=http%3a%2f%2fexample.com%2f&source=serp&h=1";
        assert_eq!(decode_redirect(href), "example.com");
    }

    #[test]
    fn redirect_without_source_marker_keeps_tail() {
        let href = "https://search.example/alink/link?url=http%3a%2f%2fexample.com";
        assert_eq!(decode_redirect(href), "example.com");
    }

    #[test]
    fn plain_href_passes_through_untouched() {
        assert_eq!(
            decode_redirect("https://acme.com/about"),
            "https://acme.com/about"
        );
    }

    #[tokio::test]
    async fn first_non_blocklisted_link_wins() {
        let page = MockPage::with_links(&[
            ("Acme on LinkedIn", "https://linkedin.com/acme"),
            ("Acme Corp", "https://acme.com"),
            ("Acme news", "https://news.example/acme"),
        ]);

        let (resolution, _) = resolve_with(vec![Ok(page)], "Acme Corp").await;

        assert_eq!(resolution.website, "https://acme.com");
        assert!(resolution.succeeded);
    }

    #[tokio::test]
    async fn all_blocklisted_means_no_website() {
        let page = MockPage::with_links(&[
            ("LinkedIn", "https://linkedin.com/a"),
            ("Bloomberg", "https://bloomberg.com/b"),
        ]);

        let (resolution, _) = resolve_with(vec![Ok(page)], "Acme").await;

        assert_eq!(resolution.website, "");
        assert!(!resolution.succeeded);
    }

    #[tokio::test]
    async fn empty_extraction_degrades_to_failure() {
        let (resolution, _) = resolve_with(vec![Ok(MockPage::empty())], "Acme").await;

        assert_eq!(resolution.website, "");
        assert!(!resolution.succeeded);
    }

    #[tokio::test]
    async fn selector_miss_still_extracts() {
        // Selectors report absent, but anchors are extractable anyway.
        let page = MockPage {
            selectors_present: false,
            links: vec![crate::fetch::LinkCandidate {
                text: "Acme".to_string(),
                href: "https://acme.com".to_string(),
            }],
        };

        let (resolution, _) = resolve_with(vec![Ok(page)], "Acme").await;

        assert_eq!(resolution.website, "https://acme.com");
        assert!(resolution.succeeded);
    }

    #[tokio::test]
    async fn navigation_failure_retries_with_first_token() {
        let steps = vec![
            Err("connection reset".to_string()),
            Ok(MockPage::with_links(&[("Monolith", "https://monolith.example")])),
        ];

        let (resolution, log) = resolve_with(steps, "Monolith Heavy Industries").await;

        assert_eq!(resolution.website, "https://monolith.example");
        let log = log.lock().unwrap();
        assert_eq!(log.visited.len(), 2);
        assert!(log.visited[1].ends_with("?q=Monolith"));
    }

    #[tokio::test]
    async fn short_first_token_does_not_retry() {
        let steps = vec![Err("connection reset".to_string())];

        let (resolution, log) = resolve_with(steps, "ABC & Co").await;

        assert!(!resolution.succeeded);
        assert_eq!(log.lock().unwrap().visited.len(), 1);
    }

    #[tokio::test]
    async fn retry_failure_degrades_instead_of_erroring() {
        let steps = vec![
            Err("connection reset".to_string()),
            Err("still down".to_string()),
        ];

        let (resolution, log) = resolve_with(steps, "Monolith Heavy Industries").await;

        assert!(!resolution.succeeded);
        assert_eq!(log.lock().unwrap().visited.len(), 2);
    }
}
