//! Scripted page fetcher for resolver and engine tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{FetchError, LinkCandidate, PageFetcher, PageSession};

/// One pre-scripted page, handed out on a successful navigation.
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub selectors_present: bool,
    pub links: Vec<LinkCandidate>,
}

impl MockPage {
    pub fn with_links(pairs: &[(&str, &str)]) -> Self {
        Self {
            selectors_present: !pairs.is_empty(),
            links: pairs
                .iter()
                .map(|(text, href)| LinkCandidate {
                    text: text.to_string(),
                    href: href.to_string(),
                })
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Observable trace of what the session did, shared with the test body.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub visited: Vec<String>,
    pub closed: bool,
}

/// Fetcher whose sessions replay a fixed sequence of navigation outcomes.
/// Each `navigate` call consumes the next step: `Ok(page)` loads that page,
/// `Err(reason)` fails the navigation.
pub struct ScriptedFetcher {
    steps: Mutex<VecDeque<Result<MockPage, String>>>,
    log: Arc<Mutex<SessionLog>>,
}

impl ScriptedFetcher {
    pub fn new(steps: Vec<Result<MockPage, String>>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            log: Arc::new(Mutex::new(SessionLog::default())),
        }
    }

    pub fn log(&self) -> Arc<Mutex<SessionLog>> {
        self.log.clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn acquire_session(&self) -> Result<Box<dyn PageSession>, FetchError> {
        let steps = std::mem::take(&mut *self.steps.lock().unwrap());
        Ok(Box::new(ScriptedSession {
            steps,
            current: None,
            log: self.log.clone(),
        }))
    }
}

struct ScriptedSession {
    steps: VecDeque<Result<MockPage, String>>,
    current: Option<MockPage>,
    log: Arc<Mutex<SessionLog>>,
}

#[async_trait]
impl PageSession for ScriptedSession {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), FetchError> {
        self.log.lock().unwrap().visited.push(url.to_string());
        match self.steps.pop_front() {
            Some(Ok(page)) => {
                self.current = Some(page);
                Ok(())
            }
            Some(Err(reason)) => {
                self.current = None;
                Err(FetchError::Navigation {
                    url: url.to_string(),
                    reason,
                })
            }
            None => Err(FetchError::Navigation {
                url: url.to_string(),
                reason: "script exhausted".to_string(),
            }),
        }
    }

    async fn wait_for_any_of(
        &mut self,
        _selectors: &[&str],
        timeout: Duration,
    ) -> Result<(), FetchError> {
        let present = self
            .current
            .as_ref()
            .map(|page| page.selectors_present)
            .unwrap_or(false);
        if present {
            Ok(())
        } else {
            Err(FetchError::SelectorTimeout { waited: timeout })
        }
    }

    fn extract_links(&self, _selectors: &[&str]) -> Vec<LinkCandidate> {
        self.current
            .as_ref()
            .map(|page| page.links.clone())
            .unwrap_or_default()
    }

    async fn close(self: Box<Self>) {
        self.log.lock().unwrap().closed = true;
    }
}
