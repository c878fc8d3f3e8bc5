/*!
 * Mock translation oracle for testing.
 *
 * This module provides a scripted oracle that simulates different behaviors:
 * - `MockBehavior::Working` - Always answers with a fake translation
 * - `MockBehavior::Echo` - Returns the source text unchanged
 * - `MockBehavior::ShortResponse` - Drops the last item of every batch
 * - `MockBehavior::Failing` - Always fails with an error
 *
 * The `*First` variants misbehave for the first N batch calls, then work.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::translation::oracle::{BatchRequest, BatchResponse, TranslationOracle};

/// Behavior mode for the mock oracle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a fake translation
    Working,
    /// Returns the input untouched
    Echo,
    /// Echoes the first `n` batch calls
    EchoFirst(usize),
    /// Returns one item fewer than requested
    ShortResponse,
    /// Short responses for the first `n` batch calls
    ShortFirst(usize),
    /// Every call is answered with HTTP 429
    RateLimited,
    /// HTTP 429 for the first `n` batch calls
    RateLimitedFirst(usize),
    /// Every call fails with a server error
    Failing,
}

/// Scripted oracle with call counters and a request log
#[derive(Debug)]
pub struct MockOracle {
    behavior: MockBehavior,
    /// Fixed answers checked before the fake translation
    dictionary: HashMap<String, String>,
    /// Simulated latency per call
    delay: Option<Duration>,
    batch_calls: AtomicUsize,
    line_calls: AtomicUsize,
    requests: Mutex<Vec<BatchRequest>>,
}

impl MockOracle {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            dictionary: HashMap::new(),
            delay: None,
            batch_calls: AtomicUsize::new(0),
            line_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a working mock oracle that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Answer `source` with `translation` instead of the fake translation
    pub fn with_translation(mut self, source: impl Into<String>, translation: impl Into<String>) -> Self {
        self.dictionary.insert(source.into(), translation.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Deterministic stand-in for a translation: ROT13 over ASCII letters
    pub fn fake_translate(text: &str) -> String {
        text.chars()
            .map(|c| match c {
                'a'..='z' => (((c as u8 - b'a' + 13) % 26) + b'a') as char,
                'A'..='Z' => (((c as u8 - b'A' + 13) % 26) + b'A') as char,
                _ => c,
            })
            .collect()
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn line_calls(&self) -> usize {
        self.line_calls.load(Ordering::SeqCst)
    }

    /// Every batch request received so far, in call order
    pub fn requests(&self) -> Vec<BatchRequest> {
        self.requests.lock().clone()
    }

    fn translate(&self, text: &str) -> String {
        self.dictionary
            .get(text)
            .cloned()
            .unwrap_or_else(|| Self::fake_translate(text))
    }

    fn rate_limit_error() -> ProviderError {
        ProviderError::from_status(429, "RESOURCE_EXHAUSTED: quota exceeded")
    }

    fn server_error() -> ProviderError {
        ProviderError::from_status(500, "mock oracle failure")
    }
}

#[async_trait]
impl TranslationOracle for MockOracle {
    async fn translate_batch(&self, request: &BatchRequest) -> Result<BatchResponse, ProviderError> {
        // Zero-based index of this call
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let translated = || request.items.iter().map(|s| self.translate(s)).collect::<Vec<_>>();
        let short = || {
            let mut items = translated();
            items.pop();
            items
        };

        let translations = match self.behavior {
            MockBehavior::Working => translated(),
            MockBehavior::Echo => request.items.clone(),
            MockBehavior::EchoFirst(n) if call < n => request.items.clone(),
            MockBehavior::EchoFirst(_) => translated(),
            MockBehavior::ShortResponse => short(),
            MockBehavior::ShortFirst(n) if call < n => short(),
            MockBehavior::ShortFirst(_) => translated(),
            MockBehavior::RateLimited => return Err(Self::rate_limit_error()),
            MockBehavior::RateLimitedFirst(n) if call < n => return Err(Self::rate_limit_error()),
            MockBehavior::RateLimitedFirst(_) => translated(),
            MockBehavior::Failing => return Err(Self::server_error()),
        };

        Ok(BatchResponse::new(translations))
    }

    async fn translate_line(&self, text: &str) -> Result<String, ProviderError> {
        self.line_calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            MockBehavior::Failing => Err(Self::server_error()),
            MockBehavior::RateLimited => Err(Self::rate_limit_error()),
            _ => Ok(self.translate(text)),
        }
    }
}
