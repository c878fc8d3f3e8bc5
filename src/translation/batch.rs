/*!
 * Batch translation processing.
 *
 * Lines already in the cache are answered locally. The rest go to the oracle
 * in a single ordered batch that is retried, validated and checked for
 * untranslated echoes. Failed small batches fall back to one call per line.
 */

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::TranslationCommonConfig;
use crate::errors::TranslationError;

use super::cache::{TranslationCache, ERROR_MARKER_PREFIX};
use super::oracle::{BatchRequest, LanguagePair, TranslationOracle};
use super::prompts;
use super::similarity::sequence_ratio;

/// Sentinel written into slots the oracle never answered
pub const ERROR_SENTINEL: &str = "[ERROR API]";

/// Retry and validation knobs for one batch
#[derive(Debug, Clone)]
pub struct BatchPolicy {
    /// Lines per oracle call
    pub batch_size: usize,
    /// Oracle attempts per batch
    pub max_attempts: u32,
    /// Back-off after a rate-limit signal
    pub rate_limit_wait: Duration,
    /// Ratio above which a response is treated as an untranslated echo
    pub echo_threshold: f64,
    /// Leading lines sampled by the echo check
    pub echo_sample_size: usize,
    /// Failed batches with fewer items get per-line emergency calls
    pub emergency_max_items: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::from_config(&TranslationCommonConfig::default())
    }
}

impl BatchPolicy {
    pub fn from_config(config: &TranslationCommonConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            max_attempts: config.max_attempts.max(1),
            rate_limit_wait: config.rate_limit_wait(),
            echo_threshold: config.echo_threshold,
            echo_sample_size: config.echo_sample_size.max(1),
            emergency_max_items: config.emergency_max_items,
        }
    }
}

/// One resolved slot of a fetched batch
struct Resolved {
    text: String,
    /// Whether the value is a real translation worth caching
    cacheable: bool,
}

/// Batch translator for subtitle lines
pub struct BatchTranslator {
    oracle: Arc<dyn TranslationOracle>,
    cache: Arc<TranslationCache>,
    policy: BatchPolicy,
    languages: LanguagePair,
}

impl BatchTranslator {
    pub fn new(oracle: Arc<dyn TranslationOracle>, cache: Arc<TranslationCache>, policy: BatchPolicy, languages: LanguagePair) -> Self {
        Self {
            oracle,
            cache,
            policy,
            languages,
        }
    }

    pub fn policy(&self) -> &BatchPolicy {
        &self.policy
    }

    /// Translate `lines`, returning one output per input in the same order
    ///
    /// Blank lines stay blank and never reach the oracle. Oracle failures
    /// never escape: unanswered slots hold `ERROR_SENTINEL` or, after an
    /// emergency per-line attempt, the translation or the source text.
    pub async fn translate_batch(&self, lines: &[String]) -> Vec<String> {
        let mut output: Vec<String> = Vec::with_capacity(lines.len());
        let mut to_fetch: Vec<(usize, String)> = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let key = line.trim();
            if key.is_empty() {
                output.push(line.clone());
                continue;
            }
            match self.cache.get(key) {
                Some(hit) => output.push(hit),
                None => {
                    output.push(String::new());
                    to_fetch.push((index, key.to_string()));
                }
            }
        }

        if to_fetch.is_empty() {
            debug!("All {} lines answered from cache", lines.len());
            return output;
        }

        let sources: Vec<String> = to_fetch.iter().map(|(_, text)| text.clone()).collect();
        let resolved = match self.fetch_with_retries(&sources).await {
            Ok(translations) => translations
                .into_iter()
                .map(|text| Resolved { text, cacheable: true })
                .collect(),
            Err(e) => {
                warn!("Batch of {} lines failed: {}", sources.len(), e);
                self.fallback(&sources).await
            }
        };

        for ((index, source), slot) in to_fetch.into_iter().zip(resolved) {
            if slot.cacheable && !slot.text.starts_with(ERROR_MARKER_PREFIX) {
                self.cache.put(&source, &slot.text);
            }
            output[index] = slot.text;
        }

        output
    }

    /// Split into `batch_size` chunks and translate them in order
    ///
    /// `on_batch(done, total)` is called after every chunk.
    pub async fn translate_all<F>(&self, lines: &[String], mut on_batch: F) -> Vec<String>
    where
        F: FnMut(usize, usize) + Send,
    {
        let total = lines.len().div_ceil(self.policy.batch_size);
        let mut output = Vec::with_capacity(lines.len());

        for (i, chunk) in lines.chunks(self.policy.batch_size).enumerate() {
            output.extend(self.translate_batch(chunk).await);
            on_batch(i + 1, total);
        }

        output
    }

    /// Up to `max_attempts` oracle calls; the first acceptable answer wins
    async fn fetch_with_retries(&self, sources: &[String]) -> Result<Vec<String>, TranslationError> {
        let mut request = BatchRequest::new(sources.to_vec());
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.policy.max_attempts {
            match self.attempt(&request).await {
                Ok(translations) => {
                    if attempt > 1 {
                        info!("Batch accepted on attempt {}/{}", attempt, self.policy.max_attempts);
                    }
                    return Ok(translations);
                }
                Err(TranslationError::LazyTranslation { ratio }) => {
                    warn!(
                        "Attempt {}/{}: response looks untranslated ({:.2}), reinforcing prompt",
                        attempt, self.policy.max_attempts, ratio
                    );
                    request.add_correction(prompts::echo_correction(&self.languages));
                    last_error = format!("untranslated response (similarity {:.2})", ratio);
                }
                Err(TranslationError::RateLimited(message)) => {
                    warn!("Attempt {}/{}: rate limited: {}", attempt, self.policy.max_attempts, message);
                    last_error = message;
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.rate_limit_wait).await;
                    }
                }
                Err(e) => {
                    warn!("Attempt {}/{} failed: {}", attempt, self.policy.max_attempts, e);
                    last_error = e.to_string();
                }
            }
        }

        Err(TranslationError::Exhausted {
            attempts: self.policy.max_attempts,
            last: last_error,
        })
    }

    /// One oracle call plus shape and echo validation
    async fn attempt(&self, request: &BatchRequest) -> Result<Vec<String>, TranslationError> {
        let response = self
            .oracle
            .translate_batch(request)
            .await
            .map_err(TranslationError::from_provider)?;

        response.validate_against(request)?;

        let ratio = echo_ratio(&request.items, &response.translations, self.policy.echo_sample_size);
        if ratio > self.policy.echo_threshold {
            return Err(TranslationError::LazyTranslation { ratio });
        }

        Ok(response.translations)
    }

    /// Emergency per-line calls for small batches, sentinels otherwise
    async fn fallback(&self, sources: &[String]) -> Vec<Resolved> {
        if sources.len() >= self.policy.emergency_max_items {
            return sources
                .iter()
                .map(|_| Resolved {
                    text: ERROR_SENTINEL.to_string(),
                    cacheable: false,
                })
                .collect();
        }

        info!("Emergency line-by-line translation for {} lines", sources.len());
        let mut resolved = Vec::with_capacity(sources.len());
        for source in sources {
            let slot = match self.oracle.translate_line(source).await {
                Ok(text) if !text.trim().is_empty() => Resolved {
                    text: text.trim().to_string(),
                    cacheable: true,
                },
                Ok(_) => Resolved {
                    text: source.clone(),
                    cacheable: false,
                },
                Err(e) => {
                    warn!("Emergency translation failed for '{}': {}", source, e);
                    Resolved {
                        text: source.clone(),
                        cacheable: false,
                    }
                }
            };
            resolved.push(slot);
        }
        resolved
    }
}

/// Similarity of the first `sample` sources and candidates, case-folded and space-joined
pub fn echo_ratio(sources: &[String], candidates: &[String], sample: usize) -> f64 {
    let join = |items: &[String]| {
        items
            .iter()
            .take(sample)
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    };
    sequence_ratio(&join(sources), &join(candidates))
}
