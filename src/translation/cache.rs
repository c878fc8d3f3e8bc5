/*!
 * Persistent translation cache.
 *
 * Maps normalized source text to its translation. The map lives behind a
 * single lock shared by every episode task, is loaded once at startup and is
 * written back wholesale at season boundaries.
 */

use anyhow::{Context, Result};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::file_utils::FileManager;

/// Prefix of sentinel values that must never be cached
pub const ERROR_MARKER_PREFIX: &str = "[ERROR";

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, String>,
    hits: usize,
    misses: usize,
}

/// Translation cache for storing and retrieving translations
#[derive(Debug)]
pub struct TranslationCache {
    /// Backing JSON file
    path: PathBuf,

    /// Map and counters, one lock for all of it
    state: Mutex<CacheState>,
}

impl TranslationCache {
    /// Create an empty cache bound to `path`; nothing is read yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Create a cache and load whatever `path` holds
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let cache = Self::new(path);
        cache.load_from_disk();
        cache
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a translation from the cache
    pub fn get(&self, source_text: &str) -> Option<String> {
        let key = normalize_key(source_text);
        if key.is_empty() {
            return None;
        }

        let mut state = self.state.lock();
        match state.entries.get(key).cloned() {
            Some(translation) => {
                state.hits += 1;
                debug!("Cache hit for '{}'", truncate_text(key, 30));
                Some(translation)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Store a translation; empty and error-marked values are ignored
    pub fn put(&self, source_text: &str, translation: &str) -> bool {
        let key = normalize_key(source_text);
        let value = translation.trim();
        if key.is_empty() || value.is_empty() || value.starts_with(ERROR_MARKER_PREFIX) {
            return false;
        }

        self.state.lock().entries.insert(key.to_string(), value.to_string());
        debug!("Cached translation for '{}'", truncate_text(key, 30));
        true
    }

    /// Replace the in-memory map with the file contents
    ///
    /// A missing or unreadable file leaves the cache empty; this never fails.
    pub fn load_from_disk(&self) -> usize {
        let loaded = match Self::read_file(&self.path) {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                info!("No translation cache at {}, starting empty", self.path.display());
                HashMap::new()
            }
            Err(e) => {
                warn!("Ignoring unreadable translation cache {}: {:#}", self.path.display(), e);
                HashMap::new()
            }
        };

        let mut state = self.state.lock();
        state.entries = loaded
            .into_iter()
            .filter(|(k, v)| {
                !k.trim().is_empty() && !v.trim().is_empty() && !v.starts_with(ERROR_MARKER_PREFIX)
            })
            .map(|(k, v)| (k.trim().to_string(), v))
            .collect();
        let count = state.entries.len();
        if count > 0 {
            info!("Loaded {} cached translations from {}", count, self.path.display());
        }
        count
    }

    /// Write the whole map to disk while holding the lock
    pub fn flush_to_disk(&self) -> Result<usize> {
        let state = self.state.lock();
        // Sorted keys keep the file diffable between runs
        let sorted: BTreeMap<&String, &String> = state.entries.iter().collect();
        let json = serde_json::to_string_pretty(&sorted).context("Failed to serialize translation cache")?;
        FileManager::write_atomic(&self.path, &json)
            .with_context(|| format!("Failed to write translation cache {}", self.path.display()))?;
        debug!("Flushed {} cached translations to {}", sorted.len(), self.path.display());
        Ok(sorted.len())
    }

    /// Get cache statistics: hits, misses and hit rate
    pub fn stats(&self) -> (usize, usize, f64) {
        let state = self.state.lock();
        let total = state.hits + state.misses;
        let hit_rate = if total > 0 {
            state.hits as f64 / total as f64
        } else {
            0.0
        };
        (state.hits, state.misses, hit_rate)
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    fn read_file(path: &Path) -> Result<Option<HashMap<String, String>>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Some(HashMap::new()));
        }
        let entries = serde_json::from_str(&content).context("Cache file is not a JSON object of strings")?;
        Ok(Some(entries))
    }
}

/// Cache keys are compared after trimming surrounding whitespace
pub fn normalize_key(text: &str) -> &str {
    text.trim()
}

/// Truncate text to a maximum number of chars with ellipsis
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}
