/*!
 * Dual caption composition.
 *
 * The merger is stateful per episode: it remembers the last translation it
 * emitted so a translation repeated on consecutive lines is shown once.
 */

use crate::subtitle_processor::SubtitleFormat;

/// Translations at most this long may repeat on consecutive lines
pub const DEFAULT_ANTI_ECHO_MIN_LEN: usize = 5;

// @struct: One caption after merging
#[derive(Debug, Clone, PartialEq)]
pub struct MergedLine {
    // @field: Source text, first visual line
    pub source: String,

    // @field: Translation for the second visual line, if emitted
    pub translation: Option<String>,

    // @field: Whether the source is colour-marked
    pub highlighted: bool,
}

impl MergedLine {
    /// Caption text in `format`
    pub fn render(&self, format: SubtitleFormat, color: &str) -> String {
        if !self.highlighted {
            return self.source.clone();
        }
        format.compose_dual(&self.source, self.translation.as_deref(), color)
    }
}

/// Combines source text with a translation candidate, one line at a time
#[derive(Debug, Clone)]
pub struct DualMerger {
    anti_echo_min_len: usize,
    last_emitted: String,
}

impl Default for DualMerger {
    fn default() -> Self {
        Self::new(DEFAULT_ANTI_ECHO_MIN_LEN)
    }
}

impl DualMerger {
    pub fn new(anti_echo_min_len: usize) -> Self {
        Self {
            anti_echo_min_len,
            last_emitted: String::new(),
        }
    }

    /// Merge `source_text` with `candidate`
    ///
    /// An empty candidate yields the bare source. A candidate equal to the
    /// previous emitted translation and longer than the anti-echo length
    /// yields the highlighted source alone. Anything else is emitted below
    /// the highlighted source.
    pub fn merge(&mut self, source_text: &str, candidate: &str) -> MergedLine {
        let candidate = candidate.trim();

        if candidate.is_empty() {
            return MergedLine {
                source: source_text.to_string(),
                translation: None,
                highlighted: false,
            };
        }

        if candidate == self.last_emitted && candidate.chars().count() > self.anti_echo_min_len {
            return MergedLine {
                source: source_text.to_string(),
                translation: None,
                highlighted: true,
            };
        }

        self.last_emitted = candidate.to_string();
        MergedLine {
            source: source_text.to_string(),
            translation: Some(candidate.to_string()),
            highlighted: true,
        }
    }

    pub fn last_emitted(&self) -> &str {
        &self.last_emitted
    }
}
