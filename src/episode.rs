/*!
 * Episode identification and season selection.
 *
 * An episode is identified by a season/episode tag parsed from its filename
 * (`S04E07`, `4x07`). The tag names the dual output file and pairs a source
 * subtitle with its foreign-language counterpart.
 */

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::translation::similarity::SimilarityMatcher;

// @const: Season/episode tag, `S04E07`, `s4 e7`, `4x07` or `4e07`
// The `S..E..` form may follow letters directly (`FriendsS04E07`)
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)(?:^|[^0-9])(s(\d{1,2})[ ._-]?e(\d{1,3}))(?:[^0-9]|$)",
        r"|(?:^|[^a-z0-9])((\d{1,2})[xe](\d{1,3}))(?:[^0-9]|$)",
    ))
    .expect("tag regex is valid")
});

/// Upper bound for open-ended season scans
pub const MAX_OPEN_ENDED_SEASONS: u32 = 50;

/// Highest season number accepted in an explicit selection
pub const MAX_SEASON_NUMBER: u32 = 1000;

/// Minimum partial-ratio score for a fuzzy foreign filename match
pub const FOREIGN_MATCH_THRESHOLD: f64 = 0.4;

/// Fallback tag length when no season/episode pattern is present
const FALLBACK_TAG_CHARS: usize = 10;

/// Season/episode identifier extracted from a filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeTag {
    /// Upper-cased tag as it appears in the name, e.g. `S04E07` or `4X07`
    pub label: String,
    /// Parsed (season, episode), absent for fallback tags
    pub numbers: Option<(u32, u32)>,
}

impl EpisodeTag {
    /// Parse a tag from a file stem, falling back to its first characters
    pub fn from_filename(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        if let Some(tag) = Self::parse(&stem) {
            return tag;
        }

        EpisodeTag {
            label: stem.chars().take(FALLBACK_TAG_CHARS).collect::<String>().trim().to_string(),
            numbers: None,
        }
    }

    /// Parse a tag anywhere in `text`
    pub fn parse(text: &str) -> Option<Self> {
        let caps = TAG_REGEX.captures(text)?;
        let (label, season, episode) = match caps.get(1) {
            Some(label) => (label, caps.get(2)?, caps.get(3)?),
            None => (caps.get(4)?, caps.get(5)?, caps.get(6)?),
        };
        let label = label.as_str().to_uppercase().replace([' ', '.', '_', '-'], "");
        let (season, episode) = (season.as_str(), episode.as_str());
        Some(EpisodeTag {
            label,
            numbers: Some((season.parse().ok()?, episode.parse().ok()?)),
        })
    }

    /// Same season and episode, whatever the notation
    pub fn same_episode(&self, other: &EpisodeTag) -> bool {
        match (self.numbers, other.numbers) {
            (Some(a), Some(b)) => a == b,
            _ => self.label.eq_ignore_ascii_case(&other.label),
        }
    }
}

impl fmt::Display for EpisodeTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Find the foreign subtitle belonging to `tag`
///
/// Exact season/episode equality wins; otherwise the filename that best
/// contains the tag text, if it scores above `FOREIGN_MATCH_THRESHOLD`.
pub fn match_foreign_file(tag: &EpisodeTag, candidates: &[PathBuf]) -> Option<PathBuf> {
    if let Some(exact) = candidates.iter().find(|c| {
        let other = EpisodeTag::from_filename(c);
        other.numbers.is_some() && other.same_episode(tag)
    }) {
        return Some(exact.clone());
    }

    // Only fall back to fuzzy matching for tags without numbers,
    // otherwise 4x07 would happily pair with 4x06
    if tag.numbers.is_some() {
        return None;
    }

    let names: Vec<String> = candidates
        .iter()
        .map(|c| c.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default())
        .collect();
    let matcher = SimilarityMatcher::new(FOREIGN_MATCH_THRESHOLD);
    let (best, _score) = matcher.find_best_match(&tag.label, &names)?;
    let idx = names.iter().position(|n| n == best)?;
    Some(candidates[idx].clone())
}

/// Replace spaces so the series name is safe inside filenames
pub fn series_slug(name: &str) -> String {
    name.trim().replace(' ', "_")
}

/// Which seasons the operator asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeasonSelection {
    /// Explicit seasons, sorted and de-duplicated
    List(Vec<u32>),
    /// From season 1 until the first missing season
    UntilMissing,
}

impl SeasonSelection {
    /// Seasons to attempt, in order
    pub fn candidates(&self) -> Vec<u32> {
        match self {
            Self::List(seasons) => seasons.clone(),
            Self::UntilMissing => (1..=MAX_OPEN_ENDED_SEASONS).collect(),
        }
    }

    /// Whether a missing season ends the scan
    pub fn stops_at_missing(&self) -> bool {
        matches!(self, Self::UntilMissing)
    }
}

impl Default for SeasonSelection {
    fn default() -> Self {
        Self::UntilMissing
    }
}

impl FromStr for SeasonSelection {
    type Err = anyhow::Error;

    /// `all`, `todas`, `n` or `1-n` scan until a season is missing;
    /// otherwise a comma list of numbers and `a-b` ranges, e.g. `1,3-5`
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        if matches!(normalized.as_str(), "all" | "todas" | "n" | "1-n" | "") {
            return Ok(Self::UntilMissing);
        }

        let mut seasons = BTreeSet::new();
        for part in normalized.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((from, to)) => {
                    let from: u32 = from.trim().parse().map_err(|_| anyhow!("Invalid season range: {}", part))?;
                    let to: u32 = to.trim().parse().map_err(|_| anyhow!("Invalid season range: {}", part))?;
                    if from == 0 || to < from {
                        return Err(anyhow!("Invalid season range: {}", part));
                    }
                    if to > MAX_SEASON_NUMBER {
                        return Err(anyhow!("Season range {} goes past season {}", part, MAX_SEASON_NUMBER));
                    }
                    seasons.extend(from..=to);
                }
                None => {
                    let season: u32 = part.parse().map_err(|_| anyhow!("Invalid season number: {}", part))?;
                    if season == 0 {
                        return Err(anyhow!("Season numbers start at 1"));
                    }
                    if season > MAX_SEASON_NUMBER {
                        return Err(anyhow!("Season {} is past season {}", season, MAX_SEASON_NUMBER));
                    }
                    seasons.insert(season);
                }
            }
        }

        if seasons.is_empty() {
            return Err(anyhow!("No seasons selected in '{}'", s));
        }
        Ok(Self::List(seasons.into_iter().collect()))
    }
}

/// Lifecycle of one episode task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeState {
    Pending,
    Loading,
    Aligning,
    Translating,
    Merging,
    Saved,
    Failed,
    Cancelled,
}

impl EpisodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Saved | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for EpisodeState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::Aligning => "aligning",
            Self::Translating => "translating",
            Self::Merging => "merging",
            Self::Saved => "saved",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Everything one worker needs to produce a dual subtitle file
#[derive(Debug, Clone)]
pub struct EpisodeTask {
    pub source_file: PathBuf,
    pub foreign_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub series_name: String,
    pub tag: EpisodeTag,
}

impl EpisodeTask {
    pub fn new(source_file: PathBuf, foreign_file: Option<PathBuf>, output_dir: PathBuf, series_name: &str) -> Self {
        let tag = EpisodeTag::from_filename(&source_file);
        Self {
            source_file,
            foreign_file,
            output_dir,
            series_name: series_name.to_string(),
            tag,
        }
    }

    /// `{output_dir}/{Series_Name}_{TAG}_Dual.{ext}`
    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}_Dual.{}",
            series_slug(&self.series_name),
            self.tag,
            extension
        ))
    }

    /// Short name for logs and progress bars
    pub fn display_name(&self) -> String {
        format!("{} {}", self.series_name, self.tag)
    }
}
