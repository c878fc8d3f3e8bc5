use anyhow::{anyhow, Context, Result};
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::alignment::{ExternalAligner, PassthroughSynchronizer, SubtitleSynchronizer};
use crate::app_config::Config;
use crate::episode::{match_foreign_file, series_slug, EpisodeState, EpisodeTask, SeasonSelection};
use crate::file_utils::FileManager;
use crate::language_utils;
use crate::pipeline::{EpisodePipeline, EpisodeReport, PipelineSettings};
use crate::translation::{BatchPolicy, BatchTranslator, LanguagePair, LlmOracle, TranslationCache, TranslationOracle};

// @module: Application controller for dual subtitle generation

// @const: Season directory names: `Season 1`, `Season_01`, `S01`, `Temporada 2`
static SEASON_DIR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:season|temporada|s|t)[ ._-]*0*(\d+)$").expect("season regex is valid")
});

/// Subtitle extensions picked up from language directories
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "sub"];

/// Issues log written next to the outputs
const ISSUES_LOG_NAME: &str = "dualsub.issues.log";

/// Shared stop signal; tasks that have not started yet finish as cancelled
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What to process in one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Library root holding one directory per season
    pub library: PathBuf,
    /// Series name used for output names
    pub series_name: String,
    pub seasons: SeasonSelection,
    /// Output root; files go to `{output}/{Series_Name}/Season_{N}/`
    pub output_dir: PathBuf,
}

impl RunOptions {
    pub fn new(library: impl Into<PathBuf>, series_name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            library: library.into(),
            series_name: series_name.into(),
            seasons: SeasonSelection::default(),
            output_dir: output_dir.into(),
        }
    }

    pub fn with_seasons(mut self, seasons: SeasonSelection) -> Self {
        self.seasons = seasons;
        self
    }

    /// `{output}/{Series_Name}/Season_{N}`
    pub fn season_output_dir(&self, season: u32) -> PathBuf {
        self.output_dir
            .join(series_slug(&self.series_name))
            .join(format!("Season_{}", season))
    }
}

/// Episode outcomes of one season
#[derive(Debug, Clone)]
pub struct SeasonReport {
    pub season: u32,
    pub episodes: Vec<EpisodeReport>,
    pub duration: Duration,
}

impl SeasonReport {
    pub fn count(&self, state: EpisodeState) -> usize {
        self.episodes.iter().filter(|e| e.state == state).count()
    }
}

/// Everything a run did
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub seasons: Vec<SeasonReport>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn count(&self, state: EpisodeState) -> usize {
        self.seasons.iter().map(|s| s.count(state)).sum()
    }

    pub fn episodes(&self) -> impl Iterator<Item = &EpisodeReport> {
        self.seasons.iter().flat_map(|s| s.episodes.iter())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} seasons: {} saved, {} failed, {} cancelled",
            self.seasons.len(),
            self.count(EpisodeState::Saved),
            self.count(EpisodeState::Failed),
            self.count(EpisodeState::Cancelled)
        )
    }
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    cache: Arc<TranslationCache>,
    pipeline: Arc<EpisodePipeline>,
    cancel: CancellationFlag,
    multi_progress: MultiProgress,
}

impl Controller {
    /// Build the production controller: LLM oracle, on-disk cache and the configured aligner
    pub fn with_config(config: Config) -> Result<Self> {
        let oracle: Arc<dyn TranslationOracle> = Arc::new(LlmOracle::from_config(&config)?);
        let cache = Arc::new(TranslationCache::open(&config.cache.path));

        let synchronizer: Arc<dyn SubtitleSynchronizer> = if config.alignment.enabled {
            let aligner = ExternalAligner::from_config(&config.alignment);
            if !aligner.is_available() {
                warn!(
                    "Alignment tool '{}' is not installed; episodes with foreign subtitles will be fully translated",
                    config.alignment.tool
                );
            }
            Arc::new(aligner)
        } else {
            Arc::new(PassthroughSynchronizer)
        };

        Self::with_components(config, oracle, cache, synchronizer)
    }

    /// Build a controller around caller-provided parts
    pub fn with_components(
        config: Config,
        oracle: Arc<dyn TranslationOracle>,
        cache: Arc<TranslationCache>,
        synchronizer: Arc<dyn SubtitleSynchronizer>,
    ) -> Result<Self> {
        let languages = LanguagePair::from_codes(&config.source_language, &config.target_language)?;
        let translator = Arc::new(BatchTranslator::new(
            oracle,
            Arc::clone(&cache),
            BatchPolicy::from_config(&config.translation.common),
            languages,
        ));
        let pipeline = Arc::new(EpisodePipeline::new(translator, synchronizer, PipelineSettings::from_config(&config)));

        Ok(Self {
            config,
            cache,
            pipeline,
            cancel: CancellationFlag::new(),
            multi_progress: MultiProgress::new(),
        })
    }

    /// Draw progress into `multi_progress` instead of a fresh one
    pub fn with_progress(mut self, multi_progress: MultiProgress) -> Self {
        self.multi_progress = multi_progress;
        self
    }

    /// Controller whose progress bars are never drawn
    pub fn hidden_progress(self) -> Self {
        self.with_progress(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    /// Process the selected seasons one after another
    ///
    /// Episode failures are reported in the summary. The only error returned
    /// is a cache flush failure, after the current season's files are written.
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let start_time = Instant::now();
        let available = Self::discover_seasons(&options.library)?;
        if available.is_empty() {
            return Err(anyhow!("No season directories found in {}", options.library.display()));
        }

        info!(
            "Translating {} from {} to {} with {} ({})",
            options.series_name,
            self.config.source_language,
            self.config.target_language,
            self.config.translation.provider.display_name(),
            self.config.translation.get_model()
        );

        let mut summary = RunSummary::default();
        for season in options.seasons.candidates() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let Some(season_dir) = available.get(&season) else {
                if options.seasons.stops_at_missing() {
                    info!("Season {} not found, stopping", season);
                    break;
                }
                warn!("Season {} not found in {}, skipping", season, options.library.display());
                continue;
            };

            let Some(source_dir) = Self::language_dir(season_dir, &self.config.source_language) else {
                if options.seasons.stops_at_missing() {
                    info!("No '{}' subtitles for season {}, stopping", self.config.source_language, season);
                    break;
                }
                warn!(
                    "No '{}' subtitles in {}, skipping season {}",
                    self.config.source_language,
                    season_dir.display(),
                    season
                );
                continue;
            };

            let report = self.run_season(season, season_dir, &source_dir, options).await?;
            self.write_season_log(&report, options);

            // Flushed per season so finished work survives a crash in the next one
            let flushed = self.flush_cache();
            summary.seasons.push(report);
            flushed?;
        }

        summary.cancelled |= self.cancel.is_cancelled();
        self.flush_cache()?;

        info!("{} in {}", summary, format_duration(start_time.elapsed()));
        Ok(summary)
    }

    async fn run_season(
        &self,
        season: u32,
        season_dir: &Path,
        source_dir: &Path,
        options: &RunOptions,
    ) -> Result<SeasonReport> {
        let start_time = Instant::now();
        let output_dir = options.season_output_dir(season);
        FileManager::ensure_dir(&output_dir)?;

        let tasks = self.build_tasks(season_dir, source_dir, &output_dir, &options.series_name)?;
        info!("Season {}: {} episodes", season, tasks.len());

        let season_pb = self.multi_progress.add(ProgressBar::new(tasks.len() as u64));
        season_pb.set_style(bar_style("episodes"));
        season_pb.set_message(format!("Season {}", season));

        let semaphore = Arc::new(Semaphore::new(self.config.processing.concurrency.max(1)));
        let mut handles = Vec::with_capacity(tasks.len());
        let mut names = Vec::with_capacity(tasks.len());

        for task in tasks {
            names.push(task.display_name());
            let semaphore = Arc::clone(&semaphore);
            let pipeline = Arc::clone(&self.pipeline);
            let cancel = self.cancel.clone();
            let multi_progress = self.multi_progress.clone();
            let season_pb = season_pb.clone();

            handles.push(tokio::spawn(async move {
                let report = match semaphore.acquire_owned().await {
                    Ok(_permit) if !cancel.is_cancelled() => {
                        let episode_pb = multi_progress.insert_after(&season_pb, ProgressBar::new(0));
                        episode_pb.set_style(bar_style("lines"));
                        pipeline.process(&task, &episode_pb).await
                    }
                    Ok(_) => EpisodeReport::new(task.display_name(), EpisodeState::Cancelled),
                    Err(e) => EpisodeReport::failed(task.display_name(), e.to_string()),
                };
                season_pb.inc(1);
                report
            }));
        }

        let episodes: Vec<EpisodeReport> = join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, name)| match joined {
                Ok(report) => report,
                Err(e) => {
                    error!("{}: task aborted: {}", name, e);
                    EpisodeReport::failed(name, format!("task aborted: {}", e))
                }
            })
            .collect();

        let report = SeasonReport {
            season,
            episodes,
            duration: start_time.elapsed(),
        };
        season_pb.finish_with_message(format!(
            "Season {}: {} saved, {} failed",
            season,
            report.count(EpisodeState::Saved),
            report.count(EpisodeState::Failed)
        ));
        Ok(report)
    }

    /// Pair every source subtitle of a season with its foreign counterpart
    fn build_tasks(
        &self,
        season_dir: &Path,
        source_dir: &Path,
        output_dir: &Path,
        series_name: &str,
    ) -> Result<Vec<EpisodeTask>> {
        let source_files = FileManager::find_files(source_dir, SUBTITLE_EXTENSIONS)?;

        let foreign_files = match Self::language_dir(season_dir, &self.config.target_language) {
            Some(dir) => FileManager::find_files(&dir, SUBTITLE_EXTENSIONS)?,
            None => {
                info!("No '{}' subtitles in {}, every line will be translated", self.config.target_language, season_dir.display());
                Vec::new()
            }
        };

        Ok(source_files
            .into_iter()
            .map(|source| {
                let mut task = EpisodeTask::new(source, None, output_dir.to_path_buf(), series_name);
                task.foreign_file = match_foreign_file(&task.tag, &foreign_files);
                task
            })
            .collect())
    }

    /// Season number to directory for every season-like subdirectory of `library`
    pub fn discover_seasons(library: &Path) -> Result<BTreeMap<u32, PathBuf>> {
        if !FileManager::dir_exists(library) {
            return Err(anyhow!("Library directory does not exist: {}", library.display()));
        }

        let mut seasons = BTreeMap::new();
        for dir in FileManager::list_subdirs(library)? {
            let Some(name) = dir.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            let Some(number) = SEASON_DIR_REGEX
                .captures(name.trim())
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            else {
                continue;
            };
            seasons.entry(number).or_insert(dir);
        }
        Ok(seasons)
    }

    /// Subdirectory of `season_dir` named after `language` in any ISO 639 notation
    pub fn language_dir(season_dir: &Path, language: &str) -> Option<PathBuf> {
        FileManager::list_subdirs(season_dir).ok()?.into_iter().find(|dir| {
            dir.file_name()
                .map(|n| language_utils::language_codes_match(&n.to_string_lossy(), language))
                .unwrap_or(false)
        })
    }

    fn flush_cache(&self) -> Result<()> {
        let count = self
            .cache
            .flush_to_disk()
            .context("Translation cache could not be saved")?;
        let (hits, misses, rate) = self.cache.stats();
        info!("Translation cache: {} entries, {} hits, {} misses ({:.0}% hit rate)", count, hits, misses, rate * 100.0);
        Ok(())
    }

    /// Append the season outcome to the issues log in the output root
    fn write_season_log(&self, report: &SeasonReport, options: &RunOptions) {
        let mut content = format!(
            "[{}] {} season {}: {} saved, {} failed, {} cancelled in {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            options.series_name,
            report.season,
            report.count(EpisodeState::Saved),
            report.count(EpisodeState::Failed),
            report.count(EpisodeState::Cancelled),
            format_duration(report.duration)
        );
        for episode in report.episodes.iter().filter(|e| e.state != EpisodeState::Saved) {
            content.push_str(&format!(
                "  {} [{}] {}\n",
                episode.name,
                episode.state,
                episode.error.as_deref().unwrap_or("")
            ));
        }

        let log_path = options.output_dir.join(ISSUES_LOG_NAME);
        if let Err(e) = FileManager::append_to_log_file(&log_path, &content) {
            warn!("Failed to write issues log {}: {}", log_path.display(), e);
        }
    }
}

fn bar_style(unit: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} {{msg}}",
            unit
        ))
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░")
}

/// Format duration in a human-readable format
fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:01}s", seconds, duration.subsec_millis() / 100)
    }
}
