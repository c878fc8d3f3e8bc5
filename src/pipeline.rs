/*!
 * Single-episode processing.
 *
 * `EpisodePipeline::process` walks one `EpisodeTask` through
 * `Loading → Aligning → Translating → Merging → Saved`. Foreign text that
 * overlaps a source line is used as its translation; only uncovered lines
 * reach the batch translator. Every failure ends the task in `Failed` and
 * stays inside it.
 */

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::alignment::{overlap_text, SubtitleSynchronizer};
use crate::app_config::Config;
use crate::episode::{EpisodeState, EpisodeTask};
use crate::merge::DualMerger;
use crate::subtitle_processor::{clean_text, SubtitleLine, SubtitleTrack, TextEncoding};
use crate::translation::BatchTranslator;

/// Result of one episode task
#[derive(Debug, Clone)]
pub struct EpisodeReport {
    /// Series and tag, e.g. `Friends S01E01`
    pub name: String,
    /// Terminal state
    pub state: EpisodeState,
    /// Written dual file, when saved
    pub output: Option<PathBuf>,
    /// Source lines in the episode
    pub lines: usize,
    /// Lines whose translation came from the foreign track
    pub from_foreign: usize,
    /// Lines sent to the batch translator
    pub translated: usize,
    /// Failure description for `Failed` tasks
    pub error: Option<String>,
}

impl EpisodeReport {
    pub fn new(name: impl Into<String>, state: EpisodeState) -> Self {
        Self {
            name: name.into(),
            state,
            output: None,
            lines: 0,
            from_foreign: 0,
            translated: 0,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(name, EpisodeState::Failed)
        }
    }
}

/// Per-episode settings taken from `Config`
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub encodings: Vec<TextEncoding>,
    pub microdvd_fps: f64,
    pub source_color: String,
    pub anti_echo_min_len: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            encodings: config.processing.encodings.clone(),
            microdvd_fps: config.processing.microdvd_fps,
            source_color: config.output.source_color.clone(),
            anti_echo_min_len: config.output.anti_echo_min_len,
        }
    }
}

/// Shared, read-only machinery every episode worker uses
pub struct EpisodePipeline {
    translator: Arc<BatchTranslator>,
    synchronizer: Arc<dyn SubtitleSynchronizer>,
    settings: PipelineSettings,
}

impl EpisodePipeline {
    pub fn new(translator: Arc<BatchTranslator>, synchronizer: Arc<dyn SubtitleSynchronizer>, settings: PipelineSettings) -> Self {
        Self {
            translator,
            synchronizer,
            settings,
        }
    }

    /// Run one task to a terminal state; never returns an error
    pub async fn process(&self, task: &EpisodeTask, progress: &ProgressBar) -> EpisodeReport {
        let name = task.display_name();
        match self.run(task, progress).await {
            Ok(report) => {
                progress.finish_and_clear();
                report
            }
            Err(e) => {
                warn!("{}: {}: {:#}", name, EpisodeState::Failed, e);
                progress.abandon_with_message(format!("{} failed", name));
                EpisodeReport::failed(name, format!("{:#}", e))
            }
        }
    }

    async fn run(&self, task: &EpisodeTask, progress: &ProgressBar) -> Result<EpisodeReport> {
        let name = task.display_name();
        let mut report = EpisodeReport::new(&name, EpisodeState::Pending);

        enter(&mut report, progress, EpisodeState::Loading);
        let source = SubtitleTrack::load(&task.source_file, &self.settings.encodings, self.settings.microdvd_fps)?;
        progress.set_length(source.len() as u64);

        let foreign = match &task.foreign_file {
            Some(foreign_file) => {
                enter(&mut report, progress, EpisodeState::Aligning);
                // Removed when dropped, after the aligned copy is loaded
                let work_dir = TempDir::new().context("Failed to create alignment work directory")?;
                self.prepare_foreign(&task.source_file, foreign_file, work_dir.path()).await
            }
            None => None,
        };

        enter(&mut report, progress, EpisodeState::Translating);
        let sources: Vec<String> = source.lines.iter().map(|l| clean_text(&l.text)).collect();
        // Blank cues take no translation, not even overlapping foreign text
        let mut candidates: Vec<String> = source
            .lines
            .iter()
            .zip(&sources)
            .map(|(line, text)| {
                if text.is_empty() {
                    String::new()
                } else {
                    overlap_text(line, foreign.as_ref())
                }
            })
            .collect();

        let uncovered: Vec<usize> = (0..sources.len())
            .filter(|&i| candidates[i].is_empty() && !sources[i].is_empty())
            .collect();
        report.lines = sources.len();
        report.from_foreign = candidates.iter().filter(|c| !c.is_empty()).count();
        report.translated = uncovered.len();

        if !uncovered.is_empty() {
            let pending: Vec<String> = uncovered.iter().map(|&i| sources[i].clone()).collect();
            let translations = self
                .translator
                .translate_all(&pending, |done, total| {
                    progress.set_message(format!("{} [translating {}/{}]", name, done, total));
                })
                .await;
            for (index, translation) in uncovered.into_iter().zip(translations) {
                candidates[index] = translation;
            }
        }

        enter(&mut report, progress, EpisodeState::Merging);
        let mut merger = DualMerger::new(self.settings.anti_echo_min_len);
        let mut merged_lines = Vec::with_capacity(source.len());
        for ((line, text), candidate) in source.lines.iter().zip(&sources).zip(&candidates) {
            if text.is_empty() {
                // Written through as-is and kept out of the anti-echo state
                merged_lines.push(line.clone());
                progress.inc(1);
                continue;
            }
            let merged = merger.merge(text, candidate);
            let rendered = merged.render(source.format, &self.settings.source_color);
            merged_lines.push(SubtitleLine::new(line.seq_num, line.start_time_ms, line.end_time_ms, rendered));
            progress.inc(1);
        }

        let output_path = task.output_path(source.format.extension());
        SubtitleTrack::new(output_path.clone(), merged_lines, source.format)
            .write_to_file(&output_path)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;

        enter(&mut report, progress, EpisodeState::Saved);
        info!(
            "{}: saved {} ({} lines, {} from foreign track, {} translated)",
            name,
            output_path.display(),
            report.lines,
            report.from_foreign,
            report.translated
        );
        report.output = Some(output_path);
        Ok(report)
    }

    /// Copy the foreign file as UTF-8 into `work_dir`, synchronize it and load it back
    ///
    /// Any failure only means the episode goes without a foreign track.
    async fn prepare_foreign(&self, reference: &Path, foreign_file: &Path, work_dir: &Path) -> Option<SubtitleTrack> {
        let foreign = match SubtitleTrack::load(foreign_file, &self.settings.encodings, self.settings.microdvd_fps) {
            Ok(track) => track,
            Err(e) => {
                warn!("Ignoring foreign subtitle {}: {}", foreign_file.display(), e);
                return None;
            }
        };

        let file_name = foreign_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| format!("foreign.{}", foreign.format.extension()).into());
        let copy = work_dir.join(file_name);
        if let Err(e) = foreign.write_to_file(&copy) {
            warn!("Could not stage foreign subtitle {}: {:#}", foreign_file.display(), e);
            return None;
        }

        if let Err(e) = self.synchronizer.synchronize(reference, &copy).await {
            warn!(
                "Alignment with {} failed for {}: {}; translating without foreign track",
                self.synchronizer.name(),
                foreign_file.display(),
                e
            );
            return None;
        }

        match SubtitleTrack::load(&copy, &[TextEncoding::Utf8], self.settings.microdvd_fps) {
            Ok(track) => Some(track),
            Err(e) => {
                warn!("Aligned foreign subtitle for {} is unreadable: {}", foreign_file.display(), e);
                None
            }
        }
    }
}

fn enter(report: &mut EpisodeReport, progress: &ProgressBar, state: EpisodeState) {
    debug!("{}: {}", report.name, state);
    progress.set_message(format!("{} [{}]", report.name, state));
    report.state = state;
}
