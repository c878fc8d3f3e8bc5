/*!
 * # dualsub - dual-language subtitles for whole TV series
 *
 * A Rust library that turns a season of source-language subtitles into
 * two-line captions: the original line on top, highlighted, and its
 * translation underneath.
 *
 * ## Features
 *
 * - Reuses existing foreign-language subtitles wherever their timing
 *   overlaps a source line, after optional correction with an external
 *   aligner (`alass` by default)
 * - Translates the remaining lines in ordered batches through an LLM:
 *   - Gemini (default)
 *   - OpenAI API and OpenAI-compatible servers (LM Studio)
 *   - Anthropic API
 *   - Ollama (local LLM)
 * - Persistent translation cache shared by all episodes
 * - SubRip (`.srt`) and MicroDVD (`.sub`) with encoding fallback
 * - Bounded parallelism across episodes
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: Subtitle parsing, decoding and rendering
 * - `episode`: Episode tags, season selection and task state
 * - `alignment`: External timing correction and overlap lookup
 * - `translation`: Oracle boundary, prompts, batching and the cache
 * - `merge`: Dual caption composition with repeat suppression
 * - `pipeline`: Processing of a single episode
 * - `app_controller`: Season discovery and the worker pool
 * - `providers`: Client implementations for the LLM providers
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod alignment;
pub mod app_config;
pub mod app_controller;
pub mod episode;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod merge;
pub mod pipeline;
pub mod providers;
pub mod subtitle_processor;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{CancellationFlag, Controller, RunOptions, RunSummary};
pub use episode::{EpisodeState, SeasonSelection};
pub use errors::{AlignmentError, ProviderError, SubtitleError, TranslationError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use subtitle_processor::{SubtitleFormat, SubtitleLine, SubtitleTrack};
pub use translation::{BatchTranslator, TranslationCache, TranslationOracle};
