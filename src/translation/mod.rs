/*!
 * Translation of subtitle lines through an LLM oracle.
 *
 * This module is split into several submodules:
 *
 * - `batch`: Ordered batch translation with retries and fallbacks
 * - `cache`: Persistent source-to-translation map
 * - `oracle`: The oracle boundary and its LLM-backed implementation
 * - `prompts`: Prompt text for batch and single-line calls
 * - `similarity`: String similarity used for echo detection and file matching
 */

// Re-export main types for easier usage
pub use self::batch::{BatchPolicy, BatchTranslator, ERROR_SENTINEL};
pub use self::cache::TranslationCache;
pub use self::oracle::{BatchRequest, BatchResponse, LanguagePair, LlmOracle, TranslationOracle};

// Submodules
pub mod batch;
pub mod cache;
pub mod oracle;
pub mod prompts;
pub mod similarity;
