use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::subtitle_processor::TextEncoding;

/// Application configuration module
/// This module handles loading, validating and saving the conf.json settings
/// that drive translation, alignment, caching and output.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// External alignment tool config
    #[serde(default)]
    pub alignment: AlignmentConfig,

    /// Persistent cache config
    #[serde(default)]
    pub cache: CacheConfig,

    /// Dual output rendering config
    #[serde(default)]
    pub output: OutputConfig,

    /// Worker pool and file loading config
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Optional log file mirrored from stderr
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Google Gemini
    #[default]
    Gemini,
    // @provider: OpenAI
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: Ollama
    Ollama,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Gemini => "Gemini",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Ollama => "Ollama",
            Self::LMStudio => "LM Studio",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Gemini => "gemini".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::Ollama => "ollama".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
        }
    }

    /// Hosted providers need an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Gemini | Self::OpenAI | Self::Anthropic)
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "lmstudio" => Ok(Self::LMStudio),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model: default_model(&provider_type),
            api_key: String::new(),
            endpoint: default_endpoint(&provider_type),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Batch policy settings shared by all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Number of subtitle lines sent per oracle call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Attempts per batch before falling back
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Seconds to wait after a rate limit response
    #[serde(default = "default_rate_limit_wait_secs")]
    pub rate_limit_wait_secs: u64,

    /// Similarity above which a response counts as an untranslated echo
    #[serde(default = "default_echo_threshold")]
    pub echo_threshold: f64,

    /// Number of leading lines compared by the echo check
    #[serde(default = "default_echo_sample_size")]
    pub echo_sample_size: usize,

    /// Failed batches smaller than this get per-line emergency calls
    #[serde(default = "default_emergency_max_items")]
    pub emergency_max_items: usize,

    /// Register hint added to the prompt (tone, formality)
    #[serde(default = "default_style_hint")]
    pub style_hint: String,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            rate_limit_wait_secs: default_rate_limit_wait_secs(),
            echo_threshold: default_echo_threshold(),
            echo_sample_size: default_echo_sample_size(),
            emergency_max_items: default_emergency_max_items(),
            style_hint: default_style_hint(),
        }
    }
}

impl TranslationCommonConfig {
    pub fn rate_limit_wait(&self) -> Duration {
        Duration::from_secs(self.rate_limit_wait_secs)
    }
}

/// External alignment tool settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AlignmentConfig {
    /// Run the tool on foreign tracks before overlap matching
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Binary name or path
    #[serde(default = "default_alignment_tool")]
    pub tool: String,

    /// Seconds before the tool is killed
    #[serde(default = "default_alignment_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tool: default_alignment_tool(),
            timeout_secs: default_alignment_timeout_secs(),
        }
    }
}

/// Persistent translation cache settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// JSON file holding the source to translation map
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { path: default_cache_path() }
    }
}

/// Rendering of dual captions
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    /// Colour applied to the source line (SRT font tag)
    #[serde(default = "default_source_color")]
    pub source_color: String,

    /// Repeated translations longer than this are suppressed
    #[serde(default = "default_anti_echo_min_len")]
    pub anti_echo_min_len: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            source_color: default_source_color(),
            anti_echo_min_len: default_anti_echo_min_len(),
        }
    }
}

/// Worker pool and input decoding settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProcessingConfig {
    /// Episodes processed in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Encodings tried in order when reading subtitle files
    #[serde(default = "default_encodings")]
    pub encodings: Vec<TextEncoding>,

    /// Frame rate used for MicroDVD files
    #[serde(default = "default_microdvd_fps")]
    pub microdvd_fps: f64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            encodings: default_encodings(),
            microdvd_fps: default_microdvd_fps(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "es".to_string()
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("dualsub.log"))
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.1
}

fn default_batch_size() -> usize {
    50
}

fn default_max_attempts() -> u32 {
    3
}

fn default_rate_limit_wait_secs() -> u64 {
    20
}

fn default_echo_threshold() -> f64 {
    0.8
}

fn default_echo_sample_size() -> usize {
    3
}

fn default_emergency_max_items() -> usize {
    5
}

fn default_style_hint() -> String {
    "Use an informal, conversational tone.".to_string()
}

fn default_true() -> bool {
    true
}

fn default_alignment_tool() -> String {
    "alass".to_string()
}

fn default_alignment_timeout_secs() -> u64 {
    300
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("translation_cache.json")
}

fn default_source_color() -> String {
    "#ffff00".to_string()
}

fn default_anti_echo_min_len() -> usize {
    5
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
}

fn default_encodings() -> Vec<TextEncoding> {
    vec![TextEncoding::Utf8, TextEncoding::Windows1252, TextEncoding::Latin1]
}

fn default_microdvd_fps() -> f64 {
    23.976
}

fn default_endpoint(provider: &TranslationProvider) -> String {
    match provider {
        TranslationProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta".to_string(),
        TranslationProvider::OpenAI => "https://api.openai.com/v1".to_string(),
        TranslationProvider::Anthropic => "https://api.anthropic.com".to_string(),
        TranslationProvider::Ollama => "http://localhost:11434".to_string(),
        // LM Studio default server (OpenAI compatible) runs on port 1234 under /v1
        TranslationProvider::LMStudio => "http://localhost:1234/v1".to_string(),
    }
}

fn default_model(provider: &TranslationProvider) -> String {
    match provider {
        TranslationProvider::Gemini => "gemini-2.0-flash".to_string(),
        TranslationProvider::OpenAI => "gpt-4o-mini".to_string(),
        TranslationProvider::Anthropic => "claude-3-haiku-20240307".to_string(),
        TranslationProvider::Ollama => "llama3.2:3b".to_string(),
        TranslationProvider::LMStudio => "local-model".to_string(),
    }
}

impl Config {
    /// Load a config file, writing the defaults first when it does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            log::warn!("Config file not found at '{}', creating default config.", path.display());
            let config = Config::default();
            let config_json = serde_json::to_string_pretty(&config)
                .context("Failed to serialize default config to JSON")?;
            std::fs::write(path, config_json)
                .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;
            Ok(config)
        }
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let _source_name = crate::language_utils::get_language_name(&self.source_language)?;
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;

        if self.translation.provider.requires_api_key() && self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider",
                self.translation.provider.display_name()
            ));
        }

        let common = &self.translation.common;
        if common.batch_size == 0 {
            return Err(anyhow!("translation.common.batch_size must be at least 1"));
        }
        if common.max_attempts == 0 {
            return Err(anyhow!("translation.common.max_attempts must be at least 1"));
        }
        if !(0.0..=1.0).contains(&common.echo_threshold) {
            return Err(anyhow!(
                "translation.common.echo_threshold must be within [0, 1], got {}",
                common.echo_threshold
            ));
        }
        if self.processing.concurrency == 0 {
            return Err(anyhow!("processing.concurrency must be at least 1"));
        }
        if self.processing.encodings.is_empty() {
            return Err(anyhow!("processing.encodings must list at least one encoding"));
        }
        if self.processing.microdvd_fps <= 0.0 {
            return Err(anyhow!("processing.microdvd_fps must be positive"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            alignment: AlignmentConfig::default(),
            cache: CacheConfig::default(),
            output: OutputConfig::default(),
            processing: ProcessingConfig::default(),
            log_level: LogLevel::default(),
            log_file: default_log_file(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        let provider_str = self.provider.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Mutable access used by CLI overrides
    pub fn get_active_provider_config_mut(&mut self) -> Option<&mut ProviderConfig> {
        let provider_str = self.provider.to_lowercase_string();
        self.available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        match self.get_active_provider_config() {
            Some(p) if !p.model.is_empty() => p.model.clone(),
            _ => default_model(&self.provider),
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        match self.get_active_provider_config() {
            Some(p) if !p.api_key.is_empty() => p.api_key.clone(),
            _ => String::new(),
        }
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        match self.get_active_provider_config() {
            Some(p) if !p.endpoint.is_empty() => p.endpoint.clone(),
            _ => default_endpoint(&self.provider),
        }
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout(&self) -> Duration {
        let secs = self
            .get_active_provider_config()
            .map(|p| p.timeout_secs)
            .unwrap_or_else(default_timeout_secs);
        Duration::from_secs(secs)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Gemini),
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::Anthropic),
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::LMStudio),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
