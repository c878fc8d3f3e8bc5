// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use parking_lot::Mutex;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use dualsub::app_config::{self, Config, ProviderConfig, TranslationProvider};
use dualsub::translation::LlmOracle;
use dualsub::{Controller, RunOptions, SeasonSelection};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Gemini,
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    Ollama,
    #[value(name = "lmstudio")]
    LMStudio,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Gemini => TranslationProvider::Gemini,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build dual subtitles for a series (default command)
    Run(RunArgs),

    /// Generate shell completions for dualsub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct RunArgs {
    /// Library directory with one subdirectory per season
    #[arg(value_name = "LIBRARY")]
    library: Option<PathBuf>,

    /// Series name used in output names (defaults to the library directory name)
    #[arg(long)]
    series: Option<String>,

    /// Seasons to process: '1,3-5', or 'all' / 'n' / '1-n' until one is missing
    #[arg(long, default_value = "all")]
    seasons: String,

    /// Episodes processed in parallel
    #[arg(long)]
    threads: Option<usize>,

    /// Output root directory
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config: PathBuf,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// API key for the selected provider
    #[arg(long, env = "DUALSUB_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Skip the external alignment tool and trust foreign timing as-is
    #[arg(long)]
    no_align: bool,

    /// Only check that the translation provider is reachable, then exit
    #[arg(long)]
    check: bool,
}

/// dualsub - dual-language subtitles for whole TV series
#[derive(Parser, Debug)]
#[command(name = "dualsub")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
#[command(about = "Dual-language subtitle builder")]
#[command(long_about = "dualsub pairs each source-language subtitle with its foreign-language counterpart and writes
two-line captions: the original on top, highlighted, and the translation underneath. Lines the
foreign subtitle does not cover are translated by an LLM and cached for later runs.

LIBRARY LAYOUT:
    <LIBRARY>/Season 1/en/*.srt      source subtitles
    <LIBRARY>/Season 1/es/*.srt      optional foreign subtitles

EXAMPLES:
    dualsub ~/subs/Friends                           # All seasons, default config
    dualsub ~/subs/Friends --seasons 1,3-5           # Selected seasons
    dualsub ~/subs/Friends -p ollama -m llama3.2:3b  # Local model
    dualsub ~/subs/Friends --no-align --threads 4    # No alignment tool, 4 workers
    dualsub --check -p gemini                        # Test provider connectivity only
    dualsub completions bash > dualsub.bash          # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one will be created automatically. API keys can also be passed in
    the DUALSUB_API_KEY environment variable.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
    // @field: Plain-text mirror of stderr output
    file: Mutex<Option<File>>,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter, log_file: Option<&Path>) -> Result<(), SetLoggerError> {
        let file = log_file.and_then(|path| File::create(path).ok());
        let logger = Box::new(CustomLogger {
            level,
            file: Mutex::new(file),
        });
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = chrono::Local::now().format("%H:%M:%S.%3f");

        let _ = writeln!(
            std::io::stderr(),
            "\x1B[{}m{} {:<5} {}\x1B[0m",
            Self::color_for_level(record.level()),
            now,
            record.level(),
            record.args()
        );

        if let Some(file) = self.file.lock().as_mut() {
            let _ = writeln!(file, "{} {:<5} [{}] {}", now, record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments using clap
    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "dualsub", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Run(args)) => run(args).await,
        // Default behavior - top-level args run the pipeline
        None => run(cli.run).await,
    }
}

/// Apply command line overrides on top of the file configuration
fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(provider) = &args.provider {
        config.translation.provider = provider.clone().into();
    }

    if config.translation.get_active_provider_config().is_none() {
        let provider = config.translation.provider.clone();
        config.translation.available_providers.push(ProviderConfig::new(provider));
    }

    if let Some(provider_config) = config.translation.get_active_provider_config_mut() {
        if let Some(model) = &args.model {
            provider_config.model = model.clone();
        }
        if let Some(api_key) = args.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            provider_config.api_key = api_key.trim().to_string();
        }
    }

    if let Some(source_lang) = &args.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &args.target_language {
        config.target_language = target_lang.clone();
    }
    if let Some(threads) = args.threads {
        config.processing.concurrency = threads;
    }
    if let Some(log_level) = &args.log_level {
        config.log_level = log_level.clone().into();
    }
    if args.no_align {
        config.alignment.enabled = false;
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = Config::load_or_create(&args.config)?;
    apply_overrides(&mut config, &args);

    CustomLogger::init(config.log_level.to_level_filter(), config.log_file.as_deref())
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

    // Validate the configuration after loading and overriding
    config.validate().context("Configuration validation failed")?;

    if args.check {
        return check_provider(&config).await;
    }

    let library = args
        .library
        .clone()
        .ok_or_else(|| anyhow!("LIBRARY is required"))?;

    let seasons: SeasonSelection = args.seasons.parse()?;
    let series_name = match &args.series {
        Some(name) => name.clone(),
        None => library
            .canonicalize()
            .unwrap_or_else(|_| library.clone())
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("Cannot derive a series name from {:?}; use --series", library))?,
    };

    let controller = Controller::with_config(config)?;

    let cancel = controller.cancellation_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted: finishing running episodes, pending ones are cancelled");
            cancel.cancel();
        }
    });

    let options = RunOptions::new(library, series_name, &args.output).with_seasons(seasons);
    match controller.run(&options).await {
        Ok(summary) => {
            if summary.cancelled {
                warn!("Run cancelled: {}", summary);
            } else {
                info!("Done: {}", summary);
            }
            log::logger().flush();
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            log::logger().flush();
            Err(e)
        }
    }
}

/// Reach the configured provider once without touching any subtitles
async fn check_provider(config: &Config) -> Result<()> {
    let oracle = LlmOracle::from_config(config)?;
    let provider = config.translation.provider.display_name();
    match oracle.test_connection().await {
        Ok(()) => {
            info!(
                "{} is reachable with model {} ({} to {})",
                provider,
                oracle.model(),
                oracle.languages().source,
                oracle.languages().target
            );
            Ok(())
        }
        Err(e) => {
            error!("{} check failed: {}", provider, e);
            log::logger().flush();
            Err(anyhow!("{} is not reachable: {}", provider, e))
        }
    }
}
