use crate::cli::{Cli, OutputFormat};
use crate::validator::ValidationPolicy;
use crate::vocabulary::Vocabulary;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_NAME: &str = "coredata-model";
const ENV_PREFIX: &str = "COREDATA_MODEL_";

/// Source of `COREDATA_MODEL_*` overrides
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads the process environment
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML configuration: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("Invalid JSON configuration: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Invalid environment override: {0}")]
    Environment(String),

    #[error("Configuration files must be .toml or .json, not .{0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings for checking, printing and discovering models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub validation: ValidationConfig,
    pub output: OutputConfig,
    pub files: FileConfig,
    /// Tag and attribute names of the document format
    pub vocabulary: Vocabulary,
}

/// How strictly models are judged
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Number of documents checked in parallel
    pub threads: Option<usize>,
    /// Downgrade one-directional inverses to warnings
    pub allow_one_directional_inverses: bool,
    /// Warn about relationships without an inverse
    pub warn_missing_inverse: bool,
    /// Treat warnings as errors when computing the exit status
    pub warnings_as_errors: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let policy = ValidationPolicy::default();
        Self {
            threads: None,
            allow_one_directional_inverses: policy.allow_one_directional_inverses,
            warn_missing_inverse: policy.warn_missing_inverse,
            warnings_as_errors: false,
        }
    }
}

impl ValidationConfig {
    pub fn policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            allow_one_directional_inverses: self.allow_one_directional_inverses,
            warn_missing_inverse: self.warn_missing_inverse,
        }
    }
}

/// Report formatting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Report layout
    pub format: OutputFormatConfig,
    /// Include clean documents and worker details
    pub verbose: bool,
    /// Only invalid and failed documents
    pub quiet: bool,
    /// Prefix error reports with a timestamp
    pub timestamps: bool,
}

/// Model discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    /// Directory extensions treated as model documents
    pub extensions: Vec<String>,
    /// Globs a discovered model path must match
    pub include_patterns: Vec<String>,
    /// Globs that drop a discovered model path
    pub exclude_patterns: Vec<String>,
    /// Maximum directory depth searched below each input path
    pub max_depth: Option<usize>,
    /// Descend into symbolic links while searching
    pub follow_symlinks: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xcdatamodeld".to_string(), "xcdatamodel".to_string()],
            include_patterns: vec![],
            exclude_patterns: vec![],
            max_depth: None,
            follow_symlinks: false,
        }
    }
}

/// Serializable mirror of [`OutputFormat`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    #[default]
    Human,
    Json,
    Summary,
}

impl From<OutputFormat> for OutputFormatConfig {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputFormatConfig::Human,
            OutputFormat::Json => OutputFormatConfig::Json,
            OutputFormat::Summary => OutputFormatConfig::Summary,
        }
    }
}

impl From<OutputFormatConfig> for OutputFormat {
    fn from(format: OutputFormatConfig) -> Self {
        match format {
            OutputFormatConfig::Human => OutputFormat::Human,
            OutputFormatConfig::Json => OutputFormat::Json,
            OutputFormatConfig::Summary => OutputFormat::Summary,
        }
    }
}

fn env_key(name: &str) -> String {
    format!("{}{}", ENV_PREFIX, name)
}

/// Loads and layers [`Config`] sources
pub struct ConfigManager;

impl ConfigManager {
    /// Defaults, then a config file, then the environment, then CLI flags
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            let file_config = Self::load_from_file(config_path).await?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file().await? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides(config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Read a TOML or JSON config file; extensionless files try TOML first
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Search the working directory, then the user config directory
    pub async fn find_config_file() -> Result<Option<Config>> {
        let mut directories = vec![PathBuf::from(".")];
        if let Some(config_dir) = dirs::config_dir() {
            directories.push(config_dir.join(APP_NAME));
        }
        Self::find_config_file_in(&directories).await
    }

    /// First configuration file found in `directories`, searched in order
    pub async fn find_config_file_in(directories: &[PathBuf]) -> Result<Option<Config>> {
        let config_names = [
            format!("{}.toml", APP_NAME),
            format!("{}.json", APP_NAME),
            format!(".{}.toml", APP_NAME),
            format!(".{}.json", APP_NAME),
        ];

        for directory in directories {
            for name in &config_names {
                let path = directory.join(name);
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(threads) = Self::parsed(env, "THREADS")? {
            config.validation.threads = Some(threads);
        }
        if let Some(strict) = Self::parsed::<bool>(env, "STRICT_INVERSES")? {
            config.validation.allow_one_directional_inverses = !strict;
        }
        if let Some(warn) = Self::parsed(env, "WARN_MISSING_INVERSE")? {
            config.validation.warn_missing_inverse = warn;
        }
        if let Some(promote) = Self::parsed(env, "WARNINGS_AS_ERRORS")? {
            config.validation.warnings_as_errors = promote;
        }

        if let Some(verbose) = Self::parsed(env, "VERBOSE")? {
            config.output.verbose = verbose;
        }
        if let Some(quiet) = Self::parsed(env, "QUIET")? {
            config.output.quiet = quiet;
        }
        if let Some(timestamps) = Self::parsed(env, "TIMESTAMPS")? {
            config.output.timestamps = timestamps;
        }

        let format_key = env_key("FORMAT");
        if let Some(format) = env.get(&format_key) {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormatConfig::Human,
                "json" => OutputFormatConfig::Json,
                "summary" => OutputFormatConfig::Summary,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid {} value: {}",
                        format_key, format
                    )));
                }
            };
        }

        if let Some(extensions) = env.get(&env_key("EXTENSIONS")) {
            config.files.extensions = extensions
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(depth) = Self::parsed(env, "MAX_DEPTH")? {
            config.files.max_depth = Some(depth);
        }
        if let Some(follow) = Self::parsed(env, "FOLLOW_SYMLINKS")? {
            config.files.follow_symlinks = follow;
        }

        Ok(config)
    }

    fn parsed<T: std::str::FromStr>(env: &impl EnvProvider, name: &str) -> Result<Option<T>> {
        let key = env_key(name);
        match env.get(&key) {
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                ConfigError::Environment(format!("Invalid {} value: {}", key, raw))
            }),
            None => Ok(None),
        }
    }

    /// Flags given on the command line replace configured values
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if cli.threads.is_some() {
            config.validation.threads = cli.threads;
        }
        if cli.strict_inverses {
            config.validation.allow_one_directional_inverses = false;
        }
        if cli.warn_missing_inverse {
            config.validation.warn_missing_inverse = true;
        }
        if cli.warnings_as_errors {
            config.validation.warnings_as_errors = true;
        }

        if let Some(format) = cli.output_format {
            config.output.format = format.into();
        }
        if cli.verbose || cli.debug {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }
        if cli.timestamps {
            config.output.timestamps = true;
        }

        if !cli.extensions.is_empty() {
            config.files.extensions = cli.extensions.clone();
        }
        if !cli.include_patterns.is_empty() {
            config.files.include_patterns = cli.include_patterns.clone();
        }
        if !cli.exclude_patterns.is_empty() {
            config.files.exclude_patterns = cli.exclude_patterns.clone();
        }
        if cli.max_depth.is_some() {
            config.files.max_depth = cli.max_depth;
        }
        if cli.follow_symlinks {
            config.files.follow_symlinks = true;
        }

        config
    }

    /// Merge two configurations (second takes precedence for non-empty values)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        if override_config.validation.threads.is_some() {
            base.validation.threads = override_config.validation.threads;
        }
        base.validation.allow_one_directional_inverses =
            override_config.validation.allow_one_directional_inverses;
        base.validation.warn_missing_inverse = override_config.validation.warn_missing_inverse;
        base.validation.warnings_as_errors = override_config.validation.warnings_as_errors;

        base.output = override_config.output;

        if !override_config.files.extensions.is_empty() {
            base.files.extensions = override_config.files.extensions;
        }
        if !override_config.files.include_patterns.is_empty() {
            base.files.include_patterns = override_config.files.include_patterns;
        }
        if !override_config.files.exclude_patterns.is_empty() {
            base.files.exclude_patterns = override_config.files.exclude_patterns;
        }
        if override_config.files.max_depth.is_some() {
            base.files.max_depth = override_config.files.max_depth;
        }
        base.files.follow_symlinks = override_config.files.follow_symlinks;

        base.vocabulary = override_config.vocabulary;

        base
    }

    pub fn validate_config(config: &Config) -> Result<()> {
        if let Some(threads) = config.validation.threads {
            if threads == 0 {
                return Err(ConfigError::Validation(
                    "threads must be at least 1".to_string(),
                ));
            }
            if threads > 1000 {
                return Err(ConfigError::Validation(
                    "threads must not exceed 1000".to_string(),
                ));
            }
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "verbose and quiet are mutually exclusive".to_string(),
            ));
        }

        if config.files.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "files.extensions must name at least one model extension".to_string(),
            ));
        }

        for ext in &config.files.extensions {
            if ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(ConfigError::Validation(format!(
                    "model extension {:?} must be a bare name without dots or slashes",
                    ext
                )));
            }
        }

        let tags = &config.vocabulary.tags;
        let required = [&tags.model, &tags.entity, &tags.attribute, &tags.relationship];
        if required.iter().any(|tag| tag.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "Vocabulary tag names must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Configured worker count, or one per CPU
    pub fn get_thread_count(config: &Config) -> usize {
        config.validation.threads.unwrap_or_else(num_cpus::get)
    }
}
