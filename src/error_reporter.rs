use crate::cli::VerbosityLevel;
use crate::config::ConfigError;
use crate::error::{BundleError, ModelError};

/// Error reporter with configurable verbosity
pub struct ErrorReporter {
    verbosity: VerbosityLevel,
    show_timestamps: bool,
}

impl ErrorReporter {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_timestamps: false,
        }
    }

    pub fn with_options(verbosity: VerbosityLevel, show_timestamps: bool) -> Self {
        Self {
            verbosity,
            show_timestamps,
        }
    }

    /// Report an error that stopped a command
    pub fn report_error(&self, error: &ModelError) {
        eprintln!("{}", self.format_error(error));
    }

    pub fn format_error(&self, error: &ModelError) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet => self.format_error_brief(error),
            VerbosityLevel::Normal => self.format_error_normal(error),
            VerbosityLevel::Verbose => self.format_error_verbose(error),
            VerbosityLevel::Debug => self.format_error_debug(error),
        }
    }

    /// Report a configuration error
    pub fn report_config_error(&self, error: &ConfigError) {
        eprintln!("{}", self.format_config_error(error));
    }

    pub fn format_config_error(&self, error: &ConfigError) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet => format!("Config error: {}", error),
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                format!(
                    "Configuration Error: {}\n{}",
                    error,
                    self.get_config_help(error)
                )
            }
            VerbosityLevel::Debug => {
                format!(
                    "Configuration Error: {}\nDebug: {:?}\n{}",
                    error,
                    error,
                    self.get_config_help(error)
                )
            }
        }
    }

    fn format_error_brief(&self, error: &ModelError) -> String {
        match error {
            ModelError::MalformedXml(err) => format!("MALFORMED: byte {}", err.offset),
            ModelError::Bundle(BundleError::Io { path, .. }) => {
                format!("UNREADABLE: {}", path.display())
            }
            _ => format!("ERROR: {}", error),
        }
    }

    fn format_error_normal(&self, error: &ModelError) -> String {
        let timestamp = if self.show_timestamps {
            format!("[{}] ", chrono::Utc::now().format("%H:%M:%S"))
        } else {
            String::new()
        };

        format!("{}{}", timestamp, error)
    }

    fn format_error_verbose(&self, error: &ModelError) -> String {
        let mut output = self.format_error_normal(error);

        match error {
            ModelError::MalformedXml(_) => {
                output.push_str("\nSuggestion: Check that the document is well-formed XML");
            }
            ModelError::Bundle(BundleError::NoModelVersion { path }) => {
                output.push_str(&format!(
                    "\nSuggestion: Add a .xcdatamodel version directory to {}",
                    path.display()
                ));
            }
            ModelError::Bundle(BundleError::VersionNotFound { version, .. }) => {
                output.push_str(&format!(
                    "\nSuggestion: Restore '{}' or update .xccurrentversion",
                    version
                ));
            }
            ModelError::Build(_) => {
                output.push_str("\nSuggestion: Rename one of the colliding declarations");
            }
            ModelError::FileSystemTraversal { path, .. } => {
                output.push_str(&format!("\nPath: {}", path.display()));
                output.push_str("\nSuggestion: Check that the path exists and is readable");
            }
            _ => {}
        }

        output
    }

    fn format_error_debug(&self, error: &ModelError) -> String {
        let mut output = self.format_error_verbose(error);
        output.push_str(&format!("\nDebug Info: {:?}", error));

        output.push_str("\nError Chain:");
        let mut current_error: &dyn std::error::Error = error;
        let mut level = 0;
        while let Some(source) = current_error.source() {
            output.push_str(&format!("\n  {}: {}", level + 1, source));
            current_error = source;
            level += 1;
        }

        output
    }

    /// Get helpful suggestions for configuration errors
    fn get_config_help(&self, error: &ConfigError) -> String {
        match error {
            ConfigError::Io(_) => "Check that the configuration file exists and is readable".to_string(),
            ConfigError::TomlParsing(_) | ConfigError::JsonParsing(_) => {
                "Check the configuration file syntax (TOML/JSON format expected)".to_string()
            }
            ConfigError::UnsupportedFormat(ext) => {
                format!("Rename the '.{}' file to use a .toml or .json extension", ext)
            }
            ConfigError::Environment(_) => {
                "Fix or unset the COREDATA_MODEL_* environment variable".to_string()
            }
            ConfigError::Validation(_) => {
                "Resolve conflicting values between file, environment, and CLI".to_string()
            }
        }
    }
}
