use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coredata_model::checker::ModelChecker;
use coredata_model::cli::{Cli, Command, OutputFormat, VerbosityLevel};
use coredata_model::codegen::generate_headers;
use coredata_model::config::{Config, ConfigManager};
use coredata_model::diagnostic::has_errors;
use coredata_model::error::ModelError;
use coredata_model::error_reporter::ErrorReporter;
use coredata_model::file_discovery::FileDiscovery;
use coredata_model::output::Output;
use coredata_model::serializer::serialize_with;

/// Exit status for unreadable or malformed input
const EXIT_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        return ExitCode::from(EXIT_FAILURE);
    }

    let config = match ConfigManager::load_config(&cli).await {
        Ok(config) => config,
        Err(err) => {
            ErrorReporter::new(cli.verbosity()).report_config_error(&err);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let verbosity = effective_verbosity(&cli, &config);
    init_tracing(verbosity);
    debug!(?config, "configuration loaded");

    let reporter = ErrorReporter::with_options(verbosity, config.output.timestamps);
    match run(&cli, &config, verbosity).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            match err.downcast_ref::<ModelError>() {
                Some(model_error) => reporter.report_error(model_error),
                None => eprintln!("Error: {:#}", err),
            }
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn effective_verbosity(cli: &Cli, config: &Config) -> VerbosityLevel {
    if config.output.quiet {
        VerbosityLevel::Quiet
    } else if cli.debug {
        VerbosityLevel::Debug
    } else if config.output.verbose {
        VerbosityLevel::Verbose
    } else {
        VerbosityLevel::Normal
    }
}

/// `RUST_LOG` wins over the verbosity flags; logs always go to stderr
fn init_tracing(verbosity: VerbosityLevel) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| verbosity.log_filter().into());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: &Cli, config: &Config, verbosity: VerbosityLevel) -> anyhow::Result<u8> {
    let checker = ModelChecker::from_config(config);
    let output = Output::new(verbosity, OutputFormat::from(config.output.format));

    match &cli.command {
        Command::Check { paths } => {
            let discovery = FileDiscovery::new()
                .with_extensions(config.files.extensions.clone())
                .with_include_patterns(config.files.include_patterns.clone())?
                .with_exclude_patterns(config.files.exclude_patterns.clone())?
                .with_max_depth(config.files.max_depth)
                .with_follow_symlinks(config.files.follow_symlinks);

            let results = checker.check_paths(paths, &discovery).await?;
            print!("{}", output.format_results(&results)?);

            let code = results.exit_code(config.validation.warnings_as_errors);
            info!(code, "check complete");
            Ok(code as u8)
        }

        Command::Format { path, output: destination } => {
            let loaded = checker.load(path).await?;
            report_diagnostics(&loaded.outcome.diagnostics, verbosity);
            let xml = serialize_with(&loaded.outcome.model, checker.vocabulary());

            match destination {
                Some(destination) => {
                    tokio::fs::write(destination, xml.as_bytes())
                        .await
                        .map_err(|e| output_error(destination, e))?;
                    info!(path = %destination.display(), "wrote canonical model");
                }
                None => print!("{}", xml),
            }
            Ok(status_for(&loaded.outcome.diagnostics, config))
        }

        Command::Inspect { path } => {
            let loaded = checker.load(path).await?;
            print!(
                "{}",
                output.format_model(&loaded.outcome.model, &loaded.outcome.diagnostics)?
            );
            Ok(status_for(&loaded.outcome.diagnostics, config))
        }

        Command::Generate { path, output: destination } => {
            let loaded = checker.load(path).await?;
            report_diagnostics(&loaded.outcome.diagnostics, verbosity);

            let directory = destination.join("generated");
            tokio::fs::create_dir_all(&directory)
                .await
                .map_err(|e| output_error(&directory, e))?;

            let files = generate_headers(&loaded.outcome.model);
            for file in &files {
                let target = directory.join(&file.name);
                tokio::fs::write(&target, file.contents.as_bytes())
                    .await
                    .map_err(|e| output_error(&target, e))
                    .with_context(|| format!("while generating sources for {}", path.display()))?;
                debug!(path = %target.display(), "wrote generated file");
            }

            if verbosity > VerbosityLevel::Quiet {
                println!("Generated {} files in {}", files.len(), directory.display());
            }
            Ok(status_for(&loaded.outcome.diagnostics, config))
        }
    }
}

/// Diagnostics of single-model commands go to stderr so stdout stays clean
fn report_diagnostics(diagnostics: &[coredata_model::Diagnostic], verbosity: VerbosityLevel) {
    for diagnostic in diagnostics {
        if diagnostic.is_error() || verbosity > VerbosityLevel::Quiet {
            eprintln!("{}", diagnostic);
        }
    }
}

fn status_for(diagnostics: &[coredata_model::Diagnostic], config: &Config) -> u8 {
    let promoted = config.validation.warnings_as_errors && !diagnostics.is_empty();
    if has_errors(diagnostics) || promoted { 1 } else { 0 }
}

fn output_error(path: &Path, error: std::io::Error) -> ModelError {
    ModelError::Output {
        path: path.to_path_buf(),
        details: error.to_string(),
    }
}
