//! Checking many model documents at once
//!
//! Inputs are resolved and read concurrently with tokio, then parsed and
//! validated on a rayon pool. Results always come back in input order.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::future::join_all;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bundle::{self, BUNDLE_EXTENSION, ModelSource, VERSION_EXTENSION};
use crate::config::{Config, ConfigManager};
use crate::diagnostic::{Diagnostic, Severity, count_by_severity};
use crate::error::{BundleError, ModelError, Result};
use crate::file_discovery::FileDiscovery;
use crate::parser::{ParseOutcome, parse_with};
use crate::validator::ValidationPolicy;
use crate::vocabulary::Vocabulary;
use crate::xml::XmlDocument;

/// Status of a single checked document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// No diagnostics at all
    Clean,
    /// Only warnings
    Warnings,
    /// At least one error diagnostic
    Invalid,
    /// Source could not be read or is not well-formed XML
    Failed,
}

/// Result of checking one input
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    /// Path as given or discovered
    pub path: PathBuf,
    /// Model version inside a bundle
    pub version: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// Why the document could not be checked
    pub failure: Option<String>,
    pub duration: Duration,
}

impl DocumentReport {
    fn failed(path: PathBuf, failure: String, duration: Duration) -> Self {
        Self {
            path,
            version: None,
            diagnostics: Vec::new(),
            failure: Some(failure),
            duration,
        }
    }

    pub fn status(&self) -> DocumentStatus {
        if self.failure.is_some() {
            return DocumentStatus::Failed;
        }
        match count_by_severity(&self.diagnostics) {
            (0, 0) => DocumentStatus::Clean,
            (0, _) => DocumentStatus::Warnings,
            _ => DocumentStatus::Invalid,
        }
    }

    pub fn diagnostics_with(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |diagnostic| diagnostic.severity == severity)
    }
}

/// Aggregated results of checking multiple documents
#[derive(Debug, Clone, Serialize)]
pub struct CheckResults {
    pub documents: Vec<DocumentReport>,
    pub total_duration: Duration,
    /// Size of the pool that did the checking
    pub threads: usize,
}

impl CheckResults {
    pub fn total_documents(&self) -> usize {
        self.documents.len()
    }

    pub fn count(&self, status: DocumentStatus) -> usize {
        self.documents
            .iter()
            .filter(|document| document.status() == status)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.documents
            .iter()
            .map(|document| count_by_severity(&document.diagnostics).0)
            .sum()
    }

    pub fn warning_count(&self) -> usize {
        self.documents
            .iter()
            .map(|document| count_by_severity(&document.diagnostics).1)
            .sum()
    }

    /// 2 when any input failed to load, 1 when any error was reported, else 0
    pub fn exit_code(&self, warnings_as_errors: bool) -> i32 {
        if self.count(DocumentStatus::Failed) > 0 {
            2
        } else if self.error_count() > 0 || (warnings_as_errors && self.warning_count() > 0) {
            1
        } else {
            0
        }
    }
}

/// A single model loaded for format, inspect or generate
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub source: ModelSource,
    pub outcome: ParseOutcome,
}

pub struct ModelChecker {
    vocabulary: Vocabulary,
    policy: ValidationPolicy,
    threads: usize,
}

impl ModelChecker {
    pub fn new(vocabulary: Vocabulary, policy: ValidationPolicy, threads: usize) -> Self {
        Self {
            vocabulary,
            policy,
            threads: threads.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.vocabulary.clone(),
            config.validation.policy(),
            ConfigManager::get_thread_count(config),
        )
    }

    /// Expand inputs into model paths: models and plain files are kept,
    /// other directories are searched.
    pub async fn collect_inputs(
        &self,
        paths: &[PathBuf],
        discovery: &FileDiscovery,
    ) -> Result<Vec<PathBuf>> {
        let mut inputs = Vec::new();
        for path in paths {
            if is_model_path(path) || !path.is_dir() {
                inputs.push(path.clone());
                continue;
            }
            let found = discovery.discover_models(path).await?;
            if found.is_empty() {
                warn!(path = %path.display(), "no model documents found");
            }
            inputs.extend(found);
        }
        Ok(inputs)
    }

    pub async fn check_paths(
        &self,
        paths: &[PathBuf],
        discovery: &FileDiscovery,
    ) -> Result<CheckResults> {
        let started = Instant::now();
        let inputs = self.collect_inputs(paths, discovery).await?;
        debug!(inputs = inputs.len(), "loading model documents");

        let sources = join_all(inputs.iter().map(|path| bundle::load_model_source(path))).await;
        let loaded: Vec<(PathBuf, std::result::Result<ModelSource, BundleError>)> =
            inputs.into_iter().zip(sources).collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| ModelError::Config(format!("Failed to start worker pool: {}", e)))?;

        let documents: Vec<DocumentReport> = pool.install(|| {
            loaded
                .into_par_iter()
                .map(|(path, source)| match source {
                    Ok(source) => self.check_source(path, &source),
                    Err(err) => DocumentReport::failed(path, err.to_string(), Duration::ZERO),
                })
                .collect()
        });

        let results = CheckResults {
            documents,
            total_duration: started.elapsed(),
            threads: self.threads,
        };
        info!(
            documents = results.total_documents(),
            errors = results.error_count(),
            warnings = results.warning_count(),
            "check finished"
        );
        Ok(results)
    }

    /// Parse and validate one loaded document
    pub fn check_source(&self, path: PathBuf, source: &ModelSource) -> DocumentReport {
        let started = Instant::now();
        match self.parse_bytes(&source.bytes) {
            Ok(outcome) => DocumentReport {
                path,
                version: source.resolved.version.clone(),
                diagnostics: outcome.diagnostics,
                failure: None,
                duration: started.elapsed(),
            },
            Err(err) => DocumentReport::failed(path, err.to_string(), started.elapsed()),
        }
    }

    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<ParseOutcome> {
        let document = XmlDocument::parse(bytes)?;
        Ok(parse_with(&document, &self.vocabulary, &self.policy))
    }

    pub async fn load(&self, path: &Path) -> Result<LoadedModel> {
        let source = bundle::load_model_source(path).await?;
        let outcome = self.parse_bytes(&source.bytes)?;
        Ok(LoadedModel { source, outcome })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

fn is_model_path(path: &Path) -> bool {
    bundle::has_extension(path, BUNDLE_EXTENSION) || bundle::has_extension(path, VERSION_EXTENSION)
}
