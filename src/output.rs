//! Output and Reporting
//!
//! Formats check results and model summaries for stdout.

use std::time::Duration;

use serde_json::json;

use crate::checker::{CheckResults, DocumentReport, DocumentStatus};
use crate::cli::{OutputFormat, VerbosityLevel};
use crate::diagnostic::{Diagnostic, Severity};
use crate::error::Result;
use crate::model::Model;

pub struct Output {
    verbosity: VerbosityLevel,
    format: OutputFormat,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_results(&self, results: &CheckResults) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
                "documents": results.documents,
                "summary": {
                    "total": results.total_documents(),
                    "clean": results.count(DocumentStatus::Clean),
                    "warnings": results.count(DocumentStatus::Warnings),
                    "invalid": results.count(DocumentStatus::Invalid),
                    "failed": results.count(DocumentStatus::Failed),
                    "error_diagnostics": results.error_count(),
                    "warning_diagnostics": results.warning_count(),
                },
            }))?),
            OutputFormat::Summary => Ok(self.format_summary_lines(results)),
            OutputFormat::Human => Ok(self.format_human(results)),
        }
    }

    fn format_human(&self, results: &CheckResults) -> String {
        let mut output = String::new();

        for document in &results.documents {
            let status = document.status();
            if self.verbosity == VerbosityLevel::Quiet
                && !matches!(status, DocumentStatus::Invalid | DocumentStatus::Failed)
            {
                continue;
            }
            if status == DocumentStatus::Clean && self.verbosity < VerbosityLevel::Verbose {
                continue;
            }
            output.push_str(&self.format_document(document));
            output.push('\n');
        }

        if self.verbosity == VerbosityLevel::Quiet {
            if results.error_count() > 0 || results.count(DocumentStatus::Failed) > 0 {
                output.push_str(&format!(
                    "Errors: {} Failed: {}\n",
                    results.error_count(),
                    results.count(DocumentStatus::Failed)
                ));
            }
            return output;
        }

        output.push_str(&self.format_summary(results));
        output
    }

    pub fn format_document(&self, document: &DocumentReport) -> String {
        let path = document.path.display();
        let duration = format_duration(document.duration);
        let (errors, warnings) = crate::diagnostic::count_by_severity(&document.diagnostics);

        let mut output = match document.status() {
            DocumentStatus::Clean => {
                format!("{}  {} ({})", self.colorize("✓ CLEAN", "32"), path, duration)
            }
            DocumentStatus::Warnings => format!(
                "{}  {} ({}) - {}",
                self.colorize("! WARNINGS", "33"),
                path,
                duration,
                plural(warnings, "warning")
            ),
            DocumentStatus::Invalid => format!(
                "{}  {} ({}) - {}, {}",
                self.colorize("✗ INVALID", "31"),
                path,
                duration,
                plural(errors, "error"),
                plural(warnings, "warning")
            ),
            DocumentStatus::Failed => format!(
                "{}  {} - {}",
                self.colorize("⚠ FAILED", "35"),
                path,
                document.failure.as_deref().unwrap_or_default()
            ),
        };

        if self.verbosity >= VerbosityLevel::Verbose
            && let Some(version) = &document.version
        {
            output.push_str(&format!("\n  version: {}", version));
        }

        output.push_str(&self.format_group(document, Severity::Error, "errors", "31"));
        if self.verbosity > VerbosityLevel::Quiet {
            output.push_str(&self.format_group(document, Severity::Warning, "warnings", "33"));
        }
        output
    }

    fn format_group(
        &self,
        document: &DocumentReport,
        severity: Severity,
        title: &str,
        color: &str,
    ) -> String {
        let diagnostics: Vec<&Diagnostic> = document.diagnostics_with(severity).collect();
        if diagnostics.is_empty() {
            return String::new();
        }
        let mut output = format!("\n  {}:", self.colorize(title, color));
        for diagnostic in diagnostics {
            output.push_str(&format!("\n    {}", diagnostic));
        }
        output
    }

    fn format_summary(&self, results: &CheckResults) -> String {
        let mut output = String::new();
        output.push_str("Check Summary:\n");
        output.push_str(&format!("  Total documents: {}\n", results.total_documents()));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Clean:", "32"),
            results.count(DocumentStatus::Clean)
        ));
        for (label, status, color) in [
            ("With warnings:", DocumentStatus::Warnings, "33"),
            ("Invalid:", DocumentStatus::Invalid, "31"),
            ("Failed:", DocumentStatus::Failed, "35"),
        ] {
            let count = results.count(status);
            if count > 0 {
                output.push_str(&format!("  {} {}\n", self.colorize(label, color), count));
            }
        }
        output.push_str(&format!(
            "  Diagnostics: {}, {}\n",
            plural(results.error_count(), "error"),
            plural(results.warning_count(), "warning")
        ));
        output.push_str(&format!(
            "  Duration: {}\n",
            format_duration(results.total_duration)
        ));
        if self.verbosity >= VerbosityLevel::Verbose {
            output.push_str(&format!("  Worker threads: {}\n", results.threads));
        }
        output
    }

    fn format_summary_lines(&self, results: &CheckResults) -> String {
        let mut output = String::new();
        for document in &results.documents {
            let (errors, warnings) = crate::diagnostic::count_by_severity(&document.diagnostics);
            let status = match document.status() {
                DocumentStatus::Clean => "clean",
                DocumentStatus::Warnings => "warnings",
                DocumentStatus::Invalid => "invalid",
                DocumentStatus::Failed => "failed",
            };
            output.push_str(&format!(
                "{}: {} ({} errors, {} warnings)\n",
                document.path.display(),
                status,
                errors,
                warnings
            ));
        }
        output.push_str(&format!(
            "{} documents, {} errors, {} warnings\n",
            results.total_documents(),
            results.error_count(),
            results.warning_count()
        ));
        output
    }

    /// Entity overview for `inspect`
    pub fn format_model(&self, model: &Model, diagnostics: &[Diagnostic]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
                "model": model,
                "diagnostics": diagnostics,
            }))?),
            OutputFormat::Summary => Ok(format!(
                "{} entities, {} attributes, {} relationships, {} configurations\n",
                model.entities().len(),
                model.attribute_count(),
                model.relationship_count(),
                model.configurations().len()
            )),
            OutputFormat::Human => Ok(self.format_model_human(model, diagnostics)),
        }
    }

    fn format_model_human(&self, model: &Model, diagnostics: &[Diagnostic]) -> String {
        let mut output = String::new();
        if let Some(identifier) = model.version_identifier() {
            output.push_str(&format!("Version: {}\n", identifier));
        }
        output.push_str(&format!("Entities: {}\n", model.entities().len()));

        for entity in model.entities() {
            let mut heading = format!("  {}", self.colorize(&entity.name, "1"));
            if let Some(parent) = &entity.parent {
                heading.push_str(&format!(" : {}", parent));
            }
            if entity.is_abstract {
                heading.push_str(" (abstract)");
            }
            output.push_str(&heading);
            output.push('\n');

            for attribute in &entity.attributes {
                let optional = if attribute.optional { "?" } else { "" };
                output.push_str(&format!(
                    "    {}{}: {}\n",
                    attribute.name, optional, attribute.attribute_type
                ));
            }
            for relationship in &entity.relationships {
                let arrow = if relationship.to_many { "->>" } else { "->" };
                let mut line = format!(
                    "    {} {} {}",
                    relationship.name, arrow, relationship.destination
                );
                if let Some(inverse) = &relationship.inverse {
                    line.push_str(&format!(" (inverse {})", inverse));
                }
                output.push_str(&line);
                output.push('\n');
            }
            if self.verbosity >= VerbosityLevel::Verbose {
                for fetch_index in &entity.fetch_indexes {
                    output.push_str(&format!("    index {}\n", fetch_index.name));
                }
            }
        }

        if !model.configurations().is_empty() {
            output.push_str(&format!("Configurations: {}\n", model.configurations().len()));
            for configuration in model.configurations() {
                output.push_str(&format!(
                    "  {}: {}\n",
                    configuration.name,
                    configuration.entities.join(", ")
                ));
            }
        }

        if !diagnostics.is_empty() {
            let (errors, warnings) = crate::diagnostic::count_by_severity(diagnostics);
            output.push_str(&format!(
                "Diagnostics: {}, {}\n",
                plural(errors, "error"),
                plural(warnings, "warning")
            ));
            for diagnostic in diagnostics {
                output.push_str(&format!("  {}\n", diagnostic));
            }
        }
        output
    }
}

fn plural(count: usize, noun: &str) -> String {
    format!("{} {}{}", count, noun, if count == 1 { "" } else { "s" })
}

pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
