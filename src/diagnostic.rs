//! Diagnostics produced by parsing and validation

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// What a diagnostic is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Element not part of the model vocabulary
    UnknownElement,
    /// Required attribute absent on a recognized element
    MissingAttribute,
    /// Attribute value that cannot be parsed
    InvalidValue,
    NameCollision,
    /// Name reference that does not resolve
    DanglingReference,
    InheritanceCycle,
    InverseAsymmetry,
    /// Default value incompatible with the attribute type
    TypeMismatch,
    /// Flag that has no effect in its context
    IneffectiveFlag,
    MissingInverse,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownElement => "unknown-element",
            Self::MissingAttribute => "missing-attribute",
            Self::InvalidValue => "invalid-value",
            Self::NameCollision => "name-collision",
            Self::DanglingReference => "dangling-reference",
            Self::InheritanceCycle => "inheritance-cycle",
            Self::InverseAsymmetry => "inverse-asymmetry",
            Self::TypeMismatch => "type-mismatch",
            Self::IneffectiveFlag => "ineffective-flag",
            Self::MissingInverse => "missing-inverse",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of a diagnostic inside the model
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct DiagnosticPath {
    pub entity: Option<String>,
    /// Attribute, relationship or fetch index name within the entity
    pub member: Option<String>,
    pub configuration: Option<String>,
}

impl DiagnosticPath {
    pub fn model() -> Self {
        Self::default()
    }

    pub fn entity(entity: impl Into<String>) -> Self {
        Self {
            entity: Some(entity.into()),
            ..Self::default()
        }
    }

    pub fn member(entity: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            entity: Some(entity.into()),
            member: Some(member.into()),
            configuration: None,
        }
    }

    pub fn configuration(configuration: impl Into<String>) -> Self {
        Self {
            configuration: Some(configuration.into()),
            ..Self::default()
        }
    }

    pub fn is_model(&self) -> bool {
        self.entity.is_none() && self.configuration.is_none()
    }
}

impl fmt::Display for DiagnosticPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.configuration, &self.entity, &self.member) {
            (Some(configuration), Some(entity), _) => {
                write!(f, "configuration {}: {}", configuration, entity)
            }
            (Some(configuration), None, _) => write!(f, "configuration {}", configuration),
            (None, Some(entity), Some(member)) => write!(f, "{}.{}", entity, member),
            (None, Some(entity), None) => f.write_str(entity),
            (None, None, _) => f.write_str("model"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub path: DiagnosticPath,
    /// Byte offset of the related element in the source document
    pub offset: Option<usize>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        kind: DiagnosticKind,
        path: DiagnosticPath,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            path,
            offset: None,
        }
    }

    pub fn error(kind: DiagnosticKind, path: DiagnosticPath, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, kind, path, message)
    }

    pub fn warning(kind: DiagnosticKind, path: DiagnosticPath, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, kind, path, message)
    }

    pub fn at(mut self, offset: Option<usize>) -> Self {
        self.offset = offset;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity, self.kind, self.path, self.message
        )?;
        if let Some(offset) = self.offset {
            write!(f, " (byte {})", offset)?;
        }
        Ok(())
    }
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// `(errors, warnings)`
pub fn count_by_severity(diagnostics: &[Diagnostic]) -> (usize, usize) {
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    (errors, diagnostics.len() - errors)
}

/// Stable sort by source offset; diagnostics without an offset go last
pub fn sort_by_offset(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| d.offset.unwrap_or(usize::MAX));
}
