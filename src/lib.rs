//! # coredata-model Library
//!
//! Reads Core Data `.xcdatamodel` documents into a typed entity model,
//! checks the model for semantic problems, and writes it back out as
//! canonical XML or Objective-C headers.
//!
//! ```
//! let xml = br#"<model><entity name="Person"><attribute name="name" attributeType="String"/></entity></model>"#;
//! let outcome = coredata_model::parse_model(xml).unwrap();
//! assert!(outcome.diagnostics.is_empty());
//! let bytes = coredata_model::serialize_model(&outcome.model);
//! assert_eq!(coredata_model::parse_model(&bytes).unwrap().model, outcome.model);
//! ```

pub mod bundle;
pub mod checker;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod error_reporter;
pub mod file_discovery;
pub mod model;
pub mod output;
pub mod parser;
pub mod serializer;
pub mod validator;
pub mod vocabulary;
pub mod xml;

pub use bundle::{ModelSource, ResolvedSource, load_model_source};
pub use checker::{CheckResults, DocumentReport, DocumentStatus, ModelChecker};
pub use cli::{Cli, Command, OutputFormat, VerbosityLevel};
pub use codegen::{GeneratedFile, generate_headers};
pub use config::{Config, ConfigError, ConfigManager};
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticPath, Severity};
pub use error::{BuildError, BundleError, MalformedXmlError, ModelError};
pub use error_reporter::ErrorReporter;
pub use file_discovery::FileDiscovery;
pub use model::{
    Attribute, AttributeHandle, AttributeType, Configuration, ConfigurationHandle, DefaultValue,
    DeleteRule, Entity, EntityHandle, FetchIndex, FetchIndexElement, FetchIndexHandle, IndexKind,
    IndexOrder, Model, ModelBuilder, Relationship, RelationshipHandle, UserInfo,
};
pub use output::Output;
pub use parser::ParseOutcome;
pub use validator::ValidationPolicy;
pub use vocabulary::Vocabulary;
pub use xml::{XmlDocument, XmlElement};

/// Parse model document bytes with the default vocabulary and policy
pub fn parse_model(bytes: &[u8]) -> Result<ParseOutcome, MalformedXmlError> {
    let document = XmlDocument::parse(bytes)?;
    Ok(parser::parse(&document))
}

/// Semantic diagnostics for any model, parsed or built
pub fn validate_model(model: &Model) -> Vec<Diagnostic> {
    validator::validate(model)
}

/// Canonical XML bytes
pub fn serialize_model(model: &Model) -> Vec<u8> {
    serializer::serialize_bytes(model)
}
