use std::path::{Path, PathBuf};

use coredata_model::{Diagnostic, DiagnosticKind, ParseOutcome};
use tokio::fs;

use super::fixtures::CURRENT_VERSION_PLIST;

pub fn parse(xml: &str) -> ParseOutcome {
    coredata_model::parse_model(xml.as_bytes()).unwrap()
}

pub fn kinds(diagnostics: &[Diagnostic]) -> Vec<DiagnosticKind> {
    diagnostics.iter().map(|d| d.kind).collect()
}

pub fn count_kind(diagnostics: &[Diagnostic], kind: DiagnosticKind) -> usize {
    diagnostics.iter().filter(|d| d.kind == kind).count()
}

/// Write an `.xcdatamodeld` bundle; `current` names the version recorded
/// in `.xccurrentversion`, if any
pub async fn write_bundle(
    root: &Path,
    name: &str,
    versions: &[(&str, &str)],
    current: Option<&str>,
) -> PathBuf {
    let bundle = root.join(format!("{}.xcdatamodeld", name));
    fs::create_dir_all(&bundle).await.unwrap();
    for (version, contents) in versions {
        let directory = bundle.join(format!("{}.xcdatamodel", version));
        fs::create_dir_all(&directory).await.unwrap();
        fs::write(directory.join("contents"), contents).await.unwrap();
    }
    if let Some(current) = current {
        let plist = CURRENT_VERSION_PLIST.replace("{version}", &format!("{}.xcdatamodel", current));
        fs::write(bundle.join(".xccurrentversion"), plist).await.unwrap();
    }
    bundle
}

pub async fn write_document(root: &Path, name: &str, contents: &str) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.unwrap();
    }
    fs::write(&path, contents).await.unwrap();
    path
}
