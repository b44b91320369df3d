//! Locating model documents on disk
//!
//! A model can be given as a versioned `.xcdatamodeld` bundle, a single
//! `.xcdatamodel` directory, or a plain XML file. Bundles name their current
//! version in a `.xccurrentversion` property list; the document itself is
//! the `contents` file inside the version directory.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::error::{BundleError, BundleResult};
use crate::xml::XmlDocument;

pub const BUNDLE_EXTENSION: &str = "xcdatamodeld";
pub const VERSION_EXTENSION: &str = "xcdatamodel";
pub const CURRENT_VERSION_FILE: &str = ".xccurrentversion";
pub const CONTENTS_FILE: &str = "contents";

const CURRENT_VERSION_KEY: &str = "_XCCurrentVersionName";

/// Where a model document was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// File holding the model XML
    pub contents: PathBuf,
    /// Enclosing `.xcdatamodeld`, if any
    pub bundle: Option<PathBuf>,
    /// Version directory name inside the bundle
    pub version: Option<String>,
}

/// Model document bytes plus their origin
#[derive(Debug, Clone)]
pub struct ModelSource {
    pub resolved: ResolvedSource,
    pub bytes: Vec<u8>,
}

/// Resolve and read the model document behind `path`
pub async fn load_model_source(path: &Path) -> BundleResult<ModelSource> {
    let resolved = resolve_contents_path(path).await?;
    let bytes = fs::read(&resolved.contents)
        .await
        .map_err(|source| BundleError::Io {
            path: resolved.contents.clone(),
            source,
        })?;
    info!(
        path = %resolved.contents.display(),
        bytes = bytes.len(),
        "loaded model document"
    );
    Ok(ModelSource { resolved, bytes })
}

pub async fn resolve_contents_path(path: &Path) -> BundleResult<ResolvedSource> {
    let metadata = fs::metadata(path).await.map_err(|source| BundleError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if !metadata.is_dir() {
        return Ok(ResolvedSource {
            contents: path.to_path_buf(),
            bundle: None,
            version: None,
        });
    }

    if !has_extension(path, BUNDLE_EXTENSION) {
        return Ok(ResolvedSource {
            contents: path.join(CONTENTS_FILE),
            bundle: None,
            version: None,
        });
    }

    let version = match read_current_version(path).await? {
        Some(version) => {
            if !fs::try_exists(path.join(&version)).await.unwrap_or(false) {
                return Err(BundleError::VersionNotFound {
                    bundle: path.to_path_buf(),
                    version,
                });
            }
            version
        }
        None => latest_version(path).await?,
    };
    debug!(bundle = %path.display(), %version, "resolved current model version");

    Ok(ResolvedSource {
        contents: path.join(&version).join(CONTENTS_FILE),
        bundle: Some(path.to_path_buf()),
        version: Some(version),
    })
}

async fn read_current_version(bundle: &Path) -> BundleResult<Option<String>> {
    let plist = bundle.join(CURRENT_VERSION_FILE);
    let bytes = match fs::read(&plist).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(bundle = %bundle.display(), "no current version file");
            return Ok(None);
        }
        Err(source) => return Err(BundleError::Io { path: plist, source }),
    };
    current_version_name(&bytes, &plist)
}

/// Read `_XCCurrentVersionName` from a property list document
pub fn current_version_name(bytes: &[u8], path: &Path) -> BundleResult<Option<String>> {
    let document = XmlDocument::parse(bytes).map_err(|source| {
        BundleError::MalformedVersionDocument {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let Some(dict) = document.root.first_child_named("dict") else {
        return Ok(None);
    };
    let entries = dict.children();
    let name = entries
        .iter()
        .zip(entries.iter().skip(1))
        .find(|(key, _)| key.name() == "key" && key.text().trim() == CURRENT_VERSION_KEY)
        .filter(|(_, value)| value.name() == "string")
        .map(|(_, value)| value.text().trim().to_string())
        .filter(|name| !name.is_empty());
    Ok(name)
}

/// Fallback when no current version is recorded: last version by name
async fn latest_version(bundle: &Path) -> BundleResult<String> {
    let io_error = |source| BundleError::Io {
        path: bundle.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(bundle).await.map_err(io_error)?;
    let mut versions = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        let path = entry.path();
        if has_extension(&path, VERSION_EXTENSION) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                versions.push(name.to_string());
            }
        }
    }
    versions.sort();
    versions.pop().ok_or_else(|| BundleError::NoModelVersion {
        path: bundle.to_path_buf(),
    })
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
