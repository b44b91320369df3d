use crate::error::{ModelError, Result};
use globset::{GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Async walk that finds model bundles and model directories below a root
///
/// A directory whose extension is in the list is a model and is not
/// descended into, so the versions inside an `.xcdatamodeld` bundle are never
/// reported on their own.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// Model extensions (e.g., ["xcdatamodeld", "xcdatamodel"])
    extensions: Vec<String>,
    /// Include patterns set
    include_set: Option<GlobSet>,
    /// Exclude patterns set
    exclude_set: Option<GlobSet>,
    /// Maximum depth for directory traversal (None = unlimited)
    max_depth: Option<usize>,
    /// Follow symbolic links
    follow_symlinks: bool,
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["xcdatamodeld".to_string(), "xcdatamodel".to_string()],
            include_set: None,
            exclude_set: None,
            max_depth: None,
            follow_symlinks: false,
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions.into_iter().map(|e| e.to_lowercase()).collect();
        self
    }

    pub fn with_include_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        self.include_set = build_glob_set(&patterns, "include")?;
        Ok(self)
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Result<Self> {
        self.exclude_set = build_glob_set(&patterns, "exclude")?;
        Ok(self)
    }

    /// Set maximum traversal depth; entries directly below the root are depth 0
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Discover models at `path`, sorted by path
    ///
    /// A path that is itself a model is returned as is.
    pub async fn discover_models(&self, path: &Path) -> Result<Vec<PathBuf>> {
        fs::metadata(path)
            .await
            .map_err(|e| traversal_error(path, e))?;

        if self.has_model_extension(path) {
            return Ok(if self.should_process(path) {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            });
        }

        let mut models = Vec::new();
        self.walk(path, 0, &mut models).await?;
        models.sort();
        debug!(root = %path.display(), found = models.len(), "model discovery finished");
        Ok(models)
    }

    fn walk<'a>(
        &'a self,
        directory: &'a Path,
        depth: usize,
        models: &'a mut Vec<PathBuf>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + 'a>> {
        Box::pin(async move {
            let mut read_dir = match fs::read_dir(directory).await {
                Ok(read_dir) => read_dir,
                // a plain file that is not a model
                Err(_) if !directory.is_dir() => return Ok(()),
                Err(e) => return Err(traversal_error(directory, e)),
            };

            while let Some(entry) = read_dir
                .next_entry()
                .await
                .map_err(|e| traversal_error(directory, e))?
            {
                let entry_path = entry.path();

                if entry_path.is_symlink() && !self.follow_symlinks {
                    continue;
                }

                if self.has_model_extension(&entry_path) {
                    if self.should_process(&entry_path) {
                        models.push(entry_path);
                    }
                    continue;
                }

                if !entry_path.is_dir() {
                    continue;
                }
                if let Some(max_depth) = self.max_depth
                    && depth >= max_depth
                {
                    continue;
                }

                if let Err(e) = self.walk(&entry_path, depth + 1, models).await {
                    warn!(path = %entry_path.display(), error = %e, "skipping unreadable directory");
                }
            }

            Ok(())
        })
    }

    fn has_model_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }

    /// Check if a path should be processed based on extensions and patterns
    pub fn should_process(&self, path: &Path) -> bool {
        if !self.has_model_extension(path) {
            return false;
        }

        if let Some(exclude_set) = &self.exclude_set
            && exclude_set.is_match(path)
        {
            return false;
        }

        // If include patterns are specified, at least one must match
        if let Some(include_set) = &self.include_set {
            return include_set.is_match(path);
        }

        true
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

fn build_glob_set(patterns: &[String], kind: &str) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = globset::GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| ModelError::Config(format!("Invalid glob pattern '{}': {}", pattern, e)))?;
        builder.add(glob);
    }

    let set = builder
        .build()
        .map_err(|e| ModelError::Config(format!("Failed to build {} glob set: {}", kind, e)))?;
    Ok(Some(set))
}

fn traversal_error(path: &Path, error: std::io::Error) -> ModelError {
    ModelError::FileSystemTraversal {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}
