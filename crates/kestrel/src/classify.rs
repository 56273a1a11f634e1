//
// classify.rs
//
// Trackable / indexable file classification
//

use std::path::{Path, PathBuf};

use crate::config::SearchConfig;
use crate::paths::{extension_lower, file_name};

/// Decides which files the project index tracks and which it parses.
///
/// Trackable files participate in file-name search; indexable files are the
/// narrower set whose contents are parsed into symbols.
#[derive(Debug, Clone)]
pub struct FileClassifier {
    config: SearchConfig,
    project_root: Option<PathBuf>,
    /// Excluded directories split into components
    excluded: Vec<Vec<String>>,
}

impl FileClassifier {
    pub fn new(config: SearchConfig, project_root: Option<PathBuf>) -> Self {
        let excluded = config
            .excluded_directories
            .iter()
            .map(|d| {
                d.split(['/', '\\'])
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|c| !c.is_empty())
            .collect();
        Self {
            config,
            project_root,
            excluded,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// False for files inside non-user directories.
    ///
    /// Multi-component exclusions (`renv/library`) are matched as a prefix of
    /// the path relative to the project root. Single-component exclusions
    /// (`.git`) match a directory of that name at any depth.
    pub fn is_user_file(&self, path: &Path) -> bool {
        let components = self.relative_components(path);
        // The last component is the file itself
        self.allows_dirs(&components[..components.len().saturating_sub(1)])
    }

    /// False for directories that are, or lie inside, non-user directories.
    pub fn is_user_dir(&self, dir: &Path) -> bool {
        self.allows_dirs(&self.relative_components(dir))
    }

    fn relative_components(&self, path: &Path) -> Vec<String> {
        let relative = self
            .project_root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect()
    }

    fn allows_dirs(&self, dirs: &[String]) -> bool {
        for excluded in &self.excluded {
            if excluded.len() == 1 {
                if dirs.iter().any(|d| *d == excluded[0]) {
                    return false;
                }
            } else if dirs.len() >= excluded.len() && dirs[..excluded.len()] == excluded[..] {
                return false;
            }
        }
        true
    }

    /// Eligible for file-name search.
    pub fn is_trackable(&self, path: &Path, is_dir: bool) -> bool {
        if is_dir || !self.is_user_file(path) {
            return false;
        }
        let name = file_name(path);
        if self.config.trackable_file_names.iter().any(|n| *n == name) {
            return true;
        }
        match extension_lower(path) {
            Some(ext) => {
                self.config.trackable_extensions.contains(&ext)
                    || self.config.text_extensions.contains(&ext)
            }
            None => false,
        }
    }

    /// Eligible for symbol parsing.
    pub fn is_indexable(&self, path: &Path, is_dir: bool) -> bool {
        !is_dir && self.has_indexable_extension(path)
    }

    pub fn has_indexable_extension(&self, path: &Path) -> bool {
        extension_lower(path)
            .map(|ext| self.config.indexable_extensions.contains(&ext))
            .unwrap_or(false)
    }
}
