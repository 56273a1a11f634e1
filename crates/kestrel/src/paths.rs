//
// paths.rs
//
// Aliased (home-relative) paths used as source contexts
//

use std::path::{Component, Path, PathBuf};

/// Converts between absolute paths and their aliased display form.
///
/// A path under the home directory is shown as `~/rest/of/path`; any other
/// path is shown as-is. The aliased form is what parsed indexes carry as
/// their context, so the same file always aliases to the same string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathAliaser {
    home: Option<PathBuf>,
}

impl PathAliaser {
    pub fn new(home: Option<PathBuf>) -> Self {
        Self {
            home: home.filter(|h| h.is_absolute()),
        }
    }

    /// Aliaser for the current user's home directory (`$HOME`, or
    /// `%USERPROFILE%` on Windows).
    pub fn from_env() -> Self {
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from);
        Self::new(home)
    }

    pub fn alias(&self, path: &Path) -> String {
        if let Some(home) = &self.home {
            if path == home {
                return String::from("~");
            }
            if let Ok(rest) = path.strip_prefix(home) {
                let rest: Vec<String> = rest
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                return format!("~/{}", rest.join("/"));
            }
        }
        path.to_string_lossy().into_owned()
    }

    pub fn resolve(&self, aliased: &str) -> PathBuf {
        match (&self.home, aliased) {
            (Some(home), "~") => home.clone(),
            (Some(home), _) => match aliased.strip_prefix("~/") {
                Some(rest) => home.join(rest),
                None => PathBuf::from(aliased),
            },
            (None, _) => PathBuf::from(aliased),
        }
    }
}

/// Lexically normalise `.` and `..` components without touching the disk.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// True when `path` is `dir` itself or lies somewhere beneath it.
pub fn is_within(path: &Path, dir: &Path) -> bool {
    normalize(path).starts_with(normalize(dir))
}

/// Final path component as a string (empty for paths like `/`).
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lower-cased extension without the dot, if any.
pub fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}
