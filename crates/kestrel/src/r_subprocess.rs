//
// r_subprocess.rs
//
// R interpreter subprocess used to resolve names on the search path
//

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::process::Command;

use crate::search::SearchPathResolver;

/// A validated R executable
#[derive(Debug, Clone)]
pub struct RSubprocess {
    r_path: PathBuf,
}

impl RSubprocess {
    /// Use `r_path` when it is a working R executable, otherwise look for one
    /// on `PATH` and in common install locations.
    ///
    /// Runs `R --version`, so call it off the async runtime.
    pub fn new(r_path: Option<PathBuf>) -> Option<Self> {
        let path = match r_path {
            Some(p) if Self::is_valid_r_executable(&p) => Some(p),
            Some(p) => {
                log::warn!("Configured R path is not a working R executable: {}", p.display());
                None
            }
            None => Self::find_r_in_path().or_else(Self::find_r_in_common_locations),
        };
        path.map(|r_path| {
            log::info!("Using R executable at {}", r_path.display());
            Self { r_path }
        })
    }

    pub fn r_path(&self) -> &Path {
        &self.r_path
    }

    fn find_r_in_path() -> Option<PathBuf> {
        #[cfg(unix)]
        let output = std::process::Command::new("which").arg("R").output().ok()?;
        #[cfg(windows)]
        let output = std::process::Command::new("where").arg("R").output().ok()?;

        if !output.status.success() {
            return None;
        }
        // `where` may list several candidates
        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = PathBuf::from(stdout.lines().next()?.trim());
        Self::is_valid_r_executable(&path).then_some(path)
    }

    fn find_r_in_common_locations() -> Option<PathBuf> {
        let mut candidates = Vec::new();

        #[cfg(target_os = "macos")]
        {
            candidates.push(PathBuf::from("/opt/homebrew/bin/R"));
            candidates.push(PathBuf::from("/usr/local/bin/R"));
            candidates.push(PathBuf::from("/Library/Frameworks/R.framework/Resources/bin/R"));
        }

        #[cfg(target_os = "linux")]
        {
            candidates.push(PathBuf::from("/usr/bin/R"));
            candidates.push(PathBuf::from("/usr/local/bin/R"));
        }

        #[cfg(target_os = "windows")]
        {
            if let Ok(entries) = std::fs::read_dir("C:\\Program Files\\R") {
                for entry in entries.flatten() {
                    candidates.push(entry.path().join("bin").join("R.exe"));
                }
            }
        }

        candidates.into_iter().find(|p| Self::is_valid_r_executable(p))
    }

    fn is_valid_r_executable(path: &Path) -> bool {
        if !path.exists() {
            return false;
        }
        match std::process::Command::new(path).arg("--version").output() {
            // R prints its version to stderr on some platforms
            Ok(output) => {
                output.status.success()
                    || String::from_utf8_lossy(&output.stderr).contains("R version")
            }
            Err(_) => false,
        }
    }

    /// Run `r_code` in a vanilla session and return its stdout.
    pub async fn execute_r_code_with_timeout(&self, r_code: &str, timeout: Duration) -> Result<String> {
        let mut cmd = Command::new(&self.r_path);
        cmd.args(["--vanilla", "--slave", "-e", r_code])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| anyhow!("Failed to spawn R subprocess: {e}"))?;
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| anyhow!("Failed to execute R subprocess: {e}"))?,
            Err(_) => return Err(anyhow!("R subprocess timed out after {timeout:?}")),
        };

        if !output.status.success() {
            return Err(anyhow!(
                "R subprocess failed with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// True for names that can be embedded in R code as a string literal
/// without escaping.
pub fn is_syntactic_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

/// R code printing the first search-path entry that defines function `name`.
fn find_function_code(name: &str) -> String {
    format!(r#"x <- find("{name}", mode = "function"); if (length(x)) cat(x[[1]])"#)
}

/// Resolves names with `find()` in a fresh R session.
#[derive(Debug, Clone)]
pub struct RSearchPath {
    subprocess: RSubprocess,
    timeout: Duration,
}

impl RSearchPath {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(subprocess: RSubprocess) -> Self {
        Self {
            subprocess,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

#[async_trait]
impl SearchPathResolver for RSearchPath {
    async fn find_namespace(&self, name: &str) -> Option<String> {
        if !is_syntactic_name(name) {
            log::trace!("Not resolving non-syntactic name {name:?} on the search path");
            return None;
        }
        match self
            .subprocess
            .execute_r_code_with_timeout(&find_function_code(name), self.timeout)
            .await
        {
            Ok(stdout) => {
                let namespace = stdout.trim();
                (!namespace.is_empty()).then(|| namespace.to_string())
            }
            Err(e) => {
                log::warn!("Search path lookup for {name} failed: {e}");
                None
            }
        }
    }
}
