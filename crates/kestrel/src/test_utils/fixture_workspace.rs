//! Deterministic fixture R packages for benchmarks and tests.
//!
//! Generates a package layout with controlled characteristics: number of
//! source files under `R/`, functions per file, S4 classes, `.Rd` pages
//! under `man/`, and optional files in directories the indexer must skip.
//!
//! All output is deterministic (no randomness) so benchmarks are reproducible.

use std::fmt::Write;
use std::path::Path;
use tempfile::TempDir;

/// Configuration for generating a fixture package.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub file_count: usize,
    pub functions_per_file: usize,
    /// Files (from the first) that also define an S4 class with a method
    pub s4_files: usize,
    /// Write one `man/*.Rd` page per source file
    pub rd_pages: bool,
    /// Write sources into `.git/` and `renv/library/` as well
    pub excluded_noise: bool,
}

/// Verb prefixes cycled through so names share and differ in realistic ways
const VERBS: &[&str] = &[
    "read", "write", "plot", "summarise", "fit", "validate", "parse", "render",
];

impl FixtureConfig {
    /// Small package: 10 files, 5 functions each.
    pub fn small() -> Self {
        Self {
            file_count: 10,
            functions_per_file: 5,
            s4_files: 2,
            rd_pages: true,
            excluded_noise: true,
        }
    }

    /// Medium package: 50 files, 10 functions each.
    pub fn medium() -> Self {
        Self {
            file_count: 50,
            functions_per_file: 10,
            s4_files: 10,
            rd_pages: true,
            excluded_noise: true,
        }
    }

    /// Large package: 200 files, 20 functions each.
    pub fn large() -> Self {
        Self {
            file_count: 200,
            functions_per_file: 20,
            s4_files: 40,
            rd_pages: true,
            excluded_noise: true,
        }
    }

    /// Number of files the project index should track.
    pub fn tracked_files(&self) -> usize {
        let rd = if self.rd_pages { self.file_count } else { 0 };
        // DESCRIPTION and NAMESPACE
        self.file_count + rd + 2
    }
}

/// Name of function `func` in file `file`.
pub fn function_name(file: usize, func: usize) -> String {
    format!("{}_item_{}_{}", VERBS[(file + func) % VERBS.len()], file, func)
}

/// Name of the S4 class defined in file `file`.
pub fn class_name(file: usize) -> String {
    format!("Record{file}")
}

/// Generate the content of a single R source file.
fn generate_r_file_content(index: usize, config: &FixtureConfig) -> String {
    let mut content = String::new();

    for func_i in 0..config.functions_per_file {
        writeln!(
            content,
            "{} <- function(x, y = {}) {{",
            function_name(index, func_i),
            func_i + 1
        )
        .unwrap();
        writeln!(content, "    helper <- function(z) z * 2").unwrap();
        writeln!(content, "    result <- x + helper(y)").unwrap();
        writeln!(content, "    if (is.na(result)) {{").unwrap();
        writeln!(content, "        return(NULL)").unwrap();
        writeln!(content, "    }}").unwrap();
        writeln!(content, "    result").unwrap();
        writeln!(content, "}}").unwrap();
        content.push('\n');
    }

    if index < config.s4_files {
        let class = class_name(index);
        writeln!(content, "setClass(\"{class}\", representation(id = \"numeric\"))").unwrap();
        writeln!(
            content,
            "setMethod(\"show\", signature(\"{class}\"), function(object) cat(object@id))"
        )
        .unwrap();
    }

    content
}

fn generate_rd_content(index: usize) -> String {
    format!(
        "\\name{{file_{index}}}\n\\alias{{{}}}\n\\title{{Generated page {index}}}\n",
        function_name(index, 0)
    )
}

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|e| panic!("Failed to create {}: {}", parent.display(), e));
    }
    std::fs::write(&path, content).unwrap_or_else(|e| panic!("Failed to write fixture file {}: {}", rel, e));
}

/// Create a temporary fixture package from the given configuration.
///
/// The directory is cleaned up when the `TempDir` is dropped.
pub fn create_fixture_workspace(config: &FixtureConfig) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory for fixture workspace");
    write_fixture_workspace(temp_dir.path(), config);
    temp_dir
}

/// Write fixture files into an existing directory.
pub fn write_fixture_workspace(dir: &Path, config: &FixtureConfig) {
    write_file(dir, "DESCRIPTION", "Package: fixture\nVersion: 0.0.1\n");
    write_file(dir, "NAMESPACE", "exportPattern(\"^[[:alpha:]]+\")\n");

    for i in 0..config.file_count {
        write_file(dir, &format!("R/file_{i}.R"), &generate_r_file_content(i, config));
        if config.rd_pages {
            write_file(dir, &format!("man/file_{i}.Rd"), &generate_rd_content(i));
        }
    }

    if config.excluded_noise {
        let noise = "ignored_function <- function() NULL\n";
        write_file(dir, ".git/hooks/pre-commit.R", noise);
        write_file(dir, "renv/library/pkg/R/ignored.R", noise);
    }
}
