//
// config.rs
//
// Configuration for file classification, scoring and incremental indexing
//

use std::path::PathBuf;
use std::time::Duration;

/// Search and indexing configuration
///
/// Every classification rule used by the project index, the open-document
/// index and the scorer lives here so that hosts can override it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Extensions (lower case, no dot) of files eligible for file-name search
    pub trackable_extensions: Vec<String>,
    /// Exact file names eligible for file-name search
    pub trackable_file_names: Vec<String>,
    /// Extensions treated as generic text files (also trackable)
    pub text_extensions: Vec<String>,
    /// Extensions the source parser understands
    pub indexable_extensions: Vec<String>,
    /// Extensions scored worse than everything else
    pub low_interest_extensions: Vec<String>,
    /// Penalty added per matched character for low-interest candidates
    pub low_interest_penalty: i32,
    /// Wildcard marker in queries
    pub wildcard: char,
    /// Queries are truncated at the first occurrence of this character
    pub query_delimiter: char,
    /// Non-user directories, relative to the project root
    pub excluded_directories: Vec<String>,
    /// Length of the initial continuous indexing burst in milliseconds
    pub initial_burst_ms: u64,
    /// Period between indexing slices in milliseconds
    pub slice_interval_ms: u64,
    /// Raw candidate cap per category used by `search_code`
    pub candidate_limit: usize,
    /// Result cap used when a caller does not supply one
    pub default_max_results: usize,
    /// Whether the on-disk file monitor runs when a project root exists
    pub file_monitor: bool,
    /// Ask an R interpreter for definitions missing from both indexes
    pub search_path_lookup: bool,
    /// R executable; discovered on `PATH` when unset
    pub r_path: Option<PathBuf>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            trackable_extensions: strings(&[
                "r",
                "rnw",
                "rmd",
                "rmarkdown",
                "rhtml",
                "rd",
                "h",
                "hpp",
                "c",
                "cpp",
                "json",
            ]),
            trackable_file_names: strings(&[
                "DESCRIPTION",
                "NAMESPACE",
                "README",
                "NEWS",
                "Makefile",
                "configure",
                "cleanup",
                "Makevars",
            ]),
            text_extensions: strings(&[
                "txt", "md", "csv", "tsv", "yml", "yaml", "xml", "html", "htm", "css", "js", "sh",
                "sql", "tex", "bib", "py", "toml", "ini", "cfg",
            ]),
            indexable_extensions: strings(&["r"]),
            low_interest_extensions: strings(&["rd"]),
            low_interest_penalty: 3,
            wildcard: '*',
            query_delimiter: ':',
            excluded_directories: strings(&[
                ".git",
                ".svn",
                ".hg",
                ".Rproj.user",
                "packrat/lib",
                "packrat/src",
                "renv/library",
                "renv/python",
                "renv/staging",
            ]),
            initial_burst_ms: 200,
            slice_interval_ms: 20,
            candidate_limit: 100,
            default_max_results: 20,
            file_monitor: true,
            search_path_lookup: true,
            r_path: None,
        }
    }
}

impl SearchConfig {
    pub fn initial_burst(&self) -> Duration {
        Duration::from_millis(self.initial_burst_ms)
    }

    pub fn slice_interval(&self) -> Duration {
        Duration::from_millis(self.slice_interval_ms)
    }
}

fn string_list(value: &serde_json::Value, key: &str) -> Option<Vec<String>> {
    let value = value.get(key)?;
    let Some(items) = value.as_array() else {
        log::warn!("Ignoring search.{key}: expected an array of strings");
        return None;
    };
    Some(
        items
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_start_matches('.').to_string())
            .collect(),
    )
}

fn lower_case(values: Vec<String>) -> Vec<String> {
    values.into_iter().map(|s| s.to_ascii_lowercase()).collect()
}

fn typed<'a, T>(
    value: &'a serde_json::Value,
    key: &str,
    expected: &str,
    convert: impl FnOnce(&'a serde_json::Value) -> Option<T>,
) -> Option<T> {
    let raw = value.get(key)?;
    let converted = convert(raw);
    if converted.is_none() {
        log::warn!("Ignoring search.{key}: expected {expected}, got {raw}");
    }
    converted
}

fn unsigned(value: &serde_json::Value, key: &str) -> Option<u64> {
    typed(value, key, "a non-negative integer", serde_json::Value::as_u64)
}

fn integer(value: &serde_json::Value, key: &str) -> Option<i64> {
    typed(value, key, "an integer", serde_json::Value::as_i64)
}

fn boolean(value: &serde_json::Value, key: &str) -> Option<bool> {
    typed(value, key, "a boolean", serde_json::Value::as_bool)
}

fn string<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    typed(value, key, "a string", serde_json::Value::as_str)
}

fn single_char(value: &serde_json::Value, key: &str) -> Option<char> {
    let text = string(value, key)?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => {
            log::warn!("Ignoring search.{key}: expected a single character, got {text:?}");
            None
        }
    }
}

/// Parse search configuration from LSP settings.
///
/// Reads the top-level `search` object. Only keys present in the JSON are
/// applied on top of `base`; everything else keeps its current value.
///
/// Returns `None` when `search` is missing.
pub fn parse_search_config(
    settings: &serde_json::Value,
    base: &SearchConfig,
) -> Option<SearchConfig> {
    let search = settings.get("search")?;
    let mut config = base.clone();

    if let Some(v) = string_list(search, "trackableExtensions") {
        config.trackable_extensions = lower_case(v);
    }
    if let Some(v) = string_list(search, "trackableFileNames") {
        config.trackable_file_names = v;
    }
    if let Some(v) = string_list(search, "textExtensions") {
        config.text_extensions = lower_case(v);
    }
    if let Some(v) = string_list(search, "indexableExtensions") {
        config.indexable_extensions = lower_case(v);
    }
    if let Some(v) = string_list(search, "lowInterestExtensions") {
        config.low_interest_extensions = lower_case(v);
    }
    if let Some(v) = integer(search, "lowInterestPenalty") {
        config.low_interest_penalty = v.clamp(0, i32::MAX as i64) as i32;
    }
    if let Some(c) = single_char(search, "wildcard") {
        config.wildcard = c;
    }
    if let Some(c) = single_char(search, "queryDelimiter") {
        config.query_delimiter = c;
    }
    if let Some(v) = string_list(search, "excludedDirectories") {
        config.excluded_directories = v;
    }
    if let Some(indexing) = search.get("indexing") {
        if let Some(v) = unsigned(indexing, "initialBurstMs") {
            config.initial_burst_ms = v;
        }
        if let Some(v) = unsigned(indexing, "sliceIntervalMs") {
            config.slice_interval_ms = v.max(1);
        }
    }
    if let Some(v) = unsigned(search, "candidateLimit") {
        config.candidate_limit = v as usize;
    }
    if let Some(v) = unsigned(search, "maxResults") {
        config.default_max_results = v as usize;
    }
    if let Some(v) = boolean(search, "fileMonitor") {
        config.file_monitor = v;
    }
    if let Some(v) = boolean(search, "searchPathLookup") {
        config.search_path_lookup = v;
    }
    if let Some(v) = string(search, "rPath") {
        config.r_path = (!v.is_empty()).then(|| PathBuf::from(v));
    }

    log::info!("Search configuration loaded from LSP settings:");
    log::info!("  indexable_extensions: {:?}", config.indexable_extensions);
    log::info!(
        "  low_interest: {:?} (+{})",
        config.low_interest_extensions,
        config.low_interest_penalty
    );
    log::info!(
        "  indexing: burst {}ms, slice {}ms",
        config.initial_burst_ms,
        config.slice_interval_ms
    );
    log::info!(
        "  results: default {}, candidate limit {}",
        config.default_max_results,
        config.candidate_limit
    );
    log::info!("  file_monitor: {}", config.file_monitor);
    log::info!(
        "  search_path_lookup: {} (r_path: {:?})",
        config.search_path_lookup,
        config.r_path
    );

    Some(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.indexable_extensions, vec!["r"]);
        assert_eq!(config.low_interest_extensions, vec!["rd"]);
        assert_eq!(config.low_interest_penalty, 3);
        assert_eq!(config.wildcard, '*');
        assert_eq!(config.query_delimiter, ':');
        assert_eq!(config.initial_burst(), Duration::from_millis(200));
        assert_eq!(config.slice_interval(), Duration::from_millis(20));
        assert!(config.file_monitor);
    }

    #[test]
    fn test_missing_section_returns_none() {
        let base = SearchConfig::default();
        assert!(parse_search_config(&json!({ "other": {} }), &base).is_none());
    }

    #[test]
    fn test_partial_override_keeps_other_fields() {
        let base = SearchConfig::default();
        let settings = json!({
            "search": {
                "lowInterestExtensions": [".RD", "Rnw"],
                "indexing": { "sliceIntervalMs": 5 },
                "fileMonitor": false
            }
        });
        let config = parse_search_config(&settings, &base).unwrap();
        assert_eq!(config.low_interest_extensions, vec!["rd", "rnw"]);
        assert_eq!(config.slice_interval_ms, 5);
        assert_eq!(config.initial_burst_ms, 200);
        assert!(!config.file_monitor);
        assert_eq!(config.trackable_file_names, base.trackable_file_names);
    }

    #[test]
    fn test_interpreter_settings() {
        let base = SearchConfig::default();
        let settings = json!({
            "search": { "searchPathLookup": false, "rPath": "/opt/R/bin/R" }
        });
        let config = parse_search_config(&settings, &base).unwrap();
        assert!(!config.search_path_lookup);
        assert_eq!(config.r_path, Some(PathBuf::from("/opt/R/bin/R")));

        let cleared = parse_search_config(&json!({ "search": { "rPath": "" } }), &config).unwrap();
        assert_eq!(cleared.r_path, None);
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let base = SearchConfig::default();
        let settings = json!({
            "search": {
                "wildcard": "**",
                "queryDelimiter": 7,
                "trackableExtensions": "r",
                "candidateLimit": -1
            }
        });
        let config = parse_search_config(&settings, &base).unwrap();
        assert_eq!(config, base);
    }

    #[test]
    fn test_wrongly_typed_scalars_are_ignored() {
        let base = SearchConfig {
            r_path: Some(PathBuf::from("/usr/bin/R")),
            ..SearchConfig::default()
        };
        let settings = json!({
            "search": {
                "wildcard": 1,
                "lowInterestPenalty": "high",
                "indexing": { "initialBurstMs": "fast", "sliceIntervalMs": 2.5 },
                "maxResults": true,
                "fileMonitor": "yes",
                "searchPathLookup": 0,
                "rPath": false
            }
        });
        let config = parse_search_config(&settings, &base).unwrap();
        assert_eq!(config, base);
    }

    #[test]
    fn test_typed_readers() {
        let value = json!({ "n": 4, "neg": -2, "flag": true, "text": "x" });
        assert_eq!(unsigned(&value, "n"), Some(4));
        assert_eq!(unsigned(&value, "neg"), None);
        assert_eq!(integer(&value, "neg"), Some(-2));
        assert_eq!(boolean(&value, "flag"), Some(true));
        assert_eq!(boolean(&value, "text"), None);
        assert_eq!(string(&value, "text"), Some("x"));
        assert_eq!(string(&value, "n"), None);
        assert_eq!(string(&value, "missing"), None);
    }

    #[test]
    fn test_zero_slice_interval_is_clamped() {
        let base = SearchConfig::default();
        let settings = json!({ "search": { "indexing": { "sliceIntervalMs": 0 } } });
        let config = parse_search_config(&settings, &base).unwrap();
        assert_eq!(config.slice_interval_ms, 1);
    }
}
