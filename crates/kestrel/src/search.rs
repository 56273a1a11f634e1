//
// search.rs
//
// Dual-source search over open documents and the project index
//

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;

use crate::config::SearchConfig;
use crate::fuzzy::{rank, scoring_query, NameQuery};
use crate::merge::filter_scores;
use crate::open_documents::OpenDocumentIndex;
use crate::paths::{file_name, is_within, PathAliaser};
use crate::project_index::{FileNameMatches, ProjectIndex};
use crate::symbol::{SourceIndex, Symbol};

/// The active project, if the host has one open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub directory: PathBuf,
    /// The on-disk monitor is running and the project index is authoritative
    pub has_file_monitor: bool,
}

/// Symbol search results in source order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolMatches {
    pub items: Vec<Symbol>,
    pub more_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    pub filename: String,
    /// Aliased path
    pub path: String,
}

/// Ranked output of `search_code`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeSearchResults {
    pub files: Vec<FileItem>,
    pub symbols: Vec<Symbol>,
    pub more_available: bool,
}

/// Read-only view over both indexes used to answer one request.
pub struct SearchDispatcher<'a> {
    pub project_index: &'a ProjectIndex,
    pub open_documents: &'a OpenDocumentIndex,
    pub project: Option<&'a ProjectContext>,
    pub aliaser: &'a PathAliaser,
    pub config: &'a SearchConfig,
}

impl<'a> SearchDispatcher<'a> {
    /// Open-document indexes eligible for search: with an active project,
    /// only documents inside the project directory.
    fn open_sources(&self) -> Vec<Arc<SourceIndex>> {
        let mut sources = self.open_documents.snapshot();
        if let Some(project) = self.project {
            sources.retain(|s| is_within(&self.aliaser.resolve(s.context()), &project.directory));
        }
        sources
    }

    /// Symbols matching `term` from open documents first, then from the
    /// project index excluding any context already searched.
    pub fn search_symbols(&self, term: &str, max_results: usize, prefix_only: bool) -> SymbolMatches {
        let query = NameQuery::new(term, prefix_only, self.config);
        let mut items: Vec<Symbol> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();

        for source in self.open_sources() {
            visited.insert(source.context().to_string());
            items.extend(source.search(&query).cloned());
            if items.len() >= max_results {
                break;
            }
        }

        if items.len() > max_results {
            items.truncate(max_results);
            return SymbolMatches {
                items,
                more_available: true,
            };
        }

        let budget = max_results - items.len();
        let (project_items, truncated) = self.project_index.search_symbols(&query, budget, &visited);
        items.extend(project_items);

        let mut more_available = truncated;
        if items.len() > max_results {
            items.truncate(max_results);
            more_available = true;
        }
        SymbolMatches {
            items,
            more_available,
        }
    }

    /// File names matching `term`.
    ///
    /// The project index answers when the on-disk monitor runs; otherwise the
    /// names are taken from open documents.
    pub fn search_file_names(&self, term: &str, max_results: usize) -> FileNameMatches {
        let query = NameQuery::new(term, false, self.config);
        if self.project.map(|p| p.has_file_monitor).unwrap_or(false) {
            return self.project_index.search_file_names(&query, max_results);
        }

        let mut matches = FileNameMatches::default();
        for source in self.open_documents.snapshot() {
            let context = source.context();
            if context.is_empty() {
                continue;
            }
            let name = file_name(&self.aliaser.resolve(context));
            if !query.matches(&name) {
                continue;
            }
            matches.push(name, context.to_string());
            if matches.enforce_max(max_results) {
                break;
            }
        }
        matches
    }

    /// First top-level function called `name`: open documents first, then
    /// the project index.
    pub fn find_global_function(&self, name: &str) -> Option<Symbol> {
        let mut visited = HashSet::new();
        for source in self.open_sources() {
            visited.insert(source.context().to_string());
            if let Some(symbol) = source.find_global_function(name) {
                return Some(symbol.clone());
            }
        }
        self.project_index
            .find_global_function(name, &visited)
            .cloned()
    }

    /// Search files and symbols, rank each category, and keep the best
    /// `max_results` across both.
    pub fn search_code(&self, term: &str, max_results: usize) -> CodeSearchResults {
        let limit = self.config.candidate_limit;
        let files = self.search_file_names(term, limit);
        let symbols = self.search_symbols(term, limit, false);

        let query = scoring_query(term, self.config);
        let mut file_scores = rank(files.names.iter().map(String::as_str), &query, true, self.config);
        let mut symbol_scores = rank(
            symbols.items.iter().map(|s| s.name.as_str()),
            &query,
            false,
            self.config,
        );
        let outcome = filter_scores(&mut file_scores, &mut symbol_scores, max_results);

        log::trace!(
            "search_code {term:?}: {} files, {} symbols (of {} / {})",
            file_scores.len(),
            symbol_scores.len(),
            files.len(),
            symbols.items.len()
        );

        CodeSearchResults {
            files: file_scores
                .iter()
                .map(|s| FileItem {
                    filename: files.names[s.index].clone(),
                    path: files.paths[s.index].clone(),
                })
                .collect(),
            symbols: symbol_scores
                .iter()
                .map(|s| symbols.items[s.index].clone())
                .collect(),
            more_available: outcome.any(),
        }
    }

    /// Resolve `token` against the indexes.
    pub fn lookup_definition(&self, token: &FunctionToken) -> DefinitionLookup {
        if token.name.is_empty() {
            return DefinitionLookup::NoToken;
        }
        if let Some(package) = &token.package {
            return DefinitionLookup::Qualified {
                name: token.name.clone(),
                package: package.clone(),
            };
        }
        match self.find_global_function(&token.name) {
            Some(symbol) => DefinitionLookup::Source(SourceLocation {
                file: self.aliaser.resolve(&symbol.context),
                line: symbol.line,
                column: symbol.column,
                name: token.name.clone(),
            }),
            None => DefinitionLookup::Unresolved {
                name: token.name.clone(),
            },
        }
    }
}

// ============================================================================
// Function definitions
// ============================================================================

/// A possibly package-qualified function name (`pkg::name`, `pkg:::name`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionToken {
    pub package: Option<String>,
    pub name: String,
}

fn qualified_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([^:]+):{2,3}([^:]+)$").expect("qualified name pattern is valid")
    })
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || c == '.' || c == '_' || c == ':'
}

impl FunctionToken {
    /// Split a token into package and name.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        match qualified_pattern().captures(token) {
            Some(caps) => Self {
                package: Some(caps[1].to_string()),
                name: caps[2].to_string(),
            },
            None => Self {
                package: None,
                name: token.to_string(),
            },
        }
    }

    /// The token under (or immediately before) character position `pos` of
    /// `line`.
    pub fn guess(line: &str, pos: usize) -> Self {
        let chars: Vec<char> = line.chars().collect();
        let pos = pos.min(chars.len());

        let mut start = pos;
        while start > 0 && is_token_char(chars[start - 1]) {
            start -= 1;
        }
        let mut end = pos;
        while end < chars.len() && is_token_char(chars[end]) {
            end += 1;
        }

        let token: String = chars[start..end].iter().collect();
        Self::parse(token.trim_matches(':'))
    }
}

/// A definition found in an indexed source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub name: String,
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

/// A function found on the interpreter search path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchPathDefinition {
    pub name: String,
    pub namespace: String,
}

/// Index-only part of a definition lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionLookup {
    NoToken,
    Source(SourceLocation),
    /// Package-qualified; goes straight to the search path
    Qualified { name: String, package: String },
    /// Not in any index
    Unresolved { name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub function_name: Option<String>,
    pub location: Option<SourceLocation>,
    pub search_path_definition: Option<SearchPathDefinition>,
}

/// Fallback for names not defined in any indexed source.
#[async_trait]
pub trait SearchPathResolver: Send + Sync {
    /// Namespace (e.g. `package:stats`) that provides `name`, if any.
    async fn find_namespace(&self, name: &str) -> Option<String>;
}

/// Resolver for hosts without an interpreter
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSearchPath;

#[async_trait]
impl SearchPathResolver for NoSearchPath {
    async fn find_namespace(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Finish a lookup, consulting `resolver` only when the indexes missed.
pub async fn complete_definition(
    lookup: DefinitionLookup,
    resolver: &dyn SearchPathResolver,
) -> FunctionDefinition {
    match lookup {
        DefinitionLookup::NoToken => FunctionDefinition::default(),
        DefinitionLookup::Source(location) => FunctionDefinition {
            function_name: Some(location.name.clone()),
            location: Some(location),
            search_path_definition: None,
        },
        DefinitionLookup::Qualified { name, package } => FunctionDefinition {
            function_name: Some(name.clone()),
            location: None,
            search_path_definition: Some(SearchPathDefinition {
                name,
                namespace: format!("package:{package}"),
            }),
        },
        DefinitionLookup::Unresolved { name } => {
            let search_path_definition = resolver
                .find_namespace(&name)
                .await
                .map(|namespace| SearchPathDefinition {
                    name: name.clone(),
                    namespace,
                });
            FunctionDefinition {
                function_name: Some(name),
                location: None,
                search_path_definition,
            }
        }
    }
}
