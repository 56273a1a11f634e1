//
// symbol.rs
//
// Parsed symbols and the per-source symbol index
//

use std::sync::Arc;

use serde::Serialize;

use crate::fuzzy::NameQuery;

/// Kind of a source symbol.
///
/// The numeric codes are part of the wire format sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SymbolKind {
    #[default]
    None,
    Function,
    Method,
    Class,
    Enum,
    Namespace,
}

impl SymbolKind {
    pub fn code(self) -> i32 {
        match self {
            SymbolKind::None => 0,
            SymbolKind::Function => 1,
            SymbolKind::Method => 2,
            SymbolKind::Class => 3,
            SymbolKind::Enum => 4,
            SymbolKind::Namespace => 5,
        }
    }

    pub fn is_callable(self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }
}

/// A named definition found in a source unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    /// Number of enclosing `{ }` blocks at the definition site
    pub brace_level: usize,
    /// Parameter type names (S4 method signatures)
    pub signature: Vec<String>,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
    /// Context of the source unit that defines this symbol
    pub context: Arc<str>,
}

impl Symbol {
    /// Signature rendered as `{T1, T2}`, or empty when there is none.
    pub fn extra_info(&self) -> String {
        if self.signature.is_empty() {
            String::new()
        } else {
            format!("{{{}}}", self.signature.join(", "))
        }
    }

    /// Top-level function or method with exactly this name.
    pub fn is_global_function_named(&self, name: &str) -> bool {
        self.brace_level == 0 && self.kind.is_callable() && self.name == name
    }
}

/// Symbols parsed from one source unit.
///
/// Immutable once built; a re-parse produces a new index that replaces the
/// old one wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIndex {
    context: Arc<str>,
    symbols: Vec<Symbol>,
}

impl SourceIndex {
    pub fn new(context: Arc<str>, symbols: Vec<Symbol>) -> Self {
        Self { context, symbols }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Symbols satisfying `predicate`, in source order.
    pub fn search_by<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a Symbol> + 'a
    where
        P: Fn(&Symbol) -> bool + 'a,
    {
        self.symbols.iter().filter(move |s| predicate(s))
    }

    /// Symbols whose name matches `query`, in source order.
    pub fn search<'a>(&'a self, query: &'a NameQuery) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.search_by(move |s| query.matches(&s.name))
    }

    pub fn find_global_function<'a>(&'a self, name: &'a str) -> Option<&'a Symbol> {
        self.search_by(|s| s.is_global_function_named(name)).next()
    }
}

#[cfg(test)]
pub(crate) fn test_symbol(context: &str, name: &str, kind: SymbolKind, brace_level: usize) -> Symbol {
    Symbol {
        kind,
        name: name.to_string(),
        brace_level,
        signature: Vec::new(),
        line: 1,
        column: 1,
        context: Arc::from(context),
    }
}
