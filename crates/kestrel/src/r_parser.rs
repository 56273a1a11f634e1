//
// r_parser.rs
//
// Symbol extraction from R sources
//

use std::sync::Arc;

use tree_sitter::Node;

use crate::parser_pool::{non_extra_children, parse_r};
use crate::symbol::{SourceIndex, Symbol, SymbolKind};

/// Turns source text into a `SourceIndex`.
///
/// Implementations must be deterministic: the same context and text always
/// produce an equal index.
pub trait SourceParser: Send + Sync {
    fn parse(&self, context: &str, text: &str) -> SourceIndex;
}

/// Tree-sitter based parser for R source files.
///
/// Recognised definitions:
/// - `name <- function(...)`, `name = function(...)`, `name <<- function(...)`
///   and `(function(...) ...) -> name` as functions;
/// - `setGeneric("name", ...)` as a function;
/// - `setMethod("name", signature(...), ...)` as a method whose signature
///   is the list of class names;
/// - `setClass("Name", ...)` and `setRefClass("Name", ...)` as classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RSourceParser;

impl SourceParser for RSourceParser {
    fn parse(&self, context: &str, text: &str) -> SourceIndex {
        let context: Arc<str> = Arc::from(context);
        let Some(tree) = parse_r(text) else {
            log::warn!("Parser produced no tree for {context}");
            return SourceIndex::new(context, Vec::new());
        };

        let mut collector = Collector {
            text,
            context: context.clone(),
            symbols: Vec::new(),
        };
        collector.visit(tree.root_node(), 0);
        SourceIndex::new(context, collector.symbols)
    }
}

struct Collector<'t> {
    text: &'t str,
    context: Arc<str>,
    symbols: Vec<Symbol>,
}

impl<'t> Collector<'t> {
    fn visit(&mut self, node: Node, brace_level: usize) {
        match node.kind() {
            "binary_operator" => self.assignment(node, brace_level),
            "call" => self.s4_definition(node, brace_level),
            _ => {}
        }

        let inner_level = if node.kind() == "braced_expression" {
            brace_level + 1
        } else {
            brace_level
        };
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child, inner_level);
        }
    }

    fn text_of(&self, node: Node) -> &'t str {
        &self.text[node.byte_range()]
    }

    fn push(&mut self, kind: SymbolKind, name: &str, signature: Vec<String>, at: Node, brace_level: usize) {
        let (line, column) = self.position(at);
        self.symbols.push(Symbol {
            kind,
            name: name.to_string(),
            brace_level,
            signature,
            line,
            column,
            context: self.context.clone(),
        });
    }

    /// 1-based line and character column of `node`'s start.
    fn position(&self, node: Node) -> (u32, u32) {
        let start = node.start_position();
        let line_start = node.start_byte() - start.column;
        let column = self.text[line_start..node.start_byte()].chars().count();
        (start.row as u32 + 1, column as u32 + 1)
    }

    fn assignment(&mut self, node: Node, brace_level: usize) {
        let mut cursor = node.walk();
        let parts = non_extra_children(node, &mut cursor);
        let &[lhs, op, rhs] = parts.as_slice() else {
            return;
        };

        let (target, value) = match self.text_of(op) {
            "<-" | "=" | "<<-" => (lhs, rhs),
            "->" | "->>" => (rhs, lhs),
            _ => return,
        };
        if unparenthesize(value).kind() != "function_definition" {
            return;
        }
        let name = match target.kind() {
            "identifier" => self.text_of(target),
            "string" => match string_value(target, self.text) {
                Some(name) => name,
                None => return,
            },
            _ => return,
        };
        self.push(SymbolKind::Function, name, Vec::new(), target, brace_level);
    }

    fn s4_definition(&mut self, node: Node, brace_level: usize) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let (kind, formals): (SymbolKind, &[&str]) = match self.text_of(function) {
            "setGeneric" => (SymbolKind::Function, &["name", "def"][..]),
            "setMethod" => (SymbolKind::Method, &["f", "signature", "definition"][..]),
            "setClass" | "setRefClass" => (SymbolKind::Class, &["Class"][..]),
            _ => return,
        };
        let Some(args) = node.child_by_field_name("arguments") else {
            return;
        };
        let args = CallArguments::collect(args, self.text);

        let Some(name_node) = args.formal(formals, 0) else {
            return;
        };
        let Some(name) = string_value(name_node, self.text) else {
            return;
        };

        let signature = if kind == SymbolKind::Method {
            args.formal(formals, 1)
                .map(|sig| signature_classes(sig, self.text))
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        self.push(kind, name, signature, node, brace_level);
    }
}

/// Argument values of a call, split into named and positional.
struct CallArguments<'a> {
    named: Vec<(&'a str, Node<'a>)>,
    positional: Vec<Node<'a>>,
}

impl<'a> CallArguments<'a> {
    fn collect(arguments: Node<'a>, text: &'a str) -> Self {
        let mut named = Vec::new();
        let mut positional = Vec::new();
        let mut cursor = arguments.walk();
        for arg in arguments.named_children(&mut cursor) {
            if arg.kind() != "argument" {
                continue;
            }
            let Some(value) = arg.child_by_field_name("value") else {
                continue;
            };
            match arg.child_by_field_name("name") {
                Some(name) => named.push((&text[name.byte_range()], value)),
                None => positional.push(value),
            }
        }
        Self { named, positional }
    }

    fn is_named(&self, formal: &str) -> bool {
        self.named.iter().any(|(n, _)| *n == formal)
    }

    /// Value bound to `formals[index]`: the exact-named argument if present,
    /// otherwise the positional argument left for it once the earlier formals
    /// supplied by name are skipped.
    fn formal(&self, formals: &[&str], index: usize) -> Option<Node<'a>> {
        let wanted = formals.get(index)?;
        if let Some((_, value)) = self.named.iter().find(|(n, _)| n == wanted) {
            return Some(*value);
        }
        let by_name = formals[..index].iter().filter(|f| self.is_named(f)).count();
        self.positional.get(index - by_name).copied()
    }
}

fn unparenthesize(mut node: Node) -> Node {
    while node.kind() == "parenthesized_expression" {
        match node.named_child(0) {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

/// Contents of a string literal node without its quotes.
fn string_value<'a>(node: Node, text: &'a str) -> Option<&'a str> {
    if node.kind() != "string" {
        return None;
    }
    let mut cursor = node.walk();
    let value = node
        .named_children(&mut cursor)
        .find(|c| c.kind() == "string_content")
        .map(|c| &text[c.byte_range()])
        .unwrap_or("");
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Class names in a method signature: `"numeric"`, `signature("A", y = "B")`
/// or `c("A", "B")`.
fn signature_classes(node: Node, text: &str) -> Vec<String> {
    if let Some(single) = string_value(node, text) {
        return vec![single.to_string()];
    }
    if node.kind() != "call" {
        return Vec::new();
    }
    let Some(args) = node.child_by_field_name("arguments") else {
        return Vec::new();
    };
    let mut classes = Vec::new();
    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        if arg.kind() != "argument" {
            continue;
        }
        if let Some(class) = arg
            .child_by_field_name("value")
            .and_then(|v| string_value(v, text))
        {
            classes.push(class.to_string());
        }
    }
    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SourceIndex {
        RSourceParser.parse("~/proj/R/a.R", text)
    }

    fn names(index: &SourceIndex) -> Vec<(&str, SymbolKind, usize)> {
        index
            .symbols()
            .iter()
            .map(|s| (s.name.as_str(), s.kind, s.brace_level))
            .collect()
    }

    #[test]
    fn test_assignment_forms() {
        let index = parse(
            "a <- function(x) x\n\
             b = function() NULL\n\
             c <<- function() 1\n\
             (function(y) y) -> d\n\
             e <- 42\n",
        );
        assert_eq!(
            names(&index),
            vec![
                ("a", SymbolKind::Function, 0),
                ("b", SymbolKind::Function, 0),
                ("c", SymbolKind::Function, 0),
                ("d", SymbolKind::Function, 0),
            ]
        );
        assert_eq!(index.context(), "~/proj/R/a.R");
        assert!(index.symbols().iter().all(|s| &*s.context == "~/proj/R/a.R"));
    }

    #[test]
    fn test_positions_are_one_based() {
        let index = parse("\n  helper <- function() {}\n");
        let s = &index.symbols()[0];
        assert_eq!((s.line, s.column), (2, 3));
    }

    #[test]
    fn test_column_counts_characters() {
        let index = parse("x <- \"é\"; f <- function() 2\n");
        let s = &index.symbols()[0];
        assert_eq!(s.name, "f");
        assert_eq!(s.column, 11);
    }

    #[test]
    fn test_nested_functions_carry_brace_level() {
        let index = parse(
            "outer <- function() {\n\
               inner <- function() {\n\
                 deepest <- function() NULL\n\
               }\n\
             }\n",
        );
        assert_eq!(
            names(&index),
            vec![
                ("outer", SymbolKind::Function, 0),
                ("inner", SymbolKind::Function, 1),
                ("deepest", SymbolKind::Function, 2),
            ]
        );
        assert!(index.find_global_function("inner").is_none());
        assert!(index.find_global_function("outer").is_some());
    }

    #[test]
    fn test_s4_definitions() {
        let index = parse(
            "setGeneric(\"area\", function(shape) standardGeneric(\"area\"))\n\
             setClass(\"Circle\", representation(r = \"numeric\"))\n\
             setRefClass(\"Account\")\n\
             setMethod(\"area\", signature(\"Circle\", \"missing\"), function(shape) pi)\n\
             setMethod(f = \"show\", \"Circle\", function(object) NULL)\n",
        );
        let found: Vec<_> = index
            .symbols()
            .iter()
            .map(|s| (s.name.as_str(), s.kind, s.extra_info()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("area", SymbolKind::Function, String::new()),
                ("Circle", SymbolKind::Class, String::new()),
                ("Account", SymbolKind::Class, String::new()),
                ("area", SymbolKind::Method, "{Circle, missing}".to_string()),
                ("show", SymbolKind::Method, "{Circle}".to_string()),
            ]
        );
    }

    #[test]
    fn test_non_literal_names_are_ignored() {
        let index = parse("setClass(name_var)\nsetGeneric(\"\")\nx[1] <- function() 1\n");
        assert!(index.symbols().is_empty());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "f <- function() { g <- function() 1 }\nsetClass(\"A\")\n";
        assert_eq!(parse(text), parse(text));
    }

    #[test]
    fn test_syntax_errors_do_not_prevent_indexing() {
        let index = parse("good <- function() 1\nbroken <- function( {\n");
        assert!(index.symbols().iter().any(|s| s.name == "good"));
    }
}
