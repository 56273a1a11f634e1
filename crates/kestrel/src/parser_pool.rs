//
// parser_pool.rs
//
// Thread-local tree-sitter parser for R sources
//

use std::cell::RefCell;
use tree_sitter::{Parser, Tree};

thread_local! {
    static PARSER: RefCell<Parser> = RefCell::new({
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_r::LANGUAGE.into())
            .expect("Failed to set R language");
        parser
    });
}

/// Execute a function with this thread's parser instance.
pub fn with_parser<F, R>(f: F) -> R
where
    F: FnOnce(&mut Parser) -> R,
{
    PARSER.with(|parser| f(&mut parser.borrow_mut()))
}

/// Parse a complete R document from scratch.
///
/// `None` only when tree-sitter gives up (cancellation or timeout, neither of
/// which is configured here), so callers treat it as an empty document.
pub fn parse_r(text: &str) -> Option<Tree> {
    with_parser(|parser| parser.parse(text, None))
}

/// Children of `node` that are not extras (comments).
pub(crate) fn non_extra_children<'a>(
    node: tree_sitter::Node<'a>,
    cursor: &mut tree_sitter::TreeCursor<'a>,
) -> Vec<tree_sitter::Node<'a>> {
    node.children(cursor).filter(|c| !c.is_extra()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_r_produces_program() {
        let tree = parse_r("f <- function(x) x").unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn test_parser_reused_between_documents() {
        let first = parse_r("function(x) { x + 1 }").unwrap();
        let second = parse_r("y <- 42").unwrap();
        let k1 = first.root_node().child(0).map(|n| n.kind());
        let k2 = second.root_node().child(0).map(|n| n.kind());
        assert_eq!(k1, Some("function_definition"));
        assert_eq!(k2, Some("binary_operator"));
    }

    #[test]
    fn test_non_extra_children_skips_comments() {
        let tree = parse_r("f <- # note\n  function() NULL").unwrap();
        let root = tree.root_node();
        let mut cursor = root.walk();
        let top = non_extra_children(root, &mut cursor);
        assert_eq!(top.len(), 1);

        let assignment = top[0];
        let mut cursor = assignment.walk();
        let parts = non_extra_children(assignment, &mut cursor);
        assert_eq!(parts.len(), 3);
        assert!(assignment.child_count() > 3);
    }
}
