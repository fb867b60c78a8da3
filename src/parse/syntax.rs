//! Independent check of a rendered command line against the bash grammar.

use crate::error::SyntaxError;

fn first_error(node: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    node.children(&mut cursor).find_map(first_error)
}

/// Parse `line` with tree-sitter-bash and report the first syntax error.
pub fn check(line: &str) -> Result<(), SyntaxError> {
    let mut parser = tree_sitter::Parser::new();
    let language: tree_sitter::Language = tree_sitter_bash::LANGUAGE.into();
    parser
        .set_language(&language)
        .map_err(|e| SyntaxError::Grammar(e.to_string()))?;
    let tree = parser.parse(line, None).ok_or(SyntaxError::Unparsable)?;

    match first_error(tree.root_node()) {
        None => Ok(()),
        Some(node) => {
            let start = node.start_position();
            let near = line
                .get(node.start_byte()..node.end_byte())
                .unwrap_or_default()
                .chars()
                .take(40)
                .collect();
            Err(SyntaxError::Invalid {
                line: start.row + 1,
                column: start.column + 1,
                near,
            })
        }
    }
}
