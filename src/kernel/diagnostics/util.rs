use ropey::Rope;
use tree_sitter::Node;

pub(super) fn node_text(rope: &Rope, node: Node<'_>) -> Option<String> {
    if node.end_byte() > rope.len_bytes() {
        return None;
    }
    let start_char = rope.byte_to_char(node.start_byte());
    let end_char = rope.byte_to_char(node.end_byte());
    Some(rope.slice(start_char..end_char).to_string())
}

/// Character range of `node`.
pub(super) fn node_chars(rope: &Rope, node: Node<'_>) -> (usize, usize) {
    let len = rope.len_bytes();
    (
        rope.byte_to_char(node.start_byte().min(len)),
        rope.byte_to_char(node.end_byte().min(len)),
    )
}

pub(super) fn node_is_field(parent: Node<'_>, field_name: &str, node: Node<'_>) -> bool {
    parent
        .child_by_field_name(field_name)
        .is_some_and(|field| same_node(field, node))
}

pub(super) fn same_node(left: Node<'_>, right: Node<'_>) -> bool {
    left.start_byte() == right.start_byte()
        && left.end_byte() == right.end_byte()
        && left.kind_id() == right.kind_id()
}

pub(super) fn has_ancestor(node: Node<'_>, kinds: &[&str]) -> bool {
    let mut current = node.parent();
    while let Some(cursor) = current {
        if kinds.contains(&cursor.kind()) {
            return true;
        }
        current = cursor.parent();
    }
    false
}

/// Pre-order walk of `node` and all of its descendants.
pub(super) fn for_each_descendant<'t>(node: Node<'t>, mut f: impl FnMut(Node<'t>)) {
    let mut cursor = node.walk();
    loop {
        f(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}
