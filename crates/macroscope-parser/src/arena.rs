//! Index-addressable syntax tree arena
//!
//! Tree-sitter nodes are interned into a flat `Vec`; parent and child
//! links are plain indices, and ancestor chains are index vectors. All
//! region reasoning in the resolver happens on these indices rather
//! than on live tree-sitter cursors.

use macroscope_core::SourceRegion;
use tree_sitter::{Node, Tree};

/// Index of a node in the arena. The root is always index 0.
pub type NodeId = usize;

/// One interned syntax node
#[derive(Debug, Clone)]
pub struct ArenaNode {
    /// Grammar node kind, e.g. `binary_expression`
    pub kind: String,
    /// Byte region the node covers
    pub region: SourceRegion,
    /// Parent index; `None` only for the root
    pub parent: Option<NodeId>,
    /// Child indices in source order
    pub children: Vec<NodeId>,
}

/// Flat arena of named syntax nodes
pub struct SyntaxArena {
    nodes: Vec<ArenaNode>,
}

impl SyntaxArena {
    /// Intern all named nodes of a parsed tree
    pub fn from_tree(tree: &Tree) -> Self {
        let mut arena = Self { nodes: Vec::new() };
        arena.intern(tree.root_node(), None);
        arena
    }

    fn intern(&mut self, node: Node, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(ArenaNode {
            kind: node.kind().to_string(),
            region: SourceRegion::new(node.start_byte(), node.end_byte() - node.start_byte()),
            parent,
            children: Vec::new(),
        });

        let mut cursor = node.walk();
        let children: Vec<NodeId> = node
            .named_children(&mut cursor)
            .map(|child| self.intern(child, Some(id)))
            .collect();
        self.nodes[id].children = children;
        id
    }

    /// Root node index
    pub fn root(&self) -> NodeId {
        0
    }

    /// Number of interned nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Access a node by index
    pub fn node(&self, id: NodeId) -> &ArenaNode {
        &self.nodes[id]
    }

    /// Deepest node whose region contains `region`. Falls back to the
    /// root when no child covers the region.
    pub fn smallest_covering(&self, region: SourceRegion) -> NodeId {
        let mut current = self.root();
        'descend: loop {
            for &child in &self.nodes[current].children {
                let child_region = self.nodes[child].region;
                if child_region.contains(&region)
                    || (region.is_empty() && child_region.contains_offset(region.offset))
                {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Ancestor chain from the root down to `id`, inclusive
    pub fn ancestor_chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            chain.push(node);
            current = self.nodes[node].parent;
        }
        chain.reverse();
        chain
    }

    /// Nearest common ancestor: the deepest node present on every
    /// anchor's root-to-node chain.
    pub fn common_ancestor(&self, ids: &[NodeId]) -> Option<NodeId> {
        let first = *ids.first()?;
        let mut prefix = self.ancestor_chain(first);

        for &id in &ids[1..] {
            let chain = self.ancestor_chain(id);
            let common = prefix
                .iter()
                .zip(chain.iter())
                .take_while(|(a, b)| a == b)
                .count();
            prefix.truncate(common);
            if prefix.is_empty() {
                return None;
            }
        }

        prefix.last().copied()
    }

    /// Walk up from `id` to the node that is a direct child of
    /// `ancestor`. Returns `id` itself when it already is the ancestor.
    pub fn child_of_ancestor(&self, id: NodeId, ancestor: NodeId) -> NodeId {
        if id == ancestor {
            return id;
        }
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            if parent == ancestor {
                return current;
            }
            current = parent;
        }
        current
    }

    /// Whether `descendant` lies in the subtree rooted at `ancestor`
    pub fn is_descendant(&self, descendant: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(descendant);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.nodes[node].parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser as TSParser;

    fn parse(source: &str) -> Tree {
        let mut parser = TSParser::new();
        parser
            .set_language(&tree_sitter_c::language())
            .expect("Failed to load C grammar");
        parser.parse(source, None).unwrap()
    }

    #[test]
    fn test_arena_build() {
        let source = "int x = 1;";
        let arena = SyntaxArena::from_tree(&parse(source));

        assert!(!arena.is_empty());
        assert_eq!(arena.node(arena.root()).kind, "translation_unit");
        assert_eq!(arena.node(arena.root()).parent, None);
    }

    #[test]
    fn test_smallest_covering() {
        let source = "int x = a + b;";
        let arena = SyntaxArena::from_tree(&parse(source));

        // Offset of "a" is 8; the caret inside it should land on the
        // identifier node, not the surrounding expression.
        let id = arena.smallest_covering(SourceRegion::point(8));
        assert_eq!(arena.node(id).kind, "identifier");
    }

    #[test]
    fn test_common_ancestor() {
        let source = "int x = a + b;";
        let arena = SyntaxArena::from_tree(&parse(source));

        let a = arena.smallest_covering(SourceRegion::point(8));
        let b = arena.smallest_covering(SourceRegion::point(12));
        let ancestor = arena.common_ancestor(&[a, b]).unwrap();

        assert_eq!(arena.node(ancestor).kind, "binary_expression");
        assert!(arena.is_descendant(a, ancestor));
        assert!(arena.is_descendant(b, ancestor));
    }

    #[test]
    fn test_child_of_ancestor() {
        let source = "int x = a + b;";
        let arena = SyntaxArena::from_tree(&parse(source));

        let a = arena.smallest_covering(SourceRegion::point(8));
        let root = arena.root();
        let projected = arena.child_of_ancestor(a, root);

        assert_eq!(arena.node(projected).parent, Some(root));
    }

    #[test]
    fn test_ancestor_chain_starts_at_root() {
        let source = "int x = a + b;";
        let arena = SyntaxArena::from_tree(&parse(source));

        let a = arena.smallest_covering(SourceRegion::point(8));
        let chain = arena.ancestor_chain(a);

        assert_eq!(chain.first(), Some(&arena.root()));
        assert_eq!(chain.last(), Some(&a));
    }
}
