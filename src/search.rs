use crate::matcher::PartPredicate;
use crate::message::{MessageNode, PartPath};

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Only childless nodes are collected; containers are still descended into.
    pub leaves_only: bool,
    /// Descend below the direct children of the root.
    pub recursive: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            leaves_only: true,
            recursive: true,
        }
    }
}

/// A node selected by the search together with its position in the tree.
#[derive(Debug, Clone)]
pub struct LocatedPart<'a> {
    pub path: PartPath,
    pub node: &'a MessageNode,
}

/// Walk `root` depth-first and collect every node whose content type satisfies
/// `predicate`. The root itself is considered first, then its children in tree
/// order. Without `recursive` the walk stops at the root's direct children.
///
/// The walk keeps its own stack, so nesting depth is bounded only by the tree.
pub fn find_parts<'a, P>(
    root: &'a MessageNode,
    predicate: &P,
    options: SearchOptions,
) -> Vec<LocatedPart<'a>>
where
    P: PartPredicate + ?Sized,
{
    let mut found = Vec::new();
    let mut pending = vec![(root, PartPath::root())];

    while let Some((node, path)) = pending.pop() {
        let is_leaf = node.is_leaf();
        let descend = !is_leaf && (options.recursive || path.depth() == 0);

        if descend {
            // Reversed so the first child is popped next
            for (index, child) in node.children.iter().enumerate().rev() {
                pending.push((child, path.child(index)));
            }
        }

        if predicate.matches(&node.content_type) && (is_leaf || !options.leaves_only) {
            found.push(LocatedPart { path, node });
        }
    }

    found
}
