//! Arena syntax tree.
//!
//! Nodes live in a flat arena and are addressed by copyable [`NodeId`]
//! indices. That keeps the published semantic state `Send + Sync` and lets
//! role annotations live in an out-of-tree side map keyed by node identity
//! instead of mutable state embedded in nodes.

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::base::{TextRange, TextSize};
use super::kind::SyntaxKind;

/// Identity of a node within one [`SyntaxTree`].
///
/// Ids are assigned in preorder during construction and are only meaningful
/// together with the tree that produced them.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

#[derive(Clone, Debug)]
struct NodeData {
    kind: SyntaxKind,
    range: TextRange,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Token text for leaf kinds, empty otherwise.
    text: SmolStr,
}

/// Control value for [`SyntaxTree::preorder`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WalkControl {
    /// Continue into this node's children.
    Descend,
    /// Skip this node's children, continue with the next sibling.
    SkipChildren,
    /// Abort the whole traversal.
    Stop,
}

/// An immutable syntax tree for one source unit.
#[derive(Clone, Debug)]
pub struct SyntaxTree {
    text: Arc<str>,
    nodes: Vec<NodeData>,
}

impl SyntaxTree {
    /// The synthetic root node holding the unit's top-level forms.
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    /// The full source text this tree was built from.
    pub fn source(&self) -> &str {
        &self.text
    }

    pub fn kind(&self, id: NodeId) -> SyntaxKind {
        self.nodes[id.index()].kind
    }

    pub fn range(&self, id: NodeId) -> TextRange {
        self.nodes[id.index()].range
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    /// Ordered children of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// The n-th child, if present.
    pub fn child(&self, id: NodeId, n: usize) -> Option<NodeId> {
        self.nodes[id.index()].children.get(n).copied()
    }

    /// Token text of a leaf node (empty for composite nodes).
    pub fn text(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].text
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Preorder traversal starting at `from`, with branch pruning.
    ///
    /// The callback decides per node whether to descend, skip the subtree,
    /// or stop the whole walk. Returns `false` if the walk was stopped.
    pub fn preorder(&self, from: NodeId, f: &mut dyn FnMut(NodeId) -> WalkControl) -> bool {
        match f(from) {
            WalkControl::Stop => return false,
            WalkControl::SkipChildren => return true,
            WalkControl::Descend => {}
        }
        for i in 0..self.nodes[from.index()].children.len() {
            let child = self.nodes[from.index()].children[i];
            if !self.preorder(child, f) {
                return false;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Reader-macro helpers
    // ------------------------------------------------------------------

    /// Unwrap any number of `Quote` wrappers.
    pub fn strip_quote(&self, id: NodeId) -> NodeId {
        let mut cur = id;
        while self.kind(cur) == SyntaxKind::Quote {
            match self.child(cur, 0) {
                Some(inner) => cur = inner,
                None => break,
            }
        }
        cur
    }

    /// Unwrap any number of `Meta` wrappers, yielding the target form.
    pub fn strip_meta(&self, id: NodeId) -> NodeId {
        let mut cur = id;
        while self.kind(cur) == SyntaxKind::Meta {
            match self.child(cur, 1) {
                Some(target) => cur = target,
                None => break,
            }
        }
        cur
    }

    /// Metadata argument nodes wrapped around `id`, outermost first.
    ///
    /// For `^:private ^String foo` this yields the `:private` keyword node
    /// and then the `String` symbol node.
    pub fn meta_args(&self, id: NodeId) -> Vec<NodeId> {
        let mut args = Vec::new();
        let mut cur = id;
        while self.kind(cur) == SyntaxKind::Meta {
            if let Some(arg) = self.child(cur, 0) {
                args.push(arg);
            }
            match self.child(cur, 1) {
                Some(target) => cur = target,
                None => break,
            }
        }
        args
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    /// Name part of a symbol token (`ns/name` → `name`, `name` → `name`).
    pub fn sym_name(&self, id: NodeId) -> &str {
        let text = self.text(id);
        match text.rsplit_once('/') {
            // "/" alone is the division symbol, not a qualified name
            Some((q, n)) if !q.is_empty() && !n.is_empty() => n,
            _ => text,
        }
    }

    /// Qualifier part of a symbol token, if any (`ns/name` → `ns`).
    pub fn sym_qualifier(&self, id: NodeId) -> Option<&str> {
        let text = self.text(id);
        match text.rsplit_once('/') {
            Some((q, n)) if !q.is_empty() && !n.is_empty() => Some(q),
            _ => None,
        }
    }

    /// Keyword name without the leading `:` (or `::`).
    pub fn keyword_name(&self, id: NodeId) -> &str {
        self.text(id).trim_start_matches(':')
    }

    /// The top-level form (direct child of the root) containing `id`.
    pub fn top_level_ancestor(&self, id: NodeId) -> NodeId {
        let mut cur = id;
        while let Some(parent) = self.parent(cur) {
            if parent == self.root() {
                return cur;
            }
            cur = parent;
        }
        cur
    }

    /// The innermost node whose range contains `pos`.
    pub fn node_at(&self, pos: TextSize) -> NodeId {
        let mut cur = self.root();
        'descend: loop {
            for &child in self.children(cur) {
                if self.range(child).contains_inclusive(pos) {
                    cur = child;
                    continue 'descend;
                }
            }
            return cur;
        }
    }
}

/// Incremental builder for [`SyntaxTree`], usable by any parser.
///
/// Composite nodes are opened and closed in nesting order; leaves are added
/// in between. Ranges of composite nodes are patched when they close, so
/// node ids come out in preorder.
#[derive(Debug)]
pub struct TreeBuilder {
    text: Arc<str>,
    nodes: Vec<NodeData>,
    stack: Vec<NodeId>,
}

impl TreeBuilder {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text: Arc<str> = text.into();
        let root = NodeData {
            kind: SyntaxKind::Root,
            range: TextRange::up_to(TextSize::of(&*text)),
            parent: None,
            children: Vec::new(),
            text: SmolStr::default(),
        };
        Self {
            text,
            nodes: vec![root],
            stack: vec![NodeId::new(0)],
        }
    }

    fn push(&mut self, kind: SyntaxKind, range: TextRange, text: SmolStr) -> NodeId {
        let parent = *self.stack.last().expect("builder stack never empty");
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            range,
            parent: Some(parent),
            children: Vec::new(),
            text,
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Open a composite node starting at `start`.
    pub fn start_node(&mut self, kind: SyntaxKind, start: TextSize) -> NodeId {
        let id = self.push(kind, TextRange::empty(start), SmolStr::default());
        self.stack.push(id);
        id
    }

    /// Close the innermost open node, fixing its end offset.
    pub fn finish_node(&mut self, end: TextSize) {
        let id = self.stack.pop().expect("finish_node without start_node");
        let start = self.nodes[id.index()].range.start();
        self.nodes[id.index()].range = TextRange::new(start, end);
    }

    /// Add a leaf token node.
    pub fn token(&mut self, kind: SyntaxKind, range: TextRange) -> NodeId {
        let text = SmolStr::new(&self.text[range]);
        self.push(kind, range, text)
    }

    /// Finish the tree. Any still-open nodes are closed at end of text.
    pub fn finish(mut self) -> SyntaxTree {
        let end = TextSize::of(&*self.text);
        while self.stack.len() > 1 {
            self.finish_node(end);
        }
        SyntaxTree {
            text: self.text,
            nodes: self.nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_tree() -> SyntaxTree {
        // (def x)
        let mut b = TreeBuilder::new("(def x)");
        b.start_node(SyntaxKind::List, TextSize::from(0));
        b.token(SyntaxKind::Symbol, TextRange::new(1.into(), 4.into()));
        b.token(SyntaxKind::Symbol, TextRange::new(5.into(), 6.into()));
        b.finish_node(TextSize::from(7));
        b.finish()
    }

    #[test]
    fn test_builder_shape() {
        let tree = small_tree();
        let root = tree.root();
        assert_eq!(tree.kind(root), SyntaxKind::Root);
        assert_eq!(tree.children(root).len(), 1);

        let list = tree.children(root)[0];
        assert_eq!(tree.kind(list), SyntaxKind::List);
        assert_eq!(tree.range(list), TextRange::new(0.into(), 7.into()));
        assert_eq!(tree.children(list).len(), 2);
        assert_eq!(tree.text(tree.children(list)[0]), "def");
    }

    #[test]
    fn test_preorder_prune() {
        let tree = small_tree();
        let list = tree.children(tree.root())[0];

        let mut seen = Vec::new();
        tree.preorder(tree.root(), &mut |id| {
            seen.push(id);
            if id == list {
                WalkControl::SkipChildren
            } else {
                WalkControl::Descend
            }
        });
        assert_eq!(seen, vec![tree.root(), list]);
    }

    #[test]
    fn test_sym_qualifier() {
        let mut b = TreeBuilder::new("ns2/x");
        b.token(SyntaxKind::Symbol, TextRange::new(0.into(), 5.into()));
        let tree = b.finish();
        let sym = tree.children(tree.root())[0];

        assert_eq!(tree.sym_qualifier(sym), Some("ns2"));
        assert_eq!(tree.sym_name(sym), "x");
    }

    #[test]
    fn test_division_symbol_is_not_qualified() {
        let mut b = TreeBuilder::new("/");
        b.token(SyntaxKind::Symbol, TextRange::new(0.into(), 1.into()));
        let tree = b.finish();
        let sym = tree.children(tree.root())[0];

        assert_eq!(tree.sym_qualifier(sym), None);
        assert_eq!(tree.sym_name(sym), "/");
    }

    #[test]
    fn test_node_at() {
        let tree = small_tree();
        let list = tree.children(tree.root())[0];
        let x = tree.children(list)[1];

        assert_eq!(tree.node_at(TextSize::from(5)), x);
        assert_eq!(tree.node_at(TextSize::from(0)), list);
    }
}
