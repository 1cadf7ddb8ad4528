//! Arena syntax tree and the s-expression reader.
//!
//! The tree is the engine's view of a parsed source unit: ordered children,
//! textual ranges, element kinds, and a preorder traversal with branch
//! pruning. Production hosts bring their own parser and build trees through
//! [`tree::TreeBuilder`]; the [`reader`] module is a small self-contained
//! reader used by hosts without one and by this crate's tests.

pub mod kind;
pub mod reader;
pub mod tree;

pub use kind::SyntaxKind;
pub use reader::{ReadError, read};
pub use tree::{NodeId, SyntaxTree, TreeBuilder, WalkControl};
