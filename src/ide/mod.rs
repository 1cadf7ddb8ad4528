//! IDE-facing queries built on the semantic layer.

pub mod aliases;

pub use aliases::{alias_for, aliases_in_scope};
