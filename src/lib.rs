//! # cloj-base
//!
//! Core library for Clojure/ClojureScript syntax trees and incremental
//! name resolution.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! ide     → UI-adjacent helpers (alias maps for qualifier shortening)
//!   ↓
//! hir     → semantic model: roles, defs, imports, scope resolution, stubs
//!   ↓
//! syntax  → arena syntax tree + s-expression reader
//!   ↓
//! base    → primitives (FileId, text ranges, line index)
//! ```
//!
//! The engine analyzes one source unit at a time: a single role-assignment
//! pass over the syntax tree produces a cached [`hir::FileSemanticState`],
//! and position-aware resolution queries are answered by filtering that
//! state. Everything above the tree (indexing, persistence, editors) is a
//! collaborator behind a trait.

/// Foundation types: FileId, text ranges, line/column conversion
pub mod base;

/// High-level IR: roles, definitions, imports, resolution
pub mod hir;

/// UI-adjacent helpers built on top of HIR queries
pub mod ide;

/// Arena syntax tree and the s-expression reader
pub mod syntax;

// Re-export the foundation types used throughout the public API
pub use base::{FileId, LineCol, LineIndex, TextRange, TextSize};
