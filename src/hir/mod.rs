//! High-level IR — the semantic model for one source unit.
//!
//! The pipeline, leaf-first:
//!
//! 1. [`assign::RoleAssigner`] walks the syntax tree once, tagging nodes
//!    with semantic roles, collecting definitions and import blocks, and
//!    invoking the namespace-form reader ([`ns_reader`]) when it meets a
//!    namespace-manipulating form.
//! 2. [`state::SemanticCache`] memoizes the resulting
//!    [`FileSemanticState`], keyed on an external structural-modification
//!    counter, with a dirty-flag protocol that survives cancellation.
//! 3. [`resolve`] answers "what does this name refer to here?" queries by
//!    composing local definitions, in-scope imports, and the implicit core
//!    namespace, streaming candidates through a caller-supplied acceptor.
//! 4. [`stub`] provides a serializable skeleton of the state for units
//!    whose full tree is not resident.
//!
//! Resolution failure is never an error: an unresolved name yields an empty
//! candidate stream. Only [`HirError`] variants are genuine faults.

pub mod assign;
pub mod def;
pub mod key;
pub mod ns_reader;
pub mod resolve;
pub mod semantics;
pub mod state;
pub mod stub;

pub use assign::RoleAssigner;
pub use def::{Def, Import, ImportBlock, ImportForm, Prototype, ReferSpec};
pub use key::{Annotation, DEFAULT_NS, Dialect, Role, RoleMap, SymKey, SymKind};
pub use resolve::{Candidate, CandidateSource, ResolveQuery, resolve_in_state, resolve_in_stub};
pub use semantics::{
    DefHandle, DefinitionService, ModCounter, NamespaceIndex, ResolveEnv, SemanticFile, StubStore,
};
pub use state::{DefEntry, FileSemanticState, SemanticCache};
pub use stub::{FileStub, StubDef, StubImportBlock};

/// Hard faults of the semantic engine.
///
/// Cancellation is recovered by the cache (the next query recomputes);
/// an unknown resolve kind is an internal invariant violation, never a
/// consequence of user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HirError {
    #[error("semantic analysis cancelled")]
    Cancelled,
    #[error("unknown resolve kind {0:?}")]
    UnknownResolveKind(SymKind),
}
