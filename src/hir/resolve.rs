//! Position-aware name resolution over a unit's semantic state.
//!
//! Resolution streams candidates through a caller-supplied acceptor in
//! precedence order: local definitions first, then imports in effect at the
//! query position (nearest block first), then the implicit core namespace.
//! An unresolved name is not an error; the stream is simply empty.

use crate::base::TextSize;
use super::def::ImportBlock;
use super::key::{Dialect, SymKey};
use super::ns_reader::split_class;
use super::state::FileSemanticState;
use super::stub::FileStub;

// ============================================================================
// QUERIES AND CANDIDATES
// ============================================================================

/// One resolution request.
#[derive(Clone, Copy, Debug)]
pub struct ResolveQuery<'a> {
    /// The name to resolve, or `None` to enumerate everything in scope.
    pub name: Option<&'a str>,
    /// Position the reference occurs at.
    pub pos: TextSize,
    pub dialect: Dialect,
    /// `true` when resolving the qualifier part of a qualified symbol;
    /// candidates are then aliases and namespaces, never definitions.
    pub qualifier: bool,
    /// Namespace of the referencing unit, for privacy checks. `None` means
    /// the query originates in the unit being resolved against.
    pub caller_ns: Option<&'a str>,
}

impl<'a> ResolveQuery<'a> {
    pub fn at(name: &'a str, pos: TextSize, dialect: Dialect) -> Self {
        Self {
            name: Some(name),
            pos,
            dialect,
            qualifier: false,
            caller_ns: None,
        }
    }
}

/// Where a candidate came from, in precedence order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CandidateSource {
    Local,
    Import,
    Core,
}

/// One resolution result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub key: SymKey,
    /// Carried even when the privacy exception admitted the candidate, so
    /// callers can surface the access.
    pub private: bool,
    pub source: CandidateSource,
}

/// Candidate acceptor; return `false` to stop the stream.
pub type Sink<'s> = dyn FnMut(Candidate) -> bool + 's;

// ============================================================================
// RESOLUTION OVER FULL STATE
// ============================================================================

/// Stream resolution candidates for `query` against `state`.
///
/// Returns `true` when the stream ran to completion, `false` when the sink
/// stopped it early.
pub fn resolve_in_state(
    state: &FileSemanticState,
    query: &ResolveQuery<'_>,
    sink: &mut Sink<'_>,
) -> bool {
    if query.qualifier {
        return qualifiers_in_scope(&state.import_blocks, query, sink);
    }
    if !local_definitions(state, query, sink) {
        return false;
    }
    if !import_candidates(&state.import_blocks, query, sink) {
        return false;
    }
    core_fallback(&state.import_blocks, query, sink)
}

/// Local definitions, in source order.
///
/// Forward references are rejected, with one exception: from inside a
/// macro-defining form's body every definition in the unit is visible,
/// since expansion happens after the whole unit is read.
fn local_definitions(
    state: &FileSemanticState,
    query: &ResolveQuery<'_>,
    sink: &mut Sink<'_>,
) -> bool {
    let in_macro_body = state
        .definitions
        .iter()
        .any(|e| e.def.is_macro() && e.range.contains(query.pos));
    let foreign_caller = query
        .caller_ns
        .is_some_and(|caller| caller != state.namespace);

    for entry in &state.definitions {
        if let Some(name) = query.name {
            if entry.def.name() != name {
                continue;
            }
        }
        let visible_here = entry.range.start() <= query.pos || in_macro_body;
        if !visible_here {
            continue;
        }
        let private = entry.def.is_private();
        if private && foreign_caller {
            // Exact-name queries still surface private definitions so
            // navigation works; enumeration hides them.
            if query.name.is_none() {
                continue;
            }
        }
        let candidate = Candidate {
            key: entry.def.key.clone(),
            private,
            source: CandidateSource::Local,
        };
        if !sink(candidate) {
            return false;
        }
    }
    true
}

/// Blocks in effect at `pos` with a matching dialect, nearest first.
///
/// Blocks are sorted by start; a binary search finds the last block
/// starting at or before the position, then a reverse scan applies the
/// dialect and scope filters.
fn blocks_in_scope<'b>(
    blocks: &'b [ImportBlock],
    pos: TextSize,
    dialect: Dialect,
) -> impl Iterator<Item = &'b ImportBlock> {
    let upper = blocks.partition_point(|b| b.range.start() <= pos);
    blocks[..upper]
        .iter()
        .rev()
        .filter(move |b| b.dialect == dialect && b.covers(pos))
}

fn import_candidates(
    blocks: &[ImportBlock],
    query: &ResolveQuery<'_>,
    sink: &mut Sink<'_>,
) -> bool {
    for block in blocks_in_scope(blocks, query.pos, query.dialect) {
        for imp in block.imports.iter().rev() {
            if imp.is_platform() {
                if !platform_candidates(imp, query, sink) {
                    return false;
                }
                continue;
            }
            // Rename substitutes a different target; it is checked before
            // ordinary visibility because the new name shadows the old.
            if let Some(name) = query.name {
                if let Some(original) = imp.rename.get(name) {
                    let candidate = Candidate {
                        key: original.clone(),
                        private: false,
                        source: CandidateSource::Import,
                    };
                    if !sink(candidate) {
                        return false;
                    }
                    continue;
                }
                if imp.makes_visible(name) {
                    let candidate = Candidate {
                        key: SymKey::def(imp.namespace.clone(), name),
                        private: false,
                        source: CandidateSource::Import,
                    };
                    if !sink(candidate) {
                        return false;
                    }
                }
            } else {
                // Enumeration also offers the alias symbol itself.
                if let Some(alias) = &imp.alias {
                    let candidate = Candidate {
                        key: SymKey::alias(imp.namespace.clone(), alias.clone()),
                        private: false,
                        source: CandidateSource::Import,
                    };
                    if !sink(candidate) {
                        return false;
                    }
                }
                // Beyond that, only the names spelled out locally; a
                // default-refer import's full export set is not known from
                // this unit alone.
                for name in imp.refer_names().chain(imp.only.iter()) {
                    if imp.exclude.contains(name) {
                        continue;
                    }
                    let candidate = Candidate {
                        key: SymKey::def(imp.namespace.clone(), name.clone()),
                        private: false,
                        source: CandidateSource::Import,
                    };
                    if !sink(candidate) {
                        return false;
                    }
                }
                for original in imp.rename.values() {
                    let candidate = Candidate {
                        key: original.clone(),
                        private: false,
                        source: CandidateSource::Import,
                    };
                    if !sink(candidate) {
                        return false;
                    }
                }
            }
        }
    }
    true
}

/// Platform-class candidates. Classes are visible by simple name; in the
/// transpiled dialect they live in the `js` pseudo-namespace instead of a
/// host package.
fn platform_candidates(
    imp: &super::def::Import,
    query: &ResolveQuery<'_>,
    sink: &mut Sink<'_>,
) -> bool {
    for qualified in imp.refer_names() {
        let (package, simple) = split_class(qualified);
        if query.name.is_some_and(|n| n != simple) {
            continue;
        }
        let key = match query.dialect {
            Dialect::Clj => SymKey::class(package, simple),
            Dialect::Cljs => SymKey::class("js", simple),
        };
        let candidate = Candidate {
            key,
            private: false,
            source: CandidateSource::Import,
        };
        if !sink(candidate) {
            return false;
        }
    }
    true
}

/// Qualifier resolution: aliases bound by imports in scope, plus the
/// imported namespaces themselves. No privacy applies to qualifiers.
fn qualifiers_in_scope(
    blocks: &[ImportBlock],
    query: &ResolveQuery<'_>,
    sink: &mut Sink<'_>,
) -> bool {
    for block in blocks_in_scope(blocks, query.pos, query.dialect) {
        for imp in block.imports.iter().rev() {
            if imp.is_platform() {
                continue;
            }
            if let Some(alias) = &imp.alias {
                if query.name.is_none_or(|n| n == alias.as_str()) {
                    let candidate = Candidate {
                        key: SymKey::alias(imp.namespace.clone(), alias.clone()),
                        private: false,
                        source: CandidateSource::Import,
                    };
                    if !sink(candidate) {
                        return false;
                    }
                }
            }
            if query.name.is_none_or(|n| n == imp.namespace.as_str()) {
                let candidate = Candidate {
                    key: SymKey::namespace(imp.namespace.clone()),
                    private: false,
                    source: CandidateSource::Import,
                };
                if !sink(candidate) {
                    return false;
                }
            }
        }
    }
    true
}

/// The implicit core namespace, lowest precedence.
///
/// Suppressed when a covering block already imports the core namespace for
/// this dialect: that block's exclude/rename clauses then govern core
/// visibility and have been consulted in the import step.
fn core_fallback(
    blocks: &[ImportBlock],
    query: &ResolveQuery<'_>,
    sink: &mut Sink<'_>,
) -> bool {
    let Some(name) = query.name else {
        return true; // the core export set is not enumerable from here
    };
    let core = query.dialect.core_ns();
    let core_imported = blocks_in_scope(blocks, query.pos, query.dialect)
        .any(|b| b.imports.iter().any(|i| i.namespace == core));
    if core_imported {
        return true;
    }
    sink(Candidate {
        key: SymKey::def(core, name),
        private: false,
        source: CandidateSource::Core,
    })
}

// ============================================================================
// RESOLUTION OVER STUBS
// ============================================================================

/// Resolve against a foreign unit's stub.
///
/// Positions are meaningless across units, so every definition is
/// considered; privacy applies as for full state.
pub fn resolve_in_stub(stub: &FileStub, query: &ResolveQuery<'_>, sink: &mut Sink<'_>) -> bool {
    if query.qualifier {
        let blocks: Vec<ImportBlock> = stub.import_blocks.iter().map(|b| b.to_block()).collect();
        let eof_query = ResolveQuery {
            pos: TextSize::from(u32::MAX),
            ..*query
        };
        return qualifiers_in_scope(&blocks, &eof_query, sink);
    }
    let foreign_caller = query.caller_ns.is_some_and(|caller| caller != stub.namespace);
    for def in &stub.definitions {
        if let Some(name) = query.name {
            if def.key.name != name {
                continue;
            }
        }
        if def.private && foreign_caller && query.name.is_none() {
            continue;
        }
        let candidate = Candidate {
            key: def.key.clone(),
            private: def.private,
            source: CandidateSource::Local,
        };
        if !sink(candidate) {
            return false;
        }
    }
    true
}

/// Collect every candidate for a query. Convenience over the streaming
/// interface, used by tests and simple callers.
pub fn collect_candidates(state: &FileSemanticState, query: &ResolveQuery<'_>) -> Vec<Candidate> {
    let mut out = Vec::new();
    resolve_in_state(state, query, &mut |c| {
        out.push(c);
        true
    });
    out
}

/// First candidate only.
pub fn resolve_one(state: &FileSemanticState, query: &ResolveQuery<'_>) -> Option<Candidate> {
    let mut found = None;
    resolve_in_state(state, query, &mut |c| {
        found = Some(c);
        false
    });
    found
}
