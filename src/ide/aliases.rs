//! Alias queries for qualified-symbol assistance.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::base::TextSize;
use crate::hir::{Dialect, FileSemanticState};

/// The namespace-to-alias table in effect at a position.
///
/// Blocks are visited in source order, so when the same namespace is
/// aliased twice the later binding wins, matching how re-evaluation
/// rebinds an alias.
pub fn aliases_in_scope(
    state: &FileSemanticState,
    pos: TextSize,
    dialect: Dialect,
) -> IndexMap<SmolStr, SmolStr> {
    let mut out = IndexMap::new();
    for block in &state.import_blocks {
        if block.dialect != dialect || block.range.start() > pos || !block.covers(pos) {
            continue;
        }
        for imp in &block.imports {
            if let Some(alias) = &imp.alias {
                out.insert(imp.namespace.clone(), alias.clone());
            }
        }
    }
    out
}

/// The alias bound for one namespace at a position, if any.
pub fn alias_for(
    state: &FileSemanticState,
    namespace: &str,
    pos: TextSize,
    dialect: Dialect,
) -> Option<SmolStr> {
    aliases_in_scope(state, pos, dialect).shift_remove(namespace)
}
