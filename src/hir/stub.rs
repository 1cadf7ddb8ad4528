//! Serializable stubs.
//!
//! A stub is the skeleton of a unit's semantic state: enough to resolve
//! names against and to show completions for, without the syntax tree or
//! role annotations. Stubs round-trip through JSON so an index can persist
//! them for units whose text is not resident.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::base::{TextRange, TextSize};
use super::def::{Import, ImportBlock};
use super::key::{Dialect, SymKey};
use super::state::FileSemanticState;

/// One definition, flattened for persistence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubDef {
    pub key: SymKey,
    pub private: bool,
    #[serde(rename = "macro")]
    pub is_macro: bool,
    pub type_hint: Option<SmolStr>,
    /// Parameter counts, one per arity, in source order.
    pub arities: Vec<u32>,
}

/// One import block with its ranges flattened to raw offsets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubImportBlock {
    pub imports: Vec<Import>,
    pub dialect: Dialect,
    pub start: u32,
    pub end: u32,
    pub scope_end: Option<u32>,
}

impl StubImportBlock {
    pub fn from_block(block: &ImportBlock) -> Self {
        Self {
            imports: block.imports.clone(),
            dialect: block.dialect,
            start: block.range.start().into(),
            end: block.range.end().into(),
            scope_end: block.scope_end.map(Into::into),
        }
    }

    /// Rehydrate into a resolvable block.
    pub fn to_block(&self) -> ImportBlock {
        ImportBlock {
            imports: self.imports.clone(),
            dialect: self.dialect,
            range: TextRange::new(self.start.into(), self.end.into()),
            scope_end: self.scope_end.map(TextSize::from),
        }
    }
}

/// The persistable skeleton of one unit's semantic state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStub {
    pub namespace: SmolStr,
    pub definitions: Vec<StubDef>,
    pub import_blocks: Vec<StubImportBlock>,
}

impl FileStub {
    pub fn from_state(state: &FileSemanticState) -> Self {
        let definitions = state
            .definitions
            .iter()
            .map(|entry| StubDef {
                key: entry.def.key.clone(),
                private: entry.def.is_private(),
                is_macro: entry.def.is_macro(),
                type_hint: entry.def.type_hint().map(SmolStr::new),
                arities: entry
                    .def
                    .prototypes
                    .iter()
                    .map(|p| p.params.len() as u32)
                    .collect(),
            })
            .collect();
        let import_blocks = state
            .import_blocks
            .iter()
            .map(StubImportBlock::from_block)
            .collect();
        Self {
            namespace: state.namespace.clone(),
            definitions,
            import_blocks,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<FileStub> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::SemanticCache;
    use crate::syntax::read;
    use tokio_util::sync::CancellationToken;

    fn stub_of(source: &str) -> FileStub {
        let tree = read(source).unwrap();
        let state = SemanticCache::new()
            .get_or_compute(0, &tree, &CancellationToken::new())
            .unwrap();
        FileStub::from_state(&state)
    }

    #[test]
    fn test_stub_captures_definitions() {
        let stub = stub_of(
            "(ns app.core)\n(defn- secret [x] x)\n(defn ^String open ([a] a) ([a b] b))",
        );
        assert_eq!(stub.namespace, "app.core");
        assert_eq!(stub.definitions.len(), 2);

        let secret = &stub.definitions[0];
        assert!(secret.private);
        assert_eq!(secret.arities, vec![1]);

        let open = &stub.definitions[1];
        assert!(!open.private);
        assert_eq!(open.type_hint.as_deref(), Some("String"));
        assert_eq!(open.arities, vec![1, 2]);
    }

    #[test]
    fn test_json_round_trip() {
        let stub = stub_of(
            "(ns app.core (:require [other.ns :as o :refer [helper]]))\n(defmacro m [a] a)",
        );
        let json = stub.to_json().unwrap();
        let back = FileStub::from_json(&json).unwrap();
        assert_eq!(stub, back);
        assert!(back.definitions[0].is_macro);
    }

    #[test]
    fn test_block_rehydration() {
        let stub = stub_of("(ns app.core (:require [other.ns :as o]))");
        let block = stub.import_blocks[0].to_block();
        assert_eq!(block.dialect, Dialect::Clj);
        assert!(block.scope_end.is_none());
        assert_eq!(block.imports[0].alias.as_deref(), Some("o"));
        assert_eq!(
            block.imports[0].alias_key,
            Some(SymKey::alias("other.ns", "o"))
        );
    }
}
