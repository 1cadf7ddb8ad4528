//! Unit facade and cross-unit resolution environment.
//!
//! [`SemanticFile`] bundles one unit's tree, structural-modification
//! counter, and cache behind a small API. Cross-unit concerns — which
//! units declare a namespace, where their stubs live, how a symbol key
//! maps to a concrete definition — stay behind traits so the engine never
//! depends on a particular index implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::base::FileId;
use crate::syntax::SyntaxTree;
use super::HirError;
use super::key::{RoleMap, SymKey, SymKind};
use super::resolve::{Candidate, ResolveQuery, Sink, resolve_in_state, resolve_in_stub};
use super::state::{DefEntry, FileSemanticState, SemanticCache};
use super::stub::FileStub;

// ============================================================================
// MODIFICATION COUNTER
// ============================================================================

/// Monotonic structural-modification counter for one unit.
///
/// The counter is the sole cache-validity authority: semantic state
/// computed at stamp N is current exactly as long as the counter still
/// reads N.
#[derive(Debug, Default)]
pub struct ModCounter(AtomicU64);

impl ModCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stamp(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Record a structural change; returns the new stamp.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

// ============================================================================
// CROSS-UNIT TRAITS
// ============================================================================

/// A concrete, navigable definition location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DefHandle {
    pub file: FileId,
    pub key: SymKey,
}

/// Which units declare a given namespace.
pub trait NamespaceIndex {
    fn files_of(&self, namespace: &str) -> Vec<FileId>;
}

/// Persisted stubs for units whose trees are not resident.
pub trait StubStore {
    fn stub(&self, file: FileId) -> Option<Arc<FileStub>>;
}

/// Maps a symbol key to the definition it names within one unit.
pub trait DefinitionService {
    fn find_definition(&self, file: FileId, key: &SymKey) -> Option<DefHandle>;
}

/// Everything cross-unit resolution needs, borrowed from the host index.
pub struct ResolveEnv<'a> {
    pub namespaces: &'a dyn NamespaceIndex,
    pub stubs: &'a dyn StubStore,
    pub definitions: &'a dyn DefinitionService,
}

impl ResolveEnv<'_> {
    /// Translate a resolution candidate into a concrete definition handle.
    ///
    /// Keyword keys are never resolution targets; meeting one here is an
    /// internal invariant violation, not an unresolved name.
    pub fn definition_of(&self, candidate: &Candidate) -> Result<Option<DefHandle>, HirError> {
        if candidate.key.kind == SymKind::Keyword {
            return Err(HirError::UnknownResolveKind(SymKind::Keyword));
        }
        for file in self.namespaces.files_of(&candidate.key.namespace) {
            if let Some(handle) = self.definitions.find_definition(file, &candidate.key) {
                return Ok(Some(handle));
            }
        }
        Ok(None)
    }

    /// Stream candidates from every unit declaring `namespace`, via stubs.
    ///
    /// Returns `true` when the stream ran to completion.
    pub fn resolve_foreign(
        &self,
        namespace: &str,
        query: &ResolveQuery<'_>,
        sink: &mut Sink<'_>,
    ) -> bool {
        for file in self.namespaces.files_of(namespace) {
            let Some(stub) = self.stubs.stub(file) else {
                continue;
            };
            if !resolve_in_stub(&stub, query, sink) {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// UNIT FACADE
// ============================================================================

/// One source unit's tree, counter, and cache, behind a small API.
#[derive(Debug)]
pub struct SemanticFile {
    pub file: FileId,
    tree: SyntaxTree,
    counter: ModCounter,
    cache: SemanticCache,
}

impl SemanticFile {
    pub fn new(file: FileId, tree: SyntaxTree) -> Self {
        Self {
            file,
            tree,
            counter: ModCounter::new(),
            cache: SemanticCache::new(),
        }
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub fn stamp(&self) -> u64 {
        self.counter.stamp()
    }

    /// Replace the tree after a structural edit. Bumps the counter and
    /// invalidates the cache; in-flight passes publish nothing.
    pub fn update(&mut self, tree: SyntaxTree) {
        self.tree = tree;
        let stamp = self.counter.bump();
        self.cache.notify_structural_change();
        debug!(file = ?self.file, stamp, "structural change");
    }

    /// The current semantic state, computed on demand.
    pub fn state(&self, cancel: &CancellationToken) -> Result<Arc<FileSemanticState>, HirError> {
        self.cache
            .get_or_compute(self.counter.stamp(), &self.tree, cancel)
    }

    /// The published role annotations.
    pub fn roles(&self) -> Arc<RoleMap> {
        self.cache.roles()
    }

    /// Declared namespace, or the default when the unit declares none.
    pub fn namespace(&self, cancel: &CancellationToken) -> Result<SmolStr, HirError> {
        Ok(self.state(cancel)?.namespace.clone())
    }

    /// Top-level definitions in source order, re-derived from cached state.
    pub fn definitions(&self, cancel: &CancellationToken) -> Result<Vec<DefEntry>, HirError> {
        Ok(self.state(cancel)?.definitions.clone())
    }

    /// Stream resolution candidates at a position in this unit.
    pub fn resolve(
        &self,
        query: &ResolveQuery<'_>,
        sink: &mut Sink<'_>,
        cancel: &CancellationToken,
    ) -> Result<bool, HirError> {
        let state = self.state(cancel)?;
        Ok(resolve_in_state(&state, query, sink))
    }

    /// A persistable skeleton of the current state.
    pub fn stub(&self, cancel: &CancellationToken) -> Result<FileStub, HirError> {
        let state = self.state(cancel)?;
        Ok(FileStub::from_state(&state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::TextSize;
    use crate::hir::key::Dialect;
    use crate::hir::resolve::CandidateSource;
    use crate::syntax::read;
    use rustc_hash::FxHashMap;

    struct TestIndex {
        namespaces: FxHashMap<&'static str, Vec<FileId>>,
        stubs: FxHashMap<FileId, Arc<FileStub>>,
    }

    impl TestIndex {
        fn with_unit(namespace: &'static str, file: FileId, source: &str) -> Self {
            let semantic = SemanticFile::new(file, read(source).unwrap());
            let stub = semantic.stub(&CancellationToken::new()).unwrap();
            Self {
                namespaces: FxHashMap::from_iter([(namespace, vec![file])]),
                stubs: FxHashMap::from_iter([(file, Arc::new(stub))]),
            }
        }
    }

    impl NamespaceIndex for TestIndex {
        fn files_of(&self, namespace: &str) -> Vec<FileId> {
            self.namespaces.get(namespace).cloned().unwrap_or_default()
        }
    }

    impl StubStore for TestIndex {
        fn stub(&self, file: FileId) -> Option<Arc<FileStub>> {
            self.stubs.get(&file).cloned()
        }
    }

    impl DefinitionService for TestIndex {
        fn find_definition(&self, file: FileId, key: &SymKey) -> Option<DefHandle> {
            let stub = self.stubs.get(&file)?;
            stub.definitions
                .iter()
                .find(|d| &d.key == key)
                .map(|d| DefHandle {
                    file,
                    key: d.key.clone(),
                })
        }
    }

    #[test]
    fn test_mod_counter_is_monotonic() {
        let counter = ModCounter::new();
        assert_eq!(counter.stamp(), 0);
        assert_eq!(counter.bump(), 1);
        assert_eq!(counter.bump(), 2);
        assert_eq!(counter.stamp(), 2);
    }

    #[test]
    fn test_update_invalidates_state() {
        let token = CancellationToken::new();
        let mut file = SemanticFile::new(FileId::new(0), read("(def x 1)").unwrap());
        let before = file.state(&token).unwrap();
        assert!(Arc::ptr_eq(&before, &file.state(&token).unwrap()));

        file.update(read("(def x 1)\n(def y 2)").unwrap());
        let after = file.state(&token).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.definitions.len(), 2);
        assert_eq!(after.timestamp, 1);
    }

    #[test]
    fn test_resolve_foreign_through_stubs() {
        let index = TestIndex::with_unit(
            "other.ns",
            FileId::new(1),
            "(ns other.ns)\n(defn helper [x] x)\n(defn- hidden [x] x)",
        );
        let env = ResolveEnv {
            namespaces: &index,
            stubs: &index,
            definitions: &index,
        };

        let query = ResolveQuery {
            name: None,
            pos: TextSize::from(0),
            dialect: Dialect::Clj,
            qualifier: false,
            caller_ns: Some("app.core"),
        };
        let mut names = Vec::new();
        assert!(env.resolve_foreign("other.ns", &query, &mut |c| {
            names.push(c.key.name.to_string());
            true
        }));
        assert_eq!(names, vec!["helper"]);

        // Unknown namespace streams nothing, without error.
        assert!(env.resolve_foreign("no.such.ns", &query, &mut |_| panic!("empty")));
    }

    #[test]
    fn test_definition_of_translates_candidates() {
        let file = FileId::new(1);
        let index = TestIndex::with_unit("other.ns", file, "(ns other.ns)\n(def helper 1)");
        let env = ResolveEnv {
            namespaces: &index,
            stubs: &index,
            definitions: &index,
        };

        let candidate = Candidate {
            key: SymKey::def("other.ns", "helper"),
            private: false,
            source: CandidateSource::Import,
        };
        let handle = env.definition_of(&candidate).unwrap().unwrap();
        assert_eq!(handle.file, file);

        let missing = Candidate {
            key: SymKey::def("other.ns", "nope"),
            ..candidate.clone()
        };
        assert_eq!(env.definition_of(&missing).unwrap(), None);

        let keyword = Candidate {
            key: SymKey::new(SymKind::Keyword, "other.ns", "kw"),
            ..candidate
        };
        assert_eq!(
            env.definition_of(&keyword).unwrap_err(),
            HirError::UnknownResolveKind(SymKind::Keyword)
        );
    }
}
