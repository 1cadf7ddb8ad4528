//! Counter-gated, single-slot semantic state cache.
//!
//! One [`SemanticCache`] guards one source unit. Validity is decided purely
//! by comparing the cached stamp against the caller's current
//! structural-modification stamp; the cache never inspects the tree to
//! decide freshness.
//!
//! Role annotations live in a slot of their own so that a structural change
//! racing with an in-flight pass can invalidate them independently: the
//! dirty flag set by [`SemanticCache::notify_structural_change`] (and by a
//! cancelled pass) makes the next reader wipe the role map before anything
//! stale can be observed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::base::TextRange;
use crate::syntax::{NodeId, SyntaxTree};
use super::HirError;
use super::assign::{AssignResult, RoleAssigner};
use super::def::{Def, ImportBlock};
use super::key::RoleMap;

// ============================================================================
// SEMANTIC STATE
// ============================================================================

/// One definition, with the source position resolution scans against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefEntry {
    pub node: NodeId,
    /// Range of the whole defining form.
    pub range: TextRange,
    pub def: Def,
}

/// The immutable semantic state of one source unit at one structural
/// version. Shared by `Arc`; identical stamps yield the identical
/// allocation.
#[derive(Debug)]
pub struct FileSemanticState {
    /// Structural-modification stamp this state was computed at.
    pub timestamp: u64,
    /// Declared namespace, or the default.
    pub namespace: SmolStr,
    /// Definitions in source order.
    pub definitions: Vec<DefEntry>,
    /// Import blocks in source order.
    pub import_blocks: Vec<ImportBlock>,
}

impl FileSemanticState {
    fn from_assign(timestamp: u64, tree: &SyntaxTree, result: &AssignResult) -> Self {
        let definitions = result
            .definitions
            .iter()
            .map(|(node, def)| DefEntry {
                node: *node,
                range: tree.range(*node),
                def: def.clone(),
            })
            .collect();
        Self {
            timestamp,
            namespace: result.namespace.clone(),
            definitions,
            import_blocks: result.import_blocks.clone(),
        }
    }
}

// ============================================================================
// CACHE
// ============================================================================

/// Single-slot cache for one unit's [`FileSemanticState`] and role map.
#[derive(Debug, Default)]
pub struct SemanticCache {
    slot: RwLock<Option<Arc<FileSemanticState>>>,
    roles: RwLock<Arc<RoleMap>>,
    /// Role annotations may be stale; wipe before the next read.
    dirty_roles: AtomicBool,
    /// Bumped by every structural-change notification. A pass publishes
    /// only when the epoch it started under is still current, so a slow
    /// pass finishing after a newer edit cannot resurrect old annotations.
    epoch: AtomicU64,
}

impl SemanticCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached state, if it is current at `stamp`.
    pub fn get(&self, stamp: u64) -> Option<Arc<FileSemanticState>> {
        self.slot
            .read()
            .as_ref()
            .filter(|state| state.timestamp == stamp)
            .cloned()
    }

    /// The published role map. A structural change marks it stale; the
    /// wipe happens here, before the read, and the map stays empty until
    /// the next successful pass republishes.
    pub fn roles(&self) -> Arc<RoleMap> {
        self.wipe_if_dirty();
        self.roles.read().clone()
    }

    fn wipe_if_dirty(&self) {
        if self.dirty_roles.swap(false, Ordering::AcqRel) {
            *self.roles.write() = Arc::new(RoleMap::default());
            trace!("wiped stale role annotations");
        }
    }

    /// The current state, recomputing when the slot is empty or stale.
    ///
    /// The pass runs outside any lock; under the write lock the slot is
    /// re-checked so a racing thread's result at the same stamp is reused
    /// instead of overwritten. A cancelled pass publishes nothing and
    /// leaves the dirty flag raised.
    pub fn get_or_compute(
        &self,
        stamp: u64,
        tree: &SyntaxTree,
        cancel: &CancellationToken,
    ) -> Result<Arc<FileSemanticState>, HirError> {
        self.wipe_if_dirty();
        if let Some(state) = self.get(stamp) {
            return Ok(state);
        }
        let epoch = self.epoch.load(Ordering::Acquire);

        debug!(stamp, "recomputing semantic state");
        let result = match RoleAssigner::new(tree, cancel.clone()).run() {
            Ok(result) => result,
            Err(err) => {
                self.dirty_roles.store(true, Ordering::Release);
                return Err(err);
            }
        };
        let state = Arc::new(FileSemanticState::from_assign(stamp, tree, &result));

        let mut slot = self.slot.write();
        if let Some(existing) = slot.as_ref().filter(|s| s.timestamp == stamp) {
            return Ok(existing.clone());
        }
        // A newer structure owns the cache when a later stamp already sits
        // in the slot or a change notification arrived while this pass ran;
        // hand the result back without publishing over it.
        let superseded = slot.as_ref().is_some_and(|s| s.timestamp > stamp)
            || self.epoch.load(Ordering::Acquire) != epoch;
        if superseded {
            return Ok(state);
        }
        *self.roles.write() = Arc::new(result.roles);
        *slot = Some(state.clone());
        Ok(state)
    }

    /// Record that the unit's structure changed: drop the slot and mark
    /// the role annotations dirty.
    pub fn notify_structural_change(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        *self.slot.write() = None;
        self.dirty_roles.store(true, Ordering::Release);
    }
}
