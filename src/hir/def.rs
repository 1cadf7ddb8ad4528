//! Definitions, prototypes, and import records.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::base::{TextRange, TextSize};
use super::key::{Dialect, SymKey};

// Metadata keys the engine gives meaning to.
pub(crate) const META_PRIVATE: &str = "private";
pub(crate) const META_TAG: &str = "tag";
pub(crate) const META_MACRO: &str = "macro";

// ============================================================================
// DEFINITIONS
// ============================================================================

/// One arity's parameter list, plus an optional return type hint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Prototype {
    /// Parameter names in declaration order.
    pub params: Vec<SmolStr>,
    /// Return type hint from the parameter vector's metadata.
    pub return_hint: Option<SmolStr>,
}

/// A definition extracted from a source unit.
///
/// A `Def` with no prototypes and no metadata is just a [`SymKey`] wrapper;
/// that is the common case and costs nothing extra.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Def {
    pub key: SymKey,
    /// One entry per arity, in source order.
    pub prototypes: Vec<Prototype>,
    /// Resolved metadata, string-to-string.
    pub meta: IndexMap<SmolStr, SmolStr>,
}

impl Def {
    /// A definition with identity only.
    pub fn bare(key: SymKey) -> Self {
        Self {
            key,
            prototypes: Vec::new(),
            meta: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    /// Whether the definition carries the private marker.
    pub fn is_private(&self) -> bool {
        self.meta.get(META_PRIVATE).is_some_and(|v| v == "true")
    }

    /// Whether the definition is a macro (forward-reference exception).
    pub fn is_macro(&self) -> bool {
        self.meta.get(META_MACRO).is_some_and(|v| v == "true")
    }

    /// The definition's type hint.
    ///
    /// An explicit `tag` always wins. Without one, the common return hint
    /// across all prototypes is inferred — but only when every prototype
    /// agrees; disagreement yields no hint.
    pub fn type_hint(&self) -> Option<&str> {
        if let Some(tag) = self.meta.get(META_TAG) {
            return Some(tag);
        }
        let mut hints = self.prototypes.iter().map(|p| p.return_hint.as_deref());
        let first = hints.next()??;
        for hint in hints {
            if hint != Some(first) {
                return None;
            }
        }
        Some(first)
    }
}

// ============================================================================
// IMPORTS
// ============================================================================

/// Which namespace-manipulating form produced an [`Import`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportForm {
    Require,
    Use,
    /// Host-platform class import.
    Import,
    Refer,
    ReferClojure,
    Alias,
    RequireMacros,
}

impl ImportForm {
    /// Forms whose names are visible without an explicit refer clause,
    /// as long as no `:only` restriction was given.
    ///
    /// Deliberately excludes `Require`: a bare require is a load with an
    /// optional alias, never an implicit refer. The asymmetry is language
    /// semantics, not an accident.
    pub fn refers_by_default(self) -> bool {
        matches!(
            self,
            ImportForm::Refer | ImportForm::ReferClojure | ImportForm::Use
        )
    }
}

/// The referred-name set of an import.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferSpec {
    /// `:refer :all`
    All,
    /// An explicit (possibly empty) name set.
    Names(IndexSet<SmolStr>),
}

impl ReferSpec {
    pub fn empty() -> Self {
        ReferSpec::Names(IndexSet::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ReferSpec::All => false,
            ReferSpec::Names(names) => names.is_empty(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            ReferSpec::All => true,
            ReferSpec::Names(names) => names.contains(name),
        }
    }
}

impl Default for ReferSpec {
    fn default() -> Self {
        ReferSpec::empty()
    }
}

/// A normalized import record.
///
/// Platform imports (`form == Import`) carry the flat class-name set in
/// `refer` and never have only/exclude/rename semantics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub form: ImportForm,
    /// Target namespace (empty for platform imports).
    pub namespace: SmolStr,
    /// Alias bound by `:as` or by an `alias` form.
    pub alias: Option<SmolStr>,
    /// Back-reference handle for the alias, when one exists.
    pub alias_key: Option<SymKey>,
    /// Referred names, or the class-name set for platform imports.
    pub refer: ReferSpec,
    /// `:only` restriction.
    pub only: IndexSet<SmolStr>,
    /// `:exclude` set.
    pub exclude: IndexSet<SmolStr>,
    /// `:rename` mapping, keyed by the NEW (locally visible) name; the
    /// value is the handle of the original definition.
    pub rename: IndexMap<SmolStr, SymKey>,
}

impl Import {
    pub fn new(form: ImportForm, namespace: impl Into<SmolStr>) -> Self {
        Self {
            form,
            namespace: namespace.into(),
            alias: None,
            alias_key: None,
            refer: ReferSpec::empty(),
            only: IndexSet::new(),
            exclude: IndexSet::new(),
            rename: IndexMap::new(),
        }
    }

    /// Host-class import?
    pub fn is_platform(&self) -> bool {
        self.form == ImportForm::Import
    }

    /// The explicitly referred names. Empty for `:refer :all`, whose
    /// members are not known from this unit alone.
    pub fn refer_names(&self) -> impl Iterator<Item = &SmolStr> {
        let names = match &self.refer {
            ReferSpec::Names(names) => Some(names),
            ReferSpec::All => None,
        };
        names.into_iter().flatten()
    }

    /// A bare `require`: loads the library and optionally binds an alias,
    /// but brings no symbol into unqualified scope.
    pub fn is_load_only(&self) -> bool {
        self.form == ImportForm::Require
            && self.refer.is_empty()
            && self.only.is_empty()
            && self.rename.is_empty()
    }

    /// Is `name` visible unqualified through this (non-platform) import?
    ///
    /// Exclusion removes first. A renamed definition is visible under its
    /// new name only; the new-name lookup itself is handled by the resolver
    /// because it substitutes a different target.
    pub fn makes_visible(&self, name: &str) -> bool {
        if self.exclude.contains(name) {
            return false;
        }
        if self.rename.values().any(|original| original.name == name) {
            return false;
        }
        self.refer.contains(name)
            || self.only.contains(name)
            || (self.form.refers_by_default() && self.only.is_empty())
    }
}

// ============================================================================
// IMPORT BLOCKS
// ============================================================================

/// The imports produced by one namespace form, scoped to a range and a
/// dialect.
///
/// Blocks are kept in source order within a unit; resolution at a position
/// considers only blocks whose range starts at or before that position and
/// whose scope has not ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportBlock {
    pub imports: Vec<Import>,
    pub dialect: Dialect,
    /// Range of the originating form.
    pub range: TextRange,
    /// `None` extends to end of file (top-level forms); `Some` bounds a
    /// localized require/import nested inside another form.
    pub scope_end: Option<TextSize>,
}

impl ImportBlock {
    /// Whether this block is in effect at `pos` (dialect not considered).
    pub fn covers(&self, pos: TextSize) -> bool {
        self.range.start() <= pos && self.scope_end.is_none_or(|end| pos <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_hint_explicit_wins() {
        let mut def = Def::bare(SymKey::def("app", "f"));
        def.meta.insert("tag".into(), "String".into());
        def.prototypes.push(Prototype {
            params: vec!["x".into()],
            return_hint: Some("long".into()),
        });
        assert_eq!(def.type_hint(), Some("String"));
    }

    #[test]
    fn test_type_hint_inferred_when_prototypes_agree() {
        let mut def = Def::bare(SymKey::def("app", "f"));
        for params in [vec!["x"], vec!["x", "y"]] {
            def.prototypes.push(Prototype {
                params: params.into_iter().map(SmolStr::new).collect(),
                return_hint: Some("double".into()),
            });
        }
        assert_eq!(def.type_hint(), Some("double"));
    }

    #[test]
    fn test_type_hint_disagreement_yields_none() {
        let mut def = Def::bare(SymKey::def("app", "f"));
        def.prototypes.push(Prototype {
            params: vec!["x".into()],
            return_hint: Some("double".into()),
        });
        def.prototypes.push(Prototype {
            params: vec!["x".into(), "y".into()],
            return_hint: Some("long".into()),
        });
        assert_eq!(def.type_hint(), None);
    }

    #[test]
    fn test_bare_require_is_load_only() {
        let mut imp = Import::new(ImportForm::Require, "ns2");
        imp.alias = Some("n2".into());
        assert!(imp.is_load_only());
        assert!(!imp.makes_visible("x"));

        let mut refer = Import::new(ImportForm::Require, "ns2");
        refer.refer = ReferSpec::Names(IndexSet::from(["x".into()]));
        assert!(!refer.is_load_only());
        assert!(refer.makes_visible("x"));
    }

    #[test]
    fn test_use_refers_by_default_unless_only() {
        let use_all = Import::new(ImportForm::Use, "ns2");
        assert!(use_all.makes_visible("anything"));

        let mut use_only = Import::new(ImportForm::Use, "ns2");
        use_only.only = IndexSet::from(["x".into()]);
        assert!(use_only.makes_visible("x"));
        assert!(!use_only.makes_visible("y"));
    }

    #[test]
    fn test_exclude_removes() {
        let mut imp = Import::new(ImportForm::ReferClojure, "clojure.core");
        imp.exclude = IndexSet::from(["map".into()]);
        assert!(!imp.makes_visible("map"));
        assert!(imp.makes_visible("filter"));
    }

    #[test]
    fn test_block_covers() {
        let block = ImportBlock {
            imports: Vec::new(),
            dialect: Dialect::Clj,
            range: TextRange::new(10.into(), 40.into()),
            scope_end: Some(TextSize::from(100)),
        };
        assert!(!block.covers(5.into()));
        assert!(block.covers(20.into()));
        assert!(block.covers(100.into()));
        assert!(!block.covers(101.into()));

        let eof_block = ImportBlock {
            scope_end: None,
            ..block
        };
        assert!(eof_block.covers(10_000.into()));
    }
}
