//! Roles, dialects, and symbol keys.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::syntax::NodeId;

/// Namespace a unit belongs to when it declares none.
pub const DEFAULT_NS: &str = "user";

// ============================================================================
// DIALECT
// ============================================================================

/// The two target environments sharing one grammar.
///
/// `Clj` is the host-platform dialect, `Cljs` the transpiled one. They
/// differ in core namespace and reader-conditional tag; everything else in
/// the engine is dialect-parametric.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    Clj,
    Cljs,
}

impl Dialect {
    /// The dialect's core namespace, implicitly in scope everywhere.
    pub const fn core_ns(self) -> &'static str {
        match self {
            Dialect::Clj => "clojure.core",
            Dialect::Cljs => "cljs.core",
        }
    }

    /// The reader-conditional tag selecting this dialect (without `:`).
    pub const fn tag(self) -> &'static str {
        match self {
            Dialect::Clj => "clj",
            Dialect::Cljs => "cljs",
        }
    }

    pub const fn other(self) -> Dialect {
        match self {
            Dialect::Clj => Dialect::Cljs,
            Dialect::Cljs => Dialect::Clj,
        }
    }

    /// Map a reader-conditional tag to a dialect.
    pub fn from_tag(tag: &str) -> Option<Dialect> {
        match tag {
            "clj" => Some(Dialect::Clj),
            "cljs" => Some(Dialect::Cljs),
            _ => None,
        }
    }

    /// Both dialects, host first.
    pub const ALL: [Dialect; 2] = [Dialect::Clj, Dialect::Cljs];
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ============================================================================
// SYMBOL KEYS
// ============================================================================

/// What kind of entity a [`SymKey`] names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymKind {
    /// A namespace itself.
    Namespace,
    /// A top-level definition.
    Def,
    /// A method inside a record/type/protocol/interface form.
    Method,
    /// A namespace alias.
    Alias,
    /// A host-platform class.
    Class,
    /// A keyword (never a resolution target, kept for completeness).
    Keyword,
}

/// Value identity for any resolvable entity.
///
/// Equality is structural. `SymKey` is the cache key that deduplicates
/// forward-referenced definitions inside a single traversal pass, before a
/// canonical handle for them exists.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymKey {
    pub name: SmolStr,
    pub namespace: SmolStr,
    pub kind: SymKind,
}

impl SymKey {
    pub fn new(kind: SymKind, namespace: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            kind,
        }
    }

    /// A top-level definition key.
    pub fn def(namespace: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self::new(SymKind::Def, namespace, name)
    }

    /// A method key; methods always live in the file namespace.
    pub fn method(namespace: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self::new(SymKind::Method, namespace, name)
    }

    /// A namespace key.
    pub fn namespace(name: impl Into<SmolStr>) -> Self {
        Self::new(SymKind::Namespace, SmolStr::default(), name)
    }

    /// An alias key; `namespace` is the alias target.
    pub fn alias(target: impl Into<SmolStr>, alias: impl Into<SmolStr>) -> Self {
        Self::new(SymKind::Alias, target, alias)
    }

    /// A host-platform class key (`namespace` is the package).
    pub fn class(package: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self::new(SymKind::Class, package, name)
    }

    /// Qualified display form (`ns/name`, or bare name when unqualified).
    pub fn qualified(&self) -> String {
        if self.namespace.is_empty() {
            self.name.to_string()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }
}

impl fmt::Display for SymKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified())
    }
}

// ============================================================================
// ROLES
// ============================================================================

/// Semantic role of a syntactically relevant node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// A definition-introducing form.
    Def,
    /// The name symbol of a definition or local binding.
    Name,
    /// A parameter vector.
    ArgVec,
    /// A field-declaration vector of a record/type form.
    FieldVec,
    /// The binding vector of a let-alike form.
    BindingVec,
    /// An `ns`/`in-ns` namespace declaration.
    NsDecl,
    /// A namespace-manipulating form (`require`, `use`, `import`, ...).
    NsRef,
    /// The dispatch value of a `defmethod` form.
    DispatchValue,
    /// Non-splicing reader conditional (`#?`).
    ReaderCond,
    /// Splicing reader conditional (`#?@`).
    ReaderCondSplicing,
}

/// Node-level semantic annotation.
///
/// Stored out-of-tree in a [`RoleMap`] keyed by node identity; the tree
/// itself stays free of mutable semantic state. Provisional entries live
/// only in the assigner's staging arena and are never published.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Annotation {
    /// A classified role.
    Role(Role),
    /// A pre-resolved target, for navigation.
    Target(SymKey),
}

/// Out-of-tree role/target side map, published with the semantic state.
pub type RoleMap = FxHashMap<NodeId, Annotation>;
