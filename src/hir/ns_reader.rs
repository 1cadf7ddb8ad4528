//! Namespace-Form Reader.
//!
//! Parses the small set of namespace-manipulating forms — `ns`, `in-ns`,
//! `require`, `use`, `import`, `refer`, `refer-clojure`, `alias`,
//! `require-macros` — into normalized [`Import`] records plus node-level
//! resolve-to annotations for navigation.
//!
//! The reader is invoked once per active dialect: reader-conditional
//! branches for other dialects are disregarded entirely, and matching
//! branches are unwrapped transparently so nested reading sees the branch
//! content as if it were inline.
//!
//! Malformed forms degrade to "contributes nothing" — one bad form must
//! never poison sibling forms' resolution.

use smol_str::SmolStr;
use tracing::trace;

use crate::syntax::{NodeId, SyntaxKind, SyntaxTree};
use super::def::{Import, ImportForm, ReferSpec};
use super::key::{Annotation, Dialect, RoleMap, SymKey};

/// The namespace-manipulating forms the reader recognizes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NsFormKind {
    Ns,
    InNs,
    Require,
    Use,
    Import,
    Refer,
    ReferClojure,
    Alias,
    RequireMacros,
}

impl NsFormKind {
    /// Classify a leading symbol (or `ns` clause keyword) name.
    pub fn from_name(name: &str) -> Option<NsFormKind> {
        Some(match name {
            "ns" => NsFormKind::Ns,
            "in-ns" => NsFormKind::InNs,
            "require" => NsFormKind::Require,
            "use" => NsFormKind::Use,
            "import" => NsFormKind::Import,
            "refer" => NsFormKind::Refer,
            "refer-clojure" => NsFormKind::ReferClojure,
            "alias" => NsFormKind::Alias,
            "require-macros" => NsFormKind::RequireMacros,
            _ => return None,
        })
    }

    /// `ns`/`in-ns` declare the unit's namespace; the rest only import.
    pub fn is_decl(self) -> bool {
        matches!(self, NsFormKind::Ns | NsFormKind::InNs)
    }

    fn import_form(self) -> Option<ImportForm> {
        Some(match self {
            NsFormKind::Require => ImportForm::Require,
            NsFormKind::Use => ImportForm::Use,
            NsFormKind::Import => ImportForm::Import,
            NsFormKind::Refer => ImportForm::Refer,
            NsFormKind::ReferClojure => ImportForm::ReferClojure,
            NsFormKind::Alias => ImportForm::Alias,
            NsFormKind::RequireMacros => ImportForm::RequireMacros,
            NsFormKind::Ns | NsFormKind::InNs => return None,
        })
    }
}

/// What one namespace form contributed.
#[derive(Clone, Debug, Default)]
pub struct NsFormOutput {
    /// Declared namespace, for `ns`/`in-ns` forms.
    pub namespace: Option<SmolStr>,
    /// Normalized import records, in source order.
    pub imports: Vec<Import>,
}

/// Read a recognized namespace form under one dialect.
///
/// Returns `None` when the form's head is not a namespace-manipulating
/// symbol; the caller decides whether the head actually resolves to the
/// core namespace before trusting the classification.
pub fn read_ns_form(
    tree: &SyntaxTree,
    node: NodeId,
    dialect: Dialect,
    roles: &mut RoleMap,
) -> Option<NsFormOutput> {
    let head = tree.strip_meta(tree.child(node, 0)?);
    if tree.kind(head) != SyntaxKind::Symbol {
        return None;
    }
    let kind = NsFormKind::from_name(tree.sym_name(head))?;
    let reader = NsFormReader { tree, dialect };
    Some(reader.read(node, kind, roles))
}

struct NsFormReader<'t> {
    tree: &'t SyntaxTree,
    dialect: Dialect,
}

impl<'t> NsFormReader<'t> {
    fn read(&self, node: NodeId, kind: NsFormKind, roles: &mut RoleMap) -> NsFormOutput {
        let mut out = NsFormOutput::default();
        let args = self.dialect_args(node);

        match kind {
            NsFormKind::Ns => self.read_ns_decl(&args, &mut out, roles),
            NsFormKind::InNs => {
                if let Some(name) = args.first().and_then(|&a| self.ns_symbol(a, roles)) {
                    out.namespace = Some(name);
                }
            }
            NsFormKind::Require | NsFormKind::Use | NsFormKind::RequireMacros => {
                let form = kind.import_form().expect("import-producing form");
                for &arg in &args {
                    self.read_libspec(form, self.tree.strip_quote(arg), &mut out.imports, roles);
                }
            }
            NsFormKind::Refer => {
                let Some(ns) = args.first().and_then(|&a| self.ns_symbol(a, roles)) else {
                    trace!("refer form without a namespace symbol, skipping");
                    return out;
                };
                let mut imp = Import::new(ImportForm::Refer, ns.clone());
                self.read_filter_clauses(&ns, &args[1..], &mut imp);
                out.imports.push(imp);
            }
            NsFormKind::ReferClojure => {
                // The target namespace is omitted and forced to the
                // dialect's core namespace.
                let mut imp = Import::new(ImportForm::ReferClojure, self.dialect.core_ns());
                self.read_filter_clauses(self.dialect.core_ns(), &args, &mut imp);
                out.imports.push(imp);
            }
            NsFormKind::Alias => self.read_alias(&args, &mut out, roles),
            NsFormKind::Import => {
                if let Some(imp) = self.read_platform_import(&args, roles) {
                    out.imports.push(imp);
                }
            }
        }
        out
    }

    /// Form arguments (head dropped), with reader conditionals resolved for
    /// the active dialect: matching branches are unwrapped, others dropped.
    fn dialect_args(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let children = self.tree.children(node);
        for &child in children.iter().skip(1) {
            self.push_dialect_filtered(child, &mut out);
        }
        out
    }

    fn push_dialect_filtered(&self, node: NodeId, out: &mut Vec<NodeId>) {
        match self.tree.kind(node) {
            SyntaxKind::ReaderCond => {
                if let Some(branch) = self.branch_for_dialect(node) {
                    out.push(branch);
                }
            }
            SyntaxKind::ReaderCondSplicing => {
                if let Some(branch) = self.branch_for_dialect(node) {
                    // Splicing: the branch's children appear inline.
                    out.extend(self.tree.children(branch).iter().copied());
                }
            }
            _ => out.push(node),
        }
    }

    /// Select the branch of a reader conditional matching the active
    /// dialect's tag (with `:default` as fallback).
    fn branch_for_dialect(&self, cond: NodeId) -> Option<NodeId> {
        let children = self.tree.children(cond);
        let mut default = None;
        for pair in children.chunks(2) {
            let [tag, form] = pair else { break };
            if self.tree.kind(*tag) != SyntaxKind::Keyword {
                continue;
            }
            match self.tree.keyword_name(*tag) {
                t if t == self.dialect.tag() => return Some(*form),
                "default" => default = Some(*form),
                _ => {}
            }
        }
        default
    }

    /// Extract a namespace name from a (possibly quoted, possibly
    /// meta-annotated) symbol node, annotating it as a namespace target.
    fn ns_symbol(&self, node: NodeId, roles: &mut RoleMap) -> Option<SmolStr> {
        let sym = self.tree.strip_meta(self.tree.strip_quote(node));
        if self.tree.kind(sym) != SyntaxKind::Symbol {
            return None;
        }
        let name = SmolStr::new(self.tree.text(sym));
        roles.insert(sym, Annotation::Target(SymKey::namespace(name.clone())));
        Some(name)
    }

    fn read_ns_decl(&self, args: &[NodeId], out: &mut NsFormOutput, roles: &mut RoleMap) {
        let mut rest = args;
        if let Some((&first, tail)) = rest.split_first() {
            if let Some(name) = self.ns_symbol(first, roles) {
                out.namespace = Some(name);
                rest = tail;
            }
        }
        // Clauses: (:require ...), (:use ...), (:import ...), ... — anything
        // unrecognized (docstrings, attr maps, (:gen-class)) contributes
        // nothing.
        for &clause in rest {
            if self.tree.kind(clause) != SyntaxKind::List {
                continue;
            }
            let Some(head) = self.tree.child(clause, 0) else {
                continue;
            };
            if self.tree.kind(head) != SyntaxKind::Keyword {
                continue;
            }
            let Some(kind) = NsFormKind::from_name(self.tree.keyword_name(head)) else {
                trace!(clause = self.tree.text(head), "unrecognized ns clause");
                continue;
            };
            let clause_out = self.read(clause, kind, roles);
            out.imports.extend(clause_out.imports);
        }
    }

    fn read_alias(&self, args: &[NodeId], out: &mut NsFormOutput, roles: &mut RoleMap) {
        // Exactly two symbols: alias name, target namespace.
        let (Some(&alias_arg), Some(&target_arg)) = (args.first(), args.get(1)) else {
            trace!("alias form without two arguments, skipping");
            return;
        };
        let alias_sym = self.tree.strip_quote(alias_arg);
        let Some(target) = self.ns_symbol(target_arg, roles) else {
            return;
        };
        if self.tree.kind(alias_sym) != SyntaxKind::Symbol {
            return;
        }
        let alias = SmolStr::new(self.tree.text(alias_sym));
        let mut imp = Import::new(ImportForm::Alias, target.clone());
        imp.alias_key = Some(SymKey::alias(target, alias.clone()));
        imp.alias = Some(alias);
        out.imports.push(imp);
    }

    /// `import`: each listed host class — bare symbol or grouped under a
    /// package-prefix list — merges into a single platform import whose
    /// `refer` is the full class-name set.
    fn read_platform_import(&self, args: &[NodeId], roles: &mut RoleMap) -> Option<Import> {
        let mut classes: Vec<SmolStr> = Vec::new();
        for &arg in args {
            let item = self.tree.strip_quote(arg);
            match self.tree.kind(item) {
                SyntaxKind::Symbol => {
                    classes.push(SmolStr::new(self.tree.text(item)));
                    self.annotate_class(item, self.tree.text(item), roles);
                }
                SyntaxKind::List | SyntaxKind::Vector => {
                    let kids = self.tree.children(item);
                    let Some(&pkg) = kids.first() else { continue };
                    if self.tree.kind(pkg) != SyntaxKind::Symbol {
                        continue;
                    }
                    let package = self.tree.text(pkg);
                    for &member in &kids[1..] {
                        if self.tree.kind(member) != SyntaxKind::Symbol {
                            continue;
                        }
                        let qualified =
                            SmolStr::new(format!("{package}.{}", self.tree.text(member)));
                        self.annotate_class(member, &qualified, roles);
                        classes.push(qualified);
                    }
                }
                _ => {}
            }
        }
        if classes.is_empty() {
            return None;
        }
        let mut imp = Import::new(ImportForm::Import, SmolStr::default());
        imp.refer = ReferSpec::Names(classes.into_iter().collect());
        Some(imp)
    }

    fn annotate_class(&self, node: NodeId, qualified: &str, roles: &mut RoleMap) {
        let (package, simple) = split_class(qualified);
        roles.insert(node, Annotation::Target(SymKey::class(package, simple)));
    }

    /// A single libspec of a `require`/`use`/`require-macros` form: a bare
    /// namespace symbol, a vector with filter clauses, or a parenthesized
    /// prefix group expanding each member against a shared prefix.
    fn read_libspec(
        &self,
        form: ImportForm,
        item: NodeId,
        imports: &mut Vec<Import>,
        roles: &mut RoleMap,
    ) {
        match self.tree.kind(item) {
            SyntaxKind::Symbol => {
                let Some(ns) = self.ns_symbol(item, roles) else {
                    return;
                };
                imports.push(Import::new(form, ns));
            }
            SyntaxKind::Vector => {
                if let Some(imp) = self.read_libspec_vector(form, item, None, roles) {
                    imports.push(imp);
                }
            }
            SyntaxKind::List => {
                // (prefix sym1 [sym2 :as x] ...)
                let kids = self.tree.children(item);
                let Some(&prefix_node) = kids.first() else {
                    return;
                };
                if self.tree.kind(prefix_node) != SyntaxKind::Symbol {
                    trace!("prefix group without a prefix symbol, skipping");
                    return;
                }
                let prefix = self.tree.text(prefix_node).to_owned();
                for &member in &kids[1..] {
                    match self.tree.kind(member) {
                        SyntaxKind::Symbol => {
                            let ns = SmolStr::new(format!("{prefix}.{}", self.tree.text(member)));
                            roles.insert(
                                member,
                                Annotation::Target(SymKey::namespace(ns.clone())),
                            );
                            imports.push(Import::new(form, ns));
                        }
                        SyntaxKind::Vector => {
                            if let Some(imp) =
                                self.read_libspec_vector(form, member, Some(&prefix), roles)
                            {
                                imports.push(imp);
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {
                trace!("unreadable libspec, skipping");
            }
        }
    }

    /// `[ns :as alias :refer [...] :only [...] :exclude [...] :rename {...}]`
    fn read_libspec_vector(
        &self,
        form: ImportForm,
        vector: NodeId,
        prefix: Option<&str>,
        roles: &mut RoleMap,
    ) -> Option<Import> {
        let kids = self.tree.children(vector);
        let &ns_node = kids.first()?;
        let base = self.ns_symbol(ns_node, roles)?;
        let ns = match prefix {
            Some(prefix) => SmolStr::new(format!("{prefix}.{base}")),
            None => base,
        };
        let mut imp = Import::new(form, ns.clone());

        let mut i = 1;
        while i < kids.len() {
            let key = kids[i];
            if self.tree.kind(key) != SyntaxKind::Keyword {
                i += 1;
                continue;
            }
            let Some(&value) = kids.get(i + 1) else { break };
            match self.tree.keyword_name(key) {
                "as" => {
                    if self.tree.kind(value) == SyntaxKind::Symbol {
                        let alias = SmolStr::new(self.tree.text(value));
                        imp.alias_key = Some(SymKey::alias(ns.clone(), alias.clone()));
                        imp.alias = Some(alias);
                    }
                }
                "refer" => {
                    if self.tree.kind(value) == SyntaxKind::Keyword
                        && self.tree.keyword_name(value) == "all"
                    {
                        imp.refer = ReferSpec::All;
                    } else {
                        imp.refer = ReferSpec::Names(self.symbol_set(value));
                    }
                }
                "only" => imp.only = self.symbol_set(value),
                "exclude" => imp.exclude = self.symbol_set(value),
                "rename" => self.read_rename(&ns, value, &mut imp),
                other => {
                    trace!(clause = other, "unrecognized libspec clause");
                }
            }
            i += 2;
        }
        Some(imp)
    }

    /// Keyword-flagged `:only`/`:exclude`/`:rename` clauses after a target
    /// namespace (used by `refer` and `refer-clojure`).
    fn read_filter_clauses(&self, ns: &str, args: &[NodeId], imp: &mut Import) {
        let mut i = 0;
        while i < args.len() {
            let key = args[i];
            if self.tree.kind(key) != SyntaxKind::Keyword {
                i += 1;
                continue;
            }
            let Some(&value) = args.get(i + 1) else { break };
            match self.tree.keyword_name(key) {
                "only" => imp.only = self.symbol_set(self.tree.strip_quote(value)),
                "exclude" => imp.exclude = self.symbol_set(self.tree.strip_quote(value)),
                "rename" => self.read_rename(ns, self.tree.strip_quote(value), imp),
                "refer" => {
                    // refer with no explicit :refer clause means "refer
                    // nothing"; an explicit clause is honored as given.
                    imp.refer = ReferSpec::Names(self.symbol_set(self.tree.strip_quote(value)));
                }
                other => {
                    trace!(clause = other, "unrecognized refer clause");
                }
            }
            i += 2;
        }
    }

    /// `{old new ...}` — keyed by the NEW name, valued by the handle of the
    /// original definition.
    fn read_rename(&self, ns: &str, map: NodeId, imp: &mut Import) {
        if self.tree.kind(map) != SyntaxKind::Map {
            return;
        }
        for pair in self.tree.children(map).chunks(2) {
            let [old, new] = pair else { break };
            if self.tree.kind(*old) != SyntaxKind::Symbol
                || self.tree.kind(*new) != SyntaxKind::Symbol
            {
                continue;
            }
            imp.rename.insert(
                SmolStr::new(self.tree.text(*new)),
                SymKey::def(ns, self.tree.text(*old)),
            );
        }
    }

    fn symbol_set(&self, node: NodeId) -> indexmap::IndexSet<SmolStr> {
        let mut set = indexmap::IndexSet::new();
        if matches!(self.tree.kind(node), SyntaxKind::Vector | SyntaxKind::List) {
            for &child in self.tree.children(node) {
                let sym = self.tree.strip_meta(child);
                if self.tree.kind(sym) == SyntaxKind::Symbol {
                    set.insert(SmolStr::new(self.tree.text(sym)));
                }
            }
        }
        set
    }
}

/// Split a fully qualified class name into (package, simple name).
pub fn split_class(qualified: &str) -> (&str, &str) {
    match qualified.rsplit_once('.') {
        Some((pkg, simple)) => (pkg, simple),
        None => ("", qualified),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::read;

    fn read_first(source: &str, dialect: Dialect) -> NsFormOutput {
        let tree = read(source).unwrap();
        let form = tree.children(tree.root())[0];
        let mut roles = RoleMap::default();
        read_ns_form(&tree, form, dialect, &mut roles).expect("recognized ns form")
    }

    #[test]
    fn test_ns_decl_with_require_clause() {
        let out = read_first(
            "(ns app.core (:require [ns2 :as n2 :refer [x y]]))",
            Dialect::Clj,
        );
        assert_eq!(out.namespace.as_deref(), Some("app.core"));
        assert_eq!(out.imports.len(), 1);

        let imp = &out.imports[0];
        assert_eq!(imp.form, ImportForm::Require);
        assert_eq!(imp.namespace, "ns2");
        assert_eq!(imp.alias.as_deref(), Some("n2"));
        assert!(imp.refer.contains("x"));
        assert!(imp.refer.contains("y"));
        assert!(!imp.refer.contains("z"));
    }

    #[test]
    fn test_bare_require_refers_nothing() {
        let out = read_first("(require 'ns2)", Dialect::Clj);
        assert_eq!(out.imports.len(), 1);
        assert!(out.imports[0].is_load_only());
        assert_eq!(out.imports[0].namespace, "ns2");
    }

    #[test]
    fn test_prefix_group_expansion() {
        let out = read_first("(require '(app core [util :as u]))", Dialect::Clj);
        assert_eq!(out.imports.len(), 2);
        assert_eq!(out.imports[0].namespace, "app.core");
        assert_eq!(out.imports[1].namespace, "app.util");
        assert_eq!(out.imports[1].alias.as_deref(), Some("u"));
    }

    #[test]
    fn test_refer_all() {
        let out = read_first("(require '[ns2 :refer :all])", Dialect::Clj);
        assert_eq!(out.imports[0].refer, ReferSpec::All);
    }

    #[test]
    fn test_refer_clojure_forces_core_ns() {
        let out = read_first("(refer-clojure :exclude [map])", Dialect::Clj);
        let imp = &out.imports[0];
        assert_eq!(imp.form, ImportForm::ReferClojure);
        assert_eq!(imp.namespace, "clojure.core");
        assert!(imp.exclude.contains("map"));

        let out = read_first("(refer-clojure :exclude [map])", Dialect::Cljs);
        assert_eq!(out.imports[0].namespace, "cljs.core");
    }

    #[test]
    fn test_refer_with_rename() {
        let out = read_first("(refer 'ns2 :only [a] :rename {a b})", Dialect::Clj);
        let imp = &out.imports[0];
        assert!(imp.only.contains("a"));
        assert_eq!(imp.rename.get("b"), Some(&SymKey::def("ns2", "a")));
    }

    #[test]
    fn test_alias_form() {
        let out = read_first("(alias 'n2 'ns2)", Dialect::Clj);
        let imp = &out.imports[0];
        assert_eq!(imp.form, ImportForm::Alias);
        assert_eq!(imp.namespace, "ns2");
        assert_eq!(imp.alias.as_deref(), Some("n2"));
        assert_eq!(imp.alias_key, Some(SymKey::alias("ns2", "n2")));
    }

    #[test]
    fn test_platform_import_merges_classes() {
        let out = read_first(
            "(import 'java.util.Date '(java.io File Reader))",
            Dialect::Clj,
        );
        assert_eq!(out.imports.len(), 1);
        let imp = &out.imports[0];
        assert!(imp.is_platform());
        assert!(imp.refer.contains("java.util.Date"));
        assert!(imp.refer.contains("java.io.File"));
        assert!(imp.refer.contains("java.io.Reader"));
    }

    #[test]
    fn test_reader_conditional_branch_selection() {
        let src = "(ns app.core (:require #?(:clj [ns2 :refer [x]] :cljs [ns3 :refer [y]])))";
        let clj = read_first(src, Dialect::Clj);
        assert_eq!(clj.imports[0].namespace, "ns2");

        let cljs = read_first(src, Dialect::Cljs);
        assert_eq!(cljs.imports[0].namespace, "ns3");
    }

    #[test]
    fn test_splicing_conditional_unwraps_inline() {
        let src = "(require #?@(:clj ['ns2 'ns3]))";
        let out = read_first(src, Dialect::Clj);
        assert_eq!(out.imports.len(), 2);
        assert_eq!(out.imports[0].namespace, "ns2");
        assert_eq!(out.imports[1].namespace, "ns3");

        let cljs = read_first(src, Dialect::Cljs);
        assert!(cljs.imports.is_empty());
    }

    #[test]
    fn test_malformed_forms_contribute_nothing() {
        assert!(read_first("(require)", Dialect::Clj).imports.is_empty());
        assert!(read_first("(alias 'n2)", Dialect::Clj).imports.is_empty());
        assert!(read_first("(refer :only [x])", Dialect::Clj).imports.is_empty());
        assert!(read_first("(import)", Dialect::Clj).imports.is_empty());
    }

    #[test]
    fn test_unrecognized_ns_clause_skipped() {
        let out = read_first("(ns app.core (:gen-class) (:require 'ns2))", Dialect::Clj);
        assert_eq!(out.namespace.as_deref(), Some("app.core"));
        assert_eq!(out.imports.len(), 1);
    }

    #[test]
    fn test_split_class() {
        assert_eq!(split_class("java.util.Date"), ("java.util", "Date"));
        assert_eq!(split_class("Object"), ("", "Object"));
    }
}
