//! Role Assigner — the single top-down traversal over a source unit.
//!
//! One pruned preorder walk classifies every syntactically relevant node
//! with a semantic role, extracts definitions (with prototypes, metadata,
//! and privacy), and invokes the namespace-form reader when it meets a
//! namespace-manipulating form.
//!
//! State threaded through the walk:
//! - a dialect stack, pushed/popped at reader-conditional branches;
//! - the set of definition names already seen, which lets user code shadow
//!   core-namespace forms once a same-named local definition has been seen
//!   in traversal order;
//! - the alias table accumulated from import blocks, for qualifier
//!   resolution.
//!
//! Definition construction is delayed: a provisional entry is staged and
//! only finalized when the walk reaches the form's matching closing
//! delimiter, so a cancelled pass never publishes a half-built definition.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::syntax::{NodeId, SyntaxKind, SyntaxTree};
use super::HirError;
use super::def::{Def, ImportBlock, Prototype, META_MACRO, META_PRIVATE, META_TAG};
use super::key::{Annotation, DEFAULT_NS, Dialect, Role, RoleMap, SymKey};
use super::ns_reader::{NsFormKind, read_ns_form};

/// Forms introducing a definition start with this prefix...
const DEF_PREFIX: &str = "def";
/// ...except these: `default` is an ordinary value name, and `defspec`
/// comes from a testing library, not the core namespace.
const DEF_CARVE_OUTS: [&str; 2] = ["default", "defspec"];

const OBJECT_FORMS: [&str; 4] = ["defprotocol", "defrecord", "deftype", "definterface"];

const BINDING_FORMS: [&str; 8] = [
    "let", "loop", "binding", "doseq", "for", "when-let", "if-let", "with-open",
];

/// Everything one traversal pass produced.
#[derive(Debug, Default)]
pub struct AssignResult {
    /// Declared namespace, or the default namespace.
    pub namespace: SmolStr,
    /// Top-level definitions in source order.
    pub definitions: Vec<(NodeId, Def)>,
    /// Import blocks in source order.
    pub import_blocks: Vec<ImportBlock>,
    /// Node-level role/target annotations.
    pub roles: RoleMap,
}

struct StagedDef {
    node: NodeId,
    def: Def,
}

/// The tree walker. Construct, then call [`RoleAssigner::run`] once.
pub struct RoleAssigner<'t> {
    tree: &'t SyntaxTree,
    cancel: CancellationToken,
    /// Dialect stack; empty means a dialect-neutral position.
    dialects: Vec<Dialect>,
    namespace: Option<SmolStr>,
    /// Definition names already seen (for core-shadowing).
    seen: FxHashSet<SmolStr>,
    /// alias → namespace per dialect, from imports processed so far. An
    /// alias read under one reader-conditional branch must not steer
    /// qualifier resolution in the other dialect's code.
    aliases: FxHashMap<Dialect, IndexMap<SmolStr, SmolStr>>,
    roles: RoleMap,
    /// Staging arena; committed wholesale at each form's closing delimiter
    /// and discarded entirely on abort.
    staged: Vec<StagedDef>,
    committed: Vec<(NodeId, Def)>,
    /// SymKey dedup for forward-referenced definitions within this pass.
    keys_seen: FxHashSet<SymKey>,
    blocks: Vec<ImportBlock>,
}

impl<'t> RoleAssigner<'t> {
    pub fn new(tree: &'t SyntaxTree, cancel: CancellationToken) -> Self {
        Self {
            tree,
            cancel,
            dialects: Vec::new(),
            namespace: None,
            seen: FxHashSet::default(),
            aliases: FxHashMap::default(),
            roles: RoleMap::default(),
            staged: Vec::new(),
            committed: Vec::new(),
            keys_seen: FxHashSet::default(),
            blocks: Vec::new(),
        }
    }

    /// Run the traversal. On cancellation everything staged is discarded
    /// with the assigner; nothing partial escapes.
    pub fn run(mut self) -> Result<AssignResult, HirError> {
        self.walk(self.tree.root())?;
        debug_assert!(self.staged.is_empty(), "all staged defs finalized");

        let tree = self.tree;
        let mut definitions = self.committed;
        definitions.sort_by_key(|&(node, _)| tree.range(node).start());
        let mut import_blocks = self.blocks;
        import_blocks.sort_by_key(|b| b.range.start());

        let namespace = self.namespace.unwrap_or_else(|| SmolStr::new(DEFAULT_NS));
        debug!(namespace = %namespace, defs = definitions.len(), "role assignment complete");
        Ok(AssignResult {
            namespace,
            definitions,
            import_blocks,
            roles: self.roles,
        })
    }

    fn file_ns(&self) -> SmolStr {
        self.namespace
            .clone()
            .unwrap_or_else(|| SmolStr::new(DEFAULT_NS))
    }

    /// Dialects in effect here: the innermost reader-conditional branch, or
    /// both when the position is dialect-neutral.
    fn active_dialects(&self) -> Vec<Dialect> {
        match self.dialects.last() {
            Some(&d) => vec![d],
            None => Dialect::ALL.to_vec(),
        }
    }

    fn walk(&mut self, id: NodeId) -> Result<(), HirError> {
        if self.cancel.is_cancelled() {
            return Err(HirError::Cancelled);
        }
        let staged_mark = self.staged.len();

        match self.tree.kind(id) {
            SyntaxKind::Root | SyntaxKind::Vector | SyntaxKind::Map | SyntaxKind::Set => {
                for i in 0..self.tree.children(id).len() {
                    let child = self.tree.children(id)[i];
                    self.walk(child)?;
                }
            }
            SyntaxKind::List => self.classify_list(id)?,
            SyntaxKind::ReaderCond | SyntaxKind::ReaderCondSplicing => {
                self.walk_reader_cond(id)?;
            }
            SyntaxKind::Meta => {
                // Walk the target; the metadata argument is data.
                if let Some(target) = self.tree.child(id, 1) {
                    self.walk(target)?;
                }
            }
            SyntaxKind::Keyword => self.tag_keyword(id),
            // Quoted forms are data, not code.
            SyntaxKind::Quote => {}
            _ => {}
        }

        // Matching closing delimiter reached: finalize this form's staged
        // definitions, in staging order.
        if self.staged.len() > staged_mark {
            let finalized: Vec<StagedDef> = self.staged.drain(staged_mark..).collect();
            for staged in finalized {
                self.finalize(staged);
            }
        }
        Ok(())
    }

    fn finalize(&mut self, staged: StagedDef) {
        // SymKey equality is the sole dedup for forward references.
        if self.keys_seen.insert(staged.def.key.clone()) {
            self.seen.insert(staged.def.key.name.clone());
            self.committed.push((staged.node, staged.def));
        }
    }

    fn walk_reader_cond(&mut self, id: NodeId) -> Result<(), HirError> {
        let role = if self.tree.kind(id) == SyntaxKind::ReaderCondSplicing {
            Role::ReaderCondSplicing
        } else {
            Role::ReaderCond
        };
        self.roles.insert(id, Annotation::Role(role));

        // Children alternate tag keyword / form; push the tag's dialect for
        // the extent of its branch.
        let children: Vec<NodeId> = self.tree.children(id).to_vec();
        for pair in children.chunks(2) {
            let [tag, form] = pair else { break };
            if self.tree.kind(*tag) != SyntaxKind::Keyword {
                continue;
            }
            match Dialect::from_tag(self.tree.keyword_name(*tag)) {
                Some(dialect) => {
                    self.dialects.push(dialect);
                    let result = self.walk(*form);
                    self.dialects.pop();
                    result?;
                }
                None if self.tree.keyword_name(*tag) == "default" => {
                    self.walk(*form)?;
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Resolve the namespace of a list form's leading symbol.
    ///
    /// An explicit qualifier goes through the alias table; a bare name that
    /// matches an already-seen file-local definition belongs to this file's
    /// namespace; anything else defaults to the active core namespace.
    fn resolve_head_ns(&mut self, head: NodeId, name: &str) -> SmolStr {
        if let Some(qualifier) = self.tree.sym_qualifier(head) {
            let resolved = self
                .alias_target(qualifier)
                .unwrap_or_else(|| SmolStr::new(qualifier));
            self.roles.insert(
                head,
                Annotation::Target(SymKey::namespace(resolved.clone())),
            );
            return resolved;
        }
        if self.seen.contains(name) {
            return self.file_ns();
        }
        SmolStr::new(self.active_dialects()[0].core_ns())
    }

    /// Resolve a qualifier through the alias tables of the active dialects.
    fn alias_target(&self, qualifier: &str) -> Option<SmolStr> {
        self.active_dialects()
            .iter()
            .find_map(|d| self.aliases.get(d)?.get(qualifier).cloned())
    }

    fn is_core_ns(&self, ns: &str) -> bool {
        self.active_dialects().iter().any(|d| d.core_ns() == ns)
    }

    /// Tag a namespaced keyword with its namespace. A single-colon
    /// qualifier is a literal namespace; a double-colon qualifier resolves
    /// through the alias table, and a bare double-colon keyword belongs to
    /// the file namespace.
    fn tag_keyword(&mut self, id: NodeId) {
        let auto_resolved = self.tree.text(id).starts_with("::");
        let target = match self.tree.sym_qualifier(id) {
            Some(raw) => {
                let qualifier = raw.trim_start_matches(':');
                if auto_resolved {
                    self.alias_target(qualifier)
                        .unwrap_or_else(|| SmolStr::new(qualifier))
                } else {
                    SmolStr::new(qualifier)
                }
            }
            None if auto_resolved => self.file_ns(),
            None => return,
        };
        self.roles
            .insert(id, Annotation::Target(SymKey::namespace(target)));
    }

    fn classify_list(&mut self, id: NodeId) -> Result<(), HirError> {
        let Some(head_raw) = self.tree.child(id, 0) else {
            return Ok(());
        };
        let head = self.tree.strip_meta(head_raw);
        if self.tree.kind(head) != SyntaxKind::Symbol {
            return self.walk_children_from(id, 0);
        }

        let name = SmolStr::new(self.tree.sym_name(head));
        let head_ns = self.resolve_head_ns(head, &name);
        let in_core = self.is_core_ns(&head_ns);

        if in_core {
            if let Some(kind) = NsFormKind::from_name(&name) {
                self.classify_ns_form(id, kind);
                // Consumed at a coarser granularity; do not descend.
                return Ok(());
            }
            if name == "defmethod" {
                return self.classify_defmethod(id);
            }
            if BINDING_FORMS.contains(&name.as_str()) {
                return self.classify_binding_form(id);
            }
            if name == "letfn" {
                return self.classify_letfn(id);
            }
            if OBJECT_FORMS.contains(&name.as_str()) {
                self.classify_object_form(id);
                // Classified as a whole; methods and fields consumed above.
                return Ok(());
            }
            if name.starts_with(DEF_PREFIX) && !DEF_CARVE_OUTS.contains(&name.as_str()) {
                return self.classify_def(id, &name);
            }
        }

        self.walk_children_from(id, 1)
    }

    fn walk_children_from(&mut self, id: NodeId, from: usize) -> Result<(), HirError> {
        for i in from..self.tree.children(id).len() {
            let child = self.tree.children(id)[i];
            self.walk(child)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Namespace forms
    // ------------------------------------------------------------------

    fn classify_ns_form(&mut self, id: NodeId, kind: NsFormKind) {
        let role = if kind.is_decl() { Role::NsDecl } else { Role::NsRef };
        self.roles.insert(id, Annotation::Role(role));

        // One independently scoped block per active dialect branch.
        for dialect in self.active_dialects() {
            let Some(output) = read_ns_form(self.tree, id, dialect, &mut self.roles) else {
                continue;
            };
            if let Some(ns) = output.namespace {
                // The first declaration names the unit.
                if self.namespace.is_none() {
                    self.namespace = Some(ns);
                }
            }
            for imp in &output.imports {
                if let Some(alias) = &imp.alias {
                    self.aliases
                        .entry(dialect)
                        .or_default()
                        .insert(alias.clone(), imp.namespace.clone());
                }
            }
            if output.imports.is_empty() {
                continue;
            }
            let scope_end = if kind.is_decl() || self.effectively_top_level(id) {
                None
            } else {
                Some(self.tree.range(self.tree.top_level_ancestor(id)).end())
            };
            self.blocks.push(ImportBlock {
                imports: output.imports,
                dialect,
                range: self.tree.range(id),
                scope_end,
            });
        }
    }

    /// Whether only reader conditionals and metadata wrappers separate the
    /// node from the root. Such a form scopes to end of file, like a plain
    /// top-level one.
    fn effectively_top_level(&self, id: NodeId) -> bool {
        let mut cur = self.tree.parent(id);
        while let Some(p) = cur {
            match self.tree.kind(p) {
                SyntaxKind::Root => return true,
                SyntaxKind::ReaderCond
                | SyntaxKind::ReaderCondSplicing
                | SyntaxKind::Meta => cur = self.tree.parent(p),
                _ => return false,
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    fn classify_def(&mut self, id: NodeId, form_name: &str) -> Result<(), HirError> {
        let Some(name_raw) = self.tree.child(id, 1) else {
            return self.walk_children_from(id, 1);
        };
        let name_node = self.tree.strip_meta(name_raw);
        // The name must be a plain symbol, not a reader-macro-prefixed form.
        if self.tree.kind(name_node) != SyntaxKind::Symbol {
            return self.walk_children_from(id, 1);
        }

        let def_name = SmolStr::new(self.tree.sym_name(name_node));
        let def_ns = match self.tree.sym_qualifier(name_node) {
            Some(q) => self.alias_target(q).unwrap_or_else(|| SmolStr::new(q)),
            None => self.file_ns(),
        };
        let key = SymKey::def(def_ns, def_name);
        let mut def = Def::bare(key.clone());

        self.collect_meta(id, name_raw, &mut def);
        if form_name == "defmacro" {
            def.meta.insert(META_MACRO.into(), "true".into());
        }
        // defn- style trailing dash is the privacy shorthand of last resort.
        if form_name.ends_with('-') {
            def.meta
                .entry(META_PRIVATE.into())
                .or_insert_with(|| "true".into());
        }

        self.collect_prototypes(id, &mut def);

        self.roles.insert(id, Annotation::Role(Role::Def));
        self.roles.insert(name_node, Annotation::Target(key));
        self.staged.push(StagedDef { node: id, def });

        // Walk body forms for nested (localized) namespace forms and
        // nested definitions.
        self.walk_children_from(id, 2)
    }

    /// Privacy and other metadata, from up to three sources in increasing
    /// priority: form-level metadata map, symbol-level shorthand metadata,
    /// and an explicit following metadata map literal.
    fn collect_meta(&self, id: NodeId, name_raw: NodeId, def: &mut Def) {
        // 1. Metadata wrapped around the whole def form.
        let mut wrapper = self.tree.parent(id);
        let mut form_level = Vec::new();
        while let Some(w) = wrapper {
            if self.tree.kind(w) != SyntaxKind::Meta {
                break;
            }
            if let Some(arg) = self.tree.child(w, 0) {
                form_level.push(arg);
            }
            wrapper = self.tree.parent(w);
        }
        for arg in form_level.into_iter().rev() {
            self.apply_meta_arg(arg, def);
        }

        // 2. Shorthand metadata on the name symbol.
        for arg in self.tree.meta_args(name_raw) {
            self.apply_meta_arg(arg, def);
        }

        // 3. An attribute map following the name (past an optional
        // docstring). A trailing map with nothing after it is the
        // definition's value, not metadata.
        let mut idx = 2;
        if self
            .tree
            .child(id, idx)
            .is_some_and(|c| self.tree.kind(c) == SyntaxKind::String)
        {
            idx += 1;
        }
        if let Some(map) = self.tree.child(id, idx) {
            if self.tree.kind(map) == SyntaxKind::Map && self.tree.child(id, idx + 1).is_some() {
                self.apply_meta_arg(map, def);
            }
        }
    }

    fn apply_meta_arg(&self, arg: NodeId, def: &mut Def) {
        match self.tree.kind(arg) {
            // ^:private — shorthand keyword flag
            SyntaxKind::Keyword => {
                def.meta
                    .insert(SmolStr::new(self.tree.keyword_name(arg)), "true".into());
            }
            // ^String — shorthand type hint
            SyntaxKind::Symbol => {
                def.meta
                    .insert(META_TAG.into(), SmolStr::new(self.tree.text(arg)));
            }
            // ^{:private true :tag String}
            SyntaxKind::Map => {
                for pair in self.tree.children(arg).chunks(2) {
                    let [k, v] = pair else { break };
                    if self.tree.kind(*k) != SyntaxKind::Keyword {
                        continue;
                    }
                    let key = SmolStr::new(self.tree.keyword_name(*k));
                    let value = match self.tree.kind(*v) {
                        SyntaxKind::Symbol | SyntaxKind::Number => {
                            SmolStr::new(self.tree.text(*v))
                        }
                        SyntaxKind::String => {
                            SmolStr::new(self.tree.text(*v).trim_matches('"'))
                        }
                        SyntaxKind::Keyword => SmolStr::new(self.tree.keyword_name(*v)),
                        _ => SmolStr::new("true"),
                    };
                    def.meta.insert(key, value);
                }
            }
            _ => {}
        }
    }

    /// Prototype extraction: a sibling parameter vector (single arity) or
    /// sibling lists whose first child is a parameter vector (multi-arity).
    fn collect_prototypes(&mut self, id: NodeId, def: &mut Def) {
        let children: Vec<NodeId> = self.tree.children(id).to_vec();
        for &child in children.iter().skip(2) {
            let stripped = self.tree.strip_meta(child);
            match self.tree.kind(stripped) {
                SyntaxKind::Vector => {
                    def.prototypes.push(self.prototype_from(child));
                    break; // single-arity form has exactly one vector
                }
                SyntaxKind::List => {
                    let Some(first) = self.tree.child(stripped, 0) else {
                        continue;
                    };
                    if self.tree.kind(self.tree.strip_meta(first)) == SyntaxKind::Vector {
                        def.prototypes.push(self.prototype_from(first));
                    }
                }
                _ => {}
            }
        }
    }

    /// Build one prototype from a (possibly meta-wrapped) parameter vector.
    fn prototype_from(&mut self, vec_raw: NodeId) -> Prototype {
        let vector = self.tree.strip_meta(vec_raw);
        self.roles.insert(vector, Annotation::Role(Role::ArgVec));

        let return_hint = self
            .tree
            .meta_args(vec_raw)
            .into_iter()
            .find(|&a| self.tree.kind(a) == SyntaxKind::Symbol)
            .map(|a| SmolStr::new(self.tree.text(a)));

        let mut params = Vec::new();
        for &p in self.tree.children(vector) {
            let sym = self.tree.strip_meta(p);
            if self.tree.kind(sym) == SyntaxKind::Symbol && self.tree.text(sym) != "&" {
                params.push(SmolStr::new(self.tree.text(sym)));
            }
        }
        Prototype { params, return_hint }
    }

    // ------------------------------------------------------------------
    // Object/protocol forms
    // ------------------------------------------------------------------

    /// Record/type/protocol/interface forms: the form itself is a
    /// definition; nested method forms each get their own `Def` scoped to
    /// the FILE namespace (not the enclosing definition's), and field
    /// vectors get a distinct role so they are not mistaken for parameter
    /// lists.
    fn classify_object_form(&mut self, id: NodeId) {
        let Some(name_raw) = self.tree.child(id, 1) else {
            return;
        };
        let name_node = self.tree.strip_meta(name_raw);
        if self.tree.kind(name_node) != SyntaxKind::Symbol {
            return;
        }
        let key = SymKey::def(self.file_ns(), self.tree.sym_name(name_node));
        let mut def = Def::bare(key.clone());
        self.collect_meta(id, name_raw, &mut def);

        self.roles.insert(id, Annotation::Role(Role::Def));
        self.roles.insert(name_node, Annotation::Target(key));
        self.staged.push(StagedDef { node: id, def });

        let file_ns = self.file_ns();
        let children: Vec<NodeId> = self.tree.children(id).to_vec();
        for &child in children.iter().skip(2) {
            match self.tree.kind(child) {
                SyntaxKind::Vector => {
                    self.roles.insert(child, Annotation::Role(Role::FieldVec));
                }
                SyntaxKind::List => {
                    let Some(mh) = self.tree.child(child, 0) else {
                        continue;
                    };
                    if self.tree.kind(mh) != SyntaxKind::Symbol {
                        continue;
                    }
                    let mkey = SymKey::method(file_ns.clone(), self.tree.sym_name(mh));
                    let mut mdef = Def::bare(mkey.clone());
                    let method_children: Vec<NodeId> =
                        self.tree.children(child).to_vec();
                    for &sub in method_children.iter().skip(1) {
                        let stripped = self.tree.strip_meta(sub);
                        if self.tree.kind(stripped) == SyntaxKind::Vector {
                            mdef.prototypes.push(self.prototype_from(sub));
                        } else if self.tree.kind(stripped) == SyntaxKind::List {
                            // multi-arity body
                            if let Some(first) = self.tree.child(stripped, 0) {
                                if self.tree.kind(self.tree.strip_meta(first))
                                    == SyntaxKind::Vector
                                {
                                    mdef.prototypes.push(self.prototype_from(first));
                                }
                            }
                        }
                    }
                    self.roles.insert(mh, Annotation::Target(mkey));
                    self.staged.push(StagedDef { node: child, def: mdef });
                }
                _ => {}
            }
        }
    }

    // ------------------------------------------------------------------
    // Binding and dispatch forms
    // ------------------------------------------------------------------

    fn classify_binding_form(&mut self, id: NodeId) -> Result<(), HirError> {
        if let Some(vec) = self.tree.child(id, 1) {
            if self.tree.kind(self.tree.strip_meta(vec)) == SyntaxKind::Vector {
                self.roles.insert(
                    self.tree.strip_meta(vec),
                    Annotation::Role(Role::BindingVec),
                );
            }
        }
        self.walk_children_from(id, 1)
    }

    fn classify_letfn(&mut self, id: NodeId) -> Result<(), HirError> {
        if let Some(vec_raw) = self.tree.child(id, 1) {
            let vec = self.tree.strip_meta(vec_raw);
            if self.tree.kind(vec) == SyntaxKind::Vector {
                self.roles.insert(vec, Annotation::Role(Role::BindingVec));
                let bindings: Vec<NodeId> = self.tree.children(vec).to_vec();
                for &binding in &bindings {
                    if self.tree.kind(binding) != SyntaxKind::List {
                        continue;
                    }
                    // (fname [args] body...) — tag the name, and treat the
                    // trailing forms as its own prototype list.
                    if let Some(fname) = self.tree.child(binding, 0) {
                        if self.tree.kind(fname) == SyntaxKind::Symbol {
                            self.roles.insert(fname, Annotation::Role(Role::Name));
                        }
                    }
                    let binding_children: Vec<NodeId> =
                        self.tree.children(binding).to_vec();
                    for &sub in binding_children.iter().skip(1) {
                        if self.tree.kind(self.tree.strip_meta(sub)) == SyntaxKind::Vector {
                            self.prototype_from(sub);
                        }
                    }
                }
            }
        }
        self.walk_children_from(id, 2)
    }

    /// `defmethod` tags by fixed positional index: the dispatch value at 2,
    /// the parameter vector at 3. It extends an existing multimethod and
    /// introduces no definition of its own.
    fn classify_defmethod(&mut self, id: NodeId) -> Result<(), HirError> {
        if let Some(dispatch) = self.tree.child(id, 2) {
            self.roles
                .insert(dispatch, Annotation::Role(Role::DispatchValue));
        }
        if let Some(vec) = self.tree.child(id, 3) {
            if self.tree.kind(self.tree.strip_meta(vec)) == SyntaxKind::Vector {
                self.roles.insert(
                    self.tree.strip_meta(vec),
                    Annotation::Role(Role::ArgVec),
                );
            }
        }
        self.walk_children_from(id, 4)
    }
}
