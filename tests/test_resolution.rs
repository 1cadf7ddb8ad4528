//! End-to-end resolution tests through the public `SemanticFile` API.

use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio_util::sync::CancellationToken;

use cloj::FileId;
use cloj::TextSize;
use cloj::hir::resolve::{collect_candidates, resolve_one};
use cloj::hir::{
    Candidate, CandidateSource, DefHandle, DefinitionService, Dialect, FileSemanticState,
    FileStub, HirError, NamespaceIndex, ResolveEnv, ResolveQuery, SemanticFile, StubStore,
    SymKey,
};
use cloj::syntax::read;

const APP_SOURCE: &str = r#"(ns app.core
  (:require [app.util :as u :refer [fmt]]
            [data.json :as json])
  (:import (java.util Date UUID)))

(def config {:retries 3})

(defn- validate [payload]
  (fmt payload))

(defn handler [request]
  (validate (json/parse request)))

(defmacro with-retries [& body]
  (run-all body))

(defn run-all [fs]
  (map deref fs))
"#;

static APP_STATE: Lazy<Arc<FileSemanticState>> = Lazy::new(|| {
    let file = SemanticFile::new(FileId::new(0), read(APP_SOURCE).unwrap());
    file.state(&CancellationToken::new()).unwrap()
});

fn pos_of(needle: &str) -> TextSize {
    TextSize::from(APP_SOURCE.find(needle).unwrap() as u32)
}

#[test]
fn test_local_resolution_in_source_order() {
    let q = ResolveQuery::at("validate", pos_of("(validate"), Dialect::Clj);
    let found = resolve_one(&APP_STATE, &q).unwrap();
    assert_eq!(found.key, SymKey::def("app.core", "validate"));
    assert_eq!(found.source, CandidateSource::Local);
}

#[test]
fn test_forward_reference_needs_macro_context() {
    // `run-all` is defined after `with-retries` uses it, but the use sits
    // inside a macro body, so it resolves locally.
    let q = ResolveQuery::at("run-all", pos_of("(run-all body)"), Dialect::Clj);
    let found = resolve_one(&APP_STATE, &q).unwrap();
    assert_eq!(found.source, CandidateSource::Local);

    // The same name before the macro body, outside any definition, would
    // only reach core.
    let early = ResolveQuery::at("run-all", pos_of("(def config"), Dialect::Clj);
    let found = resolve_one(&APP_STATE, &early).unwrap();
    assert_eq!(found.source, CandidateSource::Core);
}

#[test]
fn test_macro_not_visible_before_its_definition() {
    // Macros follow the same source-order rule as everything else; only
    // the core fallback answers here.
    let q = ResolveQuery::at("with-retries", pos_of("(def config"), Dialect::Clj);
    let found = resolve_one(&APP_STATE, &q).unwrap();
    assert_eq!(found.source, CandidateSource::Core);
}

#[test]
fn test_refer_and_alias_from_ns_clause() {
    let q = ResolveQuery::at("fmt", pos_of("(fmt payload)"), Dialect::Clj);
    let found = resolve_one(&APP_STATE, &q).unwrap();
    assert_eq!(found.key, SymKey::def("app.util", "fmt"));
    assert_eq!(found.source, CandidateSource::Import);

    let alias = ResolveQuery {
        name: Some("json"),
        pos: pos_of("(json/parse"),
        dialect: Dialect::Clj,
        qualifier: true,
        caller_ns: None,
    };
    let found = resolve_one(&APP_STATE, &alias).unwrap();
    assert_eq!(found.key, SymKey::alias("data.json", "json"));
}

#[test]
fn test_platform_class_by_simple_name() {
    let q = ResolveQuery::at("UUID", pos_of("(defn handler"), Dialect::Clj);
    let found = resolve_one(&APP_STATE, &q).unwrap();
    assert_eq!(found.key, SymKey::class("java.util", "UUID"));
}

#[test]
fn test_privacy_visible_inside_hidden_outside() {
    let end = TextSize::from(APP_SOURCE.len() as u32);

    // Enumeration from a foreign namespace hides the private def.
    let foreign = ResolveQuery {
        name: None,
        pos: end,
        dialect: Dialect::Clj,
        qualifier: false,
        caller_ns: Some("other.ns"),
    };
    let names: Vec<_> = collect_candidates(&APP_STATE, &foreign)
        .into_iter()
        .filter(|c| c.source == CandidateSource::Local)
        .map(|c| c.key.name.to_string())
        .collect();
    assert!(names.contains(&"handler".to_string()));
    assert!(!names.contains(&"validate".to_string()));

    // An exact-name query still reaches it, flagged private.
    let exact = ResolveQuery {
        name: Some("validate"),
        ..foreign
    };
    let found = resolve_one(&APP_STATE, &exact).unwrap();
    assert!(found.private);
}

#[test]
fn test_nearest_alias_wins() {
    let source = "(require '[app.one :as a])\n(require '[app.two :as a])\n(a/x)";
    let file = SemanticFile::new(FileId::new(1), read(source).unwrap());
    let state = file.state(&CancellationToken::new()).unwrap();

    let q = ResolveQuery {
        name: Some("a"),
        pos: TextSize::from(source.find("(a/x").unwrap() as u32),
        dialect: Dialect::Clj,
        qualifier: true,
        caller_ns: None,
    };
    let found = resolve_one(&state, &q).unwrap();
    assert_eq!(found.key, SymKey::alias("app.two", "a"));
}

#[test]
fn test_dialect_isolation_through_reader_conditional() {
    let source = "#?(:clj  (require '[host.io :refer [slurp-all]])\n    :cljs (require '[web.http :refer [fetch-all]]))\n(go)";
    let file = SemanticFile::new(FileId::new(2), read(source).unwrap());
    let state = file.state(&CancellationToken::new()).unwrap();
    let pos = TextSize::from(source.find("(go)").unwrap() as u32);

    let clj = resolve_one(&state, &ResolveQuery::at("slurp-all", pos, Dialect::Clj)).unwrap();
    assert_eq!(clj.key, SymKey::def("host.io", "slurp-all"));

    // The Clj-branch import is invisible in Cljs, and vice versa.
    let cross = resolve_one(&state, &ResolveQuery::at("slurp-all", pos, Dialect::Cljs)).unwrap();
    assert_eq!(cross.source, CandidateSource::Core);

    let cljs = resolve_one(&state, &ResolveQuery::at("fetch-all", pos, Dialect::Cljs)).unwrap();
    assert_eq!(cljs.key, SymKey::def("web.http", "fetch-all"));
}

#[test]
fn test_state_identity_until_structural_change() {
    let token = CancellationToken::new();
    let mut file = SemanticFile::new(FileId::new(3), read("(def x 1)").unwrap());

    let a = file.state(&token).unwrap();
    let b = file.state(&token).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    file.update(read("(def x 1)\n(def y 2)").unwrap());
    let c = file.state(&token).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(c.definitions.len(), 2);
}

#[test]
fn test_cancellation_is_recoverable() {
    let file = SemanticFile::new(FileId::new(4), read("(def x 1)").unwrap());

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert_eq!(file.state(&cancelled).unwrap_err(), HirError::Cancelled);

    // Nothing partial was published; a fresh token recomputes cleanly.
    let state = file.state(&CancellationToken::new()).unwrap();
    assert_eq!(state.definitions[0].def.name(), "x");
    assert_eq!(state.namespace, "user");
}

// ---------------------------------------------------------------------------
// Cross-unit resolution through stubs
// ---------------------------------------------------------------------------

struct Workspace {
    units: Vec<(String, FileId, Arc<FileStub>)>,
}

impl Workspace {
    fn new(sources: &[(&str, &str)]) -> Self {
        let token = CancellationToken::new();
        let units = sources
            .iter()
            .enumerate()
            .map(|(i, (ns, source))| {
                let file = FileId::new(i as u32);
                let semantic = SemanticFile::new(file, read(source).unwrap());
                (ns.to_string(), file, Arc::new(semantic.stub(&token).unwrap()))
            })
            .collect();
        Self { units }
    }

    fn env(&self) -> ResolveEnv<'_> {
        ResolveEnv {
            namespaces: self,
            stubs: self,
            definitions: self,
        }
    }
}

impl NamespaceIndex for Workspace {
    fn files_of(&self, namespace: &str) -> Vec<FileId> {
        self.units
            .iter()
            .filter(|(ns, _, _)| ns == namespace)
            .map(|(_, file, _)| *file)
            .collect()
    }
}

impl StubStore for Workspace {
    fn stub(&self, file: FileId) -> Option<Arc<FileStub>> {
        self.units
            .iter()
            .find(|(_, f, _)| *f == file)
            .map(|(_, _, stub)| stub.clone())
    }
}

impl DefinitionService for Workspace {
    fn find_definition(&self, file: FileId, key: &SymKey) -> Option<DefHandle> {
        let stub = StubStore::stub(self, file)?;
        stub.definitions.iter().find(|d| &d.key == key).map(|d| DefHandle {
            file,
            key: d.key.clone(),
        })
    }
}

#[test]
fn test_goto_definition_across_units() {
    let workspace = Workspace::new(&[
        ("app.core", APP_SOURCE),
        ("app.util", "(ns app.util)\n(defn fmt [x] x)"),
    ]);
    let env = workspace.env();

    // `fmt` resolves in app.core to an import candidate...
    let q = ResolveQuery::at("fmt", pos_of("(fmt payload)"), Dialect::Clj);
    let candidate = resolve_one(&APP_STATE, &q).unwrap();
    assert_eq!(candidate.key, SymKey::def("app.util", "fmt"));

    // ...and the environment translates it to a concrete handle.
    let handle = env.definition_of(&candidate).unwrap().unwrap();
    assert_eq!(handle.file, FileId::new(1));
}

#[test]
fn test_stub_round_trip_preserves_resolution() {
    let workspace = Workspace::new(&[(
        "app.util",
        "(ns app.util)\n(defn fmt [x] x)\n(defn- internal [x] x)",
    )]);
    let (_, _, stub) = &workspace.units[0];

    let revived = FileStub::from_json(&stub.to_json().unwrap()).unwrap();
    assert_eq!(**stub, revived);

    let env = workspace.env();
    let query = ResolveQuery {
        name: None,
        pos: TextSize::from(0),
        dialect: Dialect::Clj,
        qualifier: false,
        caller_ns: Some("app.core"),
    };
    let mut visible: Vec<Candidate> = Vec::new();
    env.resolve_foreign("app.util", &query, &mut |c| {
        visible.push(c);
        true
    });
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].key.name, "fmt");
}
