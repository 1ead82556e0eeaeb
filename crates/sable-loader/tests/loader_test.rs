//! Integration tests for module loading.

use sable_loader::fs::MemoryFileSystem;
use sable_loader::{
    CompositeFileSystem, Diagnostics, Loader, LoaderError, Manifest, ManifestChecker, Principal,
    SecurityPolicy, SourceFile, Value,
};
use sable_script::ObjectRef;
use std::cell::RefCell;
use std::rc::Rc;
use url::Url;

fn loader(fs: &MemoryFileSystem) -> Loader {
    Loader::builder().fs(fs.clone()).build().unwrap()
}

fn run(loader: &Loader, source: &str) -> String {
    loader
        .run_script(source)
        .unwrap_or_else(|e| panic!("{source}: {e}"))
        .to_string()
}

#[test]
fn test_beets() {
    let fs = MemoryFileSystem::new().with_module("beets", "exports.beets = 5;");
    let loader = loader(&fs);

    assert_eq!(
        loader.run_script("require('beets').beets").unwrap(),
        Value::Number(5.0)
    );
    let first = loader.require("beets").unwrap();
    let second = loader.run_script("require('beets')").unwrap();
    assert_eq!(first, second);
    assert_eq!(loader.cache().len(), 1);
}

#[test]
fn test_missing_module() {
    let loader = loader(&MemoryFileSystem::new());
    assert!(matches!(
        loader.run_script("require('foo')"),
        Err(LoaderError::ModuleNotFound(ref id)) if id == "foo"
    ));
    assert!(matches!(
        loader.require("foo"),
        Err(LoaderError::ModuleNotFound(_))
    ));
}

#[test]
fn test_nested_loader_errors_surface_unchanged() {
    let fs = MemoryFileSystem::new().with_module("outer", "require('missing');");
    let loader = loader(&fs);
    assert!(matches!(
        loader.require("outer"),
        Err(LoaderError::ModuleNotFound(ref id)) if id == "missing"
    ));
    assert!(loader.cache().is_empty());

    // Script code sees an ordinary Error.
    assert_eq!(
        run(
            &loader,
            "try { require('outer'); } catch (e) { e.name + ': ' + e.message }"
        ),
        "Error: Module \"missing\" not found"
    );
}

#[test]
fn test_identity_across_identifiers_and_requesters() {
    let fs = MemoryFileSystem::new()
        .with_module("lib/a", "exports.name = 'a';")
        .with_module("lib/b", "exports.a = require('./a');")
        .with_module("main", "exports.a = require('lib/a'); exports.b = require('lib/b');");
    let loader = loader(&fs);

    assert_eq!(
        run(&loader, "var m = require('main'); m.a === m.b.a && m.a === require('lib/a')"),
        "true"
    );
    assert_eq!(
        loader.cache().keys(),
        [
            "file:///memory/lib/a.js",
            "file:///memory/lib/b.js",
            "file:///memory/main.js"
        ]
    );
}

#[test]
fn test_relative_requires_follow_the_requester() {
    let fs = MemoryFileSystem::new()
        .with_module("util", "exports.where = 'top';")
        .with_module("pkg/util", "exports.where = 'pkg';")
        .with_module("pkg/index", "exports.near = require('./util').where; exports.far = require('util').where;")
        .with_module("pkg/deep/leaf", "exports.up = require('../util').where;");
    let loader = loader(&fs);

    assert_eq!(run(&loader, "var p = require('pkg/index'); p.near + ',' + p.far"), "pkg,top");
    assert_eq!(run(&loader, "require('pkg/deep/leaf').up"), "pkg");
}

#[test]
fn test_containment() {
    let fs = MemoryFileSystem::new().with_module("escape", "exports.x = require('../../etc/passwd');");
    let loader = loader(&fs);

    for id in ["../../etc/passwd", "%2e%2e/%2e%2e/etc/passwd", "/etc/passwd"] {
        assert_eq!(loader.resolve(None, id).unwrap(), None, "{id}");
    }
    assert!(matches!(
        loader.require("escape"),
        Err(LoaderError::ModuleNotFound(_))
    ));
    assert!(matches!(
        loader.require("bad\\name"),
        Err(LoaderError::MalformedIdentifier(_))
    ));
}

#[test]
fn test_circular_requires_see_partial_exports() {
    let fs = MemoryFileSystem::new()
        .with_module(
            "even",
            "exports.ready = false;\n\
             var odd = require('odd');\n\
             exports.oddSawReady = odd.sawReady;\n\
             exports.ready = true;",
        )
        .with_module(
            "odd",
            "var even = require('even');\n\
             exports.sawReady = even.ready;\n\
             exports.even = even;",
        );
    let loader = loader(&fs);

    assert_eq!(
        run(
            &loader,
            "var e = require('even'); [e.ready, e.oddSawReady, require('odd').even === e].join(',')"
        ),
        "true,false,true"
    );
    assert!(loader.cache().records().iter().all(|record| record.loaded));
}

#[test]
fn test_failed_modules_are_not_cached() {
    let fs = MemoryFileSystem::new().with_module("flaky", "exports.early = 1;\nthrow new Error('not yet');");
    let loader = loader(&fs);

    let Err(LoaderError::Evaluation(err)) = loader.require("flaky") else {
        panic!("expected an evaluation error");
    };
    assert_eq!(err.message, "not yet");
    assert_eq!(err.filename, "file:///memory/flaky.js");
    assert_eq!(err.line, 2);
    assert!(!loader.cache().has("file:///memory/flaky.js"));

    fs.insert("flaky", "exports.ok = true;");
    assert_eq!(run(&loader, "require('flaky').ok"), "true");
}

#[test]
fn test_syntax_errors() {
    let fs = MemoryFileSystem::new().with_module("broken", "var x = 1\nvar y = 2 3;");
    let loader = loader(&fs);
    let Err(LoaderError::Evaluation(err)) = loader.require("broken") else {
        panic!("expected a syntax error");
    };
    assert_eq!(err.kind, sable_script::ErrorKind::Syntax);
    assert_eq!(err.line, 2);
}

#[test]
fn test_module_object() {
    let fs = MemoryFileSystem::new()
        .with_module("fn", "module.exports = function () { return 42; };")
        .with_module("set", "var result = module.setExports({ v: 1 }); exports.lost = true;")
        .with_module("meta", "exports.id = module.id; exports.uri = module.uri; exports.url = __url__;");
    let loader = loader(&fs);

    assert_eq!(run(&loader, "require('fn')()"), "42");
    assert_eq!(run(&loader, "require('fn') === require('fn')"), "true");
    assert_eq!(run(&loader, "var s = require('set'); s.v + ',' + s.lost"), "1,undefined");
    assert_eq!(
        run(&loader, "var m = require('meta'); [m.id, m.uri, m.url].join(' ')"),
        "meta file:///memory/meta.js file:///memory/meta.js"
    );
}

#[test]
fn test_require_resolve() {
    let fs = MemoryFileSystem::new().with_module("beets", "");
    let loader = loader(&fs);
    assert_eq!(run(&loader, "require.resolve('beets')"), "file:///memory/beets.js");
    assert!(loader.cache().is_empty());
    assert!(matches!(
        loader.run_script("require.resolve('carrots')"),
        Err(LoaderError::ModuleNotFound(_))
    ));
}

#[test]
fn test_principal_isolation() {
    let fs = MemoryFileSystem::new().with_module("peek", "exports.platform = host.platform;");

    let restricted = loader(&fs);
    assert!(matches!(
        restricted.require("peek"),
        Err(LoaderError::PermissionDenied { ref capability, principal: Principal::Restricted })
            if capability == "host"
    ));

    let elevated = Loader::builder()
        .fs(fs.clone())
        .default_principal(Principal::Elevated)
        .build()
        .unwrap();
    assert_eq!(
        elevated.require("peek").unwrap().as_object().unwrap().get("platform"),
        Value::from(std::env::consts::OS)
    );
}

#[test]
fn test_globals_and_hooks() {
    let fs = MemoryFileSystem::new()
        .with_module("greeter", "exports.text = greeting + ' from ' + appName;");
    let loader = Loader::builder()
        .fs(fs.clone())
        .global("appName", Value::from("sable"))
        .global("greeting", Value::from("hi"))
        .modify_module_context(|context, file| {
            if file.filename.ends_with("greeter.js") {
                context.define_global("greeting", Value::from("hello"));
            }
            Ok(())
        })
        .get_module_exports(|_, identifier| {
            (identifier == "builtin").then(|| {
                let exports = ObjectRef::ordinary();
                exports.set("bar", Value::Number(1.0));
                Value::Object(exports)
            })
        })
        .build()
        .unwrap();

    assert_eq!(run(&loader, "require('greeter').text"), "hello from sable");
    assert_eq!(run(&loader, "require('builtin').bar"), "1");
    assert_eq!(run(&loader, "appName"), "sable");

    loader.define_global("late", Value::Number(7.0));
    assert_eq!(run(&loader, "late"), "7");
}

#[test]
fn test_contexts_are_kept_per_module() {
    let fs = MemoryFileSystem::new().with_module("counter", "var count = 3; exports.get = function () { return count; };");
    let loader = loader(&fs);

    let context = loader.find_context_for_module("counter").unwrap();
    assert_eq!(context.get_global("count"), Some(Value::Number(3.0)));
    assert_eq!(context.principal(), Principal::Restricted);
    assert_eq!(context.filename(), "file:///memory/counter.js");

    context.evaluate("count = 10;", None).unwrap();
    assert_eq!(run(&loader, "require('counter').get()"), "10");
}

#[test]
fn test_forget_and_unload() {
    let fs = MemoryFileSystem::new().with_module("value", "exports.v = 1;");
    let loader = loader(&fs);
    assert_eq!(run(&loader, "require('value').v"), "1");

    fs.insert("value", "exports.v = 2;");
    assert_eq!(run(&loader, "require('value').v"), "1");
    assert!(loader.forget("value").unwrap());
    assert!(!loader.forget("value").unwrap());
    assert_eq!(run(&loader, "require('value').v"), "2");

    let order = Rc::new(RefCell::new(Vec::new()));
    for name in ["first", "second", "third"] {
        let order = order.clone();
        loader.on_unload(move |reason| order.borrow_mut().push(format!("{name} ({reason})")));
    }
    loader.unload("shutdown");
    assert_eq!(
        *order.borrow(),
        ["third (shutdown)", "second (shutdown)", "first (shutdown)"]
    );
    assert!(loader.cache().is_empty());
}

#[test]
fn test_preseeded_modules() {
    let fs = MemoryFileSystem::new().with_module("seeded", "exports.fromDisk = true;");
    let exports = ObjectRef::ordinary();
    exports.set("fromSeed", Value::Boolean(true));
    let loader = Loader::builder()
        .fs(fs.clone())
        .module("file:///memory/seeded.js", Value::Object(exports))
        .build()
        .unwrap();
    assert_eq!(run(&loader, "require('seeded').fromSeed"), "true");
}

#[test]
fn test_composite_ordering() {
    let one = MemoryFileSystem::with_root(Url::parse("file:///one/").unwrap())
        .with_module("shared", "exports.from = 'one';");
    let two = MemoryFileSystem::with_root(Url::parse("file:///two/").unwrap())
        .with_module("shared", "exports.from = 'two';")
        .with_module("only-two", "exports.sibling = require('./sibling').from;")
        .with_module("sibling", "exports.from = 'two';");

    let composite = CompositeFileSystem::new(vec![Box::new(one), Box::new(two)]);
    let loader = Loader::builder().fs(composite).build().unwrap();

    assert_eq!(run(&loader, "require('shared').from"), "one");
    assert_eq!(run(&loader, "require('only-two').sibling"), "two");
}

#[test]
fn test_local_filesystem_roots() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    std::fs::write(first.path().join("beets.js"), "exports.beets = 5;").unwrap();
    std::fs::write(second.path().join("beets.js"), "exports.beets = 6;").unwrap();
    std::fs::write(second.path().join("carrots.js"), "exports.carrots = require('beets').beets + 1;").unwrap();

    let loader = Loader::builder()
        .root_paths([first.path(), second.path()])
        .build()
        .unwrap();
    assert_eq!(run(&loader, "require('beets').beets"), "5");
    assert_eq!(run(&loader, "require('carrots').carrots"), "6");

    let single = Loader::builder().root_path(second.path()).build().unwrap();
    assert_eq!(run(&single, "require('beets').beets"), "6");

    assert!(matches!(
        Loader::builder().build(),
        Err(LoaderError::Config(ref message)) if message == "Need a root path for module filesystem"
    ));
}

struct Gate {
    eval: bool,
    import: bool,
    log: Rc<RefCell<Vec<String>>>,
}

impl SecurityPolicy for Gate {
    fn allow_eval(&self, base: Option<&str>, identifier: &str, file: &SourceFile) -> bool {
        self.log.borrow_mut().push(format!(
            "eval of {} chars for {identifier} from {base:?}",
            file.contents.len()
        ));
        self.eval
    }

    fn allow_import(&self, base: Option<&str>, identifier: &str, _: Option<&SourceFile>, _: &Value) -> bool {
        self.log
            .borrow_mut()
            .push(format!("import of {identifier} from {base:?}"));
        self.import
    }
}

#[test]
fn test_security_policy() {
    let fs = MemoryFileSystem::new().with_module("beets", "exports.beets = 5;");
    let log = Rc::new(RefCell::new(Vec::new()));

    let refuse_eval = Loader::builder()
        .fs(fs.clone())
        .security_policy(Gate { eval: false, import: true, log: log.clone() })
        .build()
        .unwrap();
    assert!(matches!(
        refuse_eval.require("beets"),
        Err(LoaderError::AccessDenied { ref action, ref module }) if action == "execute" && module == "beets"
    ));
    assert!(refuse_eval.cache().is_empty());

    let refuse_import = Loader::builder()
        .fs(fs.clone())
        .security_policy(Gate { eval: true, import: false, log: log.clone() })
        .build()
        .unwrap();
    let err = refuse_import.require("beets").unwrap_err();
    assert_eq!(err.to_string(), "access denied to import module: beets");
    // The module ran, so it stays cached; only the hand-over was refused.
    assert!(refuse_import.cache().has("file:///memory/beets.js"));

    assert_eq!(
        *log.borrow(),
        [
            "eval of 18 chars for beets from None",
            "eval of 18 chars for beets from None",
            "import of beets from None",
        ]
    );
}

#[test]
fn test_manifest_checker_warnings() {
    let root = Url::parse("file:///memory/").unwrap();
    let manifest = Manifest::from_json(
        r#"{
            "main.js": { "dependencies": { "helper": { "url": "helper.js" } } }
        }"#,
        Some(&root),
    )
    .unwrap();
    let diagnostics = Diagnostics::new();
    let fs = MemoryFileSystem::new()
        .with_module("main", "require('helper'); require('extra');")
        .with_module("helper", "")
        .with_module("extra", "");
    let loader = Loader::builder()
        .fs(fs.clone())
        .security_policy(ManifestChecker::new(manifest).with_diagnostics(diagnostics.clone()))
        .build()
        .unwrap();

    loader.require("main").unwrap();
    assert_eq!(
        diagnostics.messages(),
        ["undeclared require(extra) called from file:///memory/main.js"]
    );
}
