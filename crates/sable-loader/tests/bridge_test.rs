//! Integration tests for the remote process bridge.

use sable_loader::bridge::protocol::{CallOutcome, Envelope, Reply, Request, RequireResponse};
use sable_loader::bridge::{BridgeHost, Endpoint, Transport};
use sable_loader::fs::MemoryFileSystem;
use sable_loader::{Diagnostics, Loader, LoaderError, Manifest, ManifestChecker, Principal, Value};
use sable_script::ObjectRef;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread::JoinHandle;
use url::Url;

const PANEL_ADAPTER: &str = r#"
if (this.chrome) {
  exports.greet = function (who) { return chrome.call('greet', who); };
  exports.fail = function () { return chrome.call('fail'); };
  chrome.on('ping', function (name, n) { chrome.send('pong', n + 1); });
} else {
  exports.register = function (bridge) {
    bridge.registerCall('greet', function (name, who) { return 'hello ' + who; });
    bridge.registerCall('fail', function fail(name) {
      throw new Error('host said no');
    });
    bridge.on('pong', function (name, n) { exports.lastPong = n; });
  };
}
"#;

type Lines = Rc<RefCell<Vec<String>>>;

fn elevated(fs: &MemoryFileSystem) -> Loader {
    Loader::builder()
        .fs(fs.clone())
        .default_principal(Principal::Elevated)
        .build()
        .unwrap()
}

fn start(loader: &Loader, manifest: Option<Manifest>) -> (BridgeHost, JoinHandle<sable_loader::Result<()>>, Lines) {
    let lines = Lines::default();
    let (host, remote) = BridgeHost::in_process(loader.clone(), manifest).unwrap();
    let sink = lines.clone();
    let host = host.with_console(move |level, args| {
        sink.borrow_mut().push(format!("{level}: {}", args.join(" ")));
    });
    (host, remote, lines)
}

fn finish(host: BridgeHost, remote: JoinHandle<sable_loader::Result<()>>) {
    drop(host);
    remote.join().unwrap().unwrap();
}

#[test]
fn test_start_main_and_quit() {
    let fs = MemoryFileSystem::new().with_module(
        "main",
        "exports.main = function (options, callbacks) {\n\
           console.log('hello', options.name);\n\
           console.warn('careful');\n\
           callbacks.quit();\n\
         };",
    );
    let loader = elevated(&fs);
    let (host, remote, lines) = start(&loader, None);

    host.start_main("main", json!({ "name": "remote" })).unwrap();
    assert_eq!(host.run_until_quit().unwrap(), "OK");
    assert_eq!(*lines.borrow(), ["log: hello remote", "warn: careful"]);
    finish(host, remote);
}

#[test]
fn test_remote_code_is_restricted() {
    let fs = MemoryFileSystem::new().with_module("main", "exports.platform = typeof host;");
    let loader = elevated(&fs);
    let (host, remote, _) = start(&loader, None);

    host.start_main("main", json!({})).unwrap();
    let err = host.run_until_quit().unwrap_err();
    assert!(matches!(err, LoaderError::RemoteProcess { .. }));
    assert!(
        err.to_string()
            .contains("permission denied to access 'host' from a restricted context"),
        "{err}"
    );
    finish(host, remote);
}

#[test]
fn test_uncaught_exception_in_main() {
    let fs = MemoryFileSystem::new().with_module(
        "main",
        "exports.main = function () {\n  throw new Error('boom');\n};",
    );
    let loader = elevated(&fs);
    let (host, remote, _) = start(&loader, None);

    host.start_main("main", json!({})).unwrap();
    let Err(LoaderError::RemoteProcess {
        message,
        filename,
        line,
        ..
    }) = host.run_until_quit()
    else {
        panic!("expected a remote exception");
    };
    assert_eq!(message, "boom");
    assert_eq!(filename, "file:///memory/main.js");
    assert_eq!(line, 2);
    finish(host, remote);
}

#[test]
fn test_adapter_round_trip() {
    let fs = MemoryFileSystem::new()
        .with_module("panel-e10s-adapter", PANEL_ADAPTER)
        .with_module(
            "main",
            "var panel = require('panel');\n\
             exports.main = function (options, callbacks) {\n\
               console.log(panel.greet('remote'));\n\
               try {\n\
                 panel.fail();\n\
               } catch (e) {\n\
                 console.log(e.message + '|' + e.stack);\n\
               }\n\
               callbacks.quit('done');\n\
             };",
        );
    let loader = elevated(&fs);
    let (host, remote, lines) = start(&loader, None);

    host.start_main("main", json!({})).unwrap();
    assert_eq!(host.run_until_quit().unwrap(), "done");

    let lines = lines.borrow();
    assert_eq!(lines[0], "log: hello remote");
    let failure = lines[1].strip_prefix("log: ").unwrap();
    assert!(
        failure.starts_with("host said no|fail()@file:///memory/panel-e10s-adapter.js:"),
        "{failure}"
    );
    let remote_part = failure.split_once('\n').unwrap().1;
    assert!(remote_part.contains("@file:///memory/panel-e10s-adapter.js:"), "{failure}");
    assert!(remote_part.contains("@file:///memory/main.js:"), "{failure}");

    assert_eq!(
        host.registered_adapters(),
        ["file:///memory/panel-e10s-adapter.js"]
    );
    drop(lines);
    finish(host, remote);
}

#[test]
fn test_messages_in_both_directions() {
    let fs = MemoryFileSystem::new()
        .with_module("panel-e10s-adapter", PANEL_ADAPTER)
        .with_module(
            "main",
            "require('panel');\nexports.main = function (o, callbacks) { callbacks.quit('ready'); };",
        )
        .with_module(
            "finisher",
            "exports.main = function (o, callbacks) { callbacks.quit('finished'); };",
        );
    let loader = elevated(&fs);
    let (host, remote, _) = start(&loader, None);

    host.start_main("main", json!({})).unwrap();
    assert_eq!(host.run_until_quit().unwrap(), "ready");

    host.send("ping", vec![json!(1)]).unwrap();
    host.start_main("finisher", json!({})).unwrap();
    assert_eq!(host.run_until_quit().unwrap(), "finished");

    let adapter = loader.require("panel-e10s-adapter").unwrap();
    assert_eq!(adapter.as_object().unwrap().get("lastPong"), Value::Number(2.0));
    finish(host, remote);
}

#[test]
fn test_needs_chrome_without_adapter_is_denied() {
    let root = Url::parse("file:///memory/").unwrap();
    let manifest = Manifest::from_json(r#"{ "secret.js": { "needsChrome": true } }"#, Some(&root)).unwrap();
    let fs = MemoryFileSystem::new()
        .with_module("secret", "exports.key = host.getenv('HOME');")
        .with_module(
            "main",
            "exports.main = function (o, callbacks) {\n\
               try { require('secret'); callbacks.quit('loaded'); }\n\
               catch (e) { callbacks.quit(e.message); }\n\
             };",
        );
    let loader = elevated(&fs);
    let (host, remote, _) = start(&loader, Some(manifest));

    host.start_main("main", json!({})).unwrap();
    assert_eq!(
        host.run_until_quit().unwrap(),
        "permission denied to access 'secret-e10s-adapter' from a restricted context"
    );
    assert!(!loader.cache().has("file:///memory/secret.js"));
    finish(host, remote);
}

#[test]
fn test_adapter_mismatch_is_refused() {
    let root = Url::parse("file:///memory/").unwrap();
    let manifest = Manifest::from_json(r#"{ "panel.js": {} }"#, Some(&root)).unwrap();
    let fs = MemoryFileSystem::new()
        .with_module("panel", "exports.real = true;")
        .with_module("panel-e10s-adapter", PANEL_ADAPTER);
    let loader = elevated(&fs);
    let (ours, _theirs) = Transport::in_process_pair();
    let host = BridgeHost::new(loader.clone(), Some(manifest), ours);

    assert!(matches!(host.handle_require(None, "panel"), RequireResponse::Error));
    assert!(loader.cache().is_empty());
    assert!(host.registered_adapters().is_empty());

    assert!(matches!(host.handle_require(None, "nothing"), RequireResponse::NotFound));
}

#[test]
fn test_declared_adapter_must_match() {
    let root = Url::parse("file:///memory/").unwrap();
    let manifest = Manifest::from_json(
        r#"{ "panel.js": { "needsChrome": true, "e10s-adapter": "other-adapter.js" } }"#,
        Some(&root),
    )
    .unwrap();
    let fs = MemoryFileSystem::new()
        .with_module("panel", "exports.real = true;")
        .with_module("panel-e10s-adapter", PANEL_ADAPTER);
    let loader = elevated(&fs);
    let diagnostics = Diagnostics::new();
    let (ours, _theirs) = Transport::in_process_pair();
    let host = BridgeHost::new(loader.clone(), Some(manifest), ours).with_diagnostics(diagnostics.clone());

    assert!(matches!(host.handle_require(None, "panel"), RequireResponse::Error));
    let warnings = diagnostics.messages();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("file:///memory/other-adapter.js"), "{}", warnings[0]);
    assert!(warnings[0].contains("file:///memory/panel-e10s-adapter.js"), "{}", warnings[0]);

    // Nothing ran: no adapter, no call handlers, nothing cached.
    assert!(host.registered_adapters().is_empty());
    assert!(loader.cache().is_empty());
    assert!(matches!(host.handle_call("greet", &[json!("you")]), CallOutcome::Exception(_)));
}

#[test]
fn test_declared_adapter_loads_under_strict_manifest() {
    let root = Url::parse("file:///memory/").unwrap();
    let manifest = Manifest::from_json(
        r#"{
            "main.js": { "dependencies": { "panel": { "url": "panel.js" } } },
            "panel.js": { "needsChrome": true, "e10s-adapter": "panel-e10s-adapter.js" }
        }"#,
        Some(&root),
    )
    .unwrap();
    let fs = MemoryFileSystem::new()
        .with_module("main", "require('panel');")
        .with_module("panel", "exports.real = true;")
        .with_module("panel-e10s-adapter", PANEL_ADAPTER);
    let diagnostics = Diagnostics::new();
    let loader = Loader::builder()
        .fs(fs.clone())
        .default_principal(Principal::Elevated)
        .security_policy(
            ManifestChecker::new(manifest.clone())
                .strict(true)
                .with_diagnostics(diagnostics.clone()),
        )
        .build()
        .unwrap();
    let (ours, _theirs) = Transport::in_process_pair();
    let host = BridgeHost::new(loader.clone(), Some(manifest), ours).with_diagnostics(diagnostics.clone());

    let RequireResponse::Ok {
        script,
        needs_messaging,
    } = host.handle_require(Some("file:///memory/main.js"), "panel")
    else {
        panic!("expected the adapter, warnings: {:?}", diagnostics.messages());
    };
    assert_eq!(script.filename, "file:///memory/panel-e10s-adapter.js");
    assert!(needs_messaging);
    assert!(diagnostics.messages().is_empty(), "{:?}", diagnostics.messages());
    assert_eq!(host.registered_adapters(), ["file:///memory/panel-e10s-adapter.js"]);
    assert_eq!(
        host.handle_call("greet", &[json!("you")]),
        CallOutcome::ReturnValue(json!("hello you"))
    );
}

#[test]
fn test_plain_modules_are_sent_as_they_are() {
    let fs = MemoryFileSystem::new().with_module("plain", "exports.x = 1;");
    let loader = elevated(&fs);
    let (ours, _theirs) = Transport::in_process_pair();
    let host = BridgeHost::new(loader.clone(), None, ours);

    let RequireResponse::Ok {
        script,
        needs_messaging,
    } = host.handle_require(None, "plain")
    else {
        panic!("expected the module source");
    };
    assert_eq!(script.filename, "file:///memory/plain.js");
    assert_eq!(script.contents, "exports.x = 1;");
    assert!(!needs_messaging);
    // The host only reads the file.
    assert!(loader.cache().is_empty());
}

#[test]
fn test_call_handlers() {
    let loader = elevated(&MemoryFileSystem::new());
    let (ours, _theirs) = Transport::in_process_pair();
    let host = BridgeHost::new(loader.clone(), None, ours);
    loader.define_global("bridge", host.bridge_object());

    let duplicate = loader
        .run_script(
            "bridge.registerCall('double', function (name, x) { return x * 2; });\n\
             try { bridge.registerCall('double', function () {}); } catch (e) { e.message }",
        )
        .unwrap();
    assert_eq!(duplicate, Value::from("call already registered for 'double'"));

    assert_eq!(
        host.handle_call("double", &[json!(21)]),
        CallOutcome::ReturnValue(json!(42))
    );

    let CallOutcome::Exception(info) = host.handle_call("nope", &[]) else {
        panic!("expected an exception");
    };
    assert_eq!(info.message, "No receiver registered for call 'nope'");

    let err = loader
        .run_script("bridge.registerCall('bad', 5)")
        .unwrap_err();
    assert!(err.to_string().contains("registerCall() expects a function"), "{err}");
}

#[test]
fn test_adapters_unregister_newest_first() {
    let adapter = |name: &str| {
        format!(
            "if (!this.chrome) {{\n\
               exports.register = function (bridge) {{}};\n\
               exports.unregister = function (bridge) {{ log.push('{name}'); }};\n\
             }}"
        )
    };
    let fs = MemoryFileSystem::new()
        .with_module("a-e10s-adapter", adapter("a"))
        .with_module("b-e10s-adapter", adapter("b"))
        .with_module(
            "main",
            "require('a'); require('b');\nexports.main = function (o, callbacks) { callbacks.quit(); };",
        );
    let log = ObjectRef::array(Vec::new());
    let loader = Loader::builder()
        .fs(fs.clone())
        .default_principal(Principal::Elevated)
        .global("log", Value::Object(log.clone()))
        .build()
        .unwrap();
    let (host, remote, _) = start(&loader, None);

    host.start_main("main", json!({})).unwrap();
    assert_eq!(host.run_until_quit().unwrap(), "OK");
    assert_eq!(
        host.registered_adapters(),
        ["file:///memory/a-e10s-adapter.js", "file:///memory/b-e10s-adapter.js"]
    );

    loader.unload("shutdown");
    assert_eq!(
        log.array_elements().unwrap(),
        [Value::from("b"), Value::from("a")]
    );
    assert!(host.registered_adapters().is_empty());
    finish(host, remote);
}

#[test]
fn test_concurrent_requests_are_correlated() {
    let (ours, peer) = Transport::in_process_pair();
    let endpoint = Arc::new(Endpoint::new(ours));

    let callers: Vec<_> = ["first", "second"]
        .into_iter()
        .map(|name| {
            let endpoint = endpoint.clone();
            std::thread::spawn(move || {
                let reply = endpoint
                    .request(
                        Request::Call {
                            name: name.to_string(),
                            args: Vec::new(),
                        },
                        &mut |_| {},
                    )
                    .unwrap();
                assert_eq!(reply, Reply::Call(CallOutcome::ReturnValue(json!(name))));
            })
        })
        .collect();

    let mut requests = Vec::new();
    while requests.len() < 2 {
        match peer.recv() {
            Some(Envelope::Request {
                id,
                request: Request::Call { name, .. },
            }) => requests.push((id, name)),
            other => panic!("unexpected {other:?}"),
        }
    }
    for (id, name) in requests.into_iter().rev() {
        assert!(peer.send(Envelope::Reply {
            id,
            reply: Reply::Call(CallOutcome::ReturnValue(json!(name))),
        }));
    }

    for caller in callers {
        caller.join().unwrap();
    }
    assert_eq!(endpoint.in_flight(), 0);
}
