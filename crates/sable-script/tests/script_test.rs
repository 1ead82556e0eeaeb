//! Integration tests for the script dialect and sandboxes.

use sable_script::sandbox::{ContextOptions, DefaultSandboxFactory, Principal, SandboxFactory};
use sable_script::{ErrorKind, ExecutionContext, ScriptError, Value};

fn context() -> ExecutionContext {
    DefaultSandboxFactory::default().create_context(ContextOptions::default())
}

fn eval(source: &str) -> String {
    context()
        .evaluate(source, None)
        .unwrap_or_else(|e| panic!("{source}: {e}"))
        .to_string()
}

fn eval_err(source: &str) -> ScriptError {
    match context().evaluate(source, Some("test.js")) {
        Ok(value) => panic!("{source}: expected an error, got {value}"),
        Err(e) => e,
    }
}

#[test]
fn test_arithmetic_and_coercion() {
    assert_eq!(eval("5 + 3;"), "8");
    assert_eq!(eval("17 % 5"), "2");
    assert_eq!(eval("'a' + 1 + 2"), "a12");
    assert_eq!(eval("1 + 2 + 'a'"), "3a");
    assert_eq!(eval("'3' * '4'"), "12");
    assert_eq!(eval("null == undefined"), "true");
    assert_eq!(eval("'1' == 1"), "true");
    assert_eq!(eval("'1' === 1"), "false");
    assert_eq!(eval("typeof null"), "object");
    assert_eq!(eval("typeof notDefinedAnywhere"), "undefined");
}

#[test]
fn test_closures_and_hoisting() {
    let source = r#"
        var counter = makeCounter();
        counter(); counter();
        function makeCounter() {
            var n = 0;
            return function () { return ++n; };
        }
        counter()
    "#;
    assert_eq!(eval(source), "3");
}

#[test]
fn test_control_flow() {
    let source = r#"
        var out = [];
        for (var i = 0; i < 10; i++) {
            if (i % 2) continue;
            if (i > 6) break;
            out.push(i);
        }
        var j = 0;
        do { j += 5; } while (j < 12);
        out.join(',') + ';' + j
    "#;
    assert_eq!(eval(source), "0,2,4,6;15");
}

#[test]
fn test_for_in_and_objects() {
    let source = r#"
        var o = { b: 1, a: 2, 'quoted key': 3 };
        var keys = [];
        for (var k in o) keys.push(k);
        delete o.a;
        keys.join('|') + ':' + ('a' in o) + ':' + o.hasOwnProperty('b')
    "#;
    assert_eq!(eval(source), "b|a|quoted key:false:true");
}

#[test]
fn test_constructors_and_instanceof() {
    let source = r#"
        function Point(x, y) { this.x = x; this.y = y; }
        Point.prototype.sum = function () { return this.x + this.y; };
        var p = new Point(2, 3);
        [p.sum(), p instanceof Point, p instanceof Object, [] instanceof Array].join()
    "#;
    assert_eq!(eval(source), "5,true,true,true");
}

#[test]
fn test_try_catch_finally() {
    let source = r#"
        var log = [];
        function risky() { throw new TypeError('nope'); }
        try {
            risky();
        } catch (e) {
            log.push(e.name, e.message, e instanceof TypeError, e instanceof Error);
        } finally {
            log.push('done');
        }
        log.join(' ')
    "#;
    assert_eq!(eval(source), "TypeError nope true true done");
}

#[test]
fn test_finally_overrides_return() {
    let source = r#"
        function f() { try { return 1; } finally { return 2; } }
        f()
    "#;
    assert_eq!(eval(source), "2");
}

#[test]
fn test_asi_and_missing_semicolon() {
    assert_eq!(eval("var a = 1\nvar b = 2\na + b"), "3");
    let err = eval_err("var a = 1 var b = 2");
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert_eq!(err.message, "missing ; before statement");
}

#[test]
fn test_standard_library() {
    assert_eq!(eval("JSON.stringify({a: [1, 'x', null], b: undefined})"), r#"{"a":[1,"x",null]}"#);
    assert_eq!(eval("JSON.parse('{\"n\": 4}').n * 2"), "8");
    assert_eq!(eval("Object.keys({x: 1, y: 2}).length"), "2");
    assert_eq!(eval("Math.max(1, 7, 3) + Math.floor(2.7)"), "9");
    assert_eq!(eval("' Mixed '.trim().toUpperCase()"), "MIXED");
    assert_eq!(eval("'a,b,c'.split(',').map(function (s) { return s + s; }).join('')"), "aabbcc");
    assert_eq!(eval("[3, 1, 2].filter(function (n) { return n > 1; }).length"), "2");
    assert_eq!(eval("parseInt('42px') + parseFloat('0.5')"), "42.5");
    assert_eq!(eval("isNaN(Number('x'))"), "true");
    assert_eq!(eval("Array.isArray([]) && !Array.isArray({})"), "true");
}

#[test]
fn test_call_and_apply_bind_this() {
    let source = r#"
        function who(greeting) { return greeting + ' ' + this.name; }
        var o = { name: 'sable' };
        who.call(o, 'hi') + '/' + who.apply(o, ['yo'])
    "#;
    assert_eq!(eval(source), "hi sable/yo sable");
}

#[test]
fn test_const_is_immutable() {
    let err = eval_err("const x = 1; x = 2;");
    assert_eq!(err.kind, ErrorKind::Type);
    assert_eq!(err.message, "invalid assignment to const 'x'");
}

#[test]
fn test_reference_error_has_location() {
    let err = eval_err("var a = 1;\nmissing();");
    assert_eq!(err.kind, ErrorKind::Reference);
    assert_eq!(err.message, "missing is not defined");
    assert_eq!(err.filename, "test.js");
    assert_eq!(err.line, 2);
}

#[test]
fn test_calling_non_function() {
    let err = eval_err("var o = {};\no.nope();");
    assert_eq!(err.kind, ErrorKind::Type);
    assert_eq!(err.message, "o.nope is not a function");
}

#[test]
fn test_error_stack_names_frames() {
    let source = "function inner() {\n  throw new Error('deep');\n}\nfunction outer() {\n  inner();\n}\nouter();";
    let err = eval_err(source);
    assert_eq!(err.message, "deep");
    assert_eq!(err.line, 2);
    assert!(err.stack.starts_with("inner()@test.js:2\nouter()@test.js:5\n"), "{}", err.stack);
}

#[test]
fn test_thrown_non_error() {
    let err = eval_err("throw 'plain';");
    assert_eq!(err.kind, ErrorKind::Thrown);
    assert_eq!(err.message, "plain");
    assert_eq!(err.value, serde_json::json!("plain"));
}

#[test]
fn test_recursion_limit() {
    // Debug builds need more than the default test thread stack.
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let err = eval_err("function f() { return f(); } f();");
            (err.kind, err.message)
        })
        .unwrap();
    let (kind, message) = handle.join().unwrap();
    assert_eq!(kind, ErrorKind::Range);
    assert_eq!(message, "too much recursion");
}

#[test]
fn test_array_length_limits() {
    let err = eval_err("var a = [];\na.length = 1e300;");
    assert_eq!(err.kind, ErrorKind::Range);
    assert_eq!(err.message, "Invalid array length");
    assert_eq!(err.line, 2);

    assert_eq!(
        eval("var a = []; try { a.length = -1; } catch (e) { e.name + ':' + a.length }"),
        "RangeError:0"
    );
    assert_eq!(eval("try { new Array(4294967295); } catch (e) { e.name }"), "RangeError");
    assert_eq!(eval("var a = [1]; a[4294967294] = 2; a.length + ',' + a[4294967294]"), "1,2");
    assert_eq!(eval("var a = [1, 2, 3]; a.length = 1; a.length + ',' + a[2]"), "1,undefined");
}

#[test]
fn test_deep_nesting_is_a_syntax_error() {
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let source = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
            let err = eval_err(&source);
            (err.kind, err.message)
        })
        .unwrap();
    let (kind, message) = handle.join().unwrap();
    assert_eq!(kind, ErrorKind::Syntax);
    assert_eq!(message, "too much recursion");
}

#[test]
fn test_globals_and_injection() {
    let context = context();
    context.define_global("answer", Value::Number(42.0));
    assert_eq!(context.evaluate("answer / 2", None).unwrap(), Value::Number(21.0));

    context.evaluate("var fromScript = 'yes'; implicit = 1;", None).unwrap();
    assert_eq!(context.get_global("fromScript"), Some(Value::from("yes")));
    assert_eq!(context.get_global("implicit"), Some(Value::Number(1.0)));
    assert_eq!(context.injected_names(), ["answer"]);
}

#[test]
fn test_contexts_are_isolated() {
    let factory = DefaultSandboxFactory::default();
    let a = factory.create_context(ContextOptions::default());
    let b = factory.create_context(ContextOptions::default());
    a.evaluate("var shared = 1;", None).unwrap();
    assert!(b.get_global("shared").is_none());
    assert_eq!(b.evaluate("typeof shared", None).unwrap(), Value::from("undefined"));
}

#[test]
fn test_principal_isolation() {
    let factory = DefaultSandboxFactory::default();
    let source = "typeof host.getenv";

    let restricted = factory.create_context(ContextOptions::default());
    let err = restricted.evaluate(source, None).unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::PermissionDenied { ref capability, principal: Principal::Restricted } if capability == "host"
    ));

    let elevated = factory.create_context(ContextOptions::default().principal(Principal::Elevated));
    assert_eq!(elevated.evaluate(source, None).unwrap(), Value::from("function"));
}

#[test]
fn test_closures_keep_their_principal() {
    let factory = DefaultSandboxFactory::default();
    let elevated = factory.create_context(ContextOptions::default().principal(Principal::Elevated));
    let restricted = factory.create_context(ContextOptions::default());

    let reader = elevated
        .evaluate("(function () { return typeof host; })", None)
        .unwrap();
    restricted.define_global("reader", reader);
    assert_eq!(restricted.evaluate("reader()", None).unwrap(), Value::from("object"));
}

#[test]
fn test_call_from_host() {
    let context = context();
    let add = context.evaluate("(function (a, b) { return a + b; })", None).unwrap();
    let sum = context
        .call(&add, Value::Undefined, &[Value::Number(2.0), Value::Number(5.0)])
        .unwrap();
    assert_eq!(sum, Value::Number(7.0));
}
