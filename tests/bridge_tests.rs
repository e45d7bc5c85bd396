//! End-to-end tests of the host object lifetime bridge

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use jsbridge::{Context, ContextConfig, Error, MethodSuite, Nargs, Type};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn eval_string_result(ctx: &mut Context, source: &str) -> String {
    ctx.eval_string(source).unwrap();
    let s = ctx.to_string(-1).unwrap();
    ctx.pop().unwrap();
    s
}

// ============================================================================
// Evaluation and typed results
// ============================================================================

#[test]
fn test_eval_string() {
    init_tracing();
    let mut ctx = Context::new();
    ctx.eval_string(r#""Golang love Duktape!""#).unwrap();
    assert!(ctx.get_type(-1).is_string());
    assert_eq!(ctx.get_string(-1).unwrap(), "Golang love Duktape!");
    ctx.destroy();
}

#[test]
fn test_eval_func() {
    let mut ctx = Context::new();
    ctx.peval_string("(function (x) { return x + x; })").unwrap();
    assert!(ctx.is_callable(-1));
    assert!(ctx.get_type(-1).is_object());
    ctx.push_int(5);
    ctx.pcall(1).unwrap();
    assert_eq!(ctx.get_int(-1).unwrap(), 10);
    ctx.destroy();
}

#[rstest]
#[case("1 + 2 * 3", "7")]
#[case("'a' + 1", "a1")]
#[case("[1, [2, 3]] + ''", "1,2,3")]
#[case("0.1 + 0.2", "0.30000000000000004")]
#[case("1 / 0", "Infinity")]
#[case("typeof function () {}", "function")]
#[case("var o = { a: 1 }; o.b = 2; o.a + o.b", "3")]
#[case("(function () { var s = 0; for (var i = 1; i <= 10; i++) s += i; return s; })()", "55")]
fn test_eval_results(#[case] source: &str, #[case] expected: &str) {
    let mut ctx = Context::new();
    assert_eq!(eval_string_result(&mut ctx, source), expected);
}

#[rstest]
#[case("true", Type::Boolean)]
#[case("null", Type::Null)]
#[case("undefined", Type::Undefined)]
#[case("42", Type::Number)]
#[case("'s'", Type::String)]
#[case("({})", Type::Object)]
fn test_result_types(#[case] source: &str, #[case] expected: Type) {
    let mut ctx = Context::new();
    ctx.eval_string(source).unwrap();
    assert_eq!(ctx.get_type(-1), expected);
}

// ============================================================================
// Method suites
// ============================================================================

#[test]
fn test_eval_with() {
    let mut ctx = Context::new();
    let suite = MethodSuite::new().method("hi", |d| {
        let x = d.get_int(-2)?;
        let digit = char::from(b'0' + x as u8);
        d.push_string(&format!("hi! {digit}"));
        Ok(1)
    });
    ctx.eval_with("(function(o) { return o.hi(1, 2, 3) })", suite)
        .unwrap();
    assert_eq!(ctx.get_string(-1).unwrap(), "hi! 2");
    ctx.destroy();
}

#[test]
fn test_my_add_two() {
    let suite = MethodSuite::new().method("add", |d| {
        let top = d.get_top();
        let a = d.get_number(top - 2)?;
        let b = d.get_number(top - 1)?;
        d.push_number(a + b);
        Ok(1)
    });

    let mut ctx = Context::new();
    ctx.push_global_object();
    ctx.eval_with("(function(o) { return o.add })", suite).unwrap();
    ctx.put_prop_string(-2, "adder").unwrap();

    ctx.peval_string("adder(2, 3);").unwrap();
    let res = ctx.get_number(-1).unwrap();
    ctx.pop().unwrap();
    assert_eq!(res, 5.0);
    ctx.destroy();
}

#[test]
fn test_extracted_method_outlives_suite_object() {
    let suite = MethodSuite::new().method("add", |d| {
        let a = d.get_number(0)?;
        let b = d.get_number(1)?;
        d.push_number(a + b);
        Ok(1)
    });
    let mut ctx = Context::new();
    ctx.eval_with("(function(o) { return o.add })", suite).unwrap();
    ctx.put_global_string("adder").unwrap();

    // the suite object is unreachable except through the method
    ctx.gc();
    ctx.gc();
    assert_eq!(ctx.registry().len(), 1);

    ctx.eval_string("adder(20, 22)").unwrap();
    assert_eq!(ctx.get_number(-1).unwrap(), 42.0);
    ctx.pop().unwrap();

    ctx.eval_string("adder = null").unwrap();
    ctx.pop().unwrap();
    ctx.gc();
    ctx.gc();
    assert!(ctx.registry().is_empty());
}

#[test]
fn test_go_closure() {
    init_tracing();
    let shared_state = Rc::new(Cell::new(0));
    let inc_state = Rc::clone(&shared_state);
    let dec_state = Rc::clone(&shared_state);
    let suite = MethodSuite::new()
        .method("inc", move |d| {
            inc_state.set(inc_state.get() + 1);
            d.push_int(inc_state.get());
            Ok(1)
        })
        .method("dec", move |d| {
            dec_state.set(dec_state.get() - 1);
            d.push_int(dec_state.get());
            Ok(1)
        });

    let mut ctx = Context::new();
    ctx.eval_with(
        r#"
            (function(o) {
                 o.inc();
                 o.inc();
                 o.dec();
                 o.inc();
                 return o.inc();
             })"#,
        suite,
    )
    .unwrap();
    assert_eq!(ctx.get_number(-1).unwrap(), 3.0);
    assert_eq!(shared_state.get(), 3);

    // check for leaks
    ctx.gc();
    ctx.gc();
    assert!(ctx.registry().is_empty());
    ctx.destroy();
    assert_eq!(Rc::strong_count(&shared_state), 1);
}

#[derive(Debug, PartialEq)]
struct SampleObject {
    x: i32,
}

#[test]
fn test_go_object() {
    let mut ctx = Context::new();
    ctx.push_global_object();
    ctx.push_host_object(SampleObject { x: 42 });
    ctx.put_prop_string(-2, "y").unwrap();
    ctx.pop().unwrap();

    let suite = MethodSuite::new().method("tst", |d| {
        let so = d.get_host_object::<SampleObject>(-1)?;
        d.push_int(so.x);
        Ok(1)
    });
    ctx.eval_with("(function(o) { return o.tst(y); })", suite)
        .unwrap();
    assert_eq!(ctx.get_number(-1).unwrap(), 42.0);

    // check for leaks
    ctx.peval_string("y = null").unwrap();
    ctx.gc();
    ctx.gc();
    assert!(ctx.registry().is_empty());
}

#[test]
fn test_host_object_round_trip_keeps_identity() {
    let original = Rc::new(RefCell::new(vec![1, 2, 3]));
    let mut ctx = Context::new();
    ctx.push_host_rc(Rc::clone(&original));
    ctx.put_global_string("list").unwrap();

    ctx.eval_string("var alias = list; alias").unwrap();
    let recovered = ctx.get_host_object::<RefCell<Vec<i32>>>(-1).unwrap();
    recovered.borrow_mut().push(4);
    assert!(Rc::ptr_eq(&recovered, &original));
    assert_eq!(*original.borrow(), vec![1, 2, 3, 4]);
}

#[test]
fn test_eval_with_rejects_bad_sources() {
    let mut ctx = Context::new();
    let err = ctx.eval_with("42", MethodSuite::new()).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
    let err = ctx
        .eval_with("(function (a, b) { return a; })", MethodSuite::new())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "type mismatch: expected function of one parameter, found function of 2 parameters"
    );
    assert_eq!(ctx.get_top(), 0);
    assert!(ctx.registry().is_empty());
}

// ============================================================================
// Collection
// ============================================================================

#[rstest]
#[case(1)]
#[case(10)]
#[case(250)]
fn test_dropped_proxies_return_to_baseline(#[case] count: usize) {
    let mut ctx = Context::new();
    ctx.push_host_object(String::from("pinned"));
    let baseline = ctx.registry().len();

    ctx.eval_string("var held = [];").unwrap();
    ctx.pop().unwrap();
    for i in 0..count {
        ctx.get_global_string("held").unwrap();
        ctx.push_host_object(i);
        ctx.put_prop_index(-2, i as u32).unwrap();
        ctx.pop().unwrap();
    }
    assert_eq!(ctx.registry().len(), baseline + count);

    ctx.gc();
    assert_eq!(ctx.registry().len(), baseline + count);

    ctx.eval_string("held = null").unwrap();
    ctx.pop().unwrap();
    ctx.gc();
    ctx.gc();
    assert_eq!(ctx.registry().len(), baseline);
    assert!(ctx.get_host_object::<String>(0).is_ok());
}

#[test]
fn test_finalizer_runs_once() {
    init_tracing();
    let mut ctx = Context::new();
    ctx.eval_string("var count = 0; var obj = {};").unwrap();
    ctx.pop().unwrap();

    ctx.get_global_string("obj").unwrap();
    ctx.eval_string("(function (o) { count++; o.seen = true; })").unwrap();
    ctx.set_finalizer(-2).unwrap();
    ctx.pop().unwrap();

    ctx.eval_string("obj = null").unwrap();
    ctx.pop().unwrap();
    let before = ctx.object_count();

    let first = ctx.gc();
    assert_eq!(first.finalizers_run, 1);
    assert_eq!(eval_string_result(&mut ctx, "count"), "1");

    let second = ctx.gc();
    assert_eq!(second.finalizers_run, 0);
    assert!(ctx.object_count() < before);

    ctx.gc();
    assert_eq!(eval_string_result(&mut ctx, "count"), "1");
}

#[test]
fn test_finalizer_deferred_at_call_depth_limit() {
    init_tracing();
    let mut ctx = Context::with_config(ContextConfig::default().with_max_call_depth(1));
    ctx.eval_string("var count = 0;").unwrap();
    ctx.pop().unwrap();

    ctx.push_object();
    ctx.eval_string("(function (o) { count++; })").unwrap();
    ctx.set_finalizer(-2).unwrap();
    ctx.pop().unwrap();

    let inner_runs = Rc::new(Cell::new(usize::MAX));
    let runs = Rc::clone(&inner_runs);
    ctx.push_host_function(
        move |ctx| {
            runs.set(ctx.gc().finalizers_run);
            Ok(0)
        },
        Nargs::Fixed(0),
    );
    ctx.put_global_string("collect").unwrap();

    ctx.eval_string("collect()").unwrap();
    ctx.pop().unwrap();
    assert_eq!(inner_runs.get(), 0);
    assert_eq!(eval_string_result(&mut ctx, "count"), "0");

    let outer = ctx.gc();
    assert_eq!(outer.finalizers_run, 1);
    assert_eq!(eval_string_result(&mut ctx, "count"), "1");
}

#[test]
fn test_finalized_proxy_released_within_two_passes() {
    let mut ctx = Context::new();
    ctx.push_host_object(7_u64);
    ctx.eval_string("(function (o) {})").unwrap();
    ctx.set_finalizer(-2).unwrap();
    ctx.pop().unwrap();

    let first = ctx.gc();
    assert_eq!(first.finalizers_run, 1);
    assert_eq!(first.handles_released, 0);
    let second = ctx.gc();
    assert_eq!(second.handles_released, 1);
    assert!(ctx.registry().is_empty());
}

#[test]
fn test_throwing_finalizer_is_swallowed() {
    let mut ctx = Context::new();
    ctx.push_object();
    ctx.eval_string("(function (o) { throw new Error('finalizer'); })")
        .unwrap();
    ctx.set_finalizer(-2).unwrap();
    ctx.pop().unwrap();

    let stats = ctx.gc();
    assert_eq!(stats.finalizers_run, 1);
    assert_eq!(ctx.get_top(), 0);
    ctx.eval_string("1").unwrap();
    assert_eq!(ctx.get_int(-1).unwrap(), 1);
}

#[test]
fn test_gc_inside_host_call_keeps_live_values() {
    let suite = MethodSuite::new()
        .method("collect", |d| {
            d.gc();
            Ok(0)
        })
        .method("make", |d| {
            d.push_host_object(String::from("temp"));
            Ok(1)
        })
        .method("read", |d| {
            let s = d.get_host_object::<String>(0)?;
            d.push_string(&s);
            Ok(1)
        });

    let mut ctx = Context::new();
    ctx.eval_with(
        r#"
            (function (o) {
                function pair(a, b) { return a.k + b; }
                var first = pair({ k: 40 }, (o.collect(), 2));
                var arr = [{ v: 'x' }, o.collect()][0].v;
                var text = o.read(o.make(), o.collect());
                o.collect();
                return first + arr + text;
            })"#,
        suite,
    )
    .unwrap();
    assert_eq!(ctx.get_string(-1).unwrap(), "42xtemp");
}

// ============================================================================
// Errors
// ============================================================================

#[rstest]
#[case::host("fail", "Error: disk on fire")]
#[case::mismatch("num", "TypeError: type mismatch: expected number, found string")]
#[case::index("deep", "RangeError: invalid stack index 5")]
#[case::script("rethrow", "SyntaxError: custom")]
fn test_host_errors_are_catchable(#[case] method: &str, #[case] expected: &str) {
    let suite = MethodSuite::new()
        .method("fail", |d| {
            d.push_int(1);
            d.push_int(2);
            Err(Error::host("disk on fire"))
        })
        .method("num", |d| {
            d.get_number(0)?;
            Ok(0)
        })
        .method("deep", |d| {
            d.get_string(5)?;
            Ok(0)
        })
        .method("rethrow", |_| {
            Err(jsbridge::ScriptError::new(jsbridge::ErrorKind::SyntaxError, "custom").into())
        });

    let source = format!(
        "(function (o) {{ try {{ o.{method}('x'); return 'no error'; }} catch (e) {{ return e.name + ': ' + e.message; }} }})"
    );
    let mut ctx = Context::new();
    ctx.push_int(99);
    ctx.eval_with(&source, suite).unwrap();
    assert_eq!(ctx.get_top(), 2);
    assert_eq!(ctx.get_string(-1).unwrap(), expected);
    assert_eq!(ctx.get_int(0).unwrap(), 99);
}

#[test]
fn test_uncaught_host_error_restores_stack() {
    let mut ctx = Context::new();
    ctx.push_string("keep");
    ctx.push_host_function(
        |d| {
            d.push_object();
            d.push_host_object(1_i32);
            Err(Error::host("broken"))
        },
        Nargs::Variadic,
    );
    ctx.push_int(1);
    let err = ctx.call(1).unwrap_err();
    assert_eq!(err.to_string(), "Error: broken");
    assert_eq!(ctx.get_top(), 1);
    assert_eq!(ctx.get_string(-1).unwrap(), "keep");

    // the proxy pushed before failing is garbage now
    ctx.gc();
    assert!(ctx.registry().is_empty());
}

#[test]
fn test_result_count_exceeding_frame() {
    let mut ctx = Context::new();
    ctx.push_host_function(|_| Ok(3), Nargs::Fixed(0));
    assert!(ctx.pcall(0).is_err());
    ctx.get_prop_string(-1, "name").unwrap();
    assert_eq!(ctx.get_string(-1).unwrap(), "TypeError");
}

#[rstest]
#[case("var = 1")]
#[case("function (")]
#[case("'unterminated")]
#[case("a b")]
fn test_syntax_errors_leave_context_usable(#[case] source: &str) {
    let mut ctx = Context::new();
    let err = ctx.eval_string(source).unwrap_err();
    assert_eq!(err.as_script().map(|e| e.name.as_str()), Some("SyntaxError"));
    assert_eq!(ctx.get_top(), 0);

    ctx.eval_string("6 * 7").unwrap();
    assert_eq!(ctx.get_int(-1).unwrap(), 42);
}

#[test]
fn test_call_depth_limit() {
    let config = ContextConfig::default().with_max_call_depth(32);
    let mut ctx = Context::with_config(config);

    let source = "function r(n) { return r(n + 1); } try { r(0); } catch (e) { e.name }";
    assert_eq!(eval_string_result(&mut ctx, source), "RangeError");

    let err = ctx.eval_string("r(0)").unwrap_err();
    assert_eq!(
        err.to_string(),
        "RangeError: maximum call stack size exceeded"
    );
    assert_eq!(ctx.get_top(), 0);
}

#[test]
fn test_stack_value_limit() {
    let config = ContextConfig::default().with_max_stack_values(16);
    let mut ctx = Context::with_config(config);
    for i in 0..20 {
        ctx.push_int(i);
    }
    ctx.eval_string("(function () { return 1; })").unwrap();

    let err = ctx.call(0).unwrap_err();
    assert_eq!(err.to_string(), "RangeError: value stack limit exceeded");
    assert_eq!(ctx.get_top(), 20);
}

#[rstest]
#[case::arrays(format!("{}1{}", "[".repeat(300), "]".repeat(300)))]
#[case::parens(format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000)))]
#[case::blocks(format!("{}{}", "{".repeat(5_000), "}".repeat(5_000)))]
#[case::functions(format!("{}1{}", "(function () { return ".repeat(500), "; })()".repeat(500)))]
fn test_deep_nesting_is_syntax_error(#[case] source: String) {
    let mut ctx = Context::new();
    let err = ctx.eval_string(&source).unwrap_err();
    assert!(err.to_string().starts_with("SyntaxError: nesting too deep"), "{err}");
    assert_eq!(ctx.get_top(), 0);

    assert!(ctx.peval_string(&source).is_err());
    assert!(ctx.is_error(-1));
    ctx.pop().unwrap();
    assert_eq!(eval_string_result(&mut ctx, "[[[1]]][0][0][0]"), "1");
}

#[test]
fn test_high_call_depth_setting_throws() {
    let config = ContextConfig::default().with_max_call_depth(100_000);
    let mut ctx = Context::with_config(config);
    let err = ctx
        .eval_string("function f(n) { return n == 0 ? 0 : f(n - 1) + 1; } f(20000)")
        .unwrap_err();
    assert_eq!(err.to_string(), "RangeError: maximum call stack size exceeded");
    assert_eq!(ctx.get_top(), 0);
    assert_eq!(eval_string_result(&mut ctx, "f(20)"), "20");
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_destroy_releases_host_values() {
    let value = Rc::new(SampleObject { x: 1 });
    let mut ctx = Context::new();
    ctx.push_host_rc(Rc::clone(&value));
    ctx.put_global_string("v").unwrap();
    ctx.eval_string("var w = [v, v, { inner: v }]").unwrap();
    assert_eq!(Rc::strong_count(&value), 2);

    ctx.destroy();
    assert_eq!(Rc::strong_count(&value), 1);
}

#[test]
fn test_contexts_have_separate_registries() {
    let mut a = Context::new();
    let mut b = Context::new();
    let handle = a.push_host_object(1_u8);
    b.push_host_object(2_u8);
    b.push_host_object(3_u8);

    assert_eq!(a.registry().len(), 1);
    assert_eq!(b.registry().len(), 2);
    assert!(a.registry().contains(handle));
    assert_eq!(*a.get_host_object::<u8>(-1).unwrap(), 1);
}
