//! End-to-end behavior of the embedding API

use std::cell::Cell;
use std::rc::Rc;
use std::str::FromStr;

use mquickjs_host::{
    BigDecimal, BigInt, ConversionError, DecodeError, Error, EvalKind, EvalOptions, Runtime, Value,
    ValueKind,
};

fn eval(src: &str) -> Value {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    ctx.eval(src, EvalKind::Global).unwrap()
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(eval("1 + 2 * 100 - 3").as_i64().unwrap(), 198);
    let with_sin = eval("1 + 2 * 100 - 3 + Math.sin(10)").as_f64().unwrap();
    assert_eq!(with_sin, 198.0 + 10f64.sin());
}

#[test]
fn template_string() {
    let v = eval("`Hello world! 2 ** 8 = ${2 ** 8}.`");
    assert_eq!(v.as_string().unwrap(), "Hello world! 2 ** 8 = 256.");
}

#[test]
fn big_int_exponent_is_exact() {
    let v = eval("128n ** 16n");
    assert_eq!(v.kind(), ValueKind::BigInt);
    assert_eq!(v.as_big_int().unwrap(), BigInt::from(128).pow(16u32));
    assert_eq!(v.to_string(), "5192296858534827628530496329220096");
}

#[test]
fn big_decimal_exponent() {
    let v = eval("128l ** 12l");
    assert_eq!(v.kind(), ValueKind::BigDecimal);
    let expected = BigDecimal::new(BigInt::from(128).pow(12u32), 0);
    assert_eq!(v.as_big_decimal().unwrap(), expected);
    assert_eq!(v.to_string(), "19342813113834066795298816");
}

#[test]
fn boolean_result() {
    assert!(!eval("false && true").as_bool().unwrap());
}

#[test]
fn scalar_round_trips() {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    for n in [0i64, -1, 1 << 53, i64::MIN, i64::MAX] {
        assert_eq!(ctx.value(n).unwrap().as_i64().unwrap(), n);
    }
    for f in [0.0, -0.5, f64::MAX, -f64::MAX] {
        assert_eq!(ctx.value(f).unwrap().as_f64().unwrap(), f);
    }
    for s in ["", "ascii", "𝄞 outside the BMP"] {
        assert_eq!(ctx.value(s).unwrap().as_string().unwrap(), s);
    }
    let big = BigInt::from_str("-987654321098765432109876543210").unwrap();
    assert_eq!(ctx.value(big.clone()).unwrap().as_big_int().unwrap(), big);
    let dec = BigDecimal::from_str("3.14159265358979323846264338327950288").unwrap();
    assert_eq!(ctx.value(dec.clone()).unwrap().as_big_decimal().unwrap(), dec);

    // and from the engine side
    let same = ctx
        .eval("(function (a, b) { return a === b; })", EvalKind::Global)
        .unwrap();
    for src in ["0", "-42", "9007199254740991", "'x'", "''", "true"] {
        let v = ctx.eval(src, EvalKind::Global).unwrap();
        let back = match v.kind() {
            ValueKind::Int | ValueKind::Float => ctx.value(v.as_f64().unwrap()).unwrap(),
            ValueKind::String => ctx.value(v.as_string().unwrap()).unwrap(),
            ValueKind::Bool => ctx.value(v.as_bool().unwrap()).unwrap(),
            kind => panic!("unexpected {kind}"),
        };
        let r = same.call(&ctx.undefined(), &[v, back]).unwrap();
        assert!(r.as_bool().unwrap(), "{src}");
    }
}

#[test]
fn type_mismatch_is_reported() {
    let v = eval("'text'");
    match v.as_i64().unwrap_err() {
        Error::Conversion(ConversionError::TypeMismatch { expected, actual }) => {
            assert_eq!(expected, "integer");
            assert_eq!(actual, ValueKind::String);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        eval("1.5").as_i64().unwrap_err(),
        Error::Conversion(ConversionError::NotIntegral(_))
    ));
}

#[test]
fn dup_then_release_twice() {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    let v = ctx.eval("({ payload: [1, 2, 3] })", EvalKind::Global).unwrap();
    let d1 = v.dup();
    let d2 = d1.dup();
    d1.free();
    d2.free();
    for _ in 0..3 {
        ctx.eval("for (var i = 0; i < 1000; i++) ({ junk: i })", EvalKind::Global)
            .unwrap();
        rt.run_gc().unwrap();
    }
    assert_eq!(v.get("payload").unwrap().to_string(), "1,2,3");
    v.free();
    assert_eq!(rt.memory_usage().host_roots, 0);
}

#[test]
fn contexts_have_separate_globals() {
    let rt = Runtime::new();
    let a = rt.new_context();
    let b = rt.new_context();
    a.eval("defined = 1", EvalKind::Global).unwrap();
    assert!(a.globals().has("defined").unwrap());
    assert!(!b.globals().has("defined").unwrap());
    assert_eq!(
        b.eval("typeof defined", EvalKind::Global).unwrap().as_string().unwrap(),
        "undefined"
    );
}

#[test]
fn runtimes_are_independent() {
    let rt1 = Runtime::new();
    let rt2 = Runtime::new();
    let c1 = rt1.new_context();
    let c2 = rt2.new_context();
    c1.eval("x = 'one'", EvalKind::Global).unwrap();
    c2.eval("x = 'two'", EvalKind::Global).unwrap();
    assert_eq!(c1.globals().get("x").unwrap().as_string().unwrap(), "one");
    drop(c2);
    drop(rt2);
    assert_eq!(c1.eval("x + 1", EvalKind::Global).unwrap().as_string().unwrap(), "one1");
}

#[test]
#[should_panic(expected = "protocol violation")]
fn foreign_value_panics() {
    let rt1 = Runtime::new();
    let rt2 = Runtime::new();
    let c1 = rt1.new_context();
    let c2 = rt2.new_context();
    let v = c1.object().unwrap();
    let _ = c2.set_global("leak", v);
}

#[test]
fn host_functions_count_branches() {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    let a_calls = Rc::new(Cell::new(0));
    let b_calls = Rc::new(Cell::new(0));
    let counter = |cell: &Rc<Cell<i32>>| {
        let cell = Rc::clone(cell);
        move |ctx: &mquickjs_host::Context, _this: &Value, _args: &[Value]| {
            cell.set(cell.get() + 1);
            ctx.null()
        }
    };
    ctx.set_global("A", ctx.function("A", counter(&a_calls)).unwrap()).unwrap();
    ctx.set_global("B", ctx.function("B", counter(&b_calls)).unwrap()).unwrap();
    ctx.eval(
        "for (let i = 0; i < 10; i++) { if (i % 2 === 0) A(); else B(); }",
        EvalKind::Global,
    )
    .unwrap();
    assert_eq!(a_calls.get(), 5);
    assert_eq!(b_calls.get(), 5);
}

#[test]
fn compile_error_has_cause_and_no_stack() {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    let err = ctx.eval("var = ;", EvalKind::Global).unwrap_err();
    assert!(matches!(err, Error::Compile(_)));
    assert!(err.cause().starts_with("SyntaxError: "), "{}", err.cause());
    assert_eq!(err.stack(), "");
}

#[test]
fn thrown_error_carries_message_and_stack() {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    let opts = EvalOptions::new().filename("boom.js");
    let err = ctx
        .eval_with("function boom() {\n  throw new Error('x');\n}\nboom();", &opts)
        .unwrap_err();
    assert!(err.is_exception());
    assert!(err.cause().contains("x"));
    assert_eq!(err.cause(), "Error: x");
    assert!(err.stack().contains("at boom (boom.js:2)"), "{}", err.stack());
}

#[test]
fn thrown_non_error_value() {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    let err = ctx.eval("throw { toString: function () { return 'custom'; } }", EvalKind::Global);
    assert_eq!(err.unwrap_err().cause(), "custom");
}

#[test]
fn bytecode_matches_source_evaluation() {
    let program = "
        function greet(name) { return 'hi ' + name; }
        var count = (typeof count === 'number' ? count : 0) + 1;
        greet('there') + ' #' + count
    ";
    let rt = Runtime::new();
    let direct = rt.new_context();
    let loaded = rt.new_context();

    let expected = direct.eval(program, EvalKind::Global).unwrap();
    let bytes = direct.compile(program).unwrap();
    let actual = loaded.eval_binary(&bytes).unwrap();
    assert_eq!(actual.as_string().unwrap(), expected.as_string().unwrap());

    for ctx in [&direct, &loaded] {
        let greet = ctx.globals().get("greet").unwrap();
        assert!(greet.is_function());
        let r = greet.call(&ctx.undefined(), &[ctx.string("you")]).unwrap();
        assert_eq!(r.as_string().unwrap(), "hi you");
        assert_eq!(ctx.globals().get("count").unwrap().as_i32().unwrap(), 1);
    }
}

#[test]
fn malformed_bytecode_is_rejected_before_running() {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    let bytes = ctx.compile("ran = true").unwrap();

    let err = ctx.eval_binary(&bytes[..bytes.len() / 2]).unwrap_err();
    assert!(matches!(err, Error::Decode(DecodeError::Truncated(_))), "{err}");
    let err = ctx.eval_binary(b"\x02\x02\x0c<code>").unwrap_err();
    assert!(matches!(err, Error::Decode(DecodeError::BadMagic)));
    let mut foreign = bytes.clone();
    foreign[7] ^= 0x5a;
    assert!(matches!(
        ctx.eval_binary(&foreign).unwrap_err(),
        Error::Decode(DecodeError::BuildTag { .. })
    ));
    assert!(!ctx.globals().has("ran").unwrap());

    ctx.eval_binary(&bytes).unwrap();
    assert!(ctx.globals().get("ran").unwrap().as_bool().unwrap());
}

#[test]
fn enumeration_is_a_snapshot() {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    ctx.eval("HELLO = 'world'; TEST = false;", EvalKind::Global).unwrap();
    let globals = ctx.globals();
    let before = globals.property_names().unwrap();
    ctx.eval("LATER = 1", EvalKind::Global).unwrap();

    let names: Vec<String> = before.map(|p| p.name).collect();
    assert_eq!(names, ["HELLO", "TEST"]);

    let after: Vec<String> = globals.property_names().unwrap().map(|p| p.name).collect();
    assert_eq!(after, ["HELLO", "TEST", "LATER"]);

    let shown: Vec<String> = globals
        .property_names()
        .unwrap()
        .map(|p| format!("'{}': {}", p.name, globals.get_by_atom(p.atom).unwrap()))
        .collect();
    assert_eq!(shown, ["'HELLO': world", "'TEST': false", "'LATER': 1"]);
}

#[test]
fn array_keys_are_ordered_numerically() {
    let v = eval("var a = ['x', 'y']; a.tag = 't'; a.push('z'); a");
    let names: Vec<String> = v.property_names().unwrap().map(|p| p.name).collect();
    assert_eq!(names, ["0", "1", "2", "tag"]);
}

#[test]
fn modules_export_a_namespace() {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    let lib = EvalOptions::new().module().filename("math.js");
    let ns = ctx
        .eval_with("export function square(x) { return x * x; }\nexport const ten = 10;", &lib)
        .unwrap();
    assert!(ns.get("square").unwrap().is_function());

    let main = EvalOptions::new().module().filename("main.js");
    ctx.eval_with(
        "import { square, ten } from 'math.js';\nglobalThis.result = square(ten);",
        &main,
    )
    .unwrap();
    assert_eq!(ctx.globals().get("result").unwrap().as_i32().unwrap(), 100);
}

#[test]
fn host_can_build_and_read_structures() {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    let config = ctx.object().unwrap();
    config.set("name", "demo").unwrap();
    config.set("sizes", vec![1, 2, 3]).unwrap();
    config.set("missing", None::<i32>).unwrap();
    ctx.set_global("config", config).unwrap();

    let v = ctx
        .eval(
            "config.name + ':' + config.sizes.map(function (n) { return n * 2; }).join('|') + ':' + config.missing",
            EvalKind::Global,
        )
        .unwrap();
    assert_eq!(v.as_string().unwrap(), "demo:2|4|6:null");

    let sizes: Vec<i64> = ctx.eval("config.sizes", EvalKind::Global).unwrap().to().unwrap();
    assert_eq!(sizes, vec![1, 2, 3]);

    let buf = ctx.array_buffer(&[1, 2, 3, 4]).unwrap();
    ctx.set_global("buf", &buf).unwrap();
    assert_eq!(ctx.eval("buf.byteLength", EvalKind::Global).unwrap().as_i32().unwrap(), 4);
    assert_eq!(buf.as_bytes().unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn limits_surface_as_errors() {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    rt.set_max_stack_depth(50);
    let err = ctx
        .eval("function down(n) { return down(n + 1); } down(0)", EvalKind::Global)
        .unwrap_err();
    assert!(err.is_exception());
    // the context is still usable afterwards
    assert_eq!(ctx.eval("2 + 2", EvalKind::Global).unwrap().as_i32().unwrap(), 4);
}

#[test]
fn deep_nesting_is_a_compile_error() {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
    assert_eq!(ctx.eval(&shallow, EvalKind::Global).unwrap().as_i32().unwrap(), 1);
    for (open, close) in [("(", ")"), ("[", "]")] {
        let src = format!("{}1{}", open.repeat(5000), close.repeat(5000));
        let err = ctx.eval(&src, EvalKind::Global).unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
        assert!(err.cause().contains("too deeply nested"), "{}", err.cause());
    }
    assert_eq!(ctx.eval("2 + 2", EvalKind::Global).unwrap().as_i32().unwrap(), 4);
}
