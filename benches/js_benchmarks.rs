use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use mquickjs_host::{EvalKind, Runtime, Value};

const FIB: &str = r#"
    function fib(n) {
        if (n <= 1) return n;
        var a = 0;
        var b = 1;
        for (var i = 2; i <= n; i = i + 1) {
            var c = a + b;
            a = b;
            b = c;
        }
        return b;
    }
    var sum = 0;
    for (var i = 0; i < 1000; i = i + 1) {
        sum = sum + fib(30);
    }
    sum
"#;

fn bench_eval(c: &mut Criterion) {
    let rt = Runtime::new();
    c.bench_function("eval fib_iter 1k", |b| {
        b.iter(|| {
            let ctx = rt.new_context();
            black_box(ctx.eval(FIB, EvalKind::Global).unwrap().as_f64().unwrap())
        })
    });
}

fn bench_eval_binary(c: &mut Criterion) {
    let rt = Runtime::new();
    let bytes = rt.new_context().compile(FIB).unwrap();
    c.bench_function("eval_binary fib_iter 1k", |b| {
        b.iter(|| {
            let ctx = rt.new_context();
            black_box(ctx.eval_binary(&bytes).unwrap().as_f64().unwrap())
        })
    });
}

fn bench_compile(c: &mut Criterion) {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    c.bench_function("compile fib_iter", |b| {
        b.iter(|| black_box(ctx.compile(FIB).unwrap()))
    });
}

fn bench_host_calls(c: &mut Criterion) {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    let add = ctx
        .function("add", |ctx, _this, args| {
            let a = args[0].as_i64().unwrap_or(0);
            let b = args[1].as_i64().unwrap_or(0);
            ctx.int64(a + b)
        })
        .unwrap();
    ctx.set_global("add", add).unwrap();
    c.bench_function("host function 10k calls", |b| {
        b.iter(|| {
            let v = ctx
                .eval("var s = 0; for (var i = 0; i < 10000; i++) s = add(s, i); s", EvalKind::Global)
                .unwrap();
            black_box(v.as_i64().unwrap())
        })
    });
}

fn bench_call_from_host(c: &mut Criterion) {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    let f = ctx
        .eval("(function (a, b) { return a * b + 1; })", EvalKind::Global)
        .unwrap();
    let this = ctx.undefined();
    c.bench_function("call from host 1k", |b| {
        b.iter(|| {
            for i in 0..1000 {
                let r = f.call(&this, &[ctx.int(i), ctx.int(3)]).unwrap();
                black_box(r.as_i32().unwrap());
            }
        })
    });
}

fn bench_marshal_strings(c: &mut Criterion) {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    let text = "marshaled text with a non-BMP character 😀 ".repeat(64);
    c.bench_function("string round trip", |b| {
        b.iter(|| {
            let v = ctx.string(&text);
            black_box(v.as_string().unwrap())
        })
    });
}

fn bench_property_names(c: &mut Criterion) {
    let rt = Runtime::new();
    let ctx = rt.new_context();
    let obj = ctx
        .eval(
            "var o = {}; for (var i = 0; i < 500; i++) o['k' + i] = i; o",
            EvalKind::Global,
        )
        .unwrap();
    c.bench_function("enumerate 500 properties", |b| {
        b.iter_batched(
            || obj.dup(),
            |o: Value| {
                let mut total = 0;
                for name in o.property_names().unwrap() {
                    total += o.get_by_atom(name.atom).unwrap().as_i32().unwrap();
                }
                black_box(total)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_object_create(c: &mut Criterion) {
    let code = r#"
        function Point(x, y) {
            this.x = x;
            this.y = y;
        }
        var points = [];
        for (var i = 0; i < 1000; i = i + 1) {
            points.push(new Point(i, i * 2));
        }
        points.length
    "#;
    let rt = Runtime::new();
    c.bench_function("object create 1k", |b| {
        b.iter(|| {
            let ctx = rt.new_context();
            black_box(ctx.eval(code, EvalKind::Global).unwrap().as_i32().unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_eval,
    bench_eval_binary,
    bench_compile,
    bench_host_calls,
    bench_call_from_host,
    bench_marshal_strings,
    bench_property_names,
    bench_object_create,
);
criterion_main!(benches);
