use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jsbridge::{Context, MethodSuite};

fn bench_loop(c: &mut Criterion) {
    let code = r#"
        var sum = 0;
        for (var i = 0; i < 10000; i = i + 1) {
            sum = sum + i;
        }
        sum
    "#;

    c.bench_function("loop 10k", |b| {
        b.iter(|| {
            let mut ctx = Context::new();
            ctx.eval_string(code).unwrap();
            black_box(ctx.get_number(-1).unwrap())
        })
    });
}

fn bench_fib(c: &mut Criterion) {
    let code = r#"
        function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); }
        fib(18)
    "#;

    c.bench_function("fib_rec 18", |b| {
        b.iter(|| {
            let mut ctx = Context::new();
            ctx.eval_string(code).unwrap();
            black_box(ctx.get_number(-1).unwrap())
        })
    });
}

fn bench_suite_calls(c: &mut Criterion) {
    let code = r#"
        (function (o) {
            var total = 0;
            for (var i = 0; i < 1000; i++) {
                total = o.add(total, i);
            }
            return total;
        })
    "#;

    c.bench_function("suite calls 1k", |b| {
        b.iter(|| {
            let suite = MethodSuite::new().method("add", |ctx| {
                let a = ctx.get_number(0)?;
                let b = ctx.get_number(1)?;
                ctx.push_number(a + b);
                Ok(1)
            });
            let mut ctx = Context::new();
            ctx.eval_with(code, suite).unwrap();
            black_box(ctx.get_number(-1).unwrap())
        })
    });
}

fn bench_gc_host_objects(c: &mut Criterion) {
    c.bench_function("gc 1k host proxies", |b| {
        b.iter(|| {
            let mut ctx = Context::new();
            for i in 0..1000 {
                ctx.push_host_object(i);
            }
            ctx.set_top(0).unwrap();
            black_box(ctx.gc())
        })
    });
}

criterion_group!(
    benches,
    bench_loop,
    bench_fib,
    bench_suite_calls,
    bench_gc_host_objects
);
criterion_main!(benches);
