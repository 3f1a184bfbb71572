use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use minilisp::{evaluate, parse_str, tokenize};

const BENCH_INPUT: &str = r#"
(define fib
  (fun (n)
    (if (< n 2)
        n
        (+ (fib (- n 1))
           (fib (- n 2))))))

(define fact
  (fun (n)
    (if (= n 0)
        1
        (* n (fact (- n 1))))))

(define make-adder
  (fun (x) (fun (y) (+ x y))))

(define add-three (make-adder 3))

(define sum-to
  (fun (n)
    (define step (fun (acc i)
      (if (> i n) acc (step (+ acc i) (+ i 1)))))
    (step 0 1)))

(print-num (fib 15))
(print-num (fact 10))
(print-num (add-three 39))
(print-num (sum-to 200))
(print-bool (and (> 3 2) (not (= 1 2)) (or #f #t)))
(print-num (mod (* 17 23) (/ 100 7)))
"#;

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Interpreter Pipeline");

    group.bench_with_input(
        BenchmarkId::new("tokenize", "recursive_program"),
        &BENCH_INPUT,
        |b, input| b.iter(|| tokenize(black_box(input))),
    );

    group.bench_with_input(
        BenchmarkId::new("parse", "recursive_program"),
        &BENCH_INPUT,
        |b, input| b.iter(|| parse_str(black_box(input))),
    );

    group.bench_with_input(
        BenchmarkId::new("evaluate", "recursive_program"),
        &BENCH_INPUT,
        |b, input| b.iter(|| evaluate(black_box(input))),
    );

    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
