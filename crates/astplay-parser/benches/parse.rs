//! Parser and codegen benchmarks.

use astplay_parser::{generate, node, parse, NodeRef, ParserOptions};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

const SAMPLE_SOURCE: &str = r#"
function fibonacci(n) {
    if (n <= 1) return n;
    return fibonacci(n - 1) + fibonacci(n - 2);
}

class Calculator {
    constructor() {
        this.result = 0;
    }

    add(x, y) {
        return x + y;
    }

    async fetchData(url) {
        const response = await fetch(url);
        return response.json();
    }
}

const calc = new Calculator();
const numbers = [1, 2, 3, 4, 5].map(n => n * 2);
const { a, b, ...rest } = { a: 1, b: 2, c: 3, d: 4 };
const template = `Hello ${name}, you have ${count} messages`;

export { Calculator, fibonacci };
export default calc;
"#;

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");
    group.throughput(Throughput::Bytes(SAMPLE_SOURCE.len() as u64));

    group.bench_function("parse", |b| {
        b.iter(|| parse(black_box(SAMPLE_SOURCE), ParserOptions::default()));
    });

    let ast = parse(SAMPLE_SOURCE, ParserOptions::default()).expect("sample parses");

    group.bench_function("walk", |b| {
        b.iter(|| {
            let mut count = 0usize;
            node::walk(NodeRef::program(black_box(&ast.program)), &mut |_| count += 1);
            count
        });
    });

    group.bench_function("generate", |b| {
        b.iter(|| generate(black_box(&ast.program)));
    });

    group.finish();
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
