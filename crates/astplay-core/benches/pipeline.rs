//! Editor-loop benchmarks: what runs after every debounce flush and every
//! cursor move.

use astplay_core::{locate, project, resolve, run, CursorPosition, ProjectOptions, RunnerOptions};
use astplay_parser::{parse, NodeRef, ParserOptions};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

const INPUT: &str = r#"
var a = 10;

function sum(a, b) {
  var result = a + b;
  return result;
}

const numbers = [1, 2, 3, 4, 5].map((n) => n * 2);
const { x, y: [z, ...rest] = [] } = load("config");

for (let i = 0; i < numbers.length; i++) {
  if (numbers[i] % 2) continue;
  console.log(`value ${numbers[i]}`);
}

export default function main() {
  try {
    return sum(x, z) ?? rest.length;
  } catch (err) {
    return -1;
  }
}
"#;

const PLUGIN: &str = "export default ({ types: t }) => ({
  visitor: {
    VariableDeclaration(path) {
      if (path.node.kind === 'var') {
        path.node.kind = 'let';
      }
    },
    Identifier(path) {
      if (t.isIdentifier(path.node, { name: 'sum' })) {
        path.node.name = 'add';
      }
    },
  },
});";

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Bytes(INPUT.len() as u64));

    let ast = parse(INPUT, ParserOptions::default()).expect("sample parses");
    let options = ProjectOptions::default().with_whitelist(["name", "value", "kind", "operator"]);

    group.bench_function("parse_and_project", |b| {
        b.iter(|| {
            let ast = parse(black_box(INPUT), ParserOptions::default()).expect("sample parses");
            project(NodeRef::program(&ast.program), Some("Identifier"), &options, ast.line_index()).count()
        });
    });

    group.bench_function("locate_and_resolve", |b| {
        b.iter(|| {
            let active = locate(black_box(PLUGIN), CursorPosition::new(9, 12));
            resolve(&ast, active.as_deref()).ranges.len()
        });
    });

    group.bench_function("transform", |b| {
        let runner = RunnerOptions::default();
        b.iter(|| run(black_box(INPUT), PLUGIN, &runner));
    });

    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
