use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use confc::{lexer::Lexer, resolve_str, ResolveOptions};

// ============================================================================
// Test Data: Varying Directive Density and Size
// ============================================================================

const TINY: &str = r#"{ "value": 42 }"#;

const SMALL: &str = r#"
#define FMT clm
{
  "sim_name": "test",
  "firstyear": 1901,
  "input": { "temp": { "fmt": FMT, "name": "tas.clm" } }
}"#;

const MEDIUM: &str = r#"
#ifndef CONF_H
#define CONF_H
#define RAW 0
#define CLM 1
#define FIRE 1
#define SPITFIRE 2
#define xstr(s) #s
#define mkstr(s) xstr(s)
#define CAT(a, b) a ## b
#endif

#define SUFFIX grid.bin
#define OUTPUT_DIR output

{
  "sim_name": "LPJmL Run",
#ifdef WITH_SPITFIRE
  "fire": SPITFIRE,
#else
  "fire": FIRE,
#endif
  "firstyear": 1901,
  "lastyear": 2011,
  "input": {
    "soil": { "fmt": "meta", "name": "input_VERSION2/soil.descr" },
    "coord": { "fmt": "clm", "name": "input_VERSION2/grid.bin" },
    "temp": { "fmt": CLM, "name": "GSWP3-ERA5/tas_gswp3-era5_1901-2018.clm" },
    "prec": { "fmt": CLM, "name": "GSWP3-ERA5/pr_gswp3-era5_1901-2018.clm" },
  },
  "output": [
    { "id": grid, "file": { "fmt": RAW, "name": mkstr(OUTPUT_DIR/SUFFIX) } },
    { "id": fpc, "file": { "fmt": RAW, "name": mkstr(OUTPUT_DIR/fpc.bin) } },
#if defined(DAILY_OUTPUT) && DAILY_OUTPUT > 0
    { "id": d_npp, "file": { "fmt": "cdf", "var": "npp", "name": "output/d_npp.nc" } },
#endif
  ],
  "firstyear": 1950,
}"#;

// Many outputs, each built through nested function-like macros
fn generate_outputs(count: usize) -> String {
    let mut source = String::from(
        "#define xstr(s) #s\n#define mkstr(s) xstr(s)\n#define OUT(n) { \"id\": n, \"file\": { \"fmt\": \"raw\", \"name\": mkstr(output/n.bin) } }\n{\n  \"output\": [\n",
    );
    for i in 0..count {
        source.push_str(&format!("    OUT(out_{}),\n", i));
    }
    source.push_str("  ]\n}\n");
    source
}

// ============================================================================
// Lexer Benchmarks
// ============================================================================

fn bench_lexer_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_by_size");
    for (name, source) in [("tiny", TINY), ("small", SMALL), ("medium", MEDIUM)] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, src| {
            b.iter(|| {
                let mut lexer = Lexer::new(black_box(src));
                lexer.lex()
            })
        });
    }
    group.finish();
}

// ============================================================================
// End-to-End Resolution Benchmarks
// ============================================================================

fn bench_resolve_sizes(c: &mut Criterion) {
    let options = ResolveOptions::default();
    let mut group = c.benchmark_group("resolve_by_size");
    for (name, source) in [("tiny", TINY), ("small", SMALL), ("medium", MEDIUM)] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, src| {
            b.iter(|| resolve_str(black_box(src), "bench.js", &options))
        });
    }
    group.finish();
}

fn bench_macro_scaling(c: &mut Criterion) {
    let options = ResolveOptions::default();
    let mut group = c.benchmark_group("macro_invocation_scaling");
    for count in [10, 100, 1000] {
        let source = generate_outputs(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &source, |b, src| {
            b.iter(|| resolve_str(black_box(src), "bench.js", &options))
        });
    }
    group.finish();
}

fn bench_resolve_with_serialization(c: &mut Criterion) {
    let options = ResolveOptions::default().define("WITH_SPITFIRE", "1");
    c.bench_function("resolve_medium_to_json", |b| {
        b.iter(|| {
            let resolution = resolve_str(black_box(MEDIUM), "bench.js", &options).unwrap();
            resolution.to_json().unwrap()
        })
    });
}

criterion_group!(lexer_benches, bench_lexer_sizes);
criterion_group!(
    resolve_benches,
    bench_resolve_sizes,
    bench_macro_scaling,
    bench_resolve_with_serialization
);
criterion_main!(lexer_benches, resolve_benches);
