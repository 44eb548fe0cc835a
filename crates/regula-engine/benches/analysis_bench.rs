use criterion::{black_box, criterion_group, criterion_main, Criterion};
use regula_engine::flock::FlockFactorizer;
use regula_engine::oracle::OracleTable;
use regula_engine::sensitivity::SensitivityAnalyzer;
use regula_engine::{FieldSpec, ShapeCatalog, Z3Factory};

/// Six-bit word: the top bit picks a format, the rest is a register field
/// and an immediate that only some formats use.
fn decoder_table() -> OracleTable {
    OracleTable::tabulate(6, |e| {
        let (format, reg, imm) = (e >> 5, (e >> 3) & 0b11, e & 0b111);
        match (format, imm) {
            (0, 0) => (format!("nop{reg}"), vec![]),
            (0, _) => ("addi".to_string(), vec![reg as i64, imm as i64]),
            _ => ("ld".to_string(), vec![reg as i64, (imm as i64) * 8]),
        }
    })
    .unwrap()
}

// ---------------------------------------------------------------------------
// Field specs
// ---------------------------------------------------------------------------

fn bench_field_spec_enumeration(c: &mut Criterion) {
    let spec: FieldSpec = "0b011111 5 0b0 5 0b10 6".parse().unwrap();
    c.bench_function("fieldspec_enumerate_16_free_bits", |b| {
        b.iter(|| black_box(&spec).iter().fold(0u64, |acc, w| acc ^ w))
    });
}

// ---------------------------------------------------------------------------
// Solver-backed analyses
// ---------------------------------------------------------------------------

fn bench_sensitivity_6bit(c: &mut Criterion) {
    let table = decoder_table();
    let factory = Z3Factory::new(60);
    c.bench_function("sensitivity_decoder_6bit", |b| {
        b.iter(|| {
            SensitivityAnalyzer::new(&factory)
                .analyze(black_box(&table))
                .unwrap()
        })
    });
}

fn bench_flock_search_6bit(c: &mut Criterion) {
    let table = decoder_table();
    let factory = Z3Factory::new(60);
    let list = SensitivityAnalyzer::new(&factory).analyze(&table).unwrap();
    let catalog = ShapeCatalog::build(&table, &list).unwrap();
    c.bench_function("flock_search_decoder_6bit", |b| {
        b.iter(|| {
            FlockFactorizer::new(&factory, black_box(&catalog))
                .search(false)
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_field_spec_enumeration,
    bench_sensitivity_6bit,
    bench_flock_search_6bit,
);
criterion_main!(benches);
