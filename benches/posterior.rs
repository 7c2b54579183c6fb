use bifsg::engine::{ReferenceTables, TableSource};
use bifsg::{
    Direction, InferenceEngine, InferenceRequest, Model, NUM_RACES, ProbabilityTable, Resolution,
};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SURNAMES: usize = 20_000;
const ZCTAS: usize = 30_000;

/// Letters-only key, since names normalize to bare upper-case letters.
fn letters(mut i: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (i % 26) as u8);
        i /= 26;
        if i == 0 {
            break;
        }
    }
    out.into_iter().map(char::from).collect()
}

fn random_table(rng: &mut StdRng, keys: Vec<String>, direction: Direction) -> ProbabilityTable {
    let counts = Array2::from_shape_fn((keys.len(), NUM_RACES), |_| rng.gen_range(1.0..1000.0));
    ProbabilityTable::from_counts("synthetic", direction, keys, counts).expect("synthetic table")
}

fn synthetic_engine(rng: &mut StdRng) -> InferenceEngine {
    let surnames = random_table(
        rng,
        (0..SURNAMES).map(letters).collect(),
        Direction::RaceGivenProxy,
    );
    let zctas = random_table(
        rng,
        (0..ZCTAS).map(|i| format!("{i:05}")).collect(),
        Direction::ProxyGivenRace,
    );
    InferenceEngine::new(
        Model::Bisg,
        Resolution::Zcta,
        ReferenceTables {
            surname: surnames,
            first_name: None,
            geography: TableSource::Table(zctas),
        },
    )
    .expect("synthetic engine")
}

fn synthetic_request(rng: &mut StdRng, size: usize) -> InferenceRequest {
    // Roughly one record in ten misses a table, to keep the undefined path warm.
    let surnames = (0..size)
        .map(|_| letters(rng.gen_range(0..SURNAMES + SURNAMES / 10)))
        .collect();
    let zctas = (0..size)
        .map(|_| format!("{}", rng.gen_range(0..ZCTAS)))
        .collect();
    InferenceRequest::bisg(surnames, zctas).expect("synthetic request")
}

fn benchmark_posterior(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xB15C);
    let mut engine = synthetic_engine(&mut rng);

    let mut group = c.benchmark_group("bisg_posterior");
    for size in [1_000_usize, 10_000, 100_000] {
        let request = synthetic_request(&mut rng, size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &request, |b, input| {
            b.iter(|| {
                let result = engine.infer(black_box(input)).expect("inference");
                black_box(result);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_posterior);
criterion_main!(benches);
