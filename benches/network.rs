use criterion::{Criterion, black_box, criterion_group, criterion_main};

use rust_mlkit::{Dataset, FitConfig, Network, Shuffle};

fn network(input: usize) -> Network {
    Network::from_layers(input, &[(256, "relu"), (256, "tanh"), (10, "softmax")], 0.01, 0)
        .unwrap()
}

fn dataset(rows: usize, input: usize) -> Dataset {
    let mut data = Dataset::with_capacity(input, rows).unwrap();
    let features = vec![0.1_f64; input];
    for r in 0..rows {
        data.add(&features, (r % 10) as f64).unwrap();
    }
    data
}

fn predict_bench(c: &mut Criterion) {
    let mut net = network(128);
    net.fit(&dataset(1, 128)).unwrap();
    let input = vec![0.1_f64; 128];

    c.bench_function("network_predict_128_256_256_10", |b| {
        b.iter(|| {
            let out = net.predict(black_box(&input)).unwrap();
            black_box(out);
        })
    });
}

fn fit_epoch_bench(c: &mut Criterion) {
    let data = dataset(64, 128);

    c.bench_function("network_fit_epoch_64x128_batch16", |b| {
        b.iter(|| {
            let mut net = network(128);
            net.configure(FitConfig {
                epochs: 1,
                batch_size: 16,
                shuffle: Shuffle::Seeded(0),
                ..FitConfig::default()
            })
            .unwrap();
            black_box(net.fit(black_box(&data)).unwrap());
        })
    });
}

fn batches_bench(c: &mut Criterion) {
    let data = dataset(4096, 32);

    c.bench_function("dataset_shuffled_batches_4096x32_batch64", |b| {
        b.iter(|| {
            let n: usize = data
                .shuffled_batches(64, black_box(7))
                .unwrap()
                .map(|batch| batch.len())
                .sum();
            black_box(n);
        })
    });
}

criterion_group!(benches, predict_bench, fit_epoch_bench, batches_bench);
criterion_main!(benches);
