use rand::SeedableRng;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;

use rust_mlkit::{Dataset, FitConfig, Network, Shuffle};

fn main() -> rust_mlkit::Result<()> {
    env_logger::init();

    // Task: classify points in the unit square by x0 + x1 > 1.
    let mut rng = StdRng::seed_from_u64(1);
    let dist = Uniform::new(0.0_f64, 1.0_f64);

    let mut data = Dataset::with_capacity(2, 250)?;
    for _ in 0..250 {
        let x0 = dist.sample(&mut rng);
        let x1 = dist.sample(&mut rng);
        data.add(&[x0, x1], if x0 + x1 > 1.0 { 1.0 } else { 0.0 })?;
    }
    let (test, train) = data.split(50, 200, Some(2))?;
    println!("{}", train.summary());

    let mut net = Network::from_layers(2, &[(4, "sigmoid"), (2, "softmax")], 0.05, 0)?;
    net.configure(FitConfig {
        epochs: 1500,
        batch_size: 1,
        validation_split: 0.1,
        patience: 25,
        shuffle: Shuffle::Seeded(3),
    })?;

    let report = net.fit(&train)?;
    let eval = net.evaluate(&test)?;
    println!(
        "epochs_run={} stopped_early={} test_loss={:.6} test_accuracy={:.3}",
        report.epochs_run, report.stopped_early, eval.loss, eval.accuracy
    );
    Ok(())
}
