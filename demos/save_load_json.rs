use rust_mlkit::{Dataset, FitConfig, Network};

fn main() -> rust_mlkit::Result<()> {
    env_logger::init();

    let xs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let train = Dataset::from_rows(&xs, &[0.0, 1.0, 1.0, 0.0])?;

    let mut net = Network::from_layers(2, &[(8, "tanh"), (2, "softmax")], 0.1, 0)?;
    net.configure(FitConfig {
        epochs: 500,
        batch_size: 4,
        ..FitConfig::default()
    })?;
    net.fit(&train)?;

    let path = "target/tmp_network.json";
    net.save_json(path)?;

    let loaded = Network::load_json(path)?;
    println!(
        "saved and loaded model: {path} (accuracy {:.2})",
        loaded.score(&train)?
    );
    Ok(())
}
