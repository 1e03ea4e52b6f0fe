use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rust_mlkit::{Dataset, FitConfig, Network, NetworkState, Perceptron, Shuffle};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 2D points in the unit square labelled by `x0 + x1 > 1.0`.
fn threshold_dataset(n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Dataset::with_capacity(2, n).unwrap();
    for _ in 0..n {
        let x0: f64 = rng.gen_range(0.0..1.0);
        let x1: f64 = rng.gen_range(0.0..1.0);
        let label = if x0 + x1 > 1.0 { 1.0 } else { 0.0 };
        data.add(&[x0, x1], label).unwrap();
    }
    data
}

fn threshold_network() -> Network {
    let mut net = Network::from_layers(2, &[(4, "sigmoid"), (2, "softmax")], 0.05, 7).unwrap();
    net.configure(FitConfig {
        epochs: 1500,
        batch_size: 1,
        validation_split: 0.0,
        shuffle: Shuffle::Seeded(11),
        ..FitConfig::default()
    })
    .unwrap();
    net
}

#[test]
fn threshold_classifier_reaches_ninety_percent() {
    init_logger();
    let data = threshold_dataset(200, 1);
    let mut net = threshold_network();

    let report = net.fit(&data).unwrap();
    assert_eq!(report.epochs_run, 1500);
    assert!(!report.stopped_early);

    let acc = net.score(&data).unwrap();
    assert!(acc >= 0.9, "accuracy {acc}");

    let eval = net.evaluate(&data).unwrap();
    assert_eq!(eval.accuracy, acc);
    assert!(eval.loss.is_finite());

    let p = net.predict(&[0.95, 0.9]).unwrap();
    assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    assert!(p[1] > p[0]);
}

#[test]
fn validation_split_produces_per_epoch_metrics() {
    init_logger();
    let data = threshold_dataset(100, 2);
    let mut net = Network::from_layers(2, &[(3, "tanh"), (2, "softmax")], 0.1, 3).unwrap();
    net.loss("crossEntropy")
        .unwrap()
        .configure(FitConfig {
            epochs: 30,
            batch_size: 8,
            validation_split: 0.2,
            patience: 30,
            shuffle: Shuffle::Seeded(5),
        })
        .unwrap();

    let report = net.fit(&data).unwrap();
    assert_eq!(report.epochs.len(), report.epochs_run);
    for (i, epoch) in report.epochs.iter().enumerate() {
        assert_eq!(epoch.epoch, i);
        let acc = epoch.val_accuracy.unwrap();
        assert!((0.0..=1.0).contains(&acc));
        assert!(epoch.val_loss.unwrap().is_finite());
    }
}

#[test]
fn unshuffled_fit_uses_row_order() {
    let data = threshold_dataset(40, 3);
    let mut a = Network::from_layers(2, &[(2, "softmax")], 0.1, 0).unwrap();
    let mut b = a.clone();
    for n in [&mut a, &mut b] {
        n.configure(FitConfig {
            epochs: 5,
            batch_size: 4,
            shuffle: Shuffle::None,
            ..FitConfig::default()
        })
        .unwrap();
    }
    a.fit(&data).unwrap();
    b.fit(&data).unwrap();
    assert_eq!(a.layers()[0].weights(), b.layers()[0].weights());
}

#[test]
fn and_gate_perceptron_converges() {
    init_logger();
    let rows = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let data = Dataset::from_rows(&rows, &[-1.0, -1.0, -1.0, 1.0]).unwrap();

    let mut p = Perceptron::new();
    p.fit(&data).unwrap();
    assert_eq!(p.score(&data).unwrap(), 1.0);
}

#[test]
fn lifecycle_is_enforced() {
    let data = threshold_dataset(10, 4);
    let mut net = Network::new(2, 1, 2, 0.1, 0).unwrap();

    net.layer(3, "relu").unwrap();
    assert!(net.fit(&data).unwrap_err().is_state_error());

    net.layer(2, "softmax").unwrap();
    assert!(net.layer(2, "softmax").unwrap_err().is_state_error());
    assert!(net.predict(&[0.0, 0.0]).unwrap_err().is_state_error());
    assert!(net.score(&data).unwrap_err().is_state_error());

    net.fit(&data).unwrap();
    assert_eq!(net.state(), NetworkState::Fitted);
    assert!(net.fit(&data).unwrap_err().is_state_error());
    assert!(net.predict(&[0.0]).unwrap_err().is_argument_error());
}

#[cfg(feature = "serde")]
#[test]
fn saved_network_predicts_identically() {
    init_logger();
    let data = threshold_dataset(50, 5);
    let mut net = Network::from_layers(2, &[(5, "elu"), (3, "relu"), (2, "softmax")], 0.05, 9)
        .unwrap();
    net.configure(FitConfig {
        epochs: 10,
        batch_size: 5,
        ..FitConfig::default()
    })
    .unwrap();
    net.fit(&data).unwrap();

    let path = std::env::temp_dir().join(format!("rust_mlkit_net_{}.json", std::process::id()));
    net.save_json(&path).unwrap();
    let loaded = Network::load_json(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.state(), NetworkState::Fitted);
    assert_eq!(loaded.predict_batch(&data).unwrap(), net.predict_batch(&data).unwrap());
    assert_eq!(loaded.score(&data).unwrap(), net.score(&data).unwrap());

    let json = net.to_json_string().unwrap();
    let again = Network::from_json_str(&json).unwrap();
    assert_eq!(again.to_json_string().unwrap(), json);
}

#[cfg(feature = "serde")]
#[test]
fn saved_perceptron_predicts_identically() {
    let rows = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let data = Dataset::from_rows(&rows, &[-1.0, -1.0, -1.0, 1.0]).unwrap();
    let mut p = Perceptron::new();
    p.fit(&data).unwrap();

    let loaded = Perceptron::from_json_str(&p.to_json_string_pretty().unwrap()).unwrap();
    assert_eq!(loaded, p);
    for row in &rows {
        assert_eq!(loaded.predict(row).unwrap(), p.predict(row).unwrap());
    }
}

#[cfg(feature = "serde")]
#[test]
fn loading_missing_file_fails() {
    let err = Network::load_json("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, rust_mlkit::Error::Serialization(_)));
}
