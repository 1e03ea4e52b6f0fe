use rust_mlkit::{Dataset, Perceptron};

fn main() -> rust_mlkit::Result<()> {
    env_logger::init();

    let rows = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let data = Dataset::from_rows(&rows, &[-1.0, -1.0, -1.0, 1.0])?;
    println!("{data}");

    let mut p = Perceptron::new();
    let epochs = p.fit(&data)?;
    println!("converged in {epochs} epochs, theta={:?}", p.theta());

    for row in &rows {
        println!("{row:?} -> {}", p.predict(row)?);
    }
    println!("accuracy={:.2}", p.score(&data)?);
    Ok(())
}
