//! Trains a tiny network on XOR and prints its predictions.
//!
//! Run with `cargo run --example xor`.

use ffnet::{ActivationLayer, Dataset, GradientDescent, Linear, Network};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let inputs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let targets = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
    let data = Dataset::from_rows(&inputs, &targets)?;

    let mut net = Network::new();
    net.add(Linear::new(2, 8));
    net.add(ActivationLayer::tanh());
    net.add(Linear::new(8, 1));
    net.set_seed(17);

    let mut opt = GradientDescent::new(0.1, 2000, 1e-7)?;
    let objective = net.train(&data, &mut opt)?;
    println!("final objective: {objective:.6}");

    let preds = net.predict(data.inputs())?;
    for (row, pred) in inputs.iter().zip(&preds) {
        println!("{row:?} -> {pred:.3}");
    }
    Ok(())
}
