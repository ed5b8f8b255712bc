//! Trains a small regression model, saves it to JSON, loads it back, and
//! verifies the reloaded model predicts identically.
//!
//! Run with `cargo run --example save_load_json`.

use ffnet::{ActivationLayer, Dataset, GradientDescent, Linear, Network};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let inputs: Vec<Vec<f32>> = (0..20).map(|i| vec![i as f32 / 20.0]).collect();
    let targets: Vec<Vec<f32>> = inputs.iter().map(|x| vec![2.0 * x[0] + 1.0]).collect();
    let data = Dataset::from_rows(&inputs, &targets)?;

    let mut net = Network::new();
    net.add(Linear::new(1, 4));
    net.add(ActivationLayer::tanh());
    net.add(Linear::new(4, 1));
    net.set_seed(5);

    let mut opt = GradientDescent::new(0.05, 1000, 1e-8)?;
    let objective = net.train(&data, &mut opt)?;
    println!("final objective: {objective:.6}");

    let path = std::env::temp_dir().join("ffnet_model.json");
    net.save_json(&path)?;
    println!("saved model to {}", path.display());

    let mut loaded = Network::load_json(&path)?;
    let before = net.predict(data.inputs())?;
    let after = loaded.predict(data.inputs())?;
    assert_eq!(before, after, "reloaded model must predict identically");
    println!("round-trip verified over {} predictions", after.len());
    Ok(())
}
