//! End-to-end scenarios for the composition/training engine.

use ffnet::{
    ActivationLayer, Bias, ConstInit, Dataset, Dropout, GradientDescent, Inputs, Linear,
    LinearNoBias, LogSoftmax, Loss, Network, Sequential, Sgd,
};

/// A tiny deterministic 3-class dataset: class = argmax of three input sums.
fn classification_data() -> Dataset {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for i in 0..30 {
        let a = (i % 3) as f32;
        let b = ((i / 3) % 3) as f32;
        let x = vec![a * 0.3, b * 0.3, (a - b) * 0.2, 0.1];
        let class = (i % 3) as usize;
        let mut y = vec![0.0_f32; 3];
        y[class] = 1.0;
        xs.push(x);
        ys.push(y);
    }
    Dataset::from_rows(&xs, &ys).unwrap()
}

fn regression_data() -> Dataset {
    let xs: Vec<Vec<f32>> = (0..16)
        .map(|i| vec![(i as f32) / 16.0, 1.0 - (i as f32) / 16.0])
        .collect();
    let ys: Vec<Vec<f32>> = xs.iter().map(|x| vec![x[0] * 0.5 - x[1] * 0.25]).collect();
    Dataset::from_rows(&xs, &ys).unwrap()
}

#[test]
fn training_yields_a_finite_objective() {
    let mut net = Network::with_loss(Loss::NegativeLogLikelihood);
    net.add(Linear::new(4, 8));
    net.add(ActivationLayer::sigmoid());
    net.add(Dropout::new(0.1, 3).unwrap());
    net.add(Linear::new(8, 3));
    net.add(LogSoftmax::new());
    net.set_seed(42);

    let data = classification_data();
    // One epoch worth of mini-batch steps.
    let mut opt = Sgd::new(0.01, 8, 1, 0.9, 0.0).unwrap();
    let objective = net.train(&data, &mut opt).unwrap();
    assert!(objective.is_finite(), "objective {objective}");
}

#[test]
fn shape_mismatch_fails_before_optimization() {
    let data = classification_data(); // input_dim == 4
    let mut net = Network::with_loss(Loss::NegativeLogLikelihood);
    net.add(Linear::new(1, 8)); // deliberately expects 4 - 3 inputs
    net.add(ActivationLayer::sigmoid());
    net.add(Linear::new(8, 3));
    net.add(LogSoftmax::new());

    let mut opt = GradientDescent::new(0.01, 10, 0.0).unwrap();
    let err = net.train(&data, &mut opt).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains('1') && msg.contains('4'), "got: {msg}");
    // Nothing was initialized: the failure happened before any iteration.
    assert!(net.parameters().is_empty());
}

#[test]
fn interior_mismatch_fails_before_optimization() {
    let data = regression_data(); // input_dim == 2
    let mut net = Network::new();
    net.add(Linear::new(2, 8));
    net.add(ActivationLayer::tanh());
    net.add(Linear::new(7, 1)); // expects 7, receives 8

    let mut opt = GradientDescent::new(0.01, 10, 0.0).unwrap();
    let err = net.train(&data, &mut opt).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains('7') && msg.contains('8'), "got: {msg}");
    assert!(net.parameters().is_empty());
}

#[test]
fn predictions_are_deterministic_with_dropout() {
    let mut net = Network::new();
    net.add(Linear::new(2, 16));
    net.add(ActivationLayer::tanh());
    net.add(Dropout::new(0.4, 11).unwrap());
    net.add(Linear::new(16, 1));
    net.set_seed(7);

    let data = regression_data();
    let mut opt = GradientDescent::new(0.01, 20, 0.0).unwrap();
    net.train(&data, &mut opt).unwrap();

    // Inference mode must bypass the stochastic layer entirely.
    let first = net.predict(data.inputs()).unwrap();
    let second = net.predict(data.inputs()).unwrap();
    assert_eq!(first, second);

    // Predict must not leave the network stuck in inference mode.
    assert!(net.is_training());
    let after_more_training = net.train(&data, &mut opt).unwrap();
    assert!(after_more_training.is_finite());
}

#[test]
fn clones_train_independently() {
    let mut a = Network::new();
    a.add(Linear::new(2, 4));
    a.add(ActivationLayer::tanh());
    a.add(Linear::new(4, 1));
    a.set_seed(1);
    a.reset_parameters();

    let data = regression_data();
    let b = a.clone();
    let baseline = b.clone().predict(data.inputs()).unwrap();

    // Training `a` must not disturb `b`.
    let mut opt = GradientDescent::new(0.05, 50, 0.0).unwrap();
    a.train(&data, &mut opt).unwrap();

    let untouched = b.clone().predict(data.inputs()).unwrap();
    assert_eq!(baseline, untouched);

    let trained = a.predict(data.inputs()).unwrap();
    assert_ne!(trained, baseline);
}

#[test]
fn moved_networks_predict_identically() {
    let mut net = Network::new();
    net.add(Linear::new(2, 4));
    net.add(ActivationLayer::tanh());
    net.add(Linear::new(4, 1));
    net.set_seed(9);

    let data = regression_data();
    let mut opt = GradientDescent::new(0.05, 30, 0.0).unwrap();
    net.train(&data, &mut opt).unwrap();
    let before = net.predict(data.inputs()).unwrap();

    let mut moved = net;
    let after = moved.predict(data.inputs()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn partial_forward_composes_across_any_split() {
    let mut net = Network::new();
    net.add(Linear::new(3, 5));
    net.add(ActivationLayer::tanh());
    net.add(Bias::new(5));
    net.add(Linear::new(5, 2));
    net.set_seed(4);
    net.reset_parameters();

    let input = [0.2_f32, -0.8, 0.5];
    let mut full = Vec::new();
    net.forward_range(&input, &mut full, 0, 3).unwrap();

    for split in 0..3 {
        let mut head = Vec::new();
        net.forward_range(&input, &mut head, 0, split).unwrap();
        let mut tail = Vec::new();
        net.forward_range(&head, &mut tail, split + 1, 3).unwrap();
        assert_eq!(full, tail, "split after layer {split}");
    }
}

#[test]
fn composite_layers_nest_and_train() {
    let mut inner = Sequential::new();
    inner.push(Linear::new(4, 4));
    inner.push(ActivationLayer::tanh());

    let mut net = Network::with_loss(Loss::NegativeLogLikelihood);
    net.add(Linear::new(4, 4));
    net.add(inner);
    net.add(Linear::new(4, 3));
    net.add(LogSoftmax::new());
    net.set_seed(2);

    let expected = (4 * 4 + 4) + (4 * 4 + 4) + (4 * 3 + 3);
    assert_eq!(net.parameter_count(), expected);

    let data = classification_data();
    let mut opt = GradientDescent::new(0.05, 40, 0.0).unwrap();
    let objective = net.train(&data, &mut opt).unwrap();
    assert!(objective.is_finite());
}

#[test]
fn fixed_weights_produce_the_expected_sum() {
    // One linear layer mapping 10 -> 1 with all-ones weights and zero bias:
    // an all-ones input must produce exactly 10, every invocation.
    let mut net = Network::new();
    net.add(LinearNoBias::new(10, 1));
    net.set_init(ConstInit::new(1.0));
    net.reset_parameters();

    let inputs = Inputs::from_rows(&[vec![1.0_f32; 10]]).unwrap();
    for _ in 0..3 {
        let preds = net.predict(&inputs).unwrap();
        assert_eq!(preds, vec![10.0]);
    }
}

#[cfg(feature = "serde")]
#[test]
fn trained_models_round_trip_through_json() {
    let mut net = Network::new();
    net.add(Linear::new(2, 6));
    net.add(ActivationLayer::tanh());
    net.add(Linear::new(6, 1));
    net.set_seed(13);

    let data = regression_data();
    let mut opt = GradientDescent::new(0.05, 60, 0.0).unwrap();
    net.train(&data, &mut opt).unwrap();
    let before = net.predict(data.inputs()).unwrap();

    let json = net.to_json_string_pretty().unwrap();
    let mut loaded = Network::from_json_str(&json).unwrap();
    let after = loaded.predict(data.inputs()).unwrap();
    assert_eq!(before, after);
}
