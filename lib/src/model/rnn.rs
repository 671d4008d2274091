use std::path::Path;

use ndarray::{ArrayView1, ArrayView2};
use rand::{distributions::Uniform, Rng};
use tracing::{debug, instrument};

use super::{bptt, ForwardPass, Gradients, Matrix, TrainOutput, Vector, Weights, INIT_RANGE};
use crate::error::{check_dimension, Error, Result};

/// Vanilla recurrent network: tanh hidden layer, linear readout, squared error.
///
/// The model owns its three weight matrices. Hidden state is never stored
/// between calls; every call is given its own initial state.
#[derive(Debug, Clone, PartialEq)]
pub struct Rnn {
  weights: Weights,
}

impl Rnn {
  /// New network with weights drawn uniformly from `[-0.01, 0.01]`.
  pub fn new(hidden: usize, input: usize, output: usize) -> Result<Self> {
    Self::with_rng(hidden, input, output, &mut rand::thread_rng())
  }

  pub fn with_rng<R: Rng + ?Sized>(
    hidden: usize,
    input: usize,
    output: usize,
    rng: &mut R,
  ) -> Result<Self> {
    check_dimension("hidden", hidden)?;
    check_dimension("input", input)?;
    check_dimension("output", output)?;
    let weights = Weights {
      w_hh: uniform_matrix(hidden, hidden, rng),
      w_xh: uniform_matrix(input, hidden, rng),
      w_hy: uniform_matrix(hidden, output, rng),
    };
    Ok(Rnn { weights })
  }

  pub fn from_weights(weights: Weights) -> Result<Self> {
    weights.validate()?;
    Ok(Rnn { weights })
  }

  pub fn weights(&self) -> &Weights {
    &self.weights
  }

  pub fn into_weights(self) -> Weights {
    self.weights
  }

  pub fn hidden_units(&self) -> usize {
    self.weights.hidden()
  }

  pub fn input_units(&self) -> usize {
    self.weights.input()
  }

  pub fn output_units(&self) -> usize {
    self.weights.output()
  }

  /// One application of the recurrence. Does not touch the weights.
  pub fn step(&self, x_t: ArrayView1<f64>, h_prev: ArrayView1<f64>) -> Result<(Vector, Vector)> {
    self.check_hidden(h_prev)?;
    if x_t.len() != self.input_units() {
      return Err(Error::shape("input vector", [self.input_units()], [x_t.len()]));
    }
    Ok(bptt::step(&self.weights, x_t, h_prev))
  }

  /// Runs the recurrence over the whole sequence, keeping every activation.
  pub fn forward<'a>(
    &self,
    h0: ArrayView1<f64>,
    inputs: ArrayView2<'a, f64>,
  ) -> Result<ForwardPass<'a>> {
    self.check_hidden(h0)?;
    self.check_inputs(inputs)?;
    Ok(bptt::forward(&self.weights, h0, inputs))
  }

  pub fn loss(
    &self,
    h0: ArrayView1<f64>,
    inputs: ArrayView2<f64>,
    targets: ArrayView2<f64>,
  ) -> Result<f64> {
    self.check_targets(inputs, targets)?;
    let pass = self.forward(h0, inputs)?;
    Ok(bptt::squared_error(pass.outputs.view(), targets))
  }

  /// Error of the sequence and its gradient with respect to every weight matrix.
  pub fn gradients(
    &self,
    h0: ArrayView1<f64>,
    inputs: ArrayView2<f64>,
    targets: ArrayView2<f64>,
  ) -> Result<(f64, Gradients)> {
    self.check_targets(inputs, targets)?;
    let pass = self.forward(h0, inputs)?;
    Ok(bptt::backward(&self.weights, &pass, targets))
  }

  /// One step of gradient descent on a single sequence.
  ///
  /// All shape checks and the full backward sweep finish before any matrix is
  /// written, so a failed call leaves the weights unchanged.
  #[instrument(skip_all, fields(steps = inputs.nrows(), lr = learning_rate))]
  pub fn train(
    &mut self,
    h0: ArrayView1<f64>,
    inputs: ArrayView2<f64>,
    targets: ArrayView2<f64>,
    learning_rate: f64,
  ) -> Result<TrainOutput> {
    self.check_targets(inputs, targets)?;
    let pass = self.forward(h0, inputs)?;
    let (error, grads) = bptt::backward(&self.weights, &pass, targets);
    let ForwardPass {
      hidden, outputs, ..
    } = pass;
    let final_hidden = hidden.row(hidden.nrows() - 1).to_owned();
    self.apply(&grads, learning_rate);
    debug!(error, "sequence trained");
    Ok(TrainOutput {
      error,
      outputs,
      final_hidden,
    })
  }

  /// `W <- W - lr * grad(W)` for all three matrices.
  pub fn apply(&mut self, grads: &Gradients, learning_rate: f64) {
    self.weights.w_hh.scaled_add(-learning_rate, &grads.w_hh);
    self.weights.w_xh.scaled_add(-learning_rate, &grads.w_xh);
    self.weights.w_hy.scaled_add(-learning_rate, &grads.w_hy);
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    crate::persist::save_weights(path.as_ref(), &self.weights)
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let weights = crate::persist::load_weights(path.as_ref())?;
    Ok(Rnn { weights })
  }

  fn check_hidden(&self, h: ArrayView1<f64>) -> Result<()> {
    if h.len() != self.hidden_units() {
      return Err(Error::shape("initial hidden state", [self.hidden_units()], [h.len()]));
    }
    Ok(())
  }

  fn check_inputs(&self, inputs: ArrayView2<f64>) -> Result<()> {
    if inputs.ncols() != self.input_units() {
      return Err(Error::shape(
        "input sequence",
        (inputs.nrows(), self.input_units()),
        inputs.dim(),
      ));
    }
    Ok(())
  }

  fn check_targets(&self, inputs: ArrayView2<f64>, targets: ArrayView2<f64>) -> Result<()> {
    let expected = (inputs.nrows(), self.output_units());
    if targets.dim() != expected {
      return Err(Error::shape("target sequence", expected, targets.dim()));
    }
    Ok(())
  }
}

fn uniform_matrix<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
  let dist = Uniform::new_inclusive(-INIT_RANGE, INIT_RANGE);
  Matrix::from_shape_simple_fn((rows, cols), || rng.sample(&dist))
}

#[cfg(test)]
mod tests {
  use ndarray::{array, Array1, Array2};
  use proptest::prelude::*;
  use rand::{rngs::StdRng, SeedableRng};

  use super::*;

  fn toy_sequence() -> (Array1<f64>, Array2<f64>, Array2<f64>) {
    let h0 = Array1::<f64>::zeros(3);
    let x = array![
      [0.5, -1.0],
      [1.0, 0.25],
      [-0.5, 0.75],
      [0.0, 1.0],
      [1.0, -1.0]
    ];
    // 0.5 * x0 - 0.5 * x1
    let t = array![[0.75], [0.375], [-0.625], [-0.5], [1.0]];
    (h0, x, t)
  }

  proptest! {
    #[test]
    fn construction_shapes_and_range(hidden in 1usize..12, input in 1usize..12, output in 1usize..12, seed in any::<u64>()) {
      let scope = crate::utils::init_logging_tests();
      let rnn = Rnn::with_rng(hidden, input, output, &mut StdRng::seed_from_u64(seed)).unwrap();
      let w = rnn.weights();
      prop_assert_eq!(w.w_hh.dim(), (hidden, hidden));
      prop_assert_eq!(w.w_xh.dim(), (input, hidden));
      prop_assert_eq!(w.w_hy.dim(), (hidden, output));
      for m in [&w.w_hh, &w.w_xh, &w.w_hy] {
        prop_assert!(m.iter().all(|v| (-INIT_RANGE..=INIT_RANGE).contains(v)));
      }
      drop(scope);
    }
  }

  #[test]
  fn zero_dimensions_fail() {
    for (h, i, o, name) in [(0, 2, 1, "hidden"), (3, 0, 1, "input"), (3, 2, 0, "output")] {
      match Rnn::new(h, i, o) {
        Err(Error::InvalidDimension { name: got, value: 0 }) => assert_eq!(got, name),
        other => panic!("expected InvalidDimension for {name}, got {other:?}"),
      }
    }
  }

  #[test]
  fn same_seed_same_weights() {
    let a = Rnn::with_rng(4, 3, 2, &mut StdRng::seed_from_u64(7)).unwrap();
    let b = Rnn::with_rng(4, 3, 2, &mut StdRng::seed_from_u64(7)).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn single_step_matches_formula() {
    let rnn = Rnn::with_rng(3, 2, 2, &mut StdRng::seed_from_u64(3)).unwrap();
    let w = rnn.weights();
    let h0 = array![0.1, -0.2, 0.3];
    let x = array![[0.7, -0.4]];
    let target = Array2::<f64>::zeros((1, 2));

    let pass = rnn.forward(h0.view(), x.view()).unwrap();

    let mut h1 = [0.0; 3];
    for (j, h1_j) in h1.iter_mut().enumerate() {
      let mut z = 0.0;
      for i in 0..2 {
        z += x[[0, i]] * w.w_xh[[i, j]];
      }
      for i in 0..3 {
        z += h0[i] * w.w_hh[[i, j]];
      }
      *h1_j = z.tanh();
    }
    for j in 0..3 {
      assert!((pass.hidden[[1, j]] - h1[j]).abs() < 1e-12);
    }
    let mut error = 0.0;
    for k in 0..2 {
      let y: f64 = (0..3).map(|j| h1[j] * w.w_hy[[j, k]]).sum();
      assert!((pass.outputs[[0, k]] - y).abs() < 1e-12);
      error += y * y;
    }
    let loss = rnn.loss(h0.view(), x.view(), target.view()).unwrap();
    assert!((loss - error).abs() < 1e-12);

    let (h_step, y_step) = rnn.step(x.row(0), h0.view()).unwrap();
    assert_eq!(h_step, pass.hidden.row(1));
    assert_eq!(y_step, pass.outputs.row(0));
  }

  #[test]
  fn step_rejects_wrong_lengths() {
    let rnn = Rnn::with_rng(3, 2, 1, &mut StdRng::seed_from_u64(8)).unwrap();
    let h = Array1::<f64>::zeros(3);
    let x = Array1::<f64>::zeros(2);

    match rnn.step(Array1::<f64>::zeros(4).view(), h.view()) {
      Err(Error::ShapeMismatch { context, .. }) => assert_eq!(context, "input vector"),
      other => panic!("expected ShapeMismatch, got {other:?}"),
    }
    match rnn.step(x.view(), Array1::<f64>::zeros(2).view()) {
      Err(Error::ShapeMismatch { context, .. }) => assert_eq!(context, "initial hidden state"),
      other => panic!("expected ShapeMismatch, got {other:?}"),
    }
    assert!(rnn.step(x.view(), h.view()).is_ok());
  }

  #[test]
  fn empty_sequence_is_a_no_op() {
    let mut rnn = Rnn::with_rng(3, 2, 1, &mut StdRng::seed_from_u64(11)).unwrap();
    let before = rnn.clone();
    let h0 = array![0.1, 0.2, 0.3];
    let out = rnn
      .train(
        h0.view(),
        Array2::<f64>::zeros((0, 2)).view(),
        Array2::<f64>::zeros((0, 1)).view(),
        0.5,
      )
      .unwrap();
    assert_eq!(out.error, 0.0);
    assert_eq!(out.outputs.dim(), (0, 1));
    assert_eq!(out.final_hidden, h0);
    assert_eq!(rnn, before);
  }

  #[test]
  fn one_training_call_reduces_error() {
    let mut rnn = Rnn::with_rng(3, 2, 1, &mut StdRng::seed_from_u64(42)).unwrap();
    let (h0, x, t) = toy_sequence();
    let before = rnn.loss(h0.view(), x.view(), t.view()).unwrap();
    let out = rnn.train(h0.view(), x.view(), t.view(), 0.01).unwrap();
    let after = rnn.loss(h0.view(), x.view(), t.view()).unwrap();
    assert_eq!(out.error, before);
    assert!(after <= before, "{after} > {before}");
  }

  #[test]
  fn repeated_training_converges_on_toy_sequence() {
    let mut rnn = Rnn::with_rng(3, 2, 1, &mut StdRng::seed_from_u64(42)).unwrap();
    let (h0, x, t) = toy_sequence();
    let first = rnn.train(h0.view(), x.view(), t.view(), 0.01).unwrap().error;
    let mut last = first;
    for _ in 0..500 {
      last = rnn.train(h0.view(), x.view(), t.view(), 0.01).unwrap().error;
    }
    assert!(last < first * 0.5, "{last} vs {first}");
  }

  #[test]
  fn train_applies_the_accumulated_gradient() {
    let mut rnn = Rnn::with_rng(3, 2, 1, &mut StdRng::seed_from_u64(5)).unwrap();
    let (h0, x, t) = toy_sequence();
    let (_, grads) = rnn.gradients(h0.view(), x.view(), t.view()).unwrap();
    let before = rnn.weights().clone();
    rnn.train(h0.view(), x.view(), t.view(), 0.1).unwrap();
    let expected = &before.w_hh - &(&grads.w_hh * 0.1);
    for (a, b) in rnn.weights().w_hh.iter().zip(expected.iter()) {
      assert!((a - b).abs() < 1e-15);
    }
  }

  #[test]
  fn shape_errors_leave_weights_untouched() {
    let mut rnn = Rnn::with_rng(3, 2, 1, &mut StdRng::seed_from_u64(9)).unwrap();
    let before = rnn.clone();
    let (h0, x, t) = toy_sequence();

    let short_target = t.slice(ndarray::s![..4, ..]).to_owned();
    let bad_h0 = Array1::<f64>::zeros(4);
    let wide_x = Array2::<f64>::zeros((5, 3));
    let wide_t = Array2::<f64>::zeros((5, 2));

    let cases = [
      rnn.clone().train(h0.view(), x.view(), short_target.view(), 0.1),
      rnn.clone().train(bad_h0.view(), x.view(), t.view(), 0.1),
      rnn.clone().train(h0.view(), wide_x.view(), t.view(), 0.1),
      rnn.clone().train(h0.view(), x.view(), wide_t.view(), 0.1),
    ];
    for case in cases {
      assert!(matches!(case, Err(Error::ShapeMismatch { .. })), "{case:?}");
    }
    assert!(rnn.train(bad_h0.view(), x.view(), t.view(), 0.1).is_err());
    assert_eq!(rnn, before);
  }
}
