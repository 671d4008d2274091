//! Forward sweep, squared error and backpropagation through time.
//!
//! Callers validate shapes first (see [`super::Rnn`]); the functions here assume
//! conformant inputs.

use ndarray::{s, ArrayView1, ArrayView2, Axis};

use super::{Gradients, Matrix, Vector, Weights};

/// Activations recorded by [`forward`], consumed by [`backward`].
#[derive(Debug, Clone)]
pub struct ForwardPass<'a> {
  pub inputs: ArrayView2<'a, f64>,
  /// `steps + 1` rows; row 0 is the initial state, row `t + 1` is `h_t`.
  pub hidden: Matrix,
  pub outputs: Matrix,
}

impl ForwardPass<'_> {
  pub fn steps(&self) -> usize {
    self.inputs.nrows()
  }

  pub fn final_hidden(&self) -> ArrayView1<'_, f64> {
    self.hidden.row(self.steps())
  }

  /// Hidden states produced by the recurrence, without the initial one.
  pub fn hidden_states(&self) -> ArrayView2<'_, f64> {
    self.hidden.slice(s![1.., ..])
  }
}

/// `h_t = tanh(x_t W_xh + h_{t-1} W_hh)`, `y_t = h_t W_hy`.
pub fn step(weights: &Weights, x_t: ArrayView1<f64>, h_prev: ArrayView1<f64>) -> (Vector, Vector) {
  let h_t = (x_t.dot(&weights.w_xh) + h_prev.dot(&weights.w_hh)).mapv_into(f64::tanh);
  let y_t = h_t.dot(&weights.w_hy);
  (h_t, y_t)
}

pub fn forward<'a>(
  weights: &Weights,
  h0: ArrayView1<f64>,
  inputs: ArrayView2<'a, f64>,
) -> ForwardPass<'a> {
  let steps = inputs.nrows();
  let mut hidden = Matrix::zeros((steps + 1, weights.hidden()));
  let mut outputs = Matrix::zeros((steps, weights.output()));
  hidden.row_mut(0).assign(&h0);
  for (t, x_t) in inputs.outer_iter().enumerate() {
    let (h_t, y_t) = step(weights, x_t, hidden.row(t));
    hidden.row_mut(t + 1).assign(&h_t);
    outputs.row_mut(t).assign(&y_t);
  }
  ForwardPass {
    inputs,
    hidden,
    outputs,
  }
}

/// Sum over all steps and output units of `(y - target)^2`.
pub fn squared_error(outputs: ArrayView2<f64>, targets: ArrayView2<f64>) -> f64 {
  (&outputs - &targets).mapv(|d| d * d).sum()
}

/// Reverse sweep over `pass`. Every parameter gradient is summed across all
/// time steps before it is returned; nothing is applied here.
pub fn backward(
  weights: &Weights,
  pass: &ForwardPass<'_>,
  targets: ArrayView2<f64>,
) -> (f64, Gradients) {
  let mut grads = Gradients::zeros_like(weights);
  let diff = &pass.outputs - &targets;
  let error = diff.mapv(|d| d * d).sum();

  let mut dh_next = Vector::zeros(weights.hidden());
  for t in (0..pass.steps()).rev() {
    let h_t = pass.hidden.row(t + 1);
    let h_prev = pass.hidden.row(t);
    let x_t = pass.inputs.row(t);

    let dy = diff.row(t).mapv(|d| 2.0 * d);
    accumulate_outer(&mut grads.w_hy, h_t, dy.view());

    let dh = dy.dot(&weights.w_hy.t()) + &dh_next;
    let dz = &dh * &h_t.mapv(|h| 1.0 - h * h);
    accumulate_outer(&mut grads.w_xh, x_t, dz.view());
    accumulate_outer(&mut grads.w_hh, h_prev, dz.view());

    dh_next = dz.dot(&weights.w_hh.t());
  }
  (error, grads)
}

/// `acc += a^T b` for row vectors `a`, `b`.
fn accumulate_outer(acc: &mut Matrix, a: ArrayView1<f64>, b: ArrayView1<f64>) {
  let col = a.insert_axis(Axis(1));
  let row = b.insert_axis(Axis(0));
  acc.scaled_add(1.0, &col.dot(&row));
}
