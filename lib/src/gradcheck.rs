//! Finite-difference verification of the BPTT gradients.

use itertools::Itertools;
use ndarray::{ArrayView1, ArrayView2};
use tracing::{debug, instrument};

use crate::{
  error::Result,
  model::{bptt, Param, Rnn, Weights},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ParamCheck {
  pub param: Param,
  pub max_abs_error: f64,
  /// `|analytic - numeric| / max(|analytic| + |numeric|, floor)`, worst entry.
  pub max_rel_error: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradCheckReport {
  pub checks: Vec<ParamCheck>,
}

impl GradCheckReport {
  pub fn max_abs_error(&self) -> f64 {
    self.checks.iter().map(|c| c.max_abs_error).fold(0.0, f64::max)
  }

  pub fn max_rel_error(&self) -> f64 {
    self.checks.iter().map(|c| c.max_rel_error).fold(0.0, f64::max)
  }
}

const REL_FLOOR: f64 = 1e-8;

/// Compares every analytic gradient entry against the central difference
/// `(E(w + eps) - E(w - eps)) / 2 eps`.
#[instrument(skip_all, fields(eps = eps))]
pub fn check_gradients(
  rnn: &Rnn,
  h0: ArrayView1<f64>,
  inputs: ArrayView2<f64>,
  targets: ArrayView2<f64>,
  eps: f64,
) -> Result<GradCheckReport> {
  let (_, analytic) = rnn.gradients(h0, inputs, targets)?;
  let mut probe = rnn.weights().clone();
  let error_at = |probe: &Weights| {
    let pass = bptt::forward(probe, h0, inputs);
    bptt::squared_error(pass.outputs.view(), targets)
  };

  let mut checks = Vec::with_capacity(Param::ALL.len());
  for param in Param::ALL {
    let (rows, cols) = probe.get(param).dim();
    let mut max_abs_error: f64 = 0.0;
    let mut max_rel_error: f64 = 0.0;
    for (i, j) in (0..rows).cartesian_product(0..cols) {
      let original = probe.get(param)[[i, j]];
      probe.get_mut(param)[[i, j]] = original + eps;
      let plus = error_at(&probe);
      probe.get_mut(param)[[i, j]] = original - eps;
      let minus = error_at(&probe);
      probe.get_mut(param)[[i, j]] = original;

      let numeric = (plus - minus) / (2.0 * eps);
      let exact = analytic.get(param)[[i, j]];
      let abs = (exact - numeric).abs();
      max_abs_error = max_abs_error.max(abs);
      max_rel_error = max_rel_error.max(abs / (exact.abs() + numeric.abs()).max(REL_FLOOR));
    }
    debug!(param = param.name(), max_abs_error, max_rel_error, "checked");
    checks.push(ParamCheck {
      param,
      max_abs_error,
      max_rel_error,
    });
  }
  Ok(GradCheckReport { checks })
}
