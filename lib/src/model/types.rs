use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{check_dimension, Error, Result};

pub type Matrix = Array2<f64>;
pub type Vector = Array1<f64>;

/// Weights start uniformly distributed in `[-INIT_RANGE, INIT_RANGE]`.
pub const INIT_RANGE: f64 = 0.01;

/// The three shared parameters of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
  /// hidden -> hidden, shape (hidden, hidden)
  Hh,
  /// input -> hidden, shape (input, hidden)
  Xh,
  /// hidden -> output, shape (hidden, output)
  Hy,
}

impl Param {
  pub const ALL: [Param; 3] = [Param::Hh, Param::Xh, Param::Hy];

  /// Key under which the matrix is stored in a parameter archive.
  pub fn name(self) -> &'static str {
    match self {
      Param::Hh => "W_hh",
      Param::Xh => "W_xh",
      Param::Hy => "W_hy",
    }
  }
}

/// Parameter matrices. Serialises as a named archive keyed by `W_hh`, `W_xh`, `W_hy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Weights {
  #[serde(rename = "W_hh")]
  pub w_hh: Matrix,
  #[serde(rename = "W_xh")]
  pub w_xh: Matrix,
  #[serde(rename = "W_hy")]
  pub w_hy: Matrix,
}

impl Weights {
  pub fn hidden(&self) -> usize {
    self.w_hh.nrows()
  }

  pub fn input(&self) -> usize {
    self.w_xh.nrows()
  }

  pub fn output(&self) -> usize {
    self.w_hy.ncols()
  }

  pub fn get(&self, param: Param) -> &Matrix {
    match param {
      Param::Hh => &self.w_hh,
      Param::Xh => &self.w_xh,
      Param::Hy => &self.w_hy,
    }
  }

  pub fn get_mut(&mut self, param: Param) -> &mut Matrix {
    match param {
      Param::Hh => &mut self.w_hh,
      Param::Xh => &mut self.w_xh,
      Param::Hy => &mut self.w_hy,
    }
  }

  /// Checks every axis is non-empty and the three matrices agree on the hidden size.
  pub fn validate(&self) -> Result<()> {
    check_dimension("hidden", self.hidden())?;
    check_dimension("input", self.input())?;
    check_dimension("output", self.output())?;
    let hidden = self.hidden();
    if self.w_hh.dim() != (hidden, hidden) {
      return Err(Error::shape("W_hh", (hidden, hidden), self.w_hh.dim()));
    }
    if self.w_xh.ncols() != hidden {
      return Err(Error::shape("W_xh", (self.input(), hidden), self.w_xh.dim()));
    }
    if self.w_hy.nrows() != hidden {
      return Err(Error::shape("W_hy", (hidden, self.output()), self.w_hy.dim()));
    }
    Ok(())
  }
}

/// Gradients of the sequence error, accumulated over every time step.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
  pub w_hh: Matrix,
  pub w_xh: Matrix,
  pub w_hy: Matrix,
}

impl Gradients {
  pub fn zeros_like(weights: &Weights) -> Self {
    Gradients {
      w_hh: Matrix::zeros(weights.w_hh.raw_dim()),
      w_xh: Matrix::zeros(weights.w_xh.raw_dim()),
      w_hy: Matrix::zeros(weights.w_hy.raw_dim()),
    }
  }

  pub fn get(&self, param: Param) -> &Matrix {
    match param {
      Param::Hh => &self.w_hh,
      Param::Xh => &self.w_xh,
      Param::Hy => &self.w_hy,
    }
  }
}

/// Result of one training call.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOutput {
  /// Summed squared error of the sequence, measured before the update.
  pub error: f64,
  /// One row of outputs per time step.
  pub outputs: Matrix,
  /// Hidden state after the last step; equals `h0` for an empty sequence.
  pub final_hidden: Vector,
}
