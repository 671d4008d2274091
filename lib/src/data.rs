use std::path::Path;

use itertools::Itertools;
use ndarray::Array1;
use rand::{distributions::Uniform, Rng};

use crate::{
  error::{check_dimension, Error, Result},
  model::{Matrix, Vector},
};

/// An input sequence and the targets aligned with it, one row per time step.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
  pub inputs: Matrix,
  pub targets: Matrix,
}

impl Sequence {
  pub fn new(inputs: Matrix, targets: Matrix) -> Result<Self> {
    if inputs.nrows() != targets.nrows() {
      return Err(Error::shape(
        "sequence length",
        inputs.nrows(),
        targets.nrows(),
      ));
    }
    Ok(Sequence { inputs, targets })
  }

  pub fn len(&self) -> usize {
    self.inputs.nrows()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Zero initial hidden state for a network with `hidden` units.
  pub fn zero_state(hidden: usize) -> Vector {
    Array1::zeros(hidden)
  }
}

/// Parses a sequence file.
///
/// One time step per line: `input` feature values followed by `output` target
/// values, whitespace separated. Blank lines end a sequence, lines starting with
/// `#` are ignored.
pub fn parse_sequences(content: &str, input: usize, output: usize) -> Result<Vec<Sequence>> {
  check_dimension("input", input)?;
  check_dimension("output", output)?;
  let width = input + output;

  let mut sequences = Vec::new();
  let mut rows: Vec<Vec<f64>> = Vec::new();
  for (idx, line) in content.lines().enumerate() {
    let line = line.trim();
    if line.starts_with('#') {
      continue;
    }
    if line.is_empty() {
      if !rows.is_empty() {
        sequences.push(rows_to_sequence(&rows, input, output));
        rows.clear();
      }
      continue;
    }
    let values = line
      .split_whitespace()
      .map(|v| {
        v.parse::<f64>().map_err(|e| Error::Parse {
          line: idx + 1,
          reason: format!("{v:?}: {e}"),
        })
      })
      .collect::<Result<Vec<f64>>>()?;
    if values.len() != width {
      return Err(Error::Parse {
        line: idx + 1,
        reason: format!("expected {width} values, found {}", values.len()),
      });
    }
    rows.push(values);
  }
  if !rows.is_empty() {
    sequences.push(rows_to_sequence(&rows, input, output));
  }
  Ok(sequences)
}

fn rows_to_sequence(rows: &[Vec<f64>], input: usize, output: usize) -> Sequence {
  let inputs = Matrix::from_shape_fn((rows.len(), input), |(t, j)| rows[t][j]);
  let targets = Matrix::from_shape_fn((rows.len(), output), |(t, k)| rows[t][input + k]);
  Sequence { inputs, targets }
}

pub fn read_sequences(path: &Path, input: usize, output: usize) -> Result<Vec<Sequence>> {
  let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
  parse_sequences(&content, input, output)
}

/// Splits off the first `ratio` of the sequences for training; the rest is held out.
pub fn split_sequences(data: Vec<Sequence>, ratio: f64) -> (Vec<Sequence>, Vec<Sequence>) {
  let splitting_point = ((data.len() as f64 * ratio) as usize).min(data.len());
  let mut train = data;
  let held_out = train.split_off(splitting_point);
  (train, held_out)
}

/// Synthetic delayed-echo task: the single target at step `t` is the first
/// input feature at step `t - 1` (zero at the first step). Inputs are uniform
/// in `[-1, 1]`.
pub fn delayed_echo<R: Rng + ?Sized>(
  rng: &mut R,
  count: usize,
  steps: usize,
  input: usize,
) -> Result<Vec<Sequence>> {
  check_dimension("input", input)?;
  let dist = Uniform::new_inclusive(-1.0, 1.0);
  let sequences = (0..count)
    .map(|_| {
      let inputs = Matrix::from_shape_simple_fn((steps, input), || rng.sample(&dist));
      let targets = Matrix::from_shape_fn((steps, 1), |(t, _)| {
        if t == 0 {
          0.0
        } else {
          inputs[[t - 1, 0]]
        }
      });
      Sequence { inputs, targets }
    })
    .collect_vec();
  Ok(sequences)
}
