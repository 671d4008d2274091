//! Parameter archive: one JSON object with the entries `W_hh`, `W_xh` and `W_hy`,
//! each an ndarray `{ "v": 1, "dim": [rows, cols], "data": [...] }`.
//! Floats are written in shortest round-trip form and parsed exactly, so a
//! save followed by a load reproduces every matrix bit for bit. JSON has no
//! NaN or infinity, so weights holding one are refused before anything is written.

use std::path::Path;

use tracing::info;

use crate::{
  error::{Error, Result},
  model::{Param, Weights},
  utils::{deserialize_from_file, serialize_to_file},
};

#[tracing::instrument(skip(weights))]
pub fn save_weights(path: &Path, weights: &Weights) -> Result<()> {
  check_finite(weights)?;
  serialize_to_file(path, weights)?;
  info!(
    hidden = weights.hidden(),
    input = weights.input(),
    output = weights.output(),
    "saved parameters"
  );
  Ok(())
}

/// Reads an archive written by [`save_weights`] and checks the matrices conform.
#[tracing::instrument]
pub fn load_weights(path: &Path) -> Result<Weights> {
  let weights: Weights = deserialize_from_file(path)?;
  weights.validate()?;
  Ok(weights)
}

fn check_finite(weights: &Weights) -> Result<()> {
  for param in Param::ALL {
    let bad = weights.get(param).indexed_iter().find(|(_, v)| !v.is_finite());
    if let Some(((row, col), _)) = bad {
      return Err(Error::NonFinite {
        param: param.name(),
        row,
        col,
      });
    }
  }
  Ok(())
}
