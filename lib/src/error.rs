use std::{fmt::Debug, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("invalid dimension: {name} must be a positive integer, got {value}")]
  InvalidDimension { name: &'static str, value: usize },
  #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
  ShapeMismatch {
    context: &'static str,
    expected: String,
    actual: String,
  },
  #[error("io error on {path:?}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("{param}[{row}, {col}] is not finite, refusing to write it")]
  NonFinite {
    param: &'static str,
    row: usize,
    col: usize,
  },
  #[error("archive error: {0}")]
  Json(#[from] serde_json::Error),
  #[error("line {line}: {reason}")]
  Parse { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
  pub fn shape(context: &'static str, expected: impl Debug, actual: impl Debug) -> Self {
    Error::ShapeMismatch {
      context,
      expected: format!("{expected:?}"),
      actual: format!("{actual:?}"),
    }
  }

  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Error::Io {
      path: path.into(),
      source,
    }
  }
}

/// Unit counts of the network must be strictly positive.
pub fn check_dimension(name: &'static str, value: usize) -> Result<()> {
  if value == 0 {
    return Err(Error::InvalidDimension { name, value });
  }
  Ok(())
}
