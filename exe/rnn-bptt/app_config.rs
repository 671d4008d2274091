use std::{error::Error, path::{Path, PathBuf}};

use rnn::training::TrainParams;
use serde::Deserialize;

/// Training configuration. Also defines the config file format (every field can be omitted).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
  /// Sequence file; the synthetic echo task is used when absent
  pub data: Option<PathBuf>,
  /// Where to write the trained parameters
  pub output: Option<PathBuf>,
  pub hidden: Option<usize>,
  pub inputs: Option<usize>,
  pub outputs: Option<usize>,
  pub epochs: Option<usize>,
  pub learning_rate: Option<f64>,
  pub seed: Option<u64>,
  pub carry_hidden: Option<bool>,
  /// Size of the synthetic task
  pub sequences: Option<usize>,
  pub steps: Option<usize>,
}

impl AppConfig {
  pub fn from_file(path: &Path) -> Result<Self, Box<dyn Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
  }

  // merge configs where the second overwrites the first
  pub fn merge(self, other: Self) -> Self {
    Self {
      data: other.data.or(self.data),
      output: other.output.or(self.output),
      hidden: other.hidden.or(self.hidden),
      inputs: other.inputs.or(self.inputs),
      outputs: other.outputs.or(self.outputs),
      epochs: other.epochs.or(self.epochs),
      learning_rate: other.learning_rate.or(self.learning_rate),
      seed: other.seed.or(self.seed),
      carry_hidden: other.carry_hidden.or(self.carry_hidden),
      sequences: other.sequences.or(self.sequences),
      steps: other.steps.or(self.steps),
    }
  }

  pub fn resolve(self) -> Settings {
    let defaults = TrainParams::default();
    Settings {
      data: self.data,
      output: self.output,
      hidden: self.hidden.unwrap_or(16),
      inputs: self.inputs.unwrap_or(2),
      outputs: self.outputs.unwrap_or(1),
      seed: self.seed.unwrap_or(1),
      sequences: self.sequences.unwrap_or(64),
      steps: self.steps.unwrap_or(10),
      train: TrainParams {
        epochs: self.epochs.unwrap_or(defaults.epochs),
        learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
        carry_hidden: self.carry_hidden.unwrap_or(defaults.carry_hidden),
      },
    }
  }
}

/// Fully resolved configuration.
pub struct Settings {
  pub data: Option<PathBuf>,
  pub output: Option<PathBuf>,
  pub hidden: usize,
  pub inputs: usize,
  pub outputs: usize,
  pub seed: u64,
  pub sequences: usize,
  pub steps: usize,
  pub train: TrainParams,
}

/// Target width of the synthetic delayed-echo task.
pub const ECHO_OUTPUTS: usize = 1;

impl Settings {
  /// Output units of the network. Without a data file the echo task fixes this
  /// at [`ECHO_OUTPUTS`], and any other configured value is an error.
  pub fn output_units(&self) -> Result<usize, Box<dyn Error>> {
    if self.data.is_none() && self.outputs != ECHO_OUTPUTS {
      return Err(
        format!(
          "outputs = {} but the synthetic echo task has {ECHO_OUTPUTS} target column; \
           pass a data file or drop the outputs setting",
          self.outputs
        )
        .into(),
      );
    }
    Ok(self.outputs)
  }
}
