mod app_config;

use app_config::AppConfig;
use clap::{Parser, Subcommand};
use ndarray::Array1;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rnn::{data, gradcheck, training, utils, Param, Rnn};
use std::{error::Error, path::PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Train the network on a sequence file, or on a synthetic echo task
  Train {
    /// YAML configuration; command line values override it
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Sequence file: one time step per line, blank line between sequences
    #[arg(short, long, value_name = "PATH")]
    data: Option<PathBuf>,
    #[arg(long, value_name = "INT")]
    hidden: Option<usize>,
    #[arg(long, value_name = "INT")]
    inputs: Option<usize>,
    #[arg(long, value_name = "INT")]
    outputs: Option<usize>,
    #[arg(short, long, value_name = "INT")]
    epochs: Option<usize>,
    #[arg(long, value_name = "FLOAT")]
    lr: Option<f64>,
    #[arg(long, value_name = "INT")]
    seed: Option<u64>,
    /// Carry the final hidden state of each sequence into the next one.
    /// `--carry-hidden false` turns off a `carry_hidden: true` from the config
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    carry_hidden: Option<bool>,
    /// Write the trained parameters here
    #[arg(short, long, value_name = "PATH")]
    out: Option<PathBuf>,
  },
  /// Compare BPTT gradients with finite differences on a random sequence
  Gradcheck {
    #[arg(long, default_value_t = 4)]
    hidden: usize,
    #[arg(long, default_value_t = 6)]
    steps: usize,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    #[arg(long, default_value_t = 1e-5)]
    eps: f64,
  },
  /// Load a parameter archive and report its shapes
  Inspect {
    #[arg(short, long, value_name = "PATH")]
    weights: PathBuf,
  },
}

fn main() -> Result<(), Box<dyn Error>> {
  utils::init_logging()?;
  let args = Cli::parse();

  match args.command {
    Command::Train {
      config,
      data,
      hidden,
      inputs,
      outputs,
      epochs,
      lr,
      seed,
      carry_hidden,
      out,
    } => {
      let base = match config {
        Some(path) => AppConfig::from_file(&path)?,
        None => AppConfig::default(),
      };
      let settings = base
        .merge(AppConfig {
          data,
          output: out,
          hidden,
          inputs,
          outputs,
          epochs,
          learning_rate: lr,
          seed,
          carry_hidden,
          ..AppConfig::default()
        })
        .resolve();
      train(settings)?;
    }
    Command::Gradcheck {
      hidden,
      steps,
      seed,
      eps,
    } => {
      let mut rng = StdRng::seed_from_u64(seed);
      let rnn = Rnn::with_rng(hidden, 2, 1, &mut rng)?;
      let seq = data::delayed_echo(&mut rng, 1, steps, 2)?.remove(0);
      let h0 = Array1::<f64>::from_shape_simple_fn(hidden, || rng.gen_range(-0.5..0.5));
      let report = gradcheck::check_gradients(
        &rnn,
        h0.view(),
        seq.inputs.view(),
        seq.targets.view(),
        eps,
      )?;
      for check in &report.checks {
        info!(
          param = check.param.name(),
          max_abs_error = check.max_abs_error,
          max_rel_error = check.max_rel_error,
          "gradient check"
        );
      }
      if report.max_abs_error() > 1e-6 {
        warn!("analytic and numeric gradients disagree");
      }
    }
    Command::Inspect { weights } => {
      let rnn = Rnn::load(&weights)?;
      for param in Param::ALL {
        let m = rnn.weights().get(param);
        info!(
          name = param.name(),
          rows = m.nrows(),
          cols = m.ncols(),
          min = m.iter().copied().fold(f64::INFINITY, f64::min),
          max = m.iter().copied().fold(f64::NEG_INFINITY, f64::max),
          "parameter"
        );
      }
    }
  }
  Ok(())
}

fn train(settings: app_config::Settings) -> Result<(), Box<dyn Error>> {
  let mut rng = StdRng::seed_from_u64(settings.seed);
  let (inputs, outputs) = (settings.inputs, settings.output_units()?);
  let sequences = match &settings.data {
    Some(path) => data::read_sequences(path, inputs, outputs)?,
    None => data::delayed_echo(&mut rng, settings.sequences, settings.steps, inputs)?,
  };
  let (train_set, held_out) = data::split_sequences(sequences, 0.8);
  info!(
    train = train_set.len(),
    held_out = held_out.len(),
    "dataset ready"
  );

  let mut rnn = Rnn::with_rng(settings.hidden, inputs, outputs, &mut rng)?;
  let report = training::run_training(&mut rnn, &settings.train, &train_set)?;
  info!(smoothed_error = report.smoothed_error, "training done");
  if !held_out.is_empty() {
    let error = training::evaluate(&rnn, &held_out)?;
    info!(mean_error = error, "held-out evaluation");
  }

  if let Some(path) = &settings.output {
    rnn.save(path)?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn carry_hidden(args: &[&str]) -> Option<bool> {
    let argv = ["rnn-bptt", "train"].iter().chain(args).copied();
    match Cli::try_parse_from(argv).unwrap().command {
      Command::Train { carry_hidden, .. } => carry_hidden,
      _ => unreachable!(),
    }
  }

  #[test]
  fn carry_hidden_flag_takes_an_optional_value() {
    assert_eq!(carry_hidden(&[]), None);
    assert_eq!(carry_hidden(&["--carry-hidden"]), Some(true));
    assert_eq!(carry_hidden(&["--carry-hidden", "false"]), Some(false));
    assert_eq!(carry_hidden(&["--carry-hidden=true"]), Some(true));
  }
}
