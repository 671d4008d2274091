use std::time::{Duration, Instant};

use tracing::{info, instrument};

use crate::{
  data::Sequence,
  error::Result,
  model::{Rnn, Vector},
};

pub struct TrainParams {
  pub epochs: usize,
  pub learning_rate: f64,
  /// Start each sequence from the previous sequence's final hidden state
  /// instead of zeros.
  pub carry_hidden: bool,
}

impl Default for TrainParams {
  fn default() -> Self {
    TrainParams {
      epochs: 20,
      learning_rate: 0.01,
      carry_hidden: false,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochStats {
  pub epoch: usize,
  /// Sum of the per-sequence errors, each measured before its update.
  pub total_error: f64,
  pub mean_error: f64,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
  pub epochs: Vec<EpochStats>,
  pub iterations: usize,
  pub elapsed: Duration,
  /// Bias-corrected running average of the per-sequence error.
  pub smoothed_error: f64,
}

/// Trains on every sequence in order, once per epoch, one update per sequence.
#[instrument(skip_all, fields(epochs = params.epochs, sequences = data.len()))]
pub fn run_training(rnn: &mut Rnn, params: &TrainParams, data: &[Sequence]) -> Result<TrainReport> {
  let mut loss_avg = ExponentialAverage::new(0.0);
  let mut epochs = Vec::with_capacity(params.epochs);
  let start = Instant::now();
  let mut iter = 0;
  let mut carried: Option<Vector> = None;

  for epoch in 0..params.epochs {
    let mut total_error = 0.0;
    for seq in data {
      let h0 = match carried.take() {
        Some(h) if params.carry_hidden => h,
        _ => Sequence::zero_state(rnn.hidden_units()),
      };
      let out = rnn.train(
        h0.view(),
        seq.inputs.view(),
        seq.targets.view(),
        params.learning_rate,
      )?;
      total_error += out.error;
      loss_avg.update(out.error);
      carried = Some(out.final_hidden);
      iter += 1;
    }
    let mean_error = if data.is_empty() {
      0.0
    } else {
      total_error / data.len() as f64
    };
    info!(
      epoch,
      total_error,
      mean_error,
      smoothed = loss_avg.value,
      "epoch finished"
    );
    epochs.push(EpochStats {
      epoch,
      total_error,
      mean_error,
    });
  }

  let elapsed = start.elapsed();
  if iter > 0 {
    info!("Finished in {iter} iterations");
    info!(
      "Took {:.2}s, {:.2}µs / iter",
      elapsed.as_secs_f32(),
      elapsed.as_micros() / iter as u128
    );
  }

  Ok(TrainReport {
    epochs,
    iterations: iter,
    elapsed,
    smoothed_error: loss_avg.value,
  })
}

/// Per-sequence squared error (summed over steps and outputs), averaged over
/// `data`. Each sequence starts from a zero state; weights are not changed.
pub fn evaluate(rnn: &Rnn, data: &[Sequence]) -> Result<f64> {
  if data.is_empty() {
    return Ok(0.0);
  }
  let h0 = Sequence::zero_state(rnn.hidden_units());
  let mut total = 0.0;
  for seq in data {
    total += rnn.loss(h0.view(), seq.inputs.view(), seq.targets.view())?;
  }
  Ok(total / data.len() as f64)
}

pub struct ExponentialAverage {
  beta: f64,
  moment: f64,
  pub value: f64,
  t: i32,
}

impl ExponentialAverage {
  pub fn new(initial: f64) -> Self {
    ExponentialAverage {
      beta: 0.999,
      moment: 0.,
      value: initial,
      t: 0,
    }
  }

  pub fn update(&mut self, value: f64) {
    self.t += 1;
    self.moment = self.beta * self.moment + (1. - self.beta) * value;
    // bias correction
    self.value = self.moment / (1. - f64::powi(self.beta, self.t));
  }
}
