pub mod data;
pub mod error;
pub mod gradcheck;
pub mod model;
pub mod persist;
pub mod training;
pub mod utils;

pub use error::{Error, Result};
pub use model::{Gradients, Matrix, Param, Rnn, TrainOutput, Vector, Weights};
