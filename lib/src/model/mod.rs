pub mod bptt;
pub mod rnn;
pub mod types;

pub use bptt::ForwardPass;
pub use rnn::*;
pub use types::*;
