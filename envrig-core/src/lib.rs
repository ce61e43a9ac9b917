pub mod env;
pub mod error;
pub mod frame;
pub mod policies;
pub mod recorder;
pub mod rng;
pub mod runner;
pub mod space;
pub mod tensor;

pub use error::{Error, Result};
