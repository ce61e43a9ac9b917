pub mod config;
pub mod experiment;

pub use config::{EnvConfig, ExperimentConfig, PolicyConfig, RunnerConfig};
pub use experiment::{LoggingHooks, run_experiment};
