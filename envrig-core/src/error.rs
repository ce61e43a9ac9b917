use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The action handed to `step` does not fit the adapter's action space.
    #[error("invalid action: {0}")]
    InvalidAction(String),
    /// A backend produced an observation that disagrees with its own parameters.
    #[error("invalid observation: {0}")]
    InvalidObservation(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("failed to write recording to {path}: {source}")]
    RecorderFinalize {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Anything raised by the simulator itself.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_action(msg: impl Into<String>) -> Self {
        Self::InvalidAction(msg.into())
    }

    pub fn invalid_observation(msg: impl Into<String>) -> Self {
        Self::InvalidObservation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
