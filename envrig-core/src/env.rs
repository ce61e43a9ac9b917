use crate::{
    error::Result,
    frame::Frame,
    space::{BoundsMode, EnvParamsKind},
    tensor::Buffer,
};
use serde::Deserialize;
use std::collections::HashMap;

pub type Observation = Buffer;
pub type Action = Buffer;

/// Result of one `step`. Every field is batched the same way as the observation: `done` holds one
/// flag per parallel world, `episode_done` is the adapter's verdict for the batch as a whole.
#[derive(Debug, Clone)]
pub struct SnapShot {
    pub observation: Observation,
    pub reward: Buffer,
    pub done: Vec<bool>,
    pub episode_done: bool,
    pub info: HashMap<String, String>,
}

/// How per world `done` flags are folded into the end of an episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationPolicy {
    #[default]
    AllDone,
    AnyDone,
    /// Only the step cap ends the episode.
    StepCap,
}

impl TerminationPolicy {
    pub fn episode_done(&self, done: &[bool], steps: usize, max_steps: Option<usize>) -> bool {
        if max_steps.is_some_and(|max_steps| steps >= max_steps) {
            return true;
        }
        match self {
            Self::AllDone => !done.is_empty() && done.iter().all(|d| *d),
            Self::AnyDone => done.iter().any(|d| *d),
            Self::StepCap => false,
        }
    }
}

/// The adapter contract every simulator backend is normalized into.
pub trait Env {
    /// Starts a new episode. Safe to call repeatedly and after termination.
    fn reset(&mut self) -> Result<Observation>;

    /// Advances every world by one tick. Fails with `Error::InvalidAction` when `action` does not
    /// conform to the action space (after clamping, when the adapter clamps).
    fn step(&mut self, action: &Action) -> Result<SnapShot>;

    /// `None` when the adapter was built without frame output.
    fn render(&mut self) -> Result<Option<Frame>>;

    fn get_parameters(&self) -> &EnvParamsKind;

    fn bounds_mode(&self) -> BoundsMode {
        BoundsMode::Reject
    }

    fn termination(&self) -> TerminationPolicy;
}

impl<E: Env + ?Sized> Env for Box<E> {
    fn reset(&mut self) -> Result<Observation> {
        (**self).reset()
    }

    fn step(&mut self, action: &Action) -> Result<SnapShot> {
        (**self).step(action)
    }

    fn render(&mut self) -> Result<Option<Frame>> {
        (**self).render()
    }

    fn get_parameters(&self) -> &EnvParamsKind {
        (**self).get_parameters()
    }

    fn bounds_mode(&self) -> BoundsMode {
        (**self).bounds_mode()
    }

    fn termination(&self) -> TerminationPolicy {
        (**self).termination()
    }
}

pub trait EnvBuilder {
    type Env: Env;

    fn build_env(&self) -> Result<Self::Env>;
}

impl<E: Env, F> EnvBuilder for F
where
    F: Fn() -> Result<E>,
{
    type Env = E;

    fn build_env(&self) -> Result<Self::Env> {
        (self)()
    }
}
