use crate::{
    env::{Action, Env, Observation, SnapShot},
    error::{Error, Result},
    policies::{Policy, PolicyKind},
    recorder::{Recorder, RecorderKind},
};
use derive_more::Display;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum RunnerState {
    #[display("idle")]
    Idle,
    #[display("running")]
    Running,
    #[display("done")]
    Done,
    /// The last episode ended with an error.
    #[display("failed: {reason}")]
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub steps: usize,
    /// Sum of all rewards over every world and agent.
    pub total_reward: f32,
    pub frames: usize,
    pub artifact: Option<PathBuf>,
    /// The runner's own step limit ended the episode rather than the adapter.
    pub truncated: bool,
}

/// Observation points inside the episode loop.
pub trait RunnerHooks {
    fn on_reset(&mut self, _observation: &Observation) -> Result<()> {
        Ok(())
    }

    fn on_step(
        &mut self,
        _step: usize,
        _observation: &Observation,
        _action: &Action,
        _snapshot: &SnapShot,
    ) -> Result<()> {
        Ok(())
    }

    fn on_episode_end(&mut self, _summary: &EpisodeSummary) {}
}

struct NoHooks;

impl RunnerHooks for NoHooks {}

/// Drives one adapter with one policy, optionally recording frames.
///
/// `run` moves the runner `Idle -> Running -> Done` (or `Failed`). Calling it again from either
/// terminal state starts a fresh episode.
pub struct Runner<E: Env, P: Policy, R: Recorder = RecorderKind> {
    env: E,
    policy: P,
    recorder: Option<R>,
    max_steps: Option<usize>,
    hooks: Box<dyn RunnerHooks>,
    state: RunnerState,
}

impl<E: Env, P: Policy> Runner<E, P, RecorderKind> {
    pub fn new(env: E, policy: P) -> Self {
        Self {
            env,
            policy,
            recorder: None,
            max_steps: None,
            hooks: Box::new(NoHooks),
            state: RunnerState::Idle,
        }
    }
}

impl<E: Env> Runner<E, PolicyKind, RecorderKind> {
    pub fn with_policy_kind(env: E, policy: impl Into<PolicyKind>) -> Self {
        Runner::new(env, policy.into())
    }
}

impl<E: Env, P: Policy, R: Recorder> Runner<E, P, R> {
    pub fn with_recorder<R2: Recorder>(self, recorder: R2) -> Runner<E, P, R2> {
        Runner {
            env: self.env,
            policy: self.policy,
            recorder: Some(recorder),
            max_steps: self.max_steps,
            hooks: self.hooks,
            state: self.state,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Result<Self> {
        if max_steps == 0 {
            return Err(Error::configuration("max_steps must be at least 1"));
        }
        self.max_steps = Some(max_steps);
        Ok(self)
    }

    pub fn with_hooks(mut self, hooks: impl RunnerHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn recorder(&self) -> Option<&R> {
        self.recorder.as_ref()
    }

    pub fn recorder_mut(&mut self) -> Option<&mut R> {
        self.recorder.as_mut()
    }

    pub fn into_parts(self) -> (E, P, Option<R>) {
        (self.env, self.policy, self.recorder)
    }

    pub fn run(&mut self) -> Result<EpisodeSummary> {
        self.state = RunnerState::Running;
        if let Some(recorder) = self.recorder.as_mut() {
            // leftovers of an episode that never got finalized
            recorder.discard();
        }
        tracing::debug!(max_steps = ?self.max_steps, "starting episode");
        let res = self.run_episode().and_then(|summary| self.finalize(summary));
        match res {
            Ok(summary) => {
                self.state = RunnerState::Done;
                tracing::info!(
                    steps = summary.steps,
                    total_reward = summary.total_reward,
                    frames = summary.frames,
                    truncated = summary.truncated,
                    "episode finished"
                );
                self.hooks.on_episode_end(&summary);
                Ok(summary)
            }
            Err(err) => {
                if let Some(recorder) = self.recorder.as_mut() {
                    recorder.discard();
                }
                tracing::warn!(error = %err, "episode failed");
                self.state = RunnerState::Failed {
                    reason: err.to_string(),
                };
                Err(err)
            }
        }
    }

    fn run_episode(&mut self) -> Result<EpisodeSummary> {
        let mut observation = self.env.reset()?;
        self.hooks.on_reset(&observation)?;
        let mut steps = 0;
        let mut total_reward = 0.;
        loop {
            let action = self
                .policy
                .select_action(&observation, self.env.get_parameters())?;
            let snapshot = self.env.step(&action)?;
            steps += 1;
            total_reward += snapshot.reward.sum();
            if let Some(recorder) = self.recorder.as_mut() {
                if let Some(frame) = self.env.render()? {
                    recorder.capture(frame)?;
                }
            }
            self.hooks.on_step(steps, &observation, &action, &snapshot)?;
            let truncated = self.max_steps.is_some_and(|max_steps| steps >= max_steps);
            if snapshot.episode_done || truncated {
                return Ok(EpisodeSummary {
                    steps,
                    total_reward,
                    frames: 0,
                    artifact: None,
                    truncated: truncated && !snapshot.episode_done,
                });
            }
            observation = snapshot.observation;
        }
    }

    fn finalize(&mut self, mut summary: EpisodeSummary) -> Result<EpisodeSummary> {
        if let Some(recorder) = self.recorder.as_mut() {
            summary.frames = recorder.frame_count();
            summary.artifact = recorder.save()?;
        }
        Ok(summary)
    }
}
