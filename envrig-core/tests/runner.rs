use anyhow::anyhow;
use envrig_core::{
    Error, Result,
    env::{Action, Env, Observation, SnapShot, TerminationPolicy},
    frame::Frame,
    policies::{Policy, constant::ConstantPolicy, random::RandomPolicy},
    recorder::{Recorder, RecorderKind, gif::GifRecorder, memory::MemoryRecorder},
    runner::{EpisodeSummary, Runner, RunnerHooks, RunnerState},
    space::{BoundsMode, EnvParams, EnvParamsKind, SpaceParams},
    tensor::Buffer,
};
use std::{cell::RefCell, collections::HashMap, rc::Rc};

/// Walks a counter forward, reporting done after `episode_len` steps.
struct CountingEnv {
    params: EnvParamsKind,
    episode_len: usize,
    render: bool,
    fail_at: Option<usize>,
    steps: usize,
    resets: usize,
}

impl CountingEnv {
    fn new(episode_len: usize) -> Result<Self> {
        let params = EnvParams::new(
            SpaceParams::continuous(vec![2], vec![-1.; 2], vec![1.; 2])?,
            SpaceParams::unbounded(vec![2])?,
        );
        Ok(Self {
            params: params.into(),
            episode_len,
            render: false,
            fail_at: None,
            steps: 0,
            resets: 0,
        })
    }

    fn rendering(mut self) -> Self {
        self.render = true;
        self
    }

    fn failing_at(mut self, step: usize) -> Self {
        self.fail_at = Some(step);
        self
    }

    fn observation(&self) -> Observation {
        Buffer {
            data: vec![self.steps as f32, 0.],
            shape: vec![1, 2],
        }
    }
}

impl Env for CountingEnv {
    fn reset(&mut self) -> Result<Observation> {
        self.steps = 0;
        self.resets += 1;
        Ok(self.observation())
    }

    fn step(&mut self, action: &Action) -> Result<SnapShot> {
        self.params.check_action(action, &[1], self.bounds_mode())?;
        self.steps += 1;
        if self.fail_at == Some(self.steps) {
            return Err(Error::Backend(anyhow!("simulator crashed")));
        }
        let done = vec![self.steps >= self.episode_len];
        Ok(SnapShot {
            observation: self.observation(),
            reward: Buffer {
                data: vec![1.],
                shape: vec![1],
            },
            episode_done: self.termination().episode_done(&done, self.steps, None),
            done,
            info: HashMap::new(),
        })
    }

    fn render(&mut self) -> Result<Option<Frame>> {
        Ok(self
            .render
            .then(|| Frame::filled(6, 4, [self.steps as u8 * 20, 0, 0])))
    }

    fn get_parameters(&self) -> &EnvParamsKind {
        &self.params
    }

    fn bounds_mode(&self) -> BoundsMode {
        BoundsMode::Reject
    }

    fn termination(&self) -> TerminationPolicy {
        TerminationPolicy::AnyDone
    }
}

/// Emits actions with one component too many.
struct WrongShapePolicy;

impl Policy for WrongShapePolicy {
    fn select_action(&mut self, _: &Observation, _: &EnvParamsKind) -> Result<Action> {
        Ok(Buffer {
            data: vec![0.; 3],
            shape: vec![1, 3],
        })
    }
}

fn random(env: &CountingEnv) -> Result<RandomPolicy> {
    RandomPolicy::new(env.get_parameters(), Some(7))
}

#[test]
fn runs_until_the_env_is_done() -> Result<()> {
    let env = CountingEnv::new(5)?;
    let policy = random(&env)?;
    let mut runner = Runner::new(env, policy);
    assert_eq!(runner.state(), &RunnerState::Idle);

    let summary = runner.run()?;
    assert_eq!(summary.steps, 5);
    assert_eq!(summary.total_reward, 5.);
    assert!(!summary.truncated);
    assert_eq!(summary.artifact, None);
    assert_eq!(runner.state(), &RunnerState::Done);

    // a finished runner starts over
    runner.run()?;
    assert_eq!(runner.env().resets, 2);
    Ok(())
}

#[test]
fn step_limit_truncates_the_episode() -> Result<()> {
    let env = CountingEnv::new(1000)?;
    let policy = random(&env)?;
    let mut runner = Runner::new(env, policy).with_max_steps(10)?;
    let summary = runner.run()?;
    assert_eq!(summary.steps, 10);
    assert!(summary.truncated);
    Ok(())
}

#[test]
fn zero_step_limit_is_rejected() -> Result<()> {
    let env = CountingEnv::new(3)?;
    let policy = random(&env)?;
    let res = Runner::new(env, policy).with_max_steps(0);
    assert!(matches!(res, Err(Error::Configuration(_))));
    Ok(())
}

#[test]
fn memory_recorder_sees_one_frame_per_step() -> Result<()> {
    let env = CountingEnv::new(4)?.rendering();
    let policy = random(&env)?;
    let mut runner = Runner::new(env, policy).with_recorder(MemoryRecorder::new());
    let summary = runner.run()?;
    assert_eq!(summary.frames, 4);
    let recorder = runner.recorder().expect("recorder is attached");
    assert_eq!(recorder.last_trace().len(), 4);
    assert_eq!(recorder.frame_count(), 0);
    Ok(())
}

#[test]
fn invalid_action_fails_the_episode_without_artifact() -> Result<()> {
    let dir = tempfile::tempdir().map_err(anyhow::Error::from)?;
    let path = dir.path().join("broken.gif");
    let env = CountingEnv::new(5)?.rendering();
    let recorder = RecorderKind::from(GifRecorder::new(&path, 10.)?);
    let mut runner = Runner::new(env, WrongShapePolicy).with_recorder(recorder);

    let res = runner.run();
    assert!(matches!(res, Err(Error::InvalidAction(_))));
    assert!(matches!(runner.state(), RunnerState::Failed { .. }));
    assert!(!path.exists());
    assert!(!dir.path().join("broken.gif.partial").exists());
    Ok(())
}

#[test]
fn backend_failure_discards_captured_frames() -> Result<()> {
    let dir = tempfile::tempdir().map_err(anyhow::Error::from)?;
    let path = dir.path().join("retry.gif");
    let env = CountingEnv::new(6)?.rendering().failing_at(3);
    let policy = random(&env)?;
    let mut runner = Runner::new(env, policy).with_recorder(GifRecorder::new(&path, 10.)?);

    let err = runner.run().unwrap_err();
    assert!(matches!(err, Error::Backend(_)));
    assert_eq!(
        runner.state(),
        &RunnerState::Failed {
            reason: "simulator crashed".to_owned()
        }
    );
    assert_eq!(runner.recorder().map(Recorder::frame_count), Some(0));
    assert!(!path.exists());

    runner.env_mut().fail_at = None;
    let summary = runner.run()?;
    assert_eq!(runner.state(), &RunnerState::Done);
    assert_eq!(summary.frames, 6);
    assert_eq!(summary.artifact.as_deref(), Some(path.as_path()));
    assert!(path.exists());
    Ok(())
}

#[test]
fn episode_without_frames_writes_nothing() -> Result<()> {
    let dir = tempfile::tempdir().map_err(anyhow::Error::from)?;
    let path = dir.path().join("blank.gif");
    let env = CountingEnv::new(3)?;
    let policy = ConstantPolicy::zeros(env.get_parameters());
    let mut runner = Runner::new(env, policy).with_recorder(GifRecorder::new(&path, 10.)?);
    let summary = runner.run()?;
    assert_eq!(summary.frames, 0);
    assert_eq!(summary.artifact, None);
    assert!(!path.exists());
    Ok(())
}

#[test]
fn recorder_failure_fails_the_run() -> Result<()> {
    let dir = tempfile::tempdir().map_err(anyhow::Error::from)?;
    let path = dir.path().join("missing").join("episode.gif");
    let env = CountingEnv::new(3)?.rendering();
    let policy = random(&env)?;
    let mut runner = Runner::new(env, policy).with_recorder(GifRecorder::new(&path, 10.)?);

    let res = runner.run();
    assert!(matches!(res, Err(Error::RecorderFinalize { .. })));
    assert!(matches!(runner.state(), RunnerState::Failed { .. }));
    assert!(!path.exists());
    assert!(!dir.path().join("missing").join("episode.gif.partial").exists());
    assert_eq!(runner.recorder().map(Recorder::frame_count), Some(0));
    Ok(())
}

#[derive(Default)]
struct Trace {
    resets: usize,
    steps: Vec<usize>,
    summaries: Vec<EpisodeSummary>,
}

struct TraceHooks(Rc<RefCell<Trace>>);

impl RunnerHooks for TraceHooks {
    fn on_reset(&mut self, _: &Observation) -> Result<()> {
        self.0.borrow_mut().resets += 1;
        Ok(())
    }

    fn on_step(&mut self, step: usize, _: &Observation, _: &Action, _: &SnapShot) -> Result<()> {
        self.0.borrow_mut().steps.push(step);
        Ok(())
    }

    fn on_episode_end(&mut self, summary: &EpisodeSummary) {
        self.0.borrow_mut().summaries.push(summary.clone());
    }
}

#[test]
fn hooks_observe_every_step() -> Result<()> {
    let trace = Rc::new(RefCell::new(Trace::default()));
    let env = CountingEnv::new(3)?;
    let policy = random(&env)?;
    let mut runner = Runner::new(env, policy).with_hooks(TraceHooks(trace.clone()));
    runner.run()?;

    let trace = trace.borrow();
    assert_eq!(trace.resets, 1);
    assert_eq!(trace.steps, vec![1, 2, 3]);
    assert_eq!(trace.summaries.len(), 1);
    assert_eq!(trace.summaries[0].steps, 3);
    Ok(())
}
