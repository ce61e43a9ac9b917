pub mod interop;

use envrig_core::{
    Error, Result,
    env::{Action, Env, Observation, SnapShot, TerminationPolicy},
    frame::Frame,
    space::{BoundsMode, EnvParams, EnvParamsKind, SpaceKind, SpaceParams},
    tensor::{Buffer, numel},
};
use interop::{into_error, to_buffer, to_frame, to_ndarray};
use pyo3::{
    Bound, IntoPyObject, PyAny, PyObject, Python,
    types::{PyAnyMethods, PyDict, PyDictMethods},
};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GymConfig {
    /// Registered gymnasium id, e.g. `CartPole-v1`.
    pub name: String,
    #[serde(default)]
    pub render: bool,
    /// Defaults to clamping for Box action spaces and rejecting for Discrete ones.
    #[serde(default)]
    pub bounds_mode: Option<BoundsMode>,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Forwarded as `max_episode_steps`.
    #[serde(default)]
    pub max_steps: Option<usize>,
}

impl GymConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            render: false,
            bounds_mode: None,
            seed: None,
            max_steps: None,
        }
    }
}

/// Where a discrete gymnasium space starts counting. Adapter side values always start at 0.
#[derive(Debug, Clone, Copy, Default)]
struct Offsets {
    action: i64,
    observation: i64,
}

/// A single gymnasium environment, exposed as a batch of one.
pub struct GymEnv {
    env: PyObject,
    config: GymConfig,
    params: EnvParamsKind,
    offsets: Offsets,
    // gymnasium seeds once and keeps its rng across later resets
    pending_seed: Option<u64>,
    steps: usize,
}

fn space_params(space: &Bound<'_, PyAny>, py: Python<'_>) -> anyhow::Result<(SpaceParams, i64)> {
    let spaces = py.import("gymnasium.spaces")?;
    if space.is_instance(&spaces.getattr("Discrete")?)? {
        let count: usize = space.getattr("n")?.extract()?;
        let start: i64 = space.getattr("start")?.extract()?;
        return Ok((SpaceParams::discrete(vec![1], count)?, start));
    }
    if space.is_instance(&spaces.getattr("Box")?)? {
        let low = to_buffer(py, &space.getattr("low")?)?;
        let high = to_buffer(py, &space.getattr("high")?)?;
        return Ok((SpaceParams::continuous(low.shape, low.data, high.data)?, 0));
    }
    let repr: String = space.repr()?.extract()?;
    Err(Error::configuration(format!("unsupported gymnasium space {repr}")).into())
}

/// Lays a raw gymnasium observation out as a batch of one with the declared observation shape.
/// Discrete observations arrive as scalars and are shifted so counting starts at 0.
fn batch_observation(mut obs: Buffer, params: &EnvParams, offset: i64) -> Result<Observation> {
    let shape: Vec<usize> = std::iter::once(1)
        .chain(params.observation_shape().iter().copied())
        .collect();
    if obs.len() != numel(&shape) {
        return Err(Error::invalid_observation(format!(
            "observation of shape {:?} does not fit {:?}",
            obs.shape,
            params.observation_shape()
        )));
    }
    if !params.observation_continuous() {
        obs.data.iter_mut().for_each(|v| *v -= offset as f32);
    }
    Ok(Buffer {
        data: obs.data,
        shape,
    })
}

impl GymEnv {
    pub fn new(config: GymConfig) -> Result<Self> {
        Python::with_gil(|py| {
            let gym = py.import("gymnasium")?;
            let kwargs = PyDict::new(py);
            if config.render {
                kwargs.set_item("render_mode", "rgb_array")?;
            }
            if let Some(max_steps) = config.max_steps {
                kwargs.set_item("max_episode_steps", max_steps)?;
            }
            let env = gym.call_method("make", (config.name.as_str(),), Some(&kwargs))?;
            let (action, action_offset) = space_params(&env.getattr("action_space")?, py)?;
            let (observation, observation_offset) =
                space_params(&env.getattr("observation_space")?, py)?;
            tracing::debug!(name = %config.name, ?action, ?observation, "created gymnasium env");
            anyhow::Ok(GymEnv {
                env: env.unbind(),
                params: EnvParams::new(action, observation).into(),
                offsets: Offsets {
                    action: action_offset,
                    observation: observation_offset,
                },
                pending_seed: config.seed,
                config,
                steps: 0,
            })
        })
        .map_err(into_error)
    }

    pub fn config(&self) -> &GymConfig {
        &self.config
    }

    fn observation(&self, py: Python<'_>, obs: &Bound<'_, PyAny>) -> anyhow::Result<Observation> {
        let obs = to_buffer(py, obs)?;
        Ok(batch_observation(
            obs,
            self.params.agent(),
            self.offsets.observation,
        )?)
    }

    fn python_action<'py>(
        &self,
        py: Python<'py>,
        action: &Buffer,
    ) -> anyhow::Result<Bound<'py, PyAny>> {
        match self.params.agent().action().kind() {
            SpaceKind::Discrete { .. } => {
                let idx = action.data[0] as i64 + self.offsets.action;
                Ok(idx.into_pyobject(py)?.into_any())
            }
            SpaceKind::Continuous { .. } => {
                let unbatched = Buffer {
                    data: action.data.clone(),
                    shape: self.params.agent().action_shape().to_vec(),
                };
                Ok(to_ndarray(py, &unbatched)?)
            }
        }
    }
}

impl Env for GymEnv {
    fn reset(&mut self) -> Result<Observation> {
        let seed = self.pending_seed.take();
        self.steps = 0;
        Python::with_gil(|py| {
            let kwargs = PyDict::new(py);
            if let Some(seed) = seed {
                kwargs.set_item("seed", seed)?;
            }
            let res = self.env.call_method(py, "reset", (), Some(&kwargs))?;
            self.observation(py, &res.bind(py).get_item(0)?)
        })
        .map_err(into_error)
    }

    fn step(&mut self, action: &Action) -> Result<SnapShot> {
        let action = self
            .params
            .check_action(action, &[1], self.bounds_mode())?;
        let steps = self.steps + 1;
        let snapshot = Python::with_gil(|py| {
            let py_action = self.python_action(py, &action)?;
            let res = self.env.call_method1(py, "step", (py_action,))?;
            let res = res.bind(py);
            let observation = self.observation(py, &res.get_item(0)?)?;
            let reward: f32 = res.get_item(1)?.extract()?;
            let terminated: bool = res.get_item(2)?.extract()?;
            let truncated: bool = res.get_item(3)?.extract()?;
            let done = vec![terminated || truncated];
            let mut info = HashMap::new();
            if truncated {
                info.insert("truncated".to_owned(), "true".to_owned());
            }
            anyhow::Ok(SnapShot {
                observation,
                reward: Buffer {
                    data: vec![reward],
                    shape: vec![1],
                },
                episode_done: self
                    .termination()
                    .episode_done(&done, steps, self.config.max_steps),
                done,
                info,
            })
        })
        .map_err(into_error)?;
        self.steps = steps;
        Ok(snapshot)
    }

    fn render(&mut self) -> Result<Option<Frame>> {
        if !self.config.render {
            return Ok(None);
        }
        Python::with_gil(|py| {
            let frame = self.env.call_method0(py, "render")?;
            to_frame(py, frame.bind(py)).map(Some)
        })
        .map_err(into_error)
    }

    fn get_parameters(&self) -> &EnvParamsKind {
        &self.params
    }

    fn bounds_mode(&self) -> BoundsMode {
        self.config.bounds_mode.unwrap_or(
            if self.params.agent().action_continuous() {
                BoundsMode::Clamp
            } else {
                BoundsMode::Reject
            },
        )
    }

    fn termination(&self) -> TerminationPolicy {
        TerminationPolicy::AnyDone
    }
}
