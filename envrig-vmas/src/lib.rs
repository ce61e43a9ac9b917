use envrig_core::{
    Error, Result,
    env::{Action, Env, Observation, SnapShot, TerminationPolicy},
    frame::Frame,
    space::{BoundsMode, EnvParams, EnvParamsKind, MultiAgentEnvParams, SpaceParams},
    tensor::{Buffer, numel},
};
use envrig_gym::interop::{into_error, to_buffer, to_frame, to_ndarray};
use pyo3::{
    Bound, PyAny, PyObject, Python,
    types::{PyAnyMethods, PyDict, PyDictMethods, PyList},
};
use serde::Deserialize;
use std::collections::HashMap;

/// Scenario keyword argument, forwarded to `vmas.make_env` as is.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScenarioArg {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VmasConfig {
    pub scenario: String,
    #[serde(default = "default_num_envs")]
    pub num_envs: usize,
    #[serde(default)]
    pub max_steps: Option<usize>,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default)]
    pub render: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub termination: TerminationPolicy,
    #[serde(default = "default_bounds_mode")]
    pub bounds_mode: BoundsMode,
    /// Scenario specific settings such as `n_agents`.
    #[serde(default)]
    pub scenario_args: HashMap<String, ScenarioArg>,
}

fn default_num_envs() -> usize {
    1
}

fn default_device() -> String {
    "cpu".to_owned()
}

fn default_bounds_mode() -> BoundsMode {
    BoundsMode::Clamp
}

impl VmasConfig {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            num_envs: default_num_envs(),
            max_steps: None,
            device: default_device(),
            render: false,
            seed: None,
            termination: TerminationPolicy::AllDone,
            bounds_mode: default_bounds_mode(),
            scenario_args: HashMap::new(),
        }
    }
}

/// Vectorized multi agent simulator from the `vmas` package with continuous actions.
///
/// Every agent must share one action and one observation space. Heterogeneous scenarios, where
/// agent groups differ in their spaces, are not supported and fail construction with a
/// configuration error. Observations are laid out as `(num_envs, num_agents, *obs_shape)`,
/// rewards as `(num_envs, num_agents)`.
pub struct VmasEnv {
    env: PyObject,
    config: VmasConfig,
    params: EnvParamsKind,
    steps: usize,
}

/// Reads the per agent spaces of a `Tuple` space and checks that they all agree.
fn shared_space(space: &Bound<'_, PyAny>, py: Python<'_>, what: &str) -> anyhow::Result<SpaceParams> {
    let per_agent = space
        .getattr("spaces")?
        .try_iter()?
        .map(|agent_space| -> anyhow::Result<SpaceParams> {
            let agent_space = agent_space?;
            let low = to_buffer(py, &agent_space.getattr("low")?)?;
            let high = to_buffer(py, &agent_space.getattr("high")?)?;
            Ok(SpaceParams::continuous(low.shape, low.data, high.data)?)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(homogeneous(per_agent, what)?)
}

fn homogeneous(per_agent: Vec<SpaceParams>, what: &str) -> Result<SpaceParams> {
    let mut per_agent = per_agent.into_iter().enumerate();
    let (_, shared) = per_agent
        .next()
        .ok_or_else(|| Error::configuration(format!("scenario has no {what} spaces")))?;
    for (idx, params) in per_agent {
        if params != shared {
            return Err(Error::configuration(format!(
                "agent {idx} has a different {what} space than agent 0, only homogeneous agents are supported"
            )));
        }
    }
    Ok(shared)
}

/// Interleaves `num_agents` buffers of `(num_envs, *rest)` into one `(num_envs, num_agents, *rest)`.
pub fn stack_agents(per_agent: &[Buffer]) -> Result<Buffer> {
    let Some(first) = per_agent.first() else {
        return Err(Error::invalid_observation("no agents to stack"));
    };
    if per_agent.iter().any(|b| b.shape != first.shape) {
        return Err(Error::invalid_observation(
            "agents report differently shaped tensors",
        ));
    }
    let Some((&num_envs, rest)) = first.shape.split_first() else {
        return Err(Error::invalid_observation("agent tensor without a batch dimension"));
    };
    let chunk = numel(rest);
    let data = (0..num_envs)
        .flat_map(move |env| {
            per_agent
                .iter()
                .flat_map(move |b| b.data[env * chunk..(env + 1) * chunk].iter().copied())
        })
        .collect();
    let shape = [num_envs, per_agent.len()]
        .into_iter()
        .chain(rest.iter().copied())
        .collect();
    Buffer::new(data, shape)
}

/// Inverse of [`stack_agents`].
pub fn unstack_agents(stacked: &Buffer) -> Result<Vec<Buffer>> {
    let [num_envs, num_agents, rest @ ..] = &stacked.shape[..] else {
        return Err(Error::invalid_action(format!(
            "expected (num_envs, num_agents, ..), got {:?}",
            stacked.shape
        )));
    };
    let chunk = numel(rest);
    (0..*num_agents)
        .map(|agent| {
            let data = (0..*num_envs)
                .flat_map(move |env| {
                    let start = (env * num_agents + agent) * chunk;
                    stacked.data[start..start + chunk].iter().copied()
                })
                .collect();
            let shape = std::iter::once(*num_envs).chain(rest.iter().copied()).collect();
            Buffer::new(data, shape)
        })
        .collect()
}

impl VmasEnv {
    pub fn new(config: VmasConfig) -> Result<Self> {
        Python::with_gil(|py| {
            let vmas = py.import("vmas")?;
            let kwargs = PyDict::new(py);
            kwargs.set_item("scenario", config.scenario.as_str())?;
            kwargs.set_item("num_envs", config.num_envs)?;
            kwargs.set_item("device", config.device.as_str())?;
            kwargs.set_item("continuous_actions", true)?;
            kwargs.set_item("dict_spaces", false)?;
            kwargs.set_item("max_steps", config.max_steps)?;
            kwargs.set_item("seed", config.seed)?;
            for (key, value) in &config.scenario_args {
                match value {
                    ScenarioArg::Bool(v) => kwargs.set_item(key.as_str(), *v)?,
                    ScenarioArg::Int(v) => kwargs.set_item(key.as_str(), *v)?,
                    ScenarioArg::Float(v) => kwargs.set_item(key.as_str(), *v)?,
                    ScenarioArg::Str(v) => kwargs.set_item(key.as_str(), v.as_str())?,
                }
            }
            let env = vmas.call_method("make_env", (), Some(&kwargs))?;
            let num_agents: usize = env.getattr("n_agents")?.extract()?;
            let action = shared_space(&env.getattr("action_space")?, py, "action")?;
            let observation = shared_space(&env.getattr("observation_space")?, py, "observation")?;
            let params = MultiAgentEnvParams::new(num_agents, EnvParams::new(action, observation))?;
            tracing::debug!(
                scenario = %config.scenario,
                num_envs = config.num_envs,
                num_agents,
                "created vmas env"
            );
            anyhow::Ok(VmasEnv {
                env: env.unbind(),
                config,
                params: params.into(),
                steps: 0,
            })
        })
        .map_err(into_error)
    }

    pub fn config(&self) -> &VmasConfig {
        &self.config
    }

    fn observation(&self, py: Python<'_>, per_agent: &Bound<'_, PyAny>) -> anyhow::Result<Observation> {
        let per_agent = per_agent
            .try_iter()?
            .map(|obs| to_buffer(py, &obs?))
            .collect::<pyo3::PyResult<Vec<_>>>()?;
        Ok(stack_agents(&per_agent)?)
    }

    fn torch_actions<'py>(&self, py: Python<'py>, action: &Buffer) -> anyhow::Result<Bound<'py, PyList>> {
        let torch = py.import("torch")?;
        let kwargs = PyDict::new(py);
        kwargs.set_item("device", self.config.device.as_str())?;
        let tensors = unstack_agents(action)?
            .iter()
            .map(|agent| {
                let array = to_ndarray(py, agent)?;
                torch.call_method("as_tensor", (array,), Some(&kwargs))
            })
            .collect::<pyo3::PyResult<Vec<_>>>()?;
        Ok(PyList::new(py, tensors)?)
    }
}

impl Env for VmasEnv {
    fn reset(&mut self) -> Result<Observation> {
        self.steps = 0;
        Python::with_gil(|py| {
            let obs = self.env.call_method0(py, "reset")?;
            self.observation(py, obs.bind(py))
        })
        .map_err(into_error)
    }

    fn step(&mut self, action: &Action) -> Result<SnapShot> {
        let batch = [self.config.num_envs, self.params.num_agents()];
        let action = self.params.check_action(action, &batch, self.bounds_mode())?;
        let steps = self.steps + 1;
        let snapshot = Python::with_gil(|py| {
            let actions = self.torch_actions(py, &action)?;
            let res = self.env.call_method1(py, "step", (actions,))?;
            let res = res.bind(py);
            let observation = self.observation(py, &res.get_item(0)?)?;
            let rewards = res
                .get_item(1)?
                .try_iter()?
                .map(|rew| {
                    let rew = to_buffer(py, &rew?)?;
                    // (num_envs,) -> (num_envs, 1) so the agents can be stacked
                    Ok(Buffer {
                        shape: vec![rew.len(), 1],
                        data: rew.data,
                    })
                })
                .collect::<pyo3::PyResult<Vec<_>>>()?;
            let reward = stack_agents(&rewards)?.reshape(batch.to_vec())?;
            let done: Vec<bool> = to_buffer(py, &res.get_item(2)?)?
                .data
                .iter()
                .map(|d| *d != 0.)
                .collect();
            let mut info = HashMap::new();
            info.insert("steps".to_owned(), steps.to_string());
            anyhow::Ok(SnapShot {
                observation,
                reward,
                episode_done: self
                    .config
                    .termination
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
            let kwargs = PyDict::new(py);
            kwargs.set_item("mode", "rgb_array")?;
            kwargs.set_item("env_index", 0)?;
            let frame = self.env.call_method(py, "render", (), Some(&kwargs))?;
            to_frame(py, frame.bind(py)).map(Some)
        })
        .map_err(into_error)
    }

    fn get_parameters(&self) -> &EnvParamsKind {
        &self.params
    }

    fn bounds_mode(&self) -> BoundsMode {
        self.config.bounds_mode
    }

    fn termination(&self) -> TerminationPolicy {
        self.config.termination
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envrig_core::{policies::random::RandomPolicy, recorder::memory::MemoryRecorder, runner::Runner};
    use pyo3::types::PyModule;

    #[test]
    fn stacking_interleaves_agents_per_env() {
        let a = Buffer::new(vec![0., 1., 2., 3.], vec![2, 2]).unwrap();
        let b = Buffer::new(vec![10., 11., 12., 13.], vec![2, 2]).unwrap();
        let stacked = stack_agents(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(stacked.shape, vec![2, 2, 2]);
        assert_eq!(stacked.data, vec![0., 1., 10., 11., 2., 3., 12., 13.]);
        assert_eq!(unstack_agents(&stacked).unwrap(), vec![a, b]);
    }

    #[test]
    fn stacking_rejects_ragged_agents() {
        let a = Buffer::zeros(vec![2, 2]);
        let b = Buffer::zeros(vec![2, 3]);
        assert!(stack_agents(&[a, b]).is_err());
        assert!(stack_agents(&[]).is_err());
        assert!(unstack_agents(&Buffer::zeros(vec![4])).is_err());
    }

    #[test]
    fn agent_groups_must_share_spaces() {
        let small = || SpaceParams::continuous(vec![2], vec![-1.; 2], vec![1.; 2]).unwrap();
        let shared = homogeneous(vec![small(), small(), small()], "action").unwrap();
        assert_eq!(shared, small());

        let large = SpaceParams::continuous(vec![3], vec![-1.; 3], vec![1.; 3]).unwrap();
        assert!(matches!(
            homogeneous(vec![small(), small(), large], "action"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            homogeneous(vec![], "observation"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn config_from_json() {
        let config: VmasConfig = serde_json::from_str(
            r#"{ "scenario": "discovery", "num_envs": 4, "scenario_args": { "n_agents": 5 } }"#,
        )
        .unwrap();
        assert_eq!(config.num_envs, 4);
        assert_eq!(config.bounds_mode, BoundsMode::Clamp);
        assert_eq!(config.termination, TerminationPolicy::AllDone);
        assert_eq!(config.scenario_args["n_agents"], ScenarioArg::Int(5));
    }

    // needs a python interpreter with vmas and torch installed
    #[test]
    #[ignore]
    fn discovery_with_five_agents() {
        let mut config = VmasConfig::new("discovery");
        config.num_envs = 2;
        config.max_steps = Some(100);
        config.render = true;
        config.scenario_args.insert("n_agents".to_owned(), ScenarioArg::Int(5));
        let env = VmasEnv::new(config).unwrap();
        assert_eq!(env.get_parameters().num_agents(), 5);
        assert_eq!(env.get_parameters().agent().action_shape(), &[2]);

        let policy = RandomPolicy::new(env.get_parameters(), Some(1)).unwrap();
        let mut runner = Runner::new(env, policy)
            .with_recorder(MemoryRecorder::new())
            .with_max_steps(100)
            .unwrap();
        let summary = runner.run().unwrap();
        assert!(summary.frames > 0 && summary.frames <= 100);
    }

    #[test]
    #[ignore]
    fn failed_step_is_not_counted() {
        let mut config = VmasConfig::new("discovery");
        config.num_envs = 1;
        let mut env = VmasEnv::new(config).unwrap();
        env.reset().unwrap();
        let action = Buffer::zeros(vec![1, env.get_parameters().num_agents(), 2]);
        env.step(&action).unwrap();
        env.env = Python::with_gil(|py| {
            PyModule::from_code(
                py,
                c"class Broken:\n    def step(self, actions):\n        raise RuntimeError('crashed')\n",
                c"broken.py",
                c"broken",
            )?
            .getattr("Broken")?
            .call0()
            .map(Bound::unbind)
        })
        .unwrap();
        assert!(matches!(env.step(&action), Err(Error::Backend(_))));
        assert_eq!(env.steps, 1);
    }
}
