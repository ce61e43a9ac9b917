//! Immutable descriptions of action and observation spaces.
//!
//! An adapter builds its [`EnvParamsKind`] once at construction time. Policies and the runner only
//! ever read it, and they do so through the generic helpers here so that neither needs to know
//! whether it talks to a single agent or to a batch of worlds full of agents.

use crate::{
    error::{Error, Result},
    tensor::{Buffer, numel},
};
use serde::Deserialize;

/// What an adapter does with an action component outside of its declared bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsMode {
    #[default]
    Reject,
    Clamp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpaceKind {
    Discrete { count: usize },
    Continuous { min: Vec<f32>, max: Vec<f32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpaceParams {
    shape: Vec<usize>,
    kind: SpaceKind,
}

fn check_shape(shape: &[usize]) -> Result<()> {
    if shape.is_empty() || shape.contains(&0) {
        return Err(Error::configuration(format!(
            "space shape {shape:?} must be non empty without zero sized dimensions"
        )));
    }
    Ok(())
}

impl SpaceParams {
    pub fn discrete(shape: Vec<usize>, count: usize) -> Result<Self> {
        check_shape(&shape)?;
        if count == 0 {
            return Err(Error::configuration("discrete space needs at least one value"));
        }
        Ok(Self {
            shape,
            kind: SpaceKind::Discrete { count },
        })
    }

    pub fn continuous(shape: Vec<usize>, min: Vec<f32>, max: Vec<f32>) -> Result<Self> {
        check_shape(&shape)?;
        let n = numel(&shape);
        if min.len() != n || max.len() != n {
            return Err(Error::configuration(format!(
                "bounds of length {}/{} do not match shape {shape:?} ({n} components)",
                min.len(),
                max.len()
            )));
        }
        for (idx, (lo, hi)) in min.iter().zip(max.iter()).enumerate() {
            if lo.is_nan() || hi.is_nan() {
                return Err(Error::configuration(format!("bound {idx} is NaN")));
            }
            if lo > hi {
                return Err(Error::configuration(format!(
                    "bound {idx} has min {lo} above max {hi}"
                )));
            }
        }
        Ok(Self {
            shape,
            kind: SpaceKind::Continuous { min, max },
        })
    }

    pub fn unbounded(shape: Vec<usize>) -> Result<Self> {
        let n = numel(&shape);
        Self::continuous(shape, vec![f32::NEG_INFINITY; n], vec![f32::INFINITY; n])
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn kind(&self) -> &SpaceKind {
        &self.kind
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self.kind, SpaceKind::Continuous { .. })
    }

    pub fn bounds(&self) -> Option<(&[f32], &[f32])> {
        match &self.kind {
            SpaceKind::Continuous { min, max } => Some((min, max)),
            SpaceKind::Discrete { .. } => None,
        }
    }

    pub fn count(&self) -> Option<usize> {
        match self.kind {
            SpaceKind::Discrete { count } => Some(count),
            SpaceKind::Continuous { .. } => None,
        }
    }

    /// Number of scalar components in one element of this space.
    pub fn size(&self) -> usize {
        numel(&self.shape)
    }

    /// Checks that `values` is a batch of elements of this space laid out as `batch ++ shape`.
    /// Values outside the space are rejected or pulled back in according to `mode`.
    pub fn conform(
        &self,
        values: &Buffer,
        batch: &[usize],
        mode: BoundsMode,
    ) -> std::result::Result<Buffer, String> {
        let expected: Vec<usize> = batch.iter().chain(self.shape.iter()).copied().collect();
        if values.shape != expected {
            return Err(format!(
                "shape {:?} does not match expected {expected:?}",
                values.shape
            ));
        }
        if values.data.len() != numel(&expected) {
            return Err(format!(
                "{} values do not fill shape {expected:?}",
                values.data.len()
            ));
        }
        if values.data.iter().any(|v| v.is_nan()) {
            return Err("value is NaN".to_owned());
        }
        match &self.kind {
            SpaceKind::Continuous { min, max } => {
                let k = min.len();
                let outside = values
                    .data
                    .iter()
                    .enumerate()
                    .find(|(idx, v)| **v < min[idx % k] || **v > max[idx % k]);
                match (outside, mode) {
                    (None, _) => Ok(values.clone()),
                    (Some(_), BoundsMode::Clamp) => Ok(values.clamp(min, max)),
                    (Some((idx, v)), BoundsMode::Reject) => Err(format!(
                        "component {} = {v} outside of [{}, {}]",
                        idx % k,
                        min[idx % k],
                        max[idx % k]
                    )),
                }
            }
            SpaceKind::Discrete { count } => {
                let upper = (*count - 1) as f32;
                let outside = values
                    .data
                    .iter()
                    .find(|v| v.fract() != 0. || **v < 0. || **v > upper);
                match (outside, mode) {
                    (None, _) => Ok(values.clone()),
                    (Some(_), BoundsMode::Clamp) => Ok(Buffer {
                        data: values
                            .data
                            .iter()
                            .map(|v| v.round().max(0.).min(upper))
                            .collect(),
                        shape: values.shape.clone(),
                    }),
                    (Some(v), BoundsMode::Reject) => {
                        Err(format!("{v} is not a value in {{0, .., {}}}", count - 1))
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "EnvParamsConfig")]
pub struct EnvParams {
    action: SpaceParams,
    observation: SpaceParams,
}

impl EnvParams {
    pub fn new(action: SpaceParams, observation: SpaceParams) -> Self {
        Self {
            action,
            observation,
        }
    }

    pub fn action(&self) -> &SpaceParams {
        &self.action
    }

    pub fn observation(&self) -> &SpaceParams {
        &self.observation
    }

    pub fn action_shape(&self) -> &[usize] {
        self.action.shape()
    }

    pub fn action_continuous(&self) -> bool {
        self.action.is_continuous()
    }

    pub fn action_bounds(&self) -> Option<(&[f32], &[f32])> {
        self.action.bounds()
    }

    pub fn action_count(&self) -> Option<usize> {
        self.action.count()
    }

    pub fn observation_shape(&self) -> &[usize] {
        self.observation.shape()
    }

    pub fn observation_continuous(&self) -> bool {
        self.observation.is_continuous()
    }

    pub fn observation_bounds(&self) -> Option<(&[f32], &[f32])> {
        self.observation.bounds()
    }

    pub fn observation_count(&self) -> Option<usize> {
        self.observation.count()
    }
}

/// Homogeneous agents: every agent shares `agent`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "MultiAgentEnvParamsConfig")]
pub struct MultiAgentEnvParams {
    num_agents: usize,
    agent: EnvParams,
}

impl MultiAgentEnvParams {
    pub fn new(num_agents: usize, agent: EnvParams) -> Result<Self> {
        if num_agents < 1 {
            return Err(Error::configuration("num_agents must be at least 1"));
        }
        Ok(Self { num_agents, agent })
    }

    pub fn num_agents(&self) -> usize {
        self.num_agents
    }

    pub fn agent(&self) -> &EnvParams {
        &self.agent
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnvParamsKind {
    Single(EnvParams),
    MultiAgent(MultiAgentEnvParams),
}

impl From<EnvParams> for EnvParamsKind {
    fn from(value: EnvParams) -> Self {
        Self::Single(value)
    }
}

impl From<MultiAgentEnvParams> for EnvParamsKind {
    fn from(value: MultiAgentEnvParams) -> Self {
        Self::MultiAgent(value)
    }
}

impl EnvParamsKind {
    pub fn agent(&self) -> &EnvParams {
        match self {
            Self::Single(params) => params,
            Self::MultiAgent(params) => params.agent(),
        }
    }

    pub fn num_agents(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::MultiAgent(params) => params.num_agents(),
        }
    }

    pub fn is_multi_agent(&self) -> bool {
        matches!(self, Self::MultiAgent(_))
    }

    /// Leading dimensions of `observation`: parallel environments first, followed by the agent
    /// dimension for multi agent parameters.
    pub fn batch_dims(&self, observation: &Buffer) -> Result<Vec<usize>> {
        let obs_shape = self.agent().observation_shape();
        let shape = &observation.shape;
        if shape.len() < obs_shape.len() || !shape.ends_with(obs_shape) {
            return Err(Error::invalid_observation(format!(
                "observation shape {shape:?} does not end with {obs_shape:?}"
            )));
        }
        let batch = shape[..shape.len() - obs_shape.len()].to_vec();
        if let Self::MultiAgent(params) = self {
            if batch.last() != Some(&params.num_agents()) {
                return Err(Error::invalid_observation(format!(
                    "observation shape {shape:?} is missing the agent dimension of {}",
                    params.num_agents()
                )));
            }
        }
        Ok(batch)
    }

    pub fn check_action(&self, action: &Buffer, batch: &[usize], mode: BoundsMode) -> Result<Buffer> {
        self.agent()
            .action()
            .conform(action, batch, mode)
            .map_err(Error::InvalidAction)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    Scalar(f32),
    PerComponent(Vec<f32>),
}

impl Bound {
    fn expand(self, n: usize) -> Vec<f32> {
        match self {
            Self::Scalar(value) => vec![value; n],
            Self::PerComponent(values) => values,
        }
    }
}

/// The flat option set EnvParams are configured with.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvParamsConfig {
    pub action_shape: Vec<usize>,
    pub action_continuous: bool,
    #[serde(default)]
    pub action_min: Option<Bound>,
    #[serde(default)]
    pub action_max: Option<Bound>,
    #[serde(default)]
    pub action_count: Option<usize>,
    pub observation_shape: Vec<usize>,
    pub observation_continuous: bool,
    #[serde(default)]
    pub observation_min: Option<Bound>,
    #[serde(default)]
    pub observation_max: Option<Bound>,
    #[serde(default)]
    pub observation_count: Option<usize>,
}

fn space_from_options(
    name: &str,
    shape: Vec<usize>,
    continuous: bool,
    min: Option<Bound>,
    max: Option<Bound>,
    count: Option<usize>,
    require_bounds: bool,
) -> Result<SpaceParams> {
    if continuous {
        if count.is_some() {
            return Err(Error::configuration(format!(
                "continuous {name} space takes bounds, not a count"
            )));
        }
        let n = numel(&shape);
        let (min, max) = match (min, max) {
            (Some(min), Some(max)) => (min.expand(n), max.expand(n)),
            (None, None) if !require_bounds => {
                (vec![f32::NEG_INFINITY; n], vec![f32::INFINITY; n])
            }
            _ => {
                return Err(Error::configuration(format!(
                    "continuous {name} space needs both min and max"
                )));
            }
        };
        SpaceParams::continuous(shape, min, max)
    } else {
        if min.is_some() || max.is_some() {
            return Err(Error::configuration(format!(
                "discrete {name} space takes a count, not bounds"
            )));
        }
        let count =
            count.ok_or_else(|| Error::configuration(format!("discrete {name} space needs a count")))?;
        SpaceParams::discrete(shape, count)
    }
}

impl TryFrom<EnvParamsConfig> for EnvParams {
    type Error = Error;

    fn try_from(value: EnvParamsConfig) -> Result<Self> {
        let action = space_from_options(
            "action",
            value.action_shape,
            value.action_continuous,
            value.action_min,
            value.action_max,
            value.action_count,
            true,
        )?;
        let observation = space_from_options(
            "observation",
            value.observation_shape,
            value.observation_continuous,
            value.observation_min,
            value.observation_max,
            value.observation_count,
            false,
        )?;
        Ok(Self::new(action, observation))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultiAgentEnvParamsConfig {
    pub num_agents: usize,
    pub agent: EnvParams,
}

impl TryFrom<MultiAgentEnvParamsConfig> for MultiAgentEnvParams {
    type Error = Error;

    fn try_from(value: MultiAgentEnvParamsConfig) -> Result<Self> {
        Self::new(value.num_agents, value.agent)
    }
}
