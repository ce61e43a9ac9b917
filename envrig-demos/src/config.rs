use anyhow::Context;
use envrig_core::{
    Result,
    env::{Env, EnvBuilder},
    policies::{PolicyKind, constant::ConstantPolicy, random::RandomPolicy},
    recorder::gif::GifConfig,
    space::EnvParamsKind,
};
use envrig_sim::{GridWorld, GridWorldConfig, Swarm, SwarmConfig};
use serde::Deserialize;
use std::{fs::File, io::BufReader, path::Path};

/// One experiment: which environment to build, how to drive it and where to record it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    pub env: EnvConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub recorder: Option<GifConfig>,
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl ExperimentConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing experiment config {}", path.display()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    #[serde(default = "default_episodes")]
    pub episodes: usize,
    #[serde(default)]
    pub max_steps: Option<usize>,
}

fn default_episodes() -> usize {
    1
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            episodes: default_episodes(),
            max_steps: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum PolicyConfig {
    Random {
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Always the zero action, handy to watch the passive dynamics.
    Zeros,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::Random { seed: None }
    }
}

impl PolicyConfig {
    pub fn build(&self, params: &EnvParamsKind) -> Result<PolicyKind> {
        Ok(match self {
            Self::Random { seed } => RandomPolicy::new(params, *seed)?.into(),
            Self::Zeros => ConstantPolicy::zeros(params).into(),
        })
    }
}

/// Backend selection, keyed by `backend`. The remaining keys belong to the chosen backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum EnvConfig {
    GridWorld(GridWorldConfig),
    Swarm(SwarmConfig),
    #[cfg(feature = "python")]
    Gym(envrig_gym::GymConfig),
    #[cfg(feature = "python")]
    Vmas(envrig_vmas::VmasConfig),
}

impl EnvConfig {
    pub fn renders(&self) -> bool {
        match self {
            Self::GridWorld(config) => config.render,
            Self::Swarm(config) => config.render,
            #[cfg(feature = "python")]
            Self::Gym(config) => config.render,
            #[cfg(feature = "python")]
            Self::Vmas(config) => config.render,
        }
    }

    pub fn set_render(&mut self, render: bool) {
        match self {
            Self::GridWorld(config) => config.render = render,
            Self::Swarm(config) => config.render = render,
            #[cfg(feature = "python")]
            Self::Gym(config) => config.render = render,
            #[cfg(feature = "python")]
            Self::Vmas(config) => config.render = render,
        }
    }
}

impl EnvBuilder for EnvConfig {
    type Env = Box<dyn Env>;

    fn build_env(&self) -> Result<Self::Env> {
        Ok(match self {
            Self::GridWorld(config) => Box::new(GridWorld::new(config.clone())?),
            Self::Swarm(config) => Box::new(Swarm::new(config.clone())?),
            #[cfg(feature = "python")]
            Self::Gym(config) => Box::new(envrig_gym::GymEnv::new(config.clone())?),
            #[cfg(feature = "python")]
            Self::Vmas(config) => Box::new(envrig_vmas::VmasEnv::new(config.clone())?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envrig_core::env::TerminationPolicy;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: ExperimentConfig =
            serde_json::from_str(r#"{ "env": { "backend": "grid_world" } }"#).unwrap();
        assert!(matches!(config.env, EnvConfig::GridWorld(_)));
        assert_eq!(config.runner.episodes, 1);
        assert!(config.recorder.is_none());
        assert!(matches!(config.policy, PolicyConfig::Random { seed: None }));
    }

    #[test]
    fn backend_keys_go_to_the_backend() {
        let config: ExperimentConfig = serde_json::from_str(
            r#"{
                "env": { "backend": "swarm", "num_agents": 3, "termination": "any_done" },
                "policy": { "kind": "zeros" }
            }"#,
        )
        .unwrap();
        let EnvConfig::Swarm(swarm) = &config.env else {
            panic!("expected a swarm config");
        };
        assert_eq!(swarm.num_agents, 3);
        assert_eq!(swarm.termination, TerminationPolicy::AnyDone);
        assert!(matches!(config.policy, PolicyConfig::Zeros));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        for json in [
            r#"{ "env": { "backend": "grid_world", "scenario": "x" } }"#,
            r#"{ "env": { "backend": "atari" } }"#,
            r#"{ "env": { "backend": "swarm" }, "runner": { "steps": 3 } }"#,
        ] {
            assert!(serde_json::from_str::<ExperimentConfig>(json).is_err(), "{json}");
        }
    }

    #[test]
    fn builds_boxed_envs() {
        let mut config = EnvConfig::Swarm(SwarmConfig::default());
        config.set_render(true);
        assert!(config.renders());
        let mut env = config.build_env().unwrap();
        assert!(env.get_parameters().is_multi_agent());
        assert!(env.render().unwrap().is_some());
    }
}
