use crate::canvas::{self, BACKGROUND, BORDER};
use envrig_core::{
    Error, Result,
    env::{Action, Env, Observation, SnapShot, TerminationPolicy},
    frame::Frame,
    rng::seeded_rng,
    space::{BoundsMode, EnvParams, EnvParamsKind, MultiAgentEnvParams, SpaceParams},
    tensor::Buffer,
};
use image::RgbImage;
use rand::{Rng, rngs::StdRng};
use serde::Deserialize;
use std::collections::HashMap;

const OBS_DIM: usize = 4;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SwarmConfig {
    pub num_envs: usize,
    pub num_agents: usize,
    pub max_steps: Option<usize>,
    /// An agent closer than this to its goal is done.
    pub goal_radius: f32,
    /// Seconds per tick, the distance covered at full speed.
    pub dt: f32,
    pub render: bool,
    /// Side of the rendered square frame in pixels.
    pub frame_size: u32,
    pub seed: Option<u64>,
    pub termination: TerminationPolicy,
    pub bounds_mode: BoundsMode,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            num_envs: 1,
            num_agents: 5,
            max_steps: Some(100),
            goal_radius: 0.1,
            dt: 0.1,
            render: false,
            frame_size: 160,
            seed: None,
            termination: TerminationPolicy::AllDone,
            bounds_mode: BoundsMode::Clamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Agent {
    pos: [f32; 2],
    goal: [f32; 2],
    done: bool,
}

impl Agent {
    fn distance(&self) -> f32 {
        let [dx, dy] = self.delta();
        (dx * dx + dy * dy).sqrt()
    }

    fn delta(&self) -> [f32; 2] {
        [self.goal[0] - self.pos[0], self.goal[1] - self.pos[1]]
    }
}

/// Vectorized multi agent navigation: `num_envs` worlds, each with `num_agents` point agents in
/// `[-1, 1]^2` steering towards their own goal.
///
/// Observations are `(num_envs, num_agents, 4)` holding `(x, y, gx - x, gy - y)`, actions
/// `(num_envs, num_agents, 2)` velocities in `[-1, 1]`, rewards `(num_envs, num_agents)` the
/// decrease of the distance to the goal over the tick. A world is done once all of its agents are,
/// after which it no longer moves.
pub struct Swarm {
    config: SwarmConfig,
    params: EnvParamsKind,
    rng: StdRng,
    // world major, `num_envs * num_agents` entries
    agents: Vec<Agent>,
    steps: usize,
}

impl Swarm {
    pub fn new(config: SwarmConfig) -> Result<Self> {
        if config.num_envs == 0 {
            return Err(Error::configuration("num_envs must be at least 1"));
        }
        if config.goal_radius.is_nan() || config.goal_radius <= 0. {
            return Err(Error::configuration("goal_radius must be positive"));
        }
        if config.dt.is_nan() || config.dt <= 0. {
            return Err(Error::configuration("dt must be positive"));
        }
        if config.frame_size < 16 {
            return Err(Error::configuration("frame_size must be at least 16 pixels"));
        }
        if config.max_steps == Some(0) {
            return Err(Error::configuration("max_steps must be at least 1"));
        }
        let agent = EnvParams::new(
            SpaceParams::continuous(vec![2], vec![-1.; 2], vec![1.; 2])?,
            SpaceParams::continuous(
                vec![OBS_DIM],
                vec![-1., -1., -2., -2.],
                vec![1., 1., 2., 2.],
            )?,
        );
        let params = MultiAgentEnvParams::new(config.num_agents, agent)?;
        let mut env = Self {
            rng: seeded_rng(config.seed),
            params: params.into(),
            config,
            agents: vec![],
            steps: 0,
        };
        env.reset()?;
        Ok(env)
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    fn batch(&self) -> [usize; 2] {
        [self.config.num_envs, self.config.num_agents]
    }

    fn worlds(&self) -> impl Iterator<Item = &[Agent]> {
        self.agents.chunks(self.config.num_agents)
    }

    fn world_done(&self) -> Vec<bool> {
        self.worlds()
            .map(|world| world.iter().all(|agent| agent.done))
            .collect()
    }

    fn random_point(&mut self) -> [f32; 2] {
        [
            self.rng.random_range(-1.0..=1.0),
            self.rng.random_range(-1.0..=1.0),
        ]
    }

    fn observation(&self) -> Observation {
        let data = self
            .agents
            .iter()
            .flat_map(|agent| {
                let [dx, dy] = agent.delta();
                [agent.pos[0], agent.pos[1], dx, dy]
            })
            .collect();
        let [envs, agents] = self.batch();
        Buffer {
            data,
            shape: vec![envs, agents, OBS_DIM],
        }
    }

    fn to_pixel(&self, coord: f32) -> f32 {
        (coord + 1.) / 2. * (self.config.frame_size - 1) as f32
    }
}

impl Env for Swarm {
    fn reset(&mut self) -> Result<Observation> {
        let n = self.config.num_envs * self.config.num_agents;
        self.agents = (0..n)
            .map(|_| {
                let pos = self.random_point();
                let goal = self.random_point();
                let mut agent = Agent {
                    pos,
                    goal,
                    done: false,
                };
                agent.done = agent.distance() <= self.config.goal_radius;
                agent
            })
            .collect();
        self.steps = 0;
        Ok(self.observation())
    }

    fn step(&mut self, action: &Action) -> Result<SnapShot> {
        let action = self
            .params
            .check_action(action, &self.batch(), self.bounds_mode())?;
        let world_done = self.world_done();
        let (dt, goal_radius) = (self.config.dt, self.config.goal_radius);
        let per_world = self.config.num_agents;
        let rewards = self
            .agents
            .iter_mut()
            .zip(action.data.chunks_exact(2))
            .enumerate()
            .map(|(idx, (agent, velocity))| {
                if world_done[idx / per_world] || agent.done {
                    return 0.;
                }
                let before = agent.distance();
                agent.pos[0] = (agent.pos[0] + velocity[0] * dt).clamp(-1., 1.);
                agent.pos[1] = (agent.pos[1] + velocity[1] * dt).clamp(-1., 1.);
                let after = agent.distance();
                agent.done = after <= goal_radius;
                before - after
            })
            .collect();
        self.steps += 1;
        let done = self.world_done();
        let episode_done =
            self.config
                .termination
                .episode_done(&done, self.steps, self.config.max_steps);
        let mut info = HashMap::new();
        info.insert("steps".to_owned(), self.steps.to_string());
        info.insert(
            "worlds_done".to_owned(),
            done.iter().filter(|d| **d).count().to_string(),
        );
        Ok(SnapShot {
            observation: self.observation(),
            reward: Buffer {
                data: rewards,
                shape: self.batch().to_vec(),
            },
            done,
            episode_done,
            info,
        })
    }

    fn render(&mut self) -> Result<Option<Frame>> {
        if !self.config.render {
            return Ok(None);
        }
        let size = self.config.frame_size;
        let mut img = RgbImage::from_pixel(size, size, BACKGROUND);
        canvas::grid_lines(&mut img, 1, 1, size - 1, BORDER);
        let radius = size as f32 / 40. + 1.;
        let goal_side = (radius * 2.) as u32;
        let world = &self.agents[..self.config.num_agents];
        for (idx, agent) in world.iter().enumerate() {
            let color = canvas::agent_color(idx);
            let gx = self.to_pixel(agent.goal[0]) - radius;
            let gy = self.to_pixel(agent.goal[1]) - radius;
            canvas::fill_rect(
                &mut img,
                gx.max(0.) as u32,
                gy.max(0.) as u32,
                goal_side,
                goal_side,
                canvas::tint(color),
            );
        }
        for (idx, agent) in world.iter().enumerate() {
            canvas::fill_circle(
                &mut img,
                self.to_pixel(agent.pos[0]),
                self.to_pixel(agent.pos[1]),
                radius,
                canvas::agent_color(idx),
            );
        }
        Ok(Some(Frame::new(img)))
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
