use crate::canvas::{self, AGENT, BACKGROUND, BORDER, GOAL};
use envrig_core::{
    Error, Result,
    env::{Action, Env, Observation, SnapShot, TerminationPolicy},
    frame::Frame,
    rng::seeded_rng,
    space::{EnvParams, EnvParamsKind, SpaceParams},
    tensor::Buffer,
};
use image::RgbImage;
use rand::{Rng, rngs::StdRng};
use serde::Deserialize;
use std::collections::HashMap;

const STEP_REWARD: f32 = -1.;
const GOAL_REWARD: f32 = 10.;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridWorldConfig {
    pub width: usize,
    pub height: usize,
    pub max_steps: Option<usize>,
    pub render: bool,
    /// Side of one cell in pixels.
    pub cell_size: u32,
    /// Start every episode on a random cell instead of the top left corner.
    pub random_start: bool,
    pub seed: Option<u64>,
}

impl Default for GridWorldConfig {
    fn default() -> Self {
        Self {
            width: 5,
            height: 5,
            max_steps: Some(100),
            render: false,
            cell_size: 16,
            random_start: false,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(Self::Up),
            1 => Some(Self::Down),
            2 => Some(Self::Left),
            3 => Some(Self::Right),
            _ => None,
        }
    }
}

/// Single agent walking a grid towards the bottom right corner.
///
/// Actions are `0..4` (up, down, left, right), observations the index `y * width + x` of the
/// agent's cell. Moving into a wall leaves the agent in place and still costs a step.
pub struct GridWorld {
    config: GridWorldConfig,
    params: EnvParamsKind,
    rng: StdRng,
    agent: (usize, usize),
    steps: usize,
}

impl GridWorld {
    pub fn new(config: GridWorldConfig) -> Result<Self> {
        if config.width * config.height < 2 {
            return Err(Error::configuration(format!(
                "grid world of {}x{} has no room for both agent and goal",
                config.width, config.height
            )));
        }
        if config.cell_size < 4 {
            return Err(Error::configuration("cell_size must be at least 4 pixels"));
        }
        if config.max_steps == Some(0) {
            return Err(Error::configuration("max_steps must be at least 1"));
        }
        let params = EnvParams::new(
            SpaceParams::discrete(vec![1], 4)?,
            SpaceParams::discrete(vec![1], config.width * config.height)?,
        );
        let mut env = Self {
            rng: seeded_rng(config.seed),
            params: params.into(),
            config,
            agent: (0, 0),
            steps: 0,
        };
        env.reset()?;
        Ok(env)
    }

    pub fn config(&self) -> &GridWorldConfig {
        &self.config
    }

    fn goal(&self) -> (usize, usize) {
        (self.config.width - 1, self.config.height - 1)
    }

    fn cell_index(&self) -> usize {
        self.agent.1 * self.config.width + self.agent.0
    }

    fn observation(&self) -> Observation {
        Buffer {
            data: vec![self.cell_index() as f32],
            shape: vec![1, 1],
        }
    }

    fn start_cell(&mut self) -> (usize, usize) {
        if !self.config.random_start {
            return (0, 0);
        }
        let cells = self.config.width * self.config.height;
        // the goal is the last cell, never start on it
        let idx = self.rng.random_range(0..cells - 1);
        (idx % self.config.width, idx / self.config.width)
    }

    fn apply(&mut self, mv: Move) {
        let (x, y) = self.agent;
        self.agent = match mv {
            Move::Up => (x, y.saturating_sub(1)),
            Move::Down => (x, (y + 1).min(self.config.height - 1)),
            Move::Left => (x.saturating_sub(1), y),
            Move::Right => ((x + 1).min(self.config.width - 1), y),
        };
    }
}

impl Env for GridWorld {
    fn reset(&mut self) -> Result<Observation> {
        self.agent = self.start_cell();
        self.steps = 0;
        Ok(self.observation())
    }

    fn step(&mut self, action: &Action) -> Result<SnapShot> {
        let action = self.params.check_action(action, &[1], self.bounds_mode())?;
        let mv = Move::from_index(action.data[0] as usize)
            .ok_or_else(|| Error::invalid_action(format!("no move for {}", action.data[0])))?;
        self.apply(mv);
        self.steps += 1;
        let at_goal = self.agent == self.goal();
        let reward = if at_goal { GOAL_REWARD } else { STEP_REWARD };
        let done = vec![at_goal];
        let episode_done = self
            .termination()
            .episode_done(&done, self.steps, self.config.max_steps);
        let mut info = HashMap::new();
        info.insert("steps".to_owned(), self.steps.to_string());
        Ok(SnapShot {
            observation: self.observation(),
            reward: Buffer {
                data: vec![reward],
                shape: vec![1],
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
        let cell = self.config.cell_size;
        let (cols, rows) = (self.config.width as u32, self.config.height as u32);
        let mut img = RgbImage::from_pixel(cols * cell + 1, rows * cell + 1, BACKGROUND);
        let (gx, gy) = self.goal();
        canvas::fill_rect(&mut img, gx as u32 * cell, gy as u32 * cell, cell, cell, GOAL);
        let (ax, ay) = self.agent;
        let half = cell as f32 / 2.;
        canvas::fill_circle(
            &mut img,
            ax as f32 * cell as f32 + half,
            ay as f32 * cell as f32 + half,
            half * 0.7,
            AGENT,
        );
        canvas::grid_lines(&mut img, cols, rows, cell, BORDER);
        Ok(Some(Frame::new(img)))
    }

    fn get_parameters(&self) -> &EnvParamsKind {
        &self.params
    }

    fn termination(&self) -> TerminationPolicy {
        TerminationPolicy::AnyDone
    }
}
