use crate::{
    env::{Action, Observation},
    error::{Error, Result},
    policies::Policy,
    rng::seeded_rng,
    space::{EnvParamsKind, SpaceKind},
    tensor::{Buffer, numel},
};
use rand::{Rng, rngs::StdRng};

/// Samples every action component independently: uniform over `[min, max]` for continuous spaces
/// and uniform over `{0, .., count - 1}` for discrete ones.
pub struct RandomPolicy {
    rng: StdRng,
}

fn check_finite(params: &EnvParamsKind) -> Result<()> {
    if let Some((min, max)) = params.agent().action_bounds() {
        if min.iter().chain(max.iter()).any(|b| !b.is_finite()) {
            return Err(Error::configuration(
                "random sampling needs finite action bounds",
            ));
        }
    }
    Ok(())
}

// `random_range` panics when `max - min` overflows, as it does for bounds near f32::MAX
fn sample_between(rng: &mut StdRng, min: f32, max: f32) -> f32 {
    let t: f32 = rng.random();
    (min * (1. - t) + max * t).clamp(min, max)
}

impl RandomPolicy {
    pub fn new(params: &EnvParamsKind, seed: Option<u64>) -> Result<Self> {
        check_finite(params)?;
        Ok(Self {
            rng: seeded_rng(seed),
        })
    }
}

impl Policy for RandomPolicy {
    fn select_action(&mut self, observation: &Observation, params: &EnvParamsKind) -> Result<Action> {
        check_finite(params)?;
        let batch = params.batch_dims(observation)?;
        let agent = params.agent();
        let shape: Vec<usize> = batch
            .into_iter()
            .chain(agent.action_shape().iter().copied())
            .collect();
        let n = numel(&shape);
        let data = match agent.action().kind() {
            SpaceKind::Continuous { min, max } => {
                let k = min.len();
                (0..n)
                    .map(|idx| sample_between(&mut self.rng, min[idx % k], max[idx % k]))
                    .collect()
            }
            SpaceKind::Discrete { count } => (0..n)
                .map(|_| self.rng.random_range(0..*count) as f32)
                .collect(),
        };
        Buffer::new(data, shape)
    }
}
