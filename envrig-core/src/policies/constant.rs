use crate::{
    env::{Action, Observation},
    error::{Error, Result},
    policies::Policy,
    space::EnvParamsKind,
    tensor::Buffer,
};

/// Repeats one per-agent action for every batch entry.
#[derive(Debug, Clone)]
pub struct ConstantPolicy {
    action: Vec<f32>,
}

impl ConstantPolicy {
    pub fn new(action: Vec<f32>) -> Self {
        Self { action }
    }

    pub fn zeros(params: &EnvParamsKind) -> Self {
        Self::new(vec![0.; params.agent().action().size()])
    }
}

impl Policy for ConstantPolicy {
    fn select_action(&mut self, observation: &Observation, params: &EnvParamsKind) -> Result<Action> {
        let agent = params.agent();
        if self.action.len() != agent.action().size() {
            return Err(Error::configuration(format!(
                "constant action has {} components, the action space {}",
                self.action.len(),
                agent.action().size()
            )));
        }
        let batch = params.batch_dims(observation)?;
        let repeats: usize = batch.iter().product();
        let shape = batch
            .into_iter()
            .chain(agent.action_shape().iter().copied())
            .collect();
        Buffer::new(self.action.repeat(repeats), shape)
    }
}
