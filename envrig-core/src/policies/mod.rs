pub mod constant;
pub mod random;

use crate::{
    env::{Action, Observation},
    error::Result,
    space::EnvParamsKind,
};
use constant::ConstantPolicy;
use enum_dispatch::enum_dispatch;
use random::RandomPolicy;

#[enum_dispatch]
pub trait Policy {
    /// Picks one action per batch entry of `observation`, shaped `batch ++ action_shape`.
    fn select_action(&mut self, observation: &Observation, params: &EnvParamsKind) -> Result<Action>;
}

#[enum_dispatch(Policy)]
pub enum PolicyKind {
    Random(RandomPolicy),
    Constant(ConstantPolicy),
}
