//! Simulators implemented natively in Rust, mostly used to exercise the runner without a Python
//! toolchain.

mod canvas;
pub mod gridworld;
pub mod swarm;

pub use gridworld::{GridWorld, GridWorldConfig};
pub use swarm::{Swarm, SwarmConfig};
