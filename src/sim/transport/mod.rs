pub mod config;
pub mod simulation;

pub use config::SimulationConfig;
pub use simulation::{Simulation, SimulationProgress, SimulationResult};
