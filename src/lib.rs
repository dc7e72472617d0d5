pub mod geom;
pub mod sim;
pub mod vecutils;

// Prelude
pub use geom::point::Point;
pub use geom::vector::Vector;
pub use sim::crystal::{Branch, CrystalParameters};
pub use sim::engine::sensors::SensorPanel;
pub use sim::engine::{Particle, ParticleBatch, SensorEvent, Transport};
pub use sim::transport::{Simulation, SimulationConfig, SimulationResult};
