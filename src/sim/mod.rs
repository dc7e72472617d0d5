pub mod crystal;
pub mod engine;
pub mod sampling;
pub mod transport;
pub mod velocity;
