//! Tracer particles for wind-flow visualization

pub mod field;

pub use field::{Particle, ParticleField, StepCounts, StepOutcome};
