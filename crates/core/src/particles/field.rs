//! Particle pool for wind-flow visualization
//!
//! A fixed-capacity pool of massless tracer particles spread over the visible
//! map. Particles are never destroyed during a run: when one dies of old age,
//! drifts off-screen or lands on a non-finite position it is respawned in
//! place with a fresh position and lifetime.
//!
//! # Advection
//!
//! Wind is in m/s, so it is applied in the renderer's planar (Web Mercator)
//! space, scaled by the projection's scale factor so one metre of wind covers
//! one metre of ground at any latitude:
//!
//! ```text
//! p  = to_planar(lat, lon)
//! p' = p + (u, v) · dt · k(lat)
//! (lat', lon') = from_planar(p')
//! ```
//!
//! Lifetimes are drawn uniformly from `[life_min, life_max]` so deaths are
//! spread over time and the field doesn't visibly pulse.

use crate::config::WindVizConfig;
use crate::core_types::Vec2;
use crate::grid::{GeoBounds, PlanarProjection};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One tracer particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub lon: f64,
    pub lat: f64,
    /// Seconds since spawn or last respawn
    pub age: f64,
    /// Age at which the particle is respawned
    pub max_life: f64,
}

impl Particle {
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.age >= self.max_life
    }
}

/// What happened to a particle during one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Position advanced along the sampled wind
    Moved,
    /// No wind available yet; the particle waits where it is
    Held,
    /// Reached its lifetime and was respawned
    Expired,
    /// Would have left the viewport or gone non-finite; respawned instead
    OutOfBounds,
}

/// Per-frame tally of step outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepCounts {
    pub moved: usize,
    pub held: usize,
    pub expired: usize,
    pub out_of_bounds: usize,
}

impl StepCounts {
    pub fn record(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Moved => self.moved += 1,
            StepOutcome::Held => self.held += 1,
            StepOutcome::Expired => self.expired += 1,
            StepOutcome::OutOfBounds => self.out_of_bounds += 1,
        }
    }

    #[must_use]
    pub fn respawned(&self) -> usize {
        self.expired + self.out_of_bounds
    }
}

/// Uniform draw from `[min, max)`, or `min` when the range is empty
#[inline]
fn uniform(rng: &mut StdRng, min: f64, max: f64) -> f64 {
    if min < max {
        rng.random_range(min..max)
    } else {
        min
    }
}

fn respawn_particle(particle: &mut Particle, bounds: &GeoBounds, life: (f64, f64), rng: &mut StdRng) {
    particle.lat = uniform(rng, bounds.lat_min, bounds.lat_max);
    particle.lon = uniform(rng, bounds.lon_min, bounds.lon_max);
    particle.age = 0.0;
    particle.max_life = uniform(rng, life.0, life.1);
}

/// Pool of particles advected through the sampled wind field
pub struct ParticleField {
    particles: Vec<Particle>,
    life_min: f64,
    life_max: f64,
    rng: StdRng,
}

impl ParticleField {
    /// Empty pool with lifetimes drawn from `[life_min, life_max]` seconds
    #[must_use]
    pub fn new(life_min: f64, life_max: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            particles: Vec::new(),
            life_min: life_min.min(life_max),
            life_max: life_max.max(life_min),
            rng,
        }
    }

    #[must_use]
    pub fn from_config(config: &WindVizConfig) -> Self {
        Self::new(
            config.particle_life_min_sec,
            config.particle_life_max_sec,
            config.seed,
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Grow by spawning inside `bounds`, or shrink by truncation.
    /// Particles that survive the resize are left untouched.
    pub fn resize(&mut self, bounds: &GeoBounds, target: usize) {
        if target <= self.particles.len() {
            self.particles.truncate(target);
            return;
        }
        let life = (self.life_min, self.life_max);
        let missing = target - self.particles.len();
        self.particles.reserve(missing);
        for _ in 0..missing {
            let mut particle = Particle {
                lon: 0.0,
                lat: 0.0,
                age: 0.0,
                max_life: 0.0,
            };
            respawn_particle(&mut particle, bounds, life, &mut self.rng);
            self.particles.push(particle);
        }
    }

    /// Move particle `index` to a random spot in `bounds` with a fresh lifetime
    pub fn respawn(&mut self, index: usize, bounds: &GeoBounds) {
        let life = (self.life_min, self.life_max);
        if let Some(particle) = self.particles.get_mut(index) {
            respawn_particle(particle, bounds, life, &mut self.rng);
        }
    }

    /// Age every particle to its lifetime so the next step respawns the whole pool
    pub fn expire_all(&mut self) {
        for particle in &mut self.particles {
            particle.age = particle.max_life;
        }
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Advance particle `index` by `dt` seconds through `wind` (m/s)
    pub fn step<P: PlanarProjection>(
        &mut self,
        index: usize,
        dt: f64,
        wind: Vec2,
        bounds: &GeoBounds,
        projection: &P,
    ) -> Option<StepOutcome> {
        let life = (self.life_min, self.life_max);
        let particle = self.particles.get_mut(index)?;
        Some(advance(particle, dt, wind, bounds, projection, life, &mut self.rng))
    }

    /// Step the whole pool, sampling wind at each particle's position
    pub fn step_all<P, F>(
        &mut self,
        dt: f64,
        bounds: &GeoBounds,
        projection: &P,
        mut sample_wind: F,
    ) -> StepCounts
    where
        P: PlanarProjection,
        F: FnMut(f64, f64) -> Vec2,
    {
        let life = (self.life_min, self.life_max);
        let mut counts = StepCounts::default();
        for particle in &mut self.particles {
            let wind = if particle.is_expired() {
                // Skip the lookup, the particle respawns regardless
                Vec2::zeros()
            } else {
                sample_wind(particle.lon, particle.lat)
            };
            counts.record(advance(
                particle,
                dt,
                wind,
                bounds,
                projection,
                life,
                &mut self.rng,
            ));
        }
        counts
    }
}

fn advance<P: PlanarProjection>(
    particle: &mut Particle,
    dt: f64,
    wind: Vec2,
    bounds: &GeoBounds,
    projection: &P,
    life: (f64, f64),
    rng: &mut StdRng,
) -> StepOutcome {
    particle.age += dt.max(0.0);
    if particle.is_expired() {
        respawn_particle(particle, bounds, life, rng);
        return StepOutcome::Expired;
    }
    // Missing data reads as calm air; hold position until wind arrives
    if wind == Vec2::zeros() {
        return StepOutcome::Held;
    }
    // Bounds may have shrunk since the particle spawned
    if !bounds.contains(particle.lat, particle.lon) {
        respawn_particle(particle, bounds, life, rng);
        return StepOutcome::OutOfBounds;
    }

    let planar = projection.to_planar(particle.lat, particle.lon);
    let scale = projection.scale_factor(particle.lat);
    let (lat, lon) = projection.from_planar(planar + wind * (dt * scale));
    if !lat.is_finite() || !lon.is_finite() || !bounds.contains(lat, lon) {
        respawn_particle(particle, bounds, life, rng);
        return StepOutcome::OutOfBounds;
    }
    particle.lat = lat;
    particle.lon = lon;
    StepOutcome::Moved
}
