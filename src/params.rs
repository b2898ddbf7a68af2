/*
 * Simulation Parameters Module
 *
 * This module defines the SimulationParams struct holding all tuning values
 * for the flock simulation: movement and turn rates, the three steering force
 * coefficients, the soft world bounds, and the population bounds used when
 * flocks are created. Parameters are fixed for the lifetime of a simulation;
 * there is no runtime-reconfigurable surface.
 */

use glam::Vec3;

use crate::error::FlockError;

// Soft axis-aligned boundary. Birds outside it accumulate a unit corrective
// force toward the interior, one correction per axis at most.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl WorldBounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, pos: Vec3) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            min: Vec3::new(-80.0, -50.0, 20.0),
            max: Vec3::new(80.0, 50.0, 75.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    pub move_speed: f32,
    // Angular turn rate in radians per second
    pub turn_rate: f32,
    pub separation_dist: f32,
    pub separation_coeff: f32,
    pub alignment_coeff: f32,
    pub cohesion_coeff: f32,
    pub bounds: WorldBounds,
    // Population bounds, applied once at creation
    pub min_flocks: usize,
    pub max_flocks: usize,
    pub min_birds_per_flock: usize,
    pub max_birds_per_flock: usize,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            move_speed: 2.0,
            turn_rate: 1.5,
            separation_dist: 4.0,
            separation_coeff: 2.0,
            alignment_coeff: 1.0,
            cohesion_coeff: 0.7,
            bounds: WorldBounds::default(),
            min_flocks: 4,
            max_flocks: 7,
            min_birds_per_flock: 8,
            max_birds_per_flock: 24,
        }
    }
}

impl SimulationParams {
    // Fail fast on unsatisfiable configuration, before any tick runs.
    pub fn validate(&self) -> Result<(), FlockError> {
        if self.min_flocks == 0 {
            return Err(FlockError::Population(
                "min_flocks must be at least 1".into(),
            ));
        }
        if self.min_birds_per_flock == 0 {
            return Err(FlockError::Population(
                "min_birds_per_flock must be at least 1".into(),
            ));
        }
        if self.min_flocks > self.max_flocks {
            return Err(FlockError::Population(format!(
                "min_flocks ({}) exceeds max_flocks ({})",
                self.min_flocks, self.max_flocks
            )));
        }
        if self.min_birds_per_flock > self.max_birds_per_flock {
            return Err(FlockError::Population(format!(
                "min_birds_per_flock ({}) exceeds max_birds_per_flock ({})",
                self.min_birds_per_flock, self.max_birds_per_flock
            )));
        }
        let b = &self.bounds;
        for (axis, lo, hi) in [
            ('x', b.min.x, b.max.x),
            ('y', b.min.y, b.max.y),
            ('z', b.min.z, b.max.z),
        ] {
            if lo >= hi {
                return Err(FlockError::WorldBounds(axis));
            }
        }
        Ok(())
    }
}
