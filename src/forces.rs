/*
 * Force Model Module
 *
 * Computes the combined steering vector for one bird from four terms:
 * separation from close flockmates, alignment to the flock's mean heading,
 * cohesion toward the flock's mean position, and the soft world boundary.
 * The sum is normalized to a unit desired heading; only its direction is
 * consumed downstream.
 *
 * Separation is symmetric: each bird of a close pair computes its own half
 * of the pair force, so the net effect on the pair is equal and opposite.
 */

use glam::Vec3;

use crate::bird::Bird;
use crate::flock::FlockAverages;
use crate::params::{SimulationParams, WorldBounds};

// Below this squared length a force sum is treated as degenerate.
const FORCE_EPSILON: f32 = 1e-12;

// Separation contribution on `bird` from a single flockmate: a push directly
// away, decaying linearly to zero at the trigger distance. Zero outside the
// trigger distance and for coincident positions (undefined direction).
pub fn separation_force(bird: &Bird, other: &Bird, params: &SimulationParams) -> Vec3 {
    let delta = other.pos - bird.pos;
    let distance = delta.length();
    if distance >= params.separation_dist || distance * distance <= FORCE_EPSILON {
        return Vec3::ZERO;
    }
    -(params.separation_dist - distance) * (delta / distance) * params.separation_coeff
}

// Unit corrective force toward the interior for each axis the position has
// left. Strict comparisons: a bird exactly on a bound is not pushed.
pub fn boundary_force(pos: Vec3, bounds: &WorldBounds) -> Vec3 {
    let mut force = Vec3::ZERO;
    if pos.x < bounds.min.x {
        force.x = 1.0;
    } else if pos.x > bounds.max.x {
        force.x = -1.0;
    }
    if pos.y < bounds.min.y {
        force.y = 1.0;
    } else if pos.y > bounds.max.y {
        force.y = -1.0;
    }
    if pos.z < bounds.min.z {
        force.z = 1.0;
    } else if pos.z > bounds.max.z {
        force.z = -1.0;
    }
    force
}

// Combined unit desired heading for the member at `index`, reading the rest
// of its flock and the flock's previous-tick aggregates. Returns None when
// the summed force is degenerate; the caller holds the current heading.
pub fn desired_heading(
    members: &[Bird],
    index: usize,
    avgs: &FlockAverages,
    params: &SimulationParams,
) -> Option<Vec3> {
    let bird = &members[index];
    let mut force = Vec3::ZERO;

    // Separation: brute force over the flock, no spatial structure
    for (j, other) in members.iter().enumerate() {
        if j == index {
            continue;
        }
        force += separation_force(bird, other, params);
    }

    // Alignment: steer toward the flock's mean heading
    force += avgs.dir * params.alignment_coeff;

    // Cohesion: steer toward the flock's mean position, undefined when the
    // bird sits exactly at the centroid
    let to_centre = avgs.pos - bird.pos;
    if to_centre.length_squared() > FORCE_EPSILON {
        force += to_centre.normalize() * params.cohesion_coeff;
    }

    force += boundary_force(bird.pos, &params.bounds);

    if force.length_squared() <= FORCE_EPSILON {
        None
    } else {
        Some(force.normalize())
    }
}
