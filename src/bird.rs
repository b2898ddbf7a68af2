/*
 * Bird Module
 *
 * One simulated bird: a position and a unit heading. The struct doubles as
 * the wire record of the device buffer contract, so its layout is fixed to
 * an interleaved (position.xyz, heading.xyz) float sextet.
 */

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rand::Rng;

use crate::params::WorldBounds;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Bird {
    pub pos: Vec3,
    pub dir: Vec3,
}

// Device kernels index the agent buffer with a fixed stride of six floats.
const _: () = assert!(std::mem::size_of::<Bird>() == 24, "Bird record must be 6 floats");
const _: () = assert!(std::mem::offset_of!(Bird, pos) == 0);
const _: () = assert!(std::mem::offset_of!(Bird, dir) == 12);

impl Bird {
    pub fn new(pos: Vec3, dir: Vec3) -> Self {
        Self { pos, dir }
    }

    // Spawn at a uniform-random position inside the world bounds. The initial
    // heading is derived from the position; it is a non-physical bootstrap
    // that the first few ticks smooth out.
    pub fn spawn<R: Rng + ?Sized>(rng: &mut R, bounds: &WorldBounds) -> Self {
        let pos = Vec3::new(
            rng.gen_range(bounds.min.x..bounds.max.x),
            rng.gen_range(bounds.min.y..bounds.max.y),
            rng.gen_range(bounds.min.z..bounds.max.z),
        );
        let dir = pos.try_normalize().unwrap_or(Vec3::X);
        Self { pos, dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn spawned_birds_start_inside_bounds_with_unit_headings() {
        let mut rng = StdRng::seed_from_u64(7);
        let bounds = WorldBounds::default();
        for _ in 0..100 {
            let bird = Bird::spawn(&mut rng, &bounds);
            assert!(bounds.contains(bird.pos));
            assert!((bird.dir.length() - 1.0).abs() < 1e-5);
        }
    }
}
