/*
 * Flock Module
 *
 * A flock is a fixed, disjoint subset of birds identified by a half-open
 * [start, end) range into the bird array, together with its aggregates: the
 * normalized mean heading and the mean position of its members. Aggregates
 * are recomputed once per tick, strictly after every member has integrated.
 */

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::bird::Bird;

// Aggregate record; also the wire layout of the flock-averages device buffer
// (direction triple first, then position triple).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FlockAverages {
    pub dir: Vec3,
    pub pos: Vec3,
}

const _: () = assert!(std::mem::size_of::<FlockAverages>() == 24);
const _: () = assert!(std::mem::offset_of!(FlockAverages, dir) == 0);
const _: () = assert!(std::mem::offset_of!(FlockAverages, pos) == 12);

impl Default for FlockAverages {
    fn default() -> Self {
        Self {
            dir: Vec3::X,
            pos: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Flock {
    pub start: usize,
    pub end: usize,
    pub avgs: FlockAverages,
}

impl Flock {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            avgs: FlockAverages::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    // Recompute this flock's aggregates from its member slice. Construction
    // guarantees at least one member; an empty slice and a heading sum that
    // cancels to zero both hold the previous value instead of producing NaN.
    pub fn recompute(&mut self, members: &[Bird]) {
        if let Some(avgs) = flock_averages(members) {
            self.avgs.pos = avgs.pos;
            if let Some(dir) = avgs.dir.try_normalize() {
                self.avgs.dir = dir;
            }
        }
    }
}

// Raw mean heading (not yet normalized) and mean position of a member slice.
// Returns None for an empty slice.
pub fn flock_averages(members: &[Bird]) -> Option<FlockAverages> {
    if members.is_empty() {
        return None;
    }
    let mut dir = Vec3::ZERO;
    let mut pos = Vec3::ZERO;
    for bird in members {
        dir += bird.dir;
        pos += bird.pos;
    }
    let n = members.len() as f32;
    Some(FlockAverages {
        dir: dir / n,
        pos: pos / n,
    })
}
