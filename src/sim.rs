/*
 * Simulation Module
 *
 * Owns the agent store (one flat, group-major bird array) and the flock
 * table (ordered, disjoint [start, end) ranges plus per-flock aggregates).
 * Construction randomly sizes each flock within the configured population
 * bounds and computes the initial aggregates; population and layout are
 * fixed for the simulation's lifetime.
 *
 * `step` is the sequential tick: per flock, every desired heading is
 * computed from the pre-tick member state, every member integrates, then
 * that flock's aggregates are recomputed before the next flock is visited.
 * Aggregates read by the force model are therefore always exactly one
 * sub-step stale.
 */

use glam::Vec3;
use rand::Rng;

use crate::bird::Bird;
use crate::error::FlockError;
use crate::flock::Flock;
use crate::forces::desired_heading;
use crate::integrator::integrate;
use crate::params::SimulationParams;

pub struct Simulation {
    params: SimulationParams,
    birds: Vec<Bird>,
    flocks: Vec<Flock>,
    // Per-flock desired headings, reused across ticks
    scratch: Vec<Option<Vec3>>,
}

impl Simulation {
    pub fn new(params: SimulationParams) -> Result<Self, FlockError> {
        Self::with_rng(params, &mut rand::thread_rng())
    }

    // Deterministic construction for tests and benchmarks.
    pub fn with_rng<R: Rng + ?Sized>(
        params: SimulationParams,
        rng: &mut R,
    ) -> Result<Self, FlockError> {
        params.validate()?;

        let flock_count = rng.gen_range(params.min_flocks..=params.max_flocks);
        let mut birds = Vec::new();
        let mut flocks = Vec::with_capacity(flock_count);
        for _ in 0..flock_count {
            let size = rng.gen_range(params.min_birds_per_flock..=params.max_birds_per_flock);
            let start = birds.len();
            for _ in 0..size {
                birds.push(Bird::spawn(rng, &params.bounds));
            }
            flocks.push(Flock::new(start, start + size));
        }

        let mut sim = Self {
            params,
            birds,
            flocks,
            scratch: Vec::new(),
        };
        sim.recompute_averages();
        Ok(sim)
    }

    // Build a simulation from explicit data, re-validating the range and
    // population invariants. Aggregates are recomputed from the given birds.
    pub fn from_parts(
        params: SimulationParams,
        birds: Vec<Bird>,
        mut flocks: Vec<Flock>,
    ) -> Result<Self, FlockError> {
        params.validate()?;
        if flocks.is_empty() {
            return Err(FlockError::FlockTable("no flocks".into()));
        }
        let mut cursor = 0;
        for (i, flock) in flocks.iter().enumerate() {
            if flock.start < cursor || flock.end < flock.start {
                return Err(FlockError::FlockTable(format!(
                    "flock {i} range {}..{} overlaps or is inverted",
                    flock.start, flock.end
                )));
            }
            let len = flock.len();
            if len < params.min_birds_per_flock || len > params.max_birds_per_flock {
                return Err(FlockError::FlockTable(format!(
                    "flock {i} has {len} birds, outside [{}, {}]",
                    params.min_birds_per_flock, params.max_birds_per_flock
                )));
            }
            cursor = flock.end;
        }
        if cursor > birds.len() {
            return Err(FlockError::FlockTable(format!(
                "flock ranges address {cursor} birds but only {} exist",
                birds.len()
            )));
        }
        for flock in &mut flocks {
            flock.recompute(&birds[flock.range()]);
        }
        Ok(Self {
            params,
            birds,
            flocks,
            scratch: Vec::new(),
        })
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    // Read-only snapshot access for the render layer.
    pub fn birds(&self) -> &[Bird] {
        &self.birds
    }

    pub fn flocks(&self) -> &[Flock] {
        &self.flocks
    }

    // Advance one flock by dt seconds: forces, then integration, then the
    // flock's aggregate recompute. Every member must finish integrating
    // before the recompute reads it.
    pub fn step_flock(&mut self, index: usize, dt: f32) {
        let params = self.params;
        let flock = self.flocks[index];
        let range = flock.range();

        let members = &self.birds[range.clone()];
        self.scratch.clear();
        for i in 0..members.len() {
            self.scratch
                .push(desired_heading(members, i, &flock.avgs, &params));
        }

        let members = &mut self.birds[range.clone()];
        for (bird, desired) in members.iter_mut().zip(self.scratch.iter()) {
            integrate(bird, *desired, dt, &params);
        }

        self.flocks[index].recompute(&self.birds[range]);
    }

    // Sequential tick over all flocks. Flocks do not interact, so no
    // cross-flock ordering is required.
    pub fn step(&mut self, dt: f32) {
        for index in 0..self.flocks.len() {
            self.step_flock(index, dt);
        }
    }

    fn recompute_averages(&mut self) {
        for flock in &mut self.flocks {
            flock.recompute(&self.birds[flock.start..flock.end]);
        }
    }

    // Splits the bird array into per-flock mutable slices, paired with their
    // flock descriptors. Ranges are ordered and disjoint, so the split walks
    // the array once, skipping any unused slots between ranges.
    pub(crate) fn split_flocks_mut(&mut self) -> Vec<(&mut Flock, &mut [Bird])> {
        let mut pairs = Vec::with_capacity(self.flocks.len());
        let mut rest: &mut [Bird] = &mut self.birds;
        let mut offset = 0;
        for flock in &mut self.flocks {
            let (_, tail) = rest.split_at_mut(flock.start - offset);
            let (members, tail) = tail.split_at_mut(flock.end - flock.start);
            offset = flock.end;
            rest = tail;
            pairs.push((flock, members));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded_sim(seed: u64) -> Simulation {
        let mut rng = StdRng::seed_from_u64(seed);
        Simulation::with_rng(SimulationParams::default(), &mut rng).expect("construction")
    }

    #[test]
    fn construction_respects_population_and_range_invariants() {
        for seed in 0..8 {
            let sim = seeded_sim(seed);
            let params = sim.params();
            let flocks = sim.flocks();
            assert!(flocks.len() >= params.min_flocks && flocks.len() <= params.max_flocks);
            let mut cursor = 0;
            for flock in flocks {
                assert!(flock.end > flock.start);
                assert_eq!(flock.start, cursor, "ranges are packed and ordered");
                let len = flock.len();
                assert!(len >= params.min_birds_per_flock && len <= params.max_birds_per_flock);
                cursor = flock.end;
            }
            assert_eq!(cursor, sim.birds().len());
        }
    }

    #[test]
    fn initial_aggregates_are_unit_norm() {
        let sim = seeded_sim(11);
        for flock in sim.flocks() {
            assert!((flock.avgs.dir.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn aggregates_stay_unit_norm_across_ticks() {
        let mut sim = seeded_sim(3);
        for _ in 0..50 {
            sim.step(1.0 / 60.0);
        }
        for flock in sim.flocks() {
            assert!((flock.avgs.dir.length() - 1.0).abs() < 1e-4);
        }
        for bird in sim.birds() {
            assert!(bird.pos.is_finite());
            assert!((bird.dir.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn lone_bird_at_equilibrium_keeps_its_heading() {
        let params = SimulationParams {
            min_flocks: 1,
            max_flocks: 1,
            min_birds_per_flock: 1,
            max_birds_per_flock: 1,
            ..SimulationParams::default()
        };
        // Well inside bounds; the flock's aggregates equal the bird's own
        // state, so the only force term points along the current heading.
        let bird = Bird::new(Vec3::new(0.0, 0.0, 40.0), Vec3::Y);
        let mut sim =
            Simulation::from_parts(params, vec![bird], vec![Flock::new(0, 1)]).expect("parts");
        sim.step(0.1);
        assert_eq!(sim.birds()[0].dir, Vec3::Y);
        let expected = Vec3::new(0.0, 0.0, 40.0) + Vec3::Y * params.move_speed * 0.1;
        assert!((sim.birds()[0].pos - expected).length() < 1e-5);
    }

    #[test]
    fn from_parts_rejects_overlapping_ranges() {
        let params = SimulationParams {
            min_flocks: 1,
            max_flocks: 4,
            min_birds_per_flock: 1,
            max_birds_per_flock: 8,
            ..SimulationParams::default()
        };
        let birds = vec![Bird::new(Vec3::ZERO, Vec3::X); 4];
        let flocks = vec![Flock::new(0, 3), Flock::new(2, 4)];
        assert!(matches!(
            Simulation::from_parts(params, birds, flocks),
            Err(FlockError::FlockTable(_))
        ));
    }

    #[test]
    fn from_parts_rejects_out_of_bounds_flock_sizes() {
        let params = SimulationParams {
            min_flocks: 1,
            max_flocks: 4,
            min_birds_per_flock: 2,
            max_birds_per_flock: 3,
            ..SimulationParams::default()
        };
        let birds = vec![Bird::new(Vec3::ZERO, Vec3::X); 5];
        let flocks = vec![Flock::new(0, 5)];
        assert!(matches!(
            Simulation::from_parts(params, birds, flocks),
            Err(FlockError::FlockTable(_))
        ));
    }
}
