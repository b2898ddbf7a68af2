/*
 * Device Buffer Contract Module
 *
 * The boundary with the data-parallel execution layer is a fixed-layout set
 * of flat buffers: bird records as interleaved (position.xyz, heading.xyz)
 * float sextets, a flock-id-per-bird array, a flock range table of
 * (start, end) unsigned-int pairs, flock averages as (dir.xyz, pos.xyz)
 * float sextets, and one scalar elapsed-time input per dispatch. Kernel
 * index arithmetic depends on these strides, so the record structs are
 * compile-time asserted against them and every buffer set is validated
 * before use.
 *
 * The flock table is the single source of truth for membership; the
 * per-bird flock-id array is derived from the ranges at encode time, never
 * maintained separately.
 */

use rayon::prelude::*;

use crate::bird::Bird;
use crate::error::FlockError;
use crate::flock::{flock_averages, FlockAverages};
use crate::forces::desired_heading;
use crate::integrator::integrate;
use crate::params::SimulationParams;
use crate::sim::Simulation;

// Floats per bird record and per flock-average record
pub const BIRD_STRIDE: usize = 6;
// Unsigned ints per flock range entry
pub const RANGE_STRIDE: usize = 2;

const _: () = assert!(std::mem::size_of::<Bird>() == BIRD_STRIDE * 4);
const _: () = assert!(std::mem::size_of::<FlockAverages>() == BIRD_STRIDE * 4);

// One encoded simulation, in the wire layout kernels consume.
#[derive(Debug, Clone)]
pub struct SimBuffers {
    pub agents: Vec<f32>,
    pub bird_to_flock: Vec<u32>,
    pub flock_ranges: Vec<u32>,
    pub flock_avgs: Vec<f32>,
}

impl SimBuffers {
    pub fn from_simulation(sim: &Simulation) -> Self {
        let agents = bytemuck::cast_slice::<Bird, f32>(sim.birds()).to_vec();
        let mut bird_to_flock = vec![0u32; sim.birds().len()];
        let mut flock_ranges = Vec::with_capacity(sim.flocks().len() * RANGE_STRIDE);
        let mut flock_avgs = Vec::with_capacity(sim.flocks().len() * BIRD_STRIDE);
        for (g, flock) in sim.flocks().iter().enumerate() {
            flock_ranges.push(flock.start as u32);
            flock_ranges.push(flock.end as u32);
            for id in &mut bird_to_flock[flock.range()] {
                *id = g as u32;
            }
            flock_avgs.extend_from_slice(bytemuck::cast_slice(&[flock.avgs]));
        }
        Self {
            agents,
            bird_to_flock,
            flock_ranges,
            flock_avgs,
        }
    }

    pub fn bird_count(&self) -> usize {
        self.agents.len() / BIRD_STRIDE
    }

    pub fn flock_count(&self) -> usize {
        self.flock_ranges.len() / RANGE_STRIDE
    }

    pub fn birds(&self) -> &[Bird] {
        bytemuck::cast_slice(&self.agents)
    }

    pub fn averages(&self) -> &[FlockAverages] {
        bytemuck::cast_slice(&self.flock_avgs)
    }

    // Check the stride and membership invariants the kernels rely on:
    // every bird's derived flock id must agree with the range table.
    pub fn validate(&self) -> Result<(), FlockError> {
        if self.agents.len() % BIRD_STRIDE != 0 {
            return Err(FlockError::backend(
                "buffer-layout",
                format!("agent buffer length {} is not a sextet multiple", self.agents.len()),
            ));
        }
        if self.flock_ranges.len() % RANGE_STRIDE != 0 {
            return Err(FlockError::backend(
                "buffer-layout",
                format!("range table length {} is not a pair multiple", self.flock_ranges.len()),
            ));
        }
        if self.flock_avgs.len() != self.flock_count() * BIRD_STRIDE {
            return Err(FlockError::backend(
                "buffer-layout",
                "average buffer length disagrees with the range table",
            ));
        }
        if self.bird_to_flock.len() != self.bird_count() {
            return Err(FlockError::backend(
                "buffer-layout",
                "flock-id array length disagrees with the agent buffer",
            ));
        }
        for (i, &g) in self.bird_to_flock.iter().enumerate() {
            let g = g as usize;
            if g >= self.flock_count() {
                return Err(FlockError::backend(
                    "buffer-layout",
                    format!("bird {i} names flock {g} beyond the range table"),
                ));
            }
            let start = self.flock_ranges[g * RANGE_STRIDE] as usize;
            let end = self.flock_ranges[g * RANGE_STRIDE + 1] as usize;
            if i < start || i >= end {
                return Err(FlockError::backend(
                    "buffer-layout",
                    format!("bird {i} lies outside its flock's range {start}..{end}"),
                ));
            }
        }
        Ok(())
    }
}

// Kernel seam for the offloaded strategy. Both dispatches are full-pipeline
// stalls from the caller's perspective: submit, run to completion, results
// visible in the output slice on return. Failures carry the backend's own
// diagnostic text.
pub trait ComputeBackend: Send {
    fn name(&self) -> &'static str;

    // Force model + integrator over every bird. Reads the agent records, the
    // flock averages, the flock-id array and the range table; rewrites the
    // agent records in place from a pre-dispatch snapshot.
    fn simulate_birds(
        &mut self,
        agents: &mut [f32],
        flock_avgs: &[f32],
        bird_to_flock: &[u32],
        flock_ranges: &[u32],
        dt: f32,
    ) -> Result<(), FlockError>;

    // Aggregate recompute over every flock.
    fn flock_averages(
        &mut self,
        agents: &[f32],
        flock_ranges: &[u32],
        flock_avgs: &mut [f32],
    ) -> Result<(), FlockError>;
}

// Host-side data-parallel kernels. Tuning parameters are baked in when the
// kernel is built; only the buffers and the elapsed time vary per dispatch.
pub struct HostKernel {
    params: SimulationParams,
    snapshot: Vec<Bird>,
}

impl HostKernel {
    pub fn new(params: SimulationParams) -> Result<Self, FlockError> {
        params
            .validate()
            .map_err(|err| FlockError::backend("host-kernel", err.to_string()))?;
        Ok(Self {
            params,
            snapshot: Vec::new(),
        })
    }
}

impl ComputeBackend for HostKernel {
    fn name(&self) -> &'static str {
        "host-kernel"
    }

    fn simulate_birds(
        &mut self,
        agents: &mut [f32],
        flock_avgs: &[f32],
        bird_to_flock: &[u32],
        flock_ranges: &[u32],
        dt: f32,
    ) -> Result<(), FlockError> {
        let birds: &mut [Bird] = bytemuck::try_cast_slice_mut(agents)
            .map_err(|err| FlockError::backend("host-kernel", format!("agent buffer: {err}")))?;
        let avgs: &[FlockAverages] = bytemuck::try_cast_slice(flock_avgs)
            .map_err(|err| FlockError::backend("host-kernel", format!("average buffer: {err}")))?;
        if bird_to_flock.len() != birds.len() {
            return Err(FlockError::backend(
                "host-kernel",
                "flock-id array length disagrees with the agent buffer",
            ));
        }
        if flock_ranges.len() != avgs.len() * RANGE_STRIDE {
            return Err(FlockError::backend(
                "host-kernel",
                "range table length disagrees with the average buffer",
            ));
        }

        // All lanes read the pre-dispatch state and write their own record.
        self.snapshot.clear();
        self.snapshot.extend_from_slice(birds);
        let snapshot = &self.snapshot;
        let params = self.params;

        birds.par_iter_mut().enumerate().for_each(|(i, bird)| {
            let g = bird_to_flock[i] as usize;
            let start = flock_ranges[g * RANGE_STRIDE] as usize;
            let end = flock_ranges[g * RANGE_STRIDE + 1] as usize;
            let members = &snapshot[start..end];
            let desired = desired_heading(members, i - start, &avgs[g], &params);
            *bird = snapshot[i];
            integrate(bird, desired, dt, &params);
        });
        Ok(())
    }

    fn flock_averages(
        &mut self,
        agents: &[f32],
        flock_ranges: &[u32],
        flock_avgs: &mut [f32],
    ) -> Result<(), FlockError> {
        let birds: &[Bird] = bytemuck::try_cast_slice(agents)
            .map_err(|err| FlockError::backend("host-kernel", format!("agent buffer: {err}")))?;
        let avgs: &mut [FlockAverages] = bytemuck::try_cast_slice_mut(flock_avgs)
            .map_err(|err| FlockError::backend("host-kernel", format!("average buffer: {err}")))?;
        if flock_ranges.len() != avgs.len() * RANGE_STRIDE {
            return Err(FlockError::backend(
                "host-kernel",
                "range table length disagrees with the average buffer",
            ));
        }

        avgs.par_iter_mut().enumerate().for_each(|(g, avg)| {
            let start = flock_ranges[g * RANGE_STRIDE] as usize;
            let end = flock_ranges[g * RANGE_STRIDE + 1] as usize;
            if let Some(raw) = flock_averages(&birds[start..end]) {
                avg.pos = raw.pos;
                if let Some(dir) = raw.dir.try_normalize() {
                    avg.dir = dir;
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded_sim(seed: u64) -> Simulation {
        let mut rng = StdRng::seed_from_u64(seed);
        Simulation::with_rng(SimulationParams::default(), &mut rng).expect("construction")
    }

    #[test]
    fn encoded_buffers_validate_and_match_the_simulation() {
        let sim = seeded_sim(5);
        let buffers = SimBuffers::from_simulation(&sim);
        buffers.validate().expect("valid layout");
        assert_eq!(buffers.bird_count(), sim.birds().len());
        assert_eq!(buffers.flock_count(), sim.flocks().len());
        assert_eq!(buffers.birds(), sim.birds());
        // Spot-check the sextet interleave of the first record.
        let first = sim.birds()[0];
        assert_eq!(&buffers.agents[0..3], &[first.pos.x, first.pos.y, first.pos.z]);
        assert_eq!(&buffers.agents[3..6], &[first.dir.x, first.dir.y, first.dir.z]);
    }

    #[test]
    fn truncated_agent_buffer_is_a_backend_error() {
        let sim = seeded_sim(5);
        let mut buffers = SimBuffers::from_simulation(&sim);
        buffers.agents.pop();
        assert!(matches!(
            buffers.validate(),
            Err(FlockError::Backend { .. })
        ));
    }

    #[test]
    fn host_kernel_matches_the_sequential_force_and_integration_step() {
        let sim = seeded_sim(21);
        let mut buffers = SimBuffers::from_simulation(&sim);
        let dt = 0.016;

        // Expected: every bird stepped from the same pre-tick snapshot and
        // the same construction-time aggregates.
        let mut expected: Vec<Bird> = sim.birds().to_vec();
        for (g, flock) in sim.flocks().iter().enumerate() {
            let members = &sim.birds()[flock.range()];
            for i in 0..members.len() {
                let desired = desired_heading(members, i, &sim.flocks()[g].avgs, sim.params());
                integrate(&mut expected[flock.start + i], desired, dt, sim.params());
            }
        }

        let mut kernel = HostKernel::new(*sim.params()).expect("kernel build");
        kernel
            .simulate_birds(
                &mut buffers.agents,
                &buffers.flock_avgs.clone(),
                &buffers.bird_to_flock,
                &buffers.flock_ranges,
                dt,
            )
            .expect("dispatch");

        for (actual, expected) in buffers.birds().iter().zip(&expected) {
            assert!((actual.pos - expected.pos).length() < 1e-5);
            assert!((actual.dir - expected.dir).length() < 1e-5);
        }
    }

    #[test]
    fn average_kernel_matches_the_host_recompute() {
        let sim = seeded_sim(8);
        let mut buffers = SimBuffers::from_simulation(&sim);
        let mut kernel = HostKernel::new(*sim.params()).expect("kernel build");
        kernel
            .flock_averages(
                &buffers.agents.clone(),
                &buffers.flock_ranges,
                &mut buffers.flock_avgs,
            )
            .expect("dispatch");
        for (avg, flock) in buffers.averages().iter().zip(sim.flocks()) {
            assert!((avg.dir - flock.avgs.dir).length() < 1e-5);
            assert!((avg.pos - flock.avgs.pos).length() < 1e-5);
            assert!((avg.dir.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn mismatched_buffer_lengths_surface_as_backend_errors() {
        let sim = seeded_sim(3);
        let buffers = SimBuffers::from_simulation(&sim);
        let mut kernel = HostKernel::new(*sim.params()).expect("kernel build");
        let mut agents = buffers.agents.clone();
        let err = kernel
            .simulate_birds(
                &mut agents,
                &buffers.flock_avgs,
                &buffers.bird_to_flock[1..],
                &buffers.flock_ranges,
                0.01,
            )
            .expect_err("length mismatch");
        assert!(matches!(err, FlockError::Backend { backend: "host-kernel", .. }));
    }

    #[test]
    fn kernel_boundary_correction_matches_the_host_model() {
        // One bird out past +x must be steered back toward the interior.
        let params = SimulationParams {
            min_flocks: 1,
            max_flocks: 1,
            min_birds_per_flock: 1,
            max_birds_per_flock: 1,
            alignment_coeff: 0.0,
            cohesion_coeff: 0.0,
            ..SimulationParams::default()
        };
        let outside = Vec3::new(params.bounds.max.x + 10.0, 0.0, 40.0);
        let sim = Simulation::from_parts(
            params,
            vec![Bird::new(outside, Vec3::Y)],
            vec![crate::flock::Flock::new(0, 1)],
        )
        .expect("parts");
        let mut buffers = SimBuffers::from_simulation(&sim);
        let mut kernel = HostKernel::new(params).expect("kernel build");
        kernel
            .simulate_birds(
                &mut buffers.agents,
                &buffers.flock_avgs.clone(),
                &buffers.bird_to_flock,
                &buffers.flock_ranges,
                0.1,
            )
            .expect("dispatch");
        // Heading rotated toward -x.
        assert!(buffers.birds()[0].dir.x < 0.0);
    }
}
