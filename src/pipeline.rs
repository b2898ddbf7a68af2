/*
 * Pipeline Module
 *
 * The offloaded two-rate strategy: the bird-update kernel and the
 * flock-average kernel run on separate threads at independently throttled
 * rates, each driving its own ComputeBackend over the flat device buffers.
 *
 * Consistency contract: each loop owns its working buffer and publishes an
 * immutable Arc snapshot after every dispatch; the other loop reads the
 * last-published snapshot. Because the loops run on independent schedules,
 * the update kernel for tick T reads averages that reflect some earlier
 * tick T-k with k >= 1, unbounded and non-deterministic. Callers must not
 * assume the averages are current; that staleness is the design, not a race.
 *
 * Shutdown: one flag observed by both loops. shutdown() joins both workers
 * before returning, and Drop repeats that as a backstop, so no worker can
 * outlive the shared buffers.
 */

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::bird::Bird;
use crate::device::{ComputeBackend, SimBuffers};
use crate::error::FlockError;
use crate::flock::FlockAverages;
use crate::scheduler::Throttle;
use crate::sim::Simulation;

#[derive(Debug, Clone, Copy)]
pub struct PipelineRates {
    pub update_hz: f32,
    pub averages_hz: f32,
}

impl Default for PipelineRates {
    fn default() -> Self {
        Self {
            update_hz: 240.0,
            averages_hz: 60.0,
        }
    }
}

struct Shared {
    // Last-published snapshots; writers swap the Arc, readers clone it.
    agents: RwLock<Arc<Vec<f32>>>,
    flock_avgs: RwLock<Arc<Vec<f32>>>,
    // Membership tables are immutable for the pipeline's lifetime.
    bird_to_flock: Arc<Vec<u32>>,
    flock_ranges: Arc<Vec<u32>>,
    shutdown: AtomicBool,
    update_ticks: AtomicU64,
    average_ticks: AtomicU64,
}

pub struct Pipeline {
    shared: Arc<Shared>,
    update: Option<JoinHandle<Result<(), FlockError>>>,
    averages: Option<JoinHandle<Result<(), FlockError>>>,
}

impl Pipeline {
    // Encode the simulation into device buffers and start both loops.
    pub fn spawn(
        sim: &Simulation,
        mut update_backend: Box<dyn ComputeBackend>,
        mut averages_backend: Box<dyn ComputeBackend>,
        rates: PipelineRates,
    ) -> Result<Self, FlockError> {
        if rates.update_hz <= 0.0 || rates.averages_hz <= 0.0 {
            return Err(FlockError::backend("pipeline", "tick rates must be positive"));
        }
        let buffers = SimBuffers::from_simulation(sim);
        buffers.validate()?;

        let shared = Arc::new(Shared {
            agents: RwLock::new(Arc::new(buffers.agents.clone())),
            flock_avgs: RwLock::new(Arc::new(buffers.flock_avgs.clone())),
            bird_to_flock: Arc::new(buffers.bird_to_flock),
            flock_ranges: Arc::new(buffers.flock_ranges),
            shutdown: AtomicBool::new(false),
            update_ticks: AtomicU64::new(0),
            average_ticks: AtomicU64::new(0),
        });

        let update = {
            let shared = Arc::clone(&shared);
            let mut agents = buffers.agents;
            thread::Builder::new()
                .name("flock-update".into())
                .spawn(move || {
                    let mut throttle = Throttle::new(rates.update_hz);
                    while !shared.shutdown.load(Ordering::Acquire) {
                        let dt = throttle.tick();
                        let avgs = Arc::clone(&shared.flock_avgs.read());
                        if let Err(err) = update_backend.simulate_birds(
                            &mut agents,
                            &avgs,
                            &shared.bird_to_flock,
                            &shared.flock_ranges,
                            dt,
                        ) {
                            shared.shutdown.store(true, Ordering::Release);
                            return Err(err);
                        }
                        *shared.agents.write() = Arc::new(agents.clone());
                        let ticks = shared.update_ticks.fetch_add(1, Ordering::Relaxed) + 1;
                        trace!(ticks, dt, "bird update dispatched");
                    }
                    Ok(())
                })
                .map_err(|err| FlockError::backend("pipeline", err.to_string()))?
        };

        let averages = {
            let shared = Arc::clone(&shared);
            let mut avgs = buffers.flock_avgs;
            thread::Builder::new()
                .name("flock-averages".into())
                .spawn(move || {
                    let mut throttle = Throttle::new(rates.averages_hz);
                    while !shared.shutdown.load(Ordering::Acquire) {
                        let _dt = throttle.tick();
                        let agents = Arc::clone(&shared.agents.read());
                        if let Err(err) = averages_backend.flock_averages(
                            &agents,
                            &shared.flock_ranges,
                            &mut avgs,
                        ) {
                            shared.shutdown.store(true, Ordering::Release);
                            return Err(err);
                        }
                        *shared.flock_avgs.write() = Arc::new(avgs.clone());
                        let ticks = shared.average_ticks.fetch_add(1, Ordering::Relaxed) + 1;
                        trace!(ticks, "flock averages dispatched");
                    }
                    Ok(())
                })
                .map_err(|err| FlockError::backend("pipeline", err.to_string()))?
        };

        Ok(Self {
            shared,
            update: Some(update),
            averages: Some(averages),
        })
    }

    // Read-only view of whatever was last published; a few-millisecond-old
    // snapshot is acceptable for visualization.
    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            agents: Arc::clone(&self.shared.agents.read()),
            flock_avgs: Arc::clone(&self.shared.flock_avgs.read()),
            flock_ranges: Arc::clone(&self.shared.flock_ranges),
        }
    }

    pub fn update_ticks(&self) -> u64 {
        self.shared.update_ticks.load(Ordering::Relaxed)
    }

    pub fn average_ticks(&self) -> u64 {
        self.shared.average_ticks.load(Ordering::Relaxed)
    }

    // Signal both loops and join them, propagating the first backend error.
    pub fn shutdown(mut self) -> Result<(), FlockError> {
        self.shared.shutdown.store(true, Ordering::Release);
        let update = Self::join(self.update.take())?;
        let averages = Self::join(self.averages.take())?;
        debug!("pipeline stopped");
        update?;
        averages
    }

    fn join(
        handle: Option<JoinHandle<Result<(), FlockError>>>,
    ) -> Result<Result<(), FlockError>, FlockError> {
        match handle {
            Some(handle) => handle
                .join()
                .map_err(|_| FlockError::backend("pipeline", "worker thread panicked")),
            None => Ok(Ok(())),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.update.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.averages.take() {
            let _ = handle.join();
        }
    }
}

pub struct FrameSnapshot {
    agents: Arc<Vec<f32>>,
    flock_avgs: Arc<Vec<f32>>,
    flock_ranges: Arc<Vec<u32>>,
}

impl FrameSnapshot {
    pub fn birds(&self) -> &[Bird] {
        bytemuck::cast_slice(&self.agents)
    }

    pub fn averages(&self) -> &[FlockAverages] {
        bytemuck::cast_slice(&self.flock_avgs)
    }

    pub fn flock_range(&self, g: usize) -> std::ops::Range<usize> {
        let start = self.flock_ranges[g * 2] as usize;
        let end = self.flock_ranges[g * 2 + 1] as usize;
        start..end
    }

    pub fn flock_count(&self) -> usize {
        self.flock_ranges.len() / 2
    }
}
