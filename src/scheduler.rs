/*
 * Scheduler Module
 *
 * Tick driving for the host strategies. Every loop is self-paced by a
 * Throttle that sleeps out the remainder of the 1/rate period and reports
 * the measured elapsed time as the tick's dt.
 *
 * Two strategies live here:
 *  - run_sequential: one thread walks all flocks in order.
 *  - run_threaded: one scoped worker per flock over disjoint member slices,
 *    with a std Barrier delimiting each tick so all flocks advance together.
 *    The workers block on the barrier instead of spinning, and the scope
 *    joins every worker before the function returns.
 */

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use glam::Vec3;
use tracing::debug;

use crate::forces::desired_heading;
use crate::integrator::integrate;
use crate::sim::Simulation;

// Wall-clock gating to a maximum tick rate.
pub struct Throttle {
    period: Duration,
    last: Instant,
}

impl Throttle {
    pub fn new(rate: f32) -> Self {
        assert!(rate > 0.0, "tick rate must be positive");
        Self {
            period: Duration::from_secs_f32(1.0 / rate),
            last: Instant::now(),
        }
    }

    // Block until at least one period has elapsed since the previous tick,
    // then return the measured elapsed seconds.
    pub fn tick(&mut self) -> f32 {
        let mut now = Instant::now();
        let elapsed = now.duration_since(self.last);
        if elapsed < self.period {
            thread::sleep(self.period - elapsed);
            now = Instant::now();
        }
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        dt
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    // Maximum ticks per second
    pub tick_rate: f32,
    pub max_ticks: Option<u64>,
    pub duration: Option<Duration>,
    // Overrides the measured dt with a constant, for deterministic stepping
    pub fixed_dt: Option<f32>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick_rate: 120.0,
            max_ticks: None,
            duration: None,
            fixed_dt: None,
        }
    }
}

impl RunConfig {
    fn finished(&self, ticks: u64, started: Instant) -> bool {
        if let Some(max) = self.max_ticks {
            if ticks >= max {
                return true;
            }
        }
        if let Some(limit) = self.duration {
            if started.elapsed() >= limit {
                return true;
            }
        }
        false
    }
}

// Drive the sequential strategy until a limit is hit or `shutdown` is set.
// Returns the number of ticks executed.
pub fn run_sequential(sim: &mut Simulation, config: &RunConfig, shutdown: &AtomicBool) -> u64 {
    let mut throttle = Throttle::new(config.tick_rate);
    let started = Instant::now();
    let mut ticks = 0;
    while !shutdown.load(Ordering::Acquire) && !config.finished(ticks, started) {
        let dt = config.fixed_dt.unwrap_or_else(|| throttle.tick());
        sim.step(dt);
        ticks += 1;
    }
    debug!(ticks, "sequential run finished");
    ticks
}

// Drive one worker thread per flock. Each tick the coordinator publishes dt,
// releases the workers through a barrier, and waits on a second barrier for
// every flock to finish integrating and re-aggregating. All workers observe
// a single stop flag and are joined by the scope before this returns, so no
// worker can outlive the bird store it borrows.
pub fn run_threaded(sim: &mut Simulation, config: &RunConfig, shutdown: &AtomicBool) -> u64 {
    let params = *sim.params();
    let pairs = sim.split_flocks_mut();
    let worker_count = pairs.len();

    // Workers + coordinator
    let barrier = Barrier::new(worker_count + 1);
    let dt_bits = AtomicU32::new(0);
    let stop = AtomicBool::new(false);

    let mut ticks = 0;
    thread::scope(|scope| {
        for (flock, members) in pairs {
            let barrier = &barrier;
            let dt_bits = &dt_bits;
            let stop = &stop;
            scope.spawn(move || {
                let mut scratch: Vec<Option<Vec3>> = Vec::with_capacity(members.len());
                loop {
                    barrier.wait();
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    let dt = f32::from_bits(dt_bits.load(Ordering::Acquire));
                    // Forces from the pre-tick state, then integration, then
                    // this flock's aggregate recompute.
                    scratch.clear();
                    for i in 0..members.len() {
                        scratch.push(desired_heading(members, i, &flock.avgs, &params));
                    }
                    for (bird, desired) in members.iter_mut().zip(scratch.iter()) {
                        integrate(bird, *desired, dt, &params);
                    }
                    flock.recompute(members);
                    barrier.wait();
                }
            });
        }

        let mut throttle = Throttle::new(config.tick_rate);
        let started = Instant::now();
        loop {
            let dt = config.fixed_dt.unwrap_or_else(|| throttle.tick());
            if shutdown.load(Ordering::Acquire) || config.finished(ticks, started) {
                stop.store(true, Ordering::Release);
                barrier.wait();
                break;
            }
            dt_bits.store(dt.to_bits(), Ordering::Release);
            barrier.wait();
            barrier.wait();
            ticks += 1;
        }
    });
    debug!(ticks, workers = worker_count, "threaded run finished");
    ticks
}
