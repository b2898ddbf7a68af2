/*
 * Bird Flock Simulation - Demo Driver
 *
 * Headless runner: builds a randomly populated simulation and drives it with
 * the strategy named on the command line (sequential | threaded | pipeline)
 * for a fixed wall-clock duration, logging tick throughput.
 */

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::Result;
use birdflock::{
    run_sequential, run_threaded, HostKernel, Pipeline, PipelineRates, RunConfig, Simulation,
    SimulationParams,
};
use tracing::info;

const RUN_DURATION: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    init_tracing();

    let strategy = std::env::args().nth(1).unwrap_or_else(|| "sequential".into());
    let params = SimulationParams::default();
    let sim = Simulation::new(params)?;
    info!(
        birds = sim.birds().len(),
        flocks = sim.flocks().len(),
        %strategy,
        "flock simulation ready"
    );

    match strategy.as_str() {
        "sequential" => run_host(sim, false),
        "threaded" => run_host(sim, true),
        "pipeline" => run_pipeline(sim),
        other => anyhow::bail!("unknown strategy `{other}` (expected sequential | threaded | pipeline)"),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn run_host(mut sim: Simulation, threaded: bool) -> Result<()> {
    let config = RunConfig {
        tick_rate: 120.0,
        duration: Some(RUN_DURATION),
        ..RunConfig::default()
    };
    let shutdown = AtomicBool::new(false);
    let ticks = if threaded {
        run_threaded(&mut sim, &config, &shutdown)
    } else {
        run_sequential(&mut sim, &config, &shutdown)
    };
    info!(
        ticks,
        ticks_per_sec = ticks as f64 / RUN_DURATION.as_secs_f64(),
        "run complete"
    );
    Ok(())
}

fn run_pipeline(sim: Simulation) -> Result<()> {
    let params = *sim.params();
    let pipeline = Pipeline::spawn(
        &sim,
        Box::new(HostKernel::new(params)?),
        Box::new(HostKernel::new(params)?),
        PipelineRates::default(),
    )?;

    std::thread::sleep(RUN_DURATION);

    let snapshot = pipeline.snapshot();
    info!(
        update_ticks = pipeline.update_ticks(),
        average_ticks = pipeline.average_ticks(),
        birds = snapshot.birds().len(),
        "pipeline run complete"
    );
    pipeline.shutdown()?;
    Ok(())
}
