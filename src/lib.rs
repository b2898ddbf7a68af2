/*
 * Bird Flock Simulation - Module Definitions
 *
 * This file defines the module structure for the flock simulation engine.
 * Birds are organized into disjoint flocks that move under local rules:
 * separation from near flockmates, alignment to the flock heading, cohesion
 * toward the flock centroid, and soft world-boundary avoidance. The engine
 * offers three tick strategies: sequential, thread-per-flock, and a
 * two-rate pipeline over data-parallel kernels.
 */

// Re-export key components for easier access
pub use bird::Bird;
pub use device::{ComputeBackend, HostKernel, SimBuffers};
pub use error::FlockError;
pub use flock::{Flock, FlockAverages};
pub use params::{SimulationParams, WorldBounds};
pub use pipeline::{FrameSnapshot, Pipeline, PipelineRates};
pub use scheduler::{run_sequential, run_threaded, RunConfig, Throttle};
pub use sim::Simulation;

// Define modules
pub mod bird;
pub mod device;
pub mod error;
pub mod flock;
pub mod forces;
pub mod integrator;
pub mod params;
pub mod pipeline;
pub mod scheduler;
pub mod sim;
