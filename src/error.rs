/*
 * Error Module
 *
 * Construction-time invariant violations and compute-backend failures are the
 * only fatal conditions in the simulation. Per-tick numeric degeneracies are
 * recovered locally and never surface here.
 */

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlockError {
    #[error("invalid population bounds: {0}")]
    Population(String),

    #[error("world bounds are empty on the {0} axis")]
    WorldBounds(char),

    #[error("flock table is inconsistent: {0}")]
    FlockTable(String),

    #[error("compute backend `{backend}` failed: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
}

impl FlockError {
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }
}
