use std::io;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// The blocking readiness wait failed for a non-benign reason
    /// (`EINTR` is handled inside the loop and never surfaces here).
    #[error("readiness wait failed: {0}")]
    Poll(#[source] io::Error),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),

    /// `run()` called while the loop is already running.
    #[error("reactor is already running")]
    Running,

    /// `run()` called after the loop has stopped; a fresh reactor is
    /// required to run again.
    #[error("reactor has already run")]
    Finished,
}
