use std::path::PathBuf;

use hookline_symbol::LocationError;

use crate::common::breakpoint::BreakpointId;
use crate::sys;

/// Error type of this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The program could not be launched.
    #[error("failed to launch {0}: {1}")]
    Launch(PathBuf, sys::Error),

    /// The process could not be attached to.
    #[error("failed to attach to process {0}: {1}")]
    Attach(u64, sys::Error),

    /// A breakpoint location could not be resolved.
    #[error(transparent)]
    Location(#[from] LocationError),

    /// The memory of the tracee could not be accessed.
    #[error("memory access at {addr:#x} failed: {source}")]
    Memory {
        /// Address of the access.
        addr: u64,
        /// Underlying error.
        source: sys::Error,
    },

    /// A tracing primitive failed.
    #[error(transparent)]
    Trace(sys::Error),

    /// The operation needs a stopped tracee.
    #[error("tracee is running")]
    TraceeRunning,

    /// The tracee has exited or was killed.
    #[error("tracee has terminated")]
    TraceeTerminated,

    /// A breakpoint is already installed at this address.
    #[error("a breakpoint is already installed at {0:#x}")]
    BreakpointExists(u64),

    /// No breakpoint has this identifier.
    #[error("unknown breakpoint {0}")]
    UnknownBreakpoint(BreakpointId),
}

/// Result type of this crate.
pub type Result<T> = core::result::Result<T, Error>;
