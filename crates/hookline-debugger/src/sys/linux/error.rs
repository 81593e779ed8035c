use nix::sys::wait::WaitStatus;

/// OS-level error of the tracing backend.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// File open/read error.
    #[error("{0}: {1}")]
    File(std::path::PathBuf, std::io::Error),

    #[error("bad child wait status: {0:?}")]
    BadChildWait(WaitStatus),

    #[error("os error: {0}")]
    Os(#[from] nix::Error),

    #[error(transparent)]
    Elf(#[from] goblin::error::Error),

    #[error("memory read/write {0} bytes instead of {1}")]
    PartialMemOp(usize, usize),

    #[error("register set is {0} bytes long (only 64-bit tracees are supported)")]
    RegisterSetSize(usize),

    #[error("malformed memory map line: {0:?}")]
    MalformedMapsLine(String),

    #[error("failed to execute tracee: {0}")]
    ChildExec(std::io::Error),
}

/// Result type of the tracing backend.
pub type Result<T> = core::result::Result<T, Error>;
