/// Error type of this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// File open/read error.
    #[error("{0}: {1}")]
    File(std::path::PathBuf, std::io::Error),

    /// The binary carries no DWARF debug information.
    #[error("missing .debug_info")]
    MissingDebugInfo,

    /// Error from the [goblin] crate.
    #[cfg(feature = "dwarf")]
    #[error(transparent)]
    Goblin(#[from] goblin::error::Error),

    /// Error from the [gimli] crate.
    #[cfg(feature = "dwarf")]
    #[error(transparent)]
    Gimli(#[from] gimli::Error),
}

/// Result type of this crate.
pub type Result<T> = core::result::Result<T, Error>;
