//! This crate maps human-friendly code locations to addresses, using the
//! debug information of a binary.
//!
//! It is made of two parts:
//! - A [SymbolTable] model: source files (compilation units) and the
//!   functions they define, with their address ranges and declaration lines.
//! - A [location] resolver, turning strings such as `foo.c:42`, `foo.c:bar`
//!   or `0x401136` into addresses.
//!
//! With the `dwarf` feature (enabled by default), symbol tables can be
//! extracted from the DWARF sections of ELF binaries.
//!
//! ```no_run
//! use hookline_symbol::dwarf::extract_symbol_table;
//! use hookline_symbol::location;
//!
//! let table = extract_symbol_table("/path/to/binary", 0).unwrap();
//!
//! let main_addr = location::resolve("hello.c:main", Some(&table)).unwrap();
//! let line_addr = location::resolve("hello.c:12", Some(&table)).unwrap();
//! ```

/// Module extracting symbol tables from DWARF debug information.
#[cfg(feature = "dwarf")]
pub mod dwarf;

mod error;
pub mod location;
mod table;

pub use self::error::{Error, Result};
pub use self::location::{Location, LocationError};
pub use self::table::{AddressRange, CompiledFile, CompiledFunction, SymbolTable};
