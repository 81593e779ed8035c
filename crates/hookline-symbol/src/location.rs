//! Resolution of human-friendly code locations.
//!
//! The following forms are understood:
//!
//! | Form                        | Example                       |
//! |-----------------------------|-------------------------------|
//! | Raw address                 | `0x401136`, `4198710`         |
//! | File and line               | `foo.c:42`                    |
//! | File and function           | `foo.c:bar`                   |
//! | Namespace, class, function  | `WebCore::ScrollView::paint`  |
//!
//! A line number designates the function whose declaration **starts** on that
//! line. Qualified (C++) locations are parsed but cannot be resolved yet.
//!
//! A location made of hexadecimal digits only is always an address. Likewise,
//! a last component made of hexadecimal digits only is always a line number:
//! `file.c:face` or `file.c:0x10` are lines that never resolve, so functions
//! with such names cannot be designated by name.

use std::fmt;

use crate::table::SymbolTable;

/// Error returned when a location cannot be turned into an address.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    /// The location string is malformed.
    #[error("location {0:?} isn't formatted correctly")]
    Format(String),

    /// No debug information is available for symbol lookup.
    #[error("binary is missing debug information (needed for symbol lookup)")]
    MissingDebugInfo,

    /// The file or function could not be found in the symbol table.
    #[error("symbol {0} could not be found in the symbol table")]
    SymbolNotFound(String),

    /// The location form is valid but cannot be resolved.
    #[error("location {0} is not supported")]
    Unsupported(String),
}

/// Parsed code location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    /// Raw address in the tracee's address space.
    Address(u64),

    /// Function starting on the given line of a source file.
    FileLine {
        /// Source file name.
        file: String,
        /// Declaration line (1-based), or 0 if the line token isn't a
        /// decimal number.
        line: u64,
    },

    /// Function of a source file, by name.
    FileFunction {
        /// Source file name.
        file: String,
        /// Function name.
        function: String,
    },

    /// C++ method, qualified by class and optionally namespace.
    Qualified {
        /// Enclosing namespace, if any.
        namespace: Option<String>,
        /// Enclosing class.
        class: String,
        /// Method name.
        function: String,
    },
}

impl Location {
    /// Parses a location string.
    pub fn parse(input: &str) -> Result<Self, LocationError> {
        let input = input.trim();

        if is_numeric(input) {
            return parse_address(input).map(Self::Address);
        }

        let is_cpp = input.contains("::");

        // last component first
        let tokens = input
            .split(':')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .rev()
            .collect::<Vec<_>>();

        let format_err = || LocationError::Format(input.to_owned());

        let (&first, rest) = tokens.split_first().ok_or_else(format_err)?;

        if is_numeric(first) {
            let line = first.parse::<u64>().unwrap_or(0);
            let file = rest.first().ok_or_else(format_err)?;

            return Ok(Self::FileLine {
                file: (*file).to_owned(),
                line,
            });
        }

        let function = first.to_owned();

        if is_cpp {
            let class = rest.first().ok_or_else(format_err)?;

            Ok(Self::Qualified {
                namespace: rest.get(1).map(|ns| (*ns).to_owned()),
                class: (*class).to_owned(),
                function,
            })
        } else {
            let file = rest.first().ok_or_else(format_err)?;

            Ok(Self::FileFunction {
                file: (*file).to_owned(),
                function,
            })
        }
    }

    /// Resolves this location to an address.
    ///
    /// Raw addresses are returned as-is, without looking at `table`.
    pub fn resolve(&self, table: Option<&SymbolTable>) -> Result<u64, LocationError> {
        let table = match (self, table) {
            (Self::Address(addr), _) => return Ok(*addr),
            (_, Some(table)) if !table.is_empty() => table,
            _ => return Err(LocationError::MissingDebugInfo),
        };

        match self {
            Self::Address(addr) => Ok(*addr),
            Self::FileLine { line: 0, .. } => Err(LocationError::SymbolNotFound(self.to_string())),
            Self::FileLine { file, line } => {
                let compiled_file = table
                    .file(file)
                    .ok_or_else(|| LocationError::SymbolNotFound(file.clone()))?;

                compiled_file
                    .functions_at_line(*line)
                    .first()
                    .map(|f| f.address())
                    .ok_or_else(|| LocationError::Unsupported(self.to_string()))
            }
            Self::FileFunction { file, function } => table
                .file(file)
                .and_then(|f| f.function(function))
                .map(|f| f.address())
                .ok_or_else(|| LocationError::SymbolNotFound(self.to_string())),
            Self::Qualified { .. } => Err(LocationError::Unsupported(self.to_string())),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(addr) => write!(f, "{addr:#x}"),
            Self::FileLine { file, line } => write!(f, "{file}:{line}"),
            Self::FileFunction { file, function } => write!(f, "{file}:{function}"),
            Self::Qualified {
                namespace: Some(ns),
                class,
                function,
            } => write!(f, "{ns}::{class}::{function}"),
            Self::Qualified {
                namespace: None,
                class,
                function,
            } => write!(f, "{class}::{function}"),
        }
    }
}

/// Parses and resolves a location string in one go.
///
/// Raw addresses never consult `table`. Every other form needs a non-empty
/// symbol table.
pub fn resolve(input: &str, table: Option<&SymbolTable>) -> Result<u64, LocationError> {
    let input = input.trim();

    if is_numeric(input) {
        return parse_address(input);
    }

    if table.is_none_or(SymbolTable::is_empty) {
        return Err(LocationError::MissingDebugInfo);
    }

    Location::parse(input)?.resolve(table)
}

/// Returns whether `s` is made of hexadecimal digits only (with an optional
/// `0x` prefix).
fn is_numeric(s: &str) -> bool {
    let digits = match s.strip_prefix("0x") {
        Some(digits) if !digits.is_empty() => digits,
        _ => s,
    };

    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit())
}

fn parse_address(s: &str) -> Result<u64, LocationError> {
    let res = if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else if s.chars().all(|c| c.is_ascii_digit()) {
        s.parse::<u64>()
    } else {
        u64::from_str_radix(s, 16)
    };

    res.map_err(|_| LocationError::Format(s.to_owned()))
}
