use std::io::Write;
use std::path::Path;

use miette::IntoDiagnostic;

use crate::report::symbols_document;

/// Runs the subcommand for printing the symbol table of a binary.
pub fn evaluate_symbols(binary: &Path, mut output: impl Write) -> miette::Result<()> {
    let table = hookline_symbol::dwarf::extract_symbol_table(binary, 0).into_diagnostic()?;

    let mut kdl = symbols_document(&table);
    kdl.autoformat();

    output
        .write_all(kdl.to_string().as_bytes())
        .into_diagnostic()?;

    Ok(())
}
