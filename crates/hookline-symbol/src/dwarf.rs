use std::path::Path;

use gimli::{EndianSlice, RangeIter, RunTimeEndian, SectionId, Unit};
use goblin::elf::Elf;
use goblin::elf::section_header::SHF_COMPRESSED;

use crate::table::{CompiledFile, CompiledFunction, SymbolTable};

type Reader<'a> = EndianSlice<'a, RunTimeEndian>;
type Entry<'abbrev, 'unit, 'a> = gimli::DebuggingInformationEntry<'abbrev, 'unit, Reader<'a>>;

/// Extracts the symbol table of the ELF executable at `path`.
///
/// `load_offset` is added to every address, so that the table matches the
/// runtime addresses of a relocated (PIE) executable.
#[tracing::instrument(name = "SymbolTable", skip_all, fields(path = %path.as_ref().display()))]
pub fn extract_symbol_table(path: impl AsRef<Path>, load_offset: u64) -> crate::Result<SymbolTable> {
    let path = path.as_ref();

    let data = std::fs::read(path).map_err(|e| crate::Error::File(path.to_path_buf(), e))?;

    let table = symbol_table_from_elf(&data, load_offset)?;

    tracing::debug!(
        files = table.files().count(),
        load_offset = format_args!("{load_offset:#x}"),
        "symbol table extracted"
    );

    Ok(table)
}

/// Extracts the symbol table from the raw bytes of an ELF file.
pub fn symbol_table_from_elf(data: &[u8], load_offset: u64) -> crate::Result<SymbolTable> {
    let elf = Elf::parse(data)?;

    if section_data(&elf, data, SectionId::DebugInfo.name()).is_none() {
        return Err(crate::Error::MissingDebugInfo);
    }

    let endian = if elf.little_endian {
        RunTimeEndian::Little
    } else {
        RunTimeEndian::Big
    };

    let dwarf = gimli::Dwarf::load(|id| {
        let section = section_data(&elf, data, id.name()).unwrap_or_default();
        Ok::<_, gimli::Error>(EndianSlice::new(section, endian))
    })?;

    let mut files = Vec::new();
    let mut funcs = Vec::new();

    let mut headers = dwarf.units();

    while let Some(header) = headers.next()? {
        let unit = dwarf.unit(header)?;
        let mut entries = unit.entries();

        while let Some((_, entry)) = entries.next_dfs()? {
            match entry.tag() {
                gimli::DW_TAG_compile_unit => {
                    let Some(name) = entry_name(&dwarf, &unit, entry)? else {
                        continue;
                    };

                    let Some((low, high)) = address_span(dwarf.die_ranges(&unit, entry)?)? else {
                        tracing::trace!(file = name, "compile unit without code");
                        continue;
                    };

                    files.push(CompiledFile::new(
                        name,
                        low.wrapping_add(load_offset),
                        high.wrapping_add(load_offset),
                    ));
                }
                gimli::DW_TAG_subprogram => {
                    let Some(name) = entry_name(&dwarf, &unit, entry)? else {
                        continue;
                    };

                    // declarations and inlined-only functions have no code
                    let Some((low, high)) = address_span(dwarf.die_ranges(&unit, entry)?)? else {
                        continue;
                    };

                    let decl_line = entry
                        .attr(gimli::DW_AT_decl_line)?
                        .and_then(|attr| attr.udata_value())
                        .unwrap_or(0);

                    funcs.push(CompiledFunction {
                        name,
                        low_pc: low.wrapping_add(load_offset),
                        high_pc: high.wrapping_add(load_offset),
                        decl_line,
                    });
                }
                _ => (),
            }
        }
    }

    let mut table = SymbolTable::new();

    files.into_iter().for_each(|file| table.insert_file(file));

    let dropped = funcs
        .into_iter()
        .filter(|func| !table.insert_function(func.clone()))
        .count();

    if dropped > 0 {
        tracing::debug!(dropped, "functions not contained in any compile unit");
    }

    Ok(table)
}

fn section_data<'a>(elf: &Elf<'_>, data: &'a [u8], name: &str) -> Option<&'a [u8]> {
    let shdr = elf
        .section_headers
        .iter()
        .find(|shdr| elf.shdr_strtab.get_at(shdr.sh_name) == Some(name))?;

    if shdr.sh_flags & u64::from(SHF_COMPRESSED) != 0 {
        tracing::warn!(section = name, "compressed debug sections are not supported");
        return None;
    }

    data.get(shdr.file_range()?)
}

fn entry_name(
    dwarf: &gimli::Dwarf<Reader<'_>>,
    unit: &Unit<Reader<'_>>,
    entry: &Entry<'_, '_, '_>,
) -> gimli::Result<Option<String>> {
    let Some(attr) = entry.attr(gimli::DW_AT_name)? else {
        return Ok(None);
    };

    let name = dwarf.attr_string(unit, attr.value())?;

    Ok(Some(name.to_string_lossy().into_owned()))
}

/// Lowest and highest address covered by the given ranges, if any.
fn address_span(mut ranges: RangeIter<Reader<'_>>) -> gimli::Result<Option<(u64, u64)>> {
    let mut span: Option<(u64, u64)> = None;

    while let Some(range) = ranges.next()? {
        if range.begin >= range.end {
            continue;
        }

        span = Some(match span {
            Some((low, high)) => (low.min(range.begin), high.max(range.end)),
            None => (range.begin, range.end),
        });
    }

    Ok(span)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::{extract_symbol_table, symbol_table_from_elf};

    #[inline(never)]
    fn marker_function_for_dwarf_lookup() -> u64 {
        std::hint::black_box(42)
    }

    #[test]
    fn missing_file() {
        let err = extract_symbol_table("/nonexistent/hookline/binary", 0).unwrap_err();
        assert!(matches!(err, crate::Error::File(..)));
    }

    #[test]
    fn not_an_elf() {
        let err = symbol_table_from_elf(b"definitely not an ELF file", 0).unwrap_err();
        assert!(matches!(err, crate::Error::Goblin(_)));
    }

    #[test]
    fn own_test_binary_has_symbols() {
        assert_eq!(marker_function_for_dwarf_lookup(), 42);

        let exe = std::env::current_exe().unwrap();
        let table = extract_symbol_table(&exe, 0).unwrap();

        assert!(!table.is_empty());

        let marker = table
            .files()
            .find_map(|file| file.function("marker_function_for_dwarf_lookup"))
            .expect("marker function in symbol table");

        assert!(marker.low_pc < marker.high_pc);
        assert!(marker.decl_line > 0);

        let shifted = extract_symbol_table(&exe, 0x1000).unwrap();
        let shifted_marker = shifted
            .files()
            .find_map(|file| file.function("marker_function_for_dwarf_lookup"))
            .unwrap();

        assert_eq!(shifted_marker.low_pc, marker.low_pc + 0x1000);
    }
}
