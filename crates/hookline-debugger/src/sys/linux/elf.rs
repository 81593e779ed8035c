use std::fs::File;
use std::io::Read;
use std::path::Path;

use goblin::elf::Elf;
use goblin::elf::header::ET_DYN;
use goblin::elf::header::header64::SIZEOF_EHDR;

/// Returns whether the ELF executable at `path` is position-independent,
/// i.e. whether it is relocated at load time.
pub fn is_position_independent(path: &Path) -> crate::sys::Result<bool> {
    let mut file = File::open(path).map_err(|e| crate::sys::Error::File(path.to_path_buf(), e))?;

    let mut header = [0u8; SIZEOF_EHDR];
    file.read_exact(&mut header)
        .map_err(|e| crate::sys::Error::File(path.to_path_buf(), e))?;

    let header = Elf::parse_header(&header)?;

    Ok(header.e_type == ET_DYN)
}
