use crate::common::trace::{TraceOps, Tracee};
use crate::sys;

/// Size of the unit of memory exchanged with the tracee.
pub const WORD_SIZE: usize = size_of::<u64>();

impl<T: TraceOps> Tracee<T> {
    /// Reads `len` bytes at `addr` from the memory of the stopped tracee.
    ///
    /// Memory is read one whole word at a time, starting from the aligned
    /// word containing `addr`.
    pub fn read_aligned(&self, addr: u64, len: usize) -> crate::Result<Vec<u8>> {
        self.ensure_stopped()?;

        let end = addr
            .checked_add(len as u64)
            .ok_or(crate::Error::Memory {
                addr,
                source: sys::Error::PartialMemOp(0, len),
            })?;

        let start = addr - addr % WORD_SIZE as u64;

        let mut data = Vec::with_capacity(len + 2 * WORD_SIZE);
        let mut read_addr = start;

        while read_addr < end {
            data.extend_from_slice(&self.peek_word(read_addr)?.to_ne_bytes());
            read_addr += WORD_SIZE as u64;
        }

        let skip = (addr - start) as usize;

        Ok(data.into_iter().skip(skip).take(len).collect())
    }

    /// Writes `buf` at `addr` into the memory of the stopped tracee.
    ///
    /// Memory is written one aligned word at a time. Words only partially
    /// covered by `buf` are merged with the memory they hold, so nothing
    /// outside `addr..addr + buf.len()` is modified. Returns the number of
    /// bytes written.
    pub fn write_aligned(&mut self, addr: u64, buf: &[u8]) -> crate::Result<usize> {
        self.ensure_stopped()?;

        let end = addr
            .checked_add(buf.len() as u64)
            .ok_or(crate::Error::Memory {
                addr,
                source: sys::Error::PartialMemOp(0, buf.len()),
            })?;

        let mut write_addr = addr - addr % WORD_SIZE as u64;

        while write_addr < end {
            let word_end = write_addr.saturating_add(WORD_SIZE as u64);

            let lo = addr.max(write_addr);
            let hi = end.min(word_end);

            let mut word = if lo == write_addr && hi == word_end {
                [0u8; WORD_SIZE]
            } else {
                self.peek_word(write_addr)?.to_ne_bytes()
            };

            word[(lo - write_addr) as usize..(hi - write_addr) as usize]
                .copy_from_slice(&buf[(lo - addr) as usize..(hi - addr) as usize]);

            self.poke_word(write_addr, u64::from_ne_bytes(word))?;

            write_addr = word_end;
        }

        Ok(buf.len())
    }

    /// Replaces the bytes at `addr` with `new`, returning the previous ones.
    pub fn swap_bytes(&mut self, addr: u64, new: &[u8]) -> crate::Result<Vec<u8>> {
        let old = self.read_aligned(addr, new.len())?;

        if old.len() != new.len() {
            return Err(crate::Error::Memory {
                addr,
                source: sys::Error::PartialMemOp(old.len(), new.len()),
            });
        }

        let written = self.write_aligned(addr, new)?;

        if written != new.len() {
            return Err(crate::Error::Memory {
                addr,
                source: sys::Error::PartialMemOp(written, new.len()),
            });
        }

        tracing::trace!(
            addr = format_args!("{addr:#x}"),
            old = ?old,
            new = ?new,
            "bytes swapped"
        );

        Ok(old)
    }
}
