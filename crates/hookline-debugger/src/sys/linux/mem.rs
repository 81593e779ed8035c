use nix::sys::ptrace;
use nix::unistd::Pid;

/// Reads the word at `addr` from the memory of a stopped tracee.
pub fn peek_word(pid: Pid, addr: u64) -> crate::sys::Result<u64> {
    let word = ptrace::read(pid, addr as *mut _).inspect_err(
        |e| tracing::error!(error = %e, addr = format_args!("{addr:#x}"), "ptrace(PTRACE_PEEKDATA)"),
    )?;

    Ok(u64::from_ne_bytes(word.to_ne_bytes()))
}

/// Writes `word` at `addr` into the memory of a stopped tracee.
pub fn poke_word(pid: Pid, addr: u64, word: u64) -> crate::sys::Result<()> {
    let data = i64::from_ne_bytes(word.to_ne_bytes());

    ptrace::write(pid, addr as *mut _, data).inspect_err(
        |e| tracing::error!(error = %e, addr = format_args!("{addr:#x}"), "ptrace(PTRACE_POKEDATA)"),
    )?;

    Ok(())
}
