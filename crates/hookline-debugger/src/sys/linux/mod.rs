mod error;
mod elf;
mod mem;
mod process;
mod regs;

use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Stdio};

use nix::sys::ptrace;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

pub use nix::errno::Errno;
pub use nix::sys::signal::Signal;

pub use self::elf::is_position_independent;
pub use self::error::{Error, Result};
pub use self::process::{KillHandle, OnDrop, PtraceSession};
pub use self::regs::Registers;
use crate::common::command::{Command, CommandEnv, StdioMode};

/// Spawns the program at `program` as a traced child process.
///
/// The child is stopped on its first instruction when this returns.
pub fn spawn_tracee(command: &Command, program: &Path) -> crate::sys::Result<(PtraceSession, Child)> {
    let mut cmd = std::process::Command::new(program);

    cmd.args(&command.args);

    match &command.env {
        CommandEnv::Inherit(env) => {
            for (key, val) in env {
                match val {
                    Some(val) => cmd.env(key, val),
                    None => cmd.env_remove(key),
                };
            }
        }
        CommandEnv::NoInherit(env) => {
            cmd.env_clear().envs(env);
        }
    }

    if let Some(dir) = &command.current_dir {
        cmd.current_dir(dir);
    }

    let stdio = || match command.stdio {
        StdioMode::Inherit => Stdio::inherit(),
        StdioMode::Piped => Stdio::piped(),
        StdioMode::Null => Stdio::null(),
    };

    cmd.stdin(stdio()).stdout(stdio()).stderr(stdio());

    // On Linux, if a `pre_exec` closure is specified, `rust-std` will
    // spawn the process with `fork`+`exec`, otherwise `posix_spawn` is used.
    unsafe {
        cmd.pre_exec(|| ptrace::traceme().map_err(|e| io::Error::from_raw_os_error(e as i32)))
    };

    let child = cmd.spawn().map_err(crate::sys::Error::ChildExec)?;

    let pid = Pid::from_raw(child.id() as i32);

    // from now on, the session kills the child if anything goes wrong
    let session = PtraceSession::new(pid, OnDrop::Kill);

    wait_for_exec_stop(pid)?;

    tracing::debug!(pid = pid.as_raw(), "tracee spawned");

    Ok((session, child))
}

/// Attaches to the running process `pid`.
///
/// The process is stopped when this returns.
pub fn attach_tracee(pid: u64) -> crate::sys::Result<PtraceSession> {
    let pid = Pid::from_raw(pid as i32);

    ptrace::attach(pid).inspect_err(|e| tracing::error!(error = %e, pid = pid.as_raw(), "ptrace(PTRACE_ATTACH)"))?;

    let session = PtraceSession::new(pid, OnDrop::Detach);

    loop {
        match waitpid(pid, None)? {
            WaitStatus::Stopped(_, Signal::SIGSTOP) => break,
            // not ours, deliver it and keep waiting
            WaitStatus::Stopped(_, signal) => ptrace::cont(pid, signal)?,
            status => return Err(crate::sys::Error::BadChildWait(status)),
        }
    }

    tracing::debug!(pid = pid.as_raw(), "tracee attached");

    Ok(session)
}

fn wait_for_exec_stop(pid: Pid) -> crate::sys::Result<()> {
    let status = waitpid(pid, None)?;

    if !matches!(status, WaitStatus::Stopped(_, Signal::SIGTRAP)) {
        return Err(crate::sys::Error::BadChildWait(status));
    }

    ptrace::setoptions(pid, ptrace::Options::PTRACE_O_EXITKILL)?;

    Ok(())
}
