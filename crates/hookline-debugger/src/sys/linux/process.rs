use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

use crate::common::trace::{TraceOps, TraceStop};
use crate::sys::Registers;

/// What to do with a tracee that is still alive when its session is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnDrop {
    /// Kill the tracee (it was launched by us).
    Kill,

    /// Let the tracee go on (it was attached to).
    Detach,
}

/// `ptrace` session over a single-threaded tracee.
#[derive(Debug)]
pub struct PtraceSession {
    pid: Pid,
    terminated: bool,
    on_drop: OnDrop,
}

impl PtraceSession {
    /// Creates a session over the already-traced process `pid`.
    pub const fn new(pid: Pid, on_drop: OnDrop) -> Self {
        Self {
            pid,
            terminated: false,
            on_drop,
        }
    }

    /// Returns the process ID of the tracee.
    pub const fn id(&self) -> Pid {
        self.pid
    }

    /// Returns a handle able to kill the tracee from any thread.
    pub const fn kill_handle(&self) -> KillHandle {
        KillHandle { pid: self.pid }
    }
}

impl TraceOps for PtraceSession {
    fn process_id(&self) -> u64 {
        self.pid.as_raw() as u64
    }

    fn resume(&mut self, signal: Option<Signal>) -> crate::sys::Result<()> {
        ptrace::cont(self.pid, signal)
            .inspect_err(|e| tracing::error!(error = %e, pid = self.pid.as_raw(), "ptrace(PTRACE_CONT)"))?;
        Ok(())
    }

    fn single_step(&mut self) -> crate::sys::Result<()> {
        ptrace::step(self.pid, None)
            .inspect_err(|e| tracing::error!(error = %e, pid = self.pid.as_raw(), "ptrace(PTRACE_SINGLESTEP)"))?;
        Ok(())
    }

    fn wait(&mut self) -> crate::sys::Result<TraceStop> {
        loop {
            let status = waitpid(self.pid, None)
                .inspect_err(|e| tracing::error!(error = %e, pid = self.pid.as_raw(), "waitpid"))?;

            let stop = match status {
                WaitStatus::Exited(_, code) => TraceStop::Exited(code),
                WaitStatus::Signaled(_, signal, _) => TraceStop::Signaled(signal),
                WaitStatus::Stopped(_, signal) | WaitStatus::PtraceEvent(_, signal, _) => {
                    TraceStop::Stopped(signal)
                }
                WaitStatus::Continued(_) => continue,
                status => return Err(crate::sys::Error::BadChildWait(status)),
            };

            if matches!(stop, TraceStop::Exited(_) | TraceStop::Signaled(_)) {
                self.terminated = true;
            }

            return Ok(stop);
        }
    }

    fn registers(&self) -> crate::sys::Result<Registers> {
        super::regs::get_registers(self.pid)
    }

    fn set_registers(&mut self, regs: &Registers) -> crate::sys::Result<()> {
        super::regs::set_registers(self.pid, regs)
    }

    fn peek_word(&self, addr: u64) -> crate::sys::Result<u64> {
        super::mem::peek_word(self.pid, addr)
    }

    fn poke_word(&mut self, addr: u64, word: u64) -> crate::sys::Result<()> {
        super::mem::poke_word(self.pid, addr, word)
    }

    fn kill(&mut self) -> crate::sys::Result<()> {
        self.kill_handle().kill()
    }
}

impl Drop for PtraceSession {
    fn drop(&mut self) {
        if self.terminated {
            return;
        }

        let res = match self.on_drop {
            OnDrop::Kill => signal::kill(self.pid, Signal::SIGKILL)
                .and_then(|_| waitpid(self.pid, None).map(|_| ())),
            OnDrop::Detach => ptrace::detach(self.pid, None),
        };

        match res {
            Ok(()) => tracing::debug!(pid = self.pid.as_raw(), on_drop = ?self.on_drop, "tracee released"),
            Err(Errno::ESRCH | Errno::ECHILD) => (),
            Err(e) => tracing::error!(error = %e, pid = self.pid.as_raw(), "failed to release tracee"),
        }
    }
}

/// Handle killing a tracee by process ID.
///
/// Unlike the tracee itself, it can be sent to another thread, e.g. to stop
/// a blocking event loop on Ctrl-C.
#[derive(Clone, Copy, Debug)]
pub struct KillHandle {
    pid: Pid,
}

impl KillHandle {
    /// Sends `SIGKILL` to the tracee.
    ///
    /// A tracee that has already terminated is not an error.
    pub fn kill(&self) -> crate::sys::Result<()> {
        match signal::kill(self.pid, Signal::SIGKILL) {
            Ok(()) => {
                tracing::debug!(pid = self.pid.as_raw(), "SIGKILL sent");
                Ok(())
            }
            Err(Errno::ESRCH) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, pid = self.pid.as_raw(), "kill");
                Err(e.into())
            }
        }
    }
}
