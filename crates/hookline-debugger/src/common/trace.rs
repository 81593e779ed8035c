use crate::sys::{self, Registers, Signal};

/// Reason why a tracee handed control back to the tracer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceStop {
    /// The tracee is stopped by a signal and can be inspected.
    Stopped(Signal),

    /// The tracee exited with the given code.
    Exited(i32),

    /// The tracee was killed by a signal.
    Signaled(Signal),
}

/// Run state of a tracee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Stopped, registers and memory can be accessed.
    NotRunning,

    /// Resumed, a stop must be waited for.
    Running,

    /// Exited or killed.
    Terminated,
}

/// Raw tracing primitives over a single-threaded tracee.
///
/// All operations but [`resume`](Self::resume), [`wait`](Self::wait) and
/// [`kill`](Self::kill) require the tracee to be stopped. [`Tracee`] keeps
/// track of that.
pub trait TraceOps {
    /// Process ID of the tracee.
    fn process_id(&self) -> u64;

    /// Resumes the tracee, delivering `signal` if any.
    fn resume(&mut self, signal: Option<Signal>) -> sys::Result<()>;

    /// Resumes the tracee for a single instruction.
    fn single_step(&mut self) -> sys::Result<()>;

    /// Blocks until the tracee changes state.
    fn wait(&mut self) -> sys::Result<TraceStop>;

    /// Fetches the registers.
    fn registers(&self) -> sys::Result<Registers>;

    /// Commits the registers.
    fn set_registers(&mut self, regs: &Registers) -> sys::Result<()>;

    /// Reads one word of memory.
    fn peek_word(&self, addr: u64) -> sys::Result<u64>;

    /// Writes one word of memory.
    fn poke_word(&mut self, addr: u64, word: u64) -> sys::Result<()>;

    /// Sends `SIGKILL` to the tracee.
    fn kill(&mut self) -> sys::Result<()>;
}

/// Tracing primitives guarded by the run state of the tracee.
///
/// Freshly created tracees are expected to be stopped.
#[derive(Debug)]
pub struct Tracee<T> {
    ops: T,
    state: RunState,
}

impl<T: TraceOps> Tracee<T> {
    /// Wraps the primitives of a stopped tracee.
    pub const fn new(ops: T) -> Self {
        Self {
            ops,
            state: RunState::NotRunning,
        }
    }

    /// Underlying primitives.
    pub const fn ops(&self) -> &T {
        &self.ops
    }

    /// Current run state.
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Fails unless the tracee is stopped.
    pub fn ensure_stopped(&self) -> crate::Result<()> {
        match self.state {
            RunState::NotRunning => Ok(()),
            RunState::Running => Err(crate::Error::TraceeRunning),
            RunState::Terminated => Err(crate::Error::TraceeTerminated),
        }
    }

    /// Resumes a stopped tracee. The state is left untouched on failure.
    pub fn resume(&mut self, signal: Option<Signal>) -> crate::Result<()> {
        self.ensure_stopped()?;
        self.ops.resume(signal).map_err(crate::Error::Trace)?;
        self.state = RunState::Running;
        Ok(())
    }

    /// Executes a single instruction and waits for the tracee to stop again.
    pub fn single_step(&mut self) -> crate::Result<TraceStop> {
        self.ensure_stopped()?;
        self.ops.single_step().map_err(crate::Error::Trace)?;
        self.state = RunState::Running;
        self.wait()
    }

    /// Waits for the tracee to change state.
    pub fn wait(&mut self) -> crate::Result<TraceStop> {
        if self.state == RunState::Terminated {
            return Err(crate::Error::TraceeTerminated);
        }

        let stop = self.ops.wait().map_err(crate::Error::Trace)?;

        self.state = match stop {
            TraceStop::Stopped(_) => RunState::NotRunning,
            TraceStop::Exited(_) | TraceStop::Signaled(_) => RunState::Terminated,
        };

        Ok(stop)
    }

    /// Fetches the registers of the stopped tracee.
    pub fn registers(&self) -> crate::Result<Registers> {
        self.ensure_stopped()?;
        self.ops.registers().map_err(crate::Error::Trace)
    }

    /// Commits the registers of the stopped tracee.
    pub fn set_registers(&mut self, regs: &Registers) -> crate::Result<()> {
        self.ensure_stopped()?;
        self.ops.set_registers(regs).map_err(crate::Error::Trace)
    }

    /// Sends `SIGKILL` to the tracee, whatever its state.
    ///
    /// The tracee must still be [waited](Self::wait) for.
    pub fn kill(&mut self) -> crate::Result<()> {
        if self.state == RunState::Terminated {
            return Ok(());
        }

        self.ops.kill().map_err(crate::Error::Trace)
    }

    pub(crate) fn peek_word(&self, addr: u64) -> crate::Result<u64> {
        self.ops
            .peek_word(addr)
            .map_err(|source| crate::Error::Memory { addr, source })
    }

    pub(crate) fn poke_word(&mut self, addr: u64, word: u64) -> crate::Result<()> {
        self.ops
            .poke_word(addr, word)
            .map_err(|source| crate::Error::Memory { addr, source })
    }
}

#[cfg(test)]
mod tests {
    use super::{RunState, TraceStop, Tracee};
    use crate::common::fake::{FakeEvent, FakeTracee};
    use crate::sys::Signal;

    #[test]
    fn state_machine() {
        let fake = FakeTracee::new(0x1000, 0x100).with_script([FakeEvent::Exit(7)]);
        let mut tracee = Tracee::new(fake);

        assert_eq!(tracee.state(), RunState::NotRunning);
        assert!(tracee.registers().is_ok());

        tracee.resume(None).unwrap();
        assert_eq!(tracee.state(), RunState::Running);
        assert!(matches!(tracee.registers(), Err(crate::Error::TraceeRunning)));
        assert!(matches!(tracee.resume(None), Err(crate::Error::TraceeRunning)));

        assert_eq!(tracee.wait().unwrap(), TraceStop::Exited(7));
        assert_eq!(tracee.state(), RunState::Terminated);
        assert!(matches!(tracee.resume(None), Err(crate::Error::TraceeTerminated)));
        assert!(matches!(tracee.wait(), Err(crate::Error::TraceeTerminated)));
    }

    #[test]
    fn failed_resume_keeps_state() {
        let mut fake = FakeTracee::new(0x1000, 0x100);
        fake.fail_resume = true;
        let mut tracee = Tracee::new(fake);

        assert!(matches!(tracee.resume(None), Err(crate::Error::Trace(_))));
        assert_eq!(tracee.state(), RunState::NotRunning);
    }

    #[test]
    fn signal_stop_keeps_tracee_inspectable() {
        let fake = FakeTracee::new(0x1000, 0x100).with_script([FakeEvent::Signal(Signal::SIGUSR1)]);
        let mut tracee = Tracee::new(fake);

        tracee.resume(None).unwrap();
        assert_eq!(tracee.wait().unwrap(), TraceStop::Stopped(Signal::SIGUSR1));
        assert_eq!(tracee.state(), RunState::NotRunning);
        assert!(tracee.registers().is_ok());
    }

    #[test]
    fn kill_then_reap() {
        let mut tracee = Tracee::new(FakeTracee::new(0x1000, 0x100));

        tracee.kill().unwrap();
        assert_eq!(tracee.wait().unwrap(), TraceStop::Signaled(Signal::SIGKILL));
        assert!(tracee.ops().killed);

        // killing a terminated tracee is a no-op
        tracee.kill().unwrap();
    }
}
