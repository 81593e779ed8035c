use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ChildStderr, ChildStdin, ChildStdout};

use hookline_symbol::SymbolTable;

use crate::common::breakpoint::{Action, Breakpoint, BreakpointId};
use crate::common::command::Command;
use crate::common::maps::MemoryMap;
use crate::common::trace::{RunState, TraceOps, TraceStop, Tracee};
use crate::sys::{self, Errno, KillHandle, PtraceSession, Registers, Signal};

/// How a traced process ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The tracee exited with the given code.
    Exited(i32),

    /// The tracee was killed by a signal.
    Signaled(Signal),

    /// A breakpoint callback requested the tracee to be killed.
    ///
    /// A tracee exiting on its own before the kill lands ends as
    /// [`Exited`](Self::Exited) instead.
    Aborted {
        /// Breakpoint whose callback returned [`Action::Abort`].
        breakpoint: BreakpointId,
        /// Signal the tracee died from.
        signal: Signal,
    },
}

impl Termination {
    /// Exit code a shell would report for this termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            Self::Signaled(signal) | Self::Aborted { signal, .. } => 128 + *signal as i32,
        }
    }
}

/// Standard streams of a launched tracee, when [piped](crate::StdioMode::Piped).
#[derive(Debug, Default)]
pub struct TraceeStdio {
    /// Standard input.
    pub stdin: Option<ChildStdin>,

    /// Standard output.
    pub stdout: Option<ChildStdout>,

    /// Standard error.
    pub stderr: Option<ChildStderr>,
}

/// Traced process.
///
/// A process is created stopped. Breakpoints are installed with
/// [`add_breakpoint`](Self::add_breakpoint), then [`run`](Self::run) drives
/// the tracee until it terminates, invoking breakpoint callbacks along the
/// way.
pub struct Process<T: TraceOps = PtraceSession> {
    tracee: Tracee<T>,
    path: PathBuf,
    symbols: Option<SymbolTable>,
    memory_map: MemoryMap,
    stdio: TraceeStdio,
    breakpoints: Vec<Breakpoint>,
    next_breakpoint_id: u64,
    registers: Option<Registers>,
    pending_signals: VecDeque<Signal>,
}

impl Process<PtraceSession> {
    /// Launches a program as a tracee.
    ///
    /// The returned process is stopped on its first instruction. Its symbol
    /// table is extracted from the program's debug information, if any.
    #[tracing::instrument(name = "Launch", skip_all, fields(program = %command.program.display()))]
    pub fn launch(command: Command) -> crate::Result<Self> {
        let program = command.resolve_program().ok_or_else(|| {
            crate::Error::Launch(
                command.program.clone(),
                sys::Error::File(command.program.clone(), io::ErrorKind::NotFound.into()),
            )
        })?;

        let (session, mut child) = sys::spawn_tracee(&command, &program)
            .map_err(|e| crate::Error::Launch(program.clone(), e))?;

        let stdio = TraceeStdio {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
        };

        // memory maps show canonical paths
        let path = program.canonicalize().unwrap_or(program);

        Self::load(session, path, stdio)
    }

    /// Attaches to a running (single-threaded) process.
    ///
    /// The process is stopped when this returns, and is detached from (not
    /// killed) when dropped.
    #[tracing::instrument(name = "Attach", skip_all, fields(pid = pid))]
    pub fn attach(pid: u64) -> crate::Result<Self> {
        let session = sys::attach_tracee(pid).map_err(|e| crate::Error::Attach(pid, e))?;

        let exe = PathBuf::from(format!("/proc/{pid}/exe"));

        let path = std::fs::read_link(&exe)
            .map_err(|e| crate::Error::Attach(pid, sys::Error::File(exe, e)))?;

        Self::load(session, path, TraceeStdio::default())
    }

    fn load(session: PtraceSession, path: PathBuf, stdio: TraceeStdio) -> crate::Result<Self> {
        let pid = session.process_id();

        let memory_map = MemoryMap::from_pid(pid)
            .inspect_err(|e| tracing::warn!(error = %e, pid, "memory map unavailable"))
            .unwrap_or_default();

        let symbols = symbol_table(&path, load_offset(&path, &memory_map));

        tracing::info!(pid, path = %path.display(), "tracee loaded");

        let mut process = Self::new(session, path, memory_map, symbols);
        process.stdio = stdio;

        Ok(process)
    }

    /// Returns a handle able to kill the tracee from another thread, e.g.
    /// while [`run`](Self::run) blocks.
    pub fn kill_handle(&self) -> KillHandle {
        self.tracee.ops().kill_handle()
    }
}

impl<T: TraceOps> Process<T> {
    /// Creates a process over the primitives of a stopped tracee.
    pub fn new(
        ops: T,
        path: impl Into<PathBuf>,
        memory_map: MemoryMap,
        symbols: Option<SymbolTable>,
    ) -> Self {
        Self {
            tracee: Tracee::new(ops),
            path: path.into(),
            symbols,
            memory_map,
            stdio: TraceeStdio::default(),
            breakpoints: Vec::new(),
            next_breakpoint_id: 1,
            registers: None,
            pending_signals: VecDeque::new(),
        }
    }

    /// Process ID of the tracee.
    pub fn pid(&self) -> u64 {
        self.tracee.ops().process_id()
    }

    /// Path of the executable backing the tracee.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Symbol table of the executable, if it has debug information.
    pub fn symbols(&self) -> Option<&SymbolTable> {
        self.symbols.as_ref()
    }

    /// Memory map captured at load time (or at the last refresh).
    pub fn memory_map(&self) -> &MemoryMap {
        &self.memory_map
    }

    /// Captures the memory map of the tracee again.
    pub fn refresh_memory_map(&mut self) -> crate::Result<&MemoryMap> {
        self.memory_map = MemoryMap::from_pid(self.pid()).map_err(crate::Error::Trace)?;
        Ok(&self.memory_map)
    }

    /// Start address of the executable code of the tracee's executable.
    pub fn find_text_section(&self) -> Option<u64> {
        self.memory_map
            .text_region_of(&self.path)
            .map(|region| region.address)
    }

    /// Takes the piped standard streams of the tracee.
    pub fn take_stdio(&mut self) -> TraceeStdio {
        std::mem::take(&mut self.stdio)
    }

    /// Current run state.
    pub const fn state(&self) -> RunState {
        self.tracee.state()
    }

    /// Fetches the registers of the stopped tracee.
    pub fn registers(&mut self) -> crate::Result<Registers> {
        let regs = self.tracee.registers()?;
        self.registers = Some(regs);
        Ok(regs)
    }

    /// Registers fetched at the last stop, if any.
    pub const fn cached_registers(&self) -> Option<&Registers> {
        self.registers.as_ref()
    }

    /// Commits the registers of the stopped tracee.
    pub fn set_registers(&mut self, regs: &Registers) -> crate::Result<()> {
        self.tracee.set_registers(regs)?;
        self.registers = Some(*regs);
        Ok(())
    }

    /// Reads memory of the stopped tracee.
    ///
    /// Armed breakpoints show up as trap instructions.
    pub fn read_memory(&self, addr: u64, len: usize) -> crate::Result<Vec<u8>> {
        self.tracee.read_aligned(addr, len)
    }

    /// Writes memory of the stopped tracee, returning the number of bytes
    /// written.
    pub fn write_memory(&mut self, addr: u64, buf: &[u8]) -> crate::Result<usize> {
        self.tracee.write_aligned(addr, buf)
    }

    /// Replaces memory of the stopped tracee, returning the previous bytes.
    pub fn swap_bytes(&mut self, addr: u64, new: &[u8]) -> crate::Result<Vec<u8>> {
        self.tracee.swap_bytes(addr, new)
    }

    /// Breakpoints, in installation order.
    pub fn breakpoints(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.iter()
    }

    /// Returns the breakpoint with the given identifier.
    pub fn breakpoint(&self, id: BreakpointId) -> Option<&Breakpoint> {
        self.breakpoints.iter().find(|bp| bp.id() == id)
    }

    /// Installs a breakpoint at `location` (see [`hookline_symbol::location`]).
    ///
    /// `callback` runs each time the breakpoint is hit. Nothing is patched
    /// if the location can't be resolved or the memory can't be written.
    pub fn add_breakpoint<F>(&mut self, location: &str, callback: F) -> crate::Result<BreakpointId>
    where
        F: FnMut(&Registers) -> Action + 'static,
    {
        let addr = hookline_symbol::location::resolve(location, self.symbols.as_ref())
            .inspect_err(|e| tracing::warn!(error = %e, location, "unresolved location"))?;

        if self.breakpoints.iter().any(|bp| bp.addr() == addr) {
            return Err(crate::Error::BreakpointExists(addr));
        }

        let id = BreakpointId(self.next_breakpoint_id);

        let mut bp = Breakpoint::new(id, addr, location, Box::new(callback));
        bp.arm(&mut self.tracee)?;

        tracing::info!(%id, location, addr = format_args!("{addr:#x}"), "breakpoint installed");

        self.next_breakpoint_id += 1;
        self.breakpoints.push(bp);

        Ok(id)
    }

    /// Arms a disarmed breakpoint, or disarms an armed one.
    ///
    /// Returns whether the breakpoint is armed afterwards.
    pub fn toggle_breakpoint(&mut self, id: BreakpointId) -> crate::Result<bool> {
        let index = self.breakpoint_index(id)?;
        let bp = &mut self.breakpoints[index];

        bp.toggle(&mut self.tracee)?;

        Ok(bp.is_armed())
    }

    /// Uninstalls a breakpoint, restoring the original bytes if needed.
    pub fn remove_breakpoint(&mut self, id: BreakpointId) -> crate::Result<()> {
        let index = self.breakpoint_index(id)?;

        if self.tracee.state() != RunState::Terminated {
            self.breakpoints[index].disarm(&mut self.tracee)?;
        }

        self.breakpoints.remove(index);

        Ok(())
    }

    fn breakpoint_index(&self, id: BreakpointId) -> crate::Result<usize> {
        self.breakpoints
            .iter()
            .position(|bp| bp.id() == id)
            .ok_or(crate::Error::UnknownBreakpoint(id))
    }

    /// Resumes the stopped tracee, delivering the oldest signal it received
    /// while stopped, if any.
    pub fn continue_(&mut self) -> crate::Result<()> {
        let signal = self.pending_signals.pop_front();

        self.tracee.resume(signal).inspect_err(|_| {
            if let Some(signal) = signal {
                self.pending_signals.push_front(signal);
            }
        })
    }

    /// Drives the tracee until it terminates.
    ///
    /// Breakpoint callbacks run from here. Signals other than the ones used
    /// for tracing are delivered to the tracee.
    #[tracing::instrument(name = "EventLoop", skip_all, fields(pid = self.pid()))]
    pub fn run(&mut self) -> crate::Result<Termination> {
        loop {
            if self.tracee.state() == RunState::NotRunning {
                match self.continue_() {
                    Ok(()) => (),
                    // killed behind our back, its death is still to be reaped
                    Err(crate::Error::Trace(sys::Error::Os(Errno::ESRCH))) => {
                        tracing::debug!("tracee vanished");
                    }
                    Err(e) => return Err(e),
                }
            }

            match self.tracee.wait()? {
                TraceStop::Exited(code) => {
                    tracing::info!(code, "tracee exited");
                    return Ok(Termination::Exited(code));
                }
                TraceStop::Signaled(signal) => {
                    tracing::info!(?signal, "tracee killed");
                    return Ok(Termination::Signaled(signal));
                }
                TraceStop::Stopped(Signal::SIGTRAP) => {
                    if let Some(termination) = self.handle_trap()? {
                        return Ok(termination);
                    }
                }
                TraceStop::Stopped(Signal::SIGSTOP) => tracing::debug!("SIGSTOP suppressed"),
                TraceStop::Stopped(signal) => {
                    tracing::debug!(?signal, "forwarding signal");
                    self.pending_signals.push_back(signal);
                }
            }
        }
    }

    /// Sends `SIGKILL` to the tracee.
    pub fn kill(&mut self) -> crate::Result<()> {
        self.tracee.kill()
    }

    fn handle_trap(&mut self) -> crate::Result<Option<Termination>> {
        let regs = self.registers()?;
        let pc = regs.instr_addr();

        let Some(index) = self
            .breakpoints
            .iter()
            .position(|bp| bp.is_armed() && bp.trap_pc() == pc)
        else {
            tracing::debug!(pc = format_args!("{pc:#x}"), "trap outside of any breakpoint");
            return Ok(None);
        };

        self.on_hit(index, regs)
    }

    fn on_hit(&mut self, index: usize, mut regs: Registers) -> crate::Result<Option<Termination>> {
        let bp = &mut self.breakpoints[index];
        let id = bp.id();
        let addr = bp.addr();

        let _span = tracing::debug_span!("Hit", %id, addr = format_args!("{addr:#x}")).entered();

        bp.disarm(&mut self.tracee)?;

        regs.set_instr_addr(addr);
        self.tracee.set_registers(&regs)?;
        self.registers = Some(regs);

        // execute the original instruction
        let stepped_termination = loop {
            match self.tracee.single_step()? {
                TraceStop::Stopped(Signal::SIGTRAP) => break None,
                TraceStop::Stopped(signal) => {
                    tracing::debug!(?signal, "signal during single-step");
                    self.pending_signals.push_back(signal);
                }
                TraceStop::Exited(code) => break Some(Termination::Exited(code)),
                TraceStop::Signaled(signal) => break Some(Termination::Signaled(signal)),
            }
        };

        let action = bp.hit(&regs);

        tracing::debug!(?action, hits = bp.hit_count(), "breakpoint hit");

        if let Some(termination) = stepped_termination {
            return Ok(Some(termination));
        }

        match action {
            Action::Continue => {
                bp.arm(&mut self.tracee)?;
                Ok(None)
            }
            Action::Abort => self.abort(id).map(Some),
        }
    }

    fn abort(&mut self, breakpoint: BreakpointId) -> crate::Result<Termination> {
        tracing::info!(%breakpoint, "aborting");

        self.tracee.kill()?;

        loop {
            match self.tracee.wait()? {
                TraceStop::Exited(code) => {
                    tracing::info!(code, "tracee exited before being killed");
                    return Ok(Termination::Exited(code));
                }
                TraceStop::Signaled(signal) => {
                    return Ok(Termination::Aborted { breakpoint, signal });
                }
                TraceStop::Stopped(_) => self.tracee.resume(None)?,
            }
        }
    }
}

impl<T: TraceOps> fmt::Debug for Process<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid())
            .field("path", &self.path)
            .field("state", &self.state())
            .field("breakpoints", &self.breakpoints)
            .finish_non_exhaustive()
    }
}

/// Extracts the symbol table of the executable at `path`.
///
/// Without a usable symbol table, only raw addresses can be resolved, so any
/// extraction failure is logged and yields `None`.
fn symbol_table(path: &Path, load_offset: u64) -> Option<SymbolTable> {
    hookline_symbol::dwarf::extract_symbol_table(path, load_offset)
        .inspect_err(|e| {
            tracing::warn!(error = %e, "no symbol table, only addresses can be resolved");
        })
        .ok()
}

fn load_offset(path: &Path, memory_map: &MemoryMap) -> u64 {
    match sys::is_position_independent(path) {
        Ok(true) => match memory_map.base_region_of(path) {
            Some(region) => region.address,
            None => {
                tracing::warn!("load address of position-independent executable not found");
                0
            }
        },
        Ok(false) => 0,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read ELF header");
            0
        }
    }
}
