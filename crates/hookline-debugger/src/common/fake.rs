//! In-memory tracee for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use nix::errno::Errno;

use crate::common::breakpoint::{TRAP_OPCODES, TRAP_PC_OFFSET};
use crate::common::trace::{TraceOps, TraceStop};
use crate::sys::{self, Registers, Signal};

/// What the fake tracee does when resumed.
#[derive(Clone, Copy, Debug)]
pub enum FakeEvent {
    /// Execution reaches `addr`, trapping if a trap instruction is there.
    Reach(u64),

    /// The tracee receives a signal.
    Signal(Signal),

    /// The tracee exits.
    Exit(i32),
}

pub struct FakeTracee {
    pub base: u64,
    pub memory: Rc<RefCell<Vec<u8>>>,
    pub regs: Registers,
    script: VecDeque<FakeEvent>,
    pending: Option<TraceStop>,
    /// Signal passed to each resume.
    pub delivered: Vec<Option<Signal>>,
    /// PC and bytes under it at each single-step.
    pub stepped_over: Vec<(u64, Vec<u8>)>,
    pub killed: bool,
    pub fail_resume: bool,
    /// Signals interrupting the next single-steps, before the step completes.
    pub step_signals: VecDeque<Signal>,
    /// Exit code reported instead of death by `SIGKILL` once killed.
    pub exit_on_kill: Option<i32>,
}

impl FakeTracee {
    /// Fake tracee with `len` bytes of memory mapped at `base`.
    ///
    /// Memory never contains trap opcodes initially.
    pub fn new(base: u64, len: usize) -> Self {
        let memory = (0..len).map(|i| (i % 0x80) as u8).collect();

        Self {
            base,
            memory: Rc::new(RefCell::new(memory)),
            regs: Registers::default(),
            script: VecDeque::new(),
            pending: None,
            delivered: Vec::new(),
            stepped_over: Vec::new(),
            killed: false,
            fail_resume: false,
            step_signals: VecDeque::new(),
            exit_on_kill: None,
        }
    }

    pub fn with_script(mut self, events: impl IntoIterator<Item = FakeEvent>) -> Self {
        self.script.extend(events);
        self
    }

    /// Bytes at `addr`.
    pub fn bytes(memory: &RefCell<Vec<u8>>, base: u64, addr: u64, len: usize) -> Vec<u8> {
        let offset = (addr - base) as usize;
        memory.borrow()[offset..offset + len].to_vec()
    }

    fn range(&self, addr: u64) -> sys::Result<std::ops::Range<usize>> {
        let len = self.memory.borrow().len() as u64;
        let word = size_of::<u64>() as u64;

        if addr < self.base || addr + word > self.base + len {
            return Err(sys::Error::Os(Errno::EIO));
        }

        let offset = (addr - self.base) as usize;
        Ok(offset..offset + word as usize)
    }

    fn is_trap(&self, addr: u64) -> bool {
        addr >= self.base
            && Self::bytes(&self.memory, self.base, addr, TRAP_OPCODES.len()) == TRAP_OPCODES
    }
}

impl TraceOps for FakeTracee {
    fn process_id(&self) -> u64 {
        4242
    }

    fn resume(&mut self, signal: Option<Signal>) -> sys::Result<()> {
        if self.fail_resume {
            return Err(sys::Error::Os(Errno::ESRCH));
        }

        self.delivered.push(signal);

        let stop = loop {
            match self.script.pop_front() {
                Some(FakeEvent::Reach(addr)) if self.is_trap(addr) => {
                    self.regs.set_instr_addr(addr + TRAP_PC_OFFSET);
                    break TraceStop::Stopped(Signal::SIGTRAP);
                }
                Some(FakeEvent::Reach(_)) => continue,
                Some(FakeEvent::Signal(signal)) => break TraceStop::Stopped(signal),
                Some(FakeEvent::Exit(code)) => break TraceStop::Exited(code),
                None => break TraceStop::Exited(0),
            }
        };

        self.pending = Some(stop);
        Ok(())
    }

    fn single_step(&mut self) -> sys::Result<()> {
        if let Some(signal) = self.step_signals.pop_front() {
            self.pending = Some(TraceStop::Stopped(signal));
            return Ok(());
        }

        let pc = self.regs.instr_addr();
        let under = Self::bytes(&self.memory, self.base, pc, TRAP_OPCODES.len());
        self.stepped_over.push((pc, under));

        // every fake instruction is one byte long
        self.regs.set_instr_addr(pc + 1);
        self.pending = Some(TraceStop::Stopped(Signal::SIGTRAP));
        Ok(())
    }

    fn wait(&mut self) -> sys::Result<TraceStop> {
        self.pending.take().ok_or(sys::Error::Os(Errno::ECHILD))
    }

    fn registers(&self) -> sys::Result<Registers> {
        Ok(self.regs)
    }

    fn set_registers(&mut self, regs: &Registers) -> sys::Result<()> {
        self.regs = *regs;
        Ok(())
    }

    fn peek_word(&self, addr: u64) -> sys::Result<u64> {
        let range = self.range(addr)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.memory.borrow()[range]);
        Ok(u64::from_ne_bytes(word))
    }

    fn poke_word(&mut self, addr: u64, word: u64) -> sys::Result<()> {
        let range = self.range(addr)?;
        self.memory.borrow_mut()[range].copy_from_slice(&word.to_ne_bytes());
        Ok(())
    }

    fn kill(&mut self) -> sys::Result<()> {
        self.killed = true;
        self.script.clear();
        self.pending = Some(match self.exit_on_kill {
            Some(code) => TraceStop::Exited(code),
            None => TraceStop::Signaled(Signal::SIGKILL),
        });
        Ok(())
    }
}
