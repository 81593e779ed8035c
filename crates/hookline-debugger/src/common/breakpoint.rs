use std::fmt;

use crate::common::trace::{TraceOps, Tracee};
use crate::sys::Registers;

#[cfg(target_arch = "aarch64")]
pub const TRAP_OPCODES: [u8; 4] = [0x0, 0x0, 0x20, 0xd4];
#[cfg(target_arch = "x86_64")]
pub const TRAP_OPCODES: [u8; 1] = [0xcc];

/// Distance between a trap instruction and the PC reported when it fires.
#[cfg(target_arch = "aarch64")]
pub const TRAP_PC_OFFSET: u64 = 0;
#[cfg(target_arch = "x86_64")]
pub const TRAP_PC_OFFSET: u64 = TRAP_OPCODES.len() as u64;

/// Identifier of a breakpoint within its process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointId(pub(crate) u64);

impl fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What to do once a breakpoint callback returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Action {
    /// Re-arm the breakpoint and resume the tracee.
    #[default]
    Continue,

    /// Kill the tracee and stop the event loop.
    Abort,
}

/// Whether the trap instruction of a breakpoint is in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakpointState {
    /// The trap is in place, `original` holds the bytes it replaced.
    Armed {
        /// Bytes replaced by the trap instruction.
        original: [u8; TRAP_OPCODES.len()],
    },

    /// The original bytes are in place.
    Disarmed,
}

/// Callback invoked when a breakpoint is hit.
///
/// It receives the registers of the tracee, with the PC set to the address of
/// the breakpoint.
pub type BreakpointCallback = Box<dyn FnMut(&Registers) -> Action>;

/// Software breakpoint.
pub struct Breakpoint {
    id: BreakpointId,
    addr: u64,
    location: String,
    state: BreakpointState,
    callback: BreakpointCallback,
    hit_count: u64,
}

impl Breakpoint {
    pub(crate) fn new(
        id: BreakpointId,
        addr: u64,
        location: impl Into<String>,
        callback: BreakpointCallback,
    ) -> Self {
        Self {
            id,
            addr,
            location: location.into(),
            state: BreakpointState::Disarmed,
            callback,
            hit_count: 0,
        }
    }

    /// Identifier of the breakpoint.
    pub const fn id(&self) -> BreakpointId {
        self.id
    }

    /// Address of the breakpoint.
    pub const fn addr(&self) -> u64 {
        self.addr
    }

    /// Location the breakpoint was installed from.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Current state.
    pub const fn state(&self) -> BreakpointState {
        self.state
    }

    /// Returns whether the trap instruction is in place.
    pub const fn is_armed(&self) -> bool {
        matches!(self.state, BreakpointState::Armed { .. })
    }

    /// Number of times the breakpoint was hit.
    pub const fn hit_count(&self) -> u64 {
        self.hit_count
    }

    /// PC reported by the tracee when the trap of this breakpoint fires.
    pub(crate) const fn trap_pc(&self) -> u64 {
        self.addr.wrapping_add(TRAP_PC_OFFSET)
    }

    pub(crate) fn arm<T: TraceOps>(&mut self, tracee: &mut Tracee<T>) -> crate::Result<()> {
        if self.is_armed() {
            return Ok(());
        }

        let old = tracee.swap_bytes(self.addr, &TRAP_OPCODES)?;

        let mut original = [0u8; TRAP_OPCODES.len()];
        original.copy_from_slice(&old);

        if original == TRAP_OPCODES {
            tracing::warn!(
                addr = format_args!("{:#x}", self.addr),
                "trap instruction already present"
            );
        }

        self.state = BreakpointState::Armed { original };

        tracing::trace!(id = %self.id, addr = format_args!("{:#x}", self.addr), "armed");

        Ok(())
    }

    pub(crate) fn disarm<T: TraceOps>(&mut self, tracee: &mut Tracee<T>) -> crate::Result<()> {
        let BreakpointState::Armed { original } = self.state else {
            return Ok(());
        };

        let replaced = tracee.swap_bytes(self.addr, &original)?;

        if replaced != TRAP_OPCODES {
            tracing::warn!(
                addr = format_args!("{:#x}", self.addr),
                found = ?replaced,
                "trap instruction was overwritten"
            );
        }

        self.state = BreakpointState::Disarmed;

        tracing::trace!(id = %self.id, addr = format_args!("{:#x}", self.addr), "disarmed");

        Ok(())
    }

    pub(crate) fn toggle<T: TraceOps>(&mut self, tracee: &mut Tracee<T>) -> crate::Result<()> {
        if self.is_armed() {
            self.disarm(tracee)
        } else {
            self.arm(tracee)
        }
    }

    /// Runs the callback and records the hit.
    pub(crate) fn hit(&mut self, regs: &Registers) -> Action {
        let action = (self.callback)(regs);
        self.hit_count += 1;
        action
    }
}

impl fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breakpoint")
            .field("id", &self.id)
            .field("addr", &format_args!("{:#x}", self.addr))
            .field("location", &self.location)
            .field("state", &self.state)
            .field("hit_count", &self.hit_count)
            .finish_non_exhaustive()
    }
}
