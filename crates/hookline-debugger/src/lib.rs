//! Breakpoint engine for Linux processes.
//!
//! A [`Process`] is launched (or attached to) stopped. Software breakpoints
//! are installed at [locations](hookline_symbol::location) resolved against
//! the debug information of the executable, then [`Process::run`] drives the
//! tracee, calling back into user code on every hit.
//!
//! ```no_run
//! use hookline_debugger::{Action, Command, Process};
//!
//! # fn main() -> hookline_debugger::Result<()> {
//! let mut process = Process::launch(Command::new("./hello").arg("world"))?;
//!
//! process.add_breakpoint("hello.c:main", |regs| {
//!     tracing::info!(pc = regs.instr_addr(), "main reached");
//!     Action::Continue
//! })?;
//!
//! let termination = process.run()?;
//! # let _ = termination;
//! # Ok(())
//! # }
//! ```
//!
//! # Supported Platforms
//!
//! <table>
//!     <thead>
//!         <tr>
//!             <th>Host Machine</th>
//!             <th>Tracee Platform</th>
//!         </tr>
//!     </thead>
//!     <tbody>
//!         <tr>
//!             <td>Linux <code>x86_64</code></td>
//!             <td><code>x86_64</code></td>
//!         </tr>
//!         <tr>
//!             <td>Linux <code>aarch64</code></td>
//!             <td><code>aarch64</code></td>
//!         </tr>
//!     </tbody>
//! </table>

mod common;
mod error;
pub mod sys;

pub use self::common::breakpoint::{
    Action, Breakpoint, BreakpointCallback, BreakpointId, BreakpointState, TRAP_OPCODES,
};
pub use self::common::command::{Command, CommandEnv, StdioMode};
pub use self::common::maps::{MemoryMap, MemoryRegion};
pub use self::common::memory::WORD_SIZE;
pub use self::common::process::{Process, Termination, TraceeStdio};
pub use self::common::trace::{RunState, TraceOps, TraceStop, Tracee};
pub use self::error::{Error, Result};
pub use self::sys::{KillHandle, PtraceSession, Registers, Signal};
