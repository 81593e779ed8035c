use std::ffi::c_void;
use std::fmt;
use std::mem;

use nix::errno::Errno;
use nix::libc;
use nix::sys::ptrace;
use nix::unistd::Pid;

#[cfg(target_arch = "x86_64")]
const GENERAL_PURPOSE: [&str; 18] = [
    "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "rbp", "rsp", "r8", "r9", "r10", "r11", "r12",
    "r13", "r14", "r15", "rip", "eflags",
];

#[cfg(target_arch = "aarch64")]
const GENERAL_PURPOSE: [&str; 34] = [
    "x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8", "x9", "x10", "x11", "x12", "x13",
    "x14", "x15", "x16", "x17", "x18", "x19", "x20", "x21", "x22", "x23", "x24", "x25", "x26",
    "x27", "x28", "x29", "x30", "sp", "pc", "pstate",
];

/// Snapshot of the general-purpose registers of a stopped tracee.
#[derive(Clone, Copy)]
pub struct Registers(libc::user_regs_struct);

impl Registers {
    /// Wraps a raw register set.
    pub const fn from_raw(raw: libc::user_regs_struct) -> Self {
        Self(raw)
    }

    /// Raw register set, as exchanged with the kernel.
    pub const fn raw(&self) -> &libc::user_regs_struct {
        &self.0
    }

    /// Mutable access to the raw register set.
    pub const fn raw_mut(&mut self) -> &mut libc::user_regs_struct {
        &mut self.0
    }

    /// Program counter.
    pub const fn instr_addr(&self) -> u64 {
        #[cfg(target_arch = "x86_64")]
        {
            self.0.rip
        }
        #[cfg(target_arch = "aarch64")]
        {
            self.0.pc
        }
    }

    /// Sets the program counter.
    pub const fn set_instr_addr(&mut self, addr: u64) {
        #[cfg(target_arch = "x86_64")]
        {
            self.0.rip = addr;
        }
        #[cfg(target_arch = "aarch64")]
        {
            self.0.pc = addr;
        }
    }

    /// Stack pointer.
    pub const fn stack_ptr(&self) -> u64 {
        #[cfg(target_arch = "x86_64")]
        {
            self.0.rsp
        }
        #[cfg(target_arch = "aarch64")]
        {
            self.0.sp
        }
    }

    /// Register holding a function's return value.
    pub const fn return_value(&self) -> u64 {
        #[cfg(target_arch = "x86_64")]
        {
            self.0.rax
        }
        #[cfg(target_arch = "aarch64")]
        {
            self.0.regs[0]
        }
    }

    /// Integer argument `index` of the calling convention (System V on
    /// `x86_64`, AAPCS64 on `aarch64`), when passed in a register.
    ///
    /// Only meaningful when stopped on the first instruction of a function.
    pub const fn arg(&self, index: usize) -> Option<u64> {
        #[cfg(target_arch = "x86_64")]
        {
            match index {
                0 => Some(self.0.rdi),
                1 => Some(self.0.rsi),
                2 => Some(self.0.rdx),
                3 => Some(self.0.rcx),
                4 => Some(self.0.r8),
                5 => Some(self.0.r9),
                _ => None,
            }
        }
        #[cfg(target_arch = "aarch64")]
        {
            if index < 8 {
                Some(self.0.regs[index])
            } else {
                None
            }
        }
    }

    /// Named general-purpose registers, in conventional order.
    pub fn general_purpose(&self) -> Vec<(&'static str, u64)> {
        #[cfg(target_arch = "x86_64")]
        let values = {
            let r = &self.0;
            [
                r.rax, r.rbx, r.rcx, r.rdx, r.rsi, r.rdi, r.rbp, r.rsp, r.r8, r.r9, r.r10, r.r11,
                r.r12, r.r13, r.r14, r.r15, r.rip, r.eflags,
            ]
        };
        #[cfg(target_arch = "aarch64")]
        let values = {
            let mut values = [0u64; 34];
            values[..31].copy_from_slice(&self.0.regs);
            values[31] = self.0.sp;
            values[32] = self.0.pc;
            values[33] = self.0.pstate;
            values
        };

        GENERAL_PURPOSE.into_iter().zip(values).collect()
    }
}

impl Default for Registers {
    fn default() -> Self {
        // SAFETY: `user_regs_struct` only holds integers.
        Self(unsafe { mem::zeroed() })
    }
}

impl fmt::Debug for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Registers");
        for (name, value) in self.general_purpose() {
            s.field(name, &format_args!("{value:#x}"));
        }
        s.finish()
    }
}

/// Fetches the registers of a stopped tracee.
pub fn get_registers(pid: Pid) -> crate::sys::Result<Registers> {
    let mut data = mem::MaybeUninit::<libc::user_regs_struct>::uninit();

    let mut iov = libc::iovec {
        iov_base: data.as_mut_ptr().cast(),
        iov_len: mem::size_of::<libc::user_regs_struct>(),
    };

    unsafe {
        Errno::result(libc::ptrace(
            ptrace::Request::PTRACE_GETREGSET as u32,
            pid.as_raw(),
            libc::NT_PRSTATUS,
            &mut iov as *mut libc::iovec,
        ))
        .inspect_err(|e| tracing::error!(error = %e, pid = pid.as_raw(), "ptrace(PTRACE_GETREGSET)"))?
    };

    if iov.iov_len != mem::size_of::<libc::user_regs_struct>() {
        return Err(crate::sys::Error::RegisterSetSize(iov.iov_len));
    }

    // SAFETY: the kernel filled the whole structure.
    Ok(Registers(unsafe { data.assume_init() }))
}

/// Commits registers to a stopped tracee.
pub fn set_registers(pid: Pid, regs: &Registers) -> crate::sys::Result<()> {
    let mut iov = libc::iovec {
        iov_base: &regs.0 as *const libc::user_regs_struct as *mut c_void,
        iov_len: mem::size_of::<libc::user_regs_struct>(),
    };

    unsafe {
        Errno::result(libc::ptrace(
            ptrace::Request::PTRACE_SETREGSET as u32,
            pid.as_raw(),
            libc::NT_PRSTATUS,
            &mut iov as *mut libc::iovec,
        ))
        .inspect_err(|e| tracing::error!(error = %e, pid = pid.as_raw(), "ptrace(PTRACE_SETREGSET)"))?
    };

    Ok(())
}
