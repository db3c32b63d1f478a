use core::fmt;

use crate::syscalls::handlers;
use crate::syscalls::numbers::SyscallNumber;

/// System call result type
pub type SyscallResult = Result<usize, SyscallError>;

/// System call errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    InvalidSyscall,
    InvalidArgument,
    NotImplemented,
    BadFileDescriptor,
}

impl SyscallError {
    pub fn as_errno(self) -> isize {
        match self {
            Self::InvalidSyscall => -1,
            Self::InvalidArgument => -22,  // EINVAL
            Self::NotImplemented => -38,   // ENOSYS
            Self::BadFileDescriptor => -9, // EBADF
        }
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSyscall => write!(f, "unknown system call"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::NotImplemented => write!(f, "system call not implemented"),
            Self::BadFileDescriptor => write!(f, "bad file descriptor"),
        }
    }
}

/// Registers saved by the `int 0x80` entry, lowest address first.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct SyscallFrame {
    pub rax: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
}

/// System call context - number and arguments taken from the saved registers
#[derive(Debug, Clone, Copy)]
pub struct SyscallContext {
    pub syscall_num: usize,
    pub arg0: usize,
    pub arg1: usize,
    pub arg2: usize,
    pub arg3: usize,
    pub arg4: usize,
    pub arg5: usize,
}

impl SyscallContext {
    /// x86_64 syscall convention:
    ///   rax = syscall number
    ///   rdi = arg0
    ///   rsi = arg1
    ///   rdx = arg2
    ///   r10 = arg3  (rcx is used for return address)
    ///   r8  = arg4
    ///   r9  = arg5
    pub fn from_registers(
        rax: usize,
        rdi: usize,
        rsi: usize,
        rdx: usize,
        r10: usize,
        r8: usize,
        r9: usize,
    ) -> Self {
        Self {
            syscall_num: rax,
            arg0: rdi,
            arg1: rsi,
            arg2: rdx,
            arg3: r10,
            arg4: r8,
            arg5: r9,
        }
    }
}

impl From<&SyscallFrame> for SyscallContext {
    fn from(frame: &SyscallFrame) -> Self {
        Self::from_registers(
            frame.rax as usize,
            frame.rdi as usize,
            frame.rsi as usize,
            frame.rdx as usize,
            frame.r10 as usize,
            frame.r8 as usize,
            frame.r9 as usize,
        )
    }
}

/// Main syscall dispatcher
pub fn dispatch_syscall(ctx: SyscallContext) -> SyscallResult {
    let syscall = SyscallNumber::from(ctx.syscall_num);
    log_debug!(
        "SYSCALL: {:?}({:#x}, {:#x}, {:#x})",
        syscall,
        ctx.arg0,
        ctx.arg1,
        ctx.arg2
    );

    match syscall {
        SyscallNumber::Read => handlers::io::sys_read(ctx.arg0 as i32, ctx.arg1 as *mut u8, ctx.arg2),
        SyscallNumber::Write => handlers::io::sys_write(ctx.arg0 as i32, ctx.arg1 as *const u8, ctx.arg2),
        SyscallNumber::Open => handlers::io::sys_open(ctx.arg0 as *const u8, ctx.arg1, ctx.arg2),
        SyscallNumber::Close => handlers::io::sys_close(ctx.arg0 as i32),
        SyscallNumber::Unknown => Err(SyscallError::InvalidSyscall),
    }
}

/// Value handed back in `rax`: the result, or a negative errno.
pub fn return_value(result: SyscallResult) -> isize {
    match result {
        Ok(value) => value as isize,
        Err(err) => err.as_errno(),
    }
}
