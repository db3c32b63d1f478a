//! # I/O System Call Handlers
//!
//! Argument checking only; there is no file or stream layer behind these
//! yet, so every well-formed call ends in `NotImplemented`.
//!
//! | FD | Stream |
//! |----|--------|
//! | 0  | stdin  |
//! | 1  | stdout |
//! | 2  | stderr |

use crate::syscalls::dispatcher::{SyscallError, SyscallResult};

const STDIN: i32 = 0;
const STDOUT: i32 = 1;
const STDERR: i32 = 2;

/// Read from file descriptor
pub fn sys_read(fd: i32, buf: *mut u8, _count: usize) -> SyscallResult {
    if buf.is_null() {
        return Err(SyscallError::InvalidArgument);
    }

    match fd {
        STDIN => Err(SyscallError::NotImplemented),
        _ => Err(SyscallError::BadFileDescriptor),
    }
}

/// Write to file descriptor
pub fn sys_write(fd: i32, buf: *const u8, _count: usize) -> SyscallResult {
    if buf.is_null() {
        return Err(SyscallError::InvalidArgument);
    }

    match fd {
        STDOUT | STDERR => Err(SyscallError::NotImplemented),
        _ => Err(SyscallError::BadFileDescriptor),
    }
}

/// Open a file
pub fn sys_open(path: *const u8, _flags: usize, _mode: usize) -> SyscallResult {
    if path.is_null() {
        return Err(SyscallError::InvalidArgument);
    }

    Err(SyscallError::NotImplemented)
}

/// Close a file descriptor
pub fn sys_close(fd: i32) -> SyscallResult {
    if fd < 0 {
        return Err(SyscallError::BadFileDescriptor);
    }

    Err(SyscallError::NotImplemented)
}
