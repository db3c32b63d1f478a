//! # System Call Handlers
//!
//! - `io`: read, write, open, close
//!
//! Each handler takes its arguments already converted from registers:
//! ```ignore
//! fn sys_write(fd: i32, buf: *const u8, count: usize) -> SyscallResult
//! ```

pub mod io;
