//! # System Calls
//!
//! `int 0x80` with the number in `rax` and arguments in
//! `rdi, rsi, rdx, r10, r8, r9`; the result comes back in `rax` as a value or
//! a negative errno.
//!
//! ```text
//! int 0x80 ──▶ syscall_entry (asm) ──▶ syscall_dispatch_from_frame
//!                                            │
//!                                            ▼
//!                                      dispatch_syscall ──▶ handlers::io
//! ```

pub mod dispatcher;
pub mod handlers;
pub mod numbers;

pub use dispatcher::{dispatch_syscall, return_value, SyscallContext, SyscallError, SyscallFrame};

// Save the caller-clobbered registers as a `SyscallFrame`, dispatch, and
// overwrite the saved rax with the result. The CPU pushed 40 bytes on an
// aligned stack and we push 72 more, so the call below is 16-byte aligned.
#[cfg(target_os = "none")]
core::arch::global_asm!(
    ".global syscall_entry",
    "syscall_entry:",
    "    push rcx",
    "    push rdx",
    "    push rsi",
    "    push rdi",
    "    push r8",
    "    push r9",
    "    push r10",
    "    push r11",
    "    push rax",
    "    cld",
    "    mov rdi, rsp",
    "    call {dispatch}",
    "    mov [rsp], rax",
    "    pop rax",
    "    pop r11",
    "    pop r10",
    "    pop r9",
    "    pop r8",
    "    pop rdi",
    "    pop rsi",
    "    pop rdx",
    "    pop rcx",
    "    iretq",
    dispatch = sym syscall_dispatch_from_frame,
);

#[cfg(target_os = "none")]
extern "C" fn syscall_dispatch_from_frame(frame: &SyscallFrame) -> isize {
    return_value(dispatch_syscall(SyscallContext::from(frame)))
}
