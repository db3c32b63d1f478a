//! Kernel tasks: statically allocated stacks and the frame a fresh task is
//! resumed from.
//!
//! `switch_context_raw` pops six callee-saved registers and returns. A new
//! stack is laid out so that this first "return" lands in `task_trampoline`
//! with the entry function in `r12`:
//!
//! ```text
//!  top ──▶ ┌──────────────────┐  16-byte aligned
//!          │ task_trampoline  │  return address
//!          │ rbx = 0          │
//!          │ rbp = 0          │
//!          │ r12 = entry      │
//!          │ r13 = 0          │
//!          │ r14 = 0          │
//!  sp  ──▶ │ r15 = 0          │
//!          └──────────────────┘
//! ```

pub const STACK_SIZE: usize = 16 * 1024;
pub const STACK_WORDS: usize = STACK_SIZE / 8;

/// Words in the initial frame: six registers plus the return address.
pub const FRAME_WORDS: usize = 7;
const ENTRY_REGISTER: usize = 3;

/// Write the initial frame at the aligned top of `stack` and return the
/// stack pointer to save for the task. `None` if the stack is too small.
pub fn prepare_stack(stack: &mut [u64], entry: u64, return_to: u64) -> Option<u64> {
    let base = stack.as_ptr() as u64;
    let top = (base + (stack.len() * 8) as u64) & !0xF;
    let top_index = ((top - base) / 8) as usize;
    let sp_index = top_index.checked_sub(FRAME_WORDS)?;

    let frame = &mut stack[sp_index..top_index];
    frame.fill(0);
    frame[ENTRY_REGISTER] = entry;
    frame[FRAME_WORDS - 1] = return_to;
    Some(base + (sp_index * 8) as u64)
}

#[cfg(target_os = "none")]
pub use hardware::{exit_current, spawn_kernel_task, yield_now};

#[cfg(target_os = "none")]
mod hardware {
    use core::arch::global_asm;
    use core::ptr::addr_of_mut;

    use super::{prepare_stack, STACK_WORDS};
    use crate::core::kernel::halt;
    use crate::core::kernel::state::KERNEL;
    use crate::platform::{HardwarePlatform, SavedContext};
    use crate::task::{SchedulerError, MAX_TASKS};

    #[repr(C, align(16))]
    struct Stack([u64; STACK_WORDS]);

    /// One stack per task slot; slot 0 runs on the bootloader's stack.
    struct StackPool([Stack; MAX_TASKS]);

    static mut STACKS: StackPool = StackPool([const { Stack([0; STACK_WORDS]) }; MAX_TASKS]);

    // First code a new task runs: interrupts back on (the switch happened
    // inside the kernel cell), call the entry in r12, retire the slot if it
    // ever returns.
    global_asm!(
        ".global task_trampoline",
        "task_trampoline:",
        "    sti",
        "    call r12",
        "    call {finished}",
        "2:",
        "    hlt",
        "    jmp 2b",
        finished = sym task_finished,
    );

    extern "C" {
        fn task_trampoline();
    }

    extern "C" fn task_finished() -> ! {
        exit_current()
    }

    /// Start `entry` on its own stack at `priority`.
    pub fn spawn_kernel_task(entry: fn(), priority: u8) -> Result<usize, SchedulerError> {
        KERNEL.with(|kernel| {
            let slot = (0..MAX_TASKS)
                .find(|&slot| slot != 0 && kernel.scheduler.task(slot).is_some_and(|task| !task.active))
                .ok_or(SchedulerError::TableFull)?;

            // SAFETY: the slot is inactive, so nothing runs on its stack;
            // the kernel cell keeps interrupts off while it is rewritten.
            let stack = unsafe { &mut (*addr_of_mut!(STACKS)).0[slot].0 };
            let stack_pointer = prepare_stack(stack, entry as usize as u64, task_trampoline as usize as u64)
                .ok_or(SchedulerError::SlotOutOfRange(slot))?;

            let context = SavedContext {
                stack_pointer,
                address_space: kernel.address_space(),
            };
            kernel.scheduler.activate(slot, priority, context)?;
            log_info!("task {}: spawned at priority {}", slot, priority);
            Ok(slot)
        })
    }

    /// Give the scheduler a chance to run a higher-priority task.
    pub fn yield_now() {
        KERNEL.with(|kernel| {
            kernel.scheduler.schedule(&mut HardwarePlatform::new());
        });
    }

    /// Retire the calling task and switch away for good.
    pub fn exit_current() -> ! {
        KERNEL.with(|kernel| {
            let slot = kernel.scheduler.current();
            if let Err(err) = kernel.scheduler.deactivate(slot) {
                log_warn!("task exit: {}", err);
            }
            log_info!("task {}: exited", slot);
            kernel.scheduler.schedule(&mut HardwarePlatform::new());
        });
        log_error!("task exit: nothing left to run");
        halt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_sits_at_aligned_top() {
        let mut stack = vec![0xAAu64; 64];
        let base = stack.as_ptr() as u64;
        let sp = prepare_stack(&mut stack, 0x1234, 0x5678).unwrap();
        let top = (base + 64 * 8) & !0xF;

        assert_eq!(top - sp, 56);
        assert_eq!(top % 16, 0);
        let index = ((sp - base) / 8) as usize;
        assert_eq!(&stack[index..index + 7], &[0, 0, 0, 0x1234, 0, 0, 0x5678]);
        assert_eq!(stack[0], 0xAA);
    }

    #[test]
    fn test_resumed_stack_is_call_aligned() {
        let mut stack = vec![0u64; STACK_WORDS];
        let sp = prepare_stack(&mut stack, 1, 2).unwrap();
        // After six pops and the ret, rsp sits at the aligned top.
        assert_eq!((sp + 7 * 8) % 16, 0);
    }

    #[test]
    fn test_too_small_stack() {
        let mut stack = vec![0u64; 4];
        assert_eq!(prepare_stack(&mut stack, 1, 2), None);
    }
}
