// The one kernel instance on bare metal.
//
// Single core: exclusive access means "interrupts off". A spin lock would
// still be held by a task that switched away inside `with`, and the next
// task touching the kernel would spin forever.
//
// Keep closures short. The 8259 latches one request per line, so every
// extra timer edge or keyboard byte arriving inside `with` is lost. Long
// work (the integrity scan) copies what it needs out and runs outside.

use core::cell::UnsafeCell;

use x86_64::instructions::interrupts;

use super::Kernel;
use crate::config::KernelConfig;
use crate::core::interrupts::dispatch::IrqRoute;

/// Routing used on real hardware: the PIT fires on line 0.
pub const BARE_METAL_CONFIG: KernelConfig = KernelConfig::DEFAULT.with_route(0, IrqRoute::Timer);

pub struct KernelCell(UnsafeCell<Kernel>);

// SAFETY: one core, and every access goes through `with`, which runs with
// interrupts disabled.
unsafe impl Sync for KernelCell {}

impl KernelCell {
    pub const fn new(kernel: Kernel) -> Self {
        Self(UnsafeCell::new(kernel))
    }

    /// Borrow the kernel with interrupts disabled for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&mut Kernel) -> R) -> R {
        interrupts::without_interrupts(|| {
            // SAFETY: see the `Sync` impl; IRQ stubs cannot preempt `f`.
            let kernel = unsafe { &mut *self.0.get() };
            f(kernel)
        })
    }
}

pub static KERNEL: KernelCell = KernelCell::new(Kernel::new(BARE_METAL_CONFIG));
