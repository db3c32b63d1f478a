//! Kernel configuration.
//!
//! Runtime knobs live in [`KernelConfig`]; table capacities are compile-time
//! constants because nothing in the kernel allocates.

use crate::core::interrupts::dispatch::{IrqRoute, IrqRoutes};
use crate::core::kernel::integrity::{Permissions, ProtectedRegion};
use crate::log::Level;

/// Size of one small page; the kernel region is counted in these.
pub const PAGE_SIZE: u64 = 4096;

#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    /// PIT interrupt frequency.
    pub timer_hz: u32,
    /// Ticks granted to every task slot when the table is reset.
    pub initial_time_slice: u32,
    /// Priority of the boot context once it becomes the main-loop task.
    pub main_loop_priority: u8,
    /// Region registered with the integrity checker at boot.
    pub kernel_region: ProtectedRegion,
    pub routes: IrqRoutes,
    pub log_level: Level,
}

impl KernelConfig {
    pub const DEFAULT: KernelConfig = KernelConfig {
        timer_hz: 100,
        initial_time_slice: 100,
        main_loop_priority: 1,
        kernel_region: ProtectedRegion {
            start: 0x0,
            size: PAGE_SIZE * 1024,
            permissions: Permissions::READ_WRITE,
        },
        routes: IrqRoutes::DEFAULT,
        log_level: Level::Info,
    };

    /// Same configuration with `line` bound to `route`.
    pub const fn with_route(mut self, line: u8, route: IrqRoute) -> Self {
        self.routes = self.routes.with(line, route);
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
