//! # Interrupt Handling Module
//!
//! - **IDT**: 256 interrupt gates, every one well formed
//! - **PIC**: 8259 remap, unmask, EOI and pending-line polling
//! - **Dispatch**: table-driven routing of PIC lines to device handlers
//! - **Timer**: PIT programming and tick bookkeeping
//! - **GDT** / **handlers**: bare-metal only; segments and entry stubs
//!
//! ## Interrupt Vector Layout
//!
//! | Vector | Type                   | Handler                    |
//! |--------|------------------------|----------------------------|
//! | 0-31   | CPU Exceptions         | log, halt                  |
//! | 32-39  | Master PIC (IRQ 0-7)   | `dispatch::service`        |
//! | 40-47  | Slave PIC (IRQ 8-15)   | `dispatch::service`        |
//! | 0x80   | Syscall                | `syscall_entry`            |
//!
//! ## Boot Order
//!
//! ```ignore
//! let installed = idt::install_interrupt_table(&mut table, platform, resolver);
//! let ready = pic::remap_and_unmask(platform, installed);
//! pic::enable_interrupts(platform, ready);
//! ```
//!
//! Each step consumes the previous step's token, so interrupts cannot be
//! enabled before the table and the controllers are in place.

pub mod dispatch;
pub mod idt;
pub mod pic;
pub mod timer;

#[cfg(target_os = "none")]
pub mod gdt;
#[cfg(target_os = "none")]
pub mod handlers;

pub use idt::{install_interrupt_table, InterruptTable, TableInstalled};
pub use pic::{enable_interrupts, remap_and_unmask, InterruptsReady};
