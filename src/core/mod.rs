//! # Core Kernel Module
//!
//! - `interrupts`: IDT, PIC, dispatcher, timer and the bare-metal entry stubs
//! - `kernel`: the kernel context, its boot sequence and the main-loop phases
//!
//! ## Initialization Order
//!
//! 1. GDT (bare metal only) so selector `0x08` is a 64-bit code segment
//! 2. Identity map and protected regions
//! 3. IDT, then PIC remap, then the interrupt flag
//! 4. Display, task table, PIT

pub mod interrupts;
pub mod kernel;
