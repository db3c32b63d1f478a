//! # PhoneOS Kernel Core
//!
//! Brings the machine from the bootloader hand-off to a timer-driven
//! scheduler loop:
//!
//! ```text
//!  IRQ line ──▶ PIC ──▶ dispatcher ──▶ device handler ──▶ Kernel state
//!                                                            │
//!      ┌─────────────────────────────────────────────────────┘
//!      ▼
//!  main loop: dispatch ─▶ schedule ─▶ display ─▶ integrity ─▶ (repeat)
//! ```
//!
//! ## Layout
//!
//! - `platform`: the narrow hardware port every component talks through
//! - `memory`: identity-mapped page tables
//! - `core`: interrupt table, PIC, dispatcher, timer, kernel context
//! - `devices`: PS/2 keyboard and mouse handlers, VGA text display
//! - `task`: task control blocks and the priority scheduler
//! - `syscalls`: `int 0x80` dispatch stub
//!
//! Hardware-only pieces are compiled for `target_os = "none"`; everything
//! else builds on the host so `cargo test` can drive it through the
//! recording platform.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_os = "none", feature(abi_x86_interrupt))]

#[macro_use]
pub mod log;

pub mod config;
pub mod core;
pub mod devices;
pub mod memory;
pub mod platform;
pub mod syscalls;
pub mod task;

pub use crate::config::KernelConfig;
pub use crate::core::kernel::Kernel;
pub use crate::platform::{Platform, SavedContext};
