//! Device Subsystem
//!
//! - `drivers`: PS/2 keyboard and mouse interrupt handlers
//! - `vga_text`: 80x25 text-mode display with a shadow buffer

pub mod drivers;
pub mod vga_text;
