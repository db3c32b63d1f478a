//! Device Drivers
//!
//! - PS/2 Keyboard (IRQ1)
//! - PS/2 Mouse (IRQ12)

pub mod ps2_keyboard;
pub mod ps2_mouse;

pub use ps2_keyboard::{ScancodeBuffer, SCANCODE_CAPACITY};
pub use ps2_mouse::MouseState;
