//! # PS/2 Keyboard Driver
//!
//! Handles PS/2 keyboard input via IRQ1 interrupt.
//!
//! ```text
//! ┌─────────────┐    IRQ1     ┌──────────────────┐
//! │  Keyboard   │────────────▶│  ScancodeBuffer  │
//! │  (Port 60)  │             │  (16 bytes)      │
//! └─────────────┘             └──────────────────┘
//! ```
//!
//! Every byte the controller hands over is kept, make and break codes
//! alike. When the buffer is full the oldest byte is overwritten: input lost
//! to a slow consumer is accepted, never reported.

use crate::platform::ports::PS2_DATA;
use crate::platform::Platform;

pub const SCANCODE_CAPACITY: usize = 16;

/// Fixed-size circular buffer of raw scancodes, oldest first.
#[derive(Debug, Clone)]
pub struct ScancodeBuffer {
    bytes: [u8; SCANCODE_CAPACITY],
    /// Index the next byte is written to.
    head: usize,
    len: usize,
}

impl ScancodeBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; SCANCODE_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    /// Append `scancode`, overwriting the oldest byte when full.
    pub fn push(&mut self, scancode: u8) {
        self.bytes[self.head] = scancode;
        self.head = (self.head + 1) % SCANCODE_CAPACITY;
        if self.len < SCANCODE_CAPACITY {
            self.len += 1;
        }
    }

    /// Remove and return the oldest byte.
    pub fn pop(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let byte = self.bytes[self.tail()];
        self.len -= 1;
        Some(byte)
    }

    /// The `index`-th oldest byte still held.
    pub fn get(&self, index: usize) -> Option<u8> {
        if index >= self.len {
            return None;
        }
        Some(self.bytes[(self.tail() + index) % SCANCODE_CAPACITY])
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len).filter_map(move |index| self.get(index))
    }

    /// Most recently received byte.
    pub fn latest(&self) -> Option<u8> {
        self.len.checked_sub(1).and_then(|last| self.get(last))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    fn tail(&self) -> usize {
        (self.head + SCANCODE_CAPACITY - self.len) % SCANCODE_CAPACITY
    }
}

impl Default for ScancodeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// IRQ1: one byte from the data port into the buffer.
pub fn handle_irq<P: Platform>(buffer: &mut ScancodeBuffer, platform: &mut P) {
    let scancode = platform.read_port8(PS2_DATA);
    buffer.push(scancode);
    log_debug!("irq: keyboard scancode {:#x}", scancode);
}
