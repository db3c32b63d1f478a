//! PS/2 Mouse Driver
//!
//! IRQ12 (slave PIC). Each interrupt delivers one byte that is read as a
//! horizontal delta and folded into a column on the text display.
//!
//! The auxiliary port is off after reset; [`init`] turns it and its
//! interrupt on before the PIC is unmasked.

use core::fmt;

use crate::devices::vga_text::BUFFER_WIDTH;
use crate::platform::ports::{PS2_COMMAND, PS2_DATA, PS2_STATUS};
use crate::platform::Platform;

const STATUS_OUTPUT_FULL: u8 = 0x01;
const STATUS_INPUT_FULL: u8 = 0x02;
const STATUS_POLLS: u32 = 100_000;

const CMD_ENABLE_AUX: u8 = 0xA8;
const CMD_READ_CONFIG: u8 = 0x20;
const CMD_WRITE_CONFIG: u8 = 0x60;
const CMD_WRITE_AUX: u8 = 0xD4;

/// Configuration byte: IRQ12 enabled.
const CONFIG_AUX_IRQ: u8 = 0x02;
/// Configuration byte: auxiliary clock disabled.
const CONFIG_AUX_CLOCK_OFF: u8 = 0x20;

const MOUSE_SET_DEFAULTS: u8 = 0xF6;
const MOUSE_ENABLE_REPORTING: u8 = 0xF4;
const MOUSE_ACK: u8 = 0xFA;

/// Sign bit of the X movement in the packet status layout.
pub const X_SIGN: u8 = 0x10;

/// Decode one byte as a signed delta: with [`X_SIGN`] set the byte is the
/// two's-complement value offset by 256.
pub fn decode_delta(byte: u8) -> i16 {
    if byte & X_SIGN != 0 {
        byte as i16 - 256
    } else {
        byte as i16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseState {
    x: u16,
    width: u16,
    last_delta: i16,
}

impl MouseState {
    pub const fn new(width: u16) -> Self {
        Self {
            x: 0,
            width,
            last_delta: 0,
        }
    }

    /// Horizontal position, always in `[0, width)`.
    pub fn x(&self) -> u16 {
        self.x
    }

    pub fn last_delta(&self) -> i16 {
        self.last_delta
    }

    pub fn apply(&mut self, delta: i16) {
        let max = self.width.saturating_sub(1) as i32;
        self.x = (self.x as i32 + delta as i32).clamp(0, max) as u16;
        self.last_delta = delta;
    }
}

impl Default for MouseState {
    fn default() -> Self {
        Self::new(BUFFER_WIDTH as u16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ps2Error {
    /// The controller never became ready to accept a byte.
    WriteTimeout,
    /// No byte arrived in the output buffer.
    ReadTimeout,
    /// The mouse answered a command with something other than ACK.
    NoAck(u8),
}

impl fmt::Display for Ps2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ps2Error::WriteTimeout => write!(f, "PS/2 controller write timeout"),
            Ps2Error::ReadTimeout => write!(f, "PS/2 controller read timeout"),
            Ps2Error::NoAck(byte) => write!(f, "mouse answered {:#x} instead of ACK", byte),
        }
    }
}

fn wait_for_write<P: Platform>(platform: &mut P) -> Result<(), Ps2Error> {
    for _ in 0..STATUS_POLLS {
        if platform.read_port8(PS2_STATUS) & STATUS_INPUT_FULL == 0 {
            return Ok(());
        }
    }
    Err(Ps2Error::WriteTimeout)
}

fn wait_for_read<P: Platform>(platform: &mut P) -> Result<(), Ps2Error> {
    for _ in 0..STATUS_POLLS {
        if platform.read_port8(PS2_STATUS) & STATUS_OUTPUT_FULL != 0 {
            return Ok(());
        }
    }
    Err(Ps2Error::ReadTimeout)
}

fn send_command<P: Platform>(platform: &mut P, command: u8) -> Result<(), Ps2Error> {
    wait_for_write(platform)?;
    platform.write_port8(PS2_COMMAND, command);
    Ok(())
}

fn send_data<P: Platform>(platform: &mut P, data: u8) -> Result<(), Ps2Error> {
    wait_for_write(platform)?;
    platform.write_port8(PS2_DATA, data);
    Ok(())
}

fn read_data<P: Platform>(platform: &mut P) -> Result<u8, Ps2Error> {
    wait_for_read(platform)?;
    Ok(platform.read_port8(PS2_DATA))
}

fn send_mouse_command<P: Platform>(platform: &mut P, command: u8) -> Result<(), Ps2Error> {
    send_command(platform, CMD_WRITE_AUX)?;
    send_data(platform, command)?;
    match read_data(platform)? {
        MOUSE_ACK => Ok(()),
        other => Err(Ps2Error::NoAck(other)),
    }
}

/// Enable the auxiliary port, its interrupt and mouse data reporting.
pub fn init<P: Platform>(platform: &mut P) -> Result<(), Ps2Error> {
    send_command(platform, CMD_ENABLE_AUX)?;

    send_command(platform, CMD_READ_CONFIG)?;
    let config = read_data(platform)?;
    send_command(platform, CMD_WRITE_CONFIG)?;
    send_data(platform, (config | CONFIG_AUX_IRQ) & !CONFIG_AUX_CLOCK_OFF)?;

    send_mouse_command(platform, MOUSE_SET_DEFAULTS)?;
    send_mouse_command(platform, MOUSE_ENABLE_REPORTING)?;
    log_info!("PS/2 mouse: reporting enabled");
    Ok(())
}

/// IRQ12: one byte from the data port, decoded and accumulated.
pub fn handle_irq<P: Platform>(mouse: &mut MouseState, platform: &mut P) {
    let byte = platform.read_port8(PS2_DATA);
    mouse.apply(decode_delta(byte));
    log_debug!("irq: mouse byte {:#x}, x = {}", byte, mouse.x);
}
