//! # Platform Port
//!
//! Every privileged operation the kernel performs goes through [`Platform`]:
//! port I/O, CR3 and IDTR loads, the interrupt flag, the stack/address-space
//! switch, memory probes and text-mode cell access.
//!
//! | Implementation      | Target              | Behaviour                    |
//! |---------------------|---------------------|------------------------------|
//! | `HardwarePlatform`  | `target_os = "none"`| real instructions            |
//! | `RecordingPlatform` | host tests          | records every call as an Op  |

#[cfg(target_os = "none")]
pub mod hardware;
#[cfg(test)]
pub mod recording;

#[cfg(target_os = "none")]
pub use hardware::HardwarePlatform;
#[cfg(test)]
pub use recording::{Op, RecordingPlatform};

/// Fixed I/O port and memory addresses of the PC platform.
pub mod ports {
    pub const PIC1_COMMAND: u16 = 0x20;
    pub const PIC1_DATA: u16 = 0x21;
    pub const PIC2_COMMAND: u16 = 0xA0;
    pub const PIC2_DATA: u16 = 0xA1;

    pub const PS2_DATA: u16 = 0x60;
    /// Status on read, controller command on write.
    pub const PS2_STATUS: u16 = 0x64;
    pub const PS2_COMMAND: u16 = 0x64;

    pub const PIT_CHANNEL0: u16 = 0x40;
    pub const PIT_COMMAND: u16 = 0x43;

    pub const CRTC_INDEX: u16 = 0x3D4;
    pub const CRTC_DATA: u16 = 0x3D5;

    /// Physical address of the VGA text frame buffer.
    pub const VGA_TEXT_BUFFER: u64 = 0xB8000;
}

/// Register state that crosses between tasks on a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct SavedContext {
    pub stack_pointer: u64,
    /// Physical address loaded into CR3 while the task runs.
    pub address_space: u64,
}

impl SavedContext {
    pub const EMPTY: SavedContext = SavedContext {
        stack_pointer: 0,
        address_space: 0,
    };
}

pub trait Platform {
    fn read_port8(&mut self, port: u16) -> u8;

    fn write_port8(&mut self, port: u16, value: u8);

    /// Make the table at physical address `root` the active address space.
    ///
    /// # Safety
    /// `root` must point at a complete top-level table that maps the code,
    /// stack and data the caller is about to use.
    unsafe fn load_page_table(&mut self, root: u64);

    /// Load the interrupt descriptor table register.
    ///
    /// # Safety
    /// `base..=base + limit` must hold valid gate descriptors for as long as
    /// interrupts can be delivered.
    unsafe fn load_descriptor_table(&mut self, base: u64, limit: u16);

    fn set_interrupt_flag(&mut self, enabled: bool);

    /// Physical address backing the kernel virtual address `virt`.
    fn table_address(&self, virt: u64) -> u64;

    /// Store the live stack pointer and address space into `save`, then
    /// resume whatever was suspended into `load`.
    ///
    /// On hardware this returns only when some later switch loads `save`.
    ///
    /// # Safety
    /// `load` must have been produced by an earlier switch or by a prepared
    /// initial task frame.
    unsafe fn switch_context(&mut self, save: &mut SavedContext, load: &SavedContext);

    /// Read one byte at `addr` for its side effect of faulting if unmapped.
    fn probe_byte(&mut self, addr: u64) -> u8;

    fn read_cell(&mut self, index: usize) -> u16;

    fn write_cell(&mut self, index: usize, value: u16);
}
