//! # Interrupt Descriptor Table
//!
//! 256 64-bit interrupt gates. Every vector gets a well-formed gate, so a
//! stray interrupt always lands in a known stub instead of an empty slot.
//!
//! ```text
//!  0      2          4     5      6           8            12        16
//!  ┌──────┬──────────┬─────┬──────┬───────────┬────────────┬─────────┐
//!  │off lo│ selector │ IST │ attr │ off mid   │ off high   │ zero    │
//!  └──────┴──────────┴─────┴──────┴───────────┴────────────┴─────────┘
//! ```

use core::mem::size_of;

use crate::platform::Platform;

pub const IDT_ENTRIES: usize = 256;

/// Kernel code segment in the GDT loaded by `gdt::init`.
pub const KERNEL_CODE_SELECTOR: u16 = 0x08;

/// Present, DPL 0, 64-bit interrupt gate.
pub const INTERRUPT_GATE: u8 = 0x8E;

pub const DOUBLE_FAULT_VECTOR: u8 = 8;
/// IST slot (1-based) of the double-fault stack in the TSS `gdt::init`
/// loads. A fault on an overflowed task stack still gets a good stack.
pub const DOUBLE_FAULT_IST: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct GateDescriptor {
    offset_low: u16,
    selector: u16,
    ist: u8,
    type_attr: u8,
    offset_mid: u16,
    offset_high: u32,
    zero: u32,
}

impl GateDescriptor {
    pub const MISSING: GateDescriptor = GateDescriptor {
        offset_low: 0,
        selector: 0,
        ist: 0,
        type_attr: 0,
        offset_mid: 0,
        offset_high: 0,
        zero: 0,
    };

    pub const fn new(handler: u64, selector: u16, type_attr: u8) -> Self {
        Self {
            offset_low: handler as u16,
            selector,
            ist: 0,
            type_attr,
            offset_mid: (handler >> 16) as u16,
            offset_high: (handler >> 32) as u32,
            zero: 0,
        }
    }

    /// Same gate, entered on interrupt stack `ist` (1-7).
    pub const fn with_stack(mut self, ist: u8) -> Self {
        self.ist = ist & 0x7;
        self
    }

    pub fn handler_address(&self) -> u64 {
        self.offset_low as u64 | (self.offset_mid as u64) << 16 | (self.offset_high as u64) << 32
    }

    pub fn selector(&self) -> u16 {
        self.selector
    }

    pub fn type_attr(&self) -> u8 {
        self.type_attr
    }

    pub fn ist(&self) -> u8 {
        self.ist
    }

    pub fn is_present(&self) -> bool {
        self.type_attr & 0x80 != 0
    }
}

#[repr(C, align(16))]
pub struct InterruptTable {
    gates: [GateDescriptor; IDT_ENTRIES],
}

impl InterruptTable {
    /// Value loaded into IDTR.limit.
    pub const LIMIT: u16 = (IDT_ENTRIES * size_of::<GateDescriptor>() - 1) as u16;

    pub const fn new() -> Self {
        Self {
            gates: [GateDescriptor::MISSING; IDT_ENTRIES],
        }
    }

    pub fn gate(&self, vector: u8) -> &GateDescriptor {
        &self.gates[vector as usize]
    }

    pub fn gates(&self) -> &[GateDescriptor; IDT_ENTRIES] {
        &self.gates
    }

    pub fn base(&self) -> u64 {
        self.gates.as_ptr() as u64
    }
}

impl Default for InterruptTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that the IDT register holds a complete table.
#[derive(Debug)]
pub struct TableInstalled(());

/// Fill every gate from `handler_address` and load the table. Only the
/// double fault switches stacks.
pub fn install_interrupt_table<P, F>(
    table: &mut InterruptTable,
    platform: &mut P,
    handler_address: F,
) -> TableInstalled
where
    P: Platform,
    F: Fn(u8) -> u64,
{
    for (vector, gate) in table.gates.iter_mut().enumerate() {
        *gate = GateDescriptor::new(handler_address(vector as u8), KERNEL_CODE_SELECTOR, INTERRUPT_GATE);
    }
    let double_fault = &mut table.gates[DOUBLE_FAULT_VECTOR as usize];
    *double_fault = double_fault.with_stack(DOUBLE_FAULT_IST);

    // SAFETY: all 256 gates were written above and the table lives in the
    // kernel context for the rest of uptime.
    unsafe { platform.load_descriptor_table(table.base(), InterruptTable::LIMIT) };
    log_info!("IDT loaded: {} gates at {:#x}", IDT_ENTRIES, table.base());
    TableInstalled(())
}
