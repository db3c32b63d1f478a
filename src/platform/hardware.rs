//! Real-hardware [`Platform`]: x86_64 instructions, legacy I/O ports and the
//! identity-mapped text buffer.

use core::arch::{asm, global_asm};

use x86_64::instructions::interrupts;
use x86_64::instructions::port::Port;
use x86_64::instructions::tables::lidt;
use x86_64::registers::control::{Cr3, Cr3Flags};
use x86_64::structures::paging::PhysFrame;
use x86_64::structures::DescriptorTablePointer;
use x86_64::{PhysAddr, VirtAddr};

use super::{ports, Platform, SavedContext};

// switch_context_raw(save: *mut SavedContext, load: *const SavedContext)
//
// Callee-saved registers go on the outgoing stack, then RSP and CR3 are
// stored into `save`. CR3 is only rewritten when it changes so switches
// within one address space keep the TLB.
global_asm!(
    ".global switch_context_raw",
    "switch_context_raw:",
    "    push rbx",
    "    push rbp",
    "    push r12",
    "    push r13",
    "    push r14",
    "    push r15",
    "    mov [rdi], rsp",
    "    mov rax, cr3",
    "    mov [rdi + 8], rax",
    "    mov rdx, [rsi + 8]",
    "    cmp rax, rdx",
    "    je 2f",
    "    mov cr3, rdx",
    "2:",
    "    mov rsp, [rsi]",
    "    pop r15",
    "    pop r14",
    "    pop r13",
    "    pop r12",
    "    pop rbp",
    "    pop rbx",
    "    ret",
);

extern "C" {
    fn switch_context_raw(save: *mut SavedContext, load: *const SavedContext);
}

/// Zero-sized handle; all state lives in the CPU and the devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardwarePlatform;

impl HardwarePlatform {
    pub const fn new() -> Self {
        HardwarePlatform
    }
}

impl Platform for HardwarePlatform {
    fn read_port8(&mut self, port: u16) -> u8 {
        unsafe { Port::<u8>::new(port).read() }
    }

    fn write_port8(&mut self, port: u16, value: u8) {
        unsafe { Port::<u8>::new(port).write(value) }
    }

    unsafe fn load_page_table(&mut self, root: u64) {
        let frame = PhysFrame::containing_address(PhysAddr::new(root));
        Cr3::write(frame, Cr3Flags::empty());
    }

    unsafe fn load_descriptor_table(&mut self, base: u64, limit: u16) {
        let pointer = DescriptorTablePointer {
            limit,
            base: VirtAddr::new(base),
        };
        lidt(&pointer);
    }

    fn set_interrupt_flag(&mut self, enabled: bool) {
        if enabled {
            interrupts::enable();
        } else {
            interrupts::disable();
        }
    }

    fn table_address(&self, virt: u64) -> u64 {
        match crate::memory::virt_to_phys(VirtAddr::new(virt)) {
            Some(phys) => phys.as_u64(),
            None => {
                log_error!("table at {:#x} has no physical backing", virt);
                crate::core::kernel::halt()
            }
        }
    }

    unsafe fn switch_context(&mut self, save: &mut SavedContext, load: &SavedContext) {
        switch_context_raw(save as *mut SavedContext, load as *const SavedContext);
    }

    fn probe_byte(&mut self, addr: u64) -> u8 {
        let value: u8;
        // A plain load rather than read_volatile: address 0 is part of the
        // kernel region and must be touched too.
        unsafe {
            asm!(
                "mov {val}, byte ptr [{addr}]",
                addr = in(reg) addr,
                val = out(reg_byte) value,
                options(nostack, preserves_flags, readonly)
            );
        }
        value
    }

    fn read_cell(&mut self, index: usize) -> u16 {
        let cell = ports::VGA_TEXT_BUFFER as *const u16;
        unsafe { core::ptr::read_volatile(cell.add(index)) }
    }

    fn write_cell(&mut self, index: usize, value: u16) {
        let cell = ports::VGA_TEXT_BUFFER as *mut u16;
        unsafe { core::ptr::write_volatile(cell.add(index), value) }
    }
}
