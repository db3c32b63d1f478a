//! # Interrupt Entry Stubs
//!
//! The addresses [`handler_address`] hands to the IDT builder.
//!
//! | Vector     | Stub                                         |
//! |------------|----------------------------------------------|
//! | 0-31       | CPU exception: log, then halt (#BP resumes)  |
//! | 0x20-0x2F  | PIC line: `dispatch::service_delivered`      |
//! | 0x80       | `syscall_entry` (assembly, see `syscalls`)   |
//! | others     | spurious: logged and ignored                 |

use x86_64::structures::idt::{InterruptStackFrame, PageFaultErrorCode};

use crate::core::interrupts::dispatch::{self, IRQ_LINES};
use crate::core::interrupts::pic::{self, SYSCALL_VECTOR};
use crate::core::kernel::{halt, state::KERNEL};
use crate::platform::HardwarePlatform;

const EXCEPTION_NAMES: [&str; 32] = [
    "DIVIDE ERROR",
    "DEBUG",
    "NON-MASKABLE INTERRUPT",
    "BREAKPOINT",
    "OVERFLOW",
    "BOUND RANGE EXCEEDED",
    "INVALID OPCODE",
    "DEVICE NOT AVAILABLE",
    "DOUBLE FAULT",
    "COPROCESSOR SEGMENT OVERRUN",
    "INVALID TSS",
    "SEGMENT NOT PRESENT",
    "STACK-SEGMENT FAULT",
    "GENERAL PROTECTION FAULT",
    "PAGE FAULT",
    "RESERVED",
    "X87 FLOATING-POINT",
    "ALIGNMENT CHECK",
    "MACHINE CHECK",
    "SIMD FLOATING-POINT",
    "VIRTUALIZATION",
    "CONTROL PROTECTION",
    "RESERVED",
    "RESERVED",
    "RESERVED",
    "RESERVED",
    "RESERVED",
    "RESERVED",
    "HYPERVISOR INJECTION",
    "VMM COMMUNICATION",
    "SECURITY",
    "RESERVED",
];

fn fatal(vector: u8, frame: &InterruptStackFrame, error_code: Option<u64>) -> ! {
    log_error!("EXCEPTION: {} (vector {})", EXCEPTION_NAMES[vector as usize], vector);
    if let Some(code) = error_code {
        log_error!("error code: {:#x}", code);
    }
    log_error!("{:#?}", frame);
    halt()
}

macro_rules! exception {
    ($name:ident, $vector:expr) => {
        extern "x86-interrupt" fn $name(frame: InterruptStackFrame) {
            fatal($vector, &frame, None)
        }
    };
    ($name:ident, $vector:expr, error_code) => {
        extern "x86-interrupt" fn $name(frame: InterruptStackFrame, code: u64) {
            fatal($vector, &frame, Some(code))
        }
    };
}

exception!(divide_error, 0);
exception!(debug, 1);
exception!(non_maskable, 2);
exception!(overflow, 4);
exception!(bound_range, 5);
exception!(invalid_opcode, 6);
exception!(device_not_available, 7);
exception!(double_fault, 8, error_code);
exception!(coprocessor_overrun, 9);
exception!(invalid_tss, 10, error_code);
exception!(segment_not_present, 11, error_code);
exception!(stack_segment, 12, error_code);
exception!(general_protection, 13, error_code);
exception!(x87_floating_point, 16);
exception!(alignment_check, 17, error_code);
exception!(machine_check, 18);
exception!(simd_floating_point, 19);
exception!(virtualization, 20);
exception!(control_protection, 21, error_code);
exception!(hypervisor_injection, 28);
exception!(vmm_communication, 29, error_code);
exception!(security, 30, error_code);
exception!(reserved, 31);

extern "x86-interrupt" fn breakpoint(frame: InterruptStackFrame) {
    log_warn!("EXCEPTION: BREAKPOINT\n{:#?}", frame);
}

extern "x86-interrupt" fn page_fault(frame: InterruptStackFrame, code: PageFaultErrorCode) {
    use x86_64::registers::control::Cr2;

    match Cr2::read() {
        Ok(addr) => log_error!("page fault at {:#x} ({:?})", addr.as_u64(), code),
        Err(_) => log_error!("page fault at non-canonical address ({:?})", code),
    }
    fatal(14, &frame, Some(code.bits()))
}

extern "x86-interrupt" fn spurious(_frame: InterruptStackFrame) {
    log_debug!("spurious interrupt");
}

macro_rules! irq {
    ($name:ident, $line:expr) => {
        extern "x86-interrupt" fn $name(_frame: InterruptStackFrame) {
            KERNEL.with(|kernel| {
                dispatch::service_delivered(kernel, &mut HardwarePlatform::new(), $line);
            });
        }
    };
}

irq!(irq0, 0);
irq!(irq1, 1);
irq!(irq2, 2);
irq!(irq3, 3);
irq!(irq4, 4);
irq!(irq5, 5);
irq!(irq6, 6);
irq!(irq7, 7);
irq!(irq8, 8);
irq!(irq9, 9);
irq!(irq10, 10);
irq!(irq11, 11);
irq!(irq12, 12);
irq!(irq13, 13);
irq!(irq14, 14);
irq!(irq15, 15);

type Stub = extern "x86-interrupt" fn(InterruptStackFrame);

const IRQ_STUBS: [Stub; IRQ_LINES] = [
    irq0, irq1, irq2, irq3, irq4, irq5, irq6, irq7, irq8, irq9, irq10, irq11, irq12, irq13, irq14,
    irq15,
];

extern "C" {
    fn syscall_entry();
}

/// Entry point the IDT gate for `vector` should carry.
pub fn handler_address(vector: u8) -> u64 {
    let handler: usize = match vector {
        0 => divide_error as usize,
        1 => debug as usize,
        2 => non_maskable as usize,
        3 => breakpoint as usize,
        4 => overflow as usize,
        5 => bound_range as usize,
        6 => invalid_opcode as usize,
        7 => device_not_available as usize,
        8 => double_fault as usize,
        9 => coprocessor_overrun as usize,
        10 => invalid_tss as usize,
        11 => segment_not_present as usize,
        12 => stack_segment as usize,
        13 => general_protection as usize,
        14 => page_fault as usize,
        16 => x87_floating_point as usize,
        17 => alignment_check as usize,
        18 => machine_check as usize,
        19 => simd_floating_point as usize,
        20 => virtualization as usize,
        21 => control_protection as usize,
        28 => hypervisor_injection as usize,
        29 => vmm_communication as usize,
        30 => security as usize,
        15 | 22..=27 | 31 => reserved as usize,
        v if v == SYSCALL_VECTOR => syscall_entry as usize,
        v => match (0..IRQ_LINES as u8).find(|&line| pic::vector_for(line) == v) {
            Some(line) => IRQ_STUBS[line as usize] as usize,
            None => spurious as usize,
        },
    };
    handler as u64
}
