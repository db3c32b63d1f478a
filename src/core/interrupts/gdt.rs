// gdt.rs
//
// Flat kernel segments plus a TSS. Code lands at index 1 (selector 0x08),
// which is the selector every IDT gate carries. The TSS only supplies the
// double-fault stack.
use core::ptr::addr_of;

use spin::Lazy;
use x86_64::structures::gdt::{Descriptor, GlobalDescriptorTable, SegmentSelector};
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

use crate::core::interrupts::idt::{DOUBLE_FAULT_IST, KERNEL_CODE_SELECTOR};

const DOUBLE_FAULT_STACK_SIZE: usize = 16 * 1024;

#[repr(align(16))]
struct FaultStack([u8; DOUBLE_FAULT_STACK_SIZE]);

static mut DOUBLE_FAULT_STACK: FaultStack = FaultStack([0; DOUBLE_FAULT_STACK_SIZE]);

static TSS: Lazy<TaskStateSegment> = Lazy::new(|| {
    let mut tss = TaskStateSegment::new();

    // The TSS table is 0-based; gates count IST slots from 1.
    tss.interrupt_stack_table[(DOUBLE_FAULT_IST - 1) as usize] = {
        let stack_start = VirtAddr::from_ptr(unsafe { addr_of!(DOUBLE_FAULT_STACK) });
        stack_start + DOUBLE_FAULT_STACK_SIZE as u64
    };

    tss
});

struct Selectors {
    code_selector: SegmentSelector,
    data_selector: SegmentSelector,
    tss_selector: SegmentSelector,
}

static GDT: Lazy<(GlobalDescriptorTable, Selectors)> = Lazy::new(|| {
    let mut gdt = GlobalDescriptorTable::new();

    let code_selector = gdt.append(Descriptor::kernel_code_segment());
    let data_selector = gdt.append(Descriptor::kernel_data_segment());
    let tss_selector = gdt.append(Descriptor::tss_segment(&TSS));

    (
        gdt,
        Selectors {
            code_selector,
            data_selector,
            tss_selector,
        },
    )
});

pub fn init() {
    let (ref gdt, ref selectors) = *GDT;
    gdt.load();

    unsafe {
        use x86_64::instructions::segmentation::{Segment, CS, DS, ES, SS};

        CS::set_reg(selectors.code_selector);
        DS::set_reg(selectors.data_selector);
        ES::set_reg(selectors.data_selector);
        SS::set_reg(selectors.data_selector);

        x86_64::instructions::tables::load_tss(selectors.tss_selector);
    }

    if selectors.code_selector.0 != KERNEL_CODE_SELECTOR {
        log_error!(
            "GDT: code selector {:#x}, gates expect {:#x}",
            selectors.code_selector.0,
            KERNEL_CODE_SELECTOR
        );
        crate::core::kernel::halt();
    }
    log_info!(
        "GDT loaded: code {:#x}, data {:#x}, tss {:#x}",
        selectors.code_selector.0,
        selectors.data_selector.0,
        selectors.tss_selector.0
    );
}
