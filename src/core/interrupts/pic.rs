//! # Programmable Interrupt Controller (8259 PIC)
//!
//! Configures the legacy 8259 PIC chips for interrupt routing.
//!
//! ## PIC Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │   PIC 1     │     │   PIC 2     │
//! │  (Master)   │◀────│  (Slave)    │
//! │ IRQ 0-7     │ IR2 │ IRQ 8-15    │
//! └─────────────┘     └─────────────┘
//!       │
//!       ▼
//!     CPU
//! ```
//!
//! ## Vector Remapping
//!
//! By default, IRQ 0-15 conflict with CPU exception vectors.
//! We remap them:
//! - PIC 1: vectors 0x20-0x27 (IRQ 0-7)
//! - PIC 2: vectors 0x28-0x2F (IRQ 8-15)

use crate::core::interrupts::idt::TableInstalled;
use crate::platform::ports::{PIC1_COMMAND, PIC1_DATA, PIC2_COMMAND, PIC2_DATA};
use crate::platform::Platform;

pub const PIC_1_OFFSET: u8 = 0x20;
pub const PIC_2_OFFSET: u8 = 0x28;
pub const SYSCALL_VECTOR: u8 = 0x80;

/// ICW1: edge triggered, cascade mode, ICW4 follows.
const ICW1_INIT: u8 = 0x11;
/// ICW3 (master): slave attached to IR2.
const ICW3_MASTER_CASCADE: u8 = 0x04;
/// ICW3 (slave): cascade identity 2.
const ICW3_SLAVE_IDENTITY: u8 = 0x02;
/// ICW4: 8086/88 mode.
const ICW4_8086: u8 = 0x01;
/// OCW3: next read of the command port returns the request register.
const OCW3_READ_IRR: u8 = 0x0A;
/// OCW3: next read of the command port returns the in-service register.
const OCW3_READ_ISR: u8 = 0x0B;

pub const EOI: u8 = 0x20;
pub const CASCADE_LINE: u8 = 2;

#[cfg(target_os = "none")]
pub static PICS: spin::Mutex<pic8259::ChainedPics> =
    spin::Mutex::new(unsafe { pic8259::ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

/// Mask every line on both chips; nothing is delivered until
/// [`remap_and_unmask`] clears the masks again.
#[cfg(target_os = "none")]
pub fn mask_all() {
    x86_64::instructions::interrupts::without_interrupts(|| unsafe { PICS.lock().disable() });
}

/// Proof that both controllers are remapped and the IDT is in place;
/// the only way to reach [`enable_interrupts`].
#[derive(Debug)]
pub struct InterruptsReady(());

/// Run the ICW1-ICW4 sequence on both chips and clear both masks.
pub fn remap_and_unmask<P: Platform>(platform: &mut P, _table: TableInstalled) -> InterruptsReady {
    platform.write_port8(PIC1_COMMAND, ICW1_INIT);
    platform.write_port8(PIC2_COMMAND, ICW1_INIT);

    platform.write_port8(PIC1_DATA, PIC_1_OFFSET);
    platform.write_port8(PIC2_DATA, PIC_2_OFFSET);

    platform.write_port8(PIC1_DATA, ICW3_MASTER_CASCADE);
    platform.write_port8(PIC2_DATA, ICW3_SLAVE_IDENTITY);

    platform.write_port8(PIC1_DATA, ICW4_8086);
    platform.write_port8(PIC2_DATA, ICW4_8086);

    platform.write_port8(PIC1_DATA, 0x00);
    platform.write_port8(PIC2_DATA, 0x00);

    log_info!(
        "PIC remapped: master {:#x}, slave {:#x}, all lines unmasked",
        PIC_1_OFFSET,
        PIC_2_OFFSET
    );
    InterruptsReady(())
}

pub fn enable_interrupts<P: Platform>(platform: &mut P, _ready: InterruptsReady) {
    platform.set_interrupt_flag(true);
    log_info!("Hardware interrupts: enabled");
}

/// Acknowledge `irq`. Slave lines need both chips, slave first.
pub fn send_eoi<P: Platform>(platform: &mut P, irq: u8) {
    if irq >= 8 {
        platform.write_port8(PIC2_COMMAND, EOI);
    }
    platform.write_port8(PIC1_COMMAND, EOI);
}

/// Lowest pending line across both chips, if any.
///
/// The cascade line only mirrors the slave and is never reported itself.
pub fn pending_irq<P: Platform>(platform: &mut P) -> Option<u8> {
    platform.write_port8(PIC1_COMMAND, OCW3_READ_IRR);
    let master = platform.read_port8(PIC1_COMMAND);
    platform.write_port8(PIC2_COMMAND, OCW3_READ_IRR);
    let slave = platform.read_port8(PIC2_COMMAND);

    let requests = (master as u16 | (slave as u16) << 8) & !(1 << CASCADE_LINE);
    if requests == 0 {
        None
    } else {
        Some(requests.trailing_zeros() as u8)
    }
}

/// Whether the controller owning `irq` has it in service.
///
/// A request that drops before the CPU acknowledges it is reported as the
/// chip's lowest-priority line (7 or 15) with no in-service bit set.
pub fn in_service<P: Platform>(platform: &mut P, irq: u8) -> bool {
    let (port, bit) = if irq < 8 {
        (PIC1_COMMAND, irq)
    } else {
        (PIC2_COMMAND, irq - 8)
    };
    platform.write_port8(port, OCW3_READ_ISR);
    platform.read_port8(port) & (1 << bit) != 0
}

/// CPU vector a line is delivered on after remapping.
pub fn vector_for(irq: u8) -> u8 {
    if irq < 8 {
        PIC_1_OFFSET + irq
    } else {
        PIC_2_OFFSET + (irq - 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interrupts::idt::{install_interrupt_table, InterruptTable};
    use crate::platform::{Op, RecordingPlatform};

    fn ready(platform: &mut RecordingPlatform) -> InterruptsReady {
        let mut table = Box::new(InterruptTable::new());
        let installed = install_interrupt_table(&mut table, platform, |_| 0x1000);
        remap_and_unmask(platform, installed)
    }

    #[test]
    fn test_initialization_words_in_order() {
        let mut platform = RecordingPlatform::new();
        ready(&mut platform);

        assert_eq!(platform.writes_to(PIC1_COMMAND), vec![0x11]);
        assert_eq!(platform.writes_to(PIC2_COMMAND), vec![0x11]);
        assert_eq!(platform.writes_to(PIC1_DATA), vec![0x20, 0x04, 0x01, 0x00]);
        assert_eq!(platform.writes_to(PIC2_DATA), vec![0x28, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_enable_after_remap() {
        let mut platform = RecordingPlatform::new();
        let token = ready(&mut platform);
        enable_interrupts(&mut platform, token);

        let last_mask = platform.ops.iter().rposition(|op| *op == Op::Out(PIC2_DATA, 0x00));
        let sti = platform.position(Op::InterruptFlag(true));
        assert!(sti > last_mask);
        assert_eq!(sti, Some(platform.ops.len() - 1));
    }

    #[test]
    fn test_eoi_master_only_for_low_lines() {
        let mut platform = RecordingPlatform::new();
        send_eoi(&mut platform, 1);
        assert_eq!(platform.ops, vec![Op::Out(PIC1_COMMAND, 0x20)]);
    }

    #[test]
    fn test_eoi_slave_before_master() {
        for irq in 8..16 {
            let mut platform = RecordingPlatform::new();
            send_eoi(&mut platform, irq);
            assert_eq!(
                platform.ops,
                vec![Op::Out(PIC2_COMMAND, 0x20), Op::Out(PIC1_COMMAND, 0x20)]
            );
        }
    }

    #[test]
    fn test_pending_irq_reads_request_registers() {
        let mut platform = RecordingPlatform::new();
        platform.feed(PIC1_COMMAND, &[0b0000_0010]);
        assert_eq!(pending_irq(&mut platform), Some(1));
        assert_eq!(
            platform.ops,
            vec![
                Op::Out(PIC1_COMMAND, 0x0A),
                Op::In(PIC1_COMMAND),
                Op::Out(PIC2_COMMAND, 0x0A),
                Op::In(PIC2_COMMAND),
            ]
        );
    }

    #[test]
    fn test_pending_irq_skips_cascade_line() {
        let mut platform = RecordingPlatform::new();
        platform.feed(PIC1_COMMAND, &[0b0000_0100]);
        platform.feed(PIC2_COMMAND, &[0b0001_0000]);
        assert_eq!(pending_irq(&mut platform), Some(12));

        let mut idle = RecordingPlatform::new();
        idle.feed(PIC1_COMMAND, &[0b0000_0100]);
        assert_eq!(pending_irq(&mut idle), None);
    }

    #[test]
    fn test_in_service_reads_owning_chip() {
        let mut platform = RecordingPlatform::new();
        platform.feed(PIC1_COMMAND, &[0x80]);
        platform.feed(PIC2_COMMAND, &[0x40]);

        assert!(in_service(&mut platform, 7));
        assert!(!in_service(&mut platform, 15));
        assert_eq!(
            platform.ops,
            vec![
                Op::Out(PIC1_COMMAND, 0x0B),
                Op::In(PIC1_COMMAND),
                Op::Out(PIC2_COMMAND, 0x0B),
                Op::In(PIC2_COMMAND),
            ]
        );
    }

    #[test]
    fn test_vector_for_remapped_lines() {
        assert_eq!(vector_for(0), 0x20);
        assert_eq!(vector_for(7), 0x27);
        assert_eq!(vector_for(8), 0x28);
        assert_eq!(vector_for(12), 0x2C);
    }
}
