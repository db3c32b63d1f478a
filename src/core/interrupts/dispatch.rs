//! # Interrupt Dispatcher
//!
//! Turns a pending PIC line into a device-handler call followed by EOI.
//!
//! ```text
//!        pending_irq()
//!   idle ─────────────▶ servicing ──route──▶ handler ──▶ send_eoi ──▶ idle
//!    ▲                                                                 │
//!    └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Which handler a line reaches is decided by [`IrqRoutes`], not by code:
//! the kernel configuration owns the table.
//!
//! Lines arrive two ways. The IDT stubs call [`service_delivered`] for a
//! line the CPU acknowledged; the main loop calls [`poll`], which finds a
//! request still sitting in the IRR because interrupts were off. A line the
//! loop services can still be latched and delivered once more through its
//! stub, so a timer edge may occasionally be counted twice. A keyboard byte
//! read by the loop makes the latched request vanish, which the controller
//! reports as a spurious 7; `service_delivered` filters those out.

use crate::core::interrupts::{pic, timer};
use crate::core::kernel::Kernel;
use crate::devices::drivers::{ps2_keyboard, ps2_mouse};
use crate::platform::Platform;

pub const IRQ_LINES: usize = 16;

/// Lowest-priority line of each chip, where vanished requests show up.
const SPURIOUS_MASTER: u8 = 7;
const SPURIOUS_SLAVE: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqRoute {
    Keyboard,
    Mouse,
    Timer,
    /// No handler; the line is only acknowledged.
    AcknowledgeOnly,
}

/// Handler assignment for each of the 16 PIC lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqRoutes {
    lines: [IrqRoute; IRQ_LINES],
}

impl IrqRoutes {
    pub const EMPTY: IrqRoutes = IrqRoutes {
        lines: [IrqRoute::AcknowledgeOnly; IRQ_LINES],
    };

    pub const DEFAULT: IrqRoutes = IrqRoutes::EMPTY
        .with(1, IrqRoute::Keyboard)
        .with(12, IrqRoute::Mouse)
        .with(8, IrqRoute::Timer);

    /// Same table with `line` bound to `route`. Lines past 15 are ignored.
    pub const fn with(mut self, line: u8, route: IrqRoute) -> Self {
        if (line as usize) < IRQ_LINES {
            self.lines[line as usize] = route;
        }
        self
    }

    pub fn route(&self, line: u8) -> IrqRoute {
        self.lines
            .get(line as usize)
            .copied()
            .unwrap_or(IrqRoute::AcknowledgeOnly)
    }
}

impl Default for IrqRoutes {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Run the handler routed for `irq`, then acknowledge it.
pub fn service<P: Platform>(kernel: &mut Kernel, platform: &mut P, irq: u8) -> IrqRoute {
    let route = kernel.routes.route(irq);
    match route {
        IrqRoute::Keyboard => ps2_keyboard::handle_irq(&mut kernel.scancodes, platform),
        IrqRoute::Mouse => ps2_mouse::handle_irq(&mut kernel.mouse, platform),
        IrqRoute::Timer => timer::on_tick(&mut kernel.ticks, &mut kernel.scheduler),
        IrqRoute::AcknowledgeOnly => log_debug!("irq {}: acknowledge only", irq),
    }
    pic::send_eoi(platform, irq);
    route
}

/// Entry for a line delivered through its IDT stub.
///
/// A spurious 7 or 15 runs no handler and gets no EOI from its own chip;
/// a spurious 15 still owes the master one for the cascade line.
pub fn service_delivered<P: Platform>(
    kernel: &mut Kernel,
    platform: &mut P,
    irq: u8,
) -> Option<IrqRoute> {
    if (irq == SPURIOUS_MASTER || irq == SPURIOUS_SLAVE) && !pic::in_service(platform, irq) {
        if irq == SPURIOUS_SLAVE {
            pic::send_eoi(platform, pic::CASCADE_LINE);
        }
        log_debug!("irq {}: spurious", irq);
        return None;
    }
    Some(service(kernel, platform, irq))
}

/// Service the lowest pending line, if the controllers report one.
pub fn poll<P: Platform>(kernel: &mut Kernel, platform: &mut P) -> Option<u8> {
    let irq = pic::pending_irq(platform)?;
    service(kernel, platform, irq);
    Some(irq)
}
