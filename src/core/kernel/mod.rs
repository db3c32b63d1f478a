//! # Kernel Context
//!
//! [`Kernel`] holds every piece of process-wide state: page tables,
//! interrupt table, task table, input buffers, display and protected
//! regions. Components get it (or the part they need) passed in
//! explicitly; on bare metal the single instance lives in
//! [`state::KERNEL`].
//!
//! ## Main Loop
//!
//! ```text
//!  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌───────────┐
//!  │ Dispatch │──▶│ Schedule │──▶│ Display  │──▶│ Integrity │──┐
//!  └──────────┘   └──────────┘   └──────────┘   └───────────┘  │
//!       ▲                                                      │
//!       └──────────────────────────────────────────────────────┘
//! ```
//!
//! The four phases always run in [`Phase::ORDER`]. On bare metal the
//! integrity scan runs between [`Kernel::begin_integrity`] and
//! [`Kernel::finish_integrity`], outside the kernel cell.

pub mod integrity;
pub mod tasks;

#[cfg(target_os = "none")]
pub mod state;

use crate::config::KernelConfig;
use crate::core::interrupts::dispatch::{self, IrqRoutes};
use crate::core::interrupts::idt::{install_interrupt_table, InterruptTable};
use crate::core::interrupts::pic::{remap_and_unmask, InterruptsReady};
use crate::core::interrupts::timer::program_interval_timer;
use crate::devices::drivers::{ps2_mouse, MouseState, ScancodeBuffer};
use crate::devices::vga_text::{Display, BUFFER_WIDTH, STATUS_ROW};
use crate::memory::{install_identity_map, IdentityMap};
use crate::platform::{Platform, SavedContext};
use crate::task::{Scheduler, SchedulerError};

use integrity::RegionTable;

/// Slot the boot context occupies once it becomes the main-loop task.
pub const MAIN_LOOP_SLOT: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Dispatch,
    Schedule,
    Display,
    Integrity,
}

impl Phase {
    pub const ORDER: [Phase; 4] = [
        Phase::Dispatch,
        Phase::Schedule,
        Phase::Display,
        Phase::Integrity,
    ];
}

/// What the last main-loop iteration did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub serviced: Option<u8>,
    pub switched: Option<(usize, usize)>,
    pub cells_written: usize,
    pub bytes_probed: u64,
}

pub struct Kernel {
    pub paging: IdentityMap,
    pub idt: InterruptTable,
    pub scheduler: Scheduler,
    pub scancodes: ScancodeBuffer,
    pub mouse: MouseState,
    pub display: Display,
    pub regions: RegionTable,
    pub ticks: u64,
    pub routes: IrqRoutes,
    pub config: KernelConfig,
    /// CR3 value of the identity map, once installed.
    address_space: u64,
    iterations: u64,
    report: LoopReport,
}

impl Kernel {
    pub const fn new(config: KernelConfig) -> Self {
        Self {
            paging: IdentityMap::new(),
            idt: InterruptTable::new(),
            scheduler: Scheduler::new(config.initial_time_slice),
            scancodes: ScancodeBuffer::new(),
            mouse: MouseState::new(BUFFER_WIDTH as u16),
            display: Display::new(),
            regions: RegionTable::new(),
            ticks: 0,
            routes: config.routes,
            config,
            address_space: 0,
            iterations: 0,
            report: LoopReport {
                serviced: None,
                switched: None,
                cells_written: 0,
                bytes_probed: 0,
            },
        }
    }

    /// One-time initialization, interrupts masked throughout.
    ///
    /// The returned token is what `pic::enable_interrupts` needs; the caller
    /// decides when to spend it.
    pub fn boot<P, F>(&mut self, platform: &mut P, handler_address: F) -> InterruptsReady
    where
        P: Platform,
        F: Fn(u8) -> u64,
    {
        platform.set_interrupt_flag(false);

        self.address_space = install_identity_map(&mut self.paging, platform);

        self.regions.clear();
        if let Err(err) = self.regions.add(self.config.kernel_region) {
            log_warn!("integrity: kernel region not registered: {}", err);
        }

        let installed = install_interrupt_table(&mut self.idt, platform, handler_address);
        if let Err(err) = ps2_mouse::init(platform) {
            log_warn!("PS/2 mouse: {}", err);
        }
        let ready = remap_and_unmask(platform, installed);

        self.display.blank();
        self.display.refresh(platform);

        self.scheduler.reset();
        self.scancodes.clear();
        self.ticks = 0;
        self.iterations = 0;

        program_interval_timer(platform, self.config.timer_hz);
        log_info!("kernel: boot complete");
        ready
    }

    pub fn address_space(&self) -> u64 {
        self.address_space
    }

    /// Register the running (boot) context as the main-loop task. Its stack
    /// pointer is filled in by the first switch away from it.
    pub fn adopt_boot_context(&mut self) -> Result<usize, SchedulerError> {
        let context = SavedContext {
            stack_pointer: 0,
            address_space: self.address_space,
        };
        self.scheduler
            .activate(MAIN_LOOP_SLOT, self.config.main_loop_priority, context)?;
        Ok(MAIN_LOOP_SLOT)
    }

    /// Activate a task whose stack is already prepared for its first switch.
    pub fn spawn_task(&mut self, stack_pointer: u64, priority: u8) -> Result<usize, SchedulerError> {
        let context = SavedContext {
            stack_pointer,
            address_space: self.address_space,
        };
        self.scheduler.spawn(priority, context)
    }

    pub fn run_phase<P: Platform>(&mut self, phase: Phase, platform: &mut P) {
        match phase {
            Phase::Dispatch => {
                let serviced = dispatch::poll(self, platform);
                self.report.serviced = serviced;
            }
            Phase::Schedule => {
                // On bare metal this returns only when the main loop is
                // selected again.
                self.report.switched = self.scheduler.schedule(platform);
            }
            Phase::Display => {
                self.render_status();
                self.report.cells_written = self.display.refresh(platform);
                self.display.update_cursor(platform);
            }
            Phase::Integrity => {
                let regions = self.begin_integrity();
                let probed = regions.verify(platform);
                self.finish_integrity(probed);
            }
        }
    }

    /// Bookkeeping half of the integrity phase. Returns the table to scan;
    /// the scan itself needs no kernel state.
    pub fn begin_integrity(&mut self) -> RegionTable {
        self.scheduler.recount_active();
        self.regions
    }

    pub fn finish_integrity(&mut self, bytes_probed: u64) {
        self.report.bytes_probed = bytes_probed;
        self.iterations = self.iterations.wrapping_add(1);
    }

    /// One pass of the main loop.
    pub fn run_once<P: Platform>(&mut self, platform: &mut P) -> LoopReport {
        self.report = LoopReport::default();
        for phase in Phase::ORDER {
            self.run_phase(phase, platform);
        }
        self.report
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    fn render_status(&mut self) {
        let key = self.scancodes.latest().unwrap_or(0);
        let (task, priority) = match self.scheduler.current_task() {
            Some(task) => (task.slot, task.priority),
            None => (self.scheduler.current(), 0),
        };
        self.display.write_line_at(
            STATUS_ROW,
            format_args!(
                " ticks {} | task {} (prio {}) | active {} | mouse x {} | keys {} (last {:#04x})",
                self.ticks,
                task,
                priority,
                self.scheduler.active_count(),
                self.mouse.x(),
                self.scancodes.len(),
                key
            ),
        );
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::DEFAULT)
    }
}

/// Stop this CPU for good.
#[cfg(target_os = "none")]
pub fn halt() -> ! {
    x86_64::instructions::interrupts::disable();
    loop {
        x86_64::instructions::hlt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;
    use crate::core::interrupts::pic::enable_interrupts;
    use crate::core::kernel::integrity::{Permissions, ProtectedRegion};
    use crate::devices::vga_text::BLANK;
    use crate::platform::ports::{
        CRTC_INDEX, PIC1_COMMAND, PIC1_DATA, PIC2_DATA, PIT_COMMAND, PS2_COMMAND, PS2_DATA,
        PS2_STATUS,
    };
    use crate::platform::{Op, RecordingPlatform};

    fn small_config() -> KernelConfig {
        KernelConfig {
            kernel_region: ProtectedRegion {
                start: 0x1000,
                size: 64,
                permissions: Permissions::READ_WRITE,
            },
            ..KernelConfig::DEFAULT
        }
    }

    fn booted() -> (Box<Kernel>, RecordingPlatform) {
        let mut kernel = Box::new(Kernel::new(small_config()));
        let mut platform = RecordingPlatform::new();
        platform.feed(PS2_STATUS, &[0x01; 11]);
        platform.feed(PS2_DATA, &[0x00, 0xFA, 0xFA]);
        let ready = kernel.boot(&mut platform, |vector| 0x20_0000 + vector as u64);
        enable_interrupts(&mut platform, ready);
        (kernel, platform)
    }

    #[test]
    fn test_boot_order() {
        let (kernel, platform) = booted();

        let cli = platform.position(Op::InterruptFlag(false)).unwrap();
        let cr3 = platform.position(Op::LoadPageTable(kernel.address_space())).unwrap();
        let lidt = platform
            .ops
            .iter()
            .position(|op| matches!(op, Op::LoadDescriptorTable { .. }))
            .unwrap();
        let mouse = platform.position(Op::Out(PS2_COMMAND, 0xA8)).unwrap();
        let reporting = platform.position(Op::Out(PS2_DATA, 0xF4)).unwrap();
        let icw1 = platform.position(Op::Out(PIC1_COMMAND, 0x11)).unwrap();
        let unmask = platform.position(Op::Out(PIC2_DATA, 0x00)).unwrap();
        let pit = platform.position(Op::Out(PIT_COMMAND, 0x36)).unwrap();
        let sti = platform.position(Op::InterruptFlag(true)).unwrap();

        assert_eq!(cli, 0);
        assert!(cli < cr3 && cr3 < lidt && lidt < mouse && mouse < reporting);
        assert!(reporting < icw1 && icw1 < unmask);
        assert!(unmask < pit && pit < sti);
        assert_eq!(sti, platform.ops.len() - 1);
        assert_eq!(platform.writes_to(PIC1_DATA), vec![0x20, 0x04, 0x01, 0x00]);
    }

    #[test]
    fn test_boot_state() {
        let (kernel, platform) = booted();

        assert_eq!(kernel.regions.regions(), &[small_config().kernel_region]);
        assert!(platform.cells.iter().all(|&cell| cell == BLANK));
        assert_eq!(kernel.scheduler.active_count(), 0);
        assert_eq!(kernel.idt.gate(0x21).handler_address(), 0x20_0021);
        assert_eq!(kernel.ticks, 0);
    }

    #[test]
    fn test_default_kernel_region() {
        let region = KernelConfig::DEFAULT.kernel_region;
        assert_eq!(region.start, 0);
        assert_eq!(region.size, PAGE_SIZE * 1024);
        assert_eq!(region.permissions, Permissions::READ_WRITE);
    }

    #[test]
    fn test_phase_order() {
        assert_eq!(
            Phase::ORDER,
            [Phase::Dispatch, Phase::Schedule, Phase::Display, Phase::Integrity]
        );
    }

    #[test]
    fn test_run_once_runs_phases_in_order() {
        let (mut kernel, mut platform) = booted();
        kernel.adopt_boot_context().unwrap();
        kernel.spawn_task(0x7000, 9).unwrap();
        platform.clear();
        platform.feed(PIC1_COMMAND, &[0b0000_0010]);
        platform.feed(PS2_DATA, &[0x1C]);

        let report = kernel.run_once(&mut platform);

        let poll = platform.position(Op::Out(PIC1_COMMAND, 0x0A)).unwrap();
        let switch = platform
            .ops
            .iter()
            .position(|op| matches!(op, Op::Switch { .. }))
            .unwrap();
        let cursor = platform.position(Op::Out(CRTC_INDEX, 0x0F)).unwrap();
        assert!(poll < switch && switch < cursor);

        assert_eq!(report.serviced, Some(1));
        assert_eq!(report.switched, Some((0, 1)));
        assert!(report.cells_written > 0);
        assert_eq!(report.bytes_probed, 64);
        assert_eq!(platform.probes.first(), Some(&0x1000));
        assert_eq!(kernel.iterations(), 1);
    }

    #[test]
    fn test_idle_iteration() {
        let (mut kernel, mut platform) = booted();
        kernel.run_once(&mut platform);
        platform.clear();

        let report = kernel.run_once(&mut platform);
        assert_eq!(report.serviced, None);
        assert_eq!(report.switched, None);
        assert_eq!(report.cells_written, 0);
        assert!(platform.switches().is_empty());
    }

    #[test]
    fn test_status_line_reflects_state() {
        let (mut kernel, mut platform) = booted();
        kernel.ticks = 42;
        kernel.run_once(&mut platform);

        let line: String = (0..9)
            .map(|col| (kernel.display.cell(STATUS_ROW, col) & 0xFF) as u8 as char)
            .collect();
        assert_eq!(line, " ticks 42");
        assert_eq!(
            platform.cells[STATUS_ROW * BUFFER_WIDTH + 1],
            kernel.display.cell(STATUS_ROW, 1)
        );
    }

    #[test]
    fn test_status_line_names_current_task_priority() {
        let (mut kernel, mut platform) = booted();
        let row = |kernel: &Kernel| -> String {
            (0..BUFFER_WIDTH)
                .map(|col| (kernel.display.cell(STATUS_ROW, col) & 0xFF) as u8 as char)
                .collect()
        };

        kernel.run_once(&mut platform);
        assert!(row(&kernel).contains("| task 0 (prio 0) | active 0 |"));

        kernel.adopt_boot_context().unwrap();
        kernel.run_once(&mut platform);
        assert!(row(&kernel).contains("| task 0 (prio 1) | active 1 |"));
    }

    #[test]
    fn test_split_integrity_matches_phase() {
        let (mut kernel, mut platform) = booted();
        kernel.adopt_boot_context().unwrap();
        kernel.scheduler.deactivate(MAIN_LOOP_SLOT).unwrap();

        let regions = kernel.begin_integrity();
        assert_eq!(kernel.scheduler.active_count(), 0);
        kernel.regions.clear();
        assert_eq!(regions.regions(), &[small_config().kernel_region]);

        let probed = regions.verify(&mut platform);
        kernel.finish_integrity(probed);
        assert_eq!(probed, 64);
        assert_eq!(platform.probes.len(), 64);
        assert_eq!(kernel.iterations(), 1);
    }

    #[test]
    fn test_boot_context_uses_identity_map() {
        let (mut kernel, _) = booted();
        assert_eq!(kernel.adopt_boot_context(), Ok(MAIN_LOOP_SLOT));
        let task = kernel.scheduler.task(MAIN_LOOP_SLOT).unwrap();
        assert_eq!(task.priority, KernelConfig::DEFAULT.main_loop_priority);
        assert_eq!(task.context.address_space, kernel.address_space());
        assert_eq!(kernel.spawn_task(0x9000, 3), Ok(1));
    }
}
