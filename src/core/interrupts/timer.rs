//! Programmable interval timer (8253/8254, channel 0) and the tick handler.

use crate::platform::ports::{PIT_CHANNEL0, PIT_COMMAND};
use crate::platform::Platform;
use crate::task::Scheduler;

/// PIT input clock in Hz.
pub const PIT_FREQUENCY: u32 = 1_193_180;

/// Channel 0, lobyte/hibyte access, mode 3 (square wave), binary.
const CHANNEL0_SQUARE_WAVE: u8 = 0x36;

pub fn divisor_for(hz: u32) -> u16 {
    let divisor = PIT_FREQUENCY / hz.max(1);
    divisor.clamp(1, u16::MAX as u32) as u16
}

/// Program channel 0 to fire `hz` times per second.
pub fn program_interval_timer<P: Platform>(platform: &mut P, hz: u32) {
    let divisor = divisor_for(hz);
    platform.write_port8(PIT_COMMAND, CHANNEL0_SQUARE_WAVE);
    platform.write_port8(PIT_CHANNEL0, (divisor & 0xFF) as u8);
    platform.write_port8(PIT_CHANNEL0, (divisor >> 8) as u8);
    log_info!("PIT: {} Hz (divisor {})", hz, divisor);
}

pub fn on_tick(ticks: &mut u64, scheduler: &mut Scheduler) {
    *ticks = ticks.wrapping_add(1);
    scheduler.tick();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Op, RecordingPlatform, SavedContext};

    #[test]
    fn test_hundred_hertz_divisor() {
        assert_eq!(divisor_for(100), 11931);
        assert_eq!(divisor_for(0), u16::MAX);
        assert_eq!(divisor_for(10), u16::MAX);
    }

    #[test]
    fn test_program_writes_command_then_divisor_low_high() {
        let mut platform = RecordingPlatform::new();
        program_interval_timer(&mut platform, 100);
        assert_eq!(
            platform.ops,
            vec![
                Op::Out(0x43, 0x36),
                Op::Out(0x40, (11931 & 0xFF) as u8),
                Op::Out(0x40, (11931 >> 8) as u8),
            ]
        );
    }

    #[test]
    fn test_tick_counts_and_charges_current_task() {
        let mut scheduler = Scheduler::new(100);
        scheduler.spawn(3, SavedContext::EMPTY).unwrap();
        let mut ticks = 0;

        on_tick(&mut ticks, &mut scheduler);
        on_tick(&mut ticks, &mut scheduler);
        assert_eq!(ticks, 2);
        assert_eq!(scheduler.task(0).unwrap().time_slice, 98);
    }
}
