#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
extern crate rlibc;

#[cfg(target_os = "none")]
mod entry {
    use core::fmt::Write;
    use core::panic::PanicInfo;

    use bootloader_api::config::{BootloaderConfig, Mapping};
    use bootloader_api::{entry_point, BootInfo};

    use phoneos::core::interrupts::{gdt, handlers::handler_address, pic};
    use phoneos::core::kernel::state::{BARE_METAL_CONFIG, KERNEL};
    use phoneos::core::kernel::{halt, tasks, Phase};
    use phoneos::devices::vga_text::Color;
    use phoneos::platform::HardwarePlatform;
    use phoneos::{log, log_error, log_info, log_warn, memory, Platform};

    pub static BOOTLOADER_CONFIG: BootloaderConfig = {
        let mut config = BootloaderConfig::new_default();
        config.mappings.physical_memory = Some(Mapping::Dynamic);
        config.kernel_stack_size = 128 * 1024;
        config
    };

    entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

    /// Priority of the start-up banner; above the main loop so it runs first.
    const BANNER_PRIORITY: u8 = 5;

    fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
        let mut platform = HardwarePlatform::new();
        platform.set_interrupt_flag(false);

        log::init(BARE_METAL_CONFIG.log_level);
        pic::mask_all();
        gdt::init();

        let Some(offset) = boot_info.physical_memory_offset.into_option() else {
            log_error!("bootloader did not map physical memory");
            halt()
        };
        memory::init(offset);

        let ready = KERNEL.with(|kernel| {
            // SAFETY: the bootloader's table is only read here, before CR3
            // moves to the identity map.
            kernel.paging.adopt_upper_entries(unsafe { memory::active_top_level() });
            let ready = kernel.boot(&mut platform, handler_address);
            if let Err(err) = kernel.adopt_boot_context() {
                log_error!("main loop task: {}", err);
            }
            ready
        });

        if let Err(err) = tasks::spawn_kernel_task(banner, BANNER_PRIORITY) {
            log_warn!("banner task: {}", err);
        }

        pic::enable_interrupts(&mut platform, ready);
        log_info!("entering main loop");

        loop {
            for phase in Phase::ORDER {
                if phase == Phase::Integrity {
                    let regions = KERNEL.with(|kernel| kernel.begin_integrity());
                    let probed = regions.verify(&mut platform);
                    KERNEL.with(|kernel| kernel.finish_integrity(probed));
                } else {
                    KERNEL.with(|kernel| kernel.run_phase(phase, &mut platform));
                }
            }
        }
    }

    fn banner() {
        KERNEL.with(|kernel| {
            let root = kernel.address_space();
            let hz = kernel.config.timer_hz;
            let display = &mut kernel.display;
            display.set_color(Color::LightGreen, Color::Black);
            display.write_str("PhoneOS kernel core\n");
            display.set_color(Color::White, Color::Black);
            let _ = writeln!(display, "identity map root {:#x}, timer {} Hz", root, hz);
        });
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        log_error!("PANIC: {}", info);
        halt()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    println!("phoneos boots on bare metal; build it for x86_64-unknown-none");
}
