//! # Memory
//!
//! The kernel never allocates. This module only knows where the bootloader
//! put the physical-memory window (needed to turn the virtual addresses of
//! the statically allocated page tables into physical ones) and owns the
//! identity-map builder in [`paging`].

pub mod paging;

use core::sync::atomic::{AtomicU64, Ordering};

pub use paging::{install_identity_map, IdentityMap};

static PHYSICAL_MEMORY_OFFSET: AtomicU64 = AtomicU64::new(0);

/// Record the virtual base of the bootloader's physical-memory window.
pub fn init(physical_memory_offset: u64) {
    PHYSICAL_MEMORY_OFFSET.store(physical_memory_offset, Ordering::Relaxed);
}

pub fn physical_memory_offset() -> u64 {
    PHYSICAL_MEMORY_OFFSET.load(Ordering::Relaxed)
}

#[cfg(target_os = "none")]
pub use hardware::{active_top_level, virt_to_phys};

#[cfg(target_os = "none")]
mod hardware {
    use x86_64::registers::control::Cr3;
    use x86_64::structures::paging::{OffsetPageTable, PageTable, Translate};
    use x86_64::{PhysAddr, VirtAddr};

    use super::physical_memory_offset;

    /// The top-level table CR3 currently points at, seen through the
    /// physical-memory window.
    ///
    /// # Safety
    /// The window must cover the table and nobody else may hold a mutable
    /// reference to it.
    pub unsafe fn active_top_level() -> &'static mut PageTable {
        let (frame, _) = Cr3::read();
        let virt = VirtAddr::new(physical_memory_offset() + frame.start_address().as_u64());
        &mut *virt.as_mut_ptr::<PageTable>()
    }

    pub fn virt_to_phys(addr: VirtAddr) -> Option<PhysAddr> {
        let offset = VirtAddr::new(physical_memory_offset());
        // SAFETY: only read through the mapper, before CR3 changes hands.
        let mapper = unsafe { OffsetPageTable::new(active_top_level(), offset) };
        mapper.translate_addr(addr)
    }
}
