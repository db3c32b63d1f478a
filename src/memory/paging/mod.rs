//! # Paging Module
//!
//! Builds the kernel's flat address space: the first GiB of physical memory
//! identity-mapped with 2 MiB pages.
//!
//! ```text
//! PML4[0] ──▶ PDPT[0] ──▶ PD[0..512]
//!                          │
//!                          └─ PD[i] = i * 2 MiB | PRESENT | WRITABLE | HUGE_PAGE
//! ```
//!
//! The tables are written once at boot and never changed afterwards.

use x86_64::structures::paging::{PageTable, PageTableFlags};
use x86_64::PhysAddr;

use crate::platform::Platform;

pub const HUGE_PAGE_SIZE: u64 = 0x20_0000;
pub const ENTRIES_PER_TABLE: usize = 512;
/// Bytes covered by the identity map (512 × 2 MiB).
pub const IDENTITY_MAP_SIZE: u64 = HUGE_PAGE_SIZE * ENTRIES_PER_TABLE as u64;

/// Flags of the two upper levels (`0x3`).
pub const TABLE_FLAGS: PageTableFlags =
    PageTableFlags::from_bits_truncate(PageTableFlags::PRESENT.bits() | PageTableFlags::WRITABLE.bits());

/// Flags of every directory entry (`0x83`).
pub const HUGE_PAGE_FLAGS: PageTableFlags = PageTableFlags::from_bits_truncate(
    PageTableFlags::PRESENT.bits() | PageTableFlags::WRITABLE.bits() | PageTableFlags::HUGE_PAGE.bits(),
);

/// The three tables of the identity map, each page aligned.
#[repr(C)]
pub struct IdentityMap {
    pml4: PageTable,
    pdpt: PageTable,
    directory: PageTable,
}

impl IdentityMap {
    pub const fn new() -> Self {
        Self {
            pml4: PageTable::new(),
            pdpt: PageTable::new(),
            directory: PageTable::new(),
        }
    }

    /// Copy the top-level entries above slot 0 from `active`.
    ///
    /// The bootloader keeps the kernel image, its stack and the physical
    /// memory window in those slots; slot 0 is replaced by the identity map.
    pub fn adopt_upper_entries(&mut self, active: &PageTable) {
        for index in 1..ENTRIES_PER_TABLE {
            self.pml4[index] = active[index].clone();
        }
    }

    pub fn top_level(&self) -> &PageTable {
        &self.pml4
    }

    pub fn directory_pointer(&self) -> &PageTable {
        &self.pdpt
    }

    pub fn directory(&self) -> &PageTable {
        &self.directory
    }

    /// Physical address of the top-level table, as it goes into CR3.
    pub fn root_address<P: Platform>(&self, platform: &P) -> u64 {
        platform.table_address(&self.pml4 as *const PageTable as u64)
    }

    fn build<P: Platform>(&mut self, platform: &P) {
        for (index, entry) in self.directory.iter_mut().enumerate() {
            let frame = PhysAddr::new(index as u64 * HUGE_PAGE_SIZE);
            entry.set_addr(frame, HUGE_PAGE_FLAGS);
        }

        let directory = platform.table_address(&self.directory as *const PageTable as u64);
        self.pdpt.zero();
        self.pdpt[0].set_addr(PhysAddr::new(directory), TABLE_FLAGS);

        let pdpt = platform.table_address(&self.pdpt as *const PageTable as u64);
        self.pml4[0].set_addr(PhysAddr::new(pdpt), TABLE_FLAGS);
    }
}

impl Default for IdentityMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the identity map and make it the active address space.
///
/// Returns the physical address loaded into CR3. There is no failure path:
/// a bad table here takes the machine down on the next memory access.
pub fn install_identity_map<P: Platform>(map: &mut IdentityMap, platform: &mut P) -> u64 {
    map.build(platform);
    let root = map.root_address(platform);
    // SAFETY: the table was just filled; slot 0 covers the low GiB and the
    // upper slots were adopted from the bootloader's table by the caller.
    unsafe { platform.load_page_table(root) };
    log_info!(
        "paging: identity map 0..{:#x} installed, root {:#x}",
        IDENTITY_MAP_SIZE,
        root
    );
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Op, RecordingPlatform};

    fn installed() -> (Box<IdentityMap>, RecordingPlatform, u64) {
        let mut map = Box::new(IdentityMap::new());
        let mut platform = RecordingPlatform::new();
        let root = install_identity_map(&mut map, &mut platform);
        (map, platform, root)
    }

    #[test]
    fn test_directory_entries_advance_by_two_mib() {
        let (map, _, _) = installed();
        for (index, entry) in map.directory().iter().enumerate() {
            assert_eq!(entry.addr().as_u64(), index as u64 * 0x20_0000);
            assert_eq!(entry.flags().bits(), 0x83);
        }
        assert_eq!(map.directory().iter().count(), 512);
    }

    #[test]
    fn test_upper_levels_chain_to_directory() {
        let (map, _, root) = installed();
        let directory = map.directory() as *const PageTable as u64;
        let pdpt = map.directory_pointer() as *const PageTable as u64;

        assert_eq!(map.directory_pointer()[0].addr().as_u64(), directory);
        assert_eq!(map.directory_pointer()[0].flags().bits(), 0x3);
        assert_eq!(map.top_level()[0].addr().as_u64(), pdpt);
        assert_eq!(map.top_level()[0].flags().bits(), 0x3);
        assert_eq!(root, map.top_level() as *const PageTable as u64);
    }

    #[test]
    fn test_only_slot_zero_present_without_adoption() {
        let (map, _, _) = installed();
        assert!(map.top_level().iter().skip(1).all(|entry| entry.is_unused()));
        assert!(map.directory_pointer().iter().skip(1).all(|entry| entry.is_unused()));
    }

    #[test]
    fn test_root_loaded_into_cr3() {
        let (_, platform, root) = installed();
        assert_eq!(platform.ops, vec![Op::LoadPageTable(root)]);
        assert_eq!(platform.cpu.address_space, root);
    }

    #[test]
    fn test_adopted_entries_survive_install() {
        let mut active = Box::new(PageTable::new());
        active[0].set_addr(PhysAddr::new(0x5000), TABLE_FLAGS);
        active[511].set_addr(PhysAddr::new(0x9000), TABLE_FLAGS);

        let mut map = Box::new(IdentityMap::new());
        map.adopt_upper_entries(&active);
        let mut platform = RecordingPlatform::new();
        install_identity_map(&mut map, &mut platform);

        assert_eq!(map.top_level()[511].addr().as_u64(), 0x9000);
        assert_ne!(map.top_level()[0].addr().as_u64(), 0x5000);
    }
}
