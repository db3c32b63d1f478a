//! # Memory Integrity Checker
//!
//! A small table of regions the kernel expects to stay mapped. Every main
//! loop iteration reads each byte of each region, in table order; a region
//! that lost its mapping faults right there instead of corrupting something
//! later. Nothing here reports an error itself: the page fault does.

use core::fmt;

use crate::platform::Platform;

pub const MAX_REGIONS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions(pub u32);

impl Permissions {
    pub const READ: Permissions = Permissions(0x1);
    pub const WRITE: Permissions = Permissions(0x2);
    pub const READ_WRITE: Permissions = Permissions(0x3);

    pub fn contains(self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedRegion {
    pub start: u64,
    pub size: u64,
    pub permissions: Permissions,
}

impl ProtectedRegion {
    const EMPTY: ProtectedRegion = ProtectedRegion {
        start: 0,
        size: 0,
        permissions: Permissions(0),
    };

    pub fn end(&self) -> Option<u64> {
        self.start.checked_add(self.size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionError {
    TableFull,
    Empty,
    Overflow { start: u64, size: u64 },
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionError::TableFull => write!(f, "all {} protected regions in use", MAX_REGIONS),
            RegionError::Empty => write!(f, "protected region has no bytes"),
            RegionError::Overflow { start, size } => {
                write!(f, "region {:#x}+{:#x} wraps the address space", start, size)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RegionTable {
    regions: [ProtectedRegion; MAX_REGIONS],
    len: usize,
}

impl RegionTable {
    pub const fn new() -> Self {
        Self {
            regions: [ProtectedRegion::EMPTY; MAX_REGIONS],
            len: 0,
        }
    }

    pub fn add(&mut self, region: ProtectedRegion) -> Result<(), RegionError> {
        if region.size == 0 {
            return Err(RegionError::Empty);
        }
        if region.end().is_none() {
            return Err(RegionError::Overflow {
                start: region.start,
                size: region.size,
            });
        }
        let slot = self.regions.get_mut(self.len).ok_or(RegionError::TableFull)?;
        *slot = region;
        self.len += 1;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn regions(&self) -> &[ProtectedRegion] {
        &self.regions[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read every byte of every region, in table order. Returns the number
    /// of bytes touched.
    pub fn verify<P: Platform>(&self, platform: &mut P) -> u64 {
        let mut touched = 0;
        for region in self.regions() {
            for addr in region.start..region.start + region.size {
                platform.probe_byte(addr);
            }
            touched += region.size;
        }
        touched
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::RecordingPlatform;

    fn region(start: u64, size: u64) -> ProtectedRegion {
        ProtectedRegion {
            start,
            size,
            permissions: Permissions::READ_WRITE,
        }
    }

    #[test]
    fn test_verify_touches_every_byte_in_region_order() {
        let mut table = RegionTable::new();
        table.add(region(0x2000, 3)).unwrap();
        table.add(region(0x1000, 2)).unwrap();
        let mut platform = RecordingPlatform::new();

        assert_eq!(table.verify(&mut platform), 5);
        assert_eq!(platform.probes, vec![0x2000, 0x2001, 0x2002, 0x1000, 0x1001]);
    }

    #[test]
    fn test_empty_table_probes_nothing() {
        let table = RegionTable::new();
        let mut platform = RecordingPlatform::new();
        assert_eq!(table.verify(&mut platform), 0);
        assert!(platform.probes.is_empty());
    }

    #[test]
    fn test_add_rejects_bad_regions() {
        let mut table = RegionTable::new();
        assert_eq!(table.add(region(0x1000, 0)), Err(RegionError::Empty));
        assert_eq!(
            table.add(region(u64::MAX, 2)),
            Err(RegionError::Overflow {
                start: u64::MAX,
                size: 2
            })
        );
        for index in 0..MAX_REGIONS as u64 {
            table.add(region(index * 0x1000, 1)).unwrap();
        }
        assert_eq!(table.add(region(0, 1)), Err(RegionError::TableFull));
        assert_eq!(table.len(), MAX_REGIONS);
    }

    #[test]
    fn test_read_write_permissions() {
        assert_eq!(Permissions::READ_WRITE.0, 0x3);
        assert!(Permissions::READ_WRITE.contains(Permissions::READ));
        assert!(Permissions::READ_WRITE.contains(Permissions::WRITE));
        assert!(!Permissions::READ.contains(Permissions::WRITE));
    }
}
