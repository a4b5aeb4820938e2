//! Cache sizes from the deterministic cache parameter leaves.

use core::fmt::{self, Write};

use cpuscope_logging::log_debug;

use crate::fmt::Indenter;

use super::{Probe, VendorPath, EXTENDED_BASE, LOG_CAT};

/// Upper bound on the cache sub-leaves that are walked
const MAX_CACHE_SUBLEAVES: u32 = 32;

/// Size of each cache level in bytes, -1 when it couldn't be detected.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CacheGeometry {
    /// L1 instruction cache (per core)
    pub l1i: i64,
    /// L1 data cache (per core)
    pub l1d: i64,
    /// L2 cache
    pub l2: i64,
    /// L3 cache
    pub l3: i64,
}

impl CacheGeometry {
    /// Value of a cache level that wasn't detected
    pub const UNDETECTED: i64 = -1;

    pub const fn undetected() -> Self {
        Self {
            l1i: Self::UNDETECTED,
            l1d: Self::UNDETECTED,
            l2: Self::UNDETECTED,
            l3: Self::UNDETECTED,
        }
    }

    fn store(&mut self, level: u32, cache_type: u32, size: i64) {
        match (level, cache_type) {
            (1, 1) => self.l1d = size,
            (1, 2) => self.l1i = size,
            (1, 3) => {
                if self.l1d < 0 {
                    self.l1d = size;
                }
                if self.l1i < 0 {
                    self.l1i = size;
                }
            },
            (2, _) => self.l2 = size,
            (3, _) => self.l3 = size,
            _ => {},
        }
    }
}

impl Default for CacheGeometry {
    fn default() -> Self {
        Self::undetected()
    }
}

struct CacheSize(i64);

impl fmt::Display for CacheSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            size if size < 0 => f.write_str("undetected"),
            size if size >= 1024 * 1024 && size % (1024 * 1024) == 0 => write!(f, "{} MiB", size / (1024 * 1024)),
            size if size >= 1024 && size % 1024 == 0 => write!(f, "{} KiB", size / 1024),
            size => write!(f, "{size} B"),
        }
    }
}

impl fmt::Display for CacheGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cache:")?;

        let mut indenter = Indenter::new(f);
        writeln!(indenter, "L1 instruction: {}", CacheSize(self.l1i))?;
        writeln!(indenter, "L1 data:        {}", CacheSize(self.l1d))?;
        writeln!(indenter, "L2:             {}", CacheSize(self.l2))?;
        write!(indenter, "L3:             {}", CacheSize(self.l3))
    }
}

pub(crate) fn detect(probe: &Probe<'_>) -> CacheGeometry {
    let mut cache = CacheGeometry::undetected();
    match probe.path() {
        VendorPath::Intel => {
            if probe.max_leaf >= 4 {
                walk_cache_leaf(probe, 4, &mut cache);
            }
        },
        VendorPath::Amd => detect_amd(probe, &mut cache),
        VendorPath::Other => {},
    }
    cache
}

fn detect_amd(probe: &Probe<'_>, cache: &mut CacheGeometry) {
    let Some(l1) = probe.leaf(EXTENDED_BASE + 5) else {
        return;
    };
    cache.l1d = i64::from((l1.ecx >> 24) & 0xFF) * 1024;
    cache.l1i = i64::from((l1.edx >> 24) & 0xFF) * 1024;

    let Some(l2) = probe.leaf(EXTENDED_BASE + 6) else {
        return;
    };
    cache.l2 = i64::from((l2.ecx >> 16) & 0xFFFF) * 1024;

    // Cache topology leaf, more precise when present
    if probe.has_leaf(EXTENDED_BASE + 0x1D) {
        walk_cache_leaf(probe, EXTENDED_BASE + 0x1D, cache);
    }
}

/// Walk the sub-leaves of a deterministic cache parameter leaf (Intel leaf 4 or AMD 0x8000_001D) until a null cache type
fn walk_cache_leaf(probe: &Probe<'_>, leaf: u32, cache: &mut CacheGeometry) {
    for sub_leaf in 0..MAX_CACHE_SUBLEAVES {
        let Some(regs) = probe.subleaf(leaf, sub_leaf) else {
            return;
        };

        let cache_type = regs.eax & 0xF;
        if cache_type == 0 {
            return;
        }
        let level = (regs.eax >> 5) & 0x7;

        let line_size = u64::from(regs.ebx & 0xFFF) + 1;
        let partitions = u64::from((regs.ebx >> 12) & 0x3FF) + 1;
        let ways = u64::from((regs.ebx >> 22) & 0x3FF) + 1;
        let sets = u64::from(regs.ecx) + 1;
        // Fully set fields reach 2^64, which doesn't fit
        let size = ways.checked_mul(partitions)
            .and_then(|size| size.checked_mul(line_size))
            .and_then(|size| size.checked_mul(sets))
            .and_then(|size| i64::try_from(size).ok());
        match size {
            Some(size) => cache.store(level, cache_type, size),
            None => log_debug!(LOG_CAT, "Cache sub-leaf {sub_leaf} of {leaf:#x} reports a size that doesn't fit, skipping it"),
        }
    }
}
