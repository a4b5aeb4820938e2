//! Decoding of the x86 identification leaves.
//!
//! https://en.wikipedia.org/wiki/CPUID

use cpuscope_logging::{log_debug, LogCategory};

use crate::{
    primitive::{Cpuid, Registers},
    vendor::{self, Vendor},
};

pub(crate) mod cache;
pub(crate) mod features;
pub(crate) mod frequency;
pub(crate) mod sgx;
pub(crate) mod topology;

const LOG_CAT : LogCategory = LogCategory::new_with_sub("Cpu", "x86");

/// First extended leaf, reports the highest extended leaf
pub(crate) const EXTENDED_BASE: u32 = 0x8000_0000;

/// Check if bit `idx` of `val` is set
#[inline]
pub(crate) const fn bit(val: u32, idx: u32) -> bool {
    val & (1 << idx) != 0
}

/// Vendor-specific path taken for topology and cache decoding
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum VendorPath {
    Intel,
    /// AMD and Hygon, which share AMD's leaves
    Amd,
    /// No vendor-specific leaves are known
    Other,
}

impl VendorPath {
    pub(crate) fn of(vendor: Vendor) -> Self {
        match vendor {
            Vendor::Intel => VendorPath::Intel,
            Vendor::AMD | Vendor::Hygon => VendorPath::Amd,
            _ => VendorPath::Other,
        }
    }
}

/// Identification source bound to the highest supported leaves, every query above those is treated as absent.
pub(crate) struct Probe<'a> {
    cpuid: &'a dyn Cpuid,
    pub max_leaf: u32,
    pub max_ext_leaf: u32,
    pub vendor: Vendor,
    pub vendor_string: String,
}

impl<'a> Probe<'a> {
    pub(crate) fn new(cpuid: &'a dyn Cpuid) -> Self {
        let leaf0 = cpuid.cpuid(0);
        let (vendor, vendor_string) = vendor::resolve(leaf0);
        let max_ext_leaf = cpuid.cpuid(EXTENDED_BASE).eax;
        // Processors without extended leaves may echo back garbage
        let max_ext_leaf = if max_ext_leaf >= EXTENDED_BASE { max_ext_leaf } else { 0 };

        Self { cpuid, max_leaf: leaf0.eax, max_ext_leaf, vendor, vendor_string }
    }

    pub(crate) fn path(&self) -> VendorPath {
        VendorPath::of(self.vendor)
    }

    pub(crate) fn cpuid(&self) -> &'a dyn Cpuid {
        self.cpuid
    }

    /// Check if `leaf` (basic or extended) is implemented
    pub(crate) fn has_leaf(&self, leaf: u32) -> bool {
        if leaf >= EXTENDED_BASE {
            self.max_ext_leaf != 0 && leaf <= self.max_ext_leaf
        } else {
            leaf <= self.max_leaf
        }
    }

    /// Query sub-leaf 0 of `leaf`, if it is implemented
    pub(crate) fn leaf(&self, leaf: u32) -> Option<Registers> {
        self.subleaf(leaf, 0)
    }

    /// Query a sub-leaf of `leaf`, if the leaf is implemented
    pub(crate) fn subleaf(&self, leaf: u32, sub_leaf: u32) -> Option<Registers> {
        if self.has_leaf(leaf) {
            Some(self.cpuid.cpuid_count(leaf, sub_leaf))
        } else {
            log_debug!(LOG_CAT, "leaf {leaf:#x} is not available (max {:#x}, extended max {:#x})", self.max_leaf, self.max_ext_leaf);
            None
        }
    }

    /// Processor brand string, `"unknown"` when the brand leaves are absent
    pub(crate) fn brand_name(&self) -> String {
        if !self.has_leaf(EXTENDED_BASE + 4) {
            return "unknown".to_string();
        }

        let mut bytes = Vec::with_capacity(48);
        for leaf in EXTENDED_BASE + 2..=EXTENDED_BASE + 4 {
            for reg in self.cpuid.cpuid(leaf).to_array() {
                bytes.extend_from_slice(&reg.to_le_bytes());
            }
        }
        let len = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..len]).trim().to_string()
    }

    /// Family, model and stepping, including the extended family and model fields
    pub(crate) fn family_model_stepping(&self) -> (u32, u32, u32) {
        let Some(leaf1) = self.leaf(1) else {
            return (0, 0, 0);
        };
        let eax = leaf1.eax;
        let family = ((eax >> 8) & 0xF) + ((eax >> 20) & 0xFF);
        let model = ((eax >> 4) & 0xF) + ((eax >> 12) & 0xF0);
        let stepping = eax & 0xF;
        (family, model, stepping)
    }

    /// Cache line size in bytes, 0 if unknown
    pub(crate) fn cache_line(&self) -> u32 {
        let Some(leaf1) = self.leaf(1) else {
            return 0;
        };

        // CLFLUSH line size, in 8 byte units
        let line = ((leaf1.ebx >> 8) & 0xFF) * 8;
        if line != 0 {
            return line;
        }
        self.leaf(EXTENDED_BASE + 6).map_or(0, |regs| regs.ecx & 0xFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{RecordedCpuid, StubCpuid};

    fn brand_regs(brand: &str) -> [[u32; 4]; 3] {
        let mut bytes = [0u8; 48];
        bytes[..brand.len()].copy_from_slice(brand.as_bytes());
        let mut regs = [[0u32; 4]; 3];
        for (idx, chunk) in bytes.chunks_exact(4).enumerate() {
            regs[idx / 4][idx % 4] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        regs
    }

    #[test]
    fn stub_has_no_leaves() {
        let stub = StubCpuid;
        let probe = Probe::new(&stub);
        assert_eq!(probe.max_leaf, 0);
        assert_eq!(probe.max_ext_leaf, 0);
        assert!(!probe.has_leaf(1));
        assert!(!probe.has_leaf(EXTENDED_BASE + 1));
        assert_eq!(probe.brand_name(), "unknown");
        assert_eq!(probe.family_model_stepping(), (0, 0, 0));
        assert_eq!(probe.cache_line(), 0);
    }

    #[test]
    fn brand_is_trimmed() {
        let regs = brand_regs("  Intel(R) Core(TM) i7-4770 CPU @ 3.40GHz ");
        let cpuid = RecordedCpuid::new()
            .with_leaf(EXTENDED_BASE, [EXTENDED_BASE + 4, 0, 0, 0])
            .with_leaf(EXTENDED_BASE + 2, regs[0])
            .with_leaf(EXTENDED_BASE + 3, regs[1])
            .with_leaf(EXTENDED_BASE + 4, regs[2]);
        let probe = Probe::new(&cpuid);
        assert_eq!(probe.brand_name(), "Intel(R) Core(TM) i7-4770 CPU @ 3.40GHz");
    }

    #[test]
    fn family_model_includes_extended_fields() {
        // Family 6, extended model 3, model 0xC, stepping 3: Haswell
        let cpuid = RecordedCpuid::new()
            .with_leaf(0, [1, 0, 0, 0])
            .with_leaf(1, [0x0003_06C3, 0x0010_0800, 0, 0]);
        let probe = Probe::new(&cpuid);
        assert_eq!(probe.family_model_stepping(), (6, 0x3C, 3));
        assert_eq!(probe.cache_line(), 64);

        // AMD Zen: base family 0xF + extended family 8
        let cpuid = RecordedCpuid::new()
            .with_leaf(0, [1, 0, 0, 0])
            .with_leaf(1, [0x0080_0F11, 0, 0, 0]);
        assert_eq!(Probe::new(&cpuid).family_model_stepping(), (0x17, 1, 1));
    }

    #[test]
    fn cache_line_falls_back_to_extended_leaf() {
        let cpuid = RecordedCpuid::new()
            .with_leaf(0, [1, 0, 0, 0])
            .with_leaf(EXTENDED_BASE, [EXTENDED_BASE + 6, 0, 0, 0])
            .with_leaf(EXTENDED_BASE + 6, [0, 0, 0x0200_6140, 0]);
        assert_eq!(Probe::new(&cpuid).cache_line(), 0x40);
    }

    #[test]
    fn extended_max_below_base_is_ignored() {
        let cpuid = RecordedCpuid::new().with_leaf(EXTENDED_BASE, [0x0000_000D, 0, 0, 0]);
        assert_eq!(Probe::new(&cpuid).max_ext_leaf, 0);
    }
}
