#![allow(dead_code)]

use cpuscope_cpuid::RecordedCpuid;

pub const EXT: u32 = 0x8000_0000;

/// Leaf 0 registers reporting `max` and `vendor`
pub fn vendor_leaf(max: u32, vendor: &str) -> [u32; 4] {
    let mut bytes = [0u8; 12];
    bytes[..vendor.len()].copy_from_slice(vendor.as_bytes());
    let word = |idx: usize| u32::from_le_bytes([bytes[idx], bytes[idx + 1], bytes[idx + 2], bytes[idx + 3]]);
    [max, word(0), word(8), word(4)]
}

pub fn with_brand(mut cpuid: RecordedCpuid, brand: &str) -> RecordedCpuid {
    let mut bytes = [0u8; 48];
    bytes[..brand.len()].copy_from_slice(brand.as_bytes());
    for (idx, chunk) in bytes.chunks_exact(16).enumerate() {
        let mut regs = [0u32; 4];
        for (reg, word) in regs.iter_mut().zip(chunk.chunks_exact(4)) {
            *reg = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        }
        cpuid = cpuid.with_leaf(EXT + 2 + idx as u32, regs);
    }
    cpuid
}

/// Deterministic cache parameter sub-leaf for a cache with a single partition and 64 byte lines
pub fn cache_leaf(level: u32, cache_type: u32, ways: u32, sets: u32) -> [u32; 4] {
    [cache_type | (level << 5), ((ways - 1) << 22) | 63, sets - 1, 0]
}

pub const fn bits(idxs: &[u32]) -> u32 {
    let mut val = 0;
    let mut i = 0;
    while i < idxs.len() {
        val |= 1 << idxs[i];
        i += 1;
    }
    val
}

/// 6-core/12-thread Intel desktop part
pub fn intel() -> RecordedCpuid {
    let cpuid = RecordedCpuid::new()
        .with_leaf(0, vendor_leaf(0x16, "GenuineIntel"))
        .with_leaf(1, [0x0009_06EA, 0x0310_0800, 0x7FFA_FBFF, 0xBFEB_FBFF])
        .with_subleaf(4, 0, cache_leaf(1, 1, 8, 64))
        .with_subleaf(4, 1, cache_leaf(1, 2, 8, 64))
        .with_subleaf(4, 2, cache_leaf(2, 3, 4, 1024))
        .with_subleaf(4, 3, cache_leaf(3, 3, 16, 12288))
        .with_leaf(7, [0, bits(&[0, 2, 3, 4, 5, 7, 8, 9, 10, 11, 14, 18, 19, 23, 29]), bits(&[2, 30]), bits(&[26, 27])])
        .with_subleaf(0xB, 0, [1, 2, 1 << 8, 0])
        .with_subleaf(0xB, 1, [4, 12, (2 << 8) | 1, 0])
        .with_subleaf(0x12, 0, [0b01, 0, 0, (36 << 8) | 31])
        .with_subleaf(0x12, 2, [0x7000_0001, 0, 0x0580_0001, 0])
        .with_leaf(0x15, [2, 300, 24_000_000, 0])
        .with_leaf(EXT, [EXT + 8, 0, 0, 0])
        .with_leaf(EXT + 1, [0, 0, 0x121, 0x2C10_0800])
        .with_leaf(EXT + 6, [0, 0, 0x0100_6040, 0])
        .with_xcr0(0x1F)
        .with_rdtscp([0x1000, 0, 3, 0x2]);
    with_brand(cpuid, "Intel(R) Core(TM) i7-8700K CPU @ 3.70GHz")
}

/// 8-core/16-thread AMD desktop part
pub fn amd() -> RecordedCpuid {
    let cpuid = RecordedCpuid::new()
        .with_leaf(0, vendor_leaf(0x10, "AuthenticAMD"))
        .with_leaf(1, [0x0087_0F10, 0x0010_0800, 0x7ED8_320B, 0x178B_FBFF])
        .with_leaf(7, [0, 0x219C_91A9, 0, 0])
        .with_subleaf(0xB, 0, [1, 2, 1 << 8, 0])
        .with_leaf(EXT, [EXT + 0x1F, 0, 0, 0])
        .with_leaf(EXT + 1, [0, 0, 0x75C2_37FF, 0x2FD3_FBFF])
        .with_leaf(EXT + 5, [0, 0, 32 << 24, 32 << 24])
        .with_leaf(EXT + 6, [0, 0, (512 << 16) | 64, 0])
        .with_leaf(EXT + 8, [0, 1 << 9, 15, 0])
        .with_subleaf(EXT + 0x1D, 0, cache_leaf(1, 1, 8, 64))
        .with_subleaf(EXT + 0x1D, 1, cache_leaf(1, 2, 8, 64))
        .with_subleaf(EXT + 0x1D, 2, cache_leaf(2, 3, 8, 1024))
        .with_subleaf(EXT + 0x1D, 3, cache_leaf(3, 3, 16, 16384))
        .with_xcr0(0x7);
    with_brand(cpuid, "AMD Ryzen 7 3700X 8-Core Processor")
}

/// Hygon part, shares AMD's cache leaves but reports no SMT information
pub fn hygon() -> RecordedCpuid {
    let cpuid = RecordedCpuid::new()
        .with_leaf(0, vendor_leaf(0xD, "HygonGenuine"))
        .with_leaf(1, [0x0090_0F11, 0x0008_0800, 0x7ED8_320B, 0x178B_FBFF])
        .with_leaf(EXT, [EXT + 8, 0, 0, 0])
        .with_leaf(EXT + 1, [0, 0, 0x0000_0061, 0x2FD3_FBFF])
        .with_leaf(EXT + 5, [0, 0, 32 << 24, 64 << 24])
        .with_leaf(EXT + 6, [0, 0, 512 << 16, 0])
        .with_xcr0(0x7);
    with_brand(cpuid, "Hygon C86 3185  8-core Processor")
}

/// Unmapped vendor string with Intel-style leaves
pub fn unknown() -> RecordedCpuid {
    RecordedCpuid::new()
        .with_leaf(0, vendor_leaf(0x16, "NotARealCPU!"))
        .with_leaf(1, [0x0009_06EA, 0x0310_0800, 0x0000_0001, 0x0780_8000])
        .with_subleaf(4, 0, cache_leaf(1, 1, 8, 64))
        .with_subleaf(0xB, 0, [1, 2, 1 << 8, 0])
        .with_leaf(EXT + 5, [0, 0, 32 << 24, 32 << 24])
}

pub fn profiles() -> Vec<(&'static str, RecordedCpuid)> {
    vec![
        ("intel", intel()),
        ("amd", amd()),
        ("hygon", hygon()),
        ("unknown", unknown()),
        ("empty", RecordedCpuid::new()),
    ]
}
