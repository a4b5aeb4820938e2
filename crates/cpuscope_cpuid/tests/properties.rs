mod common;

use common::*;
use cpuscope_cpuid::{
    parse_brand_frequency, vendor, CacheGeometry, CpuInfo, DetectOptions, FeatureId, FeatureSet, RecordedCpuid,
    Registers, SgxSupport, Vendor, FREQUENCY_UNKNOWN,
};

fn vector_features() -> Vec<FeatureId> {
    FeatureId::all()
        .filter(|id| id.name().starts_with("AVX") || id.name().starts_with("AMX"))
        .chain([FeatureId::FMA3, FeatureId::FMA4, FeatureId::XOP, FeatureId::VAES, FeatureId::VPCLMULQDQ, FeatureId::GFNI])
        .collect()
}

#[test]
fn vendor_strings_resolve() {
    for (name, expected) in vendor::VENDOR_TABLE {
        let (resolved, raw) = vendor::resolve(Registers::from(vendor_leaf(0, name)));
        assert_eq!(resolved, expected, "{name:?}");
        assert_eq!(raw, name);
    }

    let (resolved, raw) = vendor::resolve(Registers::from(vendor_leaf(0, "NotARealCPU!")));
    assert_eq!(resolved, Vendor::Unknown);
    assert_eq!(raw, "NotARealCPU!");
}

#[test]
fn detection_is_deterministic() {
    for (name, cpuid) in profiles() {
        let first = CpuInfo::detect_with(&cpuid);
        let second = CpuInfo::detect_with(&cpuid);
        assert_eq!(first, second, "{name}");
        assert_eq!(first.features(), second.features(), "{name}");
    }
}

#[test]
fn vector_features_need_os_state() {
    let hardware = intel()
        .with_leaf(1, [0x0009_06EA, 0x0310_0800, u32::MAX, u32::MAX])
        .with_leaf(7, [1, u32::MAX, u32::MAX, u32::MAX])
        .with_subleaf(7, 1, [u32::MAX; 4])
        .with_leaf(EXT + 1, [0, 0, u32::MAX, u32::MAX]);

    let info = CpuInfo::detect_with(&hardware.clone().with_xcr0(0));
    for id in vector_features() {
        assert!(!info.has(id), "{id} reported without OS support");
    }
    // Non-vector features of the same leaves are still decoded
    assert!(info.supports(&[FeatureId::SSE42, FeatureId::BMI2, FeatureId::LZCNT]));

    // 256-bit state only
    let info = CpuInfo::detect_with(&hardware.clone().with_xcr0(0b111));
    assert!(info.supports(&[FeatureId::AVX, FeatureId::AVX2, FeatureId::FMA3, FeatureId::XOP, FeatureId::FMA4]));
    assert!(!info.has_any(&[FeatureId::AVX512F, FeatureId::AVX512VL, FeatureId::AMXTILE, FeatureId::VAES]));

    let info = CpuInfo::detect_with(&hardware.with_xcr0(0xE7));
    for id in vector_features() {
        assert!(info.has(id), "{id} missing with full OS support");
    }
}

#[test]
fn threads_per_core_is_at_least_one() {
    let vendors = ["GenuineIntel", "AuthenticAMD", "HygonGenuine", "NotARealCPU!", ""];
    let topology_levels = [[0; 4], [0, 0, 1 << 8, 0], [0, 0xFFFF, 1 << 8, 0], [0, 8, 2 << 8, 0], [0, u32::MAX, u32::MAX, 0]];

    for max in [0, 1, 4, 0xA, 0xB, 0x16] {
        for vendor in vendors {
            for leaf1_ebx in [0, 0x0001_0000, 0x00FF_0000, u32::MAX] {
                for leaf4_eax in [0, 0xFC00_0000, u32::MAX] {
                    for level in topology_levels {
                        let cpuid = RecordedCpuid::new()
                            .with_leaf(0, vendor_leaf(max, vendor))
                            .with_leaf(1, [0, leaf1_ebx, 0, 1 << 28])
                            .with_subleaf(4, 0, [leaf4_eax, 0, 0, 0])
                            .with_subleaf(0xB, 0, level);
                        let info = CpuInfo::detect_with(&cpuid);
                        assert!(info.threads_per_core >= 1, "{vendor:?} max {max:#x}, ebx {leaf1_ebx:#x}, leaf 4 {leaf4_eax:#x}, {level:?}");
                    }
                }
            }
        }
    }
}

#[test]
fn extreme_register_values_stay_in_range() {
    let extremes = [0, 1, 0x7FFF_FFFF, u32::MAX];

    for vendor in ["GenuineIntel", "AuthenticAMD", "HygonGenuine"] {
        for ebx in extremes {
            for ecx in extremes {
                let cpuid = RecordedCpuid::new()
                    .with_leaf(0, vendor_leaf(0x15, vendor))
                    .with_subleaf(4, 0, [0x21, ebx, ecx, 0])
                    .with_subleaf(4, 1, [0x43, ebx, ecx, 0])
                    .with_leaf(EXT, [EXT + 0x1D, 0, 0, 0])
                    .with_leaf(EXT + 5, [0, 0, u32::MAX, u32::MAX])
                    .with_leaf(EXT + 6, [0, 0, u32::MAX, 0])
                    .with_subleaf(EXT + 0x1D, 0, [0x22, ebx, ecx, 0])
                    .with_subleaf(EXT + 0x1D, 1, [0x63, ebx, ecx, 0])
                    .with_leaf(0x15, [1, ebx, ecx, 0]);

                let info = CpuInfo::detect_with(&cpuid);
                let context = format!("{vendor:?} ebx {ebx:#x}, ecx {ecx:#x}");
                for size in [info.cache.l1i, info.cache.l1d, info.cache.l2, info.cache.l3] {
                    assert!(size == CacheGeometry::UNDETECTED || size >= 0, "{context}: {size}");
                }

                // No brand string to fall back on
                let expected = u64::from(ebx).checked_mul(u64::from(ecx))
                    .filter(|hz| *hz <= i64::MAX as u64)
                    .unwrap_or(0);
                assert_eq!(info.hz, expected, "{context}");
            }
        }
    }
}

#[test]
fn unmatched_vendor_has_no_cache_information() {
    for vendor in ["NotARealCPU!", "VIA VIA VIA ", "GenuineTMx86", "KVMKVMKVMKVM", "Geode by NSC"] {
        let cpuid = RecordedCpuid::new()
            .with_leaf(0, vendor_leaf(0x16, vendor))
            .with_leaf(1, [0, 0x0010_0800, 0, 0])
            .with_subleaf(4, 0, cache_leaf(1, 1, 8, 64))
            .with_subleaf(4, 1, cache_leaf(2, 3, 4, 1024))
            .with_leaf(EXT, [EXT + 0x1D, 0, 0, 0])
            .with_leaf(EXT + 5, [0, 0, 32 << 24, 32 << 24])
            .with_leaf(EXT + 6, [0, 0, 512 << 16, 0])
            .with_subleaf(EXT + 0x1D, 0, cache_leaf(3, 3, 16, 16384));

        let cache = CpuInfo::detect_with(&cpuid).cache;
        assert_eq!(cache, CacheGeometry::undetected(), "{vendor:?}");
        assert_eq!([cache.l1i, cache.l1d, cache.l2, cache.l3], [-1; 4]);
    }
}

#[test]
fn brand_frequencies() {
    let table = [
        ("Intel(R) Core(TM) i5-2520M CPU @ 2.50GHz", 2_500_000_000),
        ("VIA Esther processor 1300MHz", 1_300_000_000),
        ("Intel(R) Pentium(R) 4 CPU @ 3GHz", 3_000_000_000),
        ("GarbageNoHz", FREQUENCY_UNKNOWN),
    ];
    for (brand, hz) in table {
        assert_eq!(parse_brand_frequency(brand), hz, "{brand:?}");
    }

    // Without leaf 0x15 the snapshot falls back to the brand string
    let info = CpuInfo::detect_with(&with_brand(amd(), "AMD Athlon(tm) 64 Processor @ 2.50GHz"));
    assert_eq!(info.hz, 2_500_000_000);
}

#[test]
fn disable_is_idempotent_and_enable_restores() {
    for (name, cpuid) in profiles() {
        let original = CpuInfo::detect_with(&cpuid);
        for id in FeatureId::all() {
            let mut once = original.clone();
            once.disable(id);
            let mut twice = once.clone();
            twice.disable(id);
            assert_eq!(once, twice, "{name}: {id}");

            // No neighbouring bit is touched
            let expected: FeatureSet = original.features().iter().filter(|other| *other != id).collect();
            assert_eq!(*once.features(), expected, "{name}: {id}");

            if original.has(id) {
                once.enable(id);
                assert_eq!(once, original, "{name}: {id}");
            }
        }
    }
}

#[test]
fn sgx_details_need_the_feature_bit() {
    // Enclave leaf filled in, but the feature bit cleared
    let cpuid = intel().with_leaf(7, [0, 0, 1 << 30, 0]);
    let info = CpuInfo::detect_with(&cpuid);
    assert!(!info.has(FeatureId::SGX));
    assert_eq!(info.sgx, SgxSupport::default());

    // Disabled before the enclave leaf is read
    let options = DetectOptions::default().with_disabled(FeatureId::SGX);
    let info = CpuInfo::detect_with_options(&intel(), &options);
    assert_eq!(info.sgx, SgxSupport::default());

    let info = CpuInfo::detect_with(&intel());
    assert!(info.sgx.available);
}
