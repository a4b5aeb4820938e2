//! Feature decoder for leaves 1, 7 and 0x8000_0001/0x8000_0008.

use cpuscope_macros::flags;

use crate::feature::{FeatureId::{self, *}, FeatureSet};
use crate::primitive::Registers;
use crate::vendor::Vendor;

use super::{bit, topology, Probe, EXTENDED_BASE};

/// Register state enabled by the OS in XCR0.
#[flags(u64)]
pub enum XStateFlags {
    /// x87 FPU state
    X87,
    /// SSE state (XMM registers)
    SSE,
    /// AVX state (upper halves of the YMM registers)
    AVX,
    /// MPX bound registers
    BNDREGS,
    /// MPX bound configuration and status
    BNDCSR,
    /// AVX-512 opmask registers
    OPMASK,
    /// Upper halves of ZMM0-ZMM15
    ZMMHI256,
    /// ZMM16-ZMM31
    HI16ZMM,
    /// State needed for 256-bit vectors
    AvxState = SSE | AVX,
    /// Additional state needed for 512-bit vectors
    Avx512State = OPMASK | ZMMHI256 | HI16ZMM,
}

/// XSAVE, OSXSAVE and AVX bits of leaf 1 ecx
const AVX_CHECK: u32 = 1 << 26 | 1 << 27 | 1 << 28;

/// Decode all x86 features, every step only adds features.
pub(crate) fn decode(probe: &Probe<'_>) -> FeatureSet {
    let mut features = FeatureSet::new();
    let Some(leaf1) = probe.leaf(1) else {
        return features;
    };

    let xstate = os_xstate(probe, leaf1);
    decode_basic(probe, leaf1, xstate, &mut features);
    decode_structured(probe, leaf1, xstate, &mut features);
    decode_extended(probe, &mut features);
    features
}

/// Register state enabled by the OS, only queried when the processor reports XSAVE support and the OS enabled it
fn os_xstate(probe: &Probe<'_>, leaf1: Registers) -> XStateFlags {
    if leaf1.ecx & AVX_CHECK != AVX_CHECK {
        return XStateFlags::none();
    }
    let (eax, edx) = probe.cpuid().xgetbv(0);
    XStateFlags::from_bits_truncate(u64::from(eax) | (u64::from(edx) << 32))
}

fn decode_basic(probe: &Probe<'_>, leaf1: Registers, xstate: XStateFlags, features: &mut FeatureSet) {
    let Registers { ecx, edx, .. } = leaf1;

    features.set_if(bit(edx, 15), CMOV);
    features.set_if(bit(edx, 23), MMX);
    features.set_if(bit(edx, 25), MMXEXT);
    features.set_if(bit(edx, 25), SSE);
    features.set_if(bit(edx, 26), SSE2);

    features.set_if(bit(ecx, 0), SSE3);
    features.set_if(bit(ecx, 1), CLMUL);
    features.set_if(bit(ecx, 5), VMX);
    features.set_if(bit(ecx, 9), SSSE3);
    features.set_if(bit(ecx, 13), CX16);
    features.set_if(bit(ecx, 19), SSE4);
    features.set_if(bit(ecx, 20), SSE42);
    features.set_if(bit(ecx, 23), POPCNT);
    features.set_if(bit(ecx, 25), AESNI);
    features.set_if(bit(ecx, 29), F16C);
    features.set_if(bit(ecx, 30), RDRAND);
    features.set_if(bit(ecx, 31), HYPERVISOR);

    // The HTT bit alone is also set on single-threaded cores
    if bit(edx, 28) && probe.max_leaf >= 4 && topology::has_smt_leaves(probe.vendor) {
        features.set_if(topology::threads_per_core(probe) > 1, HTT);
    }

    if xstate.contains(XStateFlags::AvxState) {
        features.set(AVX);
        features.set_if(bit(ecx, 12), FMA3);
    }
}

fn decode_structured(probe: &Probe<'_>, leaf1: Registers, xstate: XStateFlags, features: &mut FeatureSet) {
    let Some(leaf7) = probe.leaf(7) else {
        return;
    };
    let Registers { ebx, ecx, edx, .. } = leaf7;

    features.set_if(features.has(AVX) && bit(ebx, 5), AVX2);
    if bit(ebx, 3) {
        features.set(BMI1);
        features.set_if(bit(ebx, 8), BMI2);
    }
    features.set_if(bit(ebx, 2), SGX);
    features.set_if(bit(ebx, 4), HLE);
    features.set_if(bit(ebx, 9), ERMS);
    features.set_if(bit(ebx, 11), RTM);
    features.set_if(bit(ebx, 14), MPX);
    features.set_if(bit(ebx, 18), RDSEED);
    features.set_if(bit(ebx, 19), ADX);
    features.set_if(bit(ebx, 29), SHA);

    features.set_if(bit(ecx, 5), WAITPKG);
    features.set_if(bit(ecx, 25), CLDEMOTE);
    features.set_if(bit(ecx, 27), MOVDIRI);
    features.set_if(bit(ecx, 28), MOVDIR64B);
    features.set_if(bit(ecx, 29), ENQCMD);
    features.set_if(bit(ecx, 30), SGXLC);

    features.set_if(bit(edx, 14), SERIALIZE);
    features.set_if(bit(edx, 16), TSXLDTRK);
    features.set_if(bit(edx, 26), IBPB);
    features.set_if(bit(edx, 27), STIBP);

    // 512-bit tier, needs the OS to save the opmask and full ZMM state as well
    let avx512_enabled = leaf1.ecx & AVX_CHECK == AVX_CHECK
        && xstate.contains(XStateFlags::AvxState)
        && xstate.contains(XStateFlags::Avx512State);
    if !avx512_enabled {
        return;
    }

    const EBX_TIER: [(u32, FeatureId); 8] = [
        (16, AVX512F),
        (17, AVX512DQ),
        (21, AVX512IFMA),
        (26, AVX512PF),
        (27, AVX512ER),
        (28, AVX512CD),
        (30, AVX512BW),
        (31, AVX512VL),
    ];
    const ECX_TIER: [(u32, FeatureId); 8] = [
        (1, AVX512VBMI),
        (6, AVX512VBMI2),
        (8, GFNI),
        (9, VAES),
        (10, VPCLMULQDQ),
        (11, AVX512VNNI),
        (12, AVX512BITALG),
        (14, AVX512VPOPCNTDQ),
    ];
    const EDX_TIER: [(u32, FeatureId); 4] = [
        (8, AVX512VP2INTERSECT),
        (22, AMXBF16),
        (24, AMXTILE),
        (25, AMXINT8),
    ];

    for (idx, id) in EBX_TIER {
        features.set_if(bit(ebx, idx), id);
    }
    for (idx, id) in ECX_TIER {
        features.set_if(bit(ecx, idx), id);
    }
    for (idx, id) in EDX_TIER {
        features.set_if(bit(edx, idx), id);
    }

    if let Some(leaf7_1) = probe.subleaf(7, 1) {
        features.set_if(bit(leaf7_1.eax, 5), AVX512BF16);
    }
}

fn decode_extended(probe: &Probe<'_>, features: &mut FeatureSet) {
    let Some(ext1) = probe.leaf(EXTENDED_BASE + 1) else {
        return;
    };
    let Registers { ecx, edx, .. } = ext1;

    if bit(ecx, 5) {
        features.set(LZCNT);
        features.set(POPCNT);
    }
    features.set_if(bit(ecx, 6), SSE4A);
    features.set_if(bit(ecx, 21), TBM);

    features.set_if(bit(edx, 20), NX);
    features.set_if(bit(edx, 22), MMXEXT);
    features.set_if(bit(edx, 23), MMX);
    features.set_if(bit(edx, 27), RDTSCP);
    features.set_if(bit(edx, 30), AMD3DNOWEXT);
    features.set_if(bit(edx, 31), AMD3DNOW);

    // XOP and FMA4 use the AVX encoding, so they need the OS-enabled AVX state
    if features.has(AVX) {
        features.set_if(bit(ecx, 11), XOP);
        features.set_if(bit(ecx, 16), FMA4);
    }

    decode_advisories(probe, ecx, features);

    if let Some(ext8) = probe.leaf(EXTENDED_BASE + 8) {
        features.set_if(bit(ext8.ebx, 9), WBNOINVD);
    }
}

/// Pseudo-features flagging instruction sets that are present but slow on specific processors
fn decode_advisories(probe: &Probe<'_>, ext1_ecx: u32, features: &mut FeatureSet) {
    if probe.vendor != Vendor::Intel {
        // Athlon 64, some Opterons and Semprons: SSE2 without SSE4a is often slower than MMX or 3DNow!
        features.set_if(features.has(SSE2) && !bit(ext1_ecx, 6), SSE2SLOW);
        return;
    }

    let (family, model, _) = probe.family_model_stepping();
    if family != 6 {
        return;
    }
    match model {
        // Pentium M "Banias" and "Dothan", Core "Yonah"
        9 | 13 | 14 => {
            features.set_if(features.has(SSE2), SSE2SLOW);
            features.set_if(features.has(SSE3), SSE3SLOW);
        },
        // Atom: SSSE3 is often slower than the SSE2 equivalent
        28 => features.set(ATOM),
        _ => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::RecordedCpuid;

    const INTEL: [u32; 4] = [0x16, 0x756e_6547, 0x6c65_746e, 0x4965_6e69];
    const AMD: [u32; 4] = [0x10, 0x6874_7541, 0x444d_4163, 0x6974_6e65];

    fn decode_recorded(cpuid: &RecordedCpuid) -> FeatureSet {
        decode(&Probe::new(cpuid))
    }

    #[test]
    fn xstate_flags() {
        let xcr0 = XStateFlags::from_bits_truncate(0xE7);
        assert!(xcr0.contains(XStateFlags::AvxState));
        assert!(xcr0.contains(XStateFlags::Avx512State));
        assert!(!xcr0.contains(XStateFlags::BNDREGS));
        assert_eq!(XStateFlags::AvxState.bits(), 0b110);
        assert_eq!(XStateFlags::Avx512State.bits(), 0b1110_0000);
        assert_eq!(XStateFlags::from_bits_truncate(0x1_0000_0000).bits(), 0);
        assert_eq!(format!("{:?}", XStateFlags::SSE | XStateFlags::AVX), "SSE | AVX");
    }

    #[test]
    fn basic_leaf() {
        let cpuid = RecordedCpuid::new()
            .with_leaf(0, INTEL)
            .with_leaf(1, [0, 0, (1 << 0) | (1 << 9) | (1 << 19) | (1 << 20) | (1 << 31), (1 << 15) | (1 << 25) | (1 << 26)]);
        let features = decode_recorded(&cpuid);
        let names: Vec<_> = features.names().collect();
        assert_eq!(names, vec!["CMOV", "HYPERVISOR", "MMXEXT", "SSE", "SSE2", "SSE3", "SSE4", "SSE42", "SSSE3"]);
    }

    #[test]
    fn avx_needs_os_state() {
        let base = RecordedCpuid::new()
            .with_leaf(0, INTEL)
            .with_leaf(1, [0, 0, AVX_CHECK | (1 << 12), 0]);

        let without_os = decode_recorded(&base.clone().with_xcr0(0b001));
        assert!(!without_os.has(AVX) && !without_os.has(FMA3));

        let with_os = decode_recorded(&base.with_xcr0(0b111));
        assert!(with_os.has(AVX) && with_os.has(FMA3));
    }

    #[test]
    fn avx512_needs_opmask_and_zmm_state() {
        let base = RecordedCpuid::new()
            .with_leaf(0, INTEL)
            .with_leaf(1, [0, 0, AVX_CHECK, 0])
            .with_leaf(7, [1, u32::MAX, u32::MAX, u32::MAX])
            .with_subleaf(7, 1, [1 << 5, 0, 0, 0]);

        let avx_only = decode_recorded(&base.clone().with_xcr0(0b111));
        assert!(avx_only.has(AVX) && avx_only.has(AVX2));
        assert!(!avx_only.has(AVX512F) && !avx_only.has(AVX512BF16) && !avx_only.has(AMXTILE) && !avx_only.has(VAES));

        let full = decode_recorded(&base.with_xcr0(0xE7));
        for id in [AVX512F, AVX512DQ, AVX512VL, AVX512VNNI, AVX512VP2INTERSECT, AVX512BF16, AMXTILE, GFNI, VAES] {
            assert!(full.has(id), "{id} should be detected");
        }
    }

    #[test]
    fn structured_leaf_without_avx() {
        let cpuid = RecordedCpuid::new()
            .with_leaf(0, INTEL)
            .with_leaf(1, [0, 0, 0, 0])
            .with_leaf(7, [0, (1 << 5) | (1 << 8) | (1 << 2) | (1 << 19), 1 << 30, 1 << 14]);
        let features = decode_recorded(&cpuid);
        // AVX2 needs AVX, BMI2 needs BMI1
        assert!(!features.has(AVX2) && !features.has(BMI2));
        assert!(features.has(SGX) && features.has(SGXLC) && features.has(ADX) && features.has(SERIALIZE));
    }

    #[test]
    fn missing_leaf_7_is_skipped() {
        let cpuid = RecordedCpuid::new()
            .with_leaf(0, [1, INTEL[1], INTEL[2], INTEL[3]])
            .with_leaf(7, [0, u32::MAX, u32::MAX, u32::MAX]);
        assert!(decode_recorded(&cpuid).is_empty());
    }

    #[test]
    fn extended_leaf_on_amd() {
        let cpuid = RecordedCpuid::new()
            .with_leaf(0, AMD)
            .with_leaf(1, [0x0060_0F20, 0, AVX_CHECK, 1 << 26])
            .with_xcr0(0b111)
            .with_leaf(EXTENDED_BASE, [EXTENDED_BASE + 8, 0, 0, 0])
            .with_leaf(EXTENDED_BASE + 1, [0, 0, (1 << 5) | (1 << 11) | (1 << 16) | (1 << 21), (1 << 20) | (1 << 27) | (1 << 31)])
            .with_leaf(EXTENDED_BASE + 8, [0, 1 << 9, 0, 0]);
        let features = decode_recorded(&cpuid);
        for id in [LZCNT, POPCNT, XOP, FMA4, TBM, NX, RDTSCP, AMD3DNOW, WBNOINVD] {
            assert!(features.has(id), "{id} should be detected");
        }
        // SSE2 without SSE4a
        assert!(features.has(SSE2SLOW));
        assert!(!features.has(SSE4A));
    }

    #[test]
    fn intel_advisories() {
        let pentium_m = RecordedCpuid::new()
            .with_leaf(0, INTEL)
            .with_leaf(1, [0x0000_06D8, 0, 1, 1 << 26])
            .with_leaf(EXTENDED_BASE, [EXTENDED_BASE + 1, 0, 0, 0])
            .with_leaf(EXTENDED_BASE + 1, [0, 0, 0, 0]);
        let features = decode_recorded(&pentium_m);
        assert!(features.has(SSE2SLOW) && features.has(SSE3SLOW));
        assert!(!features.has(ATOM));

        let atom = RecordedCpuid::new()
            .with_leaf(0, INTEL)
            .with_leaf(1, [0x0001_06C2, 0, 0, 1 << 26])
            .with_leaf(EXTENDED_BASE, [EXTENDED_BASE + 1, 0, 0, 0])
            .with_leaf(EXTENDED_BASE + 1, [0, 0, 0, 0]);
        let features = decode_recorded(&atom);
        assert!(features.has(ATOM));
        assert!(!features.has(SSE2SLOW));
    }

    #[test]
    fn decoding_is_deterministic() {
        let cpuid = RecordedCpuid::new()
            .with_leaf(0, INTEL)
            .with_leaf(1, [0x0003_06C3, 0x0010_0800, 0x7FFA_FBFF, 0xBFEB_FBFF])
            .with_xcr0(0b111)
            .with_leaf(7, [0, 0x0000_27AB, 0, 0x9C00_0000]);
        assert_eq!(decode_recorded(&cpuid), decode_recorded(&cpuid));
    }
}
