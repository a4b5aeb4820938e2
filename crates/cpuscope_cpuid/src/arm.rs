//! ARM features from the OS capability vector or the identification registers.

use cpuscope_logging::{log_verbose, LogCategory};
use cpuscope_macros::flags;

use crate::{
    feature::{FeatureId::{self, *}, FeatureSet},
    primitive::{ArmIdRegisters, Cpuid},
};

const LOG_CAT : LogCategory = LogCategory::new_with_sub("Cpu", "arm");

/// Cache line size assumed on ARM
pub(crate) const ARM_CACHE_LINE: u32 = 64;

/// Linux `AT_HWCAP` bits for aarch64.
#[flags(u64)]
pub enum HwCap {
    FP,
    ASIMD,
    EVTSTRM,
    AES,
    PMULL,
    SHA1,
    SHA2,
    CRC32,
    ATOMICS,
    FPHP,
    ASIMDHP,
    CPUID,
    ASIMDRDM,
    JSCVT,
    FCMA,
    LRCPC,
    DCPOP,
    SHA3,
    SM3,
    SM4,
    ASIMDDP,
    SHA512,
    SVE,
    ASIMDFHM,
}

const HWCAP_FEATURES: [(HwCap, FeatureId); 22] = [
    (HwCap::FP, FP),
    (HwCap::ASIMD, ASIMD),
    (HwCap::EVTSTRM, EVTSTRM),
    (HwCap::AES, AESARM),
    (HwCap::PMULL, PMULL),
    (HwCap::SHA1, SHA1),
    (HwCap::SHA2, SHA2),
    (HwCap::CRC32, CRC32),
    (HwCap::FPHP, FPHP),
    (HwCap::ASIMDHP, ASIMDHP),
    (HwCap::CPUID, ARMCPUID),
    (HwCap::ASIMDRDM, ASIMDRDM),
    (HwCap::JSCVT, JSCVT),
    (HwCap::FCMA, FCMA),
    (HwCap::LRCPC, LRCPC),
    (HwCap::DCPOP, DCPOP),
    (HwCap::SHA3, SHA3),
    (HwCap::SM3, SM3),
    (HwCap::SM4, SM4),
    (HwCap::ASIMDDP, ASIMDDP),
    (HwCap::SHA512, SHA512),
    (HwCap::SVE, SVE),
];

/// Result of the ARM detection pass
pub(crate) struct ArmInfo {
    pub features: FeatureSet,
    pub cache_line: u32,
}

/// Detect ARM features.
///
/// The OS capability vector is used when it is non-zero. Otherwise the identification registers are only read when
/// `safe` is false, as reading them traps on kernels that don't emulate them.
pub(crate) fn detect(cpuid: &dyn Cpuid, safe: bool) -> ArmInfo {
    let hwcap = cpuid.hwcap();
    let cache_line = if hwcap.is_some() || cfg!(target_arch = "aarch64") { ARM_CACHE_LINE } else { 0 };

    let hwcap = HwCap::from_bits_truncate(hwcap.unwrap_or(0));
    if hwcap.is_any() {
        return ArmInfo { features: decode_hwcap(hwcap, cfg!(target_os = "android")), cache_line };
    }

    if safe {
        return ArmInfo { features: FeatureSet::new(), cache_line };
    }
    match cpuid.arm_id_registers() {
        Some(regs) => {
            log_verbose!(LOG_CAT, "no capability vector, decoding identification registers");
            ArmInfo { features: decode_id_registers(regs), cache_line }
        },
        None => ArmInfo { features: FeatureSet::new(), cache_line },
    }
}

fn decode_hwcap(hwcap: HwCap, is_android: bool) -> FeatureSet {
    let mut features = FeatureSet::new();
    for (cap, id) in HWCAP_FEATURES {
        features.set_if(hwcap.contains(cap), id);
    }
    // Android reports LSE atomics even where they don't work
    features.set_if(hwcap.contains(HwCap::ATOMICS) && !is_android, ATOMICS);
    features
}

/// 4-bit field of an identification register
const fn field(reg: u64, shift: u32) -> u64 {
    (reg >> shift) & 0xF
}

fn decode_id_registers(regs: ArmIdRegisters) -> FeatureSet {
    let mut features = FeatureSet::new();
    let ArmIdRegisters { pfr0, isar0, isar1 } = regs;

    // ID_AA64PFR0_EL1
    features.set_if(field(pfr0, 32) != 0, SVE);
    // 0xF means not implemented
    let asimd = field(pfr0, 20);
    if asimd != 0xF {
        features.set(ASIMD);
        if asimd == 1 {
            features.set(FPHP);
            features.set(ASIMDHP);
        }
    }
    features.set_if(field(pfr0, 16) != 0xF, FP);

    // ID_AA64ISAR0_EL1
    features.set_if(field(isar0, 44) != 0, ASIMDDP);
    features.set_if(field(isar0, 40) != 0, SM4);
    features.set_if(field(isar0, 36) != 0, SM3);
    features.set_if(field(isar0, 32) != 0, SHA3);
    features.set_if(field(isar0, 28) != 0, ASIMDRDM);
    features.set_if(field(isar0, 20) != 0, ATOMICS);
    features.set_if(field(isar0, 16) != 0, CRC32);
    features.set_if(field(isar0, 12) != 0, SHA2);
    features.set_if(field(isar0, 12) == 2, SHA512);
    features.set_if(field(isar0, 8) != 0, SHA1);
    features.set_if(field(isar0, 4) != 0, AESARM);
    features.set_if(field(isar0, 4) == 2, PMULL);

    // ID_AA64ISAR1_EL1
    features.set_if(field(isar1, 24) != 0, GPA);
    features.set_if(field(isar1, 20) != 0, LRCPC);
    features.set_if(field(isar1, 16) != 0, FCMA);
    features.set_if(field(isar1, 12) != 0, JSCVT);
    features.set_if(field(isar1, 0) != 0, DCPOP);

    features
}
