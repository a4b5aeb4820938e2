//! Raw processor identification queries.
//!
//! Everything the decoders know about the processor comes through the [`Cpuid`] trait. [`NativeCpuid`] issues the real
//! instructions on the compile target, [`StubCpuid`] answers every query with zeros and [`RecordedCpuid`] replays a
//! fixed register table.

use std::collections::HashMap;

use static_assertions::assert_eq_size;

/// Register tuple returned by a single identification query.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
#[repr(C)]
pub struct Registers {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}
assert_eq_size!(Registers, [u32; 4]);

impl Registers {
    pub const ZERO: Registers = Registers { eax: 0, ebx: 0, ecx: 0, edx: 0 };

    /// Create registers from `[eax, ebx, ecx, edx]`
    pub const fn from_array(regs: [u32; 4]) -> Self {
        Self { eax: regs[0], ebx: regs[1], ecx: regs[2], edx: regs[3] }
    }

    pub const fn to_array(self) -> [u32; 4] {
        [self.eax, self.ebx, self.ecx, self.edx]
    }
}

impl From<[u32; 4]> for Registers {
    fn from(regs: [u32; 4]) -> Self {
        Self::from_array(regs)
    }
}

/// Raw ARM identification registers, read with `mrs`.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct ArmIdRegisters {
    /// ID_AA64PFR0_EL1
    pub pfr0: u64,
    /// ID_AA64ISAR0_EL1
    pub isar0: u64,
    /// ID_AA64ISAR1_EL1
    pub isar1: u64,
}

/// Source of raw identification data.
///
/// Implementations must never fail: anything that can't be queried is reported as zeros (or `None` for the optional
/// OS-provided data).
pub trait Cpuid {
    /// Query `leaf` with sub-leaf `sub_leaf`.
    fn cpuid_count(&self, leaf: u32, sub_leaf: u32) -> Registers;

    /// Query `leaf` with sub-leaf 0.
    fn cpuid(&self, leaf: u32) -> Registers {
        self.cpuid_count(leaf, 0)
    }

    /// Read extended control register `index`, returned as `(eax, edx)`.
    fn xgetbv(&self, index: u32) -> (u32, u32);

    /// Read the time-stamp counter and auxiliary value: eax/edx hold the low/high counter bits, ecx the auxiliary value.
    fn rdtscp(&self) -> Registers;

    /// OS capability vector (`AT_HWCAP`), if the OS exposes one.
    fn hwcap(&self) -> Option<u64> {
        None
    }

    /// ARM identification registers, if they can be read on this target.
    fn arm_id_registers(&self) -> Option<ArmIdRegisters> {
        None
    }
}

/// Answers every query with zeros, used on targets without an identification instruction.
#[derive(Clone, Copy, Default, Debug)]
pub struct StubCpuid;

impl Cpuid for StubCpuid {
    fn cpuid_count(&self, _leaf: u32, _sub_leaf: u32) -> Registers {
        Registers::ZERO
    }

    fn xgetbv(&self, _index: u32) -> (u32, u32) {
        (0, 0)
    }

    fn rdtscp(&self) -> Registers {
        Registers::ZERO
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
        #[cfg(target_arch = "x86")]
        use core::arch::x86 as arch;
        #[cfg(target_arch = "x86_64")]
        use core::arch::x86_64 as arch;

        /// Issues the identification instructions of the current processor.
        #[derive(Clone, Copy, Default, Debug)]
        pub struct NativeCpuid;

        impl NativeCpuid {
            const OSXSAVE_BIT: u32 = 1 << 27;
            const RDTSCP_BIT: u32 = 1 << 27;
        }

        impl Cpuid for NativeCpuid {
            fn cpuid_count(&self, leaf: u32, sub_leaf: u32) -> Registers {
                // SAFETY: every processor able to run this target supports `cpuid`
                let res = unsafe { arch::__cpuid_count(leaf, sub_leaf) };
                Registers { eax: res.eax, ebx: res.ebx, ecx: res.ecx, edx: res.edx }
            }

            fn xgetbv(&self, index: u32) -> (u32, u32) {
                // `xgetbv` raises #UD unless the OS enabled XSAVE
                if self.cpuid(1).ecx & Self::OSXSAVE_BIT == 0 {
                    return (0, 0);
                }

                let (eax, edx): (u32, u32);
                // SAFETY: OSXSAVE is set, so `xgetbv` is available
                unsafe {
                    core::arch::asm!(
                        "xgetbv",
                        in("ecx") index,
                        out("eax") eax,
                        out("edx") edx,
                        options(nomem, nostack, preserves_flags),
                    );
                }
                (eax, edx)
            }

            fn rdtscp(&self) -> Registers {
                if self.cpuid(0x8000_0000).eax < 0x8000_0001 || self.cpuid(0x8000_0001).edx & Self::RDTSCP_BIT == 0 {
                    return Registers::ZERO;
                }

                let mut aux = 0u32;
                // SAFETY: the processor reports `rdtscp` support
                let tsc = unsafe { arch::__rdtscp(&mut aux) };
                Registers { eax: tsc as u32, ebx: 0, ecx: aux, edx: (tsc >> 32) as u32 }
            }
        }
    } else if #[cfg(target_arch = "aarch64")] {
        /// Reads the OS capability vector and identification registers of the current processor.
        #[derive(Clone, Copy, Default, Debug)]
        pub struct NativeCpuid;

        impl NativeCpuid {
            #[cfg(any(target_os = "linux", target_os = "android"))]
            const AT_HWCAP: u64 = 16;

            #[cfg(any(target_os = "linux", target_os = "android"))]
            fn read_auxv_hwcap() -> Option<u64> {
                let auxv = std::fs::read("/proc/self/auxv").ok()?;
                auxv.chunks_exact(16).find_map(|entry| {
                    let (key, value) = entry.split_at(8);
                    let key = u64::from_ne_bytes(key.try_into().ok()?);
                    let value = u64::from_ne_bytes(value.try_into().ok()?);
                    (key == Self::AT_HWCAP).then_some(value)
                })
            }

            #[cfg(not(any(target_os = "linux", target_os = "android")))]
            fn read_auxv_hwcap() -> Option<u64> {
                None
            }
        }

        impl Cpuid for NativeCpuid {
            fn cpuid_count(&self, _leaf: u32, _sub_leaf: u32) -> Registers {
                Registers::ZERO
            }

            fn xgetbv(&self, _index: u32) -> (u32, u32) {
                (0, 0)
            }

            fn rdtscp(&self) -> Registers {
                Registers::ZERO
            }

            fn hwcap(&self) -> Option<u64> {
                Self::read_auxv_hwcap()
            }

            fn arm_id_registers(&self) -> Option<ArmIdRegisters> {
                let (pfr0, isar0, isar1): (u64, u64, u64);
                // SAFETY: only called when the caller opted out of safe detection, the OS may trap these reads
                unsafe {
                    core::arch::asm!("mrs {}, ID_AA64PFR0_EL1", out(reg) pfr0, options(nomem, nostack, preserves_flags));
                    core::arch::asm!("mrs {}, ID_AA64ISAR0_EL1", out(reg) isar0, options(nomem, nostack, preserves_flags));
                    core::arch::asm!("mrs {}, ID_AA64ISAR1_EL1", out(reg) isar1, options(nomem, nostack, preserves_flags));
                }
                Some(ArmIdRegisters { pfr0, isar0, isar1 })
            }
        }
    } else {
        /// No identification instruction on this target, every query returns zeros.
        pub type NativeCpuid = StubCpuid;
    }
}

/// Replays a fixed table of register values.
///
/// Queries for leaves that weren't recorded return zeros, like a processor that doesn't implement them.
#[derive(Clone, Default, Debug)]
pub struct RecordedCpuid {
    leaves: HashMap<(u32, u32), Registers>,
    xcr0: u64,
    rdtscp: Registers,
    hwcap: Option<u64>,
    arm_id: Option<ArmIdRegisters>,
}

impl RecordedCpuid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `[eax, ebx, ecx, edx]` for sub-leaf 0 of `leaf`.
    pub fn with_leaf(self, leaf: u32, regs: [u32; 4]) -> Self {
        self.with_subleaf(leaf, 0, regs)
    }

    /// Record `[eax, ebx, ecx, edx]` for `leaf`/`sub_leaf`.
    pub fn with_subleaf(mut self, leaf: u32, sub_leaf: u32, regs: [u32; 4]) -> Self {
        self.leaves.insert((leaf, sub_leaf), Registers::from_array(regs));
        self
    }

    /// Set the value returned for extended control register 0.
    pub fn with_xcr0(mut self, xcr0: u64) -> Self {
        self.xcr0 = xcr0;
        self
    }

    pub fn with_rdtscp(mut self, regs: [u32; 4]) -> Self {
        self.rdtscp = Registers::from_array(regs);
        self
    }

    pub fn with_hwcap(mut self, hwcap: u64) -> Self {
        self.hwcap = Some(hwcap);
        self
    }

    pub fn with_arm_id_registers(mut self, regs: ArmIdRegisters) -> Self {
        self.arm_id = Some(regs);
        self
    }

    /// Overwrite a single register bit of an already recorded (or zero) leaf.
    pub fn set_bit(&mut self, leaf: u32, sub_leaf: u32, reg: Reg, bit: u32, set: bool) {
        let regs = self.leaves.entry((leaf, sub_leaf)).or_default();
        let val = match reg {
            Reg::Eax => &mut regs.eax,
            Reg::Ebx => &mut regs.ebx,
            Reg::Ecx => &mut regs.ecx,
            Reg::Edx => &mut regs.edx,
        };
        if set {
            *val |= 1 << bit;
        } else {
            *val &= !(1 << bit);
        }
    }
}

/// Register selector for [`RecordedCpuid::set_bit`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Reg {
    Eax,
    Ebx,
    Ecx,
    Edx,
}

impl Cpuid for RecordedCpuid {
    fn cpuid_count(&self, leaf: u32, sub_leaf: u32) -> Registers {
        self.leaves.get(&(leaf, sub_leaf)).copied().unwrap_or_default()
    }

    fn xgetbv(&self, index: u32) -> (u32, u32) {
        match index {
            0 => (self.xcr0 as u32, (self.xcr0 >> 32) as u32),
            _ => (0, 0),
        }
    }

    fn rdtscp(&self) -> Registers {
        self.rdtscp
    }

    fn hwcap(&self) -> Option<u64> {
        self.hwcap
    }

    fn arm_id_registers(&self) -> Option<ArmIdRegisters> {
        self.arm_id
    }
}
