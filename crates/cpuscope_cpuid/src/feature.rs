//! Detectable capabilities and the set they are collected in.

use core::fmt;

use cpuscope_base::{EnumCountT, EnumFromIndexT, EnumFromNameT, EnumNameT};
use cpuscope_macros::{EnumCount, EnumDisplay, EnumFromIndex, EnumFromName};
use static_assertions::const_assert;

use crate::bitset::{words_for_bits, BitSet, IterOnes};

/// Capability that can be detected.
///
/// The variant names are the stable feature tokens, the discriminants are dense and define the enumeration order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, EnumCount, EnumFromIndex, EnumDisplay, EnumFromName)]
#[repr(u16)]
pub enum FeatureId {
    // x86
    /// Multi-Precision Add-Carry Instruction Extensions
    ADX,
    /// Advanced Encryption Standard New Instructions
    AESNI,
    /// AMD 3DNow!
    AMD3DNOW,
    /// AMD 3DNow! extensions
    AMD3DNOWEXT,
    /// Tile computational operations on BFLOAT16 numbers
    AMXBF16,
    /// Tile computational operations on 8-bit integers
    AMXINT8,
    /// Tile architecture
    AMXTILE,
    /// Atom processor, some SSSE3 instructions are slower than their SSE2 counterparts
    ATOM,
    /// Advanced Vector Extensions
    AVX,
    /// Advanced Vector Extensions 2
    AVX2,
    /// AVX-512 BFLOAT16 instructions
    AVX512BF16,
    /// AVX-512 bit algorithms
    AVX512BITALG,
    /// AVX-512 byte and word instructions
    AVX512BW,
    /// AVX-512 conflict detection instructions
    AVX512CD,
    /// AVX-512 doubleword and quadword instructions
    AVX512DQ,
    /// AVX-512 exponential and reciprocal instructions
    AVX512ER,
    /// AVX-512 foundation
    AVX512F,
    /// AVX-512 integer fused multiply-add instructions
    AVX512IFMA,
    /// AVX-512 prefetch instructions
    AVX512PF,
    /// AVX-512 vector bit manipulation instructions
    AVX512VBMI,
    /// AVX-512 vector bit manipulation instructions 2
    AVX512VBMI2,
    /// AVX-512 vector length extensions
    AVX512VL,
    /// AVX-512 vector neural network instructions
    AVX512VNNI,
    /// AVX-512 intersect for doubleword and quadword
    AVX512VP2INTERSECT,
    /// AVX-512 vector population count doubleword and quadword
    AVX512VPOPCNTDQ,
    /// Bit manipulation instruction set 1
    BMI1,
    /// Bit manipulation instruction set 2
    BMI2,
    /// Cache line demote
    CLDEMOTE,
    /// Carry-less multiplication
    CLMUL,
    /// Conditional move
    CMOV,
    /// CMPXCHG16B
    CX16,
    /// Enqueue command
    ENQCMD,
    /// Enhanced REP MOVSB/STOSB
    ERMS,
    /// Half-precision floating-point conversion
    F16C,
    /// Three-operand fused multiply-add
    FMA3,
    /// Four-operand fused multiply-add
    FMA4,
    /// Galois field new instructions
    GFNI,
    /// Hardware lock elision
    HLE,
    /// Hyper-threading, with more than one thread per core
    HTT,
    /// Running under a hypervisor
    HYPERVISOR,
    /// Indirect branch prediction barrier
    IBPB,
    /// Leading zero count
    LZCNT,
    /// MMX
    MMX,
    /// AMD MMX extensions
    MMXEXT,
    /// 64-byte direct store
    MOVDIR64B,
    /// Direct store
    MOVDIRI,
    /// Memory protection extensions
    MPX,
    /// No-execute bit
    NX,
    /// Population count
    POPCNT,
    /// Hardware random number generator
    RDRAND,
    /// Hardware random seed generator
    RDSEED,
    /// RDTSCP instruction
    RDTSCP,
    /// Restricted transactional memory
    RTM,
    /// Instruction execution serialization
    SERIALIZE,
    /// Software guard extensions
    SGX,
    /// Software guard extensions launch control
    SGXLC,
    /// SHA extensions
    SHA,
    /// Streaming SIMD extensions
    SSE,
    /// Streaming SIMD extensions 2
    SSE2,
    /// SSE2 is supported, but usually not faster than MMX
    SSE2SLOW,
    /// Streaming SIMD extensions 3
    SSE3,
    /// SSE3 is supported, but usually not faster than MMX
    SSE3SLOW,
    /// Streaming SIMD extensions 4.1
    SSE4,
    /// Streaming SIMD extensions 4.2
    SSE42,
    /// AMD streaming SIMD extensions 4a
    SSE4A,
    /// Supplemental streaming SIMD extensions 3
    SSSE3,
    /// Single thread indirect branch predictors
    STIBP,
    /// AMD trailing bit manipulation
    TBM,
    /// TSX suspend load address tracking
    TSXLDTRK,
    /// Vector AES
    VAES,
    /// Virtual machine extensions
    VMX,
    /// Carry-less multiplication quadword
    VPCLMULQDQ,
    /// TPAUSE, UMONITOR and UMWAIT
    WAITPKG,
    /// Write back and do not invalidate cache
    WBNOINVD,
    /// AMD extended operations
    XOP,

    // ARM
    /// AES instructions
    AESARM,
    /// Some CPU ID registers readable at user level
    ARMCPUID,
    /// Advanced SIMD
    ASIMD,
    /// SIMD dot product
    ASIMDDP,
    /// Advanced SIMD half-precision floating point
    ASIMDHP,
    /// Rounding double multiply accumulate/subtract
    ASIMDRDM,
    /// Large system extensions atomics
    ATOMICS,
    /// CRC32/CRC32C instructions
    CRC32,
    /// Data cache clean to point of persistence
    DCPOP,
    /// Generic timer event stream
    EVTSTRM,
    /// Floating point complex number addition and multiplication
    FCMA,
    /// Single-precision and double-precision floating point
    FP,
    /// Half-precision floating point
    FPHP,
    /// Generic pointer authentication
    GPA,
    /// Javascript-style double to int conversion
    JSCVT,
    /// Weaker release consistency
    LRCPC,
    /// Polynomial multiply long
    PMULL,
    /// SHA-1 instructions
    SHA1,
    /// SHA-2 instructions
    SHA2,
    /// SHA-3 instructions
    SHA3,
    /// SHA-512 instructions
    SHA512,
    /// SM3 instructions
    SM3,
    /// SM4 instructions
    SM4,
    /// Scalable vector extension
    SVE,
}

impl FeatureId {
    /// First ARM feature, every feature from here on is ARM-only
    const FIRST_ARM: FeatureId = FeatureId::AESARM;

    /// Dense index of the feature
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Stable feature token, e.g. `"AVX2"`
    pub fn name(self) -> &'static str {
        EnumNameT::name(&self)
    }

    /// Parse a feature token, ignoring ASCII case
    pub fn from_name(name: &str) -> Option<FeatureId> {
        FeatureId::parse_ignore_case(name.trim())
    }

    /// Check if the feature belongs to the ARM family
    pub const fn is_arm(self) -> bool {
        self as usize >= Self::FIRST_ARM as usize
    }

    /// Iterate over all features, in enumeration order
    pub fn all() -> impl Iterator<Item = FeatureId> + Clone {
        (0..FeatureId::COUNT).filter_map(FeatureId::from_idx)
    }
}

const FEATURE_WORDS: usize = words_for_bits(FeatureId::COUNT);
const_assert!(FeatureId::COUNT <= BitSet::<FEATURE_WORDS>::BIT_COUNT);

/// Set of detected features, one bit per [`FeatureId`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FeatureSet {
    bits: BitSet<FEATURE_WORDS>,
}

impl FeatureSet {
    pub const fn new() -> Self {
        Self { bits: BitSet::new() }
    }

    /// Check if `id` is in the set
    pub fn has(&self, id: FeatureId) -> bool {
        self.bits.get(id.index())
    }

    /// Check if all of `ids` are in the set, an empty group is always supported
    pub fn has_all(&self, ids: &[FeatureId]) -> bool {
        ids.iter().all(|id| self.has(*id))
    }

    /// Check if any of `ids` is in the set
    pub fn has_any(&self, ids: &[FeatureId]) -> bool {
        ids.iter().any(|id| self.has(*id))
    }

    pub fn set(&mut self, id: FeatureId) {
        self.bits.enable(id.index());
    }

    /// Set `id` when `cond` holds, never clears it
    pub fn set_if(&mut self, cond: bool, id: FeatureId) {
        if cond {
            self.set(id);
        }
    }

    pub fn unset(&mut self, id: FeatureId) {
        self.bits.disable(id.index());
    }

    /// Add every feature of `other`
    pub fn union_with(&mut self, other: &FeatureSet) {
        self.bits.union_with(&other.bits);
    }

    /// Check if every feature of `other` is in the set
    pub fn is_superset(&self, other: &FeatureSet) -> bool {
        self.bits.contains_all(&other.bits)
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.none()
    }

    /// Iterate over the features in the set, in ascending [`FeatureId`] order
    pub fn iter(&self) -> FeatureIter<'_> {
        FeatureIter { inner: self.bits.iter_ones() }
    }

    /// Iterate over the tokens of the features in the set, in ascending [`FeatureId`] order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.iter().map(FeatureId::name)
    }
}

impl FromIterator<FeatureId> for FeatureSet {
    fn from_iter<T: IntoIterator<Item = FeatureId>>(iter: T) -> Self {
        let mut set = FeatureSet::new();
        for id in iter {
            set.set(id);
        }
        set
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = FeatureId;
    type IntoIter = FeatureIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the features of a [`FeatureSet`]
pub struct FeatureIter<'a> {
    inner: IterOnes<'a, FEATURE_WORDS>,
}

impl Iterator for FeatureIter<'_> {
    type Item = FeatureId;

    fn next(&mut self) -> Option<FeatureId> {
        self.inner.by_ref().find_map(FeatureId::from_idx)
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, name) in self.names().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
