//! Processor identification and feature detection.
//!
//! The crate decodes the identification leaves of x86 processors and the OS capability vector (or identification
//! registers) of ARM processors into a [`CpuInfo`] snapshot. A process-wide snapshot is available through [`cpu`].
//!
//! ```
//! use cpuscope_cpuid::{cpu, FeatureId};
//!
//! let info = cpu();
//! if info.supports(&[FeatureId::AVX2, FeatureId::FMA3]) {
//!     // take the 256-bit path
//! }
//! ```

mod arm;
mod bitset;
pub mod config;
mod feature;
mod fmt;
mod global;
mod info;
pub mod primitive;
pub mod vendor;
mod x86;

pub use cpuscope_base::{EnumCountT, EnumFromIndexT, EnumFromNameT, EnumNameT};

pub use arm::HwCap;
pub use bitset::*;
pub use config::DetectOptions;
pub use feature::*;
pub use global::*;
pub use info::CpuInfo;
pub use primitive::{Cpuid, NativeCpuid, RecordedCpuid, Registers, StubCpuid};
pub use vendor::Vendor;
pub use x86::{
    cache::CacheGeometry,
    features::XStateFlags,
    frequency::{parse_brand_frequency, FREQUENCY_UNKNOWN},
    sgx::{EpcSection, SgxSupport},
    topology::Topology,
};
