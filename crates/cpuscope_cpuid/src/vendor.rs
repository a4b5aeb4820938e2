//! Vendor identification from leaf 0.

use cpuscope_macros::{EnumCount, EnumDisplay, EnumFromIndex, EnumFromName};

use crate::primitive::Registers;

/// CPU vendor, including hypervisors reporting their own vendor string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, EnumCount, EnumFromIndex, EnumDisplay, EnumFromName)]
pub enum Vendor {
    /// Unmapped vendor string (or no identification instruction at all)
    #[default]
    #[display("VendorUnknown")]
    #[parse_name("VendorUnknown")]
    Unknown,
    /// Intel: "GenuineIntel"
    Intel,
    /// AMD: "AuthenticAMD", early K5 samples: "AMDisbetter!"
    AMD,
    /// VIA and IDT/Centaur: "VIA VIA VIA ", "CentaurHauls"
    VIA,
    /// Transmeta: "TransmetaCPU", "GenuineTMx86"
    Transmeta,
    /// National Semiconductor: "Geode by NSC"
    NSC,
    /// KVM (Kernel-based Virtual Machine): "KVMKVMKVM\0\0\0"
    KVM,
    /// Microsoft Hyper-V or Windows Virtual PC: "Microsoft Hv"
    MSVM,
    /// VMware: "VMwareVMware"
    VMware,
    /// Xen HVM: "XenVMMXenVMM"
    XenHVM,
    /// bhyve: "bhyve bhyve "
    Bhyve,
    /// Hygon: "HygonGenuine"
    Hygon,
    /// SiS lineage, including Rise and DM&P Vortex86: "SiS SiS SiS ", "RiseRiseRise", "Vortex86 SoC"
    SiS,
    /// RDC Semiconductor Co. Ltd.: "Genuine  RDC"
    RDC,
}

macro_rules! vendor_table {
    ($($name:literal => $vendor:ident),* $(,)?) => {
        /// Known vendor identification strings, as reconstructed by [`vendor_string`].
        pub const VENDOR_TABLE: [(&str, Vendor); cpuscope_base::count_exprs!($($name),*)] = [$(($name, Vendor::$vendor)),*];
    };
}

vendor_table! {
    "AMDisbetter!" => AMD,
    "AuthenticAMD" => AMD,
    "CentaurHauls" => VIA,
    "GenuineIntel" => Intel,
    "TransmetaCPU" => Transmeta,
    "GenuineTMx86" => Transmeta,
    "Geode by NSC" => NSC,
    "VIA VIA VIA " => VIA,
    "KVMKVMKVMKVM" => KVM,
    "KVMKVMKVM"    => KVM,
    "Microsoft Hv" => MSVM,
    "VMwareVMware" => VMware,
    "XenVMMXenVMM" => XenHVM,
    "bhyve bhyve " => Bhyve,
    "HygonGenuine" => Hygon,
    "Vortex86 SoC" => SiS,
    "SiS SiS SiS " => SiS,
    "RiseRiseRise" => SiS,
    "Genuine  RDC" => RDC,
}

impl Vendor {
    /// Map a vendor identification string to a vendor.
    pub fn from_vendor_string(s: &str) -> Vendor {
        VENDOR_TABLE.iter()
            .find(|(name, _)| *name == s)
            .map_or(Vendor::Unknown, |(_, vendor)| *vendor)
    }
}

/// Reconstruct the vendor string from the leaf 0 registers (ebx, edx, ecx), cut off at the first NUL byte.
pub fn vendor_string(regs: Registers) -> String {
    let mut bytes = [0u8; 12];
    bytes[0..4].copy_from_slice(&regs.ebx.to_le_bytes());
    bytes[4..8].copy_from_slice(&regs.edx.to_le_bytes());
    bytes[8..12].copy_from_slice(&regs.ecx.to_le_bytes());

    let len = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

/// Resolve the vendor from the leaf 0 registers, returning the vendor and the raw string.
pub fn resolve(regs: Registers) -> (Vendor, String) {
    let raw = vendor_string(regs);
    (Vendor::from_vendor_string(&raw), raw)
}
