//! Software guard extension details from leaf 0x12.

use core::fmt::{self, Write};

use crate::fmt::Indenter;

use super::{bit, Probe};

/// Upper bound on the EPC section sub-leaves
const MAX_EPC_SECTIONS: u32 = 8;
/// First EPC section sub-leaf
const FIRST_EPC_SUBLEAF: u32 = 2;

/// Enclave page cache section
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct EpcSection {
    pub base_address: u64,
    pub size: u64,
}

/// SGX capabilities, everything is zero/empty unless the SGX feature was detected.
#[derive(Clone, PartialEq, Eq, Hash, Default, Debug)]
pub struct SgxSupport {
    pub available: bool,
    pub launch_control: bool,
    pub sgx1_supported: bool,
    pub sgx2_supported: bool,
    /// Maximum enclave size in bytes outside of 64-bit mode
    pub max_enclave_size_not64: u64,
    /// Maximum enclave size in bytes in 64-bit mode
    pub max_enclave_size_64: u64,
    pub epc_sections: Vec<EpcSection>,
}

fn check(val: bool) -> &'static str {
    if val { "[X]" } else { "[ ]" }
}

impl fmt::Display for SgxSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SGX:")?;

        let mut indenter = Indenter::new(f);
        writeln!(indenter, "{} Available", check(self.available))?;
        writeln!(indenter, "{} Launch control", check(self.launch_control))?;
        writeln!(indenter, "{} SGX1", check(self.sgx1_supported))?;
        writeln!(indenter, "{} SGX2", check(self.sgx2_supported))?;
        writeln!(indenter, "Max enclave size (non 64-bit): {}", self.max_enclave_size_not64)?;
        write!(indenter, "Max enclave size (64-bit):     {}", self.max_enclave_size_64)?;
        if !self.epc_sections.is_empty() {
            write!(indenter, "\nEPC sections:")?;
            indenter.set_spaces(8);
            for section in &self.epc_sections {
                write!(indenter, "\n0x{:012X} (0x{:X} bytes)", section.base_address, section.size)?;
            }
        }
        Ok(())
    }
}

/// Decode leaf 0x12, only when `available` (the SGX feature bit) is set.
pub(crate) fn detect(probe: &Probe<'_>, available: bool, launch_control: bool) -> SgxSupport {
    let mut sgx = SgxSupport::default();
    if !available {
        return sgx;
    }
    sgx.available = true;
    sgx.launch_control = launch_control;

    let Some(caps) = probe.subleaf(0x12, 0) else {
        return sgx;
    };
    sgx.sgx1_supported = bit(caps.eax, 0);
    sgx.sgx2_supported = bit(caps.eax, 1);
    // Both sizes are reported as powers of two
    sgx.max_enclave_size_not64 = pow2(caps.edx & 0xFF);
    sgx.max_enclave_size_64 = pow2((caps.edx >> 8) & 0xFF);

    for sub_leaf in FIRST_EPC_SUBLEAF..FIRST_EPC_SUBLEAF + MAX_EPC_SECTIONS {
        let Some(regs) = probe.subleaf(0x12, sub_leaf) else {
            break;
        };
        match regs.eax & 0xF {
            0 => break,
            1 => {
                let base_address = u64::from(regs.eax & 0xFFFF_F000) | (u64::from(regs.ebx & 0x000F_FFFF) << 32);
                let size = u64::from(regs.ecx & 0xFFFF_F000) | (u64::from(regs.edx & 0x000F_FFFF) << 32);
                sgx.epc_sections.push(EpcSection { base_address, size });
            },
            // Reserved section types
            _ => {},
        }
    }
    sgx
}

/// `2^exp`, 0 when it doesn't fit in 64 bits
fn pow2(exp: u32) -> u64 {
    1u64.checked_shl(exp).unwrap_or(0)
}
