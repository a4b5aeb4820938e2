//! Core and thread counts.

use crate::vendor::Vendor;

use super::{bit, Probe, VendorPath, EXTENDED_BASE};

/// Level type of an SMT level in leaf 0xB
const LEVEL_TYPE_SMT: u32 = 1;
/// Upper bound on the leaf 0xB levels that are walked
const MAX_TOPOLOGY_LEVELS: u32 = 8;

/// Core and thread counts of the package
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Topology {
    /// Number of physical cores, 0 if undetectable
    pub physical_cores: u32,
    /// Number of logical cores, 0 if undetectable
    pub logical_cores: u32,
    /// Number of threads per physical core, at least 1
    pub threads_per_core: u32,
}

/// Only Intel and AMD report SMT information in a known way
pub(crate) fn has_smt_leaves(vendor: Vendor) -> bool {
    matches!(vendor, Vendor::Intel | Vendor::AMD)
}

pub(crate) fn detect(probe: &Probe<'_>) -> Topology {
    let threads_per_core = threads_per_core(probe);
    let logical_cores = logical_cores(probe);
    let physical_cores = physical_cores(probe, logical_cores, threads_per_core);
    Topology { physical_cores, logical_cores, threads_per_core }
}

/// Number of threads per physical core, never less than 1
pub(crate) fn threads_per_core(probe: &Probe<'_>) -> u32 {
    if probe.max_leaf < 4 || !has_smt_leaves(probe.vendor) {
        return 1;
    }

    if probe.max_leaf < 0xB {
        return match probe.vendor {
            Vendor::Intel => legacy_intel_threads_per_core(probe),
            _ => 1,
        };
    }

    smt_threads_from_topology_leaf(probe).max(1)
}

/// Walk the levels of leaf 0xB for the SMT level, falling back to the first level when no level reports its type
fn smt_threads_from_topology_leaf(probe: &Probe<'_>) -> u32 {
    for level in 0..MAX_TOPOLOGY_LEVELS {
        let Some(regs) = probe.subleaf(0xB, level) else {
            break;
        };
        let level_type = (regs.ecx >> 8) & 0xFF;
        if level_type == 0 {
            break;
        }
        let count = regs.ebx & 0xFFFF;
        if level_type == LEVEL_TYPE_SMT && count != 0 {
            return count;
        }
    }
    probe.subleaf(0xB, 0).map_or(1, |regs| regs.ebx & 0xFFFF)
}

/// Addressable logical ids per package (leaf 1) divided by the addressable core ids (leaf 4)
fn legacy_intel_threads_per_core(probe: &Probe<'_>) -> u32 {
    let Some(leaf1) = probe.leaf(1) else {
        return 1;
    };
    if !bit(leaf1.edx, 28) {
        return 1;
    }

    let logical = (leaf1.ebx >> 16) & 0xFF;
    if logical <= 1 {
        return 1;
    }
    let cores = probe.subleaf(4, 0).map_or(1, |regs| (regs.eax >> 26) + 1);
    logical.checked_div(cores).unwrap_or(1).max(1)
}

fn logical_cores(probe: &Probe<'_>) -> u32 {
    match probe.path() {
        VendorPath::Intel => {
            if probe.max_leaf < 0xB {
                probe.leaf(1).map_or(0, |regs| (regs.ebx >> 16) & 0xFF)
            } else {
                probe.subleaf(0xB, 1).map_or(0, |regs| regs.ebx & 0xFFFF)
            }
        },
        VendorPath::Amd => probe.leaf(1).map_or(0, |regs| (regs.ebx >> 16) & 0xFF),
        VendorPath::Other => 0,
    }
}

fn physical_cores(probe: &Probe<'_>, logical_cores: u32, threads_per_core: u32) -> u32 {
    match probe.path() {
        VendorPath::Intel => logical_cores.checked_div(threads_per_core).unwrap_or(0),
        VendorPath::Amd => {
            if logical_cores > 0 && threads_per_core > 0 {
                return logical_cores / threads_per_core;
            }
            // Number of cores - 1
            probe.leaf(EXTENDED_BASE + 8).map_or(0, |regs| (regs.ecx & 0xFF) + 1)
        },
        VendorPath::Other => 0,
    }
}
