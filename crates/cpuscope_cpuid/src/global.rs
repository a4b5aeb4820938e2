//! Process-wide processor snapshot.
//!
//! The snapshot is detected on first use. Readers get a shared handle to an immutable [`CpuInfo`], every modification
//! publishes a new snapshot, so a handle obtained earlier never changes under its owner.

use std::sync::Arc;

use cpuscope_logging::{log_info, LogCategory};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::{
    config::DetectOptions,
    feature::FeatureId,
    info::CpuInfo,
    primitive::NativeCpuid,
};

const LOG_CAT : LogCategory = LogCategory::new_with_sub("Cpu", "global");

static CPU: Lazy<RwLock<Arc<CpuInfo>>> = Lazy::new(|| {
    RwLock::new(Arc::new(CpuInfo::detect_with_options(&NativeCpuid, &DetectOptions::from_env())))
});

/// Get the current process-wide snapshot, detecting it on first use.
pub fn cpu() -> Arc<CpuInfo> {
    CPU.read().clone()
}

/// Re-detect the processor with options from the environment and publish the result.
pub fn detect() -> Arc<CpuInfo> {
    detect_with_options(&DetectOptions::from_env())
}

/// Re-detect the processor and publish the result.
pub fn detect_with_options(options: &DetectOptions) -> Arc<CpuInfo> {
    publish(CpuInfo::detect_with_options(&NativeCpuid, options))
}

/// Replace the process-wide snapshot.
pub fn publish(info: CpuInfo) -> Arc<CpuInfo> {
    let info = Arc::new(info);
    *CPU.write() = info.clone();
    info
}

/// Remove a feature from the process-wide snapshot.
pub fn disable(id: FeatureId) {
    log_info!(LOG_CAT, "disabling {id}");
    modify(|info| info.disable(id));
}

/// Add a feature to the process-wide snapshot.
pub fn enable(id: FeatureId) {
    log_info!(LOG_CAT, "enabling {id}");
    modify(|info| info.enable(id));
}

fn modify(f: impl FnOnce(&mut CpuInfo)) {
    let mut guard = CPU.write();
    let mut info = CpuInfo::clone(&guard);
    f(&mut info);
    *guard = Arc::new(info);
}

/// Run `f` with `ids` removed from the process-wide snapshot.
///
/// The previous snapshot is restored afterwards, even when `f` panics. Snapshots published by `f` are discarded.
pub fn with_features_disabled<R>(ids: &[FeatureId], f: impl FnOnce() -> R) -> R {
    let previous = {
        let mut guard = CPU.write();
        let previous = guard.clone();
        let mut info = CpuInfo::clone(&previous);
        for id in ids {
            info.disable(*id);
        }
        *guard = Arc::new(info);
        previous
    };

    let _restore = scopeguard::guard(previous, |previous| *CPU.write() = previous);
    f()
}
