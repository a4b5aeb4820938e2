use core::fmt::{self, Write};

use cpuscope_logging::{log_verbose, LogCategory};

use crate::{
    arm,
    config::DetectOptions,
    feature::{FeatureId, FeatureSet},
    fmt::Indenter,
    primitive::{Cpuid, NativeCpuid},
    vendor::Vendor,
    x86::{self, cache::CacheGeometry, sgx::SgxSupport, topology::Topology, Probe},
};

const LOG_CAT : LogCategory = LogCategory::new("Cpu");

/// Snapshot of everything known about the processor.
///
/// A snapshot never changes after detection, except through [`CpuInfo::disable`] and [`CpuInfo::enable`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CpuInfo {
    /// Brand string, "unknown" when the processor doesn't report one
    pub brand_name:       String,
    /// Vendor resolved from the vendor string
    pub vendor:           Vendor,
    /// Raw 12-byte vendor string
    pub vendor_string:    String,
    /// Number of physical cores, 0 if undetectable
    pub physical_cores:   u32,
    /// Number of threads per physical core, at least 1
    pub threads_per_core: u32,
    /// Number of logical cores, 0 if undetectable
    pub logical_cores:    u32,
    pub family:           u32,
    pub model:            u32,
    pub stepping:         u32,
    /// Cache line size in bytes, 0 if undetectable
    pub cache_line:       u32,
    pub cache:            CacheGeometry,
    /// Nominal clock speed in Hz, 0 if unknown
    pub hz:               u64,
    pub sgx:              SgxSupport,
    features:             FeatureSet,
    max_leaf:             u32,
    max_ext_leaf:         u32,
}

impl CpuInfo {
    /// Detect the current processor with the default options.
    pub fn detect() -> Self {
        Self::detect_with_options(&NativeCpuid, &DetectOptions::default())
    }

    /// Detect from an arbitrary identification source with the default options.
    pub fn detect_with(cpuid: &dyn Cpuid) -> Self {
        Self::detect_with_options(cpuid, &DetectOptions::default())
    }

    /// Detect from an arbitrary identification source.
    ///
    /// Features in `options.disabled` are removed before any dependent information (like SGX details) is read.
    pub fn detect_with_options(cpuid: &dyn Cpuid, options: &DetectOptions) -> Self {
        let probe = Probe::new(cpuid);

        let brand_name = probe.brand_name();
        let (family, model, stepping) = probe.family_model_stepping();

        let mut features = x86::features::decode(&probe);
        let arm = arm::detect(cpuid, options.safe);
        features.union_with(&arm.features);
        for id in &options.disabled {
            features.unset(*id);
        }

        let cache_line = match probe.cache_line() {
            0 => arm.cache_line,
            line => line,
        };

        let sgx = x86::sgx::detect(&probe, features.has(FeatureId::SGX), features.has(FeatureId::SGXLC));
        let Topology { physical_cores, logical_cores, threads_per_core } = x86::topology::detect(&probe);
        let cache = x86::cache::detect(&probe);
        let hz = u64::try_from(x86::frequency::detect(&probe, &brand_name)).unwrap_or(0);

        let info = Self {
            brand_name,
            vendor: probe.vendor,
            vendor_string: probe.vendor_string.clone(),
            physical_cores,
            threads_per_core,
            logical_cores,
            family,
            model,
            stepping,
            cache_line,
            cache,
            hz,
            sgx,
            features,
            max_leaf: probe.max_leaf,
            max_ext_leaf: probe.max_ext_leaf,
        };

        log_verbose!(LOG_CAT, "Detected '{}' ({}), {} features, {} logical cores", info.brand_name, info.vendor, info.features.len(), info.logical_cores);
        info
    }

    /// Check if a feature was detected
    pub fn has(&self, id: FeatureId) -> bool {
        self.features.has(id)
    }

    /// Check if all features were detected, an empty list is always supported
    pub fn supports(&self, ids: &[FeatureId]) -> bool {
        self.features.has_all(ids)
    }

    /// Check if any of the features was detected
    pub fn has_any(&self, ids: &[FeatureId]) -> bool {
        self.features.has_any(ids)
    }

    /// Pretend a feature isn't available.
    pub fn disable(&mut self, id: FeatureId) {
        self.features.unset(id);
    }

    /// Force a feature to be reported as available.
    pub fn enable(&mut self, id: FeatureId) {
        self.features.set(id);
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Names of all detected features, ordered by feature id
    pub fn feature_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.features.names()
    }

    /// Running under a hypervisor
    pub fn vm(&self) -> bool {
        self.has(FeatureId::HYPERVISOR)
    }

    /// Both transactional memory extensions are available
    pub fn tsx(&self) -> bool {
        self.supports(&[FeatureId::HLE, FeatureId::RTM])
    }

    pub fn is_intel(&self) -> bool {
        self.vendor == Vendor::Intel
    }

    pub fn is_amd(&self) -> bool {
        self.vendor == Vendor::AMD
    }

    pub fn is_hygon(&self) -> bool {
        self.vendor == Vendor::Hygon
    }

    pub fn is_transmeta(&self) -> bool {
        self.vendor == Vendor::Transmeta
    }

    pub fn is_nsc(&self) -> bool {
        self.vendor == Vendor::NSC
    }

    pub fn is_via(&self) -> bool {
        self.vendor == Vendor::VIA
    }

    /// Highest standard leaf
    pub fn max_leaf(&self) -> u32 {
        self.max_leaf
    }

    /// Highest extended leaf, 0 if the processor has no extended leaves
    pub fn max_extended_leaf(&self) -> u32 {
        self.max_ext_leaf
    }

    pub fn topology(&self) -> Topology {
        Topology {
            physical_cores: self.physical_cores,
            logical_cores: self.logical_cores,
            threads_per_core: self.threads_per_core,
        }
    }

    /// Logical processor the calling thread currently runs on, `None` if it can't be detected.
    ///
    /// The OS can move the thread at any time, so the result is only a hint.
    pub fn logical_cpu(&self) -> Option<u32> {
        self.logical_cpu_with(&NativeCpuid)
    }

    pub fn logical_cpu_with(&self, cpuid: &dyn Cpuid) -> Option<u32> {
        if self.max_leaf < 1 {
            return None;
        }
        Some(cpuid.cpuid(1).ebx >> 24)
    }

    /// Current 64-bit time-stamp counter, 0 without `RDTSCP`.
    pub fn rt_counter(&self) -> u64 {
        self.rt_counter_with(&NativeCpuid)
    }

    pub fn rt_counter_with(&self, cpuid: &dyn Cpuid) -> u64 {
        if !self.has(FeatureId::RDTSCP) {
            return 0;
        }
        let regs = cpuid.rdtscp();
        u64::from(regs.eax) | (u64::from(regs.edx) << 32)
    }

    /// Value of `IA32_TSC_AUX`, 0 without `RDTSCP`.
    ///
    /// The content is OS dependent, Linux stores the current processor number in it.
    pub fn ia32_tsc_aux(&self) -> u32 {
        self.ia32_tsc_aux_with(&NativeCpuid)
    }

    pub fn ia32_tsc_aux_with(&self, cpuid: &dyn Cpuid) -> u32 {
        if !self.has(FeatureId::RDTSCP) {
            return 0;
        }
        cpuid.rdtscp().ecx
    }
}

impl fmt::Display for CpuInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CPU Info:")?;

        let mut indenter = Indenter::new(f);
        writeln!(indenter, "Brand:             {}", self.brand_name)?;
        writeln!(indenter, "Vendor:            {} ({:?})", self.vendor, self.vendor_string)?;
        writeln!(indenter, "Family:            {}", self.family)?;
        writeln!(indenter, "Model:             {}", self.model)?;
        writeln!(indenter, "Stepping:          {}", self.stepping)?;
        writeln!(indenter, "Physical cores:    {}", self.physical_cores)?;
        writeln!(indenter, "Threads per core:  {}", self.threads_per_core)?;
        writeln!(indenter, "Logical cores:     {}", self.logical_cores)?;
        writeln!(indenter, "Cache line:        {}", self.cache_line)?;
        match self.hz {
            0 => writeln!(indenter, "Frequency:         unknown")?,
            hz => writeln!(indenter, "Frequency:         {hz} Hz")?,
        }
        writeln!(indenter, "Max leaf:          0x{:X}", self.max_leaf)?;
        writeln!(indenter, "Max extended leaf: 0x{:X}", self.max_ext_leaf)?;
        writeln!(indenter, "Features:          {}", self.features)?;
        writeln!(indenter, "{}", self.cache)?;
        write!(indenter, "{}", self.sgx)
    }
}
