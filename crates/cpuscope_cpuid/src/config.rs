//! Detection options.

use cpuscope_logging::{log_warning, LogCategory};

use crate::feature::FeatureId;

const LOG_CAT : LogCategory = LogCategory::new_with_sub("Cpu", "config");

/// Environment variable holding a comma separated list of features to disable
pub const DISABLE_ENV: &str = "CPUSCOPE_DISABLE";
/// Environment variable allowing identification registers to be read directly on ARM
pub const UNSAFE_ARM_ENV: &str = "CPUSCOPE_UNSAFE_ARM";

/// Options for a detection pass
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DetectOptions {
    /// Don't read ARM identification registers directly when the OS doesn't provide a capability vector
    pub safe: bool,
    /// Features cleared from the result after detection
    pub disabled: Vec<FeatureId>,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self { safe: true, disabled: Vec::new() }
    }
}

impl DetectOptions {
    /// Read the options from the `CPUSCOPE_DISABLE` and `CPUSCOPE_UNSAFE_ARM` environment variables
    pub fn from_env() -> Self {
        let disabled = std::env::var(DISABLE_ENV).map_or_else(|_| Vec::new(), |list| Self::parse_disabled(&list));
        let safe = !std::env::var(UNSAFE_ARM_ENV).map_or(false, |val| Self::parse_flag(&val));
        Self { safe, disabled }
    }

    /// Parse a comma separated list of feature names, unknown names are skipped with a warning
    pub fn parse_disabled(list: &str) -> Vec<FeatureId> {
        let mut disabled = Vec::new();
        for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            match FeatureId::from_name(name) {
                Some(id) => {
                    if !disabled.contains(&id) {
                        disabled.push(id);
                    }
                },
                None => log_warning!(LOG_CAT, "ignoring unknown feature '{name}' in {DISABLE_ENV}"),
            }
        }
        disabled
    }

    fn parse_flag(val: &str) -> bool {
        let val = val.trim();
        val == "1" || val.eq_ignore_ascii_case("true") || val.eq_ignore_ascii_case("yes")
    }

    /// Disable an additional feature
    pub fn with_disabled(mut self, id: FeatureId) -> Self {
        if !self.disabled.contains(&id) {
            self.disabled.push(id);
        }
        self
    }

    pub fn with_safe(mut self, safe: bool) -> Self {
        self.safe = safe;
        self
    }
}
