//! Nominal clock frequency.

use super::Probe;

/// Frequency that couldn't be determined
pub const FREQUENCY_UNKNOWN: i64 = -1;

/// Nominal frequency in Hz from the time stamp counter leaf, falling back to the brand string.
pub(crate) fn detect(probe: &Probe<'_>, brand: &str) -> i64 {
    if let Some(regs) = probe.leaf(0x15) {
        // TSC frequency = core crystal clock * ebx / eax
        if regs.eax != 0 && regs.ebx != 0 && regs.ecx != 0 {
            let hz = u64::from(regs.ecx).checked_mul(u64::from(regs.ebx))
                .map(|hz| hz / u64::from(regs.eax))
                .and_then(|hz| i64::try_from(hz).ok());
            if let Some(hz) = hz {
                return hz;
            }
        }
    }
    parse_brand_frequency(brand)
}

/// Parse the rated frequency out of a brand string, e.g. `"... @ 2.50GHz"` or `"... 1300MHz"`.
///
/// The number is the run of digits (with at most one decimal point) between the last space and the last
/// `MHz`/`GHz`/`THz`. Returns [`FREQUENCY_UNKNOWN`] when the string doesn't have that shape.
pub fn parse_brand_frequency(brand: &str) -> i64 {
    let bytes = brand.as_bytes();
    let hz = match brand.rfind("Hz") {
        Some(idx) if idx >= 3 => idx,
        _ => return FREQUENCY_UNKNOWN,
    };

    let multiplier: i128 = match bytes[hz - 1] {
        b'M' => 1_000_000,
        b'G' => 1_000_000_000,
        b'T' => 1_000_000_000_000,
        _ => return FREQUENCY_UNKNOWN,
    };

    let mut freq: i128 = 0;
    let mut decimal_shift: i128 = 1;
    let mut divisor: Option<i128> = None;
    let mut found_space = false;
    for &c in bytes[..hz - 1].iter().rev() {
        match c {
            b' ' => {
                found_space = true;
                break;
            },
            b'0'..=b'9' => {
                let digit = i128::from(c - b'0');
                let Some(next) = decimal_shift.checked_mul(digit).and_then(|val| freq.checked_add(val)) else {
                    return FREQUENCY_UNKNOWN;
                };
                freq = next;
                let Some(shift) = decimal_shift.checked_mul(10) else {
                    return FREQUENCY_UNKNOWN;
                };
                decimal_shift = shift;
            },
            b'.' => {
                if divisor.is_some() {
                    return FREQUENCY_UNKNOWN;
                }
                divisor = Some(decimal_shift);
            },
            _ => return FREQUENCY_UNKNOWN,
        }
    }
    if !found_space {
        return FREQUENCY_UNKNOWN;
    }

    let Some(hz) = freq.checked_mul(multiplier) else {
        return FREQUENCY_UNKNOWN;
    };
    let hz = hz / divisor.unwrap_or(1);
    i64::try_from(hz).unwrap_or(FREQUENCY_UNKNOWN)
}
