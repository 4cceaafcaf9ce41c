//! Number, percentage, and ratio formatting.
//!
//! Every function here is total: NaN, infinities, and zero denominators
//! produce a neutral value instead of panicking or leaking `NaN` into the
//! display.

/// Clamps a percentage into `[0, 100]`. `NaN` becomes `0`.
#[must_use]
pub fn clamp_percent(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) }
}

/// [`clamp_percent`] for a value that may be missing entirely.
#[must_use]
pub fn clamp_percent_opt(p: Option<f64>) -> f64 {
    p.map_or(0.0, clamp_percent)
}

/// `part` as a percentage of `whole`, clamped. `0` when `whole` is `0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    clamp_percent(part as f64 / whole as f64 * 100.0)
}

/// Formats a count with `K`/`M` suffixes.
///
/// Below one thousand the number is printed as is; otherwise it is scaled
/// and printed with one decimal place (`1500 → "1.5K"`,
/// `2_000_000 → "2.0M"`). Values that would round up to `"1000.0K"` are
/// printed as `"1.0M"`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_number(n: u64) -> String {
    // Smallest count whose thousands round to 1000.0 at one decimal.
    const ROUNDS_TO_MILLION: u64 = 999_950;

    if n >= ROUNDS_TO_MILLION {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Formats a monetary amount using [`format_number`] on the rounded value.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_amount(amount: f64, currency: &str) -> String {
    let whole = if amount.is_finite() && amount > 0.0 {
        amount.round() as u64
    } else {
        0
    };
    format!("{currency} {}", format_number(whole))
}

/// Formats a percentage with one decimal place after clamping.
#[must_use]
pub fn format_percent(p: f64) -> String {
    format!("{:.1}%", clamp_percent(p))
}

/// `a / b`, or `None` when `b` is `0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ratio(a: u64, b: u64) -> Option<f64> {
    (b != 0).then(|| a as f64 / b as f64)
}

/// Formats `a` per `b` as `"1:N"` (e.g. learners per teacher), or `"N/A"`
/// when `b` is `0`.
#[must_use]
pub fn format_ratio(a: u64, b: u64) -> String {
    ratio(a, b).map_or_else(|| "N/A".to_string(), |r| format!("1:{}", r.round()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_handles_out_of_range_and_nan() {
        for p in [-10.0, -0.1, f64::NAN, f64::NEG_INFINITY, 100.5, 250.0, f64::INFINITY] {
            let clamped = clamp_percent(p);
            assert!((0.0..=100.0).contains(&clamped), "{p} -> {clamped}");
        }
        assert!(clamp_percent(f64::NAN).abs() < f64::EPSILON);
        assert!((clamp_percent(42.5) - 42.5).abs() < f64::EPSILON);
        assert!(clamp_percent_opt(None).abs() < f64::EPSILON);
        assert!((clamp_percent_opt(Some(120.0)) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn number_suffixes() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1.0K");
        assert_eq!(format_number(1500), "1.5K");
        assert_eq!(format_number(2_000_000), "2.0M");
        assert_eq!(format_number(12_345_678), "12.3M");
    }

    #[test]
    fn thousands_that_round_up_become_millions() {
        assert_eq!(format_number(999_949), "999.9K");
        assert_eq!(format_number(999_950), "1.0M");
        assert_eq!(format_number(999_999), "1.0M");
        assert_eq!(format_number(1_000_000), "1.0M");
    }

    #[test]
    fn percent_of_zero_whole() {
        assert!(percent(5, 0).abs() < f64::EPSILON);
        assert!((percent(1, 4) - 25.0).abs() < f64::EPSILON);
        assert!((percent(10, 4) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ratios() {
        assert_eq!(format_ratio(350, 10), "1:35");
        assert_eq!(format_ratio(10, 0), "N/A");
        assert_eq!(ratio(1, 0), None);
    }

    #[test]
    fn amounts_and_percent_strings() {
        assert_eq!(format_amount(1_500_000.4, "SSP"), "SSP 1.5M");
        assert_eq!(format_amount(f64::NAN, "SSP"), "SSP 0");
        assert_eq!(format_percent(33.333), "33.3%");
        assert_eq!(format_percent(-3.0), "0.0%");
    }
}
