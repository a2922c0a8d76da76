//! Derived display metrics: model accuracy and density formatting.

use serde::Serialize;

use crate::error::MetricError;

/// Unit suffix for AGB density values.
pub const DENSITY_UNIT: &str = "Ton/ha";

/// Mean of `values`, or `None` when empty.
///
/// Values are summed in ascending order so the result depends only on the
/// multiset of inputs, not on their order.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(sorted.iter().sum::<f64>() / sorted.len() as f64)
}

/// `100 - (error_value / mean(reference_series)) * 100`.
///
/// Fails with `NoData` for an empty series or a mean of exactly zero.
/// The result is not clamped: an error larger than the reference mean
/// yields a negative accuracy.
pub fn accuracy_pct(error_value: f64, reference_series: &[f64]) -> Result<f64, MetricError> {
    Ok(AccuracyBreakdown::compute(error_value, reference_series)?.accuracy_pct)
}

/// Accuracy and error shares for the model-performance donut.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccuracyBreakdown {
    /// Error as a percentage of the observed mean.
    pub error_pct: f64,
    /// `100 - error_pct`.
    pub accuracy_pct: f64,
    /// Accuracy fell outside [0, 100]; the model error exceeds the mean itself.
    pub out_of_range: bool,
}

impl AccuracyBreakdown {
    pub fn compute(error_value: f64, reference_series: &[f64]) -> Result<Self, MetricError> {
        let m = mean(reference_series).ok_or(MetricError::NoData("empty reference series"))?;
        if m == 0.0 {
            return Err(MetricError::NoData("reference mean is zero"));
        }
        let error_pct = error_value / m * 100.0;
        let accuracy_pct = 100.0 - error_pct;
        Ok(Self {
            error_pct,
            accuracy_pct,
            out_of_range: !(0.0..=100.0).contains(&accuracy_pct),
        })
    }

    /// Shown when the reference mean is zero: no error share at all.
    pub fn zero_error() -> Self {
        Self { error_pct: 0.0, accuracy_pct: 100.0, out_of_range: false }
    }

    /// Centre label of the donut, e.g. `"82.4%"`.
    pub fn label(&self) -> String {
        format!("{:.1}%", self.accuracy_pct)
    }
}

/// Format an AGB density for display, e.g. `"123.4 Ton/ha"`.
pub fn format_density(value: f64) -> String {
    format!("{value:.1} {DENSITY_UNIT}")
}

/// Format an area with thousands separators, e.g. `"593,259 Ha"`.
pub fn format_area_ha(hectares: f64) -> String {
    let digits = format!("{:.0}", hectares.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if hectares < 0.0 && digits != "0" { "-" } else { "" };
    format!("{sign}{grouped} Ha")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_error_is_full_accuracy() {
        assert_eq!(accuracy_pct(0.0, &[10.0, 20.0, 30.0]), Ok(100.0));
    }

    #[test]
    fn empty_series_is_no_data() {
        assert!(matches!(accuracy_pct(5.0, &[]), Err(MetricError::NoData(_))));
    }

    #[test]
    fn zero_mean_is_no_data() {
        assert!(matches!(accuracy_pct(5.0, &[-1.0, 1.0]), Err(MetricError::NoData(_))));
    }

    #[test]
    fn order_of_series_does_not_matter() {
        let a = [0.1, 0.2, 0.3, 1e8, 3.3, 7.7];
        let mut b = a;
        b.reverse();
        let mut c = a;
        c.swap(0, 4);
        let x = accuracy_pct(0.05, &a).unwrap();
        assert_eq!(x.to_bits(), accuracy_pct(0.05, &b).unwrap().to_bits());
        assert_eq!(x.to_bits(), accuracy_pct(0.05, &c).unwrap().to_bits());
    }

    #[test]
    fn rmse_against_observed_mean() {
        let b = AccuracyBreakdown::compute(30.0, &[100.0, 200.0]).unwrap();
        assert_relative_eq!(b.error_pct, 20.0);
        assert_relative_eq!(b.accuracy_pct, 80.0);
        assert!(!b.out_of_range);
        assert_eq!(b.label(), "80.0%");
    }

    #[test]
    fn error_above_mean_goes_negative_unclamped() {
        let b = AccuracyBreakdown::compute(150.0, &[100.0]).unwrap();
        assert_relative_eq!(b.accuracy_pct, -50.0);
        assert!(b.out_of_range);
    }

    #[test]
    fn density_has_one_decimal_and_unit() {
        assert_eq!(format_density(123.456), "123.5 Ton/ha");
        assert_eq!(format_density(0.0), "0.0 Ton/ha");
    }

    #[test]
    fn zero_error_is_a_full_donut() {
        let b = AccuracyBreakdown::zero_error();
        assert_eq!(b.label(), "100.0%");
        assert!(!b.out_of_range);
    }

    #[test]
    fn area_groups_thousands() {
        assert_eq!(format_area_ha(593_258.68), "593,259 Ha");
        assert_eq!(format_area_ha(999.4), "999 Ha");
        assert_eq!(format_area_ha(1_000.0), "1,000 Ha");
        assert_eq!(format_area_ha(0.2), "0 Ha");
    }
}
