//! SI prefix conversions (100 ms → 0.1 s, 4.7e-6 F → 4.7 μF)

/// Metric prefix, each step is a factor of 1000
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Metric {
    Nano = -3,
    Micro = -2,
    Milli = -1,
    Normal = 0,
    Kilo = 1,
    Mega = 2,
    Giga = 3,
}

const METRIC_STEP: f64 = 1e3;

impl Metric {
    pub fn prefix(self) -> &'static str {
        match self {
            Metric::Nano => "n",
            Metric::Micro => "μ",
            Metric::Milli => "m",
            Metric::Normal => "",
            Metric::Kilo => "k",
            Metric::Mega => "M",
            Metric::Giga => "G",
        }
    }

    fn from_exponent(exponent: i32) -> Self {
        match exponent.clamp(-3, 3) {
            -3 => Metric::Nano,
            -2 => Metric::Micro,
            -1 => Metric::Milli,
            0 => Metric::Normal,
            1 => Metric::Kilo,
            2 => Metric::Mega,
            _ => Metric::Giga,
        }
    }
}

/// Convert `value` expressed in `from` into `to`
pub fn convert(value: f64, from: Metric, to: Metric) -> f64 {
    let difference = from as i32 - to as i32;
    value * METRIC_STEP.powi(difference)
}

/// Convert `value` expressed in `from` into base units
pub fn to_normal(value: f64, from: Metric) -> f64 {
    convert(value, from, Metric::Normal)
}

/// Pick the nearest prefix for a base-unit value
///
/// # Returns
/// `(scaled value, prefix)`, e.g. `(4.7, "μ")` for `4.7e-6`
pub fn auto_convert(value: f64) -> (f64, &'static str) {
    let magnitude = value.abs();
    let metric = if magnitude > 0.0 && magnitude.is_finite() {
        Metric::from_exponent(magnitude.log(METRIC_STEP).floor() as i32)
    } else {
        Metric::Normal
    };

    (convert(value, Metric::Normal, metric), metric.prefix())
}

/// Format with the nearest prefix, e.g. `format_si(0.0047, "H")` → `"4.700 mH"`
pub fn format_si(value: f64, unit: &str) -> String {
    let (scaled, prefix) = auto_convert(value);
    format!("{:.3} {}{}", scaled, prefix, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_normal() {
        assert!((to_normal(100.0, Metric::Milli) - 0.1).abs() < 1e-12);
        assert!((to_normal(2.0, Metric::Kilo) - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_convert_between_prefixes() {
        assert!((convert(1.0, Metric::Milli, Metric::Micro) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_auto_convert() {
        let (value, prefix) = auto_convert(4.7e-6);
        assert!((value - 4.7).abs() < 1e-9);
        assert_eq!(prefix, "μ");

        let (value, prefix) = auto_convert(2200.0);
        assert!((value - 2.2).abs() < 1e-9);
        assert_eq!(prefix, "k");

        assert_eq!(auto_convert(0.0), (0.0, ""));
    }

    #[test]
    fn test_auto_convert_clamps() {
        let (_, prefix) = auto_convert(1e-15);
        assert_eq!(prefix, "n");
    }

    #[test]
    fn test_format_si() {
        assert_eq!(format_si(-0.0047, "H"), "-4.700 mH");
    }
}
