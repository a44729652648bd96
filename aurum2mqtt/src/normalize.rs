use crate::catalog::MeasurementField;

/// Canonical text form of a raw device value.
///
/// Numeric fields are parsed, rounded to two decimals (half away from zero)
/// and rendered in their shortest form with at least one fractional digit,
/// so `"456"` becomes `"456.0"` and `"12.3"` stays `"12.3"`. Negative zero
/// is rendered as `"0.0"`. Textual fields and values that do not parse to a
/// finite number are returned verbatim.
pub fn normalize(raw: &str, field: &MeasurementField) -> String {
    if !field.is_numeric {
        return raw.to_string();
    }
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => render(round2(value)),
        _ => raw.to_string(),
    }
}

/// Above this magnitude an f64 has no fractional digits left to round.
const ROUNDING_LIMIT: f64 = 1e15;

fn round2(value: f64) -> f64 {
    if value.abs() >= ROUNDING_LIMIT {
        return value;
    }
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        // drops the sign of -0.0
        0.0
    } else {
        rounded
    }
}

fn render(value: f64) -> String {
    // Display never uses exponent notation for f64
    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::lookup;

    fn solar() -> &'static MeasurementField {
        lookup("powerSolar").unwrap()
    }

    #[test]
    fn rounds_to_two_decimals_half_away_from_zero() {
        assert_eq!(normalize("12.345", solar()), "12.35");
        assert_eq!(normalize("0.125", solar()), "0.13");
        assert_eq!(normalize("-0.125", solar()), "-0.13");
        assert_eq!(normalize("1.999", solar()), "2.0");
    }

    #[test]
    fn does_not_pad_short_fractions() {
        assert_eq!(normalize("12.3", solar()), "12.3");
        assert_eq!(normalize("123.40", solar()), "123.4");
    }

    #[test]
    fn integers_get_one_fractional_digit() {
        assert_eq!(normalize("456", solar()), "456.0");
        assert_eq!(normalize("0", solar()), "0.0");
        assert_eq!(normalize("123456789", solar()), "123456789.0");
    }

    #[test]
    fn is_idempotent() {
        for raw in ["12.345", "456", "0.005", "-3.14159", "98765.4321"] {
            let once = normalize(raw, solar());
            assert_eq!(normalize(&once, solar()), once, "input {raw}");
        }
    }

    #[test]
    fn non_numeric_values_pass_through() {
        assert_eq!(
            normalize("timestamp-ish-text", solar()),
            "timestamp-ish-text"
        );
        assert_eq!(normalize("", solar()), "");
        assert_eq!(normalize("NaN", solar()), "NaN");
        assert_eq!(normalize("inf", solar()), "inf");
    }

    #[test]
    fn huge_values_are_rendered_without_rounding() {
        for raw in ["1e308", "1.7e308", "-1.7e308", "1e15"] {
            let normalized = normalize(raw, solar());
            assert!(!normalized.contains("inf"), "{raw} gave {normalized}");
            assert!(normalized.ends_with(".0"), "{raw} gave {normalized}");
            assert_eq!(
                normalized.parse::<f64>().unwrap(),
                raw.parse::<f64>().unwrap()
            );
        }
        assert_eq!(normalize("1e15", solar()), "1000000000000000.0");
    }

    #[test]
    fn negative_zero_is_unsigned() {
        assert_eq!(normalize("-0.001", solar()), "0.0");
        assert_eq!(normalize("-0.0", solar()), "0.0");
        assert_eq!(normalize("-0.005", solar()), "-0.01");
    }

    #[test]
    fn textual_fields_are_never_parsed() {
        let timestamp = lookup("smartMeterTimestamp").unwrap();
        assert_eq!(normalize("231016143000", timestamp), "231016143000");
    }
}
