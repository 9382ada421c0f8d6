//! Linear scaling of samples to 8-bit channels.

/// An 8-bit channel plus the source value range it was scaled from.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBand {
    pub values: Vec<u8>,
    pub min: f64,
    pub max: f64,
}

/// Scale samples so the minimum maps to 0 and the maximum to 255.
///
/// Scaled values are truncated toward zero. A constant grid maps to all
/// zeros with `min == max`. An empty grid reports a range of `0..0`.
pub fn normalize(samples: &[f64]) -> NormalizedBand {
    if samples.is_empty() {
        return NormalizedBand {
            values: Vec::new(),
            min: 0.0,
            max: 0.0,
        };
    }

    let (min, max) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
            (min.min(v), max.max(v))
        });

    let values = if max == min {
        vec![0u8; samples.len()]
    } else {
        let range = max - min;
        samples
            .iter()
            .map(|&s| ((s - min) * 255.0 / range) as u8)
            .collect()
    };

    NormalizedBand { values, min, max }
}

/// `"{min},{max};"` for every band, in order.
pub fn describe_ranges(bands: &[NormalizedBand]) -> String {
    bands
        .iter()
        .map(|band| format!("{},{};", format_value(band.min), format_value(band.max)))
        .collect()
}

/// Text form of a value as Python's `repr` writes floats.
///
/// Shortest round-trip digits, with scientific notation below 1e-4 and from
/// 1e16. Exponents are signed and at least two digits (`1e+16`, `1.5e-05`).
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }

    // Debug already switches to scientific at the same magnitudes
    let text = format!("{:?}", value);
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => text,
    }
}
