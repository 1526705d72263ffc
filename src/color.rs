use std::collections::BTreeMap;

use palette::{Hsl, IntoColor, Srgb};
use serde::Serialize;

/// Colour for values the series map does not know.
pub const DEFAULT_COLOR: &str = "#808080";

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues, as
/// `#rrggbb` strings.
pub fn generate_palette(n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            let rgb: Srgb<u8> = rgb.into_format();
            format!("#{:02x}{:02x}{:02x}", rgb.red, rgb.green, rgb.blue)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Series colours: category value → colour
// ---------------------------------------------------------------------------

/// Maps the values of one category (metals, municipalities, land uses) to
/// distinct colours so every chart draws a value in the same colour.
#[derive(Debug, Clone)]
pub struct SeriesColors {
    mapping: BTreeMap<String, String>,
}

impl SeriesColors {
    pub fn new<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let values: Vec<&String> = values.into_iter().collect();
        let mapping = values
            .iter()
            .zip(generate_palette(values.len()))
            .map(|(v, c)| ((*v).clone(), c))
            .collect();
        SeriesColors { mapping }
    }

    /// Look up the colour for a value.
    pub fn color_for(&self, value: &str) -> String {
        self.mapping
            .get(value)
            .cloned()
            .unwrap_or_else(|| DEFAULT_COLOR.to_string())
    }

    /// Legend entries (value → colour) in value order.
    pub fn legend_entries(&self) -> Vec<(String, String)> {
        self.mapping
            .iter()
            .map(|(v, c)| (v.clone(), c.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Concentration bands for the map
// ---------------------------------------------------------------------------

/// Four-step colour scale for map markers, low (green) to high (red).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationBand {
    Low,
    MediumLow,
    MediumHigh,
    High,
}

impl ConcentrationBand {
    pub const ALL: [ConcentrationBand; 4] = [
        ConcentrationBand::Low,
        ConcentrationBand::MediumLow,
        ConcentrationBand::MediumHigh,
        ConcentrationBand::High,
    ];

    /// Band for a value already normalised to `[0, 1]`.
    pub fn from_normalized(normalized: f64) -> Self {
        if normalized <= 0.25 {
            ConcentrationBand::Low
        } else if normalized <= 0.5 {
            ConcentrationBand::MediumLow
        } else if normalized <= 0.75 {
            ConcentrationBand::MediumHigh
        } else {
            ConcentrationBand::High
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ConcentrationBand::Low => "#2ECC71",
            ConcentrationBand::MediumLow => "#F39C12",
            ConcentrationBand::MediumHigh => "#E67E22",
            ConcentrationBand::High => "#E74C3C",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConcentrationBand::Low => "Low (≤ 25th percentile)",
            ConcentrationBand::MediumLow => "Medium-Low (25-50th)",
            ConcentrationBand::MediumHigh => "Medium-High (50-75th)",
            ConcentrationBand::High => "High (> 75th percentile)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_distinct_hex() {
        let palette = generate_palette(8);
        assert_eq!(palette.len(), 8);
        for c in &palette {
            assert_eq!(c.len(), 7);
            assert!(c.starts_with('#'));
            assert!(c[1..].chars().all(|ch| ch.is_ascii_hexdigit()));
        }
        let unique: std::collections::BTreeSet<&String> = palette.iter().collect();
        assert_eq!(unique.len(), 8);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn test_series_colors_fallback() {
        let metals: Vec<String> = vec!["Cadmium".into(), "Lead".into()];
        let colors = SeriesColors::new(&metals);
        assert_ne!(colors.color_for("Cadmium"), colors.color_for("Lead"));
        assert_eq!(colors.color_for("Mercury"), DEFAULT_COLOR);
        assert_eq!(colors.legend_entries().len(), 2);
    }

    #[test]
    fn test_band_thresholds() {
        assert_eq!(ConcentrationBand::from_normalized(0.0), ConcentrationBand::Low);
        assert_eq!(ConcentrationBand::from_normalized(0.25), ConcentrationBand::Low);
        assert_eq!(ConcentrationBand::from_normalized(0.5), ConcentrationBand::MediumLow);
        assert_eq!(ConcentrationBand::from_normalized(0.75), ConcentrationBand::MediumHigh);
        assert_eq!(ConcentrationBand::from_normalized(0.76), ConcentrationBand::High);
        assert_eq!(ConcentrationBand::High.color(), "#E74C3C");
    }
}
