//! Color legends of the published turbulence and wind rasters.
//!
//! Each opaque pixel is mapped to the nearest legend color (squared RGB
//! distance) and takes that bin's representative value. Ties resolve to the
//! entry listed first.

/// One legend bin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegendEntry {
    /// Bin label as printed on the source legend
    pub label: &'static str,
    pub rgb: [u8; 3],
    /// Representative value for the bin (EDR, or knots for wind)
    pub value: f64,
}

const fn entry(label: &'static str, rgb: [u8; 3], value: f64) -> LegendEntry {
    LegendEntry { label, rgb, value }
}

/// EDR legend, labels in hundredths of EDR.
///
/// The "30-40" bin is drawn with two different oranges on the source legend;
/// both map to the same value.
pub const EDR_LEGEND: &[LegendEntry] = &[
    entry("smooth", [255, 255, 255], 0.02),
    entry("0-10", [200, 230, 255], 0.05),
    entry("10-15", [130, 200, 255], 0.12),
    entry("15-20", [0, 200, 0], 0.17),
    entry("20-25", [255, 255, 0], 0.22),
    entry("25-30", [255, 200, 0], 0.27),
    entry("30-40", [255, 140, 0], 0.35),
    entry("30-40", [255, 110, 60], 0.35),
    entry("40-60", [255, 0, 0], 0.50),
    entry("60-80", [200, 0, 0], 0.70),
    entry("80+", [128, 0, 0], 0.85),
];

/// Wind speed legend, knots
pub const WIND_LEGEND: &[LegendEntry] = &[
    entry("0-10", [255, 255, 255], 5.0),
    entry("10-20", [210, 235, 255], 15.0),
    entry("20-40", [150, 200, 255], 30.0),
    entry("40-60", [80, 150, 255], 50.0),
    entry("60-80", [0, 200, 120], 70.0),
    entry("80-100", [160, 220, 0], 90.0),
    entry("100-120", [255, 220, 0], 110.0),
    entry("120-140", [255, 150, 0], 130.0),
    entry("140-160", [255, 60, 0], 150.0),
    entry("160+", [170, 0, 80], 175.0),
];

fn squared_distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = i32::from(x) - i32::from(y);
            (d * d) as u32
        })
        .sum()
}

/// Closest legend entry to a color, `None` only for an empty legend
#[must_use]
pub fn nearest_entry(legend: &[LegendEntry], rgb: [u8; 3]) -> Option<&LegendEntry> {
    // min_by_key keeps the last minimum, so fold to keep the first
    legend.iter().fold(None, |best: Option<&LegendEntry>, candidate| match best {
        Some(current) if squared_distance(current.rgb, rgb) <= squared_distance(candidate.rgb, rgb) => {
            Some(current)
        }
        _ => Some(candidate),
    })
}

/// Representative EDR for a pixel color
#[must_use]
pub fn classify_edr(rgb: [u8; 3]) -> f64 {
    nearest_entry(EDR_LEGEND, rgb).map_or(0.0, |e| e.value)
}

/// Representative wind speed in knots for a pixel color
#[must_use]
pub fn classify_wind(rgb: [u8; 3]) -> f64 {
    nearest_entry(WIND_LEGEND, rgb).map_or(0.0, |e| e.value)
}
