//! Sales volume to fill color.
//!
//! Thresholds are strict: a value exactly on a boundary falls into the bucket below it.

use serde::Serialize;

/// Display buckets, ordered from no data to darkest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorBucket {
    Neutral,
    LightestPositive,
    Light,
    MediumLight,
    Medium,
    MediumDark,
    Dark,
    Darkest,
}

/// Lower (exclusive) bounds, checked from the top down.
const THRESHOLDS: [(f64, ColorBucket); 7] = [
    (10_000_000.0, ColorBucket::Darkest),
    (5_000_000.0, ColorBucket::Dark),
    (1_000_000.0, ColorBucket::MediumDark),
    (500_000.0, ColorBucket::Medium),
    (100_000.0, ColorBucket::MediumLight),
    (50_000.0, ColorBucket::Light),
    (0.0, ColorBucket::LightestPositive),
];

pub fn color_for(value: f64) -> ColorBucket {
    THRESHOLDS
        .iter()
        .find(|(bound, _)| value > *bound)
        .map(|(_, bucket)| *bucket)
        .unwrap_or(ColorBucket::Neutral)
}

impl ColorBucket {
    pub fn hex(self) -> &'static str {
        match self {
            ColorBucket::Darkest => "#004080",
            ColorBucket::Dark => "#005FCC",
            ColorBucket::MediumDark => "#1A75E6",
            ColorBucket::Medium => "#4D94EB",
            ColorBucket::MediumLight => "#80B3F0",
            ColorBucket::Light => "#B3D1F5",
            ColorBucket::LightestPositive => "#E6F0FA",
            ColorBucket::Neutral => "#636363",
        }
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        hex_to_rgb(self.hex()).unwrap_or((0, 0, 0))
    }
}

/// Parses `#rrggbb` (an optional trailing alpha byte is ignored).
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 && hex.len() != 8 {
        return None;
    }
    let r = u8::from_str_radix(hex.get(0..2)?, 16).ok()?;
    let g = u8::from_str_radix(hex.get(2..4)?, 16).ok()?;
    let b = u8::from_str_radix(hex.get(4..6)?, 16).ok()?;
    Some((r, g, b))
}
