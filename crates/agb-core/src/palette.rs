//! Named colour palettes and raster visualization parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Palettes offered by the map page's colour selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Palette {
    Greens,
    Viridis,
    Plasma,
    Earth,
}

const GREENS: &[&str] = &[
    "f7fcf5", "e5f5e0", "c7e9c0", "a1d99b", "74c476", "41ab5d", "238b45", "006d2c", "00441b",
];
const VIRIDIS: &[&str] = &[
    "#440154", "#482878", "#3e4989", "#31688e", "#26828e", "#1f9e89", "#35b779", "#6ece58", "#b5de2b",
    "#fde725",
];
const PLASMA: &[&str] = &[
    "#0d0887", "#46039f", "#7201a8", "#9c179e", "#bd3786", "#d8576b", "#ed7953", "#fb9f3a", "#fdca26",
    "#f0f921",
];
const EARTH: &[&str] = &["#f7f4f0", "#d4c5a9", "#a67c52", "#6b4423", "#3d2817"];

/// Home page AGB density ramp.
pub const DENSITY_RAMP: &[&str] = &["#edf8fb", "#b2e2e2", "#66c2a4", "#2ca25f", "#006d2c"];
/// Home page trend ramp, loss (red) to gain (green).
pub const TREND_RAMP: &[&str] = &["#d73027", "#fc8d59", "#fee08b", "#d9ef8b", "#91cf60"];

impl Palette {
    pub const ALL: [Palette; 4] = [Palette::Greens, Palette::Viridis, Palette::Plasma, Palette::Earth];

    pub fn name(self) -> &'static str {
        match self {
            Palette::Greens => "Greens",
            Palette::Viridis => "Viridis",
            Palette::Plasma => "Plasma",
            Palette::Earth => "Earth",
        }
    }

    /// Colours as `#rrggbb`, low to high.
    pub fn colors(self) -> Vec<String> {
        let raw = match self {
            Palette::Greens => GREENS,
            Palette::Viridis => VIRIDIS,
            Palette::Plasma => PLASMA,
            Palette::Earth => EARTH,
        };
        normalize_hex(raw)
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Palette {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Palette::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown palette {s:?}, expected one of Greens, Viridis, Plasma, Earth"))
    }
}

/// Prefix bare hex colours with `#` and lowercase them.
pub fn normalize_hex(colors: &[&str]) -> Vec<String> {
    colors
        .iter()
        .map(|c| format!("#{}", c.trim_start_matches('#').to_ascii_lowercase()))
        .collect()
}

/// Display metadata for rendering one raster band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisParams {
    pub min: f64,
    pub max: f64,
    pub palette: Vec<String>,
    pub band: String,
}

impl VisParams {
    pub fn new(min: f64, max: f64, palette: Vec<String>, band: impl Into<String>) -> Self {
        Self { min, max, palette, band: band.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greens_gain_hash_prefix() {
        let c = Palette::Greens.colors();
        assert_eq!(c.len(), 9);
        assert_eq!(c[0], "#f7fcf5");
        assert_eq!(c[8], "#00441b");
    }

    #[test]
    fn parse_is_case_insensitive_and_rejects_unknown() {
        assert_eq!("viridis".parse::<Palette>(), Ok(Palette::Viridis));
        assert!("Magma".parse::<Palette>().is_err());
    }

    #[test]
    fn every_palette_is_valid_hex() {
        for p in Palette::ALL {
            for c in p.colors() {
                assert_eq!(c.len(), 7, "{p}: {c}");
                assert!(c[1..].chars().all(|ch| ch.is_ascii_hexdigit()), "{p}: {c}");
            }
        }
    }
}
