//! Export-size resolution for rendered frames.
//!
//! A request is a `(dpi, pixel size, scale)` triple. The dpi picks one of the
//! renderer's quality presets and, above 600 dpi, also scales the pixel size
//! to simulate a denser export. The result is always clamped to the backend's
//! hard per-side ceiling.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AnimatorError, Result};

/// Hard per-side ceiling imposed by the rendering backend.
pub const MAX_PIXEL_SIZE: u32 = 15_000;

/// Dpi values the renderer exposes as named quality presets.
pub const RESOLUTION_BUCKETS: [u32; 4] = [72, 150, 300, 600];

/// Longest-edge sizes offered to callers.
pub const PIXEL_SIZE_PRESETS: [u32; 4] = [1024, 2048, 4096, 8192];

/// Scale factors offered to callers, before filtering by [`max_scale_factor`].
pub const SCALE_PRESETS: [f64; 6] = [0.25, 0.5, 1.0, 1.5, 2.0, 4.0];

/// Smallest scale ever offered or accepted from a custom entry.
pub const MIN_SCALE: f64 = 0.25;

const DENSITY_BASE_DPI: u32 = 600;

/// Quality preset handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionPreset {
    Dpi72,
    Dpi150,
    Dpi300,
    Dpi600,
}

impl ResolutionPreset {
    /// Maps a numeric dpi to its preset. Anything that is not an exact bucket
    /// uses the 600 dpi preset.
    pub fn from_dpi(dpi: u32) -> Self {
        match dpi {
            72 => Self::Dpi72,
            150 => Self::Dpi150,
            300 => Self::Dpi300,
            _ => Self::Dpi600,
        }
    }

    pub fn dpi(self) -> u32 {
        match self {
            Self::Dpi72 => 72,
            Self::Dpi150 => 150,
            Self::Dpi300 => 300,
            Self::Dpi600 => 600,
        }
    }
}

impl fmt::Display for ResolutionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dpi", self.dpi())
    }
}

/// Export options for a single animation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub dpi: u32,
    pub pixel_size: u32,
    pub scale: f64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            dpi: 300,
            pixel_size: 2048,
            scale: 1.0,
        }
    }
}

impl ExportSettings {
    pub fn resolve(&self) -> Result<ResolvedSize> {
        resolve(self.dpi, self.pixel_size, self.scale)
    }

    pub fn max_scale_factor(&self) -> f64 {
        max_scale_factor(self.dpi, self.pixel_size)
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSize {
    /// Pixel size passed to the renderer, within `1..=MAX_PIXEL_SIZE`.
    pub pixel_size: u32,
    /// Pixel size before clamping.
    pub requested: u64,
    pub preset: ResolutionPreset,
    /// Numeric dpi the size was scaled for.
    pub dpi: u32,
    /// Set when `requested` exceeded [`MAX_PIXEL_SIZE`].
    pub clamped: bool,
}

impl ResolvedSize {
    /// Human readable description of the effective density, e.g.
    /// `600 (simulated 1200)`.
    pub fn effective_dpi(&self) -> String {
        if self.dpi > DENSITY_BASE_DPI {
            format!("{} (simulated {})", self.preset.dpi(), self.dpi)
        } else {
            self.preset.dpi().to_string()
        }
    }
}

/// Multiplier applied on top of the scaled size. Only dpi above 600 adds
/// density; everything else leaves the size untouched.
pub fn density_factor(dpi: u32) -> f64 {
    if dpi > DENSITY_BASE_DPI {
        f64::from(dpi) / f64::from(DENSITY_BASE_DPI)
    } else {
        1.0
    }
}

/// Resolves the pixel size handed to the renderer.
///
/// Fails when the scale is not a positive finite number or the final size
/// rounds below one pixel. Sizes above [`MAX_PIXEL_SIZE`] are clamped and
/// reported through [`ResolvedSize::clamped`] plus a warning.
pub fn resolve(dpi: u32, base_pixel_size: u32, scale_factor: f64) -> Result<ResolvedSize> {
    if !scale_factor.is_finite() || scale_factor <= 0.0 {
        return Err(AnimatorError::invalid(format!(
            "scale factor must be a positive number, got {scale_factor}"
        )));
    }

    let preset = ResolutionPreset::from_dpi(dpi);
    if preset.dpi() != dpi && dpi < DENSITY_BASE_DPI {
        tracing::warn!(dpi, %preset, "unrecognised dpi, exporting with the 600 dpi preset");
    }

    let scaled = (f64::from(base_pixel_size) * scale_factor).round();
    let requested = if dpi > DENSITY_BASE_DPI {
        (scaled * density_factor(dpi)).round()
    } else {
        scaled
    };

    if requested < 1.0 {
        return Err(AnimatorError::invalid(format!(
            "resolved pixel size {requested} is below 1 (dpi {dpi}, pixel size {base_pixel_size}, scale {scale_factor})"
        )));
    }

    // `as` saturates for out-of-range floats.
    let requested = requested as u64;
    let clamped = requested > u64::from(MAX_PIXEL_SIZE);
    if clamped {
        tracing::warn!(
            requested,
            limit = MAX_PIXEL_SIZE,
            "requested pixel size exceeds the renderer limit, clamping"
        );
    }

    Ok(ResolvedSize {
        pixel_size: requested.min(u64::from(MAX_PIXEL_SIZE)) as u32,
        requested,
        preset,
        dpi,
        clamped,
    })
}

/// Largest scale factor that keeps [`resolve`] at or under [`MAX_PIXEL_SIZE`]
/// without clamping.
///
/// Returns infinity for a zero base size, since no scale can reach the limit.
pub fn max_scale_factor(dpi: u32, base_pixel_size: u32) -> f64 {
    let density = density_factor(dpi);
    let limit = f64::from(MAX_PIXEL_SIZE);

    // `resolve` rounds the scaled size before applying density, so search the
    // largest whole intermediate size whose density-scaled rounding still fits.
    let mut scaled = (limit / density).floor();
    while ((scaled + 1.0) * density).round() <= limit {
        scaled += 1.0;
    }
    while scaled > 0.0 && (scaled * density).round() > limit {
        scaled -= 1.0;
    }

    scaled / f64::from(base_pixel_size)
}

/// Scale presets that stay within the limit. Falls back to [`MIN_SCALE`] so
/// callers always have something to offer.
pub fn scale_choices(dpi: u32, base_pixel_size: u32) -> Vec<f64> {
    let max = max_scale_factor(dpi, base_pixel_size);
    let allowed: Vec<f64> = SCALE_PRESETS
        .iter()
        .copied()
        .filter(|scale| *scale <= max)
        .collect();
    if allowed.is_empty() {
        vec![MIN_SCALE]
    } else {
        allowed
    }
}

/// Clamps a free-form scale entry into the accepted range.
pub fn clamp_scale(dpi: u32, base_pixel_size: u32, scale: f64) -> f64 {
    let max = max_scale_factor(dpi, base_pixel_size);
    if !scale.is_finite() || scale <= 0.0 {
        MIN_SCALE
    } else if scale > max {
        max
    } else {
        scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_dpi_to_presets() {
        assert_eq!(ResolutionPreset::from_dpi(72), ResolutionPreset::Dpi72);
        assert_eq!(ResolutionPreset::from_dpi(150), ResolutionPreset::Dpi150);
        assert_eq!(ResolutionPreset::from_dpi(300), ResolutionPreset::Dpi300);
        assert_eq!(ResolutionPreset::from_dpi(600), ResolutionPreset::Dpi600);
        assert_eq!(ResolutionPreset::from_dpi(200), ResolutionPreset::Dpi600);
        assert_eq!(ResolutionPreset::from_dpi(1200), ResolutionPreset::Dpi600);
    }

    #[test]
    fn high_dpi_simulates_density() {
        let size = resolve(1200, 2048, 1.0).unwrap();
        assert_eq!(size.pixel_size, 4096);
        assert_eq!(size.preset, ResolutionPreset::Dpi600);
        assert!(!size.clamped);
        assert_eq!(size.effective_dpi(), "600 (simulated 1200)");
    }

    #[test]
    fn unmatched_low_dpi_does_not_scale() {
        let size = resolve(200, 1024, 1.5).unwrap();
        assert_eq!(size.pixel_size, 1536);
        assert_eq!(size.preset, ResolutionPreset::Dpi600);
    }

    #[test]
    fn clamps_to_backend_limit() {
        let size = resolve(600, 8192, 4.0).unwrap();
        assert_eq!(size.requested, 32_768);
        assert_eq!(size.pixel_size, MAX_PIXEL_SIZE);
        assert!(size.clamped);
    }

    #[test]
    fn rejects_sizes_below_one_pixel() {
        assert!(resolve(300, 1, 0.25).is_err());
        assert!(resolve(300, 0, 1.0).is_err());
        assert!(resolve(300, 2048, 0.0).is_err());
        assert!(resolve(300, 2048, f64::NAN).is_err());
    }

    #[test]
    fn never_exceeds_limit() {
        for dpi in [72, 150, 300, 600, 1200, 2400] {
            for base in PIXEL_SIZE_PRESETS {
                for scale in SCALE_PRESETS {
                    let size = resolve(dpi, base, scale).unwrap();
                    assert!(size.pixel_size >= 1);
                    assert!(size.pixel_size <= MAX_PIXEL_SIZE);
                }
            }
        }
    }

    #[test]
    fn max_scale_lands_on_the_limit() {
        for dpi in [72, 150, 200, 300, 600, 1100, 1200, 1400, 1800, 2400, 7000] {
            for base in PIXEL_SIZE_PRESETS {
                let max = max_scale_factor(dpi, base);
                let at_max = resolve(dpi, base, max).unwrap();
                assert!(!at_max.clamped, "dpi {dpi} base {base}");
                assert!(at_max.pixel_size <= MAX_PIXEL_SIZE);
                // One intermediate pixel step below the limit at most.
                let step = density_factor(dpi).ceil() as u32;
                assert!(at_max.pixel_size + step >= MAX_PIXEL_SIZE, "dpi {dpi} base {base}");

                let beyond = resolve(dpi, base, max * 1.01).unwrap();
                assert!(beyond.clamped, "dpi {dpi} base {base}");
            }
        }
    }

    #[test]
    fn filters_scale_presets() {
        assert_eq!(scale_choices(300, 2048), vec![0.25, 0.5, 1.0, 1.5, 2.0, 4.0]);
        assert_eq!(scale_choices(1200, 8192), vec![0.25, 0.5]);
        assert_eq!(scale_choices(1200, 100_000), vec![MIN_SCALE]);
    }

    #[test]
    fn clamps_custom_scale() {
        let max = max_scale_factor(600, 4096);
        assert_eq!(clamp_scale(600, 4096, 10.0), max);
        assert_eq!(clamp_scale(600, 4096, -1.0), MIN_SCALE);
        assert_eq!(clamp_scale(600, 4096, 1.5), 1.5);
    }
}
