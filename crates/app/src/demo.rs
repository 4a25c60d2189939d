//! A stand-in host document and renderer so the pipeline can run without a
//! host application attached.

use std::collections::BTreeMap;

use image::{Rgba, RgbaImage};
use param_animator_core::{
    AnimatorError, FrameRenderer, FrameTarget, FrameValues, HostModel, ParameterTrack, Result,
};

/// Flat set of named numeric parameters, seeded from the animated tracks.
#[derive(Debug, Default)]
pub struct ParameterSheet {
    params: BTreeMap<String, SheetParam>,
    order: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct SheetParam {
    min: f64,
    max: f64,
    value: f64,
}

impl ParameterSheet {
    pub fn new(tracks: &[ParameterTrack]) -> Self {
        let mut sheet = Self::default();
        for track in tracks {
            sheet.order.push(track.name().to_string());
            sheet.params.insert(
                track.name().to_string(),
                SheetParam {
                    min: track.min(),
                    max: track.max(),
                    value: track.min(),
                },
            );
        }
        sheet
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.params.get(name).map(|param| param.value)
    }

    /// Position of every parameter within its range, in `[0, 1]`, in track
    /// order.
    pub fn progress(&self) -> Vec<f64> {
        self.order
            .iter()
            .filter_map(|name| self.params.get(name))
            .map(|param| ((param.value - param.min) / (param.max - param.min)).clamp(0.0, 1.0))
            .collect()
    }
}

impl HostModel for ParameterSheet {
    fn apply(&mut self, values: &FrameValues) -> Result<()> {
        for value in values.iter() {
            let param = self.params.get_mut(&value.name).ok_or_else(|| {
                AnimatorError::apply(
                    values.frame(),
                    format!("parameter `{}` does not exist on the sheet", value.name),
                )
            })?;
            param.value = value.value;
        }
        Ok(())
    }
}

/// Paints a progress bar for the first parameter over a gradient tinted by
/// the second, fitted to the requested width.
#[derive(Debug, Default)]
pub struct SwatchRenderer;

const ASPECT: (u32, u32) = (4, 3);

impl FrameRenderer<ParameterSheet> for SwatchRenderer {
    fn render(&mut self, sheet: &ParameterSheet, target: &FrameTarget) -> Result<()> {
        let width = target.size.pixel_size;
        let height = (width * ASPECT.1 / ASPECT.0).max(1);
        let progress = sheet.progress();
        let primary = progress.first().copied().unwrap_or(0.0);
        let tint = progress.get(1).copied().unwrap_or(1.0 - primary);

        let bar_end = (f64::from(width) * primary).round() as u32;
        let image = RgbaImage::from_fn(width, height, |x, y| {
            let shade = (255 * y / height) as u8;
            if x < bar_end {
                Rgba([255, (200.0 * tint) as u8, 40, 255])
            } else {
                Rgba([shade / 4, (tint * 255.0) as u8 / 2, shade, 255])
            }
        });

        image
            .save(&target.path)
            .map_err(|err| AnimatorError::render(target.index, err.to_string()))
    }
}
