use crate::types::{ChipError, ChipResult, RasterBlock};
use ndarray::{ArrayView2, Axis};
use std::path::Path;

/// Render a tile block as an RGB false-color PNG.
///
/// The first three block bands map to red, green and blue; a single band
/// is replicated to grey and a two-band block repeats its last band. Each
/// channel is min-max stretched over its finite values, so previews stay
/// comparable within a tile regardless of sensor scaling.
pub fn render_png<P: AsRef<Path>>(path: P, tile: &RasterBlock) -> ChipResult<()> {
    let (bands, height, width) = tile.dim();
    if bands == 0 || height == 0 || width == 0 {
        return Err(ChipError::Processing(format!(
            "cannot render preview from an empty tile ({} x {} x {})",
            bands, height, width
        )));
    }

    let channel_views: Vec<ArrayView2<f32>> = (0..3)
        .map(|c| tile.index_axis(Axis(0), c.min(bands - 1)))
        .collect();
    let ranges: Vec<(f32, f32)> = channel_views.iter().map(|v| finite_range(v)).collect();

    let mut img = image::RgbImage::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            let px = [
                stretch(channel_views[0][[y, x]], ranges[0]),
                stretch(channel_views[1][[y, x]], ranges[1]),
                stretch(channel_views[2][[y, x]], ranges[2]),
            ];
            img.put_pixel(x as u32, y as u32, image::Rgb(px));
        }
    }

    img.save(path.as_ref())
        .map_err(|e| ChipError::Processing(format!("failed to write preview: {}", e)))?;
    log::debug!("Rendered preview {}", path.as_ref().display());
    Ok(())
}

fn finite_range(view: &ArrayView2<f32>) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in view.iter() {
        if v.is_finite() {
            min = min.min(v);
            max = max.max(v);
        }
    }
    if min > max {
        // No finite values at all
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

fn stretch(value: f32, (min, max): (f32, f32)) -> u8 {
    if !value.is_finite() || max <= min {
        return 0;
    }
    (((value - min) / (max - min)) * 255.0).round().clamp(0.0, 255.0) as u8
}
