use crate::io::preview;
use crate::io::raster::{self, RasterMetadata};
use crate::types::{ChipResult, GeoTransform, RasterBlock, TileOutcome, TileWindow};
use ndarray::{s, Array3, ArrayView2, Axis};
use std::path::PathBuf;

/// Processes one tile window: extract the selected bands, skip the window
/// when it holds only nodata, otherwise persist it as a geo-referenced
/// tile with an optional preview image.
///
/// A processor is built once per run and shared read-only across workers;
/// every invocation writes to a uniquely-named file.
pub struct TileProcessor {
    output_dir: PathBuf,
    preview_dir: Option<PathBuf>,
    band_selection: Vec<usize>,
    reference_name: String,
    geo_transform: GeoTransform,
    projection: String,
    nodata: Vec<Option<f64>>,
}

impl TileProcessor {
    pub fn new(
        metadata: &RasterMetadata,
        band_selection: Vec<usize>,
        reference_name: String,
        output_dir: PathBuf,
        preview_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            output_dir,
            preview_dir,
            band_selection,
            reference_name,
            geo_transform: metadata.geo_transform,
            projection: metadata.projection.clone(),
            nodata: metadata.nodata.clone(),
        }
    }

    /// Process a single window against the shared raster block
    pub fn process(&self, window: &TileWindow, block: &RasterBlock) -> ChipResult<TileOutcome> {
        let tile = self.extract(window, block);

        if self.is_all_nodata(&tile) {
            log::debug!("Skipping {} (all nodata)", window);
            return Ok(TileOutcome::skipped(*window));
        }

        let tile_name = format!(
            "{}_tile_{}_{}.tif",
            self.reference_name, window.tile_x, window.tile_y
        );
        let tile_path = self.output_dir.join(&tile_name);
        let tile_transform = self.geo_transform.for_window(window.y_start, window.x_start);
        let tile_nodata: Vec<Option<f64>> = self
            .band_selection
            .iter()
            .map(|&band| self.nodata.get(band - 1).copied().flatten())
            .collect();

        raster::write_geotiff(
            &tile_path,
            &tile,
            &tile_transform,
            &self.projection,
            &tile_nodata,
        )?;
        log::debug!("Saved {} as {}", window, tile_name);

        // Previews are best-effort; a failure never loses the tile
        if let Some(preview_dir) = &self.preview_dir {
            let preview_path = preview_dir.join(format!(
                "{}_tile_{}_{}.png",
                self.reference_name, window.tile_x, window.tile_y
            ));
            if let Err(e) = preview::render_png(&preview_path, &tile) {
                log::warn!("Preview for {} failed: {}", window, e);
            }
        }

        Ok(TileOutcome::written(*window, tile_path))
    }

    /// Copy the window region of each selected band into a fresh tile block
    fn extract(&self, window: &TileWindow, block: &RasterBlock) -> RasterBlock {
        let mut tile = Array3::zeros((self.band_selection.len(), window.height(), window.width()));
        for (out_idx, &band) in self.band_selection.iter().enumerate() {
            let source = block.index_axis(Axis(0), band - 1);
            tile.index_axis_mut(Axis(0), out_idx).assign(&source.slice(s![
                window.y_start..window.y_end,
                window.x_start..window.x_end
            ]));
        }
        tile
    }

    /// A tile is empty only when every selected band holds nothing but its
    /// declared nodata value; bands without a declared value never count
    /// as empty.
    fn is_all_nodata(&self, tile: &RasterBlock) -> bool {
        self.band_selection.iter().enumerate().all(|(out_idx, &band)| {
            let declared = self.nodata.get(band - 1).copied().flatten();
            band_all_nodata(tile.index_axis(Axis(0), out_idx), declared)
        })
    }
}

fn band_all_nodata(view: ArrayView2<f32>, nodata: Option<f64>) -> bool {
    match nodata {
        None => false,
        Some(value) if value.is_nan() => view.iter().all(|v| v.is_nan()),
        Some(value) => {
            let value = value as f32;
            view.iter().all(|&v| v == value)
        }
    }
}
