use crate::types::{ChipError, ChipResult, ChunkSpec, GeoTransform, Padding, RasterBlock};
use chrono::Utc;
use gdal::raster::{Buffer, RasterCreationOption};
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::{s, Array3, Axis};
use std::path::{Path, PathBuf};

/// Metadata captured when a source raster is opened
#[derive(Debug, Clone)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub geo_transform: GeoTransform,
    pub projection: String,
    /// Declared nodata value per band, indexed by band position (band 1 first)
    pub nodata: Vec<Option<f64>>,
}

/// Handle over an opened geo-referenced source raster.
///
/// Opening captures the metadata needed for planning (shape, bands, CRS,
/// nodata); pixels are only read when `read_block` is called. The GDAL
/// dataset is released when the handle is dropped.
pub struct RasterHandle {
    source_path: PathBuf,
    dataset: Dataset,
    metadata: RasterMetadata,
    chunk: ChunkSpec,
}

impl RasterHandle {
    /// Open a source raster for tiling
    pub fn open<P: AsRef<Path>>(path: P, chunk: ChunkSpec) -> ChipResult<Self> {
        let source_path = path.as_ref().to_path_buf();

        if !source_path.is_file() {
            return Err(ChipError::SourceNotFound(format!(
                "{} does not exist or is not a regular file",
                source_path.display()
            )));
        }

        let dataset = Dataset::open(&source_path)?;
        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count() as usize;

        if band_count == 0 {
            return Err(ChipError::InvalidParameter(format!(
                "{} has no raster bands",
                source_path.display()
            )));
        }

        let geo_transform = match dataset.geo_transform() {
            Ok(gt) => GeoTransform::from_gdal(&gt),
            Err(_) => {
                log::warn!(
                    "{} has no geotransform, using identity",
                    source_path.display()
                );
                GeoTransform::default()
            }
        };
        let projection = dataset.projection();

        let mut nodata = Vec::with_capacity(band_count);
        for band_idx in 1..=band_count {
            let band = dataset.rasterband(band_idx as isize)?;
            nodata.push(band.no_data_value());
        }

        log::info!(
            "Opened {}: {} x {} pixels, {} band(s), chunk {}",
            source_path.display(),
            width,
            height,
            band_count,
            chunk
        );

        Ok(Self {
            source_path,
            dataset,
            metadata: RasterMetadata {
                width,
                height,
                band_count,
                geo_transform,
                projection,
                nodata,
            },
            chunk,
        })
    }

    /// Raster shape as (bands, height, width)
    pub fn shape(&self) -> (usize, usize, usize) {
        (
            self.metadata.band_count,
            self.metadata.height,
            self.metadata.width,
        )
    }

    /// All source band indices in natural order (1-based, GDAL convention)
    pub fn bands(&self) -> Vec<usize> {
        (1..=self.metadata.band_count).collect()
    }

    pub fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Source filename stem, used to derive all output names
    pub fn reference_name(&self) -> String {
        self.source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("raster"))
    }

    /// Directory holding the source file, the default tile output location
    pub fn source_dir(&self) -> PathBuf {
        self.source_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Per-axis block boundaries (start, end) implied by the chunk spec,
    /// as (y_blocks, x_blocks)
    pub fn chunk_boundaries(&self) -> (Vec<(usize, usize)>, Vec<(usize, usize)>) {
        let axis_blocks = |dim: usize, size: usize| -> Vec<(usize, usize)> {
            let count = (dim + size - 1) / size;
            (0..count)
                .map(|i| (i * size, ((i + 1) * size).min(dim)))
                .collect()
        };
        (
            axis_blocks(self.metadata.height, self.chunk.height),
            axis_blocks(self.metadata.width, self.chunk.width),
        )
    }

    /// Read every band into one dense block (band x height x width).
    ///
    /// Band selection and windowing happen downstream against this block,
    /// which is shared read-only across the tile workers.
    pub fn read_block(&self) -> ChipResult<RasterBlock> {
        let (bands, height, width) = self.shape();
        log::info!(
            "Reading {} band(s) of {} x {} pixels",
            bands,
            width,
            height
        );

        let mut block = Array3::zeros((bands, height, width));
        for band_idx in 0..bands {
            let band = self.dataset.rasterband((band_idx + 1) as isize)?;
            let buffer = band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
            log::debug!("Read band {} ({} values)", band_idx + 1, buffer.data.len());

            let mut slab = block.index_axis_mut(Axis(0), band_idx);
            for row in 0..height {
                for col in 0..width {
                    slab[[row, col]] = buffer.data[row * width + col];
                }
            }
        }

        Ok(block)
    }
}

/// Extend a block with replicated edge values (rows at the bottom, columns
/// at the right). Returns a new block; the input is never modified.
pub fn pad_block(block: &RasterBlock, padding: Padding) -> RasterBlock {
    if padding.is_zero() {
        return block.clone();
    }

    let (bands, height, width) = block.dim();
    let mut padded = Array3::zeros((bands, height + padding.rows, width + padding.cols));
    padded.slice_mut(s![.., ..height, ..width]).assign(block);

    if padding.rows > 0 {
        let last_row = block.slice(s![.., height - 1, ..]).to_owned();
        for r in 0..padding.rows {
            padded
                .slice_mut(s![.., height + r, ..width])
                .assign(&last_row);
        }
    }
    if padding.cols > 0 {
        // Replicate from the padded block so new bottom rows are covered too
        let last_col = padded.slice(s![.., .., width - 1]).to_owned();
        for c in 0..padding.cols {
            padded.slice_mut(s![.., .., width + c]).assign(&last_col);
        }
    }

    log::info!(
        "Padded raster from {} x {} to {} x {} by edge replication",
        width,
        height,
        width + padding.cols,
        height + padding.rows
    );
    padded
}

/// Write a multi-band block as an LZW-compressed GeoTIFF. `nodata` carries
/// one entry per block band; missing entries leave the band unset.
pub fn write_geotiff<P: AsRef<Path>>(
    path: P,
    block: &RasterBlock,
    transform: &GeoTransform,
    projection: &str,
    nodata: &[Option<f64>],
) -> ChipResult<()> {
    let (bands, height, width) = block.dim();

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let options = [RasterCreationOption {
        key: "COMPRESS",
        value: "LZW",
    }];
    let mut dataset = driver.create_with_band_type_with_options::<f32, _>(
        path.as_ref(),
        width as isize,
        height as isize,
        bands as isize,
        &options,
    )?;

    dataset.set_geo_transform(&transform.to_gdal())?;
    if !projection.is_empty() {
        dataset.set_projection(projection)?;
    }
    stamp_provenance(&mut dataset)?;

    for band_idx in 0..bands {
        let mut rasterband = dataset.rasterband((band_idx + 1) as isize)?;
        let flat_data: Vec<f32> = block.index_axis(Axis(0), band_idx).iter().cloned().collect();
        let buffer = Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;
        if let Some(value) = nodata.get(band_idx).copied().flatten() {
            rasterband.set_no_data_value(Some(value))?;
        }
    }

    log::debug!(
        "Wrote {} ({} x {} x {})",
        path.as_ref().display(),
        bands,
        height,
        width
    );
    Ok(())
}

/// Stamp software name/version and a UTC timestamp on an output dataset
pub fn stamp_provenance(dataset: &mut Dataset) -> ChipResult<()> {
    dataset.set_metadata_item(
        "TIFFTAG_SOFTWARE",
        &format!("chipseal {}", env!("CARGO_PKG_VERSION")),
        "",
    )?;
    dataset.set_metadata_item(
        "TIFFTAG_DATETIME",
        &Utc::now().format("%Y:%m:%d %H:%M:%S").to_string(),
        "",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn test_pad_block_replicates_edges() {
        // One band, 2x2, so every padded value is traceable
        let block = Array::from_shape_vec((1, 2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let padded = pad_block(&block, Padding { rows: 1, cols: 2 });

        assert_eq!(padded.dim(), (1, 3, 4));
        // Bottom row replicates the last original row
        assert_eq!(padded[[0, 2, 0]], 3.0);
        assert_eq!(padded[[0, 2, 1]], 4.0);
        // Right columns replicate the last original column
        assert_eq!(padded[[0, 0, 2]], 2.0);
        assert_eq!(padded[[0, 0, 3]], 2.0);
        assert_eq!(padded[[0, 1, 2]], 4.0);
        // Corner extends the original corner value
        assert_eq!(padded[[0, 2, 2]], 4.0);
        assert_eq!(padded[[0, 2, 3]], 4.0);
    }

    #[test]
    fn test_pad_block_zero_is_copy() {
        let block = Array::from_shape_vec((1, 2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let padded = pad_block(&block, Padding::default());
        assert_eq!(padded, block);
    }
}
