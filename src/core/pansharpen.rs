use crate::io::raster::stamp_provenance;
use crate::types::{ChipError, ChipResult};
use gdal::raster::RasterCreationOption;
use gdal::{Dataset, DriverManager};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Pansharpened-VRT document. The raster engine performs the fusion when
/// the dataset is read; this crate only describes the band wiring.
#[derive(Debug, Serialize)]
#[serde(rename = "VRTDataset")]
struct VrtDataset {
    #[serde(rename = "@subClass")]
    sub_class: String,
    #[serde(rename = "PansharpeningOptions")]
    options: PansharpeningOptions,
}

#[derive(Debug, Serialize)]
struct PansharpeningOptions {
    #[serde(rename = "Algorithm")]
    algorithm: String,
    #[serde(rename = "NumThreads")]
    num_threads: String,
    #[serde(rename = "NoData")]
    nodata: f64,
    #[serde(rename = "PanchroBand")]
    panchro_band: VrtBand,
    #[serde(rename = "SpectralBand")]
    spectral_bands: Vec<SpectralBand>,
}

#[derive(Debug, Serialize)]
struct VrtBand {
    #[serde(rename = "SourceFilename")]
    source_filename: SourceFilename,
    #[serde(rename = "SourceBand")]
    source_band: usize,
}

#[derive(Debug, Serialize)]
struct SpectralBand {
    #[serde(rename = "@dstBand")]
    dst_band: usize,
    #[serde(rename = "SourceFilename")]
    source_filename: SourceFilename,
    #[serde(rename = "SourceBand")]
    source_band: usize,
}

#[derive(Debug, Serialize)]
struct SourceFilename {
    #[serde(rename = "@relativeToVRT")]
    relative_to_vrt: u8,
    #[serde(rename = "$text")]
    path: String,
}

impl SourceFilename {
    fn absolute(path: &Path) -> ChipResult<Self> {
        let canonical = std::fs::canonicalize(path)?;
        Ok(Self {
            relative_to_vrt: 0,
            path: canonical.to_string_lossy().into_owned(),
        })
    }
}

/// Parameters for the pan-sharpening wrapper
#[derive(Debug, Clone)]
pub struct PansharpenParams {
    /// Fusion algorithm name understood by the raster engine
    pub algorithm: String,
    /// Nodata value for fusion and for the output bands
    pub nodata: f64,
    /// Destination band for each spectral source band, in source order.
    /// The default flips a blue-green-red sensor ordering to RGB.
    pub dst_bands: Vec<usize>,
}

impl Default for PansharpenParams {
    fn default() -> Self {
        Self {
            algorithm: "WeightedBrovey".to_string(),
            nodata: 0.0,
            dst_bands: vec![3, 2, 1],
        }
    }
}

/// Fuses a panchromatic band with a multispectral scene through the
/// engine's pansharpened-VRT mechanism and materializes the result as a
/// compressed GeoTIFF.
pub struct Pansharpener {
    params: PansharpenParams,
}

impl Pansharpener {
    pub fn new() -> Self {
        Self::with_params(PansharpenParams::default())
    }

    pub fn with_params(params: PansharpenParams) -> Self {
        Self { params }
    }

    pub fn process<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
        &self,
        pan_path: P,
        mul_path: Q,
        dst_path: R,
    ) -> ChipResult<()> {
        let pan_path = pan_path.as_ref();
        let mul_path = mul_path.as_ref();
        for path in [pan_path, mul_path] {
            if !path.is_file() {
                return Err(ChipError::SourceNotFound(format!(
                    "{} does not exist or is not a regular file",
                    path.display()
                )));
            }
        }

        let mul = Dataset::open(mul_path)?;
        let spectral_count = mul.raster_count() as usize;
        self.validate_band_mapping(spectral_count)?;
        drop(mul);

        log::info!(
            "Pansharpening {} with {} ({} spectral band(s), {})",
            mul_path.display(),
            pan_path.display(),
            spectral_count,
            self.params.algorithm
        );

        let document = self.build_vrt(pan_path, mul_path, spectral_count)?;
        let xml = quick_xml::se::to_string(&document)
            .map_err(|e| ChipError::Processing(format!("failed to render VRT: {}", e)))?;

        let mut scratch = tempfile::Builder::new()
            .prefix("chipseal_pansharpen_")
            .suffix(".vrt")
            .tempfile()?;
        scratch.write_all(xml.as_bytes())?;
        scratch.flush()?;

        // Opening the VRT hands fusion to the engine; the copy drives it
        let fused = Dataset::open(scratch.path())?;
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let options = [
            RasterCreationOption {
                key: "COMPRESS",
                value: "LZW",
            },
            RasterCreationOption {
                key: "BIGTIFF",
                value: "YES",
            },
        ];
        let mut dst = fused.create_copy(&driver, dst_path.as_ref(), &options)?;

        for band_idx in 1..=(spectral_count as isize) {
            let mut band = dst.rasterband(band_idx)?;
            band.set_no_data_value(Some(self.params.nodata))?;
        }
        stamp_provenance(&mut dst)?;

        log::info!(
            "Pansharpened scene written to {}",
            dst_path.as_ref().display()
        );
        Ok(())
    }

    fn validate_band_mapping(&self, spectral_count: usize) -> ChipResult<()> {
        let mapping = &self.params.dst_bands;
        if mapping.len() != spectral_count {
            return Err(ChipError::InvalidParameter(format!(
                "dst_bands maps {} band(s) but the multispectral source has {}",
                mapping.len(),
                spectral_count
            )));
        }
        if mapping.iter().any(|&b| b == 0 || b > spectral_count) {
            return Err(ChipError::InvalidParameter(format!(
                "dst_bands {:?} outside 1..={}",
                mapping, spectral_count
            )));
        }
        let mut seen = mapping.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != mapping.len() {
            return Err(ChipError::InvalidParameter(format!(
                "dst_bands {:?} assigns a destination twice",
                mapping
            )));
        }
        Ok(())
    }

    fn build_vrt(
        &self,
        pan_path: &Path,
        mul_path: &Path,
        spectral_count: usize,
    ) -> ChipResult<VrtDataset> {
        let spectral_bands = (1..=spectral_count)
            .map(|source_band| {
                Ok(SpectralBand {
                    dst_band: self.params.dst_bands[source_band - 1],
                    source_filename: SourceFilename::absolute(mul_path)?,
                    source_band,
                })
            })
            .collect::<ChipResult<Vec<_>>>()?;

        Ok(VrtDataset {
            sub_class: "VRTPansharpenedDataset".to_string(),
            options: PansharpeningOptions {
                algorithm: self.params.algorithm.clone(),
                num_threads: "ALL_CPUS".to_string(),
                nodata: self.params.nodata,
                panchro_band: VrtBand {
                    source_filename: SourceFilename::absolute(pan_path)?,
                    source_band: 1,
                },
                spectral_bands,
            },
        })
    }
}

impl Default for Pansharpener {
    fn default() -> Self {
        Self::new()
    }
}
