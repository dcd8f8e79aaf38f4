use crate::io::raster::stamp_provenance;
use crate::types::{ChipError, ChipResult};
use gdal::raster::RasterCreationOption;
use gdal::spatial_ref::{CoordTransform, SpatialRef};
use gdal::{Dataset, DriverManager};
use std::path::Path;

/// Parameters for the orthorectification wrapper
#[derive(Debug, Clone)]
pub struct OrthoParams {
    /// EPSG code of the target grid
    pub target_epsg: u32,
    /// Target pixel size in CRS units
    pub x_res: f64,
    pub y_res: f64,
    /// Nodata value stamped on every output band
    pub nodata: f64,
    /// Output extent as [min_x, min_y, max_x, max_y] in the target CRS;
    /// derived from the source footprint when absent
    pub bounds: Option<[f64; 4]>,
}

impl Default for OrthoParams {
    fn default() -> Self {
        Self {
            target_epsg: 32724,
            x_res: 0.5,
            y_res: 0.5,
            nodata: 0.0,
            bounds: None,
        }
    }
}

/// Projects a source scene onto a regular target grid. The resampling
/// itself is delegated to the raster engine's warper; this wrapper only
/// prepares the target grid and records the georeferencing.
pub struct Orthorectifier {
    params: OrthoParams,
}

impl Orthorectifier {
    pub fn new() -> Self {
        Self::with_params(OrthoParams::default())
    }

    pub fn with_params(params: OrthoParams) -> Self {
        Self { params }
    }

    pub fn process<P: AsRef<Path>, Q: AsRef<Path>>(&self, src_path: P, dst_path: Q) -> ChipResult<()> {
        let src_path = src_path.as_ref();
        if !src_path.is_file() {
            return Err(ChipError::SourceNotFound(format!(
                "{} does not exist or is not a regular file",
                src_path.display()
            )));
        }

        log::info!(
            "Orthorectifying {} to EPSG:{} at {} x {} resolution",
            src_path.display(),
            self.params.target_epsg,
            self.params.x_res,
            self.params.y_res
        );

        let src = Dataset::open(src_path)?;
        let target_srs = SpatialRef::from_epsg(self.params.target_epsg)?;
        let bounds = match self.params.bounds {
            Some(bounds) => bounds,
            None => self.source_footprint(&src, &target_srs)?,
        };

        let [min_x, min_y, max_x, max_y] = bounds;
        if max_x <= min_x || max_y <= min_y {
            return Err(ChipError::InvalidParameter(format!(
                "degenerate output bounds [{}, {}, {}, {}]",
                min_x, min_y, max_x, max_y
            )));
        }
        let width = ((max_x - min_x) / self.params.x_res).ceil() as usize;
        let height = ((max_y - min_y) / self.params.y_res).ceil() as usize;
        let bands = src.raster_count();

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let options = [RasterCreationOption {
            key: "COMPRESS",
            value: "LZW",
        }];
        let mut dst = driver.create_with_band_type_with_options::<f32, _>(
            dst_path.as_ref(),
            width as isize,
            height as isize,
            bands,
            &options,
        )?;

        dst.set_geo_transform(&[min_x, self.params.x_res, 0.0, max_y, 0.0, -self.params.y_res])?;
        dst.set_spatial_ref(&target_srs)?;
        for band_idx in 1..=bands {
            let mut band = dst.rasterband(band_idx)?;
            band.set_no_data_value(Some(self.params.nodata))?;
        }

        // The warp engine owns the geometric correction
        gdal::raster::reproject(&src, &dst)?;
        stamp_provenance(&mut dst)?;

        log::info!(
            "Orthorectified scene written to {} ({} x {} pixels)",
            dst_path.as_ref().display(),
            width,
            height
        );
        Ok(())
    }

    /// Source footprint expressed in the target CRS, from the corner
    /// coordinates of the source grid
    fn source_footprint(&self, src: &Dataset, target_srs: &SpatialRef) -> ChipResult<[f64; 4]> {
        let gt = src.geo_transform().map_err(|_| {
            ChipError::InvalidParameter(
                "source has no geotransform; supply explicit output bounds".to_string(),
            )
        })?;
        let (width, height) = src.raster_size();
        let (width, height) = (width as f64, height as f64);

        let corners = [(0.0, 0.0), (width, 0.0), (0.0, height), (width, height)];
        let mut xs: Vec<f64> = corners
            .iter()
            .map(|(px, py)| gt[0] + px * gt[1] + py * gt[2])
            .collect();
        let mut ys: Vec<f64> = corners
            .iter()
            .map(|(px, py)| gt[3] + px * gt[4] + py * gt[5])
            .collect();

        let src_srs = src.spatial_ref().map_err(|_| {
            ChipError::InvalidParameter(
                "source has no CRS; supply explicit output bounds".to_string(),
            )
        })?;
        if src_srs.auth_code().ok() != Some(self.params.target_epsg as i32) {
            let transform = CoordTransform::new(&src_srs, target_srs)?;
            let mut zs = vec![0.0; xs.len()];
            transform.transform_coords(&mut xs, &mut ys, &mut zs)?;
        }

        let fold = |values: &[f64], init: f64, pick: fn(f64, f64) -> f64| {
            values.iter().fold(init, |acc, &v| pick(acc, v))
        };
        Ok([
            fold(&xs, f64::INFINITY, f64::min),
            fold(&ys, f64::INFINITY, f64::min),
            fold(&xs, f64::NEG_INFINITY, f64::max),
            fold(&ys, f64::NEG_INFINITY, f64::max),
        ])
    }
}

impl Default for Orthorectifier {
    fn default() -> Self {
        Self::new()
    }
}
