use approx::assert_abs_diff_eq;
use chipseal::core::{OrthoParams, Orthorectifier, PansharpenParams, Pansharpener};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager, Metadata};
use std::path::Path;
use tempfile::TempDir;

fn write_scene(path: &Path, bands: usize, size: usize, pixel_size: f64, values: &[f32]) {
    let driver = DriverManager::get_driver_by_name("GTiff").expect("GTiff driver");
    let mut dataset = driver
        .create_with_band_type_with_options::<f32, _>(
            path,
            size as isize,
            size as isize,
            bands as isize,
            &[],
        )
        .expect("Failed to create scene");

    dataset
        .set_geo_transform(&[500_000.0, pixel_size, 0.0, 7_400_000.0, 0.0, -pixel_size])
        .expect("Failed to set geo transform");
    let srs = SpatialRef::from_epsg(32724).expect("Failed to build SRS");
    dataset.set_spatial_ref(&srs).expect("Failed to set SRS");

    for band_idx in 1..=bands {
        let data = vec![values[band_idx - 1]; size * size];
        let buffer = Buffer::new((size, size), data);
        let mut band = dataset.rasterband(band_idx as isize).expect("band");
        band.write((0, 0), (size, size), &buffer)
            .expect("Failed to write band");
    }
}

fn read_center_pixel(dataset: &Dataset, band_idx: isize) -> f32 {
    let (width, height) = dataset.raster_size();
    let buffer = dataset
        .rasterband(band_idx)
        .expect("band")
        .read_as::<f32>(
            ((width / 2) as isize, (height / 2) as isize),
            (1, 1),
            (1, 1),
            None,
        )
        .expect("Failed to read pixel");
    buffer.data[0]
}

#[test]
fn test_ortho_same_crs_preserves_grid_and_values() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("raw.tif");
    let dst = dir.path().join("ortho.tif");
    write_scene(&src, 3, 64, 2.0, &[10.0, 20.0, 30.0]);

    let params = OrthoParams {
        target_epsg: 32724,
        x_res: 2.0,
        y_res: 2.0,
        nodata: 0.0,
        bounds: None,
    };
    Orthorectifier::with_params(params)
        .process(&src, &dst)
        .expect("Orthorectification failed");

    let ortho = Dataset::open(&dst).expect("Failed to open output");
    assert_eq!(ortho.raster_size(), (64, 64));
    assert_eq!(ortho.raster_count(), 3);

    // Footprint-derived bounds reproduce the source grid exactly
    let gt = ortho.geo_transform().unwrap();
    assert_eq!(gt[0], 500_000.0);
    assert_eq!(gt[3], 7_400_000.0);
    assert_eq!(gt[1], 2.0);
    assert_eq!(gt[5], -2.0);
    assert!(ortho.projection().contains("32724"));

    for (band_idx, expected) in [(1, 10.0_f32), (2, 20.0), (3, 30.0)] {
        let value = read_center_pixel(&ortho, band_idx);
        assert_abs_diff_eq!(value, expected, epsilon = 0.5);
        let nodata = ortho.rasterband(band_idx).unwrap().no_data_value();
        assert_eq!(nodata, Some(0.0));
    }
}

#[test]
fn test_ortho_with_explicit_bounds_crops() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("raw.tif");
    let dst = dir.path().join("crop.tif");
    write_scene(&src, 1, 64, 2.0, &[42.0]);

    // North-west 32x32 pixel quarter of the scene
    let params = OrthoParams {
        target_epsg: 32724,
        x_res: 2.0,
        y_res: 2.0,
        nodata: 0.0,
        bounds: Some([500_000.0, 7_399_936.0, 500_064.0, 7_400_000.0]),
    };
    Orthorectifier::with_params(params)
        .process(&src, &dst)
        .expect("Orthorectification failed");

    let cropped = Dataset::open(&dst).unwrap();
    assert_eq!(cropped.raster_size(), (32, 32));
    assert_abs_diff_eq!(read_center_pixel(&cropped, 1), 42.0, epsilon = 0.5);
}

#[test]
fn test_ortho_rejects_degenerate_bounds() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("raw.tif");
    write_scene(&src, 1, 8, 2.0, &[1.0]);

    let params = OrthoParams {
        bounds: Some([500_000.0, 7_400_000.0, 500_000.0, 7_400_100.0]),
        ..OrthoParams::default()
    };
    let result = Orthorectifier::with_params(params).process(&src, dir.path().join("out.tif"));
    assert!(result.is_err());
}

#[test]
fn test_ortho_missing_source_fails() {
    let dir = TempDir::new().unwrap();
    let result = Orthorectifier::new().process(
        dir.path().join("absent.tif"),
        dir.path().join("out.tif"),
    );
    assert!(result.is_err());
}

#[test]
fn test_pansharpen_fuses_to_pan_resolution() {
    let dir = TempDir::new().unwrap();
    let pan = dir.path().join("pan.tif");
    let mul = dir.path().join("mul.tif");
    let dst = dir.path().join("sharp.tif");

    // Pan at 1 m covers the same extent as the 2 m multispectral scene
    write_scene(&pan, 1, 64, 1.0, &[100.0]);
    write_scene(&mul, 3, 32, 2.0, &[50.0, 100.0, 150.0]);

    Pansharpener::new()
        .process(&pan, &mul, &dst)
        .expect("Pansharpening failed");

    let sharp = Dataset::open(&dst).expect("Failed to open output");
    assert_eq!(sharp.raster_size(), (64, 64));
    assert_eq!(sharp.raster_count(), 3);

    // With a flat pan equal to the spectral mean, Brovey leaves values
    // unchanged; the default mapping flips band order into RGB
    for (band_idx, expected) in [(1, 150.0_f32), (2, 100.0), (3, 50.0)] {
        let value = read_center_pixel(&sharp, band_idx);
        assert_abs_diff_eq!(value, expected, epsilon = 0.5);
    }

    let software = sharp
        .metadata_item("TIFFTAG_SOFTWARE", "")
        .unwrap_or_default();
    assert!(software.contains("chipseal"));
}

#[test]
fn test_pansharpen_rejects_mismatched_mapping() {
    let dir = TempDir::new().unwrap();
    let pan = dir.path().join("pan.tif");
    let mul = dir.path().join("mul.tif");
    write_scene(&pan, 1, 16, 1.0, &[100.0]);
    write_scene(&mul, 3, 8, 2.0, &[50.0, 100.0, 150.0]);

    let sharpener = Pansharpener::with_params(PansharpenParams {
        dst_bands: vec![1, 2],
        ..PansharpenParams::default()
    });
    let result = sharpener.process(&pan, &mul, dir.path().join("out.tif"));
    assert!(result.is_err());
}
