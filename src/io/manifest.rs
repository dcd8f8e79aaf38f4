use crate::types::{ChipError, ChipResult, TileOutcome};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One manifest row; skipped windows keep their grid position with an
/// empty path
#[derive(Debug, Serialize)]
struct ManifestRow {
    tile_x: usize,
    tile_y: usize,
    path: String,
}

/// Persists the ordered tile manifest, the durable record of what a run
/// produced. Rows appear in the same order as the outcomes, which the
/// scheduler guarantees is the planned window order.
pub struct ManifestWriter;

impl ManifestWriter {
    pub fn write(
        outcomes: &[TileOutcome],
        output_dir: &Path,
        reference_name: &str,
    ) -> ChipResult<PathBuf> {
        let manifest_path = output_dir.join(format!("{}_tile_list.csv", reference_name));

        let mut writer = csv::Writer::from_path(&manifest_path)
            .map_err(|e| ChipError::Processing(format!("failed to create manifest: {}", e)))?;
        for outcome in outcomes {
            let path = outcome
                .raster_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            writer
                .serialize(ManifestRow {
                    tile_x: outcome.window.tile_x,
                    tile_y: outcome.window.tile_y,
                    path,
                })
                .map_err(|e| ChipError::Processing(format!("failed to write manifest row: {}", e)))?;
        }
        writer
            .flush()
            .map_err(|e| ChipError::Processing(format!("failed to flush manifest: {}", e)))?;

        log::info!(
            "Wrote manifest {} ({} row(s))",
            manifest_path.display(),
            outcomes.len()
        );
        Ok(manifest_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TileWindow;
    use tempfile::TempDir;

    fn window(tile_x: usize, tile_y: usize) -> TileWindow {
        TileWindow {
            tile_x,
            tile_y,
            y_start: tile_y * 4,
            y_end: tile_y * 4 + 4,
            x_start: tile_x * 4,
            x_end: tile_x * 4 + 4,
        }
    }

    #[test]
    fn test_manifest_rows_follow_outcome_order() {
        let dir = TempDir::new().unwrap();
        let outcomes = vec![
            TileOutcome::written(window(0, 0), dir.path().join("scene_tile_0_0.tif")),
            TileOutcome::skipped(window(1, 0)),
            TileOutcome::written(window(0, 1), dir.path().join("scene_tile_0_1.tif")),
        ];

        let manifest_path = ManifestWriter::write(&outcomes, dir.path(), "scene").unwrap();
        assert_eq!(
            manifest_path.file_name().unwrap().to_string_lossy(),
            "scene_tile_list.csv"
        );

        let contents = std::fs::read_to_string(&manifest_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "tile_x,tile_y,path");
        assert!(lines[1].ends_with("scene_tile_0_0.tif"));
        // Skipped window keeps its row with an empty reference
        assert_eq!(lines[2], "1,0,");
        assert!(lines[3].starts_with("0,1,"));
    }

    #[test]
    fn test_empty_outcome_list_writes_empty_manifest() {
        let dir = TempDir::new().unwrap();
        let manifest_path = ManifestWriter::write(&[], dir.path(), "scene").unwrap();

        let contents = std::fs::read_to_string(&manifest_path).unwrap();
        assert_eq!(contents.trim(), "");
    }
}
