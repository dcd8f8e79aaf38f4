use crate::types::{ChipError, ChipResult, ChunkSpec, EdgePolicy, Padding, StepSpec, TileWindow};

/// The planned tiling grid: padding to apply up front plus every tile
/// window in row-major order
#[derive(Debug, Clone)]
pub struct GridPlan {
    pub padding: Padding,
    pub windows: Vec<TileWindow>,
    pub rows: usize,
    pub cols: usize,
}

impl GridPlan {
    /// Raster dimensions after padding, given the original (height, width)
    pub fn padded_shape(&self, height: usize, width: usize) -> (usize, usize) {
        (height + self.padding.rows, width + self.padding.cols)
    }
}

/// Plans the tile grid for a raster shape under a chunk/step spec and an
/// edge policy. Window emission order is row-major (all x for y=0, then
/// y=1, ...) and is the ordering contract the manifest relies on.
pub struct GridPlanner {
    chunk: ChunkSpec,
    step: StepSpec,
    policy: EdgePolicy,
}

impl GridPlanner {
    pub fn new(chunk: ChunkSpec, step: StepSpec, policy: EdgePolicy) -> Self {
        Self { chunk, step, policy }
    }

    /// Compute the ordered window set for a raster of the given pixel size
    pub fn plan(&self, height: usize, width: usize) -> ChipResult<GridPlan> {
        if height == 0 || width == 0 {
            return Err(ChipError::InvalidParameter(format!(
                "raster has empty extent ({} x {})",
                width, height
            )));
        }

        let rows = div_ceil(height, self.step.y_step);
        let cols = div_ceil(width, self.step.x_step);

        // Pad only when an axis does not divide evenly by its step; exact
        // multiples need no padding.
        let padding = match self.policy {
            EdgePolicy::PadForUniform => Padding {
                rows: (self.step.y_step - height % self.step.y_step) % self.step.y_step,
                cols: (self.step.x_step - width % self.step.x_step) % self.step.x_step,
            },
            _ => Padding::default(),
        };
        let eff_height = height + padding.rows;
        let eff_width = width + padding.cols;

        let mut windows = Vec::with_capacity(rows * cols);
        for y_idx in 0..rows {
            for x_idx in 0..cols {
                let mut y_start = y_idx * self.step.y_step;
                let mut x_start = x_idx * self.step.x_step;

                if self.policy == EdgePolicy::Backstep {
                    if y_start + self.chunk.height > height {
                        y_start = height.saturating_sub(self.chunk.height);
                    }
                    if x_start + self.chunk.width > width {
                        x_start = width.saturating_sub(self.chunk.width);
                    }
                }

                let y_end = (y_start + self.chunk.height).min(eff_height);
                let x_end = (x_start + self.chunk.width).min(eff_width);

                windows.push(TileWindow {
                    tile_x: x_idx,
                    tile_y: y_idx,
                    y_start,
                    y_end,
                    x_start,
                    x_end,
                });
            }
        }

        log::info!(
            "Planned {} x {} = {} tile window(s), policy {}, padding ({}, {})",
            rows,
            cols,
            windows.len(),
            self.policy,
            padding.rows,
            padding.cols
        );

        Ok(GridPlan {
            padding,
            windows,
            rows,
            cols,
        })
    }
}

fn div_ceil(value: usize, divisor: usize) -> usize {
    (value + divisor - 1) / divisor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_bounds(w: &TileWindow) -> (usize, usize, usize, usize) {
        (w.y_start, w.y_end, w.x_start, w.x_end)
    }

    #[test]
    fn test_exact_multiple_needs_no_padding() {
        let planner = GridPlanner::new(
            ChunkSpec::new(1, 4, 4),
            StepSpec::new(4, 4),
            EdgePolicy::PadForUniform,
        );
        let plan = planner.plan(8, 12).unwrap();

        assert!(plan.padding.is_zero());
        assert_eq!((plan.rows, plan.cols), (2, 3));
        assert_eq!(plan.windows.len(), 6);
        assert!(plan.windows.iter().all(|w| w.height() == 4 && w.width() == 4));
    }

    #[test]
    fn test_pad_for_uniform_minimal_padding() {
        let planner = GridPlanner::new(
            ChunkSpec::new(1, 4, 4),
            StepSpec::new(4, 4),
            EdgePolicy::PadForUniform,
        );
        let plan = planner.plan(10, 10).unwrap();

        // 10 mod 4 = 2, so 2 padded rows and columns reach the next multiple
        assert_eq!(plan.padding, Padding { rows: 2, cols: 2 });
        assert_eq!(plan.windows.len(), 9);
        // Every window is uniform and the last one runs into the padded zone
        assert!(plan.windows.iter().all(|w| w.height() == 4 && w.width() == 4));
        assert_eq!(window_bounds(&plan.windows[8]), (8, 12, 8, 12));
    }

    #[test]
    fn test_truncate_clips_edge_windows() {
        let planner = GridPlanner::new(
            ChunkSpec::new(1, 4, 4),
            StepSpec::new(4, 4),
            EdgePolicy::Truncate,
        );
        let plan = planner.plan(10, 10).unwrap();

        assert!(plan.padding.is_zero());
        assert_eq!(window_bounds(&plan.windows[8]), (8, 10, 8, 10));
        assert_eq!(plan.windows[8].height(), 2);
    }

    #[test]
    fn test_backstep_shifts_edge_windows() {
        let planner = GridPlanner::new(
            ChunkSpec::new(1, 4, 4),
            StepSpec::new(4, 4),
            EdgePolicy::Backstep,
        );
        let plan = planner.plan(10, 10).unwrap();

        assert!(plan.padding.is_zero());
        // Last row/column windows shift back to 6..10 and stay uniform
        assert_eq!(window_bounds(&plan.windows[8]), (6, 10, 6, 10));
        assert!(plan.windows.iter().all(|w| w.height() == 4 && w.width() == 4));
        assert!(plan.windows.iter().all(|w| w.y_end <= 10 && w.x_end <= 10));
    }

    #[test]
    fn test_backstep_degenerate_raster_smaller_than_chunk() {
        let planner = GridPlanner::new(
            ChunkSpec::new(1, 5, 5),
            StepSpec::new(5, 5),
            EdgePolicy::Backstep,
        );
        let plan = planner.plan(3, 3).unwrap();

        // Origin clamps to zero and the window truncates at the edge
        assert_eq!(plan.windows.len(), 1);
        assert_eq!(window_bounds(&plan.windows[0]), (0, 3, 0, 3));
    }

    #[test]
    fn test_overlapping_windows_from_small_step() {
        let planner = GridPlanner::new(
            ChunkSpec::new(1, 6, 6),
            StepSpec::new(4, 4),
            EdgePolicy::PadForUniform,
        );
        let plan = planner.plan(10, 10).unwrap();

        assert_eq!((plan.rows, plan.cols), (3, 3));
        // Padding follows the step, not the chunk
        assert_eq!(plan.padding, Padding { rows: 2, cols: 2 });
        // Consecutive windows overlap by chunk - step = 2 pixels
        assert_eq!(window_bounds(&plan.windows[0]), (0, 6, 0, 6));
        assert_eq!(window_bounds(&plan.windows[1]), (0, 6, 4, 10));
        // The last window clips at the padded extent
        assert_eq!(window_bounds(&plan.windows[8]), (8, 12, 8, 12));
    }

    #[test]
    fn test_row_major_emission_order() {
        let planner = GridPlanner::new(
            ChunkSpec::new(1, 4, 4),
            StepSpec::new(4, 4),
            EdgePolicy::Truncate,
        );
        let plan = planner.plan(8, 12).unwrap();

        for (i, window) in plan.windows.iter().enumerate() {
            assert_eq!(window.tile_y, i / plan.cols);
            assert_eq!(window.tile_x, i % plan.cols);
        }
    }

    #[test]
    fn test_empty_raster_rejected() {
        let planner = GridPlanner::new(
            ChunkSpec::new(1, 4, 4),
            StepSpec::new(4, 4),
            EdgePolicy::Truncate,
        );
        assert!(planner.plan(0, 10).is_err());
        assert!(planner.plan(10, 0).is_err());
    }
}
