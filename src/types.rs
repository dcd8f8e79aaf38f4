use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Real-valued pixel data
pub type ChipReal = f32;

/// 3D multi-band raster block (band x height x width)
pub type RasterBlock = Array3<ChipReal>;

/// Requested output tile shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpec {
    pub bands: usize,
    pub height: usize,
    pub width: usize,
}

impl ChunkSpec {
    pub fn new(bands: usize, height: usize, width: usize) -> Self {
        Self { bands, height, width }
    }

    /// Build from a user-supplied dimension list; must be exactly three positive integers
    pub fn from_dims(dims: &[usize]) -> ChipResult<Self> {
        if dims.len() != 3 {
            return Err(ChipError::InvalidParameter(format!(
                "chunk_dimensions must have exactly 3 entries (bands, height, width), got {}",
                dims.len()
            )));
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(ChipError::InvalidParameter(format!(
                "chunk_dimensions must be positive, got {:?}",
                dims
            )));
        }
        Ok(Self::new(dims[0], dims[1], dims[2]))
    }
}

impl std::fmt::Display for ChunkSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.bands, self.height, self.width)
    }
}

/// Pixel stride between successive tile origins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub y_step: usize,
    pub x_step: usize,
}

impl StepSpec {
    pub fn new(y_step: usize, x_step: usize) -> Self {
        Self { y_step, x_step }
    }

    /// Default stride: non-overlapping tiling at the chunk dimensions
    pub fn from_chunk(chunk: &ChunkSpec) -> Self {
        Self::new(chunk.height, chunk.width)
    }

    /// Build from a user-supplied (y, x) pair; both entries must be positive
    pub fn from_pair(pair: &[usize]) -> ChipResult<Self> {
        if pair.len() != 2 {
            return Err(ChipError::InvalidParameter(format!(
                "yx_px_step must have exactly 2 entries (y_step, x_step), got {}",
                pair.len()
            )));
        }
        if pair.iter().any(|&s| s == 0) {
            return Err(ChipError::InvalidParameter(format!(
                "yx_px_step must be positive, got {:?}",
                pair
            )));
        }
        Ok(Self::new(pair[0], pair[1]))
    }
}

impl std::fmt::Display for StepSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.y_step, self.x_step)
    }
}

/// Edge-handling policy for tile windows that overrun the raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgePolicy {
    /// Replicate edge values so every window reaches uniform size
    PadForUniform,
    /// Shift overrunning windows back inside the raster at uniform size
    Backstep,
    /// Clip overrunning windows, producing smaller edge tiles
    Truncate,
}

impl EdgePolicy {
    /// Resolve the policy from the two caller flags. Padding takes priority
    /// when both are requested; the override is reported, not silent.
    pub fn resolve(pad_for_uniform: bool, backstep: bool) -> Self {
        match (pad_for_uniform, backstep) {
            (true, true) => {
                log::warn!("pad_for_uniform and backstep both requested; pad_for_uniform takes priority");
                EdgePolicy::PadForUniform
            }
            (true, false) => EdgePolicy::PadForUniform,
            (false, true) => EdgePolicy::Backstep,
            (false, false) => EdgePolicy::Truncate,
        }
    }
}

impl std::fmt::Display for EdgePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgePolicy::PadForUniform => write!(f, "pad_for_uniform"),
            EdgePolicy::Backstep => write!(f, "backstep"),
            EdgePolicy::Truncate => write!(f, "truncate"),
        }
    }
}

/// Edge padding applied to the raster before tiling (rows at the bottom,
/// columns at the right)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Padding {
    pub rows: usize,
    pub cols: usize,
}

impl Padding {
    pub fn is_zero(&self) -> bool {
        self.rows == 0 && self.cols == 0
    }
}

/// A planned extraction region within the (possibly padded) raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileWindow {
    pub tile_x: usize,
    pub tile_y: usize,
    pub y_start: usize,
    pub y_end: usize,
    pub x_start: usize,
    pub x_end: usize,
}

impl TileWindow {
    pub fn height(&self) -> usize {
        self.y_end - self.y_start
    }

    pub fn width(&self) -> usize {
        self.x_end - self.x_start
    }
}

impl std::fmt::Display for TileWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tile ({}, {}) rows {}..{} cols {}..{}",
            self.tile_x, self.tile_y, self.y_start, self.y_end, self.x_start, self.x_end
        )
    }
}

/// Outcome of processing one tile window. A missing path means the window
/// held only nodata and was skipped; the window is retained so the manifest
/// stays aligned with the planned grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileOutcome {
    pub window: TileWindow,
    pub raster_path: Option<PathBuf>,
}

impl TileOutcome {
    pub fn written(window: TileWindow, path: PathBuf) -> Self {
        Self { window, raster_path: Some(path) }
    }

    pub fn skipped(window: TileWindow) -> Self {
        Self { window, raster_path: None }
    }

    pub fn is_skip(&self) -> bool {
        self.raster_path.is_none()
    }
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: &[f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Transform for a sub-window anchored at pixel (y_start, x_start)
    pub fn for_window(&self, y_start: usize, x_start: usize) -> Self {
        let x = x_start as f64;
        let y = y_start as f64;
        Self {
            top_left_x: self.top_left_x + x * self.pixel_width + y * self.rotation_x,
            top_left_y: self.top_left_y + x * self.rotation_y + y * self.pixel_height,
            ..*self
        }
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self {
            top_left_x: 0.0,
            pixel_width: 1.0,
            rotation_x: 0.0,
            top_left_y: 0.0,
            rotation_y: 0.0,
            pixel_height: -1.0,
        }
    }
}

/// Parameters for one tiling run. Built once, validated up front, and
/// threaded through the pipeline unchanged; stages never mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilingParams {
    /// Requested output tile shape (bands, height, width)
    pub chunk: ChunkSpec,
    /// Stride between tile origins; defaults to the chunk dimensions
    pub step: StepSpec,
    /// Ordered 1-based band selection; `None` keeps all source bands
    pub bands: Option<Vec<usize>>,
    /// Shift overrunning edge windows back inside the raster
    pub backstep: bool,
    /// Replicate edge values until the grid divides evenly
    pub pad_for_uniform: bool,
    /// Tile output directory; defaults to the source file's directory
    pub output_dir: Option<PathBuf>,
    /// Preview output directory; previews are rendered only when set
    pub preview_dir: Option<PathBuf>,
}

impl TilingParams {
    pub fn new(chunk: ChunkSpec) -> Self {
        Self {
            chunk,
            step: StepSpec::from_chunk(&chunk),
            bands: None,
            backstep: false,
            pad_for_uniform: true,
            output_dir: None,
            preview_dir: None,
        }
    }

    /// The effective edge policy after precedence resolution
    pub fn edge_policy(&self) -> EdgePolicy {
        EdgePolicy::resolve(self.pad_for_uniform, self.backstep)
    }
}

/// Error types for chipping operations
#[derive(Debug, thiserror::Error)]
pub enum ChipError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for chipping operations
pub type ChipResult<T> = Result<T, ChipError>;
