//! chipseal: A Fast, Modular VHR Scene Chipper for Wildlife-Monitoring Imagery Pipelines
//!
//! This library slices very-high-resolution satellite scenes into uniform, georeferenced
//! GeoTIFF tiles ready for detection models, with orthorectification and pan-sharpening
//! stages to prepare raw scenes and a manifest writer to hand the tile set downstream.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    ChipError, ChipResult, ChunkSpec, EdgePolicy, GeoTransform, Padding, RasterBlock,
    StepSpec, TileOutcome, TileWindow, TilingParams,
};

pub use config::PipelineConfig;
pub use core::{
    Chipper, GridPlan, GridPlanner, OrthoParams, Orthorectifier, PansharpenParams,
    Pansharpener, TileProcessor, TileScheduler, TilingReport,
};
pub use io::{ManifestWriter, RasterHandle, RasterMetadata};
