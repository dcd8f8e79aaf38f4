//! Core tiling and scene-preparation modules

pub mod grid;
pub mod tile;
pub mod scheduler;
pub mod chipper;
pub mod ortho;
pub mod pansharpen;

// Re-export main types
pub use grid::{GridPlanner, GridPlan};
pub use tile::TileProcessor;
pub use scheduler::TileScheduler;
pub use chipper::{Chipper, TilingReport};
pub use ortho::{Orthorectifier, OrthoParams};
pub use pansharpen::{Pansharpener, PansharpenParams};
