//! I/O modules for reading scenes and writing tiles, previews, and manifests

pub mod raster;
pub mod manifest;
pub mod preview;
pub mod staging;

pub use raster::{RasterHandle, RasterMetadata};
pub use manifest::ManifestWriter;
pub use preview::render_png;
pub use staging::stage;
