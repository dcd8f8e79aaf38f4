use crate::core::grid::GridPlanner;
use crate::core::scheduler::TileScheduler;
use crate::core::tile::TileProcessor;
use crate::io::manifest::ManifestWriter;
use crate::io::raster::{pad_block, RasterHandle};
use crate::types::{ChipError, ChipResult, EdgePolicy, Padding, TileOutcome, TilingParams};
use std::path::{Path, PathBuf};

/// Summary of one completed tiling run
#[derive(Debug, Clone)]
pub struct TilingReport {
    pub manifest_path: PathBuf,
    pub outcomes: Vec<TileOutcome>,
    pub padding: Padding,
    pub written: usize,
    pub skipped: usize,
}

/// Drives a full tiling run: open, validate, plan, pad once, fan out the
/// tile workers, then record the manifest. The manifest is only written
/// after every worker has finished; a failed batch leaves no manifest.
pub struct Chipper {
    params: TilingParams,
    threads: Option<usize>,
}

impl Chipper {
    pub fn new(params: TilingParams) -> Self {
        Self {
            params,
            threads: None,
        }
    }

    /// Bound the worker pool instead of using the global one
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Tile one source raster and return the run report
    pub fn run<P: AsRef<Path>>(&self, source: P) -> ChipResult<TilingReport> {
        let policy = self.params.edge_policy();
        log::info!(
            "Tiling {} with chunk {}, step {}, policy {}",
            source.as_ref().display(),
            self.params.chunk,
            self.params.step,
            policy
        );

        let handle = RasterHandle::open(source, self.params.chunk)?;
        let (band_count, height, width) = handle.shape();

        let output_dir = self.resolve_output_dir(&handle)?;
        let preview_dir = self.resolve_preview_dir()?;
        let band_selection = self.resolve_bands(band_count, &handle)?;

        let planner = GridPlanner::new(self.params.chunk, self.params.step, policy);
        let plan = planner.plan(height, width)?;

        let mut block = handle.read_block()?;
        if policy == EdgePolicy::PadForUniform && !plan.padding.is_zero() {
            block = pad_block(&block, plan.padding);
        }

        let reference_name = handle.reference_name();
        let processor = TileProcessor::new(
            handle.metadata(),
            band_selection,
            reference_name.clone(),
            output_dir.clone(),
            preview_dir,
        );

        let scheduler = match self.threads {
            Some(threads) => TileScheduler::with_threads(threads),
            None => TileScheduler::new(),
        };
        let outcomes = scheduler.run(&plan.windows, |window| processor.process(window, &block))?;

        let manifest_path = ManifestWriter::write(&outcomes, &output_dir, &reference_name)?;

        let skipped = outcomes.iter().filter(|o| o.is_skip()).count();
        let written = outcomes.len() - skipped;
        log::info!(
            "Tiling complete: {} tile(s) written, {} skipped as empty, manifest {}",
            written,
            skipped,
            manifest_path.display()
        );

        Ok(TilingReport {
            manifest_path,
            outcomes,
            padding: plan.padding,
            written,
            skipped,
        })
    }

    fn resolve_output_dir(&self, handle: &RasterHandle) -> ChipResult<PathBuf> {
        let dir = match &self.params.output_dir {
            Some(dir) => dir.clone(),
            None => handle.source_dir(),
        };
        if !dir.is_dir() {
            let message = format!("output directory {} does not exist", dir.display());
            log::error!("{}", message);
            return Err(ChipError::InvalidParameter(message));
        }
        Ok(dir)
    }

    fn resolve_preview_dir(&self) -> ChipResult<Option<PathBuf>> {
        match &self.params.preview_dir {
            Some(dir) if dir.is_dir() => Ok(Some(dir.clone())),
            Some(dir) => {
                let message = format!("preview directory {} does not exist", dir.display());
                log::error!("{}", message);
                Err(ChipError::InvalidParameter(message))
            }
            None => Ok(None),
        }
    }

    /// Resolve the band selection against the opened raster. The selection
    /// length must match the chunk's band count so output tiles have the
    /// promised shape.
    fn resolve_bands(&self, band_count: usize, handle: &RasterHandle) -> ChipResult<Vec<usize>> {
        let selection = match &self.params.bands {
            Some(bands) => bands.clone(),
            None => handle.bands(),
        };

        if selection.is_empty() {
            let message = "band selection is empty".to_string();
            log::error!("{}", message);
            return Err(ChipError::InvalidParameter(message));
        }
        if let Some(&bad) = selection.iter().find(|&&b| b == 0 || b > band_count) {
            let message = format!(
                "band {} out of range for a {}-band raster",
                bad, band_count
            );
            log::error!("{}", message);
            return Err(ChipError::InvalidParameter(message));
        }
        if selection.len() != self.params.chunk.bands {
            let message = format!(
                "chunk requests {} band(s) but the selection has {}",
                self.params.chunk.bands,
                selection.len()
            );
            log::error!("{}", message);
            return Err(ChipError::InvalidParameter(message));
        }

        Ok(selection)
    }
}
