//! chipseal command line: scene chipping plus the preparation stages
//! (orthorectification, pan-sharpening, staging) that feed it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use env_logger::Env;

use chipseal::config::{default_config_path, PipelineConfig};
use chipseal::core::{Chipper, OrthoParams, Orthorectifier, PansharpenParams, Pansharpener};
use chipseal::io::staging;
use chipseal::types::{ChunkSpec, StepSpec, TilingParams};

#[derive(Parser, Debug)]
#[command(name = "chipseal")]
#[command(about = "Chip VHR satellite scenes into model-ready GeoTIFF tiles")]
#[command(version)]
struct Cli {
    /// Pipeline configuration file (YAML). Searched in the working
    /// directory and the user config dir when not given.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Slice a scene into uniform georeferenced tiles
    Tile(TileArgs),
    /// Orthorectify a raw scene onto a regular projected grid
    Ortho(OrthoArgs),
    /// Fuse a panchromatic band with a multispectral scene
    Pansharpen(PansharpenArgs),
    /// Inspect or apply the pipeline configuration
    Config(ConfigArgs),
    /// Copy scenes matching a glob into a working directory
    Stage(StageArgs),
}

#[derive(Debug, Args)]
struct TileArgs {
    /// Input scene (GeoTIFF)
    source: PathBuf,

    /// Tile shape as BANDS HEIGHT WIDTH
    #[arg(long, num_args = 3, value_names = ["BANDS", "HEIGHT", "WIDTH"], default_values_t = [3usize, 256, 256])]
    chunk: Vec<usize>,

    /// Stride between tile origins as Y X (defaults to the tile shape)
    #[arg(long, num_args = 2, value_names = ["Y", "X"])]
    step: Option<Vec<usize>>,

    /// Bands to write, 1-based source indices in output order
    #[arg(long, num_args = 1.., value_name = "BAND")]
    bands: Option<Vec<usize>>,

    /// Directory for tiles and the manifest (default: the scene's directory)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Directory for PNG previews (previews are skipped when unset)
    #[arg(long, value_name = "DIR")]
    png_dir: Option<PathBuf>,

    /// Shift edge tiles inward so every tile keeps the full shape
    #[arg(long)]
    backstep: bool,

    /// Disable edge padding; edge tiles are clipped or backstepped
    #[arg(long)]
    no_pad: bool,

    /// Number of worker threads (default: all available)
    #[arg(long, value_name = "N")]
    threads: Option<usize>,
}

#[derive(Debug, Args)]
struct OrthoArgs {
    /// Input scene
    source: PathBuf,

    /// Output GeoTIFF
    dest: PathBuf,

    /// Target CRS as an EPSG code
    #[arg(long, value_name = "CODE")]
    epsg: Option<u32>,

    /// Output resolution in CRS units as X Y
    #[arg(long, num_args = 2, value_names = ["X", "Y"])]
    res: Option<Vec<f64>>,

    /// Output bounds as MIN_X MIN_Y MAX_X MAX_Y (derived from the source when unset)
    #[arg(long, num_args = 4, value_names = ["MIN_X", "MIN_Y", "MAX_X", "MAX_Y"])]
    bounds: Option<Vec<f64>>,

    /// Nodata value for the output bands
    #[arg(long, value_name = "VALUE")]
    nodata: Option<f64>,
}

#[derive(Debug, Args)]
struct PansharpenArgs {
    /// Panchromatic scene
    pan: PathBuf,

    /// Multispectral scene
    multispectral: PathBuf,

    /// Output GeoTIFF
    dest: PathBuf,

    /// Nodata value used during fusion
    #[arg(long, value_name = "VALUE")]
    nodata: Option<f64>,

    /// Destination band for each multispectral band, in source order
    #[arg(long, num_args = 1.., value_name = "BAND")]
    dst_bands: Option<Vec<usize>>,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Print the resolved configuration
    #[arg(long)]
    display: bool,

    /// Report whether a pipeline element is enabled
    #[arg(long, value_name = "SCRIPT")]
    check: Option<String>,

    /// Create datastore directories and links under this root
    #[arg(long, value_name = "DIR")]
    setup: Option<PathBuf>,

    /// Download the declared remote file into this directory
    #[arg(long, value_name = "DIR")]
    fetch: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct StageArgs {
    /// Glob pattern selecting scenes to copy
    pattern: String,

    /// Working directory receiving the copies
    work_dir: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    if let Some(cfg) = &config {
        cfg.apply_environment();
    }

    match cli.command {
        Command::Tile(args) => run_tile(args)?,
        Command::Ortho(args) => run_ortho(args)?,
        Command::Pansharpen(args) => run_pansharpen(args)?,
        Command::Config(args) => run_config(args, config)?,
        Command::Stage(args) => run_stage(args)?,
    }
    Ok(())
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<Option<PipelineConfig>> {
    if let Some(path) = explicit {
        let config = PipelineConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?;
        return Ok(Some(config));
    }
    match default_config_path() {
        Some(path) => {
            log::debug!("Using configuration discovered at {}", path.display());
            Ok(Some(PipelineConfig::load(&path)?))
        }
        None => Ok(None),
    }
}

fn run_tile(args: TileArgs) -> anyhow::Result<()> {
    let chunk = ChunkSpec::from_dims(&args.chunk)?;
    let mut params = TilingParams::new(chunk);
    if let Some(step) = &args.step {
        params.step = StepSpec::from_pair(step)?;
    }
    params.bands = args.bands;
    params.output_dir = args.output_dir;
    params.preview_dir = args.png_dir;
    params.backstep = args.backstep;
    params.pad_for_uniform = !args.no_pad;

    let mut chipper = Chipper::new(params);
    if let Some(threads) = args.threads {
        chipper = chipper.with_threads(threads);
    }

    let report = chipper
        .run(&args.source)
        .with_context(|| format!("tiling of {} failed", args.source.display()))?;
    log::info!(
        "Tile run complete: {} written, {} skipped, manifest {}",
        report.written,
        report.skipped,
        report.manifest_path.display()
    );
    Ok(())
}

fn run_ortho(args: OrthoArgs) -> anyhow::Result<()> {
    let mut params = OrthoParams::default();
    if let Some(epsg) = args.epsg {
        params.target_epsg = epsg;
    }
    if let Some(res) = &args.res {
        params.x_res = res[0];
        params.y_res = res[1];
    }
    if let Some(bounds) = &args.bounds {
        params.bounds = Some([bounds[0], bounds[1], bounds[2], bounds[3]]);
    }
    if let Some(nodata) = args.nodata {
        params.nodata = nodata;
    }

    Orthorectifier::with_params(params)
        .process(&args.source, &args.dest)
        .with_context(|| format!("orthorectification of {} failed", args.source.display()))?;
    Ok(())
}

fn run_pansharpen(args: PansharpenArgs) -> anyhow::Result<()> {
    let mut params = PansharpenParams::default();
    if let Some(nodata) = args.nodata {
        params.nodata = nodata;
    }
    if let Some(dst_bands) = args.dst_bands {
        params.dst_bands = dst_bands;
    }

    Pansharpener::with_params(params)
        .process(&args.pan, &args.multispectral, &args.dest)
        .with_context(|| {
            format!(
                "pan-sharpening of {} failed",
                args.multispectral.display()
            )
        })?;
    Ok(())
}

fn run_config(args: ConfigArgs, config: Option<PipelineConfig>) -> anyhow::Result<()> {
    let config = config.context(
        "no pipeline configuration found; pass --config or create pipeline.yaml",
    )?;

    let inspect_only = args.setup.is_none() && args.fetch.is_none() && args.check.is_none();
    if args.display || inspect_only {
        config.display();
    }
    if let Some(script) = &args.check {
        if config.element_enabled(script) {
            println!("{}: enabled", script);
        } else {
            println!("{}: disabled", script);
        }
    }
    if let Some(root) = &args.setup {
        config
            .setup_datastores(root)
            .with_context(|| format!("datastore setup under {} failed", root.display()))?;
    }
    if let Some(dest) = &args.fetch {
        let saved = config
            .fetch_remote(dest)
            .context("remote configuration fetch failed")?;
        log::info!("Fetched {}", saved.display());
    }
    Ok(())
}

fn run_stage(args: StageArgs) -> anyhow::Result<()> {
    let staged = staging::stage(&args.pattern, &args.work_dir)
        .with_context(|| format!("staging of {} failed", args.pattern))?;
    log::info!("{} scene(s) ready in {}", staged.len(), args.work_dir.display());
    Ok(())
}
