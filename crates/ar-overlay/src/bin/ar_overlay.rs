//! ar-overlay CLI: run the overlay over an image sequence, or print markers.

use ar_overlay::aruco::{render_marker, Dictionary};
use ar_overlay::{
    load_assets, DirectorySink, FrameLoop, FrameSink, ImageSequenceSource, NullSink,
    OverlayConfig, StopHandle, StopReason,
};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "ar-overlay")]
#[command(about = "Replace square fiducial markers in frames with perspective-warped images")]
#[command(version)]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite marker assets onto every frame of an image sequence.
    Run(RunArgs),

    /// Render a printable marker from a codebook.
    Marker(MarkerArgs),
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// JSON run configuration.
    #[arg(long)]
    config: PathBuf,

    /// Override the asset directory.
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Override the frame directory.
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Override the output directory.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Override the dictionary bit-grid size (e.g. 6 for 6x6).
    #[arg(long)]
    marker_size: Option<usize>,

    /// Override the dictionary population (50, 100, 250 or 1000).
    #[arg(long)]
    total_markers: Option<usize>,

    /// Do not write marker ids.
    #[arg(long)]
    no_ids: bool,

    /// Outline detections.
    #[arg(long, conflicts_with = "no_outlines")]
    outlines: bool,

    /// Do not outline detections.
    #[arg(long)]
    no_outlines: bool,
}

#[derive(Debug, Clone, Args)]
struct MarkerArgs {
    /// JSON codebook.
    #[arg(long)]
    codebook: PathBuf,

    /// Marker id.
    #[arg(long)]
    id: u32,

    /// Output image path.
    #[arg(long)]
    out: PathBuf,

    /// Pixels per cell.
    #[arg(long, default_value = "20")]
    cell_px: u32,

    /// Border width in cells.
    #[arg(long, default_value = "1")]
    border_bits: u32,

    /// White margin in cells.
    #[arg(long, default_value = "1")]
    quiet_zone: u32,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level)?;

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Marker(args) => marker(args),
    }
}

fn init_logging(level: LevelFilter) -> CliResult<()> {
    #[cfg(feature = "tracing")]
    {
        let _ = level;
        ar_overlay::core::init_tracing(false);
        Ok(())
    }
    #[cfg(not(feature = "tracing"))]
    {
        ar_overlay::core::init_with_level(level)?;
        Ok(())
    }
}

fn apply_overrides(cfg: &mut OverlayConfig, args: &RunArgs) {
    if let Some(dir) = &args.assets {
        cfg.assets_dir = dir.clone();
    }
    if let Some(dir) = &args.frames {
        cfg.frames_dir = dir.clone();
    }
    if let Some(dir) = &args.output {
        cfg.output_dir = Some(dir.clone());
    }
    if let Some(n) = args.marker_size {
        cfg.dictionary.marker_size = n;
    }
    if let Some(n) = args.total_markers {
        cfg.dictionary.total_markers = n;
    }
    if args.no_ids {
        cfg.draw_ids = false;
    }
    if args.outlines {
        cfg.draw_outlines = true;
    }
    if args.no_outlines {
        cfg.draw_outlines = false;
    }
}

fn run(args: RunArgs) -> CliResult<()> {
    let mut cfg = OverlayConfig::load_json(&args.config)?;
    apply_overrides(&mut cfg, &args);

    let detector = cfg.build_detector()?;
    log::info!(
        "dictionary {} ({} codes)",
        detector.dictionary().kind(),
        detector.dictionary().len()
    );
    let assets = load_assets(&cfg.assets_dir)?;
    let source = ImageSequenceSource::open(&cfg.frames_dir, cfg.loop_frames)?;
    let sink: Box<dyn FrameSink> = match &cfg.output_dir {
        Some(dir) => Box::new(DirectorySink::create(dir)?),
        None => Box::new(NullSink),
    };

    let stop = StopHandle::new();
    let handler_stop = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_stop.stop()) {
        log::warn!("Ctrl-C handler not installed: {e}");
    }

    let mut frame_loop = FrameLoop::new(source, detector, &assets, cfg.compositor(), sink)
        .with_wait(Duration::from_millis(cfg.wait_ms))
        .with_outlines(cfg.draw_outlines)
        .with_stop_handle(stop);
    let summary = frame_loop.run();
    println!("{summary}");

    match summary.reason {
        StopReason::CaptureFailed(e) | StopReason::DisplayFailed(e) => Err(e.into()),
        _ => Ok(()),
    }
}

fn marker(args: MarkerArgs) -> CliResult<()> {
    let dict = Dictionary::load_json(&args.codebook)?;
    let img = render_marker(
        &dict,
        args.id,
        args.cell_px,
        args.border_bits,
        args.quiet_zone,
    )
    .ok_or_else(|| format!("{} has no marker {}", dict.kind(), args.id))?;
    img.save(&args.out)?;
    println!("wrote marker {} to {}", args.id, args.out.display());
    Ok(())
}
