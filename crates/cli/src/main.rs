use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use animation::{Brightness, Frame, HueSaturation, Keyframe, ParameterTrack};
use renderer::{CancelToken, FrameBuffer, GpuContext, PassParams};

#[derive(Parser)]
#[command(name = "tilefx-cli")]
#[command(about = "Tiled color correction - headless rendering operations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply an animated hue/saturation correction to an image
    Correct {
        /// Input image path
        #[arg(short, long)]
        input: PathBuf,

        /// Output image path
        #[arg(short, long)]
        output: PathBuf,

        /// Frame at which to resolve the parameter track
        #[arg(short, long, default_value_t = 0)]
        frame: Frame,

        /// JSON keyframe file: [{"time": .., "hueRadians": .., "saturation": ..}]
        #[arg(short, long)]
        keyframes: Option<PathBuf>,

        /// Force the CPU path even when a GPU adapter is available
        #[arg(long)]
        cpu: bool,
    },

    /// Apply an animated brightness adjustment to an image
    Brightness {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long, default_value_t = 0)]
        frame: Frame,

        /// JSON keyframe file: [{"time": .., "brightness": ..}]
        #[arg(short, long)]
        keyframes: Option<PathBuf>,

        #[arg(long)]
        cpu: bool,
    },

    /// Print the tile grid for a frame size as JSON
    Plan {
        #[arg(long)]
        width: i64,

        #[arg(long)]
        height: i64,

        /// Largest tile edge a single draw may address
        #[arg(long, default_value_t = 512)]
        max_tile: i64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Correct {
            input,
            output,
            frame,
            keyframes,
            cpu,
        } => {
            let track = load_hue_saturation_track(keyframes.as_deref())?;
            let resolved = track.value_at(frame)?.resolve();
            info!(
                frame,
                hue_radians = resolved.hue_radians,
                saturation = resolved.saturation,
                "resolved correction"
            );
            run_pass(&input, &output, PassParams::HueSaturation(resolved), cpu)
        }

        Commands::Brightness {
            input,
            output,
            frame,
            keyframes,
            cpu,
        } => {
            let track = load_brightness_track(keyframes.as_deref())?;
            let brightness = track.value_at(frame)?.resolve();
            info!(frame, brightness, "resolved brightness");
            run_pass(&input, &output, PassParams::Brightness(brightness), cpu)
        }

        Commands::Plan {
            width,
            height,
            max_tile,
        } => {
            let tiles = tiling::plan((width, height), (max_tile, max_tile))?;
            println!("{}", serde_json::to_string_pretty(&tiles)?);
            Ok(())
        }
    }
}

fn load_hue_saturation_track(path: Option<&Path>) -> Result<ParameterTrack<HueSaturation>> {
    let Some(path) = path else {
        return Ok(ParameterTrack::new(HueSaturation::default()));
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading keyframes from {}", path.display()))?;
    let keyframes: Vec<Keyframe<HueSaturation>> =
        serde_json::from_str(&json).context("parsing hue/saturation keyframes")?;
    Ok(ParameterTrack::with_keyframes(
        HueSaturation::default(),
        keyframes,
    ))
}

fn load_brightness_track(path: Option<&Path>) -> Result<ParameterTrack<Brightness>> {
    let Some(path) = path else {
        return Ok(ParameterTrack::new(Brightness::default()));
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading keyframes from {}", path.display()))?;
    let keyframes: Vec<Keyframe<Brightness>> =
        serde_json::from_str(&json).context("parsing brightness keyframes")?;
    Ok(ParameterTrack::with_keyframes(
        Brightness::default(),
        keyframes,
    ))
}

fn run_pass(input: &Path, output: &Path, pass: PassParams, force_cpu: bool) -> Result<()> {
    let img = image::open(input)
        .with_context(|| format!("opening {}", input.display()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    let frame = FrameBuffer::from_pixels(width, height, img.into_raw());

    let rendered = if force_cpu {
        render_cpu(&frame, &pass)?
    } else {
        match GpuContext::new() {
            Ok(ctx) => {
                info!(max_tile = ctx.max_tile_extent().0, "rendering on the GPU");
                ctx.render_frame(&frame, &pass)?
            }
            Err(err) => {
                warn!(%err, "no GPU adapter, falling back to the CPU path");
                render_cpu(&frame, &pass)?
            }
        }
    };

    let out = image::RgbaImage::from_raw(rendered.width, rendered.height, rendered.pixels)
        .context("assembling output image")?;
    out.save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(path = %output.display(), "wrote corrected image");
    Ok(())
}

fn render_cpu(frame: &FrameBuffer, pass: &PassParams) -> Result<FrameBuffer> {
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    // CPU tiles sized to keep all workers busy on typical frames.
    let rendered =
        renderer::render_frame_parallel(frame, pass, (512, 512), workers, &CancelToken::new())?;
    Ok(rendered)
}
