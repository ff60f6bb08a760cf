use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use facescan_core::capture::domain::capture_input::CameraFacing;
use facescan_core::capture::infrastructure::ffmpeg_capture_input::CameraDevices;
use facescan_core::detection::infrastructure::model_resolver;
use facescan_core::overlay::domain::overlay_style::OverlayStyle;
use facescan_core::overlay::infrastructure::overlay_renderer::RendererKind;
use facescan_core::pipeline::infrastructure::default_pipeline_factory::{
    DefaultPipelineConfig, DefaultPipelineFactory,
};
use facescan_core::pipeline::pipeline_controller::{ControllerConfig, PipelineController};
use facescan_core::pipeline::pipeline_logger::LogPipelineLogger;
use facescan_core::shared::constants::{
    BLAZEFACE_MODEL_NAME, DEFAULT_BACK_CAMERA_DEVICE, DEFAULT_FRONT_CAMERA_DEVICE,
    DEFAULT_SURFACE_HEIGHT, DEFAULT_SURFACE_WIDTH, IMAGE_EXTENSIONS,
};

/// Face detection with keypoint and bounding-box overlays for a camera,
/// a video file or a still image.
#[derive(Parser)]
#[command(name = "facescan")]
struct Cli {
    /// Video or image file. Omit when using --camera.
    input: Option<PathBuf>,

    /// Read frames from a camera instead of a file.
    #[arg(long)]
    camera: bool,

    /// Camera to use: front or back.
    #[arg(long, default_value = "front")]
    facing: String,

    /// Capture device name for the front camera.
    #[arg(long, default_value = DEFAULT_FRONT_CAMERA_DEVICE)]
    front_device: String,

    /// Capture device name for the back camera.
    #[arg(long, default_value = DEFAULT_BACK_CAMERA_DEVICE)]
    back_device: String,

    /// Image file or directory that receives the rendered overlays.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Overlay renderer for camera and video: raster or shader.
    #[arg(long, default_value = "shader")]
    renderer: String,

    /// Draw only the overlays, without the input frame underneath.
    #[arg(long)]
    no_input_image: bool,

    /// BlazeFace ONNX model. Defaults to the cached model.
    #[arg(long)]
    model: Option<PathBuf>,

    /// URL to download the model from when it is not cached.
    #[arg(long)]
    model_url: Option<String>,

    /// Minimum detection confidence (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f32,

    /// Stop after this many rendered frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Log nose-tip positions in pixels instead of normalized coordinates.
    #[arg(long)]
    pixel_coordinates: bool,

    /// JSON file with overlay colors and sizes.
    #[arg(long)]
    style: Option<PathBuf>,

    /// Display surface width.
    #[arg(long, default_value_t = DEFAULT_SURFACE_WIDTH)]
    width: u32,

    /// Display surface height.
    #[arg(long, default_value_t = DEFAULT_SURFACE_HEIGHT)]
    height: u32,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let model_path = resolve_model(&cli)?;
    let style = match &cli.style {
        Some(path) => OverlayStyle::load(path)?,
        None => OverlayStyle::default(),
    };

    let factory = DefaultPipelineFactory::new(DefaultPipelineConfig {
        model_path,
        streaming_renderer: parse_renderer(&cli.renderer),
        style,
        devices: CameraDevices {
            front: cli.front_device.clone(),
            back: cli.back_device.clone(),
        },
        surface_size: (cli.width, cli.height),
        output: cli.output.clone(),
        render_input_image: !cli.no_input_image,
    });
    let config = ControllerConfig {
        facing: parse_facing(&cli.facing),
        min_detection_confidence: cli.confidence,
        log_pixel_coordinates: cli.pixel_coordinates,
    };
    let mut controller = PipelineController::new(
        Box::new(factory),
        config,
        Box::new(LogPipelineLogger::default()),
    );

    match &cli.input {
        None => {
            controller.start_camera()?;
        }
        Some(input) if is_image(input) => controller.open_image(input)?,
        Some(input) => controller.start_video(input)?,
    }

    let rendered = controller.run(cli.max_frames);
    controller.stop_current_pipeline();
    log::info!("Rendered {rendered} frames");

    if let Some(output) = &cli.output {
        eprintln!("Wrote {rendered} frame(s) to {}", output.display());
    }
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    match (&cli.input, cli.camera) {
        (Some(_), true) => return Err("--camera cannot be combined with an input file".into()),
        (None, false) => return Err("An input file is required unless --camera is used".into()),
        (Some(input), false) if !input.exists() => {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
        _ => {}
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.renderer != "raster" && cli.renderer != "shader" {
        return Err(format!(
            "Renderer must be 'raster' or 'shader', got '{}'",
            cli.renderer
        )
        .into());
    }
    if cli.facing != "front" && cli.facing != "back" {
        return Err(format!("Facing must be 'front' or 'back', got '{}'", cli.facing).into());
    }
    if cli.width == 0 || cli.height == 0 {
        return Err(format!(
            "Surface size must be positive, got {}x{}",
            cli.width, cli.height
        )
        .into());
    }
    if let Some(model) = &cli.model {
        if !model.exists() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    if let Some(style) = &cli.style {
        if !style.exists() {
            return Err(format!("Style file not found: {}", style.display()).into());
        }
    }
    Ok(())
}

fn resolve_model(cli: &Cli) -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {BLAZEFACE_MODEL_NAME}");
    let path = model_resolver::resolve(
        cli.model.as_deref(),
        BLAZEFACE_MODEL_NAME,
        cli.model_url.as_deref(),
        Some(Box::new(download_progress)),
    )?;
    if cli.model.is_none() && cli.model_url.is_some() {
        eprintln!();
    }
    Ok(path)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn parse_renderer(renderer: &str) -> RendererKind {
    if renderer == "raster" {
        RendererKind::Raster
    } else {
        RendererKind::Shader
    }
}

fn parse_facing(facing: &str) -> CameraFacing {
    if facing == "back" {
        CameraFacing::Back
    } else {
        CameraFacing::Front
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
