mod config;
mod engine;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::Config;
use faceframe_core::capture::capture_file;
use faceframe_core::replay::read_frames;
use faceframe_core::{
    capture, draw_outline, CapturedImage, FaceMeshSource, FrameReport, Guidance, GuidanceSession,
    OverlayStyle, ReplaySource,
};
use faceframe_hw::Camera;
use image::{imageops, RgbImage};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Frames between preview rewrites in `guide --preview`.
const PREVIEW_EVERY: u64 = 10;

#[derive(Parser)]
#[command(name = "faceframe", about = "Camera capture with face pose guidance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Live pose guidance from the camera
    Guide {
        #[command(flatten)]
        overrides: Overrides,
        /// Keep rewriting this JPEG with the latest frame and overlay
        #[arg(long)]
        preview: Option<PathBuf>,
        /// Capture a still when stopped ("-" prints a data URI)
        #[arg(long)]
        capture: Option<PathBuf>,
        /// Print one JSON report per frame instead of verdict changes
        #[arg(long)]
        json: bool,
    },
    /// Capture a single still from the camera
    Capture {
        #[command(flatten)]
        overrides: Overrides,
        /// Write the JPEG here instead of printing a data URI
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Frames to discard while exposure settles
        #[arg(long, default_value_t = 5)]
        warmup: usize,
    },
    /// Encode an image file as a JPEG data URI
    Encode {
        /// Image file to encode
        file: PathBuf,
        /// Flip horizontally before encoding
        #[arg(long)]
        mirror: bool,
        /// Brightness in percent (50–200)
        #[arg(long, default_value_t = 100)]
        brightness: u32,
    },
    /// Classify recorded landmarks, one JSON line per frame
    Replay {
        /// Recording to read ("-" for stdin)
        file: PathBuf,
        /// Recording was taken from a mirrored preview
        #[arg(long)]
        mirrored: bool,
        /// Frame width used for head orientation
        #[arg(long, default_value_t = 1920)]
        width: u32,
        /// Frame height used for head orientation
        #[arg(long, default_value_t = 1080)]
        height: u32,
        /// Print full JSON reports
        #[arg(long)]
        json: bool,
    },
    /// List V4L2 capture devices
    Devices,
}

/// Command-line settings that take precedence over file and environment.
#[derive(Args)]
struct Overrides {
    /// Camera device path
    #[arg(short, long)]
    device: Option<String>,
    /// Face-mesh ONNX model
    #[arg(long)]
    model: Option<PathBuf>,
    /// SCRFD face detector ONNX model
    #[arg(long)]
    detector: Option<PathBuf>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Show and capture the unmirrored image
    #[arg(long)]
    no_mirror: bool,
    /// Skip the face-outline overlay
    #[arg(long)]
    no_overlay: bool,
    /// Capture brightness in percent (50–200)
    #[arg(long)]
    brightness: Option<u32>,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(device) = self.device {
            config.camera_device = device;
        }
        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(detector) = self.detector {
            config.detector_path = detector;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if self.no_mirror {
            config.mirrored = false;
        }
        if self.no_overlay {
            config.show_overlay = false;
        }
        if let Some(brightness) = self.brightness {
            config.brightness = brightness;
        }
        config.normalize();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Guide {
            overrides,
            preview,
            capture,
            json,
        } => {
            let config = load_config(overrides)?;
            run_guide(&config, preview.as_deref(), capture.as_deref(), json).await?;
        }
        Commands::Capture {
            overrides,
            output,
            warmup,
        } => {
            let config = load_config(overrides)?;
            let mut camera = Camera::open(&config.camera_device, config.width, config.height)
                .with_context(|| format!("failed to open {}", config.camera_device))?;
            for _ in 0..warmup {
                if let Err(e) = camera.capture_frame() {
                    tracing::debug!(error = %e, "warmup frame failed");
                }
            }
            let frame = camera.capture_frame().context("failed to read frame")?;
            let image = frame.into_rgb_image()?;
            let shot = capture(&image, &config.capture_settings())?;
            emit_capture(&shot, output.as_deref())?;
        }
        Commands::Encode {
            file,
            mirror,
            brightness,
        } => {
            let settings = faceframe_core::CaptureSettings::new(mirror, brightness)?;
            let shot = capture_file(&file, &settings)
                .with_context(|| format!("failed to encode {}", file.display()))?;
            println!("{}", shot.to_data_uri());
        }
        Commands::Replay {
            file,
            mirrored,
            width,
            height,
            json,
        } => {
            let frames = if file.as_os_str() == "-" {
                read_frames(std::io::stdin().lock())?
            } else {
                let f = std::fs::File::open(&file)
                    .with_context(|| format!("failed to open {}", file.display()))?;
                read_frames(BufReader::new(f))?
            };
            let mut session = GuidanceSession::new(ReplaySource::new(vec![]));
            for landmarks in frames {
                // Guidance is computed in camera coordinates.
                let landmarks = if mirrored {
                    landmarks.map(|l| l.mirrored())
                } else {
                    landmarks
                };
                let report = session.observe(landmarks, width, height);
                print_report(&report, json)?;
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for d in devices {
                println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }
        }
    }

    Ok(())
}

fn load_config(overrides: Overrides) -> Result<Config> {
    let mut config = Config::load().context("failed to load config")?;
    overrides.apply(&mut config);
    tracing::debug!(?config, "effective config");
    Ok(config)
}

async fn run_guide(
    config: &Config,
    preview: Option<&Path>,
    capture_to: Option<&Path>,
    json: bool,
) -> Result<()> {
    // Fail fast on missing hardware or model before starting the loop.
    let camera = Camera::open(&config.camera_device, config.width, config.height)
        .with_context(|| format!("failed to open {}", config.camera_device))?;
    let source = FaceMeshSource::load(&config.model_path_str(), &config.detector_path_str())
        .with_context(|| {
            format!(
                "failed to load {} or {}",
                config.model_path.display(),
                config.detector_path.display()
            )
        })?;
    let session = GuidanceSession::new(source);
    let engine = engine::spawn_engine(camera, session)?;

    println!("Loading…");
    let mut frames = engine.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last: Option<Guidance> = None;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = frames.changed() => {
                if changed.is_err() {
                    tracing::warn!("frame loop stopped");
                    break;
                }
                let Some(live) = frames.borrow_and_update().clone() else {
                    continue;
                };
                if json {
                    print_report(&live.report, true)?;
                } else if last != Some(live.report.guidance) {
                    println!("{}", live.report.message);
                }
                last = Some(live.report.guidance);

                if let Some(path) = preview {
                    if live.report.sequence % PREVIEW_EVERY == 1 {
                        let image = render_preview(&live.image, &live.report, config);
                        if let Err(e) = image.save(path) {
                            tracing::warn!(path = %path.display(), error = %e, "failed to write preview");
                        }
                    }
                }
            }
        }
    }

    if let Some(live) = engine.latest() {
        tracing::info!(
            frames = live.report.sequence,
            guidance = live.report.message,
            "guidance stopped"
        );
    }
    if let Some(path) = capture_to {
        let shot = engine.capture(config.capture_settings()).await?;
        emit_capture(&shot, Some(path))?;
    }
    engine.shutdown();
    Ok(())
}

/// Preview as the user sees it: mirrored if configured, outline on top.
fn render_preview(frame: &RgbImage, report: &FrameReport, config: &Config) -> RgbImage {
    let mut image = if config.mirrored {
        imageops::flip_horizontal(frame)
    } else {
        frame.clone()
    };
    if config.show_overlay {
        if let Some(landmarks) = &report.landmarks {
            draw_outline(
                &mut image,
                landmarks,
                report.guidance,
                &OverlayStyle::default(),
                config.mirrored,
            );
        }
    }
    image
}

fn emit_capture(shot: &CapturedImage, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) if path.as_os_str() != "-" => {
            std::fs::write(path, &shot.jpeg)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Captured {}x{} to {}", shot.width, shot.height, path.display());
        }
        _ => println!("{}", shot.to_data_uri()),
    }
    Ok(())
}

fn print_report(report: &FrameReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        println!("{:>6}  {}", report.sequence, report.message);
    }
    Ok(())
}
