mod settings;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

use frameview_core::engine::engine_events::{EngineEvent, PlaybackState};
use frameview_core::engine::infrastructure::threaded_engine::EngineHandle;
use frameview_core::engine::video_engine::{EngineConfig, EngineInfo, VideoEngine};
use frameview_core::shared::constants::{THUMBNAIL_SIZE, VIDEO_EXTENSIONS};
use frameview_core::shared::crop_rect::CropUpdate;
use frameview_core::shared::export_name;
use frameview_core::shared::frame::Frame;
use frameview_core::video::domain::image_writer::ImageWriter;
use frameview_core::video::infrastructure::export_gallery;
use frameview_core::video::infrastructure::ffmpeg_source::FfmpegSource;
use frameview_core::video::infrastructure::image_file_writer::ImageFileWriter;

use settings::Settings;

/// Scrub through videos, crop frames and export them as images.
#[derive(Parser)]
#[command(name = "frameview")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print video properties and the current crop.
    Info {
        /// Input video file.
        video: PathBuf,

        #[command(flatten)]
        crop: CropArgs,
    },

    /// Save the given frames as JPEG images.
    Export {
        /// Input video file.
        video: PathBuf,

        /// Frame numbers to export (comma-separated).
        #[arg(long, value_delimiter = ',', required = true)]
        frames: Vec<i64>,

        /// Output directory (defaults to the last export directory).
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        crop: CropArgs,
    },

    /// Seek to a frame, step relative to it and report the new position.
    Step {
        /// Input video file.
        video: PathBuf,

        /// Frame to seek to first.
        #[arg(long, default_value = "0")]
        at: i64,

        /// Frames to step by (negative steps backwards).
        #[arg(long, allow_hyphen_values = true)]
        by: i64,

        /// Save the resulting frame into this directory.
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        crop: CropArgs,
    },

    /// Play to the end of the video at its native frame rate.
    Play {
        /// Input video file.
        video: PathBuf,

        /// Frame to start from.
        #[arg(long)]
        from: Option<i64>,

        /// Save every Nth position while playing (requires --output).
        #[arg(long)]
        export_every: Option<usize>,

        /// Output directory for --export-every.
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        crop: CropArgs,
    },

    /// List exported frames in a directory.
    Gallery {
        /// Directory holding exported frames.
        dir: PathBuf,

        /// Write thumbnails into this directory.
        #[arg(long)]
        thumbnails: Option<PathBuf>,

        /// Longest thumbnail side in pixels.
        #[arg(long, default_value_t = THUMBNAIL_SIZE)]
        size: u32,
    },
}

/// Pixel insets removed from each edge of every frame.
#[derive(Args, Default)]
struct CropArgs {
    #[arg(long)]
    crop_left: Option<u32>,

    #[arg(long)]
    crop_right: Option<u32>,

    #[arg(long)]
    crop_top: Option<u32>,

    #[arg(long)]
    crop_bottom: Option<u32>,
}

impl CropArgs {
    fn to_update(&self) -> CropUpdate {
        CropUpdate {
            left: self.crop_left,
            right: self.crop_right,
            top: self.crop_top,
            bottom: self.crop_bottom,
        }
    }
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

    let mut settings = Settings::load();
    let config = EngineConfig {
        fallback_fps: settings.fallback_fps(),
    };

    match cli.command {
        Command::Info { video, crop } => run_info(&video, &crop, config),
        Command::Export {
            video,
            frames,
            output,
            crop,
        } => {
            let output = output
                .or_else(|| settings.export_dir.clone())
                .ok_or("No output directory: pass --output")?;
            run_export(&video, &frames, &output, &crop, config)?;
            settings.export_dir = Some(output);
            settings.save();
            Ok(())
        }
        Command::Step {
            video,
            at,
            by,
            output,
            crop,
        } => run_step(&video, at, by, output.as_deref(), &crop, config),
        Command::Play {
            video,
            from,
            export_every,
            output,
            crop,
        } => {
            let export = export_every.zip(output);
            run_play(&video, from, export, &crop, config)
        }
        Command::Gallery {
            dir,
            thumbnails,
            size,
        } => run_gallery(&dir, thumbnails.as_deref(), size),
    }
}

fn open_engine(
    video: &Path,
    crop: &CropArgs,
    config: EngineConfig,
) -> Result<VideoEngine, Box<dyn std::error::Error>> {
    let mut engine = VideoEngine::open(video, Box::new(FfmpegSource::new()), config)?;
    engine.set_crop(crop.to_update());
    Ok(engine)
}

fn run_info(
    video: &Path,
    crop: &CropArgs,
    config: EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine(video, crop, config)?;
    print_info(&engine.info());
    Ok(())
}

fn print_info(info: &EngineInfo) {
    let metadata = &info.metadata;
    let (width, height) = info.crop.cropped_size(metadata.width, metadata.height);
    println!("{:<14}{}", "Position", info.position);
    println!("{:<14}{}", "Width", metadata.width);
    println!("{:<14}{}", "Height", metadata.height);
    println!("{:<14}{:.3}", "FPS", metadata.fps);
    println!("{:<14}{}", "Frames", metadata.total_frames);
    println!("{:<14}{:.2}s", "Duration", metadata.duration().as_secs_f64());
    println!("{:<14}{}", "Codec", metadata.codec);
    println!("{:<14}{}", "Crop left", info.crop.left);
    println!("{:<14}{}", "Crop right", info.crop.right);
    println!("{:<14}{}", "Crop top", info.crop.top);
    println!("{:<14}{}", "Crop bottom", info.crop.bottom);
    println!("{:<14}{width}x{height}", "Output size");
}

fn run_export(
    video: &Path,
    frames: &[i64],
    output: &Path,
    crop: &CropArgs,
    config: EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = open_engine(video, crop, config)?;
    let total = engine.metadata().total_frames;

    let mut saved = 0;
    for &frame in frames {
        if frame < 0 || frame as u64 >= total as u64 {
            log::warn!("Skipping frame {frame}: video has {total} frames");
            continue;
        }
        engine.seek_to(frame)?;
        let path = engine.save(output)?;
        println!("{}", path.display());
        saved += 1;
    }

    log::info!("Exported {saved} frames to {}", output.display());
    engine.stop();
    Ok(())
}

fn run_step(
    video: &Path,
    at: i64,
    by: i64,
    output: Option<&Path>,
    crop: &CropArgs,
    config: EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = open_engine(video, crop, config)?;
    engine.seek_to(at)?;
    engine.seek_relative(by)?;
    println!("Position: {}", engine.position());

    if let Some(dir) = output {
        let path = engine.save(dir)?;
        println!("{}", path.display());
    }
    engine.stop();
    Ok(())
}

fn run_play(
    video: &Path,
    from: Option<i64>,
    export: Option<(usize, PathBuf)>,
    crop: &CropArgs,
    config: EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut handle = EngineHandle::open(video, Box::new(FfmpegSource::new()), config)?;
    let written = play_through(&handle, from, export.as_ref(), crop)?;
    eprintln!();

    handle.stop();
    log::info!("Playback finished, {} frames exported", written.len());
    Ok(())
}

/// Plays from `from` until the engine stops itself, exporting every Nth
/// position when asked. Returns the exported paths.
fn play_through(
    handle: &EngineHandle,
    from: Option<i64>,
    export: Option<&(usize, PathBuf)>,
    crop: &CropArgs,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let total = handle.metadata().total_frames;
    let base_name = handle.metadata().base_name();
    let writer = ImageFileWriter::new();

    // the seek publishes its frame, so subscribe before it
    let events = handle.subscribe()?;
    handle.set_crop(crop.to_update())?;
    if let Some(frame) = from {
        handle.seek_to(frame)?;
    }
    handle.play(true)?;

    let mut written = Vec::new();
    let mut last_frame: Option<Frame> = None;
    for event in events.iter() {
        match event {
            EngineEvent::FrameReady(frame) => last_frame = Some(frame),
            EngineEvent::PositionChanged(position) => {
                eprint!("\rFrame {position}/{total}");
                if let (Some((every, dir)), Some(frame)) = (export, &last_frame) {
                    if position % every == 0 {
                        let path = dir.join(export_name::format(&base_name, position));
                        writer
                            .write(&path, frame, None)
                            .map_err(|e| e as Box<dyn std::error::Error>)?;
                        written.push(path);
                    }
                }
            }
            EngineEvent::PlaybackChanged(PlaybackState::Stopped) => break,
            EngineEvent::PlaybackChanged(PlaybackState::Playing) => {}
        }
    }
    Ok(written)
}

fn run_gallery(
    dir: &Path,
    thumbnails: Option<&Path>,
    size: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let entries = export_gallery::list(dir)?;
    for entry in &entries {
        match (&entry.base_name, entry.position) {
            (Some(base), Some(position)) => {
                println!("{}\t{base}\t{position}", entry.file_name)
            }
            _ => println!("{}", entry.file_name),
        }
    }

    if let Some(out_dir) = thumbnails {
        let written =
            export_gallery::write_thumbnails(&entries, out_dir, size, &ImageFileWriter::new())?;
        log::info!(
            "Wrote {} thumbnails to {}",
            written.len(),
            out_dir.display()
        );
    }
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Command::Info { video, .. }
        | Command::Export { video, .. }
        | Command::Step { video, .. } => validate_video(video),
        Command::Play {
            video,
            export_every,
            output,
            ..
        } => {
            validate_video(video)?;
            match (export_every, output) {
                (Some(0), _) => Err("--export-every must be at least 1".into()),
                (Some(_), None) => Err("--export-every requires --output".into()),
                (_, Some(dir)) if !dir.is_dir() => {
                    Err(format!("Output directory not found: {}", dir.display()).into())
                }
                _ => Ok(()),
            }
        }
        Command::Gallery { size, .. } => {
            if *size == 0 {
                return Err("Thumbnail size must be at least 1 pixel".into());
            }
            Ok(())
        }
    }
}

fn validate_video(video: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !video.exists() {
        return Err(format!("Input file not found: {}", video.display()).into());
    }
    if !is_video(video) {
        log::warn!(
            "{} does not have a known video extension ({})",
            video.display(),
            VIDEO_EXTENSIONS.join(", ")
        );
    }
    Ok(())
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
