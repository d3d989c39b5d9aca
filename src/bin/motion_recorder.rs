//! motion_recorder - motion-triggered camera recorder daemon
//!
//! This daemon:
//! 1. Loads configuration (defaults, config file, environment, command line)
//! 2. Removes any previous output file
//! 3. Starts the encoder writing to the idle sink, with motion analysis attached
//! 4. Records to the output file while motion is detected
//! 5. Stops the encoder on Ctrl-C or on any fatal error

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use motion_recorder::{
    logging, prepare_output, run_monitor, CameraSettings, ConfigOverrides, ExposureMode,
    MotionAnalyser, MotionClassifier, MotionFlag, RecorderConfig, RecordingSession,
    ShutdownSignal, SyntheticEncoder, SyntheticEncoderConfig,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Record camera video while motion is detected"
)]
struct Args {
    /// JSON or TOML config file.
    #[arg(long, env = "MOTION_RECORDER_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Use the low light exposure profile.
    #[arg(long, overrides_with = "no_night")]
    night: bool,

    /// Use the normal exposure profile.
    #[arg(long, overrides_with = "night")]
    no_night: bool,

    /// Minimum recording time in seconds. Recording always continues while
    /// motion continues.
    #[arg(long, value_name = "SECONDS")]
    record_seconds: Option<u32>,

    /// File the recorded stream is appended to.
    #[arg(long, value_name = "PATH")]
    output_filename: Option<PathBuf>,

    /// Capture resolution, e.g. 800x600.
    #[arg(long, value_name = "WxH")]
    resolution: Option<String>,

    /// Encoder framerate.
    #[arg(long, value_name = "FPS")]
    framerate: Option<u32>,

    /// How big a per-block vector counts as motion.
    #[arg(long)]
    sensitivity: Option<u32>,

    /// Percentage of blocks that must change to count as motion.
    #[arg(long, value_name = "PERCENT")]
    difference_percentage: Option<u32>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let night_mode = if self.night {
            Some(true)
        } else if self.no_night {
            Some(false)
        } else {
            None
        };
        ConfigOverrides {
            config_path: self.config.clone(),
            night_mode,
            minimum_record_seconds: self.record_seconds,
            output_path: self.output_filename.clone(),
            resolution: self.resolution.clone(),
            framerate: self.framerate,
            sensitivity: self.sensitivity,
            difference_percentage: self.difference_percentage,
        }
    }
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let cfg = RecorderConfig::load_with(&args.overrides())?;
    prepare_output(&cfg.output_path)?;

    let mut shutdown = ShutdownSignal::install()?;

    let flag = Arc::new(MotionFlag::new());
    let analyser = MotionAnalyser::new(MotionClassifier::new(cfg.classifier()), Arc::clone(&flag));

    let camera = CameraSettings {
        resolution: cfg.resolution,
        framerate: cfg.framerate,
        exposure: ExposureMode::from_night_mode(cfg.night_mode),
    };
    let encoder = SyntheticEncoder::start(
        SyntheticEncoderConfig::new(camera, cfg.key_frame_interval),
        move |frame| {
            analyser.analyse(frame);
        },
    )?;

    let mut session = RecordingSession::new(cfg.session(), flag, encoder);
    log::info!(
        "monitoring at {} ({} fps), recording to {}",
        cfg.resolution,
        cfg.framerate,
        cfg.output_path.display()
    );
    log::info!(
        "sensitivity={} difference_percentage={} minimum_record_seconds={}",
        cfg.sensitivity,
        cfg.difference_percentage,
        cfg.minimum_record_seconds
    );

    run_monitor(&mut session, &mut shutdown)
}
