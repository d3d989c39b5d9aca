//! Motion-triggered recorder.
//!
//! Watches the motion vectors a camera encoder produces alongside its video and
//! writes compressed video to disk only while something is moving.
//!
//! # Architecture
//!
//! Two roles run concurrently and share exactly one piece of state:
//!
//! 1. **Producer**: the encoder calls [`MotionAnalyser::analyse`] once per
//!    encoded frame on its own thread. Frames that qualify as motion raise the
//!    [`MotionFlag`].
//! 2. **Consumer**: the control loop ([`run_monitor`]) ticks a
//!    [`RecordingSession`], which takes the flag atomically and redirects the
//!    encoder output between the idle sink and the output file.
//!
//! # Module Structure
//!
//! - `motion`: motion vectors, classifier, shared flag
//! - `session`: idle/recording state machine
//! - `encoder`: encoder trait, asynchronous output switching, synthetic encoder
//! - `sink`: startup cleanup and append-only output file
//! - `runner`: control loop and shutdown signal
//! - `config`: file/env/CLI configuration
//! - `logging`: timestamped line logging

pub mod config;
pub mod encoder;
pub mod logging;
pub mod motion;
pub mod runner;
pub mod session;
pub mod sink;

pub use config::{ConfigOverrides, RecorderConfig, Resolution};
pub use encoder::{
    CameraSettings, Encoder, ExposureMode, OutputTarget, SplitCompletion, SplitHandle,
    SplitStatus, SyntheticEncoder, SyntheticEncoderConfig, TargetKind,
};
pub use motion::{
    ClassifierConfig, FrameGeometry, FrameMotionVectors, MotionAnalyser, MotionClassifier,
    MotionFlag, MotionReport, MotionVectorBlock,
};
pub use runner::{run_monitor, ShutdownSignal, ShutdownTrigger};
pub use session::{RecordingSession, SessionConfig, SessionMode, TickOutcome};
pub use sink::{prepare_output, RecordingSink};
