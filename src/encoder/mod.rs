//! Encoder collaborator seam.
//!
//! The camera encoder produces compressed video and, alongside it, one motion
//! vector frame per encoded frame. The recording session drives it through the
//! [`Encoder`] trait:
//! - redirect live output between the discard target and a file
//! - update the overlay annotation
//! - stop the encoder, releasing whatever it holds
//!
//! Redirecting output is not immediate. The encoder keeps writing to the old
//! target until the next key frame, which can take seconds. `split_recording`
//! therefore returns a [`SplitHandle`] that completes later.

pub mod synthetic;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Duration;

use crate::config::Resolution;
use crate::sink::RecordingSink;

pub use synthetic::{SyntheticEncoder, SyntheticEncoderConfig};

/// Exposure profile requested from the camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExposureMode {
    #[default]
    Auto,
    Night,
}

impl ExposureMode {
    pub fn from_night_mode(night_mode: bool) -> Self {
        if night_mode {
            ExposureMode::Night
        } else {
            ExposureMode::Auto
        }
    }
}

/// Capture settings handed through to the camera unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraSettings {
    pub resolution: Resolution,
    pub framerate: u32,
    pub exposure: ExposureMode,
}

/// Where the encoder's live output goes.
#[derive(Debug)]
pub enum OutputTarget {
    /// Idle sink. Output is thrown away.
    Discard,
    /// Append to a recording file. The encoder becomes the sink's only writer.
    File(RecordingSink),
}

impl OutputTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            OutputTarget::Discard => TargetKind::Discard,
            OutputTarget::File(sink) => TargetKind::File(sink.path().to_path_buf()),
        }
    }
}

/// Description of an [`OutputTarget`] without the handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetKind {
    Discard,
    File(PathBuf),
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Discard => write!(f, "idle sink"),
            TargetKind::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// State of an outstanding split request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitStatus {
    Pending,
    Complete,
    /// The encoder dropped the request without switching (it was stopped or failed).
    Abandoned,
}

/// Consumer half of a split request.
#[derive(Debug)]
pub struct SplitHandle {
    target: TargetKind,
    done: Receiver<()>,
    status: SplitStatus,
}

/// Encoder half of a split request. Dropping it without calling
/// [`complete`](Self::complete) abandons the request.
#[derive(Debug)]
pub struct SplitCompletion {
    done: Sender<()>,
}

impl SplitHandle {
    pub fn pair(target: TargetKind) -> (SplitCompletion, SplitHandle) {
        let (tx, rx) = mpsc::channel();
        (
            SplitCompletion { done: tx },
            SplitHandle {
                target,
                done: rx,
                status: SplitStatus::Pending,
            },
        )
    }

    pub fn target(&self) -> &TargetKind {
        &self.target
    }

    /// Non-blocking status check.
    pub fn poll(&mut self) -> SplitStatus {
        if self.status == SplitStatus::Pending {
            self.status = match self.done.try_recv() {
                Ok(()) => SplitStatus::Complete,
                Err(TryRecvError::Empty) => SplitStatus::Pending,
                Err(TryRecvError::Disconnected) => SplitStatus::Abandoned,
            };
        }
        self.status
    }

    /// Block up to `timeout` for the switch to land.
    pub fn wait_timeout(&mut self, timeout: Duration) -> SplitStatus {
        if self.status == SplitStatus::Pending {
            self.status = match self.done.recv_timeout(timeout) {
                Ok(()) => SplitStatus::Complete,
                Err(mpsc::RecvTimeoutError::Timeout) => SplitStatus::Pending,
                Err(mpsc::RecvTimeoutError::Disconnected) => SplitStatus::Abandoned,
            };
        }
        self.status
    }
}

impl SplitCompletion {
    pub fn complete(self) {
        // The requester may have moved on already.
        let _ = self.done.send(());
    }
}

/// Live camera encoder, as seen by the recording session.
///
/// Split requests are applied in the order they are made.
pub trait Encoder: Send {
    /// Ask the encoder to switch its output to `target` at the next sync point.
    fn split_recording(&mut self, target: OutputTarget) -> Result<SplitHandle>;

    /// Replace the overlay text.
    fn set_annotation(&mut self, text: &str) -> Result<()>;

    /// Stop encoding and release encoder resources. Must be safe to call twice.
    fn stop_recording(&mut self) -> Result<()>;

    /// Report a failure the encoder hit on its own since the last call, such
    /// as a write error on the recording file.
    fn check_health(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn split_recording(&mut self, target: OutputTarget) -> Result<SplitHandle> {
        (**self).split_recording(target)
    }

    fn set_annotation(&mut self, text: &str) -> Result<()> {
        (**self).set_annotation(text)
    }

    fn stop_recording(&mut self) -> Result<()> {
        (**self).stop_recording()
    }

    fn check_health(&mut self) -> Result<()> {
        (**self).check_health()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_handle_reports_completion() {
        let (completion, mut handle) = SplitHandle::pair(TargetKind::Discard);
        assert_eq!(handle.poll(), SplitStatus::Pending);
        completion.complete();
        assert_eq!(handle.poll(), SplitStatus::Complete);
        assert_eq!(handle.poll(), SplitStatus::Complete);
    }

    #[test]
    fn dropped_completion_abandons_split() {
        let (completion, mut handle) = SplitHandle::pair(TargetKind::File("a.h264".into()));
        drop(completion);
        assert_eq!(handle.poll(), SplitStatus::Abandoned);
    }

    #[test]
    fn wait_timeout_returns_pending_when_nothing_happens() {
        let (_completion, mut handle) = SplitHandle::pair(TargetKind::Discard);
        assert_eq!(
            handle.wait_timeout(Duration::from_millis(10)),
            SplitStatus::Pending
        );
    }

    #[test]
    fn exposure_follows_night_mode() {
        assert_eq!(ExposureMode::from_night_mode(true), ExposureMode::Night);
        assert_eq!(ExposureMode::from_night_mode(false), ExposureMode::Auto);
    }
}
