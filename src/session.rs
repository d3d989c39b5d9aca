//! Recording session state machine.
//!
//! The session is ticked by the control loop. While idle it polls once a
//! second; while recording it ticks twice a second (one "sub-tick" each).
//! It owns the encoder handle and is the only consumer of the motion flag.
//!
//! ```text
//!  Idle --flag--> Recording(0) --sub-tick--> Recording(n+1)
//!                   ^    |
//!                   |    | n+1 == window and flag: continue, back to 0
//!                   +----+
//!                        | n+1 == window and no flag: Idle
//! ```
//!
//! Returning to idle never closes the output for good: the next run opens the
//! same file in append mode.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::encoder::{Encoder, OutputTarget, SplitHandle, SplitStatus, TargetKind};
use crate::logging;
use crate::motion::MotionFlag;
use crate::sink::RecordingSink;

/// Poll interval while idle.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Recording sub-ticks per second of minimum recording time.
pub const SUB_TICKS_PER_SECOND: u32 = 2;
/// Interval between recording sub-ticks.
pub const SUB_TICK_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub minimum_record_seconds: u32,
    pub output_path: PathBuf,
}

impl SessionConfig {
    /// Sub-ticks in one minimum-duration window.
    pub fn window_sub_ticks(&self) -> u32 {
        self.minimum_record_seconds.saturating_mul(SUB_TICKS_PER_SECOND)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionMode {
    Idle,
    Recording {
        /// Sub-ticks elapsed in the current window.
        elapsed_sub_ticks: u32,
    },
}

/// What a single tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Idle and no motion seen.
    Idle,
    /// Motion seen while idle; output redirected to the file.
    Started,
    /// Recording, window not yet complete.
    Recording,
    /// Window complete with further motion; a new window began.
    Extended,
    /// Window complete without motion; back to idle.
    Finished,
    /// The session has been shut down.
    Stopped,
}

pub struct RecordingSession<E: Encoder> {
    config: SessionConfig,
    flag: Arc<MotionFlag>,
    encoder: E,
    mode: SessionMode,
    pending_split: Option<SplitHandle>,
    runs: u64,
    stopped: bool,
}

impl<E: Encoder> RecordingSession<E> {
    /// New session in `Idle`. The encoder is expected to be writing to the idle sink.
    pub fn new(config: SessionConfig, flag: Arc<MotionFlag>, encoder: E) -> Self {
        Self {
            config,
            flag,
            encoder,
            mode: SessionMode::Idle,
            pending_split: None,
            runs: 0,
            stopped: false,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.mode, SessionMode::Recording { .. })
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Number of recording runs started so far.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Target of the most recent output switch that has not landed yet.
    pub fn pending_split(&self) -> Option<&TargetKind> {
        self.pending_split.as_ref().map(SplitHandle::target)
    }

    /// How long the control loop should wait before the next tick.
    pub fn poll_interval(&self) -> Duration {
        match self.mode {
            SessionMode::Idle => IDLE_POLL_INTERVAL,
            SessionMode::Recording { .. } => SUB_TICK_INTERVAL,
        }
    }

    /// Advance the state machine by one tick.
    ///
    /// An error leaves the session in a consistent mode; the caller is
    /// expected to run [`shutdown`](Self::shutdown) before giving up. An
    /// encoder that failed on its own, or dropped an output switch, is an
    /// error in either mode.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.stopped {
            return Ok(TickOutcome::Stopped);
        }
        self.encoder.check_health()?;
        self.poll_split()?;

        match self.mode {
            SessionMode::Idle => {
                if self.flag.take() {
                    self.start_recording()?;
                    Ok(TickOutcome::Started)
                } else {
                    Ok(TickOutcome::Idle)
                }
            }
            SessionMode::Recording { elapsed_sub_ticks } => {
                self.encoder.set_annotation(&logging::annotation_timestamp())?;
                let elapsed_sub_ticks = elapsed_sub_ticks + 1;
                if elapsed_sub_ticks < self.config.window_sub_ticks() {
                    self.mode = SessionMode::Recording { elapsed_sub_ticks };
                    return Ok(TickOutcome::Recording);
                }

                if self.flag.take() {
                    log::info!("further motion detected; continuing recording");
                    self.mode = SessionMode::Recording {
                        elapsed_sub_ticks: 0,
                    };
                    Ok(TickOutcome::Extended)
                } else {
                    self.finish_recording()?;
                    Ok(TickOutcome::Finished)
                }
            }
        }
    }

    fn start_recording(&mut self) -> Result<()> {
        log::info!(
            "recording next {} seconds to {}",
            self.config.minimum_record_seconds,
            self.config.output_path.display()
        );
        let sink = RecordingSink::open_append(&self.config.output_path)?;
        let handle = self
            .encoder
            .split_recording(OutputTarget::File(sink))
            .context("redirect encoder output to recording file")?;
        self.track_split(handle);
        self.mode = SessionMode::Recording {
            elapsed_sub_ticks: 0,
        };
        self.runs += 1;
        self.encoder.set_annotation(&logging::annotation_timestamp())?;
        Ok(())
    }

    fn finish_recording(&mut self) -> Result<()> {
        log::info!("finished recording; continue monitoring");
        self.mode = SessionMode::Idle;
        let handle = self
            .encoder
            .split_recording(OutputTarget::Discard)
            .context("redirect encoder output to idle sink")?;
        self.track_split(handle);
        self.encoder
            .set_annotation(&format!("{} (going idle)", logging::annotation_timestamp()))?;
        Ok(())
    }

    fn track_split(&mut self, handle: SplitHandle) {
        if let Some(previous) = self.pending_split.replace(handle) {
            log::debug!(
                "output switch to {} still pending when a new one was requested",
                previous.target()
            );
        }
    }

    fn poll_split(&mut self) -> Result<()> {
        let Some(handle) = self.pending_split.as_mut() else {
            return Ok(());
        };
        match handle.poll() {
            SplitStatus::Pending => Ok(()),
            SplitStatus::Complete => {
                log::debug!("encoder output now goes to {}", handle.target());
                self.pending_split = None;
                Ok(())
            }
            SplitStatus::Abandoned => {
                let target = handle.target().clone();
                self.pending_split = None;
                bail!("encoder dropped output switch to {}", target)
            }
        }
    }

    /// Stop the encoder and return to idle. Runs at most once; later calls are no-ops.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        if self.is_recording() {
            log::debug!("shutting down while recording");
        }
        self.mode = SessionMode::Idle;
        self.pending_split = None;
        let result = self.encoder.stop_recording();
        log::info!("stopping; output in {}", self.config.output_path.display());
        result
    }
}

impl<E: Encoder> Drop for RecordingSession<E> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("recording session shutdown failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_counts_two_sub_ticks_per_second() {
        let config = SessionConfig {
            minimum_record_seconds: 10,
            output_path: PathBuf::from("capture.h264"),
        };
        assert_eq!(config.window_sub_ticks(), 20);
        assert_eq!(SUB_TICK_INTERVAL * SUB_TICKS_PER_SECOND, Duration::from_secs(1));
        assert_eq!(IDLE_POLL_INTERVAL, SUB_TICK_INTERVAL * 2);
    }
}
