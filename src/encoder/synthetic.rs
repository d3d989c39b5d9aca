//! Synthetic encoder.
//!
//! Stands in for camera hardware: a background thread emits one motion vector
//! frame per encoded frame at the configured framerate, with a quiet scene
//! interrupted by periodic bursts of motion, and writes an Annex-B style byte
//! stream to the current output target.
//!
//! Output switches requested through [`Encoder::split_recording`] take effect
//! at the next key frame only, so every chunk written to a file starts with
//! parameter sets followed by an IDR frame.

use anyhow::{anyhow, bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::encoder::{CameraSettings, Encoder, OutputTarget, SplitCompletion, SplitHandle};
use crate::motion::{FrameGeometry, FrameMotionVectors, MotionVectorBlock};

const START_CODE: [u8; 4] = [0, 0, 0, 1];
const NAL_SPS: u8 = 0x67;
const NAL_PPS: u8 = 0x68;
const NAL_IDR: u8 = 0x65;
const NAL_SLICE: u8 = 0x41;

/// Configuration for a synthetic encoder.
#[derive(Clone, Debug)]
pub struct SyntheticEncoderConfig {
    pub camera: CameraSettings,
    /// Frames between key frames (sync points).
    pub key_frame_interval: u32,
    /// Frames from the start of one motion burst to the next.
    pub burst_period: u64,
    /// Frames of motion at the end of each period.
    pub burst_length: u64,
    /// Seed for the scene generator. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl SyntheticEncoderConfig {
    pub fn new(camera: CameraSettings, key_frame_interval: u32) -> Self {
        let fps = u64::from(camera.framerate.max(1));
        Self {
            camera,
            key_frame_interval,
            // ~40s cycle with ~6s of activity.
            burst_period: fps * 40,
            burst_length: fps * 6,
            seed: None,
        }
    }
}

/// Frame-by-frame scene and output state. Driven by the worker thread.
pub(crate) struct SyntheticCamera {
    config: SyntheticEncoderConfig,
    geometry: FrameGeometry,
    frame_count: u64,
    target: OutputTarget,
    pending: VecDeque<(OutputTarget, SplitCompletion)>,
    annotation: String,
    rng: StdRng,
}

impl SyntheticCamera {
    pub(crate) fn new(config: SyntheticEncoderConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            geometry: FrameGeometry::for_resolution(config.camera.resolution),
            config,
            frame_count: 0,
            target: OutputTarget::Discard,
            pending: VecDeque::new(),
            annotation: String::new(),
            rng,
        }
    }

    pub(crate) fn queue_split(&mut self, target: OutputTarget, completion: SplitCompletion) {
        self.pending.push_back((target, completion));
    }

    pub(crate) fn set_annotation(&mut self, text: String) {
        log::trace!("annotation: {}", text);
        self.annotation = text;
    }

    #[cfg(test)]
    pub(crate) fn annotation(&self) -> &str {
        &self.annotation
    }

    pub(crate) fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn is_key_frame(&self) -> bool {
        self.frame_count % u64::from(self.config.key_frame_interval.max(1)) == 0
    }

    fn in_burst(&self) -> bool {
        let period = self.config.burst_period.max(1);
        let length = self.config.burst_length.min(period);
        self.frame_count % period >= period - length
    }

    /// Encode one frame: apply due splits, write video, return motion vectors.
    pub(crate) fn next_frame(&mut self) -> Result<FrameMotionVectors> {
        let key_frame = self.is_key_frame();
        if key_frame {
            self.apply_pending_splits()?;
        }

        let busy = self.in_burst();
        let chunk = self.encode_chunk(key_frame, busy);
        if let OutputTarget::File(sink) = &mut self.target {
            sink.write_chunk(&chunk)?;
        }

        let vectors = self.motion_vectors(busy);
        self.frame_count += 1;
        Ok(vectors)
    }

    fn apply_pending_splits(&mut self) -> Result<()> {
        while let Some((target, completion)) = self.pending.pop_front() {
            let next = target.kind();
            let previous = std::mem::replace(&mut self.target, target);
            if let OutputTarget::File(sink) = previous {
                let path = sink.path().display().to_string();
                let written = sink.finish()?;
                log::debug!("released {} after {} bytes", path, written);
            }
            log::debug!(
                "output switched to {} at frame {} [{}]",
                next,
                self.frame_count,
                self.annotation
            );
            completion.complete();
        }
        Ok(())
    }

    fn encode_chunk(&mut self, key_frame: bool, busy: bool) -> Vec<u8> {
        let payload_len = if busy {
            self.rng.gen_range(512..2048)
        } else {
            self.rng.gen_range(32..128)
        };
        let mut chunk = Vec::with_capacity(payload_len + 32);
        if key_frame {
            chunk.extend_from_slice(&START_CODE);
            chunk.extend_from_slice(&[NAL_SPS, 0x64, 0x00, 0x28]);
            chunk.extend_from_slice(&START_CODE);
            chunk.extend_from_slice(&[NAL_PPS, 0xee, 0x3c, 0x80]);
            chunk.extend_from_slice(&START_CODE);
            chunk.push(NAL_IDR);
        } else {
            chunk.extend_from_slice(&START_CODE);
            chunk.push(NAL_SLICE);
        }
        let start = chunk.len();
        chunk.resize(start + payload_len, 0);
        // Keep payload bytes non-zero so no start code can appear inside it.
        for byte in &mut chunk[start..] {
            *byte = self.rng.gen_range(1..=255);
        }
        chunk
    }

    fn motion_vectors(&mut self, busy: bool) -> FrameMotionVectors {
        let blocks = (0..self.geometry.block_count())
            .map(|_| {
                if busy && self.rng.gen_bool(0.6) {
                    MotionVectorBlock::new(self.rng.gen_range(50..=100), self.rng.gen_range(-60..=60))
                } else {
                    MotionVectorBlock::new(self.rng.gen_range(-3..=3), self.rng.gen_range(-3..=3))
                }
            })
            .collect();
        FrameMotionVectors::new(blocks)
    }

    /// Flush the active file and drop outstanding requests.
    pub(crate) fn finish(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            log::debug!("dropping {} unapplied output switch(es)", self.pending.len());
            self.pending.clear();
        }
        if let OutputTarget::File(sink) = std::mem::replace(&mut self.target, OutputTarget::Discard) {
            sink.finish()?;
        }
        Ok(())
    }
}

enum Command {
    Split(OutputTarget, SplitCompletion),
    Annotate(String),
    Stop,
}

/// Threaded synthetic encoder.
pub struct SyntheticEncoder {
    commands: Sender<Command>,
    worker: Option<JoinHandle<Result<()>>>,
}

impl SyntheticEncoder {
    /// Start encoding to the idle sink. `motion_output` runs on the encoder
    /// thread once per frame.
    pub fn start<F>(config: SyntheticEncoderConfig, mut motion_output: F) -> Result<Self>
    where
        F: FnMut(&FrameMotionVectors) + Send + 'static,
    {
        if config.camera.framerate == 0 {
            return Err(anyhow!("synthetic encoder framerate must be >= 1"));
        }
        let frame_interval = Duration::from_secs(1) / config.camera.framerate;
        log::info!(
            "synthetic encoder: {} @ {} fps, exposure {:?}, key frame every {} frames",
            config.camera.resolution,
            config.camera.framerate,
            config.camera.exposure,
            config.key_frame_interval
        );

        let (tx, rx) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("synthetic-encoder".to_string())
            .spawn(move || {
                let mut camera = SyntheticCamera::new(config);
                let result = run_worker(&mut camera, &rx, frame_interval, &mut motion_output);
                let finished = camera.finish();
                log::debug!("synthetic encoder stopped after {} frames", camera.frame_count());
                result.and(finished)
            })?;

        Ok(Self {
            commands: tx,
            worker: Some(worker),
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("synthetic encoder is not running"))
    }
}

fn run_worker<F>(
    camera: &mut SyntheticCamera,
    commands: &Receiver<Command>,
    frame_interval: Duration,
    motion_output: &mut F,
) -> Result<()>
where
    F: FnMut(&FrameMotionVectors),
{
    loop {
        loop {
            match commands.try_recv() {
                Ok(Command::Split(target, completion)) => camera.queue_split(target, completion),
                Ok(Command::Annotate(text)) => camera.set_annotation(text),
                Ok(Command::Stop) | Err(TryRecvError::Disconnected) => return Ok(()),
                Err(TryRecvError::Empty) => break,
            }
        }
        let vectors = camera.next_frame()?;
        motion_output(&vectors);
        std::thread::sleep(frame_interval);
    }
}

impl Encoder for SyntheticEncoder {
    fn split_recording(&mut self, target: OutputTarget) -> Result<SplitHandle> {
        let (completion, handle) = SplitHandle::pair(target.kind());
        self.send(Command::Split(target, completion))?;
        Ok(handle)
    }

    fn set_annotation(&mut self, text: &str) -> Result<()> {
        self.send(Command::Annotate(text.to_string()))
    }

    fn stop_recording(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // The worker may already have exited on its own error.
        let _ = self.commands.send(Command::Stop);
        worker
            .join()
            .map_err(|_| anyhow!("synthetic encoder thread panicked"))?
    }

    fn check_health(&mut self) -> Result<()> {
        if !self.worker.as_ref().is_some_and(JoinHandle::is_finished) {
            return Ok(());
        }
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker
            .join()
            .map_err(|_| anyhow!("synthetic encoder thread panicked"))?
            .context("synthetic encoder stopped")?;
        bail!("synthetic encoder exited unexpectedly")
    }
}

impl Drop for SyntheticEncoder {
    fn drop(&mut self) {
        if let Err(e) = self.stop_recording() {
            log::error!("synthetic encoder stop failed: {}", e);
        }
    }
}
