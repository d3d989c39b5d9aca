#![allow(dead_code)]

use anyhow::{bail, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use motion_recorder::{Encoder, OutputTarget, SplitCompletion, SplitHandle, TargetKind};

/// Scripted encoder. Splits stay pending until the test applies them.
pub struct FakeEncoder {
    state: Arc<Mutex<FakeState>>,
}

/// Test-side view of a [`FakeEncoder`] that outlives the session.
#[derive(Clone)]
pub struct FakeControl {
    state: Arc<Mutex<FakeState>>,
}

pub struct FakeState {
    pub requested: Vec<TargetKind>,
    pub current: TargetKind,
    pub annotations: Vec<String>,
    pub stop_calls: usize,
    pub fail_splits: bool,
    pub fail_annotations: bool,
    /// Reported by `check_health`, as if the encoder died on its own.
    pub failure: Option<String>,
    pub auto_apply: bool,
    active: OutputTarget,
    pending: VecDeque<(OutputTarget, SplitCompletion)>,
}

pub fn fake_encoder() -> (FakeEncoder, FakeControl) {
    let state = Arc::new(Mutex::new(FakeState {
        requested: Vec::new(),
        current: TargetKind::Discard,
        annotations: Vec::new(),
        stop_calls: 0,
        fail_splits: false,
        fail_annotations: false,
        failure: None,
        auto_apply: false,
        active: OutputTarget::Discard,
        pending: VecDeque::new(),
    }));
    (
        FakeEncoder {
            state: Arc::clone(&state),
        },
        FakeControl { state },
    )
}

impl FakeControl {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Reach a key frame: apply every queued split in order.
    pub fn key_frame(&self) {
        let mut state = self.state();
        while let Some((target, completion)) = state.pending.pop_front() {
            state.apply(target);
            completion.complete();
        }
    }

    /// Encode one frame to whatever target is active.
    pub fn encode(&self, bytes: &[u8]) {
        let mut state = self.state();
        if let OutputTarget::File(sink) = &mut state.active {
            sink.write_chunk(bytes).unwrap();
        }
    }

    /// Drop every queued split without applying it, as an encoder that
    /// failed while releasing the old target would.
    pub fn abandon_pending(&self) {
        self.state().pending.clear();
    }

    pub fn pending_splits(&self) -> usize {
        self.state().pending.len()
    }
}

impl FakeState {
    fn apply(&mut self, target: OutputTarget) {
        self.current = target.kind();
        if let OutputTarget::File(sink) = std::mem::replace(&mut self.active, target) {
            sink.finish().unwrap();
        }
    }
}

impl Encoder for FakeEncoder {
    fn split_recording(&mut self, target: OutputTarget) -> Result<SplitHandle> {
        let mut state = self.state.lock().unwrap();
        if state.fail_splits {
            bail!("split refused");
        }
        state.requested.push(target.kind());
        let (completion, handle) = SplitHandle::pair(target.kind());
        if state.auto_apply {
            state.apply(target);
            completion.complete();
        } else {
            state.pending.push_back((target, completion));
        }
        Ok(handle)
    }

    fn set_annotation(&mut self, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_annotations {
            bail!("annotation refused");
        }
        state.annotations.push(text.to_string());
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.stop_calls += 1;
        state.pending.clear();
        state.apply(OutputTarget::Discard);
        Ok(())
    }

    fn check_health(&mut self) -> Result<()> {
        match &self.state.lock().unwrap().failure {
            Some(reason) => bail!("{}", reason),
            None => Ok(()),
        }
    }
}
