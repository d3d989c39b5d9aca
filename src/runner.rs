//! Main control loop.
//!
//! Waits between session ticks and reacts to shutdown. The wait is a channel
//! receive with a timeout, so a shutdown request ends it immediately instead
//! of after the full poll interval.

use anyhow::{anyhow, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::encoder::Encoder;
use crate::session::{RecordingSession, TickOutcome};

/// Receiving end of shutdown requests.
pub struct ShutdownSignal {
    rx: Receiver<()>,
    requested: bool,
}

/// Sending end of shutdown requests. Cloneable; duplicate requests are harmless.
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: Sender<()>,
}

impl ShutdownTrigger {
    pub fn request(&self) {
        // The loop may already be gone.
        let _ = self.tx.send(());
    }
}

impl ShutdownSignal {
    /// Signal pair with no OS hook.
    pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
        let (tx, rx) = mpsc::channel();
        (
            ShutdownTrigger { tx },
            ShutdownSignal {
                rx,
                requested: false,
            },
        )
    }

    /// Signal fed by Ctrl-C / SIGTERM.
    pub fn install() -> Result<ShutdownSignal> {
        let (trigger, signal) = Self::channel();
        ctrlc::set_handler(move || trigger.request())
            .map_err(|e| anyhow!("failed to install signal handler: {}", e))?;
        Ok(signal)
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Wait up to `interval`. Returns true once shutdown has been requested.
    pub fn wait(&mut self, interval: Duration) -> bool {
        if self.requested {
            return true;
        }
        match self.rx.recv_timeout(interval) {
            Ok(()) => self.requested = true,
            Err(RecvTimeoutError::Timeout) => {}
            // Every trigger is gone; nothing can ask us to stop any more.
            Err(RecvTimeoutError::Disconnected) => std::thread::sleep(interval),
        }
        self.requested
    }
}

/// Drive `session` until shutdown is requested or a tick fails.
///
/// The session's shutdown transition runs exactly once on every exit path,
/// and before any tick error is returned.
pub fn run_monitor<E: Encoder>(
    session: &mut RecordingSession<E>,
    shutdown: &mut ShutdownSignal,
) -> Result<()> {
    loop {
        if shutdown.wait(session.poll_interval()) {
            log::debug!("shutdown requested");
            break;
        }
        match session.tick() {
            Ok(TickOutcome::Stopped) => break,
            Ok(_) => {}
            Err(e) => {
                if let Err(stop_err) = session.shutdown() {
                    log::error!("encoder stop failed during error shutdown: {:#}", stop_err);
                }
                return Err(e);
            }
        }
    }
    session.shutdown()
}
