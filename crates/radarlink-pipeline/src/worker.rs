use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use radarlink_frame::{decode_frame, RawFrame};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::event::ModuleEvent;
use crate::handoff::HandoffBuffer;
use crate::pairing::{PairedEvent, PairerStats, TrackPairer};

/// Longest the worker sleeps on an empty buffer before rechecking cancellation.
const DEFAULT_WAIT: Duration = Duration::from_millis(50);

/// Decodes raw frames from the handoff buffer, pairs them, and publishes
/// the results.
///
/// Pairing state is owned by the worker thread alone.
pub struct DecodeWorker {
    buffer: Arc<HandoffBuffer>,
    events: Sender<ModuleEvent>,
    cancel: Arc<AtomicBool>,
    pairer: TrackPairer,
    wait: Duration,
}

impl DecodeWorker {
    pub fn new(
        buffer: Arc<HandoffBuffer>,
        events: Sender<ModuleEvent>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            buffer,
            events,
            cancel,
            pairer: TrackPairer::new(),
            wait: DEFAULT_WAIT,
        }
    }

    /// Override how long each wait on the buffer may last.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Decode and pair one raw frame.
    pub fn process(&mut self, raw: RawFrame) -> Option<PairedEvent> {
        self.pairer.accept(decode_frame(&raw.payload, &raw.header))
    }

    /// Run until cancelled, the buffer is closed, or the event receiver is gone.
    pub fn run(mut self) -> PairerStats {
        loop {
            let next = self.buffer.wait_pop(self.wait);
            if self.cancel.load(Ordering::Acquire) {
                break;
            }

            match next {
                Some(raw) => {
                    if let Some(event) = self.process(raw) {
                        if self.events.send(ModuleEvent::Frame(event)).is_err() {
                            debug!("event receiver dropped, decode worker exiting");
                            break;
                        }
                    }
                }
                None if self.buffer.is_closed() => break,
                None => {}
            }
        }

        let stats = self.pairer.stats();
        debug!(
            emitted = stats.emitted,
            discarded = stats.discarded,
            decode_failures = stats.decode_failures,
            "decode worker stopped"
        );
        stats
    }

    /// Run on a dedicated named thread.
    pub fn spawn(self) -> Result<JoinHandle<PairerStats>> {
        thread::Builder::new()
            .name("radarlink-decode".to_string())
            .spawn(move || self.run())
            .map_err(|source| PipelineError::Spawn {
                name: "decode",
                source,
            })
    }
}
