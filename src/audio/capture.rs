use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use super::backend::{CaptureBackend, CaptureConfig};
use super::queue::{frame_queue, FrameSink, FrameStream};
use crate::{Error, Result};

/// One push-to-talk capture: a device turned into a lossless, ordered frame stream
///
/// Single use. Once closed, a new source is needed for the next session.
pub struct AudioCaptureSource {
    config: CaptureConfig,
    backend: Mutex<Box<dyn CaptureBackend>>,
    sink: FrameSink,
    stream: Mutex<Option<FrameStream>>,
    opened: AtomicBool,
    closed: AtomicBool,
}

impl AudioCaptureSource {
    pub fn new(backend: Box<dyn CaptureBackend>, config: CaptureConfig) -> Self {
        let (sink, stream) = frame_queue(config.sample_rate, config.channels);

        Self {
            config,
            backend: Mutex::new(backend),
            sink,
            stream: Mutex::new(Some(stream)),
            opened: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Open the device at the configured format
    pub fn open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Device("capture source already closed".to_string()));
        }
        if self.opened.swap(true, Ordering::SeqCst) {
            return Err(Error::Device("capture source already opened".to_string()));
        }

        let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = backend.start(&self.config, self.sink.clone()) {
            self.closed.store(true, Ordering::SeqCst);
            self.sink.end_of_stream();
            return Err(e);
        }

        info!(
            "Capture opened on {} ({}Hz, {} channel(s), {} samples/frame)",
            backend.name(),
            self.config.sample_rate,
            self.config.channels,
            self.config.frame_samples
        );

        Ok(())
    }

    /// Take the frame stream; only the first call returns it
    pub fn frames(&self) -> Option<FrameStream> {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Stop the device and unblock the consumer
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.opened.load(Ordering::SeqCst) {
            let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
            backend.stop();
        }
        self.sink.end_of_stream();

        debug!("Capture closed after {} frames", self.sink.pushed());
    }

    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for AudioCaptureSource {
    fn drop(&mut self) {
        self.close();
    }
}
