// Speaker output via rodio
//
// The rodio OutputStream must stay on the thread that created it; the
// Send-able OutputStreamHandle is what playback uses.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Device that plays encoded audio and can be interrupted
pub trait AudioOutput: Send + Sync {
    /// Start playing `audio` (MP3/WAV bytes), replacing anything already playing
    ///
    /// Returns once playback has started.
    fn play(&self, audio: Vec<u8>) -> Result<()>;

    /// Whether audio is currently audible
    fn is_playing(&self) -> bool;

    /// Halt playback immediately
    fn stop(&self);

    /// Release the device; safe to call repeatedly
    fn close(&self);
}

/// Default output device
pub struct SpeakerOutput {
    handle: OutputStreamHandle,
    sink: Mutex<Option<Sink>>,
    shutdown_tx: Mutex<Option<std_mpsc::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl SpeakerOutput {
    /// Open the default output device
    pub fn open() -> Result<Self> {
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("speaker-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = ready_tx.send(Ok(handle));
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    debug!("Output stream released");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(Error::Device(format!(
                        "no usable output device: {e}"
                    ))));
                }
            })?;

        let handle = match ready_rx.recv() {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                return Err(Error::Device(
                    "output thread exited during startup".to_string(),
                ))
            }
        };

        info!("Speaker output ready");

        Ok(Self {
            handle,
            sink: Mutex::new(None),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            thread: Mutex::new(Some(thread)),
            closed: AtomicBool::new(false),
        })
    }
}

impl AudioOutput for SpeakerOutput {
    fn play(&self, audio: Vec<u8>) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Device("output device closed".to_string()));
        }

        let source = Decoder::new(Cursor::new(audio))
            .map_err(|e| Error::Device(format!("cannot decode synthesized audio: {e}")))?;
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| Error::Device(format!("cannot start playback: {e}")))?;
        sink.append(source);

        let previous = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(sink);
        if let Some(previous) = previous {
            previous.stop();
        }

        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|sink| !sink.empty())
    }

    fn stop(&self) {
        if let Some(sink) = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            sink.stop();
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.stop();
        if let Some(tx) = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = tx.send(());
        }
        if let Some(thread) = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            if thread.join().is_err() {
                warn!("Output thread panicked");
            }
        }

        info!("Speaker output closed");
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        self.close();
    }
}
