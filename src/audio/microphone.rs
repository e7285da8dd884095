// Microphone capture via cpal
//
// cpal streams are not Send, so each capture owns its stream on a dedicated
// thread that parks until stop() is requested.

use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info, warn};

use super::backend::{CaptureBackend, CaptureBackendFactory, CaptureConfig};
use super::queue::FrameSink;
use crate::{Error, Result};

/// Default input device capture
#[derive(Default)]
pub struct MicrophoneBackend {
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MicrophoneBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureBackend for MicrophoneBackend {
    fn start(&mut self, config: &CaptureConfig, sink: FrameSink) -> Result<()> {
        if self.thread.is_some() {
            return Err(Error::AlreadyActive("microphone already capturing".to_string()));
        }

        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let config = config.clone();

        let thread = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || match open_input_stream(&config, sink) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Park until stop() or the backend is dropped
                    let _ = stop_rx.recv();
                    drop(stream);
                    debug!("Microphone stream released");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(Error::Device("capture thread exited during startup".to_string())),
        }
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Microphone capture thread panicked");
            }
            info!("Microphone capture stopped");
        }
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

impl Drop for MicrophoneBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_input_stream(config: &CaptureConfig, sink: FrameSink) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Device("no input device available".to_string()))?;

    if config.frame_samples == 0 || config.channels == 0 {
        return Err(Error::Device(
            "frame size and channel count must be non-zero".to_string(),
        ));
    }

    let stream_config = cpal::StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    // The driver picks its own buffer size; re-chunk into exact frames
    let frame_len = config.frame_samples * usize::from(config.channels);
    let mut pending: Vec<i16> = Vec::with_capacity(frame_len * 2);

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                pending.extend_from_slice(data);
                while pending.len() >= frame_len {
                    let rest = pending.split_off(frame_len);
                    let frame = std::mem::replace(&mut pending, rest);
                    sink.push_samples(&frame);
                }
            },
            |err| {
                error!("Audio capture error: {}", err);
            },
            None,
        )
        .map_err(|e| Error::Device(format!("cannot open input at requested format: {e}")))?;

    stream
        .play()
        .map_err(|e| Error::Device(format!("cannot start input stream: {e}")))?;

    info!(
        "Microphone opened: {} ({}Hz, {} channel(s))",
        device.name().unwrap_or_default(),
        config.sample_rate,
        config.channels
    );

    Ok(stream)
}

/// Hands out a new `MicrophoneBackend` per session
#[derive(Debug, Default)]
pub struct MicrophoneFactory;

impl CaptureBackendFactory for MicrophoneFactory {
    fn create(&self) -> Box<dyn CaptureBackend> {
        Box::new(MicrophoneBackend::new())
    }
}
