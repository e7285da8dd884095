use super::queue::FrameSink;
use crate::Result;

/// One fixed-size block of captured audio (16-bit PCM, little-endian, interleaved)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Monotonically increasing per capture session, starting at 0
    pub sequence: u64,
    /// Raw PCM bytes
    pub pcm: Vec<u8>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Milliseconds since the capture source was opened
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Number of i16 samples carried by this frame
    pub fn sample_count(&self) -> usize {
        self.pcm.len() / 2
    }
}

/// Capture format requested from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count (1 = mono)
    pub channels: u16,
    /// Samples per delivered frame
    pub frame_samples: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // Speech recognisers expect 16kHz
            channels: 1,        // Mono
            frame_samples: 1024,
        }
    }
}

/// Hardware side of a capture session
///
/// Implementations push PCM into the sink from their own callback context.
/// `FrameSink::push_pcm` never blocks, so it is safe to call from an audio
/// driver thread.
pub trait CaptureBackend: Send {
    /// Open the device and begin delivering audio into `sink`
    ///
    /// Must fail with `Error::Device` if the requested format is unavailable.
    fn start(&mut self, config: &CaptureConfig, sink: FrameSink) -> Result<()>;

    /// Stop delivering audio and release the device
    fn stop(&mut self);

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Creates a fresh capture backend for every push-to-talk session
pub trait CaptureBackendFactory: Send + Sync {
    fn create(&self) -> Box<dyn CaptureBackend>;
}
