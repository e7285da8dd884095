pub mod backend;
pub mod capture;
pub mod microphone;
pub mod output;
pub mod queue;

pub use backend::{AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureConfig};
pub use capture::AudioCaptureSource;
pub use microphone::{MicrophoneBackend, MicrophoneFactory};
pub use output::{AudioOutput, SpeakerOutput};
pub use queue::{frame_queue, FrameMessage, FrameSink, FrameStream};
