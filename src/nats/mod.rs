pub mod client;
pub mod messages;
pub mod speech;

pub use client::{NatsConnector, NatsLink};
pub use messages::{AudioFrameMessage, SynthesisReplyMessage, SynthesisRequestMessage, TranscriptMessage};
pub use speech::{connect_speech_client, NatsRecognizer, NatsSynthesizer};
