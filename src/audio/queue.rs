//! Single-producer / single-consumer frame queue with an end-of-stream marker

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::Stream;
use tokio::sync::mpsc;

use super::backend::AudioFrame;

/// Item carried by the frame queue
#[derive(Debug)]
pub enum FrameMessage {
    Frame(AudioFrame),
    EndOfStream,
}

/// Create a connected sink/stream pair
pub fn frame_queue(sample_rate: u32, channels: u16) -> (FrameSink, FrameStream) {
    let (tx, rx) = mpsc::unbounded_channel();

    let sink = FrameSink {
        tx,
        sequence: Arc::new(AtomicU64::new(0)),
        sample_rate,
        channels,
        opened_at: Instant::now(),
    };

    (sink, FrameStream { rx, finished: false })
}

/// Producer half; cheap to clone into a device callback
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::UnboundedSender<FrameMessage>,
    sequence: Arc<AtomicU64>,
    sample_rate: u32,
    channels: u16,
    opened_at: Instant,
}

impl FrameSink {
    /// Wrap raw PCM bytes in a frame and enqueue it without blocking
    ///
    /// Returns false once the consumer is gone.
    pub fn push_pcm(&self, pcm: Vec<u8>) -> bool {
        let frame = AudioFrame {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            pcm,
            sample_rate: self.sample_rate,
            channels: self.channels,
            timestamp_ms: self.opened_at.elapsed().as_millis() as u64,
        };

        self.tx.send(FrameMessage::Frame(frame)).is_ok()
    }

    /// Push i16 samples as little-endian PCM
    pub fn push_samples(&self, samples: &[i16]) -> bool {
        let pcm = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.push_pcm(pcm)
    }

    /// Inject the end-of-stream marker
    pub fn end_of_stream(&self) {
        let _ = self.tx.send(FrameMessage::EndOfStream);
    }

    /// Frames pushed so far
    pub fn pushed(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

/// Consumer half: frames in capture order, ending at the first end-of-stream marker
#[derive(Debug)]
pub struct FrameStream {
    rx: mpsc::UnboundedReceiver<FrameMessage>,
    finished: bool,
}

impl FrameStream {
    /// Wait for the next frame; `None` after end-of-stream
    pub async fn next_frame(&mut self) -> Option<AudioFrame> {
        if self.finished {
            return None;
        }

        match self.rx.recv().await {
            Some(FrameMessage::Frame(frame)) => Some(frame),
            Some(FrameMessage::EndOfStream) | None => {
                self.finish();
                None
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.rx.close();
    }
}

impl Stream for FrameStream {
    type Item = AudioFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<AudioFrame>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(FrameMessage::Frame(frame))) => Poll::Ready(Some(frame)),
            Poll::Ready(Some(FrameMessage::EndOfStream)) | Poll::Ready(None) => {
                self.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
