//! Speech capture and playback ports.
//!
//! Each operation is started with a [`Ticket`] and reports back through a
//! [`SpeechSink`]: capture emits exactly one `CaptureFinished`, playback emits
//! `PlaybackStarted` followed by either `PlaybackFinished` or `PlaybackFailed`.
//! Cancelling a handle stops the operation and suppresses its pending event.

pub mod capture;
pub mod cues;
pub mod recorder;
pub mod speaker;
pub mod transcriber;

use crate::app::{SessionEvent, SpeechEvent, Ticket};
use crate::error::{CaptureFailure, PlaybackFailure};

pub use capture::WhisperCapture;
pub use speaker::CommandSpeaker;

/// Where ports deliver their completion signals.
#[derive(Debug, Clone)]
pub struct SpeechSink {
    sender: async_channel::Sender<SessionEvent>,
}

impl SpeechSink {
    pub fn new(sender: async_channel::Sender<SessionEvent>) -> Self {
        Self { sender }
    }

    /// Usable from audio threads as well as async tasks.
    pub fn emit(&self, event: SpeechEvent) {
        if self.sender.try_send(SessionEvent::Speech(event)).is_err() {
            log::debug!("Session closed; dropping speech event");
        }
    }
}

/// Converts one spoken utterance into finalized text.
pub trait SpeechCapture: Send + Sync {
    fn start(&self, ticket: Ticket, sink: SpeechSink) -> Result<Box<dyn CaptureHandle>, CaptureFailure>;
}

pub trait CaptureHandle: Send {
    /// Stop listening now and finalize whatever was heard.
    fn stop(&mut self);
    /// Abort; no result will be delivered.
    fn cancel(&mut self);
}

/// Renders text as audio.
pub trait SpeechPlayback: Send + Sync {
    fn speak(
        &self,
        text: &str,
        ticket: Ticket,
        sink: SpeechSink,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackFailure>;
}

pub trait PlaybackHandle: Send {
    /// Stop audio immediately; the end event is suppressed.
    fn cancel(&mut self);
}
