use std::sync::Arc;

use tokio::task::JoinHandle;

use super::mode::{ModeController, ModeFlags};
use crate::config::PacingConfig;
use crate::error::{CaptureFailure, GenerationFailure, PlaybackFailure};
use crate::generator::ContentGenerator;
use crate::session::SessionConfig;
use crate::speech::{CaptureHandle, PlaybackHandle, SpeechCapture, SpeechPlayback};
use crate::transcript::{Message, Transcript};

/// Identifies one asynchronous operation. Completions carrying any other
/// ticket than the active one are stale and get dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

impl Ticket {
    #[cfg(test)]
    pub(crate) fn for_test(id: u64) -> Self {
        Self(id)
    }
}

/// Completion signals from the speech ports.
#[derive(Debug, Clone)]
pub enum SpeechEvent {
    CaptureFinished {
        ticket: Ticket,
        result: Result<String, CaptureFailure>,
    },
    PlaybackStarted {
        ticket: Ticket,
    },
    PlaybackFinished {
        ticket: Ticket,
    },
    PlaybackFailed {
        ticket: Ticket,
        error: PlaybackFailure,
    },
}

/// Everything that drives the orchestrator, processed one at a time.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    // Input surface
    Submit(String),
    SetVoiceMode(bool),
    ToggleVoiceMode,
    StartListening,
    StopListening,
    Retry,
    Reset,
    Shutdown,

    // Completions
    QuestionGenerated {
        ticket: Ticket,
        result: Result<String, GenerationFailure>,
    },
    FeedbackGenerated {
        ticket: Ticket,
        result: Result<String, GenerationFailure>,
    },
    PacingElapsed {
        ticket: Ticket,
    },
    Speech(SpeechEvent),
}

/// Turn phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    QuestionPending,
    AwaitingAnswer,
    FeedbackPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient message for the candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// What the input surface needs to render.
#[derive(Debug, Clone)]
pub enum SurfaceUpdate {
    MessageAppended(Message),
    /// The transcript was discarded by a reset.
    TranscriptCleared,
    PhaseChanged(Phase),
    FlagsChanged(ModeFlags),
    Notice(Notice),
}

/// Collaborators injected at session construction.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn ContentGenerator>,
    pub capture: Arc<dyn SpeechCapture>,
    pub playback: Arc<dyn SpeechPlayback>,
}

/// Session-wide knobs that don't belong to the role/level pair.
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub voice_mode: bool,
    pub pacing: PacingConfig,
    pub generation_timeout: Option<std::time::Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Question,
    Feedback,
}

/// An outstanding spawned task (generation call or pacing timer).
pub struct InFlight {
    pub ticket: Ticket,
    pub task: JoinHandle<()>,
}

pub struct ActiveCapture {
    pub ticket: Ticket,
    pub handle: Box<dyn CaptureHandle>,
}

pub struct ActivePlayback {
    pub ticket: Ticket,
    pub handle: Box<dyn PlaybackHandle>,
}

/// Central session state. Owned by one `Session`; never shared.
pub struct SessionState {
    pub config: SessionConfig,
    pub settings: SessionSettings,
    pub phase: Phase,
    pub mode: ModeController,
    pub transcript: Transcript,
    pub collaborators: Collaborators,

    pub event_sender: async_channel::Sender<SessionEvent>,
    pub surface_sender: async_channel::Sender<SurfaceUpdate>,

    // In-flight operations, at most one of each
    pub generation: Option<(GenerationKind, InFlight)>,
    pub pacing: Option<InFlight>,
    pub capture: Option<ActiveCapture>,
    pub playback: Option<ActivePlayback>,

    /// The question the candidate is currently answering.
    pub current_question: Option<String>,
    /// A submission whose feedback hasn't been delivered yet.
    pub pending_answer: Option<String>,
    /// The next question is held until narration ends.
    pub question_after_playback: bool,
    pub closed: bool,

    next_ticket: u64,
}

impl SessionState {
    pub fn new(
        config: SessionConfig,
        settings: SessionSettings,
        collaborators: Collaborators,
        event_sender: async_channel::Sender<SessionEvent>,
        surface_sender: async_channel::Sender<SurfaceUpdate>,
    ) -> Self {
        let mode = ModeController::new(settings.voice_mode);
        Self {
            config,
            settings,
            phase: Phase::Starting,
            mode,
            transcript: Transcript::new(),
            collaborators,
            event_sender,
            surface_sender,
            generation: None,
            pacing: None,
            capture: None,
            playback: None,
            current_question: None,
            pending_answer: None,
            question_after_playback: false,
            closed: false,
            next_ticket: 0,
        }
    }

    pub fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    pub fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            log::info!("Phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
            self.publish(SurfaceUpdate::PhaseChanged(phase));
        }
    }

    /// Append synchronously, then tell the surface.
    pub fn append(&mut self, message: Message) {
        self.transcript.append(message.clone());
        self.publish(SurfaceUpdate::MessageAppended(message));
    }

    pub fn publish_flags(&self) {
        self.publish(SurfaceUpdate::FlagsChanged(self.mode.flags()));
    }

    pub fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        self.publish(SurfaceUpdate::Notice(Notice {
            level,
            text: text.into(),
        }));
    }

    pub fn publish(&self, update: SurfaceUpdate) {
        if self.surface_sender.try_send(update).is_err() {
            log::debug!("Surface receiver gone; dropping update");
        }
    }

    pub fn generation_ticket(&self, kind: GenerationKind) -> Option<Ticket> {
        match &self.generation {
            Some((k, inflight)) if *k == kind => Some(inflight.ticket),
            _ => None,
        }
    }
}
