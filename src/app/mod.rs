mod event_handler;
mod mode;
mod pipeline;
mod state;
mod voice;

pub use mode::{ModeController, ModeFlags};
pub use state::{
    Collaborators, Notice, NoticeLevel, Phase, SessionEvent, SessionSettings, SpeechEvent,
    SurfaceUpdate, Ticket,
};

use state::SessionState;

use crate::session::SessionConfig;
use crate::transcript::Transcript;

/// One interview session: the turn orchestrator plus its event queue.
///
/// Must be started and driven from inside a tokio runtime; generation calls
/// and pacing timers are spawned onto it.
pub struct Session {
    state: SessionState,
    events: async_channel::Receiver<SessionEvent>,
}

/// Sends input-surface commands to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: async_channel::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Returns false once the session is gone.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }

    pub fn submit(&self, answer: impl Into<String>) -> bool {
        self.send(SessionEvent::Submit(answer.into()))
    }

    pub fn toggle_voice_mode(&self) -> bool {
        self.send(SessionEvent::ToggleVoiceMode)
    }

    pub fn set_voice_mode(&self, enabled: bool) -> bool {
        self.send(SessionEvent::SetVoiceMode(enabled))
    }

    pub fn start_listening(&self) -> bool {
        self.send(SessionEvent::StartListening)
    }

    pub fn stop_listening(&self) -> bool {
        self.send(SessionEvent::StopListening)
    }

    pub fn retry(&self) -> bool {
        self.send(SessionEvent::Retry)
    }

    pub fn reset(&self) -> bool {
        self.send(SessionEvent::Reset)
    }

    pub fn shutdown(&self) -> bool {
        self.send(SessionEvent::Shutdown)
    }
}

impl Session {
    pub fn new(
        config: SessionConfig,
        settings: SessionSettings,
        collaborators: Collaborators,
    ) -> (Self, SessionHandle, async_channel::Receiver<SurfaceUpdate>) {
        let (event_tx, event_rx) = async_channel::unbounded::<SessionEvent>();
        let (surface_tx, surface_rx) = async_channel::unbounded::<SurfaceUpdate>();

        let state = SessionState::new(config, settings, collaborators, event_tx.clone(), surface_tx);
        let session = Self {
            state,
            events: event_rx,
        };
        (session, SessionHandle { sender: event_tx }, surface_rx)
    }

    /// Post the welcome message and schedule the first question.
    pub fn start(&mut self) {
        event_handler::start_session(&mut self.state);
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        event_handler::handle_event(&mut self.state, event);
    }

    /// Wait for and process one event. Returns false once the session has
    /// shut down.
    pub async fn step(&mut self) -> bool {
        if self.state.closed {
            return false;
        }
        match self.events.recv().await {
            Ok(event) => self.handle_event(event),
            Err(_) => event_handler::shutdown(&mut self.state),
        }
        !self.state.closed
    }

    /// Process one already-queued event, if any.
    pub fn try_step(&mut self) -> bool {
        match self.events.try_recv() {
            Ok(event) => {
                self.handle_event(event);
                true
            }
            Err(_) => false,
        }
    }

    /// Start, then process events until shutdown.
    pub async fn run(mut self) {
        self.start();
        while self.step().await {}
        log::info!("Session ended");
    }

    pub fn config(&self) -> SessionConfig {
        self.state.config
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn flags(&self) -> ModeFlags {
        self.state.mode.flags()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.state.transcript
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        event_handler::shutdown(&mut self.state);
    }
}
