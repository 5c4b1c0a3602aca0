//! Technical interview practice: an LLM interviewer asks questions and gives
//! feedback, the candidate answers by typing or speaking.
//!
//! [`app::Session`] is the turn orchestrator. It sequences question
//! generation, answer capture, feedback and narration over three injected
//! collaborators: a [`generator::ContentGenerator`], a
//! [`speech::SpeechCapture`] and a [`speech::SpeechPlayback`].

pub mod app;
pub mod config;
pub mod error;
pub mod generator;
pub mod prompts;
pub mod session;
pub mod speech;
pub mod transcript;

pub use app::{Collaborators, Phase, Session, SessionEvent, SessionHandle, SessionSettings, SurfaceUpdate};
pub use config::Config;
pub use session::{Level, Role, SessionConfig};
pub use transcript::{Message, Speaker, Transcript};
