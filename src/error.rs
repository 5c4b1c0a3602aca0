use std::time::Duration;

/// A content generation call failed or produced nothing usable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationFailure {
    #[error("No Gemini API key configured")]
    MissingCredential,

    #[error("Network error: {0}")]
    Http(String),

    #[error("Gemini API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Generator returned empty text")]
    EmptyResponse,

    #[error("Generation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Generation task ended unexpectedly: {0}")]
    TaskAborted(String),
}

impl From<reqwest::Error> for GenerationFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Speech capture produced an error instead of a finalized transcript.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureFailure {
    #[error("Speech input unavailable: {0}")]
    Unavailable(String),

    #[error("Microphone error: {0}")]
    Device(String),

    #[error("Speech recognition failed: {0}")]
    Recognition(String),
}

/// Playback is best-effort; these are logged and swallowed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackFailure {
    #[error("Failed to start speech output: {0}")]
    Spawn(String),

    #[error("Speech output exited abnormally: {0}")]
    Exited(String),
}

/// A Mode Controller gate refused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ModeError {
    #[error("the interviewer is still speaking")]
    Speaking,

    #[error("speech capture is already active")]
    Listening,

    #[error("a generation request is already outstanding")]
    GenerationOutstanding,

    #[error("voice mode is disabled")]
    VoiceModeDisabled,
}
