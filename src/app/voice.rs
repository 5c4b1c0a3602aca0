use super::state::{ActiveCapture, ActivePlayback, NoticeLevel, Phase, SessionState};
use crate::error::ModeError;
use crate::speech::SpeechSink;

/// Speak `text` if voice mode is on. Any earlier narration is cut off first.
/// Failures are logged and otherwise ignored.
pub fn narrate(state: &mut SessionState, text: &str) {
    if !state.mode.voice_mode_enabled() {
        return;
    }
    cancel_playback(state);

    if let Err(e) = state.mode.begin_speaking() {
        log::warn!("Skipping narration: {e}");
        return;
    }

    let ticket = state.issue_ticket();
    let sink = SpeechSink::new(state.event_sender.clone());
    match state.collaborators.playback.speak(text, ticket, sink) {
        Ok(handle) => {
            log::debug!("Narration {ticket:?} started");
            state.playback = Some(ActivePlayback { ticket, handle });
        }
        Err(e) => {
            log::warn!("Playback failed: {e}");
            state.mode.end_speaking();
        }
    }
    state.publish_flags();
}

/// Open the microphone for one answer.
pub fn start_listening(state: &mut SessionState) {
    if state.phase != Phase::AwaitingAnswer || state.mode.is_awaiting_generation() {
        state.notify(
            NoticeLevel::Info,
            "You can answer once the question has arrived.",
        );
        return;
    }

    cancel_capture(state);
    if let Err(e) = state.mode.begin_listening() {
        let text = match e {
            ModeError::Speaking => "Wait for the interviewer to finish speaking.",
            ModeError::VoiceModeDisabled => "Turn on voice mode to answer by voice.",
            _ => return,
        };
        state.notify(NoticeLevel::Info, text);
        return;
    }

    let ticket = state.issue_ticket();
    let sink = SpeechSink::new(state.event_sender.clone());
    match state.collaborators.capture.start(ticket, sink) {
        Ok(handle) => {
            log::info!("Listening {ticket:?}");
            state.capture = Some(ActiveCapture { ticket, handle });
        }
        Err(e) => {
            log::error!("Could not start speech capture: {e}");
            state.mode.end_listening();
            state.notify(
                NoticeLevel::Error,
                "Could not start voice recognition. Please check your microphone.",
            );
        }
    }
    state.publish_flags();
}

/// Finish the utterance early; the transcript still arrives as a completion.
pub fn stop_listening(state: &mut SessionState) {
    match state.capture.as_mut() {
        Some(active) => active.handle.stop(),
        None => log::debug!("Stop requested with no active capture"),
    }
}

pub fn cancel_capture(state: &mut SessionState) {
    if let Some(mut active) = state.capture.take() {
        log::debug!("Cancelling capture {:?}", active.ticket);
        active.handle.cancel();
    }
    state.mode.end_listening();
}

pub fn cancel_playback(state: &mut SessionState) {
    if let Some(mut active) = state.playback.take() {
        log::debug!("Cancelling playback {:?}", active.ticket);
        active.handle.cancel();
    }
    state.mode.end_speaking();
}
