use super::pipeline::{
    cancel_generation, cancel_pacing, dispatch_feedback, dispatch_question, finish_generation,
    schedule_next_question,
};
use super::state::{
    GenerationKind, NoticeLevel, Phase, SessionEvent, SessionState, SpeechEvent, SurfaceUpdate,
    Ticket,
};
use super::voice::{cancel_capture, cancel_playback, narrate, start_listening, stop_listening};
use crate::error::{CaptureFailure, GenerationFailure};
use crate::prompts;
use crate::transcript::{Message, Transcript};

/// Handle one event. This is the core state machine.
pub fn handle_event(state: &mut SessionState, event: SessionEvent) {
    if state.closed {
        log::debug!("Session closed; ignoring {event:?}");
        return;
    }

    match event {
        SessionEvent::Submit(text) => submit_answer(state, &text),
        SessionEvent::SetVoiceMode(enabled) => set_voice_mode(state, enabled),
        SessionEvent::ToggleVoiceMode => {
            let enabled = !state.mode.voice_mode_enabled();
            set_voice_mode(state, enabled);
        }
        SessionEvent::StartListening => start_listening(state),
        SessionEvent::StopListening => stop_listening(state),
        SessionEvent::Retry => retry(state),
        SessionEvent::Reset => reset(state),
        SessionEvent::Shutdown => shutdown(state),
        SessionEvent::QuestionGenerated { ticket, result } => on_question(state, ticket, result),
        SessionEvent::FeedbackGenerated { ticket, result } => on_feedback(state, ticket, result),
        SessionEvent::PacingElapsed { ticket } => on_pacing_elapsed(state, ticket),
        SessionEvent::Speech(event) => on_speech_event(state, event),
    }
}

/// `Starting -> QuestionPending`: welcome, optional narration, then the
/// first question after the welcome delay.
pub fn start_session(state: &mut SessionState) {
    log::info!(
        "Starting {} {} interview",
        state.config.role,
        state.config.level
    );
    state.set_phase(Phase::Starting);

    let welcome = prompts::welcome_message(&state.config);
    state.append(Message::interviewer(welcome.clone()));
    narrate(state, &welcome);

    state.set_phase(Phase::QuestionPending);
    let delay = state.settings.pacing.welcome_delay();
    schedule_next_question(state, delay);
}

fn on_pacing_elapsed(state: &mut SessionState, ticket: Ticket) {
    match &state.pacing {
        Some(inflight) if inflight.ticket == ticket => state.pacing = None,
        _ => {
            log::debug!("Discarding stale pacing timer {ticket:?}");
            return;
        }
    }
    if state.phase != Phase::QuestionPending {
        return;
    }
    if state.settings.pacing.wait_for_narration && state.mode.is_speaking() {
        log::info!("Holding the next question until narration ends");
        state.question_after_playback = true;
        return;
    }
    dispatch_question(state);
}

fn on_question(
    state: &mut SessionState,
    ticket: Ticket,
    result: Result<String, GenerationFailure>,
) {
    if state.generation_ticket(GenerationKind::Question) != Some(ticket) {
        log::debug!("Discarding stale question {ticket:?}");
        return;
    }
    finish_generation(state);

    match result {
        Ok(question) => {
            log::info!("Question: {question}");
            state.current_question = Some(question.clone());
            state.append(Message::interviewer(question.clone()));
            state.set_phase(Phase::AwaitingAnswer);
            narrate(state, &question);
        }
        Err(e) => {
            log::error!("Question generation failed: {e}");
            state.notify(
                NoticeLevel::Error,
                "Failed to generate a question. Please try again.",
            );
        }
    }
}

/// `AwaitingAnswer -> FeedbackPending`. The answer is in the transcript
/// before the feedback request leaves.
fn submit_answer(state: &mut SessionState, text: &str) {
    let answer = text.trim();
    if answer.is_empty() {
        log::debug!("Ignoring empty submission");
        return;
    }
    if state.phase != Phase::AwaitingAnswer || state.mode.is_awaiting_generation() {
        log::info!("Ignoring submission while {:?}", state.phase);
        let text = if state.mode.is_awaiting_generation() {
            "Please wait, the interviewer is still thinking."
        } else {
            "Please wait for the next question."
        };
        state.notify(NoticeLevel::Info, text);
        return;
    }

    // A typed answer wins over an open microphone.
    if state.capture.is_some() {
        cancel_capture(state);
        state.publish_flags();
    }

    log::info!("Answer: {answer}");
    state.append(Message::candidate(answer));
    state.pending_answer = Some(answer.to_string());
    dispatch_feedback(state);
}

fn on_feedback(
    state: &mut SessionState,
    ticket: Ticket,
    result: Result<String, GenerationFailure>,
) {
    if state.generation_ticket(GenerationKind::Feedback) != Some(ticket) {
        log::debug!("Discarding stale feedback {ticket:?}");
        return;
    }
    finish_generation(state);

    match result {
        Ok(feedback) => {
            log::info!("Feedback: {feedback}");
            state.pending_answer = None;
            state.append(Message::interviewer(prompts::feedback_message(&feedback)));
            state.set_phase(Phase::QuestionPending);
            narrate(state, &feedback);
            let delay = state.settings.pacing.feedback_delay();
            schedule_next_question(state, delay);
        }
        Err(e) => {
            log::error!("Feedback generation failed: {e}");
            state.set_phase(Phase::AwaitingAnswer);
            state.notify(
                NoticeLevel::Error,
                "Failed to generate feedback. Please try again.",
            );
        }
    }
}

/// Re-issue whichever request last failed.
fn retry(state: &mut SessionState) {
    if state.mode.is_awaiting_generation() {
        log::info!("Retry ignored; a request is already outstanding");
        return;
    }
    match state.phase {
        Phase::QuestionPending if state.pacing.is_none() && !state.question_after_playback => {
            dispatch_question(state);
        }
        Phase::AwaitingAnswer if state.pending_answer.is_some() => {
            if state.capture.is_some() {
                cancel_capture(state);
                state.publish_flags();
            }
            dispatch_feedback(state);
        }
        phase => log::debug!("Nothing to retry in {phase:?}"),
    }
}

fn set_voice_mode(state: &mut SessionState, enabled: bool) {
    if state.mode.voice_mode_enabled() == enabled {
        return;
    }

    if enabled {
        state.mode.enable_voice_mode();
        log::info!("Voice mode enabled");
    } else {
        let (was_speaking, was_listening) = state.mode.disable_voice_mode();
        cancel_playback(state);
        cancel_capture(state);
        log::info!("Voice mode disabled (speaking: {was_speaking}, listening: {was_listening})");
    }
    state.publish_flags();
    state.notify(
        NoticeLevel::Info,
        if enabled { "Voice mode enabled" } else { "Voice mode disabled" },
    );

    if !enabled && state.question_after_playback {
        state.question_after_playback = false;
        dispatch_question(state);
    }
}

fn on_speech_event(state: &mut SessionState, event: SpeechEvent) {
    match event {
        SpeechEvent::CaptureFinished { ticket, result } => on_capture_finished(state, ticket, result),
        SpeechEvent::PlaybackStarted { ticket } => {
            log::debug!("Playback {ticket:?} audible");
        }
        SpeechEvent::PlaybackFinished { ticket } => on_playback_ended(state, ticket),
        SpeechEvent::PlaybackFailed { ticket, error } => {
            if state.playback.as_ref().is_some_and(|p| p.ticket == ticket) {
                log::warn!("Playback failed: {error}");
            }
            on_playback_ended(state, ticket);
        }
    }
}

fn on_capture_finished(
    state: &mut SessionState,
    ticket: Ticket,
    result: Result<String, CaptureFailure>,
) {
    if !state.capture.as_ref().is_some_and(|c| c.ticket == ticket) {
        log::debug!("Discarding stale capture result {ticket:?}");
        return;
    }
    state.capture = None;
    state.mode.end_listening();
    state.publish_flags();

    match result {
        Ok(text) if !text.trim().is_empty() => submit_answer(state, &text),
        Ok(_) => state.notify(
            NoticeLevel::Info,
            "Didn't catch that. Please try again or type your answer.",
        ),
        Err(e) => {
            log::error!("Speech recognition error: {e}");
            state.notify(
                NoticeLevel::Error,
                "Speech recognition error. Please try again.",
            );
        }
    }
}

fn on_playback_ended(state: &mut SessionState, ticket: Ticket) {
    if !state.playback.as_ref().is_some_and(|p| p.ticket == ticket) {
        log::debug!("Discarding stale playback event {ticket:?}");
        return;
    }
    state.playback = None;
    state.mode.end_speaking();
    state.publish_flags();

    if state.question_after_playback {
        state.question_after_playback = false;
        if state.phase == Phase::QuestionPending {
            dispatch_question(state);
        }
    }
}

/// `* -> Starting`: drop everything in flight and begin again with the same
/// role and level. The voice-mode preference survives.
fn reset(state: &mut SessionState) {
    log::info!("Resetting session");
    cancel_in_flight(state);
    state.pending_answer = None;
    state.current_question = None;
    state.mode.reset();
    state.transcript = Transcript::new();
    state.publish(SurfaceUpdate::TranscriptCleared);
    state.publish_flags();
    state.notify(NoticeLevel::Info, "Interview session reset!");
    start_session(state);
}

/// Teardown: cancel speech, abandon generation, accept nothing further.
pub fn shutdown(state: &mut SessionState) {
    if state.closed {
        return;
    }
    log::info!("Shutting down session");
    cancel_in_flight(state);
    state.mode.reset();
    state.closed = true;
}

fn cancel_in_flight(state: &mut SessionState) {
    cancel_capture(state);
    cancel_playback(state);
    cancel_generation(state);
    cancel_pacing(state);
    state.question_after_playback = false;
}
