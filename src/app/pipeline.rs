use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;

use super::state::{GenerationKind, InFlight, Phase, SessionEvent, SessionState};
use crate::error::GenerationFailure;
use crate::generator::{FeedbackRequest, QuestionRequest};

/// Messages of context sent with a question request.
const QUESTION_CONTEXT: usize = 2;

/// Ask the generator for the next question. Completion arrives as
/// `QuestionGenerated`.
pub fn dispatch_question(state: &mut SessionState) {
    if let Err(e) = state.mode.begin_generation() {
        log::warn!("Not requesting a question: {e}");
        return;
    }

    let ticket = state.issue_ticket();
    let request = QuestionRequest {
        session: state.config,
        recent: state.transcript.recent(QUESTION_CONTEXT).to_vec(),
    };
    let generator = state.collaborators.generator.clone();
    let sender = state.event_sender.clone();
    let timeout = state.settings.generation_timeout;

    log::info!("Requesting question {ticket:?}");
    let task = tokio::spawn(async move {
        let result = guarded(timeout, generator.generate_question(&request)).await;
        let _ = sender.send(SessionEvent::QuestionGenerated { ticket, result }).await;
    });

    state.generation = Some((GenerationKind::Question, InFlight { ticket, task }));
    state.publish_flags();
}

/// Ask for feedback on the pending answer and move to `FeedbackPending`.
pub fn dispatch_feedback(state: &mut SessionState) {
    let Some(answer) = state.pending_answer.clone() else {
        log::debug!("No pending answer to request feedback for");
        return;
    };
    if let Err(e) = state.mode.begin_generation() {
        log::warn!("Not requesting feedback: {e}");
        return;
    }

    let ticket = state.issue_ticket();
    let request = FeedbackRequest {
        session: state.config,
        question: state.current_question.clone().unwrap_or_default(),
        answer,
    };
    let generator = state.collaborators.generator.clone();
    let sender = state.event_sender.clone();
    let timeout = state.settings.generation_timeout;

    state.set_phase(Phase::FeedbackPending);
    log::info!("Requesting feedback {ticket:?}");
    let task = tokio::spawn(async move {
        let result = guarded(timeout, generator.generate_feedback(&request)).await;
        let _ = sender.send(SessionEvent::FeedbackGenerated { ticket, result }).await;
    });

    state.generation = Some((GenerationKind::Feedback, InFlight { ticket, task }));
    state.publish_flags();
}

/// Applies the optional timeout, turns blank text into a failure and
/// reports a panicking generator instead of leaving the request hanging.
async fn guarded<F>(timeout: Option<Duration>, call: F) -> Result<String, GenerationFailure>
where
    F: Future<Output = Result<String, GenerationFailure>>,
{
    let call = AssertUnwindSafe(call).catch_unwind();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(GenerationFailure::TimedOut(limit)),
        },
        None => call.await,
    };

    let text = outcome.map_err(|_| GenerationFailure::TaskAborted("generator panicked".into()))??;
    let text = text.trim();
    if text.is_empty() {
        return Err(GenerationFailure::EmptyResponse);
    }
    Ok(text.to_string())
}

/// Clear the outstanding generation after its completion arrived.
pub fn finish_generation(state: &mut SessionState) {
    state.generation = None;
    state.mode.end_generation();
    state.publish_flags();
}

/// Abort the outstanding generation; its result will never be applied.
pub fn cancel_generation(state: &mut SessionState) {
    if let Some((kind, inflight)) = state.generation.take() {
        log::info!("Cancelling {kind:?} generation {:?}", inflight.ticket);
        inflight.task.abort();
    }
    state.mode.end_generation();
}

/// Issue `PacingElapsed` after `delay`; replaces any earlier timer.
pub fn schedule_next_question(state: &mut SessionState, delay: Duration) {
    cancel_pacing(state);

    let ticket = state.issue_ticket();
    let sender = state.event_sender.clone();
    let task = tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let _ = sender.send(SessionEvent::PacingElapsed { ticket }).await;
    });
    state.pacing = Some(InFlight { ticket, task });
}

pub fn cancel_pacing(state: &mut SessionState) {
    if let Some(inflight) = state.pacing.take() {
        inflight.task.abort();
    }
}
