//! # Session flow tests
//!
//! Drive a `Session` end to end with stub collaborators: a scripted
//! generator, a capture port whose results the test delivers, and a playback
//! port that only finishes when told to. Pacing delays are zero unless a
//! test sets its own.

mod common;

use common::{assert_turn_structure, Harness, ScriptedGenerator};

use interview_sim::app::NoticeLevel;
use interview_sim::config::PacingConfig;
use interview_sim::error::{CaptureFailure, GenerationFailure};
use interview_sim::prompts::welcome_message;
use interview_sim::{Level, Phase, Role, SessionConfig, SessionSettings, Speaker};

fn candidate_messages(h: &Harness) -> Vec<String> {
    h.messages()
        .into_iter()
        .filter(|m| m.sender() == Speaker::Candidate)
        .map(|m| m.content().to_string())
        .collect()
}

// ============================================================================
// Text mode
// ============================================================================

#[tokio::test]
async fn welcome_then_first_question() {
    let mut h = Harness::new(SessionConfig::default(), false);
    h.start().await;

    let messages = h.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].content().contains("frontend junior"));
    assert_eq!(messages[1].content(), "Question 1?");
    assert!(messages.iter().all(|m| m.sender() == Speaker::Interviewer));
    assert_eq!(h.session.phase(), Phase::AwaitingAnswer);
    assert!(!h.session.flags().is_awaiting_generation);
    assert!(h.playback.spoken().is_empty());
}

#[tokio::test]
async fn backend_mid_reset_returns_to_welcome_then_question() {
    let config = SessionConfig::new(Role::Backend, Level::Mid);
    let mut h = Harness::new(config, false);
    h.start().await;

    h.handle.submit("  Add an index on the join column.  ");
    h.settle().await;
    assert_eq!(h.messages().len(), 5);
    {
        let requests = h.generator.feedback_requests.lock().unwrap();
        assert_eq!(requests[0].question, "Question 1?");
        assert_eq!(requests[0].answer, "Add an index on the join column.");
        assert_eq!(requests[0].session, config);
    }

    h.handle.reset();
    h.step().await;
    assert_eq!(h.session.transcript().len(), 1);
    assert_eq!(h.session.phase(), Phase::QuestionPending);
    assert_eq!(h.session.config(), config);

    h.settle().await;
    assert_eq!(
        h.contents(),
        vec![welcome_message(&config), "Question 3?".to_string()]
    );
    assert_eq!(h.session.phase(), Phase::AwaitingAnswer);
}

#[tokio::test]
async fn first_question_failure_leaves_welcome_only() {
    let generator = ScriptedGenerator::new();
    generator.push_question(Err(GenerationFailure::Http("connection refused".into())));
    let mut h = Harness::with_generator(SessionConfig::default(), false, generator);
    h.start().await;

    assert_eq!(h.session.transcript().len(), 1);
    assert_eq!(h.session.phase(), Phase::QuestionPending);
    assert!(!h.session.flags().is_awaiting_generation);
    assert!(h.notices().iter().any(|n| n.level == NoticeLevel::Error));

    // No silent retry.
    h.settle().await;
    assert_eq!(h.generator.question_calls(), 1);

    h.handle.retry();
    h.settle().await;
    assert_eq!(h.generator.question_calls(), 2);
    assert_eq!(h.contents()[1], "Question 2?");
    assert_eq!(h.session.phase(), Phase::AwaitingAnswer);
}

#[tokio::test]
async fn blank_generation_counts_as_failure() {
    let generator = ScriptedGenerator::new();
    generator.push_question(Ok("   \n".into()));
    let mut h = Harness::with_generator(SessionConfig::default(), false, generator);
    h.start().await;

    assert_eq!(h.session.transcript().len(), 1);
    assert_eq!(h.session.phase(), Phase::QuestionPending);
}

#[tokio::test]
async fn feedback_failure_keeps_the_answer_and_allows_retry() {
    let generator = ScriptedGenerator::new();
    generator.push_feedback(Err(GenerationFailure::Api {
        status: 503,
        body: "overloaded".into(),
    }));
    let mut h = Harness::with_generator(SessionConfig::default(), false, generator);
    h.start().await;

    h.handle.submit("A closure captures variables from its scope.");
    h.settle().await;

    let messages = h.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2].sender(), Speaker::Candidate);
    assert_eq!(h.session.phase(), Phase::AwaitingAnswer);
    assert!(h.notices().iter().any(|n| n.level == NoticeLevel::Error));

    h.handle.retry();
    h.settle().await;

    let messages = h.messages();
    assert_eq!(messages.len(), 5);
    assert!(messages[3].content().starts_with("Feedback: "));
    assert_eq!(candidate_messages(&h).len(), 1);
    let requests = h.generator.feedback_requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].answer, requests[1].answer);
}

#[tokio::test]
async fn answer_is_recorded_before_feedback_is_requested() {
    let generator = ScriptedGenerator::held();
    generator.release(1);
    let mut h = Harness::with_generator(SessionConfig::default(), false, generator);
    h.start().await;
    assert_eq!(h.session.phase(), Phase::AwaitingAnswer);

    h.handle.submit("Use a flexbox container.");
    h.step().await;

    let last = h.session.transcript().last().cloned().unwrap();
    assert_eq!(last.sender(), Speaker::Candidate);
    assert_eq!(last.content(), "Use a flexbox container.");
    assert_eq!(h.session.phase(), Phase::FeedbackPending);
    assert!(h.session.flags().is_awaiting_generation);

    // Submissions are ignored while a request is outstanding.
    h.notices();
    h.handle.submit("Or a grid.");
    h.step().await;
    assert_eq!(candidate_messages(&h), vec!["Use a flexbox container."]);
    assert!(h.notices().iter().any(|n| n.text.contains("still thinking")));

    h.generator.release(1);
    h.settle().await;
    assert_eq!(h.messages().len(), 4);
    assert!(h.messages()[3].content().starts_with("Feedback: "));
}

#[tokio::test]
async fn answer_typed_during_feedback_delay_gets_a_notice() {
    let settings = SessionSettings {
        voice_mode: false,
        pacing: PacingConfig {
            welcome_delay_ms: 0,
            feedback_delay_ms: 300,
            wait_for_narration: true,
        },
        generation_timeout: None,
    };
    let mut h = Harness::with_settings(SessionConfig::default(), settings, ScriptedGenerator::new());
    h.start().await;
    assert_eq!(h.session.phase(), Phase::AwaitingAnswer);

    h.handle.submit("first answer");
    h.step().await;
    h.step().await;
    assert_eq!(h.session.phase(), Phase::QuestionPending);
    assert!(h.session.flags().can_submit());
    h.notices();

    h.handle.submit("typed during the delay");
    h.step().await;
    assert_eq!(candidate_messages(&h), vec!["first answer"]);
    let notices = h.notices();
    assert!(notices
        .iter()
        .any(|n| n.level == NoticeLevel::Info && n.text.contains("next question")));

    // The delay still runs out and the next question arrives.
    h.step().await;
    h.step().await;
    assert_eq!(h.session.phase(), Phase::AwaitingAnswer);
    assert_eq!(h.contents().last().map(String::as_str), Some("Question 2?"));
}

#[tokio::test]
async fn reset_discards_in_flight_question() {
    let mut h = Harness::with_generator(SessionConfig::default(), false, ScriptedGenerator::held());
    h.start().await;
    assert!(h.session.flags().is_awaiting_generation);
    assert_eq!(h.generator.question_calls(), 1);

    h.handle.reset();
    h.step().await;
    assert_eq!(h.session.transcript().len(), 1);
    assert!(!h.session.flags().is_awaiting_generation);

    h.settle().await;
    h.generator.release(2);
    h.settle().await;

    assert_eq!(h.generator.question_calls(), 2);
    assert_eq!(h.session.transcript().len(), 2);
    assert_eq!(h.contents()[1], "Question 2?");
}

#[tokio::test]
async fn question_context_is_last_two_messages() {
    let mut h = Harness::new(SessionConfig::default(), false);
    h.start().await;
    h.handle.submit("Margins auto.");
    h.settle().await;

    let requests = h.generator.question_requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].recent.len(), 1);
    assert_eq!(requests[1].recent.len(), 2);
    assert_eq!(requests[1].recent[0].content(), "Margins auto.");
    assert!(requests[1].recent[1].content().starts_with("Feedback: "));
}

#[tokio::test]
async fn several_rounds_keep_turn_structure() {
    let generator = ScriptedGenerator::new();
    generator.push_feedback(Ok("Solid.".into()));
    generator.push_feedback(Err(GenerationFailure::TimedOut(std::time::Duration::from_secs(30))));
    let mut h = Harness::with_generator(SessionConfig::new(Role::Fullstack, Level::Senior), false, generator);
    h.start().await;

    for answer in ["First answer", "Second answer", "Third answer"] {
        h.handle.submit(answer);
        h.settle().await;
        let unanswered = h.messages().last().map(|m| m.sender()) == Some(Speaker::Candidate);
        if h.session.phase() == Phase::AwaitingAnswer && unanswered {
            h.handle.retry();
            h.settle().await;
        }
    }

    let messages = h.messages();
    assert_eq!(messages.len(), 2 + 3 * 3);
    assert_turn_structure(&messages);
}

// ============================================================================
// Voice mode
// ============================================================================

#[tokio::test]
async fn first_question_waits_for_welcome_narration() {
    let mut h = Harness::new(SessionConfig::default(), true);
    h.start().await;

    assert_eq!(h.playback.spoken(), vec![welcome_message(&SessionConfig::default())]);
    assert!(h.session.flags().is_speaking);
    assert_eq!(h.generator.question_calls(), 0);
    assert_eq!(h.session.phase(), Phase::QuestionPending);

    h.playback.finish();
    h.settle().await;

    assert_eq!(h.generator.question_calls(), 1);
    assert_eq!(h.session.phase(), Phase::AwaitingAnswer);
    assert_eq!(h.playback.spoken()[1], "Question 1?");
    assert!(h.session.flags().is_speaking);
}

#[tokio::test]
async fn spoken_answer_flow() {
    let mut h = Harness::new(SessionConfig::default(), true);
    h.start().await;
    h.playback.finish();
    h.settle().await;

    // The question is still being read out.
    h.handle.start_listening();
    h.step().await;
    assert_eq!(h.capture.starts(), 0);
    assert!(!h.session.flags().is_listening);
    assert!(h
        .notices()
        .iter()
        .any(|n| n.text.contains("finish speaking")));

    h.playback.finish();
    h.settle().await;
    h.handle.start_listening();
    h.step().await;
    assert_eq!(h.capture.starts(), 1);
    assert!(h.session.flags().is_listening);
    assert!(!h.session.flags().is_speaking);

    h.capture.deliver(Ok("Use position absolute with transforms.".into()));
    h.settle().await;

    assert!(!h.session.flags().is_listening);
    assert_eq!(candidate_messages(&h), vec!["Use position absolute with transforms."]);
    let messages = h.messages();
    assert_eq!(messages.len(), 4);
    assert!(messages[3].content().starts_with("Feedback: "));
    // Narration drops the tag.
    assert_eq!(
        h.playback.spoken().last().map(String::as_str),
        Some("Good start; mention trade-offs next time.")
    );
}

#[tokio::test]
async fn stop_listening_finalizes_through_the_port() {
    let mut h = Harness::new(SessionConfig::default(), true);
    h.start().await;
    h.playback.finish();
    h.settle().await;
    h.playback.finish();
    h.settle().await;

    h.handle.start_listening();
    h.step().await;
    h.handle.stop_listening();
    h.step().await;
    assert_eq!(h.capture.stops.load(std::sync::atomic::Ordering::SeqCst), 1);
    // Still listening until the port reports back.
    assert!(h.session.flags().is_listening);

    h.capture.deliver(Ok(String::new()));
    h.settle().await;
    assert!(!h.session.flags().is_listening);
    assert_eq!(h.session.phase(), Phase::AwaitingAnswer);
    assert!(candidate_messages(&h).is_empty());
}

#[tokio::test]
async fn capture_failure_clears_listening() {
    let mut h = Harness::new(SessionConfig::default(), true);
    h.start().await;
    h.playback.finish();
    h.settle().await;
    h.playback.finish();
    h.settle().await;
    h.notices();

    h.handle.start_listening();
    h.step().await;
    h.capture.deliver(Err(CaptureFailure::Recognition("no speech".into())));
    h.settle().await;

    assert!(!h.session.flags().is_listening);
    assert_eq!(h.session.phase(), Phase::AwaitingAnswer);
    assert!(h.notices().iter().any(|n| n.level == NoticeLevel::Error));

    h.handle.start_listening();
    h.step().await;
    assert_eq!(h.capture.starts(), 2);
}

#[tokio::test]
async fn capture_start_failure_is_reported() {
    let mut h = Harness::new(SessionConfig::default(), true);
    h.start().await;
    h.playback.finish();
    h.settle().await;
    h.playback.finish();
    h.settle().await;
    h.notices();

    h.capture
        .fail_start
        .store(true, std::sync::atomic::Ordering::SeqCst);
    h.handle.start_listening();
    h.step().await;

    assert!(!h.session.flags().is_listening);
    assert!(h.notices().iter().any(|n| n.text.contains("microphone")));
}

#[tokio::test]
async fn typed_answer_cancels_capture_and_late_result_is_dropped() {
    let mut h = Harness::new(SessionConfig::default(), true);
    h.start().await;
    h.playback.finish();
    h.settle().await;
    h.playback.finish();
    h.settle().await;

    h.handle.start_listening();
    h.step().await;
    assert!(h.session.flags().is_listening);

    h.handle.submit("Typed answer");
    h.step().await;
    assert_eq!(h.capture.cancels(), 1);
    assert!(!h.session.flags().is_listening);

    h.capture.deliver(Ok("Spoken answer".into()));
    h.settle().await;
    assert_eq!(candidate_messages(&h), vec!["Typed answer"]);
}

#[tokio::test]
async fn disabling_voice_mode_silences_narration() {
    let mut h = Harness::new(SessionConfig::default(), true);
    h.start().await;
    assert!(h.session.flags().is_speaking);

    h.handle.set_voice_mode(false);
    h.step().await;

    assert!(!h.session.flags().is_speaking);
    assert!(!h.session.flags().voice_mode_enabled);
    assert_eq!(h.playback.cancels(), 1);

    // The held question goes out now and nothing more is spoken.
    h.settle().await;
    assert_eq!(h.session.phase(), Phase::AwaitingAnswer);
    assert_eq!(h.playback.spoken().len(), 1);

    // A late end event from the cancelled narration is ignored.
    h.playback.finish();
    h.settle().await;
    assert!(!h.session.flags().is_speaking);
}

#[tokio::test]
async fn disabling_voice_mode_leaves_generation_alone() {
    let generator = ScriptedGenerator::held();
    let mut h = Harness::with_generator(SessionConfig::default(), true, generator);
    h.start().await;
    h.playback.finish();
    h.settle().await;
    assert!(h.session.flags().is_awaiting_generation);

    h.handle.set_voice_mode(false);
    h.step().await;
    assert!(h.session.flags().is_awaiting_generation);

    h.generator.release(1);
    h.settle().await;
    assert_eq!(h.session.phase(), Phase::AwaitingAnswer);
    assert_eq!(h.playback.spoken().len(), 1);
}

#[tokio::test]
async fn playback_failure_is_swallowed() {
    let mut h = Harness::new(SessionConfig::default(), true);
    h.start().await;
    h.notices();

    h.playback.fail();
    h.settle().await;

    assert!(h.notices().iter().all(|n| n.level != NoticeLevel::Error));
    assert_eq!(h.session.phase(), Phase::AwaitingAnswer);
    assert_eq!(h.session.transcript().len(), 2);
}

#[tokio::test]
async fn reset_keeps_voice_mode_and_cancels_speech() {
    let mut h = Harness::new(SessionConfig::default(), true);
    h.start().await;
    h.playback.finish();
    h.settle().await;
    h.playback.finish();
    h.settle().await;
    h.handle.start_listening();
    h.step().await;

    h.handle.reset();
    h.step().await;

    let flags = h.session.flags();
    assert!(flags.voice_mode_enabled);
    assert!(!flags.is_listening);
    assert!(!flags.is_awaiting_generation);
    // The new welcome is being narrated.
    assert!(flags.is_speaking);
    assert_eq!(h.capture.cancels(), 1);
    assert_eq!(h.session.transcript().len(), 1);
}

#[tokio::test]
async fn shutdown_cancels_speech_and_stops_the_loop() {
    let mut h = Harness::new(SessionConfig::default(), true);
    h.start().await;

    h.handle.shutdown();
    h.step().await;

    assert!(h.session.is_closed());
    assert_eq!(h.playback.cancels(), 1);
    assert!(!h.session.flags().is_speaking);
    assert!(!h.session.step().await);
    assert_eq!(h.generator.question_calls(), 0);
}
