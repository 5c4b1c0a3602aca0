//! Stub collaborators and driving helpers shared by the session tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use interview_sim::app::{Notice, SpeechEvent, Ticket};
use interview_sim::config::PacingConfig;
use interview_sim::error::{CaptureFailure, GenerationFailure, PlaybackFailure};
use interview_sim::generator::{ContentGenerator, FeedbackRequest, QuestionRequest};
use interview_sim::speech::{CaptureHandle, PlaybackHandle, SpeechCapture, SpeechPlayback, SpeechSink};
use interview_sim::{
    Collaborators, Message, Session, SessionConfig, SessionHandle, SessionSettings, Speaker,
    SurfaceUpdate,
};

// ============================================================================
// Generator
// ============================================================================

/// Returns scripted results first, then numbered questions / fixed feedback.
#[derive(Default)]
pub struct ScriptedGenerator {
    questions: Mutex<VecDeque<Result<String, GenerationFailure>>>,
    feedback: Mutex<VecDeque<Result<String, GenerationFailure>>>,
    pub question_calls: AtomicUsize,
    pub feedback_calls: AtomicUsize,
    pub question_requests: Mutex<Vec<QuestionRequest>>,
    pub feedback_requests: Mutex<Vec<FeedbackRequest>>,
    /// When set, every call waits for a permit.
    gate: Option<Semaphore>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls block until `release` hands out permits.
    pub fn held() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn push_question(&self, result: Result<String, GenerationFailure>) {
        self.questions.lock().unwrap().push_back(result);
    }

    pub fn push_feedback(&self, result: Result<String, GenerationFailure>) {
        self.feedback.lock().unwrap().push_back(result);
    }

    pub fn question_calls(&self) -> usize {
        self.question_calls.load(Ordering::SeqCst)
    }

    pub fn feedback_calls(&self) -> usize {
        self.feedback_calls.load(Ordering::SeqCst)
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate_question(&self, request: &QuestionRequest) -> Result<String, GenerationFailure> {
        let n = self.question_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.question_requests.lock().unwrap().push(request.clone());
        self.wait_for_gate().await;
        let scripted = self.questions.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("Question {n}?")))
    }

    async fn generate_feedback(&self, request: &FeedbackRequest) -> Result<String, GenerationFailure> {
        self.feedback_calls.fetch_add(1, Ordering::SeqCst);
        self.feedback_requests.lock().unwrap().push(request.clone());
        self.wait_for_gate().await;
        let scripted = self.feedback.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok("Good start; mention trade-offs next time.".to_string()))
    }
}

// ============================================================================
// Speech ports
// ============================================================================

struct CountingHandle {
    stops: Arc<AtomicUsize>,
    cancels: Arc<AtomicUsize>,
}

impl CaptureHandle for CountingHandle {
    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn cancel(&mut self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

impl PlaybackHandle for CountingHandle {
    fn cancel(&mut self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Capture port whose results are delivered by the test. It keeps the
/// last sink even after cancellation so tests can simulate a late callback.
#[derive(Default)]
pub struct StubCapture {
    last: Mutex<Option<(Ticket, SpeechSink)>>,
    pub starts: AtomicUsize,
    pub stops: Arc<AtomicUsize>,
    pub cancels: Arc<AtomicUsize>,
    pub fail_start: AtomicBool,
}

impl StubCapture {
    pub fn deliver(&self, result: Result<String, CaptureFailure>) {
        if let Some((ticket, sink)) = self.last.lock().unwrap().clone() {
            sink.emit(SpeechEvent::CaptureFinished { ticket, result });
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl SpeechCapture for StubCapture {
    fn start(&self, ticket: Ticket, sink: SpeechSink) -> Result<Box<dyn CaptureHandle>, CaptureFailure> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(CaptureFailure::Device("permission denied".into()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some((ticket, sink));
        Ok(Box::new(CountingHandle {
            stops: self.stops.clone(),
            cancels: self.cancels.clone(),
        }))
    }
}

/// Playback port that emits the start event immediately and the end event
/// only when the test calls `finish`.
#[derive(Default)]
pub struct StubPlayback {
    last: Mutex<Option<(Ticket, SpeechSink)>>,
    pub spoken: Mutex<Vec<String>>,
    pub cancels: Arc<AtomicUsize>,
    pub fail_spawn: AtomicBool,
}

impl StubPlayback {
    pub fn finish(&self) {
        if let Some((ticket, sink)) = self.last.lock().unwrap().clone() {
            sink.emit(SpeechEvent::PlaybackFinished { ticket });
        }
    }

    pub fn fail(&self) {
        if let Some((ticket, sink)) = self.last.lock().unwrap().clone() {
            sink.emit(SpeechEvent::PlaybackFailed {
                ticket,
                error: PlaybackFailure::Exited("exit status: 1".into()),
            });
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl SpeechPlayback for StubPlayback {
    fn speak(
        &self,
        text: &str,
        ticket: Ticket,
        sink: SpeechSink,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackFailure> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(PlaybackFailure::Spawn("espeak-ng: not found".into()));
        }
        self.spoken.lock().unwrap().push(text.to_string());
        sink.emit(SpeechEvent::PlaybackStarted { ticket });
        *self.last.lock().unwrap() = Some((ticket, sink));
        Ok(Box::new(CountingHandle {
            stops: Arc::new(AtomicUsize::new(0)),
            cancels: self.cancels.clone(),
        }))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub session: Session,
    pub handle: SessionHandle,
    pub updates: async_channel::Receiver<SurfaceUpdate>,
    pub generator: Arc<ScriptedGenerator>,
    pub capture: Arc<StubCapture>,
    pub playback: Arc<StubPlayback>,
}

impl Harness {
    pub fn new(config: SessionConfig, voice_mode: bool) -> Self {
        Self::with_generator(config, voice_mode, ScriptedGenerator::new())
    }

    pub fn with_generator(config: SessionConfig, voice_mode: bool, generator: ScriptedGenerator) -> Self {
        let settings = SessionSettings {
            voice_mode,
            pacing: PacingConfig::immediate(),
            generation_timeout: None,
        };
        Self::with_settings(config, settings, generator)
    }

    pub fn with_settings(config: SessionConfig, settings: SessionSettings, generator: ScriptedGenerator) -> Self {
        let generator = Arc::new(generator);
        let capture = Arc::new(StubCapture::default());
        let playback = Arc::new(StubPlayback::default());
        let collaborators = Collaborators {
            generator: generator.clone(),
            capture: capture.clone(),
            playback: playback.clone(),
        };
        let (session, handle, updates) = Session::new(config, settings, collaborators);
        Self {
            session,
            handle,
            updates,
            generator,
            capture,
            playback,
        }
    }

    /// Start the session and run until nothing more happens.
    pub async fn start(&mut self) {
        self.session.start();
        self.settle().await;
    }

    /// Process events until the queue stays quiet for a moment.
    pub async fn settle(&mut self) {
        while let Ok(running) =
            tokio::time::timeout(Duration::from_millis(50), self.session.step()).await
        {
            if !running {
                break;
            }
        }
    }

    /// Process exactly one event.
    pub async fn step(&mut self) {
        let _ = tokio::time::timeout(Duration::from_secs(1), self.session.step()).await;
    }

    pub fn messages(&self) -> Vec<Message> {
        self.session.transcript().all().cloned().collect()
    }

    pub fn contents(&self) -> Vec<String> {
        self.session
            .transcript()
            .all()
            .map(|m| m.content().to_string())
            .collect()
    }

    /// Drain and return the notices published so far.
    pub fn notices(&self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            if let SurfaceUpdate::Notice(notice) = update {
                notices.push(notice);
            }
        }
        notices
    }
}

/// Checks the turn structure: feedback always answers a candidate message,
/// and questions are never adjacent.
pub fn assert_turn_structure(messages: &[Message]) {
    let is_feedback = |m: &Message| m.sender() == Speaker::Interviewer && m.content().starts_with("Feedback: ");
    let is_question = |m: &Message, i: usize| m.sender() == Speaker::Interviewer && i > 0 && !is_feedback(m);

    assert_eq!(messages.first().map(Message::sender), Some(Speaker::Interviewer));
    for i in 1..messages.len() {
        let (prev, cur) = (&messages[i - 1], &messages[i]);
        if is_feedback(cur) {
            assert_eq!(prev.sender(), Speaker::Candidate, "feedback at {i} must follow an answer");
        }
        if is_question(cur, i) && i > 1 {
            assert!(is_feedback(prev), "question at {i} must follow feedback");
        }
    }
}
