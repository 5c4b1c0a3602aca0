use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use whisper_rs::WhisperContext;

use super::cues::{self, Cue, CueStyle};
use super::recorder::{self, Endpointer};
use super::{CaptureHandle, SpeechCapture, SpeechSink};
use crate::app::{SpeechEvent, Ticket};
use crate::config::SpeechConfig;
use crate::error::CaptureFailure;

/// How often the capture thread checks levels and control messages.
const TICK: Duration = Duration::from_millis(80);
/// ~80ms of 16kHz audio.
const LEVEL_WINDOW: usize = 1280;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Stop,
    Cancel,
}

/// Microphone capture finalized by whisper. One utterance per `start`.
pub struct WhisperCapture {
    ctx: Option<Arc<WhisperContext>>,
    silence: Duration,
    max_utterance: Duration,
    cues: Option<CueStyle>,
}

impl WhisperCapture {
    pub fn new(ctx: Arc<WhisperContext>, speech: &SpeechConfig) -> Self {
        Self {
            ctx: Some(ctx),
            silence: Duration::from_millis(speech.silence_ms),
            max_utterance: Duration::from_secs(speech.max_utterance_secs),
            cues: CueStyle::from_config(speech),
        }
    }

    /// A capture port without a model; every `start` fails with `Unavailable`.
    pub fn unavailable(speech: &SpeechConfig) -> Self {
        Self {
            ctx: None,
            silence: Duration::from_millis(speech.silence_ms),
            max_utterance: Duration::from_secs(speech.max_utterance_secs),
            cues: CueStyle::from_config(speech),
        }
    }
}

impl SpeechCapture for WhisperCapture {
    fn start(&self, ticket: Ticket, sink: SpeechSink) -> Result<Box<dyn CaptureHandle>, CaptureFailure> {
        let ctx = self
            .ctx
            .clone()
            .ok_or_else(|| CaptureFailure::Unavailable("speech model not loaded".into()))?;

        let (control_tx, control_rx) = async_channel::bounded::<Control>(1);
        let job = CaptureJob {
            ctx,
            ticket,
            sink,
            control: control_rx,
            silence: self.silence,
            max_utterance: self.max_utterance,
            cues: self.cues,
        };

        std::thread::Builder::new()
            .name("speech-capture".into())
            .spawn(move || job.run())
            .map_err(|e| CaptureFailure::Device(format!("failed to spawn capture thread: {e}")))?;

        Ok(Box::new(WhisperCaptureHandle {
            control: control_tx,
        }))
    }
}

struct WhisperCaptureHandle {
    control: async_channel::Sender<Control>,
}

impl CaptureHandle for WhisperCaptureHandle {
    fn stop(&mut self) {
        let _ = self.control.try_send(Control::Stop);
    }

    fn cancel(&mut self) {
        let _ = self.control.try_send(Control::Cancel);
        self.control.close();
    }
}

impl Drop for WhisperCaptureHandle {
    fn drop(&mut self) {
        // A dropped handle means nobody wants the result.
        self.control.close();
    }
}

struct CaptureJob {
    ctx: Arc<WhisperContext>,
    ticket: Ticket,
    sink: SpeechSink,
    control: async_channel::Receiver<Control>,
    silence: Duration,
    max_utterance: Duration,
    cues: Option<CueStyle>,
}

impl CaptureJob {
    fn run(self) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let (stream, sample_rate) = match recorder::start_capture(buffer.clone()) {
            Ok(started) => started,
            Err(e) => {
                log::error!("Failed to start capture: {e}");
                self.finish(Err(CaptureFailure::Device(e.to_string())));
                return;
            }
        };

        if let Some(style) = self.cues {
            cues::play(Cue::ListeningStarted, style);
        }

        if !self.listen(&buffer) {
            log::debug!("Capture {:?} cancelled", self.ticket);
            return;
        }
        drop(stream);

        if let Some(style) = self.cues {
            cues::play(Cue::ListeningStopped, style);
        }

        let samples = match buffer.lock() {
            Ok(buf) => buf.clone(),
            Err(_) => {
                self.finish(Err(CaptureFailure::Device("audio buffer poisoned".into())));
                return;
            }
        };

        if samples.is_empty() {
            self.finish(Ok(String::new()));
            return;
        }

        log::info!(
            "Captured {} samples ({:.1}s at {}Hz)",
            samples.len(),
            samples.len() as f32 / sample_rate as f32,
            sample_rate
        );

        let result = super::transcriber::transcribe(&self.ctx, &samples)
            .map_err(|e| CaptureFailure::Recognition(e.to_string()));
        self.finish(result);
    }

    /// Poll until the utterance ends. Returns false when cancelled.
    fn listen(&self, buffer: &Arc<Mutex<Vec<f32>>>) -> bool {
        let started = Instant::now();
        let mut endpointer = Endpointer::new(self.silence);
        loop {
            std::thread::sleep(TICK);
            match self.control.try_recv() {
                Ok(Control::Stop) => return true,
                Ok(Control::Cancel) => return false,
                Err(async_channel::TryRecvError::Closed) => return false,
                Err(async_channel::TryRecvError::Empty) => {}
            }

            let rms = match buffer.lock() {
                Ok(buf) => recorder::tail_rms(&buf, LEVEL_WINDOW),
                Err(_) => return true,
            };
            if endpointer.observe(rms, TICK) {
                log::debug!("End of utterance detected");
                return true;
            }
            if started.elapsed() >= self.max_utterance {
                log::info!("Utterance hit the {:?} limit", self.max_utterance);
                return true;
            }
        }
    }

    fn finish(&self, result: Result<String, CaptureFailure>) {
        report(&self.control, &self.sink, self.ticket, result);
    }
}

/// Deliver the capture result unless the handle was cancelled or dropped
/// while we were recording or transcribing.
fn report(
    control: &async_channel::Receiver<Control>,
    sink: &SpeechSink,
    ticket: Ticket,
    result: Result<String, CaptureFailure>,
) {
    if control.is_closed() || matches!(control.try_recv(), Ok(Control::Cancel)) {
        log::debug!("Capture {ticket:?} cancelled; dropping its result");
        return;
    }
    sink.emit(SpeechEvent::CaptureFinished { ticket, result });
}
