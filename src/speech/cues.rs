use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SpeechConfig;

/// C5 and G5.
const LOW_HZ: f32 = 523.25;
const HIGH_HZ: f32 = 783.99;

/// Two-note chimes marking the microphone opening and closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Low then high.
    ListeningStarted,
    /// High then low.
    ListeningStopped,
}

/// Length and loudness of the chimes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CueStyle {
    pub length: Duration,
    pub volume: f32,
}

impl CueStyle {
    /// `None` when cues are switched off.
    pub fn from_config(speech: &SpeechConfig) -> Option<Self> {
        speech.cues.then(|| Self {
            length: Duration::from_millis(speech.cue_ms),
            volume: speech.cue_volume.clamp(0.0, 1.0),
        })
    }
}

impl Cue {
    fn notes(self) -> [f32; 2] {
        match self {
            Cue::ListeningStarted => [LOW_HZ, HIGH_HZ],
            Cue::ListeningStopped => [HIGH_HZ, LOW_HZ],
        }
    }

    /// Mono samples at `sample_rate`: two equal notes, each shaped by a
    /// Hann window so neither clicks at its edges.
    pub fn render(self, sample_rate: u32, style: CueStyle) -> Vec<f32> {
        let rate = sample_rate as f32;
        let per_note = (rate * style.length.as_secs_f32() / 2.0) as usize;
        if per_note == 0 {
            return Vec::new();
        }
        self.notes()
            .into_iter()
            .flat_map(|freq| {
                (0..per_note).map(move |i| {
                    let window = (PI * i as f32 / per_note as f32).sin().powi(2);
                    (2.0 * PI * freq * i as f32 / rate).sin() * window * style.volume
                })
            })
            .collect()
    }
}

/// Play a cue on its own thread.
pub fn play(cue: Cue, style: CueStyle) {
    std::thread::spawn(move || {
        if let Err(e) = play_blocking(cue, style) {
            log::warn!("Cue {cue:?} failed: {e}");
        }
    });
}

fn play_blocking(cue: Cue, style: CueStyle) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or("No speaker found")?;
    let config = device.default_output_config()?;
    let channels = config.channels() as usize;
    let chime = Arc::new(cue.render(config.sample_rate(), style));
    let played = Arc::new(AtomicUsize::new(0));

    let stream = {
        let chime = chime.clone();
        let played = played.clone();
        device.build_output_stream(
            &config.into(),
            move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let start = played.load(Ordering::Relaxed);
                let frames = out.chunks_mut(channels);
                let count = frames.len();
                for (offset, frame) in frames.enumerate() {
                    frame.fill(chime.get(start + offset).copied().unwrap_or(0.0));
                }
                played.store(start + count, Ordering::Relaxed);
            },
            |err| log::error!("Speaker stream error: {err}"),
            None,
        )?
    };

    stream.play()?;
    std::thread::sleep(style.length + Duration::from_millis(40));
    Ok(())
}
