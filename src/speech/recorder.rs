use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Whisper wants 16kHz mono.
pub const TARGET_RATE: u32 = 16000;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How the input stream is opened and reduced to ~16kHz mono.
struct InputPlan {
    config: cpal::StreamConfig,
    rate: u32,
    decimation: usize,
}

fn plan_input(device: &cpal::Device) -> Result<InputPlan, BoxError> {
    let native_16k = device.supported_input_configs()?.find(|c| {
        c.channels() == 1
            && c.sample_format() == cpal::SampleFormat::F32
            && (c.min_sample_rate()..=c.max_sample_rate()).contains(&TARGET_RATE)
    });
    if let Some(range) = native_16k {
        return Ok(InputPlan {
            config: range.with_sample_rate(TARGET_RATE).config(),
            rate: TARGET_RATE,
            decimation: 1,
        });
    }

    let fallback = device.default_input_config()?;
    let native = fallback.sample_rate();
    let decimation = (native / TARGET_RATE).max(1) as usize;
    let rate = native / decimation as u32;
    log::info!("Microphone runs at {native}Hz; keeping every {decimation}th frame (~{rate}Hz)");
    Ok(InputPlan {
        config: fallback.config(),
        rate,
        decimation,
    })
}

/// Average each interleaved frame to mono, keeping every `decimation`th.
fn downmix_into(out: &mut Vec<f32>, data: &[f32], channels: usize, decimation: usize) {
    out.extend(
        data.chunks(channels)
            .step_by(decimation)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

/// Open the default microphone, appending ~16kHz mono samples to `buffer`.
/// Recording lasts as long as the returned stream; the `u32` is the
/// effective sample rate.
pub fn start_capture(buffer: Arc<Mutex<Vec<f32>>>) -> Result<(cpal::Stream, u32), BoxError> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or("No microphone found")?;
    log::info!("Microphone: {:?}", device.description());

    let InputPlan {
        config,
        rate,
        decimation,
    } = plan_input(&device)?;
    let channels = config.channels as usize;

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if let Ok(mut samples) = buffer.lock() {
                downmix_into(&mut samples, data, channels, decimation);
            }
        },
        |err| log::error!("Microphone stream error: {err}"),
        None,
    )?;
    stream.play()?;
    Ok((stream, rate))
}

/// RMS over the newest `window` samples.
pub fn tail_rms(samples: &[f32], window: usize) -> f32 {
    let n = samples.len().min(window);
    if n == 0 {
        return 0.0;
    }
    let sum_sq: f32 = samples[samples.len() - n..].iter().map(|&s| s * s).sum();
    (sum_sq / n as f32).sqrt()
}

/// Energy-based end-of-utterance detection: the utterance ends after speech
/// has been heard and then `silence` of quiet follows.
#[derive(Debug, Clone)]
pub struct Endpointer {
    threshold: f32,
    silence: Duration,
    heard_speech: bool,
    quiet_for: Duration,
}

impl Endpointer {
    pub const DEFAULT_THRESHOLD: f32 = 0.015;

    pub fn new(silence: Duration) -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            silence,
            heard_speech: false,
            quiet_for: Duration::ZERO,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Feed the level of the last `elapsed` of audio. Returns true once the
    /// utterance is over.
    pub fn observe(&mut self, rms: f32, elapsed: Duration) -> bool {
        if rms >= self.threshold {
            self.heard_speech = true;
            self.quiet_for = Duration::ZERO;
            return false;
        }
        if !self.heard_speech {
            return false;
        }
        self.quiet_for += elapsed;
        self.quiet_for >= self.silence
    }

    pub fn heard_speech(&self) -> bool {
        self.heard_speech
    }
}
