use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variables checked, in order, for the Gemini credential.
const API_KEY_VARS: [&str; 2] = ["GOOGLE_AI_API_KEY", "GEMINI_API_KEY"];

/// Delays inserted before the next question request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// After the welcome message, before the first question.
    pub welcome_delay_ms: u64,
    /// After feedback, before the next question.
    pub feedback_delay_ms: u64,
    /// Hold the next question until narration has finished playing.
    pub wait_for_narration: bool,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            welcome_delay_ms: 2000,
            feedback_delay_ms: 3000,
            wait_for_narration: true,
        }
    }
}

impl PacingConfig {
    /// No delays at all; used by tests and scripted sessions.
    pub fn immediate() -> Self {
        Self {
            welcome_delay_ms: 0,
            feedback_delay_ms: 0,
            wait_for_narration: true,
        }
    }

    pub fn welcome_delay(&self) -> Duration {
        Duration::from_millis(self.welcome_delay_ms)
    }

    pub fn feedback_delay(&self) -> Duration {
        Duration::from_millis(self.feedback_delay_ms)
    }
}

/// Speech input/output tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Narration speed in words per minute.
    pub rate_wpm: u32,
    /// Overrides the platform TTS command (`say` / `espeak-ng`). Any other
    /// program is run with the text as its only argument.
    pub tts_program: Option<String>,
    /// Play short tones when listening starts and stops.
    pub cues: bool,
    /// Length of each chime, both notes together.
    pub cue_ms: u64,
    /// Chime loudness, 0.0 to 1.0.
    pub cue_volume: f32,
    /// Trailing quiet that ends an utterance.
    pub silence_ms: u64,
    pub max_utterance_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            rate_wpm: 157,
            tts_program: None,
            cues: true,
            cue_ms: 120,
            cue_volume: 0.2,
            silence_ms: 1200,
            max_utterance_secs: 60,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gemini_api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub response_language: String,
    pub generation_timeout_secs: Option<u64>,
    pub voice_mode: bool,
    pub pacing: PacingConfig,
    pub speech: SpeechConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            model: "gemini-2.0-flash".into(),
            temperature: 0.7,
            max_output_tokens: 512,
            response_language: "English".into(),
            generation_timeout_secs: None,
            voice_mode: false,
            pacing: PacingConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl Config {
    /// Directory: ~/.config/interview-sim/
    fn dir() -> PathBuf {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("interview-sim");
        p
    }

    fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from disk, returning defaults if the file doesn't exist or is
    /// invalid, then apply environment overrides.
    pub fn load() -> Self {
        let path = Self::path();
        let mut config = match fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid config {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Persist to disk. The credential is written as loaded from the file,
    /// never the environment value.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let dir = Self::dir();
        fs::create_dir_all(&dir)?;
        let on_disk: Config = fs::read_to_string(Self::path())
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default();
        let mut to_write = self.clone();
        to_write.gemini_api_key = on_disk.gemini_api_key;
        let data = serde_json::to_string_pretty(&to_write)?;
        fs::write(Self::path(), data)?;
        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = API_KEY_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.trim().is_empty())
        {
            self.gemini_api_key = key.trim().to_string();
        }
    }

    /// `None` when no credential is configured.
    pub fn api_key(&self) -> Option<&str> {
        let key = self.gemini_api_key.trim();
        (!key.is_empty()).then_some(key)
    }

    pub fn generation_timeout(&self) -> Option<Duration> {
        self.generation_timeout_secs.map(Duration::from_secs)
    }
}
