use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::oneshot;

use super::{PlaybackHandle, SpeechPlayback, SpeechSink};
use crate::app::{SpeechEvent, Ticket};
use crate::config::SpeechConfig;
use crate::error::PlaybackFailure;

/// Speaks through the platform TTS command: `say` on macOS, `espeak-ng`
/// elsewhere. Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    rate_wpm: u32,
}

impl CommandSpeaker {
    pub fn from_config(speech: &SpeechConfig) -> Self {
        #[cfg(target_os = "macos")]
        let default_program = "say";
        #[cfg(not(target_os = "macos"))]
        let default_program = "espeak-ng";

        Self {
            program: speech
                .tts_program
                .clone()
                .unwrap_or_else(|| default_program.to_string()),
            rate_wpm: speech.rate_wpm,
        }
    }

    /// `--` keeps text that starts with a dash from being read as a flag.
    /// Programs other than `say` and `espeak` get the text alone.
    fn args(&self, text: &str) -> Vec<String> {
        let name = Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program);
        let rate = self.rate_wpm.to_string();
        match name {
            "say" => vec!["-r".into(), rate, "--".into(), text.into()],
            "espeak" | "espeak-ng" => vec![
                "-s".into(),
                rate,
                "-v".into(),
                "en-us".into(),
                "--".into(),
                text.into(),
            ],
            _ => vec!["--".into(), text.into()],
        }
    }
}

impl SpeechPlayback for CommandSpeaker {
    fn speak(
        &self,
        text: &str,
        ticket: Ticket,
        sink: SpeechSink,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackFailure> {
        let mut child = Command::new(&self.program)
            .args(self.args(text))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlaybackFailure::Spawn(format!("{}: {e}", self.program)))?;

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        sink.emit(SpeechEvent::PlaybackStarted { ticket });

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => {
                        sink.emit(SpeechEvent::PlaybackFinished { ticket });
                    }
                    Ok(status) => {
                        sink.emit(SpeechEvent::PlaybackFailed {
                            ticket,
                            error: PlaybackFailure::Exited(status.to_string()),
                        });
                    }
                    Err(e) => {
                        sink.emit(SpeechEvent::PlaybackFailed {
                            ticket,
                            error: PlaybackFailure::Exited(e.to_string()),
                        });
                    }
                },
                // Cancelled or handle dropped; the child is killed on drop.
                _ = cancel_rx => {
                    log::debug!("Playback {ticket:?} cancelled");
                }
            }
        });

        Ok(Box::new(CommandPlayback {
            cancel: Some(cancel_tx),
        }))
    }
}

struct CommandPlayback {
    cancel: Option<oneshot::Sender<()>>,
}

impl PlaybackHandle for CommandPlayback {
    fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }
}
