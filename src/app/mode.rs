use crate::error::ModeError;

/// Snapshot of the busy flags, for the input surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeFlags {
    pub voice_mode_enabled: bool,
    pub is_listening: bool,
    pub is_speaking: bool,
    pub is_awaiting_generation: bool,
}

impl ModeFlags {
    /// Whether a typed submission would currently be accepted.
    pub fn can_submit(&self) -> bool {
        !self.is_awaiting_generation
    }

    /// Whether the microphone control is currently usable.
    pub fn can_listen(&self) -> bool {
        self.voice_mode_enabled
            && !self.is_listening
            && !self.is_speaking
            && !self.is_awaiting_generation
    }
}

/// Voice-mode preference plus the busy flags that gate surface actions.
///
/// Invariants: listening and speaking are never both set, and at most one
/// generation request is outstanding.
#[derive(Debug, Clone, Default)]
pub struct ModeController {
    flags: ModeFlags,
}

impl ModeController {
    pub fn new(voice_mode_enabled: bool) -> Self {
        Self {
            flags: ModeFlags {
                voice_mode_enabled,
                ..ModeFlags::default()
            },
        }
    }

    pub fn flags(&self) -> ModeFlags {
        self.flags
    }

    pub fn voice_mode_enabled(&self) -> bool {
        self.flags.voice_mode_enabled
    }

    pub fn is_listening(&self) -> bool {
        self.flags.is_listening
    }

    pub fn is_speaking(&self) -> bool {
        self.flags.is_speaking
    }

    pub fn is_awaiting_generation(&self) -> bool {
        self.flags.is_awaiting_generation
    }

    pub fn enable_voice_mode(&mut self) {
        self.flags.voice_mode_enabled = true;
    }

    /// Turn voice mode off. Returns `(was_speaking, was_listening)`; the
    /// caller must cancel the matching port operations. Generation is
    /// left untouched.
    pub fn disable_voice_mode(&mut self) -> (bool, bool) {
        let was_speaking = self.flags.is_speaking;
        let was_listening = self.flags.is_listening;
        self.flags.voice_mode_enabled = false;
        self.flags.is_speaking = false;
        self.flags.is_listening = false;
        (was_speaking, was_listening)
    }

    pub fn begin_listening(&mut self) -> Result<(), ModeError> {
        if !self.flags.voice_mode_enabled {
            return Err(ModeError::VoiceModeDisabled);
        }
        if self.flags.is_speaking {
            return Err(ModeError::Speaking);
        }
        if self.flags.is_listening {
            return Err(ModeError::Listening);
        }
        self.flags.is_listening = true;
        Ok(())
    }

    pub fn end_listening(&mut self) {
        self.flags.is_listening = false;
    }

    pub fn begin_speaking(&mut self) -> Result<(), ModeError> {
        if !self.flags.voice_mode_enabled {
            return Err(ModeError::VoiceModeDisabled);
        }
        if self.flags.is_listening {
            return Err(ModeError::Listening);
        }
        self.flags.is_speaking = true;
        Ok(())
    }

    pub fn end_speaking(&mut self) {
        self.flags.is_speaking = false;
    }

    pub fn begin_generation(&mut self) -> Result<(), ModeError> {
        if self.flags.is_awaiting_generation {
            return Err(ModeError::GenerationOutstanding);
        }
        self.flags.is_awaiting_generation = true;
        Ok(())
    }

    pub fn end_generation(&mut self) {
        self.flags.is_awaiting_generation = false;
    }

    /// Clear every busy flag; the voice-mode preference survives.
    pub fn reset(&mut self) {
        self.flags = ModeFlags {
            voice_mode_enabled: self.flags.voice_mode_enabled,
            ..ModeFlags::default()
        };
    }
}
