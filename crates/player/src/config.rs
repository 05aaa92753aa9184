// Initial configuration for a media player

use podium_mediaplayer_core::{PlayerError, Result};

/// Audio stream type used when none is configured (music)
pub const DEFAULT_STREAM_TYPE: i32 = 3;

/// Unity gain
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Values a player starts with. They can all be changed later through the
/// corresponding setters on [`crate::MediaPlayer`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    pub stream_type: i32,
    pub volume_left: f32,
    pub volume_right: f32,
    pub audio_session_id: i32,
    pub aux_send_level: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            stream_type: DEFAULT_STREAM_TYPE,
            volume_left: DEFAULT_VOLUME,
            volume_right: DEFAULT_VOLUME,
            audio_session_id: 0,
            aux_send_level: 0.0,
        }
    }
}

impl PlayerConfig {
    pub fn with_stream_type(mut self, stream_type: i32) -> Self {
        self.stream_type = stream_type;
        self
    }

    pub fn with_volume(mut self, left: f32, right: f32) -> Self {
        self.volume_left = left;
        self.volume_right = right;
        self
    }

    pub fn with_audio_session_id(mut self, session_id: i32) -> Self {
        self.audio_session_id = session_id;
        self
    }

    pub fn with_aux_send_level(mut self, level: f32) -> Self {
        self.aux_send_level = level;
        self
    }

    /// Apply the same rules as the setters.
    pub fn validate(&self) -> Result<()> {
        check_unit_range("volume_left", self.volume_left)?;
        check_unit_range("volume_right", self.volume_right)?;
        check_unit_range("aux_send_level", self.aux_send_level)?;
        if self.audio_session_id < 0 {
            return Err(PlayerError::BadValue(format!(
                "audio session id {} is negative",
                self.audio_session_id
            )));
        }
        Ok(())
    }
}

/// Gains and send levels live in [0.0, 1.0]. NaN is rejected too.
pub(crate) fn check_unit_range(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PlayerError::BadValue(format!(
            "{} out of range: {}",
            name, value
        )))
    }
}
