/// Audio output errors
use chorus_playback::OutputError;
use thiserror::Error;

/// Result type for audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// URI scheme this backend cannot open
    #[error("Unsupported URI: {0}")]
    UnsupportedUri(String),

    /// Device not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// The audio thread has exited
    #[error("Audio thread is not running")]
    ThreadGone,

    /// Handle id unknown to the audio thread
    #[error("Handle is unloaded")]
    Unloaded,

    /// Downloading or reading the resource failed
    #[error("Failed to fetch audio: {0}")]
    Fetch(String),

    /// Unsupported or corrupt audio data
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    /// Seeking is not supported by the decoder
    #[error("Seek failed: {0}")]
    Seek(String),
}

impl From<AudioError> for OutputError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::UnsupportedUri(_) | AudioError::Decode(_) => {
                OutputError::Decode(err.to_string())
            }
            AudioError::DeviceNotFound(_) | AudioError::ThreadGone => {
                OutputError::Unavailable(err.to_string())
            }
            AudioError::Unloaded => OutputError::Unloaded,
            AudioError::Fetch(_) => OutputError::Network(err.to_string()),
            AudioError::Seek(_) => OutputError::Other(err.to_string()),
        }
    }
}

#[cfg(feature = "device")]
impl From<reqwest::Error> for AudioError {
    fn from(err: reqwest::Error) -> Self {
        AudioError::Fetch(err.to_string())
    }
}

#[cfg(feature = "device")]
impl From<rodio::decoder::DecoderError> for AudioError {
    fn from(err: rodio::decoder::DecoderError) -> Self {
        AudioError::Decode(err.to_string())
    }
}

#[cfg(feature = "device")]
impl From<rodio::source::SeekError> for AudioError {
    fn from(err: rodio::source::SeekError) -> Self {
        AudioError::Seek(err.to_string())
    }
}
