use thiserror::Error;

use crate::recording::RecordingStatus;

pub type Result<T> = std::result::Result<T, IntakeError>;

/// Errors surfaced by the intake pipeline.
///
/// None of these are fatal: callers report them and stay interactive.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// Capture permission denied or no capture device present
    #[error("microphone unavailable: {0}")]
    MicrophoneUnavailable(String),

    /// Adapter used out of order, e.g. opened twice or stopped while closed
    #[error("capture not available: {0}")]
    InvalidCaptureState(String),

    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: RecordingStatus,
        action: &'static str,
    },

    #[error("segment position {0} is outside 1..=4")]
    InvalidSegmentPosition(usize),

    /// A captured blob is not valid encoded audio
    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("failed to encode WAV: {0}")]
    Encode(#[from] hound::Error),

    #[error("no audio to merge")]
    NoAudioToMerge,

    #[error("invalid submission: {0}")]
    Validation(String),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("delivery to {endpoint} failed: {reason}")]
    DeliveryFailed { endpoint: String, reason: String },

    #[error("counters store error: {0}")]
    Counters(String),
}

impl IntakeError {
    /// True for failures caught client-side before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            IntakeError::NoAudioToMerge | IntakeError::Validation(_) | IntakeError::NotAuthenticated
        )
    }
}

impl From<symphonia::core::errors::Error> for IntakeError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        IntakeError::Decode(e.to_string())
    }
}
