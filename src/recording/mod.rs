//! Recording lifecycle
//!
//! - `Recorder`: Idle/Recording/Paused/Recorded state machine with elapsed
//!   time tracking, driven directly or through a command channel
//! - `PlaybackSlot`: at most one active playback of a finished recording

mod playback;
mod recorder;

pub use playback::{Playback, PlaybackSlot};
pub use recorder::{Recorder, RecorderCommand, RecordingSession, RecordingStatus};
