pub mod audio;
pub mod config;
pub mod counters;
pub mod error;
pub mod recording;
pub mod session;
pub mod submission;

pub use audio::{
    AudioSegment, CaptureAdapter, CaptureConfig, CaptureDevice, DecodedAudio, FileCaptureDevice,
    MergedAudio, SegmentStore,
};
pub use config::Config;
pub use counters::{CounterStore, CountersRecord, CountersService, HttpCounterStore, MemoryCounterStore};
pub use error::{IntakeError, Result};
pub use recording::{Recorder, RecorderCommand, RecordingSession, RecordingStatus};
pub use session::{AuthEvent, Identity, SessionContext};
pub use submission::{
    CaseObservation, DictationKind, SubmissionAssembler, SubmissionPayload, SubmissionReceipt,
    WebhookClient,
};
