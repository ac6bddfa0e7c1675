pub mod capture;
pub mod decode;
pub mod merge;
pub mod segments;

pub use capture::{
    pick_format, CaptureAdapter, CaptureConfig, CaptureDevice, CaptureState, FileCaptureDevice,
    PREFERRED_FORMATS,
};
pub use decode::{decode, DecodedAudio};
pub use merge::{concat_decoded, encode_wav, merge_segments, to_pcm16, MergedAudio};
pub use segments::{AudioSegment, SegmentStore, MAX_SEGMENTS};
