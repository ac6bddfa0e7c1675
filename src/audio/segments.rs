use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::capture::mime_for_path;
use crate::error::{IntakeError, Result};

/// Number of segment slots in a multi-part dictation
pub const MAX_SEGMENTS: usize = 4;

/// One completed, still-encoded recording
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Encoded audio as produced by the capture adapter
    pub blob: Arc<[u8]>,
    /// Container mime type (may be empty for the device default)
    pub mime: String,
    /// Elapsed seconds reported by the recorder
    pub recorded_seconds: u64,
}

impl AudioSegment {
    pub fn new(blob: impl Into<Arc<[u8]>>, mime: impl Into<String>, recorded_seconds: u64) -> Self {
        Self {
            blob: blob.into(),
            mime: mime.into(),
            recorded_seconds,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Ok(Self::new(data, mime_for_path(path), 0))
    }
}

/// Holds up to four segments keyed by position (1-based)
#[derive(Debug, Default)]
pub struct SegmentStore {
    slots: [Option<AudioSegment>; MAX_SEGMENTS],
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(position: usize) -> Result<usize> {
        if (1..=MAX_SEGMENTS).contains(&position) {
            Ok(position - 1)
        } else {
            Err(IntakeError::InvalidSegmentPosition(position))
        }
    }

    /// Put a segment in a slot, returning whatever it replaced
    pub fn insert(&mut self, position: usize, segment: AudioSegment) -> Result<Option<AudioSegment>> {
        let idx = Self::index(position)?;
        info!(
            "Segment {} stored ({} bytes, {}s)",
            position,
            segment.blob.len(),
            segment.recorded_seconds
        );
        Ok(self.slots[idx].replace(segment))
    }

    pub fn get(&self, position: usize) -> Result<Option<&AudioSegment>> {
        Ok(self.slots[Self::index(position)?].as_ref())
    }

    pub fn remove(&mut self, position: usize) -> Result<Option<AudioSegment>> {
        let idx = Self::index(position)?;
        Ok(self.slots[idx].take())
    }

    /// Populated segments in slot order, gaps skipped
    pub fn populated(&self) -> Vec<&AudioSegment> {
        self.slots.iter().flatten().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }
}
