// Audio merge engine
//
// Concatenates (never mixes) decoded segments into one continuous track and
// re-encodes it as 16-bit PCM WAV. The first segment defines the output
// sample rate and channel layout:
// - a later segment with fewer channels fills only those channels for its
//   region, the rest stay silent
// - a later segment with more channels has the extras dropped
// No resampling is done; segments are expected to come from one device.

use std::io::Cursor;

use tracing::{info, warn};

use super::decode::{decode, DecodedAudio};
use super::segments::AudioSegment;
use crate::error::{IntakeError, Result};

/// A merged dictation ready for upload
#[derive(Debug, Clone)]
pub struct MergedAudio {
    /// RIFF/WAVE bytes, 16-bit PCM
    pub wav: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: usize,
    pub duration_seconds: f64,
}

/// Concatenate decoded segments in order
pub fn concat_decoded(segments: &[DecodedAudio]) -> Result<DecodedAudio> {
    let first = segments.first().ok_or(IntakeError::NoAudioToMerge)?;
    let sample_rate = first.sample_rate;
    let channel_count = first.channel_count();

    let total_frames: usize = segments.iter().map(|s| s.frames()).sum();
    let mut channels = vec![vec![0.0f32; total_frames]; channel_count];

    let mut offset = 0usize;
    for (i, segment) in segments.iter().enumerate() {
        if segment.sample_rate != sample_rate {
            warn!(
                "Segment {} sample rate {}Hz differs from {}Hz, copying unresampled",
                i + 1,
                segment.sample_rate,
                sample_rate
            );
        }
        if segment.channel_count() != channel_count {
            warn!(
                "Segment {} has {} channels, output has {}",
                i + 1,
                segment.channel_count(),
                channel_count
            );
        }

        let frames = segment.frames();
        for (out, src) in channels.iter_mut().zip(segment.channels.iter()) {
            let n = src.len().min(frames);
            out[offset..offset + n].copy_from_slice(&src[..n]);
        }
        offset += frames;
    }

    Ok(DecodedAudio {
        sample_rate,
        channels,
    })
}

/// Scale a float sample to 16-bit, clamping to [-1, 1] before truncation
pub fn to_pcm16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode planar samples as a 16-bit little-endian PCM WAV file
pub fn encode_wav(audio: &DecodedAudio) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: audio.channel_count() as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for frame in 0..audio.frames() {
            for channel in &audio.channels {
                writer.write_sample(to_pcm16(channel[frame]))?;
            }
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Decode each segment in turn, concatenate, and re-encode as WAV
pub fn merge_segments(segments: &[&AudioSegment]) -> Result<MergedAudio> {
    if segments.is_empty() {
        return Err(IntakeError::NoAudioToMerge);
    }

    let mut decoded = Vec::with_capacity(segments.len());
    for segment in segments {
        let mime = (!segment.mime.is_empty()).then_some(segment.mime.as_str());
        decoded.push(decode(&segment.blob, mime)?);
    }

    let merged = concat_decoded(&decoded)?;
    let wav = encode_wav(&merged)?;

    let result = MergedAudio {
        sample_rate: merged.sample_rate,
        channels: merged.channel_count() as u16,
        frames: merged.frames(),
        duration_seconds: merged.duration_seconds(),
        wav,
    };

    info!(
        "Merged {} segments: {:.2}s, {}Hz, {} channels, {} bytes",
        segments.len(),
        result.duration_seconds,
        result.sample_rate,
        result.channels,
        result.wav.len()
    );

    Ok(result)
}
