//! PCM wire codec: Float32 <-> Int16 little-endian, base64 framing, WAV wrapping.
//!
//! Outbound audio is 16-bit mono PCM, base64 encoded for `input_audio_buffer.append`.
//! Inbound `response.audio.delta` payloads are raw PCM16 without a container; they are
//! wrapped in a 44-byte RIFF/WAVE header so the playback decoder can open them.
//! Neither direction ever splits a sample across a chunk boundary.

use crate::error::{VoiceError, VoiceResult};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;

pub const WAV_HEADER_LEN: usize = 44;

/// Convert one sample in [-1, 1] to Int16 (asymmetric scale, rounded).
pub fn f32_to_i16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled.round() as i16
}

/// Inverse of [`f32_to_i16`].
pub fn i16_to_f32(sample: i16) -> f32 {
    if sample < 0 {
        sample as f32 / 32768.0
    } else {
        sample as f32 / 32767.0
    }
}

/// Float32 samples -> Int16LE bytes.
pub fn pcm16_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        out.extend_from_slice(&f32_to_i16(s).to_le_bytes());
    }
    out
}

/// Float32 samples -> base64(Int16LE) as sent on the wire.
pub fn encode_base64(samples: &[f32]) -> String {
    B64.encode(pcm16_bytes(samples))
}

/// Frames outbound audio into fixed-size blocks.
///
/// Samples that do not fill a block are held until the next call or `flush`.
#[derive(Debug, Clone)]
pub struct PcmEncoder {
    frame_size: usize,
    pending: Vec<f32>,
}

impl PcmEncoder {
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            pending: Vec::with_capacity(frame_size),
        }
    }

    /// Append samples, returning one base64 payload per completed block.
    pub fn push(&mut self, samples: &[f32]) -> Vec<String> {
        self.pending.extend_from_slice(samples);
        let full = self.pending.len() / self.frame_size * self.frame_size;
        if full == 0 {
            return Vec::new();
        }
        let ready: Vec<f32> = self.pending.drain(..full).collect();
        ready.chunks(self.frame_size).map(encode_base64).collect()
    }

    /// Emit whatever is buffered (end of turn). Empty when nothing is pending.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(encode_base64(&rest))
    }

    /// Drop buffered samples without sending them.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }
}

/// Reassembles inbound PCM16 deltas into whole samples.
///
/// A delta with an odd byte count leaves its last byte in `carry` until the next delta.
#[derive(Debug, Clone, Default)]
pub struct PcmDecoder {
    carry: Option<u8>,
}

impl PcmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every complete sample.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<i16> {
        let mut out = Vec::with_capacity((bytes.len() + 1) / 2);
        let mut rest = bytes;
        if let Some(lo) = self.carry.take() {
            match rest.split_first() {
                Some((&hi, tail)) => {
                    out.push(i16::from_le_bytes([lo, hi]));
                    rest = tail;
                }
                None => {
                    self.carry = Some(lo);
                    return out;
                }
            }
        }
        let mut chunks = rest.chunks_exact(2);
        for pair in &mut chunks {
            out.push(i16::from_le_bytes([pair[0], pair[1]]));
        }
        if let [last] = chunks.remainder() {
            self.carry = Some(*last);
        }
        out
    }

    /// Decode one base64 delta.
    pub fn push_base64(&mut self, payload: &str) -> VoiceResult<Vec<i16>> {
        let bytes = B64
            .decode(payload.trim())
            .map_err(|e| VoiceError::Decode(format!("invalid base64 audio: {}", e)))?;
        Ok(self.push_bytes(&bytes))
    }

    pub fn has_partial_sample(&self) -> bool {
        self.carry.is_some()
    }

    pub fn reset(&mut self) {
        self.carry = None;
    }
}

/// base64(Int16LE) -> Float32. Rejects payloads that end mid-sample.
pub fn decode_base64(payload: &str) -> VoiceResult<Vec<f32>> {
    let mut decoder = PcmDecoder::new();
    let samples = decoder.push_base64(payload)?;
    if decoder.has_partial_sample() {
        return Err(VoiceError::Decode("payload ends mid-sample".to_string()));
    }
    Ok(samples.into_iter().map(i16_to_f32).collect())
}

/// Minimal 44-byte RIFF/WAVE header for mono PCM16.
pub fn wav_header(data_len: u32, sample_rate: u32) -> [u8; WAV_HEADER_LEN] {
    let mut h = [0u8; WAV_HEADER_LEN];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&(36u32.wrapping_add(data_len)).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    h[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    h[22..24].copy_from_slice(&1u16.to_le_bytes()); // mono
    h[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&(sample_rate * 2).to_le_bytes()); // byte rate
    h[32..34].copy_from_slice(&2u16.to_le_bytes()); // block align
    h[34..36].copy_from_slice(&16u16.to_le_bytes()); // bits per sample
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_len.to_le_bytes());
    h
}

/// Wrap whole Int16 samples in a WAV container.
pub fn wrap_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2);
    out.extend_from_slice(&wav_header(data_len, sample_rate));
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asymmetric_scaling() {
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.0), -32768);
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(2.0), 32767);
        assert_eq!(f32_to_i16(f32::NAN), 0);
        assert_eq!(i16_to_f32(-32768), -1.0);
        assert_eq!(i16_to_f32(32767), 1.0);
    }

    #[test]
    fn round_trip_within_quantization_error() {
        let frame_size = 480;
        let buffer: Vec<f32> = (0..frame_size * 4)
            .map(|i| ((i as f32) * 0.013).sin() * 0.9)
            .collect();

        let mut encoder = PcmEncoder::new(frame_size);
        let payloads = encoder.push(&buffer);
        assert_eq!(payloads.len(), 4);
        assert!(encoder.flush().is_none());

        let decoded: Vec<f32> = payloads
            .iter()
            .flat_map(|p| decode_base64(p).unwrap())
            .collect();
        assert_eq!(decoded.len(), buffer.len());
        for (a, b) in buffer.iter().zip(decoded.iter()) {
            assert!((a - b).abs() <= 1.0 / 32768.0, "{} vs {}", a, b);
        }
    }

    #[test]
    fn encoder_holds_partial_block() {
        let mut encoder = PcmEncoder::new(4);
        assert!(encoder.push(&[0.1, 0.2, 0.3]).is_empty());
        assert_eq!(encoder.pending_samples(), 3);
        let out = encoder.push(&[0.4, 0.5]);
        assert_eq!(out.len(), 1);
        assert_eq!(encoder.pending_samples(), 1);
        let tail = encoder.flush().unwrap();
        assert_eq!(decode_base64(&tail).unwrap().len(), 1);
    }

    #[test]
    fn decoder_carries_odd_byte_across_deltas() {
        let bytes = pcm16_bytes(&[0.5, -0.25, 0.75]);
        let mut decoder = PcmDecoder::new();
        let first = decoder.push_bytes(&bytes[..3]);
        assert_eq!(first.len(), 1);
        assert!(decoder.has_partial_sample());
        let second = decoder.push_bytes(&bytes[3..]);
        assert_eq!(second.len(), 2);
        assert!(!decoder.has_partial_sample());
        assert_eq!(second[0], f32_to_i16(-0.25));
    }

    #[test]
    fn odd_payload_is_a_decode_error() {
        let payload = B64.encode([1u8, 2, 3]);
        assert!(matches!(decode_base64(&payload), Err(VoiceError::Decode(_))));
        assert!(matches!(decode_base64("!!not base64"), Err(VoiceError::Decode(_))));
    }

    #[test]
    fn wav_header_layout() {
        let wav = wrap_wav(&[1, -1, 2], 24000);
        assert_eq!(wav.len(), 44 + 6);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 6);
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 1);
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 24000);
        assert_eq!(u16::from_le_bytes([wav[34], wav[35]]), 16);
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 6);
    }
}
