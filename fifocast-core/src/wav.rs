//! Canonical 44-byte WAV header encoding.
//!
//! The stream is unbounded, so the data-length field carries a fixed
//! sentinel (the maximum positive value for the field) instead of a real
//! length. Players treat it as "very long"; this is a deliberate deviation
//! from strict WAV validity and must not be "fixed" to a finite length.

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::AudioConfig;

/// Size of the fixed-format header.
pub const HEADER_LEN: usize = 44;

/// Declared data length for a stream of unknown, unbounded size.
pub const UNBOUNDED_DATA_LEN: u32 = 0x7FFF_FFFF;

/// Encode the header for the given PCM format and declared data length.
///
/// Layout (all little-endian): `"RIFF"`, chunk size (36 + data length),
/// `"WAVE"`, `"fmt "`, 16, format 1 (PCM), channels, sample rate,
/// byte rate, block align, bits per sample, `"data"`, data length.
#[must_use]
pub fn header(audio: &AudioConfig, data_len: u32) -> Bytes {
    let byte_rate =
        audio.sample_rate * u32::from(audio.channels) * u32::from(audio.bits_per_sample) / 8;
    let block_align = audio.channels * audio.bits_per_sample / 8;

    let mut buf = BytesMut::with_capacity(HEADER_LEN);
    buf.put_slice(b"RIFF");
    buf.put_u32_le(36 + data_len);
    buf.put_slice(b"WAVE");
    buf.put_slice(b"fmt ");
    buf.put_u32_le(16);
    buf.put_u16_le(1); // PCM
    buf.put_u16_le(audio.channels);
    buf.put_u32_le(audio.sample_rate);
    buf.put_u32_le(byte_rate);
    buf.put_u16_le(block_align);
    buf.put_u16_le(audio.bits_per_sample);
    buf.put_slice(b"data");
    buf.put_u32_le(data_len);
    buf.freeze()
}
