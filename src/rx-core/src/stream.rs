// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Framing for the audio and telemetry TCP streams.
//!
//! Wire format: `[1 byte type][4 bytes BE length N][N bytes payload]`.
//! A telemetry payload carries the three bus parts `[topic, meta, payload]`,
//! each prefixed with its own 4 byte BE length.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::telemetry::TelemetryMessage;

pub const MSG_STREAM_INFO: u8 = 0x00;
pub const MSG_AUDIO_FRAME: u8 = 0x01;
pub const MSG_TELEMETRY: u8 = 0x10;

/// Maximum payload size (1 MB) to reject bogus frames early.
const MAX_PAYLOAD_SIZE: u32 = 1_048_576;

/// First message on an audio stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    pub channels: u8,
    /// Always `s16le`.
    pub format: String,
}

impl AudioStreamInfo {
    pub fn pcm_s16le(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            format: "s16le".to_string(),
        }
    }
}

pub async fn write_msg<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg_type: u8,
    payload: &[u8],
) -> std::io::Result<()> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_PAYLOAD_SIZE)
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("frame too large: {} bytes", payload.len()),
            )
        })?;
    writer.write_u8(msg_type).await?;
    writer.write_u32(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one message, returning `(type, payload)`.
pub async fn read_msg<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<(u8, Vec<u8>)> {
    let msg_type = reader.read_u8().await?;
    let len = reader.read_u32().await?;
    if len > MAX_PAYLOAD_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes", len),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok((msg_type, payload))
}

/// Float audio in [-1, 1] to 16-bit little-endian PCM; louder samples clip.
pub fn encode_pcm_s16le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn encode_telemetry(msg: &TelemetryMessage) -> Vec<u8> {
    let parts = msg.parts();
    let mut out = Vec::with_capacity(parts.iter().map(|p| p.len() + 4).sum());
    for part in &parts {
        out.extend_from_slice(&(part.len() as u32).to_be_bytes());
        out.extend_from_slice(part);
    }
    out
}

/// Split a telemetry payload back into `[topic, meta, payload]`.
pub fn decode_telemetry(mut data: &[u8]) -> Option<TelemetryMessage> {
    let mut parts: Vec<Bytes> = Vec::with_capacity(3);
    for _ in 0..3 {
        let (len, rest) = data.split_first_chunk::<4>()?;
        let len = u32::from_be_bytes(*len) as usize;
        if rest.len() < len {
            return None;
        }
        parts.push(Bytes::copy_from_slice(&rest[..len]));
        data = &rest[len..];
    }
    if !data.is_empty() {
        return None;
    }
    let payload = parts.pop()?;
    let meta = parts.pop()?;
    let topic = String::from_utf8(parts.pop()?.to_vec()).ok()?;
    Some(TelemetryMessage {
        topic,
        meta,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{topics, FftMetadata};

    #[tokio::test]
    async fn test_frame_over_pipe() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_msg(&mut a, MSG_AUDIO_FRAME, &[1, 2, 3]).await.unwrap();
        assert_eq!(read_msg(&mut b).await.unwrap(), (MSG_AUDIO_FRAME, vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_oversized_length_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u8(MSG_AUDIO_FRAME).await.unwrap();
        a.write_u32(MAX_PAYLOAD_SIZE + 1).await.unwrap();
        let err = read_msg(&mut b).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_pcm_clips() {
        let pcm = encode_pcm_s16le(&[0.0, 1.0, -2.0, 0.5]);
        assert_eq!(pcm.len(), 8);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 0);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[4], pcm[5]]), -i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[6], pcm[7]]), 16383);
    }

    #[test]
    fn test_telemetry_parts() {
        let msg = TelemetryMessage::fft_linear(&FftMetadata::new(2, 250_000), &[1.0, 0.5]).unwrap();
        let decoded = decode_telemetry(&encode_telemetry(&msg)).unwrap();
        assert_eq!(decoded.topic, topics::FFT_LINEAR);
        assert_eq!(decoded, msg);

        let mut truncated = encode_telemetry(&msg);
        truncated.pop();
        assert!(decode_telemetry(&truncated).is_none());
    }
}
