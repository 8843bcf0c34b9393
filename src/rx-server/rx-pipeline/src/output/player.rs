// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::{Path, PathBuf};

use rx_core::{RxError, RxResult};

/// Looping WAV source. Each playback opens a fresh player; there is no
/// rewind.
pub struct WavPlayer {
    samples: Vec<f32>,
    pos: usize,
    path: PathBuf,
    sample_rate: u32,
}

impl WavPlayer {
    /// Load a 16-bit PCM file; multi-channel files are mixed down to mono.
    pub fn open(path: &Path) -> RxResult<Self> {
        let io_err = |e: hound::Error| RxError::io(format!("{}: {e}", path.display()));
        let reader = hound::WavReader::open(path).map_err(io_err)?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(RxError::io(format!(
                "{}: expected 16-bit PCM",
                path.display()
            )));
        }
        let channels = spec.channels.max(1) as usize;
        let raw = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<i16>, _>>()
            .map_err(io_err)?;
        let samples = raw
            .chunks(channels)
            .map(|frame| {
                frame.iter().map(|&s| s as f32 / i16::MAX as f32).sum::<f32>() / channels as f32
            })
            .collect();
        Ok(Self {
            samples,
            pos: 0,
            path: path.to_path_buf(),
            sample_rate: spec.sample_rate,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Fill `out` with the next `count` samples, wrapping at the end.
    /// An empty file plays silence.
    pub fn read(&mut self, count: usize, out: &mut Vec<f32>) {
        out.clear();
        if self.samples.is_empty() {
            out.resize(count, 0.0);
            return;
        }
        while out.len() < count {
            let want = count - out.len();
            let end = (self.pos + want).min(self.samples.len());
            out.extend_from_slice(&self.samples[self.pos..end]);
            self.pos = if end == self.samples.len() { 0 } else { end };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::WavRecorder;

    fn write_wav(path: &Path, samples: &[f32]) {
        let mut rec = WavRecorder::create(path, 44_100).unwrap();
        rec.write(samples).unwrap();
        rec.finalize().unwrap();
    }

    #[test]
    fn test_loops_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_wav(&path, &[0.5, -0.5, 0.25]);

        let mut player = WavPlayer::open(&path).unwrap();
        assert_eq!(player.len(), 3);
        assert_eq!(player.sample_rate(), 44_100);
        let mut out = Vec::new();
        player.read(7, &mut out);
        assert_eq!(out.len(), 7);
        assert!((out[0] - 0.5).abs() < 1e-3);
        assert!((out[3] - 0.5).abs() < 1e-3);
        assert!((out[5] - 0.25).abs() < 1e-3);
        assert!((out[6] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_fresh_player_starts_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.wav");
        write_wav(&path, &[0.1, 0.2, 0.3, 0.4]);

        let mut first = WavPlayer::open(&path).unwrap();
        let mut out = Vec::new();
        first.read(3, &mut out);
        let mut second = WavPlayer::open(&path).unwrap();
        second.read(1, &mut out);
        assert!((out[0] - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_empty_file_plays_silence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, &[]);
        let mut player = WavPlayer::open(&path).unwrap();
        assert!(player.is_empty());
        let mut out = Vec::new();
        player.read(5, &mut out);
        assert_eq!(out, vec![0.0; 5]);
    }

    #[test]
    fn test_missing_file() {
        let err = WavPlayer::open(Path::new("/nonexistent.wav")).err().unwrap();
        assert!(matches!(err, RxError::Io(_)));
    }
}
