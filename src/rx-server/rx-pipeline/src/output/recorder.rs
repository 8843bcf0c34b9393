// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rx_core::{RxError, RxResult};

/// `YYYY.MM.DD-hh.mm.ss.wav`, or with a `-N` suffix for the N-th collision.
pub fn recording_file_name(now: &DateTime<Local>, collision: u32) -> String {
    let stamp = now.format("%Y.%m.%d-%H.%M.%S");
    if collision == 0 {
        format!("{stamp}.wav")
    } else {
        format!("{stamp}-{collision}.wav")
    }
}

/// First free recording path in `dir` for the given timestamp.
pub fn unique_recording_path(dir: &Path, now: &DateTime<Local>) -> PathBuf {
    let mut collision = 0;
    loop {
        let candidate = dir.join(recording_file_name(now, collision));
        if !candidate.exists() {
            return candidate;
        }
        collision += 1;
    }
}

fn wav_error(path: &Path, err: hound::Error) -> RxError {
    RxError::io(format!("{}: {err}", path.display()))
}

/// 16-bit mono WAV writer fed from the AF gain output.
pub struct WavRecorder {
    writer: hound::WavWriter<BufWriter<File>>,
    path: PathBuf,
    samples_written: u64,
}

impl WavRecorder {
    pub fn create(path: &Path, sample_rate: u32) -> RxResult<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec).map_err(|e| wav_error(path, e))?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            samples_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    pub fn write(&mut self, samples: &[f32]) -> RxResult<()> {
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            self.writer
                .write_sample(value)
                .map_err(|e| wav_error(&self.path, e))?;
        }
        self.samples_written += samples.len() as u64;
        Ok(())
    }

    /// Patch the header and close the file.
    pub fn finalize(self) -> RxResult<PathBuf> {
        let Self { writer, path, .. } = self;
        writer.finalize().map_err(|e| wav_error(&path, e))?;
        Ok(path)
    }
}
