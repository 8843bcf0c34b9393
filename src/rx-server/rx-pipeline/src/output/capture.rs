// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use num_complex::Complex;
use rx_core::{RxError, RxResult};

/// Raw IQ file: interleaved little-endian f32 I/Q pairs.
pub struct IqCapture {
    writer: BufWriter<File>,
    path: PathBuf,
    samples_written: u64,
}

impl IqCapture {
    pub fn create(path: &Path) -> RxResult<Self> {
        let file = File::create(path)
            .map_err(|e| RxError::io(format!("{}: {e}", path.display())))?;
        Ok(Self {
            writer: BufWriter::new(file),
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

    pub fn write(&mut self, samples: &[Complex<f32>]) -> RxResult<()> {
        for sample in samples {
            self.writer.write_all(&sample.re.to_le_bytes())?;
            self.writer.write_all(&sample.im.to_le_bytes())?;
        }
        self.samples_written += samples.len() as u64;
        Ok(())
    }

    pub fn finish(mut self) -> RxResult<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_le_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.iq");
        let mut cap = IqCapture::create(&path).unwrap();
        cap.write(&[Complex::new(1.0, -2.0), Complex::new(0.5, 0.25)])
            .unwrap();
        assert_eq!(cap.samples_written(), 2);
        assert_eq!(cap.finish().unwrap(), path);

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw.len(), 16);
        let values: Vec<f32> = raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(values, vec![1.0, -2.0, 0.5, 0.25]);
    }

    #[test]
    fn test_create_failure_is_io() {
        let err = IqCapture::create(Path::new("/nonexistent/dir/snap.iq"))
            .err()
            .unwrap();
        assert!(matches!(err, RxError::Io(_)));
    }
}
