// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for rx-server.
//!
//! Config is loaded from the `[rx-server]` section of `rx-rs.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./rx-rs.toml`
//! 3. `~/.config/rx-rs/rx-rs.toml`
//! 4. `/etc/rx-rs/rx-rs.toml`

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

use rx_app::ConfigFile;
use rx_core::radio::gain::{DEFAULT_SQUELCH_DB, SQUELCH_MAX_DB, SQUELCH_MIN_DB};
use rx_core::radio::rates::{validate_sample_rate, DEFAULT_AUDIO_RATE, DEFAULT_SAMPLE_RATE};
use rx_core::{FreqRange, GainRange, RxMode};
use rx_pipeline::{ReceiverConfig, SpectrumConfig, Tone};
use rx_remote::{RemoteSettings, DEFAULT_REMOTE_PORT};
use serde::{Deserialize, Serialize};

pub const DEFAULT_AUDIO_PORT: u16 = 7357;
pub const DEFAULT_TELEMETRY_PORT: u16 = 7358;

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub general: GeneralConfig,
    pub device: DeviceConfig,
    pub audio: AudioConfig,
    pub receiver: ReceiverSection,
    pub recording: RecordingConfig,
    pub remote: RemoteConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// IQ source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Source kind; only "synthetic" is built in.
    pub kind: String,
    /// Input sample rate in S/s
    pub sample_rate: u32,
    /// Lowest tunable hardware frequency in Hz
    pub freq_min_hz: u64,
    /// Highest tunable hardware frequency in Hz
    pub freq_max_hz: u64,
    pub gain_min_db: f64,
    pub gain_max_db: f64,
    /// Carriers generated by the synthetic source.
    pub tones: Vec<ToneConfig>,
    /// Uniform noise amplitude added by the synthetic source.
    pub noise: f32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: "synthetic".to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            freq_min_hz: 24_000_000,
            freq_max_hz: 1_766_000_000,
            gain_min_db: 0.0,
            gain_max_db: 49.6,
            tones: Vec::new(),
            noise: 0.001,
        }
    }
}

/// One synthetic carrier, placed relative to the startup hardware frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneConfig {
    pub offset_hz: i64,
    pub amplitude: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output audio sample rate in Hz
    pub sample_rate: u32,
    /// Frames buffered per audio subscriber before old ones are dropped
    pub channel_capacity: usize,
    /// Live audio destination
    pub output: AudioOutput,
    /// IP address the PCM stream listens on
    pub listen: IpAddr,
    pub port: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_AUDIO_RATE,
            channel_capacity: 64,
            output: AudioOutput::default(),
            listen: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_AUDIO_PORT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioOutput {
    /// 16-bit mono PCM to every connected TCP client
    #[default]
    Tcp,
    /// Drop live audio; recordings still work
    None,
}

/// Initial receiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverSection {
    pub mode: RxMode,
    /// Hardware frequency in Hz; the middle of the device range when unset.
    pub frequency_hz: Option<u64>,
    pub squelch_db: f64,
}

impl Default for ReceiverSection {
    fn default() -> Self {
        Self {
            mode: RxMode::default(),
            frequency_hz: None,
            squelch_db: DEFAULT_SQUELCH_DB,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Directory for audio recordings
    pub directory: PathBuf,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            directory: default_recording_dir(),
        }
    }
}

fn default_recording_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("rx-rs"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recordings")
}

/// Remote control listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub enabled: bool,
    /// IP address to listen on
    pub listen: IpAddr,
    pub port: u16,
    /// Peers allowed to connect
    pub allowed_hosts: Vec<IpAddr>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_REMOTE_PORT,
            allowed_hosts: vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
        }
    }
}

/// In-process telemetry bus and spectrum publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// IP address the telemetry stream listens on
    pub listen: IpAddr,
    pub port: u16,
    pub fft_size: usize,
    /// Publish one spectrum frame every this many IQ blocks
    pub fft_interval_blocks: usize,
    /// Messages buffered per subscriber
    pub capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_TELEMETRY_PORT,
            fft_size: 4096,
            fft_interval_blocks: 4,
            capacity: 256,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;
        self.validate_device()?;

        if self.audio.sample_rate == 0 || self.audio.sample_rate > 192_000 {
            return Err(format!(
                "[audio].sample_rate {} must be in 1..=192000",
                self.audio.sample_rate
            ));
        }
        if self.audio.channel_capacity == 0 {
            return Err("[audio].channel_capacity must be > 0".to_string());
        }
        if self.audio.output == AudioOutput::Tcp && self.audio.port == 0 {
            return Err("[audio].port must be > 0".to_string());
        }

        if let Some(hz) = self.receiver.frequency_hz {
            if !(self.device.freq_min_hz..=self.device.freq_max_hz).contains(&hz) {
                return Err(format!(
                    "[receiver].frequency_hz {} is outside the device range {}..={}",
                    hz, self.device.freq_min_hz, self.device.freq_max_hz
                ));
            }
        }
        let sql = self.receiver.squelch_db;
        if !sql.is_finite() || !(SQUELCH_MIN_DB..=SQUELCH_MAX_DB).contains(&sql) {
            return Err(format!(
                "[receiver].squelch_db {} must be in {}..={}",
                sql, SQUELCH_MIN_DB, SQUELCH_MAX_DB
            ));
        }

        if self.recording.directory.as_os_str().is_empty() {
            return Err("[recording].directory must not be empty".to_string());
        }

        if self.remote.enabled && self.remote.port == 0 {
            return Err("[remote].port must be > 0".to_string());
        }

        if self.telemetry.enabled {
            let size = self.telemetry.fft_size;
            if size < 64 || !size.is_power_of_two() {
                return Err(format!(
                    "[telemetry].fft_size {} must be a power of two >= 64",
                    size
                ));
            }
            if self.telemetry.fft_interval_blocks == 0 {
                return Err("[telemetry].fft_interval_blocks must be > 0".to_string());
            }
            if self.telemetry.capacity == 0 {
                return Err("[telemetry].capacity must be > 0".to_string());
            }
            if self.telemetry.port == 0 {
                return Err("[telemetry].port must be > 0".to_string());
            }
        }

        let listeners = [
            ("remote", self.remote.enabled.then(|| self.remote_settings().listen)),
            ("audio", self.audio_listen_addr()),
            ("telemetry", self.telemetry_listen_addr()),
        ];
        for (i, (name, addr)) in listeners.iter().enumerate() {
            let Some(addr) = addr else { continue };
            if let Some((other, _)) = listeners[i + 1..]
                .iter()
                .find(|(_, a)| a.is_some_and(|a| a.port() == addr.port()))
            {
                return Err(format!(
                    "[{}] and [{}] both use port {}",
                    name,
                    other,
                    addr.port()
                ));
            }
        }

        Ok(())
    }

    fn validate_device(&self) -> Result<(), String> {
        let device = &self.device;
        if device.kind != "synthetic" {
            return Err(format!(
                "[device].kind '{}' is not supported (expected: synthetic)",
                device.kind
            ));
        }
        validate_sample_rate(device.sample_rate).map_err(|e| format!("[device].sample_rate: {}", e))?;
        if device.freq_min_hz == 0 || device.freq_min_hz >= device.freq_max_hz {
            return Err(format!(
                "[device] frequency range {}..={} is empty",
                device.freq_min_hz, device.freq_max_hz
            ));
        }
        if !(device.gain_min_db.is_finite() && device.gain_max_db.is_finite())
            || device.gain_min_db > device.gain_max_db
        {
            return Err(format!(
                "[device] gain range {}..={} is invalid",
                device.gain_min_db, device.gain_max_db
            ));
        }
        if !device.noise.is_finite() || device.noise < 0.0 {
            return Err("[device].noise must be >= 0".to_string());
        }
        for tone in &device.tones {
            if !tone.amplitude.is_finite() || tone.amplitude < 0.0 {
                return Err(format!(
                    "[device].tones amplitude {} must be >= 0",
                    tone.amplitude
                ));
            }
        }
        Ok(())
    }

    pub fn freq_range(&self) -> FreqRange {
        FreqRange {
            min_hz: self.device.freq_min_hz,
            max_hz: self.device.freq_max_hz,
        }
    }

    pub fn gain_range(&self) -> GainRange {
        GainRange {
            min_db: self.device.gain_min_db,
            max_db: self.device.gain_max_db,
        }
    }

    /// Hardware frequency the receiver starts on.
    pub fn startup_freq_hz(&self) -> u64 {
        self.receiver
            .frequency_hz
            .unwrap_or_else(|| self.freq_range().midpoint().hz)
    }

    /// Synthetic carriers at absolute frequencies. Tones that would land
    /// below 0 Hz are skipped.
    pub fn tones(&self) -> Vec<Tone> {
        let center = self.startup_freq_hz();
        self.device
            .tones
            .iter()
            .filter_map(|tone| {
                let freq_hz = center.checked_add_signed(tone.offset_hz)?;
                Some(Tone {
                    freq_hz,
                    amplitude: tone.amplitude,
                })
            })
            .collect()
    }

    pub fn receiver_config(&self) -> ReceiverConfig {
        ReceiverConfig {
            sample_rate: self.device.sample_rate,
            audio_rate: self.audio.sample_rate,
            recording_dir: self.recording.directory.clone(),
            initial_mode: self.receiver.mode,
            initial_freq_hz: self.receiver.frequency_hz,
            squelch_db: self.receiver.squelch_db,
            spectrum: self.telemetry.enabled.then(|| SpectrumConfig {
                fft_size: self.telemetry.fft_size,
                interval_blocks: self.telemetry.fft_interval_blocks,
            }),
        }
    }

    pub fn remote_settings(&self) -> RemoteSettings {
        RemoteSettings {
            listen: SocketAddr::new(self.remote.listen, self.remote.port),
            allowed_hosts: self.remote.allowed_hosts.clone(),
        }
    }

    /// PCM stream address, when live audio goes out over TCP.
    pub fn audio_listen_addr(&self) -> Option<SocketAddr> {
        (self.audio.output == AudioOutput::Tcp)
            .then(|| SocketAddr::new(self.audio.listen, self.audio.port))
    }

    pub fn telemetry_listen_addr(&self) -> Option<SocketAddr> {
        self.telemetry
            .enabled
            .then(|| SocketAddr::new(self.telemetry.listen, self.telemetry.port))
    }

    /// Generate an example configuration wrapped under the `[rx-server]`
    /// section header, suitable for use in a combined `rx-rs.toml` file.
    pub fn example_combined_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(rename = "rx-server")]
            inner: ServerConfig,
        }
        let example = ServerConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            device: DeviceConfig {
                tones: vec![
                    ToneConfig {
                        offset_hz: 25_000,
                        amplitude: 0.2,
                    },
                    ToneConfig {
                        offset_hz: -60_000,
                        amplitude: 0.05,
                    },
                ],
                ..DeviceConfig::default()
            },
            receiver: ReceiverSection {
                frequency_hz: Some(145_500_000),
                ..ReceiverSection::default()
            },
            ..ServerConfig::default()
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "rx-server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.general.log_level.is_none());
        assert_eq!(config.device.kind, "synthetic");
        assert_eq!(config.device.sample_rate, 250_000);
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.receiver.mode, RxMode::default());
        assert_eq!(config.receiver.squelch_db, -100.0);
        assert!(config.remote.enabled);
        assert_eq!(config.remote.port, 7356);
        assert_eq!(config.remote.allowed_hosts.len(), 2);
        assert!(config.telemetry.enabled);
        assert_eq!(config.audio.output, AudioOutput::Tcp);
        assert_eq!(
            config.audio_listen_addr(),
            Some("127.0.0.1:7357".parse().unwrap())
        );
        assert_eq!(
            config.telemetry_listen_addr(),
            Some("127.0.0.1:7358".parse().unwrap())
        );
        assert!(config.recording.directory.ends_with("recordings"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[device]
sample_rate = 1000000
"#;

        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.device.sample_rate, 1_000_000);
        assert_eq!(config.device.kind, "synthetic");
        assert_eq!(config.remote.port, 7356);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[general]
log_level = "debug"

[device]
kind = "synthetic"
sample_rate = 2000000
freq_min_hz = 100000000
freq_max_hz = 200000000
gain_min_db = 0.0
gain_max_db = 40.0
noise = 0.01
tones = [{ offset_hz = 10000, amplitude = 0.5 }, { offset_hz = -500000, amplitude = 0.1 }]

[audio]
sample_rate = 48000
output = "none"

[receiver]
mode = "AM"
frequency_hz = 144800000
squelch_db = -60.0

[recording]
directory = "/tmp/rx"

[remote]
enabled = true
listen = "0.0.0.0"
port = 7400
allowed_hosts = ["127.0.0.1", "192.168.1.10"]

[telemetry]
fft_size = 2048
fft_interval_blocks = 2
capacity = 32
"#;

        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, Some("debug".to_string()));
        assert_eq!(config.device.sample_rate, 2_000_000);
        assert_eq!(config.device.tones.len(), 2);
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.audio.output, AudioOutput::None);
        assert!(config.audio_listen_addr().is_none());
        assert_eq!(config.receiver.mode, RxMode::Am);
        assert_eq!(config.receiver.frequency_hz, Some(144_800_000));
        assert_eq!(config.recording.directory, PathBuf::from("/tmp/rx"));
        assert_eq!(
            config.remote.listen,
            IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
        );
        assert_eq!(config.remote.port, 7400);
        assert_eq!(config.telemetry.fft_size, 2048);
        assert!(config.validate().is_ok());

        let tones = config.tones();
        assert_eq!(tones[0].freq_hz, 144_810_000);
        assert_eq!(tones[1].freq_hz, 144_300_000);

        let rx = config.receiver_config();
        assert_eq!(rx.initial_mode, RxMode::Am);
        assert_eq!(rx.spectrum.map(|s| s.fft_size), Some(2048));
        assert_eq!(
            config.remote_settings().listen,
            "0.0.0.0:7400".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_example_combined_toml_parses() {
        let example = ServerConfig::example_combined_toml();
        let config = ServerConfig::from_toml_str(&example).unwrap();
        assert_eq!(config.device.tones.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_startup_freq_defaults_to_midpoint() {
        let config = ServerConfig::default();
        assert_eq!(config.startup_freq_hz(), 895_000_000);
        assert!(config.receiver_config().initial_freq_hz.is_none());
    }

    #[test]
    fn test_validate_rejects_invalid_log_level() {
        let mut config = ServerConfig::default();
        config.general.log_level = Some("loud".to_string());
        assert!(config.validate().unwrap_err().contains("log_level"));
    }

    #[test]
    fn test_validate_rejects_unsupported_rate() {
        let mut config = ServerConfig::default();
        config.device.sample_rate = 300_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_frequency_outside_device() {
        let mut config = ServerConfig::default();
        config.receiver.frequency_hz = Some(10_000);
        assert!(config.validate().unwrap_err().contains("frequency_hz"));
    }

    #[test]
    fn test_validate_rejects_squelch_out_of_range() {
        let mut config = ServerConfig::default();
        config.receiver.squelch_db = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_fft_size() {
        let mut config = ServerConfig::default();
        config.telemetry.fft_size = 1000;
        assert!(config.validate().unwrap_err().contains("fft_size"));

        // Ignored while telemetry is off.
        config.telemetry.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_device_kind() {
        let mut config = ServerConfig::default();
        config.device.kind = "rtlsdr".to_string();
        assert!(config.validate().unwrap_err().contains("synthetic"));
    }

    #[test]
    fn test_validate_rejects_port_clash() {
        let mut config = ServerConfig::default();
        config.telemetry.port = config.audio.port;
        assert!(config.validate().unwrap_err().contains("port"));

        config.audio.output = AudioOutput::None;
        assert!(config.validate().is_ok());

        config.remote.port = config.telemetry.port;
        assert!(config.validate().unwrap_err().contains("[remote]"));
    }
}
