// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for rx-rigsync.
//!
//! Config is loaded from the `[rx-rigsync]` section of `rx-rs.toml`, using
//! the same search order as rx-server.

use std::time::Duration;

use rx_app::ConfigFile;
use serde::{Deserialize, Serialize};

use crate::endpoint::{parse_endpoint, Endpoint};
use crate::sync::SyncSettings;

pub const DEFAULT_RIG_PORT: u16 = 4532;
pub const DEFAULT_RECEIVER_PORT: u16 = 7356;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RigSyncConfig {
    pub general: GeneralConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// rigctl server address (host[:port])
    pub rig: String,
    /// Receiver remote-control address (host[:port])
    pub remote: String,
    /// Rig IF the receiver hardware is parked on, in Hz
    pub if_freq_hz: u64,
    /// Poll interval in milliseconds
    pub interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rig: format!("localhost:{}", DEFAULT_RIG_PORT),
            remote: format!("localhost:{}", DEFAULT_RECEIVER_PORT),
            if_freq_hz: 69_450_000,
            interval_ms: 1000,
        }
    }
}

impl RigSyncConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;
        self.rig_endpoint()?;
        self.remote_endpoint()?;
        if self.sync.if_freq_hz == 0 {
            return Err("[sync].if_freq_hz must be > 0".to_string());
        }
        if self.sync.interval_ms == 0 {
            return Err("[sync].interval_ms must be > 0".to_string());
        }
        Ok(())
    }

    pub fn rig_endpoint(&self) -> Result<Endpoint, String> {
        parse_endpoint(&self.sync.rig, DEFAULT_RIG_PORT).map_err(|e| format!("[sync].rig: {}", e))
    }

    pub fn remote_endpoint(&self) -> Result<Endpoint, String> {
        parse_endpoint(&self.sync.remote, DEFAULT_RECEIVER_PORT)
            .map_err(|e| format!("[sync].remote: {}", e))
    }

    pub fn settings(&self) -> Result<SyncSettings, String> {
        Ok(SyncSettings {
            rig: self.rig_endpoint()?,
            remote: self.remote_endpoint()?,
            if_freq_hz: self.sync.if_freq_hz,
            interval: Duration::from_millis(self.sync.interval_ms),
        })
    }

    pub fn example_combined_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(rename = "rx-rigsync")]
            inner: RigSyncConfig,
        }
        let example = RigSyncConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            sync: SyncConfig::default(),
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

impl ConfigFile for RigSyncConfig {
    fn section_key() -> &'static str {
        "rx-rigsync"
    }
}
