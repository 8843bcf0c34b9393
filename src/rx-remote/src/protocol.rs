// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Command parsing and reply formatting.
//!
//! Queries reply with bare value lines; setters reply `RPRT 0` or `RPRT 1`.

use std::str::FromStr;

use rx_core::{RxMode, RxSnapshot};
use thiserror::Error;

/// Squelch range accepted by `L SQL`; values outside are clamped.
pub const SQL_MIN_DB: f64 = -150.0;
pub const SQL_MAX_DB: f64 = 0.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,
    #[error("unsupported command '{0}'")]
    Unsupported(String),
    #[error("{command}: missing {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },
    #[error("{command}: invalid argument '{value}'")]
    InvalidArgument { command: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Sql,
    Strength,
}

impl FromStr for Level {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SQL" => Ok(Self::Sql),
            "STRENGTH" => Ok(Self::Strength),
            _ => Err(ProtocolError::InvalidArgument {
                command: "l",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    /// `f`: displayed frequency.
    GetFreq,
    /// `F <hz>`: displayed frequency.
    SetFreq(i64),
    GetMode,
    SetMode {
        mode: RxMode,
        passband: Option<i32>,
    },
    /// `M ?`
    ListModes,
    GetLevel(Level),
    /// `l` or `l ?`
    ListLevels,
    SetSquelch(f64),
    /// `L ?`
    ListSetLevels,
    GetRecord,
    SetRecord(bool),
    /// Satellite rise: start recording.
    Aos,
    /// Satellite set: stop recording.
    Los,
    GetLnbLo,
    SetLnbLo(i64),
    DumpState,
    Quit,
    GetHwFreq,
    SetHwFreq(u64),
    GetFilterOffset,
    SetFilterOffset(i64),
}

fn arg<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    command: &'static str,
    what: &'static str,
) -> Result<&'a str, ProtocolError> {
    parts
        .next()
        .ok_or(ProtocolError::MissingArgument { command, what })
}

fn number<T: FromStr>(value: &str, command: &'static str) -> Result<T, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidArgument {
        command,
        value: value.to_string(),
    })
}

/// Integer frequency; a decimal point is accepted and truncated, as hamlib
/// clients send `F 144800000.000000`.
fn hz(value: &str, command: &'static str) -> Result<i64, ProtocolError> {
    if let Ok(v) = value.parse::<i64>() {
        return Ok(v);
    }
    let v: f64 = number(value, command)?;
    if v.is_finite() {
        Ok(v as i64)
    } else {
        Err(ProtocolError::InvalidArgument {
            command,
            value: value.to_string(),
        })
    }
}

fn flag(value: &str, command: &'static str) -> Result<bool, ProtocolError> {
    match value {
        "1" | "on" | "ON" | "true" => Ok(true),
        "0" | "off" | "OFF" | "false" => Ok(false),
        _ => Err(ProtocolError::InvalidArgument {
            command,
            value: value.to_string(),
        }),
    }
}

pub fn parse_line(line: &str) -> Result<RemoteCommand, ProtocolError> {
    let mut parts = line.split_whitespace();
    let op = parts.next().ok_or(ProtocolError::Empty)?;

    let cmd = match op {
        "q" | "Q" | "c" | "\\quit" => RemoteCommand::Quit,
        "f" => RemoteCommand::GetFreq,
        "F" => RemoteCommand::SetFreq(hz(arg(&mut parts, "F", "frequency")?, "F")?),
        "m" => RemoteCommand::GetMode,
        "M" => {
            let mode = arg(&mut parts, "M", "mode")?;
            if mode == "?" {
                RemoteCommand::ListModes
            } else {
                let mode = mode.parse::<RxMode>().map_err(|_| {
                    ProtocolError::InvalidArgument {
                        command: "M",
                        value: mode.to_string(),
                    }
                })?;
                let passband = parts.next().map(|p| number::<i32>(p, "M")).transpose()?;
                // Zero or negative asks for the mode's default passband.
                RemoteCommand::SetMode {
                    mode,
                    passband: passband.filter(|p| *p > 0),
                }
            }
        }
        "l" => match parts.next() {
            None | Some("?") => RemoteCommand::ListLevels,
            Some(level) => RemoteCommand::GetLevel(level.parse()?),
        },
        "L" => match arg(&mut parts, "L", "level")? {
            "?" => RemoteCommand::ListSetLevels,
            level => match level.parse::<Level>() {
                Ok(Level::Sql) => {
                    let db: f64 = number(arg(&mut parts, "L", "value")?, "L")?;
                    if !db.is_finite() {
                        return Err(ProtocolError::InvalidArgument {
                            command: "L",
                            value: db.to_string(),
                        });
                    }
                    RemoteCommand::SetSquelch(db.clamp(SQL_MIN_DB, SQL_MAX_DB))
                }
                _ => {
                    return Err(ProtocolError::InvalidArgument {
                        command: "L",
                        value: level.to_string(),
                    })
                }
            },
        },
        "u" => match arg(&mut parts, "u", "function")? {
            f if f.eq_ignore_ascii_case("RECORD") => RemoteCommand::GetRecord,
            f => {
                return Err(ProtocolError::InvalidArgument {
                    command: "u",
                    value: f.to_string(),
                })
            }
        },
        "U" => match arg(&mut parts, "U", "function")? {
            f if f.eq_ignore_ascii_case("RECORD") => {
                RemoteCommand::SetRecord(flag(arg(&mut parts, "U", "value")?, "U")?)
            }
            f => {
                return Err(ProtocolError::InvalidArgument {
                    command: "U",
                    value: f.to_string(),
                })
            }
        },
        "AOS" => RemoteCommand::Aos,
        "LOS" => RemoteCommand::Los,
        "LNB_LO" => match parts.next() {
            None => RemoteCommand::GetLnbLo,
            Some(v) => RemoteCommand::SetLnbLo(hz(v, "LNB_LO")?),
        },
        "\\dump_state" | "dump_state" => RemoteCommand::DumpState,
        "gqrx_get_hw_freq" => RemoteCommand::GetHwFreq,
        "gqrx_set_hw_freq" => {
            let v = hz(arg(&mut parts, "gqrx_set_hw_freq", "frequency")?, "gqrx_set_hw_freq")?;
            let v = u64::try_from(v).map_err(|_| ProtocolError::InvalidArgument {
                command: "gqrx_set_hw_freq",
                value: v.to_string(),
            })?;
            RemoteCommand::SetHwFreq(v)
        }
        "gqrx_get_filter_offset" => RemoteCommand::GetFilterOffset,
        "gqrx_set_filter_offset" => RemoteCommand::SetFilterOffset(hz(
            arg(&mut parts, "gqrx_set_filter_offset", "offset")?,
            "gqrx_set_filter_offset",
        )?),
        other => return Err(ProtocolError::Unsupported(other.to_string())),
    };
    Ok(cmd)
}

pub fn ok_only() -> String {
    "RPRT 0\n".to_string()
}

pub fn err_only() -> String {
    "RPRT 1\n".to_string()
}

/// Bare value lines, each `\n` terminated.
pub fn values<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut resp = String::new();
    for line in lines {
        resp.push_str(line.as_ref());
        resp.push('\n');
    }
    resp
}

pub fn mode_list() -> String {
    let names: Vec<&str> = RxMode::ALL.iter().map(|m| m.protocol_name()).collect();
    values([names.join(" ")])
}

/// `m` reply: mode name, then passband in Hz.
pub fn mode_reply(snapshot: &RxSnapshot) -> String {
    values([
        snapshot.mode.protocol_name().to_string(),
        snapshot.filter_width_hz.to_string(),
    ])
}

pub fn level_reply(snapshot: &RxSnapshot, level: Level) -> String {
    let value = match level {
        Level::Sql => snapshot.squelch_db,
        Level::Strength => f64::from(snapshot.signal_dbfs),
    };
    values([format!("{value:.1}")])
}

/// Fixed hamlib `dump_state` layout, with the device range filled in.
pub fn dump_state(snapshot: &RxSnapshot) -> String {
    let range = format!(
        "{}.000000 {}.000000 0x1ff -1 -1 0x10000003 0x3",
        snapshot.freq_range.min_hz, snapshot.freq_range.max_hz
    );
    values([
        "0",
        "2",
        "2",
        range.as_str(),
        "0 0 0 0 0 0 0",
        "0 0 0 0 0 0 0",
        "0x1ff 1",
        "0x1ff 0",
        "0 0",
        "0x1e 2400",
        "0x2 500",
        "0x1 8000",
        "0x1 2400",
        "0x20 15000",
        "0x20 8000",
        "0x40 200000",
        "0 0",
        "0",
        "0",
        "0",
        "0",
        "0",
        "0",
        "0",
        "0",
        "0x40000020",
        "0x20",
        "0",
        "0",
    ])
}
