// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Line-based TCP remote control, compatible with the gqrx subset that
//! satellite trackers and rig-sync scripts speak.

pub mod protocol;
pub mod server;

pub use protocol::{parse_line, Level, ProtocolError, RemoteCommand};
pub use server::{serve, spawn_remote, RemoteSettings, DEFAULT_REMOTE_PORT};
