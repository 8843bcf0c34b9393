// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Dial frequency to LNB LO mapping for a receiver tapped into a rig's IF.

/// The rig moves its IF down by this much in USB.
pub const USB_IF_SHIFT_HZ: i64 = -1500;
/// The rig moves its IF up by this much in LSB.
pub const LSB_IF_SHIFT_HZ: i64 = 1500;

/// IF shift for a rigctl mode name. Only plain USB and LSB shift.
pub fn if_shift(mode: &str) -> i64 {
    match mode.trim().to_ascii_uppercase().as_str() {
        "USB" => USB_IF_SHIFT_HZ,
        "LSB" => LSB_IF_SHIFT_HZ,
        _ => 0,
    }
}

/// LNB LO that makes a signal on the dial frequency show up at its dial
/// frequency while the hardware sits on the IF.
pub fn calc_lnb_lo(dial_hz: u64, if_hz: u64, mode: &str) -> i64 {
    dial_hz as i64 - if_hz as i64 - if_shift(mode)
}
