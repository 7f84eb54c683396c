// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DMX UID derivation from controller device UIDs.

use std::fmt;

/// Suffix marking the second sub-device of a physical relay unit.
const SUB_DEVICE_SUFFIX: &str = ".1";

/// Identifier used to look a relay up through RDM discovery.
///
/// A `DmxUid` is always derived from the controller-assigned device UID and
/// is never stored as ground truth. The controller UID is the durable
/// identity; recompute the DMX UID from it whenever it is needed.
///
/// # Derivation
///
/// 1. Take the part of the UID before the first `.` as the base.
/// 2. Insert a colon after the fourth character (`XXXX:YYYYYY`).
/// 3. If the UID ends with `.1`, add one to the trailing hex byte, since
///    sub-device `.1` occupies the next DMX UID slot. `FF` wraps to `00`.
///
/// # Examples
///
/// ```
/// use savant_energy::types::DmxUid;
///
/// let uid = DmxUid::from_device_uid("1234567890");
/// assert_eq!(uid.as_str(), "1234:567890");
///
/// let sub = DmxUid::from_device_uid("1234567890.1");
/// assert_eq!(sub.as_str(), "1234:567891");
///
/// let hex = DmxUid::from_device_uid("7a6b00000089.1");
/// assert_eq!(hex.as_str(), "7a6b:0000008A");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DmxUid(String);

impl DmxUid {
    /// Derives the DMX UID for a controller device UID.
    #[must_use]
    pub fn from_device_uid(uid: &str) -> Self {
        let base = uid.split('.').next().unwrap_or_default();
        let split = base.char_indices().nth(4).map_or(base.len(), |(i, _)| i);
        let mut formatted = format!("{}:{}", &base[..split], &base[split..]);

        if uid.ends_with(SUB_DEVICE_SUFFIX) {
            increment_trailing_byte(&mut formatted);
        }

        Self(formatted)
    }

    /// Returns the UID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Adds one to the last two hex digits, leaving the text untouched when they
/// are not hex.
fn increment_trailing_byte(formatted: &mut String) {
    if formatted.len() < 2 || !formatted.is_char_boundary(formatted.len() - 2) {
        return;
    }
    let tail = &formatted[formatted.len() - 2..];
    if !tail.bytes().all(|b| b.is_ascii_hexdigit()) {
        return;
    }
    let Ok(byte) = u8::from_str_radix(tail, 16) else {
        return;
    };
    let next = format!("{:02X}", byte.wrapping_add(1));
    formatted.replace_range(formatted.len() - 2.., &next);
}

impl fmt::Display for DmxUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DmxUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
