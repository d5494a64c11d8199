// SPDX-License-Identifier: GPL-3.0-only

//! Per-target control endpoint and its text protocol
//!
//! An endpoint translates between the external text protocol and the flag
//! store. Reads render the user-visible value (`1` = unlocked, `0` =
//! locked), the logical negation of the stored flag. Writes parse and
//! validate the payload before the store is touched, so the flag is only
//! ever driven between its two defined states.

use std::sync::Arc;

use unlock_types::BlockTarget;

use crate::backend::WriteProtectStore;
use crate::error::{ControlError, Result};

/// One live read/write endpoint bound to one target.
pub struct ControlEndpoint {
    target: BlockTarget,
    store: Arc<dyn WriteProtectStore>,
}

impl ControlEndpoint {
    pub fn new(target: BlockTarget, store: Arc<dyn WriteProtectStore>) -> Self {
        Self { target, store }
    }

    pub fn target(&self) -> &BlockTarget {
        &self.target
    }

    /// Render the current value: `"1\n"` when unlocked, `"0\n"` when
    /// protected.
    pub async fn read(&self) -> Result<String> {
        let protected = self.store.read_protected(self.target.clone()).await?;
        Ok(format!("{}\n", if protected { 0 } else { 1 }))
    }

    /// Parse and apply a write request. Writing `1` clears protection,
    /// writing `0` sets it. Returns the number of bytes consumed.
    pub async fn write(&self, buf: &str) -> Result<usize> {
        let value = parse_switch(buf)?;
        self.store
            .set_protected(self.target.clone(), value == 0)
            .await?;
        Ok(buf.len())
    }
}

/// Parse a write payload as an integer (surrounding whitespace, sign, and a
/// `0x`/`0o`/`0b` radix prefix allowed) and require it to be exactly 0 or 1.
fn parse_switch(buf: &str) -> Result<i64> {
    let text = buf.trim();
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let (radix, digits) = match unsigned.get(..2) {
        Some("0x") | Some("0X") => (16, &unsigned[2..]),
        Some("0o") | Some("0O") => (8, &unsigned[2..]),
        Some("0b") | Some("0B") => (2, &unsigned[2..]),
        _ => (10, unsigned),
    };

    let magnitude = i64::from_str_radix(digits, radix)
        .map_err(|_| ControlError::InvalidArgument(format!("not a number: {buf:?}")))?;
    let value = if negative { -magnitude } else { magnitude };

    if value != 0 && value != 1 {
        return Err(ControlError::InvalidArgument(format!(
            "value out of range: {value}"
        )));
    }

    Ok(value)
}
