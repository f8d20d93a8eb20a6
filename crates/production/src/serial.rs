//! Serial number sequencing.
//!
//! A serial is split into a label prefix and a numeric suffix at the last
//! non-digit character. Each produced board increments the suffix by one and
//! re-pads it to the original suffix width.
//!
//! Known boundaries, kept deliberately:
//! - A serial made only of digits splits at index 0, so its first digit is
//!   treated as prefix (`"00099"` is prefix `"0"`, suffix `"0099"`).
//! - Once the number needs more digits than the original suffix, the output
//!   is the unpadded number appended to the prefix (`"SN-999"` → `"SN-1000"`).

use pcbforge_core::{DomainError, DomainResult, PcbId};

/// Seed used when a board has never been assigned a serial.
pub const DEFAULT_SERIAL_NUMBER: &str = "00000";

/// A parsed serial number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialNumber {
    prefix: String,
    number: u64,
    width: usize,
}

impl SerialNumber {
    /// Parse `serial`, or `None` if its numeric suffix is empty or too large.
    pub fn parse(serial: &str) -> Option<Self> {
        let split = serial
            .char_indices()
            .rev()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(idx, c)| idx + c.len_utf8())
            // No non-digit at all: index 0 is still the split point.
            .unwrap_or_else(|| serial.chars().next().map_or(0, char::len_utf8));

        let (prefix, suffix) = serial.split_at(split);
        if suffix.is_empty() {
            return None;
        }
        let number = suffix.parse::<u64>().ok()?;

        Some(Self {
            prefix: prefix.to_string(),
            number,
            width: suffix.len(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    /// Format `number` with this serial's prefix, zero-padded to the original width.
    pub fn format(&self, number: u64) -> String {
        format!("{}{:0width$}", self.prefix, number, width = self.width)
    }
}

/// Derives the serials for a run of boards from a board's current serial.
#[derive(Debug, Clone)]
pub struct SerialNumberSequencer {
    pcb_id: PcbId,
    original: String,
    current: SerialNumber,
}

impl SerialNumberSequencer {
    /// Prepare sequencing from `current`; an empty serial starts at `default_serial`.
    pub fn new(pcb_id: PcbId, current: &str, default_serial: &str) -> DomainResult<Self> {
        let original = if current.is_empty() {
            default_serial
        } else {
            current
        };

        let parsed = SerialNumber::parse(original).ok_or_else(|| DomainError::SerialNumberParse {
            pcb_id,
            serial: original.to_string(),
        })?;

        Ok(Self {
            pcb_id,
            original: original.to_string(),
            current: parsed,
        })
    }

    /// Fail if `units` more serials would overflow the numeric suffix.
    pub fn ensure_capacity(&self, units: u64) -> DomainResult<()> {
        match self.current.number.checked_add(units) {
            Some(_) => Ok(()),
            None => Err(DomainError::SerialNumberParse {
                pcb_id: self.pcb_id,
                serial: self.original.clone(),
            }),
        }
    }

    /// Assign `units` serials, calling `on_assigned(serial, step)` for steps `1..=units`.
    ///
    /// Returns the last assigned serial, which becomes the board's new high-water
    /// mark. With `units == 0` nothing is assigned and the current serial is returned.
    pub fn sequence(
        &self,
        units: u64,
        mut on_assigned: impl FnMut(&str, u64),
    ) -> DomainResult<String> {
        self.ensure_capacity(units)?;

        let mut last = self.original.clone();
        for step in 1..=units {
            last = self.current.format(self.current.number + step);
            on_assigned(&last, step);
        }
        Ok(last)
    }
}
