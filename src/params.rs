//! # Parameter Splitting and Length Validation
//!
//! Helpers shared by every command handler: splitting a parameter payload on
//! the ASCII Unit Separator into bounded fields, and classifying a byte
//! length against the closed interval a fixed-capacity copy can accept.
//!
//! The length check is the single choke point against buffer overruns on a
//! stream with no message boundaries: handlers call [`check_length`] with the
//! exact bounds of the destination buffer *before* any copy, and refuse the
//! command on anything other than [`LengthCheck::Ok`].

use heapless::Vec;

/// Sub-parameter separator (ASCII Unit Separator).
pub const SEPARATOR: u8 = 0x1F;

/// Result of classifying a byte length against a closed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LengthCheck {
    /// `lower <= len <= upper`.
    Ok,
    /// `len < lower`; surfaced to the controller as `short`.
    TooShort,
    /// `len > upper`; surfaced to the controller as `long`.
    TooLong,
}

/// Classifies `len` against the inclusive interval `[lower, upper]`.
pub fn check_length(len: usize, lower: usize, upper: usize) -> LengthCheck {
    if len < lower {
        LengthCheck::TooShort
    } else if len > upper {
        LengthCheck::TooLong
    } else {
        LengthCheck::Ok
    }
}

/// Splits `payload` on [`SEPARATOR`] into caller-supplied bounded fields.
///
/// Splitting is strict: consecutive separators produce empty fields. Each
/// field is truncated to `FIELD_CAP` bytes, and splitting stops once
/// `MAX_FIELDS` fields have been produced; any content past that is dropped.
/// Both are deliberate truncation policy, not validation. Empty input yields
/// zero fields.
///
/// Returns the number of fields written.
pub fn split_fields<const FIELD_CAP: usize, const MAX_FIELDS: usize>(
    payload: &[u8],
    fields: &mut Vec<Vec<u8, FIELD_CAP>, MAX_FIELDS>,
) -> usize {
    fields.clear();
    if payload.is_empty() {
        return 0;
    }

    for part in payload.split(|&b| b == SEPARATOR) {
        if fields.len() == MAX_FIELDS {
            break;
        }
        let take = part.len().min(FIELD_CAP);
        let mut field = Vec::new();
        // Cannot fail: take <= FIELD_CAP.
        let _ = field.extend_from_slice(&part[..take]);
        // Cannot fail: length checked above.
        let _ = fields.push(field);
    }

    fields.len()
}
