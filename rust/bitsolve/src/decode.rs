//! Counterexample values back to fixed-width integers.
//!
//! Engines report bitvector values as `0x` followed by hex digits.  The
//! decoder reads that text at a requested width, either as an unsigned value
//! or as a two's-complement signed one.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;
use tracing::trace;

use bitsolve_engine::MAX_WIDTH;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The value text had no digits at all.
    #[error("engine returned an empty value; the assertions are unsatisfiable")]
    UnsatSentinel,
    #[error("value 0x{digits} does not fit in {width} bits")]
    Overflow { digits: String, width: u32 },
    #[error("cannot decode at width {0}; widths must be within 1..=64")]
    UnsupportedWidth(u32),
    #[error("malformed value `{0}`")]
    Malformed(String),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Signedness {
    #[default]
    Unsigned,
    Signed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedValue {
    Unsigned(u64),
    Signed(i64),
}

impl DecodedValue {
    /// The value's bit pattern, sign-extended to 64 bits for signed values.
    pub fn as_bits(self) -> u64 {
        match self {
            DecodedValue::Unsigned(v) => v,
            DecodedValue::Signed(v) => v as u64,
        }
    }
}

/// Decode `native` at `width` bits.
pub fn decode(native: &str, width: u32, signedness: Signedness) -> Result<DecodedValue, DecodeError> {
    if width == 0 || width > MAX_WIDTH {
        return Err(DecodeError::UnsupportedWidth(width));
    }

    let text = native.trim_end();
    let text = text.strip_prefix("0x").unwrap_or(text);
    if text.is_empty() {
        return Err(DecodeError::UnsatSentinel);
    }
    if !text.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DecodeError::Malformed(native.to_string()));
    }

    let digits = text.trim_start_matches('0');
    let overflow = || DecodeError::Overflow {
        digits: digits.to_string(),
        width,
    };
    // all zeros
    let value = if digits.is_empty() {
        0
    } else if digits.len() > 16 {
        return Err(overflow());
    } else {
        u64::from_str_radix(digits, 16).map_err(|_| DecodeError::Malformed(native.to_string()))?
    };
    if width < 64 && value >> width != 0 {
        return Err(overflow());
    }

    let decoded = match signedness {
        Signedness::Unsigned => DecodedValue::Unsigned(value),
        Signedness::Signed => DecodedValue::Signed(to_signed(value, width)),
    };
    trace!(native, width, %signedness, ?decoded, "decoded value");
    Ok(decoded)
}

pub fn decode_unsigned(native: &str, width: u32) -> Result<u64, DecodeError> {
    decode(native, width, Signedness::Unsigned).map(DecodedValue::as_bits)
}

pub fn decode_signed(native: &str, width: u32) -> Result<i64, DecodeError> {
    decode(native, width, Signedness::Signed).map(|v| v.as_bits() as i64)
}

/// Two's-complement reading of the low `width` bits of `value`.
fn to_signed(value: u64, width: u32) -> i64 {
    let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
    let sign = value & (1u64 << (width - 1));
    if sign == 0 {
        value as i64
    } else {
        let magnitude = ((!value) & mask) as i128 + 1;
        (-magnitude) as i64
    }
}
