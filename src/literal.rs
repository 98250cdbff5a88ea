//! Numeric literals accepted by the assembler.
//!
//! A literal is decimal unless it carries a trailing `h`, in which case it is
//! hexadecimal. Input is expected to be lower-cased already. Values must fit in
//! 16 bits: decimal literals are checked against the signed range, hex literals
//! against four digits, so `-1`, `32767` and `ffffh` are all accepted.

use crate::error::LiteralError;

/// Parse a literal to its 16-bit two's complement value.
pub fn parse(text: &str) -> Result<u16, LiteralError> {
    let malformed = || LiteralError::Malformed {
        text: text.to_string(),
    };
    let trimmed = text.trim();

    if let Some(digits) = trimmed.strip_suffix('h') {
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(malformed());
        }
        return u16::from_str_radix(digits, 16).map_err(|_| malformed());
    }

    if trimmed.starts_with('+') {
        return Err(malformed());
    }
    trimmed
        .parse::<i16>()
        .map(|value| value as u16)
        .map_err(|_| malformed())
}

/// Parse a literal and keep its low byte.
pub fn parse8(text: &str) -> Result<u8, LiteralError> {
    parse(text).map(|value| (value & 0xff) as u8)
}

/// Parse a literal into `(low, high)` bytes, in emission order.
pub fn parse16(text: &str) -> Result<(u8, u8), LiteralError> {
    parse(text).map(|value| {
        let [low, high] = value.to_le_bytes();
        (low, high)
    })
}

/// Whether an operand should be read as a literal rather than a label name.
pub(crate) fn looks_numeric(text: &str) -> bool {
    text.trim().starts_with(|c: char| c.is_ascii_digit() || c == '-')
}
