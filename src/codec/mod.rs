// Bit-packed house state (persisted form and /state wire byte)

use crate::house::NUM_HOUSES;
use std::fmt;


/// Full on/off status of every house, index = house id
pub type StateVector = [bool; NUM_HOUSES];

/// Persisted state string could not be turned back into a state vector
#[derive(Debug, PartialEq, Clone)]
pub enum FormatError {
    /// Not a non-negative base-10 integer
    NotAnInteger(String),
    /// Integer has bits set beyond the last house
    OutOfRange(u64),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::NotAnInteger(raw) => {
                write!(f, "persisted state '{}' is not a base-10 integer", raw)
            }
            FormatError::OutOfRange(value) => write!(
                f,
                "persisted state {} has bits set beyond house {}",
                value,
                NUM_HOUSES - 1
            ),
        }
    }
}

impl std::error::Error for FormatError {}

/// Pack a state vector into an integer, bit `i` = house `i`
pub fn encode(states: &StateVector) -> u64 {
    states
        .iter()
        .enumerate()
        .filter(|(_, on)| **on)
        .fold(0, |acc, (bit, _)| acc | (1 << bit))
}

/// Parse the base-10 persisted form back into a state vector
///
/// Callers substitute [`blank`] on error.
pub fn decode(text: &str) -> Result<StateVector, FormatError> {
    let trimmed = text.trim();
    // u64::from_str accepts a leading '+', which never appears in what we write
    if trimmed.starts_with('+') {
        return Err(FormatError::NotAnInteger(text.to_string()));
    }
    let value: u64 = trimmed
        .parse()
        .map_err(|_| FormatError::NotAnInteger(text.to_string()))?;

    if value >> NUM_HOUSES != 0 {
        return Err(FormatError::OutOfRange(value));
    }

    let mut states = blank();
    for (bit, slot) in states.iter_mut().enumerate() {
        *slot = (value >> bit) & 1 == 1;
    }
    Ok(states)
}

/// Every house off
pub fn blank() -> StateVector {
    [false; NUM_HOUSES]
}

/// Single byte served by `/state`
pub fn state_byte(states: &StateVector) -> u8 {
    // NUM_HOUSES is 8, so the packed value always fits
    encode(states) as u8
}

/// Render a packed value as zero-padded binary, one digit per house
///
/// Most significant digit first, so house 0 is the rightmost digit.
pub fn format_bits(value: u64) -> String {
    format!("{:0width$b}", value, width = NUM_HOUSES)
}
