use std::fmt;

#[cfg(test)]
mod tests;

/// Number of houses served by this controller. Fixed at build time; every
/// per-house table in the crate has exactly this many slots.
pub const NUM_HOUSES: usize = 8;

/// Index of a house, guaranteed to be in `[0, NUM_HOUSES)`
///
/// The only way to obtain one is through [`HouseId::new`] or
/// [`parse_house_id`], so code holding a `HouseId` can index the per-house
/// tables without re-checking the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HouseId(usize);

impl HouseId {
    /// Returns `None` when `index` is outside `[0, NUM_HOUSES)`
    pub fn new(index: usize) -> Option<Self> {
        (index < NUM_HOUSES).then_some(Self(index))
    }

    /// Position of this house in the per-house tables
    pub fn index(self) -> usize {
        self.0
    }

    /// Iterate over every house in id order
    pub fn all() -> impl Iterator<Item = HouseId> {
        (0..NUM_HOUSES).map(HouseId)
    }
}

impl fmt::Display for HouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// House ID parsing errors
#[derive(Debug, PartialEq, Clone)]
pub enum ParseError {
    /// Parameter missing or blank
    Empty,
    /// Not an integer in any accepted base
    InvalidFormat(String),
    /// Parsed fine but does not name a configured house
    OutOfRange(i64),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "house id is empty"),
            ParseError::InvalidFormat(raw) => write!(f, "house id '{}' is not an integer", raw),
            ParseError::OutOfRange(id) => {
                write!(f, "house id {} is outside 0..{}", id, NUM_HOUSES)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse a house id as sent by the house clients
///
/// Accepts plain decimal plus the `0x`, `0o` and `0b` prefixed forms the
/// deployed clients have historically used, with an optional sign.
///
/// # Examples
///
/// ```
/// use housed::house::{parse_house_id, ParseError};
///
/// assert_eq!(parse_house_id("3").unwrap().index(), 3);
/// assert_eq!(parse_house_id("0x7").unwrap().index(), 7);
/// assert_eq!(parse_house_id("8"), Err(ParseError::OutOfRange(8)));
/// ```
pub fn parse_house_id(raw: &str) -> Result<HouseId, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let (negative, unsigned) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (radix, digits) = split_radix(unsigned);
    if digits.starts_with(['+', '-']) {
        return Err(ParseError::InvalidFormat(raw.to_string()));
    }
    let magnitude = i64::from_str_radix(digits, radix)
        .map_err(|_| ParseError::InvalidFormat(raw.to_string()))?;
    let value = if negative { -magnitude } else { magnitude };

    usize::try_from(value)
        .ok()
        .and_then(HouseId::new)
        .ok_or(ParseError::OutOfRange(value))
}

/// Split an optional base prefix off a digit string
fn split_radix(digits: &str) -> (u32, &str) {
    let lower = digits.get(..2).map(|p| p.to_ascii_lowercase());
    match lower.as_deref() {
        Some("0x") => (16, &digits[2..]),
        Some("0o") => (8, &digits[2..]),
        Some("0b") => (2, &digits[2..]),
        _ => (10, digits),
    }
}
