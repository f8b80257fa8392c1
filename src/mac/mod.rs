// Target MAC addresses served to houses on /target_mac

use crate::house::{HouseId, NUM_HOUSES};
use std::fmt;

/// 48-bit hardware address
pub type MacAddress = [u8; 6];

/// MAC address string could not be parsed
#[derive(Debug, PartialEq, Clone)]
pub enum MacParseError {
    Empty,
    /// Wrong number of groups or a group that is not two hex digits
    InvalidFormat(String),
}

impl fmt::Display for MacParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacParseError::Empty => write!(f, "MAC address is empty"),
            MacParseError::InvalidFormat(raw) => write!(f, "'{}' is not a MAC address", raw),
        }
    }
}

impl std::error::Error for MacParseError {}

/// Parse `aa:bb:cc:dd:ee:ff` (or `-` separated) into raw bytes
pub fn parse_mac(raw: &str) -> Result<MacAddress, MacParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MacParseError::Empty);
    }
    let invalid = || MacParseError::InvalidFormat(raw.to_string());

    let separator = if trimmed.contains(':') { ':' } else { '-' };
    let groups: Vec<&str> = trimmed.split(separator).collect();
    if groups.len() != 6 {
        return Err(invalid());
    }

    let mut mac = [0u8; 6];
    for (byte, group) in mac.iter_mut().zip(groups) {
        if group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        *byte = u8::from_str_radix(group, 16).map_err(|_| invalid())?;
    }
    Ok(mac)
}

/// Configured target MAC per house, kept as the raw configured strings
#[derive(Debug, Clone)]
pub struct TargetMacs {
    macs: Vec<String>,
}

impl TargetMacs {
    /// Build from one entry per house, in house order; missing entries are empty
    pub fn new(macs: impl IntoIterator<Item = String>) -> Self {
        let mut macs: Vec<String> = macs.into_iter().take(NUM_HOUSES).collect();
        macs.resize(NUM_HOUSES, String::new());
        Self { macs }
    }

    /// Configured string, as shown on /info
    pub fn raw(&self, house: HouseId) -> &str {
        &self.macs[house.index()]
    }

    /// Parsed address for `house`
    pub fn parsed(&self, house: HouseId) -> Result<MacAddress, MacParseError> {
        parse_mac(self.raw(house))
    }
}
