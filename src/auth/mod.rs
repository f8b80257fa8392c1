use crate::house::{parse_house_id, HouseId, NUM_HOUSES};
use std::fmt;


/// Per-house API key check
///
/// Each house has exactly one pre-provisioned key. A request is allowed for
/// house `N` only when it names a valid house and presents that house's key,
/// byte for byte. Houses without a configured key cannot be accessed at all:
/// an empty stored key never matches, not even an empty supplied key.
#[derive(Debug, Clone)]
pub struct AccessGate {
    keys: Vec<String>,
}

impl AccessGate {
    /// Build from one key per house, in house order
    ///
    /// Missing trailing keys count as unconfigured; extra keys are ignored.
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        let mut keys: Vec<String> = keys.into_iter().take(NUM_HOUSES).collect();
        keys.resize(NUM_HOUSES, String::new());
        Self { keys }
    }

    /// True iff `house_id` is a valid house with a configured key equal to `key`
    pub fn validate(&self, house_id: i64, key: &str) -> bool {
        usize::try_from(house_id)
            .ok()
            .and_then(HouseId::new)
            .is_some_and(|house| self.check(house, key).is_ok())
    }

    /// Authorize a request from its raw `id` and `api_key` query parameters
    ///
    /// Returns the house the caller is acting as.
    ///
    /// # Errors
    /// - InvalidHouseId: `id` missing, not an integer, or out of range
    /// - NotConfigured: no key was provisioned for that house
    /// - KeyMismatch: `api_key` missing or different from the stored key
    pub fn authorize(&self, id: Option<&str>, key: Option<&str>) -> Result<HouseId, AuthError> {
        let house = parse_house_id(id.unwrap_or_default())
            .map_err(|e| AuthError::InvalidHouseId(e.to_string()))?;
        self.check(house, key.unwrap_or_default())?;
        Ok(house)
    }

    /// Number of houses with a key
    pub fn configured_count(&self) -> usize {
        self.keys.iter().filter(|k| !k.is_empty()).count()
    }

    fn check(&self, house: HouseId, key: &str) -> Result<(), AuthError> {
        let stored = &self.keys[house.index()];
        if stored.is_empty() {
            return Err(AuthError::NotConfigured(house));
        }
        if stored.as_bytes() != key.as_bytes() {
            return Err(AuthError::KeyMismatch(house));
        }
        Ok(())
    }
}

/// Authorization errors
#[derive(Debug, PartialEq, Clone)]
pub enum AuthError {
    /// `id` parameter missing, malformed or out of range
    InvalidHouseId(String),
    /// House has no API key configured
    NotConfigured(HouseId),
    /// Supplied key does not match the house's key
    KeyMismatch(HouseId),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidHouseId(msg) => write!(f, "Invalid house id: {}", msg),
            AuthError::NotConfigured(house) => {
                write!(f, "House {} has no API key configured", house)
            }
            AuthError::KeyMismatch(house) => write!(f, "Wrong API key for house {}", house),
        }
    }
}

impl std::error::Error for AuthError {}
