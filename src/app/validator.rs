//! Recipient address validation.

use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;

use crate::domain::AddressValidity;

/// Check whether `raw` is a base58-encoded 32-byte public key.
///
/// Surrounding whitespace is ignored. An empty string is `Unknown` so
/// callers can hold back an error until something has been typed.
#[must_use]
pub fn validate_recipient(raw: &str) -> AddressValidity {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return AddressValidity::Unknown;
    }
    match Pubkey::from_str(trimmed) {
        Ok(_) => AddressValidity::Valid,
        Err(_) => AddressValidity::Invalid,
    }
}

/// Parse a recipient that has already been typed.
pub fn parse_recipient(raw: &str) -> Option<Pubkey> {
    Pubkey::from_str(raw.trim()).ok()
}

/// Recipient text field with its validity, recomputed only when the
/// trimmed text changes.
#[derive(Debug, Clone, Default)]
pub struct RecipientInput {
    raw: String,
    key: String,
    validity: AddressValidity,
}

impl RecipientInput {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let mut input = Self::default();
        input.set(raw);
        input
    }

    pub fn set(&mut self, raw: impl Into<String>) {
        self.raw = raw.into();
        let trimmed = self.raw.trim();
        if trimmed != self.key {
            self.key = trimmed.to_string();
            self.validity = validate_recipient(&self.key);
        }
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn validity(&self) -> AddressValidity {
        self.validity
    }
}
