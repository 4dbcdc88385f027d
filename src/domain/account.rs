//! Account entity
//!
//! Mutable-balance account record backed by the `accounts` table.
//! The balance only ever changes together with a movement insert, and every
//! write is guarded by the optimistic `version` counter.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Amount, Balance, DomainError};

/// Account product type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Monetary,
    Saver,
    Other,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monetary => "MONETARY",
            Self::Saver => "SAVER",
            Self::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MONETARY" => Some(Self::Monetary),
            "SAVER" => Some(Self::Saver),
            "OTHER" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Account record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique account ID
    pub id: Uuid,

    /// Externally visible account number (unique)
    pub number: String,

    /// Product type
    pub account_type: AccountType,

    /// Current balance
    pub balance: Balance,

    /// Soft-close flag: inactive accounts take no part in movements
    pub is_active: bool,

    /// Owning user
    pub owner_id: Uuid,

    /// Optimistic concurrency counter, incremented on every balance write
    pub version: i64,
}

impl Account {
    /// Ensure the account is active, or fail with `AccountInactive`.
    pub fn ensure_active(&self) -> Result<(), DomainError> {
        if self.is_active {
            Ok(())
        } else {
            Err(DomainError::AccountInactive)
        }
    }

    /// Compute the post-credit balance without mutating the record.
    ///
    /// The caller persists the returned balance together with the movement
    /// row; `Account` itself never writes.
    pub fn credit(&self, amount: &Amount) -> Result<Balance, DomainError> {
        self.ensure_active()?;
        self.balance
            .credit(amount)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))
    }

    /// Compute the post-debit balance, rejecting overdrafts.
    pub fn debit(&self, amount: &Amount) -> Result<Balance, DomainError> {
        self.ensure_active()?;
        if !self.balance.is_sufficient_for(amount) {
            return Err(DomainError::insufficient_funds(
                amount.value(),
                self.balance.value(),
            ));
        }
        self.balance
            .debit(amount)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))
    }
}

const BANK_CODES: &[&str] = &["BAMX", "BAGR", "BACR", "BVGT"];
const PRODUCT_CODES: &[&str] = &["AH", "CC", "CA", "PL"];

/// Generate an externally visible account number.
///
/// Format: country code + check digits + bank code + currency + product code
/// + 16 random digits, e.g. `GT00BAMXQAH1234567890123456`.
pub fn generate_account_number() -> String {
    let mut rng = rand::thread_rng();

    let bank_code = BANK_CODES.choose(&mut rng).unwrap_or(&BANK_CODES[0]);
    let product_code = PRODUCT_CODES.choose(&mut rng).unwrap_or(&PRODUCT_CODES[0]);

    let digits: String = (0..16).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect();

    format!("GT00{bank_code}Q{product_code}{digits}")
}
