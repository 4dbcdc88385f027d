//! Domain module
//!
//! Core domain types and business logic.

pub mod account;
pub mod amount;
pub mod context;
pub mod error;
pub mod limits;
pub mod movement;

pub use account::{generate_account_number, Account, AccountType};
pub use amount::{round_money, Amount, AmountError, Balance};
pub use context::{Principal, Role};
pub use error::DomainError;
pub use limits::{local_day_bounds, LimitPolicy, DAILY_LIMIT, PER_TRANSACTION_LIMIT};
pub use movement::{Movement, MovementStatus, MovementType, EDIT_WINDOW};
