//! Repository module
//!
//! sqlx-backed data access for accounts and the movement ledger.

mod account_repo;
mod movement_repo;

pub use account_repo::AccountRepository;
pub use movement_repo::{AccountActivity, MovementRepository};
