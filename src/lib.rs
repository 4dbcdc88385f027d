//! banca_api Library
//!
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod domain;
pub mod ledger;
pub mod repository;

// Infrastructure
pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use domain::{Amount, AmountError, Balance, DomainError, Principal, Role};
