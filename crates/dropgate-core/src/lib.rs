//! Core types for the dropgate service.
//!
//! This crate provides the foundational types used throughout dropgate:
//!
//! - **Identifiers**: `UserId`, `FileId`
//! - **Ledger**: `CreditAccount`, `Plan`
//! - **Files**: `FileRecord`
//! - **Payments**: `PaymentOrder`, `OrderStatus`
//! - **Profiles**: `Profile`
//!
//! # Credits
//!
//! A credit is the atomic unit of upload allowance: one credit buys the
//! storage of one file. Balances are stored as `i64` and are never allowed
//! to go negative. New accounts start with [`STARTING_CREDITS`] credits on
//! the starter plan; successful payments grant the fixed per-plan amounts in
//! [`Plan::credits_granted`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod file;
pub mod ids;
pub mod payment;
pub mod profile;

pub use account::{CreditAccount, Plan, STARTING_CREDITS};
pub use file::{storage_key_for, FileRecord};
pub use ids::{FileId, IdError, UserId};
pub use payment::{OrderStatus, PaymentOrder};
pub use profile::Profile;
