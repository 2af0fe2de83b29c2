//! `RocksDB` storage layer for dropgate.
//!
//! This crate provides persistent storage for credit accounts, file records,
//! payment orders, and profiles using `RocksDB` with column families for
//! efficient indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `accounts`: Credit accounts, keyed by `user_id`
//! - `files`: File records, keyed by `file_id` (ULID)
//! - `files_by_owner`: Index for listing files by owner
//! - `orders`: Payment orders, keyed by the gateway order id
//! - `orders_by_user`: Index for listing orders by user
//! - `profiles`: Profile snapshots, keyed by `user_id`
//!
//! # Ledger atomicity
//!
//! Every account mutation is a guarded read-modify-write cycle under a
//! store-level ledger lock, committed together with the rest of its compound
//! operation in one `WriteBatch`. Two concurrent debits of the same account
//! serialize, so the insufficient-balance guard never acts on a stale read.
//! Payment order transitions go through the same lock, which makes the
//! PENDING-to-terminal transition conditional: a duplicate settle observes
//! the terminal state instead of re-crediting.
//!
//! # Example
//!
//! ```no_run
//! use dropgate_store::{RocksStore, Store};
//! use dropgate_core::UserId;
//!
//! let store = RocksStore::open("/tmp/dropgate-db").unwrap();
//!
//! let user_id = UserId::generate();
//! let account = store.ensure_account(&user_id).unwrap();
//! assert_eq!(account.credits, dropgate_core::STARTING_CREDITS);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use dropgate_core::{CreditAccount, FileId, FileRecord, PaymentOrder, Plan, Profile, UserId};

/// Outcome of a conditional order settlement.
#[derive(Debug)]
pub enum OrderSettle {
    /// The order transitioned PENDING to SUCCESS and the ledger was credited.
    Settled {
        /// The settled order.
        order: PaymentOrder,
        /// The credited account.
        account: CreditAccount,
    },

    /// The order was already terminal; nothing changed.
    AlreadyFinal(PaymentOrder),

    /// No order with this id exists.
    Missing,
}

/// Outcome of a conditional order status update.
#[derive(Debug)]
pub enum OrderUpdate {
    /// The transition was applied.
    Applied(PaymentOrder),

    /// The order was already terminal; nothing changed.
    AlreadyFinal(PaymentOrder),

    /// No order with this id exists; the update is a no-op.
    Missing,
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations behind the service.
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations (the credit ledger)
    // =========================================================================

    /// Insert or update an account record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &CreditAccount) -> Result<()>;

    /// Get an account by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, user_id: &UserId) -> Result<Option<CreditAccount>>;

    /// Get the account, creating one with the starting grant if absent.
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn ensure_account(&self, user_id: &UserId) -> Result<CreditAccount>;

    /// Delete an account by user ID. No-op if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_account(&self, user_id: &UserId) -> Result<()>;

    /// Atomically decrement the balance by `amount`, creating the account
    /// first if absent.
    ///
    /// Returns the updated account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InsufficientCredits` if the decrement would take
    /// the balance negative; the balance is left unchanged.
    fn debit_credits(&self, user_id: &UserId, amount: i64) -> Result<CreditAccount>;

    /// Atomically increment the balance by `amount` and set the plan label,
    /// creating the account first if absent.
    ///
    /// Returns the updated account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn credit_credits(&self, user_id: &UserId, amount: i64, plan: Plan) -> Result<CreditAccount>;

    /// Atomically increment the balance by `amount` without touching the
    /// plan label. Used to roll back a debit whose upload failed.
    ///
    /// Returns the updated account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn refund_credits(&self, user_id: &UserId, amount: i64) -> Result<CreditAccount>;

    // =========================================================================
    // File Operations
    // =========================================================================

    /// Insert a file record. This also maintains the owner index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_file(&self, record: &FileRecord) -> Result<()>;

    /// Get a file record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_file(&self, file_id: &FileId) -> Result<Option<FileRecord>>;

    /// List file records owned by a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_files_by_owner(&self, owner: &UserId) -> Result<Vec<FileRecord>>;

    /// Delete a file record and its owner index entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_file(&self, record: &FileRecord) -> Result<()>;

    // =========================================================================
    // Order Operations
    // =========================================================================

    /// Insert a payment order. This also maintains the user index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_order(&self, order: &PaymentOrder) -> Result<()>;

    /// Get a payment order by its gateway order id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_order(&self, order_id: &str) -> Result<Option<PaymentOrder>>;

    /// List payment orders for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_orders_by_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<PaymentOrder>>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Settle an order: transition PENDING to SUCCESS, record the payment id
    /// and granted credits, and credit the owner's ledger, all in one atomic
    /// write.
    ///
    /// The transition is conditional on the order still being PENDING; a
    /// replayed or concurrent settle returns `OrderSettle::AlreadyFinal`
    /// without touching the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn settle_order(
        &self,
        order_id: &str,
        payment_id: &str,
        credits: i64,
        plan: Plan,
    ) -> Result<OrderSettle>;

    /// Mark an order FAILED, conditional on it still being PENDING.
    ///
    /// A missing order is a no-op (`OrderUpdate::Missing`), which keeps
    /// verification replays harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn fail_order(&self, order_id: &str, payment_id: Option<&str>) -> Result<OrderUpdate>;

    // =========================================================================
    // Profile Operations
    // =========================================================================

    /// Insert or update a profile snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_profile(&self, profile: &Profile) -> Result<()>;

    /// Get a profile by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>>;

    /// Delete a profile by user ID. No-op if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_profile(&self, user_id: &UserId) -> Result<()>;
}
