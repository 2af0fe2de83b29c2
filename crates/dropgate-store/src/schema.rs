//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Credit accounts, keyed by `user_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// File metadata records, keyed by `file_id` (ULID).
    pub const FILES: &str = "files";

    /// Index: files by owner, keyed by `user_id || file_id`.
    /// Value is empty (index only).
    pub const FILES_BY_OWNER: &str = "files_by_owner";

    /// Payment orders, keyed by the gateway-issued order id.
    pub const ORDERS: &str = "orders";

    /// Index: orders by user, keyed by `user_id || created_at_millis || order_id`.
    /// Value is empty (index only).
    pub const ORDERS_BY_USER: &str = "orders_by_user";

    /// Profile snapshots, keyed by `user_id`.
    pub const PROFILES: &str = "profiles";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::FILES,
        cf::FILES_BY_OWNER,
        cf::ORDERS,
        cf::ORDERS_BY_USER,
        cf::PROFILES,
    ]
}
