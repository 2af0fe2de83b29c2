//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in
//! column families.

use dropgate_core::{FileId, UserId};

/// Create an account key from a user ID.
#[must_use]
pub fn account_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a profile key from a user ID.
#[must_use]
pub fn profile_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a file key from a file ID.
#[must_use]
pub fn file_key(file_id: &FileId) -> Vec<u8> {
    file_id.to_bytes().to_vec()
}

/// Create an owner-file index key.
///
/// Format: `user_id (16 bytes) || file_id (16 bytes)`
///
/// Since file IDs are ULIDs, one owner's files sort by upload time.
#[must_use]
pub fn owner_file_key(owner: &UserId, file_id: &FileId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(owner.as_bytes());
    key.extend_from_slice(&file_id.to_bytes());
    key
}

/// Create a prefix for iterating all files owned by a user.
#[must_use]
pub fn owner_files_prefix(owner: &UserId) -> Vec<u8> {
    owner.as_bytes().to_vec()
}

/// Extract the file ID from an owner-file index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_file_id_from_owner_key(key: &[u8]) -> FileId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    FileId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create an order key from the gateway-issued order id.
#[must_use]
pub fn order_key(order_id: &str) -> Vec<u8> {
    order_id.as_bytes().to_vec()
}

/// Create a user-order index key.
///
/// Format: `user_id (16 bytes) || created_at_millis (8 bytes, big-endian) || order_id`
///
/// Gateway order ids carry no time component, so the creation timestamp is
/// encoded explicitly to give the index chronological order.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn user_order_key(user_id: &UserId, created_at_millis: i64, order_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(24 + order_id.len());
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&(created_at_millis as u64).to_be_bytes());
    key.extend_from_slice(order_id.as_bytes());
    key
}

/// Create a prefix for iterating all orders for a user.
#[must_use]
pub fn user_orders_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the order id from a user-order index key.
///
/// # Panics
///
/// Panics if the key is shorter than 24 bytes or the order id is not UTF-8.
#[must_use]
pub fn extract_order_id_from_user_key(key: &[u8]) -> String {
    String::from_utf8(key[24..].to_vec()).expect("order ids are UTF-8")
}
