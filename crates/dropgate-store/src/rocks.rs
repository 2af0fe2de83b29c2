//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use dropgate_core::{CreditAccount, FileId, FileRecord, OrderStatus, PaymentOrder, Plan, Profile, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{OrderSettle, OrderUpdate, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes account read-modify-write cycles and order status
    /// transitions. Guarded decrements must never act on a stale read.
    ledger: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            ledger: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Acquire the ledger lock, recovering from a poisoned mutex. The guard
    /// only protects plain data already committed to the database, so a
    /// panicking holder cannot leave it inconsistent.
    fn lock_ledger(&self) -> std::sync::MutexGuard<'_, ()> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the account inside the ledger lock, creating a fresh one with the
    /// starting grant if absent.
    fn load_or_new_account(&self, user_id: &UserId) -> Result<CreditAccount> {
        Ok(self
            .get_account(user_id)?
            .unwrap_or_else(|| CreditAccount::new(*user_id)))
    }

    fn write_account(&self, account: &CreditAccount) -> Result<()> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(&account.user_id);
        let value = Self::serialize(account)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn put_account(&self, account: &CreditAccount) -> Result<()> {
        let _guard = self.lock_ledger();
        self.write_account(account)
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<CreditAccount>> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(user_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn ensure_account(&self, user_id: &UserId) -> Result<CreditAccount> {
        let _guard = self.lock_ledger();

        if let Some(account) = self.get_account(user_id)? {
            return Ok(account);
        }

        let account = CreditAccount::new(*user_id);
        self.write_account(&account)?;
        tracing::info!(user_id = %user_id, credits = account.credits, "Account created");

        Ok(account)
    }

    fn delete_account(&self, user_id: &UserId) -> Result<()> {
        let _guard = self.lock_ledger();

        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(user_id);

        self.db
            .delete_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn debit_credits(&self, user_id: &UserId, amount: i64) -> Result<CreditAccount> {
        let _guard = self.lock_ledger();

        let mut account = self.load_or_new_account(user_id)?;

        if account.credits < amount {
            return Err(StoreError::InsufficientCredits {
                balance: account.credits,
                required: amount,
            });
        }

        account.credits -= amount;
        account.updated_at = chrono::Utc::now();
        self.write_account(&account)?;

        Ok(account)
    }

    fn credit_credits(&self, user_id: &UserId, amount: i64, plan: Plan) -> Result<CreditAccount> {
        let _guard = self.lock_ledger();

        let mut account = self.load_or_new_account(user_id)?;

        account.credits += amount;
        account.plan = plan;
        account.updated_at = chrono::Utc::now();
        self.write_account(&account)?;

        Ok(account)
    }

    fn refund_credits(&self, user_id: &UserId, amount: i64) -> Result<CreditAccount> {
        let _guard = self.lock_ledger();

        let mut account = self.load_or_new_account(user_id)?;

        account.credits += amount;
        account.updated_at = chrono::Utc::now();
        self.write_account(&account)?;

        Ok(account)
    }

    // =========================================================================
    // File Operations
    // =========================================================================

    fn put_file(&self, record: &FileRecord) -> Result<()> {
        let cf_files = self.cf(cf::FILES)?;
        let cf_by_owner = self.cf(cf::FILES_BY_OWNER)?;

        let file_key = keys::file_key(&record.id);
        let owner_key = keys::owner_file_key(&record.owner, &record.id);
        let value = Self::serialize(record)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_files, &file_key, &value);
        batch.put_cf(&cf_by_owner, &owner_key, []); // Index entry (empty value)

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_file(&self, file_id: &FileId) -> Result<Option<FileRecord>> {
        let cf = self.cf(cf::FILES)?;
        let key = keys::file_key(file_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_files_by_owner(&self, owner: &UserId) -> Result<Vec<FileRecord>> {
        let cf_by_owner = self.cf(cf::FILES_BY_OWNER)?;
        let prefix = keys::owner_files_prefix(owner);

        let iter = self.db.iterator_cf(
            &cf_by_owner,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut records = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            let file_id = keys::extract_file_id_from_owner_key(&key);
            if let Some(record) = self.get_file(&file_id)? {
                records.push(record);
            }
        }

        Ok(records)
    }

    fn delete_file(&self, record: &FileRecord) -> Result<()> {
        let cf_files = self.cf(cf::FILES)?;
        let cf_by_owner = self.cf(cf::FILES_BY_OWNER)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_files, keys::file_key(&record.id));
        batch.delete_cf(&cf_by_owner, keys::owner_file_key(&record.owner, &record.id));

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    fn put_order(&self, order: &PaymentOrder) -> Result<()> {
        let cf_orders = self.cf(cf::ORDERS)?;
        let cf_by_user = self.cf(cf::ORDERS_BY_USER)?;

        let order_key = keys::order_key(&order.order_id);
        let user_key = keys::user_order_key(
            &order.user_id,
            order.created_at.timestamp_millis(),
            &order.order_id,
        );
        let value = Self::serialize(order)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_orders, &order_key, &value);
        batch.put_cf(&cf_by_user, &user_key, []); // Index entry (empty value)

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_order(&self, order_id: &str) -> Result<Option<PaymentOrder>> {
        let cf = self.cf(cf::ORDERS)?;
        let key = keys::order_key(order_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_orders_by_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<PaymentOrder>> {
        let cf_by_user = self.cf(cf::ORDERS_BY_USER)?;
        let prefix = keys::user_orders_prefix(user_id);

        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        // Collect matching keys first; the timestamp component makes them
        // chronological, so reversing yields newest first.
        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            all_keys.push(key.to_vec());
        }

        all_keys.reverse();

        let mut orders = Vec::new();
        for key in all_keys.into_iter().take(limit) {
            let order_id = keys::extract_order_id_from_user_key(&key);
            if let Some(order) = self.get_order(&order_id)? {
                orders.push(order);
            }
        }

        Ok(orders)
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn settle_order(
        &self,
        order_id: &str,
        payment_id: &str,
        credits: i64,
        plan: Plan,
    ) -> Result<OrderSettle> {
        let _guard = self.lock_ledger();

        let Some(mut order) = self.get_order(order_id)? else {
            return Ok(OrderSettle::Missing);
        };

        // Terminal-state guard: a replayed callback must not credit twice.
        if order.status.is_terminal() {
            return Ok(OrderSettle::AlreadyFinal(order));
        }

        let mut account = self.load_or_new_account(&order.user_id)?;
        account.credits += credits;
        account.plan = plan;
        account.updated_at = chrono::Utc::now();

        order.status = OrderStatus::Success;
        order.payment_id = Some(payment_id.to_string());
        order.credits_granted = credits;

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_orders = self.cf(cf::ORDERS)?;

        let account_value = Self::serialize(&account)?;
        let order_value = Self::serialize(&order)?;

        // The ledger credit and the terminal transition commit together.
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_accounts, keys::account_key(&order.user_id), &account_value);
        batch.put_cf(&cf_orders, keys::order_key(order_id), &order_value);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(OrderSettle::Settled { order, account })
    }

    fn fail_order(&self, order_id: &str, payment_id: Option<&str>) -> Result<OrderUpdate> {
        let _guard = self.lock_ledger();

        let Some(mut order) = self.get_order(order_id)? else {
            return Ok(OrderUpdate::Missing);
        };

        if order.status.is_terminal() {
            return Ok(OrderUpdate::AlreadyFinal(order));
        }

        order.status = OrderStatus::Failed;
        if let Some(payment_id) = payment_id {
            order.payment_id = Some(payment_id.to_string());
        }

        let cf_orders = self.cf(cf::ORDERS)?;
        let value = Self::serialize(&order)?;

        self.db
            .put_cf(&cf_orders, keys::order_key(order_id), value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(OrderUpdate::Applied(order))
    }

    // =========================================================================
    // Profile Operations
    // =========================================================================

    fn put_profile(&self, profile: &Profile) -> Result<()> {
        let cf = self.cf(cf::PROFILES)?;
        let key = keys::profile_key(&profile.user_id);
        let value = Self::serialize(profile)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        let cf = self.cf(cf::PROFILES)?;
        let key = keys::profile_key(user_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn delete_profile(&self, user_id: &UserId) -> Result<()> {
        let cf = self.cf(cf::PROFILES)?;
        let key = keys::profile_key(user_id);

        self.db
            .delete_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropgate_core::STARTING_CREDITS;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn ensure_account_grants_starting_credits() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let account = store.ensure_account(&user_id).unwrap();
        assert_eq!(account.credits, STARTING_CREDITS);
        assert_eq!(account.plan, Plan::Starter);

        // Idempotent: a second call returns the same account, no reset
        store.debit_credits(&user_id, 2).unwrap();
        let again = store.ensure_account(&user_id).unwrap();
        assert_eq!(again.credits, STARTING_CREDITS - 2);
    }

    #[test]
    fn debit_guard_leaves_balance_unchanged() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        store.ensure_account(&user_id).unwrap();

        let result = store.debit_credits(&user_id, STARTING_CREDITS + 1);
        assert!(matches!(
            result,
            Err(StoreError::InsufficientCredits {
                balance: STARTING_CREDITS,
                required
            }) if required == STARTING_CREDITS + 1
        ));

        let account = store.get_account(&user_id).unwrap().unwrap();
        assert_eq!(account.credits, STARTING_CREDITS);
    }

    #[test]
    fn debit_creates_account_implicitly() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let account = store.debit_credits(&user_id, 1).unwrap();
        assert_eq!(account.credits, STARTING_CREDITS - 1);
    }

    #[test]
    fn credit_sets_plan() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let account = store.credit_credits(&user_id, 500, Plan::Plus).unwrap();
        assert_eq!(account.credits, STARTING_CREDITS + 500);
        assert_eq!(account.plan, Plan::Plus);
    }

    #[test]
    fn refund_preserves_plan() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        store.credit_credits(&user_id, 500, Plan::Plus).unwrap();
        store.debit_credits(&user_id, 1).unwrap();

        let account = store.refund_credits(&user_id, 1).unwrap();
        assert_eq!(account.credits, STARTING_CREDITS + 500);
        assert_eq!(account.plan, Plan::Plus);
    }

    #[test]
    fn delete_account_is_noop_when_absent() {
        let (store, _dir) = create_test_store();
        store.delete_account(&UserId::generate()).unwrap();
    }

    #[test]
    fn concurrent_debits_never_overdraw() {
        let (store, _dir) = create_test_store();
        let store = std::sync::Arc::new(store);
        let user_id = UserId::generate();

        // Balance of exactly N; N threads each debit once.
        let n = STARTING_CREDITS;
        store.ensure_account(&user_id).unwrap();

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || store.debit_credits(&user_id, 1).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .filter(|h| h.join().unwrap())
            .count();

        assert_eq!(successes, usize::try_from(n).unwrap());
        let account = store.get_account(&user_id).unwrap().unwrap();
        assert_eq!(account.credits, 0);
    }

    #[test]
    fn concurrent_debits_beyond_balance_fail_exactly() {
        let (store, _dir) = create_test_store();
        let store = std::sync::Arc::new(store);
        let user_id = UserId::generate();
        store.ensure_account(&user_id).unwrap();

        // Twice as many debits as the balance covers.
        let attempts = STARTING_CREDITS * 2;
        let handles: Vec<_> = (0..attempts)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || store.debit_credits(&user_id, 1).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .filter(|h| h.join().unwrap())
            .count();

        assert_eq!(successes, usize::try_from(STARTING_CREDITS).unwrap());
        let account = store.get_account(&user_id).unwrap().unwrap();
        assert_eq!(account.credits, 0);
    }

    #[test]
    fn file_crud_and_owner_index() {
        let (store, _dir) = create_test_store();
        let owner = UserId::generate();
        let other = UserId::generate();

        let a = FileRecord::new(owner, "a.txt", 3, None, "/blobs/a", "a");
        std::thread::sleep(std::time::Duration::from_millis(2)); // Ensure different ULIDs
        let b = FileRecord::new(owner, "b.txt", 4, None, "/blobs/b", "b");
        let c = FileRecord::new(other, "c.txt", 5, None, "/blobs/c", "c");

        store.put_file(&a).unwrap();
        store.put_file(&b).unwrap();
        store.put_file(&c).unwrap();

        let retrieved = store.get_file(&a.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "a.txt");

        let listed = store.list_files_by_owner(&owner).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "a.txt"); // Oldest first
        assert_eq!(listed[1].name, "b.txt");

        store.delete_file(&a).unwrap();
        assert!(store.get_file(&a.id).unwrap().is_none());
        assert_eq!(store.list_files_by_owner(&owner).unwrap().len(), 1);
    }

    #[test]
    fn order_crud_and_user_index() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let mut first = PaymentOrder::new("order_1", user_id, "plus", 900, "USD");
        let mut second = PaymentOrder::new("order_2", user_id, "pro", 2900, "USD");
        first.created_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        second.created_at = chrono::Utc::now();

        store.put_order(&first).unwrap();
        store.put_order(&second).unwrap();

        let retrieved = store.get_order("order_1").unwrap().unwrap();
        assert_eq!(retrieved.plan_id, "plus");

        let listed = store.list_orders_by_user(&user_id, 10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].order_id, "order_2"); // Newest first
        assert_eq!(listed[1].order_id, "order_1");

        let limited = store.list_orders_by_user(&user_id, 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].order_id, "order_2");
    }

    #[test]
    fn settle_order_credits_exactly_once() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        store.ensure_account(&user_id).unwrap();

        let order = PaymentOrder::new("order_1", user_id, "pro", 2900, "USD");
        store.put_order(&order).unwrap();

        let outcome = store
            .settle_order("order_1", "pay_1", 2000, Plan::Pro)
            .unwrap();
        let OrderSettle::Settled { order, account } = outcome else {
            panic!("expected Settled");
        };
        assert_eq!(order.status, OrderStatus::Success);
        assert_eq!(order.credits_granted, 2000);
        assert_eq!(order.payment_id.as_deref(), Some("pay_1"));
        assert_eq!(account.credits, STARTING_CREDITS + 2000);

        // Replay: terminal-state guard, no second credit
        let replay = store
            .settle_order("order_1", "pay_1", 2000, Plan::Pro)
            .unwrap();
        assert!(matches!(replay, OrderSettle::AlreadyFinal(_)));

        let account = store.get_account(&user_id).unwrap().unwrap();
        assert_eq!(account.credits, STARTING_CREDITS + 2000);
    }

    #[test]
    fn settle_missing_order_is_noop() {
        let (store, _dir) = create_test_store();
        let outcome = store
            .settle_order("order_missing", "pay_1", 500, Plan::Plus)
            .unwrap();
        assert!(matches!(outcome, OrderSettle::Missing));
    }

    #[test]
    fn fail_order_is_conditional_on_pending() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let order = PaymentOrder::new("order_1", user_id, "plus", 900, "USD");
        store.put_order(&order).unwrap();

        let outcome = store.fail_order("order_1", Some("pay_1")).unwrap();
        let OrderUpdate::Applied(order) = outcome else {
            panic!("expected Applied");
        };
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.payment_id.as_deref(), Some("pay_1"));

        // Already terminal
        assert!(matches!(
            store.fail_order("order_1", None).unwrap(),
            OrderUpdate::AlreadyFinal(_)
        ));

        // Missing order is a no-op
        assert!(matches!(
            store.fail_order("order_unknown", None).unwrap(),
            OrderUpdate::Missing
        ));
    }

    #[test]
    fn profile_crud() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let mut profile = Profile::new(user_id);
        profile.email = Some("ada@example.com".into());
        store.put_profile(&profile).unwrap();

        let retrieved = store.get_profile(&user_id).unwrap().unwrap();
        assert_eq!(retrieved.email.as_deref(), Some("ada@example.com"));

        store.delete_profile(&user_id).unwrap();
        assert!(store.get_profile(&user_id).unwrap().is_none());

        // No-op on absent
        store.delete_profile(&user_id).unwrap();
    }
}
