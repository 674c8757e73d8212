//! Account registry trait and the in-memory implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use crate::account::{Account, AccountId, NewAccount};

/// Trait for account registry backends.
pub trait AccountRegistry: Send + Sync {
    /// Store a new account and return it with its assigned id.
    fn register(&self, account: NewAccount) -> Account;

    /// All accounts, newest first.
    fn list(&self) -> Vec<Account>;

    /// Get an account by id.
    fn get(&self, id: AccountId) -> Option<Account>;

    /// Delete an account. Past audit entries are untouched.
    fn remove(&self, id: AccountId) -> bool;

    /// The hosted-capable account to send from: lowest id with
    /// `hosted_enabled` set, whether or not it carries a credential.
    fn find_hosted_candidate(&self) -> Option<Account>;

    /// Record whether a web client session is paired with the account.
    fn set_connected(&self, id: AccountId, connected: bool) -> bool;
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    accounts: BTreeMap<AccountId, Account>,
}

/// Thread-safe in-memory account registry.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    inner: RwLock<Inner>,
}

impl MemoryRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry wrapped in an Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of registered accounts.
    pub fn count(&self) -> usize {
        self.inner.read().accounts.len()
    }
}

impl AccountRegistry for MemoryRegistry {
    fn register(&self, account: NewAccount) -> Account {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let id = AccountId(inner.next_id);
        let account = account.into_account(id, Utc::now());
        inner.accounts.insert(id, account.clone());

        tracing::debug!(account_id = %id, hosted = account.hosted_enabled, "Account registered");
        account
    }

    fn list(&self) -> Vec<Account> {
        let inner = self.inner.read();
        let mut accounts: Vec<Account> = inner.accounts.values().cloned().collect();
        // Same-instant registrations fall back to id order.
        accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        accounts
    }

    fn get(&self, id: AccountId) -> Option<Account> {
        self.inner.read().accounts.get(&id).cloned()
    }

    fn remove(&self, id: AccountId) -> bool {
        let removed = self.inner.write().accounts.remove(&id).is_some();
        if removed {
            tracing::debug!(account_id = %id, "Account removed");
        }
        removed
    }

    fn find_hosted_candidate(&self) -> Option<Account> {
        self.inner
            .read()
            .accounts
            .values()
            .find(|account| account.hosted_enabled)
            .cloned()
    }

    fn set_connected(&self, id: AccountId, connected: bool) -> bool {
        match self.inner.write().accounts.get_mut(&id) {
            Some(account) => {
                account.connected = connected;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_assigns_increasing_ids() {
        let registry = MemoryRegistry::new();
        let a = registry.register(NewAccount::new().name("a"));
        let b = registry.register(NewAccount::new().name("b"));
        assert!(a.id < b.id);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_list_newest_first() {
        let registry = MemoryRegistry::new();
        registry.register(NewAccount::new().name("first"));
        registry.register(NewAccount::new().name("second"));

        let names: Vec<_> = registry
            .list()
            .into_iter()
            .map(|a| a.name.unwrap())
            .collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[test]
    fn test_hosted_candidate_is_lowest_id() {
        let registry = MemoryRegistry::new();
        registry.register(NewAccount::new().name("manual"));
        let first = registry.register(NewAccount::new().name("cloud-1").hosted(true));
        registry.register(NewAccount::new().name("cloud-2").hosted(true));

        assert_eq!(registry.find_hosted_candidate().unwrap().id, first.id);

        registry.remove(first.id);
        assert_eq!(
            registry.find_hosted_candidate().unwrap().name.as_deref(),
            Some("cloud-2")
        );
    }

    #[test]
    fn test_no_hosted_candidate() {
        let registry = MemoryRegistry::new();
        registry.register(NewAccount::new().credential("1", "t"));
        assert!(registry.find_hosted_candidate().is_none());
    }

    #[test]
    fn test_remove_unknown() {
        let registry = MemoryRegistry::new();
        assert!(!registry.remove(AccountId(42)));
    }

    #[test]
    fn test_set_connected() {
        let registry = MemoryRegistry::new();
        let account = registry.register(NewAccount::new());
        assert!(registry.set_connected(account.id, true));
        assert!(registry.get(account.id).unwrap().connected);
        assert!(!registry.set_connected(AccountId(99), true));
    }
}
