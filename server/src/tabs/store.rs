//! In-memory tab state store.
//!
//! Each user's tab set sits behind its own mutex so that mutations for one
//! user never contend with another. The outer DashMap is only held for the
//! lookup of the per-user slot.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

use super::{TabRecord, UserTabSet};

type UserSlot = Arc<Mutex<UserTabSet>>;

/// user id → open tabs.
#[derive(Default)]
pub struct TabStateStore {
    users: DashMap<String, UserSlot>,
}

impl TabStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the user's slot, creating an empty one if absent.
    fn slot(&self, user_id: &str) -> UserSlot {
        if let Some(slot) = self.users.get(user_id) {
            return slot.value().clone();
        }
        self.users
            .entry(user_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    fn existing(&self, user_id: &str) -> Option<UserSlot> {
        self.users.get(user_id).map(|slot| slot.value().clone())
    }

    /// Make sure an (possibly empty) entry exists for the user.
    pub fn ensure_user(&self, user_id: &str) {
        let _ = self.slot(user_id);
    }

    /// Whether the store has ever seen this user.
    pub fn contains_user(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    /// Insert or overwrite the URL of a tab.
    pub fn open_tab(&self, user_id: &str, tab_id: &str, url: &str) {
        let slot = self.slot(user_id);
        let mut tabs = slot.lock();
        let _ = tabs.insert(tab_id.to_string(), url.to_string());
    }

    /// Remove a tab. Returns its URL if it was open.
    pub fn close_tab(&self, user_id: &str, tab_id: &str) -> Option<String> {
        let slot = self.existing(user_id)?;
        let mut tabs = slot.lock();
        tabs.remove(tab_id)
    }

    /// Remove a tab only if it still shows `url`.
    pub fn close_tab_if_url(&self, user_id: &str, tab_id: &str, url: &str) -> bool {
        let Some(slot) = self.existing(user_id) else {
            return false;
        };
        let mut tabs = slot.lock();
        if tabs.get(tab_id).is_some_and(|current| current == url) {
            let _ = tabs.remove(tab_id);
            true
        } else {
            false
        }
    }

    /// Remove every tab of the user currently showing `url`.
    pub fn close_url(&self, user_id: &str, url: &str) -> Vec<TabRecord> {
        let Some(slot) = self.existing(user_id) else {
            return Vec::new();
        };
        let mut tabs = slot.lock();
        let mut removed = Vec::new();
        tabs.retain(|tab_id, tab_url| {
            if tab_url == url {
                removed.push(TabRecord::new(tab_id.clone(), tab_url.clone()));
                false
            } else {
                true
            }
        });
        removed
    }

    /// Clear the user's tabs, returning exactly what was there before.
    /// The user entry itself is kept.
    pub fn close_all(&self, user_id: &str) -> UserTabSet {
        match self.existing(user_id) {
            Some(slot) => std::mem::take(&mut *slot.lock()),
            None => UserTabSet::new(),
        }
    }

    /// Point-in-time copy of the user's tabs. Empty for unknown users.
    pub fn snapshot(&self, user_id: &str) -> UserTabSet {
        self.existing(user_id)
            .map(|slot| slot.lock().clone())
            .unwrap_or_default()
    }

    /// Run `f` against the user's tabs while holding the user's lock.
    /// Any mutation racing with `f` is ordered strictly before or after it.
    pub fn with_tabs<R>(&self, user_id: &str, f: impl FnOnce(&UserTabSet) -> R) -> R {
        match self.existing(user_id) {
            Some(slot) => {
                let tabs = slot.lock();
                f(&tabs)
            }
            None => f(&UserTabSet::new()),
        }
    }

    /// Number of users known to the store.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}
