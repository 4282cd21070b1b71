use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, String>,
    refreshing: HashSet<String>,
}

/// Outcome of [`DirectoryCache::lookup`].
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup {
    Hit(String),
    /// Miss; the caller now owns the refresh for this path.
    Claimed,
    /// Miss; a refresh is already running.
    Pending,
}

/// Last computed listing JSON per requested path. Entries are only ever
/// overwritten, never expired.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    state: Mutex<State>,
}

impl DirectoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.lock().entries.get(path).cloned()
    }

    pub fn insert(&self, path: &str, listing: String) {
        self.lock().entries.insert(path.to_string(), listing);
    }

    /// Return the entry for `path`, or claim its refresh if nobody has.
    pub fn lookup(&self, path: &str) -> Lookup {
        let mut state = self.lock();
        if let Some(listing) = state.entries.get(path) {
            return Lookup::Hit(listing.clone());
        }
        if state.refreshing.insert(path.to_string()) {
            Lookup::Claimed
        } else {
            Lookup::Pending
        }
    }

    /// Release a claim taken by [`lookup`](Self::lookup).
    pub fn finish_refresh(&self, path: &str) {
        self.lock().refreshing.remove(path);
    }

    pub fn refreshing(&self) -> usize {
        self.lock().refreshing.len()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}
