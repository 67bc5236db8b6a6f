//! Reconciliation of locally known job snapshots with an authoritative fetch.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issue order of a fetch. Later requests carry larger stamps, so a response
/// can be compared against what was already applied regardless of when it
/// resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FetchStamp(pub u64);

/// Hands out strictly increasing [`FetchStamp`]s.
#[derive(Debug, Default)]
pub struct StampSource {
    next: AtomicU64,
}

impl StampSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> FetchStamp {
        FetchStamp(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<T> {
    pub value: T,
    pub stamp: FetchStamp,
}

impl<T> Stamped<T> {
    pub fn new(value: T, stamp: FetchStamp) -> Self {
        Self { value, stamp }
    }
}

/// Merges `local` entries with an authoritative `remote` fetch.
///
/// - ids present in both take the remote entry, unless the local one was
///   fetched later, or the local one is terminal and the remote is not;
/// - ids only in `remote` are taken as-is;
/// - ids only in `local` survive only while non-terminal.
///
/// Output order is remote order followed by surviving local-only entries.
pub fn merge<T, K, F, G>(local: Vec<Stamped<T>>, remote: Vec<Stamped<T>>, key: F, is_terminal: G) -> Vec<Stamped<T>>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
    G: Fn(&T) -> bool,
{
    let remote_keys: HashSet<K> = remote.iter().map(|entry| key(&entry.value)).collect();
    let mut local_by_key: HashMap<K, Stamped<T>> = HashMap::new();
    let mut local_only = Vec::new();

    for entry in local {
        if remote_keys.contains(&key(&entry.value)) {
            local_by_key.insert(key(&entry.value), entry);
        } else if !is_terminal(&entry.value) {
            local_only.push(entry);
        }
    }

    let mut merged: Vec<Stamped<T>> = remote
        .into_iter()
        .map(|remote_entry| match local_by_key.remove(&key(&remote_entry.value)) {
            Some(local_entry) if prefer_local(&local_entry, &remote_entry, &is_terminal) => local_entry,
            _ => remote_entry,
        })
        .collect();
    merged.extend(local_only);
    merged
}

fn prefer_local<T, G>(local: &Stamped<T>, remote: &Stamped<T>, is_terminal: &G) -> bool
where
    G: Fn(&T) -> bool,
{
    if is_terminal(&local.value) && !is_terminal(&remote.value) {
        return true;
    }
    local.stamp > remote.stamp
}
