// This file is part of the terraform-provider-ciphertrust project
//
// Copyright (C) The terraform-provider-ciphertrust authors, 2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

/// Registry of exclusive locks indexed by an arbitrary key
///
/// Locks are created on first use and kept for the lifetime of the registry.
/// The registry lock is only held while looking up the per-key lock, so
/// holders of unrelated keys never wait on each other.
#[derive(Debug, Default)]
pub struct KeyedMutex {
    store: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Lock held on a single key, released when dropped
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    #[cfg(test)]
    pub(crate) fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        debug!(key = %self.key, "lock released");
    }
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        // The map is never left in an inconsistent state, so poisoning can be ignored
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.entry(key.to_owned()).or_default().clone()
    }

    /// Wait until the lock associated with `key` is acquired
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let mutex = self.get(key);
        debug!(key, "waiting for lock");
        let guard = mutex.lock_owned().await;
        debug!(key, "lock acquired");
        KeyGuard {
            key: key.to_owned(),
            _guard: guard,
        }
    }

    /// Number of keys that have been locked at least once
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::KeyedMutex;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyedMutex::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let tasks = (0..16).map(|_| {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("vault-1").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            })
        });

        for result in futures::future::join_all(tasks).await {
            assert!(result.is_ok());
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn distinct_keys_do_not_block() {
        let locks = KeyedMutex::new();
        let _held = locks.lock("vault-1").await;

        let other = tokio::time::timeout(Duration::from_secs(1), locks.lock("vault-2")).await;
        assert!(other.is_ok());

        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock("vault-1")).await;
        assert!(same.is_err());
    }

    #[tokio::test]
    async fn released_on_drop() {
        let locks = KeyedMutex::new();
        {
            let guard = locks.lock("vault-1").await;
            assert_eq!(guard.key(), "vault-1");
        }
        let again = tokio::time::timeout(Duration::from_secs(1), locks.lock("vault-1")).await;
        assert!(again.is_ok());
        assert_eq!(locks.len(), 1);
    }
}
