//! Keyed persistent store
//!
//! Thin wrapper over an origin-scoped, synchronous key-value backend.
//! Responsible only for key layout, serialize/deserialize, and
//! default-value substitution. Two views of the same origin compute the
//! same key for the same `(user, kind)` pair, so the backend is the single
//! shared source of truth between them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::error::{PrefsError, Result};

/// Top-level namespace for every key this product owns.
pub const KEY_PREFIX: &str = "franchise_match";

/// One named category of persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Likes,
    Dislikes,
    Compare,
    Saved,
    BrandGrades,
    Contacts,
    Engagements,
}

impl StoreKind {
    /// The user-scoped kinds, in key-layout order.
    pub const USER_SCOPED: [StoreKind; 4] = [
        StoreKind::Likes,
        StoreKind::Dislikes,
        StoreKind::Compare,
        StoreKind::Saved,
    ];

    /// Key suffix for this kind. Part of the persisted layout; do not edit.
    pub fn suffix(&self) -> &'static str {
        match self {
            StoreKind::Likes => "preferences.likes",
            StoreKind::Dislikes => "preferences.dislikes",
            StoreKind::Compare => "compare",
            StoreKind::Saved => "saved",
            StoreKind::BrandGrades => "brand_grades",
            StoreKind::Contacts => "contacts",
            StoreKind::Engagements => "engagements",
        }
    }

    /// Whether keys of this kind are partitioned by user.
    pub fn is_user_scoped(&self) -> bool {
        matches!(
            self,
            StoreKind::Likes | StoreKind::Dislikes | StoreKind::Compare | StoreKind::Saved
        )
    }
}

/// Compute the storage key for a kind. Pure: every view for the same user
/// arrives at the identical key.
pub fn storage_key(kind: StoreKind, user_id: Option<&str>) -> String {
    match user_id {
        Some(user) if kind.is_user_scoped() => {
            format!("{}.{}.{}", KEY_PREFIX, user, kind.suffix())
        }
        _ => format!("{}.{}", KEY_PREFIX, kind.suffix()),
    }
}

/// Classify a storage key against an active user scope.
///
/// Returns the user-scoped kind the key belongs to, or `None` for keys of
/// other users, global kinds, and foreign keys. The cross-view listener
/// only reacts to `Some` results.
pub fn owned_kind(user_id: &str, key: &str) -> Option<StoreKind> {
    StoreKind::USER_SCOPED
        .into_iter()
        .find(|kind| storage_key(*kind, Some(user_id)) == key)
}

/// Synchronous string key-value backend, the seam between the core and the
/// host environment's storage.
pub trait StorageBackend {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str);
}

/// In-memory backend. Clones share one underlying map, which models what
/// several views of one origin see: a single mutable store with no lock.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    cells: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.cells.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.lock().is_empty()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.cells.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.cells.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.cells.lock().remove(key);
    }
}

/// Keyed store: serialize/deserialize plus default substitution over a
/// backend. `read` never fails; `write` completes synchronously, so its
/// effect is visible to any read that follows it.
#[derive(Clone)]
pub struct KeyedStore<S> {
    backend: S,
}

impl<S: StorageBackend> KeyedStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Read a user-scoped snapshot. A missing key or a value that fails to
    /// deserialize both yield `default`.
    pub fn read<T: DeserializeOwned>(&self, user_id: &str, kind: StoreKind, default: T) -> T {
        debug_assert!(kind.is_user_scoped());
        self.read_key(&storage_key(kind, Some(user_id)), default)
    }

    /// Write a user-scoped snapshot.
    pub fn write<T: Serialize>(&self, user_id: &str, kind: StoreKind, value: &T) -> Result<()> {
        debug_assert!(kind.is_user_scoped());
        self.write_key(&storage_key(kind, Some(user_id)), value)
    }

    /// Read a global (non-user-scoped) snapshot.
    pub fn read_global<T: DeserializeOwned>(&self, kind: StoreKind, default: T) -> T {
        debug_assert!(!kind.is_user_scoped());
        self.read_key(&storage_key(kind, None), default)
    }

    /// Write a global snapshot.
    pub fn write_global<T: Serialize>(&self, kind: StoreKind, value: &T) -> Result<()> {
        debug_assert!(!kind.is_user_scoped());
        self.write_key(&storage_key(kind, None), value)
    }

    fn read_key<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.backend.get(key) else {
            return default;
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, %err, "undeserializable snapshot, substituting default");
                default
            }
        }
    }

    fn write_key<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.backend
            .set(key, &raw)
            .map_err(|err| PrefsError::Storage(format!("write of {key} failed: {err}")))
    }
}
