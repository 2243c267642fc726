//! Mutation protocol and in-memory reactive state
//!
//! One `PrefsEngine` lives in each view (tab) of the application. The
//! persisted store is shared between views with no lock, so every mutation
//! re-reads the latest persisted snapshot before deciding anything; the
//! in-memory copy is never trusted at mutation time. In-memory state is
//! only ever assigned from the value just written or just re-read, so the
//! two cannot drift.

use tracing::{debug, trace};

use crate::error::{PrefsError, Result};
use crate::notify::{Notifier, NullNotifier, UserNotice};
use crate::records::{BrandDetail, BrandRef, PreferenceEntry, SavedBrand};
use crate::session::{SessionProvider, UserScope};
use crate::store::{owned_kind, KeyedStore, StorageBackend, StoreKind};

/// Capacity of the compare set.
pub const COMPARE_LIMIT: usize = 4;

/// Per-view preference state machine.
///
/// All mutations are synchronous and run to completion within one turn of
/// the view's event loop. They return whether state actually changed, so a
/// caller can gate telemetry on real commits. Mutations with no active user
/// scope are silent no-ops.
pub struct PrefsEngine<S: StorageBackend> {
    store: KeyedStore<S>,
    scope: Option<UserScope>,
    likes: Vec<PreferenceEntry>,
    dislikes: Vec<PreferenceEntry>,
    compare: Vec<BrandDetail>,
    saved: Vec<SavedBrand>,
    notifier: Box<dyn Notifier>,
}

impl<S: StorageBackend> PrefsEngine<S> {
    pub fn new(backend: S) -> Self {
        Self::with_notifier(backend, Box::new(NullNotifier))
    }

    pub fn with_notifier(backend: S, notifier: Box<dyn Notifier>) -> Self {
        Self {
            store: KeyedStore::new(backend),
            scope: None,
            likes: Vec::new(),
            dislikes: Vec::new(),
            compare: Vec::new(),
            saved: Vec::new(),
            notifier,
        }
    }

    pub fn store(&self) -> &KeyedStore<S> {
        &self.store
    }

    /// Replace the notification sink (e.g. with a toast callback).
    pub fn set_notifier(&mut self, notifier: Box<dyn Notifier>) {
        self.notifier = notifier;
    }

    pub fn scope(&self) -> Option<&UserScope> {
        self.scope.as_ref()
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Activate a user scope and hydrate in-memory state from the persisted
    /// snapshots of that user.
    pub fn sign_in(&mut self, user_id: &str) {
        self.scope = Some(UserScope::new(user_id));
        self.refresh();
        debug!(user = user_id, "scope activated");
    }

    /// End the active scope. Clears in-memory state only; the persisted
    /// snapshots stay keyed to the user and reappear on the next sign-in.
    pub fn sign_out(&mut self) {
        if let Some(scope) = self.scope.take() {
            debug!(user = %scope.id, "scope cleared");
        }
        self.likes.clear();
        self.dislikes.clear();
        self.compare.clear();
        self.saved.clear();
    }

    /// Mirror the host identity provider: sign in or out so the engine's
    /// scope matches `provider.current_user()`.
    pub fn sync_session(&mut self, provider: &dyn SessionProvider) {
        match provider.current_user() {
            Some(user) => {
                let already_active = self
                    .scope
                    .as_ref()
                    .is_some_and(|scope| scope.id == user.id);
                if !already_active {
                    self.sign_in(&user.id);
                }
            }
            None => {
                if self.scope.is_some() {
                    self.sign_out();
                }
            }
        }
    }

    /// Re-hydrate every in-memory set from the persisted snapshots.
    pub fn refresh(&mut self) {
        let Some(user) = self.scope.clone() else {
            return;
        };
        self.likes = self.store.read(&user.id, StoreKind::Likes, Vec::new());
        self.dislikes = self.store.read(&user.id, StoreKind::Dislikes, Vec::new());
        self.compare = self.store.read(&user.id, StoreKind::Compare, Vec::new());
        self.saved = self.store.read(&user.id, StoreKind::Saved, Vec::new());
    }

    // =========================================================================
    // Reactive state accessors
    // =========================================================================

    pub fn likes(&self) -> &[PreferenceEntry] {
        &self.likes
    }

    pub fn dislikes(&self) -> &[PreferenceEntry] {
        &self.dislikes
    }

    pub fn compare(&self) -> &[BrandDetail] {
        &self.compare
    }

    pub fn saved(&self) -> &[SavedBrand] {
        &self.saved
    }

    pub fn is_liked(&self, id: &str) -> bool {
        self.likes.iter().any(|e| e.id == id)
    }

    pub fn is_disliked(&self, id: &str) -> bool {
        self.dislikes.iter().any(|e| e.id == id)
    }

    pub fn in_compare(&self, id: &str) -> bool {
        self.compare.iter().any(|d| d.id == id)
    }

    pub fn is_saved(&self, id: &str) -> bool {
        self.saved.iter().any(|s| s.id == id)
    }

    // =========================================================================
    // Preference mutations (likes/dislikes pair)
    // =========================================================================

    /// Add a brand to likes, removing it from dislikes if present there.
    pub fn like(&mut self, reference: &BrandRef) -> Result<bool> {
        self.add_preference(reference, StoreKind::Likes, StoreKind::Dislikes)
    }

    pub fn remove_like(&mut self, id: &str) -> Result<bool> {
        self.remove_preference(id, StoreKind::Likes)
    }

    /// Add a brand to dislikes, removing it from likes if present there.
    pub fn dislike(&mut self, reference: &BrandRef) -> Result<bool> {
        self.add_preference(reference, StoreKind::Dislikes, StoreKind::Likes)
    }

    pub fn remove_dislike(&mut self, id: &str) -> Result<bool> {
        self.remove_preference(id, StoreKind::Dislikes)
    }

    fn add_preference(
        &mut self,
        reference: &BrandRef,
        kind: StoreKind,
        sibling: StoreKind,
    ) -> Result<bool> {
        let Ok(user) = self.require_scope() else {
            trace!(brand = %reference.id, "preference mutation ignored, no active user");
            return Ok(false);
        };

        let mut target: Vec<PreferenceEntry> = self.store.read(&user.id, kind, Vec::new());
        if target.iter().any(|e| e.id == reference.id) {
            // A stale view re-adding an existing id: success, no write.
            self.assign_preferences(kind, target);
            return Ok(false);
        }

        // A given id lives in at most one of the two sets. Read the sibling
        // fresh as well before deciding whether it needs a write.
        let mut sib: Vec<PreferenceEntry> = self.store.read(&user.id, sibling, Vec::new());
        let had = sib.len();
        sib.retain(|e| e.id != reference.id);
        if sib.len() != had {
            self.store.write(&user.id, sibling, &sib)?;
        }
        self.assign_preferences(sibling, sib);

        target.push(PreferenceEntry::from_ref(reference));
        self.store.write(&user.id, kind, &target)?;
        self.assign_preferences(kind, target);
        Ok(true)
    }

    fn remove_preference(&mut self, id: &str, kind: StoreKind) -> Result<bool> {
        let Ok(user) = self.require_scope() else {
            return Ok(false);
        };

        let mut entries: Vec<PreferenceEntry> = self.store.read(&user.id, kind, Vec::new());
        let had = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == had {
            // Removing a non-member is a no-op success.
            self.assign_preferences(kind, entries);
            return Ok(false);
        }
        self.store.write(&user.id, kind, &entries)?;
        self.assign_preferences(kind, entries);
        Ok(true)
    }

    fn assign_preferences(&mut self, kind: StoreKind, value: Vec<PreferenceEntry>) {
        match kind {
            StoreKind::Likes => self.likes = value,
            StoreKind::Dislikes => self.dislikes = value,
            _ => {}
        }
    }

    // =========================================================================
    // Compare set (capacity-bounded)
    // =========================================================================

    /// Add a detailed record to the compare set.
    ///
    /// Fails with [`PrefsError::QuotaExceeded`] when the latest persisted
    /// snapshot is already at capacity; the quota notice is emitted through
    /// the notifier and storage is left untouched.
    pub fn add_to_compare(&mut self, detail: BrandDetail) -> Result<bool> {
        let Ok(user) = self.require_scope() else {
            trace!(brand = %detail.id, "compare mutation ignored, no active user");
            return Ok(false);
        };

        let mut set: Vec<BrandDetail> = self.store.read(&user.id, StoreKind::Compare, Vec::new());
        if set.iter().any(|d| d.id == detail.id) {
            self.compare = set;
            return Ok(false);
        }
        if set.len() >= COMPARE_LIMIT {
            debug!(brand = %detail.id, limit = COMPARE_LIMIT, "compare set at capacity");
            self.compare = set;
            self.notifier.notify(&UserNotice::compare_full());
            return Err(PrefsError::QuotaExceeded {
                limit: COMPARE_LIMIT,
            });
        }

        set.push(detail);
        self.store.write(&user.id, StoreKind::Compare, &set)?;
        self.compare = set;
        Ok(true)
    }

    pub fn remove_from_compare(&mut self, id: &str) -> Result<bool> {
        let Ok(user) = self.require_scope() else {
            return Ok(false);
        };

        let mut set: Vec<BrandDetail> = self.store.read(&user.id, StoreKind::Compare, Vec::new());
        let had = set.len();
        set.retain(|d| d.id != id);
        if set.len() == had {
            self.compare = set;
            return Ok(false);
        }
        self.store.write(&user.id, StoreKind::Compare, &set)?;
        self.compare = set;
        Ok(true)
    }

    // =========================================================================
    // Saved set (independent, unbounded)
    // =========================================================================

    pub fn save(&mut self, brand: SavedBrand) -> Result<bool> {
        let Ok(user) = self.require_scope() else {
            trace!(brand = %brand.id, "save ignored, no active user");
            return Ok(false);
        };

        let mut set: Vec<SavedBrand> = self.store.read(&user.id, StoreKind::Saved, Vec::new());
        if set.iter().any(|s| s.id == brand.id) {
            self.saved = set;
            return Ok(false);
        }
        set.push(brand);
        self.store.write(&user.id, StoreKind::Saved, &set)?;
        self.saved = set;
        Ok(true)
    }

    pub fn unsave(&mut self, id: &str) -> Result<bool> {
        let Ok(user) = self.require_scope() else {
            return Ok(false);
        };

        let mut set: Vec<SavedBrand> = self.store.read(&user.id, StoreKind::Saved, Vec::new());
        let had = set.len();
        set.retain(|s| s.id != id);
        if set.len() == had {
            self.saved = set;
            return Ok(false);
        }
        self.store.write(&user.id, StoreKind::Saved, &set)?;
        self.saved = set;
        Ok(true)
    }

    // =========================================================================
    // Cross-view synchronization
    // =========================================================================

    /// React to a storage change made by another view.
    ///
    /// The key decides everything: keys of other users, global kinds, and
    /// foreign keys are ignored. For an owned key the affected set is
    /// replaced wholesale from the store: the notification already reflects
    /// the authoritative post-write value, so there is nothing to merge.
    pub fn apply_external_change(&mut self, key: &str) -> bool {
        let Some(user) = self.scope.clone() else {
            return false;
        };
        let Some(kind) = owned_kind(&user.id, key) else {
            return false;
        };

        trace!(key, "re-hydrating from external change");
        match kind {
            StoreKind::Likes => {
                self.likes = self.store.read(&user.id, kind, Vec::new());
            }
            StoreKind::Dislikes => {
                self.dislikes = self.store.read(&user.id, kind, Vec::new());
            }
            StoreKind::Compare => {
                self.compare = self.store.read(&user.id, kind, Vec::new());
            }
            StoreKind::Saved => {
                self.saved = self.store.read(&user.id, kind, Vec::new());
            }
            _ => {}
        }
        true
    }

    fn require_scope(&self) -> Result<UserScope> {
        self.scope.clone().ok_or(PrefsError::NotAuthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;
    use crate::store::{storage_key, MemoryBackend};

    fn engine() -> PrefsEngine<MemoryBackend> {
        let mut engine = PrefsEngine::new(MemoryBackend::new());
        engine.sign_in("u1");
        engine
    }

    fn detail(id: &str) -> BrandDetail {
        crate::enrich::synthesize_detail(&BrandRef::new(id, ""))
    }

    #[test]
    fn like_is_idempotent() {
        let mut engine = engine();
        assert!(engine.like(&BrandRef::new("kfc-1", "KFC")).unwrap());
        assert!(!engine.like(&BrandRef::new("kfc-1", "KFC")).unwrap());
        assert_eq!(engine.likes().len(), 1);
    }

    #[test]
    fn like_removes_from_dislikes() {
        let mut engine = engine();
        engine.dislike(&BrandRef::new("kfc-1", "KFC")).unwrap();
        assert!(engine.is_disliked("kfc-1"));

        assert!(engine.like(&BrandRef::new("kfc-1", "KFC")).unwrap());
        assert!(!engine.is_disliked("kfc-1"));
        assert_eq!(engine.likes().len(), 1);
        assert_eq!(engine.likes()[0].id, "kfc-1");
        assert!(engine.likes()[0].timestamp > 0);
    }

    #[test]
    fn id_never_in_both_preference_sets() {
        let mut engine = engine();
        let brand = BrandRef::new("subway-1", "Subway");
        engine.like(&brand).unwrap();
        engine.dislike(&brand).unwrap();
        engine.like(&brand).unwrap();
        engine.dislike(&brand).unwrap();
        assert!(!engine.is_liked("subway-1"));
        assert!(engine.is_disliked("subway-1"));
        assert_eq!(engine.likes().len() + engine.dislikes().len(), 1);
    }

    #[test]
    fn remove_of_non_member_is_noop() {
        let mut engine = engine();
        engine.like(&BrandRef::new("kfc-1", "KFC")).unwrap();
        assert!(!engine.remove_like("nobody").unwrap());
        assert_eq!(engine.likes().len(), 1);
        assert!(!engine.remove_from_compare("nobody").unwrap());
        assert!(!engine.unsave("nobody").unwrap());
    }

    #[test]
    fn compare_quota_enforced_at_four() {
        let notifier = MemoryNotifier::new();
        let mut engine =
            PrefsEngine::with_notifier(MemoryBackend::new(), Box::new(notifier.clone()));
        engine.sign_in("u1");

        for id in ["a-1", "b-1", "c-1", "d-1"] {
            assert!(engine.add_to_compare(detail(id)).unwrap());
        }
        assert_eq!(engine.compare().len(), 4);

        let err = engine.add_to_compare(detail("e-1")).unwrap_err();
        assert!(matches!(err, PrefsError::QuotaExceeded { limit: 4 }));
        assert_eq!(engine.compare().len(), 4);

        let notices = notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].description, "Maximum comparison items reached.");
    }

    #[test]
    fn compare_add_is_idempotent() {
        let mut engine = engine();
        assert!(engine.add_to_compare(detail("a-1")).unwrap());
        assert!(!engine.add_to_compare(detail("a-1")).unwrap());
        assert_eq!(engine.compare().len(), 1);
    }

    #[test]
    fn saved_set_is_independent() {
        let mut engine = engine();
        let brand = BrandRef::new("kfc-1", "KFC");
        engine.like(&brand).unwrap();
        engine.save(SavedBrand::from_ref(&brand)).unwrap();
        engine.dislike(&brand).unwrap();
        // Moving between likes/dislikes never touches saved.
        assert!(engine.is_saved("kfc-1"));
        assert!(!engine.save(SavedBrand::from_ref(&brand)).unwrap());
        assert_eq!(engine.saved().len(), 1);
    }

    #[test]
    fn mutations_are_noops_when_signed_out() {
        let mut engine = PrefsEngine::new(MemoryBackend::new());
        assert!(!engine.like(&BrandRef::new("kfc-1", "KFC")).unwrap());
        assert!(!engine.add_to_compare(detail("a-1")).unwrap());
        assert!(engine.likes().is_empty());
        assert!(engine.store().backend().is_empty());
    }

    #[test]
    fn sign_out_clears_memory_but_not_storage() {
        let backend = MemoryBackend::new();
        let mut engine = PrefsEngine::new(backend.clone());
        engine.sign_in("u1");
        engine.like(&BrandRef::new("kfc-1", "KFC")).unwrap();

        engine.sign_out();
        assert!(engine.likes().is_empty());
        assert!(!backend.is_empty());

        engine.sign_in("u1");
        assert!(engine.is_liked("kfc-1"));
    }

    #[test]
    fn stale_view_duplicate_add_is_absorbed() {
        // Two views over one origin: view B's in-memory state is stale when
        // it repeats view A's add, but the read-latest step absorbs it.
        let backend = MemoryBackend::new();
        let mut view_a = PrefsEngine::new(backend.clone());
        let mut view_b = PrefsEngine::new(backend);
        view_a.sign_in("u1");
        view_b.sign_in("u1");

        assert!(view_a.like(&BrandRef::new("kfc-1", "KFC")).unwrap());
        assert!(!view_b.like(&BrandRef::new("kfc-1", "KFC")).unwrap());
        view_b.refresh();
        assert_eq!(view_b.likes().len(), 1);
    }

    #[test]
    fn sync_session_mirrors_the_provider() {
        use crate::session::FixedSession;

        let mut engine = PrefsEngine::new(MemoryBackend::new());
        engine.sync_session(&FixedSession::signed_in("u1"));
        assert_eq!(engine.scope().map(|s| s.id.as_str()), Some("u1"));

        engine.like(&BrandRef::new("kfc-1", "KFC")).unwrap();
        engine.sync_session(&FixedSession::signed_out());
        assert!(engine.scope().is_none());
        assert!(engine.likes().is_empty());

        engine.sync_session(&FixedSession::signed_in("u1"));
        assert!(engine.is_liked("kfc-1"));
    }

    #[test]
    fn external_change_rehydrates_owned_keys_only() {
        let backend = MemoryBackend::new();
        let mut view_a = PrefsEngine::new(backend.clone());
        let mut view_b = PrefsEngine::new(backend);
        view_a.sign_in("u1");
        view_b.sign_in("u1");

        view_a.like(&BrandRef::new("kfc-1", "KFC")).unwrap();
        assert!(view_b.likes().is_empty());

        let key = storage_key(StoreKind::Likes, Some("u1"));
        assert!(view_b.apply_external_change(&key));
        assert_eq!(view_b.likes().len(), 1);

        // Another user's key must be ignored.
        let foreign = storage_key(StoreKind::Likes, Some("u2"));
        assert!(!view_b.apply_external_change(&foreign));
    }
}
