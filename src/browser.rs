//! Browser bindings
//!
//! Everything that touches the host environment lives here: the
//! `localStorage` backend, the cross-view storage-event listener, and the
//! `#[wasm_bindgen]` facade the presentation layer calls. The facade speaks
//! JSON strings at the boundary.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;

use crate::engine::PrefsEngine;
use crate::enrich::enrich;
use crate::error::{PrefsError, Result};
use crate::grades::GradeBook;
use crate::notify::{Notifier, UserNotice};
use crate::records::{BrandDetail, BrandRef, EngagementAction, EngagementEvent, SavedBrand};
use crate::service::{BrandDataService, MockCrmService};
use crate::store::StorageBackend;
use crate::telemetry::TelemetrySink;

fn storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

/// `window.localStorage` as a [`StorageBackend`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorageBackend;

impl StorageBackend for LocalStorageBackend {
    fn get(&self, key: &str) -> Option<String> {
        storage().and_then(|s| s.get_item(key).ok().flatten())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let storage = storage()
            .ok_or_else(|| PrefsError::Storage("localStorage unavailable".to_string()))?;
        storage
            .set_item(key, value)
            .map_err(|err| PrefsError::Storage(format!("set_item failed: {err:?}")))
    }

    fn remove(&self, key: &str) {
        if let Some(storage) = storage() {
            let _ = storage.remove_item(key);
        }
    }
}

/// Live storage-event subscription for one view.
///
/// The browser fires `storage` on every *other* view of the origin after a
/// write lands; the handle forwards owned keys into the engine and ignores
/// the rest. Dropping the handle removes the listener.
pub struct StorageSyncHandle {
    closure: Closure<dyn FnMut(web_sys::StorageEvent)>,
}

impl StorageSyncHandle {
    pub fn attach(engine: Rc<RefCell<PrefsEngine<LocalStorageBackend>>>) -> Result<Self> {
        let closure = Closure::wrap(Box::new(move |event: web_sys::StorageEvent| {
            if let Some(key) = event.key() {
                engine.borrow_mut().apply_external_change(&key);
            }
        }) as Box<dyn FnMut(web_sys::StorageEvent)>);

        let window =
            web_sys::window().ok_or_else(|| PrefsError::Storage("no window".to_string()))?;
        window
            .add_event_listener_with_callback("storage", closure.as_ref().unchecked_ref())
            .map_err(|err| {
                PrefsError::Storage(format!("storage listener registration failed: {err:?}"))
            })?;
        Ok(Self { closure })
    }
}

impl Drop for StorageSyncHandle {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            let _ = window
                .remove_event_listener_with_callback("storage", self.closure.as_ref().unchecked_ref());
        }
    }
}

/// Routes notices to a JS handler `(title, description) => {}`.
struct CallbackNotifier {
    callback: js_sys::Function,
}

impl Notifier for CallbackNotifier {
    fn notify(&self, notice: &UserNotice) {
        let _ = self.callback.call2(
            &JsValue::NULL,
            &JsValue::from_str(&notice.title),
            &JsValue::from_str(&notice.description),
        );
    }
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

/// JS-facing preference center: one per view.
///
/// Mutation methods return whether state changed; `add_to_compare` throws
/// on a full compare set (after routing the quota notice to the registered
/// handler). Telemetry is dispatched after the mutation commits and can
/// never affect the result.
#[wasm_bindgen]
pub struct PrefsCenter {
    engine: Rc<RefCell<PrefsEngine<LocalStorageBackend>>>,
    telemetry: Rc<TelemetrySink<LocalStorageBackend>>,
    service: Rc<MockCrmService>,
    grades: GradeBook<LocalStorageBackend>,
    listener: Option<StorageSyncHandle>,
}

#[wasm_bindgen]
impl PrefsCenter {
    #[wasm_bindgen(constructor)]
    pub fn new() -> PrefsCenter {
        #[cfg(feature = "console_error_panic_hook")]
        crate::set_panic_hook();

        PrefsCenter {
            engine: Rc::new(RefCell::new(PrefsEngine::new(LocalStorageBackend))),
            telemetry: Rc::new(TelemetrySink::new(LocalStorageBackend)),
            service: Rc::new(MockCrmService::default()),
            grades: GradeBook::new(LocalStorageBackend),
            listener: None,
        }
    }

    /// Register the toast handler for quota notices.
    pub fn set_notice_handler(&mut self, handler: js_sys::Function) {
        self.engine
            .borrow_mut()
            .set_notifier(Box::new(CallbackNotifier { callback: handler }));
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Activate a user scope: hydrate persisted state and start listening
    /// for writes from other views.
    pub fn sign_in(&mut self, user_id: &str) {
        self.engine.borrow_mut().sign_in(user_id);
        self.listener = StorageSyncHandle::attach(self.engine.clone()).ok();
    }

    /// End the scope: stop listening, clear in-memory state. Persisted
    /// snapshots stay for the next sign-in.
    pub fn sign_out(&mut self) {
        self.listener = None;
        self.engine.borrow_mut().sign_out();
    }

    pub fn is_signed_in(&self) -> bool {
        self.engine.borrow().scope().is_some()
    }

    // =========================================================================
    // State snapshots (JSON)
    // =========================================================================

    pub fn likes_json(&self) -> String {
        to_json(&self.engine.borrow().likes())
    }

    pub fn dislikes_json(&self) -> String {
        to_json(&self.engine.borrow().dislikes())
    }

    pub fn compare_json(&self) -> String {
        to_json(&self.engine.borrow().compare())
    }

    pub fn saved_json(&self) -> String {
        to_json(&self.engine.borrow().saved())
    }

    pub fn is_liked(&self, id: &str) -> bool {
        self.engine.borrow().is_liked(id)
    }

    pub fn is_disliked(&self, id: &str) -> bool {
        self.engine.borrow().is_disliked(id)
    }

    pub fn in_compare(&self, id: &str) -> bool {
        self.engine.borrow().in_compare(id)
    }

    pub fn is_saved(&self, id: &str) -> bool {
        self.engine.borrow().is_saved(id)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub fn like(&self, reference_json: &str) -> std::result::Result<bool, JsValue> {
        let reference: BrandRef = serde_json::from_str(reference_json).map_err(to_js)?;
        let changed = self.engine.borrow_mut().like(&reference).map_err(to_js)?;
        if changed {
            self.dispatch(EngagementAction::Like, &reference);
        }
        Ok(changed)
    }

    pub fn remove_like(&self, id: &str) -> std::result::Result<bool, JsValue> {
        let changed = self.engine.borrow_mut().remove_like(id).map_err(to_js)?;
        if changed {
            self.dispatch(EngagementAction::Unlike, &BrandRef::new(id, ""));
        }
        Ok(changed)
    }

    pub fn dislike(&self, reference_json: &str) -> std::result::Result<bool, JsValue> {
        let reference: BrandRef = serde_json::from_str(reference_json).map_err(to_js)?;
        let changed = self.engine.borrow_mut().dislike(&reference).map_err(to_js)?;
        if changed {
            self.dispatch(EngagementAction::Dislike, &reference);
        }
        Ok(changed)
    }

    pub fn remove_dislike(&self, id: &str) -> std::result::Result<bool, JsValue> {
        let changed = self.engine.borrow_mut().remove_dislike(id).map_err(to_js)?;
        if changed {
            self.dispatch(EngagementAction::Undislike, &BrandRef::new(id, ""));
        }
        Ok(changed)
    }

    /// Add an enriched detail record to the compare set. Throws once the
    /// latest persisted snapshot already holds 4 records.
    pub fn add_to_compare(&self, detail_json: &str) -> std::result::Result<bool, JsValue> {
        let detail: BrandDetail = serde_json::from_str(detail_json).map_err(to_js)?;
        let reference = BrandRef::new(detail.id.clone(), detail.name.clone());
        let changed = self
            .engine
            .borrow_mut()
            .add_to_compare(detail)
            .map_err(to_js)?;
        if changed {
            self.dispatch(EngagementAction::Compare, &reference);
        }
        Ok(changed)
    }

    pub fn remove_from_compare(&self, id: &str) -> std::result::Result<bool, JsValue> {
        let changed = self
            .engine
            .borrow_mut()
            .remove_from_compare(id)
            .map_err(to_js)?;
        if changed {
            self.dispatch(EngagementAction::Uncompare, &BrandRef::new(id, ""));
        }
        Ok(changed)
    }

    pub fn save(&self, saved_json: &str) -> std::result::Result<bool, JsValue> {
        let brand: SavedBrand = serde_json::from_str(saved_json).map_err(to_js)?;
        let reference = BrandRef::new(brand.id.clone(), brand.name.clone());
        let changed = self.engine.borrow_mut().save(brand).map_err(to_js)?;
        if changed {
            self.dispatch(EngagementAction::Save, &reference);
        }
        Ok(changed)
    }

    pub fn unsave(&self, id: &str) -> std::result::Result<bool, JsValue> {
        let changed = self.engine.borrow_mut().unsave(id).map_err(to_js)?;
        if changed {
            self.dispatch(EngagementAction::Unsave, &BrandRef::new(id, ""));
        }
        Ok(changed)
    }

    // =========================================================================
    // Brand grades
    // =========================================================================

    pub fn record_grade(
        &self,
        brand_id: &str,
        brand_slug: &str,
        grade: &str,
    ) -> std::result::Result<(), JsValue> {
        self.grades
            .record(brand_id, brand_slug, grade)
            .map(|_| ())
            .map_err(to_js)
    }

    /// Grade lookup by slug, falling back to brand id. `"null"` when absent.
    pub fn grade_json(&self, slug_or_id: &str) -> String {
        let grade = self
            .grades
            .by_slug(slug_or_id)
            .or_else(|| self.grades.by_brand_id(slug_or_id));
        match grade {
            Some(grade) => to_json(&grade),
            None => "null".to_string(),
        }
    }

    // =========================================================================
    // Telemetry dispatch
    // =========================================================================

    /// Commit happened already; the side effect runs on its own with its
    /// own error boundary.
    fn dispatch(&self, action: EngagementAction, brand: &BrandRef) {
        let Some(user) = self.engine.borrow().scope().cloned() else {
            return;
        };
        let event = EngagementEvent::new(user.id, action, brand);
        let sink = self.telemetry.clone();
        let service = self.service.clone();
        spawn_local(async move {
            sink.track(&event, service.as_ref()).await;
        });
    }
}

impl Default for PrefsCenter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Async free functions (wasm-bindgen promises)
// =============================================================================

/// Resolve a bare reference to a full detail record, remote or synthetic.
/// Rejects only on an empty identifier or malformed JSON.
#[wasm_bindgen]
pub async fn enrich_reference(reference_json: String) -> std::result::Result<String, JsValue> {
    let reference: BrandRef = serde_json::from_str(&reference_json).map_err(to_js)?;
    let service = MockCrmService::default();
    let detail = enrich(&reference, &service).await.map_err(to_js)?;
    serde_json::to_string(&detail).map_err(to_js)
}

/// Category metadata as JSON, `"null"` when unknown or unavailable.
#[wasm_bindgen]
pub async fn fetch_category_json(slug: String) -> String {
    let service = MockCrmService::default();
    match service.fetch_category(&slug).await {
        Ok(Some(category)) => to_json(&category),
        Ok(None) | Err(_) => "null".to_string(),
    }
}
