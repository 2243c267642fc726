//! Franchise Prefs Core - Client-Side Preference State Engine
//!
//! Per-user preference state (liked/disliked brands, a bounded compare set,
//! saved items) for franchise-matching web clients, kept consistent across
//! every open view of the same origin. Compiled to WebAssembly for use from
//! a browser presentation layer; fully usable as a native crate.
//!
//! # Key Features
//! - User-keyed persistent store over origin-scoped browser storage
//! - Read-latest-before-write mutations safe against concurrent tabs
//! - Likes/dislikes mutual exclusion, compare set capped at 4
//! - Storage-event listener re-hydrating state written by other views
//! - Remote brand enrichment with deterministic synthetic fallback
//! - Fire-and-forget engagement telemetry with a local CRM audit trail
//!
//! # Usage in JavaScript
//!
//! ```javascript
//! import init, { PrefsCenter, enrich_reference } from 'franchise-prefs-core';
//!
//! await init();
//!
//! const center = new PrefsCenter();
//! center.sign_in("u1");
//!
//! center.like('{"id":"kfc-1","name":"KFC"}');
//! const detail = await enrich_reference('{"id":"subway-1","name":"Subway"}');
//! center.add_to_compare(detail); // throws + toast once 4 brands are queued
//!
//! const likes = JSON.parse(center.likes_json());
//! center.sign_out();
//! ```

pub mod engine;
pub mod enrich;
pub mod error;
pub mod grades;
pub mod notify;
pub mod records;
pub mod service;
pub mod session;
pub mod store;
pub mod telemetry;

#[cfg(target_arch = "wasm32")]
pub mod browser;

pub use engine::{PrefsEngine, COMPARE_LIMIT};
pub use enrich::{enrich, synthesize_detail};
pub use error::{PrefsError, Result};
pub use grades::GradeBook;
pub use notify::{MemoryNotifier, Notifier, NullNotifier, UserNotice};
pub use records::{
    BrandDetail, BrandGrade, BrandRef, CategoryData, CrmContact, EngagementAction,
    EngagementEvent, EngagementRecord, PreferenceEntry, SavedBrand,
};
pub use service::{BrandDataService, MockBehavior, MockCrmService};
#[cfg(all(feature = "http", not(target_arch = "wasm32")))]
pub use service::{CrmConfig, HttpCrmService};
pub use session::{FixedSession, SessionProvider, UserScope};
pub use store::{owned_kind, storage_key, KeyedStore, MemoryBackend, StorageBackend, StoreKind};
pub use telemetry::TelemetrySink;

/// Install the panic hook for readable browser console errors.
#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn current_time_ms() -> u64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now() as u64
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
