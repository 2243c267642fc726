//! Engagement telemetry sink
//!
//! Fire-and-forget recording of user actions, invoked only after the
//! mutation they describe has committed. Keeps a local CRM audit trail
//! (append-only engagement log, email-keyed contacts) and delivers the
//! event to the remote interface. Nothing in here can fail the caller or
//! undo the mutation.

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::current_time_ms;
use crate::error::Result;
use crate::records::{CrmContact, EngagementEvent, EngagementRecord};
use crate::service::BrandDataService;
use crate::store::{KeyedStore, StorageBackend, StoreKind};

/// Stable contact id, generated once from the email at first insert.
pub fn contact_id(email: &str) -> String {
    let digest = Sha256::digest(email.as_bytes());
    format!("cnt_{}", &hex::encode(digest)[..12])
}

/// Telemetry recorder over the global (non-user-scoped) CRM keys.
#[derive(Clone)]
pub struct TelemetrySink<S> {
    store: KeyedStore<S>,
}

impl<S: StorageBackend> TelemetrySink<S> {
    pub fn new(backend: S) -> Self {
        Self {
            store: KeyedStore::new(backend),
        }
    }

    /// Record a committed user action.
    ///
    /// Every step has its own error boundary: failures are logged and
    /// swallowed, never retried, never surfaced to the code path that
    /// triggered the user action.
    pub async fn track(&self, event: &EngagementEvent, service: &dyn BrandDataService) {
        if let Err(err) = self.append_engagement(event) {
            warn!(%err, brand = %event.brand_id, "engagement log append failed");
        }
        if let Err(err) = self.upsert_contact(event) {
            warn!(%err, "contact upsert failed");
        }
        if let Err(err) = service.track_engagement(event).await {
            warn!(%err, brand = %event.brand_id, "engagement delivery failed");
        }
    }

    /// The engagement log only ever grows.
    fn append_engagement(&self, event: &EngagementEvent) -> Result<()> {
        let mut log: Vec<EngagementRecord> =
            self.store.read_global(StoreKind::Engagements, Vec::new());
        log.push(EngagementRecord {
            id: format!(
                "eng_{}_{}_{}",
                event.timestamp,
                event.action.as_str(),
                event.brand_id
            ),
            user_id: event.user_id.clone(),
            brand_id: event.brand_id.clone(),
            brand_name: event.brand_name.clone(),
            action: event.action,
            timestamp: event.timestamp,
        });
        self.store.write_global(StoreKind::Engagements, &log)
    }

    fn upsert_contact(&self, event: &EngagementEvent) -> Result<()> {
        let Some(email) = event.contact_email.as_deref() else {
            return Ok(());
        };

        let mut contacts: Vec<CrmContact> = self.store.read_global(StoreKind::Contacts, Vec::new());
        let now = current_time_ms();
        match contacts.iter_mut().find(|c| c.email == email) {
            Some(existing) => {
                // The id generated at first insert stays, whatever it was.
                existing.updated_at = now;
                existing.last_action = Some(event.action.as_str().to_string());
                if existing.name.is_none() {
                    existing.name = event.contact_name.clone();
                }
            }
            None => contacts.push(CrmContact {
                id: contact_id(email),
                email: email.to_string(),
                name: event.contact_name.clone(),
                created_at: now,
                updated_at: now,
                last_action: Some(event.action.as_str().to_string()),
            }),
        }
        self.store.write_global(StoreKind::Contacts, &contacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{BrandRef, EngagementAction};
    use crate::service::{MockBehavior, MockCrmService};
    use crate::store::MemoryBackend;

    fn event(action: EngagementAction) -> EngagementEvent {
        EngagementEvent::new("u1", action, &BrandRef::new("kfc-1", "KFC"))
    }

    #[tokio::test]
    async fn engagement_log_is_append_only() {
        let sink = TelemetrySink::new(MemoryBackend::new());
        let service = MockCrmService::default();

        sink.track(&event(EngagementAction::Like), &service).await;
        sink.track(&event(EngagementAction::Save), &service).await;

        let log: Vec<EngagementRecord> = sink
            .store
            .read_global(StoreKind::Engagements, Vec::new());
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].action, EngagementAction::Like);
        assert_eq!(log[1].action, EngagementAction::Save);
        assert_eq!(service.delivered().len(), 2);
    }

    #[tokio::test]
    async fn contact_upsert_preserves_generated_id() {
        let sink = TelemetrySink::new(MemoryBackend::new());
        let service = MockCrmService::default();

        let first = event(EngagementAction::Like).with_contact("ada@example.com", None);
        sink.track(&first, &service).await;

        let contacts: Vec<CrmContact> = sink.store.read_global(StoreKind::Contacts, Vec::new());
        assert_eq!(contacts.len(), 1);
        let original_id = contacts[0].id.clone();
        let created_at = contacts[0].created_at;
        assert_eq!(original_id, contact_id("ada@example.com"));

        let second = event(EngagementAction::Compare)
            .with_contact("ada@example.com", Some("Ada".to_string()));
        sink.track(&second, &service).await;

        let contacts: Vec<CrmContact> = sink.store.read_global(StoreKind::Contacts, Vec::new());
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].id, original_id);
        assert_eq!(contacts[0].created_at, created_at);
        assert_eq!(contacts[0].name.as_deref(), Some("Ada"));
        assert_eq!(contacts[0].last_action.as_deref(), Some("compare"));
    }

    #[tokio::test]
    async fn event_without_email_skips_contacts() {
        let sink = TelemetrySink::new(MemoryBackend::new());
        sink.track(&event(EngagementAction::Like), &MockCrmService::default())
            .await;
        let contacts: Vec<CrmContact> = sink.store.read_global(StoreKind::Contacts, Vec::new());
        assert!(contacts.is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let sink = TelemetrySink::new(MemoryBackend::new());
        let service = MockCrmService::with_behavior(MockBehavior::Unreachable);

        // Completes despite the unreachable backend; the local log still grew.
        sink.track(&event(EngagementAction::Like), &service).await;
        let log: Vec<EngagementRecord> = sink
            .store
            .read_global(StoreKind::Engagements, Vec::new());
        assert_eq!(log.len(), 1);
    }
}
