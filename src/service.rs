//! Remote data services
//!
//! Everything the core fetches from or reports to the outside world goes
//! through [`BrandDataService`]. The product currently runs against the
//! in-process mock; the HTTP implementation targets the CRM backend and is
//! swappable without touching the core's contracts.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{PrefsError, Result};
use crate::records::{BrandDetail, CategoryData, EngagementEvent};

/// Remote brand-data / CRM interface consumed by the core.
#[async_trait]
pub trait BrandDataService: Send + Sync {
    /// Fetch the fully detailed record for a brand lookup key.
    async fn fetch_brand_detail(&self, key: &str) -> Result<BrandDetail>;

    /// Deliver one engagement event. Callers treat failures as
    /// fire-and-forget; implementations should not retry.
    async fn track_engagement(&self, event: &EngagementEvent) -> Result<()>;

    /// Category metadata, `None` when the category is unknown.
    async fn fetch_category(&self, slug: &str) -> Result<Option<CategoryData>>;
}

/// How the mock backend behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Serves records from the in-memory catalog.
    Connected,
    /// Answers every brand key with the same generic record, the way a
    /// provisioned-but-unconfigured backend does.
    Placeholder,
    /// Every call fails.
    Unreachable,
}

/// In-process stand-in for the CRM.
///
/// Defaults to [`MockBehavior::Placeholder`], the state of the real
/// integration today. Delivered engagement events are kept for inspection.
pub struct MockCrmService {
    behavior: MockBehavior,
    catalog: HashMap<String, BrandDetail>,
    categories: HashMap<String, CategoryData>,
    delivered: Mutex<Vec<EngagementEvent>>,
}

impl Default for MockCrmService {
    fn default() -> Self {
        Self::with_behavior(MockBehavior::Placeholder)
    }
}

impl MockCrmService {
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            catalog: HashMap::new(),
            categories: HashMap::new(),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn connected() -> Self {
        Self::with_behavior(MockBehavior::Connected)
    }

    /// Seed the catalog with a brand record, keyed by its id.
    pub fn with_brand(mut self, detail: BrandDetail) -> Self {
        self.catalog.insert(detail.id.clone(), detail);
        self
    }

    pub fn with_category(mut self, category: CategoryData) -> Self {
        self.categories.insert(category.slug.clone(), category);
        self
    }

    /// Engagement events delivered so far.
    pub fn delivered(&self) -> Vec<EngagementEvent> {
        self.delivered.lock().clone()
    }

    fn placeholder_detail() -> BrandDetail {
        BrandDetail {
            id: "brand".to_string(),
            name: "Sample Franchise".to_string(),
            logo: None,
            grade: "B".to_string(),
            investment_min: 100_000,
            investment_max: 250_000,
            franchise_fee: 25_000,
            working_capital: 50_000,
            marketing_fee: 2.0,
            royalty: 5.0,
            initial_term: 10,
            locations: 100,
            founded: 2000,
            item19_disclosed: false,
            why_yes: Vec::new(),
            why_not: Vec::new(),
            avg_revenue: None,
            avg_profit: None,
        }
    }
}

#[async_trait]
impl BrandDataService for MockCrmService {
    async fn fetch_brand_detail(&self, key: &str) -> Result<BrandDetail> {
        match self.behavior {
            MockBehavior::Connected => self
                .catalog
                .get(key)
                .cloned()
                .ok_or_else(|| PrefsError::RemoteFetch(format!("no record for key {key}"))),
            MockBehavior::Placeholder => Ok(Self::placeholder_detail()),
            MockBehavior::Unreachable => {
                Err(PrefsError::RemoteFetch("connection refused".to_string()))
            }
        }
    }

    async fn track_engagement(&self, event: &EngagementEvent) -> Result<()> {
        if self.behavior == MockBehavior::Unreachable {
            return Err(PrefsError::RemoteFetch("connection refused".to_string()));
        }
        self.delivered.lock().push(event.clone());
        Ok(())
    }

    async fn fetch_category(&self, slug: &str) -> Result<Option<CategoryData>> {
        if self.behavior == MockBehavior::Unreachable {
            return Err(PrefsError::RemoteFetch("connection refused".to_string()));
        }
        Ok(self.categories.get(slug).cloned())
    }
}

// =============================================================================
// HTTP implementation (CRM backend)
// =============================================================================

/// Configuration for the CRM-backed service.
#[cfg(all(feature = "http", not(target_arch = "wasm32")))]
#[derive(Debug, Clone)]
pub struct CrmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Bound on every remote fetch; expiry behaves like any other failure.
    pub timeout_ms: u64,
}

#[cfg(all(feature = "http", not(target_arch = "wasm32")))]
impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            timeout_ms: 8_000,
        }
    }
}

/// CRM-backed implementation of [`BrandDataService`].
#[cfg(all(feature = "http", not(target_arch = "wasm32")))]
pub struct HttpCrmService {
    config: CrmConfig,
    client: reqwest::Client,
}

#[cfg(all(feature = "http", not(target_arch = "wasm32")))]
impl HttpCrmService {
    pub fn new(config: CrmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }
}

#[cfg(all(feature = "http", not(target_arch = "wasm32")))]
#[async_trait]
impl BrandDataService for HttpCrmService {
    async fn fetch_brand_detail(&self, key: &str) -> Result<BrandDetail> {
        let url = format!("{}/api/v1/brands/{}", self.config.base_url, key);
        let response = self.authorize(self.client.get(&url)).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PrefsError::RemoteFetch(format!("HTTP {status} - {body}")));
        }

        Ok(response.json().await?)
    }

    async fn track_engagement(&self, event: &EngagementEvent) -> Result<()> {
        let url = format!("{}/api/v1/engagements", self.config.base_url);
        let response = self
            .authorize(self.client.post(&url).json(event))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(PrefsError::RemoteFetch(format!("HTTP {status}")));
        }
        Ok(())
    }

    async fn fetch_category(&self, slug: &str) -> Result<Option<CategoryData>> {
        let url = format!("{}/api/v1/categories/{}", self.config.base_url, slug);
        let response = self.authorize(self.client.get(&url)).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(PrefsError::RemoteFetch(format!("HTTP {status}")));
        }

        Ok(Some(response.json().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{BrandRef, EngagementAction};

    #[tokio::test]
    async fn connected_mock_serves_catalog() {
        let detail = crate::enrich::synthesize_detail(&BrandRef::new("subway", "Subway"));
        let service = MockCrmService::connected().with_brand(detail.clone());

        let fetched = service.fetch_brand_detail("subway").await.unwrap();
        assert_eq!(fetched, detail);

        let missing = service.fetch_brand_detail("nobody").await;
        assert!(matches!(missing, Err(PrefsError::RemoteFetch(_))));
    }

    #[tokio::test]
    async fn placeholder_mock_answers_every_key_the_same() {
        let service = MockCrmService::default();
        let a = service.fetch_brand_detail("subway").await.unwrap();
        let b = service.fetch_brand_detail("kfc").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id, "brand");
    }

    #[tokio::test]
    async fn mock_records_delivered_engagements() {
        let service = MockCrmService::default();
        let event = EngagementEvent::new("u1", EngagementAction::Like, &BrandRef::new("kfc-1", "KFC"));
        service.track_engagement(&event).await.unwrap();
        assert_eq!(service.delivered(), vec![event]);
    }

    #[tokio::test]
    async fn category_lookup_misses_yield_none() {
        let service = MockCrmService::connected().with_category(CategoryData {
            slug: "food".into(),
            name: "Food & Beverage".into(),
            description: None,
            brand_count: 120,
        });
        assert!(service.fetch_category("food").await.unwrap().is_some());
        assert!(service.fetch_category("mining").await.unwrap().is_none());
    }
}
