//! Brand grade registry
//!
//! Global (non-user-scoped) map of published brand grades, keyed by slug.
//! Stateless wrapper: every call reads the latest persisted snapshot, so
//! any view sees grades recorded by any other.

use std::collections::HashMap;

use crate::current_time_ms;
use crate::error::Result;
use crate::records::BrandGrade;
use crate::store::{KeyedStore, StorageBackend, StoreKind};

#[derive(Clone)]
pub struct GradeBook<S> {
    store: KeyedStore<S>,
}

impl<S: StorageBackend> GradeBook<S> {
    pub fn new(backend: S) -> Self {
        Self {
            store: KeyedStore::new(backend),
        }
    }

    /// Upsert the grade for a brand, stamping `lastUpdated`.
    pub fn record(&self, brand_id: &str, brand_slug: &str, grade: &str) -> Result<BrandGrade> {
        let mut grades: HashMap<String, BrandGrade> =
            self.store.read_global(StoreKind::BrandGrades, HashMap::new());
        let record = BrandGrade {
            brand_id: brand_id.to_string(),
            brand_slug: brand_slug.to_string(),
            grade: grade.to_string(),
            last_updated: current_time_ms(),
        };
        grades.insert(brand_slug.to_string(), record.clone());
        self.store.write_global(StoreKind::BrandGrades, &grades)?;
        Ok(record)
    }

    pub fn by_slug(&self, slug: &str) -> Option<BrandGrade> {
        let grades: HashMap<String, BrandGrade> =
            self.store.read_global(StoreKind::BrandGrades, HashMap::new());
        grades.get(slug).cloned()
    }

    pub fn by_brand_id(&self, brand_id: &str) -> Option<BrandGrade> {
        let grades: HashMap<String, BrandGrade> =
            self.store.read_global(StoreKind::BrandGrades, HashMap::new());
        grades.into_values().find(|g| g.brand_id == brand_id)
    }

    pub fn all(&self) -> HashMap<String, BrandGrade> {
        self.store.read_global(StoreKind::BrandGrades, HashMap::new())
    }
}
