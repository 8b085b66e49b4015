use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::negotiation::{CallId, Negotiation, NegotiationId, NegotiationStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Durable keeper of negotiation state. CRUD only; every business rule lives
/// in the lifecycle manager. Implementations are responsible for serializing
/// concurrent mutations of the same identifier.
#[async_trait]
pub trait NegotiationStore: Send + Sync {
    async fn get(&self, id: &NegotiationId) -> Result<Option<Negotiation>, StoreError>;
    async fn insert(&self, negotiation: Negotiation) -> Result<(), StoreError>;
    async fn update(&self, negotiation: Negotiation) -> Result<(), StoreError>;
    async fn find_active_for_call(
        &self,
        call_id: &CallId,
    ) -> Result<Option<Negotiation>, StoreError>;
    /// All negotiations for a call, newest first.
    async fn list_for_call(&self, call_id: &CallId) -> Result<Vec<Negotiation>, StoreError>;
    /// Active negotiations whose deadline has passed as of `now`.
    async fn list_active_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Negotiation>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryNegotiationStore {
    records: RwLock<HashMap<String, Negotiation>>,
}

#[async_trait]
impl NegotiationStore for InMemoryNegotiationStore {
    async fn get(&self, id: &NegotiationId) -> Result<Option<Negotiation>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&id.0).cloned())
    }

    async fn insert(&self, negotiation: Negotiation) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&negotiation.id.0) {
            return Err(StoreError::Conflict);
        }
        records.insert(negotiation.id.0.clone(), negotiation);
        Ok(())
    }

    async fn update(&self, negotiation: Negotiation) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&negotiation.id.0) {
            Some(existing) => {
                *existing = negotiation;
                Ok(())
            }
            None => Err(StoreError::Backend(format!(
                "update of unknown negotiation `{}`",
                negotiation.id
            ))),
        }
    }

    async fn find_active_for_call(
        &self,
        call_id: &CallId,
    ) -> Result<Option<Negotiation>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|negotiation| {
                negotiation.call_id == *call_id
                    && negotiation.status == NegotiationStatus::Active
            })
            .cloned())
    }

    async fn list_for_call(&self, call_id: &CallId) -> Result<Vec<Negotiation>, StoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<Negotiation> = records
            .values()
            .filter(|negotiation| negotiation.call_id == *call_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn list_active_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Negotiation>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|negotiation| {
                negotiation.status == NegotiationStatus::Active
                    && negotiation.has_expired_at(now)
            })
            .cloned()
            .collect())
    }
}
