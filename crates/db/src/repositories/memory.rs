use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use loadline_core::domain::call::{CallOutcome, CallRecord, CallSummary};
use loadline_core::domain::carrier::Carrier;
use loadline_core::domain::load::{Load, LoadSearch};
use loadline_core::domain::negotiation::{CallId, LoadId, McNumber};

use super::{CallRepository, CarrierRepository, LoadRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCallRepository {
    calls: RwLock<HashMap<String, CallRecord>>,
}

#[async_trait]
impl CallRepository for InMemoryCallRepository {
    async fn find_by_id(&self, call_id: &CallId) -> Result<Option<CallRecord>, RepositoryError> {
        let calls = self.calls.read().await;
        Ok(calls.get(&call_id.0).cloned())
    }

    async fn insert(&self, call: CallRecord) -> Result<(), RepositoryError> {
        let mut calls = self.calls.write().await;
        if calls.contains_key(&call.call_id.0) {
            return Err(RepositoryError::Conflict);
        }
        calls.insert(call.call_id.0.clone(), call);
        Ok(())
    }

    async fn update(&self, call: CallRecord) -> Result<(), RepositoryError> {
        let mut calls = self.calls.write().await;
        match calls.get_mut(&call.call_id.0) {
            Some(existing) => {
                *existing = call;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<CallRecord>, RepositoryError> {
        let calls = self.calls.read().await;
        let mut recent: Vec<CallRecord> = calls.values().cloned().collect();
        recent.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        recent.truncate(limit as usize);
        Ok(recent)
    }

    async fn list_for_carrier(
        &self,
        mc_number: &McNumber,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<CallRecord>, RepositoryError> {
        let calls = self.calls.read().await;
        let mut matching: Vec<CallRecord> =
            calls.values().filter(|call| call.mc_number == *mc_number).cloned().collect();
        matching.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(matching.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn summary(&self, since: DateTime<Utc>) -> Result<CallSummary, RepositoryError> {
        let calls = self.calls.read().await;
        let window: Vec<&CallRecord> =
            calls.values().filter(|call| call.start_time >= since).collect();

        let total_calls = window.len() as i64;
        let successful_bookings = window
            .iter()
            .filter(|call| call.outcome == Some(CallOutcome::SuccessfulBooking))
            .count() as i64;

        let durations: Vec<i64> =
            window.iter().filter_map(|call| call.duration_seconds).collect();
        let average_duration_seconds = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<i64>() as f64 / durations.len() as f64)
        };

        let mut sentiment_breakdown = BTreeMap::new();
        let mut outcome_breakdown = BTreeMap::new();
        for call in &window {
            if let Some(sentiment) = call.sentiment {
                *sentiment_breakdown.entry(sentiment.as_str().to_string()).or_insert(0) += 1;
            }
            if let Some(outcome) = call.outcome {
                *outcome_breakdown.entry(outcome.as_str().to_string()).or_insert(0) += 1;
            }
        }

        Ok(CallSummary {
            total_calls,
            successful_bookings,
            average_duration_seconds,
            sentiment_breakdown,
            outcome_breakdown,
            conversion_rate_pct: CallSummary::conversion_rate(successful_bookings, total_calls),
        })
    }
}

#[derive(Default)]
pub struct InMemoryLoadRepository {
    loads: RwLock<HashMap<String, Load>>,
}

#[async_trait]
impl LoadRepository for InMemoryLoadRepository {
    async fn find_by_id(&self, load_id: &LoadId) -> Result<Option<Load>, RepositoryError> {
        let loads = self.loads.read().await;
        Ok(loads.get(&load_id.0).cloned())
    }

    async fn insert(&self, load: Load) -> Result<(), RepositoryError> {
        let mut loads = self.loads.write().await;
        if loads.contains_key(&load.load_id.0) {
            return Err(RepositoryError::Conflict);
        }
        loads.insert(load.load_id.0.clone(), load);
        Ok(())
    }

    async fn update(&self, load: Load) -> Result<(), RepositoryError> {
        let mut loads = self.loads.write().await;
        match loads.get_mut(&load.load_id.0) {
            Some(existing) => {
                *existing = load;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn delete(&self, load_id: &LoadId) -> Result<bool, RepositoryError> {
        let mut loads = self.loads.write().await;
        Ok(loads.remove(&load_id.0).is_some())
    }

    async fn list(
        &self,
        offset: u32,
        limit: u32,
        available_only: bool,
    ) -> Result<Vec<Load>, RepositoryError> {
        let loads = self.loads.read().await;
        let mut listed: Vec<Load> = loads
            .values()
            .filter(|load| !available_only || load.is_available)
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.pickup_at.cmp(&b.pickup_at));
        Ok(listed.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn search(&self, criteria: &LoadSearch) -> Result<Vec<Load>, RepositoryError> {
        let loads = self.loads.read().await;
        let mut matching: Vec<Load> =
            loads.values().filter(|load| criteria.matches(load)).cloned().collect();
        matching.sort_by(|a, b| a.pickup_at.cmp(&b.pickup_at));
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryCarrierRepository {
    carriers: RwLock<HashMap<String, Carrier>>,
}

#[async_trait]
impl CarrierRepository for InMemoryCarrierRepository {
    async fn find_by_id(&self, mc_number: &McNumber) -> Result<Option<Carrier>, RepositoryError> {
        let carriers = self.carriers.read().await;
        Ok(carriers.get(&mc_number.0).cloned())
    }

    async fn insert(&self, carrier: Carrier) -> Result<(), RepositoryError> {
        let mut carriers = self.carriers.write().await;
        if carriers.contains_key(&carrier.mc_number.0) {
            return Err(RepositoryError::Conflict);
        }
        carriers.insert(carrier.mc_number.0.clone(), carrier);
        Ok(())
    }

    async fn update(&self, carrier: Carrier) -> Result<(), RepositoryError> {
        let mut carriers = self.carriers.write().await;
        match carriers.get_mut(&carrier.mc_number.0) {
            Some(existing) => {
                *existing = carrier;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn list(&self, offset: u32, limit: u32) -> Result<Vec<Carrier>, RepositoryError> {
        let carriers = self.carriers.read().await;
        let mut listed: Vec<Carrier> = carriers.values().cloned().collect();
        listed.sort_by(|a, b| a.company_name.cmp(&b.company_name));
        Ok(listed.into_iter().skip(offset as usize).take(limit as usize).collect())
    }
}
