use rust_decimal::Decimal;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::clock::Clock;
use crate::domain::negotiation::{
    CallId, LoadId, McNumber, Negotiation, NegotiationDecision, NegotiationId, NegotiationStatus,
    OfferParty, OfferType,
};
use crate::errors::{ApplicationError, NegotiationError};

use super::evaluator::OfferEvaluator;
use super::policy::NegotiationPolicy;
use super::store::{NegotiationStore, StoreError};

#[derive(Clone, Debug)]
pub struct CreateNegotiation {
    pub id: NegotiationId,
    pub call_id: CallId,
    pub load_id: LoadId,
    pub mc_number: McNumber,
    pub initial_offer: Decimal,
    pub offered_by: OfferParty,
    pub original_rate: Decimal,
    pub max_rounds: Option<u32>,
}

/// Orchestrates every negotiation state transition. All mutation funnels
/// through one biddability check (active, unexpired, rounds remaining), so a
/// closed deal cannot be reopened no matter how callers order their requests.
pub struct LifecycleManager<S, C, A> {
    store: S,
    clock: C,
    sink: A,
    policy: NegotiationPolicy,
    evaluator: OfferEvaluator,
}

impl<S, C, A> LifecycleManager<S, C, A>
where
    S: NegotiationStore,
    C: Clock,
    A: AuditSink,
{
    pub fn new(store: S, clock: C, sink: A, policy: NegotiationPolicy) -> Self {
        let evaluator = OfferEvaluator::new(policy.clone());
        Self { store, clock, sink, policy, evaluator }
    }

    pub fn policy(&self) -> &NegotiationPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn create(
        &self,
        request: CreateNegotiation,
    ) -> Result<Negotiation, ApplicationError> {
        let now = self.clock.now();
        let negotiation = Negotiation {
            id: request.id.clone(),
            call_id: request.call_id,
            load_id: request.load_id,
            mc_number: request.mc_number,
            status: NegotiationStatus::Active,
            current_round: 1,
            max_rounds: request.max_rounds.unwrap_or(self.policy.default_max_rounds).max(1),
            current_offer_amount: request.initial_offer,
            current_offer_by: request.offered_by,
            current_offer_type: OfferType::Initial,
            original_rate: request.original_rate,
            final_agreed_rate: None,
            broker_notes: None,
            carrier_feedback: None,
            created_at: now,
            updated_at: now,
            expires_at: now + self.policy.expiry,
        };

        match self.store.insert(negotiation.clone()).await {
            Ok(()) => {
                self.emit(&negotiation, "negotiation.created", AuditOutcome::Success, |event| {
                    event
                        .with_metadata("original_rate", negotiation.original_rate.to_string())
                        .with_metadata("max_rounds", negotiation.max_rounds.to_string())
                });
                Ok(negotiation)
            }
            Err(StoreError::Conflict) => {
                self.emit(&negotiation, "negotiation.create_rejected", AuditOutcome::Rejected, |e| e);
                Err(NegotiationError::DuplicateId(request.id).into())
            }
            Err(StoreError::Backend(message)) => Err(ApplicationError::Persistence(message)),
        }
    }

    pub async fn get(&self, id: &NegotiationId) -> Result<Negotiation, ApplicationError> {
        self.load(id).await
    }

    pub async fn active_for_call(
        &self,
        call_id: &CallId,
    ) -> Result<Option<Negotiation>, ApplicationError> {
        self.store.find_active_for_call(call_id).await.map_err(persistence)
    }

    pub async fn history_for_call(
        &self,
        call_id: &CallId,
    ) -> Result<Vec<Negotiation>, ApplicationError> {
        self.store.list_for_call(call_id).await.map_err(persistence)
    }

    /// Record the next offer in the back-and-forth. Checks run in a fixed
    /// order: closed, expired, out of rounds. Expiry and round exhaustion
    /// close the record before the failure is reported.
    pub async fn counter_offer(
        &self,
        id: &NegotiationId,
        amount: Decimal,
        offered_by: OfferParty,
        feedback: Option<String>,
    ) -> Result<Negotiation, ApplicationError> {
        let now = self.clock.now();
        let mut negotiation = self.load(id).await?;

        if negotiation.status.is_terminal() {
            self.emit(&negotiation, "negotiation.counter_rejected", AuditOutcome::Rejected, |e| {
                e.with_metadata("reason", "closed")
            });
            return Err(NegotiationError::InvalidState {
                id: id.clone(),
                status: negotiation.status,
            }
            .into());
        }

        if negotiation.has_expired_at(now) {
            negotiation.transition_to(NegotiationStatus::Expired, now)?;
            self.persist(&negotiation).await?;
            self.emit(&negotiation, "negotiation.expired", AuditOutcome::Rejected, |e| e);
            return Err(NegotiationError::Expired(id.clone()).into());
        }

        if negotiation.current_round >= negotiation.max_rounds {
            negotiation.transition_to(NegotiationStatus::Rejected, now)?;
            self.persist(&negotiation).await?;
            self.emit(&negotiation, "negotiation.round_limit", AuditOutcome::Rejected, |event| {
                event.with_metadata("max_rounds", negotiation.max_rounds.to_string())
            });
            return Err(NegotiationError::RoundLimitExceeded(id.clone()).into());
        }

        negotiation.current_round += 1;
        negotiation.current_offer_amount = amount;
        negotiation.current_offer_by = offered_by;
        negotiation.current_offer_type = OfferType::Counter;
        if let Some(feedback) = feedback {
            negotiation.carrier_feedback = Some(feedback);
        }
        negotiation.updated_at = now;

        self.persist(&negotiation).await?;
        self.emit(&negotiation, "negotiation.counter_offer", AuditOutcome::Success, |event| {
            event
                .with_metadata("round", negotiation.current_round.to_string())
                .with_metadata("amount", amount.to_string())
                .with_metadata("offered_by", offered_by.as_str())
        });
        Ok(negotiation)
    }

    /// Close the deal at the agreed rate. Permitted from any non-terminal
    /// state; acceptance is never blocked by the round limit.
    pub async fn accept(
        &self,
        id: &NegotiationId,
        final_rate: Decimal,
    ) -> Result<Negotiation, ApplicationError> {
        let now = self.clock.now();
        let mut negotiation = self.load(id).await?;

        negotiation.transition_to(NegotiationStatus::Accepted, now)?;
        negotiation.final_agreed_rate = Some(final_rate);
        negotiation.current_offer_type = OfferType::Final;

        self.persist(&negotiation).await?;
        self.emit(&negotiation, "negotiation.accepted", AuditOutcome::Success, |event| {
            event.with_metadata("final_rate", final_rate.to_string())
        });
        Ok(negotiation)
    }

    pub async fn reject(
        &self,
        id: &NegotiationId,
        reason: Option<String>,
    ) -> Result<Negotiation, ApplicationError> {
        let now = self.clock.now();
        let mut negotiation = self.load(id).await?;

        negotiation.transition_to(NegotiationStatus::Rejected, now)?;
        if let Some(reason) = reason {
            negotiation.broker_notes = Some(reason);
        }

        self.persist(&negotiation).await?;
        self.emit(&negotiation, "negotiation.rejected", AuditOutcome::Success, |e| e);
        Ok(negotiation)
    }

    /// Sweep active negotiations past their deadline into `Expired`. Safe to
    /// run repeatedly and concurrently with single-record mutations.
    pub async fn cleanup_expired(&self) -> Result<usize, ApplicationError> {
        let now = self.clock.now();
        let stale = self.store.list_active_expired(now).await.map_err(persistence)?;

        let mut swept = 0;
        for mut negotiation in stale {
            // A record can race to a terminal state between the listing and
            // this pass; the sweep only closes rows that are still active.
            if negotiation.transition_to(NegotiationStatus::Expired, now).is_err() {
                continue;
            }
            self.persist(&negotiation).await?;
            self.emit(&negotiation, "negotiation.expired", AuditOutcome::Success, |e| e);
            swept += 1;
        }
        Ok(swept)
    }

    /// Evaluate a carrier offer against the stored negotiation. Read-only:
    /// the decision is returned, never recorded.
    pub async fn evaluate_offer(
        &self,
        id: &NegotiationId,
        carrier_offer: Decimal,
    ) -> Result<NegotiationDecision, ApplicationError> {
        let negotiation = self.store.get(id).await.map_err(persistence)?;
        Ok(self.evaluator.evaluate(negotiation.as_ref(), carrier_offer))
    }

    async fn load(&self, id: &NegotiationId) -> Result<Negotiation, ApplicationError> {
        self.store
            .get(id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| NegotiationError::NotFound(id.clone()).into())
    }

    async fn persist(&self, negotiation: &Negotiation) -> Result<(), ApplicationError> {
        self.store.update(negotiation.clone()).await.map_err(persistence)
    }

    fn emit<F>(&self, negotiation: &Negotiation, event_type: &str, outcome: AuditOutcome, decorate: F)
    where
        F: FnOnce(AuditEvent) -> AuditEvent,
    {
        let event = AuditEvent::new(
            Some(negotiation.id.clone()),
            Some(negotiation.call_id.clone()),
            negotiation.id.0.clone(),
            event_type,
            AuditCategory::Negotiation,
            "lifecycle-manager",
            outcome,
        )
        .with_metadata("status", negotiation.status.as_str());
        self.sink.emit(decorate(event));
    }
}

fn persistence(error: StoreError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use crate::audit::InMemoryAuditSink;
    use crate::clock::{Clock, FixedClock};
    use crate::domain::negotiation::{
        CallId, LoadId, McNumber, NegotiationId, NegotiationStatus, OfferParty, OfferType,
    };
    use crate::errors::{ApplicationError, NegotiationError};
    use crate::negotiation::policy::NegotiationPolicy;
    use crate::negotiation::store::{InMemoryNegotiationStore, NegotiationStore};

    use super::{CreateNegotiation, LifecycleManager};

    type TestManager = LifecycleManager<InMemoryNegotiationStore, FixedClock, InMemoryAuditSink>;

    fn manager() -> (TestManager, FixedClock, InMemoryAuditSink) {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap());
        let sink = InMemoryAuditSink::default();
        let manager = LifecycleManager::new(
            InMemoryNegotiationStore::default(),
            clock.clone(),
            sink.clone(),
            NegotiationPolicy::default(),
        );
        (manager, clock, sink)
    }

    fn create_request(id: &str) -> CreateNegotiation {
        CreateNegotiation {
            id: NegotiationId(id.to_string()),
            call_id: CallId("CALL-1".to_string()),
            load_id: LoadId("LD001".to_string()),
            mc_number: McNumber("123456".to_string()),
            initial_offer: Decimal::new(120_000, 2),
            offered_by: OfferParty::Carrier,
            original_rate: Decimal::new(150_000, 2),
            max_rounds: None,
        }
    }

    fn domain_error(error: ApplicationError) -> NegotiationError {
        match error {
            ApplicationError::Negotiation(inner) => inner,
            other => panic!("expected a negotiation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_sets_the_initial_state_and_deadline() {
        let (manager, clock, _) = manager();

        let negotiation = manager.create(create_request("NEG-1")).await.expect("create");

        assert_eq!(negotiation.status, NegotiationStatus::Active);
        assert_eq!(negotiation.current_round, 1);
        assert_eq!(negotiation.max_rounds, 3);
        assert_eq!(negotiation.current_offer_type, OfferType::Initial);
        assert_eq!(negotiation.expires_at, clock.now() + Duration::hours(24));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_identifiers() {
        let (manager, _, _) = manager();
        manager.create(create_request("NEG-1")).await.expect("first create");

        let error = manager.create(create_request("NEG-1")).await.expect_err("duplicate");

        assert!(matches!(domain_error(error), NegotiationError::DuplicateId(_)));
    }

    #[tokio::test]
    async fn counter_offer_increments_the_round_and_stores_feedback() {
        let (manager, _, _) = manager();
        manager.create(create_request("NEG-1")).await.expect("create");

        let negotiation = manager
            .counter_offer(
                &NegotiationId("NEG-1".to_string()),
                Decimal::new(142_500, 2),
                OfferParty::Broker,
                Some("needs detention pay".to_string()),
            )
            .await
            .expect("counter");

        assert_eq!(negotiation.current_round, 2);
        assert_eq!(negotiation.current_offer_type, OfferType::Counter);
        assert_eq!(negotiation.current_offer_by, OfferParty::Broker);
        assert_eq!(negotiation.carrier_feedback.as_deref(), Some("needs detention pay"));
    }

    #[tokio::test]
    async fn round_never_exceeds_the_limit_while_active() {
        let (manager, _, _) = manager();
        manager.create(create_request("NEG-1")).await.expect("create");
        let id = NegotiationId("NEG-1".to_string());

        for _ in 0..2 {
            let negotiation = manager
                .counter_offer(&id, Decimal::new(140_000, 2), OfferParty::Carrier, None)
                .await
                .expect("counter within limit");
            assert!(negotiation.current_round <= negotiation.max_rounds);
            assert_eq!(negotiation.status, NegotiationStatus::Active);
        }

        let error = manager
            .counter_offer(&id, Decimal::new(141_000, 2), OfferParty::Carrier, None)
            .await
            .expect_err("limit reached");
        assert!(matches!(domain_error(error), NegotiationError::RoundLimitExceeded(_)));

        // The failed counter closed the record as rejected.
        let closed = manager.get(&id).await.expect("get");
        assert_eq!(closed.status, NegotiationStatus::Rejected);
        assert_eq!(closed.current_round, closed.max_rounds);
    }

    #[tokio::test]
    async fn expired_negotiation_is_closed_before_the_failure_returns() {
        let (manager, clock, _) = manager();
        manager.create(create_request("NEG-1")).await.expect("create");
        let id = NegotiationId("NEG-1".to_string());

        clock.advance(Duration::hours(25));

        let error = manager
            .counter_offer(&id, Decimal::new(140_000, 2), OfferParty::Carrier, None)
            .await
            .expect_err("expired");
        assert!(matches!(domain_error(error), NegotiationError::Expired(_)));

        let closed = manager.get(&id).await.expect("get");
        assert_eq!(closed.status, NegotiationStatus::Expired);
    }

    #[tokio::test]
    async fn terminal_negotiations_never_mutate_again() {
        let (manager, _, _) = manager();
        manager.create(create_request("NEG-1")).await.expect("create");
        let id = NegotiationId("NEG-1".to_string());
        manager.reject(&id, Some("rate too high".to_string())).await.expect("reject");

        let before = manager.get(&id).await.expect("get");
        let error = manager
            .counter_offer(&id, Decimal::new(149_000, 2), OfferParty::Carrier, None)
            .await
            .expect_err("closed");
        assert!(matches!(domain_error(error), NegotiationError::InvalidState { .. }));

        let after = manager.get(&id).await.expect("get");
        assert_eq!(before, after);
        assert_eq!(after.broker_notes.as_deref(), Some("rate too high"));
    }

    #[tokio::test]
    async fn accept_records_the_final_rate_at_any_round() {
        let (manager, _, _) = manager();
        manager.create(create_request("NEG-1")).await.expect("create");
        let id = NegotiationId("NEG-1".to_string());

        let negotiation = manager.accept(&id, Decimal::new(145_000, 2)).await.expect("accept");

        assert_eq!(negotiation.status, NegotiationStatus::Accepted);
        assert_eq!(negotiation.final_agreed_rate, Some(Decimal::new(145_000, 2)));
        assert_eq!(negotiation.current_offer_type, OfferType::Final);

        let error = manager.accept(&id, Decimal::new(140_000, 2)).await.expect_err("already closed");
        assert!(matches!(domain_error(error), NegotiationError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn accept_of_unknown_negotiation_is_not_found() {
        let (manager, _, _) = manager();
        let error = manager
            .accept(&NegotiationId("NEG-404".to_string()), Decimal::new(100_000, 2))
            .await
            .expect_err("missing");
        assert!(matches!(domain_error(error), NegotiationError::NotFound(_)));
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let (manager, clock, _) = manager();
        manager.create(create_request("NEG-1")).await.expect("create");
        manager.create(create_request("NEG-2")).await.expect("create");

        clock.advance(Duration::hours(25));

        assert_eq!(manager.cleanup_expired().await.expect("first sweep"), 2);
        assert_eq!(manager.cleanup_expired().await.expect("second sweep"), 0);

        let swept = manager.get(&NegotiationId("NEG-1".to_string())).await.expect("get");
        assert_eq!(swept.status, NegotiationStatus::Expired);
    }

    #[tokio::test]
    async fn cleanup_leaves_fresh_negotiations_alone() {
        let (manager, clock, _) = manager();
        manager.create(create_request("NEG-1")).await.expect("create");
        clock.advance(Duration::hours(23));

        assert_eq!(manager.cleanup_expired().await.expect("sweep"), 0);
        let untouched = manager.get(&NegotiationId("NEG-1".to_string())).await.expect("get");
        assert_eq!(untouched.status, NegotiationStatus::Active);
    }

    #[tokio::test]
    async fn evaluate_offer_reads_through_to_the_evaluator() {
        let (manager, _, _) = manager();
        manager.create(create_request("NEG-1")).await.expect("create");

        let decision = manager
            .evaluate_offer(&NegotiationId("NEG-1".to_string()), Decimal::new(120_000, 2))
            .await
            .expect("evaluate");
        assert!(!decision.should_accept);
        assert_eq!(decision.counter_offer_amount, Some(Decimal::new(142_500, 2)));

        let missing = manager
            .evaluate_offer(&NegotiationId("NEG-404".to_string()), Decimal::new(120_000, 2))
            .await
            .expect("evaluate missing");
        assert!(!missing.should_accept);
        assert!(missing.is_final_offer);
    }

    #[tokio::test]
    async fn transitions_leave_an_audit_trail() {
        let (manager, _, sink) = manager();
        manager.create(create_request("NEG-1")).await.expect("create");
        manager
            .counter_offer(
                &NegotiationId("NEG-1".to_string()),
                Decimal::new(140_000, 2),
                OfferParty::Broker,
                None,
            )
            .await
            .expect("counter");

        let events = sink.events();
        let types: Vec<&str> = events.iter().map(|event| event.event_type.as_str()).collect();
        assert_eq!(types, vec!["negotiation.created", "negotiation.counter_offer"]);
        assert_eq!(events[1].metadata.get("round").map(String::as_str), Some("2"));
    }

    #[tokio::test]
    async fn history_lists_newest_first_and_active_lookup_filters() {
        let (manager, clock, _) = manager();
        manager.create(create_request("NEG-1")).await.expect("create");
        manager.reject(&NegotiationId("NEG-1".to_string()), None).await.expect("reject");

        clock.advance(Duration::minutes(5));
        let mut second = create_request("NEG-2");
        second.max_rounds = Some(5);
        manager.create(second).await.expect("create second");

        let call_id = CallId("CALL-1".to_string());
        let history = manager.history_for_call(&call_id).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id.0, "NEG-2");

        let active = manager.active_for_call(&call_id).await.expect("active");
        assert_eq!(active.map(|negotiation| negotiation.id.0), Some("NEG-2".to_string()));

        // Store handle stays reachable for wiring checks.
        assert!(manager.store().get(&NegotiationId("NEG-2".to_string())).await.unwrap().is_some());
    }
}
