use rust_decimal::Decimal;

use crate::domain::negotiation::{Negotiation, NegotiationDecision};

use super::policy::NegotiationPolicy;

/// Decides how the broker responds to a carrier offer. Deterministic and
/// side-effect-free; persisting or acting on the decision is the caller's
/// business.
#[derive(Clone, Debug, Default)]
pub struct OfferEvaluator {
    policy: NegotiationPolicy,
}

impl OfferEvaluator {
    pub fn new(policy: NegotiationPolicy) -> Self {
        Self { policy }
    }

    pub fn evaluate(
        &self,
        negotiation: Option<&Negotiation>,
        carrier_offer: Decimal,
    ) -> NegotiationDecision {
        let Some(negotiation) = negotiation else {
            return NegotiationDecision {
                should_accept: false,
                counter_offer_amount: None,
                reasoning: "negotiation not found".to_string(),
                is_final_offer: true,
            };
        };

        let min_acceptable = self.policy.min_acceptable(
            negotiation.original_rate,
            negotiation.current_round,
            negotiation.max_rounds,
        );

        if carrier_offer >= min_acceptable {
            return NegotiationDecision {
                should_accept: true,
                counter_offer_amount: None,
                reasoning: format!("offer ${carrier_offer} is within the acceptable threshold"),
                is_final_offer: true,
            };
        }

        if negotiation.current_round >= negotiation.max_rounds {
            return NegotiationDecision {
                should_accept: false,
                counter_offer_amount: Some(min_acceptable),
                reasoning: format!("final offer at minimum acceptable rate ${min_acceptable}"),
                is_final_offer: true,
            };
        }

        // Split the difference, but never counter below the round's floor.
        let midpoint =
            ((carrier_offer + negotiation.original_rate) / Decimal::TWO).round_dp(2);
        let counter = midpoint.max(min_acceptable);

        NegotiationDecision {
            should_accept: false,
            counter_offer_amount: Some(counter),
            reasoning: format!(
                "counter-offering ${counter} (round {})",
                negotiation.current_round + 1
            ),
            is_final_offer: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use crate::domain::negotiation::{
        CallId, LoadId, McNumber, Negotiation, NegotiationId, NegotiationStatus, OfferParty,
        OfferType,
    };
    use crate::negotiation::policy::NegotiationPolicy;

    use super::OfferEvaluator;

    fn negotiation(original_rate: Decimal, current_round: u32, max_rounds: u32) -> Negotiation {
        let now = Utc::now();
        Negotiation {
            id: NegotiationId("NEG-1".to_string()),
            call_id: CallId("CALL-1".to_string()),
            load_id: LoadId("LD001".to_string()),
            mc_number: McNumber("123456".to_string()),
            status: NegotiationStatus::Active,
            current_round,
            max_rounds,
            current_offer_amount: original_rate,
            current_offer_by: OfferParty::Broker,
            current_offer_type: OfferType::Initial,
            original_rate,
            final_agreed_rate: None,
            broker_notes: None,
            carrier_feedback: None,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::hours(24),
        }
    }

    #[test]
    fn lowball_offer_draws_a_midpoint_counter() {
        let evaluator = OfferEvaluator::default();
        let negotiation = negotiation(Decimal::new(150_000, 2), 1, 3);

        let decision = evaluator.evaluate(Some(&negotiation), Decimal::new(120_000, 2));

        assert!(!decision.should_accept);
        assert!(!decision.is_final_offer);
        // max((1200 + 1500) / 2, 1425) = 1425.00
        assert_eq!(decision.counter_offer_amount, Some(Decimal::new(142_500, 2)));
    }

    #[test]
    fn last_round_counter_is_final_at_the_relaxed_floor() {
        let evaluator = OfferEvaluator::default();
        let negotiation = negotiation(Decimal::new(150_000, 2), 3, 3);

        let decision = evaluator.evaluate(Some(&negotiation), Decimal::new(130_000, 2));

        assert!(!decision.should_accept);
        assert!(decision.is_final_offer);
        assert_eq!(decision.counter_offer_amount, Some(Decimal::new(135_000, 2)));
    }

    #[test]
    fn offer_within_threshold_is_accepted() {
        let evaluator = OfferEvaluator::default();
        let negotiation = negotiation(Decimal::new(150_000, 2), 1, 3);

        let decision = evaluator.evaluate(Some(&negotiation), Decimal::new(145_000, 2));

        assert!(decision.should_accept);
        assert!(decision.is_final_offer);
        assert_eq!(decision.counter_offer_amount, None);
    }

    #[test]
    fn missing_negotiation_is_a_final_refusal() {
        let evaluator = OfferEvaluator::default();
        let decision = evaluator.evaluate(None, Decimal::new(100_000, 2));

        assert!(!decision.should_accept);
        assert!(decision.is_final_offer);
        assert_eq!(decision.counter_offer_amount, None);
        assert!(decision.reasoning.contains("not found"));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let evaluator = OfferEvaluator::default();
        let negotiation = negotiation(Decimal::new(187_250, 2), 2, 4);
        let offer = Decimal::new(160_000, 2);

        let first = evaluator.evaluate(Some(&negotiation), offer);
        let second = evaluator.evaluate(Some(&negotiation), offer);

        assert_eq!(first, second);
    }

    #[test]
    fn counter_never_drops_below_the_round_floor() {
        let evaluator = OfferEvaluator::default();
        for round in 1..=3 {
            let negotiation = negotiation(Decimal::new(150_000, 2), round, 3);
            let floor = NegotiationPolicy::default().min_acceptable(
                negotiation.original_rate,
                round,
                negotiation.max_rounds,
            );
            let decision = evaluator.evaluate(Some(&negotiation), Decimal::new(10_000, 2));
            let counter = decision.counter_offer_amount.expect("lowball draws a counter");
            assert!(counter >= floor, "round {round}: counter {counter} under floor {floor}");
        }
    }

    #[test]
    fn midpoint_is_rounded_to_cents() {
        let evaluator = OfferEvaluator::default();
        // midpoint of 1080.01 and 1200.00 is 1140.005; banker's rounding to 1140.00
        let negotiation = negotiation(Decimal::new(120_000, 2), 1, 5);
        let decision = evaluator.evaluate(Some(&negotiation), Decimal::new(108_001, 2));

        let counter = decision.counter_offer_amount.expect("counter expected");
        assert!(counter.scale() <= 2);
        assert_eq!(counter, Decimal::new(114_000, 2));
    }
}
