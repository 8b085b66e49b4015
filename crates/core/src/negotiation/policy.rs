use chrono::Duration;
use rust_decimal::Decimal;

/// Bargaining policy handed to the lifecycle manager and evaluator at
/// construction. Nothing in here is process-wide state; tests build alternate
/// policies freely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NegotiationPolicy {
    /// Accept a carrier offer within this fraction of the loadboard rate.
    pub accept_within_pct: Decimal,
    /// Relaxed fraction once the negotiation enters its last allowed round.
    pub final_round_within_pct: Decimal,
    /// Rounds granted to a negotiation that does not specify its own limit.
    pub default_max_rounds: u32,
    /// How long a negotiation stays biddable after creation.
    pub expiry: Duration,
}

impl Default for NegotiationPolicy {
    fn default() -> Self {
        Self {
            accept_within_pct: Decimal::new(95, 2),
            final_round_within_pct: Decimal::new(90, 2),
            default_max_rounds: 3,
            expiry: Duration::hours(24),
        }
    }
}

impl NegotiationPolicy {
    /// Lowest rate the broker will agree to for the given round, in cents.
    /// The last allowed round uses the relaxed fraction.
    pub fn min_acceptable(
        &self,
        original_rate: Decimal,
        current_round: u32,
        max_rounds: u32,
    ) -> Decimal {
        let fraction = if current_round >= max_rounds.saturating_sub(1) {
            self.final_round_within_pct
        } else {
            self.accept_within_pct
        };
        (original_rate * fraction).round_dp(2)
    }
}
