//! Rule-based classification of finished calls.
//!
//! Both functions are pure and total: they take already-normalized primitives
//! (booleans and plain text) and always produce an answer. Parsing of raw
//! platform payloads happens at the webhook boundary, never here.

use crate::domain::call::{CallOutcome, CallSentiment};

const DECLINE_PHRASES: &[&str] = &["not interested", "declined", "pass"];
const TRANSFER_PHRASES: &[&str] = &["transfer", "sales rep"];
const DISCONNECT_PHRASES: &[&str] = &["dropped", "hung up", "disconnected"];

const POSITIVE_KEYWORDS: &[&str] =
    &["great", "excellent", "perfect", "thank you", "appreciate", "good"];
const NEGATIVE_KEYWORDS: &[&str] =
    &["frustrated", "angry", "terrible", "awful", "ridiculous", "waste"];
const FRUSTRATION_KEYWORDS: &[&str] = &["why", "always", "never", "impossible", "difficult"];

/// Classify how a call ended. Priority order: verification failure, no
/// inventory, booked deal, then transcript phrase scanning; anything left is
/// a failed negotiation.
pub fn classify_outcome(
    transcript: &str,
    negotiation_successful: bool,
    carrier_verified: bool,
    loads_available: bool,
) -> CallOutcome {
    if !carrier_verified {
        return CallOutcome::FailedVerification;
    }
    if !loads_available {
        return CallOutcome::NoSuitableLoads;
    }
    if negotiation_successful {
        return CallOutcome::SuccessfulBooking;
    }

    let transcript = transcript.to_lowercase();
    if contains_any(&transcript, DECLINE_PHRASES) {
        return CallOutcome::RejectedByCarrier;
    }
    if contains_any(&transcript, TRANSFER_PHRASES) {
        return CallOutcome::TransferredToSales;
    }
    if contains_any(&transcript, DISCONNECT_PHRASES) {
        return CallOutcome::CallDropped;
    }

    CallOutcome::NegotiationFailed
}

/// Classify the carrier's mood from the transcript. Counts which keywords of
/// each fixed set appear; an empty transcript is neutral.
pub fn classify_sentiment(transcript: &str) -> CallSentiment {
    if transcript.trim().is_empty() {
        return CallSentiment::Neutral;
    }

    let transcript = transcript.to_lowercase();
    let positive = count_present(&transcript, POSITIVE_KEYWORDS);
    let negative = count_present(&transcript, NEGATIVE_KEYWORDS);
    let frustration = count_present(&transcript, FRUSTRATION_KEYWORDS);

    if negative > positive {
        CallSentiment::Negative
    } else if frustration > 2 {
        CallSentiment::Frustrated
    } else if positive > 0 {
        CallSentiment::Positive
    } else {
        CallSentiment::Neutral
    }
}

fn contains_any(haystack: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| haystack.contains(phrase))
}

fn count_present(haystack: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|keyword| haystack.contains(*keyword)).count()
}

#[cfg(test)]
mod tests {
    use crate::domain::call::{CallOutcome, CallSentiment};

    use super::{classify_outcome, classify_sentiment};

    #[test]
    fn verification_failure_takes_priority_over_everything() {
        let outcome = classify_outcome("", false, false, true);
        assert_eq!(outcome, CallOutcome::FailedVerification);

        // Even a booked deal cannot outrank a failed verification.
        let outcome = classify_outcome("great, thank you", true, false, true);
        assert_eq!(outcome, CallOutcome::FailedVerification);
    }

    #[test]
    fn no_inventory_beats_negotiation_result() {
        let outcome = classify_outcome("", true, true, false);
        assert_eq!(outcome, CallOutcome::NoSuitableLoads);
    }

    #[test]
    fn booked_deal_classifies_as_successful_booking() {
        let outcome = classify_outcome("sounds good, send the rate con", true, true, true);
        assert_eq!(outcome, CallOutcome::SuccessfulBooking);
    }

    #[test]
    fn transcript_phrases_decide_the_unbooked_cases() {
        assert_eq!(
            classify_outcome("driver said he is not interested at that rate", false, true, true),
            CallOutcome::RejectedByCarrier
        );
        assert_eq!(
            classify_outcome("please transfer me to a sales rep", false, true, true),
            CallOutcome::TransferredToSales
        );
        assert_eq!(
            classify_outcome("the line was disconnected mid-sentence", false, true, true),
            CallOutcome::CallDropped
        );
        assert_eq!(
            classify_outcome("we went three rounds without agreeing", false, true, true),
            CallOutcome::NegotiationFailed
        );
    }

    #[test]
    fn phrase_matching_is_case_insensitive() {
        assert_eq!(
            classify_outcome("Carrier DECLINED the load outright", false, true, true),
            CallOutcome::RejectedByCarrier
        );
    }

    #[test]
    fn three_positive_keywords_read_as_positive() {
        let sentiment = classify_sentiment("This is great, thank you, much appreciated");
        assert_eq!(sentiment, CallSentiment::Positive);
    }

    #[test]
    fn negative_keywords_outvote_positive_ones() {
        let sentiment = classify_sentiment("this is terrible, an awful waste of my time, thank you");
        assert_eq!(sentiment, CallSentiment::Negative);
    }

    #[test]
    fn heavy_frustration_without_negativity_reads_as_frustrated() {
        let sentiment =
            classify_sentiment("why is this always so difficult, it is never simple with you");
        assert_eq!(sentiment, CallSentiment::Frustrated);
    }

    #[test]
    fn empty_or_flat_transcripts_are_neutral() {
        assert_eq!(classify_sentiment(""), CallSentiment::Neutral);
        assert_eq!(classify_sentiment("   "), CallSentiment::Neutral);
        assert_eq!(classify_sentiment("picked up, quoted, hung around"), CallSentiment::Neutral);
    }

    #[test]
    fn classification_never_panics_on_odd_input() {
        let noisy = "…\u{fffd}\n\t ¿qué? 💬";
        let _ = classify_outcome(noisy, false, true, true);
        let _ = classify_sentiment(noisy);
    }
}
