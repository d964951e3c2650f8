//! Urgency and action determination
//!
//! Deterministic table lookup from risk level to clinical urgency and the
//! ordered action list. The vocabulary is injected per-site config; no
//! action code is hard-coded here.

use crate::types::{ActionItem, RiskLevel, Urgency};
use oncosig_common::config::ActionVocabulary;
use tracing::debug;

/// Risk level → urgency + ordered actions
pub struct ActionDeterminer {
    vocabulary: ActionVocabulary,
}

impl ActionDeterminer {
    pub fn new(vocabulary: ActionVocabulary) -> Self {
        Self { vocabulary }
    }

    /// Resolve the response for a risk level
    pub fn determine(&self, risk_level: RiskLevel) -> (Urgency, Vec<ActionItem>) {
        let (urgency, actions) = match risk_level {
            RiskLevel::High => (Urgency::Critical, self.vocabulary.high.clone()),
            RiskLevel::Medium => (Urgency::Elevated, self.vocabulary.medium.clone()),
            RiskLevel::Low => (Urgency::Routine, self.vocabulary.low.clone()),
        };

        debug!(risk = %risk_level, urgency = %urgency, actions = actions.len(), "Action determination");
        (urgency, actions)
    }
}
