//! Risk stratification
//!
//! Maps the fused probability plus corroboration signals onto a risk
//! level through priority-ordered rules (first match wins, lower bounds
//! inclusive). The insufficient-corroboration cap can hold a case at
//! medium; it can never promote one to high.

use crate::types::RiskLevel;
use oncosig_common::config::RiskThresholds;
use tracing::debug;

/// Priority-rule risk stratifier
pub struct RiskStratifier {
    thresholds: RiskThresholds,
}

impl RiskStratifier {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    /// Stratify one run
    ///
    /// Rules, first match wins:
    /// 1. probability >= high threshold AND enough detected signals → High
    /// 2. probability >= medium threshold OR exactly one detected signal
    ///    → Medium; the corroboration cap (no corroborating biomarker and
    ///    too few detected signals) confirms Medium regardless of
    ///    probability
    /// 3. otherwise → Low
    pub fn stratify(
        &self,
        probability: f64,
        detected_signal_count: usize,
        has_corroborating_biomarker: bool,
    ) -> RiskLevel {
        let level = if probability >= self.thresholds.high_probability
            && detected_signal_count >= self.thresholds.high_min_signals
        {
            RiskLevel::High
        } else if probability >= self.thresholds.medium_probability || detected_signal_count == 1 {
            // The insufficient-corroboration cap
            // (!has_corroborating_biomarker && detected < high_min_signals)
            // confirms Medium here; it can never promote past it, so both
            // branches of this rule land in the same place.
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        debug!(
            probability,
            detected_signal_count,
            has_corroborating_biomarker,
            level = %level,
            "Risk stratification"
        );

        level
    }
}
