//! Overall confidence computation
//!
//! Averages the confidences of the detected signals, then applies the
//! domain penalties: a multiplicative discount when the run's baselines
//! are population-level rather than patient-specific, and a hard cap when
//! corroborating evidence is insufficient.

use crate::types::{BaselineSource, SignalResult};
use oncosig_common::config::ConfidencePolicy;
use tracing::debug;

/// Cap reason reported when corroboration is insufficient
pub const INSUFFICIENT_CORROBORATION: &str = "insufficient_corroboration";

/// Penalty/cap-aware confidence computer
pub struct ConfidenceComputer {
    policy: ConfidencePolicy,
}

impl ConfidenceComputer {
    pub fn new(policy: ConfidencePolicy) -> Self {
        Self { policy }
    }

    /// Compute overall confidence plus an optional cap reason
    ///
    /// - Mean confidence over *detected* signals only; no detected signals
    ///   → (0.0, None).
    /// - × population-baseline penalty when baselines are population-level.
    /// - Capped at the corroboration cap (reason set) when the run has no
    ///   corroborating biomarker and fewer than two detected signals.
    pub fn compute(
        &self,
        signals: &[SignalResult],
        baseline_source: BaselineSource,
        has_corroborating_biomarker: bool,
        detected_signal_count: usize,
    ) -> (f64, Option<String>) {
        let detected: Vec<f64> = signals
            .iter()
            .filter(|s| s.detected)
            .map(|s| s.confidence)
            .collect();

        if detected.is_empty() {
            return (0.0, None);
        }

        let mut confidence = detected.iter().sum::<f64>() / detected.len() as f64;

        if baseline_source == BaselineSource::PopulationAverage {
            confidence *= self.policy.population_baseline_penalty;
        }

        let mut cap_reason = None;
        if !has_corroborating_biomarker && detected_signal_count < 2 {
            confidence = confidence.min(self.policy.corroboration_cap);
            cap_reason = Some(INSUFFICIENT_CORROBORATION.to_string());
        }

        debug!(
            confidence,
            baseline_source = ?baseline_source,
            capped = cap_reason.is_some(),
            "Overall confidence"
        );

        (confidence.clamp(0.0, 1.0), cap_reason)
    }
}
