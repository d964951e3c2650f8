//! Signal detectors
//!
//! One detector per resistance mechanism, all behind the
//! [`SignalDetector`](crate::types::SignalDetector) trait for uniform
//! parallel fan-out. Detectors share one algorithm shape: compare the
//! current feature value to a baseline (patient-specific when measured,
//! else the site profile's population value), map the deviation through a
//! monotonic configurable ramp to a probability, derive confidence from
//! data completeness and recency, and threshold into `detected`.

pub mod ca125_kinetics;
pub mod dna_repair;
pub mod high_risk_gene;
pub mod pathway_escape;
pub mod post_treatment;

pub use ca125_kinetics::Ca125KineticsDetector;
pub use dna_repair::DnaRepairDetector;
pub use high_risk_gene::HighRiskGeneDetector;
pub use pathway_escape::PathwayEscapeDetector;
pub use post_treatment::PostTreatmentDetector;

use crate::types::{DetectError, FeatureSample, SignalDetector};
use chrono::Utc;
use oncosig_common::config::{DetectorParams, SiteProfile};
use std::sync::Arc;

/// Where a detector's baseline came from (provenance label)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BaselineOrigin {
    Patient,
    Population,
}

impl BaselineOrigin {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            BaselineOrigin::Patient => "patient",
            BaselineOrigin::Population => "population",
        }
    }
}

/// Resolve the comparison baseline for a feature
///
/// Prefers the patient-specific baseline on the sample; falls back to the
/// site profile's population value. Neither available is a detector error
/// (recovered by the orchestrator into a degraded result).
pub(crate) fn resolve_baseline(
    sample: &FeatureSample,
    profile: &SiteProfile,
    feature: &str,
) -> Result<(f64, BaselineOrigin), DetectError> {
    if let Some(baseline) = sample.baseline {
        return Ok((baseline, BaselineOrigin::Patient));
    }
    profile
        .population_baseline(feature)
        .map(|b| (b, BaselineOrigin::Population))
        .ok_or_else(|| DetectError::MissingBaseline(feature.to_string()))
}

/// Monotonic deviation → probability ramp
///
/// Linear between `floor` (probability 0) and `floor + span` (probability
/// 1), clamped outside. A non-positive span degenerates to a step at the
/// floor.
pub(crate) fn ramp(deviation: f64, params: &DetectorParams) -> f64 {
    if params.deviation_span <= 0.0 {
        return if deviation >= params.deviation_floor { 1.0 } else { 0.0 };
    }
    ((deviation - params.deviation_floor) / params.deviation_span).clamp(0.0, 1.0)
}

/// Confidence multiplier for observation recency
///
/// In-window observations keep full confidence; stale or undated ones are
/// discounted by the configured penalty.
pub(crate) fn recency_factor(sample: &FeatureSample, params: &DetectorParams) -> f64 {
    match sample.observed_at {
        Some(at) => {
            let age_days = (Utc::now() - at).num_days();
            if age_days <= params.recency_window_days {
                1.0
            } else {
                params.stale_penalty
            }
        }
        None => params.stale_penalty,
    }
}

/// Completeness fraction: required feature plus however many of the
/// optional ones were supplied
pub(crate) fn completeness(optional_present: usize, optional_total: usize) -> f64 {
    (1 + optional_present) as f64 / (1 + optional_total) as f64
}

/// Validate that a required score-type feature is a probability-like value
pub(crate) fn require_unit_score(name: &str, value: f64) -> Result<(), DetectError> {
    if !value.is_finite() {
        return Err(DetectError::MalformedFeature {
            name: name.to_string(),
            reason: "not finite".to_string(),
        });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(DetectError::MalformedFeature {
            name: name.to_string(),
            reason: format!("expected a score in [0,1], got {}", value),
        });
    }
    Ok(())
}

/// The standard detector set, in deterministic registry order
pub fn default_registry() -> Vec<Arc<dyn SignalDetector>> {
    vec![
        Arc::new(DnaRepairDetector::new()),
        Arc::new(Ca125KineticsDetector::new()),
        Arc::new(HighRiskGeneDetector::new()),
        Arc::new(PostTreatmentDetector::new()),
        Arc::new(PathwayEscapeDetector::new()),
    ]
}
