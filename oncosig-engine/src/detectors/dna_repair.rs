//! DNA-repair restoration detector
//!
//! Flags restoration of homologous-recombination repair capacity under
//! platinum/PARP-inhibitor pressure, the classic route to acquired
//! resistance. Works from a pre-computed repair-capacity score supplied in
//! the context; how that score is derived from raw genomic data is the
//! upstream collaborator's business.
//!
//! # Confidence
//! Base confidence: 0.85 — capacity scores come from a sequenced panel, the
//! most reliable source in the detector set. Discounted for stale
//! observations and for missing mechanism detail.
//!
//! # Mechanism breakdown
//! When the optional reversion-mutation and methylation-loss scores are
//! present they are carried in the result payload, giving the audit sink
//! the "why" behind a restoration call.

use super::{
    completeness, ramp, recency_factor, require_unit_score, resolve_baseline,
};
use crate::types::{
    DetectError, PatientContext, SignalDetector, SignalKind, SignalPayload, SignalResult,
};
use async_trait::async_trait;
use oncosig_common::config::{DetectorParams, SiteProfile};
use std::collections::HashMap;
use tracing::debug;

const CAPACITY_FEATURE: &str = "dna_repair_capacity";
const OPTIONAL_FEATURES: [&str; 2] = ["reversion_mutation_fraction", "methylation_loss_score"];

/// DNA-repair restoration detector
pub struct DnaRepairDetector;

impl DnaRepairDetector {
    pub fn new() -> Self {
        Self
    }

    fn default_params() -> DetectorParams {
        DetectorParams {
            detection_threshold: 0.5,
            deviation_floor: 0.10,
            deviation_span: 0.40,
            base_confidence: 0.85,
            ..Default::default()
        }
    }
}

impl Default for DnaRepairDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalDetector for DnaRepairDetector {
    fn name(&self) -> &'static str {
        "DnaRepairDetector"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::DnaRepairRestoration
    }

    fn required_features(&self) -> &'static [&'static str] {
        &[CAPACITY_FEATURE]
    }

    async fn detect(
        &self,
        ctx: &PatientContext,
        profile: &SiteProfile,
    ) -> Result<SignalResult, DetectError> {
        let params = profile
            .detector_params(self.kind().as_str())
            .unwrap_or_else(Self::default_params);

        let Some(sample) = ctx.feature(CAPACITY_FEATURE) else {
            return Ok(SignalResult::not_detected(
                self.kind(),
                "dna_repair_capacity absent from context",
            ));
        };

        require_unit_score(CAPACITY_FEATURE, sample.value)?;

        let (baseline, origin) = resolve_baseline(sample, profile, CAPACITY_FEATURE)?;
        require_unit_score("dna_repair_capacity.baseline", baseline)?;

        // Rising capacity relative to the on-treatment baseline is the
        // restoration signal
        let deviation = sample.value - baseline;
        let probability = ramp(deviation, &params);
        let detected = probability >= params.detection_threshold;

        // Mechanism breakdown from optional features
        let mut mechanism_scores = HashMap::new();
        for feature in OPTIONAL_FEATURES {
            if let Some(optional) = ctx.feature(feature) {
                if optional.value.is_finite() {
                    mechanism_scores.insert(feature.to_string(), optional.value);
                }
            }
        }

        let confidence = params.base_confidence
            * recency_factor(sample, &params)
            * completeness(mechanism_scores.len(), OPTIONAL_FEATURES.len());

        debug!(
            capacity = sample.value,
            baseline,
            deviation,
            probability,
            detected,
            "DNA-repair restoration assessment"
        );

        let rationale = format!(
            "Repair capacity {:.2} vs baseline {:.2} (deviation {:+.2})",
            sample.value, baseline, deviation
        );

        let mut result = SignalResult::new(self.kind(), detected, probability, confidence, rationale)
            .with_provenance("baseline_origin", origin.as_str())
            .with_provenance("feature", CAPACITY_FEATURE);
        if !mechanism_scores.is_empty() {
            result = result.with_payload(SignalPayload::DnaRepair { mechanism_scores });
        }

        Ok(result)
    }
}
