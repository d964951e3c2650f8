//! Post-treatment pathway shift detector
//!
//! Compares the composite pathway-activity shift measured after the current
//! treatment line against baseline. Per-pathway scores (features prefixed
//! `pathway.`) ride along in the payload when present.

use super::{completeness, ramp, recency_factor, require_unit_score, resolve_baseline};
use crate::types::{
    DetectError, PatientContext, SignalDetector, SignalKind, SignalPayload, SignalResult,
};
use async_trait::async_trait;
use oncosig_common::config::{DetectorParams, SiteProfile};
use std::collections::HashMap;
use tracing::debug;

const SHIFT_FEATURE: &str = "post_treatment_pathway_shift";
const PATHWAY_PREFIX: &str = "pathway.";

/// Post-treatment pathway shift detector
pub struct PostTreatmentDetector;

impl PostTreatmentDetector {
    pub fn new() -> Self {
        Self
    }

    fn default_params() -> DetectorParams {
        DetectorParams {
            detection_threshold: 0.55,
            deviation_floor: 0.10,
            deviation_span: 0.45,
            base_confidence: 0.7,
            ..Default::default()
        }
    }
}

impl Default for PostTreatmentDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalDetector for PostTreatmentDetector {
    fn name(&self) -> &'static str {
        "PostTreatmentDetector"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::PostTreatmentPathway
    }

    fn required_features(&self) -> &'static [&'static str] {
        &[SHIFT_FEATURE]
    }

    async fn detect(
        &self,
        ctx: &PatientContext,
        profile: &SiteProfile,
    ) -> Result<SignalResult, DetectError> {
        let params = profile
            .detector_params(self.kind().as_str())
            .unwrap_or_else(Self::default_params);

        let Some(sample) = ctx.feature(SHIFT_FEATURE) else {
            return Ok(SignalResult::not_detected(
                self.kind(),
                "post_treatment_pathway_shift absent from context",
            ));
        };

        require_unit_score(SHIFT_FEATURE, sample.value)?;

        let (baseline, origin) = resolve_baseline(sample, profile, SHIFT_FEATURE)?;
        require_unit_score("post_treatment_pathway_shift.baseline", baseline)?;

        let deviation = sample.value - baseline;
        let probability = ramp(deviation, &params);
        let detected = probability >= params.detection_threshold;

        let pathway_scores: HashMap<String, f64> = ctx
            .features
            .iter()
            .filter(|(name, sample)| name.starts_with(PATHWAY_PREFIX) && sample.value.is_finite())
            .map(|(name, sample)| (name[PATHWAY_PREFIX.len()..].to_string(), sample.value))
            .collect();

        let confidence = params.base_confidence
            * recency_factor(sample, &params)
            * completeness(usize::from(!pathway_scores.is_empty()), 1);

        debug!(
            shift = sample.value,
            baseline,
            deviation,
            probability,
            detected,
            pathways = pathway_scores.len(),
            "Post-treatment pathway assessment"
        );

        let rationale = format!(
            "Pathway shift {:.2} vs baseline {:.2} after treatment line {}",
            sample.value,
            baseline,
            ctx.treatment_line
                .map(|l| l.to_string())
                .unwrap_or_else(|| "?".to_string())
        );

        let mut result = SignalResult::new(self.kind(), detected, probability, confidence, rationale)
            .with_provenance("baseline_origin", origin.as_str())
            .with_provenance("feature", SHIFT_FEATURE);
        if !pathway_scores.is_empty() {
            result = result.with_payload(SignalPayload::PathwayActivity { pathway_scores });
        }

        Ok(result)
    }
}
