//! Pathway escape detector
//!
//! Flags activation of a bypass pathway relative to baseline — the tumor
//! routing around the drugged target rather than reversing its effect.

use super::{ramp, recency_factor, require_unit_score, resolve_baseline};
use crate::types::{
    DetectError, PatientContext, SignalDetector, SignalKind, SignalResult,
};
use async_trait::async_trait;
use oncosig_common::config::{DetectorParams, SiteProfile};
use tracing::debug;

const ACTIVITY_FEATURE: &str = "pathway_escape_activity";

/// Pathway escape detector
pub struct PathwayEscapeDetector;

impl PathwayEscapeDetector {
    pub fn new() -> Self {
        Self
    }

    fn default_params() -> DetectorParams {
        DetectorParams {
            detection_threshold: 0.5,
            deviation_floor: 0.15,
            deviation_span: 0.40,
            base_confidence: 0.65,
            ..Default::default()
        }
    }
}

impl Default for PathwayEscapeDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalDetector for PathwayEscapeDetector {
    fn name(&self) -> &'static str {
        "PathwayEscapeDetector"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::PathwayEscape
    }

    fn required_features(&self) -> &'static [&'static str] {
        &[ACTIVITY_FEATURE]
    }

    async fn detect(
        &self,
        ctx: &PatientContext,
        profile: &SiteProfile,
    ) -> Result<SignalResult, DetectError> {
        let params = profile
            .detector_params(self.kind().as_str())
            .unwrap_or_else(Self::default_params);

        let Some(sample) = ctx.feature(ACTIVITY_FEATURE) else {
            return Ok(SignalResult::not_detected(
                self.kind(),
                "pathway_escape_activity absent from context",
            ));
        };

        require_unit_score(ACTIVITY_FEATURE, sample.value)?;

        let (baseline, origin) = resolve_baseline(sample, profile, ACTIVITY_FEATURE)?;
        require_unit_score("pathway_escape_activity.baseline", baseline)?;

        let deviation = sample.value - baseline;
        let probability = ramp(deviation, &params);
        let detected = probability >= params.detection_threshold;
        let confidence = params.base_confidence * recency_factor(sample, &params);

        debug!(
            activity = sample.value,
            baseline,
            deviation,
            probability,
            detected,
            "Pathway escape assessment"
        );

        let rationale = format!(
            "Escape pathway activity {:.2} vs baseline {:.2} (deviation {:+.2})",
            sample.value, baseline, deviation
        );

        Ok(SignalResult::new(self.kind(), detected, probability, confidence, rationale)
            .with_provenance("baseline_origin", origin.as_str())
            .with_provenance("feature", ACTIVITY_FEATURE))
    }
}
