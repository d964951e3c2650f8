//! High-risk gene burden detector
//!
//! Judges the alteration burden reported by the tumor gene panel. Burden
//! is an absolute 0-1 score (no baseline comparison: any burden is news),
//! with the observed alteration labels carried as payload detail.
//!
//! Base confidence: 0.9 — sequencing panels are the most reliable source
//! in the set.

use super::{completeness, ramp, recency_factor, require_unit_score};
use crate::types::{
    DetectError, PatientContext, SignalDetector, SignalKind, SignalPayload, SignalResult,
};
use async_trait::async_trait;
use oncosig_common::config::{DetectorParams, SiteProfile};
use tracing::debug;

const BURDEN_FEATURE: &str = "gene_panel_burden";

/// High-risk gene burden detector
pub struct HighRiskGeneDetector;

impl HighRiskGeneDetector {
    pub fn new() -> Self {
        Self
    }

    fn default_params() -> DetectorParams {
        DetectorParams {
            detection_threshold: 0.5,
            deviation_floor: 0.15,
            deviation_span: 0.50,
            base_confidence: 0.9,
            ..Default::default()
        }
    }
}

impl Default for HighRiskGeneDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalDetector for HighRiskGeneDetector {
    fn name(&self) -> &'static str {
        "HighRiskGeneDetector"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::HighRiskGene
    }

    fn required_features(&self) -> &'static [&'static str] {
        &[BURDEN_FEATURE]
    }

    async fn detect(
        &self,
        ctx: &PatientContext,
        profile: &SiteProfile,
    ) -> Result<SignalResult, DetectError> {
        let params = profile
            .detector_params(self.kind().as_str())
            .unwrap_or_else(Self::default_params);

        let Some(sample) = ctx.feature(BURDEN_FEATURE) else {
            return Ok(SignalResult::not_detected(
                self.kind(),
                "gene_panel_burden absent from context (panel not run)",
            ));
        };

        require_unit_score(BURDEN_FEATURE, sample.value)?;

        // Burden is absolute; the ramp starts at the configured floor
        let probability = ramp(sample.value, &params);
        let detected = probability >= params.detection_threshold;

        let has_alteration_detail = !ctx.alterations.is_empty();
        let confidence = params.base_confidence
            * recency_factor(sample, &params)
            * completeness(usize::from(has_alteration_detail), 1);

        debug!(
            burden = sample.value,
            alterations = ctx.alterations.len(),
            probability,
            detected,
            "High-risk gene assessment"
        );

        let rationale = format!(
            "Panel burden {:.2} across {} reported alteration(s)",
            sample.value,
            ctx.alterations.len()
        );

        let mut result = SignalResult::new(self.kind(), detected, probability, confidence, rationale)
            .with_provenance("feature", BURDEN_FEATURE);
        if has_alteration_detail {
            result = result.with_payload(SignalPayload::GenePanel {
                implicated_genes: ctx.alterations.clone(),
            });
        }

        Ok(result)
    }
}
