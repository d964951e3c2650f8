//! CA-125 kinetics detector
//!
//! Flags an adverse serum CA-125 trend: velocity (rate of rise) running
//! above the patient's on-treatment baseline. The velocity itself is
//! computed upstream from the marker history; this detector only judges
//! the deviation.
//!
//! Base confidence: 0.75 — serial serum markers are informative but carry
//! assay and timing noise.

use super::{completeness, ramp, recency_factor, resolve_baseline};
use crate::types::{
    DetectError, PatientContext, SignalDetector, SignalKind, SignalPayload, SignalResult,
};
use async_trait::async_trait;
use oncosig_common::config::{DetectorParams, SiteProfile};
use tracing::debug;

const VELOCITY_FEATURE: &str = "ca125_velocity";
const DOUBLING_TIME_FEATURE: &str = "ca125_doubling_time_days";

/// CA-125 kinetics detector
pub struct Ca125KineticsDetector;

impl Ca125KineticsDetector {
    pub fn new() -> Self {
        Self
    }

    fn default_params() -> DetectorParams {
        DetectorParams {
            detection_threshold: 0.6,
            // Velocity is in marker units/week; the ramp spans a clearly
            // adverse rise
            deviation_floor: 0.0,
            deviation_span: 25.0,
            base_confidence: 0.75,
            ..Default::default()
        }
    }
}

impl Default for Ca125KineticsDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalDetector for Ca125KineticsDetector {
    fn name(&self) -> &'static str {
        "Ca125KineticsDetector"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Ca125Kinetics
    }

    fn required_features(&self) -> &'static [&'static str] {
        &[VELOCITY_FEATURE]
    }

    async fn detect(
        &self,
        ctx: &PatientContext,
        profile: &SiteProfile,
    ) -> Result<SignalResult, DetectError> {
        let params = profile
            .detector_params(self.kind().as_str())
            .unwrap_or_else(Self::default_params);

        let Some(sample) = ctx.feature(VELOCITY_FEATURE) else {
            return Ok(SignalResult::not_detected(
                self.kind(),
                "ca125_velocity absent from context",
            ));
        };

        if !sample.value.is_finite() {
            return Err(DetectError::MalformedFeature {
                name: VELOCITY_FEATURE.to_string(),
                reason: "not finite".to_string(),
            });
        }

        let (baseline, origin) = resolve_baseline(sample, profile, VELOCITY_FEATURE)?;

        let deviation = sample.value - baseline;
        let probability = ramp(deviation, &params);
        let detected = probability >= params.detection_threshold;

        // Doubling time is optional corroborating detail for the payload
        let doubling_time_days = ctx
            .feature(DOUBLING_TIME_FEATURE)
            .map(|s| s.value)
            .filter(|v| v.is_finite() && *v > 0.0);

        let confidence = params.base_confidence
            * recency_factor(sample, &params)
            * completeness(doubling_time_days.iter().count(), 1);

        debug!(
            velocity = sample.value,
            baseline,
            deviation,
            probability,
            detected,
            "CA-125 kinetics assessment"
        );

        let rationale = format!(
            "CA-125 velocity {:.1} vs baseline {:.1} (deviation {:+.1} units/week)",
            sample.value, baseline, deviation
        );

        Ok(SignalResult::new(self.kind(), detected, probability, confidence, rationale)
            .with_provenance("baseline_origin", origin.as_str())
            .with_provenance("feature", VELOCITY_FEATURE)
            .with_payload(SignalPayload::Ca125 {
                velocity: sample.value,
                doubling_time_days,
            }))
    }
}
