//! Run orchestration
//!
//! Coordinates one resistance evaluation end to end:
//! validate → detect (parallel fan-out) → aggregate → dispatch → complete.
//!
//! # Error handling
//! - Pre-flight context validation is the only fatal path; it fails the
//!   run before any detector executes.
//! - A detector that errors, panics, or exceeds its deadline is recorded
//!   as a non-detected, zero-confidence result with an error note in its
//!   provenance — never a run failure.
//! - Event-handler failures are contained inside the dispatcher.
//!
//! # Concurrency
//! Detectors run as one tokio task each against the same immutable
//! context snapshot, joined through a `JoinSet`. Each task is bounded by
//! the per-detector deadline; the whole fan-in is additionally bounded by
//! the overall run deadline, after which still-running detectors are
//! aborted and recorded as timed out. Stages after detection are pure
//! computation and run synchronously on the calling task.

use crate::detectors;
use crate::fusion::{ActionDeterminer, ConfidenceComputer, RiskStratifier, SignalAggregator};
use crate::types::{
    AggregatedPrediction, EngineError, PatientContext, RunState, SignalDetector, SignalResult,
};
use futures::FutureExt;
use oncosig_common::config::{EngineConfig, SiteProfile};
use oncosig_common::events::{EngineEvent, EventDispatcher};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Decision-engine orchestrator
///
/// Construction is the injection point for everything that varies:
/// configuration, the detector registry, and the event dispatcher. No
/// process-wide state is involved; lifecycle is scoped to the call site.
pub struct Orchestrator {
    config: Arc<EngineConfig>,
    detectors: Vec<Arc<dyn SignalDetector>>,
    dispatcher: Arc<EventDispatcher>,
}

impl Orchestrator {
    /// Orchestrator with the standard detector registry
    pub fn new(config: Arc<EngineConfig>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            config,
            detectors: detectors::default_registry(),
            dispatcher,
        }
    }

    /// Orchestrator with a custom detector registry
    pub fn with_detectors(
        config: Arc<EngineConfig>,
        dispatcher: Arc<EventDispatcher>,
        detectors: Vec<Arc<dyn SignalDetector>>,
    ) -> Self {
        Self {
            config,
            detectors,
            dispatcher,
        }
    }

    /// Add a detector to the registry (wiring time, before any run)
    pub fn register_detector(&mut self, detector: Arc<dyn SignalDetector>) {
        self.detectors.push(detector);
    }

    /// Evaluate one context under the configured run deadline
    pub async fn run(&self, ctx: PatientContext) -> Result<AggregatedPrediction, EngineError> {
        self.run_with_deadline(ctx, self.config.run_deadline()).await
    }

    /// Evaluate one context under a caller-supplied overall deadline
    ///
    /// On deadline expiry, detectors still running are treated as timed
    /// out and the pipeline proceeds with whatever completed; nothing is
    /// rolled back since every stage is stateless.
    pub async fn run_with_deadline(
        &self,
        ctx: PatientContext,
        deadline: Duration,
    ) -> Result<AggregatedPrediction, EngineError> {
        let run_id = Uuid::new_v4();
        let mut state = RunState::Pending;
        info!(
            run_id = %run_id,
            site = %ctx.disease_site,
            state = %state,
            "Starting resistance evaluation"
        );

        // Pre-flight: the only path that can fail the run
        if let Err(fault) = ctx.validate() {
            state = RunState::Failed;
            warn!(
                run_id = %run_id,
                state = %state,
                error = %fault,
                "Context validation failed; no detector ran"
            );
            return Err(EngineError::Validation(fault));
        }

        let profile = Arc::new(self.config.profile_for(&ctx.disease_site).clone());
        let ctx = Arc::new(ctx);

        state = RunState::Detecting;
        debug!(run_id = %run_id, state = %state, detectors = self.detectors.len(), "Fanning out detectors");
        let signals = self.detect_all(&ctx, &profile, deadline).await;

        state = RunState::Aggregating;
        debug!(run_id = %run_id, state = %state, "Running decision stages");

        let detected_count = signals.iter().filter(|s| s.detected).count();
        let overall_probability = SignalAggregator::new().aggregate(&signals, &profile);
        let risk_level = RiskStratifier::new(profile.risk.clone()).stratify(
            overall_probability,
            detected_count,
            ctx.has_corroborating_biomarker,
        );
        let (confidence, confidence_cap_reason) = ConfidenceComputer::new(profile.confidence.clone())
            .compute(
                &signals,
                ctx.baseline_source,
                ctx.has_corroborating_biomarker,
                detected_count,
            );
        let (urgency, actions) = ActionDeterminer::new(profile.actions.clone()).determine(risk_level);

        let prediction = AggregatedPrediction {
            run_id,
            overall_probability,
            risk_level,
            confidence,
            confidence_cap_reason,
            urgency,
            actions,
            signals,
            generated_at: chrono::Utc::now(),
        };

        state = RunState::Dispatching;
        debug!(run_id = %run_id, state = %state, "Publishing events");
        self.dispatch(&prediction).await;

        state = RunState::Complete;
        info!(
            run_id = %run_id,
            state = %state,
            probability = prediction.overall_probability,
            risk = %prediction.risk_level,
            detected = detected_count,
            "Resistance evaluation complete"
        );

        Ok(prediction)
    }

    /// Parallel detector fan-out with per-detector and overall deadlines
    ///
    /// Returns one result per registered detector, in registry order, so
    /// repeated runs over the same context are deterministic.
    async fn detect_all(
        &self,
        ctx: &Arc<PatientContext>,
        profile: &Arc<SiteProfile>,
        deadline: Duration,
    ) -> Vec<SignalResult> {
        // Per-detector deadline, clamped so it can never outlive the run
        let per_detector = self.config.detector_timeout().min(deadline);

        let mut join_set = JoinSet::new();
        for (index, detector) in self.detectors.iter().enumerate() {
            let detector = Arc::clone(detector);
            let ctx = Arc::clone(ctx);
            let profile = Arc::clone(profile);

            join_set.spawn(async move {
                let kind = detector.kind();
                let name = detector.name();

                let guarded = AssertUnwindSafe(detector.detect(&ctx, &profile)).catch_unwind();
                let result = match tokio::time::timeout(per_detector, guarded).await {
                    Ok(Ok(Ok(result))) => {
                        debug!(detector = name, detected = result.detected, "Detector completed");
                        result
                    }
                    Ok(Ok(Err(e))) => {
                        warn!(detector = name, error = %e, "Detector failed; recording degraded result");
                        SignalResult::not_detected(kind, format!("detector error: {}", e))
                            .with_provenance("error", e.to_string())
                    }
                    Ok(Err(_panic)) => {
                        warn!(detector = name, "Detector panicked; recording degraded result");
                        SignalResult::not_detected(kind, "detector panicked")
                            .with_provenance("error", "panic")
                    }
                    Err(_) => {
                        warn!(
                            detector = name,
                            timeout_ms = per_detector.as_millis() as u64,
                            "Detector timed out"
                        );
                        SignalResult::not_detected(kind, "detector timed out")
                            .with_provenance("error", "timeout")
                    }
                };

                (index, result)
            });
        }

        let mut slots: Vec<Option<SignalResult>> =
            (0..self.detectors.len()).map(|_| None).collect();

        let overall = tokio::time::sleep(deadline);
        tokio::pin!(overall);
        let mut deadline_expired = false;

        loop {
            tokio::select! {
                joined = join_set.join_next() => {
                    match joined {
                        Some(Ok((index, result))) => slots[index] = Some(result),
                        Some(Err(e)) => {
                            // Abort-path join errors; the slot is filled below
                            debug!(error = %e, "Detector task did not join cleanly");
                        }
                        None => break,
                    }
                }
                _ = &mut overall, if !deadline_expired => {
                    deadline_expired = true;
                    warn!("Run deadline expired; aborting remaining detectors");
                    join_set.abort_all();
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    SignalResult::not_detected(
                        self.detectors[index].kind(),
                        "detector aborted at run deadline",
                    )
                    .with_provenance("error", "timeout")
                })
            })
            .collect()
    }

    /// Publish one `SignalDetected` per detected signal, then exactly one
    /// `ActionRequired`
    async fn dispatch(&self, prediction: &AggregatedPrediction) {
        let now = chrono::Utc::now();

        for signal in prediction.signals.iter().filter(|s| s.detected) {
            self.dispatcher
                .publish(&EngineEvent::SignalDetected {
                    run_id: prediction.run_id,
                    signal: signal.kind,
                    probability: signal.probability,
                    confidence: signal.confidence,
                    rationale: signal.rationale.clone(),
                    provenance: signal.provenance.clone(),
                    timestamp: now,
                })
                .await;
        }

        self.dispatcher
            .publish(&EngineEvent::ActionRequired {
                run_id: prediction.run_id,
                urgency: prediction.urgency,
                actions: prediction.actions.clone(),
                timestamp: now,
            })
            .await;
    }
}
