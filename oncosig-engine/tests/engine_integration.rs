//! End-to-end orchestrator tests
//!
//! Exercises the full run path with stub detectors and capture handlers:
//! fan-out isolation (errors, panics, timeouts), event delivery, handler
//! isolation, determinism, and validation pre-flight.

use async_trait::async_trait;
use oncosig_common::config::EngineConfig;
use oncosig_common::events::{EngineEvent, EventDispatcher, EventHandler, EventKind};
use oncosig_common::model::{BaselineSource, SignalKind};
use oncosig_engine::types::{
    DetectError, FeatureSample, PatientContext, SignalDetector, SignalResult,
};
use oncosig_engine::Orchestrator;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .try_init();
}

// ============================================================================
// Stub detectors
// ============================================================================

/// Detector that always returns a fixed assessment
struct FixedDetector {
    kind: SignalKind,
    probability: f64,
    confidence: f64,
    detected: bool,
}

#[async_trait]
impl SignalDetector for FixedDetector {
    fn name(&self) -> &'static str {
        "FixedDetector"
    }

    fn kind(&self) -> SignalKind {
        self.kind
    }

    fn required_features(&self) -> &'static [&'static str] {
        &[]
    }

    async fn detect(
        &self,
        _ctx: &PatientContext,
        _profile: &oncosig_common::config::SiteProfile,
    ) -> Result<SignalResult, DetectError> {
        Ok(SignalResult::new(
            self.kind,
            self.detected,
            self.probability,
            self.confidence,
            "fixed assessment",
        ))
    }
}

/// Detector that never completes within any realistic deadline
struct SlowDetector;

#[async_trait]
impl SignalDetector for SlowDetector {
    fn name(&self) -> &'static str {
        "SlowDetector"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::PathwayEscape
    }

    fn required_features(&self) -> &'static [&'static str] {
        &[]
    }

    async fn detect(
        &self,
        _ctx: &PatientContext,
        _profile: &oncosig_common::config::SiteProfile,
    ) -> Result<SignalResult, DetectError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(SignalResult::new(self.kind(), true, 1.0, 1.0, "too late"))
    }
}

/// Detector that fails with an upstream error
struct ErrorDetector;

#[async_trait]
impl SignalDetector for ErrorDetector {
    fn name(&self) -> &'static str {
        "ErrorDetector"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::PostTreatmentPathway
    }

    fn required_features(&self) -> &'static [&'static str] {
        &[]
    }

    async fn detect(
        &self,
        _ctx: &PatientContext,
        _profile: &oncosig_common::config::SiteProfile,
    ) -> Result<SignalResult, DetectError> {
        Err(DetectError::Upstream("biomarker service unavailable".into()))
    }
}

/// Detector that panics mid-flight
struct PanickyDetector;

#[async_trait]
impl SignalDetector for PanickyDetector {
    fn name(&self) -> &'static str {
        "PanickyDetector"
    }

    fn kind(&self) -> SignalKind {
        SignalKind::HighRiskGene
    }

    fn required_features(&self) -> &'static [&'static str] {
        &[]
    }

    async fn detect(
        &self,
        _ctx: &PatientContext,
        _profile: &oncosig_common::config::SiteProfile,
    ) -> Result<SignalResult, DetectError> {
        panic!("unexpected upstream payload shape")
    }
}

// ============================================================================
// Event capture
// ============================================================================

#[derive(Default)]
struct CaptureHandler {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

#[async_trait]
impl EventHandler for CaptureHandler {
    fn name(&self) -> &'static str {
        "capture"
    }

    async fn handle(&self, event: &EngineEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct FailingHandler;

#[async_trait]
impl EventHandler for FailingHandler {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn handle(&self, _event: &EngineEvent) -> anyhow::Result<()> {
        anyhow::bail!("audit sink down")
    }
}

fn capturing_dispatcher() -> (Arc<EventDispatcher>, Arc<Mutex<Vec<EngineEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut dispatcher = EventDispatcher::new();
    for kind in [EventKind::SignalDetected, EventKind::ActionRequired] {
        dispatcher.register(
            kind,
            Arc::new(CaptureHandler {
                events: Arc::clone(&events),
            }),
        );
    }
    (Arc::new(dispatcher), events)
}

fn resistant_context() -> PatientContext {
    let mut ctx = PatientContext::new(Uuid::new_v4(), "ovarian");
    ctx.has_corroborating_biomarker = true;
    ctx.baseline_source = BaselineSource::PatientSpecific;
    ctx.features.insert(
        "dna_repair_capacity".to_string(),
        FeatureSample::with_baseline(0.9, 0.2),
    );
    ctx.features.insert(
        "ca125_velocity".to_string(),
        FeatureSample::with_baseline(40.0, 1.0),
    );
    ctx
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_run_publishes_signal_events_and_one_action_event() {
    init_tracing();
    let (dispatcher, events) = capturing_dispatcher();
    let orchestrator = Orchestrator::new(Arc::new(EngineConfig::default()), dispatcher);

    let prediction = orchestrator.run(resistant_context()).await.unwrap();
    let detected = prediction.signals.iter().filter(|s| s.detected).count();
    assert!(detected >= 2, "fixture should trip at least two detectors");

    let events = events.lock().unwrap();
    let signal_events = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::SignalDetected { .. }))
        .count();
    let action_events: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::ActionRequired { run_id, urgency, actions, .. } => {
                Some((*run_id, *urgency, actions.clone()))
            }
            _ => None,
        })
        .collect();

    assert_eq!(signal_events, detected, "one SignalDetected per detected signal");
    assert_eq!(action_events.len(), 1, "exactly one ActionRequired per run");
    assert_eq!(action_events[0].0, prediction.run_id);
    assert_eq!(action_events[0].1, prediction.urgency);
    assert_eq!(action_events[0].2, prediction.actions);
}

#[tokio::test]
async fn test_slow_detector_times_out_without_delaying_others() {
    init_tracing();
    let mut config = EngineConfig::default();
    config.detector_timeout_ms = 200;

    let orchestrator = Orchestrator::with_detectors(
        Arc::new(config),
        Arc::new(EventDispatcher::new()),
        vec![
            Arc::new(FixedDetector {
                kind: SignalKind::Ca125Kinetics,
                probability: 0.8,
                confidence: 0.9,
                detected: true,
            }),
            Arc::new(SlowDetector),
        ],
    );

    let started = Instant::now();
    let prediction = orchestrator.run(resistant_context()).await.unwrap();
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_secs(2),
        "run must complete near the detector deadline, took {:?}",
        elapsed
    );

    assert_eq!(prediction.signals.len(), 2);
    let fast = &prediction.signals[0];
    assert!(fast.detected);
    assert_eq!(fast.probability, 0.8);

    let slow = &prediction.signals[1];
    assert!(!slow.detected);
    assert_eq!(slow.confidence, 0.0);
    assert_eq!(slow.provenance.get("error").map(String::as_str), Some("timeout"));
}

#[tokio::test]
async fn test_erroring_and_panicking_detectors_degrade_gracefully() {
    init_tracing();
    let orchestrator = Orchestrator::with_detectors(
        Arc::new(EngineConfig::default()),
        Arc::new(EventDispatcher::new()),
        vec![
            Arc::new(ErrorDetector),
            Arc::new(PanickyDetector),
            Arc::new(FixedDetector {
                kind: SignalKind::DnaRepairRestoration,
                probability: 0.9,
                confidence: 0.8,
                detected: true,
            }),
        ],
    );

    let prediction = orchestrator.run(resistant_context()).await.unwrap();
    assert_eq!(prediction.signals.len(), 3);

    let errored = &prediction.signals[0];
    assert!(!errored.detected);
    assert!(errored
        .provenance
        .get("error")
        .is_some_and(|e| e.contains("biomarker service unavailable")));

    let panicked = &prediction.signals[1];
    assert!(!panicked.detected);
    assert_eq!(panicked.provenance.get("error").map(String::as_str), Some("panic"));

    let healthy = &prediction.signals[2];
    assert!(healthy.detected);
}

#[tokio::test]
async fn test_overall_deadline_degrades_remaining_detectors() {
    init_tracing();
    let orchestrator = Orchestrator::with_detectors(
        Arc::new(EngineConfig::default()),
        Arc::new(EventDispatcher::new()),
        vec![Arc::new(SlowDetector), Arc::new(SlowDetector)],
    );

    let started = Instant::now();
    let prediction = orchestrator
        .run_with_deadline(resistant_context(), Duration::from_millis(100))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(prediction.signals.len(), 2);
    assert!(prediction.signals.iter().all(|s| !s.detected));
    assert!(prediction
        .signals
        .iter()
        .all(|s| s.provenance.get("error").map(String::as_str) == Some("timeout")));
    // Degraded signals carry no confidence, so the aggregate collapses
    assert_eq!(prediction.overall_probability, 0.0);
}

#[tokio::test]
async fn test_throwing_handler_does_not_affect_prediction_or_other_handlers() {
    init_tracing();
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut dispatcher = EventDispatcher::new();
    // Failing handler registered first; capture must still receive events
    dispatcher.register(EventKind::ActionRequired, Arc::new(FailingHandler));
    dispatcher.register(
        EventKind::ActionRequired,
        Arc::new(CaptureHandler {
            events: Arc::clone(&events),
        }),
    );

    let orchestrator = Orchestrator::new(Arc::new(EngineConfig::default()), Arc::new(dispatcher));
    let prediction = orchestrator.run(resistant_context()).await.unwrap();

    assert!(prediction.overall_probability > 0.0);
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_validation_failure_publishes_nothing() {
    init_tracing();
    let (dispatcher, events) = capturing_dispatcher();
    let orchestrator = Orchestrator::new(Arc::new(EngineConfig::default()), dispatcher);

    let mut ctx = resistant_context();
    ctx.features
        .insert("dna_repair_capacity".to_string(), FeatureSample::new(f64::NAN));

    let result = orchestrator.run(ctx).await;
    assert!(result.is_err());
    assert!(events.lock().unwrap().is_empty(), "failed runs emit no events");
}

#[tokio::test]
async fn test_identical_contexts_produce_identical_predictions() {
    init_tracing();
    let orchestrator = Orchestrator::new(
        Arc::new(EngineConfig::default()),
        Arc::new(EventDispatcher::new()),
    );

    let ctx = resistant_context();
    let first = orchestrator.run(ctx.clone()).await.unwrap();
    let second = orchestrator.run(ctx).await.unwrap();

    let normalize = |prediction: &oncosig_engine::AggregatedPrediction| {
        let mut value = serde_json::to_value(prediction).unwrap();
        let map = value.as_object_mut().unwrap();
        map.remove("run_id");
        map.remove("generated_at");
        value
    };

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(normalize(&first), normalize(&second));
}
