//! Core types and trait definitions for the decision engine
//!
//! Defines the detector trait plus the data model flowing through a run:
//! `PatientContext` (immutable input snapshot) → `SignalResult` (one per
//! detector) → `AggregatedPrediction` (terminal artifact).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oncosig_common::config::SiteProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

pub use oncosig_common::model::{
    ActionItem, ActionPriority, BaselineSource, RiskLevel, SignalKind, Urgency,
};

// ============================================================================
// Input snapshot
// ============================================================================

/// One biomarker feature observation, pre-assembled by the caller
///
/// `baseline` is the patient-specific pre-treatment value when available;
/// detectors fall back to the site profile's population baseline otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSample {
    /// Current value
    pub value: f64,
    /// Patient-specific baseline, if measured
    pub baseline: Option<f64>,
    /// When the current value was observed (drives confidence recency)
    pub observed_at: Option<DateTime<Utc>>,
}

impl FeatureSample {
    /// Sample with value only (no baseline, undated)
    pub fn new(value: f64) -> Self {
        Self {
            value,
            baseline: None,
            observed_at: None,
        }
    }

    /// Sample with a patient-specific baseline
    pub fn with_baseline(value: f64, baseline: f64) -> Self {
        Self {
            value,
            baseline: Some(baseline),
            observed_at: None,
        }
    }

    /// Attach an observation timestamp
    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = Some(at);
        self
    }
}

/// Immutable patient/tumor snapshot for one engine run
///
/// Assembled entirely by the caller (querying lab/genomic collaborators is
/// out of scope here); shared read-only across all detectors and never
/// mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientContext {
    /// Patient identifier
    pub patient_id: Uuid,
    /// Disease site slug; selects the behavior profile from config
    pub disease_site: String,
    /// Current treatment line (1-based), if known
    pub treatment_line: Option<u32>,
    /// Where the comparison baselines for this run came from
    pub baseline_source: BaselineSource,
    /// Whether the site-specific corroborating biomarker (e.g. a
    /// longitudinal assay) was available for this patient
    pub has_corroborating_biomarker: bool,
    /// Biomarker features by name
    pub features: HashMap<String, FeatureSample>,
    /// Observed genomic alteration labels from the tumor panel
    pub alterations: Vec<String>,
}

impl PatientContext {
    /// New snapshot with empty feature set and conservative defaults
    pub fn new(patient_id: Uuid, disease_site: impl Into<String>) -> Self {
        Self {
            patient_id,
            disease_site: disease_site.into(),
            treatment_line: None,
            baseline_source: BaselineSource::PatientSpecific,
            has_corroborating_biomarker: false,
            features: HashMap::new(),
            alterations: Vec::new(),
        }
    }

    /// Look up a feature by name
    pub fn feature(&self, name: &str) -> Option<&FeatureSample> {
        self.features.get(name)
    }

    /// Structural pre-flight validation
    ///
    /// Checks only what every detector relies on: a usable site key and
    /// finite numeric data. Range checks on individual features belong to
    /// the detector that requires them.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.disease_site.trim().is_empty() {
            return Err(ContextError::EmptySite);
        }

        for (name, sample) in &self.features {
            if !sample.value.is_finite() {
                return Err(ContextError::NonFinite {
                    feature: name.clone(),
                });
            }
            if let Some(baseline) = sample.baseline {
                if !baseline.is_finite() {
                    return Err(ContextError::NonFinite {
                        feature: format!("{}.baseline", name),
                    });
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// Signal results
// ============================================================================

/// Signal-specific structured detail, discriminated by the signal kind
///
/// Keeps per-signal data out of the shared [`SignalResult`] fields; fusion
/// and stratification code never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "detail", rename_all = "snake_case")]
pub enum SignalPayload {
    /// No structured detail
    None,
    /// Mechanism breakdown behind a DNA-repair restoration call
    DnaRepair {
        mechanism_scores: HashMap<String, f64>,
    },
    /// CA-125 kinetics snapshot
    Ca125 {
        velocity: f64,
        doubling_time_days: Option<f64>,
    },
    /// High-risk genes implicated by the panel
    GenePanel { implicated_genes: Vec<String> },
    /// Pathway activity scores behind a pathway-level call
    PathwayActivity {
        pathway_scores: HashMap<String, f64>,
    },
}

/// One detector's assessment of a specific resistance mechanism
///
/// `detected` is the detector's own thresholded judgment; a low positive
/// probability below the per-signal threshold is still non-detected, so
/// `detected == false` does NOT imply `probability == 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalResult {
    /// Mechanism this result speaks to
    pub kind: SignalKind,
    /// Whether probability crossed the per-signal detection threshold
    pub detected: bool,
    /// Probability the mechanism is active (0.0-1.0)
    pub probability: f64,
    /// Confidence in this assessment (0.0-1.0)
    pub confidence: f64,
    /// Human-readable reasoning for the call
    pub rationale: String,
    /// Source/derivation notes, including error notes for degraded results
    pub provenance: HashMap<String, String>,
    /// Signal-specific structured detail
    pub payload: SignalPayload,
}

impl SignalResult {
    /// Build a result, clamping probability and confidence to [0,1]
    pub fn new(
        kind: SignalKind,
        detected: bool,
        probability: f64,
        confidence: f64,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            detected,
            probability: probability.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            rationale: rationale.into(),
            provenance: HashMap::new(),
            payload: SignalPayload::None,
        }
    }

    /// Degraded placeholder: not detected, zero confidence, with a
    /// provenance note explaining why (missing input, error, timeout)
    pub fn not_detected(kind: SignalKind, note: impl Into<String>) -> Self {
        let note = note.into();
        let mut result = Self::new(kind, false, 0.0, 0.0, note.clone());
        result.provenance.insert("note".to_string(), note);
        result
    }

    /// Attach a provenance entry
    pub fn with_provenance(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.provenance.insert(key.into(), value.into());
        self
    }

    /// Attach the signal-specific payload
    pub fn with_payload(mut self, payload: SignalPayload) -> Self {
        self.payload = payload;
        self
    }
}

// ============================================================================
// Terminal artifact
// ============================================================================

/// Terminal artifact of one orchestrator run
///
/// Created exactly once per run and never mutated afterwards. Apart from
/// `run_id` and `generated_at`, it is a pure function of the signal set and
/// the injected configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedPrediction {
    /// Unique id for this run
    pub run_id: Uuid,
    /// Fused resistance probability (0.0-1.0)
    pub overall_probability: f64,
    /// Stratified risk level
    pub risk_level: RiskLevel,
    /// Overall confidence after penalties and caps (0.0-1.0)
    pub confidence: f64,
    /// Why the confidence was capped, when it was
    pub confidence_cap_reason: Option<String>,
    /// Clinical urgency derived from the risk level
    pub urgency: Urgency,
    /// Recommended actions, highest priority first
    pub actions: Vec<ActionItem>,
    /// Complete signal set the decision was made from (including degraded
    /// placeholders for failed or timed-out detectors)
    pub signals: Vec<SignalResult>,
    /// When the prediction was produced
    pub generated_at: DateTime<Utc>,
}

// ============================================================================
// Detector trait
// ============================================================================

/// Signal detector error
///
/// Every variant is recovered locally by the orchestrator into a
/// non-detected, zero-confidence [`SignalResult`]; detector errors never
/// fail a run.
#[derive(Debug, Error)]
pub enum DetectError {
    /// A required feature is present but structurally malformed
    #[error("malformed feature '{name}': {reason}")]
    MalformedFeature { name: String, reason: String },

    /// No usable baseline (neither patient-specific nor population-level)
    #[error("no baseline available for feature '{0}'")]
    MissingBaseline(String),

    /// Upstream collaborator failure while fetching biomarker data
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Internal processing error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Polymorphic resistance-mechanism detector
///
/// One implementation per mechanism; new mechanisms are added by
/// implementing this trait, never by editing existing detectors or the
/// fusion code. Detectors are pure functions of the context snapshot plus
/// the site profile: no shared-state mutation, no I/O writes.
///
/// # Input contract
/// - A missing *required* feature yields `Ok(SignalResult::not_detected)`
///   with a provenance note — never an error.
/// - Missing *optional* context only lowers completeness/confidence.
/// - A required feature that is present but malformed (out-of-range score,
///   non-finite value from upstream) is a [`DetectError::MalformedFeature`].
#[async_trait]
pub trait SignalDetector: Send + Sync {
    /// Detector name for logging and provenance
    fn name(&self) -> &'static str;

    /// Mechanism this detector speaks to
    fn kind(&self) -> SignalKind;

    /// Feature names this detector cannot run without
    fn required_features(&self) -> &'static [&'static str];

    /// Assess the mechanism against the context snapshot
    ///
    /// May await on upstream biomarker fetches; the orchestrator bounds
    /// each call with a per-detector deadline.
    async fn detect(
        &self,
        ctx: &PatientContext,
        profile: &SiteProfile,
    ) -> Result<SignalResult, DetectError>;
}

// ============================================================================
// Run-level errors and state
// ============================================================================

/// Structural context fault found during pre-flight validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContextError {
    /// Disease site key is empty
    #[error("disease_site must not be empty")]
    EmptySite,

    /// A feature value or baseline is NaN/infinite
    #[error("feature '{feature}' is not finite")]
    NonFinite { feature: String },

    /// A feature is outside its structural range
    #[error("feature '{feature}' out of range: {value}")]
    OutOfRange { feature: String, value: f64 },
}

/// The only error the orchestrator surfaces to callers
///
/// Everything else (detector failures, timeouts, handler failures)
/// degrades gracefully inside the run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Pre-flight context validation failed; no detector ran and no
    /// partial prediction exists
    #[error("context validation failed: {0}")]
    Validation(#[from] ContextError),
}

/// Orchestrator run state, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Detecting,
    Aggregating,
    Dispatching,
    Complete,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Pending => "pending",
            RunState::Detecting => "detecting",
            RunState::Aggregating => "aggregating",
            RunState::Dispatching => "dispatching",
            RunState::Complete => "complete",
            RunState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Tests
// ============================================================================
