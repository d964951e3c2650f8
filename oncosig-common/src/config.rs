//! Engine configuration
//!
//! Disease-site-keyed table of thresholds, weights, penalty factors, and
//! action vocabularies. Injected at orchestrator construction time; the
//! profile lookup is the only site-sensitive step anywhere in the engine —
//! no disease name appears in decision logic.
//!
//! Config files are TOML. Every field carries a serde default so partial
//! files work; an absent file is equivalent to `EngineConfig::default()`.

use crate::model::{ActionItem, ActionPriority};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-detector deadline in milliseconds
    #[serde(default = "default_detector_timeout_ms")]
    pub detector_timeout_ms: u64,

    /// Overall run deadline in milliseconds (strictly longer than the
    /// per-detector deadline; the orchestrator clamps if misconfigured)
    #[serde(default = "default_run_deadline_ms")]
    pub run_deadline_ms: u64,

    /// Site-specific behavior profiles, keyed by disease site slug
    #[serde(default)]
    pub profiles: HashMap<String, SiteProfile>,

    /// Profile used for sites with no entry in `profiles`
    #[serde(default)]
    pub default_profile: SiteProfile,
}

fn default_detector_timeout_ms() -> u64 {
    5_000
}

fn default_run_deadline_ms() -> u64 {
    30_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detector_timeout_ms: default_detector_timeout_ms(),
            run_deadline_ms: default_run_deadline_ms(),
            profiles: HashMap::new(),
            default_profile: SiteProfile::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Resolve the behavior profile for a disease site
    ///
    /// Falls back to the default profile for unknown sites, so a new site
    /// gets conservative defaults rather than a hard failure.
    pub fn profile_for(&self, site: &str) -> &SiteProfile {
        self.profiles.get(site).unwrap_or(&self.default_profile)
    }

    /// Per-detector deadline as a `Duration`
    pub fn detector_timeout(&self) -> Duration {
        Duration::from_millis(self.detector_timeout_ms)
    }

    /// Overall run deadline as a `Duration`
    pub fn run_deadline(&self) -> Duration {
        Duration::from_millis(self.run_deadline_ms)
    }
}

/// Behavior profile for one disease site
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Risk stratification thresholds
    #[serde(default)]
    pub risk: RiskThresholds,

    /// Confidence penalty/cap factors
    #[serde(default)]
    pub confidence: ConfidencePolicy,

    /// Per-signal fusion weight multipliers, keyed by signal slug
    /// (absent key = weight 1.0)
    #[serde(default)]
    pub fusion_weights: HashMap<String, f64>,

    /// Per-signal detector parameters, keyed by signal slug
    #[serde(default)]
    pub detectors: HashMap<String, DetectorParams>,

    /// Action vocabulary per risk level
    #[serde(default)]
    pub actions: ActionVocabulary,

    /// Population-level reference baselines, keyed by feature name.
    /// Used when a patient-specific baseline is absent.
    #[serde(default)]
    pub population_baselines: HashMap<String, f64>,
}

impl SiteProfile {
    /// Detector parameters for a signal slug, when configured
    ///
    /// Each detector falls back to its own defaults for unconfigured kinds.
    pub fn detector_params(&self, signal: &str) -> Option<DetectorParams> {
        self.detectors.get(signal).cloned()
    }

    /// Fusion weight multiplier for a signal slug (default 1.0)
    pub fn fusion_weight(&self, signal: &str) -> f64 {
        self.fusion_weights.get(signal).copied().unwrap_or(1.0)
    }

    /// Population-level baseline for a feature, if configured
    pub fn population_baseline(&self, feature: &str) -> Option<f64> {
        self.population_baselines.get(feature).copied()
    }
}

/// Risk stratification thresholds
///
/// Boundaries are inclusive at the lower end (`>=`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Probability floor for the high-risk rule (default 0.70)
    #[serde(default = "default_high_probability")]
    pub high_probability: f64,

    /// Probability floor for the medium-risk rule (default 0.50)
    #[serde(default = "default_medium_probability")]
    pub medium_probability: f64,

    /// Minimum detected signals required for high risk (default 2)
    #[serde(default = "default_high_min_signals")]
    pub high_min_signals: usize,
}

fn default_high_probability() -> f64 {
    0.70
}

fn default_medium_probability() -> f64 {
    0.50
}

fn default_high_min_signals() -> usize {
    2
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high_probability: default_high_probability(),
            medium_probability: default_medium_probability(),
            high_min_signals: default_high_min_signals(),
        }
    }
}

/// Confidence penalty and cap factors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidencePolicy {
    /// Multiplier applied when the run baseline is population-level
    /// (default 0.80)
    #[serde(default = "default_population_baseline_penalty")]
    pub population_baseline_penalty: f64,

    /// Upper bound forced onto confidence when corroboration is
    /// insufficient (default 0.60)
    #[serde(default = "default_corroboration_cap")]
    pub corroboration_cap: f64,
}

fn default_population_baseline_penalty() -> f64 {
    0.80
}

fn default_corroboration_cap() -> f64 {
    0.60
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            population_baseline_penalty: default_population_baseline_penalty(),
            corroboration_cap: default_corroboration_cap(),
        }
    }
}

/// Per-detector tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorParams {
    /// Probability at or above which the signal counts as detected
    #[serde(default = "default_detection_threshold")]
    pub detection_threshold: f64,

    /// Normalized deviation at which probability starts rising above 0
    #[serde(default = "default_deviation_floor")]
    pub deviation_floor: f64,

    /// Deviation span over which probability ramps from 0 to 1
    #[serde(default = "default_deviation_span")]
    pub deviation_span: f64,

    /// Baseline confidence for the detector's data source
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,

    /// Observations older than this window are considered stale
    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: i64,

    /// Confidence multiplier applied to stale or undated observations
    #[serde(default = "default_stale_penalty")]
    pub stale_penalty: f64,
}

fn default_detection_threshold() -> f64 {
    0.5
}

fn default_deviation_floor() -> f64 {
    0.0
}

fn default_deviation_span() -> f64 {
    1.0
}

fn default_base_confidence() -> f64 {
    0.7
}

fn default_recency_window_days() -> i64 {
    90
}

fn default_stale_penalty() -> f64 {
    0.7
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            detection_threshold: default_detection_threshold(),
            deviation_floor: default_deviation_floor(),
            deviation_span: default_deviation_span(),
            base_confidence: default_base_confidence(),
            recency_window_days: default_recency_window_days(),
            stale_penalty: default_stale_penalty(),
        }
    }
}

/// Recommended actions per risk level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionVocabulary {
    #[serde(default = "default_high_actions")]
    pub high: Vec<ActionItem>,

    #[serde(default = "default_medium_actions")]
    pub medium: Vec<ActionItem>,

    #[serde(default = "default_low_actions")]
    pub low: Vec<ActionItem>,
}

fn default_high_actions() -> Vec<ActionItem> {
    vec![
        ActionItem::new(
            "ESCALATE_IMAGING",
            ActionPriority::High,
            "Confirm or rule out radiographic progression",
        ),
        ActionItem::new(
            "CONSIDER_REGIMEN_SWITCH",
            ActionPriority::High,
            "Resistance signals corroborate; current regimen may be failing",
        ),
        ActionItem::new(
            "REVIEW_RESISTANCE_PLAYBOOK",
            ActionPriority::High,
            "Match detected mechanisms against next-line options",
        ),
    ]
}

fn default_medium_actions() -> Vec<ActionItem> {
    vec![
        ActionItem::new(
            "INCREASE_MONITORING_FREQUENCY",
            ActionPriority::Medium,
            "Tighten the surveillance interval until the trend resolves",
        ),
        ActionItem::new(
            "REVIEW_AT_NEXT_VISIT",
            ActionPriority::Medium,
            "Discuss the emerging signal at the next scheduled visit",
        ),
    ]
}

fn default_low_actions() -> Vec<ActionItem> {
    vec![ActionItem::new(
        "ROUTINE_MONITORING",
        ActionPriority::Low,
        "No resistance signal warrants a schedule change",
    )]
}

impl Default for ActionVocabulary {
    fn default() -> Self {
        Self {
            high: default_high_actions(),
            medium: default_medium_actions(),
            low: default_low_actions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.detector_timeout_ms, 5_000);
        assert_eq!(config.run_deadline_ms, 30_000);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_default_thresholds_match_policy() {
        let profile = SiteProfile::default();
        assert_eq!(profile.risk.high_probability, 0.70);
        assert_eq!(profile.risk.medium_probability, 0.50);
        assert_eq!(profile.risk.high_min_signals, 2);
        assert_eq!(profile.confidence.population_baseline_penalty, 0.80);
        assert_eq!(profile.confidence.corroboration_cap, 0.60);
    }

    #[test]
    fn test_default_action_vocabulary() {
        let vocab = ActionVocabulary::default();
        assert_eq!(vocab.high.len(), 3);
        assert_eq!(vocab.high[0].code, "ESCALATE_IMAGING");
        assert_eq!(vocab.medium.len(), 2);
        assert_eq!(vocab.low.len(), 1);
        assert_eq!(vocab.low[0].code, "ROUTINE_MONITORING");
    }

    #[test]
    fn test_profile_for_falls_back_to_default() {
        let mut config = EngineConfig::default();
        let mut ovarian = SiteProfile::default();
        ovarian.risk.high_probability = 0.65;
        config.profiles.insert("ovarian".to_string(), ovarian);

        assert_eq!(config.profile_for("ovarian").risk.high_probability, 0.65);
        assert_eq!(config.profile_for("pancreatic").risk.high_probability, 0.70);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
            detector_timeout_ms = 2000

            [profiles.ovarian.risk]
            high_probability = 0.65
        "#;

        let config = EngineConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.detector_timeout_ms, 2_000);
        assert_eq!(config.run_deadline_ms, 30_000);

        let profile = config.profile_for("ovarian");
        assert_eq!(profile.risk.high_probability, 0.65);
        // Unspecified fields fall back to defaults
        assert_eq!(profile.risk.medium_probability, 0.50);
        assert_eq!(profile.confidence.corroboration_cap, 0.60);
    }

    #[test]
    fn test_detector_params_lookup_for_unconfigured_signal() {
        let profile = SiteProfile::default();
        assert!(profile.detector_params("ca125_kinetics").is_none());
        assert_eq!(profile.fusion_weight("ca125_kinetics"), 1.0);
    }

    #[test]
    fn test_toml_file_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("oncosig.toml");

        let mut config = EngineConfig::default();
        config.detector_timeout_ms = 1_500;
        let serialized = toml::to_string(&config).unwrap();
        std::fs::write(&path, serialized).unwrap();

        let loaded = EngineConfig::load_toml(&path).unwrap();
        assert_eq!(loaded.detector_timeout_ms, 1_500);
        assert_eq!(loaded.run_deadline_ms, 30_000);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = EngineConfig::from_toml_str("detector_timeout_ms = \"soon\"");
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }
}
