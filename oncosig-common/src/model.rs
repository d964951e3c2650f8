//! Shared clinical vocabulary
//!
//! Leaf types used by the configuration surface, the event types, and the
//! engine itself. Everything here is serializable so that events and config
//! files speak the same vocabulary as the in-memory pipeline.

use serde::{Deserialize, Serialize};

/// Resistance mechanism addressed by one signal detector
///
/// The set is open: a new mechanism is added by introducing a variant here
/// and implementing a detector for it. Fusion and stratification code never
/// matches on individual kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// DNA-repair capacity restored after platinum/PARPi pressure
    DnaRepairRestoration,
    /// Adverse CA-125 kinetics (rising velocity, shortening doubling time)
    Ca125Kinetics,
    /// High-risk gene alteration burden on the tumor panel
    HighRiskGene,
    /// Pathway activity shift following the current treatment line
    PostTreatmentPathway,
    /// Activation of a bypass/escape pathway
    PathwayEscape,
}

impl SignalKind {
    /// Stable slug used for config keys and provenance maps
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::DnaRepairRestoration => "dna_repair_restoration",
            SignalKind::Ca125Kinetics => "ca125_kinetics",
            SignalKind::HighRiskGene => "high_risk_gene",
            SignalKind::PostTreatmentPathway => "post_treatment_pathway",
            SignalKind::PathwayEscape => "pathway_escape",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stratified resistance risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// Clinical urgency derived from the risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Routine,
    Elevated,
    Critical,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Urgency::Routine => "routine",
            Urgency::Elevated => "elevated",
            Urgency::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Priority attached to a recommended action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    Low,
    Medium,
    High,
}

/// One recommended clinical action
///
/// The action vocabulary is injected config (per disease site), never
/// hard-coded inside decision logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    /// Action code, e.g. "ESCALATE_IMAGING"
    pub code: String,
    /// Ordering/priority of this action within the recommendation
    pub priority: ActionPriority,
    /// Human-readable justification
    pub rationale: String,
}

impl ActionItem {
    pub fn new(code: impl Into<String>, priority: ActionPriority, rationale: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            priority,
            rationale: rationale.into(),
        }
    }
}

/// Where the comparison baseline for the run came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    /// Pre-treatment values measured for this patient
    PatientSpecific,
    /// Population-level reference values
    PopulationAverage,
}
