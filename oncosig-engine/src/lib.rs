//! oncosig-engine — resistance signal-fusion decision engine
//!
//! Takes a pre-assembled patient/tumor context snapshot, fans out the
//! configured signal detectors in parallel, fuses their results into a
//! single resistance probability, stratifies risk, computes an overall
//! confidence with domain penalties/caps, derives urgency and recommended
//! actions, and publishes the outcome as events.
//!
//! Entry point: [`orchestrator::Orchestrator`].

pub mod detectors;
pub mod fusion;
pub mod orchestrator;
pub mod types;

pub use orchestrator::Orchestrator;
pub use types::{AggregatedPrediction, EngineError, PatientContext, SignalResult};
