//! Decision stages
//!
//! The four pure, total stages the orchestrator runs over the collected
//! signal set: probability fusion → risk stratification → confidence
//! computation → action determination. None of them can fail, none of them
//! perform I/O, and none of them inspect signal payloads — per-signal
//! detail stays with the detectors.

pub mod actions;
pub mod aggregator;
pub mod confidence;
pub mod risk;

pub use actions::ActionDeterminer;
pub use aggregator::SignalAggregator;
pub use confidence::ConfidenceComputer;
pub use risk::RiskStratifier;
