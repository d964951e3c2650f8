//! Probability fusion
//!
//! Fuses all signal results into one resistance probability via a
//! confidence-weighted mean. Weighting by confidence means a highly
//! confident negative signal suppresses the aggregate even when a
//! less-confident signal is strongly positive — uncertain positive
//! findings do not dominate.

use crate::types::SignalResult;
use oncosig_common::config::SiteProfile;
use tracing::debug;

/// Confidence-weighted probability fusion
///
/// `P = Σ(p_i · c_i · w_i) / Σ(c_i · w_i)` over signals with positive
/// effective weight, where `w_i` is the site profile's per-signal fusion
/// weight (default 1.0, reducing to the plain confidence-weighted mean).
pub struct SignalAggregator;

impl SignalAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Fuse the complete signal set into one probability in [0,1]
    ///
    /// Total: defined for every input. An empty list, or one where every
    /// signal carries zero confidence, fuses to 0.0.
    pub fn aggregate(&self, signals: &[SignalResult], profile: &SiteProfile) -> f64 {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for signal in signals {
            let effective = signal.confidence * profile.fusion_weight(signal.kind.as_str());
            if effective > 0.0 {
                weighted_sum += signal.probability * effective;
                weight_total += effective;
            }
        }

        if weight_total <= 0.0 {
            debug!("No signal carried usable confidence; aggregate is 0.0");
            return 0.0;
        }

        (weighted_sum / weight_total).clamp(0.0, 1.0)
    }
}

impl Default for SignalAggregator {
    fn default() -> Self {
        Self::new()
    }
}
