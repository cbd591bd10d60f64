//! Bandwidth estimation - translates link quality into a relative throughput score

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{MeshPlanError, Result};

/// One linear piece `slope * x + intercept`, valid up to and including `upper`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthSegment {
    pub upper: f64,
    pub slope: f64,
    pub intercept: f64,
}

impl BandwidthSegment {
    pub const fn new(upper: f64, slope: f64, intercept: f64) -> Self {
        Self {
            upper,
            slope,
            intercept,
        }
    }

    fn value_at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Controller SNR values span 0..=100, which maps onto 0..=46 dB
const DEFAULT_SCALE: f64 = 0.46;
const DEFAULT_SATURATION: f64 = 56.0;
const DEFAULT_SEGMENTS: [BandwidthSegment; 4] = [
    BandwidthSegment::new(10.0, 1.0, 0.0),
    BandwidthSegment::new(20.0, 2.0, -10.0),
    BandwidthSegment::new(25.0, 3.0, -30.0),
    BandwidthSegment::new(30.0, 2.0, -5.0),
];

/// Piecewise-linear policy table mapping SNR to expected throughput.
///
/// The input is multiplied by `scale` first. Scaled values at or below zero
/// yield zero, values above the last breakpoint yield `saturation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthTable {
    pub scale: f64,
    pub segments: Vec<BandwidthSegment>,
    pub saturation: f64,
}

impl Default for BandwidthTable {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            segments: DEFAULT_SEGMENTS.to_vec(),
            saturation: DEFAULT_SATURATION,
        }
    }
}

impl BandwidthTable {
    pub fn estimate(&self, snr: f64) -> f64 {
        piecewise(snr * self.scale, &self.segments, self.saturation)
    }

    /// Largest score the table can produce
    pub fn max_estimate(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| s.value_at(s.upper))
            .fold(self.saturation, f64::max)
    }

    /// Reject tables that are not finite, not ordered or not non-decreasing
    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(MeshPlanError::Config(format!(
                "bandwidth scale must be positive, got {}",
                self.scale
            )));
        }

        let mut lower = 0.0_f64;
        let mut previous_end = 0.0_f64;
        for (i, segment) in self.segments.iter().enumerate() {
            let finite = segment.upper.is_finite()
                && segment.slope.is_finite()
                && segment.intercept.is_finite();
            if !finite || segment.upper <= lower {
                return Err(MeshPlanError::Config(format!(
                    "bandwidth segment {} must end above {}",
                    i, lower
                )));
            }
            if segment.slope < 0.0 || segment.value_at(lower) < previous_end - f64::EPSILON {
                return Err(MeshPlanError::Config(format!(
                    "bandwidth segment {} decreases the estimate",
                    i
                )));
            }
            previous_end = segment.value_at(segment.upper);
            lower = segment.upper;
        }

        if !self.saturation.is_finite() || self.saturation < previous_end {
            return Err(MeshPlanError::Config(format!(
                "bandwidth saturation {} is below the last segment value {}",
                self.saturation, previous_end
            )));
        }

        Ok(())
    }
}

fn piecewise(x: f64, segments: &[BandwidthSegment], saturation: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    segments
        .iter()
        .find(|s| x <= s.upper)
        .map_or(saturation, |s| s.value_at(x))
}

/// Expected-throughput score for `snr` under the default policy table
pub fn estimate_bandwidth(snr: f64) -> f64 {
    piecewise(snr * DEFAULT_SCALE, &DEFAULT_SEGMENTS, DEFAULT_SATURATION)
}
