/// Elevation resolution: turns whatever elevation the route carried into a
/// complete per-point profile.
///
/// Supplied values are passed through, a missing suffix is padded with the
/// last known value, and a route without any elevation gets a profile from
/// the configured strategy.
use std::str::FromStr;

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::RoutePoint;

pub const DEFAULT_BASE_ELEVATION_M: f64 = 220.0;
pub const DEFAULT_MAX_STEP_M: f64 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElevationStrategy {
    /// Bounded random walk starting at `base_m`.
    SyntheticRolling { base_m: f64, max_step_m: f64 },
    /// Same elevation for every point.
    FlatDefault { elevation_m: f64 },
}

impl Default for ElevationStrategy {
    fn default() -> Self {
        ElevationStrategy::SyntheticRolling {
            base_m: DEFAULT_BASE_ELEVATION_M,
            max_step_m: DEFAULT_MAX_STEP_M,
        }
    }
}

impl FromStr for ElevationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "synthetic" | "synthetic_rolling" => Ok(ElevationStrategy::default()),
            "flat" | "flat_default" => Ok(ElevationStrategy::FlatDefault {
                elevation_m: DEFAULT_BASE_ELEVATION_M,
            }),
            other => Err(format!("unknown elevation strategy: {other}")),
        }
    }
}

impl ElevationStrategy {
    pub fn is_finite(&self) -> bool {
        match *self {
            ElevationStrategy::SyntheticRolling { base_m, max_step_m } => base_m.is_finite() && max_step_m.is_finite(),
            ElevationStrategy::FlatDefault { elevation_m } => elevation_m.is_finite(),
        }
    }

    /// Same strategy kind, started from a different elevation.
    pub fn with_base(self, base: f64) -> Self {
        match self {
            ElevationStrategy::SyntheticRolling { max_step_m, .. } => {
                ElevationStrategy::SyntheticRolling { base_m: base, max_step_m }
            }
            ElevationStrategy::FlatDefault { .. } => ElevationStrategy::FlatDefault { elevation_m: base },
        }
    }
}

/// Elevations supplied by the route itself, or `None` when no point has one.
///
/// Gaps take the previous known value (leading gaps the first known value).
/// The result ends at the last supplied sample, so a missing suffix is left
/// for [`resolve`] to pad.
pub fn explicit_elevations(points: &[RoutePoint]) -> Option<Vec<f64>> {
    let last_known = points.iter().rposition(|p| p.elevation.is_some())?;
    let first_value = points.iter().find_map(|p| p.elevation)?;

    let mut current = first_value;
    let elevations = points[..=last_known]
        .iter()
        .map(|p| {
            if let Some(ele) = p.elevation {
                current = ele;
            }
            current
        })
        .collect();

    Some(elevations)
}

/// Complete elevation sequence of exactly `len` values.
pub fn resolve<R: Rng>(
    len: usize,
    explicit: Option<&[f64]>,
    strategy: ElevationStrategy,
    rng: &mut R,
) -> Vec<f64> {
    match explicit {
        Some(values) if !values.is_empty() => {
            if values.len() < len {
                debug!("Padding {} missing elevation samples", len - values.len());
            }
            pad_tail(values, len)
        }
        _ => {
            if len > 0 {
                warn!("No elevation data for route, generating {:?} profile", strategy);
            }
            generate(len, strategy, rng)
        }
    }
}

fn pad_tail(values: &[f64], len: usize) -> Vec<f64> {
    let mut result: Vec<f64> = values.iter().take(len).copied().collect();
    let last = values[values.len() - 1];
    result.resize(len, last);
    result
}

fn generate<R: Rng>(len: usize, strategy: ElevationStrategy, rng: &mut R) -> Vec<f64> {
    match strategy {
        ElevationStrategy::FlatDefault { elevation_m } => vec![elevation_m; len],
        ElevationStrategy::SyntheticRolling { base_m, max_step_m } => {
            let step = max_step_m.abs();
            let mut elevations = Vec::with_capacity(len);
            let mut current = base_m;
            for i in 0..len {
                if i > 0 && step > 0.0 {
                    current += rng.gen_range(-step..=step);
                }
                elevations.push(current);
            }
            elevations
        }
    }
}
