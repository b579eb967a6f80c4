/// Slope-aware pacing (Tobler-style hiking function) and time integration
/// along the route.
///
/// The speed multiplier `exp(-k * |slope + bias|)` peaks on a slight
/// downhill (`slope = -bias`) and falls off on both steep climbs and steep
/// descents. A speed floor keeps near-vertical segments finite.
use geo::Point;
use serde::{Deserialize, Serialize};

use crate::config::Tuning;
use crate::geodesic;
use crate::model::{ActivityType, SkillLevel};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacingModel {
    /// Steepness sensitivity `k`.
    pub steepness_k: f64,
    /// Slope offset that moves the fastest gradient slightly downhill.
    pub downhill_bias: f64,
    pub speed_floor_mps: f64,
}

impl Default for PacingModel {
    fn default() -> Self {
        PacingModel {
            steepness_k: 3.0,
            downhill_bias: 0.03,
            speed_floor_mps: 0.3,
        }
    }
}

/// One paced step between consecutive points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub distance_m: f64,
    pub slope: f64,
    pub elapsed_s: f64,
    /// Elapsed time since the start of the track at the end of this step.
    pub total_elapsed_s: f64,
}

impl PacingModel {
    pub fn speed_modifier(&self, slope: f64) -> f64 {
        (-self.steepness_k * (slope + self.downhill_bias).abs()).exp()
    }

    pub fn effective_speed(&self, target_speed: f64, slope: f64) -> f64 {
        (target_speed * self.speed_modifier(slope)).max(self.speed_floor_mps)
    }

    /// Pace the step from `prev` to `curr`, starting `prev_elapsed_s` seconds in.
    ///
    /// Coincident points give a zero-length step with slope 0 and no elapsed time.
    pub fn advance(
        &self,
        prev: Point<f64>,
        prev_elevation: f64,
        prev_elapsed_s: f64,
        curr: Point<f64>,
        curr_elevation: f64,
        target_speed: f64,
    ) -> Segment {
        let distance_m = geodesic::distance(prev, curr);
        let slope = if distance_m > 0.0 {
            (curr_elevation - prev_elevation) / distance_m
        } else {
            0.0
        };

        let elapsed_s = distance_m / self.effective_speed(target_speed, slope);

        Segment {
            distance_m,
            slope,
            elapsed_s,
            total_elapsed_s: prev_elapsed_s + elapsed_s,
        }
    }
}

/// Flat-ground target speed in m/s for the given activity, skill and boost.
pub fn target_speed(activity: ActivityType, skill: SkillLevel, speed_boost: f64, tuning: &Tuning) -> f64 {
    tuning.speed_table.get(activity) * tuning.skill_multipliers.get(skill) * speed_boost
}

/// Cumulative elapsed seconds at each point of a path, starting at 0.
pub fn integrate(
    model: &PacingModel,
    points: &[Point<f64>],
    elevations: &[f64],
    target_speed: f64,
) -> Vec<f64> {
    let mut elapsed = Vec::with_capacity(points.len());
    if points.is_empty() {
        return elapsed;
    }
    elapsed.push(0.0);

    for i in 1..points.len().min(elevations.len()) {
        let segment = model.advance(
            points[i - 1],
            elevations[i - 1],
            elapsed[i - 1],
            points[i],
            elevations[i],
            target_speed,
        );
        elapsed.push(segment.total_elapsed_s);
    }

    elapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;
    use geo::point;

    #[test]
    fn test_fastest_slope_is_slightly_downhill() {
        let model = PacingModel::default();
        let at_bias = model.speed_modifier(-model.downhill_bias);
        assert!((at_bias - 1.0).abs() < 1e-12);
        assert!(model.speed_modifier(0.0) < at_bias);
        assert!(model.speed_modifier(0.15) < model.speed_modifier(0.05));
        assert!(model.speed_modifier(-0.30) < model.speed_modifier(-0.10));
    }

    #[test]
    fn test_speed_floor() {
        let model = PacingModel { steepness_k: 3.5, downhill_bias: 0.05, speed_floor_mps: 0.2 };
        // near-vertical segment
        assert_eq!(model.effective_speed(1.3, 50.0), 0.2);
    }

    #[test]
    fn test_flat_segment_uses_modified_target() {
        let model = PacingModel { steepness_k: 2.5, downhill_bias: 0.02, speed_floor_mps: 0.1 };
        let a = point!(x: 0.0, y: 0.0);
        let b = point!(x: 0.001, y: 0.0);
        let seg = model.advance(a, 100.0, 10.0, b, 100.0, 1.3);

        let expected_speed = 1.3 * (-2.5f64 * 0.02).exp();
        assert!((seg.elapsed_s - seg.distance_m / expected_speed).abs() < 1e-9);
        assert!((seg.total_elapsed_s - (10.0 + seg.elapsed_s)).abs() < 1e-9);
    }

    #[test]
    fn test_zero_distance_segment() {
        let model = PacingModel::default();
        let a = point!(x: 19.0, y: 47.0);
        let seg = model.advance(a, 100.0, 42.0, a, 130.0, 1.3);
        assert_eq!(seg.distance_m, 0.0);
        assert_eq!(seg.slope, 0.0);
        assert_eq!(seg.elapsed_s, 0.0);
        assert_eq!(seg.total_elapsed_s, 42.0);
    }

    #[test]
    fn test_climb_is_slower_than_flat() {
        let model = PacingModel::default();
        let a = point!(x: 0.0, y: 0.0);
        let b = point!(x: 0.001, y: 0.0);
        let flat = model.advance(a, 100.0, 0.0, b, 100.0, 3.2);
        let climb = model.advance(a, 100.0, 0.0, b, 115.0, 3.2);
        assert!(climb.elapsed_s > flat.elapsed_s);
    }

    #[test]
    fn test_integrate_monotonic() {
        let model = PacingModel::default();
        let points = vec![
            point!(x: 0.0, y: 0.0),
            point!(x: 0.001, y: 0.0),
            point!(x: 0.001, y: 0.0),
            point!(x: 0.002, y: 0.001),
        ];
        let elevations = vec![100.0, 120.0, 120.0, 90.0];
        let elapsed = integrate(&model, &points, &elevations, 1.3);
        assert_eq!(elapsed.len(), 4);
        assert_eq!(elapsed[0], 0.0);
        assert!(elapsed[1] > 0.0);
        assert_eq!(elapsed[1], elapsed[2]);
        assert!(elapsed[3] > elapsed[2]);
    }

    #[test]
    fn test_target_speed_from_tables() {
        let tuning = Preset::UltraFix.tuning();
        let speed = target_speed(ActivityType::Hiking, SkillLevel::Intermediate, 1.2, &tuning);
        assert!((speed - 1.3 * 1.2).abs() < 1e-9);

        let beginner = target_speed(ActivityType::Cycling, SkillLevel::Beginner, 1.0, &tuning);
        let advanced = target_speed(ActivityType::Cycling, SkillLevel::Advanced, 1.0, &tuning);
        assert!(beginner < advanced);
    }
}
