/// Route samples, synthesized track points and the profiles that shape them.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use geo::{point, Point};
use serde::{Deserialize, Serialize};

/// One input sample of the route, in traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

impl RoutePoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        RoutePoint { latitude, longitude, elevation: None }
    }

    pub fn with_elevation(latitude: f64, longitude: f64, elevation: f64) -> Self {
        RoutePoint { latitude, longitude, elevation: Some(elevation) }
    }

    /// Position as a geo point (x = lon, y = lat).
    pub fn point(&self) -> Point<f64> {
        point!(x: self.longitude, y: self.latitude)
    }

    pub fn is_well_formed(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.elevation.map_or(true, f64::is_finite)
    }
}

/// A non-finite elevation is dropped; the position is kept.
impl From<&gpx::Waypoint> for RoutePoint {
    fn from(waypoint: &gpx::Waypoint) -> Self {
        let p = waypoint.point();
        RoutePoint {
            latitude: p.y(),
            longitude: p.x(),
            elevation: waypoint.elevation.filter(|e| e.is_finite()),
        }
    }
}

/// A synthesized track point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub time: DateTime<Utc>,
    pub heart_rate: u32,
    pub cadence: Option<u32>,
}

impl AnnotatedPoint {
    pub fn point(&self) -> Point<f64> {
        point!(x: self.longitude, y: self.latitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    Hiking,
    Running,
    Cycling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathType {
    Loop,
    OneWay,
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hiking" | "hike" => Ok(ActivityType::Hiking),
            "running" | "run" => Ok(ActivityType::Running),
            "cycling" | "ride" | "bike" => Ok(ActivityType::Cycling),
            other => Err(format!("unknown activity type: {other}")),
        }
    }
}

impl FromStr for SkillLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginner" => Ok(SkillLevel::Beginner),
            "intermediate" => Ok(SkillLevel::Intermediate),
            "advanced" => Ok(SkillLevel::Advanced),
            other => Err(format!("unknown skill level: {other}")),
        }
    }
}

impl FromStr for PathType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "loop" => Ok(PathType::Loop),
            "oneway" | "pointtopoint" => Ok(PathType::OneWay),
            other => Err(format!("unknown path type: {other}")),
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivityType::Hiking => "hiking",
            ActivityType::Running => "running",
            ActivityType::Cycling => "cycling",
        };
        f.write_str(name)
    }
}

/// Attributes of the simulated athlete.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: u32,
    pub weight_kg: f64,
    pub resting_heart_rate: u32,
    pub height_cm: Option<f64>,
}

impl Default for UserProfile {
    fn default() -> Self {
        UserProfile {
            age: 43,
            weight_kg: 94.0,
            resting_heart_rate: 43,
            height_cm: None,
        }
    }
}

impl UserProfile {
    pub fn max_heart_rate(&self) -> u32 {
        220u32.saturating_sub(self.age)
    }

    pub fn heart_rate_reserve(&self) -> u32 {
        self.max_heart_rate().saturating_sub(self.resting_heart_rate)
    }
}

/// Aggregate statistics of a synthesized track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub total_distance_m: f64,
    pub total_ascent_m: f64,
    pub duration_s: f64,
    pub estimated_calories: f64,
    pub average_heart_rate: f64,
    pub average_cadence: Option<f64>,
}

impl TrackSummary {
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.duration_s * 1000.0).round() as i64)
    }

    /// `H:MM:SS`, the way activity summaries show elapsed time.
    pub fn duration_hms(&self) -> String {
        let total = self.duration_s.round() as i64;
        format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heart_rate_limits() {
        let user = UserProfile { age: 43, weight_kg: 94.0, resting_heart_rate: 43, height_cm: None };
        assert_eq!(user.max_heart_rate(), 177);
        assert_eq!(user.heart_rate_reserve(), 134);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("Hiking".parse::<ActivityType>().unwrap(), ActivityType::Hiking);
        assert_eq!("ride".parse::<ActivityType>().unwrap(), ActivityType::Cycling);
        assert_eq!("one-way".parse::<PathType>().unwrap(), PathType::OneWay);
        assert_eq!("ADVANCED".parse::<SkillLevel>().unwrap(), SkillLevel::Advanced);
        assert!("swimming".parse::<ActivityType>().is_err());
    }

    #[test]
    fn test_route_point_validation() {
        assert!(RoutePoint::new(47.5, 19.0).is_well_formed());
        assert!(!RoutePoint::new(f64::NAN, 19.0).is_well_formed());
        assert!(!RoutePoint::new(91.0, 19.0).is_well_formed());
        assert!(!RoutePoint::with_elevation(47.5, 19.0, f64::INFINITY).is_well_formed());
    }

    #[test]
    fn test_duration_formatting() {
        let summary = TrackSummary {
            total_distance_m: 0.0,
            total_ascent_m: 0.0,
            duration_s: 3725.4,
            estimated_calories: 0.0,
            average_heart_rate: 0.0,
            average_cadence: None,
        };
        assert_eq!(summary.duration_hms(), "1:02:05");
        assert_eq!(summary.duration().num_seconds(), 3725);
    }
}
