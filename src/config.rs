/// Invocation configuration and engine tuning presets.
///
/// Every historical variant of the synthesizer (different speed tables,
/// optional cadence, optional loop closure, different resampling thresholds)
/// is a named [`Preset`] of one [`Tuning`] struct rather than a separate code
/// path. Tuning files are JSON overlays: fields they leave out keep the
/// value of the preset they are applied over.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::elevation::ElevationStrategy;
use crate::error::{Result, SynthError};
use crate::model::{ActivityType, PathType, SkillLevel, UserProfile};
use crate::pacing::PacingModel;
use crate::physiology::{CadenceModel, HeartRateModel};
use crate::track::CaloriePolicy;

pub const MIN_SPEED_BOOST: f64 = 0.5;
pub const MAX_SPEED_BOOST: f64 = 2.0;
pub const DEFAULT_MAX_OUTPUT_POINTS: usize = 500;
pub const DEFAULT_CREATOR: &str = "gpx-synth";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerActivity<T> {
    pub hiking: T,
    pub running: T,
    pub cycling: T,
}

impl<T: Copy> PerActivity<T> {
    pub fn get(&self, activity: ActivityType) -> T {
        match activity {
            ActivityType::Hiking => self.hiking,
            ActivityType::Running => self.running,
            ActivityType::Cycling => self.cycling,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerSkill<T> {
    pub beginner: T,
    pub intermediate: T,
    pub advanced: T,
}

impl<T: Copy> PerSkill<T> {
    pub fn get(&self, skill: SkillLevel) -> T {
        match skill {
            SkillLevel::Beginner => self.beginner,
            SkillLevel::Intermediate => self.intermediate,
            SkillLevel::Advanced => self.advanced,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Flat-ground base speed per activity, m/s.
    pub speed_table: PerActivity<f64>,
    pub skill_multipliers: PerSkill<f64>,
    pub pacing: PacingModel,
    pub heart_rate: HeartRateModel,
    pub cadence: PerActivity<CadenceModel>,
    pub resample_threshold: usize,
    pub elevation_strategy: ElevationStrategy,
    pub emit_cadence: bool,
    pub close_loop: bool,
    pub calorie_policy: CaloriePolicy,
}

impl Default for Tuning {
    fn default() -> Self {
        Preset::Standard.tuning()
    }
}

impl Tuning {
    /// Load a tuning file; fields it leaves out come from the standard preset.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        Self::from_json_file_over(path, &Tuning::default())
    }

    /// Load a tuning file as an overlay on `base`. Nested objects merge
    /// field by field; arrays and scalars replace.
    pub fn from_json_file_over(path: &Path, base: &Tuning) -> Result<Self> {
        let file = File::open(path)?;
        let overrides: Value = serde_json::from_reader(BufReader::new(file))?;
        let mut merged = serde_json::to_value(base)?;
        merge_json(&mut merged, overrides);
        Ok(serde_json::from_value(merged)?)
    }
}

fn merge_json(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                merge_json(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, value) => *base = value,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Constants of the first Garmin-fix generator: hiking/running/cycling
    /// table, heart rate only, flat 220 m fallback elevation.
    UltraFix,
    Standard,
    /// Steeper pacing penalty and wider heart-rate jitter for mountain routes.
    Trail,
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "ultra-fix" | "ultrafix" => Ok(Preset::UltraFix),
            "standard" => Ok(Preset::Standard),
            "trail" => Ok(Preset::Trail),
            other => Err(format!("unknown preset: {other}")),
        }
    }
}

impl Preset {
    pub fn tuning(self) -> Tuning {
        let skill_multipliers = PerSkill { beginner: 0.77, intermediate: 1.0, advanced: 1.25 };
        let cadence = PerActivity {
            hiking: CadenceModel { base: 95.0, speed_coefficient: 12.0, height_coefficient: 0.1, jitter: 3.0 },
            running: CadenceModel { base: 150.0, speed_coefficient: 7.0, height_coefficient: 0.0, jitter: 3.0 },
            cycling: CadenceModel { base: 70.0, speed_coefficient: 2.0, height_coefficient: 0.0, jitter: 4.0 },
        };

        match self {
            Preset::UltraFix => Tuning {
                speed_table: PerActivity { hiking: 1.3, running: 3.2, cycling: 6.5 },
                skill_multipliers,
                pacing: PacingModel { steepness_k: 2.5, downhill_bias: 0.02, speed_floor_mps: 0.1 },
                heart_rate: HeartRateModel {
                    offset_bpm: PerActivity { hiking: 65.0, running: 65.0, cycling: 65.0 },
                    elevation_gain_bpm_per_m: PerActivity { hiking: 0.3, running: 0.3, cycling: 0.3 },
                    noise_bpm: (-2, 3),
                    margin_low_bpm: 20,
                    margin_high_bpm: 0,
                    hard_cap_bpm: 185,
                },
                cadence,
                resample_threshold: 500,
                elevation_strategy: ElevationStrategy::FlatDefault { elevation_m: 220.0 },
                emit_cadence: false,
                close_loop: false,
                calorie_policy: CaloriePolicy::DistanceBased { kcal_per_kg_km: 0.75 },
            },
            Preset::Standard => Tuning {
                speed_table: PerActivity { hiking: 1.3, running: 3.2, cycling: 6.5 },
                skill_multipliers,
                pacing: PacingModel::default(),
                heart_rate: HeartRateModel {
                    offset_bpm: PerActivity { hiking: 55.0, running: 75.0, cycling: 50.0 },
                    elevation_gain_bpm_per_m: PerActivity { hiking: 0.25, running: 0.2, cycling: 0.35 },
                    noise_bpm: (-3, 3),
                    margin_low_bpm: 10,
                    margin_high_bpm: 5,
                    hard_cap_bpm: 195,
                },
                cadence,
                resample_threshold: 500,
                elevation_strategy: ElevationStrategy::default(),
                emit_cadence: true,
                close_loop: true,
                calorie_policy: CaloriePolicy::DistanceBased { kcal_per_kg_km: 0.75 },
            },
            Preset::Trail => Tuning {
                speed_table: PerActivity { hiking: 1.2, running: 2.8, cycling: 5.5 },
                skill_multipliers,
                pacing: PacingModel { steepness_k: 3.5, downhill_bias: 0.05, speed_floor_mps: 0.2 },
                heart_rate: HeartRateModel {
                    offset_bpm: PerActivity { hiking: 60.0, running: 80.0, cycling: 55.0 },
                    elevation_gain_bpm_per_m: PerActivity { hiking: 0.2, running: 0.15, cycling: 0.3 },
                    noise_bpm: (-5, 5),
                    margin_low_bpm: 15,
                    margin_high_bpm: 10,
                    hard_cap_bpm: 190,
                },
                cadence,
                resample_threshold: 500,
                elevation_strategy: ElevationStrategy::SyntheticRolling { base_m: 600.0, max_step_m: 1.3 },
                emit_cadence: true,
                close_loop: true,
                calorie_policy: CaloriePolicy::Met { met: 7.5 },
            },
        }
    }
}

/// Everything one synthesis run needs; nothing is carried between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthConfig {
    pub activity: ActivityType,
    pub skill: SkillLevel,
    pub path_type: PathType,
    pub speed_boost: f64,
    pub start_time: DateTime<Utc>,
    pub user: UserProfile,
    /// Overrides the tuning's elevation strategy when set.
    pub elevation_strategy: Option<ElevationStrategy>,
    /// When false, elevations in the route are ignored and the strategy
    /// generates the whole profile.
    pub use_route_elevation: bool,
    pub max_output_points: usize,
    pub tuning: Tuning,
    pub track_name: Option<String>,
    pub creator: String,
}

impl SynthConfig {
    pub fn new(activity: ActivityType, start_time: DateTime<Utc>) -> Self {
        SynthConfig {
            activity,
            skill: SkillLevel::Intermediate,
            path_type: PathType::OneWay,
            speed_boost: 1.0,
            start_time,
            user: UserProfile::default(),
            elevation_strategy: None,
            use_route_elevation: true,
            max_output_points: DEFAULT_MAX_OUTPUT_POINTS,
            tuning: Tuning::default(),
            track_name: None,
            creator: DEFAULT_CREATOR.to_string(),
        }
    }

    pub fn effective_elevation_strategy(&self) -> ElevationStrategy {
        self.elevation_strategy.unwrap_or(self.tuning.elevation_strategy)
    }

    /// Whether a closing segment back to the start is paced.
    pub fn closes_loop(&self) -> bool {
        self.path_type == PathType::Loop && self.tuning.close_loop
    }

    /// Reject configurations that would break the engine's invariants.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SPEED_BOOST..=MAX_SPEED_BOOST).contains(&self.speed_boost) {
            return Err(invalid(format!(
                "speed boost {} outside {MIN_SPEED_BOOST}..={MAX_SPEED_BOOST}",
                self.speed_boost
            )));
        }
        if !(self.user.weight_kg.is_finite() && self.user.weight_kg > 0.0) {
            return Err(invalid(format!("weight must be positive, got {}", self.user.weight_kg)));
        }
        if self.user.age == 0 || self.user.age >= 220 {
            return Err(invalid(format!("age {} out of range", self.user.age)));
        }
        if let Some(height) = self.user.height_cm {
            if !(height.is_finite() && height > 0.0) {
                return Err(invalid(format!("height must be positive, got {height}")));
            }
        }
        if self.max_output_points < 2 {
            return Err(invalid("max output points must be at least 2".to_string()));
        }
        if self.closes_loop() && self.max_output_points < 3 {
            return Err(invalid("a closed loop needs at least 3 output points".to_string()));
        }
        if !self.effective_elevation_strategy().is_finite() {
            return Err(invalid(format!(
                "elevation strategy {:?} has non-finite values",
                self.effective_elevation_strategy()
            )));
        }
        if self.tuning.resample_threshold > self.max_output_points {
            return Err(invalid(format!(
                "resample threshold {} exceeds max output points {}",
                self.tuning.resample_threshold, self.max_output_points
            )));
        }
        self.validate_tuning()?;

        if self.tuning.heart_rate.band(&self.user).is_none() {
            return Err(invalid(format!(
                "empty heart-rate band for resting {} bpm, max {} bpm",
                self.user.resting_heart_rate,
                self.user.max_heart_rate()
            )));
        }
        Ok(())
    }

    fn validate_tuning(&self) -> Result<()> {
        let tuning = &self.tuning;
        let speeds = [tuning.speed_table.hiking, tuning.speed_table.running, tuning.speed_table.cycling];
        let multipliers = [
            tuning.skill_multipliers.beginner,
            tuning.skill_multipliers.intermediate,
            tuning.skill_multipliers.advanced,
        ];
        if speeds.iter().chain(multipliers.iter()).any(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(invalid("speeds and skill multipliers must be positive".to_string()));
        }
        let pacing = &tuning.pacing;
        if !(pacing.speed_floor_mps.is_finite() && pacing.speed_floor_mps > 0.0) {
            return Err(invalid("speed floor must be positive".to_string()));
        }
        if !(pacing.steepness_k.is_finite() && pacing.steepness_k >= 0.0) || !pacing.downhill_bias.is_finite() {
            return Err(invalid("pacing constants must be finite, k non-negative".to_string()));
        }
        let (noise_min, noise_max) = tuning.heart_rate.noise_bpm;
        if noise_min > noise_max {
            return Err(invalid(format!("heart-rate noise range {noise_min}..={noise_max} is empty")));
        }
        Ok(())
    }
}

fn invalid(message: String) -> SynthError {
    SynthError::InvalidParameter(message)
}
