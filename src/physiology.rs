/// Heart-rate and cadence synthesis.
///
/// Heart rate climbs with elevation gained since the start of the track,
/// plus a small integer jitter, and is always clamped into the band the user
/// profile allows. Cadence follows the flat-ground target speed.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::PerActivity;
use crate::model::{ActivityType, UserProfile};

/// Height used by the hiking cadence model when the profile has none.
pub const REFERENCE_HEIGHT_CM: f64 = 170.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateModel {
    /// Beats above resting heart rate on the flat.
    pub offset_bpm: PerActivity<f64>,
    /// Beats per meter climbed above the start elevation.
    pub elevation_gain_bpm_per_m: PerActivity<f64>,
    /// Inclusive integer jitter range.
    pub noise_bpm: (i32, i32),
    /// Lowest allowed value is `resting + margin_low_bpm`.
    pub margin_low_bpm: u32,
    /// Highest allowed value is `min(max_hr - margin_high_bpm, hard_cap_bpm)`.
    pub margin_high_bpm: u32,
    pub hard_cap_bpm: u32,
}

impl HeartRateModel {
    /// Allowed `(low, high)` heart rate for `user`, or `None` when the band is empty.
    pub fn band(&self, user: &UserProfile) -> Option<(u32, u32)> {
        let low = user.resting_heart_rate.saturating_add(self.margin_low_bpm);
        let high = user
            .max_heart_rate()
            .saturating_sub(self.margin_high_bpm)
            .min(self.hard_cap_bpm);
        (low <= high).then_some((low, high))
    }

    /// Heart rate at a point `elevation_delta_m` above (or below) the start.
    ///
    /// Callers validate the band first; an empty band collapses to its lower edge.
    pub fn sample<R: Rng>(
        &self,
        activity: ActivityType,
        user: &UserProfile,
        elevation_delta_m: f64,
        rng: &mut R,
    ) -> u32 {
        let (noise_min, noise_max) = self.noise_bpm;
        let noise = if noise_min < noise_max {
            rng.gen_range(noise_min..=noise_max)
        } else {
            noise_min
        };

        let raw = user.resting_heart_rate as f64
            + self.offset_bpm.get(activity)
            + self.elevation_gain_bpm_per_m.get(activity) * elevation_delta_m
            + noise as f64;

        let low = user.resting_heart_rate.saturating_add(self.margin_low_bpm);
        let (low, high) = self.band(user).unwrap_or((low, low));
        (raw.round().max(0.0) as u32).clamp(low, high)
    }
}

/// Linear cadence model: `base + speed * speed_coefficient - height * height_coefficient + jitter`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CadenceModel {
    pub base: f64,
    pub speed_coefficient: f64,
    /// Per centimeter of body height; only non-zero for hiking.
    pub height_coefficient: f64,
    /// Uniform jitter in `[-jitter, jitter]`.
    pub jitter: f64,
}

impl CadenceModel {
    pub fn sample<R: Rng>(&self, target_speed: f64, height_cm: Option<f64>, rng: &mut R) -> u32 {
        let height_term = if self.height_coefficient != 0.0 {
            height_cm.unwrap_or(REFERENCE_HEIGHT_CM) * self.height_coefficient
        } else {
            0.0
        };
        let jitter = if self.jitter > 0.0 {
            rng.gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };

        let cadence = self.base + target_speed * self.speed_coefficient - height_term + jitter;
        cadence.max(0.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn user() -> UserProfile {
        UserProfile { age: 43, weight_kg: 94.0, resting_heart_rate: 43, height_cm: Some(182.0) }
    }

    #[test]
    fn test_band() {
        let model = Preset::UltraFix.tuning().heart_rate;
        assert_eq!(model.band(&user()), Some((63, 177)));

        let old = UserProfile { age: 150, resting_heart_rate: 80, ..user() };
        assert_eq!(model.band(&old), None);

        let extreme = UserProfile { resting_heart_rate: u32::MAX, ..user() };
        assert_eq!(model.band(&extreme), None);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(model.sample(ActivityType::Hiking, &extreme, 0.0, &mut rng), u32::MAX);
    }

    #[test]
    fn test_heart_rate_stays_in_band() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let user = user();
        for preset in [Preset::UltraFix, Preset::Standard, Preset::Trail] {
            let model = preset.tuning().heart_rate;
            let (low, high) = model.band(&user).unwrap();
            for delta in [-2000.0, -50.0, 0.0, 30.0, 400.0, 5000.0] {
                for activity in [ActivityType::Hiking, ActivityType::Running, ActivityType::Cycling] {
                    let hr = model.sample(activity, &user, delta, &mut rng);
                    assert!(hr >= low && hr <= high, "{hr} outside [{low}, {high}]");
                }
            }
        }
    }

    #[test]
    fn test_heart_rate_rises_with_climb() {
        let model = HeartRateModel { noise_bpm: (0, 0), ..Preset::Standard.tuning().heart_rate };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let flat = model.sample(ActivityType::Hiking, &user(), 0.0, &mut rng);
        let climbed = model.sample(ActivityType::Hiking, &user(), 60.0, &mut rng);
        assert!(climbed > flat);
    }

    #[test]
    fn test_ultra_fix_formula_without_noise() {
        let model = HeartRateModel { noise_bpm: (0, 0), ..Preset::UltraFix.tuning().heart_rate };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        // 43 + 65 + 0.3 * 10
        assert_eq!(model.sample(ActivityType::Running, &user(), 10.0, &mut rng), 111);
    }

    #[test]
    fn test_cadence_non_negative() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let model = CadenceModel { base: 5.0, speed_coefficient: 0.0, height_coefficient: 1.0, jitter: 2.0 };
        assert_eq!(model.sample(1.0, Some(180.0), &mut rng), 0);
    }

    #[test]
    fn test_hiking_cadence_uses_height() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let model = CadenceModel { base: 95.0, speed_coefficient: 12.0, height_coefficient: 0.1, jitter: 0.0 };
        let tall = model.sample(1.3, Some(200.0), &mut rng);
        let short = model.sample(1.3, Some(150.0), &mut rng);
        assert!(tall < short);
        assert_eq!(model.sample(1.3, None, &mut rng), (95.0 + 1.3 * 12.0 - 17.0_f64).round() as u32);
    }

    #[test]
    fn test_cycling_cadence_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let model = Preset::Standard.tuning().cadence.get(ActivityType::Cycling);
        for _ in 0..100 {
            let cad = model.sample(6.5, None, &mut rng);
            assert!((70..=100).contains(&cad));
        }
    }
}
