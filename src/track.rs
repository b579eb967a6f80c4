/// Track assembly: drives the pipeline over a route and derives the summary.
///
/// Stages run in order over fully materialized data:
/// resample -> resolve elevation -> pace + physiology (one forward pass) ->
/// optional loop closure -> summary. Pacing and heart rate at point `i`
/// depend on point `i - 1`, so the forward pass is strictly sequential.
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SynthConfig;
use crate::elevation;
use crate::error::{Result, SynthError};
use crate::geodesic;
use crate::gpx_io;
use crate::model::{AnnotatedPoint, RoutePoint, TrackSummary};
use crate::pacing;
use crate::resample::resample;

/// How calories are estimated from the finished track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaloriePolicy {
    /// `weight_kg * kcal_per_kg_km * km`
    DistanceBased { kcal_per_kg_km: f64 },
    /// `met * weight_kg * hours`
    Met { met: f64 },
}

impl CaloriePolicy {
    pub fn estimate(&self, weight_kg: f64, distance_m: f64, duration_s: f64) -> f64 {
        match *self {
            CaloriePolicy::DistanceBased { kcal_per_kg_km } => weight_kg * kcal_per_kg_km * (distance_m / 1000.0),
            CaloriePolicy::Met { met } => met * weight_kg * (duration_s / 3600.0),
        }
    }
}

/// A synthesized track and its statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub points: Vec<AnnotatedPoint>,
    pub summary: TrackSummary,
}

/// Synthesize a timed, annotated track from `route`.
///
/// Fails with [`SynthError::InputEmpty`] for an empty route and with
/// [`SynthError::MalformedSample`] when a coordinate is not finite or out of
/// range. Zero-length segments are not errors.
pub fn synthesize<R: Rng>(route: &[RoutePoint], config: &SynthConfig, rng: &mut R) -> Result<Track> {
    if route.is_empty() {
        return Err(SynthError::InputEmpty);
    }
    if let Some(index) = route.iter().position(|p| !p.is_well_formed()) {
        return Err(SynthError::MalformedSample {
            index,
            reason: format!("{:?} is not a finite in-range coordinate", route[index]),
        });
    }
    config.validate()?;

    let tuning = &config.tuning;
    // the closing point counts against the output bound
    let budget = if config.closes_loop() {
        config.max_output_points - 1
    } else {
        config.max_output_points
    };
    let route = resample(route, tuning.resample_threshold.min(budget), budget);

    let explicit = if config.use_route_elevation {
        elevation::explicit_elevations(&route)
    } else {
        None
    };
    let elevations = elevation::resolve(
        route.len(),
        explicit.as_deref(),
        config.effective_elevation_strategy(),
        rng,
    );

    let target_speed = pacing::target_speed(config.activity, config.skill, config.speed_boost, tuning);
    debug!(
        "Synthesizing {} points, {} at {:.2} m/s",
        route.len(),
        config.activity,
        target_speed
    );

    let start_elevation = elevations[0];
    let mut points: Vec<AnnotatedPoint> = Vec::with_capacity(route.len() + 1);
    let mut elapsed_s = 0.0;

    for (i, route_point) in route.iter().enumerate() {
        let mut moved = false;
        if i > 0 {
            let segment = tuning.pacing.advance(
                route[i - 1].point(),
                elevations[i - 1],
                elapsed_s,
                route_point.point(),
                elevations[i],
                target_speed,
            );
            elapsed_s = segment.total_elapsed_s;
            moved = segment.distance_m > 0.0;
        }
        let time = next_timestamp(config.start_time, elapsed_s, points.last().map(|p| p.time), moved);
        points.push(annotate(
            config,
            route_point.latitude,
            route_point.longitude,
            elevations[i],
            time,
            elevations[i] - start_elevation,
            target_speed,
            rng,
        ));
    }

    if config.closes_loop() {
        let first = route[0];
        let last = route[route.len() - 1];
        let closing = tuning.pacing.advance(
            last.point(),
            elevations[elevations.len() - 1],
            elapsed_s,
            first.point(),
            start_elevation,
            target_speed,
        );
        if closing.distance_m > 0.0 {
            debug!("Closing loop with a {:.0} m segment", closing.distance_m);
            let time = next_timestamp(config.start_time, closing.total_elapsed_s, points.last().map(|p| p.time), true);
            points.push(annotate(
                config,
                first.latitude,
                first.longitude,
                start_elevation,
                time,
                0.0,
                target_speed,
                rng,
            ));
        }
    }

    let summary = summarize(&points, config.user.weight_kg, tuning.calorie_policy)?;
    info!(
        "Synthesized {} points: {:.2} km, {:.0} m ascent, {}",
        points.len(),
        summary.total_distance_m / 1000.0,
        summary.total_ascent_m,
        summary.duration_hms()
    );

    Ok(Track { points, summary })
}

#[allow(clippy::too_many_arguments)]
fn annotate<R: Rng>(
    config: &SynthConfig,
    latitude: f64,
    longitude: f64,
    elevation: f64,
    time: DateTime<Utc>,
    elevation_delta_m: f64,
    target_speed: f64,
    rng: &mut R,
) -> AnnotatedPoint {
    let tuning = &config.tuning;
    let heart_rate = tuning.heart_rate.sample(config.activity, &config.user, elevation_delta_m, rng);
    let cadence = tuning
        .emit_cadence
        .then(|| tuning.cadence.get(config.activity).sample(target_speed, config.user.height_cm, rng));

    AnnotatedPoint {
        latitude,
        longitude,
        elevation,
        time,
        heart_rate,
        cadence,
    }
}

/// `start + elapsed_s` at nanosecond precision. A point that moved away from
/// its predecessor is always strictly later than it.
fn next_timestamp(
    start: DateTime<Utc>,
    elapsed_s: f64,
    previous: Option<DateTime<Utc>>,
    moved: bool,
) -> DateTime<Utc> {
    let time = start + Duration::nanoseconds((elapsed_s * 1e9).round() as i64);
    match previous {
        Some(prev) if moved && time <= prev => prev + Duration::nanoseconds(1),
        Some(prev) if time < prev => prev,
        _ => time,
    }
}

/// Statistics of an annotated point sequence.
pub fn summarize(points: &[AnnotatedPoint], weight_kg: f64, calorie_policy: CaloriePolicy) -> Result<TrackSummary> {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(SynthError::InputEmpty),
    };

    let mut total_distance_m = 0.0;
    let mut total_ascent_m = 0.0;
    for w in points.windows(2) {
        total_distance_m += geodesic::distance(w[0].point(), w[1].point());
        let change = w[1].elevation - w[0].elevation;
        if change > 0.0 {
            total_ascent_m += change;
        }
    }

    let span = last.time - first.time;
    let duration_s = span
        .num_nanoseconds()
        .map_or_else(|| span.num_milliseconds() as f64 / 1000.0, |ns| ns as f64 / 1e9);
    let average_heart_rate = points.iter().map(|p| p.heart_rate as f64).sum::<f64>() / points.len() as f64;
    let cadences: Vec<f64> = points.iter().filter_map(|p| p.cadence).map(f64::from).collect();
    let average_cadence = (!cadences.is_empty()).then(|| cadences.iter().sum::<f64>() / cadences.len() as f64);

    Ok(TrackSummary {
        total_distance_m,
        total_ascent_m,
        duration_s,
        estimated_calories: calorie_policy.estimate(weight_kg, total_distance_m, duration_s),
        average_heart_rate,
        average_cadence,
    })
}

/// Serialize `points` to GPX and compute their summary.
///
/// All-or-nothing: on error no bytes are returned.
pub fn assemble(points: &[AnnotatedPoint], config: &SynthConfig) -> Result<(Vec<u8>, TrackSummary)> {
    let summary = summarize(points, config.user.weight_kg, config.tuning.calorie_policy)?;
    let bytes = gpx_io::write_track(points, &config.creator, config.track_name.as_deref())?;
    Ok((bytes, summary))
}
