/// Great-circle distances on a spherical Earth.
use geo::Point;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two points (x = lon, y = lat).
pub fn distance(a: Point<f64>, b: Point<f64>) -> f64 {
    let phi1 = a.y().to_radians();
    let phi2 = b.y().to_radians();
    let d_phi = (b.y() - a.y()).to_radians();
    let d_lambda = (b.x() - a.x()).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Running distance along the path, starting at 0 for the first point.
pub fn cumulative_distances(points: &[Point<f64>]) -> Vec<f64> {
    let mut distances = Vec::with_capacity(points.len());
    if points.is_empty() {
        return distances;
    }
    distances.push(0.0);

    for i in 1..points.len() {
        let dist = distance(points[i - 1], points[i]);
        distances.push(distances[i - 1] + dist);
    }

    distances
}
