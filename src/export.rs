/// Per-point CSV export of a synthesized track.
use std::io::Write;
use std::path::Path;

use csv::Writer;
use log::debug;

use crate::error::Result;
use crate::geodesic;
use crate::gpx_io::TIME_FORMAT;
use crate::model::AnnotatedPoint;

const HEADER: [&str; 9] = [
    "Index",
    "Latitude",
    "Longitude",
    "Elevation_m",
    "Time",
    "Elapsed_s",
    "Distance_m",
    "Heart_Rate_bpm",
    "Cadence",
];

pub fn save_points_to_csv(points: &[AnnotatedPoint], csv_path: &Path) -> Result<()> {
    let wtr = Writer::from_path(csv_path)?;
    write_points(points, wtr)?;
    debug!("Wrote {} points to {}", points.len(), csv_path.display());
    Ok(())
}

/// Write one row per point: position, time, elapsed seconds and cumulative
/// distance from the first point, heart rate and (possibly empty) cadence.
pub fn write_points<W: Write>(points: &[AnnotatedPoint], mut wtr: Writer<W>) -> Result<()> {
    wtr.write_record(HEADER)?;

    let coords: Vec<_> = points.iter().map(AnnotatedPoint::point).collect();
    let distances = geodesic::cumulative_distances(&coords);

    if let Some(first) = points.first() {
        for (i, (point, distance)) in points.iter().zip(&distances).enumerate() {
            let elapsed_s = (point.time - first.time).num_milliseconds() as f64 / 1000.0;
            wtr.write_record(&[
                i.to_string(),
                point.latitude.to_string(),
                point.longitude.to_string(),
                format!("{:.1}", point.elevation),
                point.time.format(TIME_FORMAT).to_string(),
                format!("{:.1}", elapsed_s),
                format!("{:.1}", distance),
                point.heart_rate.to_string(),
                point.cadence.map(|c| c.to_string()).unwrap_or_default(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::fs;

    fn points() -> Vec<AnnotatedPoint> {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        vec![
            AnnotatedPoint {
                latitude: 0.0,
                longitude: 0.0,
                elevation: 100.0,
                time: start,
                heart_rate: 100,
                cadence: Some(90),
            },
            AnnotatedPoint {
                latitude: 0.0,
                longitude: 0.001,
                elevation: 101.26,
                time: start + Duration::milliseconds(85_500),
                heart_rate: 104,
                cadence: None,
            },
        ]
    }

    #[test]
    fn test_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.csv");
        save_points_to_csv(&points(), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(lines[1], "0,0,0,100.0,2024-05-01T08:00:00Z,0.0,0.0,100,90");
        // 0.001 degrees of longitude on the equator is about 111.2 m
        assert_eq!(lines[2], "1,0,0.001,101.3,2024-05-01T08:01:25Z,85.5,111.2,104,");
    }

    #[test]
    fn test_csv_of_empty_track_has_header_only() {
        let mut buf = Vec::new();
        write_points(&[], Writer::from_writer(&mut buf)).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 1);
    }
}
