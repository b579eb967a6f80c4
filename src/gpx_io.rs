/// GPX input and output.
///
/// Routes are read with the `gpx` crate. Files it rejects fall back to a
/// tolerant scan over the raw text that extracts `trkpt`/`rtept` coordinates
/// and any `<ele>` child, skipping samples whose coordinates do not parse.
///
/// Synthesized tracks are written with quick-xml because they carry the
/// Garmin TrackPointExtension block (heart rate, cadence), which the `gpx`
/// crate does not serialize.
use std::borrow::Cow;
use std::fs;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Result, SynthError};
use crate::model::{AnnotatedPoint, RoutePoint};

pub const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";
pub const TRACKPOINT_EXTENSION_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/TrackPointExtension/v1";
pub const TRACKPOINT_EXTENSION_PREFIX: &str = "gpxtpx";
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Route samples read from a GPX document.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteImport {
    pub points: Vec<RoutePoint>,
    /// Samples dropped because their coordinates were unusable.
    pub skipped: usize,
    /// Whether the tolerant text scan had to be used.
    pub tolerant: bool,
}

pub fn read_route_file(path: &Path) -> Result<RouteImport> {
    let content = fs::read(path)?;
    read_route(&content)
}

/// Extract route samples from a GPX document.
///
/// Track points are preferred, then route points, then waypoints.
/// Returns [`SynthError::InputEmpty`] when no usable sample is found.
pub fn read_route(content: &[u8]) -> Result<RouteImport> {
    let import = match gpx::read(BufReader::new(content)) {
        Ok(doc) => from_gpx(&doc),
        Err(e) => {
            warn!("Standard GPX parsing failed ({}), scanning coordinates manually", e);
            let text = String::from_utf8_lossy(content);
            let (points, skipped) = scan_route_points(&text);
            RouteImport { points, skipped, tolerant: true }
        }
    };

    if import.skipped > 0 {
        warn!("Skipped {} malformed samples", import.skipped);
    }
    if import.points.is_empty() {
        return Err(SynthError::InputEmpty);
    }
    debug!("Read {} route samples", import.points.len());
    Ok(import)
}

fn from_gpx(doc: &gpx::Gpx) -> RouteImport {
    let track_points: Vec<&gpx::Waypoint> = doc
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter())
        .collect();

    let waypoints = if !track_points.is_empty() {
        track_points
    } else if doc.routes.iter().any(|route| !route.points.is_empty()) {
        doc.routes.iter().flat_map(|route| route.points.iter()).collect()
    } else {
        doc.waypoints.iter().collect()
    };

    let candidates: Vec<RoutePoint> = waypoints.into_iter().map(RoutePoint::from).collect();
    let total = candidates.len();
    let points: Vec<RoutePoint> = candidates.into_iter().filter(RoutePoint::is_well_formed).collect();

    RouteImport { skipped: total - points.len(), points, tolerant: false }
}

/// Tolerant coordinate scan over raw GPX text.
///
/// Returns the samples found and the number of point elements skipped.
fn scan_route_points(content: &str) -> (Vec<RoutePoint>, usize) {
    let mut points = Vec::new();
    let mut skipped = 0;
    let mut rest = content;

    while let Some(start) = next_point_tag(rest) {
        let element = &rest[start..];
        let tag_end = element.find('>').map_or(element.len(), |i| i + 1);
        let tag = &element[..tag_end];

        let body = if tag.ends_with("/>") {
            ""
        } else {
            let after = &element[tag_end..];
            let close = ["</trkpt>", "</rtept>"]
                .iter()
                .filter_map(|closing| after.find(closing))
                .min();
            let end = close.or_else(|| next_point_tag(after)).unwrap_or(after.len());
            &after[..end]
        };

        match (extract_coordinate(tag, "lat", 90.0), extract_coordinate(tag, "lon", 180.0)) {
            (Some(latitude), Some(longitude)) => points.push(RoutePoint {
                latitude,
                longitude,
                elevation: extract_elevation(body),
            }),
            _ => {
                debug!("Unusable point element: {}", tag);
                skipped += 1;
            }
        }

        rest = &element[tag_end.max(1)..];
    }

    (points, skipped)
}

fn next_point_tag(text: &str) -> Option<usize> {
    ["<trkpt", "<rtept"].iter().filter_map(|tag| text.find(tag)).min()
}

fn extract_coordinate(tag: &str, name: &str, limit: f64) -> Option<f64> {
    let value = extract_attribute(tag, name)?.trim().parse::<f64>().ok()?;
    (value.is_finite() && value.abs() <= limit).then_some(value)
}

fn extract_attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut search_from = 0;
    while let Some(offset) = tag[search_from..].find(name) {
        let start = search_from + offset;
        let preceded_by_space = tag[..start].ends_with(|c: char| c.is_whitespace());
        let after = tag[start + name.len()..].trim_start();

        if preceded_by_space {
            if let Some(value) = after.strip_prefix('=') {
                let value = value.trim_start();
                let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
                let value = &value[1..];
                return value.find(quote).map(|end| &value[..end]);
            }
        }
        search_from = start + name.len();
    }
    None
}

fn extract_elevation(body: &str) -> Option<f64> {
    let start = body.find("<ele>")? + "<ele>".len();
    let end = body[start..].find("</ele>")?;
    let value = body[start..start + end].trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// Serialize a synthesized track as GPX 1.1 with TrackPointExtension data.
pub fn write_track(points: &[AnnotatedPoint], creator: &str, name: Option<&str>) -> Result<Vec<u8>> {
    if points.is_empty() {
        return Err(SynthError::InputEmpty);
    }

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let extension_ns = format!("xmlns:{TRACKPOINT_EXTENSION_PREFIX}");
    let root = BytesStart::new("gpx").with_attributes([
        ("version", "1.1"),
        ("creator", creator),
        ("xmlns", GPX_NAMESPACE),
        (extension_ns.as_str(), TRACKPOINT_EXTENSION_NAMESPACE),
    ]);
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new("trk")))?;
    if let Some(name) = name {
        write_text_element(&mut writer, "name", name)?;
    }
    writer.write_event(Event::Start(BytesStart::new("trkseg")))?;

    let extension = format!("{TRACKPOINT_EXTENSION_PREFIX}:TrackPointExtension");
    let hr_tag = format!("{TRACKPOINT_EXTENSION_PREFIX}:hr");
    let cad_tag = format!("{TRACKPOINT_EXTENSION_PREFIX}:cad");

    for point in points {
        let lat = point.latitude.to_string();
        let lon = point.longitude.to_string();
        let trkpt = BytesStart::new("trkpt").with_attributes([("lat", lat.as_str()), ("lon", lon.as_str())]);
        writer.write_event(Event::Start(trkpt))?;

        write_text_element(&mut writer, "ele", &format!("{:.1}", point.elevation))?;
        write_text_element(&mut writer, "time", &point.time.format(TIME_FORMAT).to_string())?;

        writer.write_event(Event::Start(BytesStart::new("extensions")))?;
        writer.write_event(Event::Start(BytesStart::new(extension.as_str())))?;
        write_text_element(&mut writer, &hr_tag, &point.heart_rate.to_string())?;
        if let Some(cadence) = point.cadence {
            write_text_element(&mut writer, &cad_tag, &cadence.to_string())?;
        }
        writer.write_event(Event::End(BytesEnd::new(extension.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new("extensions")))?;

        writer.write_event(Event::End(BytesEnd::new("trkpt")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("trkseg")))?;
    writer.write_event(Event::End(BytesEnd::new("trk")))?;
    writer.write_event(Event::End(BytesEnd::new("gpx")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Elevation,
    Time,
    HeartRate,
    Cadence,
}

#[derive(Debug, Default)]
struct PendingPoint {
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation: Option<f64>,
    time: Option<DateTime<Utc>>,
    heart_rate: Option<u32>,
    cadence: Option<u32>,
}

impl PendingPoint {
    fn finish(self, index: usize) -> Result<AnnotatedPoint> {
        let missing = |what: &str| SynthError::MalformedSample { index, reason: format!("missing {what}") };
        Ok(AnnotatedPoint {
            latitude: self.latitude.ok_or_else(|| missing("lat"))?,
            longitude: self.longitude.ok_or_else(|| missing("lon"))?,
            elevation: self.elevation.ok_or_else(|| missing("ele"))?,
            time: self.time.ok_or_else(|| missing("time"))?,
            heart_rate: self.heart_rate.ok_or_else(|| missing("hr"))?,
            cadence: self.cadence,
        })
    }
}

/// Parse a track written by [`write_track`] (or any GPX carrying
/// TrackPointExtension heart rate) back into annotated points.
///
/// Element matching ignores namespace prefixes.
pub fn read_track(content: &[u8]) -> Result<Vec<AnnotatedPoint>> {
    let mut reader = Reader::from_reader(content);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut points = Vec::new();
    let mut pending: Option<PendingPoint> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => match e.local_name().as_ref() {
                b"trkpt" => pending = Some(start_point(&e, points.len())?),
                name => {
                    if pending.is_some() {
                        field = field_for(name);
                    }
                }
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"trkpt" {
                    let point = start_point(&e, points.len())?;
                    points.push(point.finish(points.len())?);
                }
            }
            Event::Text(e) => {
                if let (Some(point), Some(current)) = (pending.as_mut(), field) {
                    let text = e.unescape()?;
                    record_field(point, current, &text, points.len())?;
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"trkpt" {
                    if let Some(point) = pending.take() {
                        points.push(point.finish(points.len())?);
                    }
                }
                field = None;
            }
            _ => {}
        }
        buf.clear();
    }

    if points.is_empty() {
        return Err(SynthError::InputEmpty);
    }
    Ok(points)
}

fn start_point(e: &BytesStart, index: usize) -> Result<PendingPoint> {
    let mut point = PendingPoint::default();
    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.local_name().as_ref() {
            b"lat" => point.latitude = Some(parse_number(&value, index, "lat")?),
            b"lon" => point.longitude = Some(parse_number(&value, index, "lon")?),
            _ => {}
        }
    }
    Ok(point)
}

fn field_for(local_name: &[u8]) -> Option<Field> {
    match local_name {
        b"ele" => Some(Field::Elevation),
        b"time" => Some(Field::Time),
        b"hr" => Some(Field::HeartRate),
        b"cad" => Some(Field::Cadence),
        _ => None,
    }
}

fn record_field(point: &mut PendingPoint, field: Field, text: &Cow<'_, str>, index: usize) -> Result<()> {
    match field {
        Field::Elevation => point.elevation = Some(parse_number(text, index, "ele")?),
        Field::Time => point.time = Some(DateTime::parse_from_rfc3339(text.trim())?.with_timezone(&Utc)),
        Field::HeartRate => point.heart_rate = Some(parse_count(text, index, "hr")?),
        Field::Cadence => point.cadence = Some(parse_count(text, index, "cad")?),
    }
    Ok(())
}

fn parse_number(text: &str, index: usize, what: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SynthError::MalformedSample { index, reason: format!("{what} {text:?} is not a number") })
}

fn parse_count(text: &str, index: usize, what: &str) -> Result<u32> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| SynthError::MalformedSample { index, reason: format!("{what} {text:?} is not a count") })
}
