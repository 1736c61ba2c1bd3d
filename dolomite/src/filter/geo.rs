//! Geospatial operators.
//!
//! Coordinates follow the GeoJSON convention of `[longitude, latitude]`;
//! legacy bare coordinate pairs and GeoJSON geometry documents are both
//! accepted on either side of an operator. Containment is ray-casting
//! point-in-polygon; spherical distances use the WGS84 equatorial radius.

use crate::common::document::Document;
use crate::common::Value;
use crate::errors::{DolomiteError, DolomiteResult, ErrorKind};

const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub longitude: f64,
    pub latitude: f64,
}

/// A polygon as rings of points; the first ring is the outer boundary.
type Polygon = Vec<Vec<Point>>;

/// `$geoWithin`: every point of the field value must fall inside the region.
pub fn geo_within(value: &Value, operand: &Value) -> DolomiteResult<bool> {
    let points = field_points(value)?;
    if points.is_empty() {
        return Ok(false);
    }
    let region = Region::parse(operand)?;
    Ok(points.iter().all(|p| region.contains(p)))
}

/// `$geoIntersects`: at least one point of the field value falls inside.
pub fn geo_intersects(value: &Value, operand: &Value) -> DolomiteResult<bool> {
    let points = field_points(value)?;
    let region = Region::parse(operand)?;
    Ok(points.iter().any(|p| region.contains(p)))
}

/// `$near`/`$nearSphere`: the field value is a single point within the
/// requested distance band around the operand point. Planar distance is in
/// coordinate units, spherical in meters.
pub fn near(
    value: &Value,
    operand: &Value,
    max_distance: Option<f64>,
    min_distance: Option<f64>,
    spherical: bool,
) -> DolomiteResult<bool> {
    let target = match value {
        Value::Array(_) | Value::Document(_) => match parse_point(value) {
            Ok(point) => point,
            Err(_) => return Ok(false),
        },
        _ => return Ok(false),
    };

    // Operand: a bare point, or {$geometry: point, $maxDistance, $minDistance}.
    let (center, max_distance, min_distance, spherical) = match operand.as_document() {
        Some(spec) if spec.contains_key("$geometry") => {
            let center = parse_point(spec.get("$geometry").unwrap_or(&Value::Null))?;
            let max = number_option(spec.get("$maxDistance"))?.or(max_distance);
            let min = number_option(spec.get("$minDistance"))?.or(min_distance);
            // A GeoJSON center always measures in spherical meters.
            (center, max, min, true)
        }
        _ => (parse_point(operand)?, max_distance, min_distance, spherical),
    };

    let distance = if spherical {
        haversine_meters(&center, &target)
    } else {
        planar_distance(&center, &target)
    };
    if let Some(max) = max_distance {
        if distance > max {
            return Ok(false);
        }
    }
    if let Some(min) = min_distance {
        if distance < min {
            return Ok(false);
        }
    }
    Ok(true)
}

fn number_option(value: Option<&Value>) -> DolomiteResult<Option<f64>> {
    match value {
        None => Ok(None),
        Some(v) => v.as_number().map(Some).ok_or_else(|| {
            DolomiteError::new("distance bound must be a number", ErrorKind::Client)
        }),
    }
}

/// The points a document field contributes: a single position, or every
/// vertex of a larger geometry.
fn field_points(value: &Value) -> DolomiteResult<Vec<Point>> {
    if let Ok(point) = parse_point(value) {
        return Ok(vec![point]);
    }
    match value {
        Value::Document(doc) => Ok(flatten_geometry(doc)?),
        Value::Array(items) => {
            let mut points = Vec::new();
            for item in items {
                points.extend(field_points(item)?);
            }
            Ok(points)
        }
        _ => Err(DolomiteError::new(
            "expected a geometry value",
            ErrorKind::Client,
        )),
    }
}

fn flatten_geometry(doc: &Document) -> DolomiteResult<Vec<Point>> {
    let coordinates = doc.get("coordinates").ok_or_else(|| {
        DolomiteError::new("GeoJSON geometry requires coordinates", ErrorKind::Client)
    })?;
    match doc.get("type").and_then(Value::as_string) {
        Some("Point") => Ok(vec![parse_position(coordinates)?]),
        Some("MultiPoint") | Some("LineString") => parse_ring(coordinates),
        Some("Polygon") | Some("MultiLineString") => {
            let rings = parse_rings(coordinates)?;
            Ok(rings.into_iter().flatten().collect())
        }
        Some("MultiPolygon") => {
            let mut points = Vec::new();
            let polygons = coordinates.as_array().ok_or_else(bad_coordinates)?;
            for polygon in polygons {
                for ring in parse_rings(polygon)? {
                    points.extend(ring);
                }
            }
            Ok(points)
        }
        _ => Err(DolomiteError::new(
            "unsupported GeoJSON geometry type",
            ErrorKind::Client,
        )),
    }
}

fn bad_coordinates() -> DolomiteError {
    DolomiteError::new("expected numeric coordinate pairs", ErrorKind::Client)
}

/// Parses a single position: a `[lng, lat]` array or a GeoJSON Point.
fn parse_point(value: &Value) -> DolomiteResult<Point> {
    match value {
        Value::Array(_) => parse_position(value),
        Value::Document(doc) => match doc.get("type").and_then(Value::as_string) {
            Some("Point") => {
                parse_position(doc.get("coordinates").unwrap_or(&Value::Null))
            }
            _ => Err(bad_coordinates()),
        },
        _ => Err(bad_coordinates()),
    }
}

fn parse_position(value: &Value) -> DolomiteResult<Point> {
    let pair = value.as_array().ok_or_else(bad_coordinates)?;
    if pair.len() < 2 {
        return Err(bad_coordinates());
    }
    let longitude = pair[0].as_number().ok_or_else(bad_coordinates)?;
    let latitude = pair[1].as_number().ok_or_else(bad_coordinates)?;
    Ok(Point {
        longitude,
        latitude,
    })
}

fn parse_ring(value: &Value) -> DolomiteResult<Vec<Point>> {
    let items = value.as_array().ok_or_else(bad_coordinates)?;
    items.iter().map(parse_position).collect()
}

fn parse_rings(value: &Value) -> DolomiteResult<Polygon> {
    let rings = value.as_array().ok_or_else(bad_coordinates)?;
    rings.iter().map(parse_ring).collect()
}

/// The region forms an operator document can describe.
enum Region {
    Polygons(Vec<Polygon>),
    Box { min: Point, max: Point },
    Circle { center: Point, radius: f64, spherical: bool },
}

impl Region {
    fn parse(operand: &Value) -> DolomiteResult<Region> {
        if let Some(spec) = operand.as_document() {
            if let Some(bounds) = spec.get("$box") {
                let corners = parse_ring(bounds)?;
                if corners.len() != 2 {
                    return Err(DolomiteError::new(
                        "$box requires two corner points",
                        ErrorKind::Client,
                    ));
                }
                return Ok(Region::Box {
                    min: Point {
                        longitude: corners[0].longitude.min(corners[1].longitude),
                        latitude: corners[0].latitude.min(corners[1].latitude),
                    },
                    max: Point {
                        longitude: corners[0].longitude.max(corners[1].longitude),
                        latitude: corners[0].latitude.max(corners[1].latitude),
                    },
                });
            }
            if let Some(ring) = spec.get("$polygon") {
                return Ok(Region::Polygons(vec![vec![parse_ring(ring)?]]));
            }
            if let Some(circle) = spec.get("$center") {
                return Region::parse_circle(circle, false);
            }
            if let Some(circle) = spec.get("$centerSphere") {
                return Region::parse_circle(circle, true);
            }
            if let Some(geometry) = spec.get("$geometry") {
                return Region::parse_geometry(geometry);
            }
            return Region::parse_geometry(operand);
        }
        // A bare array is a legacy polygon ring.
        Ok(Region::Polygons(vec![vec![parse_ring(operand)?]]))
    }

    fn parse_circle(spec: &Value, spherical: bool) -> DolomiteResult<Region> {
        let parts = spec.as_array().ok_or_else(|| {
            DolomiteError::new("$center requires [point, radius]", ErrorKind::Client)
        })?;
        if parts.len() != 2 {
            return Err(DolomiteError::new(
                "$center requires [point, radius]",
                ErrorKind::Client,
            ));
        }
        let center = parse_position(&parts[0])?;
        let radius = parts[1].as_number().ok_or_else(|| {
            DolomiteError::new("$center radius must be a number", ErrorKind::Client)
        })?;
        Ok(Region::Circle {
            center,
            radius,
            spherical,
        })
    }

    fn parse_geometry(value: &Value) -> DolomiteResult<Region> {
        let doc = value.as_document().ok_or_else(|| {
            DolomiteError::new("$geometry requires a GeoJSON document", ErrorKind::Client)
        })?;
        let coordinates = doc.get("coordinates").unwrap_or(&Value::Null);
        match doc.get("type").and_then(Value::as_string) {
            Some("Polygon") => Ok(Region::Polygons(vec![parse_rings(coordinates)?])),
            Some("MultiPolygon") => {
                let polygons = coordinates.as_array().ok_or_else(bad_coordinates)?;
                Ok(Region::Polygons(
                    polygons
                        .iter()
                        .map(parse_rings)
                        .collect::<DolomiteResult<_>>()?,
                ))
            }
            _ => Err(DolomiteError::new(
                "region geometry must be a Polygon or MultiPolygon",
                ErrorKind::Client,
            )),
        }
    }

    fn contains(&self, point: &Point) -> bool {
        match self {
            Region::Polygons(polygons) => polygons.iter().any(|polygon| {
                let mut inside = false;
                for (i, ring) in polygon.iter().enumerate() {
                    if point_in_ring(point, ring) {
                        // Inside the outer ring but inside a hole is outside.
                        inside = i == 0;
                    }
                }
                inside
            }),
            Region::Box { min, max } => {
                point.longitude >= min.longitude
                    && point.longitude <= max.longitude
                    && point.latitude >= min.latitude
                    && point.latitude <= max.latitude
            }
            Region::Circle {
                center,
                radius,
                spherical,
            } => {
                if *spherical {
                    // $centerSphere radius is in radians.
                    haversine_meters(center, point) / EARTH_RADIUS_METERS <= *radius
                } else {
                    planar_distance(center, point) <= *radius
                }
            }
        }
    }
}

/// Ray casting: count boundary crossings of a horizontal ray.
fn point_in_ring(point: &Point, ring: &[Point]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = &ring[i];
        let b = &ring[j];
        let crosses = (a.latitude > point.latitude) != (b.latitude > point.latitude);
        if crosses {
            let intersect = (b.longitude - a.longitude) * (point.latitude - a.latitude)
                / (b.latitude - a.latitude)
                + a.longitude;
            if point.longitude < intersect {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn planar_distance(a: &Point, b: &Point) -> f64 {
    let dx = a.longitude - b.longitude;
    let dy = a.latitude - b.latitude;
    (dx * dx + dy * dy).sqrt()
}

fn haversine_meters(a: &Point, b: &Point) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}
