//! Coordinate reference system detection and normalization to WGS84.
//!
//! Shapefiles describe their CRS in a `.prj` sidecar holding WKT. Geographic
//! WGS84 definitions are recognized directly and passed through untouched;
//! anything else is converted to a PROJ string and reprojected with
//! `proj4rs`, which works in radians for geographic systems.

use geo::Point;
use proj4rs::proj::Proj;
use std::fmt;
use thiserror::Error;

const WGS84_PROJ: &str = "+proj=longlat +datum=WGS84 +no_defs";

// ESRI's spherical Web Mercator; `@null` keeps the sphere from being
// datum-shifted onto the WGS84 ellipsoid.
const WEB_MERCATOR_PROJ: &str = "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 \
    +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +no_defs";

/// Helmert parameters for datums that ESRI WKT names without a `TOWGS84`
/// clause. Keys are normalized with [`datum_key`].
const DATUM_SHIFTS: &[(&str, &str)] = &[
    ("OSGB1936", "446.448,-125.157,542.06,0.15,0.247,0.842,-20.489"),
    ("ORDNANCESURVEYOFGREATBRITAIN1936", "446.448,-125.157,542.06,0.15,0.247,0.842,-20.489"),
    ("TM65", "482.53,-130.596,564.557,-1.042,-0.214,-0.631,8.15"),
    ("IRELAND1965", "482.53,-130.596,564.557,-1.042,-0.214,-0.631,8.15"),
];

#[derive(Debug, Error)]
#[error("{0}")]
pub struct CrsError(String);

/// The reference system a dataset declares.
pub enum SourceCrs {
    /// No descriptor; coordinates are taken to be WGS84 as-is.
    Undeclared,
    Wgs84,
    Other(Reprojector),
}

impl fmt::Debug for SourceCrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceCrs::Undeclared => f.write_str("Undeclared"),
            SourceCrs::Wgs84 => f.write_str("Wgs84"),
            SourceCrs::Other(r) => write!(f, "Other({})", r.definition),
        }
    }
}

pub struct Reprojector {
    definition: String,
    source: Proj,
    target: Proj,
    source_is_latlong: bool,
}

impl SourceCrs {
    /// Interprets the WKT content of a `.prj` file.
    ///
    /// `proj4wkt` writes a zero `towgs84` for datums it cannot resolve, so
    /// known datums get their shift from [`DATUM_SHIFTS`] instead.
    pub fn from_wkt(wkt: &str) -> Result<Self, CrsError> {
        let wkt = wkt.trim();
        if is_wgs84_wkt(wkt) {
            return Ok(SourceCrs::Wgs84);
        }
        if wkt_name(wkt, "PROJECTION")
            .is_some_and(|method| method.eq_ignore_ascii_case("Mercator_Auxiliary_Sphere"))
        {
            return Self::from_proj_string(WEB_MERCATOR_PROJ);
        }

        let mut definition = proj4wkt::wkt_to_projstring(wkt)
            .map_err(|e| CrsError(format!("Failed to convert WKT to PROJ string: {:?}", e)))?;
        if !has_datum_shift(&definition) {
            if let Some(shift) = wkt_name(wkt, "DATUM").and_then(datum_shift) {
                definition = with_towgs84(&definition, shift);
            }
        }
        Self::from_proj_string(&definition)
    }

    pub fn from_proj_string(definition: &str) -> Result<Self, CrsError> {
        if is_wgs84_proj(definition) {
            return Ok(SourceCrs::Wgs84);
        }
        let source = Proj::from_proj_string(definition)
            .map_err(|e| CrsError(format!("Invalid source CRS '{}': {:?}", definition, e)))?;
        let target = Proj::from_proj_string(WGS84_PROJ)
            .map_err(|e| CrsError(format!("Invalid WGS84 definition: {:?}", e)))?;

        Ok(SourceCrs::Other(Reprojector {
            definition: definition.to_string(),
            source,
            target,
            source_is_latlong: is_latlong_proj(definition),
        }))
    }

    /// Maps a raw `(x, y)` pair from the source file to a WGS84 point
    /// (x = longitude, y = latitude, degrees).
    pub fn normalize(&self, x: f64, y: f64) -> Result<Point<f64>, CrsError> {
        match self {
            SourceCrs::Undeclared | SourceCrs::Wgs84 => Ok(Point::new(x, y)),
            SourceCrs::Other(reprojector) => reprojector.to_wgs84(x, y),
        }
    }

    pub fn needs_transform(&self) -> bool {
        matches!(self, SourceCrs::Other(_))
    }
}

impl Reprojector {
    fn to_wgs84(&self, x: f64, y: f64) -> Result<Point<f64>, CrsError> {
        let mut point = if self.source_is_latlong {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        proj4rs::transform::transform(&self.source, &self.target, &mut point)
            .map_err(|e| CrsError(format!("Failed to reproject ({}, {}): {:?}", x, y, e)))?;
        Ok(Point::new(point.0.to_degrees(), point.1.to_degrees()))
    }
}

fn is_wgs84_wkt(wkt: &str) -> bool {
    let upper = wkt.trim().to_ascii_uppercase();
    let geographic = ["GEOGCS[", "GEOGCRS[", "GEODCRS["]
        .iter()
        .any(|prefix| upper.starts_with(prefix));
    if !geographic || upper.contains("PROJCS[") || upper.contains("PROJCRS[") {
        return false;
    }
    upper.contains("WGS_1984") || upper.contains("WGS 84") || upper.contains("WGS84")
}

/// The quoted name following `KEYWORD[` in a WKT string.
fn wkt_name<'a>(wkt: &'a str, keyword: &str) -> Option<&'a str> {
    let needle = format!("{}[\"", keyword);
    let start = wkt.to_ascii_uppercase().find(&needle)? + needle.len();
    let rest = &wkt[start..];
    rest.find('"').map(|end| &rest[..end])
}

fn datum_key(name: &str) -> String {
    let name = name.strip_prefix("D_").unwrap_or(name);
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn datum_shift(name: &str) -> Option<&'static str> {
    let key = datum_key(name);
    DATUM_SHIFTS
        .iter()
        .find(|(datum, _)| *datum == key)
        .map(|(_, shift)| *shift)
}

fn with_towgs84(definition: &str, shift: &str) -> String {
    let towgs84 = format!("+towgs84={}", shift);
    definition
        .split_whitespace()
        .filter(|token| !token.starts_with("+towgs84="))
        .chain([towgs84.as_str()])
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_nonzero_towgs84(value: &str) -> bool {
    value
        .split(',')
        .any(|c| c.parse::<f64>().map_or(true, |n| n != 0.0))
}

fn has_datum_shift(definition: &str) -> bool {
    proj_params(definition).any(|(key, value)| match key {
        "towgs84" => is_nonzero_towgs84(value),
        "datum" | "nadgrids" => true,
        _ => false,
    })
}

fn proj_params(definition: &str) -> impl Iterator<Item = (&str, &str)> {
    definition.split_whitespace().filter_map(|token| {
        let token = token.strip_prefix('+')?;
        Some(token.split_once('=').unwrap_or((token, "")))
    })
}

fn is_latlong_proj(definition: &str) -> bool {
    proj_params(definition).any(|(k, v)| k == "proj" && (v == "longlat" || v == "latlong"))
}

fn is_wgs84_proj(definition: &str) -> bool {
    if !is_latlong_proj(definition) {
        return false;
    }
    let mut wgs84 = false;
    for (key, value) in proj_params(definition) {
        match key {
            "datum" | "ellps" if value.eq_ignore_ascii_case("WGS84") => wgs84 = true,
            "datum" | "ellps" => return false,
            "towgs84" if is_nonzero_towgs84(value) => return false,
            "pm" if value != "greenwich" && value != "0" => return false,
            _ => {}
        }
    }
    wgs84
}
