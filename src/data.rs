use crate::config::AppConfig;
use crate::crs::SourceCrs;
use crate::error::DataError;
use crate::types::{Category, FeatureCollection, PointFeature};
use geojson::GeoJson;
use shapefile::dbase::{self, FieldValue};
use shapefile::{Reader, Shape};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Both datasets for one render cycle.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub deaths: FeatureCollection,
    pub pumps: FeatureCollection,
}

pub fn load_datasets(config: &AppConfig) -> Result<Datasets, DataError> {
    let deaths = load_collection(&config.input.deaths, Category::Death)?;
    let pumps = load_collection(&config.input.pumps, Category::Pump)?;
    Ok(Datasets { deaths, pumps })
}

/// Reads a point dataset and normalizes its coordinates to WGS84.
pub fn load_collection(path: &Path, category: Category) -> Result<FeatureCollection, DataError> {
    if !path.exists() {
        return Err(DataError::load(path, "file does not exist"));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| DataError::load(path, "input file has no extension"))?;

    let collection = match extension.as_str() {
        "shp" => {
            let crs = read_prj(path)?;
            read_shapefile(path, category, &crs)?
        }
        "json" | "geojson" => read_geojson(path, category)?,
        other => return Err(DataError::load(path, format!("unsupported format: {}", other))),
    };

    tracing::info!(
        path = %path.display(),
        %category,
        features = collection.len(),
        "loaded dataset"
    );
    Ok(collection)
}

/// The `.prj` sidecar next to a shapefile, if any.
fn read_prj(shp_path: &Path) -> Result<SourceCrs, DataError> {
    let prj_path = shp_path.with_extension("prj");
    if !prj_path.exists() {
        tracing::warn!(
            path = %shp_path.display(),
            "no .prj found, assuming WGS84"
        );
        return Ok(SourceCrs::Undeclared);
    }

    let wkt = fs::read_to_string(&prj_path).map_err(|e| DataError::load(&prj_path, e))?;
    if wkt.trim().is_empty() {
        return Ok(SourceCrs::Undeclared);
    }
    let crs = SourceCrs::from_wkt(&wkt).map_err(|e| DataError::load(&prj_path, e))?;
    tracing::debug!(
        path = %prj_path.display(),
        ?crs,
        reproject = crs.needs_transform(),
        "detected CRS"
    );
    Ok(crs)
}

fn read_shapefile(
    path: &Path,
    category: Category,
    crs: &SourceCrs,
) -> Result<FeatureCollection, DataError> {
    let mut reader = Reader::from_path(path).map_err(|e| DataError::load(path, e))?;
    let field_names = dbf_field_names(path)?;

    let mut features = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, mut record) = result.map_err(|e| DataError::load(path, e))?;

        let (x, y) = match shape {
            Shape::Point(p) => (p.x, p.y),
            Shape::PointM(p) => (p.x, p.y),
            Shape::PointZ(p) => (p.x, p.y),
            Shape::NullShape => continue,
            other => return Err(DataError::schema(path, format!("{:?}", other.shapetype()))),
        };

        let point = crs.normalize(x, y).map_err(|e| DataError::load(path, e))?;
        let attributes = field_names
            .iter()
            .filter_map(|name| {
                let value = record.remove(name)?;
                Some((name.clone(), field_to_string(&value)))
            })
            .collect();

        features.push(PointFeature {
            point,
            category,
            attributes,
        });
    }

    Ok(FeatureCollection::new(category, features))
}

/// Column names in the order the `.dbf` header declares them.
fn dbf_field_names(shp_path: &Path) -> Result<Vec<String>, DataError> {
    let dbf_path = shp_path.with_extension("dbf");
    let table = dbase::Reader::from_path(&dbf_path).map_err(|e| DataError::load(&dbf_path, e))?;
    Ok(table
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect())
}

/// GeoJSON coordinates are WGS84 by definition (RFC 7946).
fn read_geojson(path: &Path, category: Category) -> Result<FeatureCollection, DataError> {
    use geojson::Value;

    let file = File::open(path).map_err(|e| DataError::load(path, e))?;
    let geojson = GeoJson::from_reader(BufReader::new(file))
        .map_err(|e| DataError::load(path, format!("Failed to parse GeoJSON: {}", e)))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(DataError::load(path, "GeoJSON must be a FeatureCollection")),
    };

    let mut features = Vec::new();

    for feature in collection.features {
        let geometry = match feature.geometry {
            Some(g) => g,
            None => continue,
        };

        let (x, y) = match &geometry.value {
            Value::Point(position) if position.len() >= 2 => (position[0], position[1]),
            Value::Point(_) => return Err(DataError::load(path, "point with fewer than 2 coordinates")),
            other => return Err(DataError::schema(path, geometry_kind(other))),
        };

        let attributes = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (name, text)
            })
            .collect();

        features.push(PointFeature {
            point: geo::Point::new(x, y),
            category,
            attributes,
        });
    }

    Ok(FeatureCollection::new(category, features))
}

fn geometry_kind(value: &geojson::Value) -> &'static str {
    use geojson::Value;

    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn field_to_string(value: &FieldValue) -> String {
    match value {
        FieldValue::Character(Some(s)) => s.trim().to_string(),
        FieldValue::Numeric(Some(n)) => format_number(*n),
        FieldValue::Float(Some(n)) => format_number(f64::from(*n)),
        FieldValue::Double(n) => format_number(*n),
        FieldValue::Integer(n) => n.to_string(),
        FieldValue::Logical(Some(b)) => b.to_string(),
        FieldValue::Currency(n) => format_number(*n),
        FieldValue::Memo(s) => s.trim().to_string(),
        FieldValue::Date(Some(d)) => format_date(d),
        FieldValue::DateTime(dt) => {
            let time = dt.time();
            format!(
                "{} {:02}:{:02}:{:02}",
                format_date(&dt.date()),
                time.hours(),
                time.minutes(),
                time.seconds()
            )
        }
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Float(None)
        | FieldValue::Logical(None)
        | FieldValue::Date(None) => String::new(),
    }
}

fn format_date(date: &dbase::Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

// dBase stores integers as numeric fields; show 3 rather than 3.0
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
