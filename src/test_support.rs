//! Shapefile fixtures shared by unit tests.

use crate::config::AppConfig;
use shapefile::dbase::{FieldValue, Record, TableWriterBuilder};
use shapefile::Writer;
use std::path::{Path, PathBuf};

pub const ESRI_WGS84: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

/// British National Grid as ESRI writes it: no `TOWGS84` clause.
pub const ESRI_BRITISH_NATIONAL_GRID: &str = r#"PROJCS["British_National_Grid",GEOGCS["GCS_OSGB_1936",DATUM["D_OSGB_1936",SPHEROID["Airy_1830",6377563.396,299.3249646]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",400000.0],PARAMETER["False_Northing",-100000.0],PARAMETER["Central_Meridian",-2.0],PARAMETER["Scale_Factor",0.9996012717],PARAMETER["Latitude_Of_Origin",49.0],UNIT["Meter",1.0]]"#;

pub const ESRI_WEB_MERCATOR: &str = r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Mercator_Auxiliary_Sphere"],PARAMETER["False_Easting",0.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",0.0],PARAMETER["Standard_Parallel_1",0.0],PARAMETER["Auxiliary_Sphere_Type",0.0],UNIT["Meter",1.0]]"#;

/// Broad Street pump as British National Grid easting/northing.
pub const BROAD_STREET_BNG: (f64, f64) = (529_396.0, 181_028.0);
/// The same pump as Web Mercator metres.
pub const BROAD_STREET_WEB_MERCATOR: (f64, f64) = (-15_214.539, 6_712_609.863);
/// The same pump in WGS84, `(lon, lat)`.
pub const BROAD_STREET_WGS84: (f64, f64) = (-0.136675, 51.513368);

pub fn assert_near(actual: (f64, f64), expected: (f64, f64), tolerance: f64) {
    assert!(
        (actual.0 - expected.0).abs() < tolerance && (actual.1 - expected.1).abs() < tolerance,
        "{:?} is not within {} of {:?}",
        actual,
        tolerance,
        expected
    );
}

/// Writes a point shapefile with a single numeric `Count` column.
/// Each tuple is `(x, y, count)`.
pub fn write_points(dir: &Path, name: &str, points: &[(f64, f64, f64)]) -> PathBuf {
    let path = dir.join(name);
    let table = TableWriterBuilder::new().add_numeric_field("Count".try_into().unwrap(), 10, 0);
    let mut writer = Writer::from_path(&path, table).unwrap();
    for &(x, y, count) in points {
        let mut record = Record::default();
        record.insert("Count".to_string(), FieldValue::Numeric(Some(count)));
        writer
            .write_shape_and_record(&shapefile::Point::new(x, y), &record)
            .unwrap();
    }
    drop(writer);
    path
}

/// A config pointing at a small Broad Street fixture inside `dir`.
pub fn broad_street_config(dir: &Path) -> AppConfig {
    let deaths = write_points(
        dir,
        "Cholera_Deaths.shp",
        &[
            (-0.1357, 51.5133, 3.0),
            (-0.1359, 51.5135, 2.0),
            (-0.1362, 51.5139, 1.0),
        ],
    );
    let pumps = write_points(
        dir,
        "Pumps.shp",
        &[(-0.136668, 51.513341, 0.0), (-0.139586, 51.513876, 0.0)],
    );
    std::fs::write(pumps.with_extension("prj"), ESRI_WGS84).unwrap();

    let mut config = AppConfig::default();
    config.input.deaths = deaths;
    config.input.pumps = pumps;
    config
}
